//! Frame encoding and decoding for the binary APNs protocol.
//!
//! Implements the v2 "enhanced" push frame (command 2, outbound) and the
//! 6-byte error-response packet (command 8, inbound).

use std::fmt;

use crate::core::constants::{DEVICE_TOKEN_LEN, ERROR_RESPONSE_LEN, MAX_PAYLOAD_LEN};
use crate::core::{EncodeError, ResponseError};
use crate::notification::Notification;

/// Push frames always start with command value 2.
pub const PUSH_COMMAND: u8 = 2;

/// Command value of error responses sent by APNs.
pub const ERROR_RESPONSE_COMMAND: u8 = 8;

/// Command value used strictly locally, for responses synthesized from
/// local I/O conditions. Never appears on the wire.
pub const LOCAL_RESPONSE_COMMAND: u8 = 0xDD;

/// Frame item identifiers and fixed item lengths.
pub mod items {
    /// Device token item.
    pub const DEVICE_TOKEN_ID: u8 = 1;
    /// Payload item.
    pub const PAYLOAD_ID: u8 = 2;
    /// Notification identifier item.
    pub const IDENTIFIER_ID: u8 = 3;
    /// Expiration date item.
    pub const EXPIRY_ID: u8 = 4;
    /// Priority item.
    pub const PRIORITY_ID: u8 = 5;

    /// Notification identifier item length.
    pub const IDENTIFIER_LEN: usize = 4;
    /// Expiration date item length.
    pub const EXPIRY_LEN: usize = 4;
    /// Priority item length.
    pub const PRIORITY_LEN: usize = 1;
}

/// Status field of an error response.
///
/// Wraps the raw byte so unrecognized values survive decoding; the
/// documented values are provided as constants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ResponseStatus(u8);

impl ResponseStatus {
    /// No error. Only used by locally synthesized responses; APNs never
    /// sends it.
    pub const NO_ERRORS: Self = Self(0);
    /// Processing error.
    pub const PROCESSING_ERROR: Self = Self(1);
    /// Missing device token.
    pub const MISSING_DEVICE_TOKEN: Self = Self(2);
    /// Missing topic.
    pub const MISSING_TOPIC: Self = Self(3);
    /// Missing payload.
    pub const MISSING_PAYLOAD: Self = Self(4);
    /// Invalid token size.
    pub const INVALID_TOKEN_SIZE: Self = Self(5);
    /// Invalid topic size.
    pub const INVALID_TOPIC_SIZE: Self = Self(6);
    /// Invalid payload size.
    pub const INVALID_PAYLOAD_SIZE: Self = Self(7);
    /// Invalid token.
    pub const INVALID_TOKEN: Self = Self(8);
    /// The gateway is shutting down. The identifier names the last
    /// notification that was delivered successfully, not a failure.
    pub const SHUTDOWN: Self = Self(10);
    /// Unknown error.
    pub const UNKNOWN: Self = Self(255);

    /// Create a status from a raw byte.
    pub fn from_byte(byte: u8) -> Self {
        Self(byte)
    }

    /// Get the raw byte value.
    pub fn as_byte(self) -> u8 {
        self.0
    }

    /// Get the protocol name of the status.
    pub fn name(self) -> &'static str {
        match self.0 {
            0 => "NO_ERRORS",
            1 => "PROCESSING_ERROR",
            2 => "MISSING_DEVICE_TOKEN",
            3 => "MISSING_TOPIC",
            4 => "MISSING_PAYLOAD",
            5 => "INVALID_TOKEN_SIZE",
            6 => "INVALID_TOPIC_SIZE",
            7 => "INVALID_PAYLOAD_SIZE",
            8 => "INVALID_TOKEN",
            10 => "SHUTDOWN",
            255 => "UNKNOWN",
            _ => "INVALID",
        }
    }
}

impl fmt::Display for ResponseStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// An APNs error-response packet.
///
/// The gateway sends one only on failure, immediately before closing the
/// connection. The identifier is that of the *last successfully received*
/// notification; every notification written strictly after it was lost.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ErrorResponse {
    /// Command field; [`ERROR_RESPONSE_COMMAND`] on the wire.
    pub command: u8,
    /// Status field.
    pub status: ResponseStatus,
    /// Identifier of the last successfully received notification.
    pub identifier: u32,
}

impl ErrorResponse {
    /// Create an error response with the wire command value.
    pub fn new(status: ResponseStatus, identifier: u32) -> Self {
        Self {
            command: ERROR_RESPONSE_COMMAND,
            status,
            identifier,
        }
    }

    /// Decode an error response from exactly
    /// [`ERROR_RESPONSE_LEN`] bytes.
    pub fn decode(buf: &[u8]) -> Result<Self, ResponseError> {
        if buf.len() != ERROR_RESPONSE_LEN {
            return Err(ResponseError::InvalidLength { actual: buf.len() });
        }

        let identifier = u32::from_be_bytes([buf[2], buf[3], buf[4], buf[5]]);

        Ok(Self {
            command: buf[0],
            status: ResponseStatus::from_byte(buf[1]),
            identifier,
        })
    }

    /// Serialize the response to its 6-byte wire form.
    pub fn to_bytes(&self) -> [u8; ERROR_RESPONSE_LEN] {
        let mut buf = [0u8; ERROR_RESPONSE_LEN];
        buf[0] = self.command;
        buf[1] = self.status.as_byte();
        buf[2..6].copy_from_slice(&self.identifier.to_be_bytes());
        buf
    }
}

/// Encode a notification to its v2 push frame.
///
/// The frame is `command (1B) | frame-length (4B BE) | items`, where each
/// item is `id (1B) | length (2B BE) | value`. Items are emitted in the
/// order token, payload, identifier, expiry, priority.
pub fn encode_notification(n: &Notification) -> Result<Vec<u8>, EncodeError> {
    let token = decode_device_token(n.device_token())?;

    let payload = n.payload().to_json()?;
    if payload.len() > MAX_PAYLOAD_LEN {
        return Err(EncodeError::PayloadTooLarge {
            size: payload.len(),
        });
    }

    let identifier = n.identifier().ok_or(EncodeError::IdentifierUnset)?;
    let expiry = n.expiry().as_secs() as u32;

    let mut frame_data = Vec::with_capacity(
        3 * 5 + DEVICE_TOKEN_LEN
            + payload.len()
            + items::IDENTIFIER_LEN
            + items::EXPIRY_LEN
            + items::PRIORITY_LEN,
    );
    push_item(&mut frame_data, items::DEVICE_TOKEN_ID, &token);
    push_item(&mut frame_data, items::PAYLOAD_ID, &payload);
    push_item(&mut frame_data, items::IDENTIFIER_ID, &identifier.to_be_bytes());
    push_item(&mut frame_data, items::EXPIRY_ID, &expiry.to_be_bytes());
    push_item(&mut frame_data, items::PRIORITY_ID, &[n.priority().as_byte()]);

    let mut frame = Vec::with_capacity(5 + frame_data.len());
    frame.push(PUSH_COMMAND);
    frame.extend_from_slice(&(frame_data.len() as u32).to_be_bytes());
    frame.extend_from_slice(&frame_data);

    Ok(frame)
}

fn decode_device_token(token: &str) -> Result<Vec<u8>, EncodeError> {
    let bytes = hex::decode(token).map_err(|source| EncodeError::TokenDecode {
        token: token.to_string(),
        source,
    })?;

    if bytes.len() != DEVICE_TOKEN_LEN {
        return Err(EncodeError::TokenDecode {
            token: token.to_string(),
            source: hex::FromHexError::InvalidStringLength,
        });
    }

    Ok(bytes)
}

fn push_item(buf: &mut Vec<u8>, id: u8, value: &[u8]) {
    buf.push(id);
    buf.extend_from_slice(&(value.len() as u16).to_be_bytes());
    buf.extend_from_slice(value);
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::notification::NotificationPriority;

    const TOKEN: &str = "6f3031f2828aa1a369c78d3216be4b7c40ca7a8728a6a8d3e6229afc437b4ef1";

    fn test_notification() -> Notification {
        let mut n = Notification::new();
        n.set_device_token(TOKEN);
        n.payload_mut().set_alert_string("Hello");
        n.set_identifier(0xCAFE_BABE);
        n.set_expiry(Duration::from_secs(3600));
        n
    }

    /// Split frame data into (id, value) items.
    fn parse_items(mut data: &[u8]) -> Vec<(u8, Vec<u8>)> {
        let mut items = Vec::new();
        while !data.is_empty() {
            let id = data[0];
            let len = u16::from_be_bytes([data[1], data[2]]) as usize;
            items.push((id, data[3..3 + len].to_vec()));
            data = &data[3 + len..];
        }
        items
    }

    #[test]
    fn test_encode_roundtrip() {
        let n = test_notification();
        let frame = encode_notification(&n).unwrap();

        assert_eq!(frame[0], PUSH_COMMAND);
        let frame_len = u32::from_be_bytes([frame[1], frame[2], frame[3], frame[4]]) as usize;
        assert_eq!(frame_len, frame.len() - 5);

        let items = parse_items(&frame[5..]);
        assert_eq!(items.len(), 5);

        assert_eq!(items[0].0, items::DEVICE_TOKEN_ID);
        assert_eq!(items[0].1, hex::decode(TOKEN).unwrap());

        assert_eq!(items[1].0, items::PAYLOAD_ID);
        assert_eq!(items[1].1, n.payload().to_json().unwrap());

        assert_eq!(items[2].0, items::IDENTIFIER_ID);
        assert_eq!(items[2].1, 0xCAFE_BABEu32.to_be_bytes());

        assert_eq!(items[3].0, items::EXPIRY_ID);
        assert_eq!(items[3].1, 3600u32.to_be_bytes());

        assert_eq!(items[4].0, items::PRIORITY_ID);
        assert_eq!(items[4].1, [NotificationPriority::Immediate.as_byte()]);
    }

    #[test]
    fn test_encode_power_saving_priority() {
        let mut n = test_notification();
        n.set_priority(NotificationPriority::PowerSaving);

        let frame = encode_notification(&n).unwrap();
        let items = parse_items(&frame[5..]);
        assert_eq!(items[4].1, [5]);
    }

    #[test]
    fn test_encode_truncates_expiry_to_seconds() {
        let mut n = test_notification();
        n.set_expiry(Duration::from_millis(1999));

        let frame = encode_notification(&n).unwrap();
        let items = parse_items(&frame[5..]);
        assert_eq!(items[3].1, 1u32.to_be_bytes());
    }

    #[test]
    fn test_encode_rejects_malformed_token() {
        let mut n = test_notification();
        n.set_device_token("not hex at all");

        assert!(matches!(
            encode_notification(&n),
            Err(EncodeError::TokenDecode { .. })
        ));
    }

    #[test]
    fn test_encode_rejects_short_token() {
        let mut n = test_notification();
        n.set_device_token("6f3031");

        assert!(matches!(
            encode_notification(&n),
            Err(EncodeError::TokenDecode { .. })
        ));
    }

    #[test]
    fn test_encode_rejects_oversize_payload() {
        let mut n = test_notification();
        n.payload_mut().set_alert_string("x".repeat(MAX_PAYLOAD_LEN + 1));

        assert!(matches!(
            encode_notification(&n),
            Err(EncodeError::PayloadTooLarge { .. })
        ));
    }

    #[test]
    fn test_encode_rejects_unset_identifier() {
        let mut n = Notification::new();
        n.set_device_token(TOKEN);

        assert!(matches!(
            encode_notification(&n),
            Err(EncodeError::IdentifierUnset)
        ));
    }

    #[test]
    fn test_response_decode() {
        let buf = [8, 10, 0x12, 0x34, 0x56, 0x78];
        let resp = ErrorResponse::decode(&buf).unwrap();

        assert_eq!(resp.command, ERROR_RESPONSE_COMMAND);
        assert_eq!(resp.status, ResponseStatus::SHUTDOWN);
        assert_eq!(resp.identifier, 0x1234_5678);
    }

    #[test]
    fn test_response_roundtrip() {
        let resp = ErrorResponse::new(ResponseStatus::INVALID_TOKEN, 42);
        let decoded = ErrorResponse::decode(&resp.to_bytes()).unwrap();
        assert_eq!(decoded, resp);
    }

    #[test]
    fn test_response_rejects_wrong_length() {
        assert!(matches!(
            ErrorResponse::decode(&[8, 1, 0, 0, 0]),
            Err(ResponseError::InvalidLength { actual: 5 })
        ));
        assert!(matches!(
            ErrorResponse::decode(&[8, 1, 0, 0, 0, 1, 0]),
            Err(ResponseError::InvalidLength { actual: 7 })
        ));
    }

    #[test]
    fn test_status_names() {
        assert_eq!(ResponseStatus::NO_ERRORS.name(), "NO_ERRORS");
        assert_eq!(ResponseStatus::SHUTDOWN.name(), "SHUTDOWN");
        assert_eq!(ResponseStatus::UNKNOWN.name(), "UNKNOWN");
        assert_eq!(ResponseStatus::from_byte(99).name(), "INVALID");
    }
}
