//! The notification record submitted to a sender.

use std::time::Duration;

use super::payload::Payload;

/// Notification delivery priority.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[repr(u8)]
pub enum NotificationPriority {
    /// Send the push message immediately. This is the default.
    #[default]
    Immediate = 10,

    /// Send the push message at a time that conserves power on the
    /// receiving device.
    PowerSaving = 5,
}

impl NotificationPriority {
    /// Parse a priority from its wire byte.
    pub fn from_byte(byte: u8) -> Option<Self> {
        match byte {
            10 => Some(Self::Immediate),
            5 => Some(Self::PowerSaving),
            _ => None,
        }
    }

    /// Convert the priority to its wire byte.
    pub fn as_byte(self) -> u8 {
        self as u8
    }
}

/// A push notification.
///
/// Two notifications submitted to the same sender must have different
/// identifiers; the sender automatically assigns one if it was not set.
#[derive(Debug, Clone, Default)]
pub struct Notification {
    device_token: String,
    payload: Payload,
    identifier: Option<u32>,
    expiry: Duration,
    priority: NotificationPriority,
}

impl Notification {
    /// Create a new notification with an empty payload and default priority.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the device token. Must be a 64-character hex string.
    pub fn set_device_token(&mut self, token: impl Into<String>) {
        self.device_token = token.into();
    }

    /// Get the device token.
    pub fn device_token(&self) -> &str {
        &self.device_token
    }

    /// Get the payload.
    pub fn payload(&self) -> &Payload {
        &self.payload
    }

    /// Get a mutable reference to the payload.
    pub fn payload_mut(&mut self) -> &mut Payload {
        &mut self.payload
    }

    /// Set a custom identifier.
    pub fn set_identifier(&mut self, identifier: u32) {
        self.identifier = Some(identifier);
    }

    /// Get the identifier, if one has been set or assigned.
    pub fn identifier(&self) -> Option<u32> {
        self.identifier
    }

    /// Set the expiry. Fractions of a second are truncated on the wire.
    ///
    /// APNs discards the notification if it was not able to deliver it
    /// within this duration. An expiry of zero means the notification is
    /// discarded immediately if it cannot be delivered (the default).
    pub fn set_expiry(&mut self, expiry: Duration) {
        self.expiry = expiry;
    }

    /// Get the expiry.
    pub fn expiry(&self) -> Duration {
        self.expiry
    }

    /// Set the priority. The default is [`NotificationPriority::Immediate`].
    pub fn set_priority(&mut self, priority: NotificationPriority) {
        self.priority = priority;
    }

    /// Get the priority.
    pub fn priority(&self) -> NotificationPriority {
        self.priority
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_priority_roundtrip() {
        for p in [NotificationPriority::Immediate, NotificationPriority::PowerSaving] {
            assert_eq!(NotificationPriority::from_byte(p.as_byte()), Some(p));
        }
        assert_eq!(NotificationPriority::from_byte(0), None);
        assert_eq!(NotificationPriority::from_byte(7), None);
    }

    #[test]
    fn test_defaults() {
        let n = Notification::new();
        assert_eq!(n.identifier(), None);
        assert_eq!(n.expiry(), Duration::ZERO);
        assert_eq!(n.priority(), NotificationPriority::Immediate);
    }

    #[test]
    fn test_identifier_assignment() {
        let mut n = Notification::new();
        assert_eq!(n.identifier(), None);

        n.set_identifier(7);
        assert_eq!(n.identifier(), Some(7));
    }
}
