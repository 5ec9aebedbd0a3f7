//! Notification payload construction.
//!
//! A payload is the JSON object carried by a notification: a nested `aps`
//! object holding the user-visible items (alert, badge, sound) plus any
//! custom keys the application wants to ship alongside it.

use serde::Serialize;
use serde_json::{Map, Value};

use crate::core::EncodeError;

/// A notification payload.
///
/// The JSON-encoded payload cannot exceed
/// [`MAX_PAYLOAD_LEN`](crate::core::constants::MAX_PAYLOAD_LEN) bytes;
/// the limit is enforced when the notification is encoded.
#[derive(Debug, Clone, Default, Serialize)]
pub struct Payload(Map<String, Value>);

/// A localized alert text.
///
/// When used it replaces the plain string form of `aps.alert`.
#[derive(Debug, Clone, Default, Serialize, PartialEq, Eq)]
pub struct AlertDictionary {
    /// The alert text.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub body: Option<String>,

    /// Localization key for the action button title.
    #[serde(rename = "action-loc-key", skip_serializing_if = "Option::is_none")]
    pub action_loc_key: Option<String>,

    /// Localization key for the alert text.
    #[serde(rename = "loc-key", skip_serializing_if = "Option::is_none")]
    pub loc_key: Option<String>,

    /// Format arguments for `loc-key`, in order.
    #[serde(rename = "loc-args", skip_serializing_if = "Vec::is_empty")]
    pub loc_args: Vec<String>,

    /// Launch image filename.
    #[serde(rename = "launch-image", skip_serializing_if = "Option::is_none")]
    pub launch_image: Option<String>,
}

impl Payload {
    /// Create an empty payload.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the alert item as a plain string.
    pub fn set_alert_string(&mut self, alert: impl Into<String>) {
        self.aps_mut().insert("alert".into(), Value::String(alert.into()));
    }

    /// Set the alert item as a localized dictionary.
    pub fn set_alert_dictionary(&mut self, alert: &AlertDictionary) {
        // A struct of plain strings always serializes.
        let value = serde_json::to_value(alert).unwrap_or(Value::Null);
        self.aps_mut().insert("alert".into(), value);
    }

    /// Set the badge item.
    pub fn set_badge(&mut self, badge: u32) {
        self.aps_mut().insert("badge".into(), Value::from(badge));
    }

    /// Set the sound item.
    pub fn set_sound(&mut self, sound: impl Into<String>) {
        self.aps_mut().insert("sound".into(), Value::String(sound.into()));
    }

    /// Set a custom item outside the `aps` namespace.
    pub fn set(&mut self, name: impl Into<String>, value: Value) {
        self.0.insert(name.into(), value);
    }

    /// Get the value of a top-level item, if present.
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.0.get(name)
    }

    /// Encode the payload to JSON.
    pub fn to_json(&self) -> Result<Vec<u8>, EncodeError> {
        Ok(serde_json::to_vec(&self.0)?)
    }

    fn aps_mut(&mut self) -> &mut Map<String, Value> {
        let aps = self
            .0
            .entry("aps")
            .or_insert_with(|| Value::Object(Map::new()));
        if !aps.is_object() {
            *aps = Value::Object(Map::new());
        }
        match aps {
            Value::Object(map) => map,
            _ => unreachable!("aps entry was just made an object"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_payload() {
        let p = Payload::new();
        assert_eq!(p.to_json().unwrap(), b"{}");
    }

    #[test]
    fn test_alert_string() {
        let mut p = Payload::new();
        p.set_alert_string("Hello");

        let json = String::from_utf8(p.to_json().unwrap()).unwrap();
        assert_eq!(json, r#"{"aps":{"alert":"Hello"}}"#);
    }

    #[test]
    fn test_badge_and_sound() {
        let mut p = Payload::new();
        p.set_badge(42);
        p.set_sound("bingbong.aiff");

        let json = String::from_utf8(p.to_json().unwrap()).unwrap();
        assert_eq!(json, r#"{"aps":{"badge":42,"sound":"bingbong.aiff"}}"#);
    }

    #[test]
    fn test_custom_item_outside_aps() {
        let mut p = Payload::new();
        p.set_alert_string("hi");
        p.set("thread", Value::from("support"));

        let json = String::from_utf8(p.to_json().unwrap()).unwrap();
        assert_eq!(json, r#"{"aps":{"alert":"hi"},"thread":"support"}"#);
    }

    #[test]
    fn test_alert_dictionary_omits_empty_fields() {
        let alert = AlertDictionary {
            loc_key: Some("GAME_INVITE".into()),
            loc_args: vec!["Jenna".into(), "Frank".into()],
            ..AlertDictionary::default()
        };

        let mut p = Payload::new();
        p.set_alert_dictionary(&alert);

        let json = String::from_utf8(p.to_json().unwrap()).unwrap();
        assert_eq!(
            json,
            r#"{"aps":{"alert":{"loc-args":["Jenna","Frank"],"loc-key":"GAME_INVITE"}}}"#
        );
    }

    #[test]
    fn test_alert_replaces_previous_form() {
        let mut p = Payload::new();
        p.set_alert_string("plain");
        p.set_alert_dictionary(&AlertDictionary {
            body: Some("localized".into()),
            ..AlertDictionary::default()
        });

        let json = String::from_utf8(p.to_json().unwrap()).unwrap();
        assert_eq!(json, r#"{"aps":{"alert":{"body":"localized"}}}"#);
    }
}
