//! Notification gateway text frame envelope.

use serde::{Deserialize, Serialize};
use snafu::prelude::*;

/// Error when parse text frame as inbound message
#[derive(Debug, Snafu)]
#[snafu(visibility(pub(super)), module(error), context(suffix(false)))]
pub enum ParseMessageError {
    /// frame is invalid json
    #[snafu(display("parse json failed: {source}"))]
    ParseJSONFailed {
        /// received text
        text: String,
        /// source error
        source: serde_json::Error,
    },

    /// frame json is not an object
    #[snafu(display("parsed message is not object: {json}"))]
    MessageNotObject {
        /// json string
        json: String,
    },

    /// frame json has no string type field
    #[snafu(display("message has no type field: {json}"))]
    NoMessageType {
        /// json string
        json: String,
    },

    /// frame json misses event type or data
    #[snafu(display("parse to {type_name} message failed: {source}"))]
    ParseEnvelopeFailed {
        /// discriminator of the message
        type_name: String,
        /// source error
        source: serde_json::Error,
    },
}

/// Inbound message pushed by the server.
///
/// `type` is the channel-layer discriminator, `event_type` names the application event
/// and `data` carries its payload, left undecoded for the consumers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InboundMessage {
    /// message discriminator, e.g. `send_notification`
    #[serde(rename = "type")]
    pub kind: String,
    /// application event type
    #[serde(alias = "eventType")]
    pub event_type: String,
    /// event payload
    #[serde(alias = "payload")]
    pub data: serde_json::Value,
}

impl InboundMessage {
    /// Decode a text frame
    pub fn decode(text: &str) -> Result<Self, ParseMessageError> {
        let value: serde_json::Value =
            serde_json::from_str(text).context(error::ParseJSONFailed { text })?;

        let obj = value
            .as_object()
            .with_context(|| error::MessageNotObject { json: text })?;

        let type_name = obj
            .get("type")
            .and_then(|t| t.as_str())
            .with_context(|| error::NoMessageType { json: text })?
            .to_string();

        serde_json::from_value(value).context(error::ParseEnvelopeFailed { type_name })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decode_notification() {
        let msg = InboundMessage::decode(
            r#"{"type": "send_notification", "event_type": "reflection", "data": {"id": 1}}"#,
        )
        .unwrap();

        assert_eq!(msg.kind, "send_notification");
        assert_eq!(msg.event_type, "reflection");
        assert_eq!(msg.data["id"], 1);
    }

    #[test]
    fn decode_camel_case_aliases() {
        let msg = InboundMessage::decode(
            r#"{"type": "send_notification", "eventType": "search", "payload": [1, 2]}"#,
        )
        .unwrap();

        assert_eq!(msg.event_type, "search");
        assert_eq!(msg.data, serde_json::json!([1, 2]));
    }

    #[test]
    fn reject_malformed_frames() {
        assert!(matches!(
            InboundMessage::decode("{not json"),
            Err(ParseMessageError::ParseJSONFailed { .. })
        ));
        assert!(matches!(
            InboundMessage::decode("[1, 2]"),
            Err(ParseMessageError::MessageNotObject { .. })
        ));
        assert!(matches!(
            InboundMessage::decode(r#"{"type": 3}"#),
            Err(ParseMessageError::NoMessageType { .. })
        ));
        assert!(matches!(
            InboundMessage::decode(r#"{"type": "send_notification", "data": {}}"#),
            Err(ParseMessageError::ParseEnvelopeFailed { ref type_name, .. }) if type_name == "send_notification"
        ));
    }
}
