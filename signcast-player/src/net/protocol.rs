//! Wire messages for the registration socket
//!
//! JSON text frames, tagged by `type`. Field names follow the upstream
//! camelCase convention. Inbound frames that fail to parse are logged and
//! ignored; they never tear down the connection.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use signcast_common::model::{self, MediaAsset};
use tracing::warn;

/// Messages sent from the device to the upstream service
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    #[serde(rename_all = "camelCase")]
    Register {
        device_id: String,
        device_name: String,
    },
}

/// Signals received from the upstream service
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    #[serde(rename_all = "camelCase")]
    RegisteredSuccess {
        #[serde(default)]
        device_id: Option<String>,
    },
    RegisteredFailed {
        #[serde(default)]
        reason: Option<String>,
    },
    /// Catalog available: carries an inline payload, a device id, or both
    #[serde(rename_all = "camelCase")]
    CatalogReady {
        #[serde(default)]
        device_id: Option<String>,
        #[serde(default)]
        data: Option<Value>,
    },
    Blocked {
        #[serde(default)]
        reason: Option<String>,
    },
    Unblocked,
}

impl ServerMessage {
    /// Parse one inbound text frame; malformed frames yield `None`
    pub fn parse(text: &str) -> Option<ServerMessage> {
        match serde_json::from_str(text) {
            Ok(message) => Some(message),
            Err(e) => {
                warn!("Ignoring malformed upstream frame: {}", e);
                None
            }
        }
    }
}

/// Extract catalog entries from a `{"mediaAllData": [...]}` payload.
///
/// Shared by the inline socket path and the REST fetcher. Returns `None`
/// when the payload has no `mediaAllData` array at all; individual bad
/// entries are skipped by the entry parser.
pub fn parse_media_payload(data: &Value) -> Option<Vec<MediaAsset>> {
    let entries = data.get("mediaAllData").and_then(Value::as_array)?;
    Some(model::parse_catalog_entries(entries))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn register_uses_upstream_field_names() {
        let message = ClientMessage::Register {
            device_id: "dev-1".to_string(),
            device_name: "Lobby East".to_string(),
        };
        let json = serde_json::to_value(&message).unwrap();
        assert_eq!(json["type"], "register");
        assert_eq!(json["deviceId"], "dev-1");
        assert_eq!(json["deviceName"], "Lobby East");
    }

    #[test]
    fn parses_each_signal() {
        let message = ServerMessage::parse(r#"{"type":"registered_success","deviceId":"d"}"#);
        assert!(matches!(
            message,
            Some(ServerMessage::RegisteredSuccess { device_id: Some(id) }) if id == "d"
        ));

        let message = ServerMessage::parse(r#"{"type":"registered_failed"}"#);
        assert!(matches!(
            message,
            Some(ServerMessage::RegisteredFailed { reason: None })
        ));

        let message = ServerMessage::parse(r#"{"type":"blocked","reason":"unpaid"}"#);
        assert!(matches!(message, Some(ServerMessage::Blocked { .. })));

        let message = ServerMessage::parse(r#"{"type":"unblocked"}"#);
        assert!(matches!(message, Some(ServerMessage::Unblocked)));
    }

    #[test]
    fn catalog_ready_carries_inline_payload_or_id() {
        let message = ServerMessage::parse(
            r#"{"type":"catalog_ready","data":{"mediaAllData":[]}}"#,
        )
        .unwrap();
        match message {
            ServerMessage::CatalogReady { device_id, data } => {
                assert!(device_id.is_none());
                assert!(data.is_some());
            }
            _ => panic!("wrong variant"),
        }

        let message =
            ServerMessage::parse(r#"{"type":"catalog_ready","deviceId":"d9"}"#).unwrap();
        match message {
            ServerMessage::CatalogReady { device_id, data } => {
                assert_eq!(device_id.as_deref(), Some("d9"));
                assert!(data.is_none());
            }
            _ => panic!("wrong variant"),
        }
    }

    #[test]
    fn malformed_frames_are_ignored() {
        assert!(ServerMessage::parse("not json").is_none());
        assert!(ServerMessage::parse(r#"{"type":"solar_flare"}"#).is_none());
        assert!(ServerMessage::parse(r#"{"no_type":true}"#).is_none());
    }

    #[test]
    fn unknown_extra_fields_are_tolerated() {
        let message =
            ServerMessage::parse(r#"{"type":"unblocked","deviceId":"d","extra":1}"#);
        assert!(matches!(message, Some(ServerMessage::Unblocked)));
    }

    #[test]
    fn media_payload_extraction() {
        let payload = json!({
            "mediaAllData": [
                {"_id": "m1", "isActive": true, "url": "https://cdn.example.com/m1.mp4"},
                {"_id": "m2", "isActive": false}
            ]
        });
        let assets = parse_media_payload(&payload).unwrap();
        assert_eq!(assets.len(), 1);
        assert_eq!(assets[0].id, "m1");

        assert!(parse_media_payload(&json!({"other": []})).is_none());
    }
}
