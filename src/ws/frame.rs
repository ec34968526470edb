//! Wire frames and close codes.

use std::fmt;

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use super::error::WsError;
use crate::error::Error;

/// Reserved heartbeat request type.
pub const PING: &str = "ping";
/// Reserved heartbeat reply type.
pub const PONG: &str = "pong";

/// One discrete unit of data received over the connection.
///
/// The `type` field is the discriminator used for routing. Servers may put the body under
/// either `payload` or `data`; frames without a body carry [`Value::Null`].
#[non_exhaustive]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Frame {
    #[serde(rename = "type")]
    pub frame_type: String,
    #[serde(default, alias = "data")]
    pub payload: Value,
    #[serde(
        default,
        deserialize_with = "deserialize_timestamp",
        skip_serializing_if = "Option::is_none"
    )]
    pub timestamp: Option<String>,
}

impl Frame {
    #[must_use]
    pub fn new<S: Into<String>>(frame_type: S, payload: Value) -> Self {
        Self {
            frame_type: frame_type.into(),
            payload,
            timestamp: None,
        }
    }

    /// Returns the discriminator as a [`FrameKind`].
    #[must_use]
    pub fn kind(&self) -> FrameKind {
        FrameKind::from_type(&self.frame_type)
    }

    /// Try to extract the payload as `T`.
    pub fn payload_as<T: serde::de::DeserializeOwned>(&self) -> crate::Result<T> {
        T::deserialize(&self.payload).map_err(|e| Error::decode(&self.frame_type, e))
    }
}

/// Timestamps arrive as ISO strings from most feeds but some emit epoch milliseconds.
fn deserialize_timestamp<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Option::<Value>::deserialize(deserializer)? {
        Some(Value::String(s)) => Some(s),
        Some(Value::Number(n)) => Some(n.to_string()),
        _ => None,
    })
}

/// Parse raw socket text into frames.
///
/// Accepts a single object or an array of objects. Whitespace-only input is a keepalive and
/// yields no frames.
pub fn parse_frames(bytes: &[u8]) -> crate::Result<Vec<Frame>> {
    let trimmed = bytes
        .iter()
        .position(|b| !b.is_ascii_whitespace())
        .map_or(&[][..], |start| &bytes[start..]);

    if trimmed.is_empty() {
        return Ok(Vec::new());
    }

    let frames = if trimmed.first() == Some(&b'[') {
        serde_json::from_slice(trimmed)
    } else {
        serde_json::from_slice::<Frame>(trimmed).map(|frame| vec![frame])
    };

    Ok(frames.map_err(WsError::MessageParse)?)
}

/// Known inbound discriminators.
///
/// Unknown values are kept as [`FrameKind::Other`] so newer servers do not break older clients.
#[non_exhaustive]
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum FrameKind {
    Ping,
    Pong,
    Error,
    VehicleUpdate,
    VehicleLocation,
    /// `vehicle_telemetry`, or its alias `telemetry_update`
    VehicleTelemetry,
    ChargingStatus,
    ChargingStart,
    ChargingEnd,
    BatteryAlert,
    BatteryStatus,
    BatteryHealth,
    DriverEvent,
    DriverStatus,
    DriverLocation,
    /// `system_notification`, or its alias `notification`
    SystemNotification,
    MaintenanceAlert,
    FleetUpdate,
    Other(String),
}

impl FrameKind {
    /// Get the kind for a given `type` string.
    #[must_use]
    pub fn from_type(frame_type: &str) -> Self {
        match frame_type {
            "ping" => Self::Ping,
            "pong" => Self::Pong,
            "error" => Self::Error,
            "vehicle_update" => Self::VehicleUpdate,
            "vehicle_location" => Self::VehicleLocation,
            "vehicle_telemetry" | "telemetry_update" => Self::VehicleTelemetry,
            "charging_status" => Self::ChargingStatus,
            "charging_start" => Self::ChargingStart,
            "charging_end" => Self::ChargingEnd,
            "battery_alert" => Self::BatteryAlert,
            "battery_status" => Self::BatteryStatus,
            "battery_health" => Self::BatteryHealth,
            "driver_event" => Self::DriverEvent,
            "driver_status" => Self::DriverStatus,
            "driver_location" => Self::DriverLocation,
            "system_notification" | "notification" => Self::SystemNotification,
            "maintenance_alert" => Self::MaintenanceAlert,
            "fleet_update" => Self::FleetUpdate,
            other => Self::Other(other.to_owned()),
        }
    }

    /// Canonical wire name. Aliases map to their primary name.
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::Ping => "ping",
            Self::Pong => "pong",
            Self::Error => "error",
            Self::VehicleUpdate => "vehicle_update",
            Self::VehicleLocation => "vehicle_location",
            Self::VehicleTelemetry => "vehicle_telemetry",
            Self::ChargingStatus => "charging_status",
            Self::ChargingStart => "charging_start",
            Self::ChargingEnd => "charging_end",
            Self::BatteryAlert => "battery_alert",
            Self::BatteryStatus => "battery_status",
            Self::BatteryHealth => "battery_health",
            Self::DriverEvent => "driver_event",
            Self::DriverStatus => "driver_status",
            Self::DriverLocation => "driver_location",
            Self::SystemNotification => "system_notification",
            Self::MaintenanceAlert => "maintenance_alert",
            Self::FleetUpdate => "fleet_update",
            Self::Other(s) => s,
        }
    }
}

impl fmt::Display for FrameKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Transport close code, surfaced as-is.
///
/// Codes are diagnostic only. None of them changes the reconnect policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CloseCode(pub u16);

impl CloseCode {
    pub const NORMAL: Self = Self(1000);
    pub const GOING_AWAY: Self = Self(1001);
    pub const PROTOCOL_ERROR: Self = Self(1002);
    pub const UNSUPPORTED_DATA: Self = Self(1003);
    pub const NO_STATUS: Self = Self(1005);
    pub const ABNORMAL: Self = Self(1006);
    pub const INVALID_PAYLOAD: Self = Self(1007);
    pub const POLICY_VIOLATION: Self = Self(1008);
    pub const MESSAGE_TOO_BIG: Self = Self(1009);
    pub const INTERNAL_ERROR: Self = Self(1011);
    pub const SERVICE_RESTART: Self = Self(1012);
    pub const TRY_AGAIN_LATER: Self = Self(1013);

    #[must_use]
    pub const fn description(self) -> &'static str {
        match self.0 {
            1000 => "normal closure",
            1001 => "going away",
            1002 => "protocol error",
            1003 => "unsupported data",
            1005 => "no status received",
            1006 => "abnormal closure",
            1007 => "invalid frame payload",
            1008 => "policy violation",
            1009 => "message too big",
            1011 => "internal error",
            1012 => "service restart",
            1013 => "try again later",
            _ => "unknown",
        }
    }
}

impl fmt::Display for CloseCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.0, self.description())
    }
}

impl From<u16> for CloseCode {
    fn from(code: u16) -> Self {
        Self(code)
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn parse_frame_with_payload() {
        let text = r#"{
            "type": "vehicle_telemetry",
            "payload": { "vehicle_id": "v1", "soc": 81.5 },
            "timestamp": "2024-05-01T10:00:00Z"
        }"#;

        let frames = parse_frames(text.as_bytes()).unwrap();
        assert_eq!(frames.len(), 1);

        let frame = &frames[0];
        assert_eq!(frame.frame_type, "vehicle_telemetry");
        assert_eq!(frame.kind(), FrameKind::VehicleTelemetry);
        assert_eq!(frame.payload["vehicle_id"], "v1");
        assert_eq!(frame.timestamp.as_deref(), Some("2024-05-01T10:00:00Z"));
    }

    #[test]
    fn parse_frame_with_data_alias_and_numeric_timestamp() {
        let text = r#"{"type":"charging_status","data":{"station_id":"s9"},"timestamp":1714557600000}"#;

        let frames = parse_frames(text.as_bytes()).unwrap();
        assert_eq!(frames[0].payload, json!({ "station_id": "s9" }));
        assert_eq!(frames[0].timestamp.as_deref(), Some("1714557600000"));
    }

    #[test]
    fn ping_without_payload_defaults_to_null() {
        let frames = parse_frames(br#"{"type":"ping"}"#).unwrap();
        assert_eq!(frames[0].kind(), FrameKind::Ping);
        assert_eq!(frames[0].payload, Value::Null);
    }

    #[test]
    fn parse_frame_array() {
        let text = r#"[{"type":"ping"},{"type":"fleet_update","payload":{}}]"#;
        let frames = parse_frames(text.as_bytes()).unwrap();
        assert_eq!(frames.len(), 2);
        assert_eq!(frames[1].kind(), FrameKind::FleetUpdate);
    }

    #[test]
    fn payload_mismatch_is_decode_error() {
        let frame = Frame::new("vehicle_telemetry", json!({ "soc": "high" }));

        let err = frame.payload_as::<std::collections::HashMap<String, u8>>().unwrap_err();
        assert_eq!(err.kind(), crate::error::Kind::Decode);
        assert!(err.to_string().contains("`vehicle_telemetry`"));
    }

    #[test]
    fn whitespace_is_keepalive() {
        assert!(parse_frames(b"  \n").unwrap().is_empty());
    }

    #[test]
    fn malformed_frames_are_errors() {
        let error = parse_frames(b"not json").unwrap_err();
        assert_eq!(error.kind(), crate::error::Kind::WebSocket);
        assert!(matches!(
            error.downcast_ref::<WsError>(),
            Some(WsError::MessageParse(_))
        ));
        parse_frames(br#"{"payload":{}}"#).unwrap_err();
    }

    #[test]
    fn aliases_share_a_kind() {
        assert_eq!(
            FrameKind::from_type("telemetry_update"),
            FrameKind::VehicleTelemetry
        );
        assert_eq!(
            FrameKind::from_type("notification"),
            FrameKind::SystemNotification
        );
        assert_eq!(FrameKind::SystemNotification.as_str(), "system_notification");
    }

    #[test]
    fn unknown_kind_is_preserved() {
        let kind = FrameKind::from_type("tariff_update");
        assert_eq!(kind, FrameKind::Other("tariff_update".to_owned()));
        assert_eq!(kind.to_string(), "tariff_update");
    }

    #[test]
    fn close_code_display() {
        assert_eq!(CloseCode::POLICY_VIOLATION.to_string(), "1008 policy violation");
        assert_eq!(CloseCode(4000).to_string(), "4000 unknown");
    }
}
