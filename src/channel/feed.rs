use std::fmt;

use super::types::{ChargingUpdate, Notification, VehicleTelemetry};
use crate::Result;
use crate::ws::frame::Frame;
use crate::ws::registry::{ParamsFormat, SubscriptionFormat, TopicFormat};

/// What distinguishes one push feed from another: where it lives, which frame types it owns,
/// how its subscribe frames look and how its payloads decode.
pub trait Feed: 'static {
    /// Typed value exposed as the channel's last message.
    type Message: Clone + fmt::Debug + 'static;
    /// Shape of the subscribe/unsubscribe frames this feed's server expects.
    type Format: SubscriptionFormat + Default + 'static;

    /// Path appended to the WebSocket base URL.
    const PATH: &'static str;
    /// Registry topic every subscription of this feed is recorded under.
    const TOPIC: &'static str;
    /// Frame types routed to this feed, aliases included.
    const FRAME_TYPES: &'static [&'static str];
    /// At most one subscription at a time; a new one replaces the current one.
    const EXCLUSIVE: bool = false;

    fn decode(frame: &Frame) -> Result<Self::Message>;
}

/// Per-vehicle telemetry.
#[non_exhaustive]
#[derive(Debug, Clone, Copy, Default)]
pub struct Telemetry;

impl Feed for Telemetry {
    type Message = VehicleTelemetry;
    type Format = ParamsFormat;

    const PATH: &'static str = "/api/v1/ws/telematics";
    const TOPIC: &'static str = "vehicle_telemetry";
    const FRAME_TYPES: &'static [&'static str] = &["vehicle_telemetry", "telemetry_update"];
    const EXCLUSIVE: bool = true;

    fn decode(frame: &Frame) -> Result<Self::Message> {
        frame.payload_as()
    }
}

/// Charging-station status and session start/end.
#[non_exhaustive]
#[derive(Debug, Clone, Copy, Default)]
pub struct ChargingStations;

impl Feed for ChargingStations {
    type Message = ChargingUpdate;
    type Format = ParamsFormat;

    const PATH: &'static str = "/api/v1/ws/charging-stations";
    const TOPIC: &'static str = "charging_status";
    const FRAME_TYPES: &'static [&'static str] =
        &["charging_status", "charging_start", "charging_end"];

    fn decode(frame: &Frame) -> Result<Self::Message> {
        ChargingUpdate::from_frame(frame)
    }
}

/// System notifications, maintenance and battery alerts.
#[non_exhaustive]
#[derive(Debug, Clone, Copy, Default)]
pub struct Notifications;

impl Feed for Notifications {
    type Message = Notification;
    type Format = TopicFormat;

    const PATH: &'static str = "/api/v1/ws/notifications";
    const TOPIC: &'static str = "notifications";
    const FRAME_TYPES: &'static [&'static str] = &[
        "system_notification",
        "notification",
        "maintenance_alert",
        "battery_alert",
    ];

    fn decode(frame: &Frame) -> Result<Self::Message> {
        Notification::from_frame(frame)
    }
}
