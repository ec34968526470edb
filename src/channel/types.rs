//! Typed payloads of the frames each feed owns.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_with::{PickFirst, TimestampMilliSeconds, serde_as};

use crate::Result;
use crate::error::Error;
use crate::ws::frame::{Frame, FrameKind};

/// Point-in-time telemetry for one vehicle.
///
/// Timestamps are accepted as RFC 3339 strings or epoch milliseconds.
#[serde_as]
#[non_exhaustive]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VehicleTelemetry {
    #[serde(alias = "vehicleId")]
    pub vehicle_id: String,
    /// State of charge, percent of usable capacity
    #[serde(default, alias = "state_of_charge")]
    pub soc: Option<Decimal>,
    #[serde(default)]
    pub speed_kph: Option<Decimal>,
    #[serde(default)]
    pub battery_temperature_c: Option<Decimal>,
    #[serde(default)]
    pub range_km: Option<Decimal>,
    #[serde(default)]
    pub odometer_km: Option<Decimal>,
    #[serde(default)]
    pub location: Option<Location>,
    #[serde(default)]
    #[serde_as(as = "Option<PickFirst<(_, TimestampMilliSeconds<i64>)>>")]
    pub timestamp: Option<DateTime<Utc>>,
}

#[non_exhaustive]
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Location {
    #[serde(alias = "lat")]
    pub latitude: f64,
    #[serde(alias = "lng", alias = "lon")]
    pub longitude: f64,
}

/// Which charging frame produced a [`ChargingUpdate`].
#[non_exhaustive]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, strum_macros::Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ChargingEvent {
    Status,
    SessionStarted,
    SessionEnded,
}

#[non_exhaustive]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, strum_macros::Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum StationStatus {
    Available,
    Charging,
    Occupied,
    Reserved,
    Faulted,
    Offline,
    Unavailable,
    #[serde(other)]
    Unknown,
}

#[serde_as]
#[non_exhaustive]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChargingStationStatus {
    #[serde(alias = "stationId")]
    pub station_id: String,
    #[serde(default)]
    pub connector_id: Option<String>,
    #[serde(default)]
    pub status: Option<StationStatus>,
    #[serde(default)]
    pub vehicle_id: Option<String>,
    #[serde(default)]
    pub session_id: Option<String>,
    #[serde(default)]
    pub power_kw: Option<Decimal>,
    #[serde(default)]
    pub energy_delivered_kwh: Option<Decimal>,
    #[serde(default)]
    #[serde_as(as = "Option<PickFirst<(_, TimestampMilliSeconds<i64>)>>")]
    pub timestamp: Option<DateTime<Utc>>,
}

/// A charging-station frame together with the event that produced it.
#[non_exhaustive]
#[derive(Debug, Clone, PartialEq)]
pub struct ChargingUpdate {
    pub event: ChargingEvent,
    pub station: ChargingStationStatus,
}

impl ChargingUpdate {
    pub(crate) fn from_frame(frame: &Frame) -> Result<Self> {
        let event = match frame.kind() {
            FrameKind::ChargingStatus => ChargingEvent::Status,
            FrameKind::ChargingStart => ChargingEvent::SessionStarted,
            FrameKind::ChargingEnd => ChargingEvent::SessionEnded,
            other => {
                return Err(Error::decode(other.as_str(), "not a charging frame"));
            }
        };

        Ok(Self {
            event,
            station: frame.payload_as()?,
        })
    }
}

#[non_exhaustive]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    #[default]
    Info,
    Warning,
    Error,
    Critical,
}

#[non_exhaustive]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, strum_macros::Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum NotificationCategory {
    System,
    Maintenance,
    Battery,
}

#[serde_as]
#[derive(Deserialize)]
struct NotificationPayload {
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    title: Option<String>,
    message: String,
    #[serde(default)]
    severity: Severity,
    #[serde(default, alias = "vehicleId")]
    vehicle_id: Option<String>,
    #[serde(default)]
    #[serde_as(as = "Option<PickFirst<(_, TimestampMilliSeconds<i64>)>>")]
    timestamp: Option<DateTime<Utc>>,
}

/// Operator-facing notification: system messages, maintenance and battery alerts.
#[non_exhaustive]
#[derive(Debug, Clone, PartialEq)]
pub struct Notification {
    pub category: NotificationCategory,
    pub id: Option<String>,
    pub title: Option<String>,
    pub message: String,
    pub severity: Severity,
    pub vehicle_id: Option<String>,
    pub timestamp: Option<DateTime<Utc>>,
}

impl Notification {
    pub(crate) fn from_frame(frame: &Frame) -> Result<Self> {
        let category = match frame.kind() {
            FrameKind::SystemNotification => NotificationCategory::System,
            FrameKind::MaintenanceAlert => NotificationCategory::Maintenance,
            FrameKind::BatteryAlert => NotificationCategory::Battery,
            other => {
                return Err(Error::decode(other.as_str(), "not a notification frame"));
            }
        };
        let payload: NotificationPayload = frame.payload_as()?;

        Ok(Self {
            category,
            id: payload.id,
            title: payload.title,
            message: payload.message,
            severity: payload.severity,
            vehicle_id: payload.vehicle_id,
            timestamp: payload.timestamp,
        })
    }
}
