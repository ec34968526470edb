//! Typed, feed-specific facades over the connection core.
//!
//! Each feed has its own endpoint and its own connection:
//!
//! - [`Telemetry`]: one watched vehicle at a time
//! - [`ChargingStations`]: status plus session start/end per station
//! - [`Notifications`]: system notifications and operator alerts

pub mod client;
pub mod feed;
pub mod types;

pub use client::Channel;
pub use feed::{ChargingStations, Feed, Notifications, Telemetry};
pub use types::{
    ChargingEvent, ChargingStationStatus, ChargingUpdate, Location, Notification,
    NotificationCategory, Severity, StationStatus, VehicleTelemetry,
};
