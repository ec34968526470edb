//! Watch one vehicle's telemetry and all fleet notifications side by side.
//!
//! Each feed has its own connection, so the two channels are driven from one `select!` loop.
//!
//! Run with tracing enabled:
//! ```sh
//! FLEET_API_WS_URL=wss://fleet.example.com FLEET_API_TOKEN=... \
//!     RUST_LOG=info cargo run --example fleet_monitor --features tracing -- veh-0042
//! ```

use std::time::Duration;

use fleet_realtime::channel::{Channel, Feed as _, Notifications, Telemetry};
use fleet_realtime::ws::config::{Config, DEFAULT_PING_INTERVAL};
use fleet_realtime::ws::endpoint::Endpoint;
use secrecy::SecretString;
use tracing::{info, warn};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();

    let vehicle_id = std::env::args().nth(1).unwrap_or_else(|| "veh-0001".to_owned());
    let token = SecretString::from(std::env::var("FLEET_API_TOKEN")?);

    let config = Config::builder().ping_interval(DEFAULT_PING_INTERVAL).build();

    let endpoint = Endpoint::resolve(None, Telemetry::PATH, token.clone())?;
    let (mut telemetry, mut telemetry_events) =
        Channel::<Telemetry, _, _>::open_live(endpoint, config.clone());
    telemetry.watch_vehicle(vehicle_id.as_str());

    let endpoint = Endpoint::resolve(None, Notifications::PATH, token)?;
    let (mut notifications, mut notification_events) =
        Channel::<Notifications, _, _>::open_live(endpoint, config);
    notifications.subscribe_category("battery");
    notifications.subscribe_category("maintenance");

    let mut telemetry_updates = telemetry.last_message_receiver();
    let mut alerts = notifications.last_message_receiver();
    let mut telemetry_state = telemetry.state_receiver();

    let deadline = tokio::time::sleep(Duration::from_secs(300));
    tokio::pin!(deadline);

    loop {
        tokio::select! {
            Some(event) = telemetry_events.recv() => telemetry.handle(event),
            Some(event) = notification_events.recv() => notifications.handle(event),
            () = &mut deadline => break,
        }

        if telemetry_state.has_changed()? {
            info!(feed = "telemetry", state = %*telemetry_state.borrow_and_update());
        }
        if telemetry_updates.has_changed()? {
            if let Some(update) = telemetry_updates.borrow_and_update().as_ref() {
                info!(
                    vehicle = %update.vehicle_id,
                    soc = ?update.soc,
                    speed_kph = ?update.speed_kph,
                    "Telemetry"
                );
            }
        }
        if alerts.has_changed()? {
            if let Some(alert) = alerts.borrow_and_update().as_ref() {
                warn!(
                    category = %alert.category,
                    severity = ?alert.severity,
                    vehicle = ?alert.vehicle_id,
                    "{}",
                    alert.message
                );
            }
        }
    }

    telemetry.dispose();
    notifications.dispose();

    Ok(())
}
