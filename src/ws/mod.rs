//! Core WebSocket infrastructure.
//!
//! A transport-agnostic connection core that feed-specific channels are built on.
//!
//! # Architecture
//!
//! - [`ConnectionManager`]: socket lifecycle, capped exponential reconnect, optional heartbeat
//! - [`SubscriptionRegistry`]: what should be subscribed, replayed after every open
//! - [`MessageRouter`]: dispatch of inbound frames by their `type` discriminator
//! - [`Transport`] / [`Timer`]: the I/O seams, with live tokio implementations in [`runtime`]
//!
//! # Example
//!
//! ```rust, no_run
//! use fleet_realtime::ws::{ConnectionManager, Incoming, runtime};
//! use fleet_realtime::ws::config::Config;
//! use fleet_realtime::ws::endpoint::Endpoint;
//! use secrecy::SecretString;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let token = SecretString::from("token".to_owned());
//!     let endpoint = Endpoint::new("ws://localhost:8000", "/api/v1/ws/notifications", token)?;
//!
//!     let (transport, timer, mut events) = runtime::live();
//!     let mut connection = ConnectionManager::new(Config::default(), transport, timer);
//!     connection.connect(endpoint);
//!
//!     while let Some(event) = events.recv().await {
//!         if let Incoming::Frames(frames) = connection.handle(event) {
//!             for frame in frames {
//!                 println!("{}: {}", frame.frame_type, frame.payload);
//!             }
//!         }
//!     }
//!
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod connection;
pub mod endpoint;
pub mod error;
pub mod event;
pub mod frame;
pub mod registry;
pub mod router;
pub mod runtime;
pub mod traits;

pub use connection::{ConnectionManager, ConnectionState, Incoming};
#[expect(
    clippy::module_name_repetitions,
    reason = "WsError includes module name for clarity when used outside this module"
)]
pub use error::WsError;
pub use event::{Event, SocketId, TimerId, TransportEvent};
pub use frame::{CloseCode, Frame, FrameKind};
pub use registry::{Subscription, SubscriptionRegistry};
pub use router::{Dispatch, HandlerId, MessageRouter};
pub use traits::*;
