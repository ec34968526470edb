//! Seams between the connection core and the outside world.
//!
//! The core never performs I/O or sleeps itself. A [`Transport`] opens sockets and reports their
//! outcome later as [`TransportEvent`](super::TransportEvent)s, and a [`Timer`] schedules
//! callbacks that come back as [`Event::Timer`](super::Event::Timer). The live implementations
//! live in [`runtime`](super::runtime); tests substitute recording fakes.

use std::time::Duration;

use serde_json::Value;
use url::Url;

use super::event::{SocketId, TimerId};

/// Socket factory and writer.
pub trait Transport {
    /// Begin opening a socket to `url`. The result arrives later as an `Opened` or `Closed`
    /// event tagged with the returned id.
    fn open(&mut self, url: &Url) -> SocketId;

    /// Write one text frame. Returns `false` if the socket is gone.
    fn send(&mut self, socket: SocketId, text: String) -> bool;

    /// Close the socket. Must be safe to call for a socket that already closed.
    fn close(&mut self, socket: SocketId);
}

/// One-shot timer service.
pub trait Timer {
    fn schedule(&mut self, delay: Duration) -> TimerId;

    /// Cancel a timer. A cancelled timer never fires; cancelling twice is a no-op.
    fn cancel(&mut self, id: TimerId);
}

/// Anything that outbound frames can be written to.
///
/// Implemented by [`ConnectionManager`](super::ConnectionManager); lets the registry and router
/// send without knowing about transports or timers.
pub trait FrameSink {
    fn is_open(&self) -> bool;

    /// Serialize and transmit `frame`. Returns whether it was actually sent.
    fn send_frame(&mut self, frame: &Value) -> bool;
}
