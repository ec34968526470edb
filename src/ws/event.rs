//! Events fed into the connection core.
//!
//! Every socket outcome and every timer firing reaches the core as an [`Event`], and events are
//! processed strictly one at a time in delivery order.

use super::frame::CloseCode;

/// Identifies one socket opened by a [`Transport`](super::Transport).
///
/// Events carrying an id other than the manager's current socket are stale and ignored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SocketId(pub u64);

/// Identifies one scheduled [`Timer`](super::Timer) callback.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TimerId(pub u64);

/// Outcome reported by a transport for a given socket.
#[non_exhaustive]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
    Opened {
        socket: SocketId,
    },
    Message {
        socket: SocketId,
        text: String,
    },
    /// Socket-level failure. Usually followed by `Closed`.
    Error {
        socket: SocketId,
        message: String,
    },
    Closed {
        socket: SocketId,
        code: Option<CloseCode>,
        reason: String,
    },
}

impl TransportEvent {
    #[must_use]
    pub const fn socket(&self) -> SocketId {
        match self {
            Self::Opened { socket }
            | Self::Message { socket, .. }
            | Self::Error { socket, .. }
            | Self::Closed { socket, .. } => *socket,
        }
    }
}

#[non_exhaustive]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    Transport(TransportEvent),
    Timer(TimerId),
}

impl From<TransportEvent> for Event {
    fn from(event: TransportEvent) -> Self {
        Self::Transport(event)
    }
}
