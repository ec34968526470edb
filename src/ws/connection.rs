#![expect(
    clippy::module_name_repetitions,
    reason = "Connection types expose their domain in the name for clarity"
)]

use backoff::ExponentialBackoff;
use backoff::backoff::Backoff as _;
use serde::Serialize;
use serde_json::{Value, json};
use tokio::sync::watch;

use super::config::Config;
use super::endpoint::Endpoint;
use super::error::WsError;
use super::event::{Event, SocketId, TimerId, TransportEvent};
use super::frame::{CloseCode, Frame, PING, parse_frames};
use super::traits::{FrameSink, Timer, Transport};
use crate::Result;

/// Connection state tracking.
#[non_exhaustive]
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum_macros::Display)]
#[strum(serialize_all = "lowercase")]
pub enum ConnectionState {
    /// Socket requested, not yet open
    Connecting,
    /// Socket open, frames flow both ways
    Open,
    /// No socket. Either waiting for a scheduled reconnect, exhausted, or disconnected
    Closed,
    /// The transport reported a failure; a close normally follows
    Error,
}

impl ConnectionState {
    #[must_use]
    pub const fn is_open(self) -> bool {
        matches!(self, Self::Open)
    }
}

/// What the owner of a [`ConnectionManager`] has to act on after an event.
#[non_exhaustive]
#[derive(Debug, Clone, PartialEq)]
pub enum Incoming {
    /// A new socket opened. Subscriptions must be replayed now.
    Opened,
    /// Frames parsed from one inbound message, in delivery order.
    Frames(Vec<Frame>),
    Nothing,
}

/// Owns one socket's lifecycle: opening with credentials, relaying inbound frames, detecting
/// closure and driving reconnect attempts.
///
/// The manager is a plain state machine. It is advanced by [`ConnectionManager::handle`] with
/// events produced by its [`Transport`] and [`Timer`], so at most one event is in flight and no
/// call ever blocks.
///
/// Invariants:
/// - at most one live socket; opening a new one always closes the previous one first
/// - at most one pending reconnect timer
/// - `attempt_count` only resets on a successful open or an explicit [`reconnect`](Self::reconnect)
pub struct ConnectionManager<T: Transport, S: Timer> {
    transport: T,
    timer: S,
    config: Config,
    backoff: ExponentialBackoff,
    endpoint: Option<Endpoint>,
    socket: Option<SocketId>,
    reconnect_timer: Option<TimerId>,
    ping_timer: Option<TimerId>,
    attempt_count: u32,
    /// Cleared by `disconnect`, set again by `connect`/`reconnect`
    auto_reconnect: bool,
    last_close: Option<CloseCode>,
    state_tx: watch::Sender<ConnectionState>,
    last_frame_tx: watch::Sender<Option<Frame>>,
}

impl<T: Transport, S: Timer> ConnectionManager<T, S> {
    /// Create an idle manager. Nothing is opened until [`connect`](Self::connect).
    #[must_use]
    pub fn new(config: Config, transport: T, timer: S) -> Self {
        let backoff = config.reconnect.clone().into();
        let (state_tx, _) = watch::channel(ConnectionState::Closed);
        let (last_frame_tx, _) = watch::channel(None);

        Self {
            transport,
            timer,
            config,
            backoff,
            endpoint: None,
            socket: None,
            reconnect_timer: None,
            ping_timer: None,
            attempt_count: 0,
            auto_reconnect: false,
            last_close: None,
            state_tx,
            last_frame_tx,
        }
    }

    /// Open a socket to `endpoint`, closing any existing or pending one first.
    ///
    /// Re-arms automatic reconnection. Does not reset the attempt counter; use
    /// [`reconnect`](Self::reconnect) for a fresh episode.
    pub fn connect(&mut self, endpoint: Endpoint) {
        self.endpoint = Some(endpoint);
        self.auto_reconnect = true;
        self.open_socket();
    }

    /// Caller-initiated retry: reset the attempt counter and connect again immediately.
    pub fn reconnect(&mut self) -> Result<()> {
        if self.endpoint.is_none() {
            return Err(WsError::MissingEndpoint.into());
        }

        self.attempt_count = 0;
        self.backoff.reset();
        self.auto_reconnect = true;
        self.open_socket();
        Ok(())
    }

    /// Cancel pending timers, close the socket and stop reconnecting until the next
    /// `connect`/`reconnect`. Calling it again has no further effect.
    pub fn disconnect(&mut self) {
        self.auto_reconnect = false;
        self.cancel_timers();

        if let Some(socket) = self.socket.take() {
            #[cfg(feature = "tracing")]
            tracing::debug!(?socket, "Closing WebSocket on request");
            self.transport.close(socket);
        }

        self.set_state(ConnectionState::Closed);
    }

    /// Transmit `frame` if the connection is open.
    ///
    /// Returns `false` when the frame was dropped. Nothing is queued.
    pub fn send<R: Serialize + ?Sized>(&mut self, frame: &R) -> bool {
        let socket = match self.socket {
            Some(socket) if self.state().is_open() => socket,
            _ => {
                #[cfg(feature = "tracing")]
                tracing::debug!(state = %self.state(), "Dropping outbound frame: {}", WsError::NotConnected);
                return false;
            }
        };

        match serde_json::to_string(frame) {
            Ok(text) => self.transport.send(socket, text),
            Err(e) => {
                #[cfg(feature = "tracing")]
                tracing::warn!(error = %e, "Failed to serialize outbound frame");
                #[cfg(not(feature = "tracing"))]
                let _ = &e;
                false
            }
        }
    }

    /// Advance the state machine by one event.
    pub fn handle(&mut self, event: Event) -> Incoming {
        match event {
            Event::Transport(event) => self.handle_transport(event),
            Event::Timer(id) => {
                self.handle_timer(id);
                Incoming::Nothing
            }
        }
    }

    fn handle_transport(&mut self, event: TransportEvent) -> Incoming {
        if self.socket != Some(event.socket()) {
            #[cfg(feature = "tracing")]
            tracing::trace!(socket = ?event.socket(), "Ignoring event from stale socket");
            return Incoming::Nothing;
        }

        match event {
            TransportEvent::Opened { .. } => {
                self.attempt_count = 0;
                self.backoff.reset();
                self.last_close = None;
                self.set_state(ConnectionState::Open);
                self.schedule_ping();

                #[cfg(feature = "tracing")]
                if let Some(endpoint) = &self.endpoint {
                    tracing::info!(%endpoint, "WebSocket connected");
                }

                Incoming::Opened
            }
            TransportEvent::Message { text, .. } => match parse_frames(text.as_bytes()) {
                Ok(frames) => {
                    if let Some(last) = frames.last() {
                        self.last_frame_tx.send_replace(Some(last.clone()));
                    }
                    Incoming::Frames(frames)
                }
                Err(e) => {
                    #[cfg(feature = "tracing")]
                    tracing::warn!(%text, error = %e, "Failed to parse WebSocket message");
                    #[cfg(not(feature = "tracing"))]
                    let _ = (&text, &e);
                    Incoming::Nothing
                }
            },
            TransportEvent::Error { message, .. } => {
                #[cfg(feature = "tracing")]
                tracing::warn!(%message, "WebSocket transport error");
                #[cfg(not(feature = "tracing"))]
                let _ = &message;
                self.set_state(ConnectionState::Error);
                Incoming::Nothing
            }
            TransportEvent::Closed { code, reason, .. } => {
                #[cfg(feature = "tracing")]
                tracing::info!(%reason, "{}", WsError::ConnectionClosed { code });
                #[cfg(not(feature = "tracing"))]
                let _ = &reason;

                self.socket = None;
                self.last_close = code;
                if let Some(ping) = self.ping_timer.take() {
                    self.timer.cancel(ping);
                }
                self.schedule_reconnect();
                Incoming::Nothing
            }
        }
    }

    fn handle_timer(&mut self, id: TimerId) {
        if self.reconnect_timer == Some(id) {
            self.reconnect_timer = None;
            #[cfg(feature = "tracing")]
            tracing::debug!(attempt = self.attempt_count, "Reconnecting");
            self.open_socket();
        } else if self.ping_timer == Some(id) {
            self.ping_timer = None;
            if self.send(&json!({ "type": PING })) {
                self.schedule_ping();
            }
        } else {
            #[cfg(feature = "tracing")]
            tracing::trace!(?id, "Ignoring cancelled timer");
        }
    }

    fn open_socket(&mut self) {
        self.cancel_timers();

        if let Some(previous) = self.socket.take() {
            self.transport.close(previous);
        }

        let Some(url) = self.endpoint.as_ref().map(Endpoint::url) else {
            return;
        };

        self.set_state(ConnectionState::Connecting);
        self.socket = Some(self.transport.open(&url));
    }

    fn schedule_reconnect(&mut self) {
        let policy = &self.config.reconnect;

        if !self.auto_reconnect || !policy.enabled {
            self.set_state(ConnectionState::Closed);
            return;
        }

        if self.attempt_count >= policy.max_attempts {
            #[cfg(feature = "tracing")]
            tracing::warn!(
                "{}",
                WsError::ReconnectExhausted {
                    attempts: self.attempt_count
                }
            );
            self.set_state(ConnectionState::Closed);
            return;
        }

        let delay = self.backoff.next_backoff().unwrap_or(policy.max_backoff);

        if let Some(previous) = self.reconnect_timer.take() {
            self.timer.cancel(previous);
        }
        self.reconnect_timer = Some(self.timer.schedule(delay));
        self.attempt_count = self.attempt_count.saturating_add(1);

        #[cfg(feature = "tracing")]
        tracing::debug!(attempt = self.attempt_count, ?delay, "Scheduled reconnect");

        if self.state() != ConnectionState::Error {
            self.set_state(ConnectionState::Closed);
        }
    }

    fn schedule_ping(&mut self) {
        if let Some(interval) = self.config.ping_interval {
            if let Some(previous) = self.ping_timer.take() {
                self.timer.cancel(previous);
            }
            self.ping_timer = Some(self.timer.schedule(interval));
        }
    }

    fn cancel_timers(&mut self) {
        if let Some(id) = self.reconnect_timer.take() {
            self.timer.cancel(id);
        }
        if let Some(id) = self.ping_timer.take() {
            self.timer.cancel(id);
        }
    }

    fn set_state(&self, state: ConnectionState) {
        self.state_tx.send_if_modified(|current| {
            if *current == state {
                false
            } else {
                *current = state;
                true
            }
        });
    }

    /// Get the current connection state.
    #[must_use]
    pub fn state(&self) -> ConnectionState {
        *self.state_tx.borrow()
    }

    /// Subscribe to connection state changes.
    #[must_use]
    pub fn state_receiver(&self) -> watch::Receiver<ConnectionState> {
        self.state_tx.subscribe()
    }

    /// Most recent parsed inbound frame of any type.
    #[must_use]
    pub fn last_frame(&self) -> Option<Frame> {
        self.last_frame_tx.borrow().clone()
    }

    #[must_use]
    pub fn last_frame_receiver(&self) -> watch::Receiver<Option<Frame>> {
        self.last_frame_tx.subscribe()
    }

    /// Reconnects scheduled in the current disconnect episode.
    #[must_use]
    pub const fn attempt_count(&self) -> u32 {
        self.attempt_count
    }

    /// Close code of the most recent closure, cleared on open.
    #[must_use]
    pub const fn last_close_code(&self) -> Option<CloseCode> {
        self.last_close
    }

    #[must_use]
    pub const fn reconnect_pending(&self) -> bool {
        self.reconnect_timer.is_some()
    }

    #[must_use]
    pub const fn endpoint(&self) -> Option<&Endpoint> {
        self.endpoint.as_ref()
    }

    #[must_use]
    pub const fn transport(&self) -> &T {
        &self.transport
    }

    #[must_use]
    pub const fn timer(&self) -> &S {
        &self.timer
    }
}

impl<T: Transport, S: Timer> FrameSink for ConnectionManager<T, S> {
    fn is_open(&self) -> bool {
        self.state().is_open()
    }

    fn send_frame(&mut self, frame: &Value) -> bool {
        self.send(frame)
    }
}

impl<T: Transport, S: Timer> Drop for ConnectionManager<T, S> {
    fn drop(&mut self) {
        self.disconnect();
    }
}
