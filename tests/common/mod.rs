#![allow(
    clippy::unwrap_used,
    clippy::missing_panics_doc,
    reason = "Do not need additional syntax for setting up tests"
)]
#![allow(
    unused,
    reason = "Each integration test binary uses a different subset of these helpers"
)]

use std::cell::RefCell;
use std::rc::Rc;
use std::time::Duration;

use fleet_realtime::ws::config::{Config, ReconnectConfig};
use fleet_realtime::ws::endpoint::Endpoint;
use fleet_realtime::ws::{CloseCode, Event, SocketId, Timer, TimerId, Transport, TransportEvent};
use secrecy::SecretString;
use serde_json::Value;
use url::Url;

pub const BASE: &str = "ws://fleet.test";
pub const TOKEN: &str = "secret-token";

#[must_use]
pub fn endpoint(path: &str) -> Endpoint {
    Endpoint::new(BASE, path, SecretString::from(TOKEN.to_owned())).unwrap()
}

/// Two attempts, 10ms apart.
#[must_use]
pub fn short_retries() -> Config {
    Config::builder()
        .reconnect(ReconnectConfig::fixed(Duration::from_millis(10), 2))
        .build()
}

#[derive(Debug, Default)]
pub struct TransportLog {
    next_id: u64,
    pub opened: Vec<(SocketId, Url)>,
    pub sent: Vec<(SocketId, String)>,
    pub closed: Vec<SocketId>,
}

/// Transport that never touches the network. Every call is recorded; the test plays the
/// server by feeding [`TransportEvent`]s back into the code under test.
#[derive(Debug, Clone, Default)]
pub struct RecordingTransport {
    log: Rc<RefCell<TransportLog>>,
}

impl RecordingTransport {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn last_socket(&self) -> SocketId {
        self.log.borrow().opened.last().unwrap().0
    }

    #[must_use]
    pub fn open_count(&self) -> usize {
        self.log.borrow().opened.len()
    }

    #[must_use]
    pub fn opened_urls(&self) -> Vec<Url> {
        self.log.borrow().opened.iter().map(|(_, url)| url.clone()).collect()
    }

    #[must_use]
    pub fn sent(&self) -> Vec<Value> {
        self.log
            .borrow()
            .sent
            .iter()
            .map(|(_, text)| serde_json::from_str(text).unwrap())
            .collect()
    }

    #[must_use]
    pub fn closed(&self) -> Vec<SocketId> {
        self.log.borrow().closed.clone()
    }

    pub fn clear_sent(&self) {
        self.log.borrow_mut().sent.clear();
    }
}

impl Transport for RecordingTransport {
    fn open(&mut self, url: &Url) -> SocketId {
        let mut log = self.log.borrow_mut();
        let id = SocketId(log.next_id);
        log.next_id += 1;
        log.opened.push((id, url.clone()));
        id
    }

    fn send(&mut self, socket: SocketId, text: String) -> bool {
        let mut log = self.log.borrow_mut();
        if log.closed.contains(&socket) {
            return false;
        }
        log.sent.push((socket, text));
        true
    }

    fn close(&mut self, socket: SocketId) {
        self.log.borrow_mut().closed.push(socket);
    }
}

#[derive(Debug, Default)]
pub struct TimerLog {
    next_id: u64,
    pub scheduled: Vec<(TimerId, Duration)>,
    pub cancelled: Vec<TimerId>,
    pub fired: Vec<TimerId>,
}

/// Timer whose callbacks only fire when the test says so.
#[derive(Debug, Clone, Default)]
pub struct ManualTimer {
    log: Rc<RefCell<TimerLog>>,
}

impl ManualTimer {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Every delay ever scheduled, in order.
    #[must_use]
    pub fn delays(&self) -> Vec<Duration> {
        self.log.borrow().scheduled.iter().map(|(_, d)| *d).collect()
    }

    #[must_use]
    pub fn scheduled_count(&self) -> usize {
        self.log.borrow().scheduled.len()
    }

    #[must_use]
    pub fn cancelled(&self) -> Vec<TimerId> {
        self.log.borrow().cancelled.clone()
    }

    /// Scheduled and neither fired nor cancelled.
    #[must_use]
    pub fn pending(&self) -> Vec<TimerId> {
        let log = self.log.borrow();
        log.scheduled
            .iter()
            .map(|(id, _)| *id)
            .filter(|id| !log.cancelled.contains(id) && !log.fired.contains(id))
            .collect()
    }

    /// Event for the most recently scheduled timer. Marks it as fired.
    #[must_use]
    pub fn fire_last(&self) -> Event {
        let mut log = self.log.borrow_mut();
        let id = log.scheduled.last().unwrap().0;
        log.fired.push(id);
        Event::Timer(id)
    }
}

impl Timer for ManualTimer {
    fn schedule(&mut self, delay: Duration) -> TimerId {
        let mut log = self.log.borrow_mut();
        let id = TimerId(log.next_id);
        log.next_id += 1;
        log.scheduled.push((id, delay));
        id
    }

    fn cancel(&mut self, id: TimerId) {
        let mut log = self.log.borrow_mut();
        if !log.cancelled.contains(&id) {
            log.cancelled.push(id);
        }
    }
}

#[must_use]
pub fn opened(socket: SocketId) -> Event {
    TransportEvent::Opened { socket }.into()
}

#[must_use]
pub fn message(socket: SocketId, text: &str) -> Event {
    TransportEvent::Message {
        socket,
        text: text.to_owned(),
    }
    .into()
}

#[must_use]
pub fn failed(socket: SocketId) -> Event {
    TransportEvent::Error {
        socket,
        message: "connection reset".to_owned(),
    }
    .into()
}

#[must_use]
pub fn closed(socket: SocketId, code: CloseCode) -> Event {
    TransportEvent::Closed {
        socket,
        code: Some(code),
        reason: String::new(),
    }
    .into()
}
