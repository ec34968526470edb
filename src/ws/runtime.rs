//! Live [`Transport`] and [`Timer`] backed by tokio and tokio-tungstenite.
//!
//! Socket I/O and sleeps run in spawned tasks; their outcomes are funneled into a single
//! [`Events`] queue that the owner drains and feeds to the connection core one event at a time.
//!
//! ```rust, no_run
//! use fleet_realtime::channel::{Channel, Feed as _, Telemetry};
//! use fleet_realtime::ws::config::Config;
//! use fleet_realtime::ws::endpoint::Endpoint;
//! use secrecy::SecretString;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let token = SecretString::from("token".to_owned());
//!     let endpoint = Endpoint::new("wss://fleet.example.com", Telemetry::PATH, token)?;
//!     let (mut channel, mut events) = Channel::<Telemetry, _, _>::open_live(endpoint, Config::default());
//!
//!     channel.watch_vehicle("v1");
//!     while let Some(event) = events.recv().await {
//!         channel.handle(event);
//!         if let Some(telemetry) = channel.last_message() {
//!             println!("{telemetry:?}");
//!         }
//!     }
//!
//!     channel.dispose();
//!     Ok(())
//! }
//! ```

use std::collections::HashMap;
use std::time::Duration;

use futures::{SinkExt as _, StreamExt as _};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::sleep;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;
use url::Url;

use super::event::{Event, SocketId, TimerId, TransportEvent};
use super::frame::CloseCode;
use super::traits::{Timer, Transport};

/// Create a connected transport/timer pair and the queue they report into.
///
/// Must be called from within a tokio runtime.
#[must_use]
pub fn live() -> (TungsteniteTransport, TokioTimer, Events) {
    let (events_tx, events_rx) = mpsc::unbounded_channel();

    (
        TungsteniteTransport::new(events_tx.clone()),
        TokioTimer::new(events_tx),
        Events { rx: events_rx },
    )
}

/// Queue of transport and timer events, in delivery order.
pub struct Events {
    rx: mpsc::UnboundedReceiver<Event>,
}

impl Events {
    /// Wait for the next event. `None` once the transport and timer are both dropped.
    pub async fn recv(&mut self) -> Option<Event> {
        self.rx.recv().await
    }

    /// Take an already queued event without waiting.
    pub fn try_recv(&mut self) -> Option<Event> {
        self.rx.try_recv().ok()
    }
}

enum Outbound {
    Text(String),
    Close,
}

struct SocketTask {
    outbound: mpsc::UnboundedSender<Outbound>,
    task: JoinHandle<()>,
}

/// One spawned task per socket. Outbound frames travel over an unbounded channel to the task.
pub struct TungsteniteTransport {
    events: mpsc::UnboundedSender<Event>,
    next_id: u64,
    sockets: HashMap<SocketId, SocketTask>,
}

impl TungsteniteTransport {
    #[must_use]
    pub fn new(events: mpsc::UnboundedSender<Event>) -> Self {
        Self {
            events,
            next_id: 0,
            sockets: HashMap::new(),
        }
    }
}

impl Transport for TungsteniteTransport {
    fn open(&mut self, url: &Url) -> SocketId {
        self.sockets.retain(|_, socket| !socket.task.is_finished());

        let id = SocketId(self.next_id);
        self.next_id += 1;

        let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();
        let task = tokio::spawn(run_socket(
            id,
            url.clone(),
            outbound_rx,
            self.events.clone(),
        ));

        self.sockets.insert(
            id,
            SocketTask {
                outbound: outbound_tx,
                task,
            },
        );
        id
    }

    fn send(&mut self, socket: SocketId, text: String) -> bool {
        self.sockets
            .get(&socket)
            .is_some_and(|s| s.outbound.send(Outbound::Text(text)).is_ok())
    }

    fn close(&mut self, socket: SocketId) {
        if let Some(s) = self.sockets.remove(&socket)
            && s.outbound.send(Outbound::Close).is_err()
        {
            s.task.abort();
        }
    }
}

impl Drop for TungsteniteTransport {
    fn drop(&mut self) {
        for (_, socket) in self.sockets.drain() {
            socket.task.abort();
        }
    }
}

async fn run_socket(
    socket: SocketId,
    url: Url,
    mut outbound: mpsc::UnboundedReceiver<Outbound>,
    events: mpsc::UnboundedSender<Event>,
) {
    let emit = |event: TransportEvent| {
        _ = events.send(Event::Transport(event));
    };
    let fail = |message: String| {
        emit(TransportEvent::Error {
            socket,
            message: message.clone(),
        });
        emit(TransportEvent::Closed {
            socket,
            code: Some(CloseCode::ABNORMAL),
            reason: message,
        });
    };

    // Closing while the handshake is still running abandons it.
    let connected = tokio::select! {
        result = connect_async(url.as_str()) => result,
        _ = outbound.recv() => return,
    };

    let ws_stream = match connected {
        Ok((ws_stream, _)) => ws_stream,
        Err(e) => {
            fail(crate::error::Error::from(e).to_string());
            return;
        }
    };

    emit(TransportEvent::Opened { socket });

    let (mut write, mut read) = ws_stream.split();

    loop {
        tokio::select! {
            msg = read.next() => {
                match msg {
                    Some(Ok(Message::Text(text))) => {
                        emit(TransportEvent::Message {
                            socket,
                            text: text.as_str().to_owned(),
                        });
                    }
                    Some(Ok(Message::Close(frame))) => {
                        let (code, reason) = frame.map_or((None, String::new()), |f| {
                            (Some(CloseCode(u16::from(f.code))), f.reason.as_str().to_owned())
                        });
                        emit(TransportEvent::Closed { socket, code, reason });
                        return;
                    }
                    Some(Ok(_)) => {
                        // Binary frames are not part of the protocol; transport-level
                        // ping/pong is answered by tungstenite itself.
                    }
                    Some(Err(e)) => {
                        fail(crate::error::Error::from(e).to_string());
                        return;
                    }
                    None => {
                        emit(TransportEvent::Closed {
                            socket,
                            code: Some(CloseCode::ABNORMAL),
                            reason: "stream ended".to_owned(),
                        });
                        return;
                    }
                }
            }

            command = outbound.recv() => {
                match command {
                    Some(Outbound::Text(text)) => {
                        if let Err(e) = write.send(Message::Text(text.into())).await {
                            fail(crate::error::Error::from(e).to_string());
                            return;
                        }
                    }
                    Some(Outbound::Close) | None => {
                        _ = write.send(Message::Close(None)).await;
                        _ = write.close().await;
                        return;
                    }
                }
            }
        }
    }
}

/// One-shot timers as spawned `sleep` tasks; cancelling aborts the task.
pub struct TokioTimer {
    events: mpsc::UnboundedSender<Event>,
    next_id: u64,
    pending: HashMap<TimerId, JoinHandle<()>>,
}

impl TokioTimer {
    #[must_use]
    pub fn new(events: mpsc::UnboundedSender<Event>) -> Self {
        Self {
            events,
            next_id: 0,
            pending: HashMap::new(),
        }
    }
}

impl Timer for TokioTimer {
    fn schedule(&mut self, delay: Duration) -> TimerId {
        self.pending.retain(|_, handle| !handle.is_finished());

        let id = TimerId(self.next_id);
        self.next_id += 1;

        let events = self.events.clone();
        let handle = tokio::spawn(async move {
            sleep(delay).await;
            _ = events.send(Event::Timer(id));
        });

        self.pending.insert(id, handle);
        id
    }

    fn cancel(&mut self, id: TimerId) {
        if let Some(handle) = self.pending.remove(&id) {
            handle.abort();
        }
    }
}

impl Drop for TokioTimer {
    fn drop(&mut self) {
        for (_, handle) in self.pending.drain() {
            handle.abort();
        }
    }
}
