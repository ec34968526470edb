use std::marker::PhantomData;
use std::rc::Rc;

use serde_json::{Map, Value};
use tokio::sync::watch;

use super::feed::{ChargingStations, Feed, Notifications, Telemetry};
use crate::Result;
use crate::ws::config::Config;
use crate::ws::connection::{ConnectionManager, ConnectionState, Incoming};
use crate::ws::endpoint::Endpoint;
use crate::ws::event::Event;
use crate::ws::frame::Frame;
use crate::ws::registry::{Subscription, SubscriptionRegistry};
use crate::ws::router::{HandlerId, MessageRouter};
use crate::ws::runtime::{Events, TokioTimer, TungsteniteTransport, live};
use crate::ws::traits::{Timer, Transport};

/// Topic-specific facade over one connection, its subscriptions and its router.
///
/// A channel owns everything it uses: its own [`ConnectionManager`], registry and router. It is
/// driven by passing every [`Event`] its transport and timer produce to [`Channel::handle`].
///
/// # Examples
///
/// ```rust
/// use fleet_realtime::channel::{Channel, Telemetry};
/// use fleet_realtime::ws::config::Config;
/// use fleet_realtime::ws::event::{SocketId, TimerId};
/// use fleet_realtime::ws::traits::{Timer, Transport};
/// use std::time::Duration;
/// use url::Url;
///
/// struct Offline;
///
/// impl Transport for Offline {
///     fn open(&mut self, _: &Url) -> SocketId { SocketId(0) }
///     fn send(&mut self, _: SocketId, _: String) -> bool { false }
///     fn close(&mut self, _: SocketId) {}
/// }
///
/// impl Timer for Offline {
///     fn schedule(&mut self, _: Duration) -> TimerId { TimerId(0) }
///     fn cancel(&mut self, _: TimerId) {}
/// }
///
/// let mut channel = Channel::<Telemetry, _, _>::new(Config::default(), Offline, Offline);
///
/// // Recorded now, sent once the connection opens.
/// assert!(!channel.watch_vehicle("v1"));
/// assert_eq!(channel.watched_vehicle(), Some("v1"));
/// channel.dispose();
/// ```
pub struct Channel<F: Feed, T: Transport, S: Timer> {
    connection: ConnectionManager<T, S>,
    registry: SubscriptionRegistry,
    router: MessageRouter,
    /// Router registrations owned by this channel, removed on teardown
    handlers: Vec<HandlerId>,
    last_message: Rc<watch::Sender<Option<F::Message>>>,
    disposed: bool,
    _feed: PhantomData<F>,
}

impl<F: Feed, T: Transport, S: Timer> Channel<F, T, S> {
    /// Create a channel without connecting.
    #[must_use]
    pub fn new(config: Config, transport: T, timer: S) -> Self {
        let (last_message, _) = watch::channel(None);

        let mut channel = Self {
            connection: ConnectionManager::new(config, transport, timer),
            registry: SubscriptionRegistry::new(F::Format::default()),
            router: MessageRouter::new(),
            handlers: Vec::new(),
            last_message: Rc::new(last_message),
            disposed: false,
            _feed: PhantomData,
        };
        channel.register_feed_handlers();
        channel
    }

    /// Create a channel and start connecting to `endpoint`.
    #[must_use]
    pub fn open(endpoint: Endpoint, config: Config, transport: T, timer: S) -> Self {
        let mut channel = Self::new(config, transport, timer);
        channel.connect(endpoint);
        channel
    }

    fn register_feed_handlers(&mut self) {
        for frame_type in F::FRAME_TYPES {
            let last_message = Rc::clone(&self.last_message);
            let id = self
                .router
                .register(*frame_type, move |frame: &Frame| match F::decode(frame) {
                    Ok(message) => {
                        last_message.send_replace(Some(message));
                    }
                    Err(e) => {
                        #[cfg(feature = "tracing")]
                        tracing::warn!(
                            frame_type = %frame.frame_type,
                            error = %e,
                            "Dropping frame with undecodable payload"
                        );
                        #[cfg(not(feature = "tracing"))]
                        let _ = (frame, &e);
                    }
                });
            self.handlers.push(id);
        }
    }

    /// Advance the channel by one transport or timer event.
    ///
    /// Replays every recorded subscription when a socket opens and routes parsed frames to
    /// handlers.
    pub fn handle(&mut self, event: Event) {
        match self.connection.handle(event) {
            Incoming::Opened => {
                self.registry.replay(&mut self.connection);
            }
            Incoming::Frames(frames) => {
                for frame in &frames {
                    self.router.dispatch(frame, &mut self.connection);
                }
            }
            Incoming::Nothing => {}
        }
    }

    /// Record a subscription under this feed's topic. Returns whether a frame was sent now.
    ///
    /// On [exclusive](Feed::EXCLUSIVE) feeds a new subscription first drops the current one.
    pub fn subscribe(&mut self, params: Map<String, Value>) -> bool {
        if F::EXCLUSIVE && !self.is_subscribed(&params) {
            let _replaced = self.registry.unsubscribe_all(&mut self.connection);
        }

        self.registry
            .subscribe(Subscription::new(F::TOPIC, params), &mut self.connection)
    }

    /// Forget a subscription. Returns whether an unsubscribe frame was sent now.
    pub fn unsubscribe(&mut self, params: &Map<String, Value>) -> bool {
        self.registry
            .unsubscribe(F::TOPIC, params, &mut self.connection)
    }

    #[must_use]
    pub fn is_subscribed(&self, params: &Map<String, Value>) -> bool {
        self.registry.contains(F::TOPIC, params)
    }

    #[must_use]
    pub fn subscription_count(&self) -> usize {
        self.registry.len()
    }

    /// Listen to additional frame types on this channel's connection.
    ///
    /// The handler is removed when the channel is disposed.
    pub fn on<K, H>(&mut self, frame_type: K, handler: H) -> HandlerId
    where
        K: Into<String>,
        H: FnMut(&Frame) + 'static,
    {
        let id = self.router.register(frame_type, handler);
        self.handlers.push(id);
        id
    }

    pub fn off(&mut self, id: HandlerId) -> bool {
        self.handlers.retain(|handler| *handler != id);
        self.router.unregister(id)
    }

    pub fn connect(&mut self, endpoint: Endpoint) {
        self.connection.connect(endpoint);
    }

    /// Reset the retry budget and open a fresh socket.
    pub fn reconnect(&mut self) -> Result<()> {
        self.connection.reconnect()
    }

    /// Close the socket and stop reconnecting. Subscriptions stay recorded.
    pub fn disconnect(&mut self) {
        self.connection.disconnect();
    }

    #[must_use]
    pub fn state(&self) -> ConnectionState {
        self.connection.state()
    }

    #[must_use]
    pub fn state_receiver(&self) -> watch::Receiver<ConnectionState> {
        self.connection.state_receiver()
    }

    /// Most recent message of this feed, decoded.
    #[must_use]
    pub fn last_message(&self) -> Option<F::Message> {
        self.last_message.borrow().clone()
    }

    #[must_use]
    pub fn last_message_receiver(&self) -> watch::Receiver<Option<F::Message>> {
        self.last_message.subscribe()
    }

    /// Most recent frame of any type received on this channel's connection.
    #[must_use]
    pub fn last_frame(&self) -> Option<Frame> {
        self.connection.last_frame()
    }

    #[must_use]
    pub const fn connection(&self) -> &ConnectionManager<T, S> {
        &self.connection
    }

    /// Unsubscribe everything while still open, then close the socket, cancel timers and
    /// remove this channel's handlers.
    pub fn dispose(mut self) {
        self.teardown();
    }

    fn teardown(&mut self) {
        if self.disposed {
            return;
        }
        self.disposed = true;

        let _unsubscribed = self.registry.unsubscribe_all(&mut self.connection);
        self.connection.disconnect();
        for id in self.handlers.drain(..) {
            self.router.unregister(id);
        }

        #[cfg(feature = "tracing")]
        tracing::debug!(
            path = F::PATH,
            unsubscribed = _unsubscribed,
            "Channel disposed"
        );
    }
}

impl<F: Feed> Channel<F, TungsteniteTransport, TokioTimer> {
    /// Open a channel on the live tokio runtime.
    ///
    /// The returned [`Events`] must be drained into [`Channel::handle`]. Must be called from
    /// within a tokio runtime.
    #[must_use]
    pub fn open_live(endpoint: Endpoint, config: Config) -> (Self, Events) {
        let (transport, timer, events) = live();
        (Self::open(endpoint, config, transport, timer), events)
    }
}

fn single_param(key: &str, value: &str) -> Map<String, Value> {
    let mut params = Map::new();
    params.insert(key.to_owned(), Value::String(value.to_owned()));
    params
}

impl<T: Transport, S: Timer> Channel<Telemetry, T, S> {
    /// Track telemetry for `vehicle_id`, replacing any previously watched vehicle.
    ///
    /// Returns whether a subscribe frame was sent now.
    pub fn watch_vehicle<V: Into<String>>(&mut self, vehicle_id: V) -> bool {
        self.subscribe(single_param("vehicle_id", &vehicle_id.into()))
    }

    /// Stop tracking the watched vehicle, if any.
    pub fn unwatch_vehicle(&mut self) -> bool {
        self.registry.unsubscribe_all(&mut self.connection) > 0
    }

    #[must_use]
    pub fn watched_vehicle(&self) -> Option<&str> {
        self.registry
            .subscriptions()
            .next()
            .and_then(|subscription| subscription.params.get("vehicle_id"))
            .and_then(Value::as_str)
    }
}

impl<T: Transport, S: Timer> Channel<ChargingStations, T, S> {
    pub fn watch_station(&mut self, station_id: &str) -> bool {
        self.subscribe(single_param("station_id", station_id))
    }

    pub fn unwatch_station(&mut self, station_id: &str) -> bool {
        self.unsubscribe(&single_param("station_id", station_id))
    }
}

impl<T: Transport, S: Timer> Channel<Notifications, T, S> {
    /// Receive notifications of one category, e.g. `maintenance` or `battery`.
    pub fn subscribe_category(&mut self, category: &str) -> bool {
        self.subscribe(single_param("category", category))
    }

    pub fn unsubscribe_category(&mut self, category: &str) -> bool {
        self.unsubscribe(&single_param("category", category))
    }
}

impl<F: Feed, T: Transport, S: Timer> Drop for Channel<F, T, S> {
    fn drop(&mut self) {
        self.teardown();
    }
}
