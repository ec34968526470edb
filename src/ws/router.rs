use std::collections::HashMap;

use serde_json::json;

use super::frame::{Frame, PING, PONG};
use super::traits::FrameSink;

/// Handle returned by [`MessageRouter::register`], used to remove the handler again.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct HandlerId(u64);

type Handler = Box<dyn FnMut(&Frame)>;

/// Outcome of [`MessageRouter::dispatch`].
#[non_exhaustive]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dispatch {
    /// A `ping` was answered with a `pong`; no handler ran.
    Heartbeat,
    /// The frame reached this many handlers.
    Delivered(usize),
    /// Nobody listens to this type.
    Ignored,
}

/// Routes inbound frames to handlers by their `type` discriminator.
///
/// Registration is additive: several handlers may listen to one type and each is invoked in
/// registration order.
#[derive(Default)]
pub struct MessageRouter {
    handlers: HashMap<String, Vec<(HandlerId, Handler)>>,
    next_id: u64,
}

impl MessageRouter {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register<S, F>(&mut self, frame_type: S, handler: F) -> HandlerId
    where
        S: Into<String>,
        F: FnMut(&Frame) + 'static,
    {
        let id = HandlerId(self.next_id);
        self.next_id += 1;
        self.handlers
            .entry(frame_type.into())
            .or_default()
            .push((id, Box::new(handler)));
        id
    }

    /// Remove one handler. Returns whether it was registered.
    pub fn unregister(&mut self, id: HandlerId) -> bool {
        let mut removed = false;
        self.handlers.retain(|_, handlers| {
            let before = handlers.len();
            handlers.retain(|(handler_id, _)| *handler_id != id);
            removed |= handlers.len() != before;
            !handlers.is_empty()
        });
        removed
    }

    pub fn clear(&mut self) {
        self.handlers.clear();
    }

    #[must_use]
    pub fn handler_count(&self) -> usize {
        self.handlers.values().map(Vec::len).sum()
    }

    /// Deliver `frame` to every handler registered for its type.
    ///
    /// `ping` is answered immediately through `sink` and never reaches handlers. A `pong` from
    /// the server, and any type without handlers, is ignored.
    pub fn dispatch(&mut self, frame: &Frame, sink: &mut dyn FrameSink) -> Dispatch {
        match frame.frame_type.as_str() {
            PING => {
                let answered = sink.send_frame(&json!({ "type": PONG }));
                #[cfg(feature = "tracing")]
                if !answered {
                    tracing::debug!("Unable to answer ping, connection not open");
                }
                #[cfg(not(feature = "tracing"))]
                let _ = answered;
                Dispatch::Heartbeat
            }
            PONG => Dispatch::Ignored,
            frame_type => match self.handlers.get_mut(frame_type) {
                Some(handlers) if !handlers.is_empty() => {
                    for (_, handler) in handlers.iter_mut() {
                        handler(frame);
                    }
                    Dispatch::Delivered(handlers.len())
                }
                _ => {
                    #[cfg(feature = "tracing")]
                    tracing::trace!(%frame_type, "No handler for frame type");
                    Dispatch::Ignored
                }
            },
        }
    }
}
