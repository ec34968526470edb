//! Client-side record of what should be subscribed.
//!
//! The server keeps no session across a disconnect, so every subscription is re-derivable from
//! the registry and replayed after each successful open.

use std::collections::HashMap;

use serde::Serialize;
use serde_json::{Map, Value};

use super::traits::FrameSink;

/// Subscription action type.
#[non_exhaustive]
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, strum_macros::Display)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum SubscriptionAction {
    Subscribe,
    Unsubscribe,
}

/// A declarative statement of interest, e.g. `vehicle_telemetry` with `{ "vehicle_id": "v1" }`.
#[non_exhaustive]
#[derive(Clone, Debug, PartialEq)]
pub struct Subscription {
    pub topic: String,
    pub params: Map<String, Value>,
}

impl Subscription {
    #[must_use]
    pub fn new<S: Into<String>>(topic: S, params: Map<String, Value>) -> Self {
        Self {
            topic: topic.into(),
            params,
        }
    }

    /// Subscription with a single `key = value` parameter.
    #[must_use]
    pub fn with_param<S: Into<String>, K: Into<String>, V: Into<Value>>(
        topic: S,
        key: K,
        value: V,
    ) -> Self {
        let mut params = Map::new();
        params.insert(key.into(), value.into());
        Self::new(topic, params)
    }

    /// Stable identity of `(topic, params)`.
    #[must_use]
    pub fn key(&self) -> SubscriptionKey {
        SubscriptionKey::new(&self.topic, &self.params)
    }
}

/// Registry key. Parameter identity is the canonical JSON encoding of the params, so two maps
/// with the same entries produce the same key regardless of insertion order.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct SubscriptionKey {
    topic: String,
    params: String,
}

impl SubscriptionKey {
    #[must_use]
    pub fn new(topic: &str, params: &Map<String, Value>) -> Self {
        Self {
            topic: topic.to_owned(),
            params: canonical_json(params),
        }
    }

    #[must_use]
    pub fn topic(&self) -> &str {
        &self.topic
    }
}

fn canonical_json(params: &Map<String, Value>) -> String {
    fn canonicalize(value: &Value) -> Value {
        match value {
            Value::Object(map) => {
                let mut entries: Vec<_> = map.iter().collect();
                entries.sort_by(|a, b| a.0.cmp(b.0));
                Value::Object(
                    entries
                        .into_iter()
                        .map(|(k, v)| (k.clone(), canonicalize(v)))
                        .collect(),
                )
            }
            Value::Array(items) => Value::Array(items.iter().map(canonicalize).collect()),
            other => other.clone(),
        }
    }

    canonicalize(&Value::Object(params.clone())).to_string()
}

/// Builds the wire frames for a subscription.
///
/// Feeds differ only in payload shape, so the registry takes the shape as a strategy.
pub trait SubscriptionFormat {
    fn frame(&self, action: SubscriptionAction, subscription: &Subscription) -> Value;
}

/// `{"action": ..., "topic": ..., <params>}`.
#[non_exhaustive]
#[derive(Clone, Copy, Debug, Default)]
pub struct TopicFormat;

impl SubscriptionFormat for TopicFormat {
    fn frame(&self, action: SubscriptionAction, subscription: &Subscription) -> Value {
        let mut frame = Map::new();
        frame.insert("action".to_owned(), Value::String(action.to_string()));
        frame.insert(
            "topic".to_owned(),
            Value::String(subscription.topic.clone()),
        );
        for (k, v) in &subscription.params {
            frame.insert(k.clone(), v.clone());
        }
        Value::Object(frame)
    }
}

/// `{"action": ..., <params>}`; the topic is implied by the endpoint.
#[non_exhaustive]
#[derive(Clone, Copy, Debug, Default)]
pub struct ParamsFormat;

impl SubscriptionFormat for ParamsFormat {
    fn frame(&self, action: SubscriptionAction, subscription: &Subscription) -> Value {
        let mut frame = Map::new();
        frame.insert("action".to_owned(), Value::String(action.to_string()));
        for (k, v) in &subscription.params {
            frame.insert(k.clone(), v.clone());
        }
        Value::Object(frame)
    }
}

/// Mapping from [`SubscriptionKey`] to [`Subscription`].
pub struct SubscriptionRegistry {
    entries: HashMap<SubscriptionKey, Subscription>,
    format: Box<dyn SubscriptionFormat>,
}

impl SubscriptionRegistry {
    #[must_use]
    pub fn new<F: SubscriptionFormat + 'static>(format: F) -> Self {
        Self {
            entries: HashMap::new(),
            format: Box::new(format),
        }
    }

    /// Record `subscription`; send a subscribe frame if it is new and `sink` is open.
    ///
    /// Returns whether a frame was sent. Repeating a subscribe for an existing key only
    /// overwrites the entry.
    pub fn subscribe(&mut self, subscription: Subscription, sink: &mut dyn FrameSink) -> bool {
        let key = subscription.key();
        let is_new = !self.entries.contains_key(&key);
        let frame = self.format.frame(SubscriptionAction::Subscribe, &subscription);
        self.entries.insert(key, subscription);

        if is_new && sink.is_open() {
            sink.send_frame(&frame)
        } else {
            false
        }
    }

    /// Remove the entry for `(topic, params)`; send an unsubscribe frame if it existed and
    /// `sink` is open. Absent entries are a no-op.
    pub fn unsubscribe(
        &mut self,
        topic: &str,
        params: &Map<String, Value>,
        sink: &mut dyn FrameSink,
    ) -> bool {
        let key = SubscriptionKey::new(topic, params);
        let Some(removed) = self.entries.remove(&key) else {
            return false;
        };

        if sink.is_open() {
            let frame = self.format.frame(SubscriptionAction::Unsubscribe, &removed);
            sink.send_frame(&frame)
        } else {
            false
        }
    }

    /// Remove every entry, sending unsubscribe frames while `sink` is open. Returns the
    /// number of frames sent.
    pub fn unsubscribe_all(&mut self, sink: &mut dyn FrameSink) -> usize {
        let mut sent = 0;
        for (_, subscription) in self.entries.drain() {
            if sink.is_open() {
                let frame = self.format.frame(SubscriptionAction::Unsubscribe, &subscription);
                if sink.send_frame(&frame) {
                    sent += 1;
                }
            }
        }
        sent
    }

    /// Send one subscribe frame per entry. Called once per successful open.
    pub fn replay(&self, sink: &mut dyn FrameSink) -> usize {
        #[cfg(feature = "tracing")]
        if !self.entries.is_empty() {
            tracing::debug!(count = self.entries.len(), "Re-subscribing after open");
        }

        let mut sent = 0;
        for subscription in self.entries.values() {
            let frame = self.format.frame(SubscriptionAction::Subscribe, subscription);
            if sink.send_frame(&frame) {
                sent += 1;
            }
        }
        sent
    }

    #[must_use]
    pub fn contains(&self, topic: &str, params: &Map<String, Value>) -> bool {
        self.entries
            .contains_key(&SubscriptionKey::new(topic, params))
    }

    pub fn subscriptions(&self) -> impl Iterator<Item = &Subscription> {
        self.entries.values()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[derive(Default)]
    struct RecordingSink {
        open: bool,
        sent: Vec<Value>,
    }

    impl FrameSink for RecordingSink {
        fn is_open(&self) -> bool {
            self.open
        }

        fn send_frame(&mut self, frame: &Value) -> bool {
            if self.open {
                self.sent.push(frame.clone());
            }
            self.open
        }
    }

    fn vehicle(id: &str) -> Subscription {
        Subscription::with_param("vehicle_telemetry", "vehicle_id", id)
    }

    fn params(id: &str) -> Map<String, Value> {
        vehicle(id).params
    }

    #[test]
    fn key_ignores_param_order() {
        let a: Map<String, Value> = serde_json::from_str(r#"{"a":1,"b":{"x":1,"y":2}}"#).unwrap();
        let b: Map<String, Value> = serde_json::from_str(r#"{"b":{"y":2,"x":1},"a":1}"#).unwrap();

        assert_eq!(SubscriptionKey::new("t", &a), SubscriptionKey::new("t", &b));
        assert_ne!(SubscriptionKey::new("t", &a), SubscriptionKey::new("u", &a));
    }

    #[test]
    fn subscribe_while_closed_records_without_sending() {
        let mut registry = SubscriptionRegistry::new(ParamsFormat);
        let mut sink = RecordingSink::default();

        assert!(!registry.subscribe(vehicle("v1"), &mut sink));
        assert_eq!(registry.len(), 1);
        assert!(sink.sent.is_empty());
    }

    #[test]
    fn subscribe_while_open_sends_once_per_key() {
        let mut registry = SubscriptionRegistry::new(ParamsFormat);
        let mut sink = RecordingSink {
            open: true,
            ..RecordingSink::default()
        };

        assert!(registry.subscribe(vehicle("v1"), &mut sink));
        assert!(!registry.subscribe(vehicle("v1"), &mut sink));

        assert_eq!(sink.sent, vec![json!({"action": "subscribe", "vehicle_id": "v1"})]);
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn unsubscribe_missing_entry_is_noop() {
        let mut registry = SubscriptionRegistry::new(ParamsFormat);
        let mut sink = RecordingSink {
            open: true,
            ..RecordingSink::default()
        };

        assert!(!registry.unsubscribe("vehicle_telemetry", &params("nope"), &mut sink));
        assert!(sink.sent.is_empty());
    }

    #[test]
    fn unsubscribe_while_open_sends_frame() {
        let mut registry = SubscriptionRegistry::new(ParamsFormat);
        let mut sink = RecordingSink::default();
        registry.subscribe(vehicle("v1"), &mut sink);

        sink.open = true;
        assert!(registry.unsubscribe("vehicle_telemetry", &params("v1"), &mut sink));
        assert_eq!(
            sink.sent,
            vec![json!({"action": "unsubscribe", "vehicle_id": "v1"})]
        );
        assert!(registry.is_empty());
    }

    #[test]
    fn subscribe_then_unsubscribe_before_open_replays_nothing() {
        let mut registry = SubscriptionRegistry::new(ParamsFormat);
        let mut sink = RecordingSink::default();

        registry.subscribe(vehicle("v1"), &mut sink);
        registry.unsubscribe("vehicle_telemetry", &params("v1"), &mut sink);

        sink.open = true;
        assert_eq!(registry.replay(&mut sink), 0);
        assert!(sink.sent.is_empty());
    }

    #[test]
    fn replay_sends_one_frame_per_entry() {
        let mut registry = SubscriptionRegistry::new(TopicFormat);
        let mut sink = RecordingSink::default();
        registry.subscribe(Subscription::with_param("charging", "station_id", "s1"), &mut sink);
        registry.subscribe(Subscription::with_param("charging", "station_id", "s2"), &mut sink);
        registry.subscribe(Subscription::with_param("charging", "station_id", "s1"), &mut sink);

        sink.open = true;
        assert_eq!(registry.replay(&mut sink), 2);
        assert_eq!(sink.sent.len(), 2);
        assert!(sink.sent.contains(&json!({
            "action": "subscribe",
            "topic": "charging",
            "station_id": "s2"
        })));
    }

    #[test]
    fn unsubscribe_all_drains_registry() {
        let mut registry = SubscriptionRegistry::new(ParamsFormat);
        let mut sink = RecordingSink::default();
        registry.subscribe(vehicle("v1"), &mut sink);
        registry.subscribe(vehicle("v2"), &mut sink);

        sink.open = true;
        assert_eq!(registry.unsubscribe_all(&mut sink), 2);
        assert!(registry.is_empty());
        assert!(sink.sent.iter().all(|f| f["action"] == "unsubscribe"));
    }
}
