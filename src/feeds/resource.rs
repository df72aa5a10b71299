/// Generic per-resource feed
///
/// A resource kind streams up to three topics: the resource list, its events
/// and (optionally) per-item metrics. Each payload is an object carrying the
/// list under a fixed key; a missing key means an empty list, a list that
/// does not decode leaves the previous state in place.
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::sync::Arc;

use super::source::ClusterSource;
use crate::logger::{self, LogTag};
use crate::stream::{ConnectionState, Subscription, Topic};

pub trait ResourceKind: Send + Sync + 'static {
    type Item: DeserializeOwned + Clone + Send + Sync + 'static;
    type Event: DeserializeOwned + Clone + Send + Sync + 'static;
    type Metric: DeserializeOwned + Clone + Send + Sync + 'static;

    /// Name used in log lines ("nodes", "services", ...)
    const LABEL: &'static str;
    const LIST_TOPIC: Topic;
    /// Payload key holding the resource list
    const LIST_KEY: &'static str;
    const EVENTS_TOPIC: Topic;
    const METRICS_TOPIC: Option<Topic>;
}

/// Decode the list under `key`; `None` means "keep what you had"
fn decode_list<T: DeserializeOwned>(payload: &serde_json::Value, key: &str, label: &str) -> Option<Vec<T>> {
    match payload.get(key) {
        None | Some(serde_json::Value::Null) => Some(Vec::new()),
        Some(list) => match Vec::<T>::deserialize(list) {
            Ok(items) => Some(items),
            Err(e) => {
                logger::warning(
                    LogTag::Feeds,
                    &format!("Discarding {} '{}' update with unexpected shape: {}", label, key, e),
                );
                None
            }
        },
    }
}

struct ResourceState<K: ResourceKind> {
    items: Vec<K::Item>,
    events: Vec<K::Event>,
    metrics: Vec<K::Metric>,
    last_update: Option<DateTime<Utc>>,
}

impl<K: ResourceKind> ResourceState<K> {
    fn new() -> Self {
        Self {
            items: Vec::new(),
            events: Vec::new(),
            metrics: Vec::new(),
            last_update: None,
        }
    }

    fn apply_list(&mut self, payload: &serde_json::Value) {
        if let Some(items) = decode_list(payload, K::LIST_KEY, K::LABEL) {
            self.items = items;
            self.last_update = Some(Utc::now());
        }
    }

    fn apply_events(&mut self, payload: &serde_json::Value) {
        if let Some(events) = decode_list(payload, "events", K::LABEL) {
            self.events = events;
        }
    }

    fn apply_metrics(&mut self, payload: &serde_json::Value) {
        if let Some(metrics) = decode_list(payload, "metrics", K::LABEL) {
            self.metrics = metrics;
        }
    }

    fn apply(&mut self, topic: Topic, payload: &serde_json::Value) {
        if topic == K::LIST_TOPIC {
            self.apply_list(payload);
        } else if topic == K::EVENTS_TOPIC {
            self.apply_events(payload);
        } else if Some(topic) == K::METRICS_TOPIC {
            self.apply_metrics(payload);
        }
    }
}

pub struct ResourceFeed<K: ResourceKind> {
    source: Arc<dyn ClusterSource>,
    state: Arc<RwLock<ResourceState<K>>>,
    subscriptions: Vec<Subscription>,
}

impl<K: ResourceKind> ResourceFeed<K> {
    pub fn new(source: Arc<dyn ClusterSource>) -> Self {
        let state = Arc::new(RwLock::new(ResourceState::<K>::new()));

        let topics: Vec<Topic> = [Some(K::LIST_TOPIC), Some(K::EVENTS_TOPIC), K::METRICS_TOPIC]
            .into_iter()
            .flatten()
            .collect();

        // Seed before subscribing so a streamed update is never overwritten by fixtures
        for topic in &topics {
            if let Some(seed) = source.seed(topic.code()) {
                state.write().apply(*topic, &seed);
            }
        }

        let mut subscriptions = Vec::with_capacity(topics.len());
        for topic in topics {
            let handler_state = state.clone();
            subscriptions.push(source.subscribe(
                topic.code(),
                Arc::new(move |payload: &serde_json::Value| handler_state.write().apply(topic, payload)),
            ));
        }

        logger::debug(
            LogTag::Feeds,
            &format!("{} feed attached to {} source", K::LABEL, source.name()),
        );

        Self {
            source,
            state,
            subscriptions,
        }
    }

    pub fn items(&self) -> Vec<K::Item> {
        self.state.read().items.clone()
    }

    pub fn events(&self) -> Vec<K::Event> {
        self.state.read().events.clone()
    }

    pub fn metrics(&self) -> Vec<K::Metric> {
        self.state.read().metrics.clone()
    }

    /// Time of the last resource-list update
    pub fn last_update(&self) -> Option<DateTime<Utc>> {
        self.state.read().last_update
    }

    pub fn is_connected(&self) -> bool {
        self.source.status() == ConnectionState::Connected
    }

    pub(crate) fn find_metric(&self, matches: impl Fn(&K::Metric) -> bool) -> Option<K::Metric> {
        self.state.read().metrics.iter().find(|m| matches(m)).cloned()
    }

    pub(crate) fn filter_events(&self, matches: impl Fn(&K::Event) -> bool) -> Vec<K::Event> {
        self.state
            .read()
            .events
            .iter()
            .filter(|e| matches(e))
            .cloned()
            .collect()
    }
}

impl<K: ResourceKind> Drop for ResourceFeed<K> {
    fn drop(&mut self) {
        for subscription in &self.subscriptions {
            subscription.unsubscribe();
        }
    }
}
