/// Namespace feed: `namespaces`, `namespace-events`
use super::resource::{ResourceFeed, ResourceKind};
use crate::stream::Topic;
use crate::types::{Namespace, NamespaceEvent};

pub struct NamespaceResources;

impl ResourceKind for NamespaceResources {
    type Item = Namespace;
    type Event = NamespaceEvent;
    // Namespaces stream no per-item metrics
    type Metric = serde_json::Value;

    const LABEL: &'static str = "namespaces";
    const LIST_TOPIC: Topic = Topic::Namespaces;
    const LIST_KEY: &'static str = "namespaces";
    const EVENTS_TOPIC: Topic = Topic::NamespaceEvents;
    const METRICS_TOPIC: Option<Topic> = None;
}

pub type NamespacesFeed = ResourceFeed<NamespaceResources>;

impl ResourceFeed<NamespaceResources> {
    pub fn namespace_events(&self, namespace_name: &str) -> Vec<NamespaceEvent> {
        self.filter_events(|e| e.namespace_name == namespace_name)
    }

    pub fn namespace(&self, name: &str) -> Option<Namespace> {
        self.items().into_iter().find(|ns| ns.name == name)
    }
}
