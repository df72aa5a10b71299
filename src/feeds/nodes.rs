/// Node feed: `nodes`, `node-events`, `node-metrics`
use super::resource::{ResourceFeed, ResourceKind};
use crate::stream::Topic;
use crate::types::{Node, NodeEvent, NodeMetrics};

pub struct NodeResources;

impl ResourceKind for NodeResources {
    type Item = Node;
    type Event = NodeEvent;
    type Metric = NodeMetrics;

    const LABEL: &'static str = "nodes";
    const LIST_TOPIC: Topic = Topic::Nodes;
    const LIST_KEY: &'static str = "nodes";
    const EVENTS_TOPIC: Topic = Topic::NodeEvents;
    const METRICS_TOPIC: Option<Topic> = Some(Topic::NodeMetrics);
}

pub type NodesFeed = ResourceFeed<NodeResources>;

impl ResourceFeed<NodeResources> {
    pub fn node_metrics(&self, node_name: &str) -> Option<NodeMetrics> {
        self.find_metric(|m| m.name == node_name)
    }

    pub fn node_events(&self, node_name: &str) -> Vec<NodeEvent> {
        self.filter_events(|e| e.node_name == node_name)
    }
}
