/// Deployment feed: `deployments`, `deployment-events`, `deployment-metrics`
use super::resource::{ResourceFeed, ResourceKind};
use crate::stream::Topic;
use crate::types::{Deployment, DeploymentEvent, DeploymentMetrics};

pub struct DeploymentResources;

impl ResourceKind for DeploymentResources {
    type Item = Deployment;
    type Event = DeploymentEvent;
    type Metric = DeploymentMetrics;

    const LABEL: &'static str = "deployments";
    const LIST_TOPIC: Topic = Topic::Deployments;
    const LIST_KEY: &'static str = "deployments";
    const EVENTS_TOPIC: Topic = Topic::DeploymentEvents;
    const METRICS_TOPIC: Option<Topic> = Some(Topic::DeploymentMetrics);
}

pub type DeploymentsFeed = ResourceFeed<DeploymentResources>;

impl ResourceFeed<DeploymentResources> {
    pub fn deployment_metrics(&self, name: &str, namespace: &str) -> Option<DeploymentMetrics> {
        self.find_metric(|m| m.name == name && m.namespace == namespace)
    }

    pub fn deployment_events(&self, name: &str, namespace: &str) -> Vec<DeploymentEvent> {
        self.filter_events(|e| e.deployment_name == name && e.namespace == namespace)
    }

    /// Deployments with fewer ready replicas than desired
    pub fn degraded(&self) -> Vec<Deployment> {
        self.items()
            .into_iter()
            .filter(|d| d.ready_replicas < d.replicas)
            .collect()
    }
}
