/// Service feed: `services`, `service-events`, `service-metrics`
///
/// Service names are only unique within a namespace, so lookups take both.
use super::resource::{ResourceFeed, ResourceKind};
use crate::stream::Topic;
use crate::types::{Service, ServiceEvent, ServiceMetrics};

pub struct ServiceResources;

impl ResourceKind for ServiceResources {
    type Item = Service;
    type Event = ServiceEvent;
    type Metric = ServiceMetrics;

    const LABEL: &'static str = "services";
    const LIST_TOPIC: Topic = Topic::Services;
    const LIST_KEY: &'static str = "services";
    const EVENTS_TOPIC: Topic = Topic::ServiceEvents;
    const METRICS_TOPIC: Option<Topic> = Some(Topic::ServiceMetrics);
}

pub type ServicesFeed = ResourceFeed<ServiceResources>;

impl ResourceFeed<ServiceResources> {
    pub fn service_metrics(&self, name: &str, namespace: &str) -> Option<ServiceMetrics> {
        self.find_metric(|m| m.name == name && m.namespace == namespace)
    }

    pub fn service_events(&self, name: &str, namespace: &str) -> Vec<ServiceEvent> {
        self.filter_events(|e| e.service_name == name && e.namespace == namespace)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::feeds::demo::DemoSource;
    use std::sync::Arc;

    #[test]
    fn test_lookups_key_on_name_and_namespace() {
        let source = Arc::new(DemoSource::new());
        let feed = ServicesFeed::new(source);

        assert_eq!(feed.items().len(), 4);

        let backend = feed.service_metrics("app-backend-service", "production").unwrap();
        assert_eq!(backend.ports, vec![8080, 8443]);
        assert_eq!(backend.endpoints, 4);
        assert!(feed.service_metrics("app-backend-service", "default").is_none());

        assert_eq!(feed.service_events("nginx-service", "default").len(), 1);
        assert!(feed.service_events("nginx-service", "production").is_empty());
    }
}
