/// Fixture-backed cluster source
///
/// Serves canned resources and randomised readings with the same payload
/// shapes a live producer streams, so feeds behave identically in demo mode.
use async_trait::async_trait;
use rand::Rng;
use serde_json::json;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;

use super::source::ClusterSource;
use crate::errors::ClientError;
use crate::logger::{self, LogTag};
use crate::producer::alerts::{derive_alerts, AlertThresholds};
use crate::stream::{Callback, ConnectionState, SubscriberRegistry, Subscription, Topic};
use crate::types::{
    timestamp_now, ClusterMetrics, Deployment, DeploymentEvent, DeploymentMetrics, EventSource,
    InvolvedObject, KubernetesEvent, Namespace, NamespaceEvent, Node, NodeEvent, NodeMetrics,
    ResourceLimits, ResourceQuotas, Service, ServiceEvent, ServiceMetrics,
};

// =============================================================================
// SOURCE
// =============================================================================

pub struct DemoSource {
    registry: Arc<SubscriberRegistry>,
    closed: AtomicBool,
}

impl DemoSource {
    pub fn new() -> Self {
        Self {
            registry: SubscriberRegistry::new(),
            closed: AtomicBool::new(false),
        }
    }

    /// Deliver `payload` to subscribers of `topic`
    pub fn publish(&self, topic: &str, payload: &serde_json::Value) -> usize {
        if self.closed.load(Ordering::Acquire) {
            return 0;
        }
        self.registry.dispatch(topic, payload)
    }

    /// One producer-like round: metrics, alerts (if any), events and fresh
    /// per-resource readings
    pub fn publish_round(&self) {
        let metrics = demo_metrics();
        let events = demo_events();
        let timestamp = timestamp_now();

        self.publish(
            Topic::Metrics.code(),
            &json!({ "timestamp": timestamp, "metrics": metrics }),
        );

        let alerts = derive_alerts(&metrics, &events, &AlertThresholds::default());
        if !alerts.is_empty() {
            self.publish(Topic::Alerts.code(), &json!(alerts));
        }

        self.publish(
            Topic::Events.code(),
            &json!({ "timestamp": timestamp, "events": events }),
        );
        self.publish(Topic::NodeMetrics.code(), &json!({ "metrics": demo_node_metrics() }));
        self.publish(
            Topic::ServiceMetrics.code(),
            &json!({ "metrics": demo_service_metrics() }),
        );
        self.publish(
            Topic::DeploymentMetrics.code(),
            &json!({ "metrics": demo_deployment_metrics() }),
        );
    }

    /// Publish a round every `period` until `shutdown` flips or the source closes
    pub async fn run(self: Arc<Self>, period: Duration, mut shutdown: watch::Receiver<bool>) {
        let mut ticker = tokio::time::interval_at(tokio::time::Instant::now() + period, period);
        logger::debug(
            LogTag::Feeds,
            &format!("Demo publisher running every {}s", period.as_secs_f64()),
        );

        loop {
            if *shutdown.borrow() {
                break;
            }
            tokio::select! {
                _ = ticker.tick() => {
                    if self.closed.load(Ordering::Acquire) {
                        break;
                    }
                    self.publish_round();
                }
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
            }
        }
    }

    /// Stop delivering; status reports `Closed` afterwards
    pub fn close(&self) {
        self.closed.store(true, Ordering::Release);
    }
}

impl Default for DemoSource {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ClusterSource for DemoSource {
    fn name(&self) -> &'static str {
        "demo"
    }

    fn subscribe(&self, topic: &str, callback: Callback) -> Subscription {
        self.registry.subscribe(topic, callback)
    }

    async fn fetch_metrics(&self) -> Result<ClusterMetrics, ClientError> {
        Ok(demo_metrics())
    }

    async fn fetch_events(&self) -> Result<Vec<KubernetesEvent>, ClientError> {
        Ok(demo_events())
    }

    fn seed(&self, topic: &str) -> Option<serde_json::Value> {
        let payload = match Topic::from_code(topic)? {
            Topic::Nodes => json!({ "nodes": demo_nodes() }),
            Topic::NodeMetrics => json!({ "metrics": demo_node_metrics() }),
            Topic::NodeEvents => json!({ "events": demo_node_events() }),
            Topic::Namespaces => json!({ "namespaces": demo_namespaces() }),
            Topic::NamespaceEvents => json!({ "events": demo_namespace_events() }),
            Topic::Services => json!({ "services": demo_services() }),
            Topic::ServiceMetrics => json!({ "metrics": demo_service_metrics() }),
            Topic::ServiceEvents => json!({ "events": demo_service_events() }),
            Topic::Deployments => json!({ "deployments": demo_deployments() }),
            Topic::DeploymentMetrics => json!({ "metrics": demo_deployment_metrics() }),
            Topic::DeploymentEvents => json!({ "events": demo_deployment_events() }),
            Topic::Metrics | Topic::Events | Topic::Alerts => return None,
        };
        Some(payload)
    }

    fn status(&self) -> ConnectionState {
        if self.closed.load(Ordering::Acquire) {
            ConnectionState::Closed
        } else {
            ConnectionState::Connected
        }
    }
}

// =============================================================================
// CLUSTER FIXTURES
// =============================================================================

/// Plausible cluster-wide readings
pub fn demo_metrics() -> ClusterMetrics {
    let mut rng = rand::thread_rng();
    ClusterMetrics {
        cpu: round1(rng.gen_range(20.0..95.0)),
        memory: round1(rng.gen_range(30.0..90.0)),
        network: round1(rng.gen_range(0.0..1000.0)),
        pods: rng.gen_range(40..60) as f64,
        nodes: 3.0,
    }
}

fn round1(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

fn kubelet_event(event_type: &str, reason: &str, message: &str, object: InvolvedObject) -> KubernetesEvent {
    KubernetesEvent {
        event_type: event_type.to_string(),
        reason: reason.to_string(),
        message: message.to_string(),
        source: EventSource {
            component: "kubelet".to_string(),
            host: "node-2".to_string(),
        },
        involved_object: object,
        last_timestamp: timestamp_now(),
    }
}

/// Non-normal cluster events
pub fn demo_events() -> Vec<KubernetesEvent> {
    vec![
        kubelet_event(
            "Warning",
            "BackOff",
            "Back-off restarting failed container api in pod api-deployment-5f7d8c9b4-x2k9p",
            InvolvedObject {
                kind: "Pod".to_string(),
                name: "api-deployment-5f7d8c9b4-x2k9p".to_string(),
                namespace: Some("default".to_string()),
            },
        ),
        kubelet_event(
            "Warning",
            "FailedScheduling",
            "0/3 nodes are available: 3 Insufficient memory.",
            InvolvedObject {
                kind: "Pod".to_string(),
                name: "payment-deployment-7c6b5d4f8-q8w3e".to_string(),
                namespace: Some("backend".to_string()),
            },
        ),
    ]
}

// =============================================================================
// RESOURCE FIXTURES
// =============================================================================

fn demo_node(name: &str, roles: &[&str], internal_ip: &str) -> Node {
    Node {
        name: name.to_string(),
        status: "Ready".to_string(),
        roles: roles.iter().map(|r| r.to_string()).collect(),
        version: "v1.28.0".to_string(),
        internal_ip: internal_ip.to_string(),
        external_ip: String::new(),
        os_image: "Ubuntu 22.04 LTS".to_string(),
        kernel_version: "5.15.0-88-generic".to_string(),
        container_runtime: "containerd://1.6.18".to_string(),
        cpu_capacity: "4".to_string(),
        memory_capacity: "8Gi".to_string(),
        pods_capacity: "110".to_string(),
        allocatable_cpu: "4".to_string(),
        allocatable_memory: "7910Mi".to_string(),
    }
}

pub fn demo_nodes() -> Vec<Node> {
    vec![
        demo_node("node-1", &["control-plane", "master"], "192.168.1.10"),
        demo_node("node-2", &["worker"], "192.168.1.11"),
    ]
}

pub fn demo_node_metrics() -> Vec<NodeMetrics> {
    let mut rng = rand::thread_rng();
    demo_nodes()
        .into_iter()
        .map(|node| NodeMetrics {
            name: node.name,
            cpu_usage: round1(rng.gen_range(0.0..100.0)),
            memory_usage: round1(rng.gen_range(0.0..100.0)),
            disk_usage: round1(rng.gen_range(0.0..100.0)),
            pod_count: rng.gen_range(5..25),
            status: node.status,
            last_update: timestamp_now(),
        })
        .collect()
}

pub fn demo_node_events() -> Vec<NodeEvent> {
    vec![NodeEvent {
        event_type: "Normal".to_string(),
        reason: "NodeReady".to_string(),
        message: "Node node-1 is ready".to_string(),
        node_name: "node-1".to_string(),
        timestamp: timestamp_now(),
    }]
}

fn demo_namespace(
    name: &str,
    age: &str,
    labels: &[(&str, &str)],
    quotas: [&str; 4],
    limits: [&str; 2],
) -> Namespace {
    Namespace {
        name: name.to_string(),
        status: "Active".to_string(),
        age: age.to_string(),
        labels: labels
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect::<HashMap<_, _>>(),
        annotations: HashMap::new(),
        resource_quotas: ResourceQuotas {
            pods: quotas[0].to_string(),
            services: quotas[1].to_string(),
            secrets: quotas[2].to_string(),
            config_maps: quotas[3].to_string(),
        },
        limits: ResourceLimits {
            cpu: limits[0].to_string(),
            memory: limits[1].to_string(),
        },
    }
}

pub fn demo_namespaces() -> Vec<Namespace> {
    vec![
        demo_namespace("default", "30d", &[], ["10", "5", "10", "10"], ["2", "4Gi"]),
        demo_namespace("kube-system", "30d", &[], ["20", "10", "20", "20"], ["4", "8Gi"]),
        demo_namespace(
            "production",
            "15d",
            &[("environment", "production"), ("team", "backend")],
            ["50", "20", "30", "20"],
            ["10", "16Gi"],
        ),
        demo_namespace(
            "staging",
            "10d",
            &[("environment", "staging"), ("team", "backend")],
            ["30", "15", "20", "15"],
            ["6", "12Gi"],
        ),
        demo_namespace(
            "development",
            "7d",
            &[("environment", "development"), ("team", "frontend")],
            ["25", "10", "15", "15"],
            ["4", "8Gi"],
        ),
    ]
}

pub fn demo_namespace_events() -> Vec<NamespaceEvent> {
    vec![
        NamespaceEvent {
            event_type: "Normal".to_string(),
            reason: "Created".to_string(),
            message: "Namespace production was created".to_string(),
            namespace_name: "production".to_string(),
            timestamp: timestamp_now(),
        },
        NamespaceEvent {
            event_type: "Normal".to_string(),
            reason: "Updated".to_string(),
            message: "Resource quotas updated for namespace staging".to_string(),
            namespace_name: "staging".to_string(),
            timestamp: timestamp_now(),
        },
    ]
}

struct ServiceFixture {
    name: &'static str,
    namespace: &'static str,
    service_type: &'static str,
    cluster_ip: &'static str,
    external_ips: &'static [&'static str],
    ports: &'static [u16],
    age: &'static str,
    endpoints: u32,
    max_connections: u64,
    max_request_rate: f64,
}

const SERVICES: &[ServiceFixture] = &[
    ServiceFixture {
        name: "nginx-service",
        namespace: "default",
        service_type: "ClusterIP",
        cluster_ip: "10.96.0.1",
        external_ips: &[],
        ports: &[80],
        age: "15d",
        endpoints: 3,
        max_connections: 1000,
        max_request_rate: 500.0,
    },
    ServiceFixture {
        name: "redis-service",
        namespace: "default",
        service_type: "ClusterIP",
        cluster_ip: "10.96.0.2",
        external_ips: &[],
        ports: &[6379],
        age: "10d",
        endpoints: 1,
        max_connections: 100,
        max_request_rate: 200.0,
    },
    ServiceFixture {
        name: "app-backend-service",
        namespace: "production",
        service_type: "LoadBalancer",
        cluster_ip: "10.96.0.3",
        external_ips: &["192.168.1.100"],
        ports: &[8080, 8443],
        age: "7d",
        endpoints: 4,
        max_connections: 5000,
        max_request_rate: 2000.0,
    },
    ServiceFixture {
        name: "api-gateway",
        namespace: "production",
        service_type: "NodePort",
        cluster_ip: "10.96.0.4",
        external_ips: &[],
        ports: &[30000],
        age: "5d",
        endpoints: 1,
        max_connections: 2000,
        max_request_rate: 1000.0,
    },
];

pub fn demo_services() -> Vec<Service> {
    SERVICES
        .iter()
        .map(|s| Service {
            name: s.name.to_string(),
            namespace: s.namespace.to_string(),
            service_type: s.service_type.to_string(),
            cluster_ip: s.cluster_ip.to_string(),
            external_ips: s.external_ips.iter().map(|ip| ip.to_string()).collect(),
            ports: s
                .ports
                .iter()
                .map(|p| format!("{}/TCP", p))
                .collect::<Vec<_>>()
                .join(","),
            age: s.age.to_string(),
        })
        .collect()
}

pub fn demo_service_metrics() -> Vec<ServiceMetrics> {
    let mut rng = rand::thread_rng();
    SERVICES
        .iter()
        .map(|s| ServiceMetrics {
            name: s.name.to_string(),
            namespace: s.namespace.to_string(),
            service_type: s.service_type.to_string(),
            cluster_ip: s.cluster_ip.to_string(),
            external_ips: s.external_ips.iter().map(|ip| ip.to_string()).collect(),
            ports: s.ports.to_vec(),
            endpoints: s.endpoints,
            connection_count: rng.gen_range(s.max_connections / 10..=s.max_connections),
            request_rate: round1(rng.gen_range(s.max_request_rate / 10.0..s.max_request_rate)),
            last_update: timestamp_now(),
        })
        .collect()
}

pub fn demo_service_events() -> Vec<ServiceEvent> {
    vec![
        ServiceEvent {
            event_type: "Normal".to_string(),
            reason: "CreatedLoadBalancer".to_string(),
            message: "Created load balancer for service app-backend-service".to_string(),
            service_name: "app-backend-service".to_string(),
            namespace: "production".to_string(),
            timestamp: timestamp_now(),
        },
        ServiceEvent {
            event_type: "Warning".to_string(),
            reason: "ExternalIPNotAvailable".to_string(),
            message: "External IP is not available for service nginx-service".to_string(),
            service_name: "nginx-service".to_string(),
            namespace: "default".to_string(),
            timestamp: timestamp_now(),
        },
    ]
}

/// name, namespace, replicas, ready/available, image, age, cpu ceiling, memory ceiling
const DEPLOYMENTS: &[(&str, &str, u32, u32, &str, &str, f64, f64)] = &[
    ("nginx-deployment", "default", 3, 3, "nginx:1.21", "15d", 50.0, 80.0),
    ("redis-deployment", "default", 1, 1, "redis:7-alpine", "10d", 30.0, 60.0),
    ("app-backend", "production", 5, 4, "myapp/backend:v2.1", "7d", 80.0, 90.0),
];

pub fn demo_deployments() -> Vec<Deployment> {
    DEPLOYMENTS
        .iter()
        .map(|&(name, namespace, replicas, ready, image, age, _, _)| Deployment {
            name: name.to_string(),
            namespace: namespace.to_string(),
            replicas,
            ready_replicas: ready,
            available_replicas: ready,
            unavailable_replicas: replicas - ready,
            age: age.to_string(),
            images: vec![image.to_string()],
        })
        .collect()
}

pub fn demo_deployment_metrics() -> Vec<DeploymentMetrics> {
    let mut rng = rand::thread_rng();
    DEPLOYMENTS
        .iter()
        .map(|&(name, namespace, replicas, ready, _, _, cpu_max, memory_max)| DeploymentMetrics {
            name: name.to_string(),
            namespace: namespace.to_string(),
            replicas,
            ready_replicas: ready,
            available_replicas: ready,
            unavailable_replicas: replicas - ready,
            cpu_usage: round1(rng.gen_range(0.0..cpu_max)),
            memory_usage: round1(rng.gen_range(0.0..memory_max)),
            last_update: timestamp_now(),
        })
        .collect()
}

pub fn demo_deployment_events() -> Vec<DeploymentEvent> {
    vec![
        DeploymentEvent {
            event_type: "Normal".to_string(),
            reason: "ScalingReplicaSet".to_string(),
            message: "Scaled up replica set app-backend-7d5f8b9c9f to 5".to_string(),
            deployment_name: "app-backend".to_string(),
            namespace: "production".to_string(),
            timestamp: timestamp_now(),
        },
        DeploymentEvent {
            event_type: "Warning".to_string(),
            reason: "FailedCreate".to_string(),
            message: "Error creating: pod \"app-backend-7d5f8b9c9f-xyz12\" is invalid: image pull policy \"Always\" not allowed for \"myapp/backend:v2.1\"".to_string(),
            deployment_name: "app-backend".to_string(),
            namespace: "production".to_string(),
            timestamp: timestamp_now(),
        },
    ]
}
