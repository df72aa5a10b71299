/// Payload and resource types exchanged between the producer, the stream
/// client and the feeds.
///
/// JSON field names follow the dashboard's camelCase wire format.
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::HashMap;

// ============================================================================
// CLUSTER METRICS
// ============================================================================

/// Aggregate cluster readings
///
/// Non-numeric or missing readings decode as 0, matching how the dashboard
/// treats a snapshot with holes in it.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ClusterMetrics {
    #[serde(default, deserialize_with = "lenient_f64")]
    pub cpu: f64,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub memory: f64,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub network: f64,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub pods: f64,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub nodes: f64,
}

/// Numeric reading, or 0 for anything that is not a JSON number
pub fn number_or_zero(value: &serde_json::Value) -> f64 {
    value.as_f64().unwrap_or(0.0)
}

fn lenient_f64<'de, D>(deserializer: D) -> Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    let value = serde_json::Value::deserialize(deserializer)?;
    Ok(number_or_zero(&value))
}

/// Current time in the wire timestamp format (RFC 3339, millisecond precision, UTC)
pub fn timestamp_now() -> String {
    chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Millis, true)
}

/// `metrics` topic payload
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricsPayload {
    pub timestamp: String,
    pub metrics: ClusterMetrics,
}

// ============================================================================
// EVENTS & ALERTS
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventSource {
    pub component: String,
    pub host: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InvolvedObject {
    pub kind: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,
}

/// Cluster event record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KubernetesEvent {
    #[serde(rename = "type")]
    pub event_type: String,
    pub reason: String,
    pub message: String,
    pub source: EventSource,
    pub involved_object: InvolvedObject,
    pub last_timestamp: String,
}

/// `events` topic payload
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventsPayload {
    pub timestamp: String,
    pub events: Vec<KubernetesEvent>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AlertSeverity {
    Error,
    Warning,
    Info,
}

/// Threshold or event-derived alert (`alerts` topic carries a list of these)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Alert {
    pub id: String,
    #[serde(rename = "type")]
    pub severity: AlertSeverity,
    pub title: String,
    pub message: String,
    pub timestamp: String,
    #[serde(default)]
    pub details: Vec<String>,
}

// ============================================================================
// RESOURCES
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Node {
    pub name: String,
    pub status: String,
    #[serde(default)]
    pub roles: Vec<String>,
    pub version: String,
    #[serde(rename = "internalIP")]
    pub internal_ip: String,
    #[serde(rename = "externalIP", default)]
    pub external_ip: String,
    #[serde(default)]
    pub os_image: String,
    #[serde(default)]
    pub kernel_version: String,
    #[serde(default)]
    pub container_runtime: String,
    pub cpu_capacity: String,
    pub memory_capacity: String,
    pub pods_capacity: String,
    #[serde(rename = "allocatableCPU")]
    pub allocatable_cpu: String,
    pub allocatable_memory: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeMetrics {
    pub name: String,
    pub cpu_usage: f64,
    pub memory_usage: f64,
    pub disk_usage: f64,
    pub pod_count: u32,
    pub status: String,
    pub last_update: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeEvent {
    #[serde(rename = "type")]
    pub event_type: String,
    pub reason: String,
    pub message: String,
    pub node_name: String,
    pub timestamp: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceQuotas {
    pub pods: String,
    pub services: String,
    pub secrets: String,
    pub config_maps: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResourceLimits {
    pub cpu: String,
    pub memory: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Namespace {
    pub name: String,
    pub status: String,
    pub age: String,
    #[serde(default)]
    pub labels: HashMap<String, String>,
    #[serde(default)]
    pub annotations: HashMap<String, String>,
    #[serde(default)]
    pub resource_quotas: ResourceQuotas,
    #[serde(default)]
    pub limits: ResourceLimits,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NamespaceEvent {
    #[serde(rename = "type")]
    pub event_type: String,
    pub reason: String,
    pub message: String,
    pub namespace_name: String,
    pub timestamp: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Service {
    pub name: String,
    pub namespace: String,
    #[serde(rename = "type")]
    pub service_type: String,
    #[serde(rename = "clusterIP")]
    pub cluster_ip: String,
    #[serde(rename = "externalIPs", default)]
    pub external_ips: Vec<String>,
    pub ports: String,
    pub age: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceMetrics {
    pub name: String,
    pub namespace: String,
    #[serde(rename = "type")]
    pub service_type: String,
    #[serde(rename = "clusterIP")]
    pub cluster_ip: String,
    #[serde(rename = "externalIPs", default)]
    pub external_ips: Vec<String>,
    #[serde(default)]
    pub ports: Vec<u16>,
    pub endpoints: u32,
    pub connection_count: u64,
    pub request_rate: f64,
    pub last_update: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceEvent {
    #[serde(rename = "type")]
    pub event_type: String,
    pub reason: String,
    pub message: String,
    pub service_name: String,
    pub namespace: String,
    pub timestamp: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Deployment {
    pub name: String,
    pub namespace: String,
    pub replicas: u32,
    pub ready_replicas: u32,
    pub available_replicas: u32,
    pub unavailable_replicas: u32,
    pub age: String,
    #[serde(default)]
    pub images: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeploymentMetrics {
    pub name: String,
    pub namespace: String,
    pub replicas: u32,
    pub ready_replicas: u32,
    pub available_replicas: u32,
    pub unavailable_replicas: u32,
    pub cpu_usage: f64,
    pub memory_usage: f64,
    pub last_update: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeploymentEvent {
    #[serde(rename = "type")]
    pub event_type: String,
    pub reason: String,
    pub message: String,
    pub deployment_name: String,
    pub namespace: String,
    pub timestamp: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_cluster_metrics_lenient_numbers() {
        let metrics: ClusterMetrics = serde_json::from_value(json!({
            "cpu": 42.5,
            "memory": "n/a",
            "pods": 17,
            "nodes": null
        }))
        .unwrap();

        assert_eq!(metrics.cpu, 42.5);
        assert_eq!(metrics.memory, 0.0);
        assert_eq!(metrics.network, 0.0);
        assert_eq!(metrics.pods, 17.0);
        assert_eq!(metrics.nodes, 0.0);
    }

    #[test]
    fn test_event_wire_format() {
        let event: KubernetesEvent = serde_json::from_value(json!({
            "type": "Warning",
            "reason": "NodeNotReady",
            "message": "Node node-2 status is now: NodeNotReady",
            "source": {"component": "kubelet", "host": "node-2"},
            "involvedObject": {"kind": "Node", "name": "node-2"},
            "lastTimestamp": "2024-01-01T00:00:00Z"
        }))
        .unwrap();

        assert_eq!(event.event_type, "Warning");
        assert_eq!(event.involved_object.namespace, None);

        let back = serde_json::to_value(&event).unwrap();
        assert_eq!(back["involvedObject"]["name"], "node-2");
        assert!(back["involvedObject"].get("namespace").is_none());
    }

    #[test]
    fn test_alert_severity_field_is_type() {
        let alert: Alert = serde_json::from_value(json!({
            "id": "cpu-high-1",
            "type": "warning",
            "title": "High CPU Usage",
            "message": "Cluster CPU usage is 91.0%",
            "timestamp": "2024-01-01T00:00:00Z"
        }))
        .unwrap();
        assert_eq!(alert.severity, AlertSeverity::Warning);
        assert!(alert.details.is_empty());
    }

    #[test]
    fn test_node_ip_field_names() {
        let node: Node = serde_json::from_value(json!({
            "name": "node-1",
            "status": "Ready",
            "roles": ["control-plane"],
            "version": "v1.28.0",
            "internalIP": "192.168.1.10",
            "cpuCapacity": "4",
            "memoryCapacity": "8Gi",
            "podsCapacity": "110",
            "allocatableCPU": "4",
            "allocatableMemory": "7910Mi"
        }))
        .unwrap();
        assert_eq!(node.internal_ip, "192.168.1.10");
        assert_eq!(node.external_ip, "");
        assert_eq!(node.allocatable_cpu, "4");
    }
}
