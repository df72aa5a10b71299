/// Threshold and event-derived alerts
use crate::config::ProducerConfig;
use crate::constants::DEFAULT_USAGE_ALERT_THRESHOLD;
use crate::types::{timestamp_now, Alert, AlertSeverity, ClusterMetrics, KubernetesEvent};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AlertThresholds {
    pub cpu: f64,
    pub memory: f64,
}

impl AlertThresholds {
    pub fn from_config(config: &ProducerConfig) -> Self {
        Self {
            cpu: config.cpu_alert_threshold,
            memory: config.memory_alert_threshold,
        }
    }
}

impl Default for AlertThresholds {
    fn default() -> Self {
        Self {
            cpu: DEFAULT_USAGE_ALERT_THRESHOLD,
            memory: DEFAULT_USAGE_ALERT_THRESHOLD,
        }
    }
}

/// `80` rather than `80.0`, `82.5` stays as is
fn format_threshold(value: f64) -> String {
    if value.fract() == 0.0 {
        format!("{:.0}", value)
    } else {
        value.to_string()
    }
}

fn usage_alert(id_prefix: &str, title: &str, resource: &str, value: f64, threshold: f64, millis: i64) -> Alert {
    Alert {
        id: format!("{}-{}", id_prefix, millis),
        severity: AlertSeverity::Warning,
        title: title.to_string(),
        message: format!("Cluster {} usage is {:.1}%", resource, value),
        timestamp: timestamp_now(),
        details: vec![
            format!("Current: {:.1}%", value),
            format!("Threshold: {}%", format_threshold(threshold)),
        ],
    }
}

fn is_node_issue(event: &KubernetesEvent) -> bool {
    event.reason.contains("Node") || event.reason.contains("NotReady")
}

/// Alerts for one collection round
///
/// Usage strictly above a threshold yields a warning; every node-related
/// event (reason mentions `Node` or `NotReady`) yields an error.
pub fn derive_alerts(
    metrics: &ClusterMetrics,
    events: &[KubernetesEvent],
    thresholds: &AlertThresholds,
) -> Vec<Alert> {
    let millis = chrono::Utc::now().timestamp_millis();
    let mut alerts = Vec::new();

    if metrics.cpu > thresholds.cpu {
        alerts.push(usage_alert("cpu-high", "High CPU Usage", "CPU", metrics.cpu, thresholds.cpu, millis));
    }

    if metrics.memory > thresholds.memory {
        alerts.push(usage_alert(
            "memory-high",
            "High Memory Usage",
            "memory",
            metrics.memory,
            thresholds.memory,
            millis,
        ));
    }

    for (index, event) in events.iter().filter(|e| is_node_issue(e)).enumerate() {
        alerts.push(Alert {
            id: format!("node-event-{}-{}", millis, index),
            severity: AlertSeverity::Error,
            title: "Node Issue Detected".to_string(),
            message: event.message.clone(),
            timestamp: event.last_timestamp.clone(),
            details: vec![event.reason.clone(), event.involved_object.name.clone()],
        });
    }

    alerts
}
