/// Cluster probes
///
/// A probe produces one `ClusterMetrics` reading and the recent warning
/// events. `KubectlProbe` shells out to kubectl; `DemoProbe` serves fixture
/// data. Probe failures never propagate: they are logged and the round
/// yields zeroed metrics or an empty event list.
use async_trait::async_trait;
use std::time::Duration;
use tokio::process::Command;

use crate::config::ProducerConfig;
use crate::errors::ProducerError;
use crate::feeds::demo::{demo_events, demo_metrics};
use crate::logger::{self, LogTag};
use crate::types::{timestamp_now, ClusterMetrics, EventSource, InvolvedObject, KubernetesEvent};

#[async_trait]
pub trait ClusterProbe: Send + Sync {
    fn name(&self) -> &'static str;

    async fn collect_metrics(&self) -> ClusterMetrics;

    async fn collect_events(&self) -> Vec<KubernetesEvent>;
}

// ============================================================================
// KUBECTL
// ============================================================================

const TOP_NODES_ARGS: &[&str] = &["top", "nodes", "--no-headers"];
const PODS_ARGS: &[&str] = &["get", "pods", "--no-headers"];
const NODES_ARGS: &[&str] = &["get", "nodes", "--no-headers"];
const EVENTS_ARGS: &[&str] = &[
    "get",
    "events",
    "--sort-by=.metadata.creationTimestamp",
    "--no-headers",
    "--field-selector=type!=Normal",
    "-o",
    "custom-columns=TYPE:.type,REASON:.reason,OBJECT:.involvedObject.name,MESSAGE:.message",
];

pub struct KubectlProbe {
    kubectl: String,
    timeout: Duration,
}

impl KubectlProbe {
    pub fn new(kubectl: impl Into<String>, timeout: Duration) -> Self {
        Self {
            kubectl: kubectl.into(),
            timeout,
        }
    }

    pub fn from_config(config: &ProducerConfig) -> Self {
        Self::new(
            config.kubectl_path.clone(),
            Duration::from_secs(config.probe_timeout_secs),
        )
    }

    async fn run(&self, args: &[&str]) -> Result<String, ProducerError> {
        let command = format!("{} {}", self.kubectl, args.join(" "));
        let probe_error = |reason: String| ProducerError::Probe {
            command: command.clone(),
            reason,
        };

        let output = tokio::time::timeout(
            self.timeout,
            Command::new(&self.kubectl).args(args).kill_on_drop(true).output(),
        )
        .await
        .map_err(|_| probe_error(format!("timed out after {:?}", self.timeout)))?
        .map_err(|e| probe_error(e.to_string()))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(probe_error(format!("{} ({})", stderr.trim(), output.status)));
        }

        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }

    async fn try_collect_metrics(&self) -> Result<ClusterMetrics, ProducerError> {
        let (cpu, memory) = parse_top_nodes(&self.run(TOP_NODES_ARGS).await?);
        let pods = count_lines(&self.run(PODS_ARGS).await?);
        let nodes = count_lines(&self.run(NODES_ARGS).await?);

        Ok(ClusterMetrics {
            cpu,
            memory,
            // kubectl exposes no cluster-wide network figure
            network: 0.0,
            pods: pods as f64,
            nodes: nodes as f64,
        })
    }
}

#[async_trait]
impl ClusterProbe for KubectlProbe {
    fn name(&self) -> &'static str {
        "kubectl"
    }

    async fn collect_metrics(&self) -> ClusterMetrics {
        match self.try_collect_metrics().await {
            Ok(metrics) => metrics,
            Err(e) => {
                logger::error(LogTag::Probe, &format!("Metrics collection failed: {}", e));
                ClusterMetrics::default()
            }
        }
    }

    async fn collect_events(&self) -> Vec<KubernetesEvent> {
        match self.run(EVENTS_ARGS).await {
            Ok(output) => parse_events(&output, &timestamp_now()),
            Err(e) => {
                logger::error(LogTag::Probe, &format!("Event collection failed: {}", e));
                Vec::new()
            }
        }
    }
}

// ============================================================================
// PARSERS
// ============================================================================

fn parse_percent(column: &str) -> Option<f64> {
    column.trim_end_matches('%').parse::<f64>().ok()
}

/// Mean CPU% and MEMORY% over `kubectl top nodes --no-headers` rows
///
/// Rows are `NAME CPU(cores) CPU% MEMORY(bytes) MEMORY%`. Rows that do not
/// parse (e.g. `<unknown>` while metrics-server warms up) are skipped.
pub fn parse_top_nodes(output: &str) -> (f64, f64) {
    let readings: Vec<(f64, f64)> = output
        .lines()
        .filter_map(|line| {
            let columns: Vec<&str> = line.split_whitespace().collect();
            if columns.len() < 5 {
                return None;
            }
            Some((parse_percent(columns[2])?, parse_percent(columns[4])?))
        })
        .collect();

    if readings.is_empty() {
        return (0.0, 0.0);
    }

    let count = readings.len() as f64;
    let cpu: f64 = readings.iter().map(|(cpu, _)| cpu).sum();
    let memory: f64 = readings.iter().map(|(_, memory)| memory).sum();
    (cpu / count, memory / count)
}

/// Non-blank lines
pub fn count_lines(output: &str) -> usize {
    output.lines().filter(|line| !line.trim().is_empty()).count()
}

fn capitalize(kind: &str) -> String {
    let mut chars = kind.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// `TYPE REASON OBJECT MESSAGE...` rows into events stamped with `timestamp`
///
/// OBJECT is either a bare name (taken to be a Pod) or `kind/name`. Rows
/// with fewer than four columns are skipped.
pub fn parse_events(output: &str, timestamp: &str) -> Vec<KubernetesEvent> {
    output
        .lines()
        .filter_map(|line| {
            let columns: Vec<&str> = line.split_whitespace().collect();
            if columns.len() < 4 {
                return None;
            }

            let (kind, name) = match columns[2].split_once('/') {
                Some((kind, name)) => (capitalize(kind), name.to_string()),
                None => ("Pod".to_string(), columns[2].to_string()),
            };

            Some(KubernetesEvent {
                event_type: columns[0].to_string(),
                reason: columns[1].to_string(),
                message: columns[3..].join(" "),
                source: EventSource {
                    component: "kubelet".to_string(),
                    host: "localhost".to_string(),
                },
                involved_object: InvolvedObject {
                    kind,
                    name,
                    namespace: Some("default".to_string()),
                },
                last_timestamp: timestamp.to_string(),
            })
        })
        .collect()
}

// ============================================================================
// DEMO
// ============================================================================

/// Randomised readings and canned warning events, no cluster required
#[derive(Debug, Default, Clone, Copy)]
pub struct DemoProbe;

#[async_trait]
impl ClusterProbe for DemoProbe {
    fn name(&self) -> &'static str {
        "demo"
    }

    async fn collect_metrics(&self) -> ClusterMetrics {
        demo_metrics()
    }

    async fn collect_events(&self) -> Vec<KubernetesEvent> {
        demo_events()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_top_nodes_means() {
        let output = "\
node-1   250m   12%   2048Mi   40%
node-2   900m   46%   5120Mi   70%
node-3   <unknown>   <unknown>   <unknown>   <unknown>
";
        let (cpu, memory) = parse_top_nodes(output);
        assert_eq!(cpu, 29.0);
        assert_eq!(memory, 55.0);

        assert_eq!(parse_top_nodes(""), (0.0, 0.0));
        assert_eq!(parse_top_nodes("garbage line"), (0.0, 0.0));
    }

    #[test]
    fn test_kubectl_command_lines() {
        assert_eq!(TOP_NODES_ARGS.join(" "), "top nodes --no-headers");
        assert_eq!(PODS_ARGS.join(" "), "get pods --no-headers");
        assert_eq!(NODES_ARGS.join(" "), "get nodes --no-headers");
        assert!(EVENTS_ARGS.contains(&"--field-selector=type!=Normal"));
    }

    #[test]
    fn test_count_lines_skips_blanks() {
        assert_eq!(count_lines("a\nb\n\n  \nc\n"), 3);
        assert_eq!(count_lines(""), 0);
    }

    #[test]
    fn test_parse_events_columns() {
        let output = "\
Warning   BackOff            api-7d9f   Back-off restarting failed container
Warning   NodeNotReady       node/node-2   Node node-2 status is now: NodeNotReady
Warning   Short
";
        let events = parse_events(output, "2024-05-01T08:00:00.000Z");
        assert_eq!(events.len(), 2);

        assert_eq!(events[0].event_type, "Warning");
        assert_eq!(events[0].reason, "BackOff");
        assert_eq!(events[0].message, "Back-off restarting failed container");
        assert_eq!(events[0].involved_object.kind, "Pod");
        assert_eq!(events[0].involved_object.name, "api-7d9f");
        assert_eq!(events[0].involved_object.namespace.as_deref(), Some("default"));
        assert_eq!(events[0].last_timestamp, "2024-05-01T08:00:00.000Z");

        assert_eq!(events[1].involved_object.kind, "Node");
        assert_eq!(events[1].involved_object.name, "node-2");
        assert_eq!(events[1].message, "Node node-2 status is now: NodeNotReady");
    }

    #[tokio::test]
    async fn test_missing_kubectl_yields_zeroed_round() {
        let probe = KubectlProbe::new("/nonexistent/kubectl-for-tests", Duration::from_secs(2));

        assert_eq!(probe.collect_metrics().await, ClusterMetrics::default());
        assert!(probe.collect_events().await.is_empty());
    }

    #[tokio::test]
    async fn test_demo_probe_ranges() {
        let probe = DemoProbe;
        let metrics = probe.collect_metrics().await;
        assert!((20.0..=95.0).contains(&metrics.cpu));
        assert_eq!(metrics.nodes, 3.0);
        assert_eq!(probe.collect_events().await.len(), 2);
        assert_eq!(probe.name(), "demo");
    }
}
