/// Feeds: per-resource adapters over a cluster data source
///
/// Each feed subscribes on construction, keeps the latest state per topic
/// and unsubscribes when dropped.
pub mod demo;
pub mod deployments;
pub mod metrics;
pub mod namespaces;
pub mod nodes;
pub mod resource;
pub mod samples;
pub mod services;
pub mod source;

pub use demo::DemoSource;
pub use deployments::DeploymentsFeed;
pub use metrics::{MetricKind, MetricsFeed};
pub use namespaces::NamespacesFeed;
pub use nodes::NodesFeed;
pub use resource::{ResourceFeed, ResourceKind};
pub use samples::{Sample, SampleWindow, Trend};
pub use services::ServicesFeed;
pub use source::{source_from_config, ClusterSource};
