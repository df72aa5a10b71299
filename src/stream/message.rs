/// Stream wire format
///
/// Every frame is a JSON envelope `{ "type": <topic>, "payload": <any> }`.
/// The client treats topics as opaque strings; `Topic` names the ones the
/// producer and the feeds know about.
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fmt;

// ============================================================================
// TOPICS
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Topic {
    Metrics,
    Events,
    Alerts,
    Nodes,
    NodeEvents,
    NodeMetrics,
    Namespaces,
    NamespaceEvents,
    Services,
    ServiceEvents,
    ServiceMetrics,
    Deployments,
    DeploymentEvents,
    DeploymentMetrics,
}

impl Topic {
    pub const ALL: [Topic; 14] = [
        Topic::Metrics,
        Topic::Events,
        Topic::Alerts,
        Topic::Nodes,
        Topic::NodeEvents,
        Topic::NodeMetrics,
        Topic::Namespaces,
        Topic::NamespaceEvents,
        Topic::Services,
        Topic::ServiceEvents,
        Topic::ServiceMetrics,
        Topic::Deployments,
        Topic::DeploymentEvents,
        Topic::DeploymentMetrics,
    ];

    /// Topic code used in the envelope `type` field
    pub fn code(&self) -> &'static str {
        match self {
            Topic::Metrics => "metrics",
            Topic::Events => "events",
            Topic::Alerts => "alerts",
            Topic::Nodes => "nodes",
            Topic::NodeEvents => "node-events",
            Topic::NodeMetrics => "node-metrics",
            Topic::Namespaces => "namespaces",
            Topic::NamespaceEvents => "namespace-events",
            Topic::Services => "services",
            Topic::ServiceEvents => "service-events",
            Topic::ServiceMetrics => "service-metrics",
            Topic::Deployments => "deployments",
            Topic::DeploymentEvents => "deployment-events",
            Topic::DeploymentMetrics => "deployment-metrics",
        }
    }

    pub fn from_code(code: &str) -> Option<Self> {
        Topic::ALL.iter().copied().find(|t| t.code() == code)
    }
}

impl AsRef<str> for Topic {
    fn as_ref(&self) -> &str {
        self.code()
    }
}

impl fmt::Display for Topic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

// ============================================================================
// ENVELOPE
// ============================================================================

/// Unit of transport on the stream
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    /// Topic code
    #[serde(rename = "type")]
    pub topic: String,

    /// Topic-specific payload, forwarded verbatim to subscribers
    #[serde(default)]
    pub payload: serde_json::Value,
}

impl Envelope {
    pub fn new(topic: impl AsRef<str>, payload: serde_json::Value) -> Self {
        Self {
            topic: topic.as_ref().to_string(),
            payload,
        }
    }

    /// Build an envelope from any serializable payload
    pub fn from_payload<T: Serialize>(
        topic: impl AsRef<str>,
        payload: &T,
    ) -> Result<Self, serde_json::Error> {
        Ok(Self::new(topic, serde_json::to_value(payload)?))
    }

    /// Decode a text frame
    pub fn decode(text: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(text)
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Known topic, if any
    pub fn known_topic(&self) -> Option<Topic> {
        Topic::from_code(&self.topic)
    }

    /// Decode the payload into a typed value
    pub fn payload_as<T: DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        T::deserialize(&self.payload)
    }
}
