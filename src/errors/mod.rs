/// Error types for kubepulse
///
/// Each subsystem has its own enum. Connection-lifecycle problems in the
/// streaming client are never surfaced as errors: they are logged and
/// reflected in `ConnectionState`. Only snapshot fetches, configuration
/// loading and the producer server return these.
use thiserror::Error;

// =============================================================================
// CLIENT ERRORS
// =============================================================================

#[derive(Error, Debug)]
pub enum ClientError {
    #[error("Invalid API URL '{url}': {reason}")]
    InvalidUrl { url: String, reason: String },

    #[error("Request to {url} failed: {source}")]
    Request {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("HTTP {status} from {url}: {}", body.as_deref().unwrap_or("No body"))]
    HttpStatus {
        url: String,
        status: u16,
        body: Option<String>,
    },

    #[error("Failed to decode response from {url}: {source}")]
    Decode {
        url: String,
        #[source]
        source: reqwest::Error,
    },
}

impl ClientError {
    /// True for failures a later retry may fix (network, 5xx)
    pub fn is_recoverable(&self) -> bool {
        match self {
            ClientError::Request { .. } => true,
            ClientError::HttpStatus { status, .. } => *status >= 500,
            _ => false,
        }
    }
}

// =============================================================================
// CONFIGURATION ERRORS
// =============================================================================

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file '{path}': {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config file '{path}': {source}")]
    Parse {
        path: String,
        #[source]
        source: toml::de::Error,
    },

    #[error("Config already initialized")]
    AlreadyInitialized,

    #[error("Config not initialized. Call load_config() first.")]
    NotInitialized,
}

// =============================================================================
// PRODUCER ERRORS
// =============================================================================

#[derive(Error, Debug)]
pub enum ProducerError {
    #[error("Invalid bind address '{addr}'")]
    InvalidAddress { addr: String },

    #[error("Failed to bind to {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Server error: {0}")]
    Serve(#[from] std::io::Error),

    #[error("`{command}` failed: {reason}")]
    Probe { command: String, reason: String },
}
