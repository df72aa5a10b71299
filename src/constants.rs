/// Global constants used across kubepulse
///
/// Wire paths, environment variable names and protocol limits that are not
/// configurable. Tunables live in `config::schemas`.

// ============================================================================
// ENDPOINTS
// ============================================================================

/// Streaming endpoint path suffix (appended to the API base URL)
pub const STREAM_PATH: &str = "/ws/metrics";

/// Cluster metrics snapshot endpoint
pub const METRICS_SNAPSHOT_PATH: &str = "/api/v1/metrics";

/// Event backlog endpoint
pub const EVENTS_SNAPSHOT_PATH: &str = "/api/v1/events";

/// Latest alerts endpoint (producer only)
pub const ALERTS_SNAPSHOT_PATH: &str = "/api/v1/alerts";

/// Producer status endpoint
pub const STATUS_PATH: &str = "/api/v1/status";

/// Base URL used when neither config nor environment provide one
pub const DEFAULT_API_URL: &str = "http://localhost:3001";

// ============================================================================
// ENVIRONMENT
// ============================================================================

pub const API_URL_ENV: &str = "KUBEPULSE_API_URL";
pub const DEMO_MODE_ENV: &str = "KUBEPULSE_DEMO_MODE";

// ============================================================================
// STREAM PROTOCOL
// ============================================================================

/// Reconnect attempts before the client gives up
pub const MAX_RECONNECT_ATTEMPTS: u32 = 5;

/// Base delay for the linear reconnect schedule (attempt k waits k * base)
pub const RECONNECT_BASE_DELAY_MS: u64 = 1000;

// ============================================================================
// FEEDS
// ============================================================================

/// Samples kept per metric kind
pub const SAMPLE_WINDOW: usize = 24;

/// Relative change needed before a trend is reported as up/down
pub const TREND_DEADBAND: f64 = 0.05;

// ============================================================================
// PRODUCER
// ============================================================================

/// Alert threshold for cluster CPU and memory usage (percent)
pub const DEFAULT_USAGE_ALERT_THRESHOLD: f64 = 80.0;
