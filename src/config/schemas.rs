/// Configuration schemas
///
/// Every section is declared with `config_struct!`, so defaults live next
/// to the field they belong to.
use crate::config_struct;
use crate::constants::{
    DEFAULT_API_URL, DEFAULT_USAGE_ALERT_THRESHOLD, MAX_RECONNECT_ATTEMPTS,
    RECONNECT_BASE_DELAY_MS, SAMPLE_WINDOW, STREAM_PATH,
};

// ============================================================================
// STREAM (client)
// ============================================================================

config_struct! {
    /// Metrics distribution client configuration
    pub struct StreamConfig {
        /// HTTP base URL of the metrics backend; the stream URL is derived from it
        api_url: String = DEFAULT_API_URL.to_string(),

        /// Path suffix of the streaming endpoint
        stream_path: String = STREAM_PATH.to_string(),

        /// Reconnect attempts before giving up
        max_reconnect_attempts: u32 = MAX_RECONNECT_ATTEMPTS,

        /// Linear backoff base: attempt k waits k * base
        reconnect_base_delay_ms: u64 = RECONNECT_BASE_DELAY_MS,

        /// Timeout for establishing the stream (TCP + handshake)
        connect_timeout_secs: u64 = 10,

        /// Timeout for snapshot fetches
        request_timeout_secs: u64 = 10,
    }
}

// ============================================================================
// PRODUCER (server)
// ============================================================================

config_struct! {
    /// Backend metrics producer configuration
    pub struct ProducerConfig {
        host: String = "127.0.0.1".to_string(),
        port: u16 = 3001,

        /// Cadence of the metrics + alerts broadcast
        metrics_interval_secs: u64 = 5,

        /// Cadence of the events broadcast
        events_interval_secs: u64 = 10,

        cpu_alert_threshold: f64 = DEFAULT_USAGE_ALERT_THRESHOLD,
        memory_alert_threshold: f64 = DEFAULT_USAGE_ALERT_THRESHOLD,

        /// kubectl binary used by the cluster probe
        kubectl_path: String = "kubectl".to_string(),

        /// Per-invocation kubectl timeout
        probe_timeout_secs: u64 = 15,

        /// Per-connection outbound queue size
        client_buffer_size: usize = 256,

        /// Server ping after this much client silence
        heartbeat_secs: u64 = 30,

        /// Close connections silent for this long
        client_idle_timeout_secs: u64 = 90,

        /// Close connections that do not answer a ping in time
        pong_timeout_secs: u64 = 10,
    }
}

// ============================================================================
// FEEDS
// ============================================================================

config_struct! {
    /// Feed adapter configuration
    pub struct FeedsConfig {
        /// Samples kept per metric kind
        sample_window: usize = SAMPLE_WINDOW,

        /// Use canned fixtures instead of a live backend
        demo_mode: bool = false,
    }
}

// ============================================================================
// ROOT
// ============================================================================

config_struct! {
    /// Root configuration (data/config.toml)
    pub struct Config {
        stream: StreamConfig = StreamConfig::default(),
        producer: ProducerConfig = ProducerConfig::default(),
        feeds: FeedsConfig = FeedsConfig::default(),
    }
}
