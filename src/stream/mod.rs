/// Metrics distribution client
///
/// - `message`: envelope wire format and known topics
/// - `subscribers`: topic → subscriber index with idempotent unsubscribe
/// - `reconnect`: linear reconnect schedule
/// - `client`: connection state machine and snapshot fetches
pub mod client;
pub mod message;
pub mod reconnect;
pub mod subscribers;

pub use client::{stream_url, ConnectionState, MetricsClient};
pub use message::{Envelope, Topic};
pub use reconnect::ReconnectPolicy;
pub use subscribers::{Callback, SubscriberRegistry, Subscription};
