/// Topic → subscriber index
///
/// Subscribers are stored per topic with set semantics keyed on `Arc`
/// identity. Dispatch copies the topic's entries out of the lock before
/// invoking them, so a callback may subscribe or unsubscribe (itself
/// included) without deadlocking.
///
/// Each entry has an `active` flag behind a reentrant gate. Dispatch holds
/// the gate across the flag check and the call; `unsubscribe` takes the
/// same gate before clearing the flag. Once `unsubscribe` returns, the
/// callback is not running on another thread and will not be invoked again.
/// From inside the callback itself (same thread) `unsubscribe` returns
/// immediately. Two callbacks that unsubscribe each other from different
/// threads at the same moment deadlock.
///
/// A panicking callback is logged and skipped; the remaining subscribers
/// still receive the payload.
use parking_lot::{ReentrantMutex, RwLock};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::any::Any;
use std::collections::HashMap;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use crate::logger::{self, LogTag};

/// Subscriber callback; receives the envelope payload
pub type Callback = Arc<dyn Fn(&serde_json::Value) + Send + Sync>;

pub type SubscriberId = u64;

struct Slot {
    active: AtomicBool,
    gate: ReentrantMutex<()>,
}

impl Slot {
    fn new() -> Arc<Self> {
        Arc::new(Self {
            active: AtomicBool::new(true),
            gate: ReentrantMutex::new(()),
        })
    }
}

struct Entry {
    id: SubscriberId,
    callback: Callback,
    slot: Arc<Slot>,
}

#[derive(Default)]
pub struct SubscriberRegistry {
    topics: RwLock<HashMap<String, Vec<Entry>>>,
    next_id: AtomicU64,
}

impl SubscriberRegistry {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Register `callback` under `topic`
    ///
    /// Registering the same `Arc` twice on one topic returns a handle to
    /// the existing registration; the callback is still invoked once per
    /// message.
    pub fn subscribe(self: &Arc<Self>, topic: &str, callback: Callback) -> Subscription {
        let mut topics = self.topics.write();
        let entries = topics.entry(topic.to_string()).or_default();

        if let Some(existing) = entries.iter().find(|e| same_callback(&e.callback, &callback)) {
            return Subscription {
                registry: Arc::downgrade(self),
                topic: topic.to_string(),
                id: existing.id,
                slot: existing.slot.clone(),
            };
        }

        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let slot = Slot::new();
        entries.push(Entry {
            id,
            callback,
            slot: slot.clone(),
        });

        Subscription {
            registry: Arc::downgrade(self),
            topic: topic.to_string(),
            id,
            slot,
        }
    }

    /// Register a callback that receives the payload decoded as `T`
    ///
    /// Payloads that do not decode are logged and not forwarded.
    pub fn subscribe_as<T, F>(self: &Arc<Self>, topic: &str, callback: F) -> Subscription
    where
        T: DeserializeOwned + 'static,
        F: Fn(T) + Send + Sync + 'static,
    {
        let topic_name = topic.to_string();
        let typed: Callback = Arc::new(move |payload: &serde_json::Value| {
            match T::deserialize(payload) {
                Ok(value) => callback(value),
                Err(e) => logger::warning(
                    LogTag::Stream,
                    &format!("Discarding '{}' payload with unexpected shape: {}", topic_name, e),
                ),
            }
        });
        self.subscribe(topic, typed)
    }

    /// Invoke every active subscriber of `topic` with `payload`
    ///
    /// Returns the number of callbacks invoked, panicked ones included.
    pub fn dispatch(&self, topic: &str, payload: &serde_json::Value) -> usize {
        let targets: Vec<(Callback, Arc<Slot>)> = {
            let topics = self.topics.read();
            match topics.get(topic) {
                Some(entries) => entries
                    .iter()
                    .map(|e| (e.callback.clone(), e.slot.clone()))
                    .collect(),
                None => return 0,
            }
        };

        let mut delivered = 0;
        for (callback, slot) in targets {
            let _gate = slot.gate.lock();
            if !slot.active.load(Ordering::Acquire) {
                continue;
            }
            delivered += 1;

            if let Err(panic) = panic::catch_unwind(AssertUnwindSafe(|| callback(payload))) {
                logger::error(
                    LogTag::Stream,
                    &format!(
                        "Subscriber on '{}' panicked: {}",
                        topic,
                        panic_message(panic.as_ref())
                    ),
                );
            }
        }
        delivered
    }

    pub fn subscriber_count(&self, topic: &str) -> usize {
        self.topics.read().get(topic).map(|e| e.len()).unwrap_or(0)
    }

    /// Topics with at least one subscriber
    pub fn topics(&self) -> Vec<String> {
        self.topics
            .read()
            .iter()
            .filter(|(_, entries)| !entries.is_empty())
            .map(|(topic, _)| topic.clone())
            .collect()
    }

    fn remove(&self, topic: &str, id: SubscriberId) {
        let mut topics = self.topics.write();
        if let Some(entries) = topics.get_mut(topic) {
            entries.retain(|e| e.id != id);
            if entries.is_empty() {
                topics.remove(topic);
            }
        }
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic payload".to_string()
    }
}

fn same_callback(a: &Callback, b: &Callback) -> bool {
    std::ptr::eq(Arc::as_ptr(a) as *const (), Arc::as_ptr(b) as *const ())
}

/// Handle returned by `subscribe`
///
/// Dropping the handle does not unsubscribe; call [`Subscription::unsubscribe`].
pub struct Subscription {
    registry: Weak<SubscriberRegistry>,
    topic: String,
    id: SubscriberId,
    slot: Arc<Slot>,
}

impl Subscription {
    /// Stop delivery to this callback. Calling it again is a no-op.
    ///
    /// Blocks while the callback is running on another thread.
    pub fn unsubscribe(&self) {
        let _gate = self.slot.gate.lock();
        if self.slot.active.swap(false, Ordering::AcqRel) {
            if let Some(registry) = self.registry.upgrade() {
                registry.remove(&self.topic, self.id);
            }
        }
    }

    pub fn topic(&self) -> &str {
        &self.topic
    }

    pub fn is_active(&self) -> bool {
        self.slot.active.load(Ordering::Acquire)
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("topic", &self.topic)
            .field("id", &self.id)
            .field("active", &self.is_active())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;
    use serde_json::json;
    use std::sync::atomic::AtomicUsize;

    fn counter() -> (Arc<AtomicUsize>, Callback) {
        let count = Arc::new(AtomicUsize::new(0));
        let c = count.clone();
        let callback: Callback = Arc::new(move |_: &serde_json::Value| {
            c.fetch_add(1, Ordering::SeqCst);
        });
        (count, callback)
    }

    #[test]
    fn test_dispatch_reaches_only_matching_topic() {
        let registry = SubscriberRegistry::new();
        let (a, cb_a) = counter();
        let (b, cb_b) = counter();
        let (other, cb_other) = counter();

        let _s1 = registry.subscribe("metrics", cb_a);
        let _s2 = registry.subscribe("metrics", cb_b);
        let _s3 = registry.subscribe("events", cb_other);

        assert_eq!(registry.dispatch("metrics", &json!({"cpu": 42})), 2);
        assert_eq!(a.load(Ordering::SeqCst), 1);
        assert_eq!(b.load(Ordering::SeqCst), 1);
        assert_eq!(other.load(Ordering::SeqCst), 0);

        assert_eq!(registry.dispatch("alerts", &json!([])), 0);
    }

    #[test]
    fn test_same_callback_registered_once() {
        let registry = SubscriberRegistry::new();
        let (count, cb) = counter();

        let first = registry.subscribe("metrics", cb.clone());
        let second = registry.subscribe("metrics", cb.clone());
        assert_eq!(registry.subscriber_count("metrics"), 1);

        registry.dispatch("metrics", &json!(1));
        assert_eq!(count.load(Ordering::SeqCst), 1);

        // Same callback on another topic is a separate registration
        let _events = registry.subscribe("events", cb);
        assert_eq!(registry.subscriber_count("events"), 1);

        second.unsubscribe();
        assert!(!first.is_active());
        assert_eq!(registry.subscriber_count("metrics"), 0);
    }

    #[test]
    fn test_unsubscribe_is_idempotent_and_final() {
        let registry = SubscriberRegistry::new();
        let (count, cb) = counter();
        let (kept, cb_kept) = counter();

        let sub = registry.subscribe("metrics", cb);
        let _kept_sub = registry.subscribe("metrics", cb_kept);
        registry.dispatch("metrics", &json!(1));

        sub.unsubscribe();
        sub.unsubscribe();
        assert_eq!(registry.subscriber_count("metrics"), 1);

        registry.dispatch("metrics", &json!(2));
        registry.dispatch("metrics", &json!(3));
        assert_eq!(count.load(Ordering::SeqCst), 1);
        assert_eq!(kept.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn test_callback_may_unsubscribe_itself() {
        let registry = SubscriberRegistry::new();
        let slot: Arc<Mutex<Option<Subscription>>> = Arc::new(Mutex::new(None));
        let calls = Arc::new(AtomicUsize::new(0));

        let slot_cb = slot.clone();
        let calls_cb = calls.clone();
        let sub = registry.subscribe(
            "events",
            Arc::new(move |_: &serde_json::Value| {
                calls_cb.fetch_add(1, Ordering::SeqCst);
                if let Some(sub) = slot_cb.lock().as_ref() {
                    sub.unsubscribe();
                }
            }),
        );
        *slot.lock() = Some(sub);

        registry.dispatch("events", &json!([]));
        registry.dispatch("events", &json!([]));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(registry.topics().is_empty());
    }

    #[test]
    fn test_unsubscribed_sibling_skipped_within_same_dispatch() {
        let registry = SubscriberRegistry::new();
        let victim_calls = Arc::new(AtomicUsize::new(0));
        let victim_slot: Arc<Mutex<Option<Subscription>>> = Arc::new(Mutex::new(None));

        // Registered first, so it runs before the victim in this dispatch
        let slot = victim_slot.clone();
        let _killer = registry.subscribe(
            "metrics",
            Arc::new(move |_: &serde_json::Value| {
                if let Some(sub) = slot.lock().as_ref() {
                    sub.unsubscribe();
                }
            }),
        );

        let vc = victim_calls.clone();
        let victim = registry.subscribe(
            "metrics",
            Arc::new(move |_: &serde_json::Value| {
                vc.fetch_add(1, Ordering::SeqCst);
            }),
        );
        *victim_slot.lock() = Some(victim);

        registry.dispatch("metrics", &json!(1));
        assert_eq!(victim_calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_subscribe_as_decodes_and_filters() {
        let registry = SubscriberRegistry::new();
        let received: Arc<Mutex<Vec<f64>>> = Arc::new(Mutex::new(Vec::new()));

        let sink = received.clone();
        let _sub = registry.subscribe_as::<crate::types::ClusterMetrics, _>("metrics", move |m| {
            sink.lock().push(m.cpu)
        });

        registry.dispatch("metrics", &json!({"cpu": 12.0}));
        registry.dispatch("metrics", &json!("garbage"));
        registry.dispatch("metrics", &json!({"cpu": 14.0}));

        assert_eq!(*received.lock(), vec![12.0, 14.0]);
    }

    #[test]
    fn test_panicking_subscriber_does_not_block_others() {
        let registry = SubscriberRegistry::new();
        let (before, cb_before) = counter();
        let (after, cb_after) = counter();

        let _s1 = registry.subscribe("metrics", cb_before);
        let _boom = registry.subscribe(
            "metrics",
            Arc::new(|_: &serde_json::Value| panic!("subscriber blew up")),
        );
        let _s2 = registry.subscribe("metrics", cb_after);

        assert_eq!(registry.dispatch("metrics", &json!(1)), 3);
        assert_eq!(registry.dispatch("metrics", &json!(2)), 3);
        assert_eq!(before.load(Ordering::SeqCst), 2);
        assert_eq!(after.load(Ordering::SeqCst), 2);
        assert_eq!(registry.subscriber_count("metrics"), 3);
    }

    #[test]
    fn test_panic_message_extraction() {
        let owned: Box<dyn Any + Send> = Box::new(String::from("owned"));
        let borrowed: Box<dyn Any + Send> = Box::new("borrowed");
        let other: Box<dyn Any + Send> = Box::new(42u8);

        assert_eq!(panic_message(owned.as_ref()), "owned");
        assert_eq!(panic_message(borrowed.as_ref()), "borrowed");
        assert_eq!(panic_message(other.as_ref()), "unknown panic payload");
    }

    #[test]
    fn test_unsubscribe_waits_for_call_on_other_thread() {
        let registry = SubscriberRegistry::new();
        let (started_tx, started_rx) = std::sync::mpsc::channel::<()>();
        let started_tx = Mutex::new(started_tx);
        let finished = Arc::new(AtomicUsize::new(0));

        let done = finished.clone();
        let sub = registry.subscribe(
            "metrics",
            Arc::new(move |_: &serde_json::Value| {
                let _ = started_tx.lock().send(());
                std::thread::sleep(std::time::Duration::from_millis(200));
                done.fetch_add(1, Ordering::SeqCst);
            }),
        );

        let dispatcher = {
            let registry = registry.clone();
            std::thread::spawn(move || registry.dispatch("metrics", &json!(1)))
        };

        started_rx.recv().unwrap();
        sub.unsubscribe();
        assert_eq!(finished.load(Ordering::SeqCst), 1);

        assert_eq!(dispatcher.join().unwrap(), 1);
        assert_eq!(registry.dispatch("metrics", &json!(2)), 0);
        assert_eq!(finished.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_unsubscribe_after_registry_dropped() {
        let registry = SubscriberRegistry::new();
        let (_count, cb) = counter();
        let sub = registry.subscribe("metrics", cb);
        drop(registry);

        sub.unsubscribe();
        assert!(!sub.is_active());
    }
}
