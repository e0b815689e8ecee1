//! `Emitter` (spec §4.D): fills timestamps, derives labels, serializes
//! to a JSON line, and forwards to the log store via a bounded,
//! drop-oldest queue so detection never blocks on log-store latency.

use orion_common::events::labels_for;
use orion_common::SecurityEvent;
use orion_logstore::LogStoreClient;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Default bounded-queue capacity (spec §4.D).
pub const DEFAULT_QUEUE_CAPACITY: usize = 1024;

struct QueuedEvent {
    event: SecurityEvent,
    component: Option<String>,
}

struct EmitterQueue {
    items: Mutex<VecDeque<QueuedEvent>>,
    capacity: usize,
    dropped: AtomicU64,
    notify: tokio::sync::Notify,
}

impl EmitterQueue {
    fn push(&self, item: QueuedEvent) {
        let mut items = self.items.lock();
        if items.len() >= self.capacity {
            // Overflow policy: drop-oldest, never block upstream
            // detection (spec §4.D, §5).
            items.pop_front();
            self.dropped.fetch_add(1, Ordering::Relaxed);
        }
        items.push_back(item);
        drop(items);
        self.notify.notify_one();
    }

    fn drain(&self) -> Vec<QueuedEvent> {
        let mut items = self.items.lock();
        items.drain(..).collect()
    }
}

/// Publishes `SecurityEvent`s to the log store without blocking the
/// calling detection path.
pub struct Emitter {
    queue: Arc<EmitterQueue>,
    app_name: String,
    _worker: tokio::task::JoinHandle<()>,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct EmitterMetrics {
    pub dropped_events: u64,
}

impl Emitter {
    /// Spawn an emitter with a background worker draining the queue
    /// into `log_store`.
    pub fn new(log_store: Arc<dyn LogStoreClient>, app_name: impl Into<String>) -> Self {
        Self::with_capacity(log_store, app_name, DEFAULT_QUEUE_CAPACITY)
    }

    pub fn with_capacity(
        log_store: Arc<dyn LogStoreClient>,
        app_name: impl Into<String>,
        capacity: usize,
    ) -> Self {
        let app_name = app_name.into();
        let queue = Arc::new(EmitterQueue {
            items: Mutex::new(VecDeque::with_capacity(capacity.min(256))),
            capacity,
            dropped: AtomicU64::new(0),
            notify: tokio::sync::Notify::new(),
        });

        let worker_queue = queue.clone();
        let worker_app = app_name.clone();
        let worker = tokio::spawn(async move {
            loop {
                worker_queue.notify.notified().await;
                for item in worker_queue.drain() {
                    let labels = labels_for(&item.event, &worker_app, item.component.as_deref());
                    let line = match serde_json::to_string(&item.event) {
                        Ok(line) => line,
                        Err(e) => {
                            tracing::error!(error = %e, "failed to serialize event, dropping");
                            continue;
                        }
                    };
                    if let Err(e) = log_store.push(&labels, vec![line]).await {
                        tracing::warn!(error = %e, event_id = %item.event.id, "failed to push event to log store");
                    }
                }
            }
        });

        Self {
            queue,
            app_name,
            _worker: worker,
        }
    }

    /// Enqueue a single event. Non-blocking in the common case.
    pub fn emit(&self, event: SecurityEvent) {
        self.emit_with_component(event, None)
    }

    /// Enqueue an event tagged with an explicit `component` label.
    pub fn emit_with_component(&self, event: SecurityEvent, component: Option<&str>) {
        self.queue.push(QueuedEvent {
            event,
            component: component.map(|s| s.to_string()),
        });
    }

    pub fn emit_batch(&self, events: Vec<SecurityEvent>) {
        for event in events {
            self.emit(event);
        }
    }

    pub fn metrics(&self) -> EmitterMetrics {
        EmitterMetrics {
            dropped_events: self.queue.dropped.load(Ordering::Relaxed),
        }
    }

    pub fn app_name(&self) -> &str {
        &self.app_name
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use orion_common::Severity;
    use orion_logstore::InMemoryLogStore;

    #[tokio::test]
    async fn emitted_event_reaches_log_store() {
        let store = Arc::new(InMemoryLogStore::new());
        let emitter = Emitter::new(store.clone(), "orion-sentinel");

        let event = SecurityEvent::builder(orion_common::event_types::NEW_DEVICE, Severity::Info)
            .title("New device")
            .build();
        emitter.emit(event);

        // Queue drains on notify; give the worker a tick.
        tokio::time::sleep(std::time::Duration::from_millis(50)).await;
        assert_eq!(store.len(), 1);
    }

    #[tokio::test]
    async fn overflow_drops_oldest_and_counts() {
        let store = Arc::new(InMemoryLogStore::new());
        let emitter = Emitter::with_capacity(store.clone(), "orion-sentinel", 2);

        // Push faster than the worker can drain by holding the queue
        // lock indirectly via many rapid emits before first notify
        // processes; capacity 2 means the 3rd push evicts the 1st.
        for i in 0..3 {
            let event =
                SecurityEvent::builder(orion_common::event_types::NEW_DEVICE, Severity::Info)
                    .title(format!("device-{i}"))
                    .build();
            emitter.queue.push(QueuedEvent {
                event,
                component: None,
            });
        }
        assert!(emitter.metrics().dropped_events >= 1);
    }
}
