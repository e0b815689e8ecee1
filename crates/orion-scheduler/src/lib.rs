//! Generic periodic-service supervisor (spec §4.L), used by the
//! Inventory Collector, both TI loops, SOAR, and the Health-Score
//! Service. Generalizes the teacher's hand-rolled
//! `tokio::time::interval` monitor loop (`opensase_edge::health::start_monitor`)
//! into a single reusable registration point.

use orion_common::OrionError;
use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{watch, Mutex};
use tokio::task::JoinHandle;

/// Grace period given to an in-flight tick after shutdown is signaled
/// (spec §5 "Cancellation & timeouts").
pub const SHUTDOWN_GRACE_PERIOD: Duration = Duration::from_secs(30);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServiceHealth {
    Healthy,
    Degraded,
    Down,
}

type TaskFuture = Pin<Box<dyn Future<Output = Result<(), OrionError>> + Send>>;
type TaskFn = Arc<dyn Fn() -> TaskFuture + Send + Sync>;

/// Supervises a set of named periodic services sharing one shutdown
/// signal. Each service owns its own retry-until-next-tick semantics
/// (spec §4.L): a failed tick is logged and reflected in
/// [`ServiceHealth`], but the next tick still fires on schedule -- the
/// supervisor itself never retries mid-interval.
pub struct Scheduler {
    shutdown_tx: watch::Sender<bool>,
    shutdown_rx: watch::Receiver<bool>,
    health: Arc<Mutex<HashMap<String, ServiceHealth>>>,
    handles: Vec<JoinHandle<()>>,
}

impl Scheduler {
    pub fn new() -> Self {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        Self {
            shutdown_tx,
            shutdown_rx,
            health: Arc::new(Mutex::new(HashMap::new())),
            handles: Vec::new(),
        }
    }

    /// Register a periodic task. `task` is invoked fresh on every tick;
    /// its output determines the service's reported [`ServiceHealth`].
    pub fn register<F, Fut>(&mut self, name: impl Into<String>, interval: Duration, task: F)
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), OrionError>> + Send + 'static,
    {
        let name = name.into();
        let task: TaskFn = Arc::new(move || Box::pin(task()));
        let shutdown_rx = self.shutdown_rx.clone();
        let health = self.health.clone();

        let handle = tokio::spawn(run_loop(name, interval, task, shutdown_rx, health));
        self.handles.push(handle);
    }

    pub async fn health_of(&self, name: &str) -> Option<ServiceHealth> {
        self.health.lock().await.get(name).copied()
    }

    pub async fn all_health(&self) -> HashMap<String, ServiceHealth> {
        self.health.lock().await.clone()
    }

    /// Signal every registered loop to stop accepting new ticks and
    /// wait for them to drain (bounded by each loop's own grace
    /// period).
    pub async fn shutdown(mut self) {
        let _ = self.shutdown_tx.send(true);
        for handle in self.handles.drain(..) {
            let _ = handle.await;
        }
    }
}

impl Default for Scheduler {
    fn default() -> Self {
        Self::new()
    }
}

async fn run_loop(
    name: String,
    interval: Duration,
    task: TaskFn,
    mut shutdown_rx: watch::Receiver<bool>,
    health: Arc<Mutex<HashMap<String, ServiceHealth>>>,
) {
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                if *shutdown_rx.borrow() {
                    break;
                }

                let fut = task();
                tokio::pin!(fut);
                let result = tokio::select! {
                    r = &mut fut => r,
                    _ = shutdown_rx.changed() => {
                        tracing::warn!(service = %name, "shutdown received mid-tick, granting grace period");
                        match tokio::time::timeout(SHUTDOWN_GRACE_PERIOD, &mut fut).await {
                            Ok(r) => r,
                            Err(_) => {
                                tracing::error!(service = %name, "tick did not complete within grace period");
                                Err(OrionError::Shutdown)
                            }
                        }
                    }
                };

                let new_health = match result {
                    Ok(()) => ServiceHealth::Healthy,
                    Err(OrionError::Shutdown) => ServiceHealth::Down,
                    Err(e) => {
                        tracing::warn!(service = %name, error = %e, "tick failed, will retry next interval");
                        ServiceHealth::Degraded
                    }
                };
                health.lock().await.insert(name.clone(), new_health);

                if *shutdown_rx.borrow() {
                    break;
                }
            }
            _ = shutdown_rx.changed() => {
                if *shutdown_rx.borrow() {
                    tracing::info!(service = %name, "shutdown signal received, stopping");
                    break;
                }
            }
        }
    }
    health.lock().await.insert(name, ServiceHealth::Down);
}
