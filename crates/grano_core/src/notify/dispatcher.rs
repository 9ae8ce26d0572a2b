//! Background delivery of schema changes to observers.
//!
//! Changes are queued on an `mpsc` channel and delivered by one worker
//! thread in signal order. Delivery is at-least-once per observer: retryable
//! failures are re-attempted up to `max_delivery_attempts`.

use crate::notify::registry::ObserverRegistry;
use crate::notify::{ChangeSink, SchemaChange};
use log::{debug, error, info, warn};
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::mpsc::{self, Receiver, Sender};
use std::thread::JoinHandle;
use std::time::Duration;

const WORKER_THREAD_NAME: &str = "grano-notify";

/// Delivery tuning for the dispatcher worker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DispatcherConfig {
    /// Attempts per observer and change, including the first one.
    pub max_delivery_attempts: u32,
    /// Base delay between attempts; grows linearly with the attempt number.
    pub retry_backoff: Duration,
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        Self {
            max_delivery_attempts: 3,
            retry_backoff: Duration::from_millis(50),
        }
    }
}

/// Delivery counters reported when the dispatcher shuts down.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DeliveryStats {
    pub delivered: u64,
    pub retried: u64,
    pub failed: u64,
}

enum Message {
    Change(SchemaChange),
    Flush(Sender<()>),
    Shutdown,
}

/// Cloneable handle used to queue changes for delivery.
#[derive(Clone)]
pub struct ChangeNotifier {
    sender: Sender<Message>,
}

impl ChangeNotifier {
    /// Blocks until every change queued before this call has been handled.
    ///
    /// Returns immediately when the worker has stopped.
    pub fn flush(&self) {
        let (ack_tx, ack_rx) = mpsc::channel();
        if self.sender.send(Message::Flush(ack_tx)).is_err() {
            return;
        }
        let _ = ack_rx.recv();
    }
}

impl ChangeSink for ChangeNotifier {
    fn schema_changed(&self, change: SchemaChange) {
        debug!(
            "event=schema_change_queued module=notify project={} schema={} operation={}",
            change.project, change.schema_name, change.operation
        );
        if let Err(err) = self.sender.send(Message::Change(change)) {
            if let Message::Change(change) = err.0 {
                warn!(
                    "event=schema_change_dropped module=notify status=error project={} schema={} operation={} reason=dispatcher_stopped",
                    change.project, change.schema_name, change.operation
                );
            }
        }
    }
}

/// Owner handle of the worker thread.
pub struct DispatcherHandle {
    sender: Sender<Message>,
    worker: Option<JoinHandle<DeliveryStats>>,
}

impl DispatcherHandle {
    /// Delivers everything queued so far, stops the worker and returns stats.
    pub fn shutdown(mut self) -> DeliveryStats {
        self.stop()
    }

    fn stop(&mut self) -> DeliveryStats {
        let Some(worker) = self.worker.take() else {
            return DeliveryStats::default();
        };
        let _ = self.sender.send(Message::Shutdown);
        match worker.join() {
            Ok(stats) => stats,
            Err(_) => {
                error!("event=dispatcher_stop module=notify status=error reason=worker_panicked");
                DeliveryStats::default()
            }
        }
    }
}

impl Drop for DispatcherHandle {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Entry point for starting the delivery worker.
pub struct ChangeDispatcher;

impl ChangeDispatcher {
    /// Spawns the worker and returns the queueing handle plus the owner handle.
    pub fn start(
        registry: ObserverRegistry,
        config: DispatcherConfig,
    ) -> std::io::Result<(ChangeNotifier, DispatcherHandle)> {
        let (sender, receiver) = mpsc::channel();
        let worker = std::thread::Builder::new()
            .name(WORKER_THREAD_NAME.to_string())
            .spawn(move || run_worker(receiver, registry, config))?;
        info!("event=dispatcher_start module=notify status=ok");

        Ok((
            ChangeNotifier {
                sender: sender.clone(),
            },
            DispatcherHandle {
                sender,
                worker: Some(worker),
            },
        ))
    }
}

fn run_worker(
    receiver: Receiver<Message>,
    registry: ObserverRegistry,
    config: DispatcherConfig,
) -> DeliveryStats {
    let mut stats = DeliveryStats::default();
    while let Ok(message) = receiver.recv() {
        match message {
            Message::Change(change) => deliver(&registry, &config, &change, &mut stats),
            Message::Flush(ack) => {
                let _ = ack.send(());
            }
            Message::Shutdown => break,
        }
    }
    info!(
        "event=dispatcher_stop module=notify status=ok delivered={} retried={} failed={}",
        stats.delivered, stats.retried, stats.failed
    );
    stats
}

fn deliver(
    registry: &ObserverRegistry,
    config: &DispatcherConfig,
    change: &SchemaChange,
    stats: &mut DeliveryStats,
) {
    let max_attempts = config.max_delivery_attempts.max(1);
    for (observer_id, observer) in registry.iter() {
        let mut attempt = 1;
        loop {
            let outcome = catch_unwind(AssertUnwindSafe(|| observer.schema_changed(change)));
            match outcome {
                Ok(Ok(())) => {
                    stats.delivered += 1;
                    break;
                }
                Ok(Err(err)) if err.retryable && attempt < max_attempts => {
                    debug!(
                        "event=schema_change_retry module=notify observer={} schema={} attempt={} error={}",
                        observer_id, change.schema_name, attempt, err
                    );
                    stats.retried += 1;
                    std::thread::sleep(config.retry_backoff * attempt);
                    attempt += 1;
                }
                Ok(Err(err)) => {
                    warn!(
                        "event=schema_change_delivery module=notify status=error observer={} project={} schema={} operation={} attempts={} error={}",
                        observer_id, change.project, change.schema_name, change.operation, attempt, err
                    );
                    stats.failed += 1;
                    break;
                }
                Err(_) => {
                    warn!(
                        "event=schema_change_delivery module=notify status=error observer={} project={} schema={} operation={} error=observer_panicked",
                        observer_id, change.project, change.schema_name, change.operation
                    );
                    stats.failed += 1;
                    break;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{ChangeDispatcher, DispatcherConfig};
    use crate::notify::{
        ChangeSink, ObserverError, ObserverRegistry, SchemaChange, SchemaObserver,
        SchemaOperation,
    };
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    #[derive(Default)]
    struct Recorder {
        seen: Mutex<Vec<SchemaChange>>,
    }

    impl SchemaObserver for Recorder {
        fn observer_id(&self) -> &str {
            "recorder"
        }

        fn schema_changed(&self, change: &SchemaChange) -> Result<(), ObserverError> {
            self.seen.lock().unwrap().push(change.clone());
            Ok(())
        }
    }

    struct Flaky {
        failures_left: AtomicU32,
        calls: AtomicU32,
    }

    impl SchemaObserver for Flaky {
        fn observer_id(&self) -> &str {
            "flaky"
        }

        fn schema_changed(&self, _change: &SchemaChange) -> Result<(), ObserverError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.failures_left.load(Ordering::SeqCst) > 0 {
                self.failures_left.fetch_sub(1, Ordering::SeqCst);
                return Err(ObserverError::retryable("temporarily down"));
            }
            Ok(())
        }
    }

    struct Panicky;

    impl SchemaObserver for Panicky {
        fn observer_id(&self) -> &str {
            "panicky"
        }

        fn schema_changed(&self, _change: &SchemaChange) -> Result<(), ObserverError> {
            panic!("observer bug");
        }
    }

    fn fast_config() -> DispatcherConfig {
        DispatcherConfig {
            max_delivery_attempts: 3,
            retry_backoff: Duration::from_millis(1),
        }
    }

    #[test]
    fn delivers_changes_in_order() {
        let recorder = Arc::new(Recorder::default());
        let mut registry = ObserverRegistry::new();
        registry.register(recorder.clone()).unwrap();

        let (notifier, handle) = ChangeDispatcher::start(registry, fast_config()).unwrap();
        notifier.schema_changed(SchemaChange::new("p", "a", SchemaOperation::Create));
        notifier.schema_changed(SchemaChange::new("p", "b", SchemaOperation::Update));
        notifier.flush();

        let names: Vec<String> = recorder
            .seen
            .lock()
            .unwrap()
            .iter()
            .map(|change| change.schema_name.clone())
            .collect();
        assert_eq!(names, vec!["a", "b"]);

        let stats = handle.shutdown();
        assert_eq!(stats.delivered, 2);
    }

    #[test]
    fn retries_retryable_failures_until_success() {
        let flaky = Arc::new(Flaky {
            failures_left: AtomicU32::new(2),
            calls: AtomicU32::new(0),
        });
        let mut registry = ObserverRegistry::new();
        registry.register(flaky.clone()).unwrap();

        let (notifier, handle) = ChangeDispatcher::start(registry, fast_config()).unwrap();
        notifier.schema_changed(SchemaChange::new("p", "a", SchemaOperation::Delete));
        let stats = handle.shutdown();

        assert_eq!(flaky.calls.load(Ordering::SeqCst), 3);
        assert_eq!(stats.retried, 2);
        assert_eq!(stats.delivered, 1);
        assert_eq!(stats.failed, 0);
    }

    struct Rejecting {
        calls: AtomicU32,
    }

    impl SchemaObserver for Rejecting {
        fn observer_id(&self) -> &str {
            "rejecting"
        }

        fn schema_changed(&self, _change: &SchemaChange) -> Result<(), ObserverError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Err(ObserverError::permanent("schema not mirrored"))
        }
    }

    #[test]
    fn permanent_failures_are_not_retried() {
        let rejecting = Arc::new(Rejecting {
            calls: AtomicU32::new(0),
        });
        let mut registry = ObserverRegistry::new();
        registry.register(rejecting.clone()).unwrap();

        let (notifier, handle) = ChangeDispatcher::start(registry, fast_config()).unwrap();
        notifier.schema_changed(SchemaChange::new("p", "a", SchemaOperation::Update));
        let stats = handle.shutdown();

        assert_eq!(rejecting.calls.load(Ordering::SeqCst), 1);
        assert_eq!(stats.retried, 0);
        assert_eq!(stats.failed, 1);
    }

    #[test]
    fn observer_panic_does_not_stop_other_observers() {
        let recorder = Arc::new(Recorder::default());
        let mut registry = ObserverRegistry::new();
        registry.register(Arc::new(Panicky)).unwrap();
        registry.register(recorder.clone()).unwrap();

        let (notifier, handle) = ChangeDispatcher::start(registry, fast_config()).unwrap();
        notifier.schema_changed(SchemaChange::new("p", "a", SchemaOperation::Create));
        let stats = handle.shutdown();

        assert_eq!(recorder.seen.lock().unwrap().len(), 1);
        assert_eq!(stats.failed, 1);
        assert_eq!(stats.delivered, 1);
    }

    #[test]
    fn signalling_after_shutdown_is_silently_dropped() {
        let (notifier, handle) =
            ChangeDispatcher::start(ObserverRegistry::new(), fast_config()).unwrap();
        handle.shutdown();
        notifier.schema_changed(SchemaChange::new("p", "a", SchemaOperation::Create));
        notifier.flush();
    }
}
