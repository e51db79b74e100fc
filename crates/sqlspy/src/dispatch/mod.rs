//! Event dispatch: filtering, failure containment, delivery.
//!
//! The [`Dispatcher`] is shared by every spied object of one or more
//! connections. [`Dispatcher::publish`] never fails and never panics into
//! the caller: sink errors and sink panics are counted and reported on the
//! `sqlspy.dispatch` tracing target, then dropped.
//!
//! Two delivery modes:
//! - **inline**: the sink runs on the thread that executed the statement.
//! - **background**: events are queued on a bounded channel and a worker
//!   thread feeds the sink. A full queue drops the event instead of blocking.

mod filter;


pub(crate) use filter::accepts;

use crate::config::{ConfigHandle, SpyConfig};
use crate::event::{Category, ExecutionEvent};
use crate::sink::EventSink;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, RwLock};
use std::thread::JoinHandle;
use tokio::sync::mpsc;

/// Default queue capacity for [`Dispatcher::background`].
pub const DEFAULT_QUEUE_CAPACITY: usize = 4096;

struct Envelope {
    event: ExecutionEvent,
    config: Arc<SpyConfig>,
}

#[derive(Debug, Default)]
struct Counters {
    published: AtomicU64,
    filtered: AtomicU64,
    dropped: AtomicU64,
    sink_failures: AtomicU64,
}

enum Mode {
    Inline,
    Background {
        tx: RwLock<Option<mpsc::Sender<Envelope>>>,
        worker: Mutex<Option<JoinHandle<()>>>,
    },
}

/// Snapshot of dispatcher counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DispatchStats {
    /// Events handed to the sink (or queued for it).
    pub published: u64,
    /// Events rejected by the config snapshot.
    pub filtered: u64,
    /// Events dropped because the queue was full or closed.
    pub dropped: u64,
    /// Sink errors and panics.
    pub sink_failures: u64,
}

/// Routes execution events from spied statements to a sink.
pub struct Dispatcher {
    config: ConfigHandle,
    sink: Arc<dyn EventSink>,
    mode: Mode,
    counters: Arc<Counters>,
}

impl Dispatcher {
    /// Deliver on the calling thread.
    pub fn inline<S: EventSink + 'static>(sink: S) -> Self {
        Self::inline_arc(Arc::new(sink))
    }

    /// Deliver on the calling thread, from an Arc.
    pub fn inline_arc(sink: Arc<dyn EventSink>) -> Self {
        Self {
            config: ConfigHandle::default(),
            sink,
            mode: Mode::Inline,
            counters: Arc::new(Counters::default()),
        }
    }

    /// Deliver from a dedicated worker thread fed by a queue of `capacity` events.
    pub fn background<S: EventSink + 'static>(sink: S, capacity: usize) -> Self {
        Self::background_arc(Arc::new(sink), capacity)
    }

    /// Deliver from a dedicated worker thread, from an Arc.
    pub fn background_arc(sink: Arc<dyn EventSink>, capacity: usize) -> Self {
        let (tx, mut rx) = mpsc::channel::<Envelope>(capacity.max(1));
        let counters = Arc::new(Counters::default());

        let worker_sink = Arc::clone(&sink);
        let worker_counters = Arc::clone(&counters);
        let worker = std::thread::Builder::new()
            .name("sqlspy-dispatch".to_string())
            .spawn(move || {
                while let Some(envelope) = rx.blocking_recv() {
                    deliver(
                        worker_sink.as_ref(),
                        &envelope.event,
                        &envelope.config,
                        &worker_counters,
                    );
                }
                if let Err(e) = worker_sink.flush() {
                    worker_counters.sink_failures.fetch_add(1, Ordering::Relaxed);
                    tracing::warn!(target: "sqlspy.dispatch", error = %e, "sink flush failed");
                }
            });

        match worker {
            Ok(handle) => Self {
                config: ConfigHandle::default(),
                sink,
                mode: Mode::Background {
                    tx: RwLock::new(Some(tx)),
                    worker: Mutex::new(Some(handle)),
                },
                counters,
            },
            Err(e) => {
                tracing::warn!(
                    target: "sqlspy.dispatch",
                    error = %e,
                    "could not start dispatch worker; delivering inline"
                );
                Self {
                    config: ConfigHandle::default(),
                    sink,
                    mode: Mode::Inline,
                    counters,
                }
            }
        }
    }

    /// Use `config` as the initial policy.
    pub fn with_config(self, config: SpyConfig) -> Self {
        self.config.reload(config);
        self
    }

    /// Share an existing config handle (e.g. one reloaded elsewhere).
    pub fn with_config_handle(mut self, handle: ConfigHandle) -> Self {
        self.config = handle;
        self
    }

    /// Current config snapshot.
    pub fn config(&self) -> Arc<SpyConfig> {
        self.config.load()
    }

    pub fn config_handle(&self) -> &ConfigHandle {
        &self.config
    }

    /// Swap in a new policy. Executions already in flight finish under the old one.
    pub fn reload(&self, config: SpyConfig) {
        self.config.reload(config);
    }

    /// Whether `category` can be published under `config`. Lets callers skip
    /// rendering work for events that would be dropped anyway.
    pub fn wants(&self, config: &SpyConfig, category: Category) -> bool {
        config.is_category_enabled(category)
    }

    pub fn is_background(&self) -> bool {
        matches!(self.mode, Mode::Background { .. })
    }

    /// Filter and deliver `event`. Never fails.
    pub fn publish(&self, event: ExecutionEvent, config: &Arc<SpyConfig>) {
        if !accepts(config, &event) {
            self.counters.filtered.fetch_add(1, Ordering::Relaxed);
            return;
        }

        match &self.mode {
            Mode::Inline => {
                self.counters.published.fetch_add(1, Ordering::Relaxed);
                deliver(self.sink.as_ref(), &event, config, &self.counters);
            }
            Mode::Background { tx, .. } => {
                let guard = tx.read().unwrap_or_else(|e| e.into_inner());
                let Some(tx) = guard.as_ref() else {
                    self.counters.dropped.fetch_add(1, Ordering::Relaxed);
                    return;
                };
                let envelope = Envelope {
                    event,
                    config: Arc::clone(config),
                };
                match tx.try_send(envelope) {
                    Ok(()) => {
                        self.counters.published.fetch_add(1, Ordering::Relaxed);
                    }
                    Err(_) => {
                        let dropped = self.counters.dropped.fetch_add(1, Ordering::Relaxed) + 1;
                        // Rate-limit the fallback report.
                        if dropped.is_power_of_two() {
                            tracing::warn!(
                                target: "sqlspy.dispatch",
                                dropped,
                                "dispatch queue full; dropping events"
                            );
                        }
                    }
                }
            }
        }
    }

    /// Stop accepting events, drain the queue and flush the sink.
    ///
    /// For inline dispatch this only flushes. Later publishes on a shut-down
    /// background dispatcher are dropped.
    pub fn shutdown(&self) {
        match &self.mode {
            Mode::Inline => {
                if let Err(e) = self.sink.flush() {
                    self.counters.sink_failures.fetch_add(1, Ordering::Relaxed);
                    tracing::warn!(target: "sqlspy.dispatch", error = %e, "sink flush failed");
                }
            }
            Mode::Background { tx, worker } => {
                tx.write().unwrap_or_else(|e| e.into_inner()).take();
                let handle = worker.lock().unwrap_or_else(|e| e.into_inner()).take();
                if let Some(handle) = handle {
                    if handle.join().is_err() {
                        tracing::warn!(target: "sqlspy.dispatch", "dispatch worker panicked");
                    }
                }
            }
        }
    }

    pub fn stats(&self) -> DispatchStats {
        DispatchStats {
            published: self.counters.published.load(Ordering::Relaxed),
            filtered: self.counters.filtered.load(Ordering::Relaxed),
            dropped: self.counters.dropped.load(Ordering::Relaxed),
            sink_failures: self.counters.sink_failures.load(Ordering::Relaxed),
        }
    }
}

impl Drop for Dispatcher {
    fn drop(&mut self) {
        if let Mode::Background { tx, .. } = &self.mode {
            tx.write().unwrap_or_else(|e| e.into_inner()).take();
        }
    }
}

fn deliver(sink: &dyn EventSink, event: &ExecutionEvent, config: &SpyConfig, counters: &Counters) {
    let result = panic::catch_unwind(AssertUnwindSafe(|| sink.publish(event, config)));
    match result {
        Ok(Ok(())) => {}
        Ok(Err(e)) => {
            counters.sink_failures.fetch_add(1, Ordering::Relaxed);
            tracing::warn!(
                target: "sqlspy.dispatch",
                error = %e,
                category = %event.category,
                connection_id = event.connection_id,
                "sink failed to publish event"
            );
        }
        Err(_) => {
            counters.sink_failures.fetch_add(1, Ordering::Relaxed);
            tracing::warn!(
                target: "sqlspy.dispatch",
                category = %event.category,
                connection_id = event.connection_id,
                "sink panicked while publishing event"
            );
        }
    }
}
