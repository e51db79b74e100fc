use super::EventSink;
use crate::config::SpyConfig;
use crate::error::SinkError;
use crate::event::{Category, ExecutionEvent, StatementKind};
use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

/// A sink that aggregates execution statistics.
#[derive(Debug, Default)]
pub struct StatsSink {
    total_events: AtomicU64,
    failed_events: AtomicU64,
    total_duration_micros: AtomicU64,
    max_duration_micros: AtomicU64,
    plain_count: AtomicU64,
    prepared_count: AtomicU64,
    callable_count: AtomicU64,
    batch_count: AtomicU64,
    commit_count: AtomicU64,
    rollback_count: AtomicU64,
    slowest_template: Mutex<Option<String>>,
}

/// Collected statistics.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SpyStats {
    /// Total number of events received.
    pub total_events: u64,
    /// Events whose outcome was a failure.
    pub failed_events: u64,
    /// Sum of event durations.
    pub total_duration: Duration,
    /// Slowest event duration.
    pub max_duration: Duration,
    /// Plain statement executions.
    pub plain_count: u64,
    /// Prepared statement executions.
    pub prepared_count: u64,
    /// Callable statement executions.
    pub callable_count: u64,
    /// Batch executions.
    pub batch_count: u64,
    pub commit_count: u64,
    pub rollback_count: u64,
    /// Template of the slowest event.
    pub slowest_template: Option<String>,
}

impl StatsSink {
    /// Create a new stats sink.
    pub fn new() -> Self {
        Self::default()
    }

    /// Get a snapshot of current statistics.
    pub fn stats(&self) -> SpyStats {
        SpyStats {
            total_events: self.total_events.load(Ordering::Relaxed),
            failed_events: self.failed_events.load(Ordering::Relaxed),
            total_duration: Duration::from_micros(
                self.total_duration_micros.load(Ordering::Relaxed),
            ),
            max_duration: Duration::from_micros(self.max_duration_micros.load(Ordering::Relaxed)),
            plain_count: self.plain_count.load(Ordering::Relaxed),
            prepared_count: self.prepared_count.load(Ordering::Relaxed),
            callable_count: self.callable_count.load(Ordering::Relaxed),
            batch_count: self.batch_count.load(Ordering::Relaxed),
            commit_count: self.commit_count.load(Ordering::Relaxed),
            rollback_count: self.rollback_count.load(Ordering::Relaxed),
            slowest_template: self.slowest_template.lock().unwrap().clone(),
        }
    }

    /// Reset all statistics.
    pub fn reset(&self) {
        for counter in [
            &self.total_events,
            &self.failed_events,
            &self.total_duration_micros,
            &self.max_duration_micros,
            &self.plain_count,
            &self.prepared_count,
            &self.callable_count,
            &self.batch_count,
            &self.commit_count,
            &self.rollback_count,
        ] {
            counter.store(0, Ordering::Relaxed);
        }
        *self.slowest_template.lock().unwrap() = None;
    }
}

impl EventSink for StatsSink {
    fn publish(&self, event: &ExecutionEvent, _config: &SpyConfig) -> Result<(), SinkError> {
        let micros = event.duration_micros;

        self.total_events.fetch_add(1, Ordering::Relaxed);
        let prev_total = self
            .total_duration_micros
            .fetch_add(micros, Ordering::Relaxed);
        if prev_total.checked_add(micros).is_none() {
            // Saturate instead of wrapping on overflow.
            self.total_duration_micros.store(u64::MAX, Ordering::Relaxed);
        }

        if !event.outcome.is_success() {
            self.failed_events.fetch_add(1, Ordering::Relaxed);
        }

        let counter = match (event.category, event.kind) {
            (Category::Commit, _) => Some(&self.commit_count),
            (Category::Rollback, _) => Some(&self.rollback_count),
            (Category::Statement, StatementKind::Plain) => Some(&self.plain_count),
            (Category::Statement, StatementKind::Prepared) => Some(&self.prepared_count),
            (Category::Statement, StatementKind::Callable) => Some(&self.callable_count),
            (Category::Statement, StatementKind::Batch) => Some(&self.batch_count),
            _ => None,
        };
        if let Some(counter) = counter {
            counter.fetch_add(1, Ordering::Relaxed);
        }

        let mut current_max = self.max_duration_micros.load(Ordering::Relaxed);
        while micros > current_max {
            match self.max_duration_micros.compare_exchange_weak(
                current_max,
                micros,
                Ordering::Relaxed,
                Ordering::Relaxed,
            ) {
                Ok(_) => {
                    *self.slowest_template.lock().unwrap() = Some(event.template.clone());
                    break;
                }
                Err(updated) => current_max = updated,
            }
        }
        Ok(())
    }
}
