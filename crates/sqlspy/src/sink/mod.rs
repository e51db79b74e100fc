//! Event sinks: where execution events end up.
//!
//! A sink receives each accepted [`ExecutionEvent`] together with the config
//! snapshot it was produced under. Sinks may fail; the dispatcher contains
//! the failure so it never reaches the statement caller.
//!
//! # Example
//!
//! ```rust,ignore
//! use sqlspy::sink::{CompositeSink, LoggingSink, StatsSink};
//!
//! let stats = Arc::new(StatsSink::new());
//! let sink = CompositeSink::new()
//!     .add(LoggingSink::new().prefix("[app-sql]"))
//!     .add_arc(stats.clone());
//! ```

mod file;
mod format;
mod logging;
mod memory;
mod stats;
mod tracing_sink;

#[cfg(test)]
mod tests;

pub use file::FileSink;
pub use format::{format_event, format_json, format_line};
pub use logging::LoggingSink;
pub use memory::MemorySink;
pub use stats::{SpyStats, StatsSink};
pub use tracing_sink::TracingSink;

use crate::config::SpyConfig;
use crate::error::SinkError;
use crate::event::ExecutionEvent;
use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

/// Destination for execution events.
///
/// Called from whichever thread executed the statement (inline dispatch) or
/// from the dispatcher's worker thread, so implementations must be `Send + Sync`.
pub trait EventSink: Send + Sync {
    /// Deliver one event.
    fn publish(&self, event: &ExecutionEvent, config: &SpyConfig) -> Result<(), SinkError>;

    /// Flush buffered output. Default implementation does nothing.
    fn flush(&self) -> Result<(), SinkError> {
        Ok(())
    }
}

impl<S: EventSink + ?Sized> EventSink for Arc<S> {
    fn publish(&self, event: &ExecutionEvent, config: &SpyConfig) -> Result<(), SinkError> {
        (**self).publish(event, config)
    }

    fn flush(&self) -> Result<(), SinkError> {
        (**self).flush()
    }
}

/// A sink that discards everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopSink;

impl EventSink for NoopSink {
    fn publish(&self, _event: &ExecutionEvent, _config: &SpyConfig) -> Result<(), SinkError> {
        Ok(())
    }
}

/// A sink that fans events out to several sinks.
///
/// Every sink sees every event even if an earlier one fails or panics; the
/// first failure is returned.
pub struct CompositeSink {
    sinks: Vec<Arc<dyn EventSink>>,
}

impl CompositeSink {
    /// Create an empty composite sink.
    pub fn new() -> Self {
        Self { sinks: Vec::new() }
    }

    /// Add a sink.
    #[allow(clippy::should_implement_trait)]
    pub fn add<S: EventSink + 'static>(mut self, sink: S) -> Self {
        self.sinks.push(Arc::new(sink));
        self
    }

    /// Add an Arc-wrapped sink.
    pub fn add_arc(mut self, sink: Arc<dyn EventSink>) -> Self {
        self.sinks.push(sink);
        self
    }

    pub fn len(&self) -> usize {
        self.sinks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sinks.is_empty()
    }
}

impl Default for CompositeSink {
    fn default() -> Self {
        Self::new()
    }
}

impl EventSink for CompositeSink {
    fn publish(&self, event: &ExecutionEvent, config: &SpyConfig) -> Result<(), SinkError> {
        let mut first_err = None;
        for sink in &self.sinks {
            if let Err(e) = contain(|| sink.publish(event, config)) {
                first_err.get_or_insert(e);
            }
        }
        first_err.map_or(Ok(()), Err)
    }

    fn flush(&self) -> Result<(), SinkError> {
        let mut first_err = None;
        for sink in &self.sinks {
            if let Err(e) = contain(|| sink.flush()) {
                first_err.get_or_insert(e);
            }
        }
        first_err.map_or(Ok(()), Err)
    }
}

/// Run one nested sink call, turning a panic into [`SinkError::Panicked`].
fn contain(f: impl FnOnce() -> Result<(), SinkError>) -> Result<(), SinkError> {
    panic::catch_unwind(AssertUnwindSafe(f))
        .unwrap_or_else(|payload| Err(SinkError::Panicked(panic_message(payload.as_ref()))))
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
