//! Call interception: driver-trait implementations that forward to a
//! delegate while recording bindings and timing.
//!
//! Wrap a connection once; every statement and result set obtained from it
//! is spied as well:
//!
//! ```rust,ignore
//! use sqlspy::{Dispatcher, SpyConnection, sink::TracingSink};
//!
//! let dispatcher = Arc::new(Dispatcher::inline(TracingSink::new()));
//! let mut conn = SpyConnection::new(pg_conn, dispatcher);
//!
//! let mut stmt = conn.prepare_call("{call test_proc(?,?,?)}")?;
//! stmt.set_i32(1, 1)?;
//! stmt.set_string(2, "hi")?;
//! stmt.register_out_parameter(3, SqlType::Integer)?;
//! stmt.execute().await?;   // logs {call test_proc(1,'hi',?)}
//! ```
//!
//! Delegate results, including errors, are returned to the caller exactly
//! as the delegate produced them.

mod connection;
mod prepared;
mod result_set;
mod statement;


pub use connection::SpyConnection;
pub use prepared::SpyPreparedStatement;
pub use result_set::SpyResultSet;
pub use statement::SpyStatement;

use crate::config::SpyConfig;
use crate::dispatch::Dispatcher;
use crate::event::{Category, ExecutionEvent, Outcome, StatementKind};
use chrono::{DateTime, Utc};
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::time::Instant;

/// What every spied object of one connection shares.
#[derive(Clone)]
pub(crate) struct SpyContext {
    pub(crate) connection_id: u64,
    pub(crate) dispatcher: Arc<Dispatcher>,
}

/// Timing of one observed call, started only when its category is wanted.
pub(crate) struct Probe {
    config: Arc<SpyConfig>,
    started_at: DateTime<Utc>,
    start: Instant,
}

impl SpyContext {
    pub(crate) fn new(connection_id: u64, dispatcher: Arc<Dispatcher>) -> Self {
        Self {
            connection_id,
            dispatcher,
        }
    }

    /// Load the config snapshot and start timing, or `None` when `category`
    /// would be dropped anyway.
    pub(crate) fn probe(&self, category: Category) -> Option<Probe> {
        let config = self.dispatcher.config();
        if !self.dispatcher.wants(&config, category) {
            return None;
        }
        Some(Probe {
            config,
            started_at: Utc::now(),
            start: Instant::now(),
        })
    }

    pub(crate) fn event(
        &self,
        category: Category,
        kind: StatementKind,
        template: impl Into<String>,
    ) -> ExecutionEvent {
        ExecutionEvent::new(self.connection_id, category, kind, template)
    }

    /// Stop the clock, build the event and publish it.
    ///
    /// `build` runs after the delegate returned, so rendering is not part of
    /// the measured duration. A panic while building is reported and
    /// swallowed.
    pub(crate) fn finish<T, E: std::fmt::Display>(
        &self,
        probe: Probe,
        result: &Result<T, E>,
        build: impl FnOnce(&SpyConfig) -> ExecutionEvent,
    ) {
        let elapsed = probe.start.elapsed();
        let outcome = Outcome::of(result);
        match panic::catch_unwind(AssertUnwindSafe(|| build(&probe.config))) {
            Ok(event) => {
                let event = event
                    .with_timing(probe.started_at, elapsed)
                    .with_outcome(outcome);
                self.dispatcher.publish(event, &probe.config);
            }
            Err(_) => {
                tracing::warn!(
                    target: "sqlspy.dispatch",
                    connection_id = self.connection_id,
                    "failed to assemble execution event"
                );
            }
        }
    }

    /// Publish an event that has no delegate call to time.
    pub(crate) fn emit(&self, probe: Probe, build: impl FnOnce(&SpyConfig) -> ExecutionEvent) {
        self.finish::<(), std::convert::Infallible>(probe, &Ok(()), build);
    }
}
