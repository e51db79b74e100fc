use super::EventSink;
use crate::config::SpyConfig;
use crate::error::SinkError;
use crate::event::ExecutionEvent;
use tracing::Level;

/// A `tracing`-based sink emitting one event per execution on target `sqlspy.sql`.
///
/// Successful executions are emitted at `level`, failed ones at `failure_level`.
#[derive(Debug, Clone)]
pub struct TracingSink {
    /// Tracing event level for successful executions.
    pub level: Level,
    /// Tracing event level for failed executions.
    pub failure_level: Level,
}

impl Default for TracingSink {
    fn default() -> Self {
        Self {
            level: Level::DEBUG,
            failure_level: Level::WARN,
        }
    }
}

impl TracingSink {
    /// Create a new sink with defaults.
    pub fn new() -> Self {
        Self::default()
    }

    /// Override the level for successful executions.
    pub fn level(mut self, level: Level) -> Self {
        self.level = level;
        self
    }

    /// Override the level for failed executions.
    pub fn failure_level(mut self, level: Level) -> Self {
        self.failure_level = level;
        self
    }
}

fn truncate(sql: &str, max: Option<usize>) -> std::borrow::Cow<'_, str> {
    match max {
        Some(max) if sql.len() > max => format!("{}...", crate::truncate_bytes(sql, max)).into(),
        _ => sql.into(),
    }
}

impl EventSink for TracingSink {
    fn publish(&self, event: &ExecutionEvent, config: &SpyConfig) -> Result<(), SinkError> {
        /// Dispatch a tracing event at a runtime-determined level.
        macro_rules! emit_at_level {
            ($level:expr, $($field:tt)*) => {
                match $level {
                    Level::ERROR => tracing::error!($($field)*),
                    Level::WARN  => tracing::warn!($($field)*),
                    Level::INFO  => tracing::info!($($field)*),
                    Level::DEBUG => tracing::debug!($($field)*),
                    _ => tracing::trace!($($field)*),
                }
            };
        }

        let sql = truncate(&event.rendered_sql, config.max_sql_length);
        let template = truncate(&event.template, config.max_sql_length);
        let params = event.parameter_trailer();
        let level = if event.outcome.is_success() {
            self.level
        } else {
            self.failure_level
        };

        emit_at_level!(
            level,
            target: "sqlspy.sql",
            category = %event.category,
            kind = %event.kind,
            connection_id = event.connection_id,
            elapsed_us = event.duration_micros,
            outcome = %event.outcome,
            template = %template,
            params = %params,
            sql = %sql,
            "sql executed"
        );
        Ok(())
    }
}
