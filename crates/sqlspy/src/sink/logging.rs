use super::EventSink;
use super::format::format_event;
use crate::config::SpyConfig;
use crate::error::SinkError;
use crate::event::ExecutionEvent;
use std::io::Write;
use std::time::Duration;

/// A sink that prints events to stderr.
#[derive(Debug, Clone)]
pub struct LoggingSink {
    /// Minimum duration to log, on top of the config threshold.
    pub min_duration: Option<Duration>,
    /// Prefix for log lines.
    pub prefix: String,
}

impl Default for LoggingSink {
    fn default() -> Self {
        Self {
            min_duration: None,
            prefix: "[sqlspy]".to_string(),
        }
    }
}

impl LoggingSink {
    /// Create a new logging sink.
    pub fn new() -> Self {
        Self::default()
    }

    /// Only log events slower than this duration.
    pub fn min_duration(mut self, duration: Duration) -> Self {
        self.min_duration = Some(duration);
        self
    }

    /// Set prefix for log lines.
    pub fn prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = prefix.into();
        self
    }
}

impl EventSink for LoggingSink {
    fn publish(&self, event: &ExecutionEvent, config: &SpyConfig) -> Result<(), SinkError> {
        if let Some(min) = self.min_duration {
            if event.duration() < min {
                return Ok(());
            }
        }

        let line = format_event(event, config)?;
        let mut stderr = std::io::stderr().lock();
        writeln!(stderr, "{} {}", self.prefix, line)?;
        Ok(())
    }
}
