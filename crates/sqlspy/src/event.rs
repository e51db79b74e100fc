//! Execution events handed to sinks.

use crate::render::{Rendered, format_parameters};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// Log category of an event. Categories can be filtered in [`crate::SpyConfig`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    /// A statement execution.
    Statement,
    /// An entry added to a batch.
    Batch,
    Commit,
    Rollback,
    /// A result-set cursor move (`next`).
    Result,
    /// Column values read from one result-set row.
    ResultSet,
}

impl Category {
    pub const ALL: [Category; 6] = [
        Category::Statement,
        Category::Batch,
        Category::Commit,
        Category::Rollback,
        Category::Result,
        Category::ResultSet,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Category::Statement => "statement",
            Category::Batch => "batch",
            Category::Commit => "commit",
            Category::Rollback => "rollback",
            Category::Result => "result",
            Category::ResultSet => "resultset",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which kind of statement produced an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StatementKind {
    Plain,
    Prepared,
    Callable,
    Batch,
    /// Connection-level operations (commit, rollback).
    Connection,
}

impl StatementKind {
    pub fn as_str(self) -> &'static str {
        match self {
            StatementKind::Plain => "statement",
            StatementKind::Prepared => "prepared",
            StatementKind::Callable => "callable",
            StatementKind::Batch => "batch",
            StatementKind::Connection => "connection",
        }
    }
}

impl fmt::Display for StatementKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Maximum length for error messages in [`Outcome::Failure`].
const MAX_ERROR_LEN: usize = 512;

/// How the delegate call ended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Outcome {
    Success,
    /// The delegate returned an error (message truncated to 512 bytes).
    Failure { error: String },
}

impl Outcome {
    /// Create a failure outcome, truncating the message to avoid log explosion.
    pub fn failure(msg: impl Into<String>) -> Self {
        let msg = msg.into();
        if msg.len() > MAX_ERROR_LEN {
            let truncated = crate::truncate_bytes(&msg, MAX_ERROR_LEN);
            Self::Failure {
                error: format!("{truncated}..."),
            }
        } else {
            Self::Failure { error: msg }
        }
    }

    /// Outcome of a delegate result. The error is only read, never consumed.
    pub fn of<T, E: fmt::Display>(result: &Result<T, E>) -> Self {
        match result {
            Ok(_) => Self::Success,
            Err(e) => Self::failure(e.to_string()),
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success)
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Outcome::Success => f.write_str("ok"),
            Outcome::Failure { error } => write!(f, "error: {error}"),
        }
    }
}

/// One observed call: what ran, how it rendered, how long it took, how it ended.
///
/// Built once per call by the spy layer and handed to the dispatcher.
#[derive(Debug, Clone, Serialize)]
pub struct ExecutionEvent {
    pub connection_id: u64,
    pub category: Category,
    pub kind: StatementKind,
    /// SQL as supplied by the caller.
    pub template: String,
    /// SQL with bound values substituted, or the template when that is not possible.
    pub rendered_sql: String,
    /// Rendered entries of an executed batch.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub batch: Vec<String>,
    /// `(identifier, literal)` pairs when named parameters kept the template unresolved.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub parameters: Vec<(String, String)>,
    /// Positional markers that had no binding.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub unbound: Vec<usize>,
    pub started_at: DateTime<Utc>,
    pub duration_micros: u64,
    pub outcome: Outcome,
}

impl ExecutionEvent {
    /// Create an event with the template as rendered SQL, zero duration and success.
    pub fn new(
        connection_id: u64,
        category: Category,
        kind: StatementKind,
        template: impl Into<String>,
    ) -> Self {
        let template = template.into();
        Self {
            connection_id,
            category,
            kind,
            rendered_sql: template.clone(),
            template,
            batch: Vec::new(),
            parameters: Vec::new(),
            unbound: Vec::new(),
            started_at: Utc::now(),
            duration_micros: 0,
            outcome: Outcome::Success,
        }
    }

    /// Take rendered SQL, unbound markers and named parameters from a rendering.
    pub fn with_rendered(mut self, rendered: Rendered) -> Self {
        self.rendered_sql = rendered.sql;
        self.unbound = rendered.unbound;
        self.parameters = rendered.parameters;
        self
    }

    pub fn with_rendered_sql(mut self, sql: impl Into<String>) -> Self {
        self.rendered_sql = sql.into();
        self
    }

    /// Attach batch entries; the rendered SQL becomes the entries joined by `"; "`.
    pub fn with_batch(mut self, entries: Vec<String>) -> Self {
        self.rendered_sql = entries.join("; ");
        self.batch = entries;
        self
    }

    pub fn with_timing(mut self, started_at: DateTime<Utc>, duration: Duration) -> Self {
        self.started_at = started_at;
        self.duration_micros = u64::try_from(duration.as_micros()).unwrap_or(u64::MAX);
        self
    }

    pub fn with_outcome(mut self, outcome: Outcome) -> Self {
        self.outcome = outcome;
        self
    }

    pub fn duration(&self) -> Duration {
        Duration::from_micros(self.duration_micros)
    }

    /// `name:value, ...` trailer for unresolved templates, empty otherwise.
    pub fn parameter_trailer(&self) -> String {
        format_parameters(&self.parameters)
    }
}
