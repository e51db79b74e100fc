use crate::config::{LogFormat, SpyConfig};
use crate::error::SinkError;
use crate::event::ExecutionEvent;
use std::fmt::Write;

fn push_sql(out: &mut String, sql: &str, max_len: Option<usize>) {
    let (sql, truncated) = match max_len {
        Some(max) if sql.len() > max => (crate::truncate_bytes(sql, max), true),
        _ => (sql, false),
    };
    // Keep one event per line.
    for c in sql.chars() {
        out.push(match c {
            '\n' | '\r' => ' ',
            c => c,
        });
    }
    if truncated {
        out.push_str("...");
    }
}

/// Single-line text form:
/// `started_at|elapsed_ms|category|connection N|kind|template|rendered`.
///
/// When named parameters kept the template unresolved, the rendered column
/// is followed by ` name:value, ...`. Failures append `|error: ...`.
pub fn format_line(event: &ExecutionEvent, config: &SpyConfig) -> String {
    let mut line = String::with_capacity(64 + event.template.len() + event.rendered_sql.len());
    let _ = write!(
        line,
        "{}|{}|{}|connection {}|{}|",
        event.started_at.format("%Y-%m-%d %H:%M:%S%.3f"),
        event.duration_micros / 1000,
        event.category,
        event.connection_id,
        event.kind,
    );
    push_sql(&mut line, &event.template, config.max_sql_length);
    line.push('|');
    push_sql(&mut line, &event.rendered_sql, config.max_sql_length);
    if !event.parameters.is_empty() {
        line.push(' ');
        line.push_str(&event.parameter_trailer());
    }
    if !event.outcome.is_success() {
        let _ = write!(line, "|{}", event.outcome);
    }
    line
}

/// One JSON object.
pub fn format_json(event: &ExecutionEvent) -> Result<String, SinkError> {
    Ok(serde_json::to_string(event)?)
}

/// Format per `config.log_format`.
pub fn format_event(event: &ExecutionEvent, config: &SpyConfig) -> Result<String, SinkError> {
    match config.log_format {
        LogFormat::SingleLine => Ok(format_line(event, config)),
        LogFormat::Json => format_json(event),
    }
}
