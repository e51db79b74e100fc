use super::*;
use crate::config::LogFormat;
use crate::event::{Category, Outcome, StatementKind};
use chrono::{TimeZone, Utc};
use std::time::Duration;

fn event(kind: StatementKind, template: &str, rendered: &str) -> ExecutionEvent {
    ExecutionEvent::new(7, Category::Statement, kind, template)
        .with_rendered_sql(rendered)
        .with_timing(
            Utc.with_ymd_and_hms(2024, 3, 9, 13, 5, 0).unwrap(),
            Duration::from_millis(12),
        )
}

struct FailingSink;

impl EventSink for FailingSink {
    fn publish(&self, _event: &ExecutionEvent, _config: &SpyConfig) -> Result<(), SinkError> {
        Err(SinkError::Unavailable("down".into()))
    }
}

struct PanickingSink;

impl EventSink for PanickingSink {
    fn publish(&self, _event: &ExecutionEvent, _config: &SpyConfig) -> Result<(), SinkError> {
        panic!("sink exploded");
    }

    fn flush(&self) -> Result<(), SinkError> {
        panic!("flush exploded");
    }
}

#[test]
fn line_format_has_all_columns() {
    let e = event(
        StatementKind::Prepared,
        "SELECT * FROM t WHERE id = ?",
        "SELECT * FROM t WHERE id = 5",
    );
    let line = format_line(&e, &SpyConfig::default());
    assert_eq!(
        line,
        "2024-03-09 13:05:00.000|12|statement|connection 7|prepared|SELECT * FROM t WHERE id = ?|SELECT * FROM t WHERE id = 5"
    );
}

#[test]
fn line_format_flattens_newlines_and_truncates() {
    let e = event(
        StatementKind::Plain,
        "SELECT a,\n  b FROM t",
        "SELECT a,\n  b FROM t",
    );
    let line = format_line(&e, &SpyConfig::new().with_max_sql_length(8));
    assert!(!line.contains('\n'));
    assert!(line.ends_with("|SELECT a...|SELECT a..."));
}

#[test]
fn line_format_appends_parameters_and_errors() {
    let mut e = event(StatementKind::Callable, "{call p(?,?)}", "{call p(?,?)}");
    e.parameters = vec![
        ("a".to_string(), "1".to_string()),
        ("b".to_string(), "'x'".to_string()),
    ];
    e.outcome = Outcome::failure("relation does not exist");

    let line = format_line(&e, &SpyConfig::default());
    assert!(line.ends_with("|{call p(?,?)} a:1, b:'x'|error: relation does not exist"));
}

#[test]
fn json_format_is_one_object() {
    let e = event(StatementKind::Plain, "SELECT 1", "SELECT 1");
    let config = SpyConfig::new().with_log_format(LogFormat::Json);
    let text = format_event(&e, &config).unwrap();

    let value: serde_json::Value = serde_json::from_str(&text).unwrap();
    assert_eq!(value["connection_id"], 7);
    assert_eq!(value["category"], "statement");
    assert_eq!(value["kind"], "plain");
    assert_eq!(value["rendered_sql"], "SELECT 1");
    assert_eq!(value["outcome"]["status"], "success");
    assert!(value.get("unbound").is_none());
}

#[test]
fn memory_sink_records_events_and_lines() {
    let sink = MemorySink::new();
    let config = SpyConfig::default();
    sink.publish(&event(StatementKind::Plain, "SELECT 1", "SELECT 1"), &config)
        .unwrap();
    sink.publish(&event(StatementKind::Plain, "SELECT 2", "SELECT 2"), &config)
        .unwrap();

    assert_eq!(sink.len(), 2);
    assert_eq!(sink.last_event().unwrap().template, "SELECT 2");
    assert!(sink.lines()[0].ends_with("|SELECT 1|SELECT 1"));

    sink.clear();
    assert!(sink.is_empty());
}

#[test]
fn composite_sink_reaches_every_sink_and_reports_first_error() {
    let memory = Arc::new(MemorySink::new());
    let sink = CompositeSink::new()
        .add(FailingSink)
        .add_arc(memory.clone());
    assert_eq!(sink.len(), 2);

    let result = sink.publish(
        &event(StatementKind::Plain, "SELECT 1", "SELECT 1"),
        &SpyConfig::default(),
    );
    assert!(matches!(result, Err(SinkError::Unavailable(_))));
    assert_eq!(memory.len(), 1);
}

#[test]
fn composite_sink_contains_a_panicking_sink() {
    let memory = Arc::new(MemorySink::new());
    let sink = CompositeSink::new()
        .add(PanickingSink)
        .add_arc(memory.clone());

    let result = sink.publish(
        &event(StatementKind::Plain, "SELECT 1", "SELECT 1"),
        &SpyConfig::default(),
    );
    assert!(matches!(result, Err(SinkError::Panicked(ref msg)) if msg == "sink exploded"));
    assert_eq!(memory.len(), 1);

    assert!(matches!(sink.flush(), Err(SinkError::Panicked(_))));
}

#[test]
fn stats_sink_counts_by_kind() {
    let stats = StatsSink::new();
    let config = SpyConfig::default();

    stats
        .publish(&event(StatementKind::Plain, "SELECT 1", "SELECT 1"), &config)
        .unwrap();
    stats
        .publish(
            &event(StatementKind::Prepared, "SELECT ?", "SELECT 1")
                .with_timing(Utc::now(), Duration::from_millis(40))
                .with_outcome(Outcome::failure("boom")),
            &config,
        )
        .unwrap();
    stats
        .publish(
            &ExecutionEvent::new(7, Category::Commit, StatementKind::Connection, "COMMIT"),
            &config,
        )
        .unwrap();

    let s = stats.stats();
    assert_eq!(s.total_events, 3);
    assert_eq!(s.failed_events, 1);
    assert_eq!(s.plain_count, 1);
    assert_eq!(s.prepared_count, 1);
    assert_eq!(s.commit_count, 1);
    assert_eq!(s.max_duration, Duration::from_millis(40));
    assert_eq!(s.slowest_template.as_deref(), Some("SELECT ?"));

    stats.reset();
    assert_eq!(stats.stats(), SpyStats::default());
}

#[test]
fn file_sink_appends_lines() {
    let path = std::env::temp_dir().join(format!(
        "sqlspy_file_sink_{}_{}.log",
        std::process::id(),
        Utc::now().timestamp_nanos_opt().unwrap_or_default()
    ));

    {
        let sink = FileSink::create(&path).unwrap();
        let config = SpyConfig::default();
        sink.publish(&event(StatementKind::Plain, "SELECT 1", "SELECT 1"), &config)
            .unwrap();
        sink.publish(&event(StatementKind::Plain, "SELECT 2", "SELECT 2"), &config)
            .unwrap();
        sink.flush().unwrap();
    }
    {
        let sink = FileSink::open(&path).unwrap();
        sink.publish(
            &event(StatementKind::Plain, "SELECT 3", "SELECT 3"),
            &SpyConfig::default(),
        )
        .unwrap();
    }

    let text = std::fs::read_to_string(&path).unwrap();
    let _ = std::fs::remove_file(&path);
    let lines: Vec<&str> = text.lines().collect();
    assert_eq!(lines.len(), 3);
    assert!(lines[2].ends_with("|SELECT 3|SELECT 3"));
}
