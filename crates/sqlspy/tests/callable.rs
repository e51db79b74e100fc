//! Callable statement logging through a scripted driver.

mod common;

use common::{MockDb, events_of, spied};
use sqlspy::prelude::*;
use sqlspy::{Category, Resolution, StatementKind};

#[tokio::test]
async fn positional_call_renders_bound_values() -> DriverResult<()> {
    let db = MockDb::new();
    let (mut conn, sink) = spied(&db, SpyConfig::new());

    let mut call = conn.prepare_call("{call test_proc(?,?)}")?;
    call.set_i32(1, 1)?;
    call.set_string(2, "hi")?;
    call.execute().await?;

    let event = sink.last_event().expect("statement event");
    assert_eq!(event.category, Category::Statement);
    assert_eq!(event.kind, StatementKind::Callable);
    assert_eq!(event.template, "{call test_proc(?,?)}");
    assert_eq!(event.rendered_sql, "{call test_proc(1,'hi')}");
    assert!(event.outcome.is_success());
    Ok(())
}

#[tokio::test]
async fn null_parameter_renders_as_bare_null() -> DriverResult<()> {
    let db = MockDb::new();
    let (mut conn, sink) = spied(&db, SpyConfig::new());

    let mut call = conn.prepare_call("{call test_proc(?,?)}")?;
    call.set_i32(1, 1)?;
    call.set_null(2, SqlType::Varchar)?;
    call.execute().await?;

    let event = sink.last_event().expect("statement event");
    assert_eq!(event.rendered_sql, "{call test_proc(1,NULL)}");
    Ok(())
}

#[tokio::test]
async fn out_parameter_keeps_its_marker() -> DriverResult<()> {
    let db = MockDb::new();
    db.with_out_value(SqlValue::Int(42));
    let (mut conn, sink) = spied(&db, SpyConfig::new());

    let mut call = conn.prepare_call("{call test_proc(?,?,?)}")?;
    call.set_i32(1, 1)?;
    call.set_string(2, "hi")?;
    call.register_out_parameter(3, SqlType::Integer)?;
    call.execute().await?;

    let event = sink.last_event().expect("statement event");
    assert_eq!(event.rendered_sql, "{call test_proc(1,'hi',?)}");
    assert!(event.unbound.is_empty());

    // OUT reads pass straight through.
    assert_eq!(call.get_value(3)?, SqlValue::Int(42));
    assert_eq!(call.get::<i32>(3)?, 42);
    assert!(!call.was_null()?);
    Ok(())
}

#[tokio::test]
async fn named_parameters_leave_template_verbatim() -> DriverResult<()> {
    let db = MockDb::new();
    let (mut conn, sink) = spied(&db, SpyConfig::new());

    let mut call = conn.prepare_call("{call test_proc(?,?)}")?;
    call.set_named_i32("param1", 1)?;
    call.set_named_string("param2", "hi")?;
    call.execute().await?;

    let event = sink.last_event().expect("statement event");
    assert_eq!(event.template, "{call test_proc(?,?)}");
    assert_eq!(event.rendered_sql, "{call test_proc(?,?)}");
    assert_eq!(event.parameter_trailer(), "param1:1, param2:'hi'");

    let rendered = sqlspy::render(
        call.template(),
        &call.bindings(),
        &SpyConfig::new().render,
    );
    assert_eq!(rendered.resolution, Resolution::Template);
    Ok(())
}

#[tokio::test]
async fn function_escape_with_return_value() -> DriverResult<()> {
    let db = MockDb::new();
    let (mut conn, sink) = spied(&db, SpyConfig::new());

    let mut call = conn.prepare_call("{? = call f(?)}")?;
    call.register_out_parameter(1, SqlType::Integer)?;
    call.set_i32(2, 5)?;
    call.execute().await?;

    let event = sink.last_event().expect("statement event");
    assert_eq!(event.rendered_sql, "{? = call f(5)}");
    Ok(())
}

#[tokio::test]
async fn unbound_parameter_is_marked_not_invented() -> DriverResult<()> {
    let db = MockDb::new();
    let (mut conn, _sink) = spied(&db, SpyConfig::new());

    let mut call = conn.prepare_call("{call test_proc(?,?)}")?;
    call.set_i32(1, 1)?;
    assert_eq!(call.rendered_sql(), "{call test_proc(1,?/*unbound*/)}");
    Ok(())
}

#[tokio::test]
async fn failing_call_is_recorded_and_error_returned() -> DriverResult<()> {
    let db = MockDb::new();
    db.fail_when("broken_proc", "42883", "procedure broken_proc does not exist");
    let (mut conn, sink) = spied(&db, SpyConfig::new());

    let mut call = conn.prepare_call("{call broken_proc(?)}")?;
    call.set_i32(1, 7)?;
    let err = call.execute().await.unwrap_err();
    assert_eq!(err.code(), Some("42883"));

    let events = events_of(&sink, Category::Statement);
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].rendered_sql, "{call broken_proc(7)}");
    assert!(!events[0].outcome.is_success());
    assert!(events[0].outcome.to_string().contains("broken_proc does not exist"));
    Ok(())
}
