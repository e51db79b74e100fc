use super::*;
use crate::bind::Bindings;
use crate::value::{SqlType, SqlValue, StreamKind, StreamRef};
use chrono::{NaiveDate, TimeZone, Utc};

fn opts() -> RenderOptions {
    RenderOptions::default()
}

#[test]
fn callable_with_out_parameter() {
    let mut b = Bindings::new();
    b.register_out(3, SqlType::Integer);
    b.set_positional(1, SqlValue::Int(1));
    b.set_positional(2, SqlValue::from("hi"));

    let r = render("{call test_proc(?,?,?)}", &b.snapshot(), &opts());
    assert_eq!(r.sql, "{call test_proc(1,'hi',?)}");
    assert!(r.sql.contains("1,'hi'"));
    assert_eq!(r.resolution, Resolution::Literal);
    assert!(r.unbound.is_empty());
}

#[test]
fn typed_null_renders_as_bare_null() {
    let mut b = Bindings::new();
    b.register_out(3, SqlType::Integer);
    b.set_positional(1, SqlValue::Int(1));
    b.set_positional(2, SqlValue::Null(SqlType::Varchar));

    let r = render("{call test_proc(?,?,?)}", &b.snapshot(), &opts());
    assert!(r.sql.contains("1,NULL"));
}

#[test]
fn rebinding_uses_last_value() {
    let mut b = Bindings::new();
    b.set_positional(1, SqlValue::Int(1));
    b.set_positional(1, SqlValue::Int(42));

    let r = render("SELECT * FROM t WHERE id = ?", &b.snapshot(), &opts());
    assert_eq!(r.sql, "SELECT * FROM t WHERE id = 42");
}

#[test]
fn embedded_quotes_are_escaped() {
    let mut b = Bindings::new();
    b.set_positional(1, SqlValue::from("it's"));

    let r = render("INSERT INTO t (s) VALUES (?)", &b.snapshot(), &opts());
    assert_eq!(r.sql, "INSERT INTO t (s) VALUES ('it''s')");
}

#[test]
fn markers_inside_literals_are_untouched() {
    let mut b = Bindings::new();
    b.set_positional(1, SqlValue::Int(5));

    let r = render("SELECT '?' AS q, ? AS v", &b.snapshot(), &opts());
    assert_eq!(r.sql, "SELECT '?' AS q, 5 AS v");
}

#[test]
fn escape_strings_and_identifiers_keep_their_text() {
    let mut b = Bindings::new();
    b.set_positional(1, SqlValue::Int(5));

    let r = render(r"SELECT E'a\'?', ?", &b.snapshot(), &opts());
    assert_eq!(r.sql, r"SELECT E'a\'?', 5");

    let r = render("SELECT col$1 FROM t WHERE id = ?", &b.snapshot(), &opts());
    assert_eq!(r.sql, "SELECT col$1 FROM t WHERE id = 5");
    assert!(r.unbound.is_empty());
}

#[test]
fn array_slices_do_not_block_positional_rendering() {
    let mut b = Bindings::new();
    b.set_positional(1, SqlValue::Int(5));

    let r = render("SELECT arr[lo:hi] FROM t WHERE id = ?", &b.snapshot(), &opts());
    assert_eq!(r.sql, "SELECT arr[lo:hi] FROM t WHERE id = 5");
    assert_eq!(r.resolution, Resolution::Literal);
    assert!(r.parameters.is_empty());
}

#[test]
fn unbound_marker_is_explicit() {
    let mut b = Bindings::new();
    b.set_positional(1, SqlValue::Int(1));

    let r = render("SELECT ?, ?", &b.snapshot(), &opts());
    assert_eq!(r.sql, "SELECT 1, ?/*unbound*/");
    assert_eq!(r.unbound, vec![2]);

    let custom = opts().with_unbound_marker("<unbound>");
    let r = render("SELECT ?, ?", &b.snapshot(), &custom);
    assert_eq!(r.sql, "SELECT 1, <unbound>");
}

#[test]
fn extra_bindings_do_not_fail() {
    let mut b = Bindings::new();
    b.set_positional(1, SqlValue::Int(1));
    b.set_positional(7, SqlValue::Int(7));

    let r = render("SELECT ?", &b.snapshot(), &opts());
    assert_eq!(r.sql, "SELECT 1");
}

#[test]
fn named_bindings_leave_template_verbatim() {
    let mut b = Bindings::new();
    b.set_named("param1", SqlValue::Int(1));
    b.set_named("param2", SqlValue::from("hi"));
    b.register_named_out("result_param", SqlType::Integer);

    let template = "{call test_proc(?,?,?)}";
    let r = render(template, &b.snapshot(), &opts());
    assert_eq!(r.sql, template);
    assert_eq!(r.resolution, Resolution::Template);
    assert_eq!(format_parameters(&r.parameters), "param1:1, param2:'hi'");
}

#[test]
fn named_tokens_in_template_are_not_substituted() {
    let mut b = Bindings::new();
    b.set_positional(1, SqlValue::Int(1));

    let template = "SELECT * FROM t WHERE id = :id";
    let r = render(template, &b.snapshot(), &opts());
    assert_eq!(r.sql, template);
    assert_eq!(r.parameters, vec![("1".to_string(), "1".to_string())]);
}

#[test]
fn numbered_markers_resolve_by_index() {
    let mut b = Bindings::new();
    b.set_positional(1, SqlValue::Int(10));
    b.set_positional(2, SqlValue::from("x"));

    let r = render("SELECT $2, $1, $2::text", &b.snapshot(), &opts());
    assert_eq!(r.sql, "SELECT 'x', 10, 'x'::text");
}

#[test]
fn dates_and_timestamps_use_configured_formats() {
    let mut b = Bindings::new();
    b.set_positional(1, SqlValue::Date(NaiveDate::from_ymd_opt(2024, 3, 9).unwrap()));
    b.set_positional(
        2,
        SqlValue::Timestamp(
            NaiveDate::from_ymd_opt(2024, 3, 9)
                .unwrap()
                .and_hms_opt(13, 5, 0)
                .unwrap(),
        ),
    );
    b.set_positional(
        3,
        SqlValue::TimestampTz(Utc.with_ymd_and_hms(2024, 3, 9, 13, 5, 0).unwrap()),
    );

    let r = render("VALUES (?, ?, ?)", &b.snapshot(), &opts());
    assert_eq!(
        r.sql,
        "VALUES ('2024-03-09', '2024-03-09 13:05:00', '2024-03-09 13:05:00+00:00')"
    );

    let custom = opts().with_date_format("%d-%b-%y");
    let r = render("VALUES (?)", &b.snapshot(), &custom);
    assert_eq!(r.sql, "VALUES ('09-Mar-24')");
}

#[test]
fn invalid_date_format_falls_back_to_iso() {
    let mut b = Bindings::new();
    b.set_positional(1, SqlValue::Date(NaiveDate::from_ymd_opt(2024, 3, 9).unwrap()));

    let broken = opts().with_date_format("%Q");
    let r = render("VALUES (?)", &b.snapshot(), &broken);
    assert_eq!(r.sql, "VALUES ('2024-03-09')");
}

#[test]
fn booleans_follow_boolean_format() {
    let mut b = Bindings::new();
    b.set_positional(1, SqlValue::Bool(true));
    b.set_positional(2, SqlValue::Bool(false));

    let r = render("VALUES (?, ?)", &b.snapshot(), &opts());
    assert_eq!(r.sql, "VALUES (true, false)");

    let numeric = opts().with_boolean_format(BooleanFormat::Numeric);
    let r = render("VALUES (?, ?)", &b.snapshot(), &numeric);
    assert_eq!(r.sql, "VALUES (1, 0)");
}

#[test]
fn binary_and_streams_are_opaque() {
    let mut b = Bindings::new();
    b.set_positional(1, SqlValue::Bytes(vec![0x0a, 0xff]));
    b.set_positional(
        2,
        SqlValue::Stream(StreamRef {
            kind: StreamKind::Character,
            length: Some(10),
        }),
    );

    let r = render("VALUES (?, ?)", &b.snapshot(), &opts());
    assert_eq!(r.sql, "VALUES ('[binary]', '[character stream]')");

    let hex = opts().with_binary_format(BinaryFormat::Hex);
    let r = render("VALUES (?)", &b.snapshot(), &hex);
    assert_eq!(r.sql, "VALUES (X'0aff')");
}

#[test]
fn floats_render_unquoted_unless_special() {
    let mut b = Bindings::new();
    b.set_positional(1, SqlValue::Double(1.5));
    b.set_positional(2, SqlValue::Double(f64::NAN));

    let r = render("VALUES (?, ?)", &b.snapshot(), &opts());
    assert_eq!(r.sql, "VALUES (1.5, 'NaN')");
}

#[test]
fn batch_renders_each_entry_against_the_same_template() {
    let mut b = Bindings::new();
    b.set_positional(1, SqlValue::Int(1));
    let first = b.snapshot();
    b.set_positional(1, SqlValue::Int(2));
    let second = b.snapshot();

    let rendered = render_batch("DELETE FROM t WHERE id = ?", &[first, second], &opts());
    let sql: Vec<&str> = rendered.iter().map(|r| r.sql.as_str()).collect();
    assert_eq!(
        sql,
        vec!["DELETE FROM t WHERE id = 1", "DELETE FROM t WHERE id = 2"]
    );
}
