use crate::value::{SqlValue, StreamKind};
use serde::{Deserialize, Serialize};
use std::fmt::Write;

/// How booleans are written.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BooleanFormat {
    /// `true` / `false`
    #[default]
    Literal,
    /// `1` / `0`
    Numeric,
}

/// How byte values are written.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BinaryFormat {
    /// `'[binary]'`, the content is not reproduced.
    #[default]
    Placeholder,
    /// `X'0a0b'`
    Hex,
}

/// Options controlling literal rendering.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderOptions {
    /// strftime format for DATE values.
    pub date_format: String,
    /// strftime format for TIME values.
    pub time_format: String,
    /// strftime format for TIMESTAMP values.
    pub timestamp_format: String,
    /// strftime format for TIMESTAMP WITH TIME ZONE values.
    pub timestamptz_format: String,
    pub boolean_format: BooleanFormat,
    pub binary_format: BinaryFormat,
    /// Text substituted for a positional marker that has no binding.
    pub unbound_marker: String,
}

impl Default for RenderOptions {
    fn default() -> Self {
        Self {
            date_format: "%Y-%m-%d".to_string(),
            time_format: "%H:%M:%S%.f".to_string(),
            timestamp_format: "%Y-%m-%d %H:%M:%S%.f".to_string(),
            timestamptz_format: "%Y-%m-%d %H:%M:%S%.f%:z".to_string(),
            boolean_format: BooleanFormat::Literal,
            binary_format: BinaryFormat::Placeholder,
            unbound_marker: "?/*unbound*/".to_string(),
        }
    }
}

impl RenderOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_date_format(mut self, format: impl Into<String>) -> Self {
        self.date_format = format.into();
        self
    }

    pub fn with_timestamp_format(mut self, format: impl Into<String>) -> Self {
        self.timestamp_format = format.into();
        self
    }

    pub fn with_boolean_format(mut self, format: BooleanFormat) -> Self {
        self.boolean_format = format;
        self
    }

    pub fn with_binary_format(mut self, format: BinaryFormat) -> Self {
        self.binary_format = format;
        self
    }

    pub fn with_unbound_marker(mut self, marker: impl Into<String>) -> Self {
        self.unbound_marker = marker.into();
        self
    }

    /// All strftime formats, for validation.
    pub(crate) fn formats(&self) -> [&str; 4] {
        [
            &self.date_format,
            &self.time_format,
            &self.timestamp_format,
            &self.timestamptz_format,
        ]
    }
}

/// Append `s` as a single-quoted SQL string literal.
pub fn push_quoted(out: &mut String, s: &str) {
    out.reserve(s.len() + 2);
    out.push('\'');
    for c in s.chars() {
        if c == '\'' {
            out.push('\'');
        }
        out.push(c);
    }
    out.push('\'');
}

/// Append a quoted chrono-formatted value. Falls back to `fallback` (the
/// value's `Display`) if the format string is invalid.
fn push_formatted<D, F>(out: &mut String, formatted: D, fallback: F)
where
    D: std::fmt::Display,
    F: std::fmt::Display,
{
    let mut buf = String::new();
    if write!(buf, "{formatted}").is_err() {
        buf.clear();
        let _ = write!(buf, "{fallback}");
    }
    push_quoted(out, &buf);
}

fn push_float(out: &mut String, v: f64) {
    if v.is_finite() {
        let _ = write!(out, "{v}");
    } else if v.is_nan() {
        out.push_str("'NaN'");
    } else if v > 0.0 {
        out.push_str("'Infinity'");
    } else {
        out.push_str("'-Infinity'");
    }
}

/// Append the literal rendering of `value`.
pub fn push_literal(out: &mut String, value: &SqlValue, options: &RenderOptions) {
    match value {
        SqlValue::Null(_) => out.push_str("NULL"),
        SqlValue::Bool(b) => match options.boolean_format {
            BooleanFormat::Literal => out.push_str(if *b { "true" } else { "false" }),
            BooleanFormat::Numeric => out.push(if *b { '1' } else { '0' }),
        },
        SqlValue::SmallInt(v) => {
            let _ = write!(out, "{v}");
        }
        SqlValue::Int(v) => {
            let _ = write!(out, "{v}");
        }
        SqlValue::BigInt(v) => {
            let _ = write!(out, "{v}");
        }
        SqlValue::Real(v) => push_float(out, f64::from(*v)),
        SqlValue::Double(v) => push_float(out, *v),
        #[cfg(feature = "rust_decimal")]
        SqlValue::Decimal(v) => {
            let _ = write!(out, "{v}");
        }
        SqlValue::Text(s) => push_quoted(out, s),
        SqlValue::Date(d) => push_formatted(out, d.format(&options.date_format), d),
        SqlValue::Time(t) => push_formatted(out, t.format(&options.time_format), t),
        SqlValue::Timestamp(ts) => {
            push_formatted(out, ts.format(&options.timestamp_format), ts)
        }
        SqlValue::TimestampTz(ts) => {
            push_formatted(out, ts.format(&options.timestamptz_format), ts.to_rfc3339())
        }
        SqlValue::Uuid(u) => {
            let _ = write!(out, "'{u}'");
        }
        SqlValue::Json(j) => push_quoted(out, &j.to_string()),
        SqlValue::Bytes(bytes) => match options.binary_format {
            BinaryFormat::Placeholder => out.push_str("'[binary]'"),
            BinaryFormat::Hex => {
                out.reserve(bytes.len() * 2 + 3);
                out.push_str("X'");
                for b in bytes {
                    let _ = write!(out, "{b:02x}");
                }
                out.push('\'');
            }
        },
        SqlValue::Stream(s) => out.push_str(match s.kind {
            StreamKind::Binary => "'[binary stream]'",
            StreamKind::Character => "'[character stream]'",
        }),
    }
}

/// Literal rendering of `value` as a new string.
pub fn literal(value: &SqlValue, options: &RenderOptions) -> String {
    let mut out = String::new();
    push_literal(&mut out, value, options);
    out
}
