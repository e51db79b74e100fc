//! Bindable SQL values and declared SQL types.

use crate::error::{DriverError, DriverResult};
use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use uuid::Uuid;

/// Declared SQL type of a parameter, used for typed NULLs and OUT registrations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SqlType {
    Boolean,
    SmallInt,
    Integer,
    BigInt,
    Real,
    Double,
    Numeric,
    Char,
    Varchar,
    LongVarchar,
    Date,
    Time,
    Timestamp,
    TimestampWithTimezone,
    Binary,
    VarBinary,
    Blob,
    Clob,
    Json,
    Uuid,
    /// Type unknown or driver specific
    Other,
}

impl SqlType {
    /// Whether values of this type are rendered as bytes.
    pub fn is_binary(self) -> bool {
        matches!(self, SqlType::Binary | SqlType::VarBinary | SqlType::Blob)
    }
}

/// Kind of data behind a [`StreamRef`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamKind {
    Binary,
    Character,
}

/// Reference to a streamed parameter. The content is never captured.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StreamRef {
    pub kind: StreamKind,
    /// Declared length, if the caller supplied one.
    pub length: Option<u64>,
}

/// A value bound to a statement parameter or read from a result set.
#[derive(Debug, Clone, PartialEq)]
pub enum SqlValue {
    /// SQL NULL with its declared type.
    Null(SqlType),
    Bool(bool),
    SmallInt(i16),
    Int(i32),
    BigInt(i64),
    Real(f32),
    Double(f64),
    #[cfg(feature = "rust_decimal")]
    Decimal(rust_decimal::Decimal),
    Text(String),
    Date(NaiveDate),
    Time(NaiveTime),
    Timestamp(NaiveDateTime),
    TimestampTz(DateTime<Utc>),
    Uuid(Uuid),
    Json(serde_json::Value),
    Bytes(Vec<u8>),
    Stream(StreamRef),
}

impl SqlValue {
    /// Typed NULL.
    pub fn null(sql_type: SqlType) -> Self {
        SqlValue::Null(sql_type)
    }

    pub fn is_null(&self) -> bool {
        matches!(self, SqlValue::Null(_))
    }

    /// The SQL type this value would be declared as.
    pub fn sql_type(&self) -> SqlType {
        match self {
            SqlValue::Null(t) => *t,
            SqlValue::Bool(_) => SqlType::Boolean,
            SqlValue::SmallInt(_) => SqlType::SmallInt,
            SqlValue::Int(_) => SqlType::Integer,
            SqlValue::BigInt(_) => SqlType::BigInt,
            SqlValue::Real(_) => SqlType::Real,
            SqlValue::Double(_) => SqlType::Double,
            #[cfg(feature = "rust_decimal")]
            SqlValue::Decimal(_) => SqlType::Numeric,
            SqlValue::Text(_) => SqlType::Varchar,
            SqlValue::Date(_) => SqlType::Date,
            SqlValue::Time(_) => SqlType::Time,
            SqlValue::Timestamp(_) => SqlType::Timestamp,
            SqlValue::TimestampTz(_) => SqlType::TimestampWithTimezone,
            SqlValue::Uuid(_) => SqlType::Uuid,
            SqlValue::Json(_) => SqlType::Json,
            SqlValue::Bytes(_) => SqlType::VarBinary,
            SqlValue::Stream(s) => match s.kind {
                StreamKind::Binary => SqlType::Blob,
                StreamKind::Character => SqlType::Clob,
            },
        }
    }
}

macro_rules! impl_sql_value_from {
    ($($ty:ty => $variant:ident),* $(,)?) => {
        $(
            impl From<$ty> for SqlValue {
                fn from(v: $ty) -> Self {
                    SqlValue::$variant(v)
                }
            }
        )*
    };
}

impl_sql_value_from! {
    bool => Bool,
    i16 => SmallInt,
    i32 => Int,
    i64 => BigInt,
    f32 => Real,
    f64 => Double,
    String => Text,
    NaiveDate => Date,
    NaiveTime => Time,
    NaiveDateTime => Timestamp,
    DateTime<Utc> => TimestampTz,
    Uuid => Uuid,
    serde_json::Value => Json,
    Vec<u8> => Bytes,
    StreamRef => Stream,
}

#[cfg(feature = "rust_decimal")]
impl_sql_value_from! { rust_decimal::Decimal => Decimal }

impl From<&str> for SqlValue {
    fn from(v: &str) -> Self {
        SqlValue::Text(v.to_string())
    }
}

impl From<&[u8]> for SqlValue {
    fn from(v: &[u8]) -> Self {
        SqlValue::Bytes(v.to_vec())
    }
}

/// Conversion out of a [`SqlValue`], used by the typed getters.
pub trait FromSqlValue: Sized {
    fn from_sql_value(value: SqlValue) -> DriverResult<Self>;
}

fn mismatch(expected: &str, got: &SqlValue) -> DriverError {
    DriverError::conversion(format!("expected {expected}, got {:?}", got.sql_type()))
}

impl<T: FromSqlValue> FromSqlValue for Option<T> {
    fn from_sql_value(value: SqlValue) -> DriverResult<Self> {
        match value {
            SqlValue::Null(_) => Ok(None),
            other => T::from_sql_value(other).map(Some),
        }
    }
}

impl FromSqlValue for SqlValue {
    fn from_sql_value(value: SqlValue) -> DriverResult<Self> {
        Ok(value)
    }
}

impl FromSqlValue for bool {
    fn from_sql_value(value: SqlValue) -> DriverResult<Self> {
        match value {
            SqlValue::Bool(v) => Ok(v),
            other => Err(mismatch("boolean", &other)),
        }
    }
}

impl FromSqlValue for i16 {
    fn from_sql_value(value: SqlValue) -> DriverResult<Self> {
        match value {
            SqlValue::SmallInt(v) => Ok(v),
            SqlValue::Int(v) => i16::try_from(v).map_err(|e| DriverError::conversion(e.to_string())),
            SqlValue::BigInt(v) => {
                i16::try_from(v).map_err(|e| DriverError::conversion(e.to_string()))
            }
            other => Err(mismatch("smallint", &other)),
        }
    }
}

impl FromSqlValue for i32 {
    fn from_sql_value(value: SqlValue) -> DriverResult<Self> {
        match value {
            SqlValue::SmallInt(v) => Ok(i32::from(v)),
            SqlValue::Int(v) => Ok(v),
            SqlValue::BigInt(v) => {
                i32::try_from(v).map_err(|e| DriverError::conversion(e.to_string()))
            }
            other => Err(mismatch("integer", &other)),
        }
    }
}

impl FromSqlValue for i64 {
    fn from_sql_value(value: SqlValue) -> DriverResult<Self> {
        match value {
            SqlValue::SmallInt(v) => Ok(i64::from(v)),
            SqlValue::Int(v) => Ok(i64::from(v)),
            SqlValue::BigInt(v) => Ok(v),
            other => Err(mismatch("bigint", &other)),
        }
    }
}

impl FromSqlValue for f64 {
    fn from_sql_value(value: SqlValue) -> DriverResult<Self> {
        match value {
            SqlValue::Real(v) => Ok(f64::from(v)),
            SqlValue::Double(v) => Ok(v),
            SqlValue::SmallInt(v) => Ok(f64::from(v)),
            SqlValue::Int(v) => Ok(f64::from(v)),
            other => Err(mismatch("double", &other)),
        }
    }
}

impl FromSqlValue for String {
    fn from_sql_value(value: SqlValue) -> DriverResult<Self> {
        match value {
            SqlValue::Text(v) => Ok(v),
            SqlValue::Json(v) => Ok(v.to_string()),
            SqlValue::Uuid(v) => Ok(v.to_string()),
            other => Err(mismatch("text", &other)),
        }
    }
}

impl FromSqlValue for Vec<u8> {
    fn from_sql_value(value: SqlValue) -> DriverResult<Self> {
        match value {
            SqlValue::Bytes(v) => Ok(v),
            other => Err(mismatch("bytes", &other)),
        }
    }
}

macro_rules! impl_from_sql_value_exact {
    ($($ty:ty => $variant:ident : $name:literal),* $(,)?) => {
        $(
            impl FromSqlValue for $ty {
                fn from_sql_value(value: SqlValue) -> DriverResult<Self> {
                    match value {
                        SqlValue::$variant(v) => Ok(v),
                        other => Err(mismatch($name, &other)),
                    }
                }
            }
        )*
    };
}

impl_from_sql_value_exact! {
    NaiveDate => Date: "date",
    NaiveTime => Time: "time",
    NaiveDateTime => Timestamp: "timestamp",
    DateTime<Utc> => TimestampTz: "timestamptz",
    Uuid => Uuid: "uuid",
    serde_json::Value => Json: "json",
}

#[cfg(feature = "rust_decimal")]
impl_from_sql_value_exact! { rust_decimal::Decimal => Decimal: "numeric" }
