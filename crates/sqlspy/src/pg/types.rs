//! `SqlValue` on the postgres wire.
//!
//! Encoding follows the server-inferred parameter type, converting where a
//! lossless conversion exists (an `Int` bound to a `BIGINT` parameter, text
//! bound to a `DATE` parameter). Decoding maps each column type to the
//! matching `SqlValue` variant.

use super::numeric;
use crate::error::{DriverError, DriverResult};
use crate::value::{SqlType, SqlValue};
use bytes::BytesMut;
use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, TimeZone, Utc};
use std::error::Error;
use tokio_postgres::Row;
use tokio_postgres::types::{FromSql, IsNull, Kind, ToSql, Type};

type BoxError = Box<dyn Error + Sync + Send>;

fn is_text(ty: &Type) -> bool {
    matches!(
        *ty,
        Type::TEXT | Type::VARCHAR | Type::BPCHAR | Type::NAME | Type::UNKNOWN
    )
}

fn mismatch(what: &str, ty: &Type) -> BoxError {
    format!("cannot send {what} as {ty}").into()
}

fn encode_int(v: i64, ty: &Type, out: &mut BytesMut) -> Result<IsNull, BoxError> {
    match *ty {
        Type::INT2 => i16::try_from(v)?.to_sql(ty, out),
        Type::INT4 => i32::try_from(v)?.to_sql(ty, out),
        Type::INT8 => v.to_sql(ty, out),
        Type::OID => u32::try_from(v)?.to_sql(ty, out),
        Type::FLOAT4 => (v as f32).to_sql(ty, out),
        Type::FLOAT8 => (v as f64).to_sql(ty, out),
        Type::BOOL => (v != 0).to_sql(ty, out),
        Type::NUMERIC => {
            numeric::encode(&v.to_string(), out)?;
            Ok(IsNull::No)
        }
        _ if is_text(ty) => v.to_string().to_sql(ty, out),
        _ => Err(mismatch("integer", ty)),
    }
}

fn encode_float(v: f64, ty: &Type, out: &mut BytesMut) -> Result<IsNull, BoxError> {
    match *ty {
        Type::FLOAT4 => (v as f32).to_sql(ty, out),
        Type::FLOAT8 => v.to_sql(ty, out),
        Type::NUMERIC => {
            numeric::encode(&v.to_string(), out)?;
            Ok(IsNull::No)
        }
        Type::INT2 | Type::INT4 | Type::INT8 if v.fract() == 0.0 => encode_int(v as i64, ty, out),
        _ if is_text(ty) => v.to_string().to_sql(ty, out),
        _ => Err(mismatch("floating point value", ty)),
    }
}

fn encode_decimal_text(text: &str, ty: &Type, out: &mut BytesMut) -> Result<IsNull, BoxError> {
    match *ty {
        Type::NUMERIC => {
            numeric::encode(text, out)?;
            Ok(IsNull::No)
        }
        Type::FLOAT4 | Type::FLOAT8 => encode_float(text.trim().parse::<f64>()?, ty, out),
        Type::INT2 | Type::INT4 | Type::INT8 | Type::OID => {
            encode_int(text.trim().parse::<i64>()?, ty, out)
        }
        _ if is_text(ty) => text.to_sql(ty, out),
        _ => Err(mismatch("decimal value", ty)),
    }
}

fn parse_bool(s: &str) -> Result<bool, BoxError> {
    match s.trim().to_ascii_lowercase().as_str() {
        "t" | "true" | "y" | "yes" | "on" | "1" => Ok(true),
        "f" | "false" | "n" | "no" | "off" | "0" => Ok(false),
        other => Err(format!("invalid boolean: {other}").into()),
    }
}

fn parse_timestamp(s: &str) -> Result<NaiveDateTime, BoxError> {
    let s = s.trim();
    NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S%.f")
        .or_else(|_| s.parse::<NaiveDateTime>())
        .map_err(Into::into)
}

fn parse_timestamptz(s: &str) -> Result<DateTime<Utc>, BoxError> {
    let s = s.trim();
    DateTime::parse_from_rfc3339(s)
        .or_else(|_| DateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S%.f%#z"))
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(Into::into)
}

fn encode_text(s: &str, ty: &Type, out: &mut BytesMut) -> Result<IsNull, BoxError> {
    match *ty {
        _ if is_text(ty) => s.to_sql(ty, out),
        Type::INT2 | Type::INT4 | Type::INT8 | Type::OID => {
            encode_int(s.trim().parse::<i64>()?, ty, out)
        }
        Type::FLOAT4 | Type::FLOAT8 | Type::NUMERIC => encode_decimal_text(s, ty, out),
        Type::BOOL => parse_bool(s)?.to_sql(ty, out),
        Type::UUID => uuid::Uuid::parse_str(s.trim())?.to_sql(ty, out),
        Type::DATE => s.trim().parse::<NaiveDate>()?.to_sql(ty, out),
        Type::TIME => s.trim().parse::<NaiveTime>()?.to_sql(ty, out),
        Type::TIMESTAMP => parse_timestamp(s)?.to_sql(ty, out),
        Type::TIMESTAMPTZ => parse_timestamptz(s)?.to_sql(ty, out),
        Type::JSON | Type::JSONB => serde_json::from_str::<serde_json::Value>(s)?.to_sql(ty, out),
        Type::BYTEA => s.as_bytes().to_sql(ty, out),
        _ if matches!(ty.kind(), Kind::Enum(_)) => {
            out.extend_from_slice(s.as_bytes());
            Ok(IsNull::No)
        }
        _ => Err(mismatch("text", ty)),
    }
}

fn encode_timestamp(ts: NaiveDateTime, ty: &Type, out: &mut BytesMut) -> Result<IsNull, BoxError> {
    match *ty {
        Type::TIMESTAMP => ts.to_sql(ty, out),
        // Local timestamps bound to TIMESTAMPTZ are taken as UTC.
        Type::TIMESTAMPTZ => Utc.from_utc_datetime(&ts).to_sql(ty, out),
        Type::DATE => ts.date().to_sql(ty, out),
        Type::TIME => ts.time().to_sql(ty, out),
        _ if is_text(ty) => ts.to_string().to_sql(ty, out),
        _ => Err(mismatch("timestamp", ty)),
    }
}

impl ToSql for SqlValue {
    fn to_sql(&self, ty: &Type, out: &mut BytesMut) -> Result<IsNull, BoxError> {
        match self {
            SqlValue::Null(_) => Ok(IsNull::Yes),
            SqlValue::Bool(b) => match *ty {
                Type::BOOL => b.to_sql(ty, out),
                _ if is_text(ty) => b.to_string().to_sql(ty, out),
                _ => encode_int(i64::from(*b), ty, out),
            },
            SqlValue::SmallInt(v) => encode_int(i64::from(*v), ty, out),
            SqlValue::Int(v) => encode_int(i64::from(*v), ty, out),
            SqlValue::BigInt(v) => encode_int(*v, ty, out),
            SqlValue::Real(v) => match *ty {
                Type::FLOAT4 => v.to_sql(ty, out),
                _ => encode_float(f64::from(*v), ty, out),
            },
            SqlValue::Double(v) => encode_float(*v, ty, out),
            #[cfg(feature = "rust_decimal")]
            SqlValue::Decimal(d) => encode_decimal_text(&d.to_string(), ty, out),
            SqlValue::Text(s) => encode_text(s, ty, out),
            SqlValue::Date(d) => match *ty {
                Type::DATE => d.to_sql(ty, out),
                Type::TIMESTAMP | Type::TIMESTAMPTZ => {
                    encode_timestamp(d.and_time(NaiveTime::MIN), ty, out)
                }
                _ if is_text(ty) => d.to_string().to_sql(ty, out),
                _ => Err(mismatch("date", ty)),
            },
            SqlValue::Time(t) => match *ty {
                Type::TIME => t.to_sql(ty, out),
                _ if is_text(ty) => t.to_string().to_sql(ty, out),
                _ => Err(mismatch("time", ty)),
            },
            SqlValue::Timestamp(ts) => encode_timestamp(*ts, ty, out),
            SqlValue::TimestampTz(ts) => match *ty {
                Type::TIMESTAMPTZ => ts.to_sql(ty, out),
                _ if is_text(ty) => ts.to_rfc3339().to_sql(ty, out),
                _ => encode_timestamp(ts.naive_utc(), ty, out),
            },
            SqlValue::Uuid(u) => match *ty {
                Type::UUID => u.to_sql(ty, out),
                _ if is_text(ty) => u.to_string().to_sql(ty, out),
                _ => Err(mismatch("uuid", ty)),
            },
            SqlValue::Json(v) => match *ty {
                Type::JSON | Type::JSONB => v.to_sql(ty, out),
                _ if is_text(ty) => v.to_string().to_sql(ty, out),
                _ => Err(mismatch("json", ty)),
            },
            SqlValue::Bytes(b) => match *ty {
                Type::BYTEA => b.as_slice().to_sql(ty, out),
                _ => Err(mismatch("bytes", ty)),
            },
            SqlValue::Stream(_) => Err("stream values cannot be sent".into()),
        }
    }

    fn accepts(_ty: &Type) -> bool {
        true
    }

    tokio_postgres::types::to_sql_checked!();
}

/// NUMERIC column read as text.
struct NumericText(String);

impl<'a> FromSql<'a> for NumericText {
    fn from_sql(_ty: &Type, raw: &'a [u8]) -> Result<Self, BoxError> {
        numeric::decode(raw).map(NumericText)
    }

    fn accepts(ty: &Type) -> bool {
        *ty == Type::NUMERIC
    }
}

/// Enum labels travel as their text.
struct EnumLabel(String);

impl<'a> FromSql<'a> for EnumLabel {
    fn from_sql(_ty: &Type, raw: &'a [u8]) -> Result<Self, BoxError> {
        Ok(EnumLabel(std::str::from_utf8(raw)?.to_string()))
    }

    fn accepts(ty: &Type) -> bool {
        matches!(ty.kind(), Kind::Enum(_))
    }
}

/// The declared SQL type reported for a postgres type.
pub(crate) fn sql_type_of(ty: &Type) -> SqlType {
    match *ty {
        Type::BOOL => SqlType::Boolean,
        Type::INT2 => SqlType::SmallInt,
        Type::INT4 => SqlType::Integer,
        Type::INT8 | Type::OID => SqlType::BigInt,
        Type::FLOAT4 => SqlType::Real,
        Type::FLOAT8 => SqlType::Double,
        Type::NUMERIC => SqlType::Numeric,
        Type::BPCHAR => SqlType::Char,
        Type::VARCHAR | Type::NAME => SqlType::Varchar,
        Type::TEXT => SqlType::LongVarchar,
        Type::DATE => SqlType::Date,
        Type::TIME => SqlType::Time,
        Type::TIMESTAMP => SqlType::Timestamp,
        Type::TIMESTAMPTZ => SqlType::TimestampWithTimezone,
        Type::BYTEA => SqlType::VarBinary,
        Type::JSON | Type::JSONB => SqlType::Json,
        Type::UUID => SqlType::Uuid,
        _ => SqlType::Other,
    }
}

fn numeric_value(text: String) -> SqlValue {
    #[cfg(feature = "rust_decimal")]
    if let Ok(d) = text.parse::<rust_decimal::Decimal>() {
        return SqlValue::Decimal(d);
    }
    SqlValue::Text(text)
}

/// Decode 0-based column `idx` of `row`.
pub(crate) fn decode(row: &Row, idx: usize) -> DriverResult<SqlValue> {
    let ty = row
        .columns()
        .get(idx)
        .map(|c| c.type_().clone())
        .ok_or_else(|| DriverError::invalid_parameter(format!("column index {} out of range", idx + 1)))?;

    let value = match ty {
        Type::BOOL => row.try_get::<_, Option<bool>>(idx)?.map(SqlValue::Bool),
        Type::INT2 => row.try_get::<_, Option<i16>>(idx)?.map(SqlValue::SmallInt),
        Type::INT4 => row.try_get::<_, Option<i32>>(idx)?.map(SqlValue::Int),
        Type::INT8 => row.try_get::<_, Option<i64>>(idx)?.map(SqlValue::BigInt),
        Type::OID => row
            .try_get::<_, Option<u32>>(idx)?
            .map(|v| SqlValue::BigInt(i64::from(v))),
        Type::FLOAT4 => row.try_get::<_, Option<f32>>(idx)?.map(SqlValue::Real),
        Type::FLOAT8 => row.try_get::<_, Option<f64>>(idx)?.map(SqlValue::Double),
        Type::NUMERIC => row
            .try_get::<_, Option<NumericText>>(idx)?
            .map(|n| numeric_value(n.0)),
        Type::DATE => row.try_get::<_, Option<NaiveDate>>(idx)?.map(SqlValue::Date),
        Type::TIME => row.try_get::<_, Option<NaiveTime>>(idx)?.map(SqlValue::Time),
        Type::TIMESTAMP => row
            .try_get::<_, Option<NaiveDateTime>>(idx)?
            .map(SqlValue::Timestamp),
        Type::TIMESTAMPTZ => row
            .try_get::<_, Option<DateTime<Utc>>>(idx)?
            .map(SqlValue::TimestampTz),
        Type::UUID => row.try_get::<_, Option<uuid::Uuid>>(idx)?.map(SqlValue::Uuid),
        Type::JSON | Type::JSONB => row
            .try_get::<_, Option<serde_json::Value>>(idx)?
            .map(SqlValue::Json),
        Type::BYTEA => row.try_get::<_, Option<Vec<u8>>>(idx)?.map(SqlValue::Bytes),
        ref t if is_text(t) => row.try_get::<_, Option<String>>(idx)?.map(SqlValue::Text),
        ref t if matches!(t.kind(), Kind::Enum(_)) => row
            .try_get::<_, Option<EnumLabel>>(idx)?
            .map(|e| SqlValue::Text(e.0)),
        ref t => return Err(DriverError::unsupported(format!("column type {t}"))),
    };
    Ok(value.unwrap_or_else(|| SqlValue::Null(sql_type_of(&ty))))
}
