//! Conversion of PostgreSQL rows into JSON-ready maps.
//!
//! Values are decoded by the column's type name. NULL becomes `null`,
//! non-finite floats become `null` and temporal values become strings.
//! Arrays become the JSON text of their converted elements. Anything without a
//! mapping falls back to the text the server sent for it, or `null` when the
//! wire form is not text.

use crate::error::QueryError;
use crate::types::Row;
use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde_json::{Number, Value};
use sqlx::postgres::types::{Oid, PgInterval, PgMoney};
use sqlx::postgres::{PgHasArrayType, PgRow, PgValueFormat, PgValueRef, Postgres};
use sqlx::types::ipnetwork::IpNetwork;
use sqlx::types::Uuid;
use sqlx::{Column, Decode, Row as _, Type, TypeInfo, ValueRef};

/// Fractional digits of `money` under the usual `lc_monetary` settings.
const MONEY_SCALE: u32 = 2;

/// Converts one driver row; column order follows the statement.
pub fn row_to_json(row: &PgRow) -> Result<Row, QueryError> {
    let mut map = Row::with_capacity(row.len());
    for (idx, column) in row.columns().iter().enumerate() {
        let value = column_to_json(row, idx, column.type_info().name())?;
        map.insert(column.name().to_string(), value);
    }
    Ok(map)
}

fn column_to_json(row: &PgRow, idx: usize, type_name: &str) -> Result<Value, QueryError> {
    let value = match type_name {
        "BOOL" => row.try_get::<Option<bool>, _>(idx)?.map(Value::Bool),
        "INT2" => row
            .try_get::<Option<i16>, _>(idx)?
            .map(|v| Value::from(i64::from(v))),
        "INT4" => row
            .try_get::<Option<i32>, _>(idx)?
            .map(|v| Value::from(i64::from(v))),
        "INT8" => row.try_get::<Option<i64>, _>(idx)?.map(Value::from),
        "FLOAT4" => row
            .try_get::<Option<f32>, _>(idx)?
            .map(|v| float_to_json(f64::from(v))),
        "FLOAT8" => row.try_get::<Option<f64>, _>(idx)?.map(float_to_json),
        "NUMERIC" => match row.try_get::<Option<Decimal>, _>(idx) {
            Ok(v) => v.map(decimal_to_json),
            // NaN, infinities and values past Decimal's 28 digits.
            Err(e) => {
                tracing::debug!(column = idx, error = %e, "NUMERIC outside Decimal range");
                Some(raw_value(row, idx).map_or(Value::Null, numeric_fallback))
            }
        },
        "DATE" => row.try_get::<Option<NaiveDate>, _>(idx)?.map(date_to_json),
        "TIME" => row.try_get::<Option<NaiveTime>, _>(idx)?.map(time_to_json),
        "TIMESTAMP" => row
            .try_get::<Option<NaiveDateTime>, _>(idx)?
            .map(timestamp_to_json),
        "TIMESTAMPTZ" => row
            .try_get::<Option<DateTime<Utc>>, _>(idx)?
            .map(timestamptz_to_json),
        "INTERVAL" => row
            .try_get::<Option<PgInterval>, _>(idx)?
            .map(|v| interval_to_json(&v)),
        "UUID" => row
            .try_get::<Option<Uuid>, _>(idx)?
            .map(|v| Value::String(v.to_string())),
        "JSON" | "JSONB" => row
            .try_get::<Option<Value>, _>(idx)?
            .map(|v| Value::String(v.to_string())),
        "TEXT" | "VARCHAR" | "BPCHAR" | "NAME" => {
            row.try_get::<Option<String>, _>(idx)?.map(Value::String)
        }
        "MONEY" => row
            .try_get::<Option<PgMoney>, _>(idx)?
            .map(|v| Value::String(v.to_decimal(MONEY_SCALE).to_string())),
        "BYTEA" => row
            .try_get::<Option<Vec<u8>>, _>(idx)?
            .map(|v| bytea_to_json(&v)),
        "OID" => row.try_get::<Option<Oid>, _>(idx)?.map(|v| Value::from(v.0)),
        "INET" => row
            .try_get::<Option<IpNetwork>, _>(idx)?
            .map(|v| inet_to_json(v, false)),
        "CIDR" => row
            .try_get::<Option<IpNetwork>, _>(idx)?
            .map(|v| inet_to_json(v, true)),
        "TEXT[]" | "VARCHAR[]" | "BPCHAR[]" | "NAME[]" => array::<String>(row, idx, Value::String),
        "BOOL[]" => array::<bool>(row, idx, Value::Bool),
        "INT2[]" => array::<i16>(row, idx, |v| Value::from(i64::from(v))),
        "INT4[]" => array::<i32>(row, idx, |v| Value::from(i64::from(v))),
        "INT8[]" => array::<i64>(row, idx, Value::from),
        "FLOAT4[]" => array::<f32>(row, idx, |v| float_to_json(f64::from(v))),
        "FLOAT8[]" => array::<f64>(row, idx, float_to_json),
        "NUMERIC[]" => array::<Decimal>(row, idx, decimal_to_json),
        "DATE[]" => array::<NaiveDate>(row, idx, date_to_json),
        "TIMESTAMP[]" => array::<NaiveDateTime>(row, idx, timestamp_to_json),
        "TIMESTAMPTZ[]" => array::<DateTime<Utc>>(row, idx, timestamptz_to_json),
        "UUID[]" => array::<Uuid>(row, idx, |v| Value::String(v.to_string())),
        other => raw_value(row, idx).map(|raw| {
            let text = raw_text(&raw);
            if text.is_none() {
                tracing::debug!(column = idx, type_name = other, "No JSON mapping for column type");
            }
            text.map_or(Value::Null, Value::String)
        }),
    };

    Ok(value.unwrap_or(Value::Null))
}

/// Decodes an array column; a value the driver cannot decode becomes `null`.
fn array<T>(row: &PgRow, idx: usize, element: impl Fn(T) -> Value) -> Option<Value>
where
    T: for<'r> Decode<'r, Postgres> + Type<Postgres> + PgHasArrayType,
{
    match row.try_get::<Option<Vec<Option<T>>>, _>(idx) {
        Ok(items) => items.map(|items| {
            array_to_json(
                items
                    .into_iter()
                    .map(|item| item.map_or(Value::Null, &element))
                    .collect(),
            )
        }),
        Err(e) => {
            tracing::debug!(column = idx, error = %e, "Failed to decode array column");
            None
        }
    }
}

/// The raw wire value, or `None` for SQL NULL.
fn raw_value(row: &PgRow, idx: usize) -> Option<PgValueRef<'_>> {
    row.try_get_raw(idx).ok().filter(|raw| !raw.is_null())
}

fn raw_text(raw: &PgValueRef<'_>) -> Option<String> {
    match raw.format() {
        PgValueFormat::Text => raw.as_str().ok().map(str::to_string),
        PgValueFormat::Binary => raw.as_bytes().ok().and_then(binary_text),
    }
}

fn numeric_fallback(raw: PgValueRef<'_>) -> Value {
    match raw.format() {
        PgValueFormat::Text => raw.as_str().map_or(Value::Null, numeric_text_to_json),
        PgValueFormat::Binary => raw.as_bytes().map_or(Value::Null, numeric_binary_to_json),
    }
}

/// Binary payloads of types such as `xml` are the text itself; anything
/// carrying control bytes is a real binary encoding and is not passed on.
pub fn binary_text(bytes: &[u8]) -> Option<String> {
    let text = std::str::from_utf8(bytes).ok()?;
    (!text.chars().any(|c| c.is_control() && !c.is_whitespace())).then(|| text.to_string())
}

/// Renders converted array elements as their JSON text.
pub fn array_to_json(items: Vec<Value>) -> Value {
    Value::String(Value::Array(items).to_string())
}

/// PostgreSQL's hex form, e.g. `\x00ff`.
pub fn bytea_to_json(bytes: &[u8]) -> Value {
    let mut text = String::with_capacity(2 + bytes.len() * 2);
    text.push_str("\\x");
    for byte in bytes {
        text.push_str(&format!("{byte:02x}"));
    }
    Value::String(text)
}

/// `inet` drops a full-length prefix the way the server prints it; `cidr`
/// always keeps it.
pub fn inet_to_json(v: IpNetwork, cidr: bool) -> Value {
    let host_prefix = if v.is_ipv4() { 32 } else { 128 };
    if !cidr && v.prefix() == host_prefix {
        Value::String(v.ip().to_string())
    } else {
        Value::String(v.to_string())
    }
}

pub fn numeric_text_to_json(text: &str) -> Value {
    text.trim().parse::<f64>().map_or(Value::Null, float_to_json)
}

const NUMERIC_POS: u16 = 0x0000;
const NUMERIC_NEG: u16 = 0x4000;
const NUMERIC_HEADER_LEN: usize = 8;

/// Decodes the binary `numeric` layout (base-10000 digits with a weight) into
/// a float. NaN and infinities become `null`.
pub fn numeric_binary_to_json(bytes: &[u8]) -> Value {
    let read_u16 = |at: usize| {
        bytes
            .get(at..at + 2)
            .map(|b| u16::from_be_bytes([b[0], b[1]]))
    };

    let (Some(ndigits), Some(weight), Some(sign)) = (read_u16(0), read_u16(2), read_u16(4)) else {
        return Value::Null;
    };
    let weight = weight as i16 as i32;
    let negative = match sign {
        NUMERIC_POS => false,
        NUMERIC_NEG => true,
        _ => return Value::Null,
    };

    let mut value = 0f64;
    for i in 0..usize::from(ndigits) {
        let Some(digit) = read_u16(NUMERIC_HEADER_LEN + 2 * i) else {
            return Value::Null;
        };
        value += f64::from(digit) * 10_000f64.powi(weight - i as i32);
    }

    float_to_json(if negative { -value } else { value })
}

pub fn float_to_json(v: f64) -> Value {
    Number::from_f64(v).map_or(Value::Null, Value::Number)
}

pub fn decimal_to_json(v: Decimal) -> Value {
    v.to_f64().map_or(Value::Null, float_to_json)
}

pub fn date_to_json(v: NaiveDate) -> Value {
    Value::String(v.format("%Y-%m-%d").to_string())
}

pub fn time_to_json(v: NaiveTime) -> Value {
    Value::String(v.format("%H:%M:%S%.f").to_string())
}

pub fn timestamp_to_json(v: NaiveDateTime) -> Value {
    Value::String(v.format("%Y-%m-%dT%H:%M:%S%.f").to_string())
}

pub fn timestamptz_to_json(v: DateTime<Utc>) -> Value {
    Value::String(v.to_rfc3339())
}

/// ISO 8601 duration, e.g. `P1M2DT3.5S`.
pub fn interval_to_json(v: &PgInterval) -> Value {
    let seconds = v.microseconds as f64 / 1_000_000.0;
    Value::String(format!("P{}M{}DT{}S", v.months, v.days, seconds))
}
