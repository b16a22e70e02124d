//! Row decoding from database-specific values into JSON.
//!
//! Decoding is two-phase:
//! 1. `categorize_type` classifies the column's declared type
//! 2. a backend decoder tries the Rust types that category maps to, in order
//!
//! A cell that none of the typed attempts can read falls back to text, then null.
//! SQLite columns carry declared types that do not always match the stored value,
//! so the fallback matters most there.

use crate::models::{ColumnMetadata, DatabaseType, JsonRow};
use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use serde_json::Value as JsonValue;
use sqlx::mysql::{MySqlRow, MySqlTypeInfo, MySqlValueRef};
use sqlx::postgres::{PgRow, PgTypeInfo, PgValueRef};
use sqlx::sqlite::SqliteRow;
use sqlx::{Column, ColumnIndex, Decode, Row, Type, TypeInfo};

/// Logical category for database column types.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TypeCategory {
    Integer,
    Float,
    Decimal,
    Boolean,
    Temporal,
    Binary,
    Json,
    Uuid,
    Text,
}

/// Classify a database type name into a logical category.
pub fn categorize_type(type_name: &str, db: DatabaseType) -> TypeCategory {
    let lower = type_name.to_lowercase();

    // Checked before floats since "numeric" overlaps
    if lower.contains("decimal") || lower.contains("numeric") {
        if db == DatabaseType::SQLite {
            return TypeCategory::Float;
        }
        return TypeCategory::Decimal;
    }
    if lower == "bool" || lower == "boolean" {
        return TypeCategory::Boolean;
    }
    if lower.contains("int") || lower.contains("serial") {
        return TypeCategory::Integer;
    }
    if lower.contains("float") || lower.contains("double") || lower == "real" {
        return TypeCategory::Float;
    }
    if lower.contains("timestamp")
        || lower.contains("datetime")
        || lower == "date"
        || lower == "time"
        || lower == "timetz"
    {
        return TypeCategory::Temporal;
    }
    if lower == "json" || lower == "jsonb" {
        return TypeCategory::Json;
    }
    if lower == "uuid" {
        return TypeCategory::Uuid;
    }
    if lower.contains("blob") || lower.contains("binary") || lower == "bytea" {
        return TypeCategory::Binary;
    }
    TypeCategory::Text
}

/// Wrapper type for raw DECIMAL/NUMERIC values as strings, preserving scale.
#[derive(Debug)]
pub struct RawDecimal(pub String);

impl Type<sqlx::MySql> for RawDecimal {
    fn type_info() -> MySqlTypeInfo {
        <String as Type<sqlx::MySql>>::type_info()
    }

    fn compatible(ty: &MySqlTypeInfo) -> bool {
        let name = ty.name().to_lowercase();
        name.contains("decimal") || name.contains("numeric")
    }
}

impl<'r> Decode<'r, sqlx::MySql> for RawDecimal {
    fn decode(value: MySqlValueRef<'r>) -> Result<Self, sqlx::error::BoxDynError> {
        let s = <&str as Decode<sqlx::MySql>>::decode(value)?;
        Ok(RawDecimal(s.to_string()))
    }
}

impl Type<sqlx::Postgres> for RawDecimal {
    fn type_info() -> PgTypeInfo {
        <String as Type<sqlx::Postgres>>::type_info()
    }

    fn compatible(ty: &PgTypeInfo) -> bool {
        let name = ty.name().to_lowercase();
        name.contains("numeric") || name.contains("decimal")
    }
}

impl<'r> Decode<'r, sqlx::Postgres> for RawDecimal {
    fn decode(value: PgValueRef<'r>) -> Result<Self, sqlx::error::BoxDynError> {
        let s = <&str as Decode<sqlx::Postgres>>::decode(value)?;
        Ok(RawDecimal(s.to_string()))
    }
}

/// Binary cells become text when they hold valid UTF-8, base64 otherwise.
pub fn binary_to_json(bytes: &[u8]) -> JsonValue {
    use base64::{Engine as _, engine::general_purpose::STANDARD};

    match std::str::from_utf8(bytes) {
        Ok(s) => JsonValue::String(s.to_string()),
        Err(_) => JsonValue::String(STANDARD.encode(bytes)),
    }
}

fn float_to_json(v: f64) -> JsonValue {
    serde_json::Number::from_f64(v)
        .map(JsonValue::Number)
        .unwrap_or_else(|| JsonValue::String(v.to_string()))
}

/// Read one cell as `T`. `None` means the column type is incompatible with `T`.
fn cell<'r, R, T>(row: &'r R, idx: usize, to_json: impl FnOnce(T) -> JsonValue) -> Option<JsonValue>
where
    R: Row,
    T: Decode<'r, R::Database> + Type<R::Database>,
    usize: ColumnIndex<R>,
{
    match row.try_get::<Option<T>, _>(idx) {
        Ok(Some(v)) => Some(to_json(v)),
        Ok(None) => Some(JsonValue::Null),
        Err(_) => None,
    }
}

/// Last resort for any backend: text, then bytes, then null.
fn fallback<'r, R>(row: &'r R, idx: usize) -> JsonValue
where
    R: Row,
    String: Decode<'r, R::Database> + Type<R::Database>,
    Vec<u8>: Decode<'r, R::Database> + Type<R::Database>,
    usize: ColumnIndex<R>,
{
    cell::<_, String>(row, idx, JsonValue::String)
        .or_else(|| cell::<_, Vec<u8>>(row, idx, |v| binary_to_json(&v)))
        .unwrap_or_else(|| {
            tracing::debug!(column = idx, "Undecodable column value, returning null");
            JsonValue::Null
        })
}

/// Converts database rows to JSON maps.
pub trait RowToJson {
    fn to_json_row(&self) -> JsonRow;
    fn column_metadata(&self) -> Vec<ColumnMetadata>;
}

macro_rules! impl_row_to_json {
    ($row:ty, $db:expr, $decoder:path) => {
        impl RowToJson for $row {
            fn to_json_row(&self) -> JsonRow {
                self.columns()
                    .iter()
                    .enumerate()
                    .map(|(idx, col)| {
                        let category = categorize_type(col.type_info().name(), $db);
                        (col.name().to_string(), $decoder(self, idx, category))
                    })
                    .collect()
            }

            fn column_metadata(&self) -> Vec<ColumnMetadata> {
                self.columns()
                    .iter()
                    .map(|col| ColumnMetadata::new(col.name(), col.type_info().name()))
                    .collect()
            }
        }
    };
}

impl_row_to_json!(MySqlRow, DatabaseType::MySQL, mysql::decode_column);
impl_row_to_json!(PgRow, DatabaseType::PostgreSQL, postgres::decode_column);
impl_row_to_json!(SqliteRow, DatabaseType::SQLite, sqlite::decode_column);

mod mysql {
    use super::*;

    pub fn decode_column(row: &MySqlRow, idx: usize, category: TypeCategory) -> JsonValue {
        let typed = match category {
            TypeCategory::Decimal => cell::<_, RawDecimal>(row, idx, |d| JsonValue::String(d.0)),
            TypeCategory::Integer => cell::<_, i64>(row, idx, |v| v.into())
                .or_else(|| cell::<_, u64>(row, idx, |v| v.into())),
            TypeCategory::Boolean => cell::<_, bool>(row, idx, JsonValue::Bool),
            TypeCategory::Float => cell::<_, f64>(row, idx, float_to_json)
                .or_else(|| cell::<_, f32>(row, idx, |v| float_to_json(v as f64))),
            TypeCategory::Temporal => {
                cell::<_, DateTime<Utc>>(row, idx, |v| JsonValue::String(v.to_rfc3339()))
                    .or_else(|| cell::<_, NaiveDateTime>(row, idx, |v| v.to_string().into()))
                    .or_else(|| cell::<_, NaiveDate>(row, idx, |v| v.to_string().into()))
                    .or_else(|| cell::<_, NaiveTime>(row, idx, |v| v.to_string().into()))
            }
            TypeCategory::Binary => cell::<_, Vec<u8>>(row, idx, |v| binary_to_json(&v)),
            TypeCategory::Json => cell::<_, JsonValue>(row, idx, |v| v),
            TypeCategory::Uuid | TypeCategory::Text => None,
        };
        typed.unwrap_or_else(|| fallback(row, idx))
    }
}

mod postgres {
    use super::*;

    pub fn decode_column(row: &PgRow, idx: usize, category: TypeCategory) -> JsonValue {
        let typed = match category {
            TypeCategory::Decimal => cell::<_, RawDecimal>(row, idx, |d| JsonValue::String(d.0)),
            TypeCategory::Integer => cell::<_, i64>(row, idx, |v| v.into())
                .or_else(|| cell::<_, i32>(row, idx, |v| v.into()))
                .or_else(|| cell::<_, i16>(row, idx, |v| v.into())),
            TypeCategory::Boolean => cell::<_, bool>(row, idx, JsonValue::Bool),
            TypeCategory::Float => cell::<_, f64>(row, idx, float_to_json)
                .or_else(|| cell::<_, f32>(row, idx, |v| float_to_json(v as f64))),
            TypeCategory::Temporal => {
                cell::<_, DateTime<Utc>>(row, idx, |v| JsonValue::String(v.to_rfc3339()))
                    .or_else(|| cell::<_, NaiveDateTime>(row, idx, |v| v.to_string().into()))
                    .or_else(|| cell::<_, NaiveDate>(row, idx, |v| v.to_string().into()))
                    .or_else(|| cell::<_, NaiveTime>(row, idx, |v| v.to_string().into()))
            }
            TypeCategory::Binary => cell::<_, Vec<u8>>(row, idx, |v| binary_to_json(&v)),
            TypeCategory::Json => cell::<_, JsonValue>(row, idx, |v| v),
            TypeCategory::Uuid => cell::<_, uuid::Uuid>(row, idx, |v| v.to_string().into()),
            TypeCategory::Text => None,
        };
        typed.unwrap_or_else(|| fallback(row, idx))
    }
}

mod sqlite {
    use super::*;

    pub fn decode_column(row: &SqliteRow, idx: usize, category: TypeCategory) -> JsonValue {
        let typed = match category {
            TypeCategory::Integer => cell::<_, i64>(row, idx, |v| v.into()),
            TypeCategory::Boolean => cell::<_, bool>(row, idx, JsonValue::Bool),
            TypeCategory::Float | TypeCategory::Decimal => cell::<_, f64>(row, idx, float_to_json),
            TypeCategory::Binary => cell::<_, Vec<u8>>(row, idx, |v| binary_to_json(&v)),
            TypeCategory::Json => cell::<_, String>(row, idx, |v| {
                serde_json::from_str(&v).unwrap_or(JsonValue::String(v))
            }),
            // Dates are stored as text in SQLite
            TypeCategory::Temporal | TypeCategory::Uuid | TypeCategory::Text => None,
        };
        typed
            .or_else(|| cell::<_, i64>(row, idx, |v| v.into()))
            .or_else(|| cell::<_, f64>(row, idx, float_to_json))
            .unwrap_or_else(|| fallback(row, idx))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_categorize_type_integer() {
        assert_eq!(
            categorize_type("INT UNSIGNED", DatabaseType::MySQL),
            TypeCategory::Integer
        );
        assert_eq!(
            categorize_type("BIGINT", DatabaseType::PostgreSQL),
            TypeCategory::Integer
        );
        assert_eq!(
            categorize_type("SERIAL", DatabaseType::PostgreSQL),
            TypeCategory::Integer
        );
    }

    #[test]
    fn test_categorize_type_decimal() {
        assert_eq!(
            categorize_type("DECIMAL", DatabaseType::MySQL),
            TypeCategory::Decimal
        );
        assert_eq!(
            categorize_type("NUMERIC", DatabaseType::PostgreSQL),
            TypeCategory::Decimal
        );
        assert_eq!(
            categorize_type("numeric", DatabaseType::SQLite),
            TypeCategory::Float
        );
    }

    #[test]
    fn test_categorize_type_temporal() {
        assert_eq!(
            categorize_type("DATETIME", DatabaseType::MySQL),
            TypeCategory::Temporal
        );
        assert_eq!(
            categorize_type("TIMESTAMPTZ", DatabaseType::PostgreSQL),
            TypeCategory::Temporal
        );
        assert_eq!(
            categorize_type("DATE", DatabaseType::SQLite),
            TypeCategory::Temporal
        );
    }

    #[test]
    fn test_categorize_type_text_default() {
        assert_eq!(
            categorize_type("VARCHAR", DatabaseType::MySQL),
            TypeCategory::Text
        );
        assert_eq!(
            categorize_type("NULL", DatabaseType::SQLite),
            TypeCategory::Text
        );
    }

    #[test]
    fn test_binary_to_json() {
        assert_eq!(
            binary_to_json(b"hello world"),
            JsonValue::String("hello world".to_string())
        );
        assert_eq!(
            binary_to_json(&[0xFF, 0xFE, 0x00, 0x01]),
            JsonValue::String("//4AAQ==".to_string())
        );
    }

    #[test]
    fn test_float_to_json_non_finite() {
        assert_eq!(float_to_json(1.5), serde_json::json!(1.5));
        assert_eq!(float_to_json(f64::NAN), JsonValue::String("NaN".to_string()));
    }
}
