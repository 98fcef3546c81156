use std::str::FromStr;

use anyhow::Context;
use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use rust_decimal::Decimal;

#[derive(Clone, Debug, PartialEq)]
pub enum Value {
    Null,
    Bool(bool),
    I16(i16),
    I32(i32),
    I64(i64),
    F32(f32),
    F64(f64),
    Decimal(Decimal),
    String(String),
    Bytes(Vec<u8>),
    Timestamp(NaiveDateTime),
    Timestamptz(DateTime<Utc>),
    Date(NaiveDate),
    Time(NaiveTime),
    Json(serde_json::Value),
    Uuid(uuid::Uuid),
}

pub type Row = Vec<Value>;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ColumnType {
    Bool,
    I16,
    I32,
    I64,
    F32,
    F64,
    Decimal,
    String,
    Bytes,
    Timestamp,
    Timestamptz,
    Date,
    Time,
    Json,
    Uuid,
    /// No declared type: values keep the representation they were read with.
    Untyped,
}

impl ColumnType {
    pub fn is_integer(&self) -> bool {
        return matches!(self, ColumnType::I16 | ColumnType::I32 | ColumnType::I64);
    }
}

impl FromStr for ColumnType {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<ColumnType, Self::Err> {
        let formatted = s.trim().to_lowercase();
        let unsigned = formatted.split_whitespace().any(|word| word == "unsigned");
        // Strip length, precision and sign qualifiers: varchar(255), int(10) unsigned
        let base = formatted
            .split('(')
            .next()
            .unwrap_or_default()
            .replace(" unsigned", "")
            .replace(" zerofill", "");
        let base = base.trim();
        if base.starts_with("varchar")
            || base.starts_with("nvarchar")
            || base.starts_with("nchar")
            || base.starts_with("character")
        {
            return Ok(ColumnType::String);
        }
        let column_type = match base {
            "bool" | "boolean" => ColumnType::Bool,
            "tinyint" | "smallint" | "int2" | "smallserial" => ColumnType::I16,
            "mediumint" | "int" | "int4" | "serial" => ColumnType::I32,
            "integer" | "bigint" | "int8" | "bigserial" => ColumnType::I64,
            // sqlite REAL and FLOAT are both 8 bytes
            "float4" => ColumnType::F32,
            "real" | "float" | "double" | "double precision" | "float8" => ColumnType::F64,
            "numeric" | "decimal" => ColumnType::Decimal,
            "char" | "bpchar" | "clob" | "text" | "tinytext" | "mediumtext" | "longtext"
            | "enum" | "set" | "name" => ColumnType::String,
            "blob" | "tinyblob" | "mediumblob" | "longblob" | "bytea" | "binary"
            | "varbinary" => ColumnType::Bytes,
            "datetime" | "timestamp" | "timestamp without time zone" => ColumnType::Timestamp,
            "timestamptz" | "timestamp with time zone" => ColumnType::Timestamptz,
            "date" => ColumnType::Date,
            "time" | "time without time zone" => ColumnType::Time,
            "json" | "jsonb" => ColumnType::Json,
            "uuid" => ColumnType::Uuid,
            _ => return Err(anyhow::anyhow!("Unknown column type {s}")),
        };
        if !unsigned {
            return Ok(column_type);
        }
        // Unsigned ranges need the next wider signed type.
        // bigint unsigned stays I64, larger values are read as decimals.
        return Ok(match base {
            "smallint" | "mediumint" => ColumnType::I32,
            "int" | "integer" => ColumnType::I64,
            _ => column_type,
        });
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct Column {
    pub name: String,
    pub column_type: ColumnType,
    pub nullable: bool,
    /// Value is produced by the database itself (serial, identity, auto_increment).
    pub generated: bool,
}

#[derive(Clone, Debug, PartialEq)]
pub struct TableInfo {
    pub name: String,
    pub num_rows: Option<u64>,
    pub columns: Vec<Column>,
    pub primary_key: Vec<String>,
}

impl TableInfo {
    pub fn column(&self, name: &str) -> Option<&Column> {
        return self.columns.iter().find(|c| c.name == name);
    }

    /// Single primary key column that is also a regular, settable column.
    /// Composite or absent keys have no identity column.
    pub fn identity_column(&self) -> Option<&Column> {
        return match self.primary_key.as_slice() {
            [key] => self.column(key),
            _ => None,
        };
    }
}

fn parse_timestamp(value: &str) -> anyhow::Result<NaiveDateTime> {
    const FORMATS: [&str; 3] = ["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d"];
    for format in FORMATS {
        if let Ok(parsed) = NaiveDateTime::parse_from_str(value, format) {
            return Ok(parsed);
        }
        if let Ok(parsed) = NaiveDate::parse_from_str(value, format) {
            return Ok(parsed.and_time(NaiveTime::MIN));
        }
    }
    return Err(anyhow::anyhow!("Unable to parse timestamp from {value}"));
}

fn parse_timestamptz(value: &str) -> anyhow::Result<DateTime<Utc>> {
    if let Ok(parsed) = DateTime::parse_from_rfc3339(value) {
        return Ok(parsed.to_utc());
    }
    if let Ok(parsed) = DateTime::parse_from_str(value, "%Y-%m-%d %H:%M:%S%.f%#z") {
        return Ok(parsed.to_utc());
    }
    return Ok(parse_timestamp(value)?.and_utc());
}

impl Value {
    /// Converts a value decoded from the source into the representation
    /// expected by a target column.
    pub fn cast(self, target: ColumnType) -> anyhow::Result<Value> {
        let value = match (target, self) {
            (_, Value::Null) => Value::Null,
            (ColumnType::Untyped, value) => value,

            (ColumnType::Bool, Value::Bool(val)) => Value::Bool(val),
            (ColumnType::Bool, Value::I16(val)) => Value::Bool(val != 0),
            (ColumnType::Bool, Value::I32(val)) => Value::Bool(val != 0),
            (ColumnType::Bool, Value::I64(val)) => Value::Bool(val != 0),
            (ColumnType::Bool, Value::String(val)) => match val.to_lowercase().as_str() {
                "t" | "true" | "1" | "y" | "yes" => Value::Bool(true),
                "f" | "false" | "0" | "n" | "no" => Value::Bool(false),
                _ => return Err(anyhow::anyhow!("Unable to parse bool from {val}")),
            },

            (ColumnType::I16, value) => Value::I16(i16::try_from(value.as_i64()?)?),
            (ColumnType::I32, value) => Value::I32(i32::try_from(value.as_i64()?)?),
            (ColumnType::I64, value) => Value::I64(value.as_i64()?),

            (ColumnType::F32, value) => Value::F32(value.as_f64()? as f32),
            (ColumnType::F64, value) => Value::F64(value.as_f64()?),

            (ColumnType::Decimal, Value::Decimal(val)) => Value::Decimal(val),
            (ColumnType::Decimal, Value::String(val)) => {
                Value::Decimal(Decimal::from_str(val.trim()).context("Invalid decimal")?)
            }
            (ColumnType::Decimal, Value::F32(val)) => {
                Value::Decimal(Decimal::try_from(val).context("Invalid decimal")?)
            }
            (ColumnType::Decimal, Value::F64(val)) => {
                Value::Decimal(Decimal::try_from(val).context("Invalid decimal")?)
            }
            (ColumnType::Decimal, value) => Value::Decimal(Decimal::from(value.as_i64()?)),

            (ColumnType::String, Value::Bytes(val)) => {
                Value::String(String::from_utf8(val).context("invalid UTF-8")?)
            }
            (ColumnType::String, value) => Value::String(value.into_text()?),

            (ColumnType::Bytes, Value::Bytes(val)) => Value::Bytes(val),
            (ColumnType::Bytes, Value::String(val)) => Value::Bytes(val.into_bytes()),
            (ColumnType::Bytes, Value::Uuid(val)) => Value::Bytes(val.as_bytes().to_vec()),

            (ColumnType::Timestamp, Value::Timestamp(val)) => Value::Timestamp(val),
            (ColumnType::Timestamp, Value::Timestamptz(val)) => Value::Timestamp(val.naive_utc()),
            (ColumnType::Timestamp, Value::Date(val)) => Value::Timestamp(val.and_time(NaiveTime::MIN)),
            (ColumnType::Timestamp, Value::String(val)) => Value::Timestamp(parse_timestamp(&val)?),

            (ColumnType::Timestamptz, Value::Timestamptz(val)) => Value::Timestamptz(val),
            (ColumnType::Timestamptz, Value::Timestamp(val)) => Value::Timestamptz(val.and_utc()),
            (ColumnType::Timestamptz, Value::String(val)) => {
                Value::Timestamptz(parse_timestamptz(&val)?)
            }

            (ColumnType::Date, Value::Date(val)) => Value::Date(val),
            (ColumnType::Date, Value::Timestamp(val)) => Value::Date(val.date()),
            (ColumnType::Date, Value::String(val)) => Value::Date(
                NaiveDate::parse_from_str(val.trim(), "%Y-%m-%d").context("Invalid date")?,
            ),

            (ColumnType::Time, Value::Time(val)) => Value::Time(val),
            (ColumnType::Time, Value::String(val)) => Value::Time(
                NaiveTime::parse_from_str(val.trim(), "%H:%M:%S%.f").context("Invalid time")?,
            ),

            (ColumnType::Json, Value::Json(val)) => Value::Json(val),
            (ColumnType::Json, Value::String(val)) => {
                Value::Json(serde_json::from_str(&val).context("Invalid json")?)
            }
            (ColumnType::Json, Value::Bytes(val)) => {
                Value::Json(serde_json::from_slice(&val).context("Invalid json")?)
            }

            (ColumnType::Uuid, Value::Uuid(val)) => Value::Uuid(val),
            (ColumnType::Uuid, Value::String(val)) => {
                Value::Uuid(uuid::Uuid::from_str(&val).context("Invalid uuid")?)
            }
            (ColumnType::Uuid, Value::Bytes(val)) => {
                Value::Uuid(uuid::Uuid::from_slice(&val).context("Invalid uuid")?)
            }

            (target, value) => {
                return Err(anyhow::anyhow!(
                    "Unsupported conversion of {value:?} into {target:?}"
                ));
            }
        };
        return Ok(value);
    }

    /// Integral view of the value, used for keyset pagination and casting.
    pub fn as_i64(&self) -> anyhow::Result<i64> {
        return match self {
            Value::Bool(val) => Ok(i64::from(*val)),
            Value::I16(val) => Ok(i64::from(*val)),
            Value::I32(val) => Ok(i64::from(*val)),
            Value::I64(val) => Ok(*val),
            Value::String(val) => val.trim().parse().context("Invalid integer"),
            Value::Decimal(val) if val.fract().is_zero() => {
                i64::try_from(*val).context("Decimal is out of range")
            }
            other => Err(anyhow::anyhow!("Expected integer, got {other:?}")),
        };
    }

    fn as_f64(&self) -> anyhow::Result<f64> {
        return match self {
            Value::F32(val) => Ok(f64::from(*val)),
            Value::F64(val) => Ok(*val),
            Value::I16(val) => Ok(f64::from(*val)),
            Value::I32(val) => Ok(f64::from(*val)),
            Value::I64(val) => Ok(*val as f64),
            Value::Decimal(val) => f64::try_from(*val).context("Decimal is out of range"),
            Value::String(val) => val.trim().parse().context("Invalid float"),
            other => Err(anyhow::anyhow!("Expected float, got {other:?}")),
        };
    }

    fn into_text(self) -> anyhow::Result<String> {
        let text = match self {
            Value::String(val) => val,
            Value::Bool(val) => val.to_string(),
            Value::I16(val) => val.to_string(),
            Value::I32(val) => val.to_string(),
            Value::I64(val) => val.to_string(),
            Value::F32(val) => val.to_string(),
            Value::F64(val) => val.to_string(),
            Value::Decimal(val) => val.to_string(),
            Value::Timestamp(val) => val.format("%Y-%m-%d %H:%M:%S%.f").to_string(),
            Value::Timestamptz(val) => val.format("%Y-%m-%d %H:%M:%S%.f%:z").to_string(),
            Value::Date(val) => val.format("%Y-%m-%d").to_string(),
            Value::Time(val) => val.format("%H:%M:%S%.f").to_string(),
            Value::Json(val) => val.to_string(),
            Value::Uuid(val) => val.to_string(),
            Value::Bytes(val) => String::from_utf8(val).context("invalid UTF-8")?,
            Value::Null => return Err(anyhow::anyhow!("NULL has no text representation")),
        };
        return Ok(text);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    #[rstest]
    #[case("varchar(255)", ColumnType::String)]
    #[case("character varying", ColumnType::String)]
    #[case("INTEGER", ColumnType::I64)]
    #[case("int(11)", ColumnType::I32)]
    #[case("int unsigned", ColumnType::I64)]
    #[case("int(10) unsigned", ColumnType::I64)]
    #[case("smallint(5) unsigned", ColumnType::I32)]
    #[case("mediumint unsigned zerofill", ColumnType::I32)]
    #[case("tinyint(3) unsigned", ColumnType::I16)]
    #[case("bigint(20) unsigned", ColumnType::I64)]
    #[case("decimal(10,2) unsigned", ColumnType::Decimal)]
    #[case("enum('a','b')", ColumnType::String)]
    #[case("bigserial", ColumnType::I64)]
    #[case("decimal(10,2)", ColumnType::Decimal)]
    #[case("double precision", ColumnType::F64)]
    #[case("REAL", ColumnType::F64)]
    #[case("float4", ColumnType::F32)]
    #[case("varbinary(16)", ColumnType::Bytes)]
    #[case("timestamp with time zone", ColumnType::Timestamptz)]
    #[case("DATETIME", ColumnType::Timestamp)]
    #[case("jsonb", ColumnType::Json)]
    fn parse_column_type(#[case] declared: &str, #[case] expected: ColumnType) {
        assert_eq!(ColumnType::from_str(declared).unwrap(), expected);
    }

    #[test]
    fn parse_unknown_column_type() {
        assert!(ColumnType::from_str("geometry").is_err());
        assert!(ColumnType::from_str("").is_err());
    }

    #[test]
    fn untyped_keeps_value() {
        assert_eq!(Value::I64(1).cast(ColumnType::Untyped).unwrap(), Value::I64(1));
        assert_eq!(
            Value::String("x".into()).cast(ColumnType::Untyped).unwrap(),
            Value::String("x".into())
        );
    }

    #[test]
    fn cast_null_into_anything() {
        assert_eq!(Value::Null.cast(ColumnType::Uuid).unwrap(), Value::Null);
        assert_eq!(Value::Null.cast(ColumnType::I16).unwrap(), Value::Null);
    }

    #[test]
    fn cast_integer_narrowing_is_checked() {
        assert_eq!(Value::I64(42).cast(ColumnType::I16).unwrap(), Value::I16(42));
        assert!(Value::I64(i64::MAX).cast(ColumnType::I32).is_err());
    }

    #[test]
    fn cast_sqlite_text_into_temporal() {
        let ts = Value::String("2004-10-19 10:23:54".into())
            .cast(ColumnType::Timestamp)
            .unwrap();
        let expected = NaiveDate::from_ymd_opt(2004, 10, 19)
            .unwrap()
            .and_hms_opt(10, 23, 54)
            .unwrap();
        assert_eq!(ts, Value::Timestamp(expected));

        let tz = Value::String("2004-10-19 10:23:54+00:00".into())
            .cast(ColumnType::Timestamptz)
            .unwrap();
        assert_eq!(tz, Value::Timestamptz(expected.and_utc()));
    }

    #[test]
    fn cast_blob_into_uuid() {
        let uuid = uuid::Uuid::parse_str("67e55044-10b1-426f-9247-bb680e5fe0c8").unwrap();
        let value = Value::Bytes(uuid.as_bytes().to_vec())
            .cast(ColumnType::Uuid)
            .unwrap();
        assert_eq!(value, Value::Uuid(uuid));
    }

    #[test]
    fn cast_into_text() {
        assert_eq!(
            Value::Bool(true).cast(ColumnType::String).unwrap(),
            Value::String("true".into())
        );
        assert_eq!(
            Value::Json(serde_json::json!({"test": 1}))
                .cast(ColumnType::String)
                .unwrap(),
            Value::String(r#"{"test":1}"#.into())
        );
    }

    #[test]
    fn cast_integer_into_bool() {
        assert_eq!(Value::I64(1).cast(ColumnType::Bool).unwrap(), Value::Bool(true));
        assert_eq!(Value::I64(0).cast(ColumnType::Bool).unwrap(), Value::Bool(false));
    }

    #[test]
    fn cast_unsupported() {
        assert!(Value::Bytes(vec![1, 2]).cast(ColumnType::Date).is_err());
    }

    #[test]
    fn identity_column_requires_single_key() {
        let column = |name: &str| Column {
            name: name.to_string(),
            column_type: ColumnType::I64,
            nullable: false,
            generated: false,
        };
        let mut info = TableInfo {
            name: "users".to_string(),
            num_rows: None,
            columns: vec![column("id"), column("org_id")],
            primary_key: vec!["id".to_string()],
        };
        assert_eq!(info.identity_column().map(|c| c.name.as_str()), Some("id"));

        info.primary_key.push("org_id".to_string());
        assert_eq!(info.identity_column(), None);

        info.primary_key.clear();
        assert_eq!(info.identity_column(), None);
    }
}
