use std::str::FromStr;

use anyhow::Context;
use chrono::{NaiveDate, NaiveTime};
use mysql::consts::ColumnType as MysqlType;
use rust_decimal::Decimal;

use crate::databases::table::Value;

/// Character set id MySQL reports for binary strings and blobs.
const BINARY_CHARSET: u16 = 63;

fn text(bytes: Vec<u8>) -> anyhow::Result<String> {
    return String::from_utf8(bytes).context("invalid UTF-8");
}

/// bigint unsigned values past i64::MAX only fit a decimal.
fn parse_integer(text: &str) -> anyhow::Result<Value> {
    if let Ok(val) = text.parse::<i64>() {
        return Ok(Value::I64(val));
    }
    return Ok(Value::Decimal(
        Decimal::from_str(text).context("Invalid integer")?,
    ));
}

/// Decodes a value using the column metadata of the result set.
/// The text protocol delivers most values as bytes, so the column type decides.
pub(crate) fn read_native(value: mysql::Value, column: &mysql::Column) -> anyhow::Result<Value> {
    let parsed = match value {
        mysql::Value::NULL => Value::Null,
        mysql::Value::Int(val) => Value::I64(val),
        mysql::Value::UInt(val) => match i64::try_from(val) {
            Ok(val) => Value::I64(val),
            Err(_) => Value::Decimal(Decimal::from(val)),
        },
        mysql::Value::Float(val) => Value::F32(val),
        mysql::Value::Double(val) => Value::F64(val),
        mysql::Value::Date(year, month, day, hour, minute, second, micros) => {
            let date = NaiveDate::from_ymd_opt(year.into(), month.into(), day.into())
                .context("Invalid mysql date")?;
            if column.column_type() == MysqlType::MYSQL_TYPE_DATE {
                Value::Date(date)
            } else {
                let time = NaiveTime::from_hms_micro_opt(
                    hour.into(),
                    minute.into(),
                    second.into(),
                    micros,
                )
                .context("Invalid mysql time")?;
                Value::Timestamp(date.and_time(time))
            }
        }
        mysql::Value::Time(negative, days, hours, minutes, seconds, micros) => {
            if negative || days > 0 {
                return Err(anyhow::anyhow!("Time interval out of day range"));
            }
            Value::Time(
                NaiveTime::from_hms_micro_opt(hours.into(), minutes.into(), seconds.into(), micros)
                    .context("Invalid mysql time")?,
            )
        }
        mysql::Value::Bytes(bytes) => match column.column_type() {
            MysqlType::MYSQL_TYPE_TINY
            | MysqlType::MYSQL_TYPE_SHORT
            | MysqlType::MYSQL_TYPE_INT24
            | MysqlType::MYSQL_TYPE_LONG
            | MysqlType::MYSQL_TYPE_LONGLONG
            | MysqlType::MYSQL_TYPE_YEAR => parse_integer(&text(bytes)?)?,
            MysqlType::MYSQL_TYPE_FLOAT | MysqlType::MYSQL_TYPE_DOUBLE => {
                Value::F64(text(bytes)?.parse().context("Invalid float")?)
            }
            MysqlType::MYSQL_TYPE_DECIMAL | MysqlType::MYSQL_TYPE_NEWDECIMAL => {
                Value::Decimal(text(bytes)?.parse().context("Invalid decimal")?)
            }
            MysqlType::MYSQL_TYPE_JSON => {
                Value::Json(serde_json::from_slice(&bytes).context("Invalid json")?)
            }
            MysqlType::MYSQL_TYPE_BIT => Value::Bytes(bytes),
            _ if column.character_set() == BINARY_CHARSET => Value::Bytes(bytes),
            _ => Value::String(text(bytes)?),
        },
    };
    return Ok(parsed);
}

impl From<&Value> for mysql::Value {
    fn from(value: &Value) -> Self {
        return match value {
            Value::Null => mysql::Value::NULL,
            Value::Bool(val) => mysql::Value::Int(i64::from(*val)),
            Value::I16(val) => mysql::Value::Int(i64::from(*val)),
            Value::I32(val) => mysql::Value::Int(i64::from(*val)),
            Value::I64(val) => mysql::Value::Int(*val),
            Value::F32(val) => mysql::Value::Float(*val),
            Value::F64(val) => mysql::Value::Double(*val),
            Value::Decimal(val) => mysql::Value::from(*val),
            Value::String(val) => mysql::Value::Bytes(val.clone().into_bytes()),
            Value::Bytes(val) => mysql::Value::Bytes(val.clone()),
            Value::Timestamp(val) => mysql::Value::from(*val),
            Value::Timestamptz(val) => mysql::Value::from(val.naive_utc()),
            Value::Date(val) => mysql::Value::from(*val),
            Value::Time(val) => mysql::Value::from(*val),
            Value::Json(val) => mysql::Value::Bytes(val.to_string().into_bytes()),
            Value::Uuid(val) => mysql::Value::Bytes(val.as_bytes().to_vec()),
        };
    }
}
