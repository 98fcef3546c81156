use crate::databases::table::Value;
use anyhow::Context;
use rusqlite::{
    ToSql,
    types::{ToSqlOutput, ValueRef},
};

impl TryFrom<ValueRef<'_>> for Value {
    type Error = anyhow::Error;

    fn try_from(value: ValueRef<'_>) -> Result<Self, Self::Error> {
        let parsed = match value {
            ValueRef::Null => Value::Null,
            ValueRef::Integer(val) => Value::I64(val),
            ValueRef::Real(val) => Value::F64(val),
            ValueRef::Text(val) => {
                let val = std::str::from_utf8(val).context("invalid UTF-8")?;
                Value::String(val.to_string())
            }
            ValueRef::Blob(val) => Value::Bytes(val.to_vec()),
        };
        return Ok(parsed);
    }
}

impl ToSql for Value {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        match self {
            Value::Null => None::<i32>.to_sql(),
            Value::Bool(val) => val.to_sql(),
            Value::I16(val) => val.to_sql(),
            Value::I32(val) => val.to_sql(),
            Value::I64(val) => val.to_sql(),
            Value::F32(val) => Ok(ToSqlOutput::from(f64::from(*val))),
            Value::F64(val) => val.to_sql(),
            Value::Decimal(val) => Ok(ToSqlOutput::from(val.to_string())),
            Value::String(val) => val.to_sql(),
            Value::Bytes(val) => val.to_sql(),
            Value::Timestamp(val) => val.to_sql(),
            Value::Timestamptz(val) => val.to_sql(),
            Value::Date(val) => val.to_sql(),
            Value::Time(val) => val.to_sql(),
            Value::Json(val) => val.to_sql(),
            Value::Uuid(val) => val.to_sql(),
        }
    }
}
