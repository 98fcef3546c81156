use std::error::Error;

use bytes::BytesMut;
use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use postgres::types::{IsNull, ToSql, Type, to_sql_checked};
use rust_decimal::Decimal;

use crate::databases::table::{ColumnType, Value};

impl TryFrom<&Type> for ColumnType {
    type Error = anyhow::Error;

    fn try_from(value: &Type) -> Result<Self, Self::Error> {
        let column_type = match value {
            &Type::BOOL => ColumnType::Bool,
            &Type::INT2 => ColumnType::I16,
            &Type::INT4 => ColumnType::I32,
            &Type::INT8 => ColumnType::I64,
            &Type::FLOAT4 => ColumnType::F32,
            &Type::FLOAT8 => ColumnType::F64,
            &Type::NUMERIC => ColumnType::Decimal,
            &Type::TEXT | &Type::VARCHAR | &Type::BPCHAR | &Type::NAME => ColumnType::String,
            &Type::BYTEA => ColumnType::Bytes,
            &Type::TIMESTAMP => ColumnType::Timestamp,
            &Type::TIMESTAMPTZ => ColumnType::Timestamptz,
            &Type::DATE => ColumnType::Date,
            &Type::TIME => ColumnType::Time,
            &Type::JSON | &Type::JSONB => ColumnType::Json,
            &Type::UUID => ColumnType::Uuid,
            other => return Err(anyhow::anyhow!("Unsupported postgres type {other}")),
        };
        return Ok(column_type);
    }
}

/// Decodes a column using the type postgres reported for it.
pub(crate) fn read_native(row: &postgres::Row, idx: usize) -> anyhow::Result<Value> {
    let column_type = ColumnType::try_from(row.columns()[idx].type_())?;
    let value = match column_type {
        ColumnType::Bool => row.try_get::<_, Option<bool>>(idx)?.map(Value::Bool),
        ColumnType::I16 => row.try_get::<_, Option<i16>>(idx)?.map(Value::I16),
        ColumnType::I32 => row.try_get::<_, Option<i32>>(idx)?.map(Value::I32),
        ColumnType::I64 => row.try_get::<_, Option<i64>>(idx)?.map(Value::I64),
        ColumnType::F32 => row.try_get::<_, Option<f32>>(idx)?.map(Value::F32),
        ColumnType::F64 => row.try_get::<_, Option<f64>>(idx)?.map(Value::F64),
        ColumnType::Decimal => row.try_get::<_, Option<Decimal>>(idx)?.map(Value::Decimal),
        ColumnType::String => row.try_get::<_, Option<String>>(idx)?.map(Value::String),
        ColumnType::Bytes => row.try_get::<_, Option<Vec<u8>>>(idx)?.map(Value::Bytes),
        ColumnType::Timestamp => row
            .try_get::<_, Option<NaiveDateTime>>(idx)?
            .map(Value::Timestamp),
        ColumnType::Timestamptz => row
            .try_get::<_, Option<DateTime<Utc>>>(idx)?
            .map(Value::Timestamptz),
        ColumnType::Date => row.try_get::<_, Option<NaiveDate>>(idx)?.map(Value::Date),
        ColumnType::Time => row.try_get::<_, Option<NaiveTime>>(idx)?.map(Value::Time),
        ColumnType::Json => row
            .try_get::<_, Option<serde_json::Value>>(idx)?
            .map(Value::Json),
        ColumnType::Uuid => row.try_get::<_, Option<uuid::Uuid>>(idx)?.map(Value::Uuid),
        ColumnType::Untyped => {
            return Err(anyhow::anyhow!("Column {idx} has no postgres type"));
        }
    };
    return Ok(value.unwrap_or(Value::Null));
}

// Values are cast to the target column type before writing,
// so every variant delegates to the matching native encoder.
impl ToSql for Value {
    fn to_sql(&self, ty: &Type, out: &mut BytesMut) -> Result<IsNull, Box<dyn Error + Sync + Send>> {
        return match self {
            Value::Null => Ok(IsNull::Yes),
            Value::Bool(val) => val.to_sql(ty, out),
            Value::I16(val) => val.to_sql(ty, out),
            Value::I32(val) => val.to_sql(ty, out),
            Value::I64(val) => val.to_sql(ty, out),
            Value::F32(val) => val.to_sql(ty, out),
            Value::F64(val) => val.to_sql(ty, out),
            Value::Decimal(val) => val.to_sql(ty, out),
            Value::String(val) => val.to_sql(ty, out),
            Value::Bytes(val) => val.to_sql(ty, out),
            Value::Timestamp(val) => val.to_sql(ty, out),
            Value::Timestamptz(val) => val.to_sql(ty, out),
            Value::Date(val) => val.to_sql(ty, out),
            Value::Time(val) => val.to_sql(ty, out),
            Value::Json(val) => val.to_sql(ty, out),
            Value::Uuid(val) => val.to_sql(ty, out),
        };
    }

    fn accepts(_ty: &Type) -> bool {
        return true;
    }

    to_sql_checked!();
}
