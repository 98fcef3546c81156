use std::collections::HashMap;

use anyhow::Context;
use itertools::Itertools;
use postgres::binary_copy::BinaryCopyInWriter;
use postgres::fallible_iterator::FallibleIterator;
use postgres::types::{ToSql, Type};
use postgres::{Client, NoTls};
use tracing::debug;

use crate::databases::table::{Column, ColumnType, Row, TableInfo};
use crate::databases::traits::{DBConnection, DBReader, DBWriter, ReadRequest, ReaderIterator};

mod value;

pub struct PostgresDB {
    client: Client,
    copy_types: HashMap<(String, Vec<String>), Vec<Type>>,
}

/// Column description used to rebuild `CREATE TABLE` statements.
#[derive(Debug, Clone, PartialEq)]
struct SchemaColumn {
    name: String,
    data_type: String,
    udt_name: String,
    max_length: Option<i32>,
    precision: Option<i32>,
    scale: Option<i32>,
    nullable: bool,
    default: Option<String>,
    identity: bool,
}

impl SchemaColumn {
    fn to_ddl(&self) -> String {
        let serial = self
            .default
            .as_deref()
            .is_some_and(|default| default.starts_with("nextval("));
        let mut ddl = crate::databases::traits::quote_double(&self.name);
        ddl.push(' ');
        let data_type = match (self.data_type.as_str(), serial) {
            ("smallint", true) => "smallserial".to_string(),
            ("integer", true) => "serial".to_string(),
            ("bigint", true) => "bigserial".to_string(),
            ("USER-DEFINED", _) => self.udt_name.clone(),
            ("ARRAY", _) => format!("{}[]", self.udt_name.trim_start_matches('_')),
            ("numeric", _) => match (self.precision, self.scale) {
                (Some(precision), Some(scale)) => format!("numeric({precision},{scale})"),
                _ => "numeric".to_string(),
            },
            (data_type, _) => match self.max_length {
                Some(length) => format!("{data_type}({length})"),
                None => data_type.to_string(),
            },
        };
        ddl.push_str(&data_type);
        if self.identity {
            ddl.push_str(" GENERATED BY DEFAULT AS IDENTITY");
        } else if let (Some(default), false) = (&self.default, serial) {
            ddl.push_str(&format!(" DEFAULT {default}"));
        }
        if !self.nullable {
            ddl.push_str(" NOT NULL");
        }
        return ddl;
    }
}

fn create_table_ddl(table: &str, columns: &[SchemaColumn], primary_key: &[String]) -> String {
    let mut definitions: Vec<String> = columns.iter().map(SchemaColumn::to_ddl).collect();
    if !primary_key.is_empty() {
        definitions.push(format!(
            "PRIMARY KEY ({})",
            primary_key
                .iter()
                .map(|name| crate::databases::traits::quote_double(name))
                .join(", ")
        ));
    }
    return format!(
        "CREATE TABLE {} (\n  {}\n);\n",
        crate::databases::traits::quote_double(table),
        definitions.join(",\n  ")
    );
}

impl PostgresDB {
    pub fn new(config: &postgres::Config) -> anyhow::Result<Self> {
        let client = config.connect(NoTls)?;
        debug!("Connected to postgres");
        return Ok(Self {
            client,
            copy_types: HashMap::new(),
        });
    }

    fn get_num_rows(&mut self, table: &str) -> anyhow::Result<u64> {
        let count_query = format!("SELECT count(1) FROM {}", self.quote_identifier(table));
        return self
            .client
            .query_one(&count_query, &[])?
            .get::<_, i64>(0)
            .try_into()
            .context("Failed to convert i64 to u64");
    }

    fn get_primary_key(&mut self, table: &str) -> anyhow::Result<Vec<String>> {
        let rows = self
            .client
            .query(
                "SELECT a.attname::text
                FROM pg_index i
                JOIN pg_attribute a ON a.attrelid = i.indrelid AND a.attnum = ANY(i.indkey)
                WHERE i.indrelid = quote_ident($1)::regclass AND i.indisprimary
                ORDER BY array_position(i.indkey::int2[], a.attnum)",
                &[&table],
            )
            .context("Failed to query primary key")?;
        return Ok(rows.into_iter().map(|row| row.get(0)).collect());
    }

    fn get_columns(&mut self, table: &str) -> anyhow::Result<Vec<Column>> {
        let mut columns = Vec::new();
        let rows = self
            .client
            .query(
                "SELECT column_name::text, is_nullable::text, column_default::text, is_identity::text
                FROM information_schema.columns
                WHERE table_schema = current_schema() AND table_name = $1
                ORDER BY ordinal_position",
                &[&table],
            )
            .context("Failed to query information about table")?;
        if rows.is_empty() {
            return Err(anyhow::anyhow!("Table {table} not found"));
        }
        for row in rows {
            let is_nullable: &str = row.get(1);
            let default: Option<&str> = row.get(2);
            let is_identity: &str = row.get(3);
            columns.push(Column {
                name: row.get(0),
                column_type: ColumnType::I64, // Temp default
                nullable: is_nullable == "YES",
                generated: is_identity == "YES"
                    || default.is_some_and(|default| default.starts_with("nextval(")),
            })
        }
        let types = self.get_column_types(table, &columns)?;
        for (column, column_type) in std::iter::zip(columns.iter_mut(), types) {
            column.column_type = (&column_type)
                .try_into()
                .with_context(|| format!("Unsupported type of column {}", column.name))?;
        }
        return Ok(columns);
    }

    fn get_column_types(&mut self, table: &str, columns: &[Column]) -> anyhow::Result<Vec<Type>> {
        let key = (
            table.to_string(),
            columns.iter().map(|c| c.name.clone()).collect::<Vec<_>>(),
        );
        if let Some(types) = self.copy_types.get(&key) {
            return Ok(types.clone());
        }
        let query = ReadRequest::new(table, columns).to_sql(|name| self.quote_identifier(name));
        let stmt = self
            .client
            .prepare(&query)
            .context("Failed to prepare select statement")?;
        assert!(
            columns.len() == stmt.columns().len(),
            "Broken invariant. Expected to get {} column infos, got {}",
            columns.len(),
            stmt.columns().len()
        );
        let types: Vec<Type> = stmt.columns().iter().map(|c| c.type_().clone()).collect();
        self.copy_types.insert(key, types.clone());
        return Ok(types);
    }

    /// Definitions of every index of `table` except the primary key one.
    fn get_secondary_indexes(&mut self, table: &str) -> anyhow::Result<Vec<String>> {
        let rows = self
            .client
            .query(
                "SELECT pg_get_indexdef(i.indexrelid)
                FROM pg_index i
                WHERE i.indrelid = quote_ident($1)::regclass AND NOT i.indisprimary
                ORDER BY i.indexrelid",
                &[&table],
            )
            .context("Failed to query indexes")?;
        return Ok(rows.into_iter().map(|row| row.get(0)).collect());
    }

    fn get_schema_columns(&mut self, table: &str) -> anyhow::Result<Vec<SchemaColumn>> {
        let rows = self
            .client
            .query(
                "SELECT column_name::text, data_type::text, udt_name::text,
                    character_maximum_length::int4, numeric_precision::int4, numeric_scale::int4,
                    is_nullable::text, column_default::text, is_identity::text
                FROM information_schema.columns
                WHERE table_schema = current_schema() AND table_name = $1
                ORDER BY ordinal_position",
                &[&table],
            )
            .context("Failed to query table definition")?;
        return Ok(rows
            .into_iter()
            .map(|row| SchemaColumn {
                name: row.get(0),
                data_type: row.get(1),
                udt_name: row.get(2),
                max_length: row.get(3),
                precision: row.get(4),
                scale: row.get(5),
                nullable: row.get::<_, &str>(6) == "YES",
                default: row.get(7),
                identity: row.get::<_, &str>(8) == "YES",
            })
            .collect());
    }
}

impl DBConnection for PostgresDB {
    fn execute(&mut self, query: &str) -> anyhow::Result<()> {
        debug!("Executing on postgres: {query}");
        self.client.batch_execute(query)?;
        return Ok(());
    }

    fn get_tables(&mut self) -> anyhow::Result<Vec<String>> {
        let rows = self.client.query(
            "SELECT table_name::text FROM information_schema.tables
            WHERE table_schema = current_schema() AND table_type = 'BASE TABLE'",
            &[],
        )?;
        return Ok(rows.into_iter().map(|row| row.get(0)).collect());
    }

    fn get_table_info(&mut self, table: &str, no_count: bool) -> anyhow::Result<TableInfo> {
        let columns = self
            .get_columns(table)
            .context("Failed to get info about table columns")?;
        let mut num_rows = None;
        if !no_count {
            num_rows = Some(
                self.get_num_rows(table)
                    .context("Failed to get number of rows in the table")?,
            );
        }
        let primary_key = self
            .get_primary_key(table)
            .context("Failed to get primary key of the table")?;
        return Ok(TableInfo {
            name: table.to_string(),
            num_rows,
            columns,
            primary_key,
        });
    }
}

struct PostgresRowsIter<'a> {
    columns: Vec<Column>,
    rows: postgres::RowIter<'a>,
}

impl Iterator for PostgresRowsIter<'_> {
    type Item = anyhow::Result<Row>;

    fn next(&mut self) -> Option<Self::Item> {
        return match self
            .rows
            .next()
            .context("Error while reading data from postgres")
        {
            Ok(Some(row)) => {
                let mut result: Row = Vec::with_capacity(self.columns.len());
                for (idx, column) in self.columns.iter().enumerate() {
                    let value = value::read_native(&row, idx).and_then(|value| {
                        value.cast(column.column_type).with_context(|| {
                            format!("Failed to convert column {}", column.name)
                        })
                    });
                    match value {
                        Ok(val) => result.push(val),
                        Err(e) => return Some(Err(e)),
                    }
                }
                Some(Ok(result))
            }
            Ok(None) => None,
            Err(e) => Some(Err(e)),
        };
    }
}

impl DBReader for PostgresDB {
    fn read_iter(&mut self, request: ReadRequest) -> anyhow::Result<ReaderIterator<'_>> {
        let query = request.to_sql(|name| self.quote_identifier(name));
        debug!("Reading from postgres: {query}");
        let stmt = self
            .client
            .prepare(&query)
            .context("Failed to prepare select statement")?;
        let rows = self
            .client
            .query_raw(&stmt, &[] as &[&str; 0])
            .context("Failed to get data from postgres source")?;
        return Ok(Box::new(PostgresRowsIter {
            columns: request.columns,
            rows,
        }));
    }

    fn dump_schema(&mut self) -> anyhow::Result<String> {
        let mut ddl = String::new();
        for table in self.get_tables()? {
            let columns = self.get_schema_columns(&table)?;
            let primary_key = self.get_primary_key(&table)?;
            ddl.push_str(&format!(
                "DROP TABLE IF EXISTS {} CASCADE;\n",
                self.quote_identifier(&table)
            ));
            ddl.push_str(&create_table_ddl(&table, &columns, &primary_key));
            for index in self.get_secondary_indexes(&table)? {
                ddl.push_str(&index);
                ddl.push_str(";\n");
            }
        }
        return Ok(ddl);
    }
}

impl DBWriter for PostgresDB {
    fn write_batch(
        &mut self,
        batch: &[Row],
        table: &str,
        columns: &[Column],
    ) -> anyhow::Result<()> {
        let types = self.get_column_types(table, columns)?;
        let query = format!(
            "COPY {} ({}) FROM STDIN WITH BINARY",
            self.quote_identifier(table),
            columns
                .iter()
                .map(|c| self.quote_identifier(&c.name))
                .join(", ")
        );
        let mut trx = self
            .client
            .transaction()
            .context("Failed to start postgres transaction")?;
        let sink = trx
            .copy_in(&query)
            .context("Failed to start writing data into postgres")?;
        let mut writer = BinaryCopyInWriter::new(sink, &types);
        for row in batch {
            let values: Vec<&(dyn ToSql + Sync)> =
                row.iter().map(|value| value as &(dyn ToSql + Sync)).collect();
            writer.write(&values).context("Failed to write row")?;
        }
        writer
            .finish()
            .context("Failed to finish writing to postgres")?;
        trx.commit().context("Failed to commit batch")?;
        return Ok(());
    }

    fn reset_sequence(&mut self, table: &str, column: &str) -> anyhow::Result<()> {
        let quoted_table = self.quote_identifier(table);
        let sequence: Option<String> = self
            .client
            .query_one(
                "SELECT pg_get_serial_sequence($1, $2)",
                &[&quoted_table, &column],
            )
            .context("Failed to find sequence")?
            .get(0);
        let Some(sequence) = sequence else {
            debug!("Column {table}.{column} owns no sequence, nothing to reset");
            return Ok(());
        };
        // is_called = false: the next nextval() returns exactly max + 1
        let query = format!(
            "SELECT setval($1::text::regclass, COALESCE((SELECT MAX({}) FROM {quoted_table}), 0) + 1, false)",
            self.quote_identifier(column)
        );
        self.client
            .execute(&query, &[&sequence])
            .context("Failed to set sequence value")?;
        debug!("Reset sequence {sequence} of {table}");
        return Ok(());
    }
}
