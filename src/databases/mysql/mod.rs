use std::str::FromStr;

use anyhow::Context;
use itertools::Itertools;
use mysql::prelude::Queryable;
use mysql::{Conn, Opts, TxOpts};
use tracing::debug;

use crate::databases::table::{Column, ColumnType, Row, TableInfo};
use crate::databases::traits::{DBConnection, DBReader, DBWriter, ReadRequest, ReaderIterator};

mod value;

pub fn quote_backtick(name: &str) -> String {
    return format!("`{}`", name.replace('`', "``"));
}

/// Upper bound on placeholders in one prepared statement.
const MAX_PLACEHOLDERS: usize = 65_535;

fn rows_per_insert(num_columns: usize) -> usize {
    return (MAX_PLACEHOLDERS / num_columns.max(1)).max(1);
}

fn insert_query(table: &str, columns: &[Column], num_rows: usize) -> String {
    let placeholder = format!("({})", columns.iter().map(|_| "?").join(", "));
    return format!(
        "INSERT INTO {} ({}) VALUES {}",
        quote_backtick(table),
        columns.iter().map(|c| quote_backtick(&c.name)).join(", "),
        std::iter::repeat_n(placeholder.as_str(), num_rows).join(", ")
    );
}

pub struct MysqlDB {
    connection: Conn,
}

impl MysqlDB {
    pub fn new(opts: Opts) -> anyhow::Result<Self> {
        let connection = Conn::new(opts)?;
        debug!("Connected to mysql");
        return Ok(Self { connection });
    }

    fn get_num_rows(&mut self, table: &str) -> anyhow::Result<u64> {
        let count_query = format!("SELECT count(1) FROM {}", quote_backtick(table));
        return self
            .connection
            .query_first(count_query)?
            .context("Unable to get count of rows for table");
    }
}

/// Row of `INFORMATION_SCHEMA.COLUMNS` narrowed to what the copy needs.
struct ColumnInfo {
    column: Column,
    primary_key: bool,
}

impl TryFrom<mysql::Row> for ColumnInfo {
    type Error = anyhow::Error;

    fn try_from(value: mysql::Row) -> Result<Self, Self::Error> {
        let name: String = value
            .get_opt(0)
            .context("Value expected")?
            .context("Couldn't parse column name")?;
        let column_type: String = value
            .get_opt(1)
            .context("Value expected")?
            .context("Couldn't parse column type")?;
        let nullable: String = value
            .get_opt(2)
            .context("Value expected")?
            .context("Couldn't parse column nullable")?;
        let key: String = value
            .get_opt(3)
            .context("Value expected")?
            .context("Couldn't parse column key")?;
        let extra: String = value
            .get_opt(4)
            .context("Value expected")?
            .context("Couldn't parse column extra")?;
        return Ok(ColumnInfo {
            column: Column {
                column_type: ColumnType::from_str(&column_type)
                    .with_context(|| format!("Unsupported type of column {name}"))?,
                name,
                nullable: nullable.as_str() == "YES",
                generated: extra.contains("auto_increment"),
            },
            primary_key: key.as_str() == "PRI",
        });
    }
}

impl DBConnection for MysqlDB {
    fn quote_identifier(&self, name: &str) -> String {
        return quote_backtick(name);
    }

    fn execute(&mut self, query: &str) -> anyhow::Result<()> {
        debug!("Executing on mysql: {query}");
        self.connection.query_drop(query)?;
        return Ok(());
    }

    fn get_tables(&mut self) -> anyhow::Result<Vec<String>> {
        let tables: Vec<String> = self.connection.query(
            "SELECT TABLE_NAME FROM INFORMATION_SCHEMA.TABLES
            WHERE TABLE_SCHEMA = database() AND TABLE_TYPE = 'BASE TABLE'",
        )?;
        return Ok(tables);
    }

    fn get_table_info(&mut self, table: &str, no_count: bool) -> anyhow::Result<TableInfo> {
        let info_rows: Vec<mysql::Row> = self.connection.exec(
            r"SELECT COLUMN_NAME, COLUMN_TYPE, IS_NULLABLE, COLUMN_KEY, EXTRA
            FROM INFORMATION_SCHEMA.COLUMNS
            WHERE TABLE_NAME = ? AND TABLE_SCHEMA = database()
            ORDER BY ORDINAL_POSITION",
            (table,),
        )?;
        if info_rows.is_empty() {
            return Err(anyhow::anyhow!("Table {table} not found"));
        }
        let mut num_rows = None;
        if !no_count {
            num_rows = Some(
                self.get_num_rows(table)
                    .context("Failed to get number of rows in the table")?,
            );
        }

        let mut columns = Vec::with_capacity(info_rows.len());
        let mut primary_key = Vec::new();
        for row in info_rows {
            let info = ColumnInfo::try_from(row)?;
            if info.primary_key {
                primary_key.push(info.column.name.clone());
            }
            columns.push(info.column);
        }

        return Ok(TableInfo {
            name: table.to_string(),
            num_rows,
            columns,
            primary_key,
        });
    }
}

struct MysqlRowsIter<'a> {
    columns: Vec<Column>,
    rows: mysql::QueryResult<'a, 'a, 'a, mysql::Text>,
}

impl Iterator for MysqlRowsIter<'_> {
    type Item = anyhow::Result<Row>;

    fn next(&mut self) -> Option<Self::Item> {
        return match self.rows.next() {
            Some(Ok(row)) => {
                let mut result: Row = Vec::with_capacity(self.columns.len());
                let metadata = row.columns();
                let values = row.unwrap();
                assert_eq!(values.len(), self.columns.len());
                for ((column, meta), value) in self.columns.iter().zip(metadata.iter()).zip(values)
                {
                    let value = value::read_native(value, meta).and_then(|value| {
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
            Some(Err(err)) => Some(Err(err).context("Error while reading data from mysql")),
            None => None,
        };
    }
}

impl DBReader for MysqlDB {
    fn read_iter(&mut self, request: ReadRequest) -> anyhow::Result<ReaderIterator<'_>> {
        let query = request.to_sql(quote_backtick);
        debug!("Reading from mysql: {query}");
        let rows = self
            .connection
            .query_iter(query)
            .context("Failed to get data from mysql source")?;
        return Ok(Box::new(MysqlRowsIter {
            columns: request.columns,
            rows,
        }));
    }

    fn dump_schema(&mut self) -> anyhow::Result<String> {
        let mut ddl = String::new();
        for table in self.get_tables()? {
            let query = format!("SHOW CREATE TABLE {}", quote_backtick(&table));
            let (_, create): (String, String) = self
                .connection
                .query_first(query)?
                .with_context(|| format!("No definition returned for table {table}"))?;
            ddl.push_str(&format!("DROP TABLE IF EXISTS {};\n", quote_backtick(&table)));
            ddl.push_str(&create);
            ddl.push_str(";\n");
        }
        return Ok(ddl);
    }
}

impl DBWriter for MysqlDB {
    fn write_batch(
        &mut self,
        batch: &[Row],
        table: &str,
        columns: &[Column],
    ) -> anyhow::Result<()> {
        let mut trx = self
            .connection
            .start_transaction(TxOpts::default())
            .context("Failed to start mysql transaction")?;
        for chunk in batch.chunks(rows_per_insert(columns.len())) {
            let params: Vec<mysql::Value> =
                chunk.iter().flatten().map(mysql::Value::from).collect();
            trx.exec_drop(insert_query(table, columns, chunk.len()), params)
                .context("Failed to write data")?;
        }
        trx.commit().context("Failed to commit batch")?;
        return Ok(());
    }

    fn reset_sequence(&mut self, table: &str, column: &str) -> anyhow::Result<()> {
        let query = format!(
            "SELECT COALESCE(MAX({}), 0) + 1 FROM {}",
            quote_backtick(column),
            quote_backtick(table)
        );
        let next: i64 = self
            .connection
            .query_first(query)?
            .context("Unable to get max value of the column")?;
        let query = format!(
            "ALTER TABLE {} AUTO_INCREMENT = {next}",
            quote_backtick(table)
        );
        self.connection.query_drop(query)?;
        debug!("Reset AUTO_INCREMENT to {next} for {table}");
        return Ok(());
    }

    fn apply_schema(&mut self, ddl: &str) -> anyhow::Result<()> {
        // Tables are dropped in dump order, whatever references them
        self.execute("SET FOREIGN_KEY_CHECKS = 0")?;
        let result = self.execute(ddl);
        self.execute("SET FOREIGN_KEY_CHECKS = 1")?;
        return result;
    }
}
