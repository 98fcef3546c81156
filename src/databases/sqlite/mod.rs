use anyhow::Context;
use itertools::Itertools;
use ouroboros::self_referencing;
use rusqlite::{Connection, OpenFlags, Rows, Statement, params_from_iter};
use std::str::FromStr;
use tracing::debug;

use crate::databases::table::{Column, ColumnType, Row, TableInfo, Value};
use crate::databases::traits::{DBConnection, DBReader, DBWriter, ReadRequest, ReaderIterator};

mod value;

pub struct SqliteDB {
    connection: Connection,
}

/// Column type from a declared type, following SQLite affinity rules.
/// Declared types the generic parser knows (dates, json, uuid) keep their meaning.
fn affinity_type(declared: &str) -> ColumnType {
    let upper = declared.to_uppercase();
    if upper.contains("INT") {
        return ColumnType::I64;
    }
    if upper.trim().is_empty() || upper.contains("BLOB") {
        return ColumnType::Untyped;
    }
    if let Ok(column_type) = ColumnType::from_str(declared) {
        return column_type;
    }
    if ["CHAR", "CLOB", "TEXT"].iter().any(|t| upper.contains(t)) {
        return ColumnType::String;
    }
    if ["REAL", "FLOA", "DOUB"].iter().any(|t| upper.contains(t)) {
        return ColumnType::F64;
    }
    // NUMERIC affinity
    return ColumnType::Untyped;
}

impl SqliteDB {
    pub fn new(path: &str) -> anyhow::Result<Self> {
        let connection = Connection::open_with_flags(
            path,
            OpenFlags::SQLITE_OPEN_READ_WRITE
                | OpenFlags::SQLITE_OPEN_CREATE
                | OpenFlags::SQLITE_OPEN_URI,
        )?;
        debug!("Connected to sqlite {path}");
        return Ok(SqliteDB { connection });
    }

    fn get_num_rows(&mut self, table: &str) -> anyhow::Result<u64> {
        let query = format!("SELECT count(1) FROM {}", self.quote_identifier(table));
        let count: i64 = self.connection.query_row(&query, [], |row| row.get(0))?;
        return count.try_into().context("Failed to convert i64 to u64");
    }

    fn has_sequence_table(&mut self) -> anyhow::Result<bool> {
        let count: i64 = self.connection.query_row(
            "SELECT count(1) FROM sqlite_master WHERE type = 'table' AND name = 'sqlite_sequence'",
            [],
            |row| row.get(0),
        )?;
        return Ok(count > 0);
    }
}

impl DBConnection for SqliteDB {
    fn execute(&mut self, query: &str) -> anyhow::Result<()> {
        debug!("Executing on sqlite: {query}");
        self.connection.execute_batch(query)?;
        return Ok(());
    }

    fn get_tables(&mut self) -> anyhow::Result<Vec<String>> {
        let mut stmt = self.connection.prepare(
            "SELECT name FROM sqlite_master WHERE type = 'table' AND name NOT LIKE 'sqlite_%'",
        )?;
        let tables = stmt
            .query_map([], |row| row.get(0))?
            .collect::<Result<Vec<String>, _>>()?;
        return Ok(tables);
    }

    fn get_table_info(&mut self, table: &str, no_count: bool) -> anyhow::Result<TableInfo> {
        let mut num_rows = None;
        if !no_count {
            num_rows = Some(
                self.get_num_rows(table)
                    .context("Failed to get number of rows in the table")?,
            );
        }

        let mut stmt = self
            .connection
            .prepare(r#"SELECT name, type, "notnull", pk FROM pragma_table_info(?1) ORDER BY cid"#)
            .context("Failed to query information about table")?;
        let info_rows = stmt
            .query_map([table], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, bool>(2)?,
                    row.get::<_, i64>(3)?,
                ))
            })?
            .collect::<Result<Vec<_>, _>>()?;
        if info_rows.is_empty() {
            return Err(anyhow::anyhow!("Table {table} not found"));
        }

        let primary_key: Vec<String> = info_rows
            .iter()
            .filter(|(_, _, _, pk)| *pk > 0)
            .sorted_by_key(|(_, _, _, pk)| *pk)
            .map(|(name, _, _, _)| name.clone())
            .collect();
        let mut columns = Vec::with_capacity(info_rows.len());
        for (name, declared_type, not_null, _) in info_rows {
            // A lone INTEGER PRIMARY KEY is an alias for the rowid
            let generated = primary_key == [name.as_str()]
                && declared_type.eq_ignore_ascii_case("integer");
            columns.push(Column {
                column_type: affinity_type(&declared_type),
                name,
                nullable: !not_null,
                generated,
            });
        }
        return Ok(TableInfo {
            name: table.to_string(),
            num_rows,
            columns,
            primary_key,
        });
    }
}

#[self_referencing]
struct SqliteRowsIter<'conn> {
    columns: Vec<Column>,
    stmt: Statement<'conn>,
    #[borrows(mut stmt)]
    #[not_covariant]
    rows: Rows<'this>,
}

fn read_row(row: &rusqlite::Row<'_>, columns: &[Column]) -> anyhow::Result<Row> {
    let mut result: Row = Vec::with_capacity(columns.len());
    for (idx, column) in columns.iter().enumerate() {
        let value = Value::try_from(row.get_ref(idx).context("Failed to read value")?)?;
        result.push(
            value
                .cast(column.column_type)
                .with_context(|| format!("Failed to convert column {}", column.name))?,
        );
    }
    return Ok(result);
}

impl Iterator for SqliteRowsIter<'_> {
    type Item = anyhow::Result<Row>;

    fn next(&mut self) -> Option<Self::Item> {
        return self.with_mut(|fields| match fields.rows.next() {
            Ok(Some(row)) => Some(read_row(row, fields.columns)),
            Ok(None) => None,
            Err(err) => Some(Err(err).context("Error while reading data from sqlite")),
        });
    }
}

impl DBReader for SqliteDB {
    fn read_iter(&mut self, request: ReadRequest) -> anyhow::Result<ReaderIterator<'_>> {
        let query = request.to_sql(|name| self.quote_identifier(name));
        debug!("Reading from sqlite: {query}");
        let stmt = self
            .connection
            .prepare(&query)
            .context("Failed to create read query")?;
        let iter = SqliteRowsIterTryBuilder {
            columns: request.columns,
            stmt,
            rows_builder: |stmt: &mut Statement<'_>| stmt.query([]),
        }
        .try_build()
        .context("Failed to read rows")?;
        return Ok(Box::new(iter));
    }

    fn dump_schema(&mut self) -> anyhow::Result<String> {
        let mut stmt = self.connection.prepare(
            "SELECT type, name, sql FROM sqlite_master
            WHERE sql IS NOT NULL AND name NOT LIKE 'sqlite_%' AND type IN ('table', 'index')
            ORDER BY CASE type WHEN 'table' THEN 0 ELSE 1 END",
        )?;
        let entries = stmt
            .query_map([], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                ))
            })?
            .collect::<Result<Vec<_>, _>>()?;
        let mut ddl = String::new();
        for (kind, name, sql) in entries {
            if kind == "table" {
                ddl.push_str(&format!(
                    "DROP TABLE IF EXISTS {};\n",
                    self.quote_identifier(&name)
                ));
            }
            ddl.push_str(&sql);
            ddl.push_str(";\n");
        }
        return Ok(ddl);
    }
}

impl DBWriter for SqliteDB {
    fn write_batch(
        &mut self,
        batch: &[Row],
        table: &str,
        columns: &[Column],
    ) -> anyhow::Result<()> {
        let query = format!(
            "INSERT INTO {} ({}) VALUES ({})",
            self.quote_identifier(table),
            columns
                .iter()
                .map(|c| self.quote_identifier(&c.name))
                .join(", "),
            columns.iter().map(|_| "?").join(", ")
        );
        let trx = self
            .connection
            .transaction()
            .context("Failed to start sqlite transaction")?;
        {
            let mut stmt = trx
                .prepare_cached(&query)
                .context("Failed to create write query")?;
            for row in batch {
                stmt.execute(params_from_iter(row.iter()))
                    .context("Failed to write data")?;
            }
        }
        trx.commit().context("Failed to commit batch")?;
        return Ok(());
    }

    fn reset_sequence(&mut self, table: &str, column: &str) -> anyhow::Result<()> {
        // Without AUTOINCREMENT the next rowid is already max(rowid) + 1
        if !self.has_sequence_table()? {
            debug!("No sqlite_sequence table, nothing to reset for {table}");
            return Ok(());
        }
        let query = format!(
            "UPDATE sqlite_sequence SET seq = (SELECT COALESCE(MAX({}), 0) FROM {}) WHERE name = ?1",
            self.quote_identifier(column),
            self.quote_identifier(table)
        );
        self.connection
            .execute(&query, [table])
            .context("Failed to update sqlite_sequence")?;
        return Ok(());
    }

    fn apply_schema(&mut self, ddl: &str) -> anyhow::Result<()> {
        // Tables are dropped in dump order, whatever references them
        let foreign_keys: bool = self
            .connection
            .query_row("PRAGMA foreign_keys", [], |row| row.get(0))?;
        self.execute("PRAGMA foreign_keys = OFF")?;
        let result = self.execute(ddl);
        if foreign_keys {
            self.execute("PRAGMA foreign_keys = ON")?;
        }
        return result;
    }
}
