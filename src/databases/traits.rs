use itertools::Itertools;

use super::table::{Column, Row, TableInfo};

pub fn quote_double(name: &str) -> String {
    return format!("\"{}\"", name.replace('"', "\"\""));
}

/// Shared surface of every engine connection.
pub trait DBConnection: Send {
    fn quote_identifier(&self, name: &str) -> String {
        return quote_double(name);
    }

    /// Executes one or more statements, discarding any result rows.
    fn execute(&mut self, query: &str) -> anyhow::Result<()>;

    /// User tables in the order the engine lists them.
    fn get_tables(&mut self) -> anyhow::Result<Vec<String>>;

    fn get_table_info(&mut self, table: &str, no_count: bool) -> anyhow::Result<TableInfo>;
}

/// Select over a source table. Values are produced in the format of `columns`,
/// which describe the target table.
#[derive(Clone, Debug, PartialEq)]
pub struct ReadRequest {
    pub table: String,
    pub columns: Vec<Column>,
    pub order_by: Option<String>,
    /// Keyset filter: only rows with `order_by` strictly greater than this.
    pub after: Option<i64>,
    pub limit: Option<usize>,
    pub offset: Option<u64>,
}

impl ReadRequest {
    pub fn new(table: &str, columns: &[Column]) -> Self {
        return Self {
            table: table.to_string(),
            columns: columns.to_vec(),
            order_by: None,
            after: None,
            limit: None,
            offset: None,
        };
    }

    pub fn to_sql(&self, quote: impl Fn(&str) -> String) -> String {
        let mut query = format!(
            "SELECT {} FROM {}",
            self.columns.iter().map(|c| quote(&c.name)).join(", "),
            quote(&self.table)
        );
        if let Some(key) = &self.order_by {
            let key = quote(key);
            if let Some(after) = self.after {
                query.push_str(&format!(" WHERE {key} > {after}"));
            }
            query.push_str(&format!(" ORDER BY {key}"));
        }
        if let Some(limit) = self.limit {
            query.push_str(&format!(" LIMIT {limit}"));
        }
        if let Some(offset) = self.offset {
            query.push_str(&format!(" OFFSET {offset}"));
        }
        return query;
    }
}

pub type ReaderIterator<'a> = Box<dyn Iterator<Item = anyhow::Result<Row>> + 'a>;

pub trait DBReader: DBConnection {
    fn read_iter(&mut self, request: ReadRequest) -> anyhow::Result<ReaderIterator<'_>>;

    /// DDL text dropping and recreating every user table of the database with its indexes.
    fn dump_schema(&mut self) -> anyhow::Result<String>;
}

pub trait DBWriter: DBConnection {
    fn clear_table(&mut self, table: &str) -> anyhow::Result<()> {
        let query = format!("DELETE FROM {}", self.quote_identifier(table));
        return self.execute(&query);
    }

    /// Inserts the whole batch inside one transaction. Nothing is left behind on error.
    fn write_batch(&mut self, batch: &[Row], table: &str, columns: &[Column])
    -> anyhow::Result<()>;

    /// Moves the auto-increment counter of `column` to `max(column) + 1`.
    fn reset_sequence(&mut self, table: &str, column: &str) -> anyhow::Result<()>;

    fn apply_schema(&mut self, ddl: &str) -> anyhow::Result<()> {
        return self.execute(ddl);
    }
}
