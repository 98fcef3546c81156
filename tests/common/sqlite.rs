use std::path::PathBuf;

use fake::{Fake, Faker};
use rusqlite::{Connection, OpenFlags, params};
use tempfile::TempDir;

use super::{gen_database_name, row::TestRow, testable_database::TestableDatabase};

pub struct TestSqliteDatabase {
    pub path: PathBuf,
    pub conn: Connection,
    tmp_dir: TempDir,
}

impl TestSqliteDatabase {
    pub fn new() -> Self {
        let tmp_dir = tempfile::tempdir().unwrap();
        let path = tmp_dir.path().join(gen_database_name());
        let conn = Connection::open_with_flags(
            path.clone(),
            OpenFlags::SQLITE_OPEN_READ_WRITE
                | OpenFlags::SQLITE_OPEN_CREATE
                | OpenFlags::SQLITE_OPEN_URI,
        )
        .expect("Failed to create test sqlite database");

        return Self {
            conn,
            path,
            tmp_dir,
        };
    }
}

impl TestableDatabase for TestSqliteDatabase {
    fn get_url(&self) -> String {
        return format!("sqlite://{}", self.path.to_str().unwrap());
    }

    fn execute(&mut self, query: &str) {
        self.conn.execute_batch(query).unwrap();
    }

    fn create_test_table(&mut self, table_name: &str) {
        let query = format!(
            "CREATE TABLE {table_name} (id INTEGER PRIMARY KEY AUTOINCREMENT, score REAL, note TEXT, payload BLOB, created_at DATETIME)"
        );
        self.conn.execute(&query, []).unwrap();
    }

    fn create_labels_table(&mut self, table_name: &str, with_id: bool) {
        let id = if with_id {
            "id INTEGER PRIMARY KEY AUTOINCREMENT, "
        } else {
            ""
        };
        let query = format!("CREATE TABLE {table_name} ({id}label VARCHAR(64))");
        self.conn.execute(&query, []).unwrap();
    }

    fn fill_test_table(&mut self, table_name: &str, num_rows: usize) {
        let query = format!("INSERT INTO {table_name} VALUES (?1, ?2, ?3, ?4, ?5)");
        let trx = self.conn.transaction().unwrap();
        {
            let mut stmt = trx.prepare(&query).unwrap();
            for i in 1..num_rows + 1 {
                let mut row: TestRow = Faker.fake();
                row.id = (i * 3) as i64;
                stmt.execute(params![row.id, row.score, row.note, row.payload, row.created_at])
                    .unwrap();
            }
        }
        trx.commit().unwrap();
    }

    fn get_all_rows(&mut self, table_name: &str) -> Vec<TestRow> {
        let query =
            format!("SELECT id, score, note, payload, created_at FROM {table_name} ORDER BY id");

        let mut stmt = self.conn.prepare(&query).unwrap();
        let mut rows = Vec::new();
        for row in stmt.query_map([], |row| Ok(TestRow::from(row))).unwrap() {
            rows.push(row.unwrap());
        }
        return rows;
    }

    fn get_labels(&mut self, table_name: &str) -> Vec<String> {
        let query = format!("SELECT label FROM {table_name} ORDER BY label");
        let mut stmt = self.conn.prepare(&query).unwrap();
        return stmt
            .query_map([], |row| row.get(0))
            .unwrap()
            .collect::<Result<_, _>>()
            .unwrap();
    }

    fn count(&mut self, table_name: &str) -> u64 {
        let query = format!("SELECT count(1) FROM {table_name}");
        let count: i64 = self.conn.query_row(&query, [], |row| row.get(0)).unwrap();
        return count as u64;
    }

    fn insert_generated(&mut self, table_name: &str) -> i64 {
        let query = format!("INSERT INTO {table_name} (note) VALUES ('generated')");
        self.conn.execute(&query, []).unwrap();
        return self.conn.last_insert_rowid();
    }
}
