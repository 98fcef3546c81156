use fake::{Fake, Faker};
use testcontainers::{Container, runners::SyncRunner};

use mysql::{Conn, Opts, TxOpts, params, prelude::Queryable};

use super::{row::TestRow, testable_database::TestableDatabase};

pub struct TestMysqlDatabase {
    pub uri: String,
    pub connection: Conn,
    container: Container<testcontainers_modules::mysql::Mysql>,
}

impl TestMysqlDatabase {
    pub fn new() -> Self {
        let container = testcontainers_modules::mysql::Mysql::default()
            .start()
            .unwrap();

        let uri = format!(
            "mysql://root@{}:{}/test",
            container.get_host().unwrap(),
            container.get_host_port_ipv4(3306).unwrap(),
        );
        let opts = Opts::from_url(&uri).unwrap();
        let connection = Conn::new(opts).unwrap();

        return Self {
            uri,
            connection,
            container,
        };
    }
}

impl TestableDatabase for TestMysqlDatabase {
    fn get_url(&self) -> String {
        return self.uri.clone();
    }

    fn execute(&mut self, query: &str) {
        self.connection.query_drop(query).unwrap();
    }

    fn create_test_table(&mut self, name: &str) {
        let query = format!(
            "CREATE TABLE {name} (id BIGINT AUTO_INCREMENT PRIMARY KEY, score DOUBLE, note TEXT, payload BLOB, created_at DATETIME)"
        );
        self.connection
            .query_drop(&query)
            .expect("Failed to create table");
    }

    fn create_labels_table(&mut self, name: &str, with_id: bool) {
        let id = if with_id {
            "id BIGINT AUTO_INCREMENT PRIMARY KEY, "
        } else {
            ""
        };
        let query = format!("CREATE TABLE {name} ({id}label VARCHAR(64))");
        self.connection
            .query_drop(&query)
            .expect("Failed to create table");
    }

    fn fill_test_table(&mut self, name: &str, num_rows: usize) {
        let mut trx = self
            .connection
            .start_transaction(TxOpts::default())
            .unwrap();

        let mut rows = Vec::with_capacity(num_rows);
        for i in 1..num_rows + 1 {
            let mut row: TestRow = Faker.fake();
            row.id = (i * 3) as i64;
            rows.push(row);
        }
        trx.exec_batch(
            format!("INSERT INTO {name} VALUES (:id, :score, :note, :payload, :created_at)"),
            rows.iter().map(|row| {
                params! {
                    "id" => row.id,
                    "score" => row.score,
                    "note" => row.note.clone(),
                    "payload" => row.payload.clone(),
                    "created_at" => row.created_at,
                }
            }),
        )
        .unwrap();
        trx.commit().unwrap();
    }

    fn get_all_rows(&mut self, table_name: &str) -> Vec<TestRow> {
        let query =
            format!("SELECT id, score, note, payload, created_at FROM {table_name} ORDER BY id");

        return self
            .connection
            .query_map(query, |row: mysql::Row| row.into())
            .unwrap();
    }

    fn get_labels(&mut self, table_name: &str) -> Vec<String> {
        let query = format!("SELECT label FROM {table_name} ORDER BY label");
        return self.connection.query(query).unwrap();
    }

    fn count(&mut self, table_name: &str) -> u64 {
        let query = format!("SELECT count(1) FROM {table_name}");
        return self.connection.query_first(query).unwrap().unwrap();
    }

    fn insert_generated(&mut self, table_name: &str) -> i64 {
        let query = format!("INSERT INTO {table_name} (note) VALUES ('generated')");
        self.connection.query_drop(query).unwrap();
        return self.connection.last_insert_id() as i64;
    }
}
