use fake::{Fake, Faker};
use postgres::{Client, NoTls};
use testcontainers::{Container, runners::SyncRunner};

use super::{row::TestRow, testable_database::TestableDatabase};

pub struct TestPostgresDatabase {
    pub uri: String,
    pub client: Client,
    container: Container<testcontainers_modules::postgres::Postgres>,
}

impl TestPostgresDatabase {
    pub fn new() -> Self {
        let container = testcontainers_modules::postgres::Postgres::default()
            .start()
            .unwrap();
        let uri = format!(
            "postgres://postgres:postgres@{}:{}/postgres",
            container.get_host().unwrap(),
            container.get_host_port_ipv4(5432).unwrap(),
        );
        let client = Client::connect(&uri, NoTls)
            .expect("Unable to connect to the database created for tests");

        return Self {
            uri,
            client,
            container,
        };
    }
}

fn generate_placeholders(blocks: usize) -> String {
    (0..blocks)
        .map(|i| {
            let start = i * 5 + 1;
            let params = (start..start + 5)
                .map(|n| format!("${}", n))
                .collect::<Vec<_>>()
                .join(", ");
            format!("({})", params)
        })
        .collect::<Vec<_>>()
        .join(", ")
}

impl TestableDatabase for TestPostgresDatabase {
    fn get_url(&self) -> String {
        return self.uri.clone();
    }

    fn execute(&mut self, query: &str) {
        self.client.batch_execute(query).unwrap();
    }

    fn create_test_table(&mut self, name: &str) {
        let query = format!(
            "CREATE TABLE {name} (id BIGSERIAL PRIMARY KEY, score DOUBLE PRECISION, note TEXT, payload BYTEA, created_at TIMESTAMP)"
        );
        self.client
            .execute(&query, &[])
            .expect("Failed to create table");
    }

    fn create_labels_table(&mut self, name: &str, with_id: bool) {
        let id = if with_id { "id BIGSERIAL PRIMARY KEY, " } else { "" };
        let query = format!("CREATE TABLE {name} ({id}label VARCHAR(64))");
        self.client
            .execute(&query, &[])
            .expect("Failed to create table");
    }

    fn fill_test_table(&mut self, name: &str, num_rows: usize) {
        let mut trx = self.client.transaction().unwrap();

        let mut rows = Vec::with_capacity(num_rows);
        for i in 1..num_rows + 1 {
            let mut row: TestRow = Faker.fake();
            row.id = (i * 3) as i64;
            rows.push(row);
        }
        for chunk in rows.chunks(100) {
            let mut params: Vec<&(dyn postgres::types::ToSql + Sync)> = Vec::new();
            for row in chunk.iter() {
                params.push(&row.id);
                params.push(&row.score);
                params.push(&row.note);
                params.push(&row.payload);
                params.push(&row.created_at);
            }

            let placeholders = generate_placeholders(chunk.len());
            let query = format!("INSERT INTO {name} VALUES {placeholders}");

            trx.execute(&query, params.as_slice()).unwrap();
        }
        trx.commit().unwrap();
    }

    fn get_all_rows(&mut self, table_name: &str) -> Vec<TestRow> {
        let query =
            format!("SELECT id, score, note, payload, created_at FROM {table_name} ORDER BY id");

        let stmt = self.client.prepare(&query).unwrap();
        return self
            .client
            .query(&stmt, &[])
            .unwrap()
            .into_iter()
            .map(|row| row.into())
            .collect();
    }

    fn get_labels(&mut self, table_name: &str) -> Vec<String> {
        let query = format!("SELECT label FROM {table_name} ORDER BY label");
        return self
            .client
            .query(&query, &[])
            .unwrap()
            .into_iter()
            .map(|row| row.get(0))
            .collect();
    }

    fn count(&mut self, table_name: &str) -> u64 {
        let query = format!("SELECT count(1) FROM {table_name}");
        let count: i64 = self.client.query_one(&query, &[]).unwrap().get(0);
        return count as u64;
    }

    fn insert_generated(&mut self, table_name: &str) -> i64 {
        let query = format!("INSERT INTO {table_name} (note) VALUES ('generated') RETURNING id");
        return self.client.query_one(&query, &[]).unwrap().get(0);
    }
}
