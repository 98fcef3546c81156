use super::row::TestRow;

pub trait TestableDatabase {
    /// URL accepted by the `url` key of a config entry.
    fn get_url(&self) -> String;

    fn execute(&mut self, query: &str);

    /// Table with an auto-increment `id` primary key.
    fn create_test_table(&mut self, table_name: &str);

    /// Single `label` column, optionally preceded by an auto-increment `id` primary key.
    fn create_labels_table(&mut self, table_name: &str, with_id: bool);

    /// Inserts rows with ids `3, 6, 9, ...`.
    fn fill_test_table(&mut self, table_name: &str, num_rows: usize);

    fn get_all_rows(&mut self, table_name: &str) -> Vec<TestRow>;

    fn get_labels(&mut self, table_name: &str) -> Vec<String>;

    fn count(&mut self, table_name: &str) -> u64;

    /// Inserts a row without an id and returns the id assigned by the database.
    fn insert_generated(&mut self, table_name: &str) -> i64;
}

pub fn fill_labels_table(db: &mut impl TestableDatabase, table_name: &str, num_rows: usize) {
    let values = (1..=num_rows)
        .map(|i| format!("('label{i:04}')"))
        .collect::<Vec<_>>()
        .join(", ");
    db.execute(&format!("INSERT INTO {table_name} (label) VALUES {values}"));
}
