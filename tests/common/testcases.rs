use db_cloner::error::Error;
use db_cloner::resync::ResetTarget;
use pretty_assertions::{assert_eq, assert_ne};

use super::TestConfig;
use super::testable_database::{TestableDatabase, fill_labels_table};

fn config(source: &impl TestableDatabase, target: &impl TestableDatabase) -> TestConfig {
    return TestConfig::new(&source.get_url(), &target.get_url());
}

fn users_reset() -> Vec<ResetTarget> {
    return vec![ResetTarget {
        table: "users".to_string(),
        column: "id".to_string(),
    }];
}

/// `users` keeps its ids, `logs` is skipped, `tags` gets target-generated ids.
pub fn copy_with_skip_list(
    mut source: impl TestableDatabase,
    mut target: impl TestableDatabase,
) {
    source.create_test_table("users");
    source.create_test_table("logs");
    source.create_labels_table("tags", false);
    target.create_test_table("users");
    target.create_test_table("logs");
    target.create_labels_table("tags", true);
    source.fill_test_table("users", 500);
    source.fill_test_table("logs", 1000);
    fill_labels_table(&mut source, "tags", 50);
    target.fill_test_table("users", 3);
    target.fill_test_table("logs", 5);
    let logs_before = target.get_all_rows("logs");
    assert_ne!(source.get_all_rows("users"), target.get_all_rows("users"));

    let config = config(&source, &target);
    let mut args = config.args();
    args.skip_tables = vec!["logs".to_string()];
    let report = db_cloner::run(args).unwrap();

    assert_eq!(source.get_all_rows("users"), target.get_all_rows("users"));
    assert_eq!(target.get_all_rows("logs"), logs_before);
    assert_eq!(source.get_labels("tags"), target.get_labels("tags"));
    assert_eq!(report.reset_targets, users_reset());
    assert!(report.resync_failures.is_empty());
    assert_eq!(report.rows_copied(), 550);
    assert_eq!(target.insert_generated("users"), 1501);
}

pub fn empty_table_clears_target(
    mut source: impl TestableDatabase,
    mut target: impl TestableDatabase,
) {
    source.create_test_table("users");
    target.create_test_table("users");
    target.fill_test_table("users", 10);

    let config = config(&source, &target);
    let report = db_cloner::run(config.args()).unwrap();

    assert_eq!(target.count("users"), 0);
    assert_eq!(report.tables.len(), 1);
    assert_eq!(report.tables[0].batches, 0);
    assert!(report.reset_targets.is_empty());
}

pub fn rerun_is_idempotent(mut source: impl TestableDatabase, mut target: impl TestableDatabase) {
    source.create_test_table("users");
    source.create_labels_table("tags", false);
    target.create_test_table("users");
    target.create_labels_table("tags", false);
    source.fill_test_table("users", 120);
    fill_labels_table(&mut source, "tags", 30);
    let config = config(&source, &target);

    db_cloner::run(config.args()).unwrap();
    let first_users = target.get_all_rows("users");
    let first_tags = target.get_labels("tags");
    db_cloner::run(config.args()).unwrap();

    assert_eq!(target.get_all_rows("users"), first_users);
    assert_eq!(target.get_labels("tags"), first_tags);
    assert_eq!(target.count("tags"), 30);
    assert_eq!(source.get_all_rows("users"), first_users);
}

pub fn batch_size_controls_batches(
    mut source: impl TestableDatabase,
    mut target: impl TestableDatabase,
) {
    source.create_test_table("users");
    target.create_test_table("users");
    source.fill_test_table("users", 1234);

    let config = config(&source, &target);
    let report = db_cloner::run(config.args()).unwrap();
    assert_eq!(report.tables[0].batches, 3);
    assert_eq!(report.tables[0].rows_copied, 1234);

    let mut args = config.args();
    args.batch_size = 100;
    let report = db_cloner::run(args).unwrap();
    assert_eq!(report.tables[0].batches, 13);
    assert_eq!(source.get_all_rows("users"), target.get_all_rows("users"));
}

pub fn skip_data(mut source: impl TestableDatabase, mut target: impl TestableDatabase) {
    source.create_test_table("users");
    target.create_test_table("users");
    source.fill_test_table("users", 10);
    target.fill_test_table("users", 4);
    let before = target.get_all_rows("users");

    let config = config(&source, &target);
    let mut args = config.args();
    args.skip_data = true;
    let report = db_cloner::run(args).unwrap();

    assert_eq!(target.get_all_rows("users"), before);
    assert_eq!(report.rows_copied(), 0);
    assert!(report.reset_targets.is_empty());
}

pub fn unknown_config_entry(source: impl TestableDatabase, target: impl TestableDatabase) {
    let config = config(&source, &target);
    let mut args = config.args();
    args.source = "production".to_string();

    let result = db_cloner::run(args);
    assert!(matches!(result, Err(Error::Configuration(_))));
}

pub fn target_table_not_found(
    mut source: impl TestableDatabase,
    target: impl TestableDatabase,
) {
    source.create_test_table("users");
    source.fill_test_table("users", 10);

    let config = config(&source, &target);
    let result = db_cloner::run(config.args());
    assert!(matches!(result, Err(Error::Introspection(_))));
}
