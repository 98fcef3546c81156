#![allow(dead_code)]
pub mod mysql;
pub mod postgres;
pub mod row;
pub mod sqlite;
pub mod testable_database;
pub mod testcases;

use std::path::PathBuf;

use rand::distr::{Distribution, slice::Choose};
use tempfile::TempDir;

fn gen_database_name() -> String {
    let chars = [
        'a', 'b', 'c', 'd', 'e', 'f', 'g', 'h', 'i', 'j', 'k', 'l', 'm', 'n', 'o', 'p', 'q', 'r',
        's', 't', 'u', 'v', 'w', 'x', 'y', 'z',
    ];
    let chars_dist = Choose::new(&chars).unwrap();
    return chars_dist.sample_iter(&mut rand::rng()).take(10).collect();
}

/// database.yml with `source` and `target` entries, removed on drop.
pub struct TestConfig {
    pub path: PathBuf,
    tmp_dir: TempDir,
}

impl TestConfig {
    pub fn new(source_url: &str, target_url: &str) -> Self {
        let tmp_dir = tempfile::tempdir().unwrap();
        let path = tmp_dir.path().join("database.yml");
        let content = format!("source:\n  url: \"{source_url}\"\n\ntarget:\n  url: \"{target_url}\"\n");
        std::fs::write(&path, content).unwrap();
        return Self { path, tmp_dir };
    }

    pub fn args(&self) -> db_cloner::args::Args {
        return db_cloner::args::Args::new(self.path.clone());
    }
}
