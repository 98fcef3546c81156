use std::str::FromStr;

use anyhow::Context;

use crate::databases::mysql::MysqlDB;
use crate::databases::postgres::PostgresDB;
use crate::databases::sqlite::SqliteDB;
use crate::databases::traits::{DBReader, DBWriter};

/// Where to connect, with the connection options of the matching driver.
#[derive(Debug, Clone)]
pub enum URI {
    Sqlite(String),
    Postgres(postgres::Config),
    Mysql(mysql::Opts),
}

impl URI {
    fn build_sqlite(path: &str) -> anyhow::Result<Box<SqliteDB>> {
        return Ok(Box::new(
            SqliteDB::new(path).context("Unable to connect to the sqlite")?,
        ));
    }

    fn build_postgres(config: &postgres::Config) -> anyhow::Result<Box<PostgresDB>> {
        return Ok(Box::new(
            PostgresDB::new(config).context("Unable to connect to the postgres")?,
        ));
    }

    fn build_mysql(opts: &mysql::Opts) -> anyhow::Result<Box<MysqlDB>> {
        return Ok(Box::new(
            MysqlDB::new(opts.clone()).context("Unable to connect to the mysql")?,
        ));
    }

    pub fn create_reader(&self) -> anyhow::Result<Box<dyn DBReader>> {
        let reader: Box<dyn DBReader> = match self {
            URI::Sqlite(path) => Self::build_sqlite(path)?,
            URI::Postgres(config) => Self::build_postgres(config)?,
            URI::Mysql(opts) => Self::build_mysql(opts)?,
        };
        return Ok(reader);
    }

    pub fn create_writer(&self) -> anyhow::Result<Box<dyn DBWriter>> {
        let writer: Box<dyn DBWriter> = match self {
            URI::Sqlite(path) => Self::build_sqlite(path)?,
            URI::Postgres(config) => Self::build_postgres(config)?,
            URI::Mysql(opts) => Self::build_mysql(opts)?,
        };
        return Ok(writer);
    }
}

impl FromStr for URI {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<URI, Self::Err> {
        if let Some(path) = s.strip_prefix("sqlite://") {
            return Ok(URI::Sqlite(path.to_owned()));
        }
        if s.starts_with("postgres://") || s.starts_with("postgresql://") {
            let config = postgres::Config::from_str(s).context("Invalid postgres URI")?;
            return Ok(URI::Postgres(config));
        }
        if s.starts_with("mysql://") || s.starts_with("mariadb://") {
            let opts = mysql::Opts::from_url(&s.replacen("mariadb://", "mysql://", 1))
                .context("Invalid mysql URI")?;
            return Ok(URI::Mysql(opts));
        }
        return Err(anyhow::anyhow!("Unknown URI format"));
    }
}
