//! Connection configuration in the shape of a Rails `database.yml`:
//! a mapping from entry names to connection parameters.

use std::collections::HashMap;
use std::path::Path;
use std::str::FromStr;

use anyhow::Context;
use serde::Deserialize;

use crate::uri::URI;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Adapter {
    Sqlite,
    Postgres,
    Mysql,
}

impl FromStr for Adapter {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Adapter, Self::Err> {
        let adapter = s.trim().to_lowercase();
        if adapter.contains("postgres") || adapter == "postgis" {
            return Ok(Adapter::Postgres);
        }
        if adapter.contains("mysql") || adapter == "trilogy" || adapter == "mariadb" {
            return Ok(Adapter::Mysql);
        }
        if adapter.contains("sqlite") {
            return Ok(Adapter::Sqlite);
        }
        return Err(anyhow::anyhow!("Unsupported adapter {s}"));
    }
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct ConnectionSpec {
    pub adapter: Option<String>,
    /// Full connection URL, takes precedence over the other fields.
    pub url: Option<String>,
    pub host: Option<String>,
    pub port: Option<u16>,
    #[serde(alias = "user")]
    pub username: Option<String>,
    pub password: Option<String>,
    pub database: Option<String>,
}

impl ConnectionSpec {
    pub fn adapter(&self) -> anyhow::Result<Adapter> {
        return self
            .adapter
            .as_deref()
            .context("Missing adapter")?
            .parse();
    }

    pub fn uri(&self) -> anyhow::Result<URI> {
        if let Some(url) = &self.url {
            return URI::from_str(url);
        }
        let adapter = self.adapter()?;
        let database = self.database.as_deref().context("Missing database")?;
        let host = self.host.as_deref().unwrap_or("localhost");
        let uri = match adapter {
            Adapter::Sqlite => URI::Sqlite(database.to_string()),
            Adapter::Postgres => {
                let mut config = postgres::Config::new();
                config
                    .host(host)
                    .port(self.port.unwrap_or(5432))
                    .dbname(database);
                if let Some(username) = &self.username {
                    config.user(username);
                }
                if let Some(password) = &self.password {
                    config.password(password);
                }
                URI::Postgres(config)
            }
            Adapter::Mysql => {
                let builder = mysql::OptsBuilder::new()
                    .ip_or_hostname(Some(host))
                    .tcp_port(self.port.unwrap_or(3306))
                    .user(self.username.as_deref())
                    .pass(self.password.as_deref())
                    .db_name(Some(database));
                URI::Mysql(builder.into())
            }
        };
        return Ok(uri);
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(transparent)]
pub struct Config {
    entries: HashMap<String, ConnectionSpec>,
}

impl Config {
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Unable to read config file {}", path.display()))?;
        return Self::from_yaml(&content);
    }

    pub fn from_yaml(yaml: &str) -> anyhow::Result<Self> {
        let mut value: serde_yaml::Value =
            serde_yaml::from_str(yaml).context("Config is not valid YAML")?;
        // database.yml files share settings through `<<: *default`
        value.apply_merge().context("Unable to resolve YAML merge keys")?;
        return serde_yaml::from_value(value).context("Invalid config structure");
    }

    pub fn get(&self, name: &str) -> anyhow::Result<&ConnectionSpec> {
        return self
            .entries
            .get(name)
            .with_context(|| format!("Unknown configuration entry {name}"));
    }
}
