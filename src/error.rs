use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Configuration error: {0:#}")]
    Configuration(anyhow::Error),
    #[error("Unable to connect: {0:#}")]
    Connection(anyhow::Error),
    #[error("Unable to inspect tables: {0:#}")]
    Introspection(anyhow::Error),
    #[error("Schema transfer failed: {0:#}")]
    SchemaTransfer(anyhow::Error),
    #[error("Failed to copy table {table}: {source:#}")]
    BatchWrite { table: String, source: anyhow::Error },
    #[error("Failed to reset sequence of table {table}: {source:#}")]
    Resync { table: String, source: anyhow::Error },
}

impl Error {
    pub fn batch_write(table: &str, source: anyhow::Error) -> Self {
        return Error::BatchWrite {
            table: table.to_string(),
            source,
        };
    }
}
