use std::sync::LazyLock;

use anyhow::Context;
use regex::Regex;
use tracing::{debug, info};

use crate::connections::Connections;
use crate::error::Error;
use crate::uri::URI;

static BINARY_LIMIT_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b((?:var)?binary|(?:tiny|medium|long)?blob|bytea)\s*\(\s*\d+\s*\)")
        .expect("Invalid binary limit regex")
});

/// Drops length qualifiers from binary column types, e.g. `varbinary(255)` becomes `varbinary`.
pub fn strip_binary_limits(ddl: &str) -> String {
    return BINARY_LIMIT_REGEX.replace_all(ddl, "$1").into_owned();
}

/// PostgreSQL rejects length qualifiers on binary types.
fn prepare_for_target(ddl: String, target: &URI) -> String {
    return match target {
        URI::Postgres(_) => strip_binary_limits(&ddl),
        URI::Sqlite(_) | URI::Mysql(_) => ddl,
    };
}

/// Dumps the source schema and replays it on the target.
pub fn transfer_schema(connections: &mut Connections) -> Result<(), Error> {
    info!("-> copy schema");
    let ddl = connections
        .source
        .dump_schema()
        .context("Failed to dump source schema")
        .map_err(Error::SchemaTransfer)?;
    let ddl = prepare_for_target(ddl, connections.target_uri());
    debug!("Applying schema:\n{ddl}");
    connections
        .target
        .apply_schema(&ddl)
        .context("Failed to apply schema on target")
        .map_err(Error::SchemaTransfer)?;
    return Ok(());
}
