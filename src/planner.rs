use std::collections::HashSet;

use anyhow::Context;
use itertools::Itertools;
use tracing::{debug, info};

use crate::connections::Connections;
use crate::databases::table::{Column, TableInfo};
use crate::error::Error;

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum CopyStrategy {
    /// Copy the key column verbatim, then resync its sequence.
    PreserveIdentity { column: String },
    /// Let the target assign keys.
    GenerateIdentity,
}

#[derive(Clone, Debug, PartialEq)]
pub struct TableDescriptor {
    pub name: String,
    pub strategy: CopyStrategy,
    /// Snapshot taken while planning.
    pub num_rows: u64,
    /// Target columns to fill, in target order.
    pub columns: Vec<Column>,
}

/// Chooses the copy strategy from the source table and the columns to fill from the target table.
pub fn classify(source: &TableInfo, target: &TableInfo) -> anyhow::Result<(CopyStrategy, Vec<Column>)> {
    if let Some(identity) = source.identity_column() {
        if target.column(&identity.name).is_none() {
            return Err(anyhow::anyhow!(
                "Primary key {} of table {} is missing in the target table",
                identity.name,
                source.name
            ));
        }
        return Ok((
            CopyStrategy::PreserveIdentity {
                column: identity.name.clone(),
            },
            target.columns.clone(),
        ));
    }
    let generated_key = target
        .identity_column()
        .filter(|column| column.generated)
        .map(|column| column.name.as_str());
    let columns = target
        .columns
        .iter()
        .filter(|column| Some(column.name.as_str()) != generated_key)
        .cloned()
        .collect();
    return Ok((CopyStrategy::GenerateIdentity, columns));
}

fn describe(connections: &mut Connections, table: &str) -> anyhow::Result<TableDescriptor> {
    let source = connections
        .source
        .get_table_info(table, false)
        .context("Unable to get information about source table")?;
    let target = connections
        .target
        .get_table_info(table, true)
        .context("Unable to get information about destination table")?;
    let (strategy, columns) = classify(&source, &target)?;
    return Ok(TableDescriptor {
        name: table.to_string(),
        strategy,
        num_rows: source.num_rows.unwrap_or_default(),
        columns,
    });
}

/// Plans every source table except the skipped ones (exact, case-sensitive names).
/// A table that cannot be classified fails the whole plan.
pub fn plan_tables(
    connections: &mut Connections,
    skip_tables: &HashSet<String>,
) -> Result<Vec<TableDescriptor>, Error> {
    let tables = connections.tables()?;
    let mut plan = Vec::with_capacity(tables.len());
    for table in tables.into_iter().unique() {
        if skip_tables.contains(&table) {
            info!(" -> Table {table} skipped");
            continue;
        }
        let descriptor = describe(connections, &table)
            .with_context(|| format!("Unable to plan table {table}"))
            .map_err(Error::Introspection)?;
        debug!(
            "Planned table {table}: {:?}, {} rows",
            descriptor.strategy, descriptor.num_rows
        );
        plan.push(descriptor);
    }
    return Ok(plan);
}
