use std::collections::HashSet;

use tracing::{debug, error, info};

use crate::{
    connections::Connections,
    error::Error,
    planner::{TableDescriptor, plan_tables},
    progress::ProgressSink,
    resync::{ResetTarget, resync_sequences},
    schema::transfer_schema,
    table_migrator::{DEFAULT_BATCH_SIZE, TableMigrator, TableReport},
};

#[derive(Clone, Debug, PartialEq)]
pub struct RunOptions {
    pub copy_schema: bool,
    /// Exact, case-sensitive table names.
    pub skip_tables: HashSet<String>,
    pub skip_data: bool,
    pub skip_sequence_reset: bool,
    pub batch_size: usize,
}

impl Default for RunOptions {
    fn default() -> Self {
        return Self {
            copy_schema: false,
            skip_tables: HashSet::new(),
            skip_data: false,
            skip_sequence_reset: false,
            batch_size: DEFAULT_BATCH_SIZE,
        };
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Stage {
    Init,
    SchemaTransfer,
    PlanTables,
    CopyTables,
    ResyncSequences,
    Done,
    Failed,
}

#[derive(Debug)]
pub struct RunReport {
    pub tables: Vec<TableReport>,
    /// Tables whose key column was copied verbatim, in copy order.
    pub reset_targets: Vec<ResetTarget>,
    pub resync_failures: Vec<Error>,
}

impl RunReport {
    pub fn rows_copied(&self) -> u64 {
        return self.tables.iter().map(|t| t.rows_copied).sum();
    }
}

/// One run: `Init -> [SchemaTransfer] -> PlanTables -> CopyTables -> [ResyncSequences] -> Done`.
pub struct Migration<'a> {
    connections: &'a mut Connections,
    options: &'a RunOptions,
    progress: &'a mut dyn ProgressSink,
    stage: Stage,
}

impl<'a> Migration<'a> {
    pub fn new(
        connections: &'a mut Connections,
        options: &'a RunOptions,
        progress: &'a mut dyn ProgressSink,
    ) -> Self {
        return Self {
            connections,
            options,
            progress,
            stage: Stage::Init,
        };
    }

    pub fn stage(&self) -> Stage {
        return self.stage;
    }

    fn enter(&mut self, stage: Stage) {
        debug!("Migration stage {:?} -> {stage:?}", self.stage);
        self.stage = stage;
    }

    pub fn run(&mut self) -> Result<RunReport, Error> {
        let result = self.run_stages();
        match &result {
            Ok(_) => self.enter(Stage::Done),
            Err(err) => {
                error!("Migration failed during {:?}: {err}", self.stage);
                self.enter(Stage::Failed);
            }
        }
        return result;
    }

    fn run_stages(&mut self) -> Result<RunReport, Error> {
        if self.options.batch_size == 0 {
            return Err(Error::Configuration(anyhow::anyhow!(
                "Batch size should be greater than zero"
            )));
        }

        if self.options.copy_schema {
            self.enter(Stage::SchemaTransfer);
            transfer_schema(self.connections)?;
        }

        self.enter(Stage::PlanTables);
        let plan = plan_tables(self.connections, &self.options.skip_tables)?;
        info!("-> {} tables to copy", plan.len());

        self.enter(Stage::CopyTables);
        let tables = self.copy_tables(&plan)?;
        let reset_targets: Vec<ResetTarget> = tables
            .iter()
            .filter_map(|t| t.reset_target.clone())
            .collect();

        let mut resync_failures = Vec::new();
        if self.options.skip_sequence_reset {
            info!("-> sequence reset skipped");
        } else if !reset_targets.is_empty() {
            self.enter(Stage::ResyncSequences);
            resync_failures = resync_sequences(self.connections.target.as_mut(), &reset_targets);
        }

        self.progress.on_all_done();
        return Ok(RunReport {
            tables,
            reset_targets,
            resync_failures,
        });
    }

    fn copy_tables(&mut self, plan: &[TableDescriptor]) -> Result<Vec<TableReport>, Error> {
        let mut reports = Vec::with_capacity(plan.len());
        if self.options.skip_data {
            info!("-> data copy skipped");
            for table in plan {
                self.progress.on_table_start(&table.name, table.num_rows);
                self.progress.on_table_done(&table.name);
                reports.push(TableReport {
                    table: table.name.clone(),
                    rows_copied: 0,
                    batches: 0,
                    reset_target: None,
                });
            }
            return Ok(reports);
        }

        let mut migrator = TableMigrator::new(
            self.connections.source.as_mut(),
            self.connections.target.as_mut(),
            &mut *self.progress,
            self.options.batch_size,
        );
        for table in plan {
            reports.push(migrator.migrate(table)?);
        }
        return Ok(reports);
    }
}
