use anyhow::Context;
use itertools::Itertools;
use tracing::debug;

use crate::{
    databases::{
        table::Row,
        traits::{DBReader, DBWriter, ReadRequest},
    },
    error::Error,
    planner::{CopyStrategy, TableDescriptor},
    progress::ProgressSink,
    resync::ResetTarget,
};

pub const DEFAULT_BATCH_SIZE: usize = 500;

#[derive(Clone, Debug, PartialEq)]
pub struct TableReport {
    pub table: String,
    pub rows_copied: u64,
    pub batches: usize,
    pub reset_target: Option<ResetTarget>,
}

/// Where the next page of an identity-preserving copy starts.
#[derive(Clone, Copy, Debug, PartialEq)]
enum PageCursor {
    Start,
    AfterKey(i64),
    Offset(u64),
}

/// Writes one batch in its own transaction and reports the running row count.
fn write_batch(
    writer: &mut dyn DBWriter,
    tracker: &mut dyn ProgressSink,
    batch: &[Row],
    table: &TableDescriptor,
    report: &mut TableReport,
) -> anyhow::Result<()> {
    writer
        .write_batch(batch, &table.name, &table.columns)
        .with_context(|| format!("Failed to write batch {}", report.batches + 1))?;
    report.batches += 1;
    report.rows_copied += u64::try_from(batch.len())?;
    tracker.on_progress(&table.name, report.rows_copied);
    return Ok(());
}

/// Copies one table at a time from source to target, one transaction per batch.
pub struct TableMigrator<'a> {
    reader: &'a mut dyn DBReader,
    writer: &'a mut dyn DBWriter,
    tracker: &'a mut dyn ProgressSink,
    batch_size: usize,
}

impl<'a> TableMigrator<'a> {
    pub fn new(
        reader: &'a mut dyn DBReader,
        writer: &'a mut dyn DBWriter,
        tracker: &'a mut dyn ProgressSink,
        batch_size: usize,
    ) -> Self {
        return Self {
            reader,
            writer,
            tracker,
            batch_size,
        };
    }

    /// Replaces the target content of `table` with the source rows.
    pub fn migrate(&mut self, table: &TableDescriptor) -> Result<TableReport, Error> {
        self.tracker.on_table_start(&table.name, table.num_rows);
        self.writer
            .clear_table(&table.name)
            .context("Failed to clear destination table")
            .map_err(|err| Error::batch_write(&table.name, err))?;

        let mut report = TableReport {
            table: table.name.clone(),
            rows_copied: 0,
            batches: 0,
            reset_target: None,
        };
        if table.num_rows == 0 {
            self.tracker.on_table_done(&table.name);
            return Ok(report);
        }

        let result = match &table.strategy {
            CopyStrategy::PreserveIdentity { column } => {
                self.copy_preserving_identity(table, column, &mut report)
            }
            CopyStrategy::GenerateIdentity => self.copy_generating_identity(table, &mut report),
        };
        result.map_err(|err| Error::batch_write(&table.name, err))?;

        // Only integer keys can be backed by a sequence
        if let CopyStrategy::PreserveIdentity { column } = &table.strategy {
            let integer_key = table
                .columns
                .iter()
                .any(|c| &c.name == column && c.column_type.is_integer());
            if integer_key && report.rows_copied > 0 {
                report.reset_target = Some(ResetTarget {
                    table: table.name.clone(),
                    column: column.clone(),
                });
            }
        }
        self.tracker.on_table_done(&table.name);
        return Ok(report);
    }

    /// Pages through the source ordered by the key column, keyset-style when the key is integral.
    fn copy_preserving_identity(
        &mut self,
        table: &TableDescriptor,
        key: &str,
        report: &mut TableReport,
    ) -> anyhow::Result<()> {
        let key_idx = table
            .columns
            .iter()
            .position(|c| c.name == key)
            .context("Key column is not copied")?;
        let keyset = table.columns[key_idx].column_type.is_integer();
        let mut cursor = PageCursor::Start;
        loop {
            let mut request = ReadRequest::new(&table.name, &table.columns);
            request.order_by = Some(key.to_string());
            request.limit = Some(self.batch_size);
            match cursor {
                PageCursor::Start => {}
                PageCursor::AfterKey(last) => request.after = Some(last),
                PageCursor::Offset(offset) => request.offset = Some(offset),
            }
            let page: Vec<Row> = self
                .reader
                .read_iter(request)
                .context("Failed to read page from source")?
                .collect::<anyhow::Result<_>>()?;
            let Some(last_row) = page.last() else {
                break;
            };
            cursor = if keyset {
                PageCursor::AfterKey(last_row[key_idx].as_i64()?)
            } else {
                PageCursor::Offset(report.rows_copied + u64::try_from(page.len())?)
            };
            debug!("Copying page of {} rows into {}", page.len(), table.name);
            write_batch(&mut *self.writer, &mut *self.tracker, &page, table, report)?;
            if page.len() < self.batch_size {
                break;
            }
        }
        return Ok(());
    }

    /// Streams the whole source table once and writes it in slices.
    fn copy_generating_identity(
        &mut self,
        table: &TableDescriptor,
        report: &mut TableReport,
    ) -> anyhow::Result<()> {
        let rows = self
            .reader
            .read_iter(ReadRequest::new(&table.name, &table.columns))
            .context("Failed to read rows from source")?;
        for chunk in &rows.chunks(self.batch_size) {
            let batch: Vec<Row> = chunk.collect::<anyhow::Result<_>>()?;
            debug!("Copying slice of {} rows into {}", batch.len(), table.name);
            write_batch(&mut *self.writer, &mut *self.tracker, &batch, table, report)?;
        }
        return Ok(());
    }
}
