use std::{
    fmt::Display,
    time::{Duration, Instant},
};

use num_format::{Locale, ToFormattedString};
use tracing::info;

/// Receives copy progress. The migration never writes to the terminal itself.
#[cfg_attr(test, mockall::automock)]
pub trait ProgressSink {
    fn on_table_start(&mut self, table: &str, total_rows: u64);

    /// `rows` is the number of rows written so far for `table`.
    fn on_progress(&mut self, table: &str, rows: u64);

    fn on_table_done(&mut self, table: &str);

    fn on_all_done(&mut self);
}

pub struct NoProgress;

impl ProgressSink for NoProgress {
    fn on_table_start(&mut self, _table: &str, _total_rows: u64) {}

    fn on_progress(&mut self, _table: &str, _rows: u64) {}

    fn on_table_done(&mut self, _table: &str) {}

    fn on_all_done(&mut self) {}
}

struct RateLimiter {
    last_usage: Option<Instant>,
    min_duration_between: Duration,
}

impl RateLimiter {
    fn new(min_secs_between: u64) -> Self {
        return Self {
            last_usage: None,
            min_duration_between: Duration::from_secs(min_secs_between),
        };
    }

    fn try_acquire(&mut self) -> bool {
        if self
            .last_usage
            .is_some_and(|last| last.elapsed() < self.min_duration_between)
        {
            return false;
        }
        self.last_usage = Some(Instant::now());
        return true;
    }
}

#[derive(Debug)]
pub struct FormattedDuration(pub Duration);

impl Display for FormattedDuration {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut t = self.0.as_secs();
        let seconds = t % 60;
        t /= 60;
        let minutes = t % 60;
        t /= 60;
        let hours = t % 24;
        t /= 24;
        if t > 0 {
            let days = t;
            write!(f, "{days}d {hours:02}:{minutes:02}:{seconds:02}")
        } else {
            write!(f, "{hours:02}:{minutes:02}:{seconds:02}")
        }
    }
}

struct ProgressTracker {
    total: u64,
    current: u64,
    started: Instant,
}

impl ProgressTracker {
    fn new(total: u64) -> Self {
        return Self {
            total,
            current: 0,
            started: Instant::now(),
        };
    }
}

impl Display for ProgressTracker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let current = self.current;
        let elapsed = self.started.elapsed();
        let per_sec = current / elapsed.as_secs().max(1);
        let formatted = current.to_formatted_string(&Locale::en);
        if self.total == 0 {
            return write!(f, "[{}] Processed: {formatted}", FormattedDuration(elapsed));
        }
        let percent = current * 100 / self.total;
        let percent_remainder = (current * 10000 / self.total) % 100;
        let eta = FormattedDuration(Duration::from_secs(
            self.total.saturating_sub(current) / per_sec.max(1),
        ));
        return write!(
            f,
            "[{}] Processed: {percent}.{percent_remainder:02}% ({formatted}/{}) Rows per sec: {per_sec} ETA: {eta}",
            FormattedDuration(elapsed),
            self.total.to_formatted_string(&Locale::en),
        );
    }
}

struct TableMigrationProgress {
    table: String,
    writer: ProgressTracker,
    limiter: RateLimiter,
}

/// Default sink: one `tracing` line per table per second at most.
#[derive(Default)]
pub struct LogProgress {
    current: Option<TableMigrationProgress>,
}

impl ProgressSink for LogProgress {
    fn on_table_start(&mut self, table: &str, total_rows: u64) {
        if total_rows == 0 {
            info!(" -> Table {table} has no data");
        } else {
            info!(
                " -> Table {table}: {} rows",
                total_rows.to_formatted_string(&Locale::en)
            );
        }
        self.current = Some(TableMigrationProgress {
            table: table.to_string(),
            writer: ProgressTracker::new(total_rows),
            limiter: RateLimiter::new(1),
        });
    }

    fn on_progress(&mut self, table: &str, rows: u64) {
        if let Some(progress) = self.current.as_mut().filter(|p| p.table == table) {
            progress.writer.current = rows;
            if progress.limiter.try_acquire() {
                info!("Writing table {table} {}", progress.writer);
            }
        }
    }

    fn on_table_done(&mut self, table: &str) {
        match self.current.take().filter(|p| p.table == table) {
            Some(progress) => info!(" -> Table {table} finished {} \u{2713}", progress.writer),
            None => info!(" -> Table {table} finished \u{2713}"),
        }
    }

    fn on_all_done(&mut self) {
        info!("-> done \u{2713}");
    }
}
