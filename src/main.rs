use std::process::ExitCode;

use clap::Parser;
use db_cloner::args::Args;
use tracing::{error, info, warn};

fn main() -> ExitCode {
    let args = Args::parse();
    tracing_subscriber::fmt()
        .with_max_level(args.log_level)
        .with_target(false)
        .init();

    return match db_cloner::run(args) {
        Ok(report) => {
            if !report.resync_failures.is_empty() {
                warn!(
                    "{} sequences could not be reset",
                    report.resync_failures.len()
                );
            }
            info!(
                "Copied {} rows across {} tables",
                report.rows_copied(),
                report.tables.len()
            );
            ExitCode::SUCCESS
        }
        Err(err) => {
            error!("{err}");
            ExitCode::FAILURE
        }
    };
}
