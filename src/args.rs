use std::collections::HashSet;
use std::path::PathBuf;

use clap::Parser;
use tracing::Level;

use crate::migration::RunOptions;
use crate::table_migrator::DEFAULT_BATCH_SIZE;

#[derive(Parser, Clone, Debug)]
#[command(version, about, long_about = None)]
#[command(next_line_help = true)]
pub struct Args {
    /// YAML file with named connection entries (database.yml format)
    pub config: PathBuf,

    /// Name of the source entry in the config
    #[arg(long, short, default_value = "source")]
    pub source: String,

    /// Name of the target entry in the config
    #[arg(long, short, default_value = "target")]
    pub target: String,

    /// Also copy the schema to the target database
    #[clap(long = "with-schema", short = 'c', action)]
    pub copy_schema: bool,

    /// Tables to skip, comma separated
    #[arg(long, short = 'k', value_delimiter = ',')]
    pub skip_tables: Vec<String>,

    /// Don't copy data (schema and sequences are still handled)
    #[clap(long = "dont-copy", short = 'd', action)]
    pub skip_data: bool,

    /// Don't reset sequences after the copy
    #[clap(long = "dont-reset", short = 'r', action)]
    pub skip_sequence_reset: bool,

    /// Number of rows written per transaction
    #[arg(long, default_value_t = DEFAULT_BATCH_SIZE)]
    pub batch_size: usize,

    /// Disable progress output
    #[clap(long, action)]
    pub quiet: bool,

    /// Log level
    #[arg(long, default_value_t = Level::INFO)]
    pub log_level: Level,
}

impl Args {
    pub fn new(config: PathBuf) -> Self {
        return Args {
            config,
            source: "source".to_string(),
            target: "target".to_string(),
            copy_schema: false,
            skip_tables: Vec::new(),
            skip_data: false,
            skip_sequence_reset: false,
            batch_size: DEFAULT_BATCH_SIZE,
            quiet: true,
            log_level: Level::INFO,
        };
    }

    pub fn run_options(&self) -> RunOptions {
        return RunOptions {
            copy_schema: self.copy_schema,
            skip_tables: self
                .skip_tables
                .iter()
                .map(|t| t.trim().to_string())
                .filter(|t| !t.is_empty())
                .collect::<HashSet<_>>(),
            skip_data: self.skip_data,
            skip_sequence_reset: self.skip_sequence_reset,
            batch_size: self.batch_size,
        };
    }
}
