pub mod args;
pub mod config;
pub mod connections;
pub mod databases;
pub mod error;
pub mod migration;
pub mod planner;
pub mod progress;
pub mod resync;
pub mod schema;
pub mod table_migrator;
pub mod uri;

use anyhow::Context;
use tracing::info;

use crate::config::Config;
use crate::connections::Connections;
use crate::error::Error;
use crate::migration::{Migration, RunReport};
use crate::progress::{LogProgress, NoProgress, ProgressSink};
use crate::uri::URI;

fn resolve_uris(args: &args::Args) -> anyhow::Result<(URI, URI)> {
    let config = Config::load(&args.config)?;
    let source = config
        .get(&args.source)?
        .uri()
        .with_context(|| format!("Invalid configuration entry {}", args.source))?;
    let target = config
        .get(&args.target)?
        .uri()
        .with_context(|| format!("Invalid configuration entry {}", args.target))?;
    return Ok((source, target));
}

pub fn run(args: args::Args) -> Result<RunReport, Error> {
    let (source, target) = resolve_uris(&args).map_err(Error::Configuration)?;
    info!("-> copy from {} to {}", args.source, args.target);
    let mut connections = Connections::open(&source, &target)?;
    let mut progress: Box<dyn ProgressSink> = if args.quiet {
        Box::new(NoProgress)
    } else {
        Box::new(LogProgress::default())
    };
    let options = args.run_options();
    return Migration::new(&mut connections, &options, progress.as_mut()).run();
}
