use tracing::{debug, info, warn};

use crate::databases::traits::DBWriter;
use crate::error::Error;

/// A target table whose key column was copied verbatim.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct ResetTarget {
    pub table: String,
    pub column: String,
}

/// Moves every auto-increment counter past the copied keys.
/// Failures don't stop the run, they are logged and returned.
pub fn resync_sequences(target: &mut dyn DBWriter, reset_targets: &[ResetTarget]) -> Vec<Error> {
    info!("Resetting {} sequences", reset_targets.len());
    let mut failures = Vec::new();
    for reset in reset_targets {
        match target.reset_sequence(&reset.table, &reset.column) {
            Ok(()) => debug!("Sequence of {}.{} reset", reset.table, reset.column),
            Err(err) => {
                warn!("Failed to reset sequence of {}: {err:#}", reset.table);
                failures.push(Error::Resync {
                    table: reset.table.clone(),
                    source: err,
                });
            }
        }
    }
    return failures;
}
