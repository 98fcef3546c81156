use tracing::info;

use crate::databases::traits::{DBReader, DBWriter};
use crate::error::Error;
use crate::uri::URI;

/// The two live connections of a run. Both are opened up front so a bad
/// entry fails the run before any table is touched.
pub struct Connections {
    pub source: Box<dyn DBReader>,
    pub target: Box<dyn DBWriter>,
    target_uri: URI,
}

impl Connections {
    pub fn open(source: &URI, target: &URI) -> Result<Self, Error> {
        let source_db = source.create_reader().map_err(Error::Connection)?;
        let target_db = target.create_writer().map_err(Error::Connection)?;
        info!("Connected to source and target databases");
        return Ok(Self::new(source_db, target_db, target.clone()));
    }

    pub fn new(source: Box<dyn DBReader>, target: Box<dyn DBWriter>, target_uri: URI) -> Self {
        return Self {
            source,
            target,
            target_uri,
        };
    }

    /// Source tables in the order the source engine lists them.
    pub fn tables(&mut self) -> Result<Vec<String>, Error> {
        return self.source.get_tables().map_err(Error::Introspection);
    }

    pub fn target_uri(&self) -> &URI {
        return &self.target_uri;
    }
}
