use crate::importer::error::ImportError;
use rusqlite::Connection;
use std::path::Path;
use std::time::Duration;

const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Opens the CRM database for one import job.
pub fn open(path: &Path) -> Result<Connection, ImportError> {
    let conn = Connection::open(path).map_err(ImportError::Open)?;
    conn.busy_timeout(BUSY_TIMEOUT).map_err(ImportError::Open)?;
    Ok(conn)
}
