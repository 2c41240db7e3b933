use rusqlite::ErrorCode;

/// Failure while importing a single CSV row.
///
/// Most variants are recorded in the job result and the import moves on to the
/// next row. See [`RowError::is_infrastructure`] for the exception.
#[derive(Debug, thiserror::Error)]
pub enum RowError {
    #[error("{table} schema is not compatible: no column available for insertion")]
    IncompatibleSchema { table: &'static str },
    #[error("{table} has no customer reference column (cliente_privato_id / cliente_id)")]
    MissingCustomerReference { table: &'static str },
    #[error(transparent)]
    Database(#[from] rusqlite::Error),
}

impl RowError {
    /// `true` when the store itself is unusable rather than the row being bad.
    pub fn is_infrastructure(&self) -> bool {
        match self {
            RowError::Database(err) => is_store_failure(err),
            _ => false,
        }
    }
}

/// Failure that ends the whole import job.
#[derive(Debug, thiserror::Error)]
pub enum ImportError {
    #[error("cannot open database: {0}")]
    Open(#[source] rusqlite::Error),
    #[error("transaction control failed: {0}")]
    Transaction(#[source] rusqlite::Error),
    #[error("database unavailable at row {row}: {source}")]
    Store {
        row: usize,
        /// Data rows parsed from the file before the job stopped.
        total_rows: usize,
        #[source]
        source: RowError,
    },
}

impl ImportError {
    /// Number of parsed data rows, when the failure happened after parsing.
    pub fn total_rows(&self) -> Option<usize> {
        match self {
            ImportError::Store { total_rows, .. } => Some(*total_rows),
            _ => None,
        }
    }
}

pub(crate) fn is_store_failure(err: &rusqlite::Error) -> bool {
    matches!(
        err.sqlite_error_code(),
        Some(
            ErrorCode::DatabaseBusy
                | ErrorCode::DatabaseLocked
                | ErrorCode::OutOfMemory
                | ErrorCode::ReadOnly
                | ErrorCode::SystemIoFailure
                | ErrorCode::DatabaseCorrupt
                | ErrorCode::DiskFull
                | ErrorCode::CannotOpen
                | ErrorCode::NotADatabase
        )
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use rusqlite::Connection;

    #[test]
    fn constraint_violations_are_row_errors() {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch("CREATE TABLE t (id TEXT PRIMARY KEY NOT NULL);")
            .unwrap();
        let err = conn
            .execute("INSERT INTO t (id) VALUES (NULL)", [])
            .unwrap_err();

        assert!(!RowError::from(err).is_infrastructure());
    }

    #[test]
    fn busy_database_is_infrastructure() {
        let err = rusqlite::Error::SqliteFailure(
            rusqlite::ffi::Error::new(rusqlite::ffi::SQLITE_BUSY),
            None,
        );
        assert!(RowError::from(err).is_infrastructure());
    }

    #[test]
    fn schema_errors_are_not_infrastructure() {
        let err = RowError::IncompatibleSchema {
            table: "clienti_privati",
        };
        assert!(!err.is_infrastructure());
        assert!(err.to_string().contains("clienti_privati"));
    }

    #[test]
    fn only_store_failures_know_the_parsed_row_count() {
        let busy = || {
            rusqlite::Error::SqliteFailure(rusqlite::ffi::Error::new(rusqlite::ffi::SQLITE_BUSY), None)
        };
        let store = ImportError::Store {
            row: 2,
            total_rows: 5,
            source: RowError::from(busy()),
        };
        assert_eq!(store.total_rows(), Some(5));
        assert_eq!(ImportError::Open(busy()).total_rows(), None);
    }
}
