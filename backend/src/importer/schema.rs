//! Live schema introspection.
//!
//! Deployments run different subsets of the ALTER TABLE patches, so the set of
//! columns on a table is only known at runtime. A [`SchemaShape`] is read fresh
//! before every dynamic statement and never cached.

use log::warn;
use rusqlite::Connection;
use std::collections::BTreeSet;

pub const EXPIRY_COLUMN: &str = "data_scadenza";
pub const EXPIRY_COLUMN_FALLBACK: &str = "data_fine";

/// How new rows of a table get their primary key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyStrategy {
    /// `id` is an `INTEGER PRIMARY KEY`: let SQLite assign it.
    Rowid,
    /// Generate a UUID and write it to `id`.
    Uuid,
}

/// Columns currently present on a table.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SchemaShape {
    table: String,
    columns: BTreeSet<String>,
    integer_pk: bool,
}

impl SchemaShape {
    /// Reads `PRAGMA table_info` for `table`. A missing table yields an empty shape.
    pub fn introspect(conn: &Connection, table: &str) -> rusqlite::Result<Self> {
        let sql = format!("PRAGMA table_info(\"{}\")", table.replace('"', "\"\""));
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map([], |row| {
            Ok((
                row.get::<_, String>(1)?,
                row.get::<_, Option<String>>(2)?.unwrap_or_default(),
                row.get::<_, i64>(5)?,
            ))
        })?;

        let mut columns = BTreeSet::new();
        let mut pk_types = Vec::new();
        for row in rows {
            let (name, decl_type, pk) = row?;
            if pk > 0 {
                pk_types.push(decl_type);
            }
            columns.insert(name.to_lowercase());
        }

        Ok(Self {
            table: table.to_string(),
            columns,
            integer_pk: pk_types.len() == 1 && pk_types[0].eq_ignore_ascii_case("INTEGER"),
        })
    }

    /// Like [`SchemaShape::introspect`], treating any failure as "no columns".
    pub fn load(conn: &Connection, table: &str) -> Self {
        Self::introspect(conn, table).unwrap_or_else(|e| {
            warn!("Schema introspection of {} failed, assuming no columns: {}", table, e);
            Self {
                table: table.to_string(),
                ..Self::default()
            }
        })
    }

    /// Builds a shape from a fixed column list.
    #[cfg(test)]
    pub fn from_columns(table: &str, columns: &[&str]) -> Self {
        Self {
            table: table.to_string(),
            columns: columns.iter().map(|c| c.to_lowercase()).collect(),
            integer_pk: false,
        }
    }

    #[cfg(test)]
    pub fn with_integer_pk(mut self, integer_pk: bool) -> Self {
        self.integer_pk = integer_pk;
        self
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    pub fn has(&self, column: &str) -> bool {
        self.columns.contains(&column.to_lowercase())
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    /// Sorted column names, for diagnostics.
    pub fn columns(&self) -> impl Iterator<Item = &str> {
        self.columns.iter().map(String::as_str)
    }

    /// `data_scadenza` when present, otherwise `data_fine`.
    pub fn expiry_column(&self) -> &'static str {
        if self.has(EXPIRY_COLUMN) {
            EXPIRY_COLUMN
        } else {
            EXPIRY_COLUMN_FALLBACK
        }
    }

    /// Column linking a contract to its private customer, if the table has one.
    pub fn customer_ref_column(&self) -> Option<&'static str> {
        ["cliente_privato_id", "cliente_id"]
            .into_iter()
            .find(|c| self.has(c))
    }

    pub fn key_strategy(&self) -> KeyStrategy {
        if self.integer_pk || !self.has("id") {
            KeyStrategy::Rowid
        } else {
            KeyStrategy::Uuid
        }
    }
}
