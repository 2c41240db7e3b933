//! Fixture databases for importer tests.

use rusqlite::Connection;
use std::io::Write;
use tempfile::NamedTempFile;

/// Schema after every patch has been applied.
pub const MODERN_SCHEMA: &str = "
    CREATE TABLE users (
        id TEXT PRIMARY KEY,
        email TEXT UNIQUE NOT NULL,
        nome TEXT
    );
    CREATE TABLE clienti_privati (
        id TEXT PRIMARY KEY,
        nome TEXT,
        cognome TEXT,
        codice_fiscale TEXT UNIQUE,
        data_nascita TEXT,
        email_principale TEXT,
        telefono_mobile TEXT,
        via_residenza TEXT,
        civico_residenza TEXT,
        cap_residenza TEXT,
        citta_residenza TEXT,
        provincia_residenza TEXT,
        tipo_documento TEXT,
        numero_documento TEXT,
        ente_rilascio TEXT,
        data_scadenza_documento TEXT,
        iban TEXT,
        consenso_privacy INTEGER DEFAULT 0,
        consenso_marketing INTEGER DEFAULT 0,
        data_consenso TEXT,
        created_by TEXT,
        assigned_agent_id TEXT,
        created_at TEXT DEFAULT CURRENT_TIMESTAMP
    );
    CREATE TABLE contratti_luce (
        id TEXT PRIMARY KEY,
        cliente_privato_id TEXT,
        cliente_azienda_id TEXT,
        tipo_cliente TEXT,
        numero_contratto TEXT,
        pod TEXT,
        fornitore TEXT,
        data_attivazione TEXT,
        data_scadenza TEXT,
        prezzo_energia REAL,
        stato TEXT DEFAULT 'attivo',
        created_by TEXT,
        created_at TEXT DEFAULT CURRENT_TIMESTAMP
    );
    CREATE TABLE contratti_gas (
        id TEXT PRIMARY KEY,
        cliente_privato_id TEXT,
        cliente_azienda_id TEXT,
        tipo_cliente TEXT,
        numero_contratto TEXT,
        pdr TEXT,
        fornitore TEXT,
        data_attivazione TEXT,
        data_scadenza TEXT,
        prezzo_gas REAL,
        stato TEXT DEFAULT 'attivo',
        created_by TEXT,
        created_at TEXT DEFAULT CURRENT_TIMESTAMP
    );
";

/// A deployment that never ran the later patches: rowid keys, `cliente_id`,
/// `data_fine`, no price/state/audit columns.
pub const LEGACY_SCHEMA: &str = "
    CREATE TABLE users (
        id INTEGER PRIMARY KEY,
        email TEXT
    );
    CREATE TABLE clienti_privati (
        id INTEGER PRIMARY KEY,
        nome TEXT,
        cognome TEXT,
        codice_fiscale TEXT,
        email_principale TEXT
    );
    CREATE TABLE contratti_luce (
        id INTEGER PRIMARY KEY,
        cliente_id TEXT,
        numero_contratto TEXT,
        pod TEXT,
        fornitore TEXT,
        data_attivazione TEXT,
        data_fine TEXT
    );
    CREATE TABLE contratti_gas (
        id INTEGER PRIMARY KEY,
        cliente_id TEXT,
        numero_contratto TEXT,
        pdr TEXT,
        fornitore TEXT,
        data_attivazione TEXT,
        data_fine TEXT
    );
";

pub fn db_with(schema: &str) -> Connection {
    let conn = Connection::open_in_memory().expect("open in-memory db");
    conn.execute_batch(schema).expect("create fixture schema");
    conn
}

pub fn modern_db() -> Connection {
    db_with(MODERN_SCHEMA)
}

pub fn legacy_db() -> Connection {
    db_with(LEGACY_SCHEMA)
}

/// A connection whose every statement fails with "file is not a database".
pub fn corrupt_database() -> (NamedTempFile, Connection) {
    let mut file = NamedTempFile::new().expect("temp file");
    file.write_all(&[b'x'; 4096]).expect("write garbage");
    file.flush().expect("flush garbage");
    let conn = Connection::open(file.path()).expect("open lazily");
    (file, conn)
}

pub fn count(conn: &Connection, table: &str) -> i64 {
    conn.query_row(&format!("SELECT COUNT(*) FROM {}", table), [], |row| row.get(0))
        .expect("count rows")
}
