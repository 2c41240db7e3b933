//! Natural-key lookups for customers, contracts and users.
//!
//! The `*_by_*` functions return the raw query outcome so callers and tests can
//! tell "not found" from a failed query. The `find_*` functions are best effort:
//! a failed query is logged and treated as "not found".

use crate::importer::fields::{self, ContractKind};
use crate::importer::record::ImportRecord;
use crate::importer::schema::SchemaShape;
use log::warn;
use rusqlite::types::Value;
use rusqlite::{Connection, OptionalExtension, Params};

/// Converts a primary-key value to the string form used across the importer.
fn id_from_value(value: Value) -> Option<String> {
    match value {
        Value::Integer(i) => Some(i.to_string()),
        Value::Text(s) if !s.is_empty() => Some(s),
        Value::Real(f) => Some(f.to_string()),
        _ => None,
    }
}

fn first_id<P: Params>(conn: &Connection, sql: &str, params: P) -> rusqlite::Result<Option<String>> {
    let value = conn
        .query_row(sql, params, |row| row.get::<_, Value>(0))
        .optional()?;
    Ok(value.and_then(id_from_value))
}

fn best_effort(what: &str, outcome: rusqlite::Result<Option<String>>) -> Option<String> {
    outcome.unwrap_or_else(|e| {
        warn!("Lookup of {} failed, treating as not found: {}", what, e);
        None
    })
}

pub fn customer_by_fiscal_code(conn: &Connection, fiscal_code: &str) -> rusqlite::Result<Option<String>> {
    first_id(
        conn,
        "SELECT id FROM clienti_privati WHERE codice_fiscale = ?1 LIMIT 1",
        [fiscal_code],
    )
}

pub fn customer_by_email(conn: &Connection, email: &str) -> rusqlite::Result<Option<String>> {
    first_id(
        conn,
        "SELECT id FROM clienti_privati WHERE email_principale = ?1 LIMIT 1",
        [email],
    )
}

/// Private customer matching the row's fiscal code, else its primary email.
pub fn find_customer(conn: &Connection, record: &ImportRecord) -> Option<String> {
    if let Some(cf) = record.first(fields::FISCAL_CODE) {
        if let Some(id) = best_effort("customer by fiscal code", customer_by_fiscal_code(conn, cf)) {
            return Some(id);
        }
    }
    if let Some(email) = record.first(fields::PRIMARY_EMAIL) {
        if let Some(id) = best_effort("customer by email", customer_by_email(conn, email)) {
            return Some(id);
        }
    }
    None
}

/// Contract with this number, across all customers.
pub fn contract_by_number(
    conn: &Connection,
    kind: ContractKind,
    number: &str,
) -> rusqlite::Result<Option<String>> {
    let sql = format!("SELECT id FROM {} WHERE numero_contratto = ?1 LIMIT 1", kind.table());
    first_id(conn, &sql, [number])
}

/// Contract on this metering point, narrowed to `customer_id` when the table
/// has a customer reference column.
pub fn contract_by_meter(
    conn: &Connection,
    kind: ContractKind,
    meter_code: &str,
    customer_id: Option<&str>,
) -> rusqlite::Result<Option<String>> {
    let shape = SchemaShape::load(conn, kind.table());
    let mut sql = format!("SELECT id FROM {} WHERE {} = ?1", kind.table(), kind.meter_column());
    let mut params = vec![meter_code.to_string()];
    if let (Some(customer_id), Some(column)) = (customer_id, shape.customer_ref_column()) {
        sql.push_str(&format!(" AND {} = ?2", column));
        params.push(customer_id.to_string());
    }
    sql.push_str(" LIMIT 1");
    first_id(conn, &sql, rusqlite::params_from_iter(params))
}

/// Existing contract matching the row's contract number, else its metering point.
pub fn find_contract(
    conn: &Connection,
    record: &ImportRecord,
    kind: ContractKind,
    customer_id: Option<&str>,
) -> Option<String> {
    if let Some(number) = kind.number(record) {
        if let Some(id) = best_effort("contract by number", contract_by_number(conn, kind, number)) {
            return Some(id);
        }
    }
    if let Some(code) = kind.meter_code(record) {
        if let Some(id) = best_effort(
            "contract by metering point",
            contract_by_meter(conn, kind, code, customer_id),
        ) {
            return Some(id);
        }
    }
    None
}

pub fn user_by_email(conn: &Connection, email: &str) -> rusqlite::Result<Option<String>> {
    first_id(conn, "SELECT id FROM users WHERE email = ?1 LIMIT 1", [email])
}

pub fn find_user_by_email(conn: &Connection, email: Option<&str>) -> Option<String> {
    let email = email.filter(|e| !e.is_empty())?;
    best_effort("user by email", user_by_email(conn, email))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::importer::test_support::{corrupt_database, legacy_db, modern_db};

    #[test]
    fn customer_found_by_fiscal_code_then_email() {
        let conn = modern_db();
        conn.execute_batch(
            "INSERT INTO clienti_privati (id, nome, codice_fiscale, email_principale)
             VALUES ('c-1', 'Mario', 'RSSMRA80A01H501U', 'mario@example.com'),
                    ('c-2', 'Anna', 'VRDNNA85B41F205X', 'anna@example.com');",
        )
        .unwrap();

        let by_cf = ImportRecord::from_pairs([("codice_fiscale", "VRDNNA85B41F205X")]);
        assert_eq!(find_customer(&conn, &by_cf).as_deref(), Some("c-2"));

        let unmatched_cf = ImportRecord::from_pairs([
            ("cliente_codice_fiscale", "NOTKNOWN"),
            ("cliente_email", "mario@example.com"),
        ]);
        assert_eq!(find_customer(&conn, &unmatched_cf).as_deref(), Some("c-1"));

        let nothing = ImportRecord::from_pairs([("nome", "Mario")]);
        assert_eq!(find_customer(&conn, &nothing), None);
    }

    #[test]
    fn integer_ids_are_stringified() {
        let conn = legacy_db();
        conn.execute(
            "INSERT INTO clienti_privati (nome, codice_fiscale) VALUES ('Mario', 'RSSMRA80A01H501U')",
            [],
        )
        .unwrap();
        assert_eq!(
            customer_by_fiscal_code(&conn, "RSSMRA80A01H501U").unwrap().as_deref(),
            Some("1")
        );
    }

    #[test]
    fn contract_number_lookup_is_global() {
        let conn = modern_db();
        conn.execute_batch(
            "INSERT INTO contratti_luce (id, cliente_privato_id, numero_contratto, pod)
             VALUES ('l-1', 'someone-else', 'C-001', 'IT001E000001');",
        )
        .unwrap();

        let record = ImportRecord::from_pairs([("numero_contratto", "C-001")]);
        assert_eq!(
            find_contract(&conn, &record, ContractKind::Luce, Some("c-1")).as_deref(),
            Some("l-1")
        );
    }

    #[test]
    fn meter_lookup_is_scoped_to_the_customer() {
        let conn = modern_db();
        conn.execute_batch(
            "INSERT INTO contratti_gas (id, cliente_privato_id, numero_contratto, pdr)
             VALUES ('g-1', 'c-1', 'G-001', '00881234567890');",
        )
        .unwrap();

        let record = ImportRecord::from_pairs([("pdr", "00881234567890")]);
        assert_eq!(
            find_contract(&conn, &record, ContractKind::Gas, Some("c-1")).as_deref(),
            Some("g-1")
        );
        assert_eq!(find_contract(&conn, &record, ContractKind::Gas, Some("c-2")), None);
        assert_eq!(
            find_contract(&conn, &record, ContractKind::Gas, None).as_deref(),
            Some("g-1")
        );
    }

    #[test]
    fn legacy_customer_reference_column_is_used() {
        let conn = legacy_db();
        conn.execute_batch(
            "INSERT INTO contratti_luce (id, cliente_id, numero_contratto, pod)
             VALUES (7, '3', 'C-9', 'IT001E000009');",
        )
        .unwrap();

        assert_eq!(
            contract_by_meter(&conn, ContractKind::Luce, "IT001E000009", Some("3"))
                .unwrap()
                .as_deref(),
            Some("7")
        );
        assert_eq!(
            contract_by_meter(&conn, ContractKind::Luce, "IT001E000009", Some("4")).unwrap(),
            None
        );
    }

    #[test]
    fn failed_queries_are_errors_raw_and_absent_best_effort() {
        let (_file, conn) = corrupt_database();
        assert!(customer_by_fiscal_code(&conn, "RSSMRA80A01H501U").is_err());

        let record = ImportRecord::from_pairs([
            ("codice_fiscale", "RSSMRA80A01H501U"),
            ("numero_contratto", "C-001"),
            ("pod", "IT001E000001"),
        ]);
        assert_eq!(find_customer(&conn, &record), None);
        assert_eq!(find_contract(&conn, &record, ContractKind::Luce, None), None);
        assert_eq!(find_user_by_email(&conn, Some("admin@gestionale.it")), None);
    }

    #[test]
    fn users_are_found_by_email() {
        let conn = modern_db();
        conn.execute(
            "INSERT INTO users (id, email) VALUES ('u-1', 'agente@gestionale.it')",
            [],
        )
        .unwrap();
        assert_eq!(
            find_user_by_email(&conn, Some("agente@gestionale.it")).as_deref(),
            Some("u-1")
        );
        assert_eq!(find_user_by_email(&conn, Some("")), None);
        assert_eq!(find_user_by_email(&conn, None), None);
    }
}
