//! Schema-conformant INSERT / UPDATE statements for customers and contracts.
//!
//! Statement builders are pure functions of a [`SchemaShape`]; the `insert_*` /
//! `upsert_*` entry points introspect the live table right before writing.

use crate::config::ConsentPolicy;
use crate::importer::error::RowError;
use crate::importer::fields::{self, ContractFields, ContractKind};
use crate::importer::record::ImportRecord;
use crate::importer::resolver;
use crate::importer::schema::{KeyStrategy, SchemaShape};
use chrono::{DateTime, SecondsFormat, Utc};
use log::debug;
use rusqlite::types::Value;
use rusqlite::Connection;
use std::fmt;
use uuid::Uuid;

pub const CUSTOMER_TABLE: &str = "clienti_privati";
/// State written on new contracts whose row does not carry one.
pub const DEFAULT_CONTRACT_STATE: &str = "compilazione";
const CUSTOMER_KIND: &str = "privato";

/// A parameterised statement ready to run.
#[derive(Debug, Clone, PartialEq)]
pub struct SqlStatement {
    pub sql: String,
    pub params: Vec<Value>,
}

impl SqlStatement {
    pub fn execute(&self, conn: &Connection) -> rusqlite::Result<usize> {
        conn.execute(&self.sql, rusqlite::params_from_iter(self.params.iter()))
    }
}

fn text(value: Option<&str>) -> Value {
    value.map_or(Value::Null, |v| Value::Text(v.to_string()))
}

fn timestamp(now: DateTime<Utc>) -> Value {
    Value::Text(now.to_rfc3339_opts(SecondsFormat::Millis, true))
}

/// Column/value pairs restricted to what the shape offers.
struct Row<'s> {
    shape: &'s SchemaShape,
    columns: Vec<&'static str>,
    values: Vec<Value>,
}

impl<'s> Row<'s> {
    fn new(shape: &'s SchemaShape) -> Self {
        Self {
            shape,
            columns: Vec::new(),
            values: Vec::new(),
        }
    }

    fn push(&mut self, column: &'static str, value: Value) {
        if self.shape.has(column) {
            self.columns.push(column);
            self.values.push(value);
        }
    }

    fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    /// Prepends a generated `id` when the table does not assign its own keys.
    fn with_generated_id(&mut self) -> Option<String> {
        match self.shape.key_strategy() {
            KeyStrategy::Rowid => None,
            KeyStrategy::Uuid => {
                let id = Uuid::new_v4().to_string();
                self.columns.insert(0, "id");
                self.values.insert(0, Value::Text(id.clone()));
                Some(id)
            }
        }
    }

    fn into_insert(self, table: &str) -> SqlStatement {
        let placeholders: Vec<String> = (1..=self.columns.len()).map(|i| format!("?{}", i)).collect();
        SqlStatement {
            sql: format!(
                "INSERT INTO {} ({}) VALUES ({})",
                table,
                self.columns.join(", "),
                placeholders.join(", ")
            ),
            params: self.values,
        }
    }
}

/// Who is writing a new customer and under which consent policy.
#[derive(Debug, Clone)]
pub struct CustomerContext<'a> {
    pub created_by: Option<&'a str>,
    pub assigned_agent: Option<&'a str>,
    pub consent: &'a ConsentPolicy,
    pub now: DateTime<Utc>,
}

/// Builds the customer INSERT. Returns the generated id unless SQLite assigns it.
pub fn build_customer_insert(
    shape: &SchemaShape,
    record: &ImportRecord,
    ctx: &CustomerContext<'_>,
) -> Result<(SqlStatement, Option<String>), RowError> {
    let mut row = Row::new(shape);
    for field in fields::CUSTOMER_FIELDS {
        row.push(field.column, text(record.first(field.aliases)));
    }
    row.push("consenso_privacy", Value::Integer(ctx.consent.privacy.into()));
    row.push("consenso_marketing", Value::Integer(ctx.consent.marketing.into()));
    if ctx.consent.stamp_date {
        row.push("data_consenso", timestamp(ctx.now));
    }
    row.push("created_by", text(ctx.created_by));
    if let Some(agent) = ctx.assigned_agent {
        row.push("assigned_agent_id", Value::Text(agent.to_string()));
    }
    row.push("created_at", timestamp(ctx.now));

    if row.is_empty() {
        return Err(RowError::IncompatibleSchema {
            table: CUSTOMER_TABLE,
        });
    }
    let id = row.with_generated_id();
    Ok((row.into_insert(CUSTOMER_TABLE), id))
}

/// Creates a private customer and returns its id.
///
/// On a dry run nothing is written and a placeholder UUID is returned.
pub fn insert_customer(
    conn: &Connection,
    record: &ImportRecord,
    ctx: &CustomerContext<'_>,
    dry_run: bool,
) -> Result<String, RowError> {
    if dry_run {
        return Ok(Uuid::new_v4().to_string());
    }
    let shape = SchemaShape::load(conn, CUSTOMER_TABLE);
    let (statement, id) = build_customer_insert(&shape, record, ctx)?;
    statement.execute(conn)?;
    Ok(id.unwrap_or_else(|| conn.last_insert_rowid().to_string()))
}

/// Builds the contract INSERT. Returns the generated id unless SQLite assigns it.
pub fn build_contract_insert(
    shape: &SchemaShape,
    kind: ContractKind,
    contract: &ContractFields,
    customer_id: &str,
    created_by: Option<&str>,
) -> Result<(SqlStatement, Option<String>), RowError> {
    let customer_column = shape
        .customer_ref_column()
        .ok_or(RowError::MissingCustomerReference { table: kind.table() })?;

    let mut row = Row::new(shape);
    row.push(customer_column, Value::Text(customer_id.to_string()));
    row.push("tipo_cliente", Value::Text(CUSTOMER_KIND.to_string()));
    row.push("numero_contratto", text(contract.number.as_deref()));
    row.push(kind.meter_column(), text(contract.meter_code.as_deref()));
    row.push("fornitore", text(contract.supplier.as_deref()));
    row.push("data_attivazione", text(contract.activation_date.as_deref()));
    row.push(shape.expiry_column(), text(contract.expiry_date.as_deref()));
    row.push(kind.price_column(), text(contract.price.as_deref()));
    row.push(
        "stato",
        text(Some(contract.state.as_deref().unwrap_or(DEFAULT_CONTRACT_STATE))),
    );
    row.push("created_by", text(created_by));

    let id = row.with_generated_id();
    Ok((row.into_insert(kind.table()), id))
}

/// Builds the UPDATE for an existing contract from the non-empty incoming
/// fields the table has. `None` when there is nothing to set.
pub fn build_contract_update(
    shape: &SchemaShape,
    kind: ContractKind,
    contract: &ContractFields,
    contract_id: &str,
) -> Option<SqlStatement> {
    let candidates = [
        ("numero_contratto", &contract.number),
        (kind.meter_column(), &contract.meter_code),
        ("fornitore", &contract.supplier),
        ("data_attivazione", &contract.activation_date),
        (shape.expiry_column(), &contract.expiry_date),
        (kind.price_column(), &contract.price),
        ("stato", &contract.state),
    ];

    let mut sets = Vec::new();
    let mut params = Vec::new();
    for (column, value) in candidates {
        if let Some(value) = value {
            if shape.has(column) {
                params.push(Value::Text(value.clone()));
                sets.push(format!("{} = ?{}", column, params.len()));
            }
        }
    }
    if sets.is_empty() {
        return None;
    }
    params.push(Value::Text(contract_id.to_string()));
    Some(SqlStatement {
        sql: format!(
            "UPDATE {} SET {} WHERE id = ?{}",
            kind.table(),
            sets.join(", "),
            params.len()
        ),
        params,
    })
}

/// Creates a contract for `customer_id` and returns its id.
pub fn insert_contract(
    conn: &Connection,
    record: &ImportRecord,
    kind: ContractKind,
    customer_id: &str,
    created_by: Option<&str>,
    dry_run: bool,
) -> Result<String, RowError> {
    if dry_run {
        return Ok(Uuid::new_v4().to_string());
    }
    let shape = SchemaShape::load(conn, kind.table());
    let contract = ContractFields::from_record(record, kind);
    let (statement, id) = build_contract_insert(&shape, kind, &contract, customer_id, created_by)?;
    statement.execute(conn)?;
    Ok(id.unwrap_or_else(|| conn.last_insert_rowid().to_string()))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertAction {
    Inserted,
    Updated,
    WouldInsert,
    WouldUpdate,
}

impl UpsertAction {
    pub fn is_insert(self) -> bool {
        matches!(self, UpsertAction::Inserted | UpsertAction::WouldInsert)
    }
}

impl fmt::Display for UpsertAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            UpsertAction::Inserted => "inserted",
            UpsertAction::Updated => "updated",
            UpsertAction::WouldInsert => "would_insert",
            UpsertAction::WouldUpdate => "would_update",
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Upserted {
    pub id: String,
    pub action: UpsertAction,
}

/// Whether the row asks for update-over-insert (`modalita_import` = update/upsert).
pub fn wants_update(record: &ImportRecord) -> bool {
    record
        .get(fields::IMPORT_MODE)
        .map(|mode| {
            let mode = mode.to_lowercase();
            mode == "update" || mode == "upsert"
        })
        .unwrap_or(false)
}

/// Updates the matching contract when the row asks for it, otherwise inserts.
pub fn upsert_contract(
    conn: &Connection,
    record: &ImportRecord,
    kind: ContractKind,
    customer_id: &str,
    created_by: Option<&str>,
    dry_run: bool,
) -> Result<Upserted, RowError> {
    let existing = if wants_update(record) {
        resolver::find_contract(conn, record, kind, Some(customer_id))
    } else {
        None
    };

    if let Some(id) = existing {
        if dry_run {
            return Ok(Upserted {
                id,
                action: UpsertAction::WouldUpdate,
            });
        }
        let shape = SchemaShape::load(conn, kind.table());
        let contract = ContractFields::from_record(record, kind);
        match build_contract_update(&shape, kind, &contract, &id) {
            Some(statement) => {
                statement.execute(conn)?;
            }
            None => debug!("Nothing to update on {} {}", kind.table(), id),
        }
        return Ok(Upserted {
            id,
            action: UpsertAction::Updated,
        });
    }

    let id = insert_contract(conn, record, kind, customer_id, created_by, dry_run)?;
    Ok(Upserted {
        id,
        action: if dry_run {
            UpsertAction::WouldInsert
        } else {
            UpsertAction::Inserted
        },
    })
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AgentAssignment {
    Updated { changes: usize },
    ColumnMissing,
}

/// Points `clienti_privati.assigned_agent_id` of `customer_id` at `agent_id`.
pub fn assign_agent(
    conn: &Connection,
    customer_id: &str,
    agent_id: &str,
) -> Result<AgentAssignment, RowError> {
    let shape = SchemaShape::load(conn, CUSTOMER_TABLE);
    if !shape.has("assigned_agent_id") {
        return Ok(AgentAssignment::ColumnMissing);
    }
    let changes = conn.execute(
        "UPDATE clienti_privati SET assigned_agent_id = ?1 WHERE id = ?2",
        [agent_id, customer_id],
    )?;
    Ok(AgentAssignment::Updated { changes })
}
