//! Runs one import job: parse, then classify / resolve / write every row
//! inside a single transaction.

use crate::config::ConsentPolicy;
use crate::importer::classifier::classify;
use crate::importer::csv_parser;
use crate::importer::error::{ImportError, RowError};
use crate::importer::fields::{self, ContractKind};
use crate::importer::record::ImportRecord;
use crate::importer::resolver;
use crate::importer::schema::SchemaShape;
use crate::importer::validation;
use crate::importer::writer::{self, AgentAssignment, CustomerContext};
use chrono::{DateTime, Utc};
use common::jobs::{ImportProgress, ImportResult, ImportRowError, ImportStage};
use common::model::record_type::RecordType;
use common::requests::ImportOptions;
use log::{debug, info, warn};
use rusqlite::Connection;

const PARSING_PROGRESS: u8 = 5;
const PROCESSING_PROGRESS: u8 = 10;
const PROCESSING_SPAN: f64 = 85.0;
const PROCESSING_CEILING: u8 = 95;

/// Receives intermediate progress while a job runs.
pub trait ProgressSink {
    fn report(&self, progress: ImportProgress);
}

impl<F> ProgressSink for F
where
    F: Fn(ImportProgress),
{
    fn report(&self, progress: ImportProgress) {
        self(progress)
    }
}

/// Everything a job needs besides the database.
#[derive(Debug, Clone)]
pub struct ImportRequest {
    pub file_name: String,
    pub content: String,
    pub options: ImportOptions,
    pub consent: ConsentPolicy,
    /// Email of the user recorded as creator of every written row.
    pub actor_email: Option<String>,
    pub started_at: DateTime<Utc>,
    /// Id of an earlier import of identical content, if one is still known.
    pub previous_import: Option<String>,
}

/// Final progress and result of a job that ran to completion.
#[derive(Debug, Clone, PartialEq)]
pub struct ImportOutcome {
    pub progress: ImportProgress,
    pub result: ImportResult,
}

/// Percentage shown after `processed` of `total` rows.
fn processing_percent(processed: usize, total: usize) -> u8 {
    if total == 0 {
        return PROCESSING_CEILING;
    }
    let pct = f64::from(PROCESSING_PROGRESS) + processed as f64 / total as f64 * PROCESSING_SPAN;
    (pct.floor() as u8).min(PROCESSING_CEILING)
}

struct Job<'a> {
    request: &'a ImportRequest,
    actor: Option<String>,
    result: ImportResult,
}

/// Runs `request` against `conn` and returns its outcome.
///
/// Row-level failures end up in `result.errors` and never abort the job. An
/// infrastructure failure rolls the transaction back and is returned as an
/// [`ImportError`]. Dry runs always roll back.
pub fn run_import(
    conn: &mut Connection,
    request: &ImportRequest,
    sink: &dyn ProgressSink,
) -> Result<ImportOutcome, ImportError> {
    let queued = ImportProgress::queued(request.started_at);
    let options = &request.options;

    sink.report(queued.advance(ImportStage::Parsing, PARSING_PROGRESS, "Parsing CSV"));
    let parsed = csv_parser::parse(&request.content);
    let total = parsed.records.len();
    debug!("Headers: {}", parsed.headers.join(", "));
    info!(
        "Import of {}: {} rows, dry_run={}, consent={:?}",
        request.file_name, total, options.dry_run, request.consent
    );

    let actor = resolver::find_user_by_email(conn, request.actor_email.as_deref());
    debug!("Import actor: {:?}", actor);
    for table in [writer::CUSTOMER_TABLE, "clienti_aziende"] {
        let shape = SchemaShape::load(conn, table);
        if shape.is_empty() {
            debug!("{} is missing or has no columns", shape.table());
        } else {
            debug!("{} columns: {}", shape.table(), shape.columns().collect::<Vec<_>>().join(", "));
        }
    }

    let processing = queued.advance(ImportStage::Processing, PROCESSING_PROGRESS, "Processing records");
    sink.report(processing.clone());

    let mut job = Job {
        request,
        actor,
        result: ImportResult::new(request.file_name.clone()),
    };
    job.result.total_rows = total;

    let batch_size = options.batch_size();
    let mut processed = 0;
    let tx = conn.transaction().map_err(ImportError::Transaction)?;

    for (i, record) in parsed.records.iter().enumerate() {
        let row = i + 1;
        let record_type = classify(record, options.auto_detect_type);
        if record_type == RecordType::Unknown {
            job.result.warnings.push(format!("Row {}: record type not detected", row));
            continue;
        }

        match job.import_row(&tx, row, record, record_type) {
            Ok(()) => {
                processed += 1;
                if processed % batch_size == 0 {
                    sink.report(processing.advance(
                        ImportStage::Processing,
                        processing_percent(processed, total),
                        format!("Processing records ({}/{})", processed, total),
                    ));
                }
            }
            Err(err) if err.is_infrastructure() => {
                warn!("Import of {} aborted at row {}: {}", request.file_name, row, err);
                if let Err(rollback) = tx.rollback() {
                    warn!("Rollback after failure also failed: {}", rollback);
                }
                return Err(ImportError::Store {
                    row,
                    total_rows: total,
                    source: err,
                });
            }
            Err(err) => {
                debug!("Row {} rejected: {}", row, err);
                job.result.errors.push(ImportRowError {
                    row,
                    error: err.to_string(),
                });
            }
        }
    }

    if options.dry_run {
        tx.rollback().map_err(ImportError::Transaction)?;
    } else {
        tx.commit().map_err(ImportError::Transaction)?;
    }

    let mut result = job.result;
    result.processed = processed;
    result.success = result.errors.is_empty();
    if let Some(previous) = &request.previous_import {
        result.warnings.push(format!(
            "File content is identical to import {}; contract rows may be duplicated",
            previous
        ));
    }

    info!(
        "Import of {} finished: {}/{} processed, {} errors, {} warnings",
        request.file_name,
        processed,
        total,
        result.errors.len(),
        result.warnings.len()
    );

    let progress = processing.finish(
        ImportStage::Completed,
        format!("Import completed ({}/{})", processed, total),
        Utc::now(),
    );
    Ok(ImportOutcome { progress, result })
}

impl Job<'_> {
    fn options(&self) -> &ImportOptions {
        &self.request.options
    }

    fn dry_run(&self) -> bool {
        self.options().dry_run
    }

    /// Assigned agent of the row: a direct id, else a user looked up by email.
    fn agent_for(&self, conn: &Connection, record: &ImportRecord) -> Option<String> {
        if self.options().skip_association {
            return None;
        }
        match record.first(fields::AGENT_ID) {
            Some(id) => Some(id.to_string()),
            None => resolver::find_user_by_email(conn, record.first(fields::AGENT_EMAIL)),
        }
    }

    fn import_row(
        &mut self,
        conn: &Connection,
        row: usize,
        record: &ImportRecord,
        record_type: RecordType,
    ) -> Result<(), RowError> {
        let agent = self.agent_for(conn, record);
        debug!("Row {}: {} with agent {:?}", row, record_type, agent);

        if !self.options().skip_validation {
            self.result.warnings.extend(validation::row_warnings(row, record));
        }

        match record_type {
            RecordType::ClientePrivato => {
                let existing = resolver::find_customer(conn, record);
                let customer_id = match &existing {
                    Some(id) => id.clone(),
                    None => self.create_customer(conn, record, agent.as_deref())?,
                };
                if existing.is_some() {
                    if let Some(agent) = agent.as_deref().filter(|_| !self.dry_run()) {
                        self.reassign_agent(conn, row, &customer_id, agent, None)?;
                    }
                }
                for kind in [ContractKind::Luce, ContractKind::Gas] {
                    if kind.embedded_in(record) {
                        self.write_contract(conn, row, record, kind, &customer_id, agent.as_deref())?;
                    }
                }
            }
            RecordType::ContrattoLuce | RecordType::ContrattoGas => {
                let kind = if record_type == RecordType::ContrattoLuce {
                    ContractKind::Luce
                } else {
                    ContractKind::Gas
                };
                let customer_id = match resolver::find_customer(conn, record) {
                    Some(id) => id,
                    None => self.create_customer(conn, record, agent.as_deref())?,
                };
                if let Some(agent) = agent.as_deref().filter(|_| !self.dry_run()) {
                    self.reassign_agent(conn, row, &customer_id, agent, Some(record_type))?;
                }
                self.write_contract(conn, row, record, kind, &customer_id, agent.as_deref())?;
            }
            RecordType::ClienteAzienda => {
                self.result
                    .warnings
                    .push(format!("Row {}: cliente_azienda import is not implemented", row));
            }
            RecordType::Unknown => {}
        }
        Ok(())
    }

    fn created_by<'s>(&'s self, agent: Option<&'s str>) -> Option<&'s str> {
        self.actor.as_deref().or(agent)
    }

    fn create_customer(
        &mut self,
        conn: &Connection,
        record: &ImportRecord,
        agent: Option<&str>,
    ) -> Result<String, RowError> {
        let ctx = CustomerContext {
            created_by: self.created_by(agent),
            assigned_agent: agent,
            consent: &self.request.consent,
            now: Utc::now(),
        };
        let id = writer::insert_customer(conn, record, &ctx, self.dry_run())?;
        self.result.inserted.clienti_privati += 1;
        Ok(id)
    }

    /// Points an existing customer at the row's agent and notes the outcome.
    ///
    /// `via` names the contract type when the assignment comes from a contract
    /// row; those rows stay quiet when the column is missing.
    fn reassign_agent(
        &mut self,
        conn: &Connection,
        row: usize,
        customer_id: &str,
        agent: &str,
        via: Option<RecordType>,
    ) -> Result<(), RowError> {
        let origin = via.map(|t| format!(" from {}", t)).unwrap_or_default();
        let warning = match writer::assign_agent(conn, customer_id, agent) {
            Ok(AgentAssignment::Updated { changes }) => Some(format!(
                "Row {}: assigned_agent_id updated{} for customer {} (changes={})",
                row, origin, customer_id, changes
            )),
            Ok(AgentAssignment::ColumnMissing) if via.is_none() => Some(format!(
                "Row {}: assigned_agent_id column missing, agent not updated",
                row
            )),
            Ok(AgentAssignment::ColumnMissing) => None,
            Err(err) if err.is_infrastructure() => return Err(err),
            Err(err) => Some(format!(
                "Row {}: could not update agent assignment{} ({})",
                row, origin, err
            )),
        };
        self.result.warnings.extend(warning);
        Ok(())
    }

    fn write_contract(
        &mut self,
        conn: &Connection,
        row: usize,
        record: &ImportRecord,
        kind: ContractKind,
        customer_id: &str,
        agent: Option<&str>,
    ) -> Result<(), RowError> {
        let upserted = writer::upsert_contract(
            conn,
            record,
            kind,
            customer_id,
            self.created_by(agent),
            self.dry_run(),
        )?;
        if upserted.action.is_insert() {
            let counter = match kind {
                ContractKind::Luce => &mut self.result.inserted.contratti_luce,
                ContractKind::Gas => &mut self.result.inserted.contratti_gas,
            };
            *counter += 1;
        } else {
            self.result.warnings.push(format!(
                "Row {}: {} {} updated ({})",
                row,
                kind.record_type(),
                upserted.id,
                upserted.action
            ));
        }
        Ok(())
    }
}
