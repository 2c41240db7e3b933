use crate::importer::fields::{self, ContractKind};
use crate::importer::record::ImportRecord;
use common::model::record_type::RecordType;

/// Determines the record type of a row.
///
/// An explicit type hint wins (substring match, case-insensitive); otherwise the
/// populated columns decide. When `auto_detect` is off, a non-empty
/// `tipo_record` must name a record type exactly.
pub fn classify(record: &ImportRecord, auto_detect: bool) -> RecordType {
    if !auto_detect {
        if let Some(explicit) = record.get("tipo_record") {
            return explicit.parse().unwrap_or(RecordType::Unknown);
        }
    }

    let hint = record.first(fields::TYPE_HINT).unwrap_or_default().to_lowercase();
    if hint.contains("privat") {
        return RecordType::ClientePrivato;
    }
    if hint.contains("aziend") {
        return RecordType::ClienteAzienda;
    }
    if hint.contains("luce") {
        return RecordType::ContrattoLuce;
    }
    if hint.contains("gas") {
        return RecordType::ContrattoGas;
    }

    if ContractKind::Luce.detected_in(record) {
        RecordType::ContrattoLuce
    } else if ContractKind::Gas.detected_in(record) {
        RecordType::ContrattoGas
    } else if record.has_any(&["codice_fiscale", "email_principale", "cliente_email"]) {
        RecordType::ClientePrivato
    } else {
        RecordType::Unknown
    }
}
