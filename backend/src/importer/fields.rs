//! CSV header spellings accepted for each destination column.
//!
//! These lists mirror the export templates already in circulation; a header
//! dropped from here silently stops importing that field.

use crate::importer::record::ImportRecord;
use common::model::record_type::RecordType;

/// A destination column and the headers it can be read from, by priority.
#[derive(Debug, Clone, Copy)]
pub struct FieldSpec {
    pub column: &'static str,
    pub aliases: &'static [&'static str],
}

pub const TYPE_HINT: &[&str] = &["tipo_record", "cliente_tipo", "tipo"];
pub const IMPORT_MODE: &str = "modalita_import";

pub const FISCAL_CODE: &[&str] = &["codice_fiscale", "cliente_codice_fiscale"];
pub const PRIMARY_EMAIL: &[&str] = &["email_principale", "cliente_email"];

pub const AGENT_ID: &[&str] = &["assigned_agent_id", "agente_id", "agent_id"];
pub const AGENT_EMAIL: &[&str] = &[
    "assigned_agent_email",
    "agente_email",
    "agent_email",
    "assegnato_a_email",
];

pub const CUSTOMER_FIELDS: &[FieldSpec] = &[
    FieldSpec { column: "nome", aliases: &["nome", "cliente_nome"] },
    FieldSpec { column: "cognome", aliases: &["cognome", "cliente_cognome"] },
    FieldSpec { column: "codice_fiscale", aliases: FISCAL_CODE },
    FieldSpec { column: "data_nascita", aliases: &["data_nascita", "cliente_data_nascita"] },
    FieldSpec { column: "email_principale", aliases: PRIMARY_EMAIL },
    FieldSpec { column: "telefono_mobile", aliases: &["telefono_mobile", "cliente_telefono"] },
    FieldSpec { column: "via_residenza", aliases: &["via_residenza", "cliente_indirizzo"] },
    FieldSpec { column: "civico_residenza", aliases: &["civico_residenza"] },
    FieldSpec { column: "cap_residenza", aliases: &["cap_residenza", "cliente_cap"] },
    FieldSpec { column: "citta_residenza", aliases: &["citta_residenza", "cliente_citta"] },
    FieldSpec {
        column: "provincia_residenza",
        aliases: &["provincia_residenza", "cliente_provincia"],
    },
    FieldSpec { column: "tipo_documento", aliases: &["tipo_documento", "cliente_documento_tipo"] },
    FieldSpec {
        column: "numero_documento",
        aliases: &["numero_documento", "cliente_documento_numero"],
    },
    FieldSpec {
        column: "ente_rilascio",
        aliases: &["ente_rilascio", "cliente_documento_rilasciato_da"],
    },
    FieldSpec {
        column: "data_scadenza_documento",
        aliases: &["data_scadenza_documento", "cliente_documento_data_scadenza"],
    },
    FieldSpec { column: "iban", aliases: &["iban"] },
];

/// Electricity or gas supply contract.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContractKind {
    Luce,
    Gas,
}

struct ContractAliases {
    number: &'static [&'static str],
    meter: &'static [&'static str],
    supplier: &'static [&'static str],
    activation: &'static [&'static str],
    expiry: &'static [&'static str],
    price: &'static [&'static str],
    state: &'static [&'static str],
    /// Headers whose presence on a customer row means "also import this contract".
    embedded: &'static [&'static str],
    /// Headers used by the column-presence classifier.
    detect: &'static [&'static str],
}

static LUCE: ContractAliases = ContractAliases {
    number: &["numero_contratto", "contratto_luce_numero", "numero_contratto_luce"],
    meter: &["pod", "contratto_luce_pod", "pod_pdr"],
    supplier: &["fornitore", "contratto_luce_fornitore_precedente"],
    activation: &["data_attivazione", "contratto_luce_data_inizio"],
    expiry: &["data_scadenza", "contratto_luce_data_fine", "contratto_luce_data_scadenza"],
    price: &["prezzo_energia", "contratto_luce_prezzo_energia"],
    state: &["stato", "stato_contratto", "stato contratto luce", "stato_contratto_luce"],
    embedded: &["pod", "contratto_luce_pod", "numero_contratto_luce"],
    detect: &["pod", "contratto_luce_pod"],
};

static GAS: ContractAliases = ContractAliases {
    number: &["numero_contratto", "contratto_gas_numero", "numero_contratto_gas"],
    meter: &["pdr", "contratto_gas_pdr", "pod_pdr"],
    supplier: &["fornitore", "contratto_gas_fornitore_precedente"],
    activation: &["data_attivazione", "contratto_gas_data_inizio"],
    expiry: &["data_scadenza", "contratto_gas_data_fine", "contratto_gas_data_scadenza"],
    price: &["prezzo_gas", "contratto_gas_prezzo_gas"],
    state: &["stato", "stato_contratto", "stato contratto gas", "stato_contratto_gas"],
    embedded: &["pdr", "contratto_gas_pdr", "numero_contratto_gas"],
    detect: &["pdr", "contratto_gas_pdr"],
};

impl ContractKind {
    pub fn table(self) -> &'static str {
        match self {
            ContractKind::Luce => "contratti_luce",
            ContractKind::Gas => "contratti_gas",
        }
    }

    pub fn record_type(self) -> RecordType {
        match self {
            ContractKind::Luce => RecordType::ContrattoLuce,
            ContractKind::Gas => RecordType::ContrattoGas,
        }
    }

    /// Metering point column: POD for electricity, PDR for gas.
    pub fn meter_column(self) -> &'static str {
        match self {
            ContractKind::Luce => "pod",
            ContractKind::Gas => "pdr",
        }
    }

    pub fn price_column(self) -> &'static str {
        match self {
            ContractKind::Luce => "prezzo_energia",
            ContractKind::Gas => "prezzo_gas",
        }
    }

    fn aliases(self) -> &'static ContractAliases {
        match self {
            ContractKind::Luce => &LUCE,
            ContractKind::Gas => &GAS,
        }
    }

    /// Whether a private-customer row also carries this kind of contract.
    pub fn embedded_in(self, record: &ImportRecord) -> bool {
        record.has_any(self.aliases().embedded)
    }

    pub fn detected_in(self, record: &ImportRecord) -> bool {
        record.has_any(self.aliases().detect)
    }

    pub fn number<'r>(self, record: &'r ImportRecord) -> Option<&'r str> {
        record.first(self.aliases().number)
    }

    pub fn meter_code<'r>(self, record: &'r ImportRecord) -> Option<&'r str> {
        record.first(self.aliases().meter)
    }
}

/// Contract values read from a record, `None` where no alias is filled.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ContractFields {
    pub number: Option<String>,
    pub meter_code: Option<String>,
    pub supplier: Option<String>,
    pub activation_date: Option<String>,
    pub expiry_date: Option<String>,
    pub price: Option<String>,
    pub state: Option<String>,
}

impl ContractFields {
    pub fn from_record(record: &ImportRecord, kind: ContractKind) -> Self {
        let aliases = kind.aliases();
        let pick = |list: &[&str]| record.first(list).map(str::to_string);
        Self {
            number: pick(aliases.number),
            meter_code: pick(aliases.meter),
            supplier: pick(aliases.supplier),
            activation_date: pick(aliases.activation),
            expiry_date: pick(aliases.expiry),
            price: pick(aliases.price),
            state: pick(aliases.state),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn contract_fields_follow_alias_priority() {
        let record = ImportRecord::from_pairs([
            ("contratto_gas_numero", "G-7"),
            ("pod_pdr", "00881234567890"),
            ("contratto_gas_data_fine", "2026-01-31"),
            ("stato contratto gas", "attivo"),
        ]);
        let fields = ContractFields::from_record(&record, ContractKind::Gas);

        assert_eq!(fields.number.as_deref(), Some("G-7"));
        assert_eq!(fields.meter_code.as_deref(), Some("00881234567890"));
        assert_eq!(fields.expiry_date.as_deref(), Some("2026-01-31"));
        assert_eq!(fields.state.as_deref(), Some("attivo"));
        assert_eq!(fields.price, None);
    }

    #[test]
    fn embedded_contracts_are_detected_by_their_own_headers() {
        let record = ImportRecord::from_pairs([("numero_contratto_luce", "L-1")]);
        assert!(ContractKind::Luce.embedded_in(&record));
        assert!(!ContractKind::Gas.embedded_in(&record));
        assert!(!ContractKind::Luce.detected_in(&record));
    }
}
