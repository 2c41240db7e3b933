use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Semantic type of an imported CSV row.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordType {
    ClientePrivato,
    ClienteAzienda,
    ContrattoLuce,
    ContrattoGas,
    Unknown,
}

impl RecordType {
    /// The types an import can carry, in the order they are advertised.
    pub const SUPPORTED: [RecordType; 4] = [
        RecordType::ClientePrivato,
        RecordType::ClienteAzienda,
        RecordType::ContrattoLuce,
        RecordType::ContrattoGas,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            RecordType::ClientePrivato => "cliente_privato",
            RecordType::ClienteAzienda => "cliente_azienda",
            RecordType::ContrattoLuce => "contratto_luce",
            RecordType::ContrattoGas => "contratto_gas",
            RecordType::Unknown => "unknown",
        }
    }
}

impl fmt::Display for RecordType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RecordType {
    type Err = String;

    /// Exact, case-sensitive match on the canonical name.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "cliente_privato" => Ok(RecordType::ClientePrivato),
            "cliente_azienda" => Ok(RecordType::ClienteAzienda),
            "contratto_luce" => Ok(RecordType::ContrattoLuce),
            "contratto_gas" => Ok(RecordType::ContrattoGas),
            "unknown" => Ok(RecordType::Unknown),
            other => Err(format!("unknown record type '{}'", other)),
        }
    }
}
