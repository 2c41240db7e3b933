use crate::importer::fields;
use crate::importer::record::ImportRecord;
use regex::Regex;
use std::sync::OnceLock;

fn fiscal_code_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^[A-Za-z0-9]{16}$").expect("valid fiscal code regex"))
}

fn email_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").expect("valid email regex"))
}

/// Soft checks on customer identity fields. Problems are reported, never fatal.
pub fn row_warnings(row: usize, record: &ImportRecord) -> Vec<String> {
    let mut warnings = Vec::new();
    if let Some(cf) = record.first(fields::FISCAL_CODE) {
        if !fiscal_code_pattern().is_match(cf) {
            warnings.push(format!("Row {}: fiscal code '{}' is not 16 alphanumeric characters", row, cf));
        }
    }
    if let Some(email) = record.first(fields::PRIMARY_EMAIL) {
        if !email_pattern().is_match(email) {
            warnings.push(format!("Row {}: email '{}' looks invalid", row, email));
        }
    }
    warnings
}
