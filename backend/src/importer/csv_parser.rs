//! Line-oriented CSV reader for import files.
//!
//! Fields are split on every comma. Quoted fields containing commas or
//! newlines are NOT supported: a quote pair is only trimmed from the edges of
//! each cell, the same way spreadsheet exports of the import templates look.

use crate::importer::record::ImportRecord;
use csv::{ReaderBuilder, Terminator, Trim};
use regex::Regex;
use std::sync::OnceLock;

const BOM: char = '\u{FEFF}';

/// Headers and data rows of a parsed import file.
#[derive(Debug, Default, PartialEq)]
pub struct ParsedCsv {
    pub headers: Vec<String>,
    pub records: Vec<ImportRecord>,
}

fn separator_declaration() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)^sep\s*=\s*[,;\t]$").expect("valid separator regex"))
}

/// Removes surrounding whitespace, then a leading and a trailing `"`.
fn normalize_cell(cell: &str) -> String {
    let s = cell.trim();
    let s = s.strip_prefix('"').unwrap_or(s);
    let s = s.strip_suffix('"').unwrap_or(s);
    s.to_string()
}

/// Parses raw file text into header-keyed records.
///
/// Blank lines are dropped, a byte-order mark is stripped and a leading Excel
/// `sep=,` line is discarded. Fewer than one header plus one data line yields
/// an empty result rather than an error. Missing trailing values become `""`.
pub fn parse(content: &str) -> ParsedCsv {
    let mut lines: Vec<&str> = content
        .split('\n')
        .map(|l| l.strip_suffix('\r').unwrap_or(l))
        .map(|l| l.trim_start_matches(BOM))
        .filter(|l| !l.trim().is_empty())
        .collect();

    if let Some(first) = lines.first() {
        if separator_declaration().is_match(first.trim()) {
            lines.remove(0);
        }
    }
    if lines.len() < 2 {
        return ParsedCsv::default();
    }

    // Records end only at `\n`; a stray `\r` inside a line stays in its cell.
    let joined = lines.join("\n");
    let mut reader = ReaderBuilder::new()
        .has_headers(false)
        .quoting(false)
        .terminator(Terminator::Any(b'\n'))
        .flexible(true)
        .trim(Trim::All)
        .from_reader(joined.as_bytes());

    let mut rows = reader.records();
    let headers: Vec<String> = match rows.next() {
        Some(Ok(header)) => header.iter().map(normalize_cell).collect(),
        _ => return ParsedCsv::default(),
    };

    let mut records = Vec::with_capacity(lines.len() - 1);
    for row in rows {
        // Without quoting the reader only fails on invalid UTF-8, which the
        // caller's lossy decoding already rules out.
        let Ok(row) = row else { continue };
        let values: Vec<String> = row.iter().map(normalize_cell).collect();
        records.push(ImportRecord::from_row(&headers, values));
    }

    ParsedCsv { headers, records }
}
