//! Prospect list loading.
//!
//! The campaign reads its targets from a CSV file with a
//! `company,contact_name,email[,notes]` header. Header validation happens
//! before any row is parsed so a malformed file fails the run before the
//! first send attempt.

use std::path::Path;

use serde::Deserialize;

use crate::error::ProspectError;

/// Columns that must be present in the CSV header.
const REQUIRED_COLUMNS: [&str; 3] = ["company", "contact_name", "email"];

/// One row of the prospect CSV.
///
/// `contact_name` and `notes` may be empty or carry a spreadsheet-export
/// `"nan"` artifact; the copy writers treat both as absent.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Prospect {
    pub company: String,
    pub contact_name: String,
    pub email: String,
    #[serde(default)]
    pub notes: String,
}

/// Load all prospects from `path`.
///
/// Field values arrive trimmed. A missing `notes` column reads as empty.
pub fn load_prospects(path: &Path) -> Result<Vec<Prospect>, ProspectError> {
    let file = std::fs::File::open(path).map_err(|source| ProspectError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_reader(file);

    validate_headers(reader.headers()?)?;

    let mut prospects = Vec::new();
    for record in reader.deserialize() {
        prospects.push(record?);
    }
    Ok(prospects)
}

fn validate_headers(headers: &csv::StringRecord) -> Result<(), ProspectError> {
    let mut missing: Vec<String> = REQUIRED_COLUMNS
        .iter()
        .copied()
        .filter(|required| !headers.iter().any(|h| h == *required))
        .map(str::to_string)
        .collect();
    if missing.is_empty() {
        return Ok(());
    }
    missing.sort();
    Err(ProspectError::MissingColumns { missing })
}

// ── Tests ──
