//! Bulk contact ingestion
//!
//! Rows arrive as column → value maps from an upload (CSV, spreadsheet, API
//! batch). Each row is mapped, validated and classified independently; a bad
//! row is counted and reported but never fails the batch.

use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};

/// Which source columns feed which contact fields
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FieldMapping {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub alternate_phones: Vec<String>,
}

impl Default for FieldMapping {
    fn default() -> Self {
        Self {
            first_name: Some("first_name".to_string()),
            last_name: Some("last_name".to_string()),
            email: Some("email".to_string()),
            phone: Some("phone".to_string()),
            alternate_phones: vec!["alternate_phone".to_string()],
        }
    }
}

/// Validation knobs for one upload
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct IngestOptions {
    pub mapping: FieldMapping,
    pub require_phone: bool,
    pub require_email: bool,
    /// Reject rows whose phone already exists in the list or earlier in the batch
    pub skip_duplicates: bool,
    /// Reject rows whose phone is on the do-not-call registry
    pub dnc_check: bool,
    /// Attempt limit for the new contacts (engine default when unset)
    pub max_attempts: Option<u32>,
}

impl Default for IngestOptions {
    fn default() -> Self {
        Self {
            mapping: FieldMapping::default(),
            require_phone: true,
            require_email: false,
            skip_duplicates: true,
            dnc_check: true,
            max_attempts: None,
        }
    }
}

/// Why a row was not accepted
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum RejectReason {
    /// Neither a phone number nor any name
    MissingContactDetails,
    MissingPhone,
    InvalidPhone(String),
    MissingEmail,
    InvalidEmail(String),
    Duplicate,
    DoNotCall,
}

impl RejectReason {
    pub fn is_invalid(&self) -> bool {
        !matches!(self, Self::Duplicate | Self::DoNotCall)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RejectedRow {
    /// Zero-based index in the uploaded batch
    pub row: usize,
    pub reason: RejectReason,
}

/// Counts returned to the uploader
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IngestReport {
    pub accepted: usize,
    pub duplicates: usize,
    pub invalid: usize,
    pub dnc_rejected: usize,
    pub rejected_rows: Vec<RejectedRow>,
}

impl IngestReport {
    pub fn total(&self) -> usize {
        self.accepted + self.duplicates + self.invalid + self.dnc_rejected
    }

    pub(crate) fn reject(&mut self, row: usize, reason: RejectReason) {
        match reason {
            RejectReason::Duplicate => self.duplicates += 1,
            RejectReason::DoNotCall => self.dnc_rejected += 1,
            _ => self.invalid += 1,
        }
        self.rejected_rows.push(RejectedRow { row, reason });
    }
}

/// A row that passed field validation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MappedRow {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub alternate_phones: Vec<String>,
}

/// Canonicalise a phone number: digits with an optional leading `+`
///
/// Spaces, dashes, dots and parentheses are dropped. Anything else, or a
/// digit count outside 7..=15, makes the number undialable.
pub fn canonicalize_phone(raw: &str) -> Option<String> {
    let trimmed = raw.trim();
    let (plus, rest) = match trimmed.strip_prefix('+') {
        Some(rest) => (true, rest),
        None => (false, trimmed),
    };

    let mut digits = String::with_capacity(rest.len() + 1);
    if plus {
        digits.push('+');
    }
    for ch in rest.chars() {
        match ch {
            '0'..='9' => digits.push(ch),
            ' ' | '-' | '.' | '(' | ')' => {}
            _ => return None,
        }
    }

    let count = digits.len() - usize::from(plus);
    if (7..=15).contains(&count) {
        Some(digits)
    } else {
        None
    }
}

fn looks_like_email(value: &str) -> bool {
    match value.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty()
                && !domain.contains('@')
                && domain.contains('.')
                && !domain.starts_with('.')
                && !domain.ends_with('.')
                && !value.contains(char::is_whitespace)
        }
        None => false,
    }
}

fn field(row: &HashMap<String, String>, column: Option<&String>) -> Option<String> {
    column
        .and_then(|c| row.get(c))
        .map(|v| v.trim())
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

/// Apply the field mapping and per-row validation rules
pub fn map_row(row: &HashMap<String, String>, options: &IngestOptions) -> Result<MappedRow, RejectReason> {
    let mapping = &options.mapping;
    let first_name = field(row, mapping.first_name.as_ref());
    let last_name = field(row, mapping.last_name.as_ref());
    let raw_phone = field(row, mapping.phone.as_ref());
    let raw_email = field(row, mapping.email.as_ref());

    if raw_phone.is_none() && first_name.is_none() && last_name.is_none() {
        return Err(RejectReason::MissingContactDetails);
    }

    let phone = match raw_phone {
        Some(raw) => Some(canonicalize_phone(&raw).ok_or(RejectReason::InvalidPhone(raw))?),
        None if options.require_phone => return Err(RejectReason::MissingPhone),
        None => None,
    };

    let email = match raw_email {
        Some(raw) if looks_like_email(&raw) => Some(raw.to_ascii_lowercase()),
        Some(raw) => return Err(RejectReason::InvalidEmail(raw)),
        None if options.require_email => return Err(RejectReason::MissingEmail),
        None => None,
    };

    let mut seen = HashSet::new();
    let alternate_phones = mapping
        .alternate_phones
        .iter()
        .filter_map(|column| field(row, Some(column)))
        .filter_map(|raw| canonicalize_phone(&raw))
        .filter(|alt| Some(alt) != phone.as_ref() && seen.insert(alt.clone()))
        .collect();

    Ok(MappedRow {
        first_name,
        last_name,
        email,
        phone,
        alternate_phones,
    })
}
