//! The ordered validation gates and their results.
//!
//! Gates are evaluated in the fixed order of [`StageName::GATE_ORDER`], each
//! over the *surviving* record collection (rows excluded by an earlier
//! blocking gate are skipped, so the per-stage exclusion categories partition
//! the excluded rows). Every evaluation produces a [`ValidationResult`];
//! failures are data, never errors.
//!
//! Scans are embarrassingly parallel and run on rayon, with matches re-sorted
//! by row index so results and reports are deterministic.

use crate::config::MigrationConfig;
use crate::record::{MappingTable, SubscriberRecord};
use crate::schema::Schema;
use chrono::{DateTime, NaiveDateTime, Utc};
use rayon::prelude::*;
use regex::Regex;
use serde::Serialize;
use std::sync::LazyLock;

/// The eight validation gates, in pipeline order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StageName {
    Columns,
    UnsupportedCountry,
    DateFormat,
    DatePeriod,
    MissingPostal,
    CaPostalFormat,
    UsPostalFormat,
    CardTokenFormat,
}

impl StageName {
    /// Gates evaluated per record, after column validation has passed at
    /// ingestion time.
    pub const GATE_ORDER: [StageName; 7] = [
        StageName::UnsupportedCountry,
        StageName::DateFormat,
        StageName::DatePeriod,
        StageName::MissingPostal,
        StageName::CaPostalFormat,
        StageName::UsPostalFormat,
        StageName::CardTokenFormat,
    ];

    /// Stable name, also used as the artifact category.
    pub fn as_str(self) -> &'static str {
        match self {
            StageName::Columns => "columns",
            StageName::UnsupportedCountry => "unsupported_country",
            StageName::DateFormat => "invalid_date_format",
            StageName::DatePeriod => "invalid_date_period",
            StageName::MissingPostal => "missing_postal_code",
            StageName::CaPostalFormat => "ca_postal_format",
            StageName::UsPostalFormat => "us_postal_format",
            StageName::CardTokenFormat => "card_token_format",
        }
    }

    /// All eight gates are blocking; warning-kind results come from the
    /// duplicate detector.
    pub fn kind(self) -> StageKind {
        StageKind::Blocking
    }

    pub fn remediation(self) -> RemediationKind {
        match self {
            StageName::MissingPostal => RemediationKind::SubstituteFromMapping,
            StageName::UsPostalFormat => RemediationKind::Autocorrect,
            _ => RemediationKind::None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StageKind {
    Blocking,
    Warning,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RemediationKind {
    None,
    Autocorrect,
    SubstituteFromMapping,
}

/// Outcome of one stage evaluation. Re-evaluating a stage (after a
/// remediation) produces a fresh result that supersedes the previous one in
/// the session history.
#[derive(Debug, Clone, Serialize)]
pub struct ValidationResult {
    pub stage: StageName,
    pub valid: bool,
    pub violation_count: usize,
    /// Offending rows, ascending original row index.
    pub affected_rows: Vec<u64>,
    /// How many of the offending rows the stage's remediation could fix
    /// (autocorrectable 4-digit zips, or postal codes available from the
    /// mapping file).
    pub remediable_count: usize,
    pub remediation: RemediationKind,
    /// True when the user chose to proceed anyway: violations are reported
    /// but the rows stay eligible.
    pub accepted: bool,
    /// Name of the downloadable report carrying the full offending rows.
    pub artifact: Option<String>,
}

impl ValidationResult {
    pub(crate) fn pass(stage: StageName) -> Self {
        Self {
            stage,
            valid: true,
            violation_count: 0,
            affected_rows: Vec::new(),
            remediable_count: 0,
            remediation: stage.remediation(),
            accepted: false,
            artifact: None,
        }
    }
}

/// Rows flagged by one scan, plus the remediable subset.
#[derive(Debug, Default)]
pub(crate) struct StageScan {
    pub rows: Vec<u64>,
    pub remediable: Vec<u64>,
}

impl StageScan {
    fn from_rows(mut rows: Vec<u64>) -> Self {
        rows.sort_unstable();
        Self {
            rows,
            remediable: Vec::new(),
        }
    }
}

/// Strict `YYYY-MM-DDTHH:MM:SSZ` parse; anything looser is a format violation.
pub(crate) fn parse_period(value: &str) -> Option<DateTime<Utc>> {
    NaiveDateTime::parse_from_str(value, "%Y-%m-%dT%H:%M:%SZ")
        .ok()
        .map(|naive| naive.and_utc())
}

/// Empty and well-known placeholder postal values.
pub(crate) fn is_placeholder_postal(value: &str) -> bool {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return true;
    }
    matches!(
        trimmed.to_ascii_lowercase().as_str(),
        "0" | "00000" | "n/a" | "na" | "null" | "none" | "-"
    )
}

fn postal_required(country: &str, required: &[String]) -> bool {
    required.iter().any(|c| c.eq_ignore_ascii_case(country))
}

/// Dispatch a gate over the surviving records.
pub(crate) fn scan(
    stage: StageName,
    records: &[&SubscriberRecord],
    schema: &Schema,
    mapping: &MappingTable,
    cfg: &MigrationConfig,
    now: DateTime<Utc>,
) -> StageScan {
    match stage {
        StageName::Columns => StageScan::default(),
        StageName::UnsupportedCountry => {
            scan_unsupported_country(records, schema, &cfg.embargoed_countries)
        }
        StageName::DateFormat => scan_date_format(records, schema),
        StageName::DatePeriod => scan_date_period(records, schema, now),
        StageName::MissingPostal => {
            scan_missing_postal(records, schema, &cfg.postal_required_countries, mapping)
        }
        StageName::CaPostalFormat => scan_ca_postal(records, schema),
        StageName::UsPostalFormat => scan_us_postal(records, schema),
        StageName::CardTokenFormat => match cfg.processor.token_digits() {
            Some(digits) => scan_card_token(records, schema, digits),
            None => StageScan::default(),
        },
    }
}

fn scan_unsupported_country(
    records: &[&SubscriberRecord],
    schema: &Schema,
    embargoed: &[String],
) -> StageScan {
    let rows: Vec<u64> = records
        .par_iter()
        .filter(|r| {
            let country = r.country(schema);
            !country.is_empty() && embargoed.iter().any(|e| e.eq_ignore_ascii_case(country))
        })
        .map(|r| r.row)
        .collect();
    StageScan::from_rows(rows)
}

fn scan_date_format(records: &[&SubscriberRecord], schema: &Schema) -> StageScan {
    let rows: Vec<u64> = records
        .par_iter()
        .filter(|r| {
            parse_period(r.period_start(schema)).is_none()
                || parse_period(r.period_end(schema)).is_none()
        })
        .map(|r| r.row)
        .collect();
    StageScan::from_rows(rows)
}

/// Start must not lie strictly in the future, end must not lie strictly in
/// the past. Rows whose dates no longer parse were excluded by the format
/// gate and never reach this scan.
fn scan_date_period(
    records: &[&SubscriberRecord],
    schema: &Schema,
    now: DateTime<Utc>,
) -> StageScan {
    let rows: Vec<u64> = records
        .par_iter()
        .filter(|r| {
            let started = parse_period(r.period_start(schema));
            let ends = parse_period(r.period_end(schema));
            match (started, ends) {
                (Some(start), Some(end)) => start > now || end < now,
                _ => false,
            }
        })
        .map(|r| r.row)
        .collect();
    StageScan::from_rows(rows)
}

fn scan_missing_postal(
    records: &[&SubscriberRecord],
    schema: &Schema,
    required: &[String],
    mapping: &MappingTable,
) -> StageScan {
    let flagged: Vec<(u64, bool)> = records
        .par_iter()
        .filter(|r| {
            postal_required(r.country(schema), required) && is_placeholder_postal(r.postal(schema))
        })
        .map(|r| {
            let available = mapping
                .lookup(r.card_token(schema))
                .is_some_and(|m| !m.postal_code.trim().is_empty());
            (r.row, available)
        })
        .collect();

    let mut rows: Vec<u64> = flagged.iter().map(|(row, _)| *row).collect();
    let mut remediable: Vec<u64> = flagged
        .iter()
        .filter(|(_, available)| *available)
        .map(|(row, _)| *row)
        .collect();
    rows.sort_unstable();
    remediable.sort_unstable();
    StageScan { rows, remediable }
}

static CA_POSTAL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z]\d[A-Za-z]\s?\d[A-Za-z]\d$").unwrap());

/// Letter-digit-letter, optional space, digit-letter-digit. Empty values are
/// the missing-postal gate's concern, not a format failure.
fn scan_ca_postal(records: &[&SubscriberRecord], schema: &Schema) -> StageScan {
    let rows: Vec<u64> = records
        .par_iter()
        .filter(|r| {
            r.country(schema).eq_ignore_ascii_case("CA") && {
                let postal = r.postal(schema);
                !is_placeholder_postal(postal) && !CA_POSTAL.is_match(postal)
            }
        })
        .map(|r| r.row)
        .collect();
    StageScan::from_rows(rows)
}

fn is_digits(value: &str, len: usize) -> bool {
    value.len() == len && value.bytes().all(|b| b.is_ascii_digit())
}

/// US zips must be exactly five digits. A 4-digit numeric value lost its
/// leading zero somewhere upstream and is autocorrectable; everything else is
/// a hard failure.
fn scan_us_postal(records: &[&SubscriberRecord], schema: &Schema) -> StageScan {
    let flagged: Vec<(u64, bool)> = records
        .par_iter()
        .filter(|r| {
            r.country(schema).eq_ignore_ascii_case("US") && {
                let postal = r.postal(schema);
                !is_placeholder_postal(postal) && !is_digits(postal, 5)
            }
        })
        .map(|r| (r.row, is_digits(r.postal(schema), 4)))
        .collect();

    let mut rows: Vec<u64> = flagged.iter().map(|(row, _)| *row).collect();
    let mut remediable: Vec<u64> = flagged
        .iter()
        .filter(|(_, fixable)| *fixable)
        .map(|(row, _)| *row)
        .collect();
    rows.sort_unstable();
    remediable.sort_unstable();
    StageScan { rows, remediable }
}

/// Fixed-length numeric token check. Empty tokens are left for the mapper,
/// which classifies them as `no_token_found`.
fn scan_card_token(records: &[&SubscriberRecord], schema: &Schema, digits: usize) -> StageScan {
    let rows: Vec<u64> = records
        .par_iter()
        .filter(|r| {
            let token = r.card_token(schema);
            !token.is_empty() && !is_digits(token, digits)
        })
        .map(|r| r.row)
        .collect();
    StageScan::from_rows(rows)
}
