//! Cross-record duplicate detection.
//!
//! Runs once all blocking stages are resolved, over the surviving records.
//! Purely informational: duplicates are reported, never excluded, so this
//! pass can never change the final import row count.

use crate::provider::{Environment, Processor};
use crate::record::{MappingTable, SubscriberRecord};
use crate::schema::Schema;
use crate::stages::StageKind;
use serde::Serialize;
use std::collections::HashMap;
use tracing::debug;

/// Identity dimensions checked for multiplicity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DuplicateField {
    CardToken,
    /// Provider card identifier; only emitted for processors that expose one
    /// (Stripe's `card.id` travels in the `card_token` column pre-join).
    CardId,
    SubscriptionExternalId,
    CustomerEmail,
}

impl DuplicateField {
    /// Artifact category for this dimension's report.
    pub fn category(self) -> &'static str {
        match self {
            DuplicateField::CardToken => "duplicate_card_token",
            DuplicateField::CardId => "duplicate_card_id",
            DuplicateField::SubscriptionExternalId => "duplicate_subscription_external_id",
            DuplicateField::CustomerEmail => "duplicate_customer_email",
        }
    }
}

/// Warning-kind result for one identity dimension.
#[derive(Debug, Clone, Serialize)]
pub struct DuplicateReport {
    pub field: DuplicateField,
    /// Duplicate groups; rows within a group ascend by original row index,
    /// groups are ordered by their first row.
    pub groups: Vec<Vec<u64>>,
    /// All duplicate rows, ascending.
    pub affected_rows: Vec<u64>,
}

impl DuplicateReport {
    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    /// Duplicates are warnings: they never exclude rows.
    pub fn kind(&self) -> StageKind {
        StageKind::Warning
    }
}

/// Compute the applicable multiplicity maps.
///
/// The token dimension keys on the *resolved* vault token, not the raw
/// subscriber column: that column holds the provider join key, and two
/// distinct keys can resolve to the same card. Records without a unique
/// mapping match have no token and are skipped here (the mapper already
/// classifies them as `no_token_found`).
///
/// The email map is skipped entirely in sandbox runs: anonymization makes
/// emails unique by construction, so the map would only report noise.
pub fn detect(
    records: &[&SubscriberRecord],
    schema: &Schema,
    mapping: &MappingTable,
    processor: Processor,
    environment: Environment,
) -> Vec<DuplicateReport> {
    let mut reports = vec![multiplicity(records, DuplicateField::CardToken, |r| {
        mapping
            .lookup(r.card_token(schema))
            .map(|m| m.token.as_str())
            .unwrap_or("")
    })];
    if processor.has_card_id() {
        reports.push(multiplicity(records, DuplicateField::CardId, |r| {
            r.card_token(schema)
        }));
    }
    reports.push(multiplicity(
        records,
        DuplicateField::SubscriptionExternalId,
        |r| r.subscription_id(schema),
    ));
    if !environment.is_sandbox() {
        reports.push(multiplicity(records, DuplicateField::CustomerEmail, |r| {
            r.email(schema)
        }));
    }

    for report in &reports {
        if !report.is_empty() {
            debug!(
                field = report.field.category(),
                groups = report.groups.len(),
                rows = report.affected_rows.len(),
                "duplicates detected"
            );
        }
    }
    reports
}

fn multiplicity<'a, F>(
    records: &[&'a SubscriberRecord],
    field: DuplicateField,
    key: F,
) -> DuplicateReport
where
    F: Fn(&'a SubscriberRecord) -> &'a str,
{
    let mut map: HashMap<&str, Vec<u64>> = HashMap::new();
    for &record in records {
        let k = key(record);
        // Empty keys never group: unmapped tokens and blank emails stay
        // eligible and pass through without warnings.
        if k.is_empty() {
            continue;
        }
        map.entry(k).or_default().push(record.row);
    }

    let mut groups: Vec<Vec<u64>> = map.into_values().filter(|rows| rows.len() > 1).collect();
    // Records arrive in row order, so each group is already sorted.
    groups.sort_by_key(|rows| rows[0]);

    let mut affected_rows: Vec<u64> = groups.iter().flatten().copied().collect();
    affected_rows.sort_unstable();

    DuplicateReport {
        field,
        groups,
        affected_rows,
    }
}
