//! Authorized remediation transforms.
//!
//! Both transforms are explicit: the session applies them only after the
//! caller grants the matching remediation, never implicitly. Both are
//! idempotent, so re-running a stage after remediation cannot drift.

use crate::record::{MappingTable, SubscriberRecord};
use crate::schema::Schema;
use crate::stages::is_placeholder_postal;
use tracing::debug;

/// Zero-prefix every 4-digit numeric US postal code.
///
/// A second application is a no-op: corrected values are 5 digits and no
/// longer match. Returns the number of records rewritten.
pub fn autocorrect_us_postal(records: &mut [SubscriberRecord], schema: &Schema) -> usize {
    let mut corrected = 0usize;
    for record in records.iter_mut() {
        if !record.country(schema).eq_ignore_ascii_case("US") {
            continue;
        }
        let postal = record.postal(schema);
        if postal.len() == 4 && postal.bytes().all(|b| b.is_ascii_digit()) {
            let fixed = format!("0{postal}");
            record.set_postal(schema, &fixed);
            corrected += 1;
        }
    }
    debug!(corrected, "autocorrected US postal codes");
    corrected
}

/// Fill missing postal codes from the mapping file.
///
/// Only records in a postal-required country with an empty/placeholder value
/// are touched, and only when their join key resolves to exactly one mapping
/// record carrying a non-empty postal value. Everything else stays flagged.
/// Returns the number of records filled.
pub fn substitute_postal_from_mapping(
    records: &mut [SubscriberRecord],
    schema: &Schema,
    mapping: &MappingTable,
    postal_required_countries: &[String],
) -> usize {
    let mut filled = 0usize;
    for record in records.iter_mut() {
        let country = record.country(schema);
        let required = postal_required_countries
            .iter()
            .any(|c| c.eq_ignore_ascii_case(country));
        if !required || !is_placeholder_postal(record.postal(schema)) {
            continue;
        }
        let Some(mapped) = mapping.lookup(record.card_token(schema)) else {
            continue;
        };
        let postal = mapped.postal_code.trim();
        if !postal.is_empty() {
            record.set_postal(schema, postal);
            filled += 1;
        }
    }
    debug!(filled, "substituted postal codes from mapping");
    filled
}
