//! Sandbox email anonymization.
//!
//! Non-production runs replace every `customer_email` with a deterministic
//! placeholder before any validation stage runs. The rewrite is keyed on the
//! row index and original value, so regenerating a session from the same
//! inputs produces identical placeholders, and no two rows collide. Names and
//! all other PII stay untouched. Not reversible within the session.

use crate::record::SubscriberRecord;
use crate::schema::Schema;
use sha2::{Digest, Sha256};
use tracing::info;

/// Replace every customer email in place. Returns the number rewritten.
pub fn anonymize_emails(records: &mut [SubscriberRecord], schema: &Schema) -> usize {
    for record in records.iter_mut() {
        let placeholder = placeholder_email(record.row, record.email(schema));
        record.set_email(schema, placeholder);
    }
    info!(rows = records.len(), "customer emails anonymized for sandbox");
    records.len()
}

pub(crate) fn placeholder_email(row: u64, original: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(row.to_be_bytes());
    hasher.update(original.as_bytes());
    let digest = hasher.finalize();
    let tag: String = digest.iter().take(6).map(|b| format!("{b:02x}")).collect();
    format!("blackhole+{tag}@example.com")
}
