//! Typed views over subscriber and mapping rows.

use crate::schema::Schema;
use serde::Serialize;
use std::collections::HashMap;

/// One row of the subscriber export.
///
/// Fields are kept verbatim in header order; typed access goes through the
/// resolved [`Schema`] so unknown pass-through columns survive untouched all
/// the way to the output artifacts. The row index is assigned at ingestion
/// (0-based, excluding the header) and is stable for the whole session.
///
/// Records are immutable except for the two authorized remediation writes
/// (postal autocorrection/substitution) and the sandbox email rewrite.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubscriberRecord {
    pub row: u64,
    fields: Vec<String>,
}

impl SubscriberRecord {
    pub(crate) fn new(row: u64, fields: Vec<String>) -> Self {
        Self { row, fields }
    }

    /// All fields in original column order.
    pub fn fields(&self) -> &[String] {
        &self.fields
    }

    /// Field at a schema-resolved column index, empty when absent.
    pub fn field(&self, index: usize) -> &str {
        self.fields.get(index).map(String::as_str).unwrap_or("")
    }

    pub fn card_token(&self, schema: &Schema) -> &str {
        self.field(schema.card_token).trim()
    }

    pub fn period_start(&self, schema: &Schema) -> &str {
        self.field(schema.period_start).trim()
    }

    pub fn period_end(&self, schema: &Schema) -> &str {
        self.field(schema.period_end).trim()
    }

    pub fn email(&self, schema: &Schema) -> &str {
        self.field(schema.email).trim()
    }

    pub fn full_name(&self, schema: &Schema) -> &str {
        self.field(schema.full_name).trim()
    }

    pub fn subscription_id(&self, schema: &Schema) -> &str {
        self.field(schema.subscription_id).trim()
    }

    pub fn postal(&self, schema: &Schema) -> &str {
        self.field(schema.postal).trim()
    }

    pub fn country(&self, schema: &Schema) -> &str {
        self.field(schema.country).trim()
    }

    pub(crate) fn set_postal(&mut self, schema: &Schema, value: &str) {
        if let Some(slot) = self.fields.get_mut(schema.postal) {
            *slot = value.to_string();
        }
    }

    pub(crate) fn set_email(&mut self, schema: &Schema, value: String) {
        if let Some(slot) = self.fields.get_mut(schema.email) {
            *slot = value;
        }
    }
}

/// One vault record from the mapping file, normalized across processors.
///
/// `key` is the provider join key: the `card.id` for Stripe, or the BlueSnap
/// account id concatenated with the last four card digits. Never mutated.
#[derive(Debug, Clone, Serialize)]
pub struct MappingRecord {
    pub key: String,
    pub token: String,
    pub holder_name: String,
    pub expiry_month: String,
    pub expiry_year: String,
    pub network_transaction_id: String,
    pub postal_code: String,
}

#[derive(Debug)]
enum Slot {
    Unique(MappingRecord),
    /// Key seen more than once; resolving it would pick nondeterministically,
    /// so lookups treat it as absent.
    Ambiguous,
}

/// Keyed index over the mapping dataset.
#[derive(Debug, Default)]
pub struct MappingTable {
    entries: HashMap<String, Slot>,
    ambiguous: usize,
}

impl MappingTable {
    pub(crate) fn insert(&mut self, record: MappingRecord) {
        match self.entries.get_mut(&record.key) {
            None => {
                self.entries.insert(record.key.clone(), Slot::Unique(record));
            }
            Some(slot @ Slot::Unique(_)) => {
                *slot = Slot::Ambiguous;
                self.ambiguous += 1;
            }
            Some(Slot::Ambiguous) => {}
        }
    }

    /// Unique match for a join key, or `None` when the key is unknown *or*
    /// ambiguous.
    pub fn lookup(&self, key: &str) -> Option<&MappingRecord> {
        match self.entries.get(key) {
            Some(Slot::Unique(record)) => Some(record),
            _ => None,
        }
    }

    /// Number of distinct keys, ambiguous ones included.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Number of keys that appeared more than once.
    pub fn ambiguous_keys(&self) -> usize {
        self.ambiguous
    }
}
