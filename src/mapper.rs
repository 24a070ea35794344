//! The vault-token join.
//!
//! Each surviving subscriber record resolves to at most one mapping record by
//! the provider join key. No match, an empty key, or an ambiguous key all
//! classify the record as `no_token_found`; ambiguity is never resolved by
//! picking a row, which would make the output nondeterministic. There is no
//! remediation path here — fixing these records takes a corrected mapping
//! file.

use crate::record::{MappingTable, SubscriberRecord};
use crate::schema::Schema;
use serde::Serialize;
use tracing::info;

/// Vault fields attached to a matched record.
#[derive(Debug, Clone, Serialize)]
pub struct ResolvedCard {
    pub row: u64,
    pub token: String,
    pub holder_name: String,
    pub expiry_month: String,
    pub expiry_year: String,
    pub network_transaction_id: String,
}

/// Join results, both sides in ascending row order.
#[derive(Debug)]
pub struct MapOutcomes {
    pub matched: Vec<ResolvedCard>,
    pub no_token: Vec<u64>,
}

pub fn map_records(
    records: &[&SubscriberRecord],
    schema: &Schema,
    mapping: &MappingTable,
) -> MapOutcomes {
    let mut matched = Vec::new();
    let mut no_token = Vec::new();

    for &record in records {
        let key = record.card_token(schema);
        let Some(vault) = (!key.is_empty()).then(|| mapping.lookup(key)).flatten() else {
            no_token.push(record.row);
            continue;
        };
        // Mapping rows occasionally lack a holder name; fall back to the
        // subscriber's own.
        let holder_name = if vault.holder_name.trim().is_empty() {
            record.full_name(schema).to_string()
        } else {
            vault.holder_name.clone()
        };
        matched.push(ResolvedCard {
            row: record.row,
            token: vault.token.clone(),
            holder_name,
            expiry_month: vault.expiry_month.clone(),
            expiry_year: vault.expiry_year.clone(),
            network_transaction_id: vault.network_transaction_id.clone(),
        });
    }

    info!(
        matched = matched.len(),
        no_token = no_token.len(),
        "vault join complete"
    );
    MapOutcomes { matched, no_token }
}
