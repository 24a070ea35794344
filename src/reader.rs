//! Streaming CSV ingestion for the two input datasets.
//!
//! Both readers work row-by-row off any `io::Read`, so the decoded dataset is
//! materialized exactly once (as the session's record collection) and never
//! duplicated. Parse failures are annotated with row numbers; a bad header is
//! fatal and reports every missing required column.

use crate::error::MigrateError;
use crate::provider::Processor;
use crate::record::{MappingRecord, MappingTable, SubscriberRecord};
use crate::schema::{MappingColumns, Schema};
use anyhow::Context;
use std::io::Read;
use tracing::{debug, info};

/// A parsed subscriber dataset: resolved header plus ordered records.
#[derive(Debug)]
pub struct SubscriberSet {
    pub schema: Schema,
    pub records: Vec<SubscriberRecord>,
}

/// Read the subscriber export.
///
/// Short rows are padded to header width; rows longer than the header keep
/// their extra fields (the artifact writer emits them verbatim).
pub fn read_subscribers<R: Read>(input: R) -> Result<SubscriberSet, MigrateError> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_reader(input);

    let headers = reader
        .headers()
        .map_err(|e| MigrateError::Malformed {
            dataset: "subscriber",
            source: e.into(),
        })?
        .clone();
    let schema = Schema::resolve(&headers).map_err(|missing| MigrateError::Schema {
        dataset: "subscriber",
        missing,
    })?;

    let width = schema.width();
    let mut records = Vec::new();
    for (i, row) in reader.records().enumerate() {
        let row = row
            .with_context(|| format!("parse subscriber row #{}", i + 1))
            .map_err(|e| MigrateError::Malformed {
                dataset: "subscriber",
                source: e,
            })?;
        let mut fields: Vec<String> = row.iter().map(|f| f.to_string()).collect();
        if fields.len() < width {
            fields.resize(width, String::new());
        }
        records.push(SubscriberRecord::new(i as u64, fields));
    }

    info!(rows = records.len(), "subscriber dataset loaded");
    Ok(SubscriberSet { schema, records })
}

/// Read the vault mapping file into a keyed table.
///
/// Rows without a usable join key are skipped; keys appearing more than once
/// are marked ambiguous so the mapper never guesses between them.
pub fn read_mapping<R: Read>(
    input: R,
    processor: Processor,
) -> Result<MappingTable, MigrateError> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_reader(input);

    let headers = reader
        .headers()
        .map_err(|e| MigrateError::Malformed {
            dataset: "mapping",
            source: e.into(),
        })?
        .clone();
    let columns = MappingColumns::resolve(processor, &headers).map_err(|missing| {
        MigrateError::Schema {
            dataset: "mapping",
            missing,
        }
    })?;

    let mut table = MappingTable::default();
    let mut skipped = 0usize;
    for (i, row) in reader.records().enumerate() {
        let row = row
            .with_context(|| format!("parse mapping row #{}", i + 1))
            .map_err(|e| MigrateError::Malformed {
                dataset: "mapping",
                source: e,
            })?;
        let field = |idx: usize| row.get(idx).unwrap_or("").trim().to_string();

        let record = match columns {
            MappingColumns::Stripe {
                card_id,
                number,
                name,
                exp_month,
                exp_year,
                transaction_ids,
                zip,
            } => MappingRecord {
                key: field(card_id),
                token: field(number),
                holder_name: field(name),
                expiry_month: field(exp_month),
                expiry_year: field(exp_year),
                network_transaction_id: field(transaction_ids),
                postal_code: zip.map(&field).unwrap_or_default(),
            },
            MappingColumns::Bluesnap {
                account_id,
                card_number,
                first_name,
                last_name,
                exp_month,
                exp_year,
                transaction_id,
                zip,
            } => {
                let account = field(account_id);
                let number = field(card_number);
                MappingRecord {
                    key: format!("{account}{}", last_four(&number)),
                    token: number.clone(),
                    holder_name: format!("{} {}", field(first_name), field(last_name))
                        .trim()
                        .to_string(),
                    expiry_month: field(exp_month),
                    expiry_year: field(exp_year),
                    network_transaction_id: field(transaction_id),
                    postal_code: zip.map(&field).unwrap_or_default(),
                }
            }
        };

        if record.key.is_empty() || record.token.is_empty() {
            skipped += 1;
            continue;
        }
        table.insert(record);
    }

    if table.ambiguous_keys() > 0 {
        debug!(
            ambiguous = table.ambiguous_keys(),
            "mapping file contains ambiguous join keys"
        );
    }
    info!(
        keys = table.len(),
        skipped, "mapping dataset loaded"
    );
    Ok(table)
}

/// Last four characters of a card number, as the source platform composes
/// its join key from them.
fn last_four(number: &str) -> String {
    let chars: Vec<char> = number.chars().collect();
    let start = chars.len().saturating_sub(4);
    chars[start..].iter().collect()
}
