//! Downloadable output artifacts.
//!
//! Every failed or warning category with affected rows gets a CSV report
//! carrying the complete original rows; the final import is the one artifact
//! assembled from resolved vault fields plus the (possibly remediated)
//! subscriber columns. All serialization is deterministic: regenerating an
//! artifact for unchanged session state is byte-identical, and the optional
//! zip bundle writes entries with fixed timestamps in name order.

use crate::config::MigrationConfig;
use crate::mapper::ResolvedCard;
use crate::record::SubscriberRecord;
use crate::schema::Schema;
use anyhow::{Context, Result};
use serde::Serialize;

pub const CATEGORY_FINAL_IMPORT: &str = "final_import";
pub const CATEGORY_NO_TOKEN: &str = "no_token_found";

/// One immutable, named output. Addressable by `name` for the session's
/// lifetime.
#[derive(Debug, Clone)]
pub struct OutputArtifact {
    pub name: String,
    pub category: String,
    pub rows: usize,
    pub bytes: Vec<u8>,
}

impl OutputArtifact {
    pub fn info(&self) -> ArtifactInfo {
        ArtifactInfo {
            name: self.name.clone(),
            category: self.category.clone(),
            rows: self.rows,
            size: self.bytes.len(),
        }
    }
}

/// Caller-facing artifact listing (no payload bytes).
#[derive(Debug, Clone, Serialize)]
pub struct ArtifactInfo {
    pub name: String,
    pub category: String,
    pub rows: usize,
    pub size: usize,
}

/// `{seller}_{processor}[_sandbox]_{category}.csv`, seller cleaned for
/// filesystem safety.
pub(crate) fn artifact_name(cfg: &MigrationConfig, category: &str) -> String {
    format!("{}_{category}.csv", base_name(cfg))
}

#[cfg(feature = "bundle-zip")]
pub(crate) fn bundle_name(cfg: &MigrationConfig) -> String {
    format!("{}_bundle.zip", base_name(cfg))
}

fn base_name(cfg: &MigrationConfig) -> String {
    let seller = clean_seller(&cfg.seller);
    let mut base = if seller.is_empty() {
        cfg.processor.as_str().to_string()
    } else {
        format!("{seller}_{}", cfg.processor.as_str())
    };
    if cfg.environment.is_sandbox() {
        base.push_str("_sandbox");
    }
    base
}

/// Keep alphanumerics, spaces, hyphens and underscores; spaces become
/// underscores.
fn clean_seller(name: &str) -> String {
    name.chars()
        .filter(|c| c.is_alphanumeric() || matches!(c, ' ' | '-' | '_'))
        .collect::<String>()
        .trim()
        .replace(' ', "_")
}

/// Serialize a report of complete original rows for one category.
pub(crate) fn rows_report(
    schema: &Schema,
    records: &[SubscriberRecord],
    rows: &[u64],
) -> Result<Vec<u8>> {
    let mut buf = Vec::new();
    {
        let mut writer = csv::Writer::from_writer(&mut buf);
        writer
            .write_record(schema.columns())
            .context("write report header")?;
        for &row in rows {
            let record = records
                .get(row as usize)
                .with_context(|| format!("row {row} out of range"))?;
            writer
                .write_record(record.fields())
                .with_context(|| format!("serialize report row {row}"))?;
        }
        writer.flush().context("flush report buffer")?;
    }
    Ok(buf)
}

/// Assemble the final import.
///
/// Columns: the resolved vault fields first, then every subscriber column
/// except `card_token` (already replaced by the vault token) in original
/// order, then `vault_provider`. `enable_checkout` values are upper-cased
/// when that pass-through column exists.
pub(crate) fn final_import(
    schema: &Schema,
    records: &[SubscriberRecord],
    resolved: &[ResolvedCard],
    vault_provider: &str,
) -> Result<Vec<u8>> {
    let mut buf = Vec::new();
    let mut writer = csv::Writer::from_writer(&mut buf);

    let mut header: Vec<&str> = vec![
        "card_token",
        "card_holder_name",
        "card_expiry_month",
        "card_expiry_year",
        "network_transaction_id",
    ];
    for (i, column) in schema.columns().iter().enumerate() {
        if i != schema.card_token {
            header.push(column);
        }
    }
    header.push("vault_provider");
    writer
        .write_record(&header)
        .context("write final import header")?;

    for card in resolved {
        let record = records
            .get(card.row as usize)
            .with_context(|| format!("row {} out of range", card.row))?;
        let mut out: Vec<String> = vec![
            card.token.clone(),
            card.holder_name.clone(),
            card.expiry_month.clone(),
            card.expiry_year.clone(),
            card.network_transaction_id.clone(),
        ];
        for (i, field) in record.fields().iter().enumerate() {
            if i == schema.card_token {
                continue;
            }
            if Some(i) == schema.enable_checkout {
                out.push(field.to_uppercase());
            } else {
                out.push(field.clone());
            }
        }
        out.push(vault_provider.to_string());
        writer
            .write_record(&out)
            .with_context(|| format!("serialize final import row {}", card.row))?;
    }

    writer.flush().context("flush final import buffer")?;
    drop(writer);
    Ok(buf)
}

/// Bundle all artifacts into one zip, deterministically.
#[cfg(feature = "bundle-zip")]
pub(crate) fn bundle(artifacts: &[OutputArtifact]) -> Result<Vec<u8>> {
    use std::io::{Cursor, Write};
    use zip::write::SimpleFileOptions;
    use zip::{CompressionMethod, ZipWriter};

    let mut sorted: Vec<&OutputArtifact> = artifacts.iter().collect();
    sorted.sort_by(|a, b| a.name.cmp(&b.name));

    let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
    // Fixed timestamp keeps re-generated bundles byte-identical.
    let options = SimpleFileOptions::default()
        .compression_method(CompressionMethod::Deflated)
        .last_modified_time(zip::DateTime::default());
    for artifact in sorted {
        writer
            .start_file(artifact.name.as_str(), options)
            .with_context(|| format!("add {} to bundle", artifact.name))?;
        writer
            .write_all(&artifact.bytes)
            .with_context(|| format!("write {} into bundle", artifact.name))?;
    }
    Ok(writer.finish().context("finish bundle")?.into_inner())
}
