//! Per-submission configuration.

use crate::provider::{Environment, Processor};
use chrono::{DateTime, Utc};

/// Countries the target billing platform refuses to import.
pub const DEFAULT_EMBARGOED_COUNTRIES: &[&str] = &["CU", "IR", "KP", "SD", "SY"];

/// Countries for which an empty or placeholder postal code blocks import.
pub const DEFAULT_POSTAL_REQUIRED_COUNTRIES: &[&str] = &["US", "CA", "GB", "AU"];

/// Remediation flags the caller may grant up front so the matching stages
/// never suspend. Each maps to one of the interactive choices.
#[derive(Debug, Clone, Copy, Default)]
pub struct Preauthorized {
    /// Zero-prefix 4-digit US postal codes without asking.
    pub autocorrect_us_postal: bool,
    /// Fill missing postal codes from the mapping file without asking.
    pub use_mapping_postal: bool,
    /// Accept records with missing postal codes as-is.
    pub proceed_without_missing: bool,
}

/// Everything a submission needs beyond the two datasets.
#[derive(Debug, Clone)]
pub struct MigrationConfig {
    /// Seller name, used as the artifact filename prefix.
    pub seller: String,
    /// Vault provider written into the final import's `vault_provider` column.
    pub vault_provider: String,
    pub processor: Processor,
    pub environment: Environment,
    pub embargoed_countries: Vec<String>,
    pub postal_required_countries: Vec<String>,
    pub preauthorized: Preauthorized,
    /// Pinned clock for date-period validation. `None` resolves to
    /// `Utc::now()` once at session creation, so re-runs after a remediation
    /// compare against the same instant.
    pub now: Option<DateTime<Utc>>,
}

impl MigrationConfig {
    pub fn new(
        seller: impl Into<String>,
        vault_provider: impl Into<String>,
        processor: Processor,
        environment: Environment,
    ) -> Self {
        Self {
            seller: seller.into(),
            vault_provider: vault_provider.into(),
            processor,
            environment,
            embargoed_countries: DEFAULT_EMBARGOED_COUNTRIES
                .iter()
                .map(|c| c.to_string())
                .collect(),
            postal_required_countries: DEFAULT_POSTAL_REQUIRED_COUNTRIES
                .iter()
                .map(|c| c.to_string())
                .collect(),
            preauthorized: Preauthorized::default(),
            now: None,
        }
    }

    pub fn with_now(mut self, now: DateTime<Utc>) -> Self {
        self.now = Some(now);
        self
    }

    pub fn with_preauthorized(mut self, preauthorized: Preauthorized) -> Self {
        self.preauthorized = preauthorized;
        self
    }
}
