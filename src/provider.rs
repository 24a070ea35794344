//! Payment processor and environment selectors.
//!
//! Provider-specific behavior (join key construction, token format rules,
//! whether a card identifier exists apart from the vault token) lives here so
//! the stage and mapper code can stay provider-agnostic.

use crate::error::MigrateError;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Source payment processor whose export is being migrated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Processor {
    Stripe,
    Bluesnap,
}

impl Processor {
    pub fn parse(value: &str) -> Result<Self, MigrateError> {
        match value.trim().to_ascii_lowercase().as_str() {
            "stripe" => Ok(Processor::Stripe),
            "bluesnap" => Ok(Processor::Bluesnap),
            other => Err(MigrateError::UnknownProcessor(other.to_string())),
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Processor::Stripe => "stripe",
            Processor::Bluesnap => "bluesnap",
        }
    }

    /// Required vault-token length for processors whose tokens are a
    /// fixed-length numeric string. BlueSnap card identifiers are exactly 13
    /// digits; Stripe card ids are free-form and not format-checked.
    pub fn token_digits(self) -> Option<usize> {
        match self {
            Processor::Stripe => None,
            Processor::Bluesnap => Some(13),
        }
    }

    /// Whether the subscriber export carries a card identifier distinct from
    /// the final vault token. For Stripe the `card_token` column holds the
    /// `card.id` used for the join; the real token arrives from the mapping.
    pub fn has_card_id(self) -> bool {
        matches!(self, Processor::Stripe)
    }
}

impl fmt::Display for Processor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Target environment for the run. Sandbox runs anonymize customer emails
/// before any validation stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    Production,
    Sandbox,
}

impl Environment {
    pub fn is_sandbox(self) -> bool {
        matches!(self, Environment::Sandbox)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Environment::Production => "production",
            Environment::Sandbox => "sandbox",
        }
    }
}

impl fmt::Display for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
