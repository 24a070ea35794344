//! Header resolution for the two input datasets.
//!
//! Column lookups happen once per upload; records then carry their fields as
//! a plain vector indexed through the resolved [`Schema`], which keeps
//! arbitrary pass-through columns intact. Headers are trimmed before matching
//! because exports routinely arrive with hidden whitespace around names.

use crate::provider::Processor;
use csv::StringRecord;

/// Columns every subscriber export must carry.
pub const REQUIRED_SUBSCRIBER_COLUMNS: &[&str] = &[
    "card_token",
    "current_period_started_at",
    "current_period_ends_at",
    "customer_email",
    "customer_full_name",
    "customer_external_id",
    "subscription_external_id",
    "address_postal_code",
    "address_country_code",
];

/// Resolved column indices for a subscriber dataset.
#[derive(Debug, Clone)]
pub struct Schema {
    columns: Vec<String>,
    pub card_token: usize,
    pub period_start: usize,
    pub period_end: usize,
    pub email: usize,
    pub full_name: usize,
    pub subscription_id: usize,
    pub postal: usize,
    pub country: usize,
    /// Optional pass-through column normalized to upper case on output.
    pub enable_checkout: Option<usize>,
}

impl Schema {
    /// Resolve required columns from a header row, reporting *every* missing
    /// column rather than the first.
    pub fn resolve(headers: &StringRecord) -> Result<Self, Vec<String>> {
        let columns: Vec<String> = headers.iter().map(|h| h.trim().to_string()).collect();
        let mut missing = Vec::new();
        let mut index_of = |name: &str| -> usize {
            match columns.iter().position(|c| c == name) {
                Some(i) => i,
                None => {
                    missing.push(name.to_string());
                    usize::MAX
                }
            }
        };

        let card_token = index_of("card_token");
        let period_start = index_of("current_period_started_at");
        let period_end = index_of("current_period_ends_at");
        let email = index_of("customer_email");
        let full_name = index_of("customer_full_name");
        // Required to be present, but nothing downstream reads it by index;
        // it reaches the output as a pass-through column.
        index_of("customer_external_id");
        let subscription_id = index_of("subscription_external_id");
        let postal = index_of("address_postal_code");
        let country = index_of("address_country_code");

        if !missing.is_empty() {
            return Err(missing);
        }

        let enable_checkout = columns.iter().position(|c| c == "enable_checkout");
        Ok(Schema {
            columns,
            card_token,
            period_start,
            period_end,
            email,
            full_name,
            subscription_id,
            postal,
            country,
            enable_checkout,
        })
    }

    /// The trimmed header, in original column order.
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn width(&self) -> usize {
        self.columns.len()
    }
}

/// Resolved column indices for a mapping dataset, per processor.
#[derive(Debug, Clone, Copy)]
pub(crate) enum MappingColumns {
    Stripe {
        card_id: usize,
        number: usize,
        name: usize,
        exp_month: usize,
        exp_year: usize,
        transaction_ids: usize,
        zip: Option<usize>,
    },
    Bluesnap {
        account_id: usize,
        card_number: usize,
        first_name: usize,
        last_name: usize,
        exp_month: usize,
        exp_year: usize,
        transaction_id: usize,
        zip: Option<usize>,
    },
}

impl MappingColumns {
    pub(crate) fn resolve(
        processor: Processor,
        headers: &StringRecord,
    ) -> Result<Self, Vec<String>> {
        let columns: Vec<String> = headers.iter().map(|h| h.trim().to_string()).collect();
        let mut missing = Vec::new();
        let mut index_of = |name: &str| -> usize {
            match columns.iter().position(|c| c == name) {
                Some(i) => i,
                None => {
                    missing.push(name.to_string());
                    usize::MAX
                }
            }
        };

        let resolved = match processor {
            Processor::Stripe => {
                let card_id = index_of("card.id");
                let number = index_of("card.number");
                let name = index_of("card.name");
                let exp_month = index_of("card.exp_month");
                let exp_year = index_of("card.exp_year");
                let transaction_ids = index_of("card.transaction_ids");
                let zip = columns.iter().position(|c| c == "card.address_zip");
                MappingColumns::Stripe {
                    card_id,
                    number,
                    name,
                    exp_month,
                    exp_year,
                    transaction_ids,
                    zip,
                }
            }
            Processor::Bluesnap => {
                let account_id = index_of("BlueSnap Account Id");
                let card_number = index_of("Credit Card Number");
                let first_name = index_of("First Name");
                let last_name = index_of("Last Name");
                let exp_month = index_of("Expiration Month");
                let exp_year = index_of("Expiration Year");
                let transaction_id = index_of("Network Transaction Id");
                let zip = columns.iter().position(|c| c == "Zip");
                MappingColumns::Bluesnap {
                    account_id,
                    card_number,
                    first_name,
                    last_name,
                    exp_month,
                    exp_year,
                    transaction_id,
                    zip,
                }
            }
        };

        if missing.is_empty() {
            Ok(resolved)
        } else {
            Err(missing)
        }
    }
}
