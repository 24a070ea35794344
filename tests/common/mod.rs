#![allow(dead_code)]

use chrono::{DateTime, TimeZone, Utc};
use vaultshift::{Environment, MigrationConfig, Processor};

pub const SUB_HEADER: &str = "card_token,current_period_started_at,current_period_ends_at,customer_email,customer_full_name,customer_external_id,subscription_external_id,address_postal_code,address_country_code";

pub const STRIPE_MAP_HEADER: &str =
    "card.id,card.number,card.name,card.exp_month,card.exp_year,card.transaction_ids,card.address_zip";

pub const BLUESNAP_MAP_HEADER: &str = "BlueSnap Account Id,Credit Card Number,First Name,Last Name,Expiration Month,Expiration Year,Network Transaction Id,Zip";

/// Clock pinned for date-period checks, matching the fixtures below: started
/// dates are in 2024, end dates in 2030.
pub fn fixed_now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 8, 16, 10, 14, 0).unwrap()
}

pub fn subscriber_csv(rows: &[String]) -> String {
    format!("{SUB_HEADER}\n{}\n", rows.join("\n"))
}

pub fn mapping_csv(header: &str, rows: &[String]) -> String {
    format!("{header}\n{}\n", rows.join("\n"))
}

/// A subscriber row with valid dates and derived customer/subscription ids.
pub fn row(token: &str, email: &str, postal: &str, country: &str) -> String {
    row_with_dates(
        token,
        email,
        postal,
        country,
        "2024-01-01T00:00:00Z",
        "2030-01-01T00:00:00Z",
    )
}

pub fn row_with_dates(
    token: &str,
    email: &str,
    postal: &str,
    country: &str,
    start: &str,
    end: &str,
) -> String {
    format!("{token},{start},{end},{email},Jane Doe,cus_{email},sub_{email},{postal},{country}")
}

/// A Stripe mapping row resolving `card_id` to a vault token.
pub fn stripe_map_row(card_id: &str, number: &str, zip: &str) -> String {
    format!("{card_id},{number},Jane Doe,12,2030,ntxn_{card_id},{zip}")
}

pub fn stripe_config() -> MigrationConfig {
    MigrationConfig::new("Acme Corp", "tokenex", Processor::Stripe, Environment::Production)
        .with_now(fixed_now())
}

pub fn bluesnap_config() -> MigrationConfig {
    MigrationConfig::new("Acme Corp", "tokenex", Processor::Bluesnap, Environment::Production)
        .with_now(fixed_now())
}
