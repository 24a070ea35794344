mod common;

use common::*;
use vaultshift::{MigrationSession, Outcome, StageName};

/// Run a session whose fixtures raise no remediation offer, panicking if it
/// suspends.
fn run_to_completion(
    subscriber: &str,
    mapping: &str,
    cfg: vaultshift::MigrationConfig,
) -> anyhow::Result<(MigrationSession, vaultshift::MigrationSummary)> {
    let mut session = MigrationSession::create(subscriber.as_bytes(), mapping.as_bytes(), cfg)?;
    match session.run()? {
        Outcome::Complete(summary) => Ok((session, summary)),
        other => panic!("expected completion, got {other:?}"),
    }
}

fn latest_result(session: &MigrationSession, stage: StageName) -> &vaultshift::ValidationResult {
    session
        .results()
        .iter()
        .rev()
        .find(|r| r.stage == stage)
        .unwrap_or_else(|| panic!("no result for {stage:?}"))
}

#[test]
fn embargoed_country_is_excluded_despite_valid_fields() -> anyhow::Result<()> {
    let subscriber = subscriber_csv(&[
        row("card_1", "ok@example.com", "12345", "US"),
        row("card_2", "embargo@example.com", "12345", "IR"),
    ]);
    let mapping = mapping_csv(
        STRIPE_MAP_HEADER,
        &[
            stripe_map_row("card_1", "4242424242424242", ""),
            stripe_map_row("card_2", "5555555555554444", ""),
        ],
    );
    let (session, summary) = run_to_completion(&subscriber, &mapping, stripe_config())?;

    let result = latest_result(&session, StageName::UnsupportedCountry);
    assert!(!result.valid);
    assert_eq!(result.affected_rows, vec![1]);
    assert_eq!(summary.imported, 1);
    assert_eq!(summary.excluded.get("unsupported_country"), Some(&1));
    Ok(())
}

#[test]
fn date_format_must_be_strict_iso8601() -> anyhow::Result<()> {
    let subscriber = subscriber_csv(&[
        row("card_1", "ok@example.com", "12345", "US"),
        row_with_dates(
            "card_2",
            "sloppy@example.com",
            "12345",
            "US",
            "2024-01-01",
            "2030-01-01T00:00:00Z",
        ),
        row_with_dates(
            "card_3",
            "junk@example.com",
            "12345",
            "US",
            "invalid-date",
            "2030-01-01T00:00:00Z",
        ),
    ]);
    let mapping = mapping_csv(
        STRIPE_MAP_HEADER,
        &[stripe_map_row("card_1", "4242424242424242", "")],
    );
    let (session, summary) = run_to_completion(&subscriber, &mapping, stripe_config())?;

    let result = latest_result(&session, StageName::DateFormat);
    assert_eq!(result.affected_rows, vec![1, 2]);
    assert_eq!(summary.excluded.get("invalid_date_format"), Some(&2));
    assert_eq!(summary.imported, 1);
    Ok(())
}

#[test]
fn date_period_checks_against_the_pinned_clock() -> anyhow::Result<()> {
    // fixed_now() is 2025-08-16T10:14:00Z.
    let subscriber = subscriber_csv(&[
        row("card_1", "ok@example.com", "12345", "US"),
        row_with_dates(
            "card_2",
            "future-start@example.com",
            "12345",
            "US",
            "2026-01-01T00:00:00Z",
            "2030-01-01T00:00:00Z",
        ),
        row_with_dates(
            "card_3",
            "ended@example.com",
            "12345",
            "US",
            "2024-01-01T00:00:00Z",
            "2025-01-01T00:00:00Z",
        ),
    ]);
    let mapping = mapping_csv(
        STRIPE_MAP_HEADER,
        &[stripe_map_row("card_1", "4242424242424242", "")],
    );
    let (session, summary) = run_to_completion(&subscriber, &mapping, stripe_config())?;

    let result = latest_result(&session, StageName::DatePeriod);
    assert_eq!(result.affected_rows, vec![1, 2]);
    assert_eq!(summary.excluded.get("invalid_date_period"), Some(&2));
    Ok(())
}

#[test]
fn canadian_postal_format_accepts_both_spacings() -> anyhow::Result<()> {
    let subscriber = subscriber_csv(&[
        row("card_1", "nospace@example.com", "A1A1A1", "CA"),
        row("card_2", "spaced@example.com", "A1A 1A1", "CA"),
        row("card_3", "bad@example.com", "A1 A1A", "CA"),
        row("card_4", "digits@example.com", "123456", "CA"),
    ]);
    let mapping = mapping_csv(
        STRIPE_MAP_HEADER,
        &[
            stripe_map_row("card_1", "4242424242424242", ""),
            stripe_map_row("card_2", "5555555555554444", ""),
        ],
    );
    let (session, summary) = run_to_completion(&subscriber, &mapping, stripe_config())?;

    let result = latest_result(&session, StageName::CaPostalFormat);
    assert_eq!(result.affected_rows, vec![2, 3]);
    assert_eq!(summary.imported, 2);
    Ok(())
}

#[test]
fn us_postal_flags_split_autocorrectable_from_hard_failures() -> anyhow::Result<()> {
    let subscriber = subscriber_csv(&[
        row("card_1", "good@example.com", "12345", "US"),
        row("card_2", "shifted@example.com", "1234", "US"),
        row("card_3", "short@example.com", "123", "US"),
        row("card_4", "letters@example.com", "54h13", "US"),
    ]);
    let mapping = mapping_csv(
        STRIPE_MAP_HEADER,
        &[stripe_map_row("card_1", "4242424242424242", "")],
    );
    let mut session =
        MigrationSession::create(subscriber.as_bytes(), mapping.as_bytes(), stripe_config())?;

    match session.run()? {
        Outcome::AwaitingInput(notice) => {
            assert_eq!(notice.stage, StageName::UsPostalFormat);
            assert_eq!(notice.violation_count, 3);
            assert_eq!(notice.remediable_count, 1);
        }
        other => panic!("expected suspension, got {other:?}"),
    }
    Ok(())
}

#[test]
fn bluesnap_tokens_must_be_thirteen_digits() -> anyhow::Result<()> {
    let subscriber = subscriber_csv(&[
        row("1234567890123", "ok@example.com", "12345", "US"),
        row("123456789012", "short@example.com", "12345", "US"),
        row("12345678901234", "long@example.com", "12345", "US"),
        row("ABCDEFGHIJKLM", "letters@example.com", "12345", "US"),
    ]);
    let mapping = mapping_csv(
        BLUESNAP_MAP_HEADER,
        &["900000000,4242424245123,Jane,Doe,12,2030,ntxn_1,10001".to_string()],
    );
    let (session, summary) = run_to_completion(&subscriber, &mapping, bluesnap_config())?;

    let result = latest_result(&session, StageName::CardTokenFormat);
    assert_eq!(result.affected_rows, vec![1, 2, 3]);
    assert_eq!(summary.excluded.get("card_token_format"), Some(&3));
    Ok(())
}

#[test]
fn stripe_has_no_token_format_gate() -> anyhow::Result<()> {
    let subscriber = subscriber_csv(&[row("anything-goes", "ok@example.com", "12345", "US")]);
    let mapping = mapping_csv(
        STRIPE_MAP_HEADER,
        &[stripe_map_row("anything-goes", "4242424242424242", "")],
    );
    let (session, _) = run_to_completion(&subscriber, &mapping, stripe_config())?;
    assert!(latest_result(&session, StageName::CardTokenFormat).valid);
    Ok(())
}
