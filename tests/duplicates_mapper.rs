mod common;

use common::*;
use vaultshift::{
    DuplicateField, Environment, MigrationConfig, Outcome, Processor, SessionStore, StageKind,
    StageName,
};

fn sandbox_config() -> MigrationConfig {
    MigrationConfig::new("Acme Corp", "tokenex", Processor::Stripe, Environment::Sandbox)
        .with_now(fixed_now())
}

#[test]
fn duplicate_card_tokens_are_reported_but_all_import() -> anyhow::Result<()> {
    let store = SessionStore::default();
    let subscriber = subscriber_csv(&[
        row("card_1", "first@example.com", "12345", "US"),
        row("card_1", "second@example.com", "12345", "US"),
        row("card_2", "third@example.com", "12345", "US"),
    ]);
    let mapping = mapping_csv(
        STRIPE_MAP_HEADER,
        &[
            stripe_map_row("card_1", "4242424242424242", ""),
            stripe_map_row("card_2", "5555555555554444", ""),
        ],
    );

    let summary = match store.submit(subscriber.as_bytes(), mapping.as_bytes(), stripe_config())? {
        Outcome::Complete(summary) => summary,
        other => panic!("expected completion, got {other:?}"),
    };

    // Warnings never shrink the import.
    assert_eq!(summary.imported, 3);

    let token_report = summary
        .duplicate_warnings
        .iter()
        .find(|r| r.field == DuplicateField::CardToken)
        .expect("card token dimension always runs");
    assert_eq!(token_report.groups, vec![vec![0, 1]]);
    assert_eq!(token_report.affected_rows, vec![0, 1]);
    assert_eq!(token_report.kind(), StageKind::Warning);
    assert_eq!(StageName::CardTokenFormat.kind(), StageKind::Blocking);

    // Stripe additionally reports the same column as the provider card id.
    assert!(
        summary
            .duplicate_warnings
            .iter()
            .any(|r| r.field == DuplicateField::CardId && !r.is_empty())
    );

    // The report artifact carries both complete offending rows.
    let bytes = store.download(summary.session, "Acme_Corp_stripe_duplicate_card_token.csv")?;
    let body = String::from_utf8(bytes)?;
    assert!(body.contains("first@example.com"));
    assert!(body.contains("second@example.com"));
    assert!(!body.contains("third@example.com"));
    Ok(())
}

#[test]
fn shared_vault_tokens_are_detected_across_distinct_card_ids() -> anyhow::Result<()> {
    let store = SessionStore::default();
    // Two different provider card ids resolving to the same card number: the
    // token dimension must flag them even though the raw column values differ.
    let subscriber = subscriber_csv(&[
        row("card_a", "first@example.com", "12345", "US"),
        row("card_b", "second@example.com", "12345", "US"),
    ]);
    let mapping = mapping_csv(
        STRIPE_MAP_HEADER,
        &[
            stripe_map_row("card_a", "4242424242424242", ""),
            stripe_map_row("card_b", "4242424242424242", ""),
        ],
    );

    let summary = match store.submit(subscriber.as_bytes(), mapping.as_bytes(), stripe_config())? {
        Outcome::Complete(summary) => summary,
        other => panic!("expected completion, got {other:?}"),
    };
    assert_eq!(summary.imported, 2);

    let token_report = summary
        .duplicate_warnings
        .iter()
        .find(|r| r.field == DuplicateField::CardToken)
        .expect("card token dimension always runs");
    assert_eq!(token_report.affected_rows, vec![0, 1]);

    // The raw card ids are distinct, so that dimension stays clean.
    let card_id_report = summary
        .duplicate_warnings
        .iter()
        .find(|r| r.field == DuplicateField::CardId)
        .expect("card id dimension runs for this processor");
    assert!(card_id_report.is_empty());
    Ok(())
}

#[test]
fn duplicate_emails_are_reported_in_production_only() -> anyhow::Result<()> {
    let store = SessionStore::default();
    let subscriber = subscriber_csv(&[
        "card_1,2024-01-01T00:00:00Z,2030-01-01T00:00:00Z,shared@example.com,Jane Doe,cus_1,sub_1,12345,US".to_string(),
        "card_2,2024-01-01T00:00:00Z,2030-01-01T00:00:00Z,shared@example.com,Jane Doe,cus_2,sub_2,12345,US".to_string(),
    ]);
    let mapping = mapping_csv(
        STRIPE_MAP_HEADER,
        &[
            stripe_map_row("card_1", "4242424242424242", ""),
            stripe_map_row("card_2", "5555555555554444", ""),
        ],
    );

    let production = match store.submit(subscriber.as_bytes(), mapping.as_bytes(), stripe_config())?
    {
        Outcome::Complete(summary) => summary,
        other => panic!("expected completion, got {other:?}"),
    };
    let email_report = production
        .duplicate_warnings
        .iter()
        .find(|r| r.field == DuplicateField::CustomerEmail)
        .expect("email dimension runs in production");
    assert_eq!(email_report.affected_rows, vec![0, 1]);

    // Sandbox anonymizes emails before validation, so the dimension is
    // skipped outright rather than reporting placeholder noise.
    let sandbox = match store.submit(subscriber.as_bytes(), mapping.as_bytes(), sandbox_config())? {
        Outcome::Complete(summary) => summary,
        other => panic!("expected completion, got {other:?}"),
    };
    assert!(
        !sandbox
            .duplicate_warnings
            .iter()
            .any(|r| r.field == DuplicateField::CustomerEmail)
    );
    Ok(())
}

#[test]
fn sandbox_runs_replace_emails_with_placeholders() -> anyhow::Result<()> {
    let store = SessionStore::default();
    let subscriber = subscriber_csv(&[row("card_1", "real.person@example.com", "12345", "US")]);
    let mapping = mapping_csv(
        STRIPE_MAP_HEADER,
        &[stripe_map_row("card_1", "4242424242424242", "")],
    );

    let summary = match store.submit(subscriber.as_bytes(), mapping.as_bytes(), sandbox_config())? {
        Outcome::Complete(summary) => summary,
        other => panic!("expected completion, got {other:?}"),
    };
    let bytes = store.download(summary.session, "Acme_Corp_stripe_sandbox_final_import.csv")?;
    let body = String::from_utf8(bytes)?;
    assert!(!body.contains("real.person@example.com"));
    assert!(body.contains("blackhole+"));
    Ok(())
}

#[test]
fn unmatched_and_ambiguous_keys_land_in_no_token_found() -> anyhow::Result<()> {
    let store = SessionStore::default();
    let subscriber = subscriber_csv(&[
        row("card_ok", "ok@example.com", "12345", "US"),
        row("card_missing", "missing@example.com", "12345", "US"),
        row("card_dup", "ambiguous@example.com", "12345", "US"),
    ]);
    let mapping = mapping_csv(
        STRIPE_MAP_HEADER,
        &[
            stripe_map_row("card_ok", "4242424242424242", ""),
            stripe_map_row("card_dup", "5555555555554444", ""),
            stripe_map_row("card_dup", "378282246310005", ""),
        ],
    );

    let summary = match store.submit(subscriber.as_bytes(), mapping.as_bytes(), stripe_config())? {
        Outcome::Complete(summary) => summary,
        other => panic!("expected completion, got {other:?}"),
    };
    assert_eq!(summary.imported, 1);
    assert_eq!(summary.no_token_found, 2);

    let bytes = store.download(summary.session, "Acme_Corp_stripe_no_token_found.csv")?;
    let body = String::from_utf8(bytes)?;
    assert!(body.contains("missing@example.com"));
    assert!(body.contains("ambiguous@example.com"));
    assert!(!body.contains("ok@example.com"));
    Ok(())
}

#[test]
fn empty_emails_pass_through_without_warnings() -> anyhow::Result<()> {
    let store = SessionStore::default();
    let subscriber = subscriber_csv(&[
        row("card_1", "", "12345", "US"),
        row("card_2", "", "12345", "US"),
    ]);
    let mapping = mapping_csv(
        STRIPE_MAP_HEADER,
        &[
            stripe_map_row("card_1", "4242424242424242", ""),
            stripe_map_row("card_2", "5555555555554444", ""),
        ],
    );

    let summary = match store.submit(subscriber.as_bytes(), mapping.as_bytes(), stripe_config())? {
        Outcome::Complete(summary) => summary,
        other => panic!("expected completion, got {other:?}"),
    };
    // Blank emails are kept, reach the final import, and never group in the
    // email dimension.
    assert_eq!(summary.imported, 2);
    let email_report = summary
        .duplicate_warnings
        .iter()
        .find(|r| r.field == DuplicateField::CustomerEmail)
        .expect("email dimension runs in production");
    assert!(email_report.is_empty());
    Ok(())
}

#[test]
fn missing_mapping_holder_name_falls_back_to_the_subscriber() -> anyhow::Result<()> {
    let store = SessionStore::default();
    let subscriber = subscriber_csv(&[row("card_1", "ok@example.com", "12345", "US")]);
    // Mapping row with no cardholder name.
    let mapping = mapping_csv(
        STRIPE_MAP_HEADER,
        &["card_1,4242424242424242,,12,2030,ntxn_1,".to_string()],
    );

    let summary = match store.submit(subscriber.as_bytes(), mapping.as_bytes(), stripe_config())? {
        Outcome::Complete(summary) => summary,
        other => panic!("expected completion, got {other:?}"),
    };
    let bytes = store.download(summary.session, "Acme_Corp_stripe_final_import.csv")?;
    let body = String::from_utf8(bytes)?;
    assert!(body.contains("Jane Doe"));
    Ok(())
}
