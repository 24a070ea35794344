//! # Vaultshift
//!
//! A **validation-and-mapping pipeline** for migrating payment-subscription
//! exports (Stripe or BlueSnap) into a billing platform's import format.
//! Vaultshift ingests a subscriber export and a payment-vault mapping file,
//! runs an ordered set of data-quality gates, joins each surviving record to
//! its vault token, flags ambiguous or unsafe records, and emits downloadable
//! CSV artifacts — suspending for an explicit human decision whenever a gate
//! offers a remediation (autocorrect, substitute-from-mapping, proceed
//! anyway, cancel).
//!
//! ## Quick start
//!
//! ```no_run
//! use vaultshift::{Choice, Environment, MigrationConfig, Outcome, Processor, SessionStore};
//! # use anyhow::Result;
//!
//! # fn main() -> Result<()> {
//! let store = SessionStore::default();
//! let cfg = MigrationConfig::new("Acme Corp", "tokenex", Processor::Stripe, Environment::Production);
//!
//! let subscriber = std::fs::File::open("subscribers.csv")?;
//! let mapping = std::fs::File::open("mapping.csv")?;
//!
//! match store.submit(subscriber, mapping, cfg)? {
//!     Outcome::Complete(summary) => {
//!         println!("imported {} of {} rows", summary.imported, summary.total_rows);
//!     }
//!     Outcome::AwaitingInput(notice) => {
//!         // Render notice.violation_count / notice.remediable_count, collect
//!         // the user's decision, then:
//!         store.resume(notice.session, Choice::Autocorrect)?;
//!     }
//!     Outcome::Cancelled { .. } => unreachable!("submit never cancels"),
//! }
//! # Ok(())
//! # }
//! ```
//!
//! ## Core concepts
//!
//! ### Stages
//!
//! Eight blocking gates run in a fixed order (column presence, embargoed
//! countries, date format, date period, missing postal codes, Canadian and US
//! postal formats, card-token format). Each evaluation yields a
//! [`ValidationResult`]; failures are data, never panics or errors. Rows
//! failing a gate with no remediation are excluded from the final import but
//! kept in a per-category report artifact. Gates scan only *surviving* rows,
//! so the exclusion categories partition the excluded set.
//!
//! ### Sessions
//!
//! A [`MigrationSession`] owns one submission's state. When a gate fails and
//! offers a remediation the session suspends, returning a
//! [`SuspensionNotice`]; [`SessionStore::resume`] re-enters at exactly that
//! gate with the user's [`Choice`]. At most one gate is suspended at a time.
//! `proceed_anyway` authorizations stick for the rest of the session.
//!
//! ### Artifacts
//!
//! Every failing or warning category with affected rows produces a CSV report
//! of the complete original rows, named
//! `{seller}_{processor}[_sandbox]_{category}.csv`. Exactly one
//! `final_import` artifact carries the joined, remediated output. Re-running
//! generation on unchanged state is byte-identical, and the `bundle-zip`
//! feature adds a deterministic zip of everything.
//!
//! ### Warnings
//!
//! Duplicate detection (card token, provider card id, subscription id,
//! customer email) runs after the blocking gates and never removes rows. The
//! email dimension is skipped for sandbox runs, whose emails are anonymized
//! to deterministic placeholders before validation begins.
//!
//! ## Feature flags
//!
//! - `bundle-zip` *(default)* - bundle session artifacts into a single zip

pub mod anonymize;
pub mod artifacts;
pub mod config;
pub mod duplicates;
pub mod error;
pub mod mapper;
pub mod provider;
pub mod reader;
pub mod record;
pub mod resolver;
pub mod schema;
pub mod session;
pub mod stages;
pub mod store;

pub use artifacts::{ArtifactInfo, OutputArtifact};
pub use config::{MigrationConfig, Preauthorized};
pub use duplicates::{DuplicateField, DuplicateReport};
pub use error::MigrateError;
pub use mapper::ResolvedCard;
pub use provider::{Environment, Processor};
pub use reader::{SubscriberSet, read_mapping, read_subscribers};
pub use record::{MappingRecord, MappingTable, SubscriberRecord};
pub use schema::{REQUIRED_SUBSCRIBER_COLUMNS, Schema};
pub use session::{
    Choice, MigrationSession, MigrationSummary, Outcome, SessionId, SessionState,
    SuspensionNotice,
};
pub use stages::{RemediationKind, StageKind, StageName, ValidationResult};
pub use store::SessionStore;
