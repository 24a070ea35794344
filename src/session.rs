//! The session/resume controller.
//!
//! A [`MigrationSession`] owns one submission's record collection, validation
//! history, remediation authorizations and generated artifacts, and drives
//! the stage machine:
//!
//! ```text
//! Initial -> Running(stage) -> { Suspended(stage) | Running(next) | Complete | Cancelled }
//! ```
//!
//! Suspension is a request/response boundary, not parallelism: the session
//! returns a [`SuspensionNotice`] and sits idle until [`resume`] re-enters at
//! the exact suspended stage. At most one stage is ever suspended, so the
//! caller always sees the true next bottleneck.
//!
//! [`resume`]: MigrationSession::resume

use crate::anonymize;
use crate::artifacts::{
    self, ArtifactInfo, CATEGORY_FINAL_IMPORT, CATEGORY_NO_TOKEN, OutputArtifact,
};
use crate::config::MigrationConfig;
use crate::duplicates::{self, DuplicateReport};
use crate::error::MigrateError;
use crate::mapper::{self, ResolvedCard};
use crate::provider::{Environment, Processor};
use crate::reader::{self, SubscriberSet};
use crate::record::{MappingTable, SubscriberRecord};
use crate::schema::Schema;
use crate::resolver;
use crate::stages::{self, RemediationKind, StageName, StageScan, ValidationResult};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};
use std::io::Read;
use std::time::Instant;
use tracing::{debug, info, warn};
use uuid::Uuid;

pub type SessionId = Uuid;

/// Remediation instruction supplied on resume.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Choice {
    Autocorrect,
    Substitute,
    ProceedAnyway,
    Cancel,
}

impl Choice {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "autocorrect" => Some(Choice::Autocorrect),
            "substitute" => Some(Choice::Substitute),
            "proceed_anyway" => Some(Choice::ProceedAnyway),
            "cancel" => Some(Choice::Cancel),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Choice::Autocorrect => "autocorrect",
            Choice::Substitute => "substitute",
            Choice::ProceedAnyway => "proceed_anyway",
            Choice::Cancel => "cancel",
        }
    }
}

/// Controller state. `Running` is transient within a `run` call; externally a
/// session is observed as suspended or terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    Initial,
    Running(StageName),
    Suspended(StageName),
    Complete,
    Cancelled,
}

/// What `submit`/`resume` hand back to the caller.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Outcome {
    Complete(MigrationSummary),
    AwaitingInput(SuspensionNotice),
    Cancelled { session: SessionId },
}

/// Structured "user input required" payload: enough to render what failed,
/// how many, what can be fixed, and where the full offending rows live.
#[derive(Debug, Clone, Serialize)]
pub struct SuspensionNotice {
    pub session: SessionId,
    pub stage: StageName,
    pub violation_count: usize,
    /// Autocorrectable or available-from-mapping subset size.
    pub remediable_count: usize,
    pub choices: Vec<Choice>,
    /// Downloadable report of the offending rows.
    pub report: String,
}

/// Terminal success payload.
#[derive(Debug, Clone, Serialize)]
pub struct MigrationSummary {
    pub session: SessionId,
    pub processor: Processor,
    pub environment: Environment,
    pub total_rows: usize,
    pub imported: usize,
    pub no_token_found: usize,
    /// Rows excluded per blocking category. Categories never overlap: a row
    /// is excluded by the earliest stage that failed it.
    pub excluded: BTreeMap<String, usize>,
    /// Violations accepted via proceed-anyway, per category.
    pub accepted: BTreeMap<String, usize>,
    pub duplicate_warnings: Vec<DuplicateReport>,
    pub artifacts: Vec<ArtifactInfo>,
}

enum StageStep {
    Continue,
    Suspend(SuspensionNotice),
}

/// One submission's pipeline state, from ingestion to terminal.
pub struct MigrationSession {
    pub id: SessionId,
    cfg: MigrationConfig,
    /// Clock pinned at creation so re-runs compare against the same instant.
    now: DateTime<Utc>,
    schema: Schema,
    records: Vec<SubscriberRecord>,
    mapping: MappingTable,
    state: SessionState,
    /// Append-only history; the latest entry per stage supersedes earlier
    /// ones.
    results: Vec<ValidationResult>,
    /// Stages accepted via proceed-anyway, for the rest of the session.
    skipped: BTreeSet<StageName>,
    /// Stages whose remediation has been applied.
    applied: BTreeSet<StageName>,
    /// Exclusion partition: row -> the stage that removed it.
    excluded: BTreeMap<u64, StageName>,
    duplicate_reports: Vec<DuplicateReport>,
    resolved: Vec<ResolvedCard>,
    no_token: Vec<u64>,
    artifacts: Vec<OutputArtifact>,
    pub(crate) last_touched: Instant,
}

impl MigrationSession {
    /// Ingest both datasets and set up the session. A bad header is fatal
    /// here (`MigrateError::Schema`); sandbox runs anonymize emails before
    /// any stage sees them.
    pub fn create(
        subscriber: impl Read,
        mapping: impl Read,
        cfg: MigrationConfig,
    ) -> Result<Self, MigrateError> {
        let SubscriberSet {
            schema,
            mut records,
        } = reader::read_subscribers(subscriber)?;
        let mapping = reader::read_mapping(mapping, cfg.processor)?;
        let now = cfg.now.unwrap_or_else(Utc::now);

        if cfg.environment.is_sandbox() {
            anonymize::anonymize_emails(&mut records, &schema);
        }

        let mut skipped = BTreeSet::new();
        if cfg.preauthorized.proceed_without_missing {
            skipped.insert(StageName::MissingPostal);
        }

        let id = Uuid::new_v4();
        info!(
            session = %id,
            processor = %cfg.processor,
            environment = %cfg.environment,
            rows = records.len(),
            "session created"
        );
        Ok(Self {
            id,
            cfg,
            now,
            schema,
            records,
            mapping,
            state: SessionState::Initial,
            // Column validation already passed at ingestion.
            results: vec![ValidationResult::pass(StageName::Columns)],
            skipped,
            applied: BTreeSet::new(),
            excluded: BTreeMap::new(),
            duplicate_reports: Vec::new(),
            resolved: Vec::new(),
            no_token: Vec::new(),
            artifacts: Vec::new(),
            last_touched: Instant::now(),
        })
    }

    /// Drive the pipeline from the current state until it completes or
    /// suspends.
    pub fn run(&mut self) -> Result<Outcome, MigrateError> {
        let start = match self.state {
            SessionState::Initial => 0,
            SessionState::Running(stage) | SessionState::Suspended(stage) => StageName::GATE_ORDER
                .iter()
                .position(|s| *s == stage)
                .unwrap_or(0),
            SessionState::Complete => return Ok(Outcome::Complete(self.summary())),
            SessionState::Cancelled => return Err(MigrateError::Terminal(self.id)),
        };

        for i in start..StageName::GATE_ORDER.len() {
            let stage = StageName::GATE_ORDER[i];
            self.state = SessionState::Running(stage);
            match self.evaluate(stage)? {
                StageStep::Continue => {}
                StageStep::Suspend(notice) => {
                    self.state = SessionState::Suspended(stage);
                    info!(session = %self.id, stage = stage.as_str(), "awaiting user input");
                    return Ok(Outcome::AwaitingInput(notice));
                }
            }
        }

        self.finish()?;
        Ok(Outcome::Complete(self.summary()))
    }

    /// Apply the caller's remediation choice for the suspended stage and
    /// re-run from exactly that stage.
    pub fn resume(&mut self, choice: Choice) -> Result<Outcome, MigrateError> {
        let stage = match self.state {
            SessionState::Suspended(stage) => stage,
            SessionState::Complete | SessionState::Cancelled => {
                return Err(MigrateError::Terminal(self.id));
            }
            _ => return Err(MigrateError::NotSuspended(self.id)),
        };

        match choice {
            Choice::Cancel => {
                warn!(session = %self.id, stage = stage.as_str(), "session cancelled");
                self.state = SessionState::Cancelled;
                return Ok(Outcome::Cancelled { session: self.id });
            }
            Choice::ProceedAnyway => {
                self.skipped.insert(stage);
            }
            Choice::Autocorrect => {
                if stage.remediation() != RemediationKind::Autocorrect {
                    return Err(MigrateError::InvalidChoice {
                        stage: stage.as_str(),
                        choice: choice.as_str(),
                    });
                }
                self.apply_remediation(stage);
            }
            Choice::Substitute => {
                if stage.remediation() != RemediationKind::SubstituteFromMapping {
                    return Err(MigrateError::InvalidChoice {
                        stage: stage.as_str(),
                        choice: choice.as_str(),
                    });
                }
                self.apply_remediation(stage);
            }
        }

        self.state = SessionState::Running(stage);
        self.run()
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Full evaluation history, oldest first.
    pub fn results(&self) -> &[ValidationResult] {
        &self.results
    }

    pub fn artifacts(&self) -> &[OutputArtifact] {
        &self.artifacts
    }

    pub fn artifact(&self, name: &str) -> Option<&OutputArtifact> {
        self.artifacts.iter().find(|a| a.name == name)
    }

    /// Bundle every artifact generated so far into a single deterministic
    /// zip. Returns the bundle name and its bytes.
    #[cfg(feature = "bundle-zip")]
    pub fn bundle(&self) -> Result<(String, Vec<u8>), MigrateError> {
        let bytes = artifacts::bundle(&self.artifacts).map_err(MigrateError::Artifact)?;
        Ok((artifacts::bundle_name(&self.cfg), bytes))
    }

    fn evaluate(&mut self, stage: StageName) -> Result<StageStep, MigrateError> {
        // Pre-authorized remediations apply before the first scan, so the
        // stage never suspends for a choice the caller already made.
        if !self.applied.contains(&stage) && self.preauthorized(stage) {
            self.apply_remediation(stage);
        }

        let scan = self.scan(stage);
        debug!(
            session = %self.id,
            stage = stage.as_str(),
            violations = scan.rows.len(),
            remediable = scan.remediable.len(),
            "stage evaluated"
        );

        if scan.rows.is_empty() {
            self.results.push(ValidationResult::pass(stage));
            return Ok(StageStep::Continue);
        }

        if self.skipped.contains(&stage) {
            // Accepted via proceed-anyway: reported, not excluded.
            let report = self.stage_report(stage.as_str(), &scan.rows)?;
            let result = self.result_for(stage, &scan, true, report);
            self.results.push(result);
            return Ok(StageStep::Continue);
        }

        if stage.remediation() != RemediationKind::None && !self.applied.contains(&stage) {
            let report = self.stage_report(stage.as_str(), &scan.rows)?;
            let result = self.result_for(stage, &scan, false, report.clone());
            self.results.push(result);
            return Ok(StageStep::Suspend(SuspensionNotice {
                session: self.id,
                stage,
                violation_count: scan.rows.len(),
                remediable_count: scan.remediable.len(),
                choices: offered_choices(stage),
                report,
            }));
        }

        // No remediation left: the offending rows join the exclusion
        // partition and the pipeline continues.
        let report = self.stage_report(stage.as_str(), &scan.rows)?;
        for &row in &scan.rows {
            self.excluded.insert(row, stage);
        }
        let result = self.result_for(stage, &scan, false, report);
        self.results.push(result);
        Ok(StageStep::Continue)
    }

    fn result_for(
        &self,
        stage: StageName,
        scan: &StageScan,
        accepted: bool,
        report: String,
    ) -> ValidationResult {
        ValidationResult {
            stage,
            valid: false,
            violation_count: scan.rows.len(),
            affected_rows: scan.rows.clone(),
            remediable_count: scan.remediable.len(),
            remediation: stage.remediation(),
            accepted,
            artifact: Some(report),
        }
    }

    fn preauthorized(&self, stage: StageName) -> bool {
        match stage {
            StageName::UsPostalFormat => self.cfg.preauthorized.autocorrect_us_postal,
            StageName::MissingPostal => self.cfg.preauthorized.use_mapping_postal,
            _ => false,
        }
    }

    fn apply_remediation(&mut self, stage: StageName) {
        match stage.remediation() {
            RemediationKind::Autocorrect => {
                let n = resolver::autocorrect_us_postal(&mut self.records, &self.schema);
                info!(session = %self.id, corrected = n, "US postal autocorrect applied");
            }
            RemediationKind::SubstituteFromMapping => {
                let n = resolver::substitute_postal_from_mapping(
                    &mut self.records,
                    &self.schema,
                    &self.mapping,
                    &self.cfg.postal_required_countries,
                );
                info!(session = %self.id, filled = n, "mapping postal substitution applied");
            }
            RemediationKind::None => {}
        }
        self.applied.insert(stage);
    }

    fn surviving(&self) -> Vec<&SubscriberRecord> {
        self.records
            .iter()
            .filter(|r| !self.excluded.contains_key(&r.row))
            .collect()
    }

    fn scan(&self, stage: StageName) -> StageScan {
        let surviving = self.surviving();
        stages::scan(
            stage,
            &surviving,
            &self.schema,
            &self.mapping,
            &self.cfg,
            self.now,
        )
    }

    /// Join, detect duplicates, and emit final artifacts.
    fn finish(&mut self) -> Result<(), MigrateError> {
        let (outcomes, duplicate_reports) = {
            let surviving = self.surviving();
            (
                mapper::map_records(&surviving, &self.schema, &self.mapping),
                duplicates::detect(
                    &surviving,
                    &self.schema,
                    &self.mapping,
                    self.cfg.processor,
                    self.cfg.environment,
                ),
            )
        };

        if !outcomes.no_token.is_empty() {
            self.stage_report(CATEGORY_NO_TOKEN, &outcomes.no_token)?;
        }
        for report in &duplicate_reports {
            if !report.is_empty() {
                let rows = report.affected_rows.clone();
                let name = artifacts::artifact_name(&self.cfg, report.field.category());
                let bytes = artifacts::rows_report(&self.schema, &self.records, &rows)
                    .map_err(MigrateError::Artifact)?;
                self.put_artifact(OutputArtifact {
                    name,
                    category: report.field.category().to_string(),
                    rows: rows.len(),
                    bytes,
                });
            }
        }

        let name = artifacts::artifact_name(&self.cfg, CATEGORY_FINAL_IMPORT);
        let bytes = artifacts::final_import(
            &self.schema,
            &self.records,
            &outcomes.matched,
            &self.cfg.vault_provider,
        )
        .map_err(MigrateError::Artifact)?;
        self.put_artifact(OutputArtifact {
            name,
            category: CATEGORY_FINAL_IMPORT.to_string(),
            rows: outcomes.matched.len(),
            bytes,
        });

        info!(
            session = %self.id,
            imported = outcomes.matched.len(),
            no_token = outcomes.no_token.len(),
            excluded = self.excluded.len(),
            "migration complete"
        );
        self.no_token = outcomes.no_token;
        self.resolved = outcomes.matched;
        self.duplicate_reports = duplicate_reports;
        self.state = SessionState::Complete;
        Ok(())
    }

    fn stage_report(&mut self, category: &str, rows: &[u64]) -> Result<String, MigrateError> {
        let name = artifacts::artifact_name(&self.cfg, category);
        let bytes = artifacts::rows_report(&self.schema, &self.records, rows)
            .map_err(MigrateError::Artifact)?;
        self.put_artifact(OutputArtifact {
            name: name.clone(),
            category: category.to_string(),
            rows: rows.len(),
            bytes,
        });
        Ok(name)
    }

    /// Artifacts are addressed by name; a re-evaluation's report supersedes
    /// the previous one instead of accumulating.
    fn put_artifact(&mut self, artifact: OutputArtifact) {
        if let Some(existing) = self.artifacts.iter_mut().find(|a| a.name == artifact.name) {
            *existing = artifact;
        } else {
            self.artifacts.push(artifact);
        }
    }

    fn summary(&self) -> MigrationSummary {
        let mut excluded: BTreeMap<String, usize> = BTreeMap::new();
        for stage in self.excluded.values() {
            *excluded.entry(stage.as_str().to_string()).or_default() += 1;
        }

        let mut accepted: BTreeMap<String, usize> = BTreeMap::new();
        for stage in &self.skipped {
            if let Some(result) = self
                .results
                .iter()
                .rev()
                .find(|r| r.stage == *stage && r.accepted)
            {
                accepted.insert(stage.as_str().to_string(), result.violation_count);
            }
        }

        MigrationSummary {
            session: self.id,
            processor: self.cfg.processor,
            environment: self.cfg.environment,
            total_rows: self.records.len(),
            imported: self.resolved.len(),
            no_token_found: self.no_token.len(),
            excluded,
            accepted,
            duplicate_warnings: self.duplicate_reports.clone(),
            artifacts: self.artifacts.iter().map(|a| a.info()).collect(),
        }
    }
}

fn offered_choices(stage: StageName) -> Vec<Choice> {
    let mut choices = match stage.remediation() {
        RemediationKind::Autocorrect => vec![Choice::Autocorrect],
        RemediationKind::SubstituteFromMapping => vec![Choice::Substitute],
        RemediationKind::None => Vec::new(),
    };
    choices.push(Choice::ProceedAnyway);
    choices.push(Choice::Cancel);
    choices
}
