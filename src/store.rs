//! Keyed, isolated session registry — the Submit/Continue/Download surface.
//!
//! Each submission gets its own [`MigrationSession`]; sessions never share
//! mutable state. Completed sessions stay resident until the inactivity bound
//! so their artifacts remain downloadable; cancelled sessions are dropped
//! immediately. A sweep runs on every access, so the registry cannot grow
//! unbounded.

use crate::config::MigrationConfig;
use crate::error::MigrateError;
use crate::session::{Choice, MigrationSession, Outcome, SessionId, SessionState};
use std::collections::HashMap;
use std::io::Read;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tracing::debug;

const DEFAULT_TTL: Duration = Duration::from_secs(30 * 60);

/// Thread-safe registry of in-flight sessions.
#[derive(Clone)]
pub struct SessionStore {
    inner: Arc<Mutex<HashMap<SessionId, MigrationSession>>>,
    ttl: Duration,
}

impl Default for SessionStore {
    fn default() -> Self {
        Self::new(DEFAULT_TTL)
    }
}

impl SessionStore {
    pub fn new(ttl: Duration) -> Self {
        Self {
            inner: Arc::new(Mutex::new(HashMap::new())),
            ttl,
        }
    }

    /// Ingest two datasets and run the pipeline until it completes or
    /// suspends. The session is registered either way, so a suspension can be
    /// resumed and a completed run's artifacts can be downloaded.
    pub fn submit(
        &self,
        subscriber: impl Read,
        mapping: impl Read,
        cfg: MigrationConfig,
    ) -> Result<Outcome, MigrateError> {
        let mut session = MigrationSession::create(subscriber, mapping, cfg)?;
        let outcome = session.run()?;
        let id = session.id;

        let mut sessions = self.inner.lock().unwrap();
        sweep(&mut sessions, self.ttl);
        sessions.insert(id, session);
        Ok(outcome)
    }

    /// Forward a remediation choice to the suspended stage of one session.
    pub fn resume(&self, id: SessionId, choice: Choice) -> Result<Outcome, MigrateError> {
        let mut sessions = self.inner.lock().unwrap();
        sweep(&mut sessions, self.ttl);
        let session = sessions.get_mut(&id).ok_or(MigrateError::UnknownSession(id))?;
        session.last_touched = Instant::now();
        let outcome = session.resume(choice)?;
        if session.state() == SessionState::Cancelled {
            sessions.remove(&id);
        }
        Ok(outcome)
    }

    /// Bytes of a named artifact.
    pub fn download(&self, id: SessionId, name: &str) -> Result<Vec<u8>, MigrateError> {
        let mut sessions = self.inner.lock().unwrap();
        sweep(&mut sessions, self.ttl);
        let session = sessions.get_mut(&id).ok_or(MigrateError::UnknownSession(id))?;
        session.last_touched = Instant::now();
        session
            .artifact(name)
            .map(|a| a.bytes.clone())
            .ok_or_else(|| MigrateError::UnknownArtifact(name.to_string()))
    }

    /// Deterministic zip of every artifact in one session. Returns the
    /// bundle name and bytes.
    #[cfg(feature = "bundle-zip")]
    pub fn bundle(&self, id: SessionId) -> Result<(String, Vec<u8>), MigrateError> {
        let mut sessions = self.inner.lock().unwrap();
        sweep(&mut sessions, self.ttl);
        let session = sessions.get_mut(&id).ok_or(MigrateError::UnknownSession(id))?;
        session.last_touched = Instant::now();
        session.bundle()
    }

    /// Number of resident sessions (post-sweep).
    pub fn len(&self) -> usize {
        let mut sessions = self.inner.lock().unwrap();
        sweep(&mut sessions, self.ttl);
        sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn sweep(sessions: &mut HashMap<SessionId, MigrationSession>, ttl: Duration) {
    let before = sessions.len();
    sessions.retain(|_, s| s.last_touched.elapsed() <= ttl);
    let evicted = before - sessions.len();
    if evicted > 0 {
        debug!(evicted, "expired sessions evicted");
    }
}
