use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use trl_core::config::AuditConfig;
use trl_core::state::Transition;
use trl_core::traits::{AuditRecord, AuditSink};

use super::atomic::{atomic_write, SessionLock};
use super::audit_log::JsonlAuditSink;
use super::is_valid_case_id;
use crate::session::{AssessmentSession, SessionEvent};

/// On-disk envelope of one case.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionFile {
    pub case_id: String,
    /// Bumped on every transition that changes the session.
    pub state_rev: u64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub session: AssessmentSession,
}

impl SessionFile {
    pub fn new(case_id: &str) -> Self {
        let now = Utc::now();
        Self {
            case_id: case_id.to_string(),
            state_rev: 0,
            created_at: now,
            updated_at: now,
            session: AssessmentSession::new(),
        }
    }
}

/// A transition applied to a stored case.
#[derive(Debug, Clone)]
pub struct Applied {
    pub file: SessionFile,
    pub transition: Transition,
}

/// Directory of `<case>.session.json` files with their audit logs.
///
/// Every mutation runs lock, load, transition, atomic write, audit, unlock.
/// Audit failures are logged and never fail the transition.
pub struct SessionStore {
    dir: PathBuf,
    audit: AuditConfig,
}

impl SessionStore {
    pub fn new(dir: impl Into<PathBuf>, audit: AuditConfig) -> Self {
        Self {
            dir: dir.into(),
            audit,
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn session_path(&self, case_id: &str) -> Result<PathBuf> {
        if !is_valid_case_id(case_id) {
            bail!("invalid case id '{case_id}' (use letters, digits, '-', '_' or '.')");
        }
        Ok(self.dir.join(format!("{case_id}.session.json")))
    }

    pub fn audit_path(&self, case_id: &str) -> Result<PathBuf> {
        if !is_valid_case_id(case_id) {
            bail!("invalid case id '{case_id}'");
        }
        Ok(self.dir.join(format!("{case_id}.audit.jsonl")))
    }

    /// Create an empty session, refusing to clobber one unless `force`.
    pub fn create(&self, case_id: &str, force: bool) -> Result<SessionFile> {
        let path = self.session_path(case_id)?;
        std::fs::create_dir_all(&self.dir)
            .with_context(|| format!("cannot create {}", self.dir.display()))?;
        let lock = SessionLock::acquire(&path)?;
        if path.exists() && !force {
            bail!(
                "session '{case_id}' already exists at {} (use --force to replace it)",
                path.display()
            );
        }

        let file = SessionFile::new(case_id);
        write_file(&path, &file)?;
        lock.release()?;
        debug!(case = case_id, path = %path.display(), "session created");
        Ok(file)
    }

    /// Load and validate a stored session.
    pub fn load(&self, case_id: &str) -> Result<SessionFile> {
        let path = self.session_path(case_id)?;
        read_file(&path, case_id)
    }

    /// Apply one event to a stored session and persist the result.
    ///
    /// `Unchanged` transitions leave the file and the audit log untouched.
    pub fn apply(&self, case_id: &str, event: &SessionEvent) -> Result<Applied> {
        let path = self.session_path(case_id)?;
        let lock = SessionLock::acquire(&path)?;
        let mut file = read_file(&path, case_id)?;

        let transition = file.session.apply(event)?;
        if transition == Transition::Unchanged {
            lock.release()?;
            return Ok(Applied { file, transition });
        }

        file.state_rev += 1;
        file.updated_at = Utc::now();
        write_file(&path, &file)?;
        self.audit(&file, &transition);
        lock.release()?;

        Ok(Applied { file, transition })
    }

    fn audit(&self, file: &SessionFile, transition: &Transition) {
        if !self
            .audit
            .should_audit(transition.kind(), transition.rollback().is_some())
        {
            return;
        }
        let path = match self.audit_path(&file.case_id) {
            Ok(path) => path,
            Err(e) => {
                warn!(case = %file.case_id, error = %e, "audit skipped");
                return;
            }
        };
        let record = AuditRecord::new(
            &file.case_id,
            file.state_rev,
            transition.clone(),
            file.session.result(),
        );
        if let Err(e) = JsonlAuditSink::new(path).record(&record) {
            warn!(case = %file.case_id, error = %e, "audit write failed");
        }
    }
}

fn read_file(path: &Path, case_id: &str) -> Result<SessionFile> {
    if !path.exists() {
        bail!("no session '{case_id}' (run `trl new {case_id}` first)");
    }
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("cannot read {}", path.display()))?;
    let file: SessionFile = serde_json::from_str(&content)
        .with_context(|| format!("invalid session JSON in {}", path.display()))?;
    if file.case_id != case_id {
        bail!(
            "{} belongs to case '{}', not '{case_id}'",
            path.display(),
            file.case_id
        );
    }
    file.session
        .check_invariants()
        .with_context(|| format!("rejecting {}", path.display()))?;
    Ok(file)
}

fn write_file(path: &Path, file: &SessionFile) -> Result<()> {
    let json = serde_json::to_string_pretty(file)?;
    atomic_write(path, json.as_bytes())
}
