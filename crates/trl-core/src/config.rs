use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

/// Workspace config file, relative to the working directory.
pub const CONFIG_PATH: &str = ".trl/config.json";

/// Default directory for session, audit and submission files.
pub const DEFAULT_SESSION_DIR: &str = ".trl/sessions";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkspaceConfig {
    #[serde(default = "default_session_dir")]
    pub session_dir: PathBuf,

    #[serde(default)]
    pub audit: AuditConfig,
}

impl Default for WorkspaceConfig {
    fn default() -> Self {
        Self {
            session_dir: default_session_dir(),
            audit: AuditConfig::default(),
        }
    }
}

fn default_session_dir() -> PathBuf {
    PathBuf::from(DEFAULT_SESSION_DIR)
}

/// Which transitions reach the audit trail.
///
/// Gating answers, evaluations and rollbacks are always recorded while
/// auditing is enabled.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,

    #[serde(default = "default_true")]
    pub log_criteria: bool,

    #[serde(default = "default_true")]
    pub log_evidence: bool,
}

impl Default for AuditConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            log_criteria: true,
            log_evidence: true,
        }
    }
}

fn default_true() -> bool {
    true
}

impl AuditConfig {
    /// Whether a transition of this kind (see `Transition::kind`) should be
    /// appended. `rolled_back` marks transitions that discarded state.
    pub fn should_audit(&self, kind: &str, rolled_back: bool) -> bool {
        if !self.enabled {
            return false;
        }
        if rolled_back {
            return true;
        }
        match kind {
            "unchanged" => false,
            "criterion_set" => self.log_criteria,
            "evidence_attached" | "evidence_detached" => self.log_evidence,
            _ => true,
        }
    }
}

/// Load the workspace config from `root/.trl/config.json`.
///
/// A missing file yields the defaults; an unreadable or malformed one is an
/// error.
pub fn load_workspace_config(root: &Path) -> Result<WorkspaceConfig> {
    let path = root.join(CONFIG_PATH);
    if !path.exists() {
        return Ok(WorkspaceConfig::default());
    }
    let content = std::fs::read_to_string(&path)
        .with_context(|| format!("cannot read config {}", path.display()))?;
    serde_json::from_str(&content)
        .with_context(|| format!("{}: invalid config JSON", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_config_is_default() {
        let dir = tempfile::tempdir().unwrap();
        let config = load_workspace_config(dir.path()).unwrap();
        assert_eq!(config, WorkspaceConfig::default());
        assert_eq!(config.session_dir, PathBuf::from(".trl/sessions"));
    }

    #[test]
    fn partial_config_fills_defaults() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join(".trl")).unwrap();
        std::fs::write(
            dir.path().join(CONFIG_PATH),
            r#"{"audit": {"log_criteria": false}}"#,
        )
        .unwrap();

        let config = load_workspace_config(dir.path()).unwrap();
        assert_eq!(config.session_dir, PathBuf::from(DEFAULT_SESSION_DIR));
        assert!(config.audit.enabled);
        assert!(!config.audit.log_criteria);
        assert!(config.audit.log_evidence);
    }

    #[test]
    fn malformed_config_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join(".trl")).unwrap();
        std::fs::write(dir.path().join(CONFIG_PATH), "{not json").unwrap();
        let err = load_workspace_config(dir.path()).unwrap_err();
        assert!(err.to_string().contains("invalid config JSON"));
    }

    #[test]
    fn should_audit_respects_config() {
        let config = AuditConfig {
            enabled: true,
            log_criteria: false,
            log_evidence: true,
        };
        assert!(config.should_audit("resolved", false));
        assert!(!config.should_audit("criterion_set", false));
        // Rollbacks are always recorded.
        assert!(config.should_audit("criterion_set", true));
        assert!(config.should_audit("evidence_detached", false));
        assert!(!config.should_audit("unchanged", false));
    }

    #[test]
    fn disabled_audit_records_nothing() {
        let config = AuditConfig {
            enabled: false,
            ..AuditConfig::default()
        };
        assert!(!config.should_audit("resolved", true));
    }
}
