use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::info;

use trl_core::errors::SubmitError;
use trl_core::payload::AssessmentPayload;
use trl_core::traits::CaseBackend;

use super::atomic::atomic_write;
use super::is_valid_case_id;

#[derive(Serialize)]
struct Submission<'a> {
    case_id: &'a str,
    submitted_at: DateTime<Utc>,
    assessment: &'a AssessmentPayload,
}

/// [`CaseBackend`] that drops each submission as
/// `<dir>/<case>.submission.json` for a downstream collector.
pub struct FileOutbox {
    dir: PathBuf,
}

impl FileOutbox {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn submission_path(&self, case_id: &str) -> PathBuf {
        self.dir.join(format!("{case_id}.submission.json"))
    }
}

impl CaseBackend for FileOutbox {
    fn submit(&self, case_id: &str, payload: &AssessmentPayload) -> Result<(), SubmitError> {
        if !is_valid_case_id(case_id) {
            return Err(SubmitError::InvalidCaseId(case_id.to_string()));
        }
        std::fs::create_dir_all(&self.dir).map_err(|e| {
            SubmitError::Unavailable(format!("cannot create {}: {e}", self.dir.display()))
        })?;

        let submission = Submission {
            case_id,
            submitted_at: Utc::now(),
            assessment: payload,
        };
        let json = serde_json::to_string_pretty(&submission)
            .map_err(|e| SubmitError::Unavailable(e.to_string()))?;
        let path = self.submission_path(case_id);
        atomic_write(&path, json.as_bytes())
            .map_err(|e| SubmitError::Unavailable(format!("{e:#}")))?;

        info!(case = case_id, path = %path.display(), "assessment submitted");
        Ok(())
    }
}
