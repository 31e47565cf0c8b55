use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::errors::{AuditError, SubmitError};
use crate::payload::AssessmentPayload;
use crate::state::{AssessmentResult, Transition};

/// One line of the audit trail.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditRecord {
    pub case_id: String,
    pub event_type: String,
    pub state_rev: u64,
    pub transition: Transition,
    pub trl_level: u8,
    pub resolved: bool,
    pub ts: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub prev_hash: Option<String>,
}

impl AuditRecord {
    pub fn new(
        case_id: &str,
        state_rev: u64,
        transition: Transition,
        result: AssessmentResult,
    ) -> Self {
        Self {
            case_id: case_id.to_string(),
            event_type: transition.kind().to_string(),
            state_rev,
            transition,
            trl_level: result.trl_level,
            resolved: result.resolved,
            ts: Utc::now(),
            prev_hash: None,
        }
    }
}

/// Receives audit records for persistence.
pub trait AuditSink {
    fn record(&self, entry: &AuditRecord) -> Result<(), AuditError>;
}

/// The case-record backend that accepts a finished assessment.
pub trait CaseBackend {
    fn submit(&self, case_id: &str, payload: &AssessmentPayload) -> Result<(), SubmitError>;
}
