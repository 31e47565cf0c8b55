use crate::types::{CriterionId, CriterionKey, EvidenceKey, QuestionIndex, TrlLevel};

/// Rejected session transition. The session is left untouched when one of
/// these is returned.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SessionError {
    #[error("question {question} has not been reached (current: {})", current_label(.current))]
    QuestionNotReached {
        question: QuestionIndex,
        current: Option<QuestionIndex>,
    },
    #[error("no checklist is open to evaluate")]
    NothingToEvaluate,
    #[error("{0} checklist is not open")]
    LevelNotOpen(TrlLevel),
    #[error("{level} has no criterion {id}")]
    UnknownCriterion { level: TrlLevel, id: CriterionId },
    #[error(transparent)]
    Evidence(#[from] EvidenceError),
    #[error("session invariant violated: {0}")]
    Corrupt(String),
}

fn current_label(current: &Option<QuestionIndex>) -> String {
    match current {
        Some(q) => q.to_string(),
        None => "none, gating finished".to_string(),
    }
}

/// Evidence attach/detach precondition failure.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EvidenceError {
    #[error("{0} has not been answered")]
    NotAnswered(QuestionIndex),
    #[error("{0} was answered no; evidence only attaches to affirmative answers")]
    NotAffirmed(QuestionIndex),
    #[error("{0} checklist is not open")]
    LevelNotOpen(TrlLevel),
    #[error("criterion {0} is not checked")]
    CriterionNotChecked(CriterionKey),
    #[error("no evidence attached to {0}")]
    NothingAttached(EvidenceKey),
}

#[derive(Debug, thiserror::Error)]
pub enum AuditError {
    #[error("write failure: {0}")]
    WriteFailure(String),
    #[error("chain corruption at entry {0}")]
    ChainCorruption(u64),
}

#[derive(Debug, thiserror::Error)]
pub enum SubmitError {
    #[error("case id '{0}' is not a valid file name")]
    InvalidCaseId(String),
    #[error("backend unavailable: {0}")]
    Unavailable(String),
}
