use serde::{Deserialize, Serialize};

use crate::types::{CriterionKey, EvidenceKey, EvidenceRef, QuestionIndex, TrlLevel};

/// A recorded response to a gating question.
///
/// Evidence for the answer is held by the session's evidence tracker under
/// [`EvidenceKey::Gating`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct GatingAnswer {
    pub question: QuestionIndex,
    pub value: bool,
}

/// Where the assessment currently stands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "phase", rename_all = "snake_case")]
pub enum SessionPhase {
    Gating { question: QuestionIndex },
    ChecklistOpen { level: TrlLevel },
    Resolved { level: TrlLevel },
}

/// Result of the most recent evaluation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Outcome {
    #[default]
    Pending,
    Resolved { level: TrlLevel },
    /// Level 1 was evaluated while incomplete; there is no lower checklist.
    FloorReached,
}

/// Host-facing view of the outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct AssessmentResult {
    /// 0 while unresolved.
    pub trl_level: u8,
    pub resolved: bool,
    pub floor_reached: bool,
}

impl From<Outcome> for AssessmentResult {
    fn from(outcome: Outcome) -> Self {
        match outcome {
            Outcome::Pending => Self {
                trl_level: 0,
                resolved: false,
                floor_reached: false,
            },
            Outcome::Resolved { level } => Self {
                trl_level: level.get(),
                resolved: true,
                floor_reached: false,
            },
            Outcome::FloorReached => Self {
                trl_level: 0,
                resolved: false,
                floor_reached: true,
            },
        }
    }
}

/// State discarded by a rollback.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rollback {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub answers: Vec<QuestionIndex>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub levels: Vec<TrlLevel>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub evidence: Vec<EvidenceKey>,
    /// A resolution or floor outcome was reset.
    #[serde(default)]
    pub outcome_reset: bool,
}

impl Rollback {
    pub fn is_empty(&self) -> bool {
        self.answers.is_empty()
            && self.levels.is_empty()
            && self.evidence.is_empty()
            && !self.outcome_reset
    }
}

/// What a single session operation did.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Transition {
    /// The operation repeated the current state.
    Unchanged,
    NextQuestion {
        answered: QuestionIndex,
        value: bool,
        next: QuestionIndex,
        rollback: Rollback,
    },
    ChecklistOpened {
        answered: QuestionIndex,
        value: bool,
        level: TrlLevel,
        rollback: Rollback,
    },
    CriterionSet {
        criterion: CriterionKey,
        checked: bool,
        complete: bool,
        rollback: Rollback,
    },
    Descended {
        from: TrlLevel,
        to: TrlLevel,
    },
    Resolved {
        level: TrlLevel,
    },
    FloorReached,
    EvidenceAttached {
        target: EvidenceKey,
        evidence: EvidenceRef,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        replaced: Option<EvidenceRef>,
    },
    EvidenceDetached {
        target: EvidenceKey,
        evidence: EvidenceRef,
    },
}

impl Transition {
    /// Audit event name, mirrored by [`crate::config::AuditConfig`].
    pub fn kind(&self) -> &'static str {
        match self {
            Transition::Unchanged => "unchanged",
            Transition::NextQuestion { .. } => "next_question",
            Transition::ChecklistOpened { .. } => "checklist_opened",
            Transition::CriterionSet { .. } => "criterion_set",
            Transition::Descended { .. } => "descended",
            Transition::Resolved { .. } => "resolved",
            Transition::FloorReached => "floor_reached",
            Transition::EvidenceAttached { .. } => "evidence_attached",
            Transition::EvidenceDetached { .. } => "evidence_detached",
        }
    }

    /// The rollback carried by this transition, if any state was discarded.
    pub fn rollback(&self) -> Option<&Rollback> {
        match self {
            Transition::NextQuestion { rollback, .. }
            | Transition::ChecklistOpened { rollback, .. }
            | Transition::CriterionSet { rollback, .. } => {
                (!rollback.is_empty()).then_some(rollback)
            }
            _ => None,
        }
    }
}
