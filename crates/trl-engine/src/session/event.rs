use serde::{Deserialize, Serialize};

use trl_core::errors::SessionError;
use trl_core::state::Transition;
use trl_core::types::{CriterionId, CriterionKey, EvidenceKey, EvidenceRef, QuestionIndex, TrlLevel};

use super::controller::AssessmentSession;

/// A single user action, as dispatched by a UI or read from a script.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum SessionEvent {
    Answer {
        question: QuestionIndex,
        value: bool,
    },
    SetCriterion {
        level: TrlLevel,
        criterion: CriterionId,
        checked: bool,
    },
    Toggle {
        level: TrlLevel,
        criterion: CriterionId,
    },
    Evaluate,
    AttachEvidence {
        target: EvidenceKey,
        evidence: EvidenceRef,
    },
    DetachEvidence {
        target: EvidenceKey,
    },
}

fn criterion_key(level: TrlLevel, id: CriterionId) -> Result<CriterionKey, SessionError> {
    CriterionKey::new(level, id).ok_or(SessionError::UnknownCriterion { level, id })
}

impl AssessmentSession {
    /// Dispatch one event to the matching transition.
    pub fn apply(&mut self, event: &SessionEvent) -> Result<Transition, SessionError> {
        match event {
            SessionEvent::Answer { question, value } => self.answer(*question, *value),
            SessionEvent::SetCriterion {
                level,
                criterion,
                checked,
            } => self.set_criterion(criterion_key(*level, *criterion)?, *checked),
            SessionEvent::Toggle { level, criterion } => {
                self.toggle(criterion_key(*level, *criterion)?)
            }
            SessionEvent::Evaluate => self.evaluate(),
            SessionEvent::AttachEvidence { target, evidence } => {
                self.attach_evidence(*target, evidence.clone())
            }
            SessionEvent::DetachEvidence { target } => self.detach_evidence(*target),
        }
    }
}

/// Outcome of one scripted event.
#[derive(Debug, Clone, Serialize)]
pub struct ReplayEntry {
    pub index: usize,
    pub event: SessionEvent,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub transition: Option<Transition>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rejected: Option<String>,
}

/// Apply `events` to a fresh session.
///
/// Rejected events are recorded and skipped, mirroring a UI that ignores a
/// disabled control.
pub fn replay(events: &[SessionEvent]) -> (AssessmentSession, Vec<ReplayEntry>) {
    let mut session = AssessmentSession::new();
    let log = events
        .iter()
        .enumerate()
        .map(|(index, event)| {
            let (transition, rejected) = match session.apply(event) {
                Ok(t) => (Some(t), None),
                Err(e) => (None, Some(e.to_string())),
            };
            ReplayEntry {
                index,
                event: event.clone(),
                transition,
                rejected,
            }
        })
        .collect();
    (session, log)
}
