use trl_core::errors::SessionError;
use trl_core::state::Outcome;
use trl_core::types::{EvidenceKey, GatingOutcome, TrlLevel};

use super::controller::AssessmentSession;
use crate::gating::table::walk;

impl AssessmentSession {
    /// Verify the structural invariants of a session.
    ///
    /// Transitions preserve these by construction; the check exists for
    /// sessions that arrive from outside (files, scripts, fuzzers).
    pub fn check_invariants(&self) -> Result<(), SessionError> {
        check(self).map_err(SessionError::Corrupt)
    }
}

fn check(session: &AssessmentSession) -> Result<(), String> {
    // Answers follow the routing table from question 0.
    let values: Vec<bool> = session.answers().iter().map(|a| a.value).collect();
    let walked = walk(&values).ok_or("answers continue after gating finished")?;
    for (answer, (asked, _)) in session.answers().iter().zip(&walked) {
        if *asked != answer.question {
            return Err(format!(
                "answer to {} is off the routing path",
                answer.question
            ));
        }
    }
    let start_level: Option<TrlLevel> = match walked.last() {
        Some((_, GatingOutcome::StartLevel(level))) => Some(*level),
        _ => None,
    };

    // Steps start at the routed level and descend one level at a time.
    let levels = session.steps().levels();
    match (start_level, levels.first()) {
        (None, None) => {}
        (Some(start), Some(&first)) if start == first => {}
        (Some(start), None) => {
            return Err(format!("gating routed to {start} but no checklist is open"))
        }
        (_, Some(first)) => {
            return Err(format!("checklist {first} does not match gating route"))
        }
    }
    for pair in levels.windows(2) {
        if pair[0].below() != Some(pair[1]) {
            return Err(format!("{} does not follow {}", pair[1], pair[0]));
        }
    }

    let steps: Vec<_> = session.steps().iter().collect();
    for step in &steps {
        if !step.has_catalog_shape() {
            return Err(format!("{} indicators do not match its checklist", step.level));
        }
    }
    // Only an incomplete step can have been descended from.
    if let Some((_, earlier)) = steps.split_last() {
        if let Some(step) = earlier.iter().find(|s| s.is_complete()) {
            return Err(format!(
                "{} is complete but a lower checklist is open",
                step.level
            ));
        }
    }

    let current = session.steps().current();
    match session.outcome() {
        Outcome::Pending => {}
        Outcome::Resolved { level } => match current {
            Some(step) if step.level == level && step.is_complete() => {}
            _ => return Err(format!("resolved at {level} without a complete current step")),
        },
        Outcome::FloorReached => match current {
            Some(step) if step.level.is_floor() && !step.is_complete() => {}
            _ => return Err("floor reached without an incomplete TRL 1 step".to_string()),
        },
    }

    for (key, _) in session.evidence().iter() {
        let live = match key {
            EvidenceKey::Gating(q) => session.answer_for(q) == Some(true),
            EvidenceKey::Criterion(c) => session
                .step(c.level())
                .is_some_and(|s| s.is_checked(c.id())),
        };
        if !live {
            return Err(format!("stale evidence attached to {key}"));
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_session_is_valid() {
        assert!(AssessmentSession::new().check_invariants().is_ok());
    }

    #[test]
    fn off_path_answer_is_detected() {
        let s: AssessmentSession =
            serde_json::from_str(r#"{"answers":[{"question":2,"value":true}]}"#).unwrap();
        let err = s.check_invariants().unwrap_err();
        assert!(err.to_string().contains("off the routing path"));
    }

    #[test]
    fn answer_after_gating_is_detected() {
        let s: AssessmentSession = serde_json::from_str(
            r#"{"answers":[{"question":0,"value":false},{"question":6,"value":false},{"question":6,"value":true}]}"#,
        )
        .unwrap();
        let err = s.check_invariants().unwrap_err();
        assert!(err.to_string().contains("after gating finished"));
    }

    #[test]
    fn missing_checklist_is_detected() {
        let s: AssessmentSession = serde_json::from_str(
            r#"{"answers":[{"question":0,"value":false},{"question":6,"value":false}]}"#,
        )
        .unwrap();
        assert!(s.check_invariants().is_err());
    }

    #[test]
    fn skipped_level_is_detected() {
        let s: AssessmentSession = serde_json::from_str(
            r#"{"answers":[{"question":0,"value":false},{"question":6,"value":true}],
                "steps":[{"level":3,"checked":[false,false,false,false]},
                         {"level":1,"checked":[false,false,false]}]}"#,
        )
        .unwrap();
        assert!(s.check_invariants().is_err());
    }

    #[test]
    fn stale_evidence_is_detected() {
        let s: AssessmentSession = serde_json::from_str(
            r#"{"answers":[{"question":0,"value":false}],"evidence":{"rq1":"x"}}"#,
        )
        .unwrap();
        let err = s.check_invariants().unwrap_err();
        assert!(err.to_string().contains("stale evidence"));
    }

    #[test]
    fn resolution_without_complete_step_is_detected() {
        let s: AssessmentSession = serde_json::from_str(
            r#"{"answers":[{"question":0,"value":false},{"question":6,"value":false}],
                "steps":[{"level":2,"checked":[false,false,false]}],
                "outcome":{"status":"resolved","level":2}}"#,
        )
        .unwrap();
        assert!(s.check_invariants().is_err());
    }
}
