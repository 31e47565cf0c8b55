use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use trl_core::errors::{EvidenceError, SessionError};
use trl_core::payload::AssessmentPayload;
use trl_core::state::{
    AssessmentResult, GatingAnswer, Outcome, Rollback, SessionPhase, Transition,
};
use trl_core::types::{
    CriterionKey, EvidenceKey, EvidenceRef, GatingOutcome, QuestionIndex, TrlLevel,
};

use super::evidence::EvidenceTracker;
use crate::checklist::{ChecklistStep, StepTrail};
use crate::gating::route;

/// One in-progress TRL assessment.
///
/// Every mutation goes through a transition method that either applies
/// completely and returns a [`Transition`], or is rejected with a
/// [`SessionError`] and leaves the session untouched.
///
/// Transitions:
/// 1. `answer` on the current question: record it, then either advance to
///    the next question or open the first checklist at the routed level
/// 2. `answer` on an earlier question with a different value: discard every
///    later answer, all checklist steps and their evidence, then route anew
/// 3. `set_criterion` / `toggle`: if the step's completeness flips, discard
///    all later steps and reset the outcome
/// 4. `evaluate`: accept a complete current step, open the next level down
///    for an incomplete one, or stop at the TRL 1 floor
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssessmentSession {
    answers: Vec<GatingAnswer>,
    #[serde(default)]
    steps: StepTrail,
    #[serde(default)]
    evidence: EvidenceTracker,
    #[serde(default)]
    outcome: Outcome,
}

impl AssessmentSession {
    pub fn new() -> Self {
        Self::default()
    }

    // ── Views ───────────────────────────────────────────────────

    pub fn answers(&self) -> &[GatingAnswer] {
        &self.answers
    }

    pub fn answer_for(&self, question: QuestionIndex) -> Option<bool> {
        self.answers
            .iter()
            .find(|a| a.question == question)
            .map(|a| a.value)
    }

    pub fn steps(&self) -> &StepTrail {
        &self.steps
    }

    pub fn step(&self, level: TrlLevel) -> Option<&ChecklistStep> {
        self.steps.get(level)
    }

    pub fn evidence(&self) -> &EvidenceTracker {
        &self.evidence
    }

    pub fn gating_evidence(&self, question: QuestionIndex) -> Option<&EvidenceRef> {
        self.evidence.get(EvidenceKey::Gating(question))
    }

    pub fn outcome(&self) -> Outcome {
        self.outcome
    }

    pub fn result(&self) -> AssessmentResult {
        self.outcome.into()
    }

    /// The question awaiting an answer, or `None` once gating has routed
    /// to a checklist.
    pub fn current_question(&self) -> Option<QuestionIndex> {
        match self.answers.last() {
            None => Some(QuestionIndex::FIRST),
            Some(last) => match route(last.question, last.value) {
                GatingOutcome::NextQuestion(next) => Some(next),
                GatingOutcome::StartLevel(_) => None,
            },
        }
    }

    pub fn phase(&self) -> SessionPhase {
        match (self.outcome, self.steps.current()) {
            (Outcome::Resolved { level }, _) => SessionPhase::Resolved { level },
            (_, Some(step)) => SessionPhase::ChecklistOpen { level: step.level },
            (_, None) => SessionPhase::Gating {
                question: self.current_question().unwrap_or(QuestionIndex::FIRST),
            },
        }
    }

    /// The submission payload for the current state.
    pub fn payload(&self) -> AssessmentPayload {
        let mut payload = AssessmentPayload::default();
        if let Outcome::Resolved { level } = self.outcome {
            payload.trl_level_result = Some(level);
        }
        for answer in &self.answers {
            payload.set_gating_answer(answer.question, answer.value);
        }
        for step in &self.steps {
            payload.set_checklist_answer(step.level, step.checked_labels());
        }
        payload.evidence = self.evidence.to_map();
        payload
    }

    // ── Gating ──────────────────────────────────────────────────

    pub fn answer(
        &mut self,
        question: QuestionIndex,
        value: bool,
    ) -> Result<Transition, SessionError> {
        let mut rollback = Rollback::default();

        if let Some(pos) = self.answers.iter().position(|a| a.question == question) {
            if self.answers[pos].value == value {
                return Ok(Transition::Unchanged);
            }
            rollback = self.rollback_gating(pos);
        } else if self.current_question() != Some(question) {
            return Err(SessionError::QuestionNotReached {
                question,
                current: self.current_question(),
            });
        }

        self.answers.push(GatingAnswer { question, value });
        debug!(%question, value, "gating answer recorded");

        let transition = match route(question, value) {
            GatingOutcome::NextQuestion(next) => Transition::NextQuestion {
                answered: question,
                value,
                next,
                rollback,
            },
            GatingOutcome::StartLevel(level) => {
                self.steps.open(level);
                debug!(%level, "checklist opened");
                Transition::ChecklistOpened {
                    answered: question,
                    value,
                    level,
                    rollback,
                }
            }
        };
        Ok(transition)
    }

    /// Discard the answer at `pos` and everything derived from it.
    fn rollback_gating(&mut self, pos: usize) -> Rollback {
        let discarded = self.answers.split_off(pos);
        let questions: Vec<QuestionIndex> = discarded.iter().map(|a| a.question).collect();

        let mut evidence = self.evidence.clear_questions(&questions);
        let levels: Vec<TrlLevel> = self.steps.clear().iter().map(|s| s.level).collect();
        evidence.extend(self.evidence.clear_levels(&levels));

        let rollback = Rollback {
            answers: questions.into_iter().skip(1).collect(),
            levels,
            evidence,
            outcome_reset: self.reset_outcome(),
        };
        if !rollback.is_empty() {
            warn!(
                question = %discarded[0].question,
                answers = rollback.answers.len(),
                levels = rollback.levels.len(),
                "gating answer changed, downstream state discarded"
            );
        }
        rollback
    }

    // ── Checklist ───────────────────────────────────────────────

    /// Flip one criterion.
    pub fn toggle(&mut self, criterion: CriterionKey) -> Result<Transition, SessionError> {
        let checked = self
            .steps
            .get(criterion.level())
            .ok_or(SessionError::LevelNotOpen(criterion.level()))?
            .is_checked(criterion.id());
        self.set_criterion(criterion, !checked)
    }

    pub fn set_criterion(
        &mut self,
        criterion: CriterionKey,
        checked: bool,
    ) -> Result<Transition, SessionError> {
        let pos = self
            .steps
            .position(criterion.level())
            .ok_or(SessionError::LevelNotOpen(criterion.level()))?;
        let step = self
            .steps
            .get_mut_at(pos)
            .ok_or(SessionError::LevelNotOpen(criterion.level()))?;

        let was_complete = step.is_complete();
        let previous = step
            .set(criterion.id(), checked)
            .ok_or(SessionError::UnknownCriterion {
                level: criterion.level(),
                id: criterion.id(),
            })?;
        if previous == checked {
            return Ok(Transition::Unchanged);
        }
        let complete = step.is_complete();
        debug!(%criterion, checked, complete, "criterion set");

        let mut rollback = Rollback::default();
        if !checked && self.evidence.clear(EvidenceKey::Criterion(criterion)).is_some() {
            rollback.evidence.push(EvidenceKey::Criterion(criterion));
        }

        if was_complete != complete {
            let levels: Vec<TrlLevel> = self
                .steps
                .invalidate_from(pos + 1)
                .iter()
                .map(|s| s.level)
                .collect();
            rollback
                .evidence
                .extend(self.evidence.clear_levels(&levels));
            rollback.levels = levels;
            rollback.outcome_reset = self.reset_outcome();
            if !rollback.levels.is_empty() || rollback.outcome_reset {
                warn!(
                    level = %criterion.level(),
                    discarded = rollback.levels.len(),
                    "checklist completeness changed, later steps discarded"
                );
            }
        }

        Ok(Transition::CriterionSet {
            criterion,
            checked,
            complete,
            rollback,
        })
    }

    // ── Evaluation ──────────────────────────────────────────────

    /// Evaluate the current checklist step.
    pub fn evaluate(&mut self) -> Result<Transition, SessionError> {
        let step = self.steps.current().ok_or(SessionError::NothingToEvaluate)?;
        let level = step.level;

        if step.is_complete() {
            if self.outcome == (Outcome::Resolved { level }) {
                return Ok(Transition::Unchanged);
            }
            self.outcome = Outcome::Resolved { level };
            info!(%level, "assessment resolved");
            return Ok(Transition::Resolved { level });
        }

        match level.below() {
            Some(lower) => {
                self.steps.open(lower);
                debug!(from = %level, to = %lower, "descended to lower checklist");
                Ok(Transition::Descended {
                    from: level,
                    to: lower,
                })
            }
            None => {
                self.outcome = Outcome::FloorReached;
                warn!("TRL 1 checklist incomplete, assessment cannot be resolved");
                Ok(Transition::FloorReached)
            }
        }
    }

    fn reset_outcome(&mut self) -> bool {
        let was_set = self.outcome != Outcome::Pending;
        self.outcome = Outcome::Pending;
        was_set
    }

    // ── Evidence ────────────────────────────────────────────────

    pub fn attach_evidence(
        &mut self,
        target: EvidenceKey,
        evidence: EvidenceRef,
    ) -> Result<Transition, SessionError> {
        self.check_attachable(target)?;
        let replaced = self.evidence.attach(target, evidence.clone());
        debug!(%target, %evidence, "evidence attached");
        Ok(Transition::EvidenceAttached {
            target,
            evidence,
            replaced,
        })
    }

    pub fn detach_evidence(&mut self, target: EvidenceKey) -> Result<Transition, SessionError> {
        let evidence = self
            .evidence
            .clear(target)
            .ok_or(EvidenceError::NothingAttached(target))?;
        debug!(%target, "evidence detached");
        Ok(Transition::EvidenceDetached { target, evidence })
    }

    fn check_attachable(&self, target: EvidenceKey) -> Result<(), EvidenceError> {
        match target {
            EvidenceKey::Gating(question) => match self.answer_for(question) {
                None => Err(EvidenceError::NotAnswered(question)),
                Some(false) => Err(EvidenceError::NotAffirmed(question)),
                Some(true) => Ok(()),
            },
            EvidenceKey::Criterion(key) => {
                let step = self
                    .steps
                    .get(key.level())
                    .ok_or(EvidenceError::LevelNotOpen(key.level()))?;
                if step.is_checked(key.id()) {
                    Ok(())
                } else {
                    Err(EvidenceError::CriterionNotChecked(key))
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use trl_core::catalog;

    fn q(i: u8) -> QuestionIndex {
        QuestionIndex::new(i).unwrap()
    }

    fn level(l: u8) -> TrlLevel {
        TrlLevel::new(l).unwrap()
    }

    fn key(l: u8, id: u8) -> CriterionKey {
        CriterionKey::parse(l, id).unwrap()
    }

    fn check_all(session: &mut AssessmentSession, l: u8) {
        for c in catalog::criteria(level(l)) {
            session
                .set_criterion(CriterionKey::new(level(l), c.id).unwrap(), true)
                .unwrap();
        }
    }

    /// q0..q4 all yes, landing on TRL 9.
    fn at_level_nine() -> AssessmentSession {
        let mut s = AssessmentSession::new();
        for i in 0..5 {
            s.answer(q(i), true).unwrap();
        }
        s
    }

    #[test]
    fn starts_gating_at_first_question() {
        let s = AssessmentSession::new();
        assert_eq!(s.phase(), SessionPhase::Gating { question: q(0) });
        assert_eq!(s.result().trl_level, 0);
    }

    #[test]
    fn scenario_a_resolves_at_level_two() {
        let mut s = AssessmentSession::new();
        let t = s.answer(q(0), false).unwrap();
        assert!(matches!(t, Transition::NextQuestion { next, .. } if next == q(6)));
        let t = s.answer(q(6), false).unwrap();
        assert!(matches!(t, Transition::ChecklistOpened { level: l, .. } if l == level(2)));
        assert!(s.step(level(2)).unwrap().indicators().iter().all(|c| !c));

        check_all(&mut s, 2);
        assert_eq!(s.evaluate().unwrap(), Transition::Resolved { level: level(2) });
        let r = s.result();
        assert!(r.resolved);
        assert_eq!(r.trl_level, 2);
        assert_eq!(s.phase(), SessionPhase::Resolved { level: level(2) });
    }

    #[test]
    fn scenario_b_non_flipping_toggle_keeps_resolution() {
        let mut s = at_level_nine();
        s.evaluate().unwrap(); // 9 incomplete -> 8
        s.set_criterion(key(9, 1), true).unwrap();
        check_all(&mut s, 8);
        s.evaluate().unwrap();
        assert_eq!(s.result().trl_level, 8);

        // Level 9 stays incomplete after this extra check.
        let t = s.set_criterion(key(9, 2), true).unwrap();
        assert!(t.rollback().is_none());
        assert!(s.result().resolved);
        assert_eq!(s.result().trl_level, 8);
        assert_eq!(s.steps().levels(), vec![level(9), level(8)]);
    }

    #[test]
    fn scenario_c_descends_and_keeps_indicators() {
        let mut s = at_level_nine();
        assert_eq!(s.phase(), SessionPhase::ChecklistOpen { level: level(9) });
        s.set_criterion(key(9, 1), true).unwrap();

        let t = s.evaluate().unwrap();
        assert_eq!(
            t,
            Transition::Descended {
                from: level(9),
                to: level(8)
            }
        );
        assert_eq!(s.phase(), SessionPhase::ChecklistOpen { level: level(8) });

        let nine = s.step(level(9)).unwrap();
        let mut expected = vec![false; catalog::checklist(level(9)).len()];
        expected[0] = true;
        assert_eq!(nine.indicators(), expected.as_slice());
    }

    #[test]
    fn completing_an_earlier_step_discards_later_steps() {
        let mut s = at_level_nine();
        s.evaluate().unwrap(); // -> 8
        s.evaluate().unwrap(); // -> 7
        check_all(&mut s, 7);
        s.evaluate().unwrap();
        assert_eq!(s.result().trl_level, 7);

        // Completing 8 flips its completeness: 7 goes away, result resets.
        let n8 = catalog::checklist(level(8)).len() as u8;
        for id in 1..n8 {
            let t = s.set_criterion(key(8, id), true).unwrap();
            assert!(t.rollback().is_none(), "premature rollback at {id}");
        }
        let t = s.set_criterion(key(8, n8), true).unwrap();
        let rollback = t.rollback().unwrap();
        assert_eq!(rollback.levels, vec![level(7)]);
        assert!(rollback.outcome_reset);
        assert_eq!(s.steps().levels(), vec![level(9), level(8)]);
        assert!(!s.result().resolved);
        assert_eq!(s.result().trl_level, 0);

        assert_eq!(s.evaluate().unwrap(), Transition::Resolved { level: level(8) });
    }

    #[test]
    fn unchecking_resolved_step_resets_result() {
        let mut s = at_level_nine();
        check_all(&mut s, 9);
        s.evaluate().unwrap();
        assert!(s.result().resolved);

        let t = s.toggle(key(9, 2)).unwrap();
        assert!(matches!(t, Transition::CriterionSet { checked: false, complete: false, .. }));
        assert!(!s.result().resolved);
        assert_eq!(s.phase(), SessionPhase::ChecklistOpen { level: level(9) });
    }

    #[test]
    fn floor_is_terminal_and_unresolved() {
        let mut s = AssessmentSession::new();
        s.answer(q(0), false).unwrap();
        s.answer(q(6), false).unwrap(); // TRL 2
        s.evaluate().unwrap(); // -> 1
        assert_eq!(s.evaluate().unwrap(), Transition::FloorReached);
        let r = s.result();
        assert_eq!((r.trl_level, r.resolved, r.floor_reached), (0, false, true));
        assert_eq!(s.steps().levels(), vec![level(2), level(1)]);

        // Pressing evaluate again does not open a level 0.
        assert_eq!(s.evaluate().unwrap(), Transition::FloorReached);
        assert_eq!(s.steps().len(), 2);

        // Completing level 1 clears the floor and allows resolution.
        check_all(&mut s, 1);
        assert!(!s.result().floor_reached);
        assert_eq!(s.evaluate().unwrap(), Transition::Resolved { level: level(1) });
    }

    #[test]
    fn changing_gating_answer_discards_everything_after_it() {
        let mut s = at_level_nine();
        s.attach_evidence(EvidenceKey::Gating(q(3)), EvidenceRef::new("qual.pdf"))
            .unwrap();
        s.set_criterion(key(9, 1), true).unwrap();
        s.attach_evidence(EvidenceKey::Criterion(key(9, 1)), EvidenceRef::new("ops.csv"))
            .unwrap();

        // q1 yes -> no reroutes through q5.
        let t = s.answer(q(1), false).unwrap();
        let rollback = t.rollback().unwrap();
        assert_eq!(rollback.answers, vec![q(2), q(3), q(4)]);
        assert_eq!(rollback.levels, vec![level(9)]);
        assert_eq!(rollback.evidence.len(), 2);
        assert!(s.evidence().is_empty());
        assert_eq!(s.phase(), SessionPhase::Gating { question: q(5) });
        assert!(s.steps().is_empty());
        assert_eq!(s.answer_for(q(3)), None);
    }

    #[test]
    fn same_answer_twice_is_unchanged() {
        let mut s = at_level_nine();
        s.set_criterion(key(9, 1), true).unwrap();
        assert_eq!(s.answer(q(2), true).unwrap(), Transition::Unchanged);
        assert!(s.step(level(9)).unwrap().is_checked(key(9, 1).id()));
    }

    #[test]
    fn unreached_question_is_rejected() {
        let mut s = AssessmentSession::new();
        let err = s.answer(q(3), true).unwrap_err();
        assert_eq!(
            err,
            SessionError::QuestionNotReached {
                question: q(3),
                current: Some(q(0))
            }
        );
        assert!(s.answers().is_empty());
    }

    #[test]
    fn evaluate_without_checklist_is_rejected() {
        let mut s = AssessmentSession::new();
        assert_eq!(s.evaluate().unwrap_err(), SessionError::NothingToEvaluate);
    }

    #[test]
    fn checklist_not_open_is_rejected() {
        let mut s = at_level_nine();
        assert_eq!(
            s.set_criterion(key(3, 1), true).unwrap_err(),
            SessionError::LevelNotOpen(level(3))
        );
    }

    #[test]
    fn evidence_requires_affirmative_answer() {
        let mut s = AssessmentSession::new();
        let target = EvidenceKey::Gating(q(0));
        assert!(matches!(
            s.attach_evidence(target, EvidenceRef::new("x")),
            Err(SessionError::Evidence(EvidenceError::NotAnswered(_)))
        ));
        s.answer(q(0), false).unwrap();
        assert!(matches!(
            s.attach_evidence(target, EvidenceRef::new("x")),
            Err(SessionError::Evidence(EvidenceError::NotAffirmed(_)))
        ));
        assert!(s.gating_evidence(q(0)).is_none());
    }

    #[test]
    fn revoking_affirmative_answer_clears_its_evidence() {
        let mut s = AssessmentSession::new();
        s.answer(q(0), true).unwrap();
        s.attach_evidence(EvidenceKey::Gating(q(0)), EvidenceRef::new("poc.pdf"))
            .unwrap();
        assert_eq!(s.gating_evidence(q(0)), Some(&EvidenceRef::new("poc.pdf")));

        let t = s.answer(q(0), false).unwrap();
        assert_eq!(
            t.rollback().unwrap().evidence,
            vec![EvidenceKey::Gating(q(0))]
        );
        assert!(s.gating_evidence(q(0)).is_none());
    }

    #[test]
    fn unchecking_criterion_clears_its_evidence() {
        let mut s = at_level_nine();
        let target = EvidenceKey::Criterion(key(9, 2));
        assert!(matches!(
            s.attach_evidence(target, EvidenceRef::new("x")),
            Err(SessionError::Evidence(EvidenceError::CriterionNotChecked(_)))
        ));
        s.set_criterion(key(9, 2), true).unwrap();
        s.attach_evidence(target, EvidenceRef::new("x")).unwrap();
        s.set_criterion(key(9, 2), false).unwrap();
        assert!(s.evidence().get(target).is_none());
    }

    #[test]
    fn detach_returns_reference() {
        let mut s = AssessmentSession::new();
        s.answer(q(0), true).unwrap();
        let target = EvidenceKey::Gating(q(0));
        s.attach_evidence(target, EvidenceRef::new("a")).unwrap();
        let t = s.detach_evidence(target).unwrap();
        assert_eq!(
            t,
            Transition::EvidenceDetached {
                target,
                evidence: EvidenceRef::new("a")
            }
        );
        assert!(s.detach_evidence(target).is_err());
    }

    #[test]
    fn payload_reports_labels_and_empty_discarded_levels() {
        let mut s = at_level_nine();
        s.evaluate().unwrap(); // -> 8
        s.set_criterion(key(8, 2), true).unwrap();
        s.answer(q(1), true).unwrap(); // unchanged

        let p = s.payload();
        assert_eq!(p.trl_level_result, None);
        assert_eq!(p.rq1_answer, Some(true));
        assert_eq!(p.rq6_answer, None);
        assert_eq!(p.cq8_answer, vec![catalog::checklist(level(8))[1].to_string()]);
        assert!(p.cq9_answer.is_empty());

        // Completing 9 discards 8; its answers must not linger.
        check_all(&mut s, 9);
        let p = s.payload();
        assert!(p.cq8_answer.is_empty());
        assert_eq!(p.cq9_answer.len(), catalog::checklist(level(9)).len());
        s.evaluate().unwrap();
        assert_eq!(s.payload().trl_level_result, Some(level(9)));
    }

    #[test]
    fn serde_roundtrip_preserves_session() {
        let mut s = at_level_nine();
        s.set_criterion(key(9, 1), true).unwrap();
        s.attach_evidence(EvidenceKey::Criterion(key(9, 1)), EvidenceRef::new("f"))
            .unwrap();
        s.evaluate().unwrap();

        let json = serde_json::to_string(&s).unwrap();
        let back: AssessmentSession = serde_json::from_str(&json).unwrap();
        assert_eq!(back, s);
    }
}
