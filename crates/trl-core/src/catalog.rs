//! Static question catalog: 7 gating questions and one checklist per TRL level.
//!
//! Checklist labels double as the persisted answer values in the result
//! payload, so editing a label changes what gets submitted.

use serde::Serialize;

use crate::types::{CriterionId, CriterionKey, QuestionIndex, TrlLevel};

const GATING_PROMPTS: [&str; 7] = [
    "Has the technology concept been validated through laboratory experiments (proof of concept)?",
    "Has a prototype or working model been demonstrated in a relevant environment?",
    "Has a full-scale prototype been demonstrated in an operational environment?",
    "Has the actual system been completed and qualified through test and demonstration?",
    "Has the actual system been proven through successful operation in its final form?",
    "Have the components been integrated and validated in a relevant environment?",
    "Have the critical functions been studied analytically and experimentally?",
];

const TRL1: &[&str] = &[
    "Basic scientific principles have been observed",
    "Observations have been reported in literature or research notes",
    "Potential applications of the principles have been identified",
];

const TRL2: &[&str] = &[
    "A practical application of the principles has been formulated",
    "The technology concept has been described in writing",
    "Initial analysis supports the feasibility of the concept",
];

const TRL3: &[&str] = &[
    "Analytical studies of critical functions have been performed",
    "Laboratory experiments have validated the critical functions",
    "A proof of concept has been demonstrated",
    "Performance predictions for key parameters have been made",
];

const TRL4: &[&str] = &[
    "Basic components have been integrated in the laboratory",
    "Component performance has been validated in the laboratory",
    "A low-fidelity prototype has been built",
    "Laboratory test results have been documented",
];

const TRL5: &[&str] = &[
    "Components have been integrated with realistic supporting elements",
    "The breadboard has been validated in a relevant environment",
    "Interfaces between components have been defined",
    "Test results agree with performance predictions",
];

const TRL6: &[&str] = &[
    "A representative prototype system has been built",
    "The prototype has been demonstrated in a relevant environment",
    "Engineering feasibility has been fully demonstrated",
    "Manufacturing considerations have been identified",
];

const TRL7: &[&str] = &[
    "A near-final prototype has been built at planned scale",
    "The prototype has been demonstrated in an operational environment",
    "Operational performance data has been collected",
];

const TRL8: &[&str] = &[
    "The actual system has been completed in its final form",
    "The system has been qualified through test and demonstration",
    "User and maintenance documentation has been completed",
    "The system is ready for commercial production or deployment",
];

const TRL9: &[&str] = &[
    "The actual system has been proven in successful operations",
    "The system has been deployed to end users",
    "Operational data confirms sustained performance",
];

/// One yes/no screening question.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct GatingQuestion {
    pub index: QuestionIndex,
    pub prompt: &'static str,
}

/// One item of a level's checklist.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct ChecklistCriterion {
    pub id: CriterionId,
    pub label: &'static str,
}

pub fn gating_question(index: QuestionIndex) -> GatingQuestion {
    GatingQuestion {
        index,
        prompt: GATING_PROMPTS[usize::from(index.get())],
    }
}

pub fn gating_questions() -> impl Iterator<Item = GatingQuestion> {
    QuestionIndex::all().map(gating_question)
}

/// Labels of the checklist for `level`, in fixed order.
pub fn checklist(level: TrlLevel) -> &'static [&'static str] {
    const CHECKLISTS: [&[&str]; 9] = [TRL1, TRL2, TRL3, TRL4, TRL5, TRL6, TRL7, TRL8, TRL9];
    CHECKLISTS[usize::from(level.get() - 1)]
}

pub fn criteria(level: TrlLevel) -> impl Iterator<Item = ChecklistCriterion> {
    checklist(level)
        .iter()
        .enumerate()
        .map(|(pos, &label)| ChecklistCriterion {
            id: CriterionId::from_position(pos),
            label,
        })
}

pub fn criterion_label(key: CriterionKey) -> &'static str {
    checklist(key.level())[key.id().position()]
}
