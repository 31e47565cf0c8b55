use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::types::{EvidenceKey, EvidenceRef, QuestionIndex, TrlLevel};

/// Assessment fields submitted with a case.
///
/// One named field per gating question and per checklist level. Checklist
/// answers hold criterion labels, not ids.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssessmentPayload {
    pub trl_level_result: Option<TrlLevel>,

    pub rq1_answer: Option<bool>,
    pub rq2_answer: Option<bool>,
    pub rq3_answer: Option<bool>,
    pub rq4_answer: Option<bool>,
    pub rq5_answer: Option<bool>,
    pub rq6_answer: Option<bool>,
    pub rq7_answer: Option<bool>,

    pub cq1_answer: Vec<String>,
    pub cq2_answer: Vec<String>,
    pub cq3_answer: Vec<String>,
    pub cq4_answer: Vec<String>,
    pub cq5_answer: Vec<String>,
    pub cq6_answer: Vec<String>,
    pub cq7_answer: Vec<String>,
    pub cq8_answer: Vec<String>,
    pub cq9_answer: Vec<String>,

    #[serde(default)]
    pub evidence: BTreeMap<EvidenceKey, EvidenceRef>,
}

impl AssessmentPayload {
    pub fn gating_answer(&self, question: QuestionIndex) -> Option<bool> {
        match question.get() {
            0 => self.rq1_answer,
            1 => self.rq2_answer,
            2 => self.rq3_answer,
            3 => self.rq4_answer,
            4 => self.rq5_answer,
            5 => self.rq6_answer,
            // QuestionIndex is range-checked, so this is 6.
            _ => self.rq7_answer,
        }
    }

    pub fn set_gating_answer(&mut self, question: QuestionIndex, value: bool) {
        let slot = match question.get() {
            0 => &mut self.rq1_answer,
            1 => &mut self.rq2_answer,
            2 => &mut self.rq3_answer,
            3 => &mut self.rq4_answer,
            4 => &mut self.rq5_answer,
            5 => &mut self.rq6_answer,
            _ => &mut self.rq7_answer,
        };
        *slot = Some(value);
    }

    pub fn checklist_answer(&self, level: TrlLevel) -> &[String] {
        match level.get() {
            1 => &self.cq1_answer,
            2 => &self.cq2_answer,
            3 => &self.cq3_answer,
            4 => &self.cq4_answer,
            5 => &self.cq5_answer,
            6 => &self.cq6_answer,
            7 => &self.cq7_answer,
            8 => &self.cq8_answer,
            // TrlLevel is range-checked, so this is 9.
            _ => &self.cq9_answer,
        }
    }

    pub fn set_checklist_answer(&mut self, level: TrlLevel, labels: Vec<String>) {
        let slot = match level.get() {
            1 => &mut self.cq1_answer,
            2 => &mut self.cq2_answer,
            3 => &mut self.cq3_answer,
            4 => &mut self.cq4_answer,
            5 => &mut self.cq5_answer,
            6 => &mut self.cq6_answer,
            7 => &mut self.cq7_answer,
            8 => &mut self.cq8_answer,
            _ => &mut self.cq9_answer,
        };
        *slot = labels;
    }
}
