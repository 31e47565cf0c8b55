use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use trl_core::types::{EvidenceKey, EvidenceRef, QuestionIndex, TrlLevel};

/// Evidence references keyed by gating answer or checklist criterion.
///
/// The tracker only stores; the session enforces the attach preconditions
/// and issues the clears.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EvidenceTracker {
    entries: BTreeMap<EvidenceKey, EvidenceRef>,
}

impl EvidenceTracker {
    pub fn get(&self, key: EvidenceKey) -> Option<&EvidenceRef> {
        self.entries.get(&key)
    }

    pub fn iter(&self) -> impl Iterator<Item = (EvidenceKey, &EvidenceRef)> {
        self.entries.iter().map(|(k, v)| (*k, v))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Store a reference, returning the one it replaced.
    pub(crate) fn attach(&mut self, key: EvidenceKey, evidence: EvidenceRef) -> Option<EvidenceRef> {
        self.entries.insert(key, evidence)
    }

    pub(crate) fn clear(&mut self, key: EvidenceKey) -> Option<EvidenceRef> {
        self.entries.remove(&key)
    }

    /// Drop evidence for the given gating questions; returns the keys removed.
    pub(crate) fn clear_questions(&mut self, questions: &[QuestionIndex]) -> Vec<EvidenceKey> {
        self.clear_where(|key| matches!(key, EvidenceKey::Gating(q) if questions.contains(q)))
    }

    /// Drop evidence for every criterion of the given levels.
    pub(crate) fn clear_levels(&mut self, levels: &[TrlLevel]) -> Vec<EvidenceKey> {
        self.clear_where(|key| key.level().is_some_and(|l| levels.contains(&l)))
    }

    fn clear_where(&mut self, pred: impl Fn(&EvidenceKey) -> bool) -> Vec<EvidenceKey> {
        let doomed: Vec<EvidenceKey> = self.entries.keys().filter(|k| pred(*k)).copied().collect();
        for key in &doomed {
            self.entries.remove(key);
        }
        doomed
    }

    pub(crate) fn to_map(&self) -> BTreeMap<EvidenceKey, EvidenceRef> {
        self.entries.clone()
    }
}
