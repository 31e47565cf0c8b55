use serde::{Deserialize, Serialize};

use trl_core::catalog;
use trl_core::types::{CriterionId, CriterionKey, TrlLevel};

use super::evaluator::is_complete;

/// One checklist opened during descent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChecklistStep {
    pub level: TrlLevel,
    /// Parallel to the level's checklist.
    checked: Vec<bool>,
}

impl ChecklistStep {
    /// A fresh step with every criterion unchecked.
    pub fn new(level: TrlLevel) -> Self {
        Self {
            level,
            checked: vec![false; catalog::checklist(level).len()],
        }
    }

    pub fn indicators(&self) -> &[bool] {
        &self.checked
    }

    pub fn is_complete(&self) -> bool {
        is_complete(self.level, &self.checked)
    }

    pub fn is_checked(&self, id: CriterionId) -> bool {
        self.checked.get(id.position()).copied().unwrap_or(false)
    }

    /// Set one indicator, returning its previous value, or `None` if the
    /// level's checklist has no such criterion.
    pub(crate) fn set(&mut self, id: CriterionId, checked: bool) -> Option<bool> {
        self.checked
            .get_mut(id.position())
            .map(|slot| std::mem::replace(slot, checked))
    }

    /// Keys of every checked criterion, in checklist order.
    pub fn checked_keys(&self) -> impl Iterator<Item = CriterionKey> + '_ {
        catalog::criteria(self.level)
            .filter(|c| self.is_checked(c.id))
            .filter_map(|c| CriterionKey::new(self.level, c.id))
    }

    /// Labels of every checked criterion, in checklist order.
    pub fn checked_labels(&self) -> Vec<String> {
        catalog::criteria(self.level)
            .filter(|c| self.is_checked(c.id))
            .map(|c| c.label.to_string())
            .collect()
    }

    pub(crate) fn has_catalog_shape(&self) -> bool {
        self.checked.len() == catalog::checklist(self.level).len()
    }
}

/// Ordered checklist steps of one descent, addressed by position.
///
/// The last step is the current one. Rollback is [`StepTrail::invalidate_from`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StepTrail {
    steps: Vec<ChecklistStep>,
}

impl StepTrail {
    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn current(&self) -> Option<&ChecklistStep> {
        self.steps.last()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, ChecklistStep> {
        self.steps.iter()
    }

    pub fn levels(&self) -> Vec<TrlLevel> {
        self.steps.iter().map(|s| s.level).collect()
    }

    pub fn position(&self, level: TrlLevel) -> Option<usize> {
        self.steps.iter().position(|s| s.level == level)
    }

    pub fn get(&self, level: TrlLevel) -> Option<&ChecklistStep> {
        self.steps.iter().find(|s| s.level == level)
    }

    pub(crate) fn get_mut_at(&mut self, pos: usize) -> Option<&mut ChecklistStep> {
        self.steps.get_mut(pos)
    }

    /// Append a fresh step and make it current.
    pub(crate) fn open(&mut self, level: TrlLevel) -> &ChecklistStep {
        self.steps.push(ChecklistStep::new(level));
        &self.steps[self.steps.len() - 1]
    }

    /// Discard every step at or after `pos`, returning them in order.
    pub(crate) fn invalidate_from(&mut self, pos: usize) -> Vec<ChecklistStep> {
        if pos >= self.steps.len() {
            return Vec::new();
        }
        self.steps.split_off(pos)
    }

    /// Discard every step.
    pub(crate) fn clear(&mut self) -> Vec<ChecklistStep> {
        self.invalidate_from(0)
    }
}

impl<'a> IntoIterator for &'a StepTrail {
    type Item = &'a ChecklistStep;
    type IntoIter = std::slice::Iter<'a, ChecklistStep>;

    fn into_iter(self) -> Self::IntoIter {
        self.steps.iter()
    }
}
