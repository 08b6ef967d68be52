use std::collections::VecDeque;

use crate::patch::PatchOperation;

/// Where an applied batch came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PatchOrigin {
    /// Applied by the caller through `apply_patch`.
    External,
    /// Produced inside the store (actions, undo, redo).
    Local,
}

/// A batch that was applied to the specification, with the batch that reverts it.
#[derive(Debug, Clone, PartialEq)]
pub struct AppliedBatch {
    pub forward: Vec<PatchOperation>,
    pub inverse: Vec<PatchOperation>,
    pub origin: PatchOrigin,
}

/// Undo/redo journal of applied patch batches.
#[derive(Debug)]
pub struct PatchHistory {
    undo_stack: VecDeque<AppliedBatch>,
    redo_stack: Vec<AppliedBatch>,
    limit: usize,
}

impl PatchHistory {
    pub const DEFAULT_LIMIT: usize = 100;

    pub fn new(limit: usize) -> Self {
        Self {
            undo_stack: VecDeque::new(),
            redo_stack: Vec::new(),
            limit,
        }
    }

    pub fn record(&mut self, batch: AppliedBatch) {
        if self.limit == 0 {
            return;
        }
        if self.undo_stack.len() == self.limit {
            self.undo_stack.pop_front();
        }
        self.undo_stack.push_back(batch);
        // A new edit invalidates everything that was undone.
        self.redo_stack.clear();
    }

    /// Take the most recent batch for undoing.
    pub fn take_undo(&mut self) -> Option<AppliedBatch> {
        self.undo_stack.pop_back()
    }

    /// Take the most recently undone batch for redoing.
    pub fn take_redo(&mut self) -> Option<AppliedBatch> {
        self.redo_stack.pop()
    }

    /// File a batch that was just undone so it can be redone.
    pub fn push_redo(&mut self, batch: AppliedBatch) {
        self.redo_stack.push(batch);
    }

    /// File a batch that was just redone, keeping the redo stack intact.
    pub fn push_undo(&mut self, batch: AppliedBatch) {
        if self.limit == 0 {
            return;
        }
        if self.undo_stack.len() == self.limit {
            self.undo_stack.pop_front();
        }
        self.undo_stack.push_back(batch);
    }

    pub fn can_undo(&self) -> bool {
        !self.undo_stack.is_empty()
    }

    pub fn can_redo(&self) -> bool {
        !self.redo_stack.is_empty()
    }

    pub fn undo_depth(&self) -> usize {
        self.undo_stack.len()
    }

    pub fn clear(&mut self) {
        self.undo_stack.clear();
        self.redo_stack.clear();
    }
}

impl Default for PatchHistory {
    fn default() -> Self {
        Self::new(Self::DEFAULT_LIMIT)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn batch(n: i64) -> AppliedBatch {
        AppliedBatch {
            forward: vec![PatchOperation::replace("/n", json!(n))],
            inverse: vec![PatchOperation::replace("/n", json!(n - 1))],
            origin: PatchOrigin::External,
        }
    }

    #[test]
    fn test_record_clears_redo() {
        let mut history = PatchHistory::default();
        history.record(batch(1));
        let undone = history.take_undo().unwrap();
        history.push_redo(undone);
        assert!(history.can_redo());
        history.record(batch(2));
        assert!(!history.can_redo());
    }

    #[test]
    fn test_limit_drops_oldest() {
        let mut history = PatchHistory::new(2);
        history.record(batch(1));
        history.record(batch(2));
        history.record(batch(3));
        assert_eq!(history.undo_depth(), 2);
        assert_eq!(history.take_undo().unwrap(), batch(3));
        assert_eq!(history.take_undo().unwrap(), batch(2));
        assert!(history.take_undo().is_none());
    }
}
