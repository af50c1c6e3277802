//! Normalizes the flat remote attempt log into a nested per-student lookup.

use std::collections::HashMap;

use crate::model::{AttemptRecord, Operation, UserId};

/// Scores keyed by `"stage{N}"`, mirroring the shape dashboards read.
pub type StageScores = HashMap<String, u8>;

/// Derived, in-memory view of all attempts:
/// student → operation → `"stage{N}"` → score.
///
/// Rebuilt in full on every refresh. Within one build the last record seen
/// for a (student, operation, stage) wins, so callers must supply records in
/// a stable creation order for reproducible output. No aggregation happens
/// here; averaging over stages is presentation-time only.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProgressIndex {
    by_student: HashMap<UserId, HashMap<Operation, StageScores>>,
}

/// Key format shared with the hosted store's dashboard queries.
#[must_use]
pub fn stage_key(stage: u32) -> String {
    format!("stage{stage}")
}

/// Build the nested index from a flat record list. Does not mutate or
/// consume its input.
#[must_use]
pub fn normalize(records: &[AttemptRecord]) -> ProgressIndex {
    let mut by_student: HashMap<UserId, HashMap<Operation, StageScores>> = HashMap::new();
    for record in records {
        by_student
            .entry(record.user_id)
            .or_default()
            .entry(record.operation)
            .or_default()
            .insert(stage_key(record.stage), record.score);
    }
    ProgressIndex { by_student }
}

impl ProgressIndex {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.by_student.is_empty()
    }

    #[must_use]
    pub fn contains_student(&self, student: UserId) -> bool {
        self.by_student.contains_key(&student)
    }

    /// Score for one (student, operation, stage) cell, if any attempt exists.
    #[must_use]
    pub fn score(&self, student: UserId, operation: Operation, stage: u32) -> Option<u8> {
        self.by_student
            .get(&student)?
            .get(&operation)?
            .get(&stage_key(stage))
            .copied()
    }

    /// All operations a student has attempted, with their stage scores.
    #[must_use]
    pub fn operations(&self, student: UserId) -> Option<&HashMap<Operation, StageScores>> {
        self.by_student.get(&student)
    }

    /// Mean over the distinct stage entries a student holds for an operation.
    ///
    /// Presentation-time helper; `None` when the student has no attempts for
    /// the operation.
    #[must_use]
    pub fn average(&self, student: UserId, operation: Operation) -> Option<f64> {
        let stages = self.by_student.get(&student)?.get(&operation)?;
        if stages.is_empty() {
            return None;
        }
        let sum: u32 = stages.values().map(|s| u32::from(*s)).sum();
        Some(f64::from(sum) / stages.len() as f64)
    }

    /// Students present in the index, in no particular order.
    pub fn students(&self) -> impl Iterator<Item = UserId> + '_ {
        self.by_student.keys().copied()
    }
}
