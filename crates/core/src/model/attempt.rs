use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::model::ids::UserId;
use crate::model::quiz::Operation;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum AttemptError {
    #[error("score {0} is outside 0..=100")]
    ScoreOutOfRange(u32),
}

/// One completed quiz, as stored remotely. Append-only: a new quiz for the
/// same (user, operation, stage) adds a row rather than updating one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttemptRecord {
    pub user_id: UserId,
    pub operation: Operation,
    pub stage: u32,
    pub score: u8,
    pub total_time: f64,
    pub created_at: DateTime<Utc>,
}

impl AttemptRecord {
    /// # Errors
    ///
    /// Returns `AttemptError::ScoreOutOfRange` if `score` exceeds 100.
    pub fn new(
        user_id: UserId,
        operation: Operation,
        stage: u32,
        score: u32,
        total_time: f64,
        created_at: DateTime<Utc>,
    ) -> Result<Self, AttemptError> {
        if score > 100 {
            return Err(AttemptError::ScoreOutOfRange(score));
        }

        Ok(Self {
            user_id,
            operation,
            stage,
            score: score as u8,
            total_time,
            created_at,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::time::fixed_now;

    #[test]
    fn score_above_hundred_is_rejected() {
        let err = AttemptRecord::new(
            UserId::random(),
            Operation::Addition,
            1,
            101,
            12.0,
            fixed_now(),
        )
        .unwrap_err();
        assert_eq!(err, AttemptError::ScoreOutOfRange(101));
    }

    #[test]
    fn boundary_scores_are_accepted() {
        for score in [0, 100] {
            AttemptRecord::new(
                UserId::random(),
                Operation::Multiplication,
                2,
                score,
                3.5,
                fixed_now(),
            )
            .unwrap();
        }
    }
}
