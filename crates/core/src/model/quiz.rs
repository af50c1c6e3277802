use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

//
// ─── OPERATION ────────────────────────────────────────────────────────────────
//

/// Arithmetic operation a quiz drills.
///
/// `Unknown` absorbs unrecognized wire values; the generator answers it with
/// a fixed degenerate question rather than failing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Operation {
    Addition,
    Subtraction,
    Multiplication,
    #[serde(other)]
    Unknown,
}

impl Operation {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Operation::Addition => "addition",
            Operation::Subtraction => "subtraction",
            Operation::Multiplication => "multiplication",
            Operation::Unknown => "unknown",
        }
    }

    /// Symbol used in question text.
    #[must_use]
    pub fn symbol(self) -> char {
        match self {
            Operation::Addition | Operation::Unknown => '+',
            Operation::Subtraction => '-',
            Operation::Multiplication => 'x',
        }
    }

    /// Parse a wire value; anything unrecognized maps to `Unknown`.
    #[must_use]
    pub fn parse(raw: &str) -> Self {
        match raw {
            "addition" => Operation::Addition,
            "subtraction" => Operation::Subtraction,
            "multiplication" => Operation::Multiplication,
            _ => Operation::Unknown,
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

//
// ─── SETTINGS & QUESTION ──────────────────────────────────────────────────────
//

/// Parameters for one quiz session. Immutable once the session starts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuizSettings {
    pub operation: Operation,
    pub stage: u32,
    pub timer_secs: u32,
}

impl QuizSettings {
    /// Stage is normalized to at least 1.
    #[must_use]
    pub fn new(operation: Operation, stage: u32, timer_secs: u32) -> Self {
        Self {
            operation,
            stage: stage.max(1),
            timer_secs,
        }
    }
}

/// A generated question. Value type, never mutated after creation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Question {
    pub text: String,
    pub answer: i64,
}

impl Question {
    #[must_use]
    pub fn new(a: i64, symbol: char, b: i64, answer: i64) -> Self {
        Self {
            text: format!("{a} {symbol} {b} = ?"),
            answer,
        }
    }
}

//
// ─── RESULTS ──────────────────────────────────────────────────────────────────
//

/// Outcome of one answered (or timed-out) question.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuizResult {
    pub question: Question,
    /// `None` when the per-question timer expired before a submission.
    pub user_answer: Option<i64>,
    pub is_correct: bool,
    /// Elapsed seconds, clamped to the per-question timer.
    pub time_taken: f64,
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum QuizSummaryError {
    #[error("cannot summarize a session with no results")]
    Empty,
}

/// Aggregate summary for a completed quiz session.
#[derive(Debug, Clone, PartialEq)]
pub struct QuizSummary {
    settings: QuizSettings,
    results: Vec<QuizResult>,
    score: u8,
    total_time: f64,
}

impl QuizSummary {
    /// Build a summary from the ordered result list of a finished session.
    ///
    /// Score is the percentage of correct answers; total time is the exact
    /// sum of per-question times.
    ///
    /// # Errors
    ///
    /// Returns `QuizSummaryError::Empty` for an empty result list.
    pub fn from_results(
        settings: QuizSettings,
        results: Vec<QuizResult>,
    ) -> Result<Self, QuizSummaryError> {
        if results.is_empty() {
            return Err(QuizSummaryError::Empty);
        }

        let correct = results.iter().filter(|r| r.is_correct).count();
        let score = u8::try_from(correct * 100 / results.len()).unwrap_or(100);
        let total_time = results.iter().map(|r| r.time_taken).sum();

        Ok(Self {
            settings,
            results,
            score,
            total_time,
        })
    }

    #[must_use]
    pub fn settings(&self) -> QuizSettings {
        self.settings
    }

    #[must_use]
    pub fn results(&self) -> &[QuizResult] {
        &self.results
    }

    /// Percentage of correct answers, 0..=100.
    #[must_use]
    pub fn score(&self) -> u8 {
        self.score
    }

    #[must_use]
    pub fn total_time(&self) -> f64 {
        self.total_time
    }
}

//
// ─── TESTS ────────────────────────────────────────────────────────────────────
//

#[cfg(test)]
mod tests {
    use super::*;

    fn result(answer: i64, user_answer: Option<i64>, time_taken: f64) -> QuizResult {
        QuizResult {
            question: Question::new(1, '+', 1, answer),
            user_answer,
            is_correct: user_answer == Some(answer),
            time_taken,
        }
    }

    #[test]
    fn summary_scores_percentage() {
        let settings = QuizSettings::new(Operation::Addition, 1, 10);
        let results = vec![
            result(2, Some(2), 1.0),
            result(2, Some(3), 2.0),
            result(2, Some(2), 0.5),
            result(2, None, 10.0),
        ];
        let summary = QuizSummary::from_results(settings, results).unwrap();
        assert_eq!(summary.score(), 50);
        assert!((summary.total_time() - 13.5).abs() < f64::EPSILON);
    }

    #[test]
    fn empty_summary_is_rejected() {
        let settings = QuizSettings::new(Operation::Addition, 1, 10);
        let err = QuizSummary::from_results(settings, Vec::new()).unwrap_err();
        assert_eq!(err, QuizSummaryError::Empty);
    }

    #[test]
    fn settings_normalize_stage_to_one() {
        let settings = QuizSettings::new(Operation::Subtraction, 0, 15);
        assert_eq!(settings.stage, 1);
    }

    #[test]
    fn unknown_operation_parses_from_garbage() {
        assert_eq!(Operation::parse("division"), Operation::Unknown);
        assert_eq!(Operation::parse("addition"), Operation::Addition);
    }
}
