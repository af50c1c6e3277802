use chrono::{DateTime, Utc};
use std::fmt;

use quiz_core::generator;
use quiz_core::model::{Question, QuizResult, QuizSettings, QuizSummary};

use crate::error::QuizError;

/// Fixed length of every quiz session.
pub const QUESTION_COUNT: usize = 10;

/// Lifecycle of one session.
///
/// `Idle → AwaitingAnswer → Revealed → (AwaitingAnswer | Complete)`.
/// Exactly one `AwaitingAnswer → Revealed` transition fires per question,
/// whether by submission or timer expiry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QuizPhase {
    Idle,
    AwaitingAnswer,
    Revealed,
    Complete,
}

/// In-memory state machine for a single timed quiz session.
///
/// Timestamps come from the caller's clock so the machine stays
/// deterministic under test; scheduling (ticks, reveal delay) lives in the
/// async runner, not here.
pub struct QuizEngine {
    settings: QuizSettings,
    phase: QuizPhase,
    index: usize,
    question: Option<Question>,
    question_started_at: DateTime<Utc>,
    results: Vec<QuizResult>,
}

impl QuizEngine {
    #[must_use]
    pub fn new(settings: QuizSettings) -> Self {
        Self {
            settings,
            phase: QuizPhase::Idle,
            index: 0,
            question: None,
            question_started_at: DateTime::<Utc>::MIN_UTC,
            results: Vec::new(),
        }
    }

    #[must_use]
    pub fn settings(&self) -> QuizSettings {
        self.settings
    }

    #[must_use]
    pub fn phase(&self) -> QuizPhase {
        self.phase
    }

    /// 1-based number of the question currently on screen.
    #[must_use]
    pub fn question_number(&self) -> usize {
        self.index + 1
    }

    #[must_use]
    pub fn current_question(&self) -> Option<&Question> {
        self.question.as_ref()
    }

    #[must_use]
    pub fn results(&self) -> &[QuizResult] {
        &self.results
    }

    #[must_use]
    pub fn last_result(&self) -> Option<&QuizResult> {
        self.results.last()
    }

    /// Whole seconds left on the current question's timer.
    #[must_use]
    pub fn remaining_secs(&self, now: DateTime<Utc>) -> u32 {
        let elapsed = self.elapsed_secs(now);
        let timer = f64::from(self.settings.timer_secs);
        (timer - elapsed).max(0.0).ceil() as u32
    }

    #[must_use]
    pub fn time_expired(&self, now: DateTime<Utc>) -> bool {
        self.phase == QuizPhase::AwaitingAnswer
            && self.elapsed_secs(now) >= f64::from(self.settings.timer_secs)
    }

    fn elapsed_secs(&self, now: DateTime<Utc>) -> f64 {
        let millis = (now - self.question_started_at).num_milliseconds();
        (millis.max(0) as f64) / 1000.0
    }

    /// Generate question 1 and start its timer.
    ///
    /// # Errors
    ///
    /// Returns `QuizError::AlreadyStarted` unless the machine is `Idle`.
    pub fn start(&mut self, now: DateTime<Utc>) -> Result<&Question, QuizError> {
        if self.phase != QuizPhase::Idle {
            return Err(QuizError::AlreadyStarted);
        }
        self.issue_question(now);
        self.question.as_ref().ok_or(QuizError::AlreadyStarted)
    }

    /// Record an answer (or a timeout, as `None`) for the current question.
    ///
    /// A timeout is always incorrect. Time taken is wall-clock seconds since
    /// the question was issued, clamped to the per-question timer.
    ///
    /// # Errors
    ///
    /// Returns `QuizError::NotAwaitingAnswer` if the question was already
    /// answered or the session is not running; the second of a
    /// submit/timeout pair lands here and records nothing.
    pub fn submit(
        &mut self,
        answer: Option<i64>,
        now: DateTime<Utc>,
    ) -> Result<&QuizResult, QuizError> {
        if self.phase != QuizPhase::AwaitingAnswer {
            return Err(QuizError::NotAwaitingAnswer);
        }
        let question = self.question.take().ok_or(QuizError::NotAwaitingAnswer)?;

        let time_taken = self
            .elapsed_secs(now)
            .clamp(0.0, f64::from(self.settings.timer_secs));
        let is_correct = answer == Some(question.answer);

        self.results.push(QuizResult {
            question,
            user_answer: answer,
            is_correct,
            time_taken,
        });
        self.phase = QuizPhase::Revealed;
        self.results.last().ok_or(QuizError::NotAwaitingAnswer)
    }

    /// Leave the reveal state: issue the next question, or complete the
    /// session and compute its summary after question `QUESTION_COUNT`.
    ///
    /// # Errors
    ///
    /// Returns `QuizError::NotRevealed` outside the `Revealed` phase.
    pub fn advance(&mut self, now: DateTime<Utc>) -> Result<Option<QuizSummary>, QuizError> {
        if self.phase != QuizPhase::Revealed {
            return Err(QuizError::NotRevealed);
        }

        if self.results.len() >= QUESTION_COUNT {
            self.phase = QuizPhase::Complete;
            let summary = QuizSummary::from_results(self.settings, self.results.clone())?;
            return Ok(Some(summary));
        }

        self.index += 1;
        self.issue_question(now);
        Ok(None)
    }

    fn issue_question(&mut self, now: DateTime<Utc>) {
        self.question = Some(generator::generate(
            self.settings.operation,
            self.settings.stage,
        ));
        self.question_started_at = now;
        self.phase = QuizPhase::AwaitingAnswer;
    }
}

impl fmt::Debug for QuizEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("QuizEngine")
            .field("settings", &self.settings)
            .field("phase", &self.phase)
            .field("index", &self.index)
            .field("results_len", &self.results.len())
            .finish_non_exhaustive()
    }
}

//
// ─── TESTS ────────────────────────────────────────────────────────────────────
//
