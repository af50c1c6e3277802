mod engine;
mod runner;

// Public API of the quiz subsystem.
pub use crate::error::QuizError;
pub use engine::{QuizEngine, QuizPhase, QUESTION_COUNT};
pub use runner::{spawn_quiz, QuizCommand, QuizHandle, QuizSnapshot, REVEAL_DELAY};
