#![forbid(unsafe_code)]

pub mod controller;
pub mod error;
pub mod nav;
pub mod quiz;

pub use quiz_core::Clock;

pub use controller::{ControllerState, NewUser, SessionController};
pub use error::{ControllerError, DeleteUserError, QuizError, SignUpError};
pub use nav::View;
pub use quiz::{
    spawn_quiz, QuizEngine, QuizHandle, QuizPhase, QuizSnapshot, QUESTION_COUNT, REVEAL_DELAY,
};
