mod attempt;
mod ids;
mod quiz;
mod user;

pub use attempt::{AttemptError, AttemptRecord};
pub use ids::UserId;
pub use quiz::{
    Operation, Question, QuizResult, QuizSettings, QuizSummary, QuizSummaryError,
};
pub use user::{Role, RoleParseError, User, UserError};
