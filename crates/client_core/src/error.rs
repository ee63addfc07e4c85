use shared::domain::{QuestionId, QuestionKind};
use thiserror::Error;

/// Why an evaluation could not be fetched. Every variant blocks entry into the session.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LoadFailure {
    #[error("evaluation not found")]
    NotFound,
    #[error("not authorized to take this evaluation")]
    Unauthorized,
    #[error("malformed evaluation payload: {0}")]
    Malformed(String),
    #[error("evaluation source unreachable: {0}")]
    Unreachable(String),
}

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("failed to load evaluation: {0}")]
    Load(#[from] LoadFailure),
    #[error("question '{0}' is not part of this evaluation")]
    InvalidReference(QuestionId),
    #[error("answer for question '{question_id}' does not fit a {kind:?} question")]
    InvalidValue {
        question_id: QuestionId,
        kind: QuestionKind,
    },
    #[error("question index {requested} is out of range for {len} questions")]
    OutOfRange { requested: i64, len: usize },
    #[error("submission failed: {0}")]
    Submission(String),
}

impl SessionError {
    /// Load and submission failures reach the respondent; the rest are
    /// invariant violations that only ever get logged.
    pub fn is_user_facing(&self) -> bool {
        matches!(self, SessionError::Load(_) | SessionError::Submission(_))
    }
}
