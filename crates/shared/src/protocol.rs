use std::collections::HashSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::domain::{
    AnswerValue, Choice, EvaluationId, Question, QuestionId, QuestionKind, RespondentId,
    SubmitReason,
};

/// Response body of `GET /evaluations/{id}/take`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvaluationPayload {
    pub evaluation_id: EvaluationId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub instructions: Option<String>,
    #[serde(default)]
    pub questions: Option<Vec<QuestionPayload>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration_seconds: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration_minutes: Option<i64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuestionPayload {
    pub id: QuestionId,
    pub number: u32,
    pub kind: QuestionKind,
    pub prompt: String,
    #[serde(default)]
    pub choices: Vec<Choice>,
    #[serde(default)]
    pub point_value: f64,
}

/// A validated evaluation, ready to seed a session.
#[derive(Debug, Clone, PartialEq)]
pub struct Evaluation {
    pub evaluation_id: EvaluationId,
    pub title: Option<String>,
    pub instructions: Option<String>,
    pub questions: Vec<Question>,
    pub duration_seconds: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PayloadError {
    #[error("evaluation payload has no questions array")]
    MissingQuestions,
    #[error("evaluation payload has an empty question list")]
    NoQuestions,
    #[error("evaluation payload has no duration")]
    MissingDuration,
    #[error("evaluation duration must be positive, got {0}")]
    NonPositiveDuration(i64),
    #[error("evaluation duration of {0} minutes does not fit in seconds")]
    DurationTooLarge(i64),
    #[error("question numbers must run 1..={expected_len}; found {number} at position {position}")]
    NumberingGap {
        position: usize,
        number: u32,
        expected_len: usize,
    },
    #[error("duplicate question id '{0}'")]
    DuplicateQuestion(QuestionId),
    #[error("question '{0}' has an invalid point value")]
    InvalidPointValue(QuestionId),
    #[error("single-choice question '{0}' has no choices")]
    MissingChoices(QuestionId),
    #[error("question '{0}' is not single-choice but lists choices")]
    UnexpectedChoices(QuestionId),
    #[error("question '{question_id}' repeats choice '{choice_id}'")]
    DuplicateChoice {
        question_id: QuestionId,
        choice_id: String,
    },
}

impl EvaluationPayload {
    pub fn duration_in_seconds(&self) -> Result<u64, PayloadError> {
        match (self.duration_seconds, self.duration_minutes) {
            (Some(seconds), _) if seconds > 0 => Ok(seconds as u64),
            (Some(seconds), _) => Err(PayloadError::NonPositiveDuration(seconds)),
            (None, Some(minutes)) if minutes > 0 => u64::try_from(minutes)
                .ok()
                .and_then(|minutes| minutes.checked_mul(60))
                .ok_or(PayloadError::DurationTooLarge(minutes)),
            (None, Some(minutes)) => Err(PayloadError::NonPositiveDuration(minutes)),
            (None, None) => Err(PayloadError::MissingDuration),
        }
    }

    pub fn into_evaluation(self) -> Result<Evaluation, PayloadError> {
        let duration_seconds = self.duration_in_seconds()?;
        let mut questions = self.questions.ok_or(PayloadError::MissingQuestions)?;
        if questions.is_empty() {
            return Err(PayloadError::NoQuestions);
        }
        questions.sort_by_key(|question| question.number);

        let expected_len = questions.len();
        let mut seen_ids = HashSet::new();
        let mut validated = Vec::with_capacity(expected_len);
        for (position, question) in questions.into_iter().enumerate() {
            if question.number as usize != position + 1 {
                return Err(PayloadError::NumberingGap {
                    position,
                    number: question.number,
                    expected_len,
                });
            }
            if !seen_ids.insert(question.id.clone()) {
                return Err(PayloadError::DuplicateQuestion(question.id));
            }
            validated.push(question.validate()?);
        }

        Ok(Evaluation {
            evaluation_id: self.evaluation_id,
            title: self.title,
            instructions: self.instructions,
            questions: validated,
            duration_seconds,
        })
    }
}

impl QuestionPayload {
    fn validate(self) -> Result<Question, PayloadError> {
        if !self.point_value.is_finite() || self.point_value < 0.0 {
            return Err(PayloadError::InvalidPointValue(self.id));
        }

        match self.kind {
            QuestionKind::SingleChoice if self.choices.is_empty() => {
                return Err(PayloadError::MissingChoices(self.id));
            }
            QuestionKind::SingleChoice => {
                let mut seen = HashSet::new();
                for choice in &self.choices {
                    if !seen.insert(choice.id.clone()) {
                        return Err(PayloadError::DuplicateChoice {
                            question_id: self.id.clone(),
                            choice_id: choice.id.to_string(),
                        });
                    }
                }
            }
            QuestionKind::TrueFalse | QuestionKind::FreeText if !self.choices.is_empty() => {
                return Err(PayloadError::UnexpectedChoices(self.id));
            }
            QuestionKind::TrueFalse | QuestionKind::FreeText => {}
        }

        Ok(Question {
            id: self.id,
            number: self.number,
            kind: self.kind,
            prompt: self.prompt,
            choices: self.choices,
            point_value: self.point_value,
        })
    }
}

/// Body of `POST /evaluations/{id}/submissions`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubmissionRequest {
    pub evaluation_id: EvaluationId,
    pub respondent_id: RespondentId,
    /// Stable for every attempt of one session so a backend can deduplicate retries.
    pub attempt_id: Uuid,
    pub answers: Vec<SubmittedAnswer>,
    pub submitted_at: DateTime<Utc>,
    pub reason: SubmitReason,
}

impl SubmissionRequest {
    pub fn value_for(&self, question_id: &QuestionId) -> Option<&AnswerValue> {
        self.answers
            .iter()
            .find(|answer| &answer.question_id == question_id)
            .and_then(|answer| answer.value.as_ref())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubmittedAnswer {
    pub question_id: QuestionId,
    pub value: Option<AnswerValue>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubmissionAck {
    #[serde(default = "default_accepted")]
    pub accepted: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub submission_id: Option<String>,
}

impl SubmissionAck {
    /// A 2xx response with no body.
    pub fn implicit() -> Self {
        Self {
            accepted: true,
            submission_id: None,
        }
    }
}

fn default_accepted() -> bool {
    true
}

#[cfg(test)]
#[path = "tests/protocol_tests.rs"]
mod tests;
