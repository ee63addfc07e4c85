use serde::{Deserialize, Serialize};

macro_rules! id_newtype {
    ($name:ident) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub i64);
    };
}

macro_rules! key_newtype {
    ($name:ident) => {
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub String);

        impl $name {
            pub fn new(value: impl Into<String>) -> Self {
                Self(value.into())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(&self.0)
            }
        }
    };
}

id_newtype!(EvaluationId);
id_newtype!(RespondentId);
key_newtype!(QuestionId);
key_newtype!(ChoiceId);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuestionKind {
    SingleChoice,
    TrueFalse,
    FreeText,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Choice {
    pub id: ChoiceId,
    pub text: String,
}

/// One assessable item, fixed for the lifetime of a session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Question {
    pub id: QuestionId,
    /// 1-based display order, equal to the position in the evaluation plus one.
    pub number: u32,
    pub kind: QuestionKind,
    pub prompt: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub choices: Vec<Choice>,
    pub point_value: f64,
}

impl Question {
    pub fn has_choice(&self, choice_id: &ChoiceId) -> bool {
        self.choices.iter().any(|choice| &choice.id == choice_id)
    }
}

/// A respondent's value for one question. Absence is modelled as `Option::None`
/// on the owning [`Answer`], never as a variant here.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum AnswerValue {
    Choice(ChoiceId),
    Boolean(bool),
    FreeText(String),
}

impl AnswerValue {
    /// Empty free text counts as unanswered for completion accounting.
    pub fn is_filled(&self) -> bool {
        match self {
            AnswerValue::Choice(choice_id) => !choice_id.as_str().trim().is_empty(),
            AnswerValue::Boolean(_) => true,
            AnswerValue::FreeText(text) => !text.trim().is_empty(),
        }
    }

    pub fn fits(&self, question: &Question) -> bool {
        match (self, question.kind) {
            (AnswerValue::Choice(choice_id), QuestionKind::SingleChoice) => {
                question.has_choice(choice_id)
            }
            (AnswerValue::Boolean(_), QuestionKind::TrueFalse) => true,
            (AnswerValue::FreeText(_), QuestionKind::FreeText) => true,
            _ => false,
        }
    }

    /// Parses respondent input according to the question kind. Empty input
    /// yields `Ok(None)`, meaning "clear the answer".
    pub fn parse_for(question: &Question, raw: &str) -> Result<Option<Self>, String> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Ok(None);
        }

        match question.kind {
            QuestionKind::SingleChoice => {
                let choice_id = ChoiceId::new(trimmed);
                if question.has_choice(&choice_id) {
                    Ok(Some(AnswerValue::Choice(choice_id)))
                } else {
                    let options = question
                        .choices
                        .iter()
                        .map(|choice| choice.id.as_str())
                        .collect::<Vec<_>>()
                        .join(", ");
                    Err(format!("'{trimmed}' is not one of: {options}"))
                }
            }
            QuestionKind::TrueFalse => match trimmed.to_ascii_lowercase().as_str() {
                "true" | "t" | "yes" | "y" => Ok(Some(AnswerValue::Boolean(true))),
                "false" | "f" | "no" | "n" => Ok(Some(AnswerValue::Boolean(false))),
                _ => Err(format!("'{trimmed}' is not true or false")),
            },
            QuestionKind::FreeText => Ok(Some(AnswerValue::FreeText(raw.to_string()))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Answer {
    pub question_id: QuestionId,
    #[serde(default)]
    pub value: Option<AnswerValue>,
    #[serde(default)]
    pub flagged: bool,
}

impl Answer {
    pub fn empty(question_id: QuestionId) -> Self {
        Self {
            question_id,
            value: None,
            flagged: false,
        }
    }

    pub fn is_answered(&self) -> bool {
        self.value.as_ref().is_some_and(AnswerValue::is_filled)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Instructions,
    InProgress,
    TimeExpired,
    Submitting,
    Submitted,
}

impl Phase {
    pub fn accepts_answers(self) -> bool {
        self == Phase::InProgress
    }

    pub fn allows_navigation(self) -> bool {
        matches!(self, Phase::InProgress | Phase::TimeExpired)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubmitReason {
    Manual,
    TimeExpired,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn single_choice() -> Question {
        Question {
            id: QuestionId::new("q1"),
            number: 1,
            kind: QuestionKind::SingleChoice,
            prompt: "Pick one".into(),
            choices: vec![
                Choice {
                    id: ChoiceId::new("a"),
                    text: "Alpha".into(),
                },
                Choice {
                    id: ChoiceId::new("b"),
                    text: "Beta".into(),
                },
            ],
            point_value: 2.0,
        }
    }

    #[test]
    fn blank_free_text_is_not_filled() {
        assert!(!AnswerValue::FreeText("   ".into()).is_filled());
        assert!(AnswerValue::FreeText("photosynthesis".into()).is_filled());
        assert!(AnswerValue::Boolean(false).is_filled());
    }

    #[test]
    fn value_must_match_question_kind() {
        let question = single_choice();
        assert!(AnswerValue::Choice(ChoiceId::new("b")).fits(&question));
        assert!(!AnswerValue::Choice(ChoiceId::new("z")).fits(&question));
        assert!(!AnswerValue::Boolean(true).fits(&question));
        assert!(!AnswerValue::FreeText("b".into()).fits(&question));
    }

    #[test]
    fn parse_for_rejects_unknown_choice_and_clears_on_empty() {
        let question = single_choice();
        assert_eq!(
            AnswerValue::parse_for(&question, " b "),
            Ok(Some(AnswerValue::Choice(ChoiceId::new("b"))))
        );
        assert_eq!(AnswerValue::parse_for(&question, ""), Ok(None));
        let err = AnswerValue::parse_for(&question, "c").expect_err("unknown choice");
        assert!(err.contains("a, b"), "unexpected error: {err}");
    }

    #[test]
    fn answer_value_wire_shape_is_tagged() {
        let json = serde_json::to_value(AnswerValue::Choice(ChoiceId::new("b"))).expect("json");
        assert_eq!(json, serde_json::json!({"type": "choice", "value": "b"}));

        let decoded: AnswerValue =
            serde_json::from_value(serde_json::json!({"type": "boolean", "value": true}))
                .expect("decode");
        assert_eq!(decoded, AnswerValue::Boolean(true));
    }

    #[test]
    fn flagged_answer_without_value_is_unanswered() {
        let mut answer = Answer::empty(QuestionId::new("q2"));
        answer.flagged = true;
        assert!(!answer.is_answered());
    }
}
