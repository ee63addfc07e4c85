use super::*;
use crate::domain::ChoiceId;
use serde_json::json;

fn payload(value: serde_json::Value) -> EvaluationPayload {
    serde_json::from_value(value).expect("payload json")
}

fn three_question_payload() -> serde_json::Value {
    json!({
        "evaluation_id": 42,
        "title": "Biology midterm",
        "duration_minutes": 10,
        "questions": [
            {"id": "q2", "number": 2, "kind": "true_false", "prompt": "Cells have walls", "point_value": 1},
            {"id": "q1", "number": 1, "kind": "single_choice", "prompt": "Pick", "point_value": 2,
             "choices": [{"id": "a", "text": "Alpha"}, {"id": "b", "text": "Beta"}]},
            {"id": "q3", "number": 3, "kind": "free_text", "prompt": "Explain", "point_value": 5}
        ]
    })
}

#[test]
fn minutes_are_converted_and_questions_ordered_by_number() {
    let evaluation = payload(three_question_payload())
        .into_evaluation()
        .expect("valid payload");

    assert_eq!(evaluation.duration_seconds, 600);
    assert_eq!(evaluation.evaluation_id, EvaluationId(42));
    let ids: Vec<_> = evaluation
        .questions
        .iter()
        .map(|question| question.id.as_str().to_string())
        .collect();
    assert_eq!(ids, vec!["q1", "q2", "q3"]);
    assert_eq!(evaluation.questions[0].choices.len(), 2);
}

#[test]
fn seconds_take_precedence_over_minutes() {
    let mut value = three_question_payload();
    value["duration_seconds"] = json!(90);
    let evaluation = payload(value).into_evaluation().expect("valid payload");
    assert_eq!(evaluation.duration_seconds, 90);
}

#[test]
fn missing_questions_array_is_malformed() {
    let mut value = three_question_payload();
    value.as_object_mut().expect("object").remove("questions");
    assert_eq!(
        payload(value).into_evaluation(),
        Err(PayloadError::MissingQuestions)
    );
}

#[test]
fn non_positive_or_missing_duration_is_malformed() {
    let mut value = three_question_payload();
    value["duration_minutes"] = json!(0);
    assert_eq!(
        payload(value.clone()).into_evaluation(),
        Err(PayloadError::NonPositiveDuration(0))
    );

    value.as_object_mut().expect("object").remove("duration_minutes");
    assert_eq!(
        payload(value).into_evaluation(),
        Err(PayloadError::MissingDuration)
    );
}

#[test]
fn oversized_minute_duration_is_malformed() {
    let mut value = three_question_payload();
    value["duration_minutes"] = json!(i64::MAX);
    assert_eq!(
        payload(value.clone()).into_evaluation(),
        Err(PayloadError::DurationTooLarge(i64::MAX))
    );

    value["duration_minutes"] = json!(i64::MAX / 60);
    let evaluation = payload(value).into_evaluation().expect("largest convertible duration");
    assert_eq!(evaluation.duration_seconds, (i64::MAX / 60) as u64 * 60);
}

#[test]
fn numbering_gaps_and_duplicate_ids_are_rejected() {
    let mut value = three_question_payload();
    value["questions"][2]["number"] = json!(4);
    assert!(matches!(
        payload(value).into_evaluation(),
        Err(PayloadError::NumberingGap { number: 4, .. })
    ));

    let mut value = three_question_payload();
    value["questions"][2]["id"] = json!("q1");
    assert_eq!(
        payload(value).into_evaluation(),
        Err(PayloadError::DuplicateQuestion(QuestionId::new("q1")))
    );
}

#[test]
fn choices_must_match_question_kind() {
    let mut value = three_question_payload();
    value["questions"][1]["choices"] = json!([]);
    assert_eq!(
        payload(value).into_evaluation(),
        Err(PayloadError::MissingChoices(QuestionId::new("q1")))
    );

    let mut value = three_question_payload();
    value["questions"][0]["choices"] = json!([{"id": "x", "text": "X"}]);
    assert_eq!(
        payload(value).into_evaluation(),
        Err(PayloadError::UnexpectedChoices(QuestionId::new("q2")))
    );
}

#[test]
fn negative_point_values_are_rejected() {
    let mut value = three_question_payload();
    value["questions"][2]["point_value"] = json!(-1);
    assert_eq!(
        payload(value).into_evaluation(),
        Err(PayloadError::InvalidPointValue(QuestionId::new("q3")))
    );
}

#[test]
fn submission_request_serializes_absent_answers_as_null() {
    let request = SubmissionRequest {
        evaluation_id: EvaluationId(42),
        respondent_id: RespondentId(7),
        attempt_id: Uuid::nil(),
        answers: vec![
            SubmittedAnswer {
                question_id: QuestionId::new("q1"),
                value: Some(AnswerValue::Choice(ChoiceId::new("b"))),
            },
            SubmittedAnswer {
                question_id: QuestionId::new("q2"),
                value: None,
            },
        ],
        submitted_at: "2024-01-01T00:00:00Z".parse().expect("timestamp"),
        reason: SubmitReason::TimeExpired,
    };

    let json = serde_json::to_value(&request).expect("json");
    assert_eq!(json["reason"], "time_expired");
    assert_eq!(json["answers"][0]["value"], json!({"type": "choice", "value": "b"}));
    assert!(json["answers"][1]["value"].is_null());
    assert_eq!(
        request.value_for(&QuestionId::new("q1")),
        Some(&AnswerValue::Choice(ChoiceId::new("b")))
    );
}

#[test]
fn ack_defaults_to_accepted() {
    let ack: SubmissionAck = serde_json::from_value(json!({"submission_id": "s-1"})).expect("ack");
    assert!(ack.accepted);
    assert_eq!(ack.submission_id.as_deref(), Some("s-1"));
}
