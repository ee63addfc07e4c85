use super::*;
use shared::domain::{Choice, ChoiceId, QuestionId};

fn choice_question() -> Question {
    Question {
        id: QuestionId::new("q1"),
        number: 1,
        kind: QuestionKind::SingleChoice,
        prompt: "Capital of Peru?".into(),
        choices: vec![
            Choice {
                id: ChoiceId::new("a"),
                text: "Quito".into(),
            },
            Choice {
                id: ChoiceId::new("b"),
                text: "Lima".into(),
            },
        ],
        point_value: 2.0,
    }
}

#[test]
fn persistent_errors_are_marked() {
    let transient = Notification::error("Submission failed").with_body("HTTP 503");
    let pinned = Notification::error("Automatic submission failed").persistent();

    assert_eq!(
        format_notification(&transient),
        "[error] Submission failed: HTTP 503"
    );
    assert_eq!(
        format_notification(&pinned),
        "[error!] Automatic submission failed"
    );
    assert_eq!(
        format_notification(&Notification::warning("5 minutes remaining")),
        "[warning] 5 minutes remaining"
    );
}

#[test]
fn selected_choice_is_starred() {
    let picked = AnswerValue::Choice(ChoiceId::new("b"));
    let rendered = render_question(&choice_question(), Some(&picked), true);

    assert!(rendered.starts_with("Q1 (2 pts) [flagged]: Capital of Peru?"));
    assert!(rendered.contains("   a) Quito"));
    assert!(rendered.contains(" * b) Lima"));
}

#[test]
fn instructions_prompt_mentions_begin() {
    let rendered = render_instructions(Some("Geography"), Some("  No notes.  "), 3);
    assert_eq!(
        rendered,
        "== Geography ==\nNo notes.\n3 questions. Type 'begin' to start the timer."
    );
}
