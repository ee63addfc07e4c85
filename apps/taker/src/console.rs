//! Plain-text rendering for the terminal.

use client_core::{Notification, NotificationSurface, SessionSnapshot, Severity};
use shared::domain::{AnswerValue, Phase, Question, QuestionKind};

pub struct ConsoleNotifier;

impl NotificationSurface for ConsoleNotifier {
    fn notify(&self, notification: Notification) {
        println!("{}", format_notification(&notification));
    }
}

pub fn format_notification(notification: &Notification) -> String {
    let tag = match notification.severity {
        Severity::Info => "info",
        Severity::Warning => "warning",
        Severity::Error if notification.persistent => "error!",
        Severity::Error => "error",
    };
    match &notification.body {
        Some(body) => format!("[{tag}] {}: {body}", notification.title),
        None => format!("[{tag}] {}", notification.title),
    }
}

pub fn phase_label(phase: Phase) -> &'static str {
    match phase {
        Phase::Instructions => "instructions",
        Phase::InProgress => "in progress",
        Phase::TimeExpired => "time expired",
        Phase::Submitting => "submitting",
        Phase::Submitted => "submitted",
    }
}

pub fn render_instructions(title: Option<&str>, instructions: Option<&str>, questions: usize) -> String {
    let mut out = format!("== {} ==\n", title.unwrap_or("Evaluation"));
    if let Some(instructions) = instructions {
        out.push_str(instructions.trim());
        out.push('\n');
    }
    out.push_str(&format!("{questions} questions. Type 'begin' to start the timer."));
    out
}

pub fn render_status(snapshot: &SessionSnapshot) -> String {
    let mut out = format!(
        "[{}] {} left, {}/{} answered ({:.0}%), {:.1}/{:.1} points covered",
        phase_label(snapshot.phase),
        snapshot.remaining_label,
        snapshot.answered_count,
        snapshot.question_count,
        snapshot.completion_ratio * 100.0,
        snapshot.answered_points,
        snapshot.total_points,
    );
    if !snapshot.flagged_numbers.is_empty() {
        let flagged = snapshot
            .flagged_numbers
            .iter()
            .map(u32::to_string)
            .collect::<Vec<_>>()
            .join(", ");
        out.push_str(&format!("\nflagged: {flagged}"));
    }
    if let Some(error) = &snapshot.last_submission_error {
        out.push_str(&format!("\nlast submission failed: {error}"));
    }
    if snapshot.phase != Phase::Instructions {
        let answer = snapshot
            .current_answer
            .as_ref()
            .and_then(|answer| answer.value.as_ref());
        let flagged = snapshot
            .current_answer
            .as_ref()
            .is_some_and(|answer| answer.flagged);
        out.push('\n');
        out.push_str(&render_question(&snapshot.current_question, answer, flagged));
    }
    out
}

pub fn render_question(question: &Question, answer: Option<&AnswerValue>, flagged: bool) -> String {
    let marker = if flagged { " [flagged]" } else { "" };
    let mut out = format!(
        "Q{} ({} pts){marker}: {}",
        question.number, question.point_value, question.prompt
    );
    match question.kind {
        QuestionKind::SingleChoice => {
            for choice in &question.choices {
                let picked = matches!(answer, Some(AnswerValue::Choice(id)) if *id == choice.id);
                let mark = if picked { "*" } else { " " };
                out.push_str(&format!("\n {mark} {}) {}", choice.id, choice.text));
            }
        }
        QuestionKind::TrueFalse => {
            let current = match answer {
                Some(AnswerValue::Boolean(true)) => "true",
                Some(AnswerValue::Boolean(false)) => "false",
                _ => "-",
            };
            out.push_str(&format!("\n   true / false, current: {current}"));
        }
        QuestionKind::FreeText => {
            let current = match answer {
                Some(AnswerValue::FreeText(text)) if !text.trim().is_empty() => text.as_str(),
                _ => "-",
            };
            out.push_str(&format!("\n   your answer: {current}"));
        }
    }
    out
}

#[cfg(test)]
#[path = "tests/console_tests.rs"]
mod tests;
