//! Drives one session from terminal input: load with retry, then the command loop.

use std::{io::Write, sync::Arc};

use anyhow::{Context, Result};
use client_core::{
    SessionConfig, SessionController, SessionDependencies, SessionError, SessionEvent,
    SubmitOutcome,
};
use shared::domain::{AnswerValue, EvaluationId, Phase, Question, RespondentId, SubmitReason};
use tokio::{
    io::{AsyncBufRead, Lines},
    sync::broadcast::error::RecvError,
};
use tracing::{debug, info, warn};

use crate::console::{phase_label, render_instructions, render_status};

use super::commands::{Command, HELP};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Quit,
}

/// Loads the evaluation. On failure the respondent chooses between `retry`
/// and `quit`; `None` means they left before a session existed.
pub async fn start_session<R, W>(
    deps: &SessionDependencies,
    evaluation_id: EvaluationId,
    respondent_id: RespondentId,
    config: SessionConfig,
    input: &mut Lines<R>,
    out: &mut W,
) -> Result<Option<Arc<SessionController>>>
where
    R: AsyncBufRead + Unpin,
    W: Write,
{
    loop {
        match SessionController::start(deps, evaluation_id, respondent_id, config.clone()).await {
            Ok(controller) => return Ok(Some(controller)),
            Err(err) => {
                writeln!(out, "{err}")?;
                writeln!(out, "type 'retry' to try again or 'quit' to leave")?;
            }
        }

        loop {
            let Some(line) = input.next_line().await.context("failed to read command")? else {
                return Ok(None);
            };
            match Command::parse(&line) {
                Ok(Command::Retry) => break,
                Ok(Command::Quit) => return Ok(None),
                _ => writeln!(out, "the evaluation is not loaded; 'retry' or 'quit'")?,
            }
        }
    }
}

/// Runs commands until the answers are submitted or the respondent quits.
/// Leaving early tears the session down without submitting.
pub async fn run_session<R, W>(
    controller: Arc<SessionController>,
    input: &mut Lines<R>,
    out: &mut W,
) -> Result<()>
where
    R: AsyncBufRead + Unpin,
    W: Write,
{
    let mut events = controller.subscribe_events();
    let evaluation = controller.evaluation();
    writeln!(
        out,
        "{}",
        render_instructions(
            evaluation.title.as_deref(),
            evaluation.instructions.as_deref(),
            evaluation.questions.len()
        )
    )?;

    while controller.phase().await != Phase::Submitted {
        tokio::select! {
            line = input.next_line() => {
                let Some(line) = line.context("failed to read command")? else {
                    break;
                };
                if line.trim().is_empty() {
                    continue;
                }
                let command = match Command::parse(&line) {
                    Ok(command) => command,
                    Err(err) => {
                        writeln!(out, "{err}")?;
                        continue;
                    }
                };
                if dispatch(&controller, command, out).await? == Flow::Quit {
                    break;
                }
            }
            event = events.recv() => match event {
                Ok(SessionEvent::PhaseChanged(phase)) => {
                    writeln!(out, "-- {}", phase_label(phase))?;
                }
                Ok(_) => {}
                Err(RecvError::Lagged(skipped)) => debug!(skipped, "taker: session events lagged"),
                Err(RecvError::Closed) => break,
            },
        }
    }

    let phase = controller.phase().await;
    if phase != Phase::Submitted {
        info!(phase = ?phase, "taker: leaving without submitting");
    }
    controller.teardown().await;
    Ok(())
}

pub async fn dispatch<W: Write>(
    controller: &Arc<SessionController>,
    command: Command,
    out: &mut W,
) -> Result<Flow> {
    let cmd_name = command.name();
    if command == Command::Quit {
        return Ok(Flow::Quit);
    }

    match execute(controller, command).await {
        Ok(Some(reply)) => writeln!(out, "{reply}")?,
        Ok(None) => {}
        // The notifier has already told the respondent.
        Err(err) if err.is_user_facing() => {
            debug!(command = cmd_name, %err, "taker: command failed")
        }
        Err(err) => warn!(command = cmd_name, %err, "taker: command rejected"),
    }
    Ok(Flow::Continue)
}

async fn execute(
    controller: &Arc<SessionController>,
    command: Command,
) -> Result<Option<String>, SessionError> {
    match command {
        Command::Begin => {
            if controller.begin().await {
                Ok(Some(render_status(&controller.snapshot().await)))
            } else {
                Ok(Some("the evaluation has already started".into()))
            }
        }
        Command::Answer { number, value } => {
            let question = question_at(controller, number)?;
            let value = match AnswerValue::parse_for(question, &value) {
                Ok(value) => value,
                Err(hint) => return Ok(Some(hint)),
            };
            let cleared = value.is_none();
            if !controller.set_answer(&question.id, value).await? {
                return Ok(Some(locked_reply(controller).await));
            }
            Ok(Some(if cleared {
                format!("cleared question {number}")
            } else {
                format!("saved answer to question {number}")
            }))
        }
        Command::Flag { number } => {
            let question = question_at(controller, number)?;
            Ok(Some(match controller.toggle_flag(&question.id).await? {
                Some(true) => format!("flagged question {number}"),
                Some(false) => format!("unflagged question {number}"),
                None => locked_reply(controller).await,
            }))
        }
        Command::Goto { number } => navigated(controller, controller.go_to(number - 1).await?).await,
        Command::Next => navigated(controller, controller.next().await?).await,
        Command::Prev => navigated(controller, controller.previous().await?).await,
        Command::Status => Ok(Some(render_status(&controller.snapshot().await))),
        Command::Submit => match controller.submit(SubmitReason::Manual).await? {
            SubmitOutcome::Submitted(ack) => Ok(ack
                .submission_id
                .map(|submission_id| format!("receipt: {submission_id}"))),
            SubmitOutcome::Ignored => Ok(Some(format!(
                "nothing to submit while {}",
                phase_label(controller.phase().await)
            ))),
        },
        Command::Retry => Ok(Some("the evaluation is already loaded".into())),
        Command::Help => Ok(Some(HELP.into())),
        Command::Quit => Ok(None),
    }
}

fn question_at(controller: &SessionController, number: usize) -> Result<&Question, SessionError> {
    let questions = controller.questions();
    number
        .checked_sub(1)
        .and_then(|index| questions.get(index))
        .ok_or(SessionError::OutOfRange {
            requested: number as i64 - 1,
            len: questions.len(),
        })
}

async fn navigated(
    controller: &SessionController,
    moved: bool,
) -> Result<Option<String>, SessionError> {
    if !moved {
        return Ok(Some(locked_reply(controller).await));
    }
    Ok(Some(render_status(&controller.snapshot().await)))
}

async fn locked_reply(controller: &SessionController) -> String {
    format!("not available while {}", phase_label(controller.phase().await))
}

#[cfg(test)]
#[path = "../tests/orchestration_tests.rs"]
mod tests;
