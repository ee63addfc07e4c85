//! Timed session controller: owns one respondent's attempt at one evaluation,
//! drives the countdown, and guarantees at most one submission in flight.

use std::{
    collections::HashMap,
    sync::{Arc, Weak},
    time::Duration,
};

use chrono::Utc;
use shared::{
    domain::{
        Answer, AnswerValue, EvaluationId, Phase, Question, QuestionId, RespondentId, SubmitReason,
    },
    protocol::{Evaluation, SubmissionAck, SubmissionRequest, SubmittedAnswer},
};
use tokio::sync::{broadcast, Mutex};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::{
    error::{LoadFailure, SessionError},
    timer::{Countdown, DelayedTask, TickFlow},
    EvaluationSource, Notification, NotificationSurface, SubmissionSink,
};

const TIME_WARNING_TITLE: &str = "5 minutes remaining";
const TIME_EXPIRED_TITLE: &str = "Time is up";
const SUBMITTED_TITLE: &str = "Answers submitted";
const SUBMISSION_FAILED_TITLE: &str = "Submission failed";
const AUTO_SUBMISSION_FAILED_TITLE: &str = "Automatic submission failed";
const LOAD_FAILED_TITLE: &str = "Could not load evaluation";

#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub tick_period: Duration,
    /// Pause between entering TimeExpired and the automatic submission.
    pub grace_delay: Duration,
    /// Pause before the single automatic retry of a failed timed-out submission.
    pub auto_retry_delay: Duration,
    pub warning_threshold_seconds: u64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            tick_period: Duration::from_secs(1),
            grace_delay: Duration::from_secs(3),
            auto_retry_delay: Duration::from_secs(3),
            warning_threshold_seconds: 300,
        }
    }
}

#[derive(Clone)]
pub struct SessionDependencies {
    pub source: Arc<dyn EvaluationSource>,
    pub sink: Arc<dyn SubmissionSink>,
    pub notifier: Arc<dyn NotificationSurface>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    PhaseChanged(Phase),
    Tick { remaining_seconds: u64 },
    AnswerChanged { question_id: QuestionId },
    Navigated { index: usize },
    Submitted { reason: SubmitReason },
    SubmissionFailed { message: String },
}

#[derive(Debug, Clone, PartialEq)]
pub enum SubmitOutcome {
    Submitted(SubmissionAck),
    /// Another submission is in flight or done, or the phase does not allow one.
    Ignored,
}

/// Read-only view of the session for rendering.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionSnapshot {
    pub evaluation_id: EvaluationId,
    pub respondent_id: RespondentId,
    pub title: Option<String>,
    pub phase: Phase,
    pub current_index: usize,
    pub current_question: Question,
    pub current_answer: Option<Answer>,
    pub remaining_seconds: u64,
    pub remaining_label: String,
    pub answered_count: usize,
    pub question_count: usize,
    pub completion_ratio: f64,
    pub flagged_numbers: Vec<u32>,
    pub total_points: f64,
    pub answered_points: f64,
    pub last_submission_error: Option<String>,
}

struct SessionState {
    phase: Phase,
    answers: HashMap<QuestionId, Answer>,
    current_index: usize,
    remaining_seconds: u64,
    warning_sent: bool,
    torn_down: bool,
    last_submission_error: Option<String>,
    countdown: Option<Countdown>,
    auto_submit: Option<DelayedTask>,
}

impl SessionState {
    fn answered_count(&self) -> usize {
        self.answers.values().filter(|answer| answer.is_answered()).count()
    }

    fn stop_countdown(&mut self) {
        if let Some(countdown) = self.countdown.take() {
            countdown.cancel();
        }
    }
}

pub struct SessionController {
    evaluation: Evaluation,
    respondent_id: RespondentId,
    attempt_id: Uuid,
    question_index: HashMap<QuestionId, usize>,
    config: SessionConfig,
    sink: Arc<dyn SubmissionSink>,
    notifier: Arc<dyn NotificationSurface>,
    inner: Mutex<SessionState>,
    events: broadcast::Sender<SessionEvent>,
}

impl SessionController {
    /// Fetches the evaluation once. A failure is reported to the respondent
    /// and no session is created; calling `start` again is the retry.
    pub async fn start(
        deps: &SessionDependencies,
        evaluation_id: EvaluationId,
        respondent_id: RespondentId,
        config: SessionConfig,
    ) -> Result<Arc<Self>, SessionError> {
        let fetched = deps
            .source
            .fetch_evaluation(evaluation_id)
            .await
            .and_then(|evaluation| ensure_questions(&evaluation).map(|()| evaluation));
        let evaluation = match fetched {
            Ok(evaluation) => evaluation,
            Err(failure) => {
                warn!(
                    "session: load failed evaluation={} respondent={} err={failure}",
                    evaluation_id.0, respondent_id.0
                );
                deps.notifier.notify(
                    Notification::error(LOAD_FAILED_TITLE)
                        .with_body(failure.to_string())
                        .persistent(),
                );
                return Err(SessionError::Load(failure));
            }
        };

        info!(
            "session: loaded evaluation={} respondent={} questions={} duration_seconds={}",
            evaluation.evaluation_id.0,
            respondent_id.0,
            evaluation.questions.len(),
            evaluation.duration_seconds
        );

        Self::from_evaluation(evaluation, respondent_id, deps, config)
    }

    /// Seeds a session from an already fetched evaluation. An evaluation
    /// without questions is rejected as malformed.
    pub fn from_evaluation(
        evaluation: Evaluation,
        respondent_id: RespondentId,
        deps: &SessionDependencies,
        config: SessionConfig,
    ) -> Result<Arc<Self>, SessionError> {
        ensure_questions(&evaluation)?;
        let question_index = evaluation
            .questions
            .iter()
            .enumerate()
            .map(|(index, question)| (question.id.clone(), index))
            .collect();
        let remaining_seconds = evaluation.duration_seconds;
        let warning_sent = remaining_seconds <= config.warning_threshold_seconds;
        let (events, _) = broadcast::channel(256);

        Ok(Arc::new(Self {
            evaluation,
            respondent_id,
            attempt_id: Uuid::new_v4(),
            question_index,
            config,
            sink: Arc::clone(&deps.sink),
            notifier: Arc::clone(&deps.notifier),
            inner: Mutex::new(SessionState {
                phase: Phase::Instructions,
                answers: HashMap::new(),
                current_index: 0,
                remaining_seconds,
                warning_sent,
                torn_down: false,
                last_submission_error: None,
                countdown: None,
                auto_submit: None,
            }),
            events,
        }))
    }

    pub fn evaluation(&self) -> &Evaluation {
        &self.evaluation
    }

    pub fn questions(&self) -> &[Question] {
        &self.evaluation.questions
    }

    pub fn respondent_id(&self) -> RespondentId {
        self.respondent_id
    }

    pub fn attempt_id(&self) -> Uuid {
        self.attempt_id
    }

    pub fn subscribe_events(&self) -> broadcast::Receiver<SessionEvent> {
        self.events.subscribe()
    }

    pub async fn phase(&self) -> Phase {
        self.inner.lock().await.phase
    }

    pub async fn remaining_seconds(&self) -> u64 {
        self.inner.lock().await.remaining_seconds
    }

    pub async fn current_index(&self) -> usize {
        self.inner.lock().await.current_index
    }

    pub async fn answers(&self) -> HashMap<QuestionId, Answer> {
        self.inner.lock().await.answers.clone()
    }

    /// Leaves the instructions screen and starts the countdown. Ignored in any
    /// other phase.
    pub async fn begin(self: &Arc<Self>) -> bool {
        let mut state = self.inner.lock().await;
        if state.torn_down || state.phase != Phase::Instructions {
            debug!("session: begin ignored phase={:?}", state.phase);
            return false;
        }

        state.phase = Phase::InProgress;
        state.countdown = Some(self.arm_countdown());
        info!(
            "session: started evaluation={} respondent={} remaining_seconds={}",
            self.evaluation.evaluation_id.0, self.respondent_id.0, state.remaining_seconds
        );
        self.emit(SessionEvent::PhaseChanged(Phase::InProgress));
        true
    }

    /// Upserts the value for one question, keeping its flag. Returns `Ok(false)`
    /// when the phase does not accept answers; nothing changes in that case.
    pub async fn set_answer(
        &self,
        question_id: &QuestionId,
        value: Option<AnswerValue>,
    ) -> Result<bool, SessionError> {
        let mut state = self.inner.lock().await;
        if state.torn_down || !state.phase.accepts_answers() {
            debug!(
                "session: set_answer ignored question={question_id} phase={:?}",
                state.phase
            );
            return Ok(false);
        }

        let question = self.question(question_id)?;
        if let Some(value) = &value {
            if !value.fits(question) {
                warn!("session: answer kind mismatch question={question_id}");
                return Err(SessionError::InvalidValue {
                    question_id: question_id.clone(),
                    kind: question.kind,
                });
            }
        }

        state
            .answers
            .entry(question_id.clone())
            .or_insert_with(|| Answer::empty(question_id.clone()))
            .value = value;
        self.emit(SessionEvent::AnswerChanged {
            question_id: question_id.clone(),
        });
        Ok(true)
    }

    /// Flips the review flag, creating an unanswered record if needed. Returns
    /// the new flag, or `None` when the phase does not accept changes.
    pub async fn toggle_flag(&self, question_id: &QuestionId) -> Result<Option<bool>, SessionError> {
        let mut state = self.inner.lock().await;
        if state.torn_down || !state.phase.accepts_answers() {
            debug!(
                "session: toggle_flag ignored question={question_id} phase={:?}",
                state.phase
            );
            return Ok(None);
        }

        self.question(question_id)?;
        let answer = state
            .answers
            .entry(question_id.clone())
            .or_insert_with(|| Answer::empty(question_id.clone()));
        answer.flagged = !answer.flagged;
        let flagged = answer.flagged;
        self.emit(SessionEvent::AnswerChanged {
            question_id: question_id.clone(),
        });
        Ok(Some(flagged))
    }

    pub async fn go_to(&self, index: usize) -> Result<bool, SessionError> {
        self.navigate(|_| index as i64).await
    }

    pub async fn next(&self) -> Result<bool, SessionError> {
        self.navigate(|current| current as i64 + 1).await
    }

    pub async fn previous(&self) -> Result<bool, SessionError> {
        self.navigate(|current| current as i64 - 1).await
    }

    async fn navigate(&self, target: impl FnOnce(usize) -> i64) -> Result<bool, SessionError> {
        let mut state = self.inner.lock().await;
        if state.torn_down || !state.phase.allows_navigation() {
            debug!("session: navigation ignored phase={:?}", state.phase);
            return Ok(false);
        }

        let len = self.evaluation.questions.len();
        let requested = target(state.current_index);
        if requested < 0 || requested as usize >= len {
            warn!("session: navigation out of range requested={requested} len={len}");
            return Err(SessionError::OutOfRange { requested, len });
        }

        state.current_index = requested as usize;
        self.emit(SessionEvent::Navigated {
            index: state.current_index,
        });
        Ok(true)
    }

    pub async fn completion_ratio(&self) -> f64 {
        let state = self.inner.lock().await;
        state.answered_count() as f64 / self.evaluation.questions.len() as f64
    }

    pub async fn snapshot(&self) -> SessionSnapshot {
        let state = self.inner.lock().await;
        let questions = &self.evaluation.questions;
        let current_question = questions[state.current_index].clone();
        let current_answer = state.answers.get(&current_question.id).cloned();
        let answered_count = state.answered_count();

        let mut flagged_numbers = Vec::new();
        let mut answered_points = 0.0;
        for question in questions {
            if let Some(answer) = state.answers.get(&question.id) {
                if answer.flagged {
                    flagged_numbers.push(question.number);
                }
                if answer.is_answered() {
                    answered_points += question.point_value;
                }
            }
        }

        SessionSnapshot {
            evaluation_id: self.evaluation.evaluation_id,
            respondent_id: self.respondent_id,
            title: self.evaluation.title.clone(),
            phase: state.phase,
            current_index: state.current_index,
            current_question,
            current_answer,
            remaining_seconds: state.remaining_seconds,
            remaining_label: format_remaining(state.remaining_seconds),
            answered_count,
            question_count: questions.len(),
            completion_ratio: answered_count as f64 / questions.len() as f64,
            flagged_numbers,
            total_points: questions.iter().map(|question| question.point_value).sum(),
            answered_points,
            last_submission_error: state.last_submission_error.clone(),
        }
    }

    /// Single-flight submission. The phase check and the move to Submitting
    /// happen under one lock, so a timer-fired call racing a manual one sends
    /// exactly one request.
    pub async fn submit(
        self: &Arc<Self>,
        reason: SubmitReason,
    ) -> Result<SubmitOutcome, SessionError> {
        let (request, resume_phase) = {
            let mut state = self.inner.lock().await;
            if state.torn_down {
                return Ok(SubmitOutcome::Ignored);
            }
            let resume_phase = match (state.phase, reason) {
                (Phase::InProgress, SubmitReason::Manual) => Phase::InProgress,
                (Phase::TimeExpired, _) => Phase::TimeExpired,
                (phase, reason) => {
                    debug!("session: submit ignored phase={phase:?} reason={reason:?}");
                    return Ok(SubmitOutcome::Ignored);
                }
            };
            // A retry after the deadline still reports the timeout.
            let reason = if resume_phase == Phase::TimeExpired {
                SubmitReason::TimeExpired
            } else {
                reason
            };

            state.phase = Phase::Submitting;
            state.stop_countdown();
            self.emit(SessionEvent::PhaseChanged(Phase::Submitting));
            (self.build_request(&state, reason), resume_phase)
        };

        info!(
            "session: submitting evaluation={} respondent={} attempt={} reason={:?}",
            request.evaluation_id.0, request.respondent_id.0, request.attempt_id, request.reason
        );

        let failure = match self.sink.submit(&request).await {
            Ok(ack) if ack.accepted => {
                let mut state = self.inner.lock().await;
                state.phase = Phase::Submitted;
                state.last_submission_error = None;
                info!(
                    "session: submitted evaluation={} respondent={} submission_id={:?}",
                    request.evaluation_id.0, request.respondent_id.0, ack.submission_id
                );
                self.emit(SessionEvent::PhaseChanged(Phase::Submitted));
                self.emit(SessionEvent::Submitted {
                    reason: request.reason,
                });
                self.notifier.notify(Notification::info(SUBMITTED_TITLE));
                return Ok(SubmitOutcome::Submitted(ack));
            }
            Ok(_) => "submission was not accepted".to_string(),
            Err(err) => format!("{err:#}"),
        };

        let mut state = self.inner.lock().await;
        warn!(
            "session: submission failed evaluation={} respondent={} err={failure}",
            request.evaluation_id.0, request.respondent_id.0
        );
        if state.torn_down {
            return Err(SessionError::Submission(failure));
        }

        state.phase = resume_phase;
        if resume_phase == Phase::InProgress {
            state.countdown = Some(self.arm_countdown());
        }
        state.last_submission_error = Some(failure.clone());
        self.emit(SessionEvent::PhaseChanged(resume_phase));
        self.emit(SessionEvent::SubmissionFailed {
            message: failure.clone(),
        });
        self.notifier
            .notify(Notification::error(SUBMISSION_FAILED_TITLE).with_body(failure.clone()));
        Err(SessionError::Submission(failure))
    }

    /// Stops driving the session. The countdown and any automatic submission
    /// still waiting out its delay are cancelled; a request already sent is
    /// left to finish.
    pub async fn teardown(&self) {
        let mut state = self.inner.lock().await;
        if state.torn_down {
            return;
        }
        state.torn_down = true;
        state.stop_countdown();
        if let Some(auto_submit) = state.auto_submit.take() {
            // Past the grace delay the automatic request is already on the wire.
            if state.phase == Phase::Submitting {
                auto_submit.detach();
            }
        }
        info!(
            "session: torn down evaluation={} respondent={} phase={:?}",
            self.evaluation.evaluation_id.0, self.respondent_id.0, state.phase
        );
    }

    fn question(&self, question_id: &QuestionId) -> Result<&Question, SessionError> {
        match self.question_index.get(question_id) {
            Some(&index) => Ok(&self.evaluation.questions[index]),
            None => {
                warn!("session: unknown question reference question={question_id}");
                Err(SessionError::InvalidReference(question_id.clone()))
            }
        }
    }

    fn build_request(&self, state: &SessionState, reason: SubmitReason) -> SubmissionRequest {
        let answers = self
            .evaluation
            .questions
            .iter()
            .map(|question| SubmittedAnswer {
                question_id: question.id.clone(),
                value: state
                    .answers
                    .get(&question.id)
                    .and_then(|answer| answer.value.clone())
                    .filter(AnswerValue::is_filled),
            })
            .collect();

        SubmissionRequest {
            evaluation_id: self.evaluation.evaluation_id,
            respondent_id: self.respondent_id,
            attempt_id: self.attempt_id,
            answers,
            submitted_at: Utc::now(),
            reason,
        }
    }

    fn emit(&self, event: SessionEvent) {
        let _ = self.events.send(event);
    }

    fn arm_countdown(self: &Arc<Self>) -> Countdown {
        let weak = Arc::downgrade(self);
        Countdown::spawn(self.config.tick_period, move || {
            let weak = Weak::clone(&weak);
            async move {
                match weak.upgrade() {
                    Some(controller) => controller.on_tick().await,
                    None => TickFlow::Stop,
                }
            }
        })
    }

    async fn on_tick(self: &Arc<Self>) -> TickFlow {
        let mut state = self.inner.lock().await;
        if state.torn_down || state.phase != Phase::InProgress {
            return TickFlow::Stop;
        }

        state.remaining_seconds = state.remaining_seconds.saturating_sub(1);
        let remaining_seconds = state.remaining_seconds;
        debug!("session: tick remaining_seconds={remaining_seconds}");
        self.emit(SessionEvent::Tick { remaining_seconds });

        if remaining_seconds == 0 {
            state.phase = Phase::TimeExpired;
            if let Some(countdown) = state.countdown.take() {
                countdown.release();
            }
            info!(
                "session: time expired evaluation={} respondent={}",
                self.evaluation.evaluation_id.0, self.respondent_id.0
            );
            self.emit(SessionEvent::PhaseChanged(Phase::TimeExpired));
            self.notifier.notify(
                Notification::warning(TIME_EXPIRED_TITLE).with_body(format!(
                    "Your answers will be submitted in {} seconds.",
                    self.config.grace_delay.as_secs()
                )),
            );
            state.auto_submit = Some(self.schedule_auto_submit());
            return TickFlow::Stop;
        }

        if !state.warning_sent && remaining_seconds <= self.config.warning_threshold_seconds {
            state.warning_sent = true;
            self.notifier.notify(Notification::warning(TIME_WARNING_TITLE));
        }

        TickFlow::Continue
    }

    fn schedule_auto_submit(self: &Arc<Self>) -> DelayedTask {
        let weak = Arc::downgrade(self);
        let retry_delay = self.config.auto_retry_delay;
        DelayedTask::spawn(self.config.grace_delay, async move {
            let Some(controller) = weak.upgrade() else {
                return;
            };
            if controller.submit(SubmitReason::TimeExpired).await.is_ok() {
                return;
            }
            drop(controller);

            tokio::time::sleep(retry_delay).await;
            let Some(controller) = weak.upgrade() else {
                return;
            };
            if let Err(err) = controller.submit(SubmitReason::TimeExpired).await {
                controller.notifier.notify(
                    Notification::error(AUTO_SUBMISSION_FAILED_TITLE)
                        .with_body(format!(
                            "{err}. Your answers are kept; submit again when the connection is back."
                        ))
                        .persistent(),
                );
            }
        })
    }
}

fn ensure_questions(evaluation: &Evaluation) -> Result<(), LoadFailure> {
    if evaluation.questions.is_empty() {
        return Err(LoadFailure::Malformed(format!(
            "evaluation {} has no questions",
            evaluation.evaluation_id.0
        )));
    }
    Ok(())
}

/// `MM:SS`, with hours folded into the minutes.
pub fn format_remaining(seconds: u64) -> String {
    format!("{:02}:{:02}", seconds / 60, seconds % 60)
}

#[cfg(test)]
#[path = "tests/controller_tests.rs"]
mod tests;
