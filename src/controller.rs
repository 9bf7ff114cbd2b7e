// Session lifecycle controller.
//
// Owns the practice context (session, step machine, timing, auto-play and
// every timer handle) and is the only piece that talks to the session
// backend. Everything runs on the caller's thread: the host feeds in user
// actions, playback completions and `PracticeController::poll_timers`
// calls, and reads back `PracticeController::view`, notices and
// navigation signals.

use std::collections::VecDeque;

use crate::audio::{PlaybackOutcome, PlaybackTicket, Speaker};
use crate::autoplay::{AutoPlayScheduler, PlaybackDisposition};
use crate::backend::SessionBackend;
use crate::clock::Clock;
use crate::config::EngineConfig;
use crate::error::{BackendError, PracticeError, SessionAction};
use crate::model::{
    CompletionRequest, PlanId, PracticeSession, ResultSummary, ScheduleId, SessionStatus,
    StepResult,
};
use crate::scheduler::{TimerId, TimerKind, TimerQueue, TimerSlot};
use crate::step::{resume_position, Advance, Position, StepMachine, StepPrompt};
use crate::timing::{format_elapsed, TimingAccumulator};

/// How the practice view was opened.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionParams {
    pub session_id: Option<String>,
    pub plan_id: Option<PlanId>,
    pub schedule_id: Option<ScheduleId>,
}

impl SessionParams {
    pub fn new_session(plan_id: PlanId, schedule_id: ScheduleId) -> Self {
        Self {
            session_id: None,
            plan_id: Some(plan_id),
            schedule_id: Some(schedule_id),
        }
    }

    pub fn resume(session_id: impl Into<String>) -> Self {
        Self {
            session_id: Some(session_id.into()),
            ..Self::default()
        }
    }
}

/// One-shot initialization lifecycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InitState {
    Uninitialized,
    Initializing,
    Ready,
    Failed(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Completion {
    Idle,
    InFlight,
    Done,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeLevel {
    Info,
    Warning,
    Error,
}

/// A non-blocking, user-visible message (toast).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub level: NoticeLevel,
    pub message: String,
}

/// Navigation requested by the engine; routing belongs to the host.
#[derive(Debug, Clone, PartialEq)]
pub enum ViewSignal {
    ShowResults(ResultSummary),
    BackToPlan { plan_id: Option<PlanId> },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ViewPhase {
    Loading,
    Failed(String),
    NothingToPractice,
    Practicing,
    Paused,
    /// Every step is done; completion is pending or awaiting a retry.
    Finishing,
    Completed,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnswerFeedback {
    pub is_correct: bool,
    pub expected: String,
}

/// Read-only snapshot for rendering.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PracticeView {
    pub phase: ViewPhase,
    pub prompt: Option<StepPrompt>,
    pub position: Option<Position>,
    pub word_count: usize,
    pub user_input: String,
    pub feedback: Option<AnswerFeedback>,
    pub attempts: u32,
    pub elapsed: String,
    pub active: String,
    pub autoplay_plays: u8,
}

pub struct PracticeController<B, S, C> {
    backend: B,
    speaker: S,
    clock: C,
    config: EngineConfig,
    params: Option<SessionParams>,
    init: InitState,
    session: Option<PracticeSession>,
    steps: StepMachine,
    timing: TimingAccumulator,
    autoplay: AutoPlayScheduler,
    timers: TimerQueue,
    tick: TimerSlot,
    advance: TimerSlot,
    completion: Completion,
    exhausted: bool,
    torn_down: bool,
    next_ticket: u64,
    notices: VecDeque<Notice>,
    signals: VecDeque<ViewSignal>,
}

impl<B: SessionBackend, S: Speaker, C: Clock> PracticeController<B, S, C> {
    pub fn new(backend: B, speaker: S, clock: C, config: EngineConfig) -> Self {
        Self {
            backend,
            speaker,
            clock,
            autoplay: AutoPlayScheduler::new(config.autoplay),
            config,
            params: None,
            init: InitState::Uninitialized,
            session: None,
            steps: StepMachine::new(0, Position::start()),
            timing: TimingAccumulator::new(),
            timers: TimerQueue::new(),
            tick: TimerSlot::new(),
            advance: TimerSlot::new(),
            completion: Completion::Idle,
            exhausted: false,
            torn_down: false,
            next_ticket: 0,
            notices: VecDeque::new(),
            signals: VecDeque::new(),
        }
    }

    /// Creates a new session or resumes an existing one. Only the first call
    /// does anything; later calls return `Ok(())` untouched.
    pub fn initialize(&mut self, params: SessionParams) -> Result<(), PracticeError> {
        if self.init != InitState::Uninitialized {
            tracing::debug!(state = ?self.init, "Ignoring repeated initialize");
            return Ok(());
        }
        self.init = InitState::Initializing;
        self.params = Some(params.clone());

        let loaded = match (params.session_id.as_deref(), params.plan_id, params.schedule_id) {
            (Some(id), _, _) => self.backend.get_session_detail(id).map(|s| (s, true)),
            (None, Some(plan_id), Some(schedule_id)) => self
                .backend
                .create_session(plan_id, schedule_id)
                .map(|s| (s, false)),
            _ => {
                let err = PracticeError::MissingParameters;
                self.init = InitState::Failed(err.to_string());
                return Err(err);
            }
        };

        let (session, resumed) = match loaded {
            Ok(found) => found,
            Err(e) => {
                tracing::error!(error = %e, "Failed to load practice session");
                let err = PracticeError::Initialization(e);
                self.init = InitState::Failed(err.to_string());
                return Err(err);
            }
        };

        let now = self.clock.now_ms();
        let start = resume_position(&session.word_states);
        self.timing.start(now);
        self.steps = StepMachine::new(
            session.word_states.len(),
            start.unwrap_or_else(Position::start),
        );
        self.init = InitState::Ready;

        tracing::info!(
            session_id = %session.session_id,
            resumed,
            words = session.word_states.len(),
            start = ?start,
            "Practice session ready"
        );
        self.notify(
            NoticeLevel::Info,
            if resumed {
                "Resumed practice session"
            } else {
                "Started practice session"
            },
        );

        let paused = session.status == SessionStatus::Paused;
        let empty = session.word_states.is_empty();
        self.session = Some(session);

        if empty {
            tracing::info!("Session has no words to practice");
            return Ok(());
        }
        if start.is_none() {
            // every step was already submitted before the app went away
            self.exhausted = true;
            let _ = self.finish();
            return Ok(());
        }
        if paused {
            self.timing.pause();
        } else {
            self.start_ticking(now);
            self.trigger_autoplay(now);
        }
        Ok(())
    }

    pub fn pause(&mut self) -> Result<(), PracticeError> {
        let session_id = self.session_id()?;
        if self.status() != Some(SessionStatus::Active) || self.completion == Completion::Done {
            return Ok(());
        }
        if let Err(source) = self.backend.pause_session(&session_id) {
            return Err(self.action_failed(SessionAction::Pause, source));
        }

        self.set_status(SessionStatus::Paused);
        self.timing.pause();
        self.tick.clear(&mut self.timers);
        self.advance.clear(&mut self.timers);
        self.autoplay.cancel(&mut self.timers);
        tracing::info!(%session_id, "Session paused");
        Ok(())
    }

    pub fn resume(&mut self) -> Result<(), PracticeError> {
        let session_id = self.session_id()?;
        if self.status() != Some(SessionStatus::Paused) {
            return Ok(());
        }
        if let Err(source) = self.backend.resume_session(&session_id) {
            return Err(self.action_failed(SessionAction::Resume, source));
        }

        let now = self.clock.now_ms();
        self.set_status(SessionStatus::Active);
        self.timing.resume();
        if !self.exhausted {
            self.start_ticking(now);
        }
        // an evaluation shown before the pause still needs its advance
        if let (Some(is_correct), false) = (self.steps.result(), self.exhausted) {
            self.schedule_advance(now, is_correct);
        }
        tracing::info!(%session_id, "Session resumed");
        Ok(())
    }

    pub fn type_char(&mut self, c: char) {
        if self.accepting_input() {
            self.steps.push_char(c);
        }
    }

    pub fn backspace(&mut self) {
        if self.accepting_input() {
            self.steps.backspace();
        }
    }

    /// Submits the current free-text input.
    pub fn submit(&mut self) -> Option<bool> {
        let input = self.steps.user_input().to_string();
        self.submit_answer(&input)
    }

    /// Evaluates `raw_input` for the current (word, step), reports it and
    /// schedules the automatic advance. Returns `None` if no answer is
    /// expected right now.
    pub fn submit_answer(&mut self, raw_input: &str) -> Option<bool> {
        if !self.accepting_input() {
            return None;
        }
        let now = self.clock.now_ms();
        let position = self.steps.position();
        let (session_id, word) = {
            let session = self.session.as_ref()?;
            let Some(word) = session.word_states.get(position.word_index) else {
                tracing::error!(?position, "Current word is missing from the session");
                return None;
            };
            (session.session_id.clone(), word.clone())
        };

        let is_correct = self.steps.evaluate(&word.word.text, raw_input);
        let result = StepResult {
            session_id,
            word_id: word.word_id,
            plan_word_id: word.plan_word_id,
            step: position.step,
            user_input: raw_input.to_string(),
            is_correct,
            time_spent_ms: self.timing.step_elapsed(now),
            attempts: self.steps.attempts(),
        };
        self.submit_step_result(&result);

        if is_correct {
            self.autoplay.cancel(&mut self.timers);
        }
        self.schedule_advance(now, is_correct);
        Some(is_correct)
    }

    /// Forwards a step result. A failed write is reported but never holds
    /// up the practice flow.
    pub fn submit_step_result(&mut self, result: &StepResult) {
        if let Err(e) = self.backend.submit_step_result(result) {
            tracing::warn!(
                error = %e,
                word_id = result.word_id,
                step = %result.step,
                "Failed to save step result"
            );
            self.notify(NoticeLevel::Warning, format!("Could not save your answer: {e}"));
        }
    }

    /// Moves past the evaluated step: next step, next word, or completion.
    /// Does nothing unless the current step's result is showing.
    pub fn advance(&mut self) {
        if !self.steps.showing_result() || self.exhausted || self.torn_down {
            return;
        }
        self.advance.clear(&mut self.timers);
        let now = self.clock.now_ms();
        self.advance_at(now);
    }

    /// Single-flight completion with explicit totals.
    pub fn complete_session(
        &mut self,
        total_time_ms: u64,
        active_time_ms: u64,
    ) -> Result<(), PracticeError> {
        let session_id = self.session_id()?;
        if self.completion != Completion::Idle {
            tracing::debug!("Completion already issued");
            return Ok(());
        }
        self.completion = Completion::InFlight;

        let request = CompletionRequest {
            session_id: &session_id,
            total_time_ms,
            active_time_ms,
        };
        match self.backend.complete_session(request) {
            Ok(summary) => {
                self.completion = Completion::Done;
                self.set_status(SessionStatus::Completed);
                self.release_timers();
                tracing::info!(
                    %session_id,
                    total_time_ms,
                    active_time_ms,
                    accuracy = summary.accuracy,
                    "Session completed"
                );
                self.signals.push_back(ViewSignal::ShowResults(summary));
                Ok(())
            }
            Err(source) => {
                self.completion = Completion::Idle;
                Err(self.action_failed(SessionAction::Complete, source))
            }
        }
    }

    /// Completes the session with the accumulated timing figures.
    pub fn finish(&mut self) -> Result<(), PracticeError> {
        let (total, active) = self.timing.snapshot(self.clock.now_ms());
        self.complete_session(total, active)
    }

    /// Leaves the view. Progress is already durable, so nothing is sent to
    /// the backend; the session stays resumable.
    pub fn exit(&mut self) {
        self.shutdown();
        let plan_id = self.session.as_ref().map(|s| s.plan_id);
        tracing::info!(?plan_id, "Leaving practice view");
        self.signals.push_back(ViewSignal::BackToPlan { plan_id });
    }

    /// Tears this view down and opens a fresh one with the parameters of the
    /// first `initialize` call, as reloading the page would. This is how a
    /// failed load is retried; the one-shot guard of a single view stays.
    pub fn reload(mut self) -> Self {
        self.shutdown();
        let params = self.params.take();
        let mut fresh = Self::new(self.backend, self.speaker, self.clock, self.config);
        if let Some(params) = params {
            tracing::info!(?params, "Reloading practice view");
            if let Err(e) = fresh.initialize(params) {
                tracing::warn!(error = %e, "Reload did not recover the session");
            }
        }
        fresh
    }

    /// Teardown: every timer is released unconditionally.
    pub fn shutdown(&mut self) {
        self.torn_down = true;
        self.release_timers();
    }

    /// User-initiated pronunciation, independent of auto-play.
    pub fn play_pronunciation(&mut self) {
        if self.init != InitState::Ready || self.torn_down {
            return;
        }
        let Some(text) = self.word_text(self.steps.position()) else {
            return;
        };
        let ticket = self.issue_ticket();
        if let Err(e) = self.speaker.speak(&text, ticket) {
            tracing::warn!(error = %e, "Manual playback failed to start");
            self.notify(NoticeLevel::Warning, format!("Could not play pronunciation: {e}"));
        }
    }

    pub fn on_playback_finished(&mut self, ticket: PlaybackTicket, outcome: PlaybackOutcome) {
        let now = self.clock.now_ms();
        let cancelled = self
            .autoplay
            .target()
            .map(|target| self.autoplay_cancelled(target))
            .unwrap_or(true);
        let disposition = self.autoplay.on_playback_finished(
            &mut self.timers,
            now,
            ticket,
            outcome.is_finished(),
            cancelled,
        );

        if let PlaybackOutcome::Failed(reason) = outcome {
            tracing::warn!(?ticket, %reason, ?disposition, "Playback failed");
            if matches!(
                disposition,
                PlaybackDisposition::Aborted | PlaybackDisposition::NotOurs
            ) {
                self.notify(
                    NoticeLevel::Warning,
                    format!("Could not play pronunciation: {reason}"),
                );
            }
        }
    }

    /// Fires every timer that is due, in due order. Each callback sees its
    /// own due time as "now".
    pub fn poll_timers(&mut self) {
        let now = self.clock.now_ms();
        while let Some(fired) = self.timers.pop_due(now) {
            match fired.kind {
                TimerKind::Tick => {
                    if self.tick.release(fired.id) {
                        self.timing.on_tick(fired.due_ms, self.config.tick_interval_ms);
                        self.start_ticking(fired.due_ms);
                    }
                }
                TimerKind::AutoPlay(target) => self.on_autoplay_timer(fired.id, target),
                TimerKind::Advance(target) => {
                    if self.advance.release(fired.id) {
                        self.on_advance_timer(target, fired.due_ms);
                    }
                }
            }
        }
    }

    /// Absolute clock time of the next pending timer.
    pub fn next_deadline(&self) -> Option<u64> {
        self.timers.next_deadline()
    }

    pub fn take_notices(&mut self) -> Vec<Notice> {
        self.notices.drain(..).collect()
    }

    pub fn take_signal(&mut self) -> Option<ViewSignal> {
        self.signals.pop_front()
    }

    pub fn view(&self) -> PracticeView {
        let phase = match &self.init {
            InitState::Uninitialized | InitState::Initializing => ViewPhase::Loading,
            InitState::Failed(msg) => ViewPhase::Failed(msg.clone()),
            InitState::Ready if self.completion == Completion::Done => ViewPhase::Completed,
            InitState::Ready if self.steps.is_empty() => ViewPhase::NothingToPractice,
            InitState::Ready if self.exhausted => ViewPhase::Finishing,
            InitState::Ready if self.timing.is_paused() => ViewPhase::Paused,
            InitState::Ready => ViewPhase::Practicing,
        };

        let position = self.steps.position();
        let word = match phase {
            ViewPhase::Practicing | ViewPhase::Paused => self
                .session
                .as_ref()
                .and_then(|s| s.word_states.get(position.word_index)),
            _ => None,
        };
        let (total, active) = self.timing.snapshot(self.clock.now_ms());

        PracticeView {
            phase,
            prompt: word.map(|w| StepPrompt::for_step(position.step, &w.word)),
            position: word.map(|_| position),
            word_count: self.steps.word_count(),
            user_input: self.steps.user_input().to_string(),
            feedback: word.and_then(|w| {
                self.steps.result().map(|is_correct| AnswerFeedback {
                    is_correct,
                    expected: w.word.text.clone(),
                })
            }),
            attempts: self.steps.attempts(),
            elapsed: format_elapsed(total),
            active: format_elapsed(active),
            autoplay_plays: self.autoplay.plays(),
        }
    }

    pub fn init_state(&self) -> &InitState {
        &self.init
    }

    pub fn session(&self) -> Option<&PracticeSession> {
        self.session.as_ref()
    }

    pub fn position(&self) -> Position {
        self.steps.position()
    }

    pub fn steps(&self) -> &StepMachine {
        &self.steps
    }

    pub fn timing(&self) -> &TimingAccumulator {
        &self.timing
    }

    pub fn autoplay(&self) -> &AutoPlayScheduler {
        &self.autoplay
    }

    pub fn is_paused(&self) -> bool {
        self.status() == Some(SessionStatus::Paused)
    }

    pub fn is_exhausted(&self) -> bool {
        self.exhausted
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn backend_mut(&mut self) -> &mut B {
        &mut self.backend
    }

    pub fn speaker(&self) -> &S {
        &self.speaker
    }

    pub fn speaker_mut(&mut self) -> &mut S {
        &mut self.speaker
    }

    fn session_id(&self) -> Result<String, PracticeError> {
        match (&self.init, &self.session) {
            (InitState::Ready, Some(session)) => Ok(session.session_id.clone()),
            _ => Err(PracticeError::NotReady),
        }
    }

    fn status(&self) -> Option<SessionStatus> {
        self.session.as_ref().map(|s| s.status)
    }

    fn set_status(&mut self, status: SessionStatus) {
        if let Some(session) = self.session.as_mut() {
            session.status = status;
        }
    }

    fn accepting_input(&self) -> bool {
        self.init == InitState::Ready
            && self.status() == Some(SessionStatus::Active)
            && !self.steps.is_empty()
            && !self.steps.showing_result()
            && !self.exhausted
            && !self.torn_down
    }

    fn word_text(&self, position: Position) -> Option<String> {
        self.session
            .as_ref()?
            .word_states
            .get(position.word_index)
            .map(|w| w.word.text.clone())
    }

    fn notify(&mut self, level: NoticeLevel, message: impl Into<String>) {
        self.notices.push_back(Notice {
            level,
            message: message.into(),
        });
    }

    fn action_failed(&mut self, action: SessionAction, source: BackendError) -> PracticeError {
        tracing::warn!(%action, error = %source, "Session action failed");
        let err = PracticeError::Action { action, source };
        self.notify(NoticeLevel::Error, err.to_string());
        err
    }

    fn issue_ticket(&mut self) -> PlaybackTicket {
        self.next_ticket += 1;
        PlaybackTicket(self.next_ticket)
    }

    fn start_ticking(&mut self, now: u64) {
        self.tick
            .arm(&mut self.timers, now, self.config.tick_interval_ms, TimerKind::Tick);
    }

    fn schedule_advance(&mut self, now: u64, is_correct: bool) {
        let delay = if is_correct {
            self.config.advance_after_correct_ms
        } else {
            self.config.advance_after_incorrect_ms
        };
        let target = self.steps.position();
        self.advance
            .arm(&mut self.timers, now, delay, TimerKind::Advance(target));
    }

    fn release_timers(&mut self) {
        self.tick.clear(&mut self.timers);
        self.advance.clear(&mut self.timers);
        self.autoplay.cancel(&mut self.timers);
        self.timers.clear();
    }

    fn trigger_autoplay(&mut self, now: u64) {
        if self.is_paused() || self.steps.showing_result() || self.torn_down {
            return;
        }
        let target = self.steps.position();
        self.autoplay.trigger(&mut self.timers, now, target);
    }

    /// Auto-play stops when paused, when a correct answer is showing, or when
    /// the (word, step) it was started for is no longer current. An incorrect
    /// answer on screen keeps it going.
    fn autoplay_cancelled(&self, target: Position) -> bool {
        self.is_paused()
            || self.steps.result() == Some(true)
            || self.steps.position() != target
            || self.completion != Completion::Idle
            || self.torn_down
    }

    fn on_autoplay_timer(&mut self, id: TimerId, target: Position) {
        let cancelled = self.autoplay_cancelled(target);
        let Some(position) = self.autoplay.on_timer(id, target, cancelled) else {
            return;
        };
        let Some(text) = self.word_text(position) else {
            self.autoplay.cancel(&mut self.timers);
            return;
        };
        let ticket = self.issue_ticket();
        match self.speaker.speak(&text, ticket) {
            Ok(()) => self.autoplay.playback_started(ticket),
            Err(e) => {
                self.autoplay.cancel(&mut self.timers);
                tracing::warn!(error = %e, "Auto-play failed to start");
                self.notify(NoticeLevel::Warning, format!("Could not play pronunciation: {e}"));
            }
        }
    }

    fn on_advance_timer(&mut self, target: Position, at: u64) {
        if self.exhausted || self.steps.position() != target || !self.steps.showing_result() {
            tracing::debug!(?target, current = ?self.steps.position(), "Ignoring stale advance");
            return;
        }
        self.advance_at(at);
    }

    fn advance_at(&mut self, now: u64) {
        match self.steps.advance() {
            Advance::NextStep(position) | Advance::NextWord(position) => {
                tracing::debug!(?position, "Advanced");
                self.timing.step_started(now);
                self.autoplay.cancel(&mut self.timers);
                self.trigger_autoplay(now);
            }
            Advance::Exhausted => {
                self.exhausted = true;
                self.tick.clear(&mut self.timers);
                self.autoplay.cancel(&mut self.timers);
                // the final tick may not have landed yet; totals are re-derived
                let (total, active) = self.timing.snapshot(now);
                let _ = self.complete_session(total, active);
            }
            Advance::Halted => {
                self.autoplay.cancel(&mut self.timers);
                self.notify(
                    NoticeLevel::Error,
                    "Practice stopped: the session state is inconsistent",
                );
            }
        }
    }
}
