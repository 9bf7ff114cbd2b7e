// Shared fakes for the headless practice tests.
#![allow(dead_code)]

use chrono::Local;

use wordrill::audio::{PlaybackOutcome, PlaybackTicket, Speaker};
use wordrill::backend::SessionBackend;
use wordrill::clock::{Clock, ManualClock};
use wordrill::config::EngineConfig;
use wordrill::controller::{PracticeController, SessionParams};
use wordrill::error::{BackendError, PlaybackError};
use wordrill::model::{
    CompletionRequest, PlanId, PracticeSession, ResultSummary, ScheduleId, SessionStatus,
    StepResult, WordInfo, WordPracticeState,
};

pub const SESSION_ID: &str = "s-1";
pub const PLAN_ID: PlanId = 7;
pub const SCHEDULE_ID: ScheduleId = 70;

/// Every call the controller made, in order.
#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    Create(PlanId, ScheduleId),
    Detail(String),
    Submit(StepResult),
    Pause(String),
    Resume(String),
    Complete {
        session_id: String,
        total_time_ms: u64,
        active_time_ms: u64,
    },
    Cancel(String),
}

/// In-memory backend that records calls and can be told to fail.
#[derive(Debug)]
pub struct FakeBackend {
    pub session: PracticeSession,
    pub calls: Vec<Call>,
    pub fail_load: bool,
    pub fail_submit: bool,
    pub fail_pause: bool,
    pub fail_resume: bool,
    pub fail_complete: bool,
}

impl FakeBackend {
    pub fn new(session: PracticeSession) -> Self {
        Self {
            session,
            calls: Vec::new(),
            fail_load: false,
            fail_submit: false,
            fail_pause: false,
            fail_resume: false,
            fail_complete: false,
        }
    }

    pub fn submissions(&self) -> Vec<&StepResult> {
        self.calls
            .iter()
            .filter_map(|c| match c {
                Call::Submit(r) => Some(r),
                _ => None,
            })
            .collect()
    }

    pub fn completions(&self) -> Vec<(u64, u64)> {
        self.calls
            .iter()
            .filter_map(|c| match c {
                Call::Complete {
                    total_time_ms,
                    active_time_ms,
                    ..
                } => Some((*total_time_ms, *active_time_ms)),
                _ => None,
            })
            .collect()
    }

    pub fn count(&self, pred: impl Fn(&Call) -> bool) -> usize {
        self.calls.iter().filter(|c| pred(*c)).count()
    }

    fn unavailable() -> BackendError {
        BackendError::Unavailable("injected failure".to_string())
    }
}

impl SessionBackend for FakeBackend {
    fn create_session(
        &mut self,
        plan_id: PlanId,
        schedule_id: ScheduleId,
    ) -> Result<PracticeSession, BackendError> {
        self.calls.push(Call::Create(plan_id, schedule_id));
        if self.fail_load {
            return Err(Self::unavailable());
        }
        Ok(self.session.clone())
    }

    fn get_session_detail(&mut self, session_id: &str) -> Result<PracticeSession, BackendError> {
        self.calls.push(Call::Detail(session_id.to_string()));
        if self.fail_load {
            return Err(Self::unavailable());
        }
        if session_id != self.session.session_id {
            return Err(BackendError::SessionNotFound(session_id.to_string()));
        }
        Ok(self.session.clone())
    }

    fn submit_step_result(&mut self, result: &StepResult) -> Result<(), BackendError> {
        self.calls.push(Call::Submit(result.clone()));
        if self.fail_submit {
            return Err(Self::unavailable());
        }
        Ok(())
    }

    fn pause_session(&mut self, session_id: &str) -> Result<(), BackendError> {
        self.calls.push(Call::Pause(session_id.to_string()));
        if self.fail_pause {
            return Err(Self::unavailable());
        }
        Ok(())
    }

    fn resume_session(&mut self, session_id: &str) -> Result<(), BackendError> {
        self.calls.push(Call::Resume(session_id.to_string()));
        if self.fail_resume {
            return Err(Self::unavailable());
        }
        Ok(())
    }

    fn complete_session(
        &mut self,
        request: CompletionRequest<'_>,
    ) -> Result<ResultSummary, BackendError> {
        self.calls.push(Call::Complete {
            session_id: request.session_id.to_string(),
            total_time_ms: request.total_time_ms,
            active_time_ms: request.active_time_ms,
        });
        if self.fail_complete {
            return Err(Self::unavailable());
        }
        let submitted = self.submissions();
        let correct = submitted.iter().filter(|r| r.is_correct).count();
        Ok(ResultSummary {
            session_id: request.session_id.to_string(),
            words_practiced: self.session.word_states.len(),
            steps_submitted: submitted.len(),
            steps_correct: correct,
            accuracy: 0.0,
            total_time_ms: request.total_time_ms,
            active_time_ms: request.active_time_ms,
            completed_at: Local::now(),
        })
    }

    fn cancel_session(&mut self, session_id: &str) -> Result<(), BackendError> {
        self.calls.push(Call::Cancel(session_id.to_string()));
        Ok(())
    }
}

/// Records what was spoken and when; completions are delivered by the test.
#[derive(Debug)]
pub struct FakeSpeaker {
    clock: ManualClock,
    pub spoken: Vec<(String, PlaybackTicket, u64)>,
    pub fail_to_start: bool,
}

impl FakeSpeaker {
    pub fn new(clock: ManualClock) -> Self {
        Self {
            clock,
            spoken: Vec::new(),
            fail_to_start: false,
        }
    }

    pub fn last_ticket(&self) -> Option<PlaybackTicket> {
        self.spoken.last().map(|(_, t, _)| *t)
    }

    pub fn texts(&self) -> Vec<&str> {
        self.spoken.iter().map(|(t, _, _)| t.as_str()).collect()
    }
}

impl Speaker for FakeSpeaker {
    fn speak(&mut self, text: &str, ticket: PlaybackTicket) -> Result<(), PlaybackError> {
        if self.fail_to_start {
            return Err(PlaybackError::Failed("no audio device".to_string()));
        }
        self.spoken.push((text.to_string(), ticket, self.clock.now_ms()));
        Ok(())
    }
}

pub fn word(id: i64, text: &str, meaning: &str, steps_submitted: u8) -> WordPracticeState {
    WordPracticeState {
        word_id: id,
        plan_word_id: id * 100,
        word: WordInfo::new(text, meaning),
        steps_submitted,
    }
}

pub fn session(words: Vec<WordPracticeState>) -> PracticeSession {
    PracticeSession {
        session_id: SESSION_ID.to_string(),
        plan_id: PLAN_ID,
        schedule_id: SCHEDULE_ID,
        status: SessionStatus::Active,
        word_states: words,
    }
}

pub struct Harness {
    pub ctl: PracticeController<FakeBackend, FakeSpeaker, ManualClock>,
    pub clock: ManualClock,
}

impl Harness {
    pub fn new(session: PracticeSession) -> Self {
        Self::with_backend(FakeBackend::new(session))
    }

    pub fn with_backend(backend: FakeBackend) -> Self {
        let clock = ManualClock::new();
        let ctl = PracticeController::new(
            backend,
            FakeSpeaker::new(clock.clone()),
            clock.clone(),
            EngineConfig::default(),
        );
        Self { ctl, clock }
    }

    /// A fresh session over `words`, already initialized at t=0.
    pub fn started(words: Vec<WordPracticeState>) -> Self {
        let mut h = Self::new(session(words));
        h.ctl
            .initialize(SessionParams::new_session(PLAN_ID, SCHEDULE_ID))
            .unwrap();
        h
    }

    /// Resumes an existing session over `words` at t=0.
    pub fn resumed(words: Vec<WordPracticeState>) -> Self {
        let mut h = Self::new(session(words));
        h.ctl.initialize(SessionParams::resume(SESSION_ID)).unwrap();
        h
    }

    /// Moves the clock forward and fires whatever came due.
    pub fn run_for(&mut self, ms: u64) {
        self.clock.advance(ms);
        self.ctl.poll_timers();
    }

    /// Reports the most recent playback as finished after `after_ms`.
    pub fn finish_playback(&mut self, after_ms: u64) {
        self.finish_playback_with(after_ms, PlaybackOutcome::Finished);
    }

    pub fn finish_playback_with(&mut self, after_ms: u64, outcome: PlaybackOutcome) {
        let ticket = self
            .ctl
            .speaker()
            .last_ticket()
            .expect("nothing was spoken");
        self.clock.advance(after_ms);
        self.ctl.poll_timers();
        self.ctl.on_playback_finished(ticket, outcome);
    }

    pub fn type_text(&mut self, text: &str) {
        for c in text.chars() {
            self.ctl.type_char(c);
        }
    }

    pub fn now(&self) -> u64 {
        self.clock.now_ms()
    }
}
