use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};

pub type PlanId = i64;
pub type ScheduleId = i64;
pub type WordId = i64;
pub type PlanWordId = i64;

/// One of the three drill modes every word goes through, in order.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
    strum_macros::Display,
)]
pub enum Step {
    /// full word info is visible, the learner copies it
    #[strum(serialize = "spell from full info")]
    SpellFromFull,
    /// phonetic, meaning and syllable cues only
    #[strum(serialize = "spell from cues")]
    SpellFromCues,
    /// meaning only, the learner relies on the audio
    #[strum(serialize = "spell from audio")]
    SpellFromAudio,
}

impl Step {
    pub const ALL: [Step; 3] = [Step::SpellFromFull, Step::SpellFromCues, Step::SpellFromAudio];

    pub fn first() -> Self {
        Step::SpellFromFull
    }

    /// Zero-based position of the step within a word.
    pub fn ordinal(self) -> u8 {
        match self {
            Step::SpellFromFull => 0,
            Step::SpellFromCues => 1,
            Step::SpellFromAudio => 2,
        }
    }

    /// Inverse of [`Step::ordinal`]. Anything outside 0..=2 is rejected.
    pub fn from_ordinal(ordinal: u8) -> Option<Self> {
        Self::ALL.get(ordinal as usize).copied()
    }

    pub fn next(self) -> Option<Self> {
        Self::from_ordinal(self.ordinal() + 1)
    }

    pub fn is_last(self) -> bool {
        self.next().is_none()
    }
}

/// A syllable-level grapheme/sound pairing shown in the full-info step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PhonicsSegment {
    pub letters: String,
    pub sound: String,
}

/// Immutable dictionary data for a word.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WordInfo {
    pub text: String,
    pub meaning: String,
    pub ipa: Option<String>,
    pub syllables: Vec<String>,
    pub phonics: Vec<PhonicsSegment>,
}

impl WordInfo {
    pub fn new(text: impl Into<String>, meaning: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            meaning: meaning.into(),
            ipa: None,
            syllables: Vec::new(),
            phonics: Vec::new(),
        }
    }
}

/// One word's place in a session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WordPracticeState {
    pub word_id: WordId,
    pub plan_word_id: PlanWordId,
    pub word: WordInfo,
    /// Steps already submitted for this word, as recorded by the backend.
    /// Zero for a fresh session; used to pick the resume position.
    pub steps_submitted: u8,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, strum_macros::Display)]
#[strum(serialize_all = "lowercase")]
pub enum SessionStatus {
    Active,
    Paused,
    Completed,
    Cancelled,
}

impl SessionStatus {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "active" => Some(Self::Active),
            "paused" => Some(Self::Paused),
            "completed" => Some(Self::Completed),
            "cancelled" => Some(Self::Cancelled),
            _ => None,
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Cancelled)
    }
}

/// The unit of work for one study-schedule occurrence.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PracticeSession {
    pub session_id: String,
    pub plan_id: PlanId,
    pub schedule_id: ScheduleId,
    pub status: SessionStatus,
    /// Practice order, fixed for the lifetime of the session.
    pub word_states: Vec<WordPracticeState>,
}

/// One evaluated step as reported to the backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StepResult {
    pub session_id: String,
    pub word_id: WordId,
    pub plan_word_id: PlanWordId,
    pub step: Step,
    pub user_input: String,
    pub is_correct: bool,
    pub time_spent_ms: u64,
    pub attempts: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CompletionRequest<'a> {
    pub session_id: &'a str,
    pub total_time_ms: u64,
    pub active_time_ms: u64,
}

/// What the results view shows after a completed session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultSummary {
    pub session_id: String,
    pub words_practiced: usize,
    pub steps_submitted: usize,
    pub steps_correct: usize,
    pub accuracy: f64,
    pub total_time_ms: u64,
    pub active_time_ms: u64,
    pub completed_at: DateTime<Local>,
}
