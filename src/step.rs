// The three-steps-per-word walk through a session.

use crate::model::{PhonicsSegment, Step, WordInfo, WordPracticeState};

/// A (word, step) coordinate. Ordering is lexicographic: word first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Position {
    pub word_index: usize,
    pub step: Step,
}

impl Position {
    pub fn start() -> Self {
        Self {
            word_index: 0,
            step: Step::first(),
        }
    }
}

/// Result of [`StepMachine::advance`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Advance {
    NextStep(Position),
    NextWord(Position),
    /// Every step of every word has been submitted.
    Exhausted,
    /// The machine is in a state it cannot move from; nothing changed.
    Halted,
}

/// Case-insensitive, otherwise exact comparison of an answer.
pub fn answer_matches(canonical: &str, raw_input: &str) -> bool {
    canonical.to_lowercase() == raw_input.to_lowercase()
}

/// Where a (possibly resumed) session should pick up, or `None` when every
/// step of every word was already submitted.
pub fn resume_position(words: &[WordPracticeState]) -> Option<Position> {
    words.iter().enumerate().find_map(|(word_index, w)| {
        Step::from_ordinal(w.steps_submitted).map(|step| Position { word_index, step })
    })
}

#[derive(Debug, Clone)]
pub struct StepMachine {
    word_count: usize,
    position: Position,
    user_input: String,
    /// `Some(is_correct)` while the evaluation of the current step is shown.
    result: Option<bool>,
    attempts: u32,
}

impl StepMachine {
    pub fn new(word_count: usize, start: Position) -> Self {
        Self {
            word_count,
            position: start,
            user_input: String::new(),
            result: None,
            attempts: 1,
        }
    }

    pub fn position(&self) -> Position {
        self.position
    }

    pub fn word_count(&self) -> usize {
        self.word_count
    }

    pub fn is_empty(&self) -> bool {
        self.word_count == 0
    }

    pub fn user_input(&self) -> &str {
        &self.user_input
    }

    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    pub fn showing_result(&self) -> bool {
        self.result.is_some()
    }

    pub fn result(&self) -> Option<bool> {
        self.result
    }

    pub fn push_char(&mut self, c: char) {
        if self.result.is_none() {
            self.user_input.push(c);
        }
    }

    pub fn backspace(&mut self) {
        if self.result.is_none() {
            self.user_input.pop();
        }
    }

    /// Evaluates `raw_input` against `canonical` and shows the result.
    pub fn evaluate(&mut self, canonical: &str, raw_input: &str) -> bool {
        let is_correct = answer_matches(canonical, raw_input);
        self.user_input = raw_input.to_string();
        self.result = Some(is_correct);
        is_correct
    }

    /// Moves to the next step of this word, or the first step of the next
    /// word. Never moves backwards and never skips a step.
    pub fn advance(&mut self) -> Advance {
        if self.position.word_index >= self.word_count {
            tracing::error!(
                word_index = self.position.word_index,
                word_count = self.word_count,
                "Step position out of range, refusing to advance"
            );
            return Advance::Halted;
        }

        let next = if let Some(step) = self.position.step.next() {
            Advance::NextStep(Position {
                word_index: self.position.word_index,
                step,
            })
        } else if self.position.word_index + 1 < self.word_count {
            Advance::NextWord(Position {
                word_index: self.position.word_index + 1,
                step: Step::first(),
            })
        } else {
            return Advance::Exhausted;
        };

        if let Advance::NextStep(p) | Advance::NextWord(p) = next {
            self.position = p;
            self.user_input.clear();
            self.result = None;
            self.attempts = 1;
        }
        next
    }
}

/// What the learner gets to see for one step of one word.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StepPrompt {
    pub step: Step,
    pub word: Option<String>,
    pub meaning: String,
    pub ipa: Option<String>,
    pub syllables: Vec<String>,
    pub syllable_count: Option<usize>,
    pub phonics: Vec<PhonicsSegment>,
    pub letter_count: usize,
}

impl StepPrompt {
    pub fn for_step(step: Step, info: &WordInfo) -> Self {
        let letter_count = info.text.chars().count();
        let syllable_count = (!info.syllables.is_empty()).then_some(info.syllables.len());
        match step {
            Step::SpellFromFull => Self {
                step,
                word: Some(info.text.clone()),
                meaning: info.meaning.clone(),
                ipa: info.ipa.clone(),
                syllables: info.syllables.clone(),
                syllable_count,
                phonics: info.phonics.clone(),
                letter_count,
            },
            Step::SpellFromCues => Self {
                step,
                word: None,
                meaning: info.meaning.clone(),
                ipa: info.ipa.clone(),
                syllables: Vec::new(),
                syllable_count,
                phonics: Vec::new(),
                letter_count,
            },
            Step::SpellFromAudio => Self {
                step,
                word: None,
                meaning: info.meaning.clone(),
                ipa: None,
                syllables: Vec::new(),
                syllable_count: None,
                phonics: Vec::new(),
                letter_count,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn word(id: i64, text: &str, steps_submitted: u8) -> WordPracticeState {
        WordPracticeState {
            word_id: id,
            plan_word_id: id * 10,
            word: WordInfo::new(text, "meaning"),
            steps_submitted,
        }
    }

    #[test]
    fn answers_fold_case_only() {
        assert!(answer_matches("Apple", "apple"));
        assert!(answer_matches("Apple", "APPLE"));
        assert!(!answer_matches("Apple", "Apple "));
        assert!(!answer_matches("café", "cafe"));
        assert!(!answer_matches("o'clock", "oclock"));
        assert!(answer_matches("Straße", "straße"));
    }

    #[test]
    fn advance_walks_steps_then_words() {
        let mut m = StepMachine::new(2, Position::start());
        let mut seen = vec![m.position()];
        loop {
            match m.advance() {
                Advance::NextStep(p) | Advance::NextWord(p) => seen.push(p),
                Advance::Exhausted => break,
                Advance::Halted => panic!("unexpected halt"),
            }
        }
        assert_eq!(seen.len(), 6);
        for pair in seen.windows(2) {
            assert!(pair[0] < pair[1]);
        }
        assert_eq!(
            seen[3],
            Position {
                word_index: 1,
                step: Step::SpellFromFull
            }
        );
        // exhausted machine stays where it was
        assert_eq!(m.advance(), Advance::Exhausted);
        assert_eq!(m.position().step, Step::SpellFromAudio);
    }

    #[test]
    fn advance_resets_step_state() {
        let mut m = StepMachine::new(1, Position::start());
        m.push_char('c');
        m.evaluate("cat", "Cat");
        assert_eq!(m.result(), Some(true));
        // typing is frozen while a result is shown
        m.push_char('x');
        assert_eq!(m.user_input(), "Cat");

        assert!(matches!(m.advance(), Advance::NextStep(_)));
        assert_eq!(m.user_input(), "");
        assert!(!m.showing_result());
        assert_eq!(m.attempts(), 1);
    }

    #[test]
    fn out_of_range_position_halts() {
        let mut m = StepMachine::new(
            1,
            Position {
                word_index: 4,
                step: Step::SpellFromCues,
            },
        );
        assert_eq!(m.advance(), Advance::Halted);
        assert_eq!(m.position().word_index, 4);

        let mut empty = StepMachine::new(0, Position::start());
        assert!(empty.is_empty());
        assert_eq!(empty.advance(), Advance::Halted);
    }

    #[test]
    fn resume_position_picks_first_unsubmitted_step() {
        let fresh = vec![word(1, "cat", 0), word(2, "dog", 0)];
        assert_eq!(resume_position(&fresh), Some(Position::start()));

        let partial = vec![word(1, "cat", 3), word(2, "dog", 1)];
        assert_eq!(
            resume_position(&partial),
            Some(Position {
                word_index: 1,
                step: Step::SpellFromCues
            })
        );

        let done = vec![word(1, "cat", 3), word(2, "dog", 3)];
        assert_eq!(resume_position(&done), None);
        assert_eq!(resume_position(&[]), None);
    }

    #[test]
    fn prompts_hide_the_word_after_the_first_step() {
        let info = WordInfo {
            text: "cat".to_string(),
            meaning: "猫".to_string(),
            ipa: Some("/kæt/".to_string()),
            syllables: vec!["cat".to_string()],
            phonics: vec![PhonicsSegment {
                letters: "c".to_string(),
                sound: "k".to_string(),
            }],
        };

        let full = StepPrompt::for_step(Step::SpellFromFull, &info);
        assert_eq!(full.word.as_deref(), Some("cat"));
        assert_eq!(full.phonics.len(), 1);

        let cues = StepPrompt::for_step(Step::SpellFromCues, &info);
        assert_eq!(cues.word, None);
        assert_eq!(cues.ipa.as_deref(), Some("/kæt/"));
        assert!(cues.syllables.is_empty());
        assert_eq!(cues.syllable_count, Some(1));

        let audio = StepPrompt::for_step(Step::SpellFromAudio, &info);
        assert_eq!(audio.word, None);
        assert_eq!(audio.ipa, None);
        assert_eq!(audio.meaning, "猫");
        assert_eq!(audio.letter_count, 3);
    }
}
