use std::process::{Command, Stdio};
use std::sync::mpsc::Sender;

use crate::error::PlaybackError;
use crate::runtime::PracticeEvent;

/// Identifies one playback request so its completion can be matched back.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PlaybackTicket(pub u64);

/// How a playback ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlaybackOutcome {
    Finished,
    Failed(String),
}

impl PlaybackOutcome {
    pub fn is_finished(&self) -> bool {
        matches!(self, PlaybackOutcome::Finished)
    }
}

/// Text-to-speech collaborator.
pub trait Speaker {
    /// Starts speaking `text` and returns without waiting. Once playback has
    /// audibly finished (or failed) the outcome is reported with the same
    /// ticket. An `Err` means playback never started and no outcome follows.
    fn speak(&mut self, text: &str, ticket: PlaybackTicket) -> Result<(), PlaybackError>;
}

impl<S: Speaker + ?Sized> Speaker for Box<S> {
    fn speak(&mut self, text: &str, ticket: PlaybackTicket) -> Result<(), PlaybackError> {
        (**self).speak(text, ticket)
    }
}

/// Runs an external speech program (espeak, say, ...) per request on a
/// worker thread and posts the outcome into the runtime event stream.
pub struct CommandSpeaker {
    program: String,
    args: Vec<String>,
    events: Sender<PracticeEvent>,
}

impl CommandSpeaker {
    pub fn new(
        program: impl Into<String>,
        args: Vec<String>,
        events: Sender<PracticeEvent>,
    ) -> Self {
        Self {
            program: program.into(),
            args,
            events,
        }
    }
}

impl Speaker for CommandSpeaker {
    fn speak(&mut self, text: &str, ticket: PlaybackTicket) -> Result<(), PlaybackError> {
        let mut child = Command::new(&self.program)
            .args(&self.args)
            .arg(text)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()?;

        let events = self.events.clone();
        std::thread::spawn(move || {
            let outcome = match child.wait() {
                Ok(status) if status.success() => PlaybackOutcome::Finished,
                Ok(status) => {
                    PlaybackOutcome::Failed(format!("speech program exited with {status}"))
                }
                Err(e) => PlaybackOutcome::Failed(e.to_string()),
            };
            let _ = events.send(PracticeEvent::PlaybackFinished { ticket, outcome });
        });
        Ok(())
    }
}

/// Reports every request as finished straight away without making a sound.
pub struct MutedSpeaker {
    events: Sender<PracticeEvent>,
}

impl MutedSpeaker {
    pub fn new(events: Sender<PracticeEvent>) -> Self {
        Self { events }
    }
}

impl Speaker for MutedSpeaker {
    fn speak(&mut self, _text: &str, ticket: PlaybackTicket) -> Result<(), PlaybackError> {
        let _ = self.events.send(PracticeEvent::PlaybackFinished {
            ticket,
            outcome: PlaybackOutcome::Finished,
        });
        Ok(())
    }
}
