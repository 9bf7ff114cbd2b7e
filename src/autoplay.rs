// Bounded, cancellable automatic pronunciation of the current word.
//
// A run is tied to one (word, step) position. After a debounce it plays the
// word, waits for playback to finish, pauses for a gap and plays again, up
// to `max_plays` times. The owner re-evaluates its cancellation predicate
// before every play and passes the answer in; a cancellation that arrives
// while a playback is in flight takes effect once that playback finishes.

use crate::audio::PlaybackTicket;
use crate::scheduler::{TimerId, TimerKind, TimerQueue, TimerSlot};
use crate::step::Position;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AutoPlayConfig {
    pub debounce_ms: u64,
    pub gap_ms: u64,
    pub max_plays: u8,
}

impl Default for AutoPlayConfig {
    fn default() -> Self {
        Self {
            debounce_ms: 1000,
            gap_ms: 1000,
            max_plays: 3,
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct Run {
    target: Position,
    plays: u8,
    in_flight: Option<PlaybackTicket>,
}

/// What happened to the run after a playback finished.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaybackDisposition {
    /// The ticket does not belong to the current run (manual playback, or a
    /// run that was cancelled while this playback was in flight).
    NotOurs,
    /// Another play is scheduled after the gap.
    Continue,
    /// The run ended normally, either bounded out or cancelled.
    Done,
    /// Playback failed; the run is over with no further retries.
    Aborted,
}

#[derive(Debug)]
pub struct AutoPlayScheduler {
    config: AutoPlayConfig,
    run: Option<Run>,
    timer: TimerSlot,
}

impl AutoPlayScheduler {
    pub fn new(config: AutoPlayConfig) -> Self {
        Self {
            config,
            run: None,
            timer: TimerSlot::new(),
        }
    }

    /// Starts a fresh run for `target`, superseding any previous one.
    pub fn trigger(&mut self, timers: &mut TimerQueue, now_ms: u64, target: Position) {
        if self.config.max_plays == 0 {
            self.cancel(timers);
            return;
        }
        self.run = Some(Run {
            target,
            plays: 0,
            in_flight: None,
        });
        self.timer
            .arm(timers, now_ms, self.config.debounce_ms, TimerKind::AutoPlay(target));
        tracing::debug!(?target, "Auto-play scheduled");
    }

    /// Drops the run and its pending timer. An in-flight playback is left to
    /// finish; its completion will be reported as [`PlaybackDisposition::NotOurs`].
    pub fn cancel(&mut self, timers: &mut TimerQueue) -> bool {
        self.timer.clear(timers);
        self.run.take().is_some()
    }

    /// Handles a fired auto-play timer. Returns the position to sound now,
    /// or `None` when the timer is stale or the run has been cancelled.
    pub fn on_timer(
        &mut self,
        fired: TimerId,
        target: Position,
        cancelled: bool,
    ) -> Option<Position> {
        if !self.timer.release(fired) {
            tracing::debug!(?target, "Ignoring stale auto-play timer");
            return None;
        }
        let run = self.run.as_ref()?;
        if run.target != target {
            tracing::debug!(?target, current = ?run.target, "Auto-play target moved on");
            return None;
        }
        if cancelled {
            tracing::debug!(?target, plays = run.plays, "Auto-play cancelled before playing");
            self.run = None;
            return None;
        }
        Some(target)
    }

    pub fn playback_started(&mut self, ticket: PlaybackTicket) {
        if let Some(run) = self.run.as_mut() {
            run.in_flight = Some(ticket);
        }
    }

    pub fn on_playback_finished(
        &mut self,
        timers: &mut TimerQueue,
        now_ms: u64,
        ticket: PlaybackTicket,
        succeeded: bool,
        cancelled: bool,
    ) -> PlaybackDisposition {
        let Some(run) = self.run.as_mut() else {
            return PlaybackDisposition::NotOurs;
        };
        if run.in_flight != Some(ticket) {
            return PlaybackDisposition::NotOurs;
        }
        run.in_flight = None;

        if !succeeded {
            self.run = None;
            return PlaybackDisposition::Aborted;
        }

        run.plays += 1;
        if run.plays < self.config.max_plays && !cancelled {
            let target = run.target;
            self.timer
                .arm(timers, now_ms, self.config.gap_ms, TimerKind::AutoPlay(target));
            PlaybackDisposition::Continue
        } else {
            tracing::debug!(target = ?run.target, plays = run.plays, "Auto-play run finished");
            self.run = None;
            PlaybackDisposition::Done
        }
    }

    pub fn is_running(&self) -> bool {
        self.run.is_some()
    }

    pub fn target(&self) -> Option<Position> {
        self.run.map(|r| r.target)
    }

    /// Plays completed by the current run; zero when no run is active.
    pub fn plays(&self) -> u8 {
        self.run.map(|r| r.plays).unwrap_or(0)
    }
}
