/// Wall-clock and active (non-paused) elapsed time of a session.
///
/// Total time is derived from the start anchor on every tick, so tick drift
/// never accumulates into it. Active time is accumulated one tick interval
/// at a time and simply stops growing while paused; it can undercount by up
/// to one interval around each pause boundary.
#[derive(Debug, Default, Clone)]
pub struct TimingAccumulator {
    session_start_ms: Option<u64>,
    total_elapsed_ms: u64,
    active_elapsed_ms: u64,
    step_start_ms: Option<u64>,
    paused: bool,
}

impl TimingAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn start(&mut self, now_ms: u64) {
        self.session_start_ms = Some(now_ms);
        self.total_elapsed_ms = 0;
        self.active_elapsed_ms = 0;
        self.step_start_ms = Some(now_ms);
        self.paused = false;
    }

    pub fn on_tick(&mut self, now_ms: u64, interval_ms: u64) {
        let Some(start) = self.session_start_ms else {
            return;
        };
        if self.paused {
            return;
        }
        self.total_elapsed_ms = now_ms.saturating_sub(start);
        // active can never run ahead of wall clock
        self.active_elapsed_ms = (self.active_elapsed_ms + interval_ms).min(self.total_elapsed_ms);
    }

    /// Returns false when already paused.
    pub fn pause(&mut self) -> bool {
        if self.paused {
            return false;
        }
        self.paused = true;
        true
    }

    /// Returns false when not paused.
    pub fn resume(&mut self) -> bool {
        if !self.paused {
            return false;
        }
        self.paused = false;
        true
    }

    pub fn is_paused(&self) -> bool {
        self.paused
    }

    pub fn step_started(&mut self, now_ms: u64) {
        self.step_start_ms = Some(now_ms);
    }

    /// Time on the current step; zero if no step anchor was ever set.
    pub fn step_elapsed(&self, now_ms: u64) -> u64 {
        self.step_start_ms
            .map(|start| now_ms.saturating_sub(start))
            .unwrap_or(0)
    }

    pub fn total_elapsed_ms(&self) -> u64 {
        self.total_elapsed_ms
    }

    pub fn active_elapsed_ms(&self) -> u64 {
        self.active_elapsed_ms
    }

    /// Final `(total, active)` figures for reporting. Total is re-derived at
    /// `now_ms`; active is what was accumulated.
    pub fn snapshot(&self, now_ms: u64) -> (u64, u64) {
        let total = self
            .session_start_ms
            .map(|start| now_ms.saturating_sub(start))
            .unwrap_or(0)
            .max(self.total_elapsed_ms);
        (total, self.active_elapsed_ms.min(total))
    }
}

/// Renders milliseconds as zero-padded `MM:SS` with no hour component.
pub fn format_elapsed(ms: u64) -> String {
    let secs = ms / 1000;
    format!("{:02}:{:02}", secs / 60, secs % 60)
}
