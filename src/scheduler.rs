// Deterministic timer queue driven by the engine clock.
//
// Timers never fire on their own: the host calls `TimerQueue::pop_due`
// with the current time and dispatches what comes out. Every concern that
// owns a timer (debounce, gap, advance, tick) keeps exactly one
// `TimerSlot`, and arming a slot always cancels what it held before.

use crate::step::Position;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TimerId(u64);

/// What a timer means when it fires. Positions are captured at scheduling
/// time so the callback can detect that the state it targeted has moved on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerKind {
    Tick,
    AutoPlay(Position),
    Advance(Position),
}

/// A timer taken off the queue. `due_ms` is the time it was meant to fire,
/// which callbacks use as their notion of "now".
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Fired {
    pub id: TimerId,
    pub due_ms: u64,
    pub kind: TimerKind,
}

#[derive(Debug, Clone, Copy)]
struct Pending {
    id: TimerId,
    due_ms: u64,
    kind: TimerKind,
}

#[derive(Debug, Default)]
pub struct TimerQueue {
    next_id: u64,
    pending: Vec<Pending>,
}

impl TimerQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn schedule(&mut self, now_ms: u64, delay_ms: u64, kind: TimerKind) -> TimerId {
        self.next_id += 1;
        let id = TimerId(self.next_id);
        self.pending.push(Pending {
            id,
            due_ms: now_ms.saturating_add(delay_ms),
            kind,
        });
        id
    }

    /// Returns false if the timer already fired or was cancelled.
    pub fn cancel(&mut self, id: TimerId) -> bool {
        let before = self.pending.len();
        self.pending.retain(|p| p.id != id);
        self.pending.len() != before
    }

    pub fn is_pending(&self, id: TimerId) -> bool {
        self.pending.iter().any(|p| p.id == id)
    }

    /// Removes and returns the earliest timer due at or before `now_ms`.
    /// Ties fire in scheduling order.
    pub fn pop_due(&mut self, now_ms: u64) -> Option<Fired> {
        let idx = self
            .pending
            .iter()
            .enumerate()
            .filter(|(_, p)| p.due_ms <= now_ms)
            .min_by_key(|(_, p)| (p.due_ms, p.id))
            .map(|(i, _)| i)?;
        let p = self.pending.remove(idx);
        Some(Fired {
            id: p.id,
            due_ms: p.due_ms,
            kind: p.kind,
        })
    }

    pub fn next_deadline(&self) -> Option<u64> {
        self.pending.iter().map(|p| p.due_ms).min()
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    pub fn clear(&mut self) {
        self.pending.clear();
    }
}

/// The single mutable timer handle owned by one concern.
#[derive(Debug, Default)]
pub struct TimerSlot {
    id: Option<TimerId>,
}

impl TimerSlot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Clear-then-set: the previous timer of this slot can never fire after
    /// this returns.
    pub fn arm(&mut self, queue: &mut TimerQueue, now_ms: u64, delay_ms: u64, kind: TimerKind) {
        self.clear(queue);
        self.id = Some(queue.schedule(now_ms, delay_ms, kind));
    }

    pub fn clear(&mut self, queue: &mut TimerQueue) {
        if let Some(id) = self.id.take() {
            queue.cancel(id);
        }
    }

    /// Called when a timer fired. Returns whether it was this slot's timer.
    pub fn release(&mut self, fired: TimerId) -> bool {
        if self.id == Some(fired) {
            self.id = None;
            true
        } else {
            false
        }
    }

    pub fn is_armed(&self) -> bool {
        self.id.is_some()
    }
}
