use chrono::NaiveTime;

use crate::alarm::model::{AlarmEntry, AlarmStore, TimeOfDay};
use crate::audio::Tone;

pub const DEFAULT_FIRING_WINDOW_SECS: i64 = 60;

#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum SchedulerState {
    Idle,
    Waiting,
    Due,
    Past,
}

impl SchedulerState {
    pub fn label(self) -> &'static str {
        match self {
            SchedulerState::Idle => "IDLE",
            SchedulerState::Waiting => "WAITING",
            SchedulerState::Due => "DUE",
            SchedulerState::Past => "PAST",
        }
    }
}

/// Per-entry status shown by the presentation layers.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum AlarmStatus {
    Ringing,
    Passed,
    Off,
    Next,
    Armed,
}

impl AlarmStatus {
    pub fn label(self) -> &'static str {
        match self {
            AlarmStatus::Ringing => "ringing",
            AlarmStatus::Passed => "passed",
            AlarmStatus::Off => "off",
            AlarmStatus::Next => "next",
            AlarmStatus::Armed => "on",
        }
    }
}

/// Result of evaluating the pending alarm once.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub struct TickOutcome {
    pub state: SchedulerState,
    pub alarm: Option<TimeOfDay>,
    pub elapsed_secs: Option<i64>,
    pub tone_started: bool,
    pub tone_stopped: bool,
}

impl TickOutcome {
    fn idle(tone_stopped: bool) -> Self {
        Self {
            state: SchedulerState::Idle,
            alarm: None,
            elapsed_secs: None,
            tone_started: false,
            tone_stopped,
        }
    }
}

/// Evaluates the earliest pending alarm against the current time-of-day.
///
/// The pending alarm is looked up in the store on every tick. Between ticks
/// only the last evaluated alarm and the one the tone rings for are kept.
pub struct AlarmScheduler {
    firing_window_secs: i64,
    state: SchedulerState,
    evaluated: Option<TimeOfDay>,
    ringing_for: Option<TimeOfDay>,
}

impl Default for AlarmScheduler {
    fn default() -> Self {
        Self::new(DEFAULT_FIRING_WINDOW_SECS)
    }
}

impl AlarmScheduler {
    pub fn new(firing_window_secs: i64) -> Self {
        Self {
            firing_window_secs: firing_window_secs.max(0),
            state: SchedulerState::Idle,
            evaluated: None,
            ringing_for: None,
        }
    }

    pub fn state(&self) -> SchedulerState {
        self.state
    }

    #[cfg(test)]
    pub fn ringing_for(&self) -> Option<TimeOfDay> {
        self.ringing_for
    }

    pub fn firing_window_secs(&self) -> i64 {
        self.firing_window_secs
    }

    pub fn tick(&mut self, store: &mut AlarmStore, now: NaiveTime, tone: &mut Tone) -> TickOutcome {
        let Some(pending) = store.pending().cloned() else {
            let stopped = self.silence(tone);
            self.state = SchedulerState::Idle;
            self.evaluated = None;
            return TickOutcome::idle(stopped);
        };

        let mut tone_stopped = false;
        if self.ringing_entry_gone(store, true) {
            tone_stopped = self.silence(tone);
        }

        let elapsed = pending.time.elapsed_secs(now);
        let mut tone_started = false;
        let state = if elapsed < 0 {
            SchedulerState::Waiting
        } else if elapsed <= self.firing_window_secs {
            if pending.active {
                tone_started = tone.play();
                self.ringing_for = Some(pending.time);
            }
            SchedulerState::Due
        } else {
            // Only silence the alarm being skipped, not a later one still ringing.
            if self.ringing_for == Some(pending.time) {
                tone_stopped |= self.silence(tone);
            }
            store.mark_passed(pending.time);
            tracing::debug!(alarm = %pending.time, elapsed, "alarm window elapsed, skipping");
            SchedulerState::Past
        };

        if state == SchedulerState::Past {
            self.evaluated = store.pending().map(|entry| entry.time);
            self.state = self.resting_state(store);
        } else {
            self.evaluated = Some(pending.time);
            self.state = state;
        }

        TickOutcome {
            state,
            alarm: Some(pending.time),
            elapsed_secs: Some(elapsed),
            tone_started,
            tone_stopped,
        }
    }

    /// Re-resolves the pending alarm after the store was mutated outside a
    /// tick. Stops the tone only if the alarm it rang for was removed;
    /// deactivation is picked up by the next tick.
    pub fn reconcile(&mut self, store: &AlarmStore, tone: &mut Tone) -> bool {
        let pending = store.pending().map(|entry| entry.time);
        let mut stopped = false;
        if self.ringing_entry_gone(store, false) {
            stopped = self.silence(tone);
        }
        if pending != self.evaluated {
            self.evaluated = pending;
            self.state = self.resting_state(store);
        }
        stopped
    }

    pub fn status_of(&self, store: &AlarmStore, entry: &AlarmEntry) -> AlarmStatus {
        if self.ringing_for == Some(entry.time) {
            AlarmStatus::Ringing
        } else if entry.passed() {
            AlarmStatus::Passed
        } else if !entry.active {
            AlarmStatus::Off
        } else if store.pending().is_some_and(|pending| pending.time == entry.time) {
            AlarmStatus::Next
        } else {
            AlarmStatus::Armed
        }
    }

    /// True when the tone rings for an entry that was removed or, when
    /// `check_active` is set, deactivated or already passed.
    fn ringing_entry_gone(&self, store: &AlarmStore, check_active: bool) -> bool {
        self.ringing_for.is_some_and(|ringing| {
            store
                .get(ringing)
                .is_none_or(|entry| check_active && (!entry.active || entry.passed()))
        })
    }

    fn resting_state(&self, store: &AlarmStore) -> SchedulerState {
        if self.ringing_for.is_some() {
            SchedulerState::Due
        } else if store.pending().is_some() {
            SchedulerState::Waiting
        } else {
            SchedulerState::Idle
        }
    }

    fn silence(&mut self, tone: &mut Tone) -> bool {
        self.ringing_for = None;
        tone.stop()
    }
}
