use std::time::Duration;

use anyhow::Result;
use chrono::NaiveTime;

use crate::alarm::model::{AlarmEntry, AlarmSettings, AlarmStore, TimeOfDay};
use crate::alarm::scheduler::{AlarmScheduler, AlarmStatus, SchedulerState, TickOutcome};
use crate::audio::Tone;
use crate::ticker::{TickSink, Ticker};
use crate::time_provider::SelectedClock;

/// Everything a presentation layer drives: the alarm store, the scheduler,
/// the tone and the periodic ticker that prompts evaluation.
///
/// The ticker only signals; evaluation happens on the thread that owns the
/// session when it calls [`Session::tick`].
pub struct Session {
    store: AlarmStore,
    scheduler: AlarmScheduler,
    tone: Tone,
    clock: SelectedClock,
    tick_interval: Duration,
    sink: Option<TickSink>,
    ticker: Option<Ticker>,
    armed_for: Option<TimeOfDay>,
    ticker_restarts: u64,
}

impl Session {
    pub fn new(
        settings: &AlarmSettings,
        seeds: impl IntoIterator<Item = TimeOfDay>,
        tone: Tone,
        clock: SelectedClock,
    ) -> Self {
        let firing_window_secs = i64::try_from(settings.firing_window_secs).unwrap_or(i64::MAX);
        let store = AlarmStore::with_times(seeds);
        let mut scheduler = AlarmScheduler::new(firing_window_secs);
        let mut tone = tone;
        scheduler.reconcile(&store, &mut tone);
        Self {
            store,
            scheduler,
            tone,
            clock,
            tick_interval: Duration::from_millis(settings.tick_interval_ms.max(1)),
            sink: None,
            ticker: None,
            armed_for: None,
            ticker_restarts: 0,
        }
    }

    /// Starts ticking into `sink`. The ticker is re-established whenever
    /// the pending alarm changes and stopped while there is nothing pending.
    pub fn attach_ticker(&mut self, sink: TickSink) -> Result<()> {
        self.sink = Some(sink);
        self.ticker = None;
        self.armed_for = None;
        self.restart_ticker()
    }

    pub fn detach_ticker(&mut self) {
        self.ticker = None;
        self.sink = None;
    }

    /// Adds an alarm from `HH:MM` text; malformed or duplicate input is ignored.
    pub fn submit(&mut self, text: &str) -> Option<TimeOfDay> {
        let added = self.store.submit(text)?;
        tracing::info!(alarm = %added, "alarm added");
        self.after_mutation();
        Some(added)
    }

    pub fn set_active(&mut self, time: TimeOfDay, active: bool) -> bool {
        let found = self.store.set_active(time, active);
        if found {
            tracing::info!(alarm = %time, active, "alarm toggled");
            self.after_mutation();
        }
        found
    }

    pub fn toggle(&mut self, time: TimeOfDay) -> Option<bool> {
        let active = self.store.toggle(time)?;
        tracing::info!(alarm = %time, active, "alarm toggled");
        self.after_mutation();
        Some(active)
    }

    pub fn remove(&mut self, time: TimeOfDay) -> Option<AlarmEntry> {
        let removed = self.store.remove(time)?;
        tracing::info!(alarm = %time, "alarm removed");
        self.after_mutation();
        Some(removed)
    }

    pub fn tick(&mut self) -> TickOutcome {
        let now = self.clock.provider.now();
        self.evaluate(now)
    }

    pub fn evaluate(&mut self, now: NaiveTime) -> TickOutcome {
        let outcome = self.scheduler.tick(&mut self.store, now, &mut self.tone);
        if outcome.tone_started
            && let Some(alarm) = outcome.alarm
        {
            tracing::info!(%alarm, "alarm ringing");
        }
        if outcome.state == SchedulerState::Past
            && let Some(alarm) = outcome.alarm
        {
            tracing::info!(%alarm, "alarm window elapsed");
        }
        self.rearm_if_pending_changed();
        outcome
    }

    pub fn now(&self) -> NaiveTime {
        self.clock.provider.now()
    }

    pub fn clock_label(&self) -> &'static str {
        self.clock.label
    }

    pub fn entries(&self) -> &[AlarmEntry] {
        self.store.entries()
    }

    pub fn alarm_count(&self) -> usize {
        self.store.len()
    }

    pub fn has_alarms(&self) -> bool {
        !self.store.is_empty()
    }

    pub fn pending(&self) -> Option<&AlarmEntry> {
        self.store.pending()
    }

    pub fn state(&self) -> SchedulerState {
        self.scheduler.state()
    }

    pub fn status_of(&self, entry: &AlarmEntry) -> AlarmStatus {
        self.scheduler.status_of(&self.store, entry)
    }

    pub fn tone(&self) -> &Tone {
        &self.tone
    }

    pub fn firing_window_secs(&self) -> i64 {
        self.scheduler.firing_window_secs()
    }

    pub fn tick_interval(&self) -> Duration {
        self.tick_interval
    }

    pub fn is_ticking(&self) -> bool {
        self.ticker.is_some()
    }

    #[cfg(test)]
    pub fn ticker_restarts(&self) -> u64 {
        self.ticker_restarts
    }

    fn after_mutation(&mut self) {
        if self.scheduler.reconcile(&self.store, &mut self.tone) {
            tracing::info!("alarm tone stopped after schedule change");
        }
        self.rearm_if_pending_changed();
    }

    fn rearm_if_pending_changed(&mut self) {
        let pending = self.store.pending().map(|entry| entry.time);
        if pending == self.armed_for {
            return;
        }
        if let Err(err) = self.restart_ticker() {
            tracing::error!(err = %format!("{err:#}"), "failed to restart alarm ticker");
        }
    }

    fn restart_ticker(&mut self) -> Result<()> {
        // The old ticker is joined before a new one exists.
        self.ticker = None;
        self.armed_for = self.store.pending().map(|entry| entry.time);
        let Some(sink) = self.sink.clone() else {
            return Ok(());
        };
        if self.armed_for.is_none() {
            tracing::debug!("no pending alarm, ticker parked");
            return Ok(());
        }
        self.ticker = Some(Ticker::start(self.tick_interval, sink)?);
        self.ticker_restarts += 1;
        tracing::debug!(pending = ?self.armed_for, restarts = self.ticker_restarts, "ticker armed");
        Ok(())
    }
}
