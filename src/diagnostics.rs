use std::io::Write;
use std::sync::Arc;
use std::sync::mpsc;
use std::time::{Duration, Instant};

use anyhow::{Result, bail};

use crate::session::Session;
use crate::ticker::{TickSink, Ticker};

/// Interval statistics for the ticker pacing check.
pub struct TickStats {
    target: Duration,
    intervals: Vec<Duration>,
}

impl TickStats {
    pub fn new(target: Duration) -> Self {
        Self {
            target,
            intervals: Vec::new(),
        }
    }

    pub fn record(&mut self, interval: Duration) {
        self.intervals.push(interval);
    }

    pub fn count(&self) -> usize {
        self.intervals.len()
    }

    pub fn mean(&self) -> Duration {
        if self.intervals.is_empty() {
            return Duration::ZERO;
        }
        let total: Duration = self.intervals.iter().sum();
        total / self.intervals.len() as u32
    }

    /// Largest absolute deviation of any interval from the target period.
    pub fn max_drift(&self) -> Duration {
        self.intervals
            .iter()
            .map(|interval| interval.abs_diff(self.target))
            .max()
            .unwrap_or(Duration::ZERO)
    }
}

/// Prints configuration, audio availability and the result of one
/// evaluation, then optionally measures ticker pacing.
pub fn run_diagnostics(
    session: &mut Session,
    audio_status: &str,
    pacing_ticks: u32,
    out: &mut impl Write,
) -> Result<()> {
    writeln!(out, "alarmclock diagnostics")?;
    writeln!(out, "Clock source: {}", session.clock_label())?;
    writeln!(out, "Current time: {}", session.now().format("%H:%M:%S"))?;
    writeln!(out, "Firing window (s): {}", session.firing_window_secs())?;
    writeln!(
        out,
        "Tick interval (ms): {}",
        session.tick_interval().as_millis()
    )?;
    writeln!(out, "Audio: {audio_status}")?;
    writeln!(out, "Alarms: {}", session.alarm_count())?;
    for entry in session.entries() {
        writeln!(
            out,
            "  {} {}",
            entry.time,
            if entry.active { "on" } else { "off" }
        )?;
    }

    let outcome = session.tick();
    match (outcome.alarm, outcome.elapsed_secs) {
        (Some(alarm), Some(elapsed)) => writeln!(
            out,
            "Tick result: {} {alarm} (elapsed {elapsed}s)",
            outcome.state.label()
        )?,
        _ => writeln!(out, "Tick result: {}", outcome.state.label())?,
    }
    writeln!(out, "Scheduler state: {}", session.state().label())?;
    match session.pending() {
        Some(entry) => writeln!(out, "Pending alarm: {}", entry.time)?,
        None => writeln!(out, "Pending alarm: none")?,
    }
    writeln!(
        out,
        "Tone would play: {}",
        if session.tone().is_playing() {
            "yes"
        } else {
            "no"
        }
    )?;

    if pacing_ticks > 0 {
        let target = session.tick_interval();
        writeln!(out, "Measuring {pacing_ticks} ticker interval(s)...")?;
        let stats = measure_pacing(target, pacing_ticks)?;
        writeln!(out, "Ticker pacing:")?;
        writeln!(out, "  Ticks: {}", stats.count())?;
        writeln!(out, "  Mean interval (ms): {:.1}", stats.mean().as_secs_f64() * 1_000.0)?;
        writeln!(
            out,
            "  Max drift (ms): {:.1}",
            stats.max_drift().as_secs_f64() * 1_000.0
        )?;
    }
    Ok(())
}

fn measure_pacing(target: Duration, ticks: u32) -> Result<TickStats> {
    let (tx, rx) = mpsc::channel::<Instant>();
    let sink: TickSink = Arc::new(move || {
        let _ = tx.send(Instant::now());
    });

    let mut stats = TickStats::new(target);
    let mut previous = Instant::now();
    let ticker = Ticker::start(target, sink)?;
    for _ in 0..ticks {
        let Ok(fired_at) = rx.recv_timeout(target * 4 + Duration::from_millis(100)) else {
            bail!("ticker stopped firing during pacing check");
        };
        stats.record(fired_at.saturating_duration_since(previous));
        previous = fired_at;
    }
    drop(ticker);
    Ok(stats)
}

#[cfg(test)]
mod tests {
    use chrono::NaiveTime;

    use super::*;
    use crate::alarm::model::AlarmSettings;
    use crate::audio::Tone;
    use crate::time_provider::{ClockSourceKind, select_clock};

    #[test]
    fn stats_track_mean_and_drift() {
        let mut stats = TickStats::new(Duration::from_millis(100));
        assert_eq!(stats.mean(), Duration::ZERO);
        stats.record(Duration::from_millis(90));
        stats.record(Duration::from_millis(130));
        assert_eq!(stats.count(), 2);
        assert_eq!(stats.mean(), Duration::from_millis(110));
        assert_eq!(stats.max_drift(), Duration::from_millis(30));
    }

    #[test]
    fn report_includes_tick_result() {
        let start = NaiveTime::from_hms_opt(9, 0, 0).expect("valid");
        let mut session = Session::new(
            &AlarmSettings::default(),
            ["06:00", "10:00"].iter().map(|text| text.parse().expect("valid")),
            Tone::inert("test"),
            select_clock(ClockSourceKind::StartAt(start)),
        );

        let mut out = Vec::new();
        run_diagnostics(&mut session, "inert (test)", 0, &mut out).expect("report");
        let report = String::from_utf8(out).expect("utf8");
        assert!(report.contains("Clock source: START_AT"));
        assert!(report.contains("Alarms: 2"));
        assert!(report.contains("Tick result: PAST 06:00"));
        assert!(report.contains("Scheduler state: WAITING"));
        assert!(report.contains("Pending alarm: 10:00"));
        assert!(report.contains("Tone would play: no"));
    }

    #[test]
    fn pacing_check_collects_requested_ticks() {
        let stats = measure_pacing(Duration::from_millis(10), 3).expect("pacing");
        assert_eq!(stats.count(), 3);
        assert!(stats.mean() >= Duration::from_millis(5));
    }
}
