use std::time::Instant;

use anyhow::{Context, Result};
use chrono::{Local, NaiveTime, TimeDelta};

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum ClockSourceKind {
    System,
    StartAt(NaiveTime),
}

pub trait TimeProvider: Send + Sync {
    fn now(&self) -> NaiveTime;
}

pub struct SelectedClock {
    pub provider: Box<dyn TimeProvider>,
    pub label: &'static str,
}

/// Local wall clock.
pub struct SystemClock;

impl TimeProvider for SystemClock {
    fn now(&self) -> NaiveTime {
        Local::now().time()
    }
}

/// Runs in real time from a chosen time-of-day, wrapping at midnight.
pub struct StartAtClock {
    start: NaiveTime,
    anchor: Instant,
}

impl StartAtClock {
    pub fn new(start: NaiveTime) -> Self {
        Self {
            start,
            anchor: Instant::now(),
        }
    }
}

impl TimeProvider for StartAtClock {
    fn now(&self) -> NaiveTime {
        let elapsed = TimeDelta::from_std(self.anchor.elapsed()).unwrap_or(TimeDelta::zero());
        self.start.overflowing_add_signed(elapsed).0
    }
}

pub fn select_clock(kind: ClockSourceKind) -> SelectedClock {
    match kind {
        ClockSourceKind::System => SelectedClock {
            provider: Box::new(SystemClock),
            label: "LOCAL",
        },
        ClockSourceKind::StartAt(start) => SelectedClock {
            provider: Box::new(StartAtClock::new(start)),
            label: "START_AT",
        },
    }
}

pub fn parse_start_time(input: &str) -> Result<NaiveTime> {
    NaiveTime::parse_from_str(input, "%H:%M:%S")
        .or_else(|_| NaiveTime::parse_from_str(input, "%H:%M"))
        .with_context(|| format!("invalid start time '{input}', expected HH:MM or HH:MM:SS"))
}
