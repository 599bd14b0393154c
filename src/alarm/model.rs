use std::collections::HashSet;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use anyhow::{Context, Result, bail};
use chrono::{NaiveTime, Timelike};
use serde::Deserialize;
use thiserror::Error;

/// Wall-clock hour and minute. Seconds are always zero.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct TimeOfDay(NaiveTime);

#[derive(Debug, Error, Eq, PartialEq)]
#[error("invalid time '{input}', expected HH:MM")]
pub struct ParseTimeError {
    input: String,
}

impl TimeOfDay {
    pub fn hour(&self) -> u32 {
        self.0.hour()
    }

    pub fn minute(&self) -> u32 {
        self.0.minute()
    }

    /// Signed whole seconds from this time-of-day to `now` on the same day.
    /// Negative while the alarm still lies ahead.
    pub fn elapsed_secs(&self, now: NaiveTime) -> i64 {
        i64::from(now.num_seconds_from_midnight()) - i64::from(self.0.num_seconds_from_midnight())
    }

    pub fn label(&self) -> String {
        self.to_string()
    }
}

impl FromStr for TimeOfDay {
    type Err = ParseTimeError;

    fn from_str(input: &str) -> Result<Self, Self::Err> {
        let trimmed = input.trim();
        let invalid = || ParseTimeError {
            input: trimmed.to_string(),
        };
        // chrono accepts single-digit fields, so enforce the two-digit shape first.
        let bytes = trimmed.as_bytes();
        let shaped = bytes.len() == 5
            && bytes[2] == b':'
            && bytes
                .iter()
                .enumerate()
                .all(|(index, byte)| index == 2 || byte.is_ascii_digit());
        if !shaped {
            return Err(invalid());
        }
        NaiveTime::parse_from_str(trimmed, "%H:%M")
            .map(Self)
            .map_err(|_| invalid())
    }
}

impl fmt::Display for TimeOfDay {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02}:{:02}", self.hour(), self.minute())
    }
}

#[derive(Debug, Clone, Eq, PartialEq)]
pub struct AlarmEntry {
    pub time: TimeOfDay,
    pub active: bool,
    passed: bool,
}

impl AlarmEntry {
    fn new(time: TimeOfDay) -> Self {
        Self {
            time,
            active: true,
            passed: false,
        }
    }

    /// The scheduler already evaluated this entry as past its firing window.
    pub fn passed(&self) -> bool {
        self.passed
    }
}

/// Alarm entries kept sorted by time-of-day and unique by it.
///
/// The pending alarm is never stored as an index: it is always the first
/// entry that has not been passed, so removing or inserting entries cannot
/// leave it pointing at a stale slot.
#[derive(Debug, Clone, Default)]
pub struct AlarmStore {
    entries: Vec<AlarmEntry>,
}

impl AlarmStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_times(times: impl IntoIterator<Item = TimeOfDay>) -> Self {
        let mut store = Self::new();
        for time in times {
            store.add(time);
        }
        store
    }

    /// Returns false when an entry for `time` already exists.
    pub fn add(&mut self, time: TimeOfDay) -> bool {
        match self.position(time) {
            Ok(_) => false,
            Err(index) => {
                self.entries.insert(index, AlarmEntry::new(time));
                true
            }
        }
    }

    /// Parses an `HH:MM` submission and adds it. Malformed text adds nothing.
    pub fn submit(&mut self, text: &str) -> Option<TimeOfDay> {
        let time = match text.parse::<TimeOfDay>() {
            Ok(time) => time,
            Err(err) => {
                tracing::debug!(%err, "ignoring malformed alarm submission");
                return None;
            }
        };
        self.add(time).then_some(time)
    }

    pub fn set_active(&mut self, time: TimeOfDay, active: bool) -> bool {
        match self.entry_mut(time) {
            Some(entry) => {
                entry.active = active;
                true
            }
            None => false,
        }
    }

    pub fn toggle(&mut self, time: TimeOfDay) -> Option<bool> {
        let entry = self.entry_mut(time)?;
        entry.active = !entry.active;
        Some(entry.active)
    }

    pub fn remove(&mut self, time: TimeOfDay) -> Option<AlarmEntry> {
        let index = self.position(time).ok()?;
        Some(self.entries.remove(index))
    }

    pub fn get(&self, time: TimeOfDay) -> Option<&AlarmEntry> {
        let index = self.position(time).ok()?;
        self.entries.get(index)
    }

    pub fn pending(&self) -> Option<&AlarmEntry> {
        self.entries.iter().find(|entry| !entry.passed)
    }

    pub fn mark_passed(&mut self, time: TimeOfDay) -> bool {
        match self.entry_mut(time) {
            Some(entry) => {
                entry.passed = true;
                true
            }
            None => false,
        }
    }

    pub fn entries(&self) -> &[AlarmEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn position(&self, time: TimeOfDay) -> Result<usize, usize> {
        self.entries.binary_search_by_key(&time, |entry| entry.time)
    }

    fn entry_mut(&mut self, time: TimeOfDay) -> Option<&mut AlarmEntry> {
        let index = self.position(time).ok()?;
        self.entries.get_mut(index)
    }
}

#[derive(Debug, Clone)]
pub struct AlarmConfig {
    #[allow(dead_code)]
    pub version: u32,
    pub settings: AlarmSettings,
    pub alarms: Vec<TimeOfDay>,
}

impl Default for AlarmConfig {
    fn default() -> Self {
        Self {
            version: 1,
            settings: AlarmSettings::default(),
            alarms: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct AlarmSettings {
    pub firing_window_secs: u64,
    pub tick_interval_ms: u64,
    pub tone_path: Option<PathBuf>,
    pub tone_frequency_hz: f32,
    pub volume: f32,
}

impl Default for AlarmSettings {
    fn default() -> Self {
        Self {
            firing_window_secs: default_firing_window_secs(),
            tick_interval_ms: default_tick_interval_ms(),
            tone_path: None,
            tone_frequency_hz: default_tone_frequency_hz(),
            volume: default_volume(),
        }
    }
}

pub fn load_alarm_config(path: &Path) -> Result<AlarmConfig> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("unable to read config file {}", path.display()))?;
    parse_alarm_config_text(&content)
}

pub fn parse_alarm_config_text(content: &str) -> Result<AlarmConfig> {
    let raw = serde_json::from_str::<AlarmConfigFile>(content).map_err(|err| {
        let line = err.line();
        let column = err.column();
        anyhow::anyhow!("invalid JSON at line {line}, column {column}: {err}")
    })?;

    if raw.version != 1 {
        bail!(
            "unsupported alarm config version {}; expected version 1",
            raw.version
        );
    }
    if raw.settings.tick_interval_ms == 0 {
        bail!("settings.tick_interval_ms must be greater than zero");
    }
    if !(0.0..=1.0).contains(&raw.settings.volume) {
        bail!(
            "settings.volume must be between 0.0 and 1.0, got {}",
            raw.settings.volume
        );
    }
    if raw.settings.tone_frequency_hz <= 0.0 {
        bail!("settings.tone_frequency_hz must be positive");
    }

    let mut seen = HashSet::new();
    let mut alarms = Vec::with_capacity(raw.alarms.len());
    for text in raw.alarms {
        let time = text.parse::<TimeOfDay>()?;
        if !seen.insert(time) {
            bail!("duplicate alarm time found: {time}");
        }
        alarms.push(time);
    }

    Ok(AlarmConfig {
        version: raw.version,
        settings: AlarmSettings {
            firing_window_secs: raw.settings.firing_window_secs,
            tick_interval_ms: raw.settings.tick_interval_ms,
            tone_path: raw.settings.tone_path,
            tone_frequency_hz: raw.settings.tone_frequency_hz,
            volume: raw.settings.volume,
        },
        alarms,
    })
}

#[derive(Debug, Deserialize)]
struct AlarmConfigFile {
    version: u32,
    #[serde(default)]
    settings: AlarmSettingsFile,
    #[serde(default)]
    alarms: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct AlarmSettingsFile {
    #[serde(default = "default_firing_window_secs")]
    firing_window_secs: u64,
    #[serde(default = "default_tick_interval_ms")]
    tick_interval_ms: u64,
    #[serde(default)]
    tone_path: Option<PathBuf>,
    #[serde(default = "default_tone_frequency_hz")]
    tone_frequency_hz: f32,
    #[serde(default = "default_volume")]
    volume: f32,
}

impl Default for AlarmSettingsFile {
    fn default() -> Self {
        Self {
            firing_window_secs: default_firing_window_secs(),
            tick_interval_ms: default_tick_interval_ms(),
            tone_path: None,
            tone_frequency_hz: default_tone_frequency_hz(),
            volume: default_volume(),
        }
    }
}

fn default_firing_window_secs() -> u64 {
    60
}

fn default_tick_interval_ms() -> u64 {
    1_000
}

fn default_tone_frequency_hz() -> f32 {
    880.0
}

fn default_volume() -> f32 {
    0.25
}
