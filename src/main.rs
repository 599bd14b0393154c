mod alarm;
mod audio;
mod console;
mod diagnostics;
mod logging;
mod session;
mod ticker;
mod time_provider;
mod ui;

use std::io;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;

use crate::alarm::model::{AlarmConfig, TimeOfDay, load_alarm_config};
use crate::audio::{Tone, open_tone};
use crate::session::Session;
use crate::time_provider::{ClockSourceKind, parse_start_time, select_clock};

#[derive(Parser, Debug)]
#[command(
    name = "alarmclock",
    version,
    about = "Alarm clock with a once-per-second alarm scheduler"
)]
struct Cli {
    /// JSON config file with settings and alarms to start with.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Alarm to start with, repeatable.
    #[arg(long = "alarm", value_name = "HH:MM")]
    alarms: Vec<String>,

    /// Run the clock from this time-of-day instead of the local clock.
    #[arg(long, value_name = "HH:MM[:SS]")]
    start_at: Option<String>,

    /// Audio file to loop while an alarm rings.
    #[arg(long, value_name = "PATH")]
    tone: Option<PathBuf>,

    #[arg(long)]
    no_audio: bool,

    #[arg(long, conflicts_with = "diagnostics")]
    console: bool,

    #[arg(long)]
    diagnostics: bool,

    #[arg(long, default_value_t = 3)]
    pacing_ticks: u32,
}

fn main() {
    if let Err(err) = run() {
        eprintln!("error: {err:#}");
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    let cli = Cli::parse();
    logging::init();

    let mut config = match cli.config.as_deref() {
        Some(path) => load_alarm_config(path)
            .with_context(|| format!("failed to load {}", path.display()))?,
        None => AlarmConfig::default(),
    };
    if let Some(tone) = cli.tone {
        config.settings.tone_path = Some(tone);
    }

    let mut seeds = config.alarms.clone();
    for text in &cli.alarms {
        let time = text
            .parse::<TimeOfDay>()
            .with_context(|| format!("invalid --alarm value '{text}'"))?;
        seeds.push(time);
    }

    let clock_kind = match cli.start_at.as_deref() {
        Some(text) => ClockSourceKind::StartAt(parse_start_time(text)?),
        None => ClockSourceKind::System,
    };
    let clock = select_clock(clock_kind);
    tracing::info!(clock = clock.label, alarms = seeds.len(), "starting alarm clock");

    if cli.diagnostics {
        let probe = open_tone(&config.settings, !cli.no_audio);
        let audio_status = match probe.inert_reason() {
            Some(reason) => format!("inert ({reason})"),
            None => "ready".to_string(),
        };
        drop(probe);

        let mut session = Session::new(
            &config.settings,
            seeds,
            Tone::inert("diagnostics"),
            clock,
        );
        let stdout = io::stdout();
        let mut out = stdout.lock();
        return diagnostics::run_diagnostics(&mut session, &audio_status, cli.pacing_ticks, &mut out);
    }

    let tone = open_tone(&config.settings, !cli.no_audio);
    let session = Session::new(&config.settings, seeds, tone, clock);
    if cli.console {
        console::run_console(session)
    } else {
        ui::app::run_gui(session)
    }
}
