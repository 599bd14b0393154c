//! Line-oriented terminal front end.
//!
//! Commands arrive on stdin, ticks arrive from the session ticker; both are
//! funnelled through one channel so the session is only touched here.

use std::io::{self, BufRead, Write};
use std::sync::Arc;
use std::sync::mpsc;
use std::thread;

use anyhow::{Context, Result};

use crate::alarm::model::TimeOfDay;
use crate::alarm::scheduler::{SchedulerState, TickOutcome};
use crate::session::Session;
use crate::ticker::TickSink;

const USAGE: &str =
    "commands: add HH:MM | on HH:MM | off HH:MM | toggle HH:MM | rm HH:MM | list | status | quit";

enum ConsoleEvent {
    Tick,
    Line(String),
    Closed,
}

#[derive(Debug, Clone, Eq, PartialEq)]
enum ConsoleCommand {
    Add(String),
    On(String),
    Off(String),
    Toggle(String),
    Remove(String),
    List,
    Status,
    Help,
    Quit,
    Empty,
    Unknown(String),
}

#[derive(Debug, Clone, Copy, Eq, PartialEq)]
enum Flow {
    Continue,
    Quit,
}

pub fn run_console(mut session: Session) -> Result<()> {
    let (tx, rx) = mpsc::channel::<ConsoleEvent>();
    let tick_tx = tx.clone();
    let sink: TickSink = Arc::new(move || {
        let _ = tick_tx.send(ConsoleEvent::Tick);
    });
    session.attach_ticker(sink)?;

    thread::Builder::new()
        .name("console-stdin".to_string())
        .spawn(move || {
            let mut stdin = io::stdin().lock();
            let mut buf = Vec::new();
            loop {
                buf.clear();
                match stdin.read_until(b'\n', &mut buf) {
                    Ok(0) => break,
                    Ok(_) => {
                        // Undecodable bytes become U+FFFD and fall through as an unknown command.
                        let line = String::from_utf8_lossy(&buf)
                            .trim_end_matches(['\r', '\n'])
                            .to_string();
                        if tx.send(ConsoleEvent::Line(line)).is_err() {
                            return;
                        }
                    }
                    Err(err) if err.kind() == io::ErrorKind::Interrupted => continue,
                    Err(err) => {
                        tracing::debug!(%err, "stdin read failed, closing console");
                        break;
                    }
                }
            }
            let _ = tx.send(ConsoleEvent::Closed);
        })
        .context("failed to spawn stdin reader")?;

    let stdout = io::stdout();
    let mut out = stdout.lock();
    writeln!(
        out,
        "alarmclock console, clock {} at {}",
        session.clock_label(),
        session.now().format("%H:%M:%S")
    )?;
    writeln!(out, "{USAGE}")?;
    report_tick(&mut out, session.tick())?;

    for event in rx {
        match event {
            ConsoleEvent::Tick => report_tick(&mut out, session.tick())?,
            ConsoleEvent::Line(line) => {
                if handle_line(&mut session, &line, &mut out)? == Flow::Quit {
                    break;
                }
            }
            ConsoleEvent::Closed => break,
        }
        out.flush()?;
    }

    session.detach_ticker();
    tracing::info!("console session ended");
    Ok(())
}

fn parse_command(line: &str) -> ConsoleCommand {
    let mut words = line.split_whitespace();
    let Some(verb) = words.next() else {
        return ConsoleCommand::Empty;
    };
    let argument = words.next().unwrap_or_default().to_string();
    match verb.to_ascii_lowercase().as_str() {
        "add" => ConsoleCommand::Add(argument),
        "on" => ConsoleCommand::On(argument),
        "off" => ConsoleCommand::Off(argument),
        "toggle" => ConsoleCommand::Toggle(argument),
        "rm" | "remove" | "delete" => ConsoleCommand::Remove(argument),
        "list" | "ls" => ConsoleCommand::List,
        "status" => ConsoleCommand::Status,
        "help" | "?" => ConsoleCommand::Help,
        "quit" | "exit" => ConsoleCommand::Quit,
        other => ConsoleCommand::Unknown(other.to_string()),
    }
}

fn handle_line(session: &mut Session, line: &str, out: &mut impl Write) -> Result<Flow> {
    match parse_command(line) {
        ConsoleCommand::Add(text) => match session.submit(&text) {
            Some(time) => {
                writeln!(out, "added {time}")?;
                report_tick(out, session.tick())?;
            }
            None => writeln!(out, "ignored {text}")?,
        },
        ConsoleCommand::On(text) => set_active(session, &text, true, out)?,
        ConsoleCommand::Off(text) => set_active(session, &text, false, out)?,
        ConsoleCommand::Toggle(text) => {
            let toggled = text
                .parse::<TimeOfDay>()
                .ok()
                .and_then(|time| Some((time, session.toggle(time)?)));
            match toggled {
                Some((time, active)) => {
                    writeln!(out, "{time} {}", if active { "on" } else { "off" })?;
                    report_tick(out, session.tick())?;
                }
                None => writeln!(out, "no alarm at {text}")?,
            }
        }
        ConsoleCommand::Remove(text) => {
            let removed = text
                .parse::<TimeOfDay>()
                .ok()
                .and_then(|time| session.remove(time));
            match removed {
                Some(entry) => {
                    writeln!(out, "removed {}", entry.time)?;
                    report_tick(out, session.tick())?;
                }
                None => writeln!(out, "no alarm at {text}")?,
            }
        }
        ConsoleCommand::List => write_list(session, out)?,
        ConsoleCommand::Status => write_status(session, out)?,
        ConsoleCommand::Help => writeln!(out, "{USAGE}")?,
        ConsoleCommand::Quit => return Ok(Flow::Quit),
        ConsoleCommand::Empty => {}
        ConsoleCommand::Unknown(verb) => writeln!(out, "unknown command '{verb}'; {USAGE}")?,
    }
    Ok(Flow::Continue)
}

fn set_active(session: &mut Session, text: &str, active: bool, out: &mut impl Write) -> Result<()> {
    let found = text
        .parse::<TimeOfDay>()
        .ok()
        .filter(|time| session.set_active(*time, active));
    match found {
        Some(time) => {
            writeln!(out, "{time} {}", if active { "on" } else { "off" })?;
            report_tick(out, session.tick())?;
        }
        None => writeln!(out, "no alarm at {text}")?,
    }
    Ok(())
}

fn write_list(session: &Session, out: &mut impl Write) -> Result<()> {
    if !session.has_alarms() {
        writeln!(out, "no alarms")?;
        return Ok(());
    }
    for entry in session.entries() {
        writeln!(out, "{} {}", entry.time, session.status_of(entry).label())?;
    }
    Ok(())
}

fn write_status(session: &Session, out: &mut impl Write) -> Result<()> {
    let pending = session
        .pending()
        .map(|entry| entry.time.label())
        .unwrap_or_else(|| "none".to_string());
    writeln!(
        out,
        "clock {} | state {} | pending {} | tone {} | ticker {}",
        session.now().format("%H:%M:%S"),
        session.state().label(),
        pending,
        if session.tone().is_playing() {
            "playing"
        } else {
            "stopped"
        },
        if session.is_ticking() { "on" } else { "parked" }
    )?;
    Ok(())
}

fn report_tick(out: &mut impl Write, outcome: TickOutcome) -> Result<()> {
    let alarm = outcome.alarm.map(|time| time.label()).unwrap_or_default();
    if outcome.tone_started {
        writeln!(out, "ringing {alarm}")?;
    }
    if outcome.state == SchedulerState::Past {
        writeln!(out, "skipped {alarm}")?;
    } else if outcome.tone_stopped {
        writeln!(out, "silenced {alarm}")?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use chrono::NaiveTime;

    use super::*;
    use crate::alarm::model::AlarmSettings;
    use crate::audio::Tone;
    use crate::time_provider::{ClockSourceKind, select_clock};

    fn session_at(start: (u32, u32, u32), seeds: &[&str]) -> Session {
        let start = NaiveTime::from_hms_opt(start.0, start.1, start.2).expect("valid");
        Session::new(
            &AlarmSettings::default(),
            seeds.iter().map(|text| text.parse().expect("valid seed")),
            Tone::inert("test"),
            select_clock(ClockSourceKind::StartAt(start)),
        )
    }

    fn run_lines(session: &mut Session, lines: &[&str]) -> String {
        let mut out = Vec::new();
        for line in lines {
            handle_line(session, line, &mut out).expect("write to buffer");
        }
        String::from_utf8(out).expect("utf8")
    }

    #[test]
    fn parses_commands_case_insensitively() {
        assert_eq!(parse_command("ADD 07:30"), ConsoleCommand::Add("07:30".into()));
        assert_eq!(parse_command("  rm 07:30 "), ConsoleCommand::Remove("07:30".into()));
        assert_eq!(parse_command("delete 07:30"), ConsoleCommand::Remove("07:30".into()));
        assert_eq!(parse_command("ls"), ConsoleCommand::List);
        assert_eq!(parse_command(""), ConsoleCommand::Empty);
        assert_eq!(parse_command("snooze"), ConsoleCommand::Unknown("snooze".into()));
        assert_eq!(parse_command("add"), ConsoleCommand::Add(String::new()));
    }

    #[test]
    fn add_list_and_duplicate_handling() {
        let mut session = session_at((6, 0, 0), &[]);
        let output = run_lines(
            &mut session,
            &["add 09:15", "add 09:15", "add later", "add 07:00", "list"],
        );
        assert_eq!(output.matches("added 09:15").count(), 1);
        assert!(output.contains("ignored 09:15"));
        assert!(output.contains("ignored later"));
        assert!(output.contains("07:00 next\n09:15 on\n"));
    }

    #[test]
    fn ringing_alarm_is_silenced_by_off_command() {
        let mut session = session_at((8, 0, 30), &["08:00"]);
        let first = run_lines(&mut session, &["status"]);
        assert!(first.contains("state WAITING"));

        let mut out = Vec::new();
        report_tick(&mut out, session.tick()).expect("write");
        let rang = String::from_utf8(out).expect("utf8");
        assert!(rang.contains("ringing 08:00"));

        let output = run_lines(&mut session, &["list", "off 08:00", "status"]);
        assert!(output.contains("08:00 ringing"));
        assert!(output.contains("08:00 off"));
        assert!(output.contains("silenced 08:00"));
        assert!(output.contains("state DUE | pending 08:00 | tone stopped"));
    }

    #[test]
    fn removing_pending_alarm_reports_next() {
        let mut session = session_at((8, 0, 30), &["08:00", "09:00"]);
        session.tick();
        let output = run_lines(&mut session, &["rm 08:00", "rm 08:00", "status"]);
        assert!(output.contains("removed 08:00"));
        assert!(output.contains("no alarm at 08:00"));
        assert!(output.contains("state WAITING | pending 09:00 | tone stopped"));
        assert!(output.contains("ticker parked"));
    }

    #[test]
    fn quit_ends_the_loop_and_unknown_prints_usage() {
        let mut session = session_at((8, 0, 0), &[]);
        let mut out = Vec::new();
        assert_eq!(
            handle_line(&mut session, "dance", &mut out).expect("write"),
            Flow::Continue
        );
        assert_eq!(
            handle_line(&mut session, "quit", &mut out).expect("write"),
            Flow::Quit
        );
        let output = String::from_utf8(out).expect("utf8");
        assert!(output.contains("unknown command 'dance'"));
        assert!(output.contains("commands:"));
    }
}
