use std::sync::Arc;
use std::sync::mpsc::{self, Receiver};
use std::time::{Duration, Instant};

use anyhow::Result;
use eframe::egui::{
    self, Color32, Key, RichText, ScrollArea, TextEdit, TopBottomPanel, Ui,
};

use crate::alarm::model::TimeOfDay;
use crate::alarm::scheduler::{AlarmStatus, SchedulerState, TickOutcome};
use crate::session::Session;
use crate::ticker::TickSink;

const DEFAULT_TIME_INPUT: &str = "00:00";
const CLOCK_REFRESH: Duration = Duration::from_millis(250);

pub fn run_gui(session: Session) -> Result<()> {
    let native_options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_title("Alarm Clock")
            .with_inner_size([420.0, 560.0])
            .with_min_inner_size([320.0, 360.0]),
        ..Default::default()
    };

    eframe::run_native(
        "Alarm Clock",
        native_options,
        Box::new(move |cc| {
            configure_theme(&cc.egui_ctx);
            Ok(Box::new(AlarmClockApp::new(session, &cc.egui_ctx)?))
        }),
    )
    .map_err(|err| anyhow::anyhow!("failed to launch alarm clock window: {err}"))?;

    Ok(())
}

fn configure_theme(ctx: &egui::Context) {
    let mut visuals = egui::Visuals::dark();
    visuals.override_text_color = Some(Color32::from_rgb(226, 234, 246));
    visuals.panel_fill = Color32::from_rgb(8, 16, 26);
    visuals.window_fill = Color32::from_rgb(12, 20, 32);
    visuals.widgets.inactive.bg_fill = Color32::from_rgb(16, 24, 38);
    visuals.widgets.hovered.bg_fill = Color32::from_rgb(26, 42, 62);
    visuals.widgets.active.bg_fill = Color32::from_rgb(34, 60, 88);
    visuals.selection.bg_fill = Color32::from_rgb(43, 148, 178);
    ctx.set_visuals(visuals);
}

enum RowAction {
    SetActive(TimeOfDay, bool),
    Remove(TimeOfDay),
}

struct AlarmClockApp {
    session: Session,
    ticks: Receiver<()>,
    time_input: String,
    status_message: Option<(String, Instant)>,
}

impl AlarmClockApp {
    fn new(mut session: Session, ctx: &egui::Context) -> Result<Self> {
        let (tx, ticks) = mpsc::channel();
        let repaint = ctx.clone();
        let sink: TickSink = Arc::new(move || {
            let _ = tx.send(());
            repaint.request_repaint();
        });
        session.attach_ticker(sink)?;

        let mut app = Self {
            session,
            ticks,
            time_input: DEFAULT_TIME_INPUT.to_string(),
            status_message: None,
        };
        let outcome = app.session.tick();
        app.report(outcome);
        Ok(app)
    }

    fn set_status(&mut self, text: impl Into<String>, ttl: Duration) {
        self.status_message = Some((text.into(), Instant::now() + ttl));
    }

    fn report(&mut self, outcome: TickOutcome) {
        let Some(alarm) = outcome.alarm else {
            return;
        };
        if outcome.tone_started {
            self.set_status(format!("Alarm {alarm} ringing."), Duration::from_secs(60));
        } else if outcome.state == SchedulerState::Past {
            self.set_status(format!("Alarm {alarm} finished."), Duration::from_secs(3));
        } else if outcome.tone_stopped {
            self.set_status(format!("Alarm {alarm} silenced."), Duration::from_secs(3));
        }
    }

    fn drain_ticks(&mut self) {
        let mut due = false;
        while self.ticks.try_recv().is_ok() {
            due = true;
        }
        if due {
            let outcome = self.session.tick();
            self.report(outcome);
        }
    }

    fn submit_time_input(&mut self) {
        let text = std::mem::replace(&mut self.time_input, DEFAULT_TIME_INPUT.to_string());
        if let Some(time) = self.session.submit(&text) {
            self.set_status(format!("Added alarm {time}."), Duration::from_secs(2));
            let outcome = self.session.tick();
            self.report(outcome);
        }
    }

    fn show_header(&mut self, ui: &mut Ui) {
        let now = self.session.now();
        let state = self.session.state();
        let state_color = match state {
            SchedulerState::Idle => Color32::from_rgb(146, 160, 177),
            SchedulerState::Waiting => Color32::from_rgb(109, 206, 197),
            SchedulerState::Due => Color32::from_rgb(255, 101, 101),
            SchedulerState::Past => Color32::from_rgb(255, 183, 95),
        };

        ui.horizontal_wrapped(|ui| {
            ui.label(
                RichText::new(now.format("%H:%M:%S").to_string())
                    .size(34.0)
                    .color(Color32::from_rgb(255, 214, 117))
                    .strong(),
            );
            ui.separator();
            ui.label(RichText::new(state.label()).color(state_color).strong());
        });

        ui.horizontal(|ui| {
            match self.session.pending() {
                Some(entry) => ui.label(format!("Next: {}", entry.time)),
                None => ui.label("No pending alarm"),
            };
            if let Some(reason) = self.session.tone().inert_reason() {
                ui.label(
                    RichText::new(format!("Silent: {reason}"))
                        .color(Color32::from_rgb(255, 183, 95)),
                );
            }
        });

        if let Some((msg, _)) = &self.status_message {
            ui.label(
                RichText::new(msg)
                    .color(Color32::from_rgb(111, 228, 134))
                    .strong(),
            );
        }
    }

    fn show_add_form(&mut self, ui: &mut Ui) {
        ui.horizontal(|ui| {
            let response = ui.add(
                TextEdit::singleline(&mut self.time_input)
                    .hint_text("HH:MM")
                    .desired_width(90.0),
            );
            let submitted = response.lost_focus() && ui.input(|input| input.key_pressed(Key::Enter));
            if ui.button("Add alarm").clicked() || submitted {
                self.submit_time_input();
            }
        });
    }

    fn show_alarm_list(&mut self, ui: &mut Ui) {
        if !self.session.has_alarms() {
            ui.label(
                RichText::new("No alarms set.")
                    .color(Color32::from_rgb(255, 190, 106))
                    .strong(),
            );
            return;
        }

        let mut actions = Vec::new();
        ScrollArea::vertical()
            .id_salt("alarms_scroll")
            .show(ui, |ui| {
                egui::Grid::new("alarms_grid")
                    .striped(true)
                    .num_columns(4)
                    .show(ui, |ui| {
                        for entry in self.session.entries() {
                            let status = self.session.status_of(entry);
                            let (status_color, label_size) = match status {
                                AlarmStatus::Ringing => (Color32::from_rgb(255, 101, 101), 24.0),
                                AlarmStatus::Next => (Color32::from_rgb(108, 228, 138), 22.0),
                                AlarmStatus::Armed => (Color32::from_rgb(109, 206, 197), 20.0),
                                AlarmStatus::Off | AlarmStatus::Passed => {
                                    (Color32::from_rgb(146, 160, 177), 20.0)
                                }
                            };
                            ui.label(
                                RichText::new(entry.time.label())
                                    .size(label_size)
                                    .monospace()
                                    .strong(),
                            );
                            ui.colored_label(status_color, status.label().to_uppercase());

                            let mut active = entry.active;
                            if ui.checkbox(&mut active, "").changed() {
                                actions.push(RowAction::SetActive(entry.time, active));
                            }
                            if ui
                                .add(
                                    egui::Button::new(
                                        RichText::new("Delete")
                                            .color(Color32::from_rgb(255, 124, 124))
                                            .strong(),
                                    )
                                    .fill(Color32::from_rgb(51, 20, 24)),
                                )
                                .clicked()
                            {
                                actions.push(RowAction::Remove(entry.time));
                            }
                            ui.end_row();
                        }
                    });
            });

        for action in actions {
            match action {
                RowAction::SetActive(time, active) => {
                    self.session.set_active(time, active);
                }
                RowAction::Remove(time) => {
                    if self.session.remove(time).is_some() {
                        self.set_status(format!("Removed alarm {time}."), Duration::from_secs(2));
                    }
                }
            }
            let outcome = self.session.tick();
            self.report(outcome);
        }
    }
}

impl eframe::App for AlarmClockApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        if let Some((_, expires_at)) = &self.status_message
            && Instant::now() >= *expires_at
        {
            self.status_message = None;
        }

        self.drain_ticks();

        TopBottomPanel::top("header")
            .resizable(false)
            .show(ctx, |ui| self.show_header(ui));

        egui::CentralPanel::default().show(ctx, |ui| {
            self.show_add_form(ui);
            ui.separator();
            self.show_alarm_list(ui);
        });

        ctx.request_repaint_after(CLOCK_REFRESH);
    }
}
