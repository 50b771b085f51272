// src/app.rs
//
// eframe front end. Acts as the tick scheduler: calls RenderDriver::on_tick
// at the configured cadence and draws the resulting PlotState.
//
// Top:    title, port/baud, status LED, counters, Reconnect
// Center: four stacked channel plots sharing the time axis

use std::time::{Duration, Instant};

use eframe::egui;
use egui::{Align, Color32, FontFamily, FontId, Layout, TextStyle};
use egui_plot::{Line, Plot, PlotBounds, PlotPoints};
use tracing::{error, info};

use crate::channel::{CHANNELS, CHANNEL_COUNT};
use crate::config::AppConfig;
use crate::connection::ConnectionState;
use crate::render::{AxisRange, RenderDriver};
use crate::session::Session;

pub const WINDOW_TITLE: &str = "STM32 data acquisition (raw ADC 0-4095)";

pub struct TelemetryApp {
    session: Session,
    driver: RenderDriver,
    tick_interval: Duration,
    last_tick: Option<Instant>,
    last_error: Option<String>,
    waiting_for_data: bool,
    started: Instant,
}

impl TelemetryApp {
    pub fn new(cc: &eframe::CreationContext<'_>, session: Session, cfg: &AppConfig) -> Self {
        let ctx = &cc.egui_ctx;
        ctx.set_visuals(egui::Visuals::light());

        let mut style = (*ctx.style()).clone();
        style.text_styles.insert(
            TextStyle::Body,
            FontId::new(15.0, FontFamily::Proportional),
        );
        style.text_styles.insert(
            TextStyle::Heading,
            FontId::new(20.0, FontFamily::Proportional),
        );
        ctx.set_style(style);

        Self::with_session(session, cfg)
    }

    fn with_session(session: Session, cfg: &AppConfig) -> Self {
        Self {
            session,
            driver: RenderDriver::new(cfg.axis_limits()),
            tick_interval: cfg.tick_interval(),
            last_tick: None,
            last_error: None,
            waiting_for_data: true,
            started: Instant::now(),
        }
    }

    fn run_tick(&mut self) {
        self.last_tick = Some(Instant::now());
        let report = self.driver.on_tick(&mut self.session);
        self.waiting_for_data = !report.redrawn;
        if report.sample.is_some() {
            self.last_error = None;
        }
        if let Some(fault) = report.fault.filter(|f| f.is_read_fault()) {
            self.last_error = Some(fault.to_string());
        }
    }

    /// Explicit close on window exit; Drop covers the other paths.
    fn shutdown(&mut self) {
        self.session.close();
        info!("application closed, serial port released");
    }

    fn tick_due(&self) -> bool {
        self.last_tick
            .map_or(true, |t| t.elapsed() >= self.tick_interval)
    }

    fn reconnect(&mut self) {
        match self.session.reconnect() {
            Ok(()) => self.last_error = None,
            Err(e) => {
                error!("reconnect failed: {}", e);
                self.last_error = Some(e.to_string());
            }
        }
    }

    fn draw_status_led(&self, ui: &mut egui::Ui) {
        let size = 14.0;
        let color = match self.session.connection().state() {
            ConnectionState::Connected => {
                if (self.started.elapsed().as_millis() / 500) % 2 == 0 {
                    Color32::from_rgb(50, 220, 120)
                } else {
                    Color32::from_rgb(30, 140, 80)
                }
            }
            ConnectionState::Disconnected => Color32::from_rgb(230, 180, 70),
            ConnectionState::Closed => Color32::from_gray(70),
        };

        let (rect, _) = ui.allocate_exact_size(egui::vec2(size, size), egui::Sense::hover());
        ui.painter().circle_filled(rect.center(), size / 2.0, color);
    }

    fn ui_top_bar(&mut self, ui: &mut egui::Ui) {
        ui.horizontal(|ui| {
            ui.heading(egui::RichText::new(WINDOW_TITLE).strong());

            ui.with_layout(Layout::right_to_left(Align::Center), |ui| {
                self.draw_status_led(ui);
                let state = self.session.connection().state();
                ui.label(egui::RichText::new(format!("{:?}", state)).strong());
            });
        });

        ui.add_space(4.0);

        let disconnected =
            self.session.connection().state() == ConnectionState::Disconnected;
        let mut clicked = false;
        ui.horizontal(|ui| {
            let conn = self.session.connection();
            ui.label(egui::RichText::new("Port:").strong());
            ui.monospace(conn.port_name());
            ui.add_space(8.0);
            ui.label(egui::RichText::new("Baud:").strong());
            ui.monospace(conn.baud_rate().to_string());
            ui.add_space(16.0);

            let stats = self.session.stats();
            ui.monospace(format!(
                "frames {} | discarded {} | faults {}",
                stats.frames_accepted, stats.frames_discarded, stats.read_faults
            ));
            ui.add_space(8.0);
            let window = self.session.buffer();
            ui.monospace(format!("window {}/{}", window.len(), window.capacity()));
            ui.add_space(8.0);
            match window.latest() {
                Some(sample) => ui.monospace(format!(
                    "last {}: {}",
                    self.session.last_frame_at().unwrap_or("N/A"),
                    sample
                )),
                None => ui.monospace("last: N/A"),
            };

            ui.with_layout(Layout::right_to_left(Align::Center), |ui| {
                let btn = egui::Button::new(
                    egui::RichText::new("Reconnect").strong().color(Color32::BLACK),
                )
                .fill(Color32::from_rgb(80, 200, 120));
                clicked = ui.add_enabled(disconnected, btn).clicked();
            });
        });
        if clicked {
            self.reconnect();
        }

        if let Some(err) = &self.last_error {
            ui.add_space(4.0);
            ui.colored_label(Color32::RED, err);
        }
    }

    fn ui_plots(&self, ui: &mut egui::Ui) {
        if self.waiting_for_data {
            ui.label(egui::RichText::new("Waiting for data...").italics());
        }

        let plot = self.driver.plot();
        let per_plot = (ui.available_height() / CHANNEL_COUNT as f32 - 28.0).max(60.0);

        for ch in CHANNELS.iter() {
            ui.label(egui::RichText::new(ch.title).size(13.0).strong());

            let mut chart = Plot::new(("channel_plot", ch.index))
                .height(per_plot)
                .allow_drag(false)
                .allow_zoom(false)
                .allow_scroll(false)
                .allow_boxed_zoom(false);
            if ch.index == CHANNEL_COUNT - 1 {
                chart = chart.x_axis_label("Time (s)");
            }

            let series = &plot.series[ch.index];
            let bounds = match (plot.time_range, plot.value_ranges[ch.index]) {
                (Some(x), Some(y)) => Some(bounds_of(x, y)),
                _ => None,
            };

            chart.show(ui, |plot_ui| {
                if let Some(b) = bounds {
                    plot_ui.set_plot_bounds(b);
                }
                if !series.is_empty() {
                    let points: PlotPoints = series.iter().copied().collect();
                    plot_ui.line(Line::new(ch.name, points).color(ch.color).width(1.5));
                }
            });
        }
    }
}

fn bounds_of(x: AxisRange, y: AxisRange) -> PlotBounds {
    PlotBounds::from_min_max([x.min, y.min], [x.max, y.max])
}

impl eframe::App for TelemetryApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        if self.tick_due() {
            self.run_tick();
        }
        ctx.request_repaint_after(self.tick_interval);

        egui::TopBottomPanel::top("top_bar").show(ctx, |ui| {
            ui.add_space(4.0);
            self.ui_top_bar(ui);
            ui.add_space(4.0);
        });

        egui::CentralPanel::default().show(ctx, |ui| {
            self.ui_plots(ui);
        });
    }

    fn on_exit(&mut self, _gl: Option<&eframe::glow::Context>) {
        self.shutdown();
    }
}
