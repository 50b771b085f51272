// src/main.rs
//
// ADC TELEMETRY MONITOR
//
// Reads "ldr,hum,temp,press" frames from the board over serial, keeps a
// sliding window per channel and plots the four channels live.
//
// Startup order: config -> port resolve -> open (fatal on failure) -> display.

mod app;
mod buffer;
mod channel;
mod config;
mod connection;
mod error;
mod frame;
mod port;
mod render;
mod session;

use anyhow::anyhow;
use eframe::{egui, NativeOptions};
use tracing::error;
use tracing_subscriber::EnvFilter;

use crate::app::{TelemetryApp, WINDOW_TITLE};
use crate::config::AppConfig;
use crate::connection::Connection;
use crate::session::Session;

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cfg = AppConfig::load();

    let port_name = port::resolve_port(cfg.usb_vid, cfg.usb_pid, &cfg.port_name);
    let connection = match Connection::open(&port_name, cfg.baud_rate, cfg.read_timeout()) {
        Ok(c) => c,
        Err(e) => {
            error!("{}", e);
            error!(
                "check that '{}' is the right port and that the board is plugged in",
                port_name
            );
            return Err(e.into());
        }
    };
    let session = Session::new(connection, cfg.window_capacity);

    let native_options = NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_inner_size(egui::vec2(1000.0, 800.0))
            .with_min_inner_size(egui::vec2(640.0, 520.0))
            .with_title(WINDOW_TITLE),
        ..Default::default()
    };

    // The session moves into the app; dropping either releases the port.
    eframe::run_native(
        "adc_telemetry_monitor",
        native_options,
        Box::new(move |cc| Ok(Box::new(TelemetryApp::new(cc, session, &cfg)))),
    )
    .map_err(|e| anyhow!("display loop failed: {}", e))?;

    Ok(())
}
