// src/config.rs
//
// telemetry_config.toml: every key optional, merged onto defaults.
// Bad values are replaced individually; config problems are never fatal.

use std::fs;
use std::path::Path;
use std::time::Duration;

use serde::Deserialize;
use tracing::{info, warn};

use crate::render::AxisLimits;

pub const CONFIG_FILE: &str = "telemetry_config.toml";

const SAMPLE_CONFIG: &str = r#"# ADC telemetry monitor configuration

# Fallback device when no port matches usb_vid/usb_pid
port_name = "COM3"
baud_rate = 115200

# ST-Link virtual COM port
usb_vid = 0x0483
usb_pid = 0x374B

# Serial read timeout (keeps the display responsive)
read_timeout_ms = 100

# Samples kept per channel
window_capacity = 50

# Display refresh (16 ms ~ 60 Hz)
tick_interval_ms = 16

# Axes
window_span_s = 50.0
time_margin_s = 1.0
value_margin  = 50.0
"#;

#[derive(Debug, Default, Deserialize)]
struct RawConfig {
    port_name: Option<String>,
    baud_rate: Option<u32>,
    usb_vid: Option<u16>,
    usb_pid: Option<u16>,
    read_timeout_ms: Option<u64>,
    window_capacity: Option<usize>,
    tick_interval_ms: Option<u64>,
    window_span_s: Option<f64>,
    time_margin_s: Option<f64>,
    value_margin: Option<f64>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct AppConfig {
    pub port_name: String,
    pub baud_rate: u32,
    pub usb_vid: u16,
    pub usb_pid: u16,
    pub read_timeout_ms: u64,
    pub window_capacity: usize,
    pub tick_interval_ms: u64,
    pub window_span_s: f64,
    pub time_margin_s: f64,
    pub value_margin: f64,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            port_name: "COM3".to_string(),
            baud_rate: 115_200,
            usb_vid: 0x0483,
            usb_pid: 0x374B,
            read_timeout_ms: 100,
            window_capacity: 50,
            tick_interval_ms: 16,
            window_span_s: 50.0,
            time_margin_s: 1.0,
            value_margin: 50.0,
        }
    }
}

fn positive<T: PartialOrd + Default + Copy + std::fmt::Display>(
    key: &str,
    value: Option<T>,
    default: T,
) -> T {
    match value {
        Some(v) if v > T::default() => v,
        Some(v) => {
            warn!("[CFG] {} = {} is invalid, using {}", key, v, default);
            default
        }
        None => default,
    }
}

fn positive_finite(key: &str, value: Option<f64>, default: f64) -> f64 {
    match value {
        Some(v) if v.is_finite() && v > 0.0 => v,
        Some(v) => {
            warn!("[CFG] {} = {} is invalid, using {}", key, v, default);
            default
        }
        None => default,
    }
}

impl AppConfig {
    pub fn load() -> Self {
        Self::load_from(Path::new(CONFIG_FILE))
    }

    pub fn load_from(path: &Path) -> Self {
        if !path.exists() {
            if let Err(e) = fs::write(path, SAMPLE_CONFIG) {
                warn!("[CFG] could not write sample {}: {}", path.display(), e);
            } else {
                info!("[CFG] {} not found, wrote a sample; using defaults", path.display());
            }
            return Self::default();
        }

        let content = match fs::read_to_string(path) {
            Ok(s) => s,
            Err(e) => {
                warn!("[CFG] failed to read {}: {}, using defaults", path.display(), e);
                return Self::default();
            }
        };

        let cfg = Self::from_toml_str(&content);
        info!(
            "[CFG] port={} baud={} vid:pid={:04X}:{:04X} window={} tick={}ms",
            cfg.port_name,
            cfg.baud_rate,
            cfg.usb_vid,
            cfg.usb_pid,
            cfg.window_capacity,
            cfg.tick_interval_ms
        );
        cfg
    }

    pub fn from_toml_str(content: &str) -> Self {
        let raw: RawConfig = match toml::from_str(content) {
            Ok(r) => r,
            Err(e) => {
                warn!("[CFG] failed to parse config: {}, using defaults", e);
                return Self::default();
            }
        };

        let d = Self::default();
        Self {
            port_name: raw
                .port_name
                .map(|p| p.trim().to_string())
                .filter(|p| !p.is_empty())
                .unwrap_or(d.port_name),
            baud_rate: positive("baud_rate", raw.baud_rate, d.baud_rate),
            usb_vid: raw.usb_vid.unwrap_or(d.usb_vid),
            usb_pid: raw.usb_pid.unwrap_or(d.usb_pid),
            read_timeout_ms: positive("read_timeout_ms", raw.read_timeout_ms, d.read_timeout_ms),
            window_capacity: positive("window_capacity", raw.window_capacity, d.window_capacity),
            tick_interval_ms: positive(
                "tick_interval_ms",
                raw.tick_interval_ms,
                d.tick_interval_ms,
            ),
            window_span_s: positive_finite("window_span_s", raw.window_span_s, d.window_span_s),
            time_margin_s: positive_finite("time_margin_s", raw.time_margin_s, d.time_margin_s),
            value_margin: positive_finite("value_margin", raw.value_margin, d.value_margin),
        }
    }

    pub fn read_timeout(&self) -> Duration {
        Duration::from_millis(self.read_timeout_ms)
    }

    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms)
    }

    pub fn axis_limits(&self) -> AxisLimits {
        AxisLimits {
            window_span_s: self.window_span_s,
            time_margin_s: self.time_margin_s,
            value_margin: self.value_margin,
        }
    }
}
