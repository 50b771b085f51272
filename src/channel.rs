// src/channel.rs
//
// The four ADC channels sent by the board, in wire order.

use eframe::egui::Color32;

pub const CHANNEL_COUNT: usize = 4;

#[derive(Debug, Clone, Copy)]
pub struct Channel {
    pub index: usize,
    pub name: &'static str,
    pub title: &'static str,
    pub color: Color32,
}

pub const CHANNELS: [Channel; CHANNEL_COUNT] = [
    Channel {
        index: 0,
        name: "LDR",
        title: "LDR (light - PA0/IN0)",
        color: Color32::from_rgb(30, 80, 220),
    },
    Channel {
        index: 1,
        name: "Hum",
        title: "OPENME110 (humidity - PA1/IN1)",
        color: Color32::from_rgb(40, 160, 60),
    },
    Channel {
        index: 2,
        name: "Temp",
        title: "Diode (temperature - PA4/IN4)",
        color: Color32::from_rgb(210, 50, 50),
    },
    Channel {
        index: 3,
        name: "Press",
        title: "MPX2200DP (pressure - PC0/IN10)",
        color: Color32::from_rgb(128, 40, 160),
    },
];
