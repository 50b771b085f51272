// src/render.rs
//
// Render tick: pull at most one frame, then rebuild plot series and axis
// ranges from a buffer snapshot. Read-only towards the buffer.

use std::panic::{self, AssertUnwindSafe};

use tracing::{debug, warn};

use crate::buffer::WindowSnapshot;
use crate::channel::CHANNEL_COUNT;
use crate::error::TickFault;
use crate::frame::Sample;
use crate::session::Session;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AxisRange {
    pub min: f64,
    pub max: f64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AxisLimits {
    /// Seconds of history kept on screen.
    pub window_span_s: f64,
    pub time_margin_s: f64,
    /// ADC counts added above and below each channel.
    pub value_margin: f64,
}

impl Default for AxisLimits {
    fn default() -> Self {
        Self {
            window_span_s: 50.0,
            time_margin_s: 1.0,
            value_margin: 50.0,
        }
    }
}

/// What the display draws.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PlotState {
    pub series: [Vec<[f64; 2]>; CHANNEL_COUNT],
    pub time_range: Option<AxisRange>,
    pub value_ranges: [Option<AxisRange>; CHANNEL_COUNT],
}

#[derive(Debug, Default)]
pub struct TickReport {
    pub sample: Option<Sample>,
    pub fault: Option<TickFault>,
    /// False on idle frames (empty window).
    pub redrawn: bool,
}

pub struct RenderDriver {
    limits: AxisLimits,
    plot: PlotState,
    ticks: u64,
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

impl RenderDriver {
    pub fn new(limits: AxisLimits) -> Self {
        Self {
            limits,
            plot: PlotState::default(),
            ticks: 0,
        }
    }

    pub fn plot(&self) -> &PlotState {
        &self.plot
    }

    /// One tick. Must return promptly; faults never escape.
    pub fn on_tick(&mut self, session: &mut Session) -> TickReport {
        self.ticks += 1;
        let mut report = TickReport::default();

        let polled = panic::catch_unwind(AssertUnwindSafe(|| session.poll_frame()));
        match polled {
            Ok(Ok(sample)) => report.sample = sample,
            Ok(Err(fault)) => {
                match &fault {
                    TickFault::Parse(e) => debug!("tick {}: {}", self.ticks, e),
                    other => warn!("tick {}: {}", self.ticks, other),
                }
                report.fault = Some(fault);
            }
            Err(payload) => {
                let fault = TickFault::Unexpected(panic_message(payload.as_ref()));
                warn!("tick {}: {}", self.ticks, fault);
                report.fault = Some(fault);
            }
        }

        let snapshot = session.snapshot();
        report.redrawn = self.apply_snapshot(&snapshot);
        report
    }

    /// Rebuild series and ranges. Returns false on an empty snapshot.
    pub fn apply_snapshot(&mut self, snapshot: &WindowSnapshot) -> bool {
        let latest = match snapshot.latest_time() {
            Some(t) => t,
            None => return false,
        };

        for (series, values) in self.plot.series.iter_mut().zip(snapshot.channels.iter()) {
            series.clear();
            series.extend(
                snapshot
                    .times
                    .iter()
                    .zip(values.iter())
                    .map(|(&t, &v)| [t, v as f64]),
            );
        }

        self.plot.time_range = Some(AxisRange {
            min: (latest - self.limits.window_span_s).max(0.0),
            max: latest + self.limits.time_margin_s,
        });

        for (range, values) in self
            .plot
            .value_ranges
            .iter_mut()
            .zip(snapshot.channels.iter())
        {
            let lo = values.iter().min();
            let hi = values.iter().max();
            if let (Some(&lo), Some(&hi)) = (lo, hi) {
                *range = Some(AxisRange {
                    min: lo as f64 - self.limits.value_margin,
                    max: hi as f64 + self.limits.value_margin,
                });
            }
        }

        true
    }
}
