// src/session.rs
//
// One acquisition session: owns the connection, the sliding window and the
// session clock. Passed by reference to the tick instead of living in globals.

use std::time::Instant;

use chrono::Local;
use tracing::{debug, info};

use crate::buffer::{WindowBuffer, WindowSnapshot};
use crate::connection::Connection;
use crate::error::{ConnectionError, TickFault};
use crate::frame::{parse_frame, Sample};

/// Smallest step between two consecutive elapsed times.
const MIN_TIME_STEP_S: f64 = 1e-6;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SessionStats {
    pub frames_accepted: u64,
    pub frames_discarded: u64,
    pub read_faults: u64,
}

pub struct Session {
    connection: Connection,
    buffer: WindowBuffer,
    started: Instant,
    last_elapsed: Option<f64>,
    last_frame_at: Option<String>,
    stats: SessionStats,
}

impl Session {
    pub fn new(connection: Connection, window_capacity: usize) -> Self {
        info!(
            "session started at {} (window {} samples)",
            Local::now().format("%Y-%m-%d %H:%M:%S"),
            window_capacity
        );
        Self {
            connection,
            buffer: WindowBuffer::new(window_capacity),
            started: Instant::now(),
            last_elapsed: None,
            last_frame_at: None,
            stats: SessionStats::default(),
        }
    }

    pub fn connection(&self) -> &Connection {
        &self.connection
    }

    pub fn buffer(&self) -> &WindowBuffer {
        &self.buffer
    }

    pub fn snapshot(&self) -> WindowSnapshot {
        self.buffer.snapshot()
    }

    pub fn stats(&self) -> SessionStats {
        self.stats
    }

    pub fn last_frame_at(&self) -> Option<&str> {
        self.last_frame_at.as_deref()
    }

    fn next_elapsed(&mut self) -> f64 {
        let now = self.started.elapsed().as_secs_f64();
        let t = match self.last_elapsed {
            Some(prev) if now <= prev => prev + MIN_TIME_STEP_S,
            _ => now,
        };
        self.last_elapsed = Some(t);
        t
    }

    /// Read, validate and buffer at most one frame.
    ///
    /// `Ok(None)` covers "not connected", "nothing received" and blank lines.
    /// Malformed frames come back as `TickFault::Parse` with the buffer untouched.
    pub fn poll_frame(&mut self) -> Result<Option<Sample>, TickFault> {
        let raw = match self.connection.read_frame() {
            Ok(Some(raw)) => raw,
            Ok(None) => return Ok(None),
            Err(e) => {
                self.stats.read_faults += 1;
                return Err(e);
            }
        };

        let values = match parse_frame(&raw) {
            Ok(Some(v)) => v,
            Ok(None) => return Ok(None),
            Err(e) => {
                self.stats.frames_discarded += 1;
                debug!("discarding {:?}: {}", String::from_utf8_lossy(&raw), e);
                return Err(e.into());
            }
        };

        let sample = Sample::new(self.next_elapsed(), values);
        self.buffer.append(&sample);
        self.stats.frames_accepted += 1;
        self.last_frame_at = Some(Local::now().format("%H:%M:%S").to_string());
        info!("{}", sample);
        Ok(Some(sample))
    }

    /// Manual reconnect after a read fault.
    pub fn reconnect(&mut self) -> Result<(), ConnectionError> {
        self.connection.reopen()
    }

    /// Release the serial port now rather than at drop.
    pub fn close(&mut self) {
        self.connection.close();
    }
}
