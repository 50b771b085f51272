// src/error.rs
//
// Error taxonomy for the acquisition pipeline.
// Only ConnectionError::Open is fatal; everything else degrades to an idle tick.

use std::io;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConnectionError {
    #[error("failed to open serial port {port} @ {baud_rate} baud: {source}")]
    Open {
        port: String,
        baud_rate: u32,
        #[source]
        source: serialport::Error,
    },

    #[error("connection to {port} is closed")]
    Closed { port: String },
}

/// Reasons a received frame is discarded.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    #[error("frame is not valid UTF-8")]
    Decode,

    #[error("expected {expected} fields, found {found}")]
    FieldCount { expected: usize, found: usize },

    #[error("field {index} ({field:?}) is not an integer")]
    InvalidField { index: usize, field: String },
}

/// Non-fatal faults raised while servicing one tick.
#[derive(Debug, Error)]
pub enum TickFault {
    #[error("serial read fault on {port}: {source}")]
    Read {
        port: String,
        #[source]
        source: io::Error,
    },

    #[error("discarded frame: {0}")]
    Parse(#[from] ParseError),

    #[error("unexpected fault during tick: {0}")]
    Unexpected(String),
}

impl TickFault {
    pub fn is_read_fault(&self) -> bool {
        matches!(self, TickFault::Read { .. })
    }
}
