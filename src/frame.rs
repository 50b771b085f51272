// src/frame.rs
//
// Wire frame decoding: one CSV line "ldr,hum,temp,press" per frame.
// A frame is either fully accepted or dropped, never partially applied.

use std::fmt;

use crate::channel::{CHANNELS, CHANNEL_COUNT};
use crate::error::ParseError;

/// Raw ADC readings in wire order.
pub type ChannelValues = [i32; CHANNEL_COUNT];

/// One accepted frame, stamped with seconds since session start.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Sample {
    pub elapsed_s: f64,
    pub values: ChannelValues,
}

impl Sample {
    pub fn new(elapsed_s: f64, values: ChannelValues) -> Self {
        Self { elapsed_s, values }
    }
}

impl fmt::Display for Sample {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "t={:.1}s", self.elapsed_s)?;
        for (ch, v) in CHANNELS.iter().zip(self.values.iter()) {
            write!(f, " | {}: {}", ch.name, v)?;
        }
        Ok(())
    }
}

/// Decode one raw line.
///
/// `Ok(None)` means the line was blank and carries nothing to discard.
pub fn parse_frame(raw: &[u8]) -> Result<Option<ChannelValues>, ParseError> {
    let text = std::str::from_utf8(raw).map_err(|_| ParseError::Decode)?;
    let line = text.trim();
    if line.is_empty() {
        return Ok(None);
    }

    let fields: Vec<&str> = line.split(',').collect();
    if fields.len() != CHANNEL_COUNT {
        return Err(ParseError::FieldCount {
            expected: CHANNEL_COUNT,
            found: fields.len(),
        });
    }

    let mut values = [0i32; CHANNEL_COUNT];
    for (index, (slot, field)) in values.iter_mut().zip(fields).enumerate() {
        *slot = field
            .trim()
            .parse::<i32>()
            .map_err(|_| ParseError::InvalidField {
                index,
                field: field.to_string(),
            })?;
    }

    Ok(Some(values))
}
