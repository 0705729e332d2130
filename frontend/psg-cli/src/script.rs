//! Register write scripts.
//!
//! One command per line; `#` starts a comment:
//!
//! ```text
//! # frame cycle command [value]
//! 0 0 psg 8E
//! 0 0 psg 0x05
//! 0 9000 pan B6
//! 3 1200 reset
//! ```
//!
//! Frames count from the start of the run. Values are hexadecimal with an optional `0x` prefix.

use psg_core::{PsgPort, TimedWrite};
use std::num::ParseIntError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ScriptError {
    #[error("line {line}: expected '<frame> <cycle> <command> [value]'")]
    MissingField { line: usize },
    #[error("line {line}: invalid {field} '{value}': {source}")]
    InvalidNumber {
        line: usize,
        field: &'static str,
        value: String,
        #[source]
        source: ParseIntError,
    },
    #[error("line {line}: unknown command '{command}'")]
    UnknownCommand { line: usize, command: String },
    #[error("line {line}: unexpected trailing text '{text}'")]
    TrailingText { line: usize, text: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScriptCommand {
    Psg(u8),
    Pan(u8),
    Reset,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScriptEvent {
    pub frame: u32,
    pub cycle: u32,
    pub command: ScriptCommand,
}

/// Writes and resets for a single frame.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FrameEvents {
    pub writes: Vec<TimedWrite>,
    pub reset_cycle: Option<u32>,
}

#[derive(Debug, Clone, Default)]
pub struct Script {
    // Sorted by (frame, cycle); commands on the same cycle keep their line order
    events: Vec<ScriptEvent>,
}

impl Script {
    /// Parse a script.
    ///
    /// # Errors
    ///
    /// Returns an error naming the first line that cannot be parsed.
    pub fn parse(text: &str) -> Result<Self, ScriptError> {
        let mut events = Vec::new();
        for (i, raw_line) in text.lines().enumerate() {
            let line = raw_line.split('#').next().unwrap_or("").trim();
            if line.is_empty() {
                continue;
            }

            events.push(parse_line(i + 1, line)?);
        }

        events.sort_by_key(|event| (event.frame, event.cycle));

        Ok(Self { events })
    }

    #[must_use]
    pub fn events(&self) -> &[ScriptEvent] {
        &self.events
    }

    /// Number of frames needed to reach every command in the script.
    #[must_use]
    pub fn frame_count(&self) -> u32 {
        self.events.last().map_or(0, |event| event.frame + 1)
    }

    #[must_use]
    pub fn frame_events(&self, frame: u32) -> FrameEvents {
        let mut frame_events = FrameEvents::default();
        for event in self.events.iter().filter(|event| event.frame == frame) {
            match event.command {
                ScriptCommand::Psg(value) => frame_events.writes.push(TimedWrite {
                    cycle: event.cycle,
                    port: PsgPort::Data,
                    value,
                }),
                ScriptCommand::Pan(value) => frame_events.writes.push(TimedWrite {
                    cycle: event.cycle,
                    port: PsgPort::StereoPanning,
                    value,
                }),
                ScriptCommand::Reset => {
                    if frame_events.reset_cycle.is_some() {
                        log::warn!(
                            "Multiple resets in frame {frame}; using the one at cycle {}",
                            event.cycle
                        );
                    }
                    frame_events.reset_cycle = Some(event.cycle);
                }
            }
        }

        frame_events
    }
}

fn parse_line(line_number: usize, line: &str) -> Result<ScriptEvent, ScriptError> {
    let mut fields = line.split_whitespace();
    let mut next_field = || fields.next().ok_or(ScriptError::MissingField { line: line_number });

    let frame = parse_number(line_number, "frame", next_field()?)?;
    let cycle = parse_number(line_number, "cycle", next_field()?)?;

    let command_name = next_field()?;
    let command = match command_name.to_ascii_lowercase().as_str() {
        "psg" => ScriptCommand::Psg(parse_byte(line_number, next_field()?)?),
        "pan" => ScriptCommand::Pan(parse_byte(line_number, next_field()?)?),
        "reset" => ScriptCommand::Reset,
        _ => {
            return Err(ScriptError::UnknownCommand {
                line: line_number,
                command: command_name.into(),
            });
        }
    };

    let rest: Vec<_> = fields.collect();
    if !rest.is_empty() {
        return Err(ScriptError::TrailingText { line: line_number, text: rest.join(" ") });
    }

    Ok(ScriptEvent { frame, cycle, command })
}

fn parse_number(line: usize, field: &'static str, value: &str) -> Result<u32, ScriptError> {
    value.parse().map_err(|source| ScriptError::InvalidNumber {
        line,
        field,
        value: value.into(),
        source,
    })
}

fn parse_byte(line: usize, value: &str) -> Result<u8, ScriptError> {
    let digits = value.strip_prefix("0x").or_else(|| value.strip_prefix("0X")).unwrap_or(value);
    u8::from_str_radix(digits, 16).map_err(|source| ScriptError::InvalidNumber {
        line,
        field: "value",
        value: value.into(),
        source,
    })
}
