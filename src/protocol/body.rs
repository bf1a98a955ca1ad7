//! Payload interpreters
//!
//! Command specific payload shapes. They only check the payload length;
//! field values are passed through as they are.

use std::fmt;
use std::str::FromStr;

use bytes::{Buf, BufMut};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::CodecError;

/// Size of a drive body in bytes
pub const DRIVE_BODY_SIZE: usize = 3;

/// Size of a telemetry record in bytes
pub const TELEMETRY_SIZE: usize = 9;

/// Direction of travel for a drive command
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Direction {
    Forward,
    Backward,
    Right,
    Left,
    /// A direction code this side does not know about
    Unknown(u8),
}

impl Direction {
    pub fn code(self) -> u8 {
        match self {
            Direction::Forward => 1,
            Direction::Backward => 2,
            Direction::Right => 3,
            Direction::Left => 4,
            Direction::Unknown(code) => code,
        }
    }

    pub fn from_code(code: u8) -> Self {
        match code {
            1 => Direction::Forward,
            2 => Direction::Backward,
            3 => Direction::Right,
            4 => Direction::Left,
            other => Direction::Unknown(other),
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Direction::Forward => f.write_str("forward"),
            Direction::Backward => f.write_str("backward"),
            Direction::Right => f.write_str("right"),
            Direction::Left => f.write_str("left"),
            Direction::Unknown(code) => write!(f, "unknown({})", code),
        }
    }
}

#[derive(Error, Debug, PartialEq, Eq)]
#[error("Unknown direction: {0} (expected forward, backward, right or left)")]
pub struct ParseDirectionError(String);

impl FromStr for Direction {
    type Err = ParseDirectionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "forward" | "f" | "1" => Ok(Direction::Forward),
            "backward" | "b" | "2" => Ok(Direction::Backward),
            "right" | "r" | "3" => Ok(Direction::Right),
            "left" | "l" | "4" => Ok(Direction::Left),
            _ => Err(ParseDirectionError(s.to_string())),
        }
    }
}

/// Body of a drive command
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DriveBody {
    pub direction: Direction,
    /// Seconds to drive for
    pub duration: u8,
    /// Motor speed, 80 to 100 by convention
    pub speed: u8,
}

impl DriveBody {
    pub fn new(direction: Direction, duration: u8, speed: u8) -> Self {
        Self {
            direction,
            duration,
            speed,
        }
    }

    pub fn decode(payload: &[u8]) -> Result<Self, CodecError> {
        let [direction, duration, speed] = <[u8; DRIVE_BODY_SIZE]>::try_from(payload)
            .map_err(|_| CodecError::InvalidPayloadSize {
                expected: DRIVE_BODY_SIZE,
                actual: payload.len(),
            })?;

        Ok(Self {
            direction: Direction::from_code(direction),
            duration,
            speed,
        })
    }

    pub fn encode(&self) -> [u8; DRIVE_BODY_SIZE] {
        [self.direction.code(), self.duration, self.speed]
    }
}

/// Status record reported by the robot
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Telemetry {
    /// Count of the last packet the robot processed
    pub last_packet_counter: u16,
    pub current_grade: u16,
    pub hit_count: u16,
    /// Last command code the robot executed
    pub last_command: u8,
    pub last_command_value: u8,
    pub last_command_speed: u8,
}

impl Telemetry {
    pub fn decode(payload: &[u8]) -> Result<Self, CodecError> {
        if payload.len() != TELEMETRY_SIZE {
            return Err(CodecError::InvalidPayloadSize {
                expected: TELEMETRY_SIZE,
                actual: payload.len(),
            });
        }

        let mut buf = payload;
        Ok(Self {
            last_packet_counter: buf.get_u16(),
            current_grade: buf.get_u16(),
            hit_count: buf.get_u16(),
            last_command: buf.get_u8(),
            last_command_value: buf.get_u8(),
            last_command_speed: buf.get_u8(),
        })
    }

    pub fn encode(&self) -> [u8; TELEMETRY_SIZE] {
        let mut out = [0u8; TELEMETRY_SIZE];
        let mut buf = &mut out[..];
        buf.put_u16(self.last_packet_counter);
        buf.put_u16(self.current_grade);
        buf.put_u16(self.hit_count);
        buf.put_u8(self.last_command);
        buf.put_u8(self.last_command_value);
        buf.put_u8(self.last_command_speed);
        out
    }
}
