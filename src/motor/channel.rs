// One motor on the shared command frame
//
// Each motor owns two bytes of the 0x200 command frame, at an offset derived
// from its address, and reports feedback on its own identifier.

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::codec::{encode, split};
use super::error::{DriveError, Result};
use super::frame::Frame;
use super::kinematics::Wheel;
use super::telemetry::MotorTelemetry;
use crate::config::{
    MAX_CURRENT, MAX_SEND_CODE, MIN_CURRENT, MIN_SEND_CODE, SPEED_PERCENT_MAX, TELEMETRY_BASE_ID,
};

/// Number of motors sharing one command frame (4 x 2 bytes = 8 bytes)
pub const MOTOR_COUNT: usize = 4;

/// Bus address of a motor, always in [1, 4]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MotorAddress(u8);

impl MotorAddress {
    pub fn new(address: u8) -> Result<Self> {
        if (1..=MOTOR_COUNT as u8).contains(&address) {
            Ok(Self(address))
        } else {
            Err(DriveError::InvalidAddress { address })
        }
    }

    pub fn get(&self) -> u8 {
        self.0
    }

    /// Byte pair occupied by this motor inside the command frame
    pub fn buffer_offsets(&self) -> (usize, usize) {
        let first = (self.0 as usize - 1) * 2;
        (first, first + 1)
    }

    /// Identifier this motor reports feedback on
    pub fn telemetry_id(&self) -> u16 {
        TELEMETRY_BASE_ID + self.0 as u16
    }
}

impl From<Wheel> for MotorAddress {
    fn from(wheel: Wheel) -> Self {
        Self(wheel.address())
    }
}

/// Convert a speed percentage into the byte pair sent to the motor
///
/// Percent is carried as a current request: 100 % = 20 A, then scaled onto
/// the [-16384, 16384] command code.
pub fn encode_speed(percentage: f64) -> Result<(i8, i8)> {
    if !(-SPEED_PERCENT_MAX..=SPEED_PERCENT_MAX).contains(&percentage) {
        return Err(DriveError::RangeOverflow {
            value: percentage,
            min: -SPEED_PERCENT_MAX,
            max: SPEED_PERCENT_MAX,
        });
    }
    let current = MAX_CURRENT * (percentage / SPEED_PERCENT_MAX);
    let code = encode(current, MIN_CURRENT, MAX_CURRENT, MIN_SEND_CODE, MAX_SEND_CODE)?;
    Ok(split(code))
}

/// Logical handle for one wheel motor
#[derive(Debug, Clone)]
pub struct MotorChannel {
    address: MotorAddress,
    telemetry_id: u16,
    speed: f64,
    command: (i8, i8),
    feedback: Option<Frame>,
}

impl MotorChannel {
    pub fn new(address: MotorAddress) -> Self {
        Self {
            address,
            telemetry_id: address.telemetry_id(),
            speed: 0.0,
            command: (0, 0),
            feedback: None,
        }
    }

    pub fn address(&self) -> MotorAddress {
        self.address
    }

    pub fn telemetry_id(&self) -> u16 {
        self.telemetry_id
    }

    pub fn buffer_offsets(&self) -> (usize, usize) {
        self.address.buffer_offsets()
    }

    pub fn encode_speed(&self, percentage: f64) -> Result<(i8, i8)> {
        encode_speed(percentage)
    }

    /// Last committed speed percentage
    pub fn speed(&self) -> f64 {
        self.speed
    }

    /// Last committed command bytes
    pub fn command(&self) -> (i8, i8) {
        self.command
    }

    /// Commit an already encoded speed
    pub(crate) fn set_command(&mut self, speed: f64, bytes: (i8, i8)) {
        self.speed = speed;
        self.command = bytes;
    }

    /// Store a feedback frame if it is addressed to this motor
    ///
    /// Returns false (and changes nothing) for any other identifier.
    pub fn absorb_feedback(&mut self, frame: &Frame) -> bool {
        if frame.id() != self.telemetry_id {
            return false;
        }
        debug!("Motor {} feedback: {:?}", self.address.get(), frame.data());
        self.feedback = Some(*frame);
        true
    }

    /// Decoded telemetry, or None if no feedback has arrived yet
    pub fn telemetry(&self) -> Option<MotorTelemetry> {
        self.feedback.as_ref().map(MotorTelemetry::decode)
    }
}
