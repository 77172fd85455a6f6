// Define message types for the runtime

use serde::{Deserialize, Serialize};

use crate::motor::{Frame, MotorTelemetry, Wheel};

// Command from teleop/scripts -> runtime
// Tagged by "kind", e.g. {"kind":"shift","x":0,"y":100,"max_speed":30.0}
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DriveCommand {
    /// Holonomic translation toward (x, y)
    Shift { x: i32, y: i32, max_speed: f64 },
    /// In-place rotation, speed percentage
    Turn { speed: f64 },
    /// Bench test: drive only the front-left/back-right diagonal
    TestMove { x: f64 },
    /// All wheels to zero
    Stop,
}

// Outgoing frame as published on the actuation topic
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FrameMessage {
    pub id: u16,
    pub data: [u8; 8],
}

impl From<&Frame> for FrameMessage {
    fn from(frame: &Frame) -> Self {
        Self {
            id: frame.id(),
            data: frame.to_bytes(),
        }
    }
}

/// Feedback for one wheel, in raw and physical units
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WheelTelemetry {
    pub wheel: Wheel,
    pub speed_command: f64,
    pub raw: MotorTelemetry,
    pub angle_deg: f64,
    pub current_amps: f64,
}

/// Telemetry snapshot published by runtime
/// Wheels without feedback yet are left out.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TelemetrySnapshot {
    pub wheels: Vec<WheelTelemetry>,
}

/// Health status published by runtime
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "snake_case")]
pub enum RuntimeHealth {
    Ok,
    CmdStale,
    CmdRejected,
    BusError,
}
