// Telemetry decoding for motor feedback frames
//
// Feedback layout (big-endian):
// [angle_hi, angle_lo, rpm_hi, rpm_lo, current_hi, current_lo, temperature, reserved]

use serde::{Deserialize, Serialize};

use super::codec::{decode, join};
use super::frame::Frame;
use crate::config::{ENCODER_RESOLUTION, MAX_CURRENT, MAX_SEND_CODE, MIN_CURRENT, MIN_SEND_CODE};

/// Decoded feedback snapshot for one motor (raw units)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MotorTelemetry {
    pub angle: i16,
    pub rpm: i16,
    pub current: i16,
    pub temperature: i8,
}

impl MotorTelemetry {
    /// Decode a feedback frame
    pub fn decode(frame: &Frame) -> Self {
        let d = frame.data();
        Self {
            angle: join(d[0], d[1]),
            rpm: join(d[2], d[3]),
            current: join(d[4], d[5]),
            temperature: d[6],
        }
    }

    /// Rotor angle in degrees, wrapped into [0, 360)
    pub fn angle_degrees(&self) -> f64 {
        let ticks = (self.angle as f64).rem_euclid(ENCODER_RESOLUTION);
        ticks * 360.0 / ENCODER_RESOLUTION
    }

    /// Measured current in amperes, using the same scale as commands
    pub fn current_amps(&self) -> f64 {
        // The code range is fixed and non-empty
        decode(self.current, MIN_SEND_CODE, MAX_SEND_CODE, MIN_CURRENT, MAX_CURRENT)
            .unwrap_or_default()
    }
}
