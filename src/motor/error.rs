// Error types for the drive core (codec, frames, channels, kinematics)

use super::bus::BusError;

#[derive(Debug, thiserror::Error)]
pub enum DriveError {
    #[error("Invalid domain: {reason}")]
    Domain { reason: String },

    #[error("Value {value} outside domain [{min}, {max}]")]
    RangeOverflow { value: f64, min: f64, max: f64 },

    #[error("Frame index {index} out of bounds (frame holds 8 bytes)")]
    IndexOutOfBounds { index: usize },

    #[error("Payload of {len} bytes does not fit an 8-byte frame")]
    PayloadTooLong { len: usize },

    #[error("Frame 0x{id:03X} is not addressed to any motor channel")]
    IdentifierMismatch { id: u16 },

    #[error("Invalid motor address {address} (expected 1-4)")]
    InvalidAddress { address: u8 },

    #[error("Bus error: {0}")]
    Bus(#[from] BusError),
}

pub type Result<T> = std::result::Result<T, DriveError>;
