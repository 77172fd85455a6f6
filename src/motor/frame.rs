// Fixed 8-byte CAN payload tagged with its bus identifier

use serde::{Deserialize, Serialize};

use super::error::{DriveError, Result};

/// Payload width of every frame on the actuator bus
pub const FRAME_LEN: usize = 8;

/// One frame on the actuator bus
///
/// The identifier is fixed at construction; only the payload is mutable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Frame {
    id: u16,
    data: [i8; FRAME_LEN],
}

impl Frame {
    /// Create a zero-filled frame
    pub fn new(id: u16) -> Self {
        Self {
            id,
            data: [0; FRAME_LEN],
        }
    }

    /// Build a frame from raw bus bytes
    ///
    /// Shorter payloads are zero-padded; more than 8 bytes is an error.
    pub fn from_bytes(id: u16, bytes: &[u8]) -> Result<Self> {
        if bytes.len() > FRAME_LEN {
            return Err(DriveError::PayloadTooLong { len: bytes.len() });
        }
        let mut frame = Self::new(id);
        for (slot, &byte) in frame.data.iter_mut().zip(bytes) {
            *slot = byte as i8;
        }
        Ok(frame)
    }

    pub fn id(&self) -> u16 {
        self.id
    }

    pub fn get(&self, index: usize) -> Result<i8> {
        self.data
            .get(index)
            .copied()
            .ok_or(DriveError::IndexOutOfBounds { index })
    }

    pub fn set(&mut self, index: usize, value: i8) -> Result<()> {
        let slot = self
            .data
            .get_mut(index)
            .ok_or(DriveError::IndexOutOfBounds { index })?;
        *slot = value;
        Ok(())
    }

    pub fn data(&self) -> &[i8; FRAME_LEN] {
        &self.data
    }

    /// Payload as unsigned bytes, ready for the transport
    pub fn to_bytes(&self) -> [u8; FRAME_LEN] {
        self.data.map(|b| b as u8)
    }
}
