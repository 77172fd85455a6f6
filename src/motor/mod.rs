// Motor control module for the 4-wheel omni base
//
// Provides:
// - Fixed-point speed/current codec and the shared 8-byte command frame
// - Per-motor channels (frame offsets, telemetry identifiers, feedback decode)
// - Omniwheel inverse kinematics (stick vector / rotation -> wheel speeds)
// - CAN transport (SLCAN adapter, simulated bus)
// - High-level drive API

pub mod bus;
pub mod channel;
pub mod codec;
mod driver;
mod error;
pub mod frame;
pub mod kinematics;
pub mod telemetry;

pub use bus::{BusError, CanBus, SimulatedBus, SlcanBus};
pub use channel::{MotorAddress, MotorChannel};
pub use driver::OmniDrive;
pub use error::DriveError;
pub use frame::Frame;
pub use kinematics::{Wheel, WheelSpeeds};
pub use telemetry::MotorTelemetry;
