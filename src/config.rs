// Timeouts, topics, bus and motor configuration
use std::time::Duration;

// Runtime loop frequency
pub const LOOP_HZ: u64 = 50;

// Command timeout for watchdog
pub const CMD_TIMEOUT: Duration = Duration::from_millis(250);

// Zenoh topics
pub const TOPIC_CMD_DRIVE: &str = "omni4/cmd/drive"; // commands
pub const TOPIC_RT_FRAME: &str = "omni4/rt/frame"; // outgoing bus frame
pub const TOPIC_TELEMETRY: &str = "omni4/state/telemetry"; // per-wheel feedback
pub const TOPIC_HEALTH: &str = "omni4/state/health"; // health status

// Serial port of the USB-CAN (SLCAN) adapter
pub const BUS_PORT: &str = "/dev/ttyACM0";

// CAN bitrate of the actuator bus (bit/s)
pub const BUS_BITRATE: u32 = 1_000_000;

// Enable hardware bus (set to false for simulation/testing)
pub const BUS_ENABLED: bool = true;

// CAN identifiers
pub const COMMAND_FRAME_ID: u16 = 0x200; // speed commands for motors 1-4
pub const TELEMETRY_BASE_ID: u16 = 0x200; // feedback arrives on base + address

// Speed percentages are carried to the controller as a current request
pub const SPEED_PERCENT_MAX: f64 = 100.0;
pub const MIN_CURRENT: f64 = -20.0; // amperes
pub const MAX_CURRENT: f64 = 20.0; // amperes
pub const MIN_SEND_CODE: i16 = -16384;
pub const MAX_SEND_CODE: i16 = 16384;

// Rotor encoder resolution reported in telemetry angle
pub const ENCODER_RESOLUTION: f64 = 8192.0;
