// High-level drive for the 4-wheel omni base
//
// Combines kinematics, channel encoding and the CAN transport. All four
// motors share one command frame; feedback is routed back per channel.

use tracing::{debug, info, warn};

use super::bus::CanBus;
use super::channel::{MOTOR_COUNT, MotorAddress, MotorChannel};
use super::error::{DriveError, Result};
use super::frame::Frame;
use super::kinematics::{self, Wheel, WheelSpeeds};
use super::telemetry::MotorTelemetry;
use crate::config::COMMAND_FRAME_ID;
use crate::messages::DriveCommand;

/// Omni-wheel base driving four motors on one CAN bus
pub struct OmniDrive<B: CanBus> {
    bus: B,
    channels: [MotorChannel; MOTOR_COUNT], // address order, see Wheel
    tx_frame: Frame,
}

impl<B: CanBus> OmniDrive<B> {
    pub fn new(bus: B) -> Self {
        Self {
            bus,
            channels: Wheel::ALL.map(|wheel| MotorChannel::new(MotorAddress::from(wheel))),
            tx_frame: Frame::new(COMMAND_FRAME_ID),
        }
    }

    /// Translate toward (x, y) with `max_speed` percent along the diagonals
    ///
    /// A zero vector stops the wheels.
    pub fn shift(&mut self, x: i32, y: i32, max_speed: f64) -> Result<()> {
        let speeds = kinematics::shift(x, y, max_speed);
        debug!("Shift ({}, {}) @ {}% -> {:?}", x, y, max_speed, speeds);
        self.set_wheel_speeds(speeds)
    }

    /// Rotate in place at `speed` percent
    pub fn turn(&mut self, speed: f64) -> Result<()> {
        self.set_wheel_speeds(kinematics::turn(speed))
    }

    /// Bench test: front-left at +x, back-right at -x, others untouched
    pub fn test_move(&mut self, x: f64) -> Result<()> {
        self.commit(&[(Wheel::FrontLeft, x), (Wheel::BackRight, -x)])
    }

    /// Zero all wheels
    pub fn stop(&mut self) -> Result<()> {
        self.set_wheel_speeds(WheelSpeeds::zero())
    }

    /// Apply a decoded command message
    pub fn execute(&mut self, cmd: &DriveCommand) -> Result<()> {
        match *cmd {
            DriveCommand::Shift { x, y, max_speed } => self.shift(x, y, max_speed),
            DriveCommand::Turn { speed } => self.turn(speed),
            DriveCommand::TestMove { x } => self.test_move(x),
            DriveCommand::Stop => self.stop(),
        }
    }

    /// Command all four wheels at once
    pub fn set_wheel_speeds(&mut self, speeds: WheelSpeeds) -> Result<()> {
        let updates = Wheel::ALL.map(|wheel| (wheel, speeds.get(wheel)));
        self.commit(&updates)
    }

    /// Encode every update before touching any channel, so a rejected
    /// command leaves the previous one in place
    fn commit(&mut self, updates: &[(Wheel, f64)]) -> Result<()> {
        let mut encoded = Vec::with_capacity(updates.len());
        for &(wheel, speed) in updates {
            let bytes = self.channels[wheel.index()].encode_speed(speed)?;
            encoded.push((wheel, speed, bytes));
        }
        for (wheel, speed, bytes) in encoded {
            self.channels[wheel.index()].set_command(speed, bytes);
        }
        Ok(())
    }

    /// Write every channel's bytes into the command frame and send a copy
    pub fn assemble_and_send(&mut self) -> Result<Frame> {
        for channel in &self.channels {
            let (first, second) = channel.buffer_offsets();
            let (high, low) = channel.command();
            self.tx_frame.set(first, high)?;
            self.tx_frame.set(second, low)?;
        }
        let frame = self.tx_frame;
        self.bus.send(&frame)?;
        Ok(frame)
    }

    /// Route a feedback frame to the channel it is addressed to
    pub fn apply_feedback(&mut self, frame: &Frame) -> Result<Wheel> {
        for wheel in Wheel::ALL {
            if self.channels[wheel.index()].absorb_feedback(frame) {
                return Ok(wheel);
            }
        }
        Err(DriveError::IdentifierMismatch { id: frame.id() })
    }

    /// Drain received frames into the channels
    ///
    /// Returns the number of frames absorbed. Frames for other devices on
    /// the bus are skipped.
    pub fn poll_feedback(&mut self) -> Result<usize> {
        let mut absorbed = 0;
        while let Some(frame) = self.bus.try_recv()? {
            match self.apply_feedback(&frame) {
                Ok(_) => absorbed += 1,
                Err(e) => debug!("{}", e),
            }
        }
        Ok(absorbed)
    }

    pub fn channel(&self, wheel: Wheel) -> &MotorChannel {
        &self.channels[wheel.index()]
    }

    /// Latest telemetry for a wheel, None until its first feedback frame
    pub fn telemetry(&self, wheel: Wheel) -> Option<MotorTelemetry> {
        self.channel(wheel).telemetry()
    }

    /// Currently committed speed percentages
    pub fn wheel_speeds(&self) -> WheelSpeeds {
        let [fl, bl, br, fr] = self.channels.each_ref().map(|c| c.speed());
        WheelSpeeds::new(fl, bl, br, fr)
    }

    pub fn bus(&self) -> &B {
        &self.bus
    }

    pub fn bus_mut(&mut self) -> &mut B {
        &mut self.bus
    }
}

impl<B: CanBus> Drop for OmniDrive<B> {
    fn drop(&mut self) {
        // Try to stop motors when the drive is dropped (safety measure)
        info!("Stopping all motors");
        if let Err(e) = self.stop().and_then(|_| self.assemble_and_send().map(|_| ())) {
            warn!("Failed to stop motors on drop: {}", e);
        }
    }
}
