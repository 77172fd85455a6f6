// 50 Hz loop with watchdog
// Note: a watchdog is a safety mechanism that triggers a safe action if something goes wrong
// Eg. without it if teleop crashes and stops sending commands, the base keeps driving on the last frame

use std::time::{Duration, Instant};
use tokio::time::interval;
use tracing::{debug, info, warn};

// local imports
use crate::config::{
    BUS_ENABLED, CMD_TIMEOUT, LOOP_HZ, TOPIC_CMD_DRIVE, TOPIC_HEALTH, TOPIC_RT_FRAME,
    TOPIC_TELEMETRY,
};
use crate::messages::{
    DriveCommand, FrameMessage, RuntimeHealth, TelemetrySnapshot, WheelTelemetry,
};
use crate::motor::{CanBus, DriveError, Frame, OmniDrive, SimulatedBus, SlcanBus, Wheel};

/// Startup options (from the command line)
#[derive(Debug, Clone)]
pub struct RuntimeOptions {
    pub port: String,
    pub bitrate: u32,
    pub simulate: bool,
    /// Largest speed percentage accepted from the command topic
    pub speed_limit: f64,
}

pub struct Runtime<B: CanBus> {
    drive: OmniDrive<B>,
    speed_limit: f64,
    cmd_timeout: Duration,
    cmd_received_at: Option<Instant>,
    health: RuntimeHealth,
}

impl<B: CanBus> Runtime<B> {
    pub fn new(drive: OmniDrive<B>, speed_limit: f64) -> Self {
        Self {
            drive,
            speed_limit,
            cmd_timeout: CMD_TIMEOUT,
            cmd_received_at: None,
            health: RuntimeHealth::CmdStale, // Start stale until first cmd
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.cmd_timeout = timeout;
        self
    }

    pub fn health(&self) -> RuntimeHealth {
        self.health
    }

    pub fn drive(&self) -> &OmniDrive<B> {
        &self.drive
    }

    pub fn drive_mut(&mut self) -> &mut OmniDrive<B> {
        &mut self.drive
    }

    /// Process incoming command
    ///
    /// A rejected command does not refresh the watchdog; the last valid
    /// command keeps running until it goes stale.
    pub fn on_command(&mut self, cmd: DriveCommand) {
        info!("Received command: {:?}", &cmd);

        if let Some(speed) = self.exceeds_limit(&cmd) {
            warn!(
                "Rejecting command: {}% above speed limit {}%",
                speed, self.speed_limit
            );
            self.health = RuntimeHealth::CmdRejected;
            return;
        }

        match self.drive.execute(&cmd) {
            Ok(()) => {
                self.cmd_received_at = Some(Instant::now());
                self.health = RuntimeHealth::Ok;
            }
            Err(e) => {
                warn!("Rejecting command {:?}: {}", cmd, e);
                self.health = RuntimeHealth::CmdRejected;
            }
        }
    }

    fn exceeds_limit(&self, cmd: &DriveCommand) -> Option<f64> {
        let speed = match *cmd {
            DriveCommand::Shift { max_speed, .. } => max_speed,
            DriveCommand::Turn { speed } => speed,
            DriveCommand::TestMove { x } => x,
            DriveCommand::Stop => 0.0,
        };
        (speed.abs() > self.speed_limit).then_some(speed)
    }

    /// One loop iteration: watchdog, send the command frame, absorb feedback
    ///
    /// A bus failure sets health to `BusError` and is returned to the caller;
    /// the next successful tick clears it.
    pub fn tick(&mut self) -> Result<Frame, DriveError> {
        match self.step() {
            Ok(frame) => {
                if self.health == RuntimeHealth::BusError {
                    info!("Bus recovered");
                    self.health = RuntimeHealth::Ok;
                }
                Ok(frame)
            }
            Err(e) => {
                self.health = RuntimeHealth::BusError;
                Err(e)
            }
        }
    }

    fn step(&mut self) -> Result<Frame, DriveError> {
        let stale = match self.cmd_received_at {
            Some(at) => at.elapsed() > self.cmd_timeout,
            None => true,
        };

        if stale {
            // Watchdog triggered - stop the robot
            if self.health != RuntimeHealth::CmdStale {
                warn!("Command stale (> {:?}), stopping robot", self.cmd_timeout);
            }
            self.health = RuntimeHealth::CmdStale;
            self.drive.stop()?;
        }

        let frame = self.drive.assemble_and_send()?;
        let absorbed = self.drive.poll_feedback()?;
        if absorbed > 0 {
            debug!("Absorbed {} feedback frames", absorbed);
        }
        Ok(frame)
    }

    /// Telemetry for every wheel that has reported so far
    pub fn telemetry_snapshot(&self) -> TelemetrySnapshot {
        let wheels = Wheel::ALL
            .iter()
            .filter_map(|&wheel| {
                let channel = self.drive.channel(wheel);
                channel.telemetry().map(|raw| WheelTelemetry {
                    wheel,
                    speed_command: channel.speed(),
                    raw,
                    angle_deg: raw.angle_degrees(),
                    current_amps: raw.current_amps(),
                })
            })
            .collect();
        TelemetrySnapshot { wheels }
    }
}

fn open_bus(
    options: &RuntimeOptions,
) -> Result<Box<dyn CanBus + Send>, Box<dyn std::error::Error + Send + Sync>> {
    if options.simulate || !BUS_ENABLED {
        info!("Running with simulated bus (no hardware)");
        return Ok(Box::new(SimulatedBus::new()));
    }
    Ok(Box::new(SlcanBus::open(&options.port, options.bitrate)?))
}

pub async fn run(options: RuntimeOptions) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let bus = open_bus(&options)?;
    let mut runtime = Runtime::new(OmniDrive::new(bus), options.speed_limit);

    info!("Opening Zenoh session...");
    let session = zenoh::open(zenoh::Config::default()).await?;

    info!("Setting up publishers and subscribers...");
    let subscriber = session.declare_subscriber(TOPIC_CMD_DRIVE).await?;
    let pub_frame = session.declare_publisher(TOPIC_RT_FRAME).await?;
    let pub_telemetry = session.declare_publisher(TOPIC_TELEMETRY).await?;
    let pub_health = session.declare_publisher(TOPIC_HEALTH).await?;

    let mut tick = interval(Duration::from_millis(1000 / LOOP_HZ));
    let mut last_frame: Option<Frame> = None;

    info!(
        "Runtime started: {}Hz loop, {}ms watchdog timeout, {}% speed limit",
        LOOP_HZ,
        CMD_TIMEOUT.as_millis(),
        options.speed_limit
    );
    info!("Subscribed to: {}", TOPIC_CMD_DRIVE);
    info!(
        "Publishing to: {}, {}, {}",
        TOPIC_RT_FRAME, TOPIC_TELEMETRY, TOPIC_HEALTH
    );

    loop {
        tick.tick().await;

        // 1. Drain all pending commands (non-blocking), applied in order
        while let Ok(Some(sample)) = subscriber.try_recv() {
            let payload = sample.payload().to_bytes();
            match serde_json::from_slice::<DriveCommand>(&payload) {
                Ok(cmd) => runtime.on_command(cmd),
                Err(e) => {
                    warn!("Failed to parse command: {}", e);
                }
            }
        }

        // 2. Watchdog, send frame, absorb feedback (bus errors are not fatal)
        match runtime.tick() {
            Ok(frame) => last_frame = Some(frame),
            Err(e) => warn!("Bus cycle failed: {}", e),
        }

        // 3. Publish the last frame that went out on the bus
        if let Some(frame) = &last_frame {
            let frame_json = serde_json::to_string(&FrameMessage::from(frame))?;
            pub_frame.put(frame_json).await?;
        }

        // 4. Publish telemetry and health
        let telemetry_json = serde_json::to_string(&runtime.telemetry_snapshot())?;
        pub_telemetry.put(telemetry_json).await?;

        let health_json = serde_json::to_string(&runtime.health())?;
        pub_health.put(health_json).await?;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::motor::BusError;

    /// Bus whose first `fail_sends` transmissions time out
    struct FlakyBus {
        fail_sends: usize,
        sent: Vec<Frame>,
    }

    impl CanBus for FlakyBus {
        fn send(&mut self, frame: &Frame) -> Result<(), BusError> {
            if self.fail_sends > 0 {
                self.fail_sends -= 1;
                return Err(BusError::Io(std::io::Error::new(
                    std::io::ErrorKind::TimedOut,
                    "tx timeout",
                )));
            }
            self.sent.push(*frame);
            Ok(())
        }

        fn try_recv(&mut self) -> Result<Option<Frame>, BusError> {
            Ok(None)
        }
    }

    fn runtime() -> Runtime<SimulatedBus> {
        Runtime::new(OmniDrive::new(SimulatedBus::new()), 100.0)
    }

    #[test]
    fn test_starts_stale_and_stopped() {
        let mut rt = runtime();
        let frame = rt.tick().unwrap();
        assert_eq!(rt.health(), RuntimeHealth::CmdStale);
        assert_eq!(frame.data(), &[0i8; 8]);
    }

    #[test]
    fn test_command_drives_frame() {
        let mut rt = runtime();
        rt.on_command(DriveCommand::Shift {
            x: 50,
            y: 50,
            max_speed: 30.0,
        });
        let frame = rt.tick().unwrap();
        assert_eq!(rt.health(), RuntimeHealth::Ok);
        assert_eq!(frame.data(), &[19, 51, 0, 0, -20, -51, 0, 0]);
    }

    #[test]
    fn test_watchdog_stops_robot() {
        let mut rt = runtime().with_timeout(Duration::from_millis(5));
        rt.on_command(DriveCommand::Turn { speed: 40.0 });
        std::thread::sleep(Duration::from_millis(20));
        let frame = rt.tick().unwrap();
        assert_eq!(rt.health(), RuntimeHealth::CmdStale);
        assert_eq!(frame.data(), &[0i8; 8]);
    }

    #[test]
    fn test_rejected_command_keeps_last_frame() {
        let mut rt = Runtime::new(OmniDrive::new(SimulatedBus::new()), 50.0);
        rt.on_command(DriveCommand::Turn { speed: 50.0 });
        let before = rt.tick().unwrap();

        // Above the runtime limit
        rt.on_command(DriveCommand::Turn { speed: 80.0 });
        assert_eq!(rt.health(), RuntimeHealth::CmdRejected);
        let after = rt.tick().unwrap();
        assert_eq!(before, after);
    }

    #[test]
    fn test_rejected_by_codec() {
        let mut rt = Runtime::new(OmniDrive::new(SimulatedBus::new()), 1000.0);
        rt.on_command(DriveCommand::Turn { speed: 20.0 });
        let before = rt.tick().unwrap();

        // Passes the runtime limit but overflows the speed domain
        rt.on_command(DriveCommand::Turn { speed: 120.0 });
        assert_eq!(rt.health(), RuntimeHealth::CmdRejected);
        assert_eq!(rt.tick().unwrap(), before);
    }

    #[test]
    fn test_telemetry_snapshot() {
        let mut rt = runtime();
        assert!(rt.telemetry_snapshot().wheels.is_empty());

        let feedback = Frame::from_bytes(0x202, &[0x08, 0x00, 0, 0, 0x20, 0x00, 33, 0]).unwrap();
        rt.drive_mut().bus_mut().queue_feedback(feedback);
        rt.tick().unwrap();

        let snapshot = rt.telemetry_snapshot();
        assert_eq!(snapshot.wheels.len(), 1);
        let w = &snapshot.wheels[0];
        assert_eq!(w.wheel, Wheel::BackLeft);
        assert_eq!(w.raw.temperature, 33);
        assert!((w.angle_deg - 90.0).abs() < 1e-9);
        assert!((w.current_amps - 10.0).abs() < 1e-9);
    }

    #[test]
    fn test_bus_error_is_recoverable() {
        let bus = FlakyBus {
            fail_sends: 1,
            sent: Vec::new(),
        };
        let mut rt = Runtime::new(OmniDrive::new(bus), 100.0);
        rt.on_command(DriveCommand::Turn { speed: 50.0 });

        let err = rt.tick().unwrap_err();
        assert!(matches!(err, DriveError::Bus(BusError::Io(_))));
        assert_eq!(rt.health(), RuntimeHealth::BusError);

        // The command survives the failed cycle and goes out on the next one
        let frame = rt.tick().unwrap();
        assert_eq!(rt.health(), RuntimeHealth::Ok);
        assert_eq!(frame.data(), &[0x20, 0, 0x20, 0, 0x20, 0, 0x20, 0]);
        assert_eq!(rt.drive().bus().sent, vec![frame]);
    }
}
