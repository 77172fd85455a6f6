// Keyboard teleop: WASD shift, Z/X turn, R/F speed, Q quit
use crossterm::{
    event::{self, Event, KeyCode, KeyEvent, KeyEventKind},
    terminal::{disable_raw_mode, enable_raw_mode},
};
use omni4_runtime::config::TOPIC_CMD_DRIVE;
use omni4_runtime::messages::DriveCommand;
use std::time::{Duration, Instant};
use tracing::info;

const SPEEDS: [f64; 3] = [15.0, 30.0, 60.0]; // percent
const STICK: i32 = 127; // full deflection of a gamepad axis
const INPUT_TIMEOUT_MS: u64 = 100; // Stop after this much time with no input

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    tracing_subscriber::fmt().with_env_filter("info").init();

    info!("Opening Zenoh session...");
    let session = zenoh::open(zenoh::Config::default()).await?;
    let publisher = session.declare_publisher(TOPIC_CMD_DRIVE).await?;

    info!("Controls: WASD=shift, Z/X=turn, R/F=speed, Q=quit");
    info!("Speed: LOW");

    enable_raw_mode()?;
    let result = run_teleop(&publisher).await;
    disable_raw_mode()?;

    result
}

async fn run_teleop(
    publisher: &zenoh::pubsub::Publisher<'_>,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let mut speed_idx: usize = 0;

    // Persistent stick state
    let mut x = 0;
    let mut y = 0;
    let mut turn = 0.0;
    let mut last_movement_input = Instant::now();

    loop {
        // Poll for key with 20ms timeout (50Hz effective rate)
        if event::poll(Duration::from_millis(20))? {
            if let Event::Key(KeyEvent { code, kind, .. }) = event::read()? {
                let pressed = kind == KeyEventKind::Press || kind == KeyEventKind::Repeat;

                match code {
                    // Translation - update stick and refresh timestamp
                    KeyCode::Char('w') if pressed => {
                        y = STICK;
                        last_movement_input = Instant::now();
                    }
                    KeyCode::Char('s') if pressed => {
                        y = -STICK;
                        last_movement_input = Instant::now();
                    }
                    KeyCode::Char('a') if pressed => {
                        x = -STICK;
                        last_movement_input = Instant::now();
                    }
                    KeyCode::Char('d') if pressed => {
                        x = STICK;
                        last_movement_input = Instant::now();
                    }

                    // Rotation
                    KeyCode::Char('z') if pressed => {
                        turn = SPEEDS[speed_idx];
                        last_movement_input = Instant::now();
                    }
                    KeyCode::Char('x') if pressed => {
                        turn = -SPEEDS[speed_idx];
                        last_movement_input = Instant::now();
                    }

                    // Speed control
                    KeyCode::Char('r') if pressed => {
                        speed_idx = (speed_idx + 1).min(2);
                        print_speed(speed_idx);
                    }
                    KeyCode::Char('f') if pressed => {
                        speed_idx = speed_idx.saturating_sub(1);
                        print_speed(speed_idx);
                    }

                    // Quit
                    KeyCode::Char('q') | KeyCode::Esc if pressed => break,

                    _ => {}
                }
            }
        }

        // Release the stick if no movement input for INPUT_TIMEOUT_MS
        if last_movement_input.elapsed() > Duration::from_millis(INPUT_TIMEOUT_MS) {
            x = 0;
            y = 0;
            turn = 0.0;
        }

        // Rotation wins over translation; the base does one or the other
        let cmd = if turn != 0.0 {
            DriveCommand::Turn { speed: turn }
        } else if x != 0 || y != 0 {
            DriveCommand::Shift {
                x,
                y,
                max_speed: SPEEDS[speed_idx],
            }
        } else {
            DriveCommand::Stop
        };

        // Always publish at ~50Hz
        publisher.put(serde_json::to_string(&cmd)?).await?;
    }

    // Leave the base stopped
    publisher.put(serde_json::to_string(&DriveCommand::Stop)?).await?;
    Ok(())
}

fn print_speed(idx: usize) {
    let label = ["LOW", "MED", "HIGH"][idx];
    info!("Speed: {} ({}%)", label, SPEEDS[idx]);
}
