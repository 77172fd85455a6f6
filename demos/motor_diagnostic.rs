// Motor diagnostic: READ-ONLY check of the CAN bus and motor feedback
//
// This tool never sends a command frame - it only listens for telemetry.
// Use this first before running motor_test.
//
// Usage: cargo run --example motor_diagnostic -- [port] [seconds]
// Example: cargo run --example motor_diagnostic -- /dev/ttyACM0 3

use omni4_runtime::config::{BUS_BITRATE, BUS_PORT};
use omni4_runtime::motor::{CanBus, MotorAddress, MotorTelemetry, SlcanBus, Wheel};
use std::collections::HashMap;
use std::thread::sleep;
use std::time::{Duration, Instant};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Setup logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("debug".parse().unwrap()),
        )
        .init();

    // Get port and listen time from args or use defaults
    let port = std::env::args()
        .nth(1)
        .unwrap_or_else(|| BUS_PORT.to_string());
    let seconds: u64 = std::env::args()
        .nth(2)
        .and_then(|s| s.parse().ok())
        .unwrap_or(2);

    println!("╔══════════════════════════════════════════════════════════════╗");
    println!("║           Omni4 Motor Diagnostic (READ-ONLY)                 ║");
    println!("╠══════════════════════════════════════════════════════════════╣");
    println!("║  This tool only LISTENS on the bus - no commands, no motion  ║");
    println!("╚══════════════════════════════════════════════════════════════╝");
    println!();
    println!("Serial port: {}", port);
    println!("Bitrate:     {} bit/s", BUS_BITRATE);
    println!();

    // Try to open the adapter
    println!("Step 1: Opening SLCAN adapter...");
    let mut bus = match SlcanBus::open(&port, BUS_BITRATE) {
        Ok(bus) => {
            println!("  ✓ Adapter opened, CAN channel up");
            bus
        }
        Err(e) => {
            println!("  ✗ Failed to open adapter: {}", e);
            println!();
            println!("Troubleshooting:");
            println!("  - Check the port path is correct");
            println!("  - Verify the USB-CAN adapter is plugged in");
            println!("  - Check the adapter speaks SLCAN (Lawicel)");
            return Err(e.into());
        }
    };
    println!();

    // Collect feedback frames
    println!("Step 2: Listening for feedback for {}s...", seconds);
    let mut latest: HashMap<u16, MotorTelemetry> = HashMap::new();
    let mut counts: HashMap<u16, usize> = HashMap::new();
    let deadline = Instant::now() + Duration::from_secs(seconds);
    while Instant::now() < deadline {
        match bus.try_recv()? {
            Some(frame) => {
                *counts.entry(frame.id()).or_default() += 1;
                latest.insert(frame.id(), MotorTelemetry::decode(&frame));
            }
            None => sleep(Duration::from_millis(1)),
        }
    }
    println!();

    // Report per wheel
    println!("Step 3: Feedback per wheel...");
    println!();
    let mut all_found = true;
    for wheel in Wheel::ALL {
        let id = MotorAddress::from(wheel).telemetry_id();
        println!("  === {:?} (motor {}, id 0x{:03X}) ===", wheel, wheel.address(), id);
        match latest.get(&id) {
            Some(t) => {
                println!("    Frames:      {}", counts[&id]);
                println!("    Angle:       {} ({:.1}°)", t.angle, t.angle_degrees());
                println!("    Speed:       {} rpm", t.rpm);
                println!("    Current:     {} ({:.2} A)", t.current, t.current_amps());
                println!("    Temperature: {} °C", t.temperature);
            }
            None => {
                println!("    ✗ NO FEEDBACK");
                all_found = false;
            }
        }
        println!();
    }

    let others: Vec<_> = counts
        .keys()
        .filter(|id| !(0x201..=0x204).contains(*id))
        .collect();
    if !others.is_empty() {
        println!("Other identifiers seen on the bus: {:03X?}", others);
        println!();
    }

    if !all_found {
        println!("⚠ WARNING: Not all motors reported!");
        println!("  - Check motor controller power supply");
        println!("  - Verify controller IDs are set to 1-4");
        println!("  - Check CAN wiring and 120Ω termination");
        println!();
    }

    println!("╔══════════════════════════════════════════════════════════════╗");
    println!("║                    Diagnostic Complete                       ║");
    println!("╚══════════════════════════════════════════════════════════════╝");
    println!();
    println!("Next step: Run 'cargo run --example motor_test' with wheels OFF THE GROUND");

    Ok(())
}
