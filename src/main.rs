use clap::Parser;
use tracing_subscriber::EnvFilter;

use omni4_runtime::config::{BUS_BITRATE, BUS_PORT, SPEED_PERCENT_MAX};
use omni4_runtime::runtime::{self, RuntimeOptions};

/// Drive a 4-wheel omni base over CAN from zenoh commands
#[derive(Parser, Debug)]
#[command(version, about)]
struct Args {
    /// Serial port of the USB-CAN (SLCAN) adapter
    #[arg(long, default_value = BUS_PORT)]
    port: String,

    /// CAN bitrate in bit/s
    #[arg(long, default_value_t = BUS_BITRATE)]
    bitrate: u32,

    /// Run without hardware (frames are only logged)
    #[arg(long)]
    simulate: bool,

    /// Reject commands faster than this speed percentage
    #[arg(long, default_value_t = SPEED_PERCENT_MAX)]
    speed_limit: f64,
}

#[tokio::main]
async fn main() {
    // Setup logging (set RUST_LOG=info or debug)
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("info".parse().unwrap()))
        .init(); // installs the subscriber globally

    let args = Args::parse();
    let options = RuntimeOptions {
        port: args.port,
        bitrate: args.bitrate,
        simulate: args.simulate,
        speed_limit: args.speed_limit,
    };

    if let Err(e) = runtime::run(options).await {
        eprintln!("Runtime error: {}", e);
        std::process::exit(1);
    }
}
