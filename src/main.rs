use clap::Parser;
use tracing_subscriber::EnvFilter;

use mdrive_runtime::config;
use mdrive_runtime::motor::{DriveBoard, LogIndicator, NullDriver};

/// Closed-loop motor drive runtime
#[derive(Parser)]
struct Args {
    /// Device id used for bus addressing (read from the identity strap
    /// on real hardware)
    #[arg(long, default_value_t = 0)]
    device_id: u8,

    /// Serial port of the H-bridge driver board
    #[arg(long, default_value = config::DRIVER_PORT)]
    port: String,

    /// Run without hardware attached
    #[arg(long)]
    no_motor: bool,
}

#[tokio::main]
async fn main() {
    // Setup logging (set RUST_LOG=info or debug)
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("info".parse().unwrap()))
        .init();

    let args = Args::parse();

    let result = if args.no_motor {
        mdrive_runtime::runtime::run(args.device_id, NullDriver, LogIndicator::default()).await
    } else {
        match DriveBoard::open(&args.port, config::DRIVER_BOARD_ID) {
            Ok(board) => {
                mdrive_runtime::runtime::run(args.device_id, board, LogIndicator::default()).await
            }
            Err(e) => {
                eprintln!("Failed to open driver board: {}", e);
                std::process::exit(1);
            }
        }
    };

    if let Err(e) = result {
        eprintln!("Runtime error: {}", e);
        std::process::exit(1);
    }
}
