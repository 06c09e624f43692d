// Keyboard teleop: F/R drive direction, B brake, C coast, W/S duty,
// L cycle ramp level, Q quit
use clap::Parser;
use crossterm::{
    event::{self, Event, KeyCode, KeyEvent, KeyEventKind},
    terminal::{disable_raw_mode, enable_raw_mode},
};
use std::time::Duration;
use tracing::info;

use mdrive_runtime::config;
use mdrive_runtime::motor::{ChangeLevel, RunMode, TargetUpdate, encode, fragment};

const DUTY_STEP: f32 = 0.05;

/// Send drive commands to a runtime over the bus
#[derive(Parser)]
struct Args {
    /// Device id of the drive to command
    #[arg(long, default_value_t = 0)]
    device_id: u8,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    tracing_subscriber::fmt().with_env_filter("info").init();
    let args = Args::parse();

    info!("Opening Zenoh session...");
    let session = zenoh::open(zenoh::Config::default()).await?;
    let publisher = session
        .declare_publisher(config::topic_cmd_frame(args.device_id))
        .await?;

    info!("Controls: F/R=direction, B=brake, C=coast, W/S=duty, L=ramp level, Q=quit");

    enable_raw_mode()?;
    let result = run_teleop(&publisher).await;
    disable_raw_mode()?;

    result
}

async fn run_teleop(
    publisher: &zenoh::pubsub::Publisher<'_>,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let mut mode = RunMode::Brake;
    let mut duty: f32 = 0.0;
    let mut level = ChangeLevel::Mid;

    loop {
        // Poll for key with 50ms timeout (20Hz command rate, well inside
        // the runtime's watchdog window)
        if event::poll(Duration::from_millis(50))? {
            if let Event::Key(KeyEvent { code, kind, .. }) = event::read()? {
                let pressed = kind == KeyEventKind::Press || kind == KeyEventKind::Repeat;

                match code {
                    KeyCode::Char('f') if pressed => mode = RunMode::Forward,
                    KeyCode::Char('r') if pressed => mode = RunMode::Reverse,
                    KeyCode::Char('b') if pressed => mode = RunMode::Brake,
                    KeyCode::Char('c') if pressed => mode = RunMode::Coast,

                    KeyCode::Char('w') if pressed => duty = (duty + DUTY_STEP).min(1.0),
                    KeyCode::Char('s') if pressed => duty = (duty - DUTY_STEP).max(0.0),

                    KeyCode::Char('l') if pressed => {
                        level = next_level(level);
                        info!("Ramp level: {:?}", level);
                    }

                    KeyCode::Char('q') | KeyCode::Esc if pressed => break,

                    _ => {}
                }
            }
        }

        let update = TargetUpdate {
            run_mode: mode,
            duty_cycle: duty,
            rise_unit: level.default_unit(),
            rise_level: level,
            fall_unit: level.default_unit(),
            fall_level: level,
        };
        for frame in fragment(&encode(&update)) {
            publisher.put(frame).await?;
        }
    }

    Ok(())
}

fn next_level(level: ChangeLevel) -> ChangeLevel {
    match level {
        ChangeLevel::Off => ChangeLevel::Low,
        ChangeLevel::Low => ChangeLevel::Mid,
        ChangeLevel::Mid => ChangeLevel::High,
        ChangeLevel::High => ChangeLevel::Off,
    }
}
