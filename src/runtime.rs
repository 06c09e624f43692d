// Fixed-rate control loop with watchdog failsafe
//
// Per tick: drain bus frames into the reassembler, apply at most one decoded
// target update, ramp the actual state toward the target, hand the result to
// the power stage, publish telemetry. The tick period is the only timing
// authority; nothing here blocks on the bus.

use std::time::Duration;
use tokio::time::interval;
use tracing::{info, warn};

use crate::config::{self, LOOP_HZ, WATCHDOG_TTL_TICKS};
use crate::messages::{DriveTelemetry, MotorSnapshot, RuntimeHealth};
use crate::motor::{
    FrameReassembler, MotorDriver, MotorState, StatusIndicator, coordinate, decode,
};

pub struct Runtime {
    target: MotorState,
    actual: MotorState,
    reassembler: FrameReassembler,
    decode_errors: u64,
    health: RuntimeHealth,
}

impl Runtime {
    pub fn new() -> Self {
        Self {
            target: MotorState::new(),
            actual: MotorState::new(),
            reassembler: FrameReassembler::new(),
            decode_errors: 0,
            health: RuntimeHealth::Ok, // both sides start with a full watchdog budget
        }
    }

    /// Feed one link-layer frame into reassembly
    fn on_frame(&mut self, frame: &[u8]) {
        self.reassembler.ingest(frame);
    }

    /// Apply at most one completed message to the target state. A decode
    /// failure keeps the previous target and never touches the watchdog.
    fn take_target_update(&mut self) {
        let Some(payload) = self.reassembler.poll_ready() else {
            return;
        };

        match decode(&payload) {
            Ok(update) => {
                update.apply(&mut self.target);
                self.actual.reset_ttl();
                info!(
                    "Target: {:?} at {:.2}",
                    self.target.run_mode(),
                    self.target.duty_cycle()
                );
            }
            Err(e) => {
                self.decode_errors += 1;
                warn!("Failed to decode message: {}", e);
            }
        }
    }

    /// Advance the actual state by one control tick
    fn tick(&mut self) {
        coordinate(&self.target, &mut self.actual);

        let health = if self.actual.ttl() == 0 {
            RuntimeHealth::CmdStale
        } else {
            RuntimeHealth::Ok
        };
        if health == RuntimeHealth::CmdStale && self.health != RuntimeHealth::CmdStale {
            warn!("No fresh target inside the watchdog window, holding safe state");
        }
        self.health = health;
    }

    fn telemetry(&self) -> DriveTelemetry {
        DriveTelemetry {
            target: MotorSnapshot::from(&self.target),
            actual: MotorSnapshot::from(&self.actual),
            decode_errors: self.decode_errors,
            reassembly_drops: self.reassembler.drops(),
        }
    }
}

impl Default for Runtime {
    fn default() -> Self {
        Self::new()
    }
}

pub async fn run(
    device_id: u8,
    mut driver: impl MotorDriver,
    mut indicator: impl StatusIndicator,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    info!("Opening Zenoh session...");
    let session = zenoh::open(zenoh::Config::default()).await?;

    info!("Setting up publishers and subscribers...");
    let subscriber = session
        .declare_subscriber(config::topic_cmd_frame(device_id))
        .await?;
    let pub_state = session
        .declare_publisher(config::topic_rt_state(device_id))
        .await?;
    let pub_health = session
        .declare_publisher(config::topic_health(device_id))
        .await?;

    let mut runtime = Runtime::new();
    let mut tick = interval(Duration::from_millis(1000 / LOOP_HZ));

    info!(
        "Runtime started: device id {}, {}Hz loop, {} tick watchdog",
        device_id, LOOP_HZ, WATCHDOG_TTL_TICKS
    );
    info!("Subscribed to: {}", config::topic_cmd_frame(device_id));

    loop {
        tick.tick().await;

        // 1. Drain all pending frames (non-blocking)
        while let Ok(Some(sample)) = subscriber.try_recv() {
            runtime.on_frame(&sample.payload().to_bytes());
        }

        // 2. Apply at most one reassembled target update
        runtime.take_target_update();

        // 3. Ramp actual toward target (includes watchdog logic)
        runtime.tick();

        // 4. Hand the actual state to the hardware; a failed write degrades
        //    to a logged miss, never a crash
        if let Err(e) = driver.apply(runtime.actual.duty_cycle(), runtime.actual.run_mode()) {
            warn!("Driver write failed: {}", e);
        }
        indicator.show(runtime.actual.run_mode());

        // 5. Publish telemetry and health
        let telemetry_json = serde_json::to_string(&runtime.telemetry())?;
        pub_state.put(telemetry_json).await?;

        let health_json = serde_json::to_string(&runtime.health)?;
        pub_health.put(health_json).await?;
    }
}
