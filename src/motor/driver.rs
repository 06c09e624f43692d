// Capability seams between the control loop and the outside world
//
// The runtime only ever sees these traits; concrete hardware lives behind
// them and is chosen at startup.

use tracing::{debug, info};

use super::bridge::BridgeError;
use super::state::RunMode;

/// Power-stage sink. Receives the ramped actual state once per tick and
/// gives nothing back.
pub trait MotorDriver {
    fn apply(&mut self, duty_cycle: f32, mode: RunMode) -> Result<(), BridgeError>;
}

/// Visual status output, fed the actual run mode once per tick.
pub trait StatusIndicator {
    fn show(&mut self, mode: RunMode);
}

/// Driver used when running without hardware attached.
pub struct NullDriver;

impl MotorDriver for NullDriver {
    fn apply(&mut self, duty_cycle: f32, mode: RunMode) -> Result<(), BridgeError> {
        debug!("drive output: {:?} at {:.3}", mode, duty_cycle);
        Ok(())
    }
}

/// Indicator that logs the run mode whenever it changes.
#[derive(Default)]
pub struct LogIndicator {
    last: Option<RunMode>,
}

impl StatusIndicator for LogIndicator {
    fn show(&mut self, mode: RunMode) {
        if self.last != Some(mode) {
            info!("Run mode: {:?}", mode);
            self.last = Some(mode);
        }
    }
}
