// Telemetry message types published by the runtime

use serde::{Deserialize, Serialize};

use crate::motor::{MotorState, RunMode};

// Point-in-time view of one side of the control loop
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct MotorSnapshot {
    pub run_mode: RunMode,
    pub duty_cycle: f32,
    pub ttl: u32,
}

impl From<&MotorState> for MotorSnapshot {
    fn from(state: &MotorState) -> Self {
        Self {
            run_mode: state.run_mode(),
            duty_cycle: state.duty_cycle(),
            ttl: state.ttl(),
        }
    }
}

// Runtime -> observers, once per tick: both sides of the loop plus the
// link failure counters
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DriveTelemetry {
    pub target: MotorSnapshot,
    pub actual: MotorSnapshot,
    pub decode_errors: u64,
    pub reassembly_drops: u64,
}

/// Health status published by runtime
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "snake_case")]
pub enum RuntimeHealth {
    Ok,
    CmdStale,
}
