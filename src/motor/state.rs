// Motor operating state, commanded ("target") vs actuated ("actual")
//
// Two instances live for the whole process: the target side is overwritten
// by decoded bus messages, the actual side is ramped toward it once per
// control tick and is the only state ever handed to the power stage.

use serde::{Deserialize, Serialize};

use crate::config::WATCHDOG_TTL_TICKS;

/// Duty cycles closer than this are treated as equal
pub const DUTY_EPSILON: f32 = f32::EPSILON;

/// Motor run modes.
///
/// Coast and Brake are the passive terminal modes (freewheeling vs.
/// electrically braked); Forward and Reverse are the active drive modes.
/// The discriminants are the wire encoding.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunMode {
    Coast = 0,
    Brake = 1,
    Forward = 2,
    Reverse = 3,
}

impl RunMode {
    /// Passive modes hold or dissipate momentum and ignore the commanded
    /// duty cycle.
    pub fn is_passive(self) -> bool {
        matches!(self, RunMode::Coast | RunMode::Brake)
    }
}

/// Ramp policy for a duty-cycle change.
///
/// Off applies the full delta in a single tick; every other level selects
/// the unit-limited ramp, with the per-tick step taken from the explicit
/// rise/fall unit fields.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeLevel {
    Off = 0,
    Low = 1,
    Mid = 2,
    High = 3,
}

impl ChangeLevel {
    /// Conventional per-tick step for each level, used by command senders
    /// that don't pick their own units.
    pub fn default_unit(self) -> f32 {
        match self {
            ChangeLevel::Off => 1.0,
            ChangeLevel::Low => 0.01,
            ChangeLevel::Mid => 0.05,
            ChangeLevel::High => 0.10,
        }
    }
}

/// Treat two duty cycles as equal when they differ by less than
/// [`DUTY_EPSILON`]. Exact f32 comparison would keep the ramp chasing
/// rounding noise forever.
pub fn duty_approx_eq(a: f32, b: f32) -> bool {
    (a - b).abs() <= DUTY_EPSILON
}

/// Full operating state of one motor channel.
///
/// Fields are private; every mutation goes through a narrow setter so a
/// duty cycle outside [0, 1] cannot be constructed.
#[derive(Debug, Clone, Copy)]
pub struct MotorState {
    run_mode: RunMode,
    duty_cycle: f32,
    rise_unit: f32,
    fall_unit: f32,
    rise_level: ChangeLevel,
    fall_level: ChangeLevel,
    ttl: u32,
}

impl MotorState {
    /// Failsafe state: no drive, electrically braked, full watchdog budget.
    pub const DEFAULT: Self = Self {
        run_mode: RunMode::Brake,
        duty_cycle: 0.0,
        rise_unit: 0.0,
        fall_unit: 0.0,
        rise_level: ChangeLevel::Off,
        fall_level: ChangeLevel::Off,
        ttl: WATCHDOG_TTL_TICKS,
    };

    pub fn new() -> Self {
        Self::DEFAULT
    }

    pub fn run_mode(&self) -> RunMode {
        self.run_mode
    }

    pub fn duty_cycle(&self) -> f32 {
        self.duty_cycle
    }

    pub fn rise_unit(&self) -> f32 {
        self.rise_unit
    }

    pub fn fall_unit(&self) -> f32 {
        self.fall_unit
    }

    pub fn rise_level(&self) -> ChangeLevel {
        self.rise_level
    }

    pub fn fall_level(&self) -> ChangeLevel {
        self.fall_level
    }

    /// Control ticks left before the watchdog fires
    pub fn ttl(&self) -> u32 {
        self.ttl
    }

    pub fn set_run_mode(&mut self, mode: RunMode) {
        self.run_mode = mode;
    }

    /// `duty` must already be inside [0, 1]; callers compute in-range
    /// values rather than relying on a clamp here.
    pub fn set_duty_cycle(&mut self, duty: f32) {
        debug_assert!((0.0..=1.0).contains(&duty), "duty cycle {duty} out of range");
        self.duty_cycle = duty;
    }

    pub fn set_rise(&mut self, unit: f32, level: ChangeLevel) {
        debug_assert!((0.0..=1.0).contains(&unit), "rise unit {unit} out of range");
        self.rise_unit = unit;
        self.rise_level = level;
    }

    pub fn set_fall(&mut self, unit: f32, level: ChangeLevel) {
        debug_assert!((0.0..=1.0).contains(&unit), "fall unit {unit} out of range");
        self.fall_unit = unit;
        self.fall_level = level;
    }

    /// Only the coordinator burns watchdog budget
    pub fn decrement_ttl(&mut self) {
        self.ttl = self.ttl.saturating_sub(1);
    }

    /// Called on receipt of a freshly decoded target
    pub fn reset_ttl(&mut self) {
        self.ttl = WATCHDOG_TTL_TICKS;
    }
}

impl Default for MotorState {
    fn default() -> Self {
        Self::DEFAULT
    }
}
