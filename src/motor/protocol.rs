// Bus message codec: a fixed 9-byte payload carries one complete target
// update.
//
// Layout (little-endian):
//   [0]    run mode
//   [1]    rise change level
//   [2]    fall change level
//   [3..5] duty cycle, u16 fixed-point (0xFFFF = 1.0)
//   [5..7] rise unit,  u16 fixed-point
//   [7..9] fall unit,  u16 fixed-point
//
// Ratios ride the wire as fixed-point so every bit pattern decodes to a
// value inside [0, 1]; the mode and level bytes are the only fields that
// can make a payload invalid.

use super::state::{ChangeLevel, MotorState, RunMode};

/// Fixed payload length of one protocol message
pub const PAYLOAD_LEN: usize = 9;

const RATIO_SCALE: f32 = u16::MAX as f32;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DecodeError {
    #[error("payload has {0} bytes, layout needs {len}", len = PAYLOAD_LEN)]
    TruncatedPayload(usize),

    #[error("unknown run mode byte 0x{0:02X}")]
    InvalidMode(u8),

    #[error("unknown change level byte 0x{0:02X}")]
    InvalidLevel(u8),
}

/// One fully parsed protocol message.
///
/// Decoding produces this value without touching any [`MotorState`], so a
/// failed decode can never leave a target half-written; [`TargetUpdate::apply`]
/// commits all fields in one step.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TargetUpdate {
    pub run_mode: RunMode,
    pub duty_cycle: f32,
    pub rise_unit: f32,
    pub rise_level: ChangeLevel,
    pub fall_unit: f32,
    pub fall_level: ChangeLevel,
}

impl TargetUpdate {
    /// Overwrite every commanded field of `dst`. The watchdog is left
    /// alone; resetting it is the caller's decision.
    pub fn apply(&self, dst: &mut MotorState) {
        dst.set_run_mode(self.run_mode);
        dst.set_duty_cycle(self.duty_cycle);
        dst.set_rise(self.rise_unit, self.rise_level);
        dst.set_fall(self.fall_unit, self.fall_level);
    }
}

fn run_mode_from_wire(byte: u8) -> Result<RunMode, DecodeError> {
    match byte {
        0 => Ok(RunMode::Coast),
        1 => Ok(RunMode::Brake),
        2 => Ok(RunMode::Forward),
        3 => Ok(RunMode::Reverse),
        other => Err(DecodeError::InvalidMode(other)),
    }
}

fn level_from_wire(byte: u8) -> Result<ChangeLevel, DecodeError> {
    match byte {
        0 => Ok(ChangeLevel::Off),
        1 => Ok(ChangeLevel::Low),
        2 => Ok(ChangeLevel::Mid),
        3 => Ok(ChangeLevel::High),
        other => Err(DecodeError::InvalidLevel(other)),
    }
}

fn ratio_from_wire(lo: u8, hi: u8) -> f32 {
    u16::from_le_bytes([lo, hi]) as f32 / RATIO_SCALE
}

fn ratio_to_wire(ratio: f32) -> u16 {
    (ratio * RATIO_SCALE).round() as u16
}

/// Parse one payload. Pure: same bytes, same result. Trailing bytes past
/// the fixed layout are ignored.
pub fn decode(payload: &[u8]) -> Result<TargetUpdate, DecodeError> {
    if payload.len() < PAYLOAD_LEN {
        return Err(DecodeError::TruncatedPayload(payload.len()));
    }

    Ok(TargetUpdate {
        run_mode: run_mode_from_wire(payload[0])?,
        rise_level: level_from_wire(payload[1])?,
        fall_level: level_from_wire(payload[2])?,
        duty_cycle: ratio_from_wire(payload[3], payload[4]),
        rise_unit: ratio_from_wire(payload[5], payload[6]),
        fall_unit: ratio_from_wire(payload[7], payload[8]),
    })
}

/// Build the payload for an update; inverse of [`decode`]. Used by command
/// senders and tests.
pub fn encode(update: &TargetUpdate) -> [u8; PAYLOAD_LEN] {
    let mut payload = [0u8; PAYLOAD_LEN];
    payload[0] = update.run_mode as u8;
    payload[1] = update.rise_level as u8;
    payload[2] = update.fall_level as u8;
    payload[3..5].copy_from_slice(&ratio_to_wire(update.duty_cycle).to_le_bytes());
    payload[5..7].copy_from_slice(&ratio_to_wire(update.rise_unit).to_le_bytes());
    payload[7..9].copy_from_slice(&ratio_to_wire(update.fall_unit).to_le_bytes());
    payload
}
