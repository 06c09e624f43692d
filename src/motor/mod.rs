// Motor drive core
//
// Provides:
// - The commanded/actual motor state model
// - Bus message decoding and link-layer frame reassembly
// - The per-tick ramp/failsafe coordination law
// - Capability seams for the power stage and status indicator

pub mod bridge;
mod coordinate;
mod driver;
pub mod protocol;
pub mod reassembly;
pub mod state;

pub use bridge::{BridgeError, DriveBoard};
pub use coordinate::coordinate;
pub use driver::{LogIndicator, MotorDriver, NullDriver, StatusIndicator};
pub use protocol::{DecodeError, PAYLOAD_LEN, TargetUpdate, decode, encode};
pub use reassembly::{FrameReassembler, fragment};
pub use state::{ChangeLevel, DUTY_EPSILON, MotorState, RunMode};
