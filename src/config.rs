// Loop timing, watchdog budget, bus topics, hardware defaults

// Control loop frequency
pub const LOOP_HZ: u64 = 50;

// Ticks of bus silence before the watchdog forces the safe state
// (500ms at 50Hz)
pub const WATCHDOG_TTL_TICKS: u32 = 25;

// Zenoh topics; the device id comes from the identity strap read at startup
pub fn topic_cmd_frame(device_id: u8) -> String {
    format!("mdrive/{device_id}/cmd/frame") // link-layer frames
}

pub fn topic_rt_state(device_id: u8) -> String {
    format!("mdrive/{device_id}/rt/state") // target/actual telemetry
}

pub fn topic_health(device_id: u8) -> String {
    format!("mdrive/{device_id}/state/health") // health status
}

// Hardware configuration
// Serial port of the H-bridge driver board
pub const DRIVER_PORT: &str = "/dev/ttyACM0";

// Bus id of the driver board on its serial link
pub const DRIVER_BOARD_ID: u8 = 1;
