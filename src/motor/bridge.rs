// Serial protocol for the H-bridge driver board
//
// Packet format: [0xAA, 0x55, ID, Length, Instruction, Params..., Checksum]
// The board acks every addressed instruction with a status packet in the
// same framing: [0xAA, 0x55, ID, Length, Error, Checksum].

use serialport::{self, SerialPort};
use std::io::{Read, Write};
use std::time::Duration;
use tracing::{debug, info};

use super::driver::MotorDriver;
use super::state::RunMode;

/// Default serial configuration for the driver board
pub const DEFAULT_BAUDRATE: u32 = 115_200;
pub const DEFAULT_TIMEOUT_MS: u64 = 20;

/// Packet header bytes
const HEADER: [u8; 2] = [0xAA, 0x55];

/// Instruction set understood by the board
#[repr(u8)]
#[derive(Debug, Clone, Copy)]
pub enum Instruction {
    Ping = 0x01,
    Write = 0x03,
}

/// Register map of the driver board
#[repr(u8)]
#[derive(Debug, Clone, Copy)]
pub enum Register {
    /// 1 byte, wire encoding of [`RunMode`]
    RunMode = 0x10,
    /// 2 bytes little-endian, 0xFFFF = full duty
    DutyCycle = 0x11,
}

#[derive(Debug, thiserror::Error)]
pub enum BridgeError {
    #[error("serial port error: {0}")]
    Serial(#[from] serialport::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid response from board: {0}")]
    InvalidResponse(String),

    #[error("checksum mismatch in board response")]
    ChecksumMismatch,

    #[error("board reported error status 0x{0:02X}")]
    BoardError(u8),

    #[error("timeout waiting for board response")]
    Timeout,
}

/// Checksum over id, length, instruction and params
fn checksum(data: &[u8]) -> u8 {
    let sum: u16 = data.iter().map(|&b| b as u16).sum();
    (!sum & 0xFF) as u8
}

fn build_packet(id: u8, instruction: Instruction, params: &[u8]) -> Vec<u8> {
    let length = (params.len() + 2) as u8; // instruction + checksum
    let mut packet = Vec::with_capacity(6 + params.len());

    packet.extend_from_slice(&HEADER);
    packet.push(id);
    packet.push(length);
    packet.push(instruction as u8);
    packet.extend_from_slice(params);
    packet.push(checksum(&packet[2..]));

    packet
}

/// Map a duty cycle in [0, 1] onto the board's 16-bit duty register
fn duty_to_raw(duty_cycle: f32) -> u16 {
    (duty_cycle * u16::MAX as f32).round() as u16
}

/// Connection to the H-bridge driver board.
pub struct DriveBoard {
    port: Box<dyn SerialPort>,
    board_id: u8,
}

impl DriveBoard {
    /// Open the serial link and verify the board answers a ping.
    pub fn open(port_name: &str, board_id: u8) -> Result<Self, BridgeError> {
        info!("Opening driver board on {}", port_name);
        let port = serialport::new(port_name, DEFAULT_BAUDRATE)
            .timeout(Duration::from_millis(DEFAULT_TIMEOUT_MS))
            .open()?;

        let mut board = Self { port, board_id };
        if !board.ping()? {
            return Err(BridgeError::Timeout);
        }
        debug!("Board {} responding", board_id);
        Ok(board)
    }

    fn send_packet(&mut self, packet: &[u8]) -> Result<(), BridgeError> {
        self.port.write_all(packet)?;
        self.port.flush()?;
        Ok(())
    }

    /// Read and verify one status packet.
    fn read_status(&mut self) -> Result<(), BridgeError> {
        let mut head = [0u8; 4];
        self.port.read_exact(&mut head).map_err(|e| {
            if e.kind() == std::io::ErrorKind::TimedOut {
                BridgeError::Timeout
            } else {
                BridgeError::Io(e)
            }
        })?;

        if head[0..2] != HEADER {
            return Err(BridgeError::InvalidResponse(format!(
                "bad header {:02X?}",
                &head[0..2]
            )));
        }
        if head[2] != self.board_id {
            return Err(BridgeError::InvalidResponse(format!(
                "unexpected board id {}",
                head[2]
            )));
        }

        // Error byte, optional params, checksum
        let length = head[3] as usize;
        if length < 2 {
            return Err(BridgeError::InvalidResponse(format!("bad length {length}")));
        }
        let mut rest = vec![0u8; length];
        self.port.read_exact(&mut rest)?;

        let mut summed = vec![head[2], head[3]];
        summed.extend_from_slice(&rest[..length - 1]);
        if checksum(&summed) != rest[length - 1] {
            return Err(BridgeError::ChecksumMismatch);
        }

        let status = rest[0];
        if status != 0 {
            return Err(BridgeError::BoardError(status));
        }
        Ok(())
    }

    /// Check that the board is reachable
    pub fn ping(&mut self) -> Result<bool, BridgeError> {
        let packet = build_packet(self.board_id, Instruction::Ping, &[]);
        self.send_packet(&packet)?;

        match self.read_status() {
            Ok(()) => Ok(true),
            Err(BridgeError::Timeout) => Ok(false),
            Err(e) => Err(e),
        }
    }

    fn write_u8(&mut self, register: Register, value: u8) -> Result<(), BridgeError> {
        let params = [register as u8, value];
        let packet = build_packet(self.board_id, Instruction::Write, &params);
        debug!("Write u8: reg={:?}, value={}", register, value);
        self.send_packet(&packet)?;
        self.read_status()
    }

    fn write_u16(&mut self, register: Register, value: u16) -> Result<(), BridgeError> {
        let params = [register as u8, (value & 0xFF) as u8, (value >> 8) as u8];
        let packet = build_packet(self.board_id, Instruction::Write, &params);
        debug!("Write u16: reg={:?}, value={}", register, value);
        self.send_packet(&packet)?;
        self.read_status()
    }
}

impl MotorDriver for DriveBoard {
    fn apply(&mut self, duty_cycle: f32, mode: RunMode) -> Result<(), BridgeError> {
        self.write_u8(Register::RunMode, mode as u8)?;
        self.write_u16(Register::DutyCycle, duty_to_raw(duty_cycle))
    }
}
