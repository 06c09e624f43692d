// Link-layer reassembly: CAN-sized frames in, complete protocol payloads
// out.
//
// Frame layout: one control byte followed by up to 7 payload bytes.
//   bit 7      final-fragment flag
//   bits 0..6  fragment sequence number, starting at 0
//
// Frames of one message arrive in order and never interleave with another
// message (single in-flight message per source), so a single expected
// sequence number is all the state the machine needs.

use tracing::warn;

/// Largest link frame, control byte included
pub const MAX_FRAME_LEN: usize = 8;

/// Payload bytes carried per frame
pub const FRAME_CHUNK_LEN: usize = MAX_FRAME_LEN - 1;

/// Accumulations past this size are dropped as corrupt
pub const MAX_MESSAGE_LEN: usize = 64;

const FINAL_FLAG: u8 = 0x80;
const SEQ_MASK: u8 = 0x7F;

enum Phase {
    Idle,
    Accumulating { next_seq: u8 },
}

/// Two-state reassembly machine. Completed payloads are handed out by
/// [`FrameReassembler::poll_ready`] exactly once each; every failure mode
/// resets to Idle and bumps the drop counter instead of propagating.
pub struct FrameReassembler {
    phase: Phase,
    buf: Vec<u8>,
    ready: Option<Vec<u8>>,
    drops: u64,
}

impl FrameReassembler {
    pub fn new() -> Self {
        Self {
            phase: Phase::Idle,
            buf: Vec::with_capacity(MAX_MESSAGE_LEN),
            ready: None,
            drops: 0,
        }
    }

    /// Feed one link frame in arrival order.
    pub fn ingest(&mut self, frame: &[u8]) {
        if frame.is_empty() || frame.len() > MAX_FRAME_LEN {
            self.drop_partial("bad frame length");
            return;
        }

        let seq = frame[0] & SEQ_MASK;
        let is_final = frame[0] & FINAL_FLAG != 0;

        match self.phase {
            Phase::Accumulating { next_seq } if seq == next_seq => {}
            _ if seq == 0 => {
                // A sequence-0 frame always starts a message; anything
                // partial is stale (e.g. its final fragment was lost).
                if matches!(self.phase, Phase::Accumulating { .. }) {
                    self.drop_partial("new message started mid-accumulation");
                }
                self.buf.clear();
            }
            _ => {
                self.drop_partial("unexpected fragment sequence");
                return;
            }
        }

        self.buf.extend_from_slice(&frame[1..]);
        if self.buf.len() > MAX_MESSAGE_LEN {
            self.drop_partial("message too long");
            return;
        }

        if is_final {
            self.ready = Some(std::mem::take(&mut self.buf));
            self.phase = Phase::Idle;
        } else {
            self.phase = Phase::Accumulating { next_seq: seq + 1 };
        }
    }

    /// Take the completed payload, if any. Each message is observable here
    /// exactly once; if a second message completes before the first is
    /// polled, the newer one wins.
    pub fn poll_ready(&mut self) -> Option<Vec<u8>> {
        self.ready.take()
    }

    /// Frames or partial messages discarded since startup
    pub fn drops(&self) -> u64 {
        self.drops
    }

    fn drop_partial(&mut self, reason: &str) {
        self.drops += 1;
        warn!("dropping frame accumulation: {}", reason);
        self.buf.clear();
        self.phase = Phase::Idle;
    }
}

impl Default for FrameReassembler {
    fn default() -> Self {
        Self::new()
    }
}

/// Sender side: split a payload into the frame sequence [`FrameReassembler::ingest`]
/// expects. The last frame carries the final flag.
pub fn fragment(payload: &[u8]) -> Vec<Vec<u8>> {
    let mut frames: Vec<Vec<u8>> = payload
        .chunks(FRAME_CHUNK_LEN)
        .enumerate()
        .map(|(seq, chunk)| {
            let mut frame = Vec::with_capacity(1 + chunk.len());
            frame.push(seq as u8);
            frame.extend_from_slice(chunk);
            frame
        })
        .collect();

    if frames.is_empty() {
        frames.push(vec![0]);
    }
    if let Some(last) = frames.last_mut() {
        last[0] |= FINAL_FLAG;
    }
    frames
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Like [`fragment`] but with a caller-chosen chunk size
    fn frames_of(payload: &[u8], chunk_len: usize) -> Vec<Vec<u8>> {
        let mut frames: Vec<Vec<u8>> = payload
            .chunks(chunk_len)
            .enumerate()
            .map(|(seq, chunk)| {
                let mut frame = vec![seq as u8];
                frame.extend_from_slice(chunk);
                frame
            })
            .collect();
        frames.last_mut().unwrap()[0] |= FINAL_FLAG;
        frames
    }

    const PAYLOAD: [u8; 9] = [2, 1, 3, 0xAA, 0xBB, 0xCC, 0xDD, 0xEE, 0xFF];

    #[test]
    fn round_trip_over_every_split() {
        for chunk_len in 1..=FRAME_CHUNK_LEN {
            let mut reassembler = FrameReassembler::new();
            for frame in frames_of(&PAYLOAD, chunk_len) {
                reassembler.ingest(&frame);
            }

            assert_eq!(
                reassembler.poll_ready().as_deref(),
                Some(&PAYLOAD[..]),
                "chunk_len {chunk_len}"
            );
            assert_eq!(reassembler.poll_ready(), None);
            assert_eq!(reassembler.drops(), 0);
        }
    }

    #[test]
    fn fragment_round_trip() {
        let mut reassembler = FrameReassembler::new();
        let frames = fragment(&PAYLOAD);
        assert_eq!(frames.len(), 2); // 7 + 2 bytes

        for frame in &frames {
            assert!(frame.len() <= MAX_FRAME_LEN);
            reassembler.ingest(frame);
        }
        assert_eq!(reassembler.poll_ready().as_deref(), Some(&PAYLOAD[..]));
    }

    #[test]
    fn single_frame_message() {
        let mut reassembler = FrameReassembler::new();
        for frame in fragment(&[1, 2, 3]) {
            reassembler.ingest(&frame);
        }
        assert_eq!(reassembler.poll_ready(), Some(vec![1, 2, 3]));
    }

    #[test]
    fn stray_fragment_is_dropped() {
        let mut reassembler = FrameReassembler::new();
        reassembler.ingest(&[3, 0xAA]); // mid-message fragment, no message open

        assert_eq!(reassembler.poll_ready(), None);
        assert_eq!(reassembler.drops(), 1);
    }

    #[test]
    fn oversized_accumulation_is_dropped_and_recovers() {
        let mut reassembler = FrameReassembler::new();

        // 10 full non-final frames: 70 bytes, past the 64-byte cap
        for seq in 0..10u8 {
            let mut frame = vec![seq];
            frame.extend_from_slice(&[0u8; FRAME_CHUNK_LEN]);
            reassembler.ingest(&frame);
        }
        assert_eq!(reassembler.poll_ready(), None);
        assert_eq!(reassembler.drops(), 1);

        // The machine is back in Idle and accepts the next message
        for frame in fragment(&PAYLOAD) {
            reassembler.ingest(&frame);
        }
        assert_eq!(reassembler.poll_ready().as_deref(), Some(&PAYLOAD[..]));
    }

    #[test]
    fn resyncs_when_final_fragment_was_lost() {
        let mut reassembler = FrameReassembler::new();

        // First fragment of a message whose tail never arrives
        reassembler.ingest(&[0, 1, 2, 3]);

        // Next message begins; the stale partial is discarded
        for frame in fragment(&PAYLOAD) {
            reassembler.ingest(&frame);
        }
        assert_eq!(reassembler.poll_ready().as_deref(), Some(&PAYLOAD[..]));
        assert_eq!(reassembler.drops(), 1);
    }

    #[test]
    fn unpolled_message_is_replaced_by_newer_one() {
        let mut reassembler = FrameReassembler::new();
        for frame in fragment(&[1, 1, 1]) {
            reassembler.ingest(&frame);
        }
        for frame in fragment(&[2, 2, 2]) {
            reassembler.ingest(&frame);
        }

        assert_eq!(reassembler.poll_ready(), Some(vec![2, 2, 2]));
        assert_eq!(reassembler.poll_ready(), None);
    }

    #[test]
    fn empty_frame_is_dropped() {
        let mut reassembler = FrameReassembler::new();
        reassembler.ingest(&[]);
        assert_eq!(reassembler.drops(), 1);
        assert_eq!(reassembler.poll_ready(), None);
    }
}
