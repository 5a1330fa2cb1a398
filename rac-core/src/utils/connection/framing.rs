//! Marker-delimited framing for byte-stream transports (UART).
//!
//! A frame is `AA BB CC <payload> DD EE FF`. The decoder is fed one byte at a
//! time from the receive interrupt and hands back a [`Frame`] whenever an end
//! marker completes. Noise between frames is discarded; a frame whose payload
//! outgrows the buffer is dropped whole.
//!
//! Marker matching is strict: a byte that breaks a partial match resets the
//! match index and is not itself re-tested as the first marker byte.

use heapless::Vec;

/// Start-of-frame marker.
pub const START_MARKER: [u8; 3] = [0xAA, 0xBB, 0xCC];
/// End-of-frame marker.
pub const END_MARKER: [u8; 3] = [0xDD, 0xEE, 0xFF];
pub const MARKER_LEN: usize = START_MARKER.len();

/// Receive buffer size. The end marker is written into the buffer too, so
/// the largest deliverable payload is `DATA_BUFFER_SIZE - MARKER_LEN`.
pub const DATA_BUFFER_SIZE: usize = 512;

/// A complete payload, copied out of the decoder.
#[derive(Clone, Copy)]
pub struct Frame {
    len: usize,
    bytes: [u8; DATA_BUFFER_SIZE],
}

impl Frame {
    /// Copy `payload` into a frame; bytes past the buffer size are cut off.
    pub fn new(payload: &[u8]) -> Self {
        let len = payload.len().min(DATA_BUFFER_SIZE);
        let mut bytes = [0; DATA_BUFFER_SIZE];
        bytes[..len].copy_from_slice(&payload[..len]);
        Self { len, bytes }
    }

    pub fn payload(&self) -> &[u8] {
        &self.bytes[..self.len]
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}

impl core::fmt::Debug for Frame {
    fn fmt(
        &self,
        f: &mut core::fmt::Formatter<'_>,
    ) -> core::fmt::Result {
        f.debug_struct("Frame")
            .field("len", &self.len)
            .field("payload", &self.payload())
            .finish()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum State {
    WaitingForStart,
    ReceivingData,
}

/// Byte-at-a-time frame decoder. One per transport.
pub struct FrameDecoder {
    state: State,
    marker_idx: usize,
    buffer: Vec<u8, DATA_BUFFER_SIZE>,
}

impl Default for FrameDecoder {
    fn default() -> Self {
        Self::new()
    }
}

impl FrameDecoder {
    pub const fn new() -> Self {
        Self {
            state: State::WaitingForStart,
            marker_idx: 0,
            buffer: Vec::new(),
        }
    }

    pub fn state(&self) -> State {
        self.state
    }

    /// Process a single incoming byte. Returns `Some(Frame)` when this byte
    /// completes the end marker.
    pub fn push(
        &mut self,
        byte: u8,
    ) -> Option<Frame> {
        match self.state {
            State::WaitingForStart => {
                if byte == START_MARKER[self.marker_idx] {
                    self.marker_idx += 1;
                    if self.marker_idx >= MARKER_LEN {
                        self.state = State::ReceivingData;
                        self.marker_idx = 0;
                        self.buffer.clear();
                    }
                } else {
                    self.marker_idx = 0;
                }
                None
            }
            State::ReceivingData => {
                if self.buffer.push(byte).is_err() {
                    tracing::trace!("frame overflowed receive buffer, dropped");
                    self.reset();
                    return None;
                }

                if byte == END_MARKER[self.marker_idx] {
                    self.marker_idx += 1;
                    if self.marker_idx >= MARKER_LEN {
                        let len = self.buffer.len() - MARKER_LEN;
                        let frame = Frame::new(&self.buffer[..len]);
                        self.reset();
                        return Some(frame);
                    }
                } else {
                    self.marker_idx = 0;
                }
                None
            }
        }
    }

    /// Drop any partial frame and wait for the next start marker.
    pub fn reset(&mut self) {
        self.state = State::WaitingForStart;
        self.marker_idx = 0;
        self.buffer.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn feed(
        decoder: &mut FrameDecoder,
        bytes: &[u8],
    ) -> Option<Frame> {
        let mut last = None;
        for &b in bytes {
            if let Some(frame) = decoder.push(b) {
                last = Some(frame);
            }
        }
        last
    }

    #[test]
    fn test_simple_frame() {
        let mut decoder = FrameDecoder::new();
        let frame = feed(
            &mut decoder,
            &[0xAA, 0xBB, 0xCC, 0x01, 0x02, 0x03, 0xDD, 0xEE, 0xFF],
        )
        .unwrap();
        assert_eq!(frame.payload(), &[0x01, 0x02, 0x03]);
        assert_eq!(frame.len(), 3);
        assert_eq!(decoder.state(), State::WaitingForStart);
    }

    #[test]
    fn test_noise_before_frame_is_ignored() {
        let mut decoder = FrameDecoder::new();
        let frame = feed(
            &mut decoder,
            &[0x00, 0xAA, 0x13, 0xAA, 0xBB, 0xCC, 0x42, 0xDD, 0xEE, 0xFF],
        )
        .unwrap();
        assert_eq!(frame.payload(), &[0x42]);
    }

    #[test]
    fn test_mismatching_byte_is_not_rechecked() {
        // The second AA breaks the match and is discarded, so BB CC never
        // complete a start marker.
        let mut decoder = FrameDecoder::new();
        let frame = feed(
            &mut decoder,
            &[0xAA, 0xAA, 0xBB, 0xCC, 0x01, 0xDD, 0xEE, 0xFF],
        );
        assert!(frame.is_none());
        assert_eq!(decoder.state(), State::WaitingForStart);
    }

    #[test]
    fn test_partial_end_marker_stays_in_payload() {
        let mut decoder = FrameDecoder::new();
        let frame = feed(
            &mut decoder,
            &[0xAA, 0xBB, 0xCC, 0xDD, 0xEE, 0x05, 0xDD, 0xEE, 0xFF],
        )
        .unwrap();
        assert_eq!(frame.payload(), &[0xDD, 0xEE, 0x05]);
    }

    #[test]
    fn test_empty_payload() {
        let mut decoder = FrameDecoder::new();
        let frame = feed(&mut decoder, &[0xAA, 0xBB, 0xCC, 0xDD, 0xEE, 0xFF]).unwrap();
        assert!(frame.is_empty());
    }

    #[test]
    fn test_largest_payload_fits() {
        let mut decoder = FrameDecoder::new();
        feed(&mut decoder, &START_MARKER);
        for _ in 0..DATA_BUFFER_SIZE - MARKER_LEN {
            assert!(decoder.push(0x11).is_none());
        }
        let frame = feed(&mut decoder, &END_MARKER).unwrap();
        assert_eq!(frame.len(), DATA_BUFFER_SIZE - MARKER_LEN);
    }

    #[test]
    fn test_overflow_drops_frame_and_recovers() {
        let mut decoder = FrameDecoder::new();
        feed(&mut decoder, &START_MARKER);
        for _ in 0..DATA_BUFFER_SIZE {
            assert!(decoder.push(0x11).is_none());
        }
        // Buffer is full: the next byte drops the frame.
        assert!(decoder.push(0x11).is_none());
        assert_eq!(decoder.state(), State::WaitingForStart);
        // The tail of the oversized frame is noise now.
        assert!(feed(&mut decoder, &END_MARKER).is_none());

        let frame = feed(
            &mut decoder,
            &[0xAA, 0xBB, 0xCC, 0x07, 0xDD, 0xEE, 0xFF],
        )
        .unwrap();
        assert_eq!(frame.payload(), &[0x07]);
    }

    #[test]
    fn test_back_to_back_frames() {
        let mut decoder = FrameDecoder::new();
        let mut frames = 0;
        for &b in [0xAA, 0xBB, 0xCC, 0x01, 0xDD, 0xEE, 0xFF]
            .iter()
            .chain([0xAA, 0xBB, 0xCC, 0x02, 0xDD, 0xEE, 0xFF].iter())
        {
            if let Some(frame) = decoder.push(b) {
                frames += 1;
                assert_eq!(frame.payload(), &[frames as u8]);
            }
        }
        assert_eq!(frames, 2);
    }
}
