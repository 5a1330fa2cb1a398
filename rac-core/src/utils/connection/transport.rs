//! Receive-interrupt entry points.
//!
//! Each transport owns its decoding state and the [`Producer`] end of a
//! [`CommandQueue`](crate::utils::connection::queue::CommandQueue). Nothing here blocks or allocates. When the consumer has
//! fallen behind and the queue is full, the new item is dropped and logged;
//! queued items are never overwritten.

use crate::utils::{
    connection::{
        framing::{Frame, FrameDecoder},
        queue::Producer,
    },
    controllers::command::{RawCommand, COMMAND_SIZE},
};

/// Marker-framed byte stream (UART).
pub struct UartReceiver<'a, const N: usize> {
    decoder: FrameDecoder,
    frames: Producer<'a, Frame, N>,
}

impl<'a, const N: usize> UartReceiver<'a, N> {
    pub const fn new(frames: Producer<'a, Frame, N>) -> Self {
        Self {
            decoder: FrameDecoder::new(),
            frames,
        }
    }

    /// Feed one received byte. Returns `true` if it completed a frame that
    /// was queued.
    pub fn on_byte(
        &mut self,
        byte: u8,
    ) -> bool {
        let Some(frame) = self.decoder.push(byte) else {
            return false;
        };
        match self.frames.try_push(frame) {
            Ok(()) => true,
            Err(frame) => {
                tracing::warn!(len = frame.len(), "frame queue full, frame dropped");
                false
            }
        }
    }

    /// Feed a whole receive buffer. Returns the number of frames queued.
    pub fn on_bytes(
        &mut self,
        bytes: &[u8],
    ) -> usize {
        bytes.iter().filter(|&&b| self.on_byte(b)).count()
    }

    pub fn decoder(&self) -> &FrameDecoder {
        &self.decoder
    }
}

/// Pre-framed transport (SPI): every transfer is one 8-byte record.
pub struct SpiReceiver<'a, const N: usize> {
    records: Producer<'a, RawCommand, N>,
}

impl<'a, const N: usize> SpiReceiver<'a, N> {
    pub const fn new(records: Producer<'a, RawCommand, N>) -> Self {
        Self { records }
    }

    /// Queue one completed transfer. Returns `false` if it was dropped.
    pub fn on_transfer(
        &mut self,
        bytes: &[u8; COMMAND_SIZE],
    ) -> bool {
        let raw = RawCommand::from_bytes(bytes);
        if self.records.try_push(raw).is_err() {
            tracing::warn!(tag = raw.tag, "record queue full, record dropped");
            return false;
        }
        true
    }
}
