//! Command transport.
//!
//! - `framing`: marker-delimited frame decoder for byte streams
//! - `queue`: lock-free SPSC handoff from interrupt to polling context
//! - `transport`: receive-interrupt entry points feeding the queues

pub mod framing;
pub mod queue;
pub mod transport;

pub use framing::{Frame, FrameDecoder};
pub use queue::{CommandQueue, Consumer, Producer};
pub use transport::{SpiReceiver, UartReceiver};
