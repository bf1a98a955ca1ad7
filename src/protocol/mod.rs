//! Protocol module - Defines the wire protocol spoken with the robot
//!
//! Every packet is a fixed 4 byte header, an optional payload and a
//! trailing checksum byte:
//! - 2 bytes packet count (big-endian)
//! - 1 byte flags (Drive, Status, Sleep, Ack, 4 padding bits)
//! - 1 byte total length (header + payload + checksum)
//! - Variable length payload
//! - 1 byte checksum (count of set bits in everything before it)

mod body;
mod codec;
mod header;
mod packet;

pub mod checksum;

pub use body::*;
pub use codec::*;
pub use header::*;
pub use packet::*;

/// Size of the fixed header in bytes
pub const HEADER_SIZE: usize = 4;

/// Size of the trailing checksum in bytes
pub const CHECKSUM_SIZE: usize = 1;

/// Smallest valid packet: a header followed by a checksum
pub const MIN_PACKET_SIZE: usize = HEADER_SIZE + CHECKSUM_SIZE;

/// Largest packet the 8-bit length field can describe
pub const MAX_PACKET_SIZE: usize = u8::MAX as usize;

/// Largest payload that fits in a single packet
pub const MAX_PAYLOAD_SIZE: usize = MAX_PACKET_SIZE - MIN_PACKET_SIZE;

/// Default port the robot listens on
pub const DEFAULT_PORT: u16 = 5000;
