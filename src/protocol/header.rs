//! Packet header
//!
//! The header is four bytes: a big-endian packet count, a flags byte and
//! the total packet length. The three command bits are mutually exclusive,
//! so in memory they are held as a single [`Command`].

use std::fmt;

use serde::{Deserialize, Serialize};

use super::{CodecError, HEADER_SIZE};

/// Flag bit for a drive command
pub const FLAG_DRIVE: u8 = 0x80;
/// Flag bit for a status/response packet
pub const FLAG_STATUS: u8 = 0x40;
/// Flag bit for a sleep command
pub const FLAG_SLEEP: u8 = 0x20;
/// Acknowledgement flag, set by the responder
pub const FLAG_ACK: u8 = 0x10;
/// Reserved low nibble of the flags byte
pub const PADDING_MASK: u8 = 0x0F;

const COMMAND_MASK: u8 = FLAG_DRIVE | FLAG_STATUS | FLAG_SLEEP;

/// Command carried by a packet
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Command {
    /// Move the robot (payload is a drive body)
    Drive,
    /// Put the robot to sleep
    Sleep,
    /// Status report, or a request for one
    #[default]
    Response,
}

impl Command {
    /// The flag bit this command occupies on the wire
    pub fn flag(self) -> u8 {
        match self {
            Command::Drive => FLAG_DRIVE,
            Command::Sleep => FLAG_SLEEP,
            Command::Response => FLAG_STATUS,
        }
    }

    /// Resolve a flags byte to a command.
    ///
    /// Drive takes precedence over Sleep, and a byte with no command bit
    /// set falls back to `Response`.
    pub fn from_flags(flags: u8) -> Self {
        if flags & FLAG_DRIVE != 0 {
            Command::Drive
        } else if flags & FLAG_SLEEP != 0 {
            Command::Sleep
        } else {
            Command::Response
        }
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Command::Drive => "DRIVE",
            Command::Sleep => "SLEEP",
            Command::Response => "RESPONSE",
        };
        f.write_str(name)
    }
}

/// Decoded packet header
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Header {
    /// Sequence number
    pub packet_count: u16,
    /// Command tag
    pub command: Command,
    /// Acknowledgement flag
    pub ack: bool,
    /// Reserved bits, kept as received
    pub padding: u8,
    /// Total packet length including header and checksum
    pub length: u8,
    /// Flags byte as received, kept only when it did not carry exactly one
    /// command bit
    ambiguous_flags: Option<u8>,
}

impl Header {
    /// Decode a header from the start of `bytes`
    pub fn decode(bytes: &[u8]) -> Result<Self, CodecError> {
        if bytes.len() < HEADER_SIZE {
            return Err(CodecError::MalformedHeader(bytes.len()));
        }

        let flags = bytes[2];
        let ambiguous = (flags & COMMAND_MASK).count_ones() != 1;
        Ok(Self {
            packet_count: u16::from_be_bytes([bytes[0], bytes[1]]),
            command: Command::from_flags(flags),
            ack: flags & FLAG_ACK != 0,
            padding: flags & PADDING_MASK,
            length: bytes[3],
            ambiguous_flags: ambiguous.then_some(flags),
        })
    }

    /// Encode the header into its wire layout
    pub fn encode(&self) -> [u8; HEADER_SIZE] {
        let count = self.packet_count.to_be_bytes();
        [count[0], count[1], self.flags(), self.length]
    }

    /// The flags byte as it will be written
    pub fn flags(&self) -> u8 {
        let mut flags = self.command.flag() | (self.padding & PADDING_MASK);
        if self.ack {
            flags |= FLAG_ACK;
        }
        flags
    }

    /// Replace the command tag, clearing the other two
    pub fn set_command(&mut self, command: Command) {
        self.command = command;
        self.ambiguous_flags = None;
    }

    /// The flags byte as decoded.
    ///
    /// Differs from [`Header::flags`] only for an ambiguous header that has
    /// not had its command replaced.
    pub fn raw_flags(&self) -> u8 {
        self.ambiguous_flags.unwrap_or_else(|| self.flags())
    }

    /// True if the flags byte carries the Status bit, alone or not
    pub fn has_status(&self) -> bool {
        self.raw_flags() & FLAG_STATUS != 0
    }

    /// True if the decoded flags byte carried zero or several command bits.
    ///
    /// `command` then holds the fallback resolution from [`Command::from_flags`].
    pub fn has_ambiguous_command(&self) -> bool {
        self.ambiguous_flags.is_some()
    }
}
