//! Protocol codec errors and stream framing
//!
//! Packets carry their own total length, so a byte stream is split into
//! packets by reading the header and waiting for `length` bytes.

use bytes::BytesMut;
use thiserror::Error;

use super::{checksum, Packet, HEADER_SIZE, MIN_PACKET_SIZE};

/// Codec errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CodecError {
    #[error("Malformed header: need {min} bytes, got {0}", min = HEADER_SIZE)]
    MalformedHeader(usize),

    #[error("Truncated packet: header declares {expected} bytes, got {actual}")]
    TruncatedPacket { expected: usize, actual: usize },

    #[error("Invalid length field: {0} (minimum is {min})", min = MIN_PACKET_SIZE)]
    InvalidLength(u8),

    #[error("Invalid payload size: expected {expected} bytes, got {actual}")]
    InvalidPayloadSize { expected: usize, actual: usize },

    #[error("Payload too large: {0} bytes (max: {max})", max = super::MAX_PAYLOAD_SIZE)]
    PayloadTooLarge(usize),
}

/// A received packet with its checksum verdict
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub packet: Packet,
    /// Whether the trailing checksum matched the bytes ahead of it
    pub checksum_valid: bool,
}

impl Frame {
    /// Parse a frame from a buffer holding exactly one packet
    pub fn parse(raw: &[u8]) -> Result<Self, CodecError> {
        let packet = Packet::parse(raw)?;
        let checksum_valid = checksum::verify(raw, packet.length() as usize - 1);
        Ok(Self {
            packet,
            checksum_valid,
        })
    }
}

/// Splits a byte stream into packets
#[derive(Debug, Default)]
pub struct PacketDecoder {
    decoded: u64,
}

impl PacketDecoder {
    pub fn new() -> Self {
        Self { decoded: 0 }
    }

    /// Attempt to decode a frame from the buffer
    /// Returns Ok(None) if more data is needed
    pub fn decode(&mut self, buf: &mut BytesMut) -> Result<Option<Frame>, CodecError> {
        if buf.len() < HEADER_SIZE {
            return Ok(None);
        }

        let length = buf[3];
        if (length as usize) < MIN_PACKET_SIZE {
            // The stream cannot be resynchronised past a bad length
            buf.clear();
            return Err(CodecError::InvalidLength(length));
        }

        if buf.len() < length as usize {
            return Ok(None);
        }

        let raw = buf.split_to(length as usize);
        let frame = Frame::parse(&raw)?;
        self.decoded += 1;
        Ok(Some(frame))
    }

    /// Decode a single datagram, ignoring bytes past the declared length
    pub fn decode_datagram(&mut self, datagram: &[u8]) -> Result<Frame, CodecError> {
        let frame = Frame::parse(datagram)?;
        self.decoded += 1;
        Ok(frame)
    }

    /// Number of packets decoded so far
    pub fn decoded(&self) -> u64 {
        self.decoded
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::{Command, DriveBody, Direction};

    fn drive_packet(count: u16) -> Packet {
        let mut packet = Packet::new();
        packet.set_packet_count(count);
        packet.set_drive(DriveBody::new(Direction::Forward, 2, 90));
        packet
    }

    #[test]
    fn test_decode_split_stream() {
        let mut decoder = PacketDecoder::new();
        let bytes = drive_packet(7).serialize();
        let mut buf = BytesMut::new();

        buf.extend_from_slice(&bytes[..3]);
        assert!(decoder.decode(&mut buf).unwrap().is_none());

        buf.extend_from_slice(&bytes[3..6]);
        assert!(decoder.decode(&mut buf).unwrap().is_none());

        buf.extend_from_slice(&bytes[6..]);
        let frame = decoder.decode(&mut buf).unwrap().unwrap();
        assert!(frame.checksum_valid);
        assert_eq!(frame.packet.packet_count(), 7);
        assert_eq!(frame.packet.command(), Command::Drive);
        assert!(buf.is_empty());
    }

    #[test]
    fn test_multiple_packets() {
        let mut decoder = PacketDecoder::new();
        let mut buf = BytesMut::new();

        for count in 1..=3u16 {
            buf.extend_from_slice(&drive_packet(count).serialize());
        }

        for count in 1..=3u16 {
            let frame = decoder.decode(&mut buf).unwrap().unwrap();
            assert_eq!(frame.packet.packet_count(), count);
        }
        assert!(decoder.decode(&mut buf).unwrap().is_none());
        assert_eq!(decoder.decoded(), 3);
    }

    #[test]
    fn test_corrupted_frame_is_flagged() {
        let mut decoder = PacketDecoder::new();
        let mut bytes = drive_packet(1).serialize();
        bytes[5] ^= 0x01;
        let mut buf = BytesMut::from(&bytes[..]);

        let frame = decoder.decode(&mut buf).unwrap().unwrap();
        assert!(!frame.checksum_valid);
    }

    #[test]
    fn test_invalid_length_clears_buffer() {
        let mut decoder = PacketDecoder::new();
        let mut buf = BytesMut::from(&[0x00, 0x01, 0x80, 0x03, 0xAA][..]);

        assert_eq!(decoder.decode(&mut buf), Err(CodecError::InvalidLength(3)));
        assert!(buf.is_empty());
    }

    #[test]
    fn test_datagram_trailing_bytes_ignored() {
        let mut decoder = PacketDecoder::new();
        let mut datagram = drive_packet(9).serialize();
        datagram.extend_from_slice(&[0u8; 16]);

        let frame = decoder.decode_datagram(&datagram).unwrap();
        assert!(frame.checksum_valid);
        assert_eq!(frame.packet.payload(), &[0x01, 0x02, 0x5A]);
    }
}
