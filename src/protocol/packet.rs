//! Packet definition
//!
//! A [`Packet`] owns its header, payload and checksum. Mutators keep the
//! length field and checksum in step with the payload, so a packet can be
//! serialized at any point.

use bytes::{BufMut, BytesMut};

use super::{
    checksum, CodecError, Command, DriveBody, Header, Telemetry, CHECKSUM_SIZE, HEADER_SIZE,
    MAX_PAYLOAD_SIZE, MIN_PACKET_SIZE, TELEMETRY_SIZE,
};

/// A single protocol packet
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Packet {
    header: Header,
    payload: Vec<u8>,
    checksum: u8,
    telemetry: Option<Telemetry>,
}

impl Packet {
    /// Create an empty packet: count 0, no flags beyond the command, no payload
    pub fn new() -> Self {
        let mut header = Header::default();
        header.length = MIN_PACKET_SIZE as u8;

        let mut packet = Self {
            header,
            payload: Vec::new(),
            checksum: 0,
            telemetry: None,
        };
        packet.seal();
        packet
    }

    /// Parse a packet from a received buffer.
    ///
    /// Bytes past the declared length are ignored. The checksum is stored
    /// as received and not verified here; see [`Packet::verify`].
    pub fn parse(raw: &[u8]) -> Result<Self, CodecError> {
        let header = Header::decode(raw)?;
        let length = header.length as usize;

        if length < MIN_PACKET_SIZE {
            return Err(CodecError::InvalidLength(header.length));
        }
        if raw.len() < length {
            return Err(CodecError::TruncatedPacket {
                expected: length,
                actual: raw.len(),
            });
        }

        let payload = raw[HEADER_SIZE..length - CHECKSUM_SIZE].to_vec();
        let telemetry = if header.has_status() && payload.len() == TELEMETRY_SIZE {
            Telemetry::decode(&payload).ok()
        } else {
            None
        };

        Ok(Self {
            header,
            payload,
            checksum: raw[length - CHECKSUM_SIZE],
            telemetry,
        })
    }

    /// Check the checksum of a received buffer against its declared length
    pub fn verify(raw: &[u8]) -> bool {
        match raw.get(3) {
            Some(&length) if length as usize >= MIN_PACKET_SIZE => {
                checksum::verify(raw, length as usize - CHECKSUM_SIZE)
            }
            _ => false,
        }
    }

    /// Replace the command tag. A telemetry record only survives on a
    /// `Response` packet.
    pub fn set_command(&mut self, command: Command) {
        self.header.set_command(command);
        if command != Command::Response {
            self.telemetry = None;
        }
        self.seal();
    }

    /// Replace the payload and recompute the length field.
    ///
    /// Fails without touching the packet if the payload cannot be described
    /// by the 8-bit length field.
    pub fn set_payload(&mut self, payload: &[u8]) -> Result<(), CodecError> {
        if payload.len() > MAX_PAYLOAD_SIZE {
            return Err(CodecError::PayloadTooLarge(payload.len()));
        }

        self.replace_payload(payload.to_vec());
        self.telemetry = None;
        Ok(())
    }

    pub fn set_packet_count(&mut self, count: u16) {
        self.header.packet_count = count;
        self.seal();
    }

    pub fn set_ack(&mut self, ack: bool) {
        self.header.ack = ack;
        self.seal();
    }

    /// Set the reserved bits; only the low nibble is kept
    pub fn set_padding(&mut self, padding: u8) {
        self.header.padding = padding & super::PADDING_MASK;
        self.seal();
    }

    /// Turn this into a drive command carrying `body`
    pub fn set_drive(&mut self, body: DriveBody) {
        self.header.set_command(Command::Drive);
        self.replace_payload(body.encode().to_vec());
        self.telemetry = None;
    }

    /// Turn this into a status packet carrying a telemetry record
    pub fn set_telemetry(
        &mut self,
        last_packet_counter: u16,
        current_grade: u16,
        hit_count: u16,
        last_command: u8,
        last_command_value: u8,
        last_command_speed: u8,
    ) {
        self.set_telemetry_record(Telemetry {
            last_packet_counter,
            current_grade,
            hit_count,
            last_command,
            last_command_value,
            last_command_speed,
        });
    }

    pub fn set_telemetry_record(&mut self, telemetry: Telemetry) {
        self.header.set_command(Command::Response);
        self.replace_payload(telemetry.encode().to_vec());
        self.telemetry = Some(telemetry);
    }

    pub fn command(&self) -> Command {
        self.header.command
    }

    pub fn ack(&self) -> bool {
        self.header.ack
    }

    pub fn length(&self) -> u8 {
        self.header.length
    }

    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    pub fn packet_count(&self) -> u16 {
        self.header.packet_count
    }

    pub fn padding(&self) -> u8 {
        self.header.padding
    }

    pub fn header(&self) -> &Header {
        &self.header
    }

    /// The checksum this packet carries: as received for a parsed packet
    /// that has not been modified, otherwise the one it will be sent with
    pub fn checksum(&self) -> u8 {
        self.checksum
    }

    pub fn has_telemetry(&self) -> bool {
        self.telemetry.is_some()
    }

    pub fn telemetry(&self) -> Option<Telemetry> {
        self.telemetry
    }

    /// The drive body, if this is a drive command with a well-formed payload
    pub fn drive_body(&self) -> Option<DriveBody> {
        if self.header.command != Command::Drive {
            return None;
        }
        DriveBody::decode(&self.payload).ok()
    }

    /// Serialize into a freshly allocated buffer of `length()` bytes
    pub fn serialize(&self) -> Vec<u8> {
        let mut buf = BytesMut::with_capacity(self.header.length as usize);
        self.encode(&mut buf);
        buf.to_vec()
    }

    /// Append the wire form of this packet to `buf`
    pub fn encode(&self, buf: &mut BytesMut) {
        let start = buf.len();
        buf.put_slice(&self.header.encode());
        buf.put_slice(&self.payload);
        let checksum = checksum::compute(&buf[start..]);
        buf.put_u8(checksum);
    }

    fn replace_payload(&mut self, payload: Vec<u8>) {
        self.header.length = (HEADER_SIZE + payload.len() + CHECKSUM_SIZE) as u8;
        self.payload = payload;
        self.seal();
    }

    fn seal(&mut self) {
        let header = self.header.encode();
        self.checksum = checksum::compute(&header).wrapping_add(checksum::compute(&self.payload));
    }
}

impl Default for Packet {
    fn default() -> Self {
        Self::new()
    }
}

impl TryFrom<&[u8]> for Packet {
    type Error = CodecError;

    fn try_from(raw: &[u8]) -> Result<Self, Self::Error> {
        Self::parse(raw)
    }
}
