//! Connection handling
//!
//! Wraps a [`Transport`] with packet framing:
//! - Packet encoding into a reusable write buffer
//! - Length-based framing for stream transports
//! - One packet per datagram for datagram transports
//! - Traffic statistics

use bytes::BytesMut;
use std::net::SocketAddr;
use std::time::Duration;
use thiserror::Error;

use super::transport::{Transport, DEFAULT_RECEIVE_SIZE};
use crate::protocol::{CodecError, Frame, Packet, PacketDecoder};

/// Connection errors
#[derive(Error, Debug)]
pub enum ConnectionError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Protocol error: {0}")]
    Protocol(#[from] CodecError),

    #[error("Connection closed")]
    Closed,

    #[error("Connection timeout")]
    Timeout,
}

pub type ConnectionResult<T> = Result<T, ConnectionError>;

/// Connection statistics
#[derive(Debug, Default, Clone)]
pub struct ConnectionStats {
    /// Packets sent
    pub packets_sent: u64,
    /// Packets received, including ones with a bad checksum
    pub packets_received: u64,
    /// Bytes sent
    pub bytes_sent: u64,
    /// Bytes received
    pub bytes_received: u64,
    /// Received packets whose checksum did not match
    pub checksum_failures: u64,
    /// Datagrams that could not be parsed at all
    pub malformed: u64,
}

/// A packet link to a single peer
pub struct Connection<T> {
    /// The byte transport
    transport: T,
    /// Stream framer
    decoder: PacketDecoder,
    /// Read buffer
    read_buf: BytesMut,
    /// Write buffer
    write_buf: BytesMut,
    /// Largest single receive
    receive_size: usize,
    /// Statistics
    stats: ConnectionStats,
}

impl<T: Transport> Connection<T> {
    pub fn new(transport: T) -> Self {
        Self::with_receive_size(transport, DEFAULT_RECEIVE_SIZE)
    }

    pub fn with_receive_size(transport: T, receive_size: usize) -> Self {
        Self {
            transport,
            decoder: PacketDecoder::new(),
            read_buf: BytesMut::with_capacity(receive_size),
            write_buf: BytesMut::with_capacity(crate::protocol::MAX_PACKET_SIZE),
            receive_size,
            stats: ConnectionStats::default(),
        }
    }

    /// Get the remote address, if the transport knows it
    pub fn peer_addr(&self) -> Option<SocketAddr> {
        self.transport.peer_addr()
    }

    /// Get connection statistics
    pub fn stats(&self) -> &ConnectionStats {
        &self.stats
    }

    /// Send a packet
    pub async fn send(&mut self, packet: &Packet) -> ConnectionResult<()> {
        self.write_buf.clear();
        packet.encode(&mut self.write_buf);

        self.transport.send(&self.write_buf).await?;

        self.stats.packets_sent += 1;
        self.stats.bytes_sent += self.write_buf.len() as u64;
        tracing::trace!(
            "Sent {} packet #{} ({} bytes)",
            packet.command(),
            packet.packet_count(),
            self.write_buf.len()
        );

        Ok(())
    }

    /// Receive the next packet. Returns None once the peer has closed a
    /// stream cleanly.
    pub async fn recv(&mut self) -> ConnectionResult<Option<Frame>> {
        if self.transport.preserves_boundaries() {
            return self.recv_datagram().await.map(Some);
        }

        loop {
            // Try to decode a packet from the buffer
            if let Some(frame) = self.decoder.decode(&mut self.read_buf)? {
                return Ok(Some(self.record(frame)));
            }

            // Read more data
            let data = self.transport.receive(self.receive_size).await?;

            if data.is_empty() {
                if self.read_buf.is_empty() {
                    return Ok(None); // Clean close
                } else {
                    return Err(ConnectionError::Closed);
                }
            }

            self.read_buf.extend_from_slice(&data);
            self.stats.bytes_received += data.len() as u64;
        }
    }

    /// Try to receive a packet with a timeout
    pub async fn recv_timeout(&mut self, timeout: Duration) -> ConnectionResult<Option<Frame>> {
        match tokio::time::timeout(timeout, self.recv()).await {
            Ok(result) => result,
            Err(_) => Err(ConnectionError::Timeout),
        }
    }

    async fn recv_datagram(&mut self) -> ConnectionResult<Frame> {
        loop {
            let datagram = self.transport.receive(self.receive_size).await?;
            self.stats.bytes_received += datagram.len() as u64;

            match self.decoder.decode_datagram(&datagram) {
                Ok(frame) => return Ok(self.record(frame)),
                Err(e) => {
                    self.stats.malformed += 1;
                    tracing::warn!(
                        "Dropping malformed datagram ({} bytes): {}",
                        datagram.len(),
                        e
                    );
                }
            }
        }
    }

    fn record(&mut self, frame: Frame) -> Frame {
        self.stats.packets_received += 1;

        if !frame.checksum_valid {
            self.stats.checksum_failures += 1;
            tracing::warn!(
                "Checksum mismatch on packet #{} (carried {:#04x})",
                frame.packet.packet_count(),
                frame.packet.checksum()
            );
        }

        frame
    }
}
