//! Robot client
//!
//! Sends commands to the robot and waits for its acknowledgement. Every
//! command gets the next value of a wrapping 16-bit packet counter.

use std::time::Duration;
use thiserror::Error;

use super::connection::{Connection, ConnectionError, ConnectionStats};
use super::transport::Transport;
use crate::protocol::{Command, DriveBody, Packet, Telemetry};

/// Client errors
#[derive(Error, Debug)]
pub enum ClientError {
    #[error("Connection error: {0}")]
    Connection(#[from] ConnectionError),

    #[error("No response within {0:?}")]
    Timeout(Duration),

    #[error("Robot closed the connection")]
    Closed,

    #[error("Checksum mismatch in response to packet #{count}")]
    ChecksumMismatch { count: u16 },

    #[error("{command} packet #{count} was not acknowledged")]
    NotAcknowledged { count: u16, command: Command },

    #[error("Response to packet #{count} carried no telemetry")]
    MissingTelemetry { count: u16 },
}

pub type ClientResult<T> = Result<T, ClientError>;

/// Command/acknowledge client for a single robot
pub struct RobotClient<T> {
    connection: Connection<T>,
    next_count: u16,
    response_timeout: Duration,
}

impl<T: Transport> RobotClient<T> {
    pub fn new(connection: Connection<T>, response_timeout: Duration) -> Self {
        Self {
            connection,
            next_count: 1,
            response_timeout,
        }
    }

    /// Override the count the next command will carry
    pub fn set_next_count(&mut self, count: u16) {
        self.next_count = count;
    }

    pub fn next_count(&self) -> u16 {
        self.next_count
    }

    pub fn stats(&self) -> &ConnectionStats {
        self.connection.stats()
    }

    /// Send a drive command and return the robot's acknowledgement
    pub async fn drive(&mut self, body: DriveBody) -> ClientResult<Packet> {
        let mut packet = Packet::new();
        packet.set_drive(body);
        tracing::info!(
            "Drive {} for {}s at speed {}",
            body.direction,
            body.duration,
            body.speed
        );
        self.exchange(packet).await
    }

    /// Put the robot to sleep
    pub async fn sleep(&mut self) -> ClientResult<Packet> {
        let mut packet = Packet::new();
        packet.set_command(Command::Sleep);
        self.exchange(packet).await
    }

    /// Ask the robot for its status record
    pub async fn request_telemetry(&mut self) -> ClientResult<Telemetry> {
        let mut packet = Packet::new();
        packet.set_command(Command::Response);
        let response = self.exchange(packet).await?;

        response.telemetry().ok_or(ClientError::MissingTelemetry {
            count: response.packet_count(),
        })
    }

    /// Stamp `packet` with the next count, send it and wait for the reply
    pub async fn exchange(&mut self, mut packet: Packet) -> ClientResult<Packet> {
        let count = self.next_count;
        self.next_count = self.next_count.wrapping_add(1);
        packet.set_packet_count(count);

        self.connection.send(&packet).await?;

        let frame = match self.connection.recv_timeout(self.response_timeout).await {
            Ok(Some(frame)) => frame,
            Ok(None) => return Err(ClientError::Closed),
            Err(ConnectionError::Timeout) => {
                return Err(ClientError::Timeout(self.response_timeout))
            }
            Err(e) => return Err(e.into()),
        };

        if !frame.checksum_valid {
            return Err(ClientError::ChecksumMismatch { count });
        }

        let response = frame.packet;
        if response.packet_count() != count {
            tracing::warn!(
                "Response carries packet #{}, expected #{}",
                response.packet_count(),
                count
            );
        }

        if !response.ack() {
            return Err(ClientError::NotAcknowledged {
                count,
                command: packet.command(),
            });
        }

        tracing::debug!("{} packet #{} acknowledged", packet.command(), count);
        Ok(response)
    }
}
