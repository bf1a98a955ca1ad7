//! Robot simulator
//!
//! Answers commands the way the robot does, so the controller can be run
//! and tested without hardware.

use serde::{Deserialize, Serialize};

use super::connection::{Connection, ConnectionError, ConnectionResult};
use super::transport::Transport;
use crate::protocol::{Command, Packet, Telemetry};

/// Robot state reported through telemetry
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RobotState {
    /// Count of the last command received
    pub last_packet_counter: u16,
    pub current_grade: u16,
    pub hit_count: u16,
    /// Direction code of the last drive command
    pub last_command: u8,
    /// Duration of the last drive command
    pub last_command_value: u8,
    /// Speed of the last drive command
    pub last_command_speed: u8,
    /// Set by a sleep command, cleared by the next drive
    pub asleep: bool,
}

impl RobotState {
    pub fn telemetry(&self) -> Telemetry {
        Telemetry {
            last_packet_counter: self.last_packet_counter,
            current_grade: self.current_grade,
            hit_count: self.hit_count,
            last_command: self.last_command,
            last_command_value: self.last_command_value,
            last_command_speed: self.last_command_speed,
        }
    }
}

/// Simulated robot
#[derive(Debug, Default)]
pub struct RobotSimulator {
    state: RobotState,
}

impl RobotSimulator {
    pub fn new(state: RobotState) -> Self {
        Self { state }
    }

    pub fn state(&self) -> &RobotState {
        &self.state
    }

    /// Build the reply to `request`.
    ///
    /// Returns None for packets that are themselves acknowledgements.
    pub fn respond(&mut self, request: &Packet) -> Option<Packet> {
        if request.ack() {
            tracing::debug!("Ignoring acknowledgement #{}", request.packet_count());
            return None;
        }

        self.state.last_packet_counter = request.packet_count();

        let mut reply = Packet::new();
        reply.set_packet_count(request.packet_count());

        match request.command() {
            Command::Drive => {
                reply.set_command(Command::Drive);
                match request.drive_body() {
                    Some(body) => {
                        self.state.last_command = body.direction.code();
                        self.state.last_command_value = body.duration;
                        self.state.last_command_speed = body.speed;
                        self.state.asleep = false;
                        reply.set_ack(true);
                        tracing::info!(
                            "Driving {} for {}s at speed {}",
                            body.direction,
                            body.duration,
                            body.speed
                        );
                    }
                    None => {
                        tracing::warn!(
                            "Rejecting drive #{} with {} byte body",
                            request.packet_count(),
                            request.payload().len()
                        );
                    }
                }
            }
            Command::Sleep => {
                self.state.asleep = true;
                reply.set_command(Command::Sleep);
                reply.set_ack(true);
                tracing::info!("Going to sleep");
            }
            Command::Response => {
                reply.set_telemetry_record(self.state.telemetry());
                reply.set_ack(true);
                tracing::debug!("Reporting telemetry {:?}", self.state);
            }
        }

        Some(reply)
    }

    /// Answer packets on `connection` until the peer closes it.
    ///
    /// Packets with a bad checksum are dropped without a reply.
    pub async fn serve<T: Transport>(
        &mut self,
        connection: &mut Connection<T>,
    ) -> ConnectionResult<()> {
        loop {
            let frame = match connection.recv().await {
                Ok(Some(frame)) => frame,
                Ok(None) => break,
                Err(ConnectionError::Protocol(e)) => {
                    tracing::warn!("Discarding unreadable input: {}", e);
                    continue;
                }
                Err(e) => return Err(e),
            };

            if !frame.checksum_valid {
                tracing::warn!(
                    "Dropping packet #{} with bad checksum",
                    frame.packet.packet_count()
                );
                continue;
            }

            if let Some(reply) = self.respond(&frame.packet) {
                connection.send(&reply).await?;
            }
        }

        let stats = connection.stats();
        tracing::info!(
            "Peer closed: {} packets in, {} out, {} checksum failures",
            stats.packets_received,
            stats.packets_sent,
            stats.checksum_failures
        );

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::network::{RobotClient, TcpTransport};
    use crate::protocol::{Direction, DriveBody};
    use std::time::Duration;

    fn drive_request(count: u16, body: DriveBody) -> Packet {
        let mut packet = Packet::new();
        packet.set_packet_count(count);
        packet.set_drive(body);
        packet
    }

    #[test]
    fn test_drive_updates_state() {
        let mut robot = RobotSimulator::default();
        let reply = robot
            .respond(&drive_request(7, DriveBody::new(Direction::Right, 4, 85)))
            .unwrap();

        assert_eq!(reply.command(), Command::Drive);
        assert!(reply.ack());
        assert_eq!(reply.packet_count(), 7);
        assert!(reply.payload().is_empty());

        let state = robot.state();
        assert_eq!(state.last_packet_counter, 7);
        assert_eq!(state.last_command, 3);
        assert_eq!(state.last_command_value, 4);
        assert_eq!(state.last_command_speed, 85);
    }

    #[test]
    fn test_malformed_drive_is_not_acknowledged() {
        let mut robot = RobotSimulator::default();
        let mut request = Packet::new();
        request.set_command(Command::Drive);
        request.set_payload(&[1, 2]).unwrap();

        let reply = robot.respond(&request).unwrap();
        assert!(!reply.ack());
        assert_eq!(robot.state().last_command, 0);
    }

    #[test]
    fn test_sleep_then_status() {
        let mut robot = RobotSimulator::new(RobotState {
            current_grade: 80,
            hit_count: 4,
            ..Default::default()
        });

        let mut sleep = Packet::new();
        sleep.set_command(Command::Sleep);
        sleep.set_packet_count(1);
        let reply = robot.respond(&sleep).unwrap();
        assert_eq!(reply.command(), Command::Sleep);
        assert!(reply.ack());
        assert!(robot.state().asleep);

        let mut status = Packet::new();
        status.set_command(Command::Response);
        status.set_packet_count(2);
        let reply = robot.respond(&status).unwrap();
        let telemetry = reply.telemetry().unwrap();
        assert_eq!(telemetry.last_packet_counter, 2);
        assert_eq!(telemetry.current_grade, 80);
        assert_eq!(telemetry.hit_count, 4);
    }

    #[test]
    fn test_acknowledgements_are_ignored() {
        let mut robot = RobotSimulator::default();
        let mut packet = Packet::new();
        packet.set_command(Command::Drive);
        packet.set_ack(true);
        assert!(robot.respond(&packet).is_none());
    }

    #[tokio::test]
    async fn test_client_against_simulator() {
        let (client_side, robot_side) = tokio::io::duplex(1024);

        let robot = tokio::spawn(async move {
            let mut robot = RobotSimulator::new(RobotState {
                current_grade: 80,
                ..Default::default()
            });
            let mut connection = Connection::new(TcpTransport::new(robot_side, None));
            robot.serve(&mut connection).await.unwrap();
            robot.state().clone()
        });

        let connection = Connection::new(TcpTransport::new(client_side, None));
        let mut client = RobotClient::new(connection, Duration::from_secs(2));

        client
            .drive(DriveBody::new(Direction::Left, 10, 100))
            .await
            .unwrap();
        client.sleep().await.unwrap();
        let telemetry = client.request_telemetry().await.unwrap();

        assert_eq!(telemetry.last_packet_counter, 3);
        assert_eq!(telemetry.current_grade, 80);
        assert_eq!(telemetry.last_command, Direction::Left.code());
        assert_eq!(telemetry.last_command_value, 10);
        assert_eq!(telemetry.last_command_speed, 100);

        drop(client);
        let state = robot.await.unwrap();
        assert!(state.asleep);
    }

    #[tokio::test]
    async fn test_simulator_over_udp() {
        use crate::network::UdpTransport;

        let robot_transport = UdpTransport::bind("127.0.0.1:0".parse().unwrap())
            .await
            .unwrap();
        let robot_addr = robot_transport.local_addr().unwrap();

        tokio::spawn(async move {
            let mut robot = RobotSimulator::default();
            let mut connection = Connection::new(robot_transport);
            let _ = robot.serve(&mut connection).await;
        });

        let transport = UdpTransport::connect(robot_addr).await.unwrap();
        let mut client = RobotClient::new(Connection::new(transport), Duration::from_secs(2));

        let reply = client
            .drive(DriveBody::new(Direction::Forward, 1, 90))
            .await
            .unwrap();
        assert!(reply.ack());
    }
}
