//! Interactive console
//!
//! Prompts for drive commands, sends them through a [`RobotClient`] and
//! prints whatever the robot answers.

use std::io::Write;

use thiserror::Error;
use tokio::io::{AsyncBufRead, AsyncBufReadExt};

use crate::config::DriveConfig;
use crate::network::{RobotClient, Transport};
use crate::protocol::{Command, Direction, DriveBody, Packet};

/// Console errors
#[derive(Error, Debug)]
pub enum ConsoleError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type ConsoleResult<T> = Result<T, ConsoleError>;

/// One entry of the main menu
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MenuChoice {
    Drive(Direction),
    Sleep,
    Status,
    Quit,
}

impl MenuChoice {
    pub fn parse(input: &str) -> Option<Self> {
        match input.trim().to_ascii_lowercase().as_str() {
            "5" | "s" | "sleep" => Some(MenuChoice::Sleep),
            "6" | "t" | "status" => Some(MenuChoice::Status),
            "q" | "quit" | "exit" => Some(MenuChoice::Quit),
            other => match other.parse::<Direction>() {
                Ok(direction) => Some(MenuChoice::Drive(direction)),
                Err(_) => None,
            },
        }
    }
}

/// Parse a drive duration in whole seconds
pub fn parse_duration(input: &str) -> Result<u8, String> {
    input
        .trim()
        .parse::<u8>()
        .map_err(|_| format!("Duration must be a whole number of seconds (0-{})", u8::MAX))
}

/// Parse a speed and check it against the configured range
pub fn parse_speed(input: &str, limits: &DriveConfig) -> Result<u8, String> {
    let out_of_range = || {
        format!(
            "The speed must be between {} and {}.",
            limits.min_speed, limits.max_speed
        )
    };
    let speed = input.trim().parse::<u8>().map_err(|_| out_of_range())?;
    if speed < limits.min_speed || speed > limits.max_speed {
        return Err(out_of_range());
    }
    Ok(speed)
}

/// Render the decoded fields of a packet, one per line
pub fn describe_packet(packet: &Packet) -> String {
    let mut lines = vec![
        format!("PktCount: {}", packet.packet_count()),
        format!("Command: {}", packet.command()),
        format!("Ack: {}", if packet.ack() { "Yes" } else { "No" }),
        format!("Length: {}", packet.length()),
    ];

    if !packet.payload().is_empty() {
        let bytes: Vec<String> = packet.payload().iter().map(|b| b.to_string()).collect();
        lines.push(format!("Body Data: {}", bytes.join(" ")));
    }

    if let Some(body) = packet.drive_body() {
        lines.push(format!(
            "Drive: {} for {}s at speed {}",
            body.direction, body.duration, body.speed
        ));
    }

    if let Some(t) = packet.telemetry() {
        lines.push(format!("Last Packet Counter: {}", t.last_packet_counter));
        lines.push(format!("Current Grade: {}", t.current_grade));
        lines.push(format!("Hit Count: {}", t.hit_count));
        lines.push(format!(
            "Last Command: {} (value {}, speed {})",
            Direction::from_code(t.last_command),
            t.last_command_value,
            t.last_command_speed
        ));
    }

    lines.push(format!("Checksum: {:#04x}", packet.checksum()));
    lines.join("\n")
}

const MENU: &str = "\n1. Forward\n2. Backward\n3. Right\n4. Left\n5. Sleep\n6. Status\nq. Quit";

/// Run the prompt loop until `input` ends or the user quits
pub async fn run<T, R, W>(
    client: &mut RobotClient<T>,
    limits: &DriveConfig,
    input: R,
    out: &mut W,
) -> ConsoleResult<()>
where
    T: Transport,
    R: AsyncBufRead + Unpin,
    W: Write,
{
    let mut lines = input.lines();

    loop {
        writeln!(out, "{}", MENU)?;
        write!(out, "Select option: ")?;
        out.flush()?;

        let Some(line) = lines.next_line().await? else {
            break;
        };

        let choice = match MenuChoice::parse(&line) {
            Some(choice) => choice,
            None => {
                writeln!(out, "Invalid option.")?;
                continue;
            }
        };

        let result = match choice {
            MenuChoice::Quit => break,
            MenuChoice::Sleep => client.sleep().await,
            MenuChoice::Status => {
                let mut request = Packet::new();
                request.set_command(Command::Response);
                client.exchange(request).await
            }
            MenuChoice::Drive(direction) => {
                write!(out, "Enter duration (in seconds): ")?;
                out.flush()?;
                let Some(line) = lines.next_line().await? else {
                    break;
                };
                let duration = match parse_duration(&line) {
                    Ok(duration) => duration,
                    Err(message) => {
                        writeln!(out, "{}", message)?;
                        continue;
                    }
                };

                write!(
                    out,
                    "Enter speed ({}-{}): ",
                    limits.min_speed, limits.max_speed
                )?;
                out.flush()?;
                let Some(line) = lines.next_line().await? else {
                    break;
                };
                let speed = match parse_speed(&line, limits) {
                    Ok(speed) => speed,
                    Err(message) => {
                        writeln!(out, "{}", message)?;
                        continue;
                    }
                };

                client.drive(DriveBody::new(direction, duration, speed)).await
            }
        };

        match result {
            Ok(packet) => {
                writeln!(out, "Received Packet")?;
                writeln!(out, "{}", describe_packet(&packet))?;
            }
            Err(e) => {
                tracing::warn!("Command failed: {}", e);
                writeln!(out, "No response: {}", e)?;
            }
        }
    }

    Ok(())
}
