//! RoverNet - Robot command protocol
//!
//! Drives a remote-controlled robot over TCP or UDP using a compact binary
//! command/response packet format, and ships a simulator for the robot end.

mod config;
mod console;
mod network;
mod protocol;

use std::path::PathBuf;
use std::time::Duration;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tokio::io::BufReader;
use tokio::net::TcpListener;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use config::Config;
use network::{
    resolve_host, Connection, NetworkConfig, RobotClient, RobotSimulator, RobotState,
    TcpTransport, Transport, TransportKind, UdpTransport,
};
use protocol::{Direction, DriveBody, Frame};

/// RoverNet - Robot command protocol
#[derive(Parser)]
#[command(name = "rovernet")]
#[command(author = "RoverNet Contributors")]
#[command(version = "0.1.0")]
#[command(about = "Send drive commands to a robot and read its telemetry", long_about = None)]
struct Cli {
    /// Path to configuration file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Robot host (overrides configuration)
    #[arg(long, global = true)]
    host: Option<String>,

    /// Robot port (overrides configuration)
    #[arg(short, long, global = true)]
    port: Option<u16>,

    /// Socket type: tcp or udp (overrides configuration)
    #[arg(short, long, global = true)]
    transport: Option<TransportKind>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Interactive drive console
    Drive,

    /// Send a single command and print the response
    Send {
        #[command(subcommand)]
        action: SendAction,
    },

    /// Run a simulated robot
    Simulate {
        /// Address to listen on
        #[arg(short, long)]
        bind: Option<String>,
    },

    /// Decode a hex-encoded packet
    Decode {
        /// Packet bytes, e.g. "04 D2 80 08 04 0A 64 0D"
        hex: Vec<String>,
    },

    /// Show current configuration
    Config {
        /// Generate sample configuration
        #[arg(long)]
        generate: bool,

        /// Output path for generated config
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Show protocol information
    Info,
}

#[derive(Subcommand)]
enum SendAction {
    /// Drive in a direction
    Drive {
        /// forward, backward, right or left
        direction: Direction,

        /// Seconds to drive for
        #[arg(short, long, default_value_t = 1)]
        duration: u8,

        /// Motor speed
        #[arg(short, long, default_value_t = 80)]
        speed: u8,
    },

    /// Put the robot to sleep
    Sleep,

    /// Request a telemetry report
    Status,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Load configuration
    let config = if let Some(config_path) = &cli.config {
        Config::load(config_path)?
    } else {
        Config::load_default().unwrap_or_default()
    };

    // Initialize logging
    let filter = match &config.general.log_filter {
        Some(directive) if !cli.verbose => EnvFilter::new(directive),
        _ if cli.verbose || config.general.verbose => EnvFilter::new("debug"),
        _ => EnvFilter::new("info"),
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();

    let mut net = config.network_config();
    if let Some(host) = cli.host {
        net.host = host;
    }
    if let Some(port) = cli.port {
        net.port = port;
    }
    if let Some(transport) = cli.transport {
        net.transport = transport;
    }

    match cli.command {
        Commands::Drive => {
            run_console(&config, &net).await?;
        }
        Commands::Send { action } => {
            run_send(&net, action).await?;
        }
        Commands::Simulate { bind } => {
            let bind = bind.unwrap_or_else(|| config.simulator.bind_address.clone());
            let state = RobotState {
                current_grade: config.simulator.current_grade,
                hit_count: config.simulator.hit_count,
                ..Default::default()
            };

            tokio::select! {
                result = run_simulator(&net, &bind, state) => result?,
                _ = tokio::signal::ctrl_c() => {
                    println!("\nShutting down...");
                }
            }
        }
        Commands::Decode { hex } => {
            decode_packet(&hex.join(" "))?;
        }
        Commands::Config { generate, output } => {
            if generate {
                let sample = config::generate_sample_config()?;
                if let Some(path) = output {
                    std::fs::write(&path, &sample)?;
                    println!("Configuration written to: {}", path.display());
                } else {
                    println!("{}", sample);
                }
            } else {
                println!("{}", toml::to_string_pretty(&config)?);
            }
        }
        Commands::Info => {
            print_protocol_info();
        }
    }

    Ok(())
}

/// Open a connection to the robot with the configured transport
async fn connect(net: &NetworkConfig) -> anyhow::Result<Connection<Box<dyn Transport>>> {
    let addr = resolve_host(&net.host, net.port).await?;
    tracing::info!("Connecting to robot at {} over {}", addr, net.transport);

    let transport: Box<dyn Transport> = match net.transport {
        TransportKind::Tcp => Box::new(
            TcpTransport::connect(addr, Duration::from_millis(net.connect_timeout_ms))
                .await
                .with_context(|| format!("TCP connection to {} failed", addr))?,
        ),
        TransportKind::Udp => Box::new(UdpTransport::connect(addr).await?),
    };

    Ok(Connection::with_receive_size(transport, net.receive_buffer_size))
}

async fn client(net: &NetworkConfig) -> anyhow::Result<RobotClient<Box<dyn Transport>>> {
    let connection = connect(net).await?;
    let timeout = Duration::from_millis(net.response_timeout_ms);
    Ok(RobotClient::new(connection, timeout))
}

/// Run the interactive console
async fn run_console(config: &Config, net: &NetworkConfig) -> anyhow::Result<()> {
    let mut client = client(net).await?;

    println!("\n========================================");
    println!("  RoverNet Console");
    println!("========================================");
    println!("  Robot: {}:{} ({})", net.host, net.port, net.transport);
    println!("  Speed: {}-{}", config.drive.min_speed, config.drive.max_speed);
    println!("========================================");

    let stdin = BufReader::new(tokio::io::stdin());
    let mut stdout = std::io::stdout();
    console::run(&mut client, &config.drive, stdin, &mut stdout).await?;

    let stats = client.stats();
    tracing::info!(
        "Session ended: {} packets sent, {} received, {} checksum failures",
        stats.packets_sent,
        stats.packets_received,
        stats.checksum_failures
    );

    Ok(())
}

/// Send one command and print the response
async fn run_send(net: &NetworkConfig, action: SendAction) -> anyhow::Result<()> {
    let mut client = client(net).await?;

    let response = match action {
        SendAction::Drive {
            direction,
            duration,
            speed,
        } => client.drive(DriveBody::new(direction, duration, speed)).await?,
        SendAction::Sleep => client.sleep().await?,
        SendAction::Status => {
            let telemetry = client.request_telemetry().await?;
            println!("Last Packet Counter: {}", telemetry.last_packet_counter);
            println!("Current Grade: {}", telemetry.current_grade);
            println!("Hit Count: {}", telemetry.hit_count);
            println!(
                "Last Command: {} (value {}, speed {})",
                Direction::from_code(telemetry.last_command),
                telemetry.last_command_value,
                telemetry.last_command_speed
            );
            return Ok(());
        }
    };

    println!("{}", console::describe_packet(&response));
    Ok(())
}

/// Run the simulated robot until interrupted
async fn run_simulator(net: &NetworkConfig, bind: &str, state: RobotState) -> anyhow::Result<()> {
    let bind_addr = resolve_host(bind, net.port).await?;
    let mut robot = RobotSimulator::new(state);

    println!("\n========================================");
    println!("  RoverNet Simulator Running");
    println!("========================================");
    println!("  Listening: {} ({})", bind_addr, net.transport);
    println!("========================================");
    println!("Press Ctrl+C to stop.\n");

    match net.transport {
        TransportKind::Udp => {
            let transport = UdpTransport::bind(bind_addr).await?;
            let mut connection = Connection::with_receive_size(transport, net.receive_buffer_size);
            robot.serve(&mut connection).await?;
        }
        TransportKind::Tcp => {
            let listener = TcpListener::bind(bind_addr)
                .await
                .with_context(|| format!("Failed to bind to {}", bind_addr))?;
            tracing::info!("TCP server listening on {}", listener.local_addr()?);

            // One controller at a time; robot state carries over between them
            loop {
                let transport = TcpTransport::accept_one(&listener).await?;
                let mut connection =
                    Connection::with_receive_size(transport, net.receive_buffer_size);
                if let Err(e) = robot.serve(&mut connection).await {
                    tracing::warn!("Session ended with error: {}", e);
                }
            }
        }
    }

    Ok(())
}

/// Parse hex bytes, ignoring whitespace and an optional 0x prefix per byte
fn parse_hex(input: &str) -> anyhow::Result<Vec<u8>> {
    let digits: String = input
        .split_whitespace()
        .map(|chunk| chunk.trim_start_matches("0x").trim_start_matches("0X"))
        .collect();

    if let Some(bad) = digits.chars().find(|c| !c.is_ascii_hexdigit()) {
        anyhow::bail!("Invalid hex digit '{}' in '{}'", bad, input);
    }
    if digits.len() % 2 != 0 {
        anyhow::bail!("Odd number of hex digits in '{}'", input);
    }

    digits
        .as_bytes()
        .chunks(2)
        .map(|pair| -> anyhow::Result<u8> {
            let text = std::str::from_utf8(pair)?;
            Ok(u8::from_str_radix(text, 16)?)
        })
        .collect()
}

/// Decode a packet given on the command line
fn decode_packet(hex: &str) -> anyhow::Result<()> {
    let bytes = parse_hex(hex)?;
    let frame = Frame::parse(&bytes)?;

    println!("{}", console::describe_packet(&frame.packet));
    println!(
        "Checksum valid: {}",
        if frame.checksum_valid { "yes" } else { "no" }
    );
    if frame.packet.header().has_ambiguous_command() {
        println!("Warning: flags byte does not carry exactly one command bit");
    }
    if bytes.len() > frame.packet.length() as usize {
        println!(
            "Note: {} trailing bytes ignored",
            bytes.len() - frame.packet.length() as usize
        );
    }

    Ok(())
}

/// Print protocol information
fn print_protocol_info() {
    println!("RoverNet Protocol Information");
    println!("=============================\n");

    println!("Header: {} bytes", protocol::HEADER_SIZE);
    println!("  0-1  packet count (big-endian)");
    println!("  2    flags: Drive|Status|Sleep|Ack|padding(4)");
    println!("  3    total length");
    println!("Checksum: {} byte, count of set bits", protocol::CHECKSUM_SIZE);
    println!(
        "Packet size: {}-{} bytes",
        protocol::MIN_PACKET_SIZE,
        protocol::MAX_PACKET_SIZE
    );
    println!("Drive body: {} bytes", protocol::DRIVE_BODY_SIZE);
    println!("Telemetry: {} bytes", protocol::TELEMETRY_SIZE);
    println!("\nDefault Port: {}", protocol::DEFAULT_PORT);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_parsing() {
        let cli = Cli::try_parse_from(["rovernet", "info"]);
        assert!(cli.is_ok());
    }

    #[test]
    fn test_cli_send_drive() {
        let cli = Cli::try_parse_from([
            "rovernet", "send", "drive", "left", "--duration", "10", "--speed", "100", "-t", "tcp",
        ])
        .unwrap();

        assert_eq!(cli.transport, Some(TransportKind::Tcp));
        match cli.command {
            Commands::Send {
                action:
                    SendAction::Drive {
                        direction,
                        duration,
                        speed,
                    },
            } => {
                assert_eq!(direction, Direction::Left);
                assert_eq!(duration, 10);
                assert_eq!(speed, 100);
            }
            _ => panic!("Wrong command"),
        }
    }

    #[test]
    fn test_cli_rejects_unknown_direction() {
        assert!(Cli::try_parse_from(["rovernet", "send", "drive", "up"]).is_err());
    }

    #[test]
    fn test_parse_hex() {
        assert_eq!(
            parse_hex("04 D2 80 08 04 0A 64 0D").unwrap(),
            vec![0x04, 0xD2, 0x80, 0x08, 0x04, 0x0A, 0x64, 0x0D]
        );
        assert_eq!(parse_hex("0x04 0xd2").unwrap(), vec![0x04, 0xD2]);
        assert_eq!(parse_hex("04d2").unwrap(), vec![0x04, 0xD2]);
        assert!(parse_hex("0").is_err());
        assert!(parse_hex("zz").is_err());
        assert!(parse_hex("aé1").is_err());
        assert!(parse_hex("é").is_err());
    }

    #[test]
    fn test_decode_packet() {
        assert!(decode_packet("04 D2 80 08 04 0A 64 0D").is_ok());
        assert!(decode_packet("04 D2 80 08").is_err());
    }
}
