//! Network module - Moves packets between the controller and the robot
//!
//! Provides:
//! - TCP and UDP transports behind the [`Transport`] trait
//! - Connection framing and statistics
//! - A client that drives the command/acknowledge exchange
//! - A robot simulator that answers commands

mod client;
mod connection;
mod server;
mod transport;

pub use client::*;
pub use connection::*;
pub use server::*;
pub use transport::*;

use std::fmt;
use std::net::SocketAddr;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Which socket type carries the packets
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransportKind {
    Tcp,
    #[default]
    Udp,
}

impl fmt::Display for TransportKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransportKind::Tcp => f.write_str("tcp"),
            TransportKind::Udp => f.write_str("udp"),
        }
    }
}

impl FromStr for TransportKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "tcp" => Ok(TransportKind::Tcp),
            "udp" => Ok(TransportKind::Udp),
            other => Err(format!("unknown transport '{}' (expected tcp or udp)", other)),
        }
    }
}

/// Configuration for network operations
#[derive(Debug, Clone)]
pub struct NetworkConfig {
    /// Robot host name or address
    pub host: String,
    /// Port to listen on or connect to
    pub port: u16,
    /// Socket type
    pub transport: TransportKind,
    /// Connection timeout in milliseconds (TCP only)
    pub connect_timeout_ms: u64,
    /// How long to wait for a response to a command
    pub response_timeout_ms: u64,
    /// Largest single receive
    pub receive_buffer_size: usize,
}

/// Resolve a hostname to a socket address
pub async fn resolve_host(host: &str, port: u16) -> std::io::Result<SocketAddr> {
    use tokio::net::lookup_host;

    let addr_string = format!("{}:{}", host, port);
    let mut addrs = lookup_host(&addr_string).await?;

    addrs.next().ok_or_else(|| {
        std::io::Error::new(
            std::io::ErrorKind::NotFound,
            format!("Could not resolve host: {}", host),
        )
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transport_kind_parse() {
        assert_eq!("TCP".parse::<TransportKind>(), Ok(TransportKind::Tcp));
        assert_eq!("udp".parse::<TransportKind>(), Ok(TransportKind::Udp));
        assert!("sctp".parse::<TransportKind>().is_err());
    }

    #[tokio::test]
    async fn test_resolve_localhost() {
        let addr = resolve_host("127.0.0.1", 5000).await.unwrap();
        assert_eq!(addr.port(), 5000);
    }
}
