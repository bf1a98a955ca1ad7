//! Byte transports
//!
//! The codec only ever sees byte buffers; these types move them over a
//! socket. UDP keeps datagram boundaries, TCP is a plain byte stream and is
//! framed by [`super::Connection`].

use std::io;
use std::net::SocketAddr;
use std::time::Duration;

use async_trait::async_trait;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream, UdpSocket};

/// Default receive size, matching the robot firmware's buffer
pub const DEFAULT_RECEIVE_SIZE: usize = 1024;

/// Minimal send/receive capability over an established link
#[async_trait]
pub trait Transport: Send {
    /// Send all of `bytes`
    async fn send(&mut self, bytes: &[u8]) -> io::Result<()>;

    /// Receive at most `max_bytes`. An empty result on a stream transport
    /// means the peer closed the connection.
    async fn receive(&mut self, max_bytes: usize) -> io::Result<Vec<u8>>;

    /// True if every receive returns exactly one message
    fn preserves_boundaries(&self) -> bool {
        false
    }

    /// The remote end, if known
    fn peer_addr(&self) -> Option<SocketAddr>;
}

#[async_trait]
impl<T: Transport + ?Sized> Transport for Box<T> {
    async fn send(&mut self, bytes: &[u8]) -> io::Result<()> {
        (**self).send(bytes).await
    }

    async fn receive(&mut self, max_bytes: usize) -> io::Result<Vec<u8>> {
        (**self).receive(max_bytes).await
    }

    fn preserves_boundaries(&self) -> bool {
        (**self).preserves_boundaries()
    }

    fn peer_addr(&self) -> Option<SocketAddr> {
        (**self).peer_addr()
    }
}

/// UDP transport.
///
/// A client socket is connected to the robot. A server socket is bound and
/// replies to whoever sent the most recent datagram.
pub struct UdpTransport {
    socket: UdpSocket,
    peer: Option<SocketAddr>,
    connected: bool,
}

impl UdpTransport {
    /// Create a socket connected to `remote`
    pub async fn connect(remote: SocketAddr) -> io::Result<Self> {
        let bind: SocketAddr = if remote.is_ipv6() {
            SocketAddr::from(([0u16; 8], 0))
        } else {
            SocketAddr::from(([0u8; 4], 0))
        };

        let socket = UdpSocket::bind(bind).await?;
        socket.connect(remote).await?;
        tracing::debug!("UDP socket {} connected to {}", socket.local_addr()?, remote);

        Ok(Self {
            socket,
            peer: Some(remote),
            connected: true,
        })
    }

    /// Bind a server socket to `local`
    pub async fn bind(local: SocketAddr) -> io::Result<Self> {
        let socket = UdpSocket::bind(local).await?;
        tracing::info!("UDP server ready on {}", socket.local_addr()?);

        Ok(Self {
            socket,
            peer: None,
            connected: false,
        })
    }

    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.socket.local_addr()
    }
}

#[async_trait]
impl Transport for UdpTransport {
    async fn send(&mut self, bytes: &[u8]) -> io::Result<()> {
        if self.connected {
            self.socket.send(bytes).await?;
            return Ok(());
        }

        match self.peer {
            Some(peer) => {
                self.socket.send_to(bytes, peer).await?;
                Ok(())
            }
            None => Err(io::Error::new(
                io::ErrorKind::NotConnected,
                "no datagram received yet, peer unknown",
            )),
        }
    }

    async fn receive(&mut self, max_bytes: usize) -> io::Result<Vec<u8>> {
        let mut buf = vec![0u8; max_bytes];
        let n = if self.connected {
            self.socket.recv(&mut buf).await?
        } else {
            let (n, from) = self.socket.recv_from(&mut buf).await?;
            if self.peer != Some(from) {
                tracing::debug!("UDP peer is now {}", from);
            }
            self.peer = Some(from);
            n
        };
        buf.truncate(n);
        Ok(buf)
    }

    fn preserves_boundaries(&self) -> bool {
        true
    }

    fn peer_addr(&self) -> Option<SocketAddr> {
        self.peer
    }
}

/// Stream transport over TCP, or any other async byte stream
pub struct TcpTransport<S = TcpStream> {
    stream: S,
    peer: Option<SocketAddr>,
}

impl<S> TcpTransport<S> {
    pub fn new(stream: S, peer: Option<SocketAddr>) -> Self {
        Self { stream, peer }
    }
}

impl TcpTransport<TcpStream> {
    /// Connect to `addr`, giving up after `timeout`
    pub async fn connect(addr: SocketAddr, timeout: Duration) -> io::Result<Self> {
        let stream = match tokio::time::timeout(timeout, TcpStream::connect(addr)).await {
            Ok(result) => result?,
            Err(_) => {
                return Err(io::Error::new(
                    io::ErrorKind::TimedOut,
                    format!("connection to {} timed out", addr),
                ))
            }
        };
        stream.set_nodelay(true)?;
        tracing::info!("TCP connection established with {}", addr);

        Ok(Self::new(stream, Some(addr)))
    }

    /// Wait for a single peer on `listener`
    pub async fn accept_one(listener: &TcpListener) -> io::Result<Self> {
        let (stream, addr) = listener.accept().await?;
        stream.set_nodelay(true)?;
        tracing::info!("TCP connection accepted from {}", addr);

        Ok(Self::new(stream, Some(addr)))
    }
}

#[async_trait]
impl<S> Transport for TcpTransport<S>
where
    S: AsyncRead + AsyncWrite + Unpin + Send,
{
    async fn send(&mut self, bytes: &[u8]) -> io::Result<()> {
        self.stream.write_all(bytes).await?;
        self.stream.flush().await
    }

    async fn receive(&mut self, max_bytes: usize) -> io::Result<Vec<u8>> {
        let mut buf = vec![0u8; max_bytes];
        let n = self.stream.read(&mut buf).await?;
        buf.truncate(n);
        Ok(buf)
    }

    fn peer_addr(&self) -> Option<SocketAddr> {
        self.peer
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio_test::io::Builder;

    #[tokio::test]
    async fn test_stream_send_writes_all_bytes() {
        let mock = Builder::new().write(&[0x00, 0x01, 0x20, 0x05, 0x02]).build();
        let mut transport = TcpTransport::new(mock, None);

        transport.send(&[0x00, 0x01, 0x20, 0x05, 0x02]).await.unwrap();
        assert!(!transport.preserves_boundaries());
    }

    #[tokio::test]
    async fn test_stream_receive_and_close() {
        let mock = Builder::new().read(&[0xAA, 0xBB]).build();
        let mut transport = TcpTransport::new(mock, None);

        assert_eq!(transport.receive(16).await.unwrap(), vec![0xAA, 0xBB]);
        assert!(transport.receive(16).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_udp_roundtrip() {
        let mut server = UdpTransport::bind("127.0.0.1:0".parse().unwrap())
            .await
            .unwrap();
        let server_addr = server.local_addr().unwrap();

        // Nothing to reply to yet
        let err = server.send(&[1]).await.unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::NotConnected);

        let mut client = UdpTransport::connect(server_addr).await.unwrap();
        client.send(&[1, 2, 3]).await.unwrap();

        let datagram = server.receive(DEFAULT_RECEIVE_SIZE).await.unwrap();
        assert_eq!(datagram, vec![1, 2, 3]);
        assert!(server.peer_addr().is_some());

        server.send(&[4, 5]).await.unwrap();
        assert_eq!(client.receive(DEFAULT_RECEIVE_SIZE).await.unwrap(), vec![4, 5]);
    }

    #[tokio::test]
    async fn test_tcp_connect_and_accept() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let accept = tokio::spawn(async move { TcpTransport::accept_one(&listener).await });
        let mut client = TcpTransport::connect(addr, Duration::from_secs(2))
            .await
            .unwrap();
        let mut server = accept.await.unwrap().unwrap();

        client.send(&[9, 8, 7]).await.unwrap();
        let received = server.receive(3).await.unwrap();
        assert_eq!(received, vec![9, 8, 7]);
        assert_eq!(client.peer_addr(), Some(addr));
    }
}
