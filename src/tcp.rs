//! TCP transport for RPC calls.
//!
//! [TcpTransport] opens one connection per call attempt, sends the call as a
//! single record-marked record and reads back one reply record. When asked
//! for a privileged source port it binds the first free port between 1023
//! and 512 before connecting, which needs the corresponding OS privilege.

use std::io;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr};
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use tokio::net::{TcpSocket, TcpStream};
use tracing::{debug, trace};

use crate::protocol::rpc::{wire, Transport};

/// Highest reserved source port tried.
pub const PRIVILEGED_PORT_HIGH: u16 = 1023;
/// Lowest reserved source port tried.
pub const PRIVILEGED_PORT_LOW: u16 = 512;

#[derive(Debug, Default, Clone, Copy)]
pub struct TcpTransport;

impl TcpTransport {
    pub fn new() -> Self {
        Self
    }

    async fn connect(addr: SocketAddr, use_privileged_port: bool) -> io::Result<TcpStream> {
        let stream = if use_privileged_port {
            connect_from_privileged_port(addr).await?
        } else {
            TcpStream::connect(addr).await?
        };
        let _ = stream.set_nodelay(true);
        Ok(stream)
    }

    async fn exchange(
        host: &str,
        port: u16,
        use_privileged_port: bool,
        request: &[Bytes],
    ) -> io::Result<Vec<u8>> {
        let addr = tokio::net::lookup_host((host, port)).await?.next().ok_or_else(|| {
            io::Error::new(io::ErrorKind::NotFound, format!("{host} has no address"))
        })?;

        let mut stream = Self::connect(addr, use_privileged_port).await?;
        trace!("connected to {addr} from {:?}", stream.local_addr());
        wire::write_record(&mut stream, request).await?;
        wire::read_record(&mut stream).await
    }
}

#[async_trait]
impl Transport for TcpTransport {
    async fn send_and_wait(
        &self,
        host: &str,
        port: u16,
        use_privileged_port: bool,
        request: &[Bytes],
        timeout: Duration,
    ) -> io::Result<Vec<u8>> {
        match tokio::time::timeout(timeout, Self::exchange(host, port, use_privileged_port, request))
            .await
        {
            Ok(reply) => reply,
            Err(_) => Err(io::Error::new(
                io::ErrorKind::TimedOut,
                format!("no reply from {host}:{port} within {timeout:?}"),
            )),
        }
    }
}

async fn connect_from_privileged_port(addr: SocketAddr) -> io::Result<TcpStream> {
    let local_ip = match addr.ip() {
        IpAddr::V4(_) => IpAddr::V4(Ipv4Addr::UNSPECIFIED),
        IpAddr::V6(_) => IpAddr::V6(Ipv6Addr::UNSPECIFIED),
    };

    for local_port in (PRIVILEGED_PORT_LOW..=PRIVILEGED_PORT_HIGH).rev() {
        let socket = if addr.is_ipv4() { TcpSocket::new_v4()? } else { TcpSocket::new_v6()? };
        match socket.bind(SocketAddr::new(local_ip, local_port)) {
            Ok(()) => {}
            Err(err) if err.kind() == io::ErrorKind::AddrInUse => continue,
            Err(err) => return Err(err),
        }
        match socket.connect(addr).await {
            Ok(stream) => {
                debug!("connected to {addr} from reserved port {local_port}");
                return Ok(stream);
            }
            // The same local port may still be tied to this peer in TIME_WAIT.
            Err(err) if err.kind() == io::ErrorKind::AddrInUse => continue,
            Err(err) if err.kind() == io::ErrorKind::AddrNotAvailable => continue,
            Err(err) => return Err(err),
        }
    }

    Err(io::Error::new(
        io::ErrorKind::AddrInUse,
        format!("no free reserved port between {PRIVILEGED_PORT_LOW} and {PRIVILEGED_PORT_HIGH}"),
    ))
}

#[cfg(test)]
mod tests {
    use tokio::net::TcpListener;

    use super::*;

    #[tokio::test]
    async fn exchanges_one_record() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let request = wire::read_record(&mut socket).await.unwrap();
            assert_eq!(request, b"ping");
            wire::write_record(&mut socket, &[Bytes::from_static(b"pong")]).await.unwrap();
        });

        let reply = TcpTransport::new()
            .send_and_wait(
                "127.0.0.1",
                port,
                false,
                &[Bytes::from_static(b"pi"), Bytes::from_static(b"ng")],
                Duration::from_secs(5),
            )
            .await
            .unwrap();
        assert_eq!(reply, b"pong");
    }

    #[tokio::test]
    async fn silent_server_times_out() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let _accepting = tokio::spawn(async move {
            let (socket, _) = listener.accept().await.unwrap();
            tokio::time::sleep(Duration::from_secs(5)).await;
            drop(socket);
        });

        let err = TcpTransport::new()
            .send_and_wait("127.0.0.1", port, false, &[], Duration::from_millis(100))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::TimedOut);
    }
}
