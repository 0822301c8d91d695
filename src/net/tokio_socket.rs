use std::io;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio::net::UdpSocket;

use super::{DatagramSocket, not_bound};

/// [`DatagramSocket`] backed by a tokio UDP socket.
#[derive(Debug, Default)]
pub struct TokioDatagramSocket {
    socket: Mutex<Option<Arc<UdpSocket>>>,
    timeout: Mutex<Option<Duration>>,
}

impl TokioDatagramSocket {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.socket()?.local_addr()
    }

    fn socket(&self) -> io::Result<Arc<UdpSocket>> {
        let guard = self.socket.lock().map_err(|_| io::Error::other("socket lock poisoned"))?;
        guard.clone().ok_or_else(not_bound)
    }

    fn timeout(&self) -> Option<Duration> {
        self.timeout.lock().map(|t| *t).unwrap_or(None)
    }
}

#[async_trait]
impl DatagramSocket for TokioDatagramSocket {
    async fn bind(&self, addr: SocketAddr) -> io::Result<()> {
        let socket = UdpSocket::bind(addr).await?;
        let mut guard = self.socket.lock().map_err(|_| io::Error::other("socket lock poisoned"))?;
        *guard = Some(Arc::new(socket));
        Ok(())
    }

    fn set_timeout(&self, timeout: Option<Duration>) {
        if let Ok(mut guard) = self.timeout.lock() {
            *guard = timeout;
        }
    }

    async fn send_to(&self, buf: &[u8], target: SocketAddr) -> io::Result<usize> {
        self.socket()?.send_to(buf, target).await
    }

    async fn recv_from(&self, buf: &mut [u8]) -> io::Result<(usize, SocketAddr)> {
        let socket = self.socket()?;
        match self.timeout() {
            Some(timeout) => tokio::time::timeout(timeout, socket.recv_from(buf))
                .await
                .map_err(|_| io::Error::from(io::ErrorKind::TimedOut))?,
            None => socket.recv_from(buf).await,
        }
    }

    fn close(&self) {
        if let Ok(mut guard) = self.socket.lock() {
            guard.take();
        }
    }
}

#[cfg(test)]
mod tests {
    use std::net::{Ipv4Addr, SocketAddr};

    use super::*;

    fn loopback() -> SocketAddr {
        SocketAddr::from((Ipv4Addr::LOCALHOST, 0))
    }

    #[tokio::test]
    async fn test_send_and_receive() {
        let a = TokioDatagramSocket::new();
        let b = TokioDatagramSocket::new();
        a.bind(loopback()).await.unwrap();
        b.bind(loopback()).await.unwrap();

        a.send_to(b"ping", b.local_addr().unwrap()).await.unwrap();

        let mut buf = [0u8; 16];
        let (amt, src) = b.recv_from(&mut buf).await.unwrap();
        assert_eq!(&buf[..amt], b"ping");
        assert_eq!(src, a.local_addr().unwrap());
    }

    #[tokio::test]
    async fn test_receive_timeout() {
        let socket = TokioDatagramSocket::new();
        socket.bind(loopback()).await.unwrap();
        socket.set_timeout(Some(Duration::from_millis(20)));

        let mut buf = [0u8; 16];
        let err = socket.recv_from(&mut buf).await.unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::TimedOut);
    }

    #[tokio::test]
    async fn test_closed_socket_is_not_bound() {
        let socket = TokioDatagramSocket::new();
        socket.bind(loopback()).await.unwrap();
        socket.close();

        let err = socket.send_to(b"x", loopback()).await.unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::NotConnected);
    }
}
