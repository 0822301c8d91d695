//! Network collaborators the session controller is built on.
//!
//! Both are injected at construction so tests can script the peer without touching the OS stack.

use std::io;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

mod tokio_socket;

pub use tokio_socket::TokioDatagramSocket;

/// The link a session runs over. Bringing it up happens before any socket is opened.
pub trait NetworkInterface: Send + Sync {
    fn connect(&self) -> io::Result<()>;
    fn disconnect(&self);
    /// Address both session sockets bind to.
    fn bind_address(&self) -> IpAddr;
}

/// The host's own network stack, which is always up.
#[derive(Debug, Default, Clone, Copy)]
pub struct HostNetwork;

impl NetworkInterface for HostNetwork {
    fn connect(&self) -> io::Result<()> {
        Ok(())
    }

    fn disconnect(&self) {}

    fn bind_address(&self) -> IpAddr {
        IpAddr::V4(Ipv4Addr::UNSPECIFIED)
    }
}

/// A UDP endpoint. `recv_from` honours the timeout from [`DatagramSocket::set_timeout`] and fails
/// with [`io::ErrorKind::TimedOut`] when it elapses.
#[async_trait]
pub trait DatagramSocket: Send + Sync {
    async fn bind(&self, addr: SocketAddr) -> io::Result<()>;

    fn set_timeout(&self, timeout: Option<Duration>);

    async fn send_to(&self, buf: &[u8], target: SocketAddr) -> io::Result<usize>;

    async fn recv_from(&self, buf: &mut [u8]) -> io::Result<(usize, SocketAddr)>;

    /// Releases the port. Further calls fail with [`io::ErrorKind::NotConnected`].
    fn close(&self);
}

impl<T: NetworkInterface + ?Sized> NetworkInterface for Arc<T> {
    fn connect(&self) -> io::Result<()> {
        (**self).connect()
    }

    fn disconnect(&self) {
        (**self).disconnect()
    }

    fn bind_address(&self) -> IpAddr {
        (**self).bind_address()
    }
}

#[async_trait]
impl<T: DatagramSocket + ?Sized> DatagramSocket for Arc<T> {
    async fn bind(&self, addr: SocketAddr) -> io::Result<()> {
        (**self).bind(addr).await
    }

    fn set_timeout(&self, timeout: Option<Duration>) {
        (**self).set_timeout(timeout)
    }

    async fn send_to(&self, buf: &[u8], target: SocketAddr) -> io::Result<usize> {
        (**self).send_to(buf, target).await
    }

    async fn recv_from(&self, buf: &mut [u8]) -> io::Result<(usize, SocketAddr)> {
        (**self).recv_from(buf).await
    }

    fn close(&self) {
        (**self).close()
    }
}

pub(crate) fn not_bound() -> io::Error {
    io::Error::new(io::ErrorKind::NotConnected, "socket is not bound")
}
