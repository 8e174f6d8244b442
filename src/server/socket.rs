//! Non-blocking socket seam between the connection state machine and the
//! network.
//!
//! Both methods must return `ErrorKind::WouldBlock` instead of blocking; the
//! connection treats that as a suspension point and hands control back to
//! the readiness layer.

use std::io::{self, IoSlice};
use std::net::SocketAddr;
use std::sync::Arc;

pub trait Socket: Send + Sync + 'static {
    fn try_read(&self, buf: &mut [u8]) -> io::Result<usize>;

    fn try_write_vectored(&self, bufs: &[IoSlice<'_>]) -> io::Result<usize>;

    fn peer_addr(&self) -> io::Result<SocketAddr>;
}

impl Socket for tokio::net::TcpStream {
    fn try_read(&self, buf: &mut [u8]) -> io::Result<usize> {
        tokio::net::TcpStream::try_read(self, buf)
    }

    fn try_write_vectored(&self, bufs: &[IoSlice<'_>]) -> io::Result<usize> {
        tokio::net::TcpStream::try_write_vectored(self, bufs)
    }

    fn peer_addr(&self) -> io::Result<SocketAddr> {
        tokio::net::TcpStream::peer_addr(self)
    }
}

impl<S: Socket> Socket for Arc<S> {
    fn try_read(&self, buf: &mut [u8]) -> io::Result<usize> {
        (**self).try_read(buf)
    }

    fn try_write_vectored(&self, bufs: &[IoSlice<'_>]) -> io::Result<usize> {
        (**self).try_write_vectored(bufs)
    }

    fn peer_addr(&self) -> io::Result<SocketAddr> {
        (**self).peer_addr()
    }
}
