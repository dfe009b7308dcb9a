//! Transport layer for the client connection
//!
//! The session talks to its peer through [`Transport`]: non-blocking reads,
//! blocking (time-bounded) writes and a non-destructive liveness probe.

use std::io;
use std::net::SocketAddr;

#[cfg(test)]
pub(crate) mod mock;
mod tcp;

pub use tcp::TcpTransport;

/// Result of a non-blocking read
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadOutcome {
    /// `n > 0` bytes were copied into the buffer
    Data(usize),
    /// Nothing buffered right now
    WouldBlock,
    /// Peer performed an orderly close
    Closed,
}

/// Result of a liveness probe
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Probe {
    /// Connected; data may or may not be pending
    Alive,
    /// Orderly close observed
    Closed,
    /// Socket reported an error
    Failed,
}

/// Connection to the remote client
pub trait Transport {
    /// Read whatever is immediately available into `buf`, never blocking
    fn try_read(&mut self, buf: &mut [u8]) -> io::Result<ReadOutcome>;

    /// Write all of `data`, blocking up to the transport's write timeout
    fn send(&mut self, data: &[u8]) -> io::Result<()>;

    /// Check the connection without consuming pending bytes
    fn probe(&mut self) -> Probe;

    /// Shut the connection down; further calls fail
    fn close(&mut self);

    /// Remote address, if known
    fn peer_addr(&self) -> Option<SocketAddr> {
        None
    }
}
