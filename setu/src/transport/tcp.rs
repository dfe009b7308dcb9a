//! TCP transport for the accepted client socket

use super::{Probe, ReadOutcome, Transport};
use std::io::{self, Read, Write};
use std::net::{Shutdown, SocketAddr, TcpStream};
use std::time::Duration;

/// Accepted client socket
///
/// The stream stays in non-blocking mode so reads and probes never stall the
/// tick. Writes switch to blocking mode for their duration, bounded by the
/// write timeout.
pub struct TcpTransport {
    stream: TcpStream,
    peer: SocketAddr,
}

impl TcpTransport {
    /// Configure a freshly accepted stream
    pub fn new(stream: TcpStream, peer: SocketAddr, write_timeout: Duration) -> io::Result<Self> {
        stream.set_nonblocking(true)?;
        stream.set_write_timeout(Some(write_timeout))?;
        if let Err(e) = stream.set_nodelay(true) {
            log::warn!("Failed to set TCP_NODELAY for {}: {}", peer, e);
        }
        Ok(Self { stream, peer })
    }
}

impl Transport for TcpTransport {
    fn try_read(&mut self, buf: &mut [u8]) -> io::Result<ReadOutcome> {
        if buf.is_empty() {
            return Ok(ReadOutcome::WouldBlock);
        }
        loop {
            match self.stream.read(buf) {
                Ok(0) => return Ok(ReadOutcome::Closed),
                Ok(n) => return Ok(ReadOutcome::Data(n)),
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => {
                    return Ok(ReadOutcome::WouldBlock);
                }
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e),
            }
        }
    }

    fn send(&mut self, data: &[u8]) -> io::Result<()> {
        self.stream.set_nonblocking(false)?;
        let written = self.stream.write_all(data).and_then(|()| self.stream.flush());
        let restored = self.stream.set_nonblocking(true);
        written?;
        restored
    }

    fn probe(&mut self) -> Probe {
        match self.stream.take_error() {
            Ok(None) => {}
            Ok(Some(e)) => {
                log::debug!("Socket error on {}: {}", self.peer, e);
                return Probe::Failed;
            }
            Err(_) => return Probe::Failed,
        }

        let mut byte = [0u8; 1];
        match self.stream.peek(&mut byte) {
            Ok(0) => Probe::Closed,
            Ok(_) => Probe::Alive,
            Err(e)
                if e.kind() == io::ErrorKind::WouldBlock
                    || e.kind() == io::ErrorKind::Interrupted =>
            {
                Probe::Alive
            }
            Err(e) => {
                log::debug!("Peek failed on {}: {}", self.peer, e);
                Probe::Failed
            }
        }
    }

    fn close(&mut self) {
        let _ = self.stream.shutdown(Shutdown::Both);
    }

    fn peer_addr(&self) -> Option<SocketAddr> {
        Some(self.peer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::TcpListener;

    fn connected_pair() -> (TcpTransport, TcpStream) {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let client = TcpStream::connect(listener.local_addr().unwrap()).unwrap();
        let (stream, peer) = listener.accept().unwrap();
        let transport = TcpTransport::new(stream, peer, Duration::from_secs(1)).unwrap();
        (transport, client)
    }

    fn read_until_data(transport: &mut TcpTransport, buf: &mut [u8]) -> ReadOutcome {
        for _ in 0..200 {
            match transport.try_read(buf).unwrap() {
                ReadOutcome::WouldBlock => std::thread::sleep(Duration::from_millis(5)),
                other => return other,
            }
        }
        ReadOutcome::WouldBlock
    }

    #[test]
    fn test_read_is_non_blocking() {
        let (mut transport, _client) = connected_pair();
        let mut buf = [0u8; 4];
        assert_eq!(transport.try_read(&mut buf).unwrap(), ReadOutcome::WouldBlock);
        assert_eq!(transport.probe(), Probe::Alive);
    }

    #[test]
    fn test_send_and_receive() {
        let (mut transport, mut client) = connected_pair();

        transport.send(&[1, 2, 3, 4]).unwrap();
        let mut echo = [0u8; 4];
        client.read_exact(&mut echo).unwrap();
        assert_eq!(echo, [1, 2, 3, 4]);

        client.write_all(&[9, 8]).unwrap();
        let mut buf = [0u8; 8];
        assert_eq!(read_until_data(&mut transport, &mut buf), ReadOutcome::Data(2));
        assert_eq!(&buf[..2], &[9, 8]);
    }

    #[test]
    fn test_probe_does_not_consume() {
        let (mut transport, mut client) = connected_pair();
        client.write_all(&[7]).unwrap();

        let mut buf = [0u8; 1];
        std::thread::sleep(Duration::from_millis(20));
        for _ in 0..50 {
            assert_eq!(transport.probe(), Probe::Alive);
        }
        assert_eq!(read_until_data(&mut transport, &mut buf), ReadOutcome::Data(1));
        assert_eq!(buf[0], 7);
    }

    #[test]
    fn test_orderly_close_detected() {
        let (mut transport, client) = connected_pair();
        drop(client);

        let mut probe = Probe::Alive;
        for _ in 0..200 {
            probe = transport.probe();
            if probe != Probe::Alive {
                break;
            }
            std::thread::sleep(Duration::from_millis(5));
        }
        assert_eq!(probe, Probe::Closed);

        let mut buf = [0u8; 4];
        assert_eq!(transport.try_read(&mut buf).unwrap(), ReadOutcome::Closed);
    }
}
