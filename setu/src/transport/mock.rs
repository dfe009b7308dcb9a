//! Mock transport for testing

use super::{Probe, ReadOutcome, Transport};
use std::collections::VecDeque;
use std::io;
use std::sync::{Arc, Mutex};

/// In-memory transport; clones share the same buffers
#[derive(Clone, Default)]
pub struct MockTransport {
    inner: Arc<Mutex<MockTransportInner>>,
}

#[derive(Default)]
struct MockTransportInner {
    read_buffer: VecDeque<u8>,
    write_buffer: Vec<u8>,
    peer_closed: bool,
    fail_writes: bool,
    closed: bool,
    probes: usize,
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inject data to be read
    pub fn inject_read(&self, data: &[u8]) {
        let mut inner = self.inner.lock().unwrap();
        inner.read_buffer.extend(data);
    }

    /// Get all written data
    pub fn get_written(&self) -> Vec<u8> {
        let inner = self.inner.lock().unwrap();
        inner.write_buffer.clone()
    }

    /// Clear written data
    pub fn clear_written(&self) {
        let mut inner = self.inner.lock().unwrap();
        inner.write_buffer.clear();
    }

    /// Simulate an orderly close by the peer (after buffered bytes drain)
    pub fn close_peer(&self) {
        self.inner.lock().unwrap().peer_closed = true;
    }

    /// Make every subsequent write fail with a broken pipe
    pub fn fail_writes(&self) {
        self.inner.lock().unwrap().fail_writes = true;
    }

    pub fn is_closed(&self) -> bool {
        self.inner.lock().unwrap().closed
    }

    pub fn probe_count(&self) -> usize {
        self.inner.lock().unwrap().probes
    }
}

impl Transport for MockTransport {
    fn try_read(&mut self, buf: &mut [u8]) -> io::Result<ReadOutcome> {
        let mut inner = self.inner.lock().unwrap();
        if inner.closed {
            return Err(io::ErrorKind::NotConnected.into());
        }
        if inner.read_buffer.is_empty() {
            return Ok(if inner.peer_closed {
                ReadOutcome::Closed
            } else {
                ReadOutcome::WouldBlock
            });
        }

        let available = inner.read_buffer.len().min(buf.len());
        for item in buf.iter_mut().take(available) {
            *item = inner.read_buffer.pop_front().unwrap();
        }
        Ok(ReadOutcome::Data(available))
    }

    fn send(&mut self, data: &[u8]) -> io::Result<()> {
        let mut inner = self.inner.lock().unwrap();
        if inner.closed || inner.fail_writes || inner.peer_closed {
            return Err(io::ErrorKind::BrokenPipe.into());
        }
        inner.write_buffer.extend_from_slice(data);
        Ok(())
    }

    fn probe(&mut self) -> Probe {
        let mut inner = self.inner.lock().unwrap();
        inner.probes += 1;
        if inner.closed {
            Probe::Failed
        } else if inner.peer_closed && inner.read_buffer.is_empty() {
            Probe::Closed
        } else {
            Probe::Alive
        }
    }

    fn close(&mut self) {
        self.inner.lock().unwrap().closed = true;
    }
}
