//! Reusable receive buffer for command frames
//!
//! The buffer is allocated once per session, sized to the largest frame the
//! session's handshake allows (`HEADER_SIZE + max_payload_size`), and reused
//! for every command. Reads are non-blocking and only ever request the bytes
//! still missing from the current frame, so a frame that arrives in pieces is
//! completed across ticks and the next frame's bytes are never consumed early.
//!
//! ```text
//! poll ─▶ header incomplete ─▶ WouldBlock ─▶ Ok(None), resume next tick
//!     └─▶ header complete ─▶ id lookup ─▶ unknown ─▶ Err(UnknownCommand)
//!                                     └─▶ payload complete ─▶ Ok(Some(id))
//! ```

use super::codec::{HEADER_SIZE, Handshake, read_i32};
use super::command::CommandId;
use crate::error::{Error, Result};
use crate::transport::{ReadOutcome, Transport};

/// Per-session frame accumulator
pub struct FrameBuffer {
    data: Vec<u8>,
    filled: usize,
    /// Decoded header of the frame being assembled and its payload size
    pending: Option<(CommandId, usize)>,
    handshake: Handshake,
}

impl FrameBuffer {
    pub fn new(handshake: Handshake) -> Self {
        Self {
            data: vec![0u8; HEADER_SIZE + handshake.max_payload_size()],
            filled: 0,
            pending: None,
            handshake,
        }
    }

    /// Advance the current frame with whatever the transport has buffered
    ///
    /// Returns `Ok(Some(id))` once the frame is complete; the payload stays
    /// available through [`payload`](Self::payload) until
    /// [`consume`](Self::consume). `Ok(None)` means no complete frame yet.
    pub fn poll<T: Transport + ?Sized>(&mut self, transport: &mut T) -> Result<Option<CommandId>> {
        loop {
            let needed = match self.pending {
                None => HEADER_SIZE,
                Some((_, payload)) => HEADER_SIZE + payload,
            };

            if self.filled < needed {
                match transport.try_read(&mut self.data[self.filled..needed]) {
                    Ok(ReadOutcome::Data(n)) => {
                        log::trace!("Frame buffer: +{} bytes ({}/{})", n, self.filled + n, needed);
                        self.filled += n;
                        continue;
                    }
                    Ok(ReadOutcome::WouldBlock) => return Ok(None),
                    Ok(ReadOutcome::Closed) => return Err(Error::Disconnected),
                    Err(e) => return Err(Error::Transport(e)),
                }
            }

            match self.pending {
                Some((command, _)) => return Ok(Some(command)),
                None => {
                    let command = CommandId::try_from(read_i32(&self.data, 0))?;
                    self.pending = Some((command, command.payload_size(&self.handshake)));
                }
            }
        }
    }

    /// Payload of the completed frame (empty for payload-less commands)
    pub fn payload(&self) -> &[u8] {
        match self.pending {
            Some((_, size)) if self.filled == HEADER_SIZE + size => {
                &self.data[HEADER_SIZE..HEADER_SIZE + size]
            }
            _ => &[],
        }
    }

    /// Release the completed frame so the next one can be assembled
    pub fn consume(&mut self) {
        self.filled = 0;
        self.pending = None;
    }

    /// True while bytes of an unfinished frame are held
    pub fn has_partial(&self) -> bool {
        self.filled > 0
    }

    /// Bytes allocated for the largest frame of this session
    pub fn capacity(&self) -> usize {
        self.data.len()
    }

    pub fn handshake(&self) -> &Handshake {
        &self.handshake
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::codec::{encode_command, f32_payload};
    use crate::transport::mock::MockTransport;

    fn handshake() -> Handshake {
        Handshake {
            nqpos: 3,
            nmocap: 1,
            ncamera: 2,
            width: 8,
            height: 4,
        }
    }

    #[test]
    fn test_capacity_fits_largest_frame() {
        let frames = FrameBuffer::new(handshake());
        // max(12, 4*3, 28*1) + header
        assert_eq!(frames.capacity(), 32);
    }

    #[test]
    fn test_empty_transport_yields_nothing() {
        let mut transport = MockTransport::new();
        let mut frames = FrameBuffer::new(handshake());
        assert_eq!(frames.poll(&mut transport).unwrap(), None);
        assert!(!frames.has_partial());
    }

    #[test]
    fn test_back_to_back_frames_stay_aligned() {
        let mut transport = MockTransport::new();
        let mut frames = FrameBuffer::new(handshake());

        let mut wire = encode_command(6, &f32_payload(&[1.0, 2.0, 3.0]));
        wire.extend(encode_command(1, &[]));
        wire.extend(encode_command(5, &7i32.to_le_bytes()));
        transport.inject_read(&wire);

        assert_eq!(frames.poll(&mut transport).unwrap(), Some(CommandId::SetPose));
        assert_eq!(frames.payload(), f32_payload(&[1.0, 2.0, 3.0]).as_slice());
        frames.consume();

        assert_eq!(frames.poll(&mut transport).unwrap(), Some(CommandId::GetInput));
        assert!(frames.payload().is_empty());
        frames.consume();

        assert_eq!(frames.poll(&mut transport).unwrap(), Some(CommandId::SetCamera));
        assert_eq!(frames.payload(), &7i32.to_le_bytes());
        frames.consume();

        assert_eq!(frames.poll(&mut transport).unwrap(), None);
    }

    #[test]
    fn test_partial_frame_resumes() {
        let mut transport = MockTransport::new();
        let mut frames = FrameBuffer::new(handshake());
        let wire = encode_command(9, &f32_payload(&[0.5, 0.25, 0.125]));

        transport.inject_read(&wire[..2]);
        assert_eq!(frames.poll(&mut transport).unwrap(), None);
        assert!(frames.has_partial());

        transport.inject_read(&wire[2..9]);
        assert_eq!(frames.poll(&mut transport).unwrap(), None);

        transport.inject_read(&wire[9..]);
        assert_eq!(frames.poll(&mut transport).unwrap(), Some(CommandId::SetTarget));
        assert_eq!(frames.payload(), &wire[4..]);
    }

    #[test]
    fn test_poll_is_idempotent_until_consumed() {
        let mut transport = MockTransport::new();
        let mut frames = FrameBuffer::new(handshake());
        transport.inject_read(&encode_command(2, &[]));
        transport.inject_read(&encode_command(3, &[]));

        assert_eq!(frames.poll(&mut transport).unwrap(), Some(CommandId::GetImage));
        assert_eq!(frames.poll(&mut transport).unwrap(), Some(CommandId::GetImage));
        frames.consume();
        assert_eq!(frames.poll(&mut transport).unwrap(), Some(CommandId::SaveSnapshot));
    }

    #[test]
    fn test_unknown_id() {
        let mut transport = MockTransport::new();
        let mut frames = FrameBuffer::new(handshake());
        transport.inject_read(&encode_command(42, &[]));
        assert!(matches!(
            frames.poll(&mut transport),
            Err(Error::UnknownCommand(42))
        ));
    }

    #[test]
    fn test_peer_close() {
        let mut transport = MockTransport::new();
        let mut frames = FrameBuffer::new(handshake());
        transport.inject_read(&[6, 0]);
        transport.close_peer();
        assert!(matches!(
            frames.poll(&mut transport),
            Err(Error::Disconnected)
        ));
    }

    #[test]
    fn test_read_error_is_transport() {
        let mut transport = MockTransport::new();
        let mut frames = FrameBuffer::new(handshake());
        transport.close();
        let err = frames.poll(&mut transport).unwrap_err();
        assert!(err.is_transport());
    }
}
