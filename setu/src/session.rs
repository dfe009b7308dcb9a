//! The single active client connection
//!
//! A [`Session`] bundles everything whose lifetime is one connection: the
//! socket, the frozen handshake, the frame buffer sized from it, the
//! offscreen render target and the lazily opened video sink. It is created
//! by [`Session::open`] and destroyed by [`Session::close`], the one teardown
//! path every disconnect reason funnels into.
//!
//! # Lifecycle
//!
//! ```text
//! accept ─▶ open ─▶ allocate target ─▶ write handshake ─▶ active
//!                        │                   │
//!                        └─ Err ─▶ drop      └─ Err ─▶ broken ─▶ close (next check)
//! active ─▶ dead / unknown command / shutdown ─▶ close
//! ```

use crate::bridge::{CameraTable, SimBridge};
use crate::capture::{OffscreenTarget, VideoSink};
use crate::engine::Engine;
use crate::error::{Error, Result};
use crate::protocol::{FrameBuffer, Handshake};
use crate::transport::{TcpTransport, Transport};
use std::net::SocketAddr;
use std::time::Instant;

pub struct Session<T: Transport = TcpTransport> {
    pub(crate) id: u64,
    pub(crate) peer: Option<SocketAddr>,
    pub(crate) transport: T,
    pub(crate) handshake: Handshake,
    pub(crate) cameras: CameraTable,
    pub(crate) frames: FrameBuffer,
    pub(crate) target: OffscreenTarget,
    pub(crate) video: Option<VideoSink>,
    /// Decoded pose / mocap floats, reused across commands
    pub(crate) scratch: Vec<f32>,
    pub(crate) broken: bool,
    pub(crate) last_liveness_check: Instant,
    pub(crate) save_prompt_pending: bool,
    /// SetPose count since connect or the last SetTarget
    pub(crate) pose_updates: u64,
    pub(crate) commands: u64,
    pub(crate) opened_at: Instant,
}

impl<T: Transport> Session<T> {
    /// Set up resources for a freshly accepted client and send the handshake
    ///
    /// A render target failure drops the client and is returned. A handshake
    /// write failure only marks the session broken; it is torn down at the
    /// next liveness check like any other lost connection.
    pub fn open<E: Engine + ?Sized>(id: u64, mut transport: T, engine: &mut E, now: Instant) -> Result<Self> {
        let mut bridge = SimBridge::new(engine);
        let size = bridge.model_size();
        let cameras = bridge.camera_table(size.ncamera);
        let handshake = Handshake::new(&size, cameras.resolution());

        let target = match bridge.allocate_target(handshake.width, handshake.height) {
            Ok(target) => target,
            Err(e) => {
                transport.close();
                return Err(e);
            }
        };

        let peer = transport.peer_addr();
        let mut session = Self {
            id,
            peer,
            transport,
            handshake,
            cameras,
            frames: FrameBuffer::new(handshake),
            target,
            video: None,
            scratch: Vec::with_capacity(handshake.nqpos.max(7 * handshake.nmocap)),
            broken: false,
            last_liveness_check: now,
            save_prompt_pending: false,
            pose_updates: 0,
            commands: 0,
            opened_at: now,
        };

        log::info!(
            "Session {} opened for {}: nqpos={} nmocap={} ncamera={} {}x{}",
            id,
            session.peer_label(),
            handshake.nqpos,
            handshake.nmocap,
            handshake.ncamera,
            handshake.width,
            handshake.height
        );

        if let Err(e) = session.send(&handshake.encode()) {
            log::warn!("Session {}: handshake write failed: {}", id, e);
        }
        Ok(session)
    }

    /// Write a complete response; a failure marks the session broken
    pub fn send(&mut self, data: &[u8]) -> Result<()> {
        send_on(&mut self.transport, &mut self.broken, data)
    }

    /// Write the last captured frame
    pub fn send_frame(&mut self) -> Result<()> {
        send_on(&mut self.transport, &mut self.broken, self.target.pixels())
    }

    pub fn mark_broken(&mut self) {
        if !self.broken {
            log::debug!("Session {} marked broken", self.id);
        }
        self.broken = true;
    }

    pub fn is_broken(&self) -> bool {
        self.broken
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn handshake(&self) -> &Handshake {
        &self.handshake
    }

    pub fn pose_updates(&self) -> u64 {
        self.pose_updates
    }

    pub fn save_prompt_pending(&self) -> bool {
        self.save_prompt_pending
    }

    fn peer_label(&self) -> String {
        self.peer
            .map(|p| p.to_string())
            .unwrap_or_else(|| "unknown peer".to_string())
    }

    /// Release everything the session owns
    pub fn close<E: Engine + ?Sized>(mut self, engine: &mut E) {
        self.close_video();
        SimBridge::new(engine).release_target(self.target);
        self.transport.close();
        log::info!(
            "Session {} closed ({} commands in {:.1}s)",
            self.id,
            self.commands,
            self.opened_at.elapsed().as_secs_f32()
        );
    }

    /// Close socket and sink without an engine; the render target leaks
    pub(crate) fn abandon(mut self) {
        self.close_video();
        self.transport.close();
        log::warn!(
            "Session {} dropped without engine, render target {:?} not released",
            self.id,
            self.target.handle()
        );
    }

    fn close_video(&mut self) {
        if let Some(video) = self.video.take()
            && let Err(e) = video.close()
        {
            log::warn!("Session {}: failed to close video sink: {}", self.id, e);
        }
    }
}

fn send_on<T: Transport>(transport: &mut T, broken: &mut bool, data: &[u8]) -> Result<()> {
    if *broken {
        return Err(Error::Disconnected);
    }
    transport.send(data).map_err(|e| {
        *broken = true;
        Error::Transport(e)
    })
}
