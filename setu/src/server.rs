//! Connection lifecycle manager
//!
//! [`RemoteServer`] owns the listening socket and at most one [`Session`].
//! The host calls [`RemoteServer::tick`] once per render frame; everything
//! (accept, liveness, command dispatch, capture) runs inside that call on the
//! host's thread.
//!
//! # Tick
//!
//! ```text
//! ┌────────────────────┐  dead   ┌──────────┐
//! │ liveness check     │────────▶│ teardown │
//! └─────────┬──────────┘         └────┬─────┘
//!           ▼                         ▼
//! ┌────────────────────┐  accepted  ┌──────────────────────────────┐
//! │ no session: accept │──────────▶│ allocate target + handshake  │
//! └─────────┬──────────┘            └──────────────────────────────┘
//!           ▼
//! ┌────────────────────┐  unknown id  ┌──────────┐
//! │ drain commands     │─────────────▶│ teardown │
//! └────────────────────┘              └──────────┘
//! ```
//!
//! Only one client is served at a time. Further connection attempts wait in
//! the listener backlog until the current session ends.

use crate::bridge::SimBridge;
use crate::config::AppConfig;
use crate::dispatcher::{Dispatcher, DrainOutcome};
use crate::engine::{CameraIndex, Engine, TargetMarker};
use crate::error::{Error, Result};
use crate::host::HostState;
use crate::liveness::LivenessMonitor;
use crate::protocol::{ControllerState, SaveDecision};
use crate::session::Session;
use crate::transport::TcpTransport;
use std::io;
use std::net::{SocketAddr, TcpListener};
use std::time::{Duration, Instant};

/// What happened during one tick
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TickReport {
    /// Active session after the tick
    pub session: Option<u64>,
    /// A client was accepted this tick
    pub connected: bool,
    /// A session was torn down this tick
    pub disconnected: bool,
    /// Commands executed
    pub commands: usize,
    /// Commands whose handler failed
    pub failed_commands: usize,
}

pub struct RemoteServer {
    listener: Option<TcpListener>,
    local_addr: SocketAddr,
    session: Option<Session<TcpTransport>>,
    next_session_id: u64,
    liveness: LivenessMonitor,
    dispatcher: Dispatcher,
    host: HostState,
    write_timeout: Duration,
}

impl RemoteServer {
    /// Bind the listener; no client is accepted until the first tick
    pub fn start(config: &AppConfig) -> Result<Self> {
        let address = config.network.bind_address();
        let listener = TcpListener::bind(&address).map_err(|source| Error::Bind {
            address: address.clone(),
            source,
        })?;
        listener.set_nonblocking(true)?;
        let local_addr = listener.local_addr()?;

        log::info!("Remote server listening on {}", local_addr);

        Ok(Self {
            listener: Some(listener),
            local_addr,
            session: None,
            next_session_id: 1,
            liveness: LivenessMonitor::new(config.liveness.interval()),
            dispatcher: Dispatcher::new(&config.capture),
            host: HostState::default(),
            write_timeout: config.network.write_timeout(),
        })
    }

    /// Run one protocol step
    ///
    /// Only a render target allocation failure for a new client is returned
    /// as an error; connection problems end the session and are reported in
    /// the [`TickReport`].
    pub fn tick<E: Engine + ?Sized>(&mut self, engine: &mut E, now: Instant) -> Result<TickReport> {
        let mut report = TickReport::default();

        if let Some(session) = self.session.as_mut()
            && !self.liveness.check(session, now)
        {
            self.end_session(engine);
            report.disconnected = true;
        }

        if self.session.is_none() {
            report.connected = self.try_accept(engine, now)?;
        }

        if let Some(session) = self.session.as_mut() {
            let drain = self.dispatcher.drain(session, engine, &mut self.host);
            report.commands = drain.processed;
            report.failed_commands = drain.failed;

            if let DrainOutcome::ProtocolViolation(id) = drain.outcome {
                log::warn!("Closing session after unknown command id {}", id);
                self.end_session(engine);
                report.disconnected = true;
            }
        }

        report.session = self.session_id();
        Ok(report)
    }

    /// Accept one pending client, if any
    fn try_accept<E: Engine + ?Sized>(&mut self, engine: &mut E, now: Instant) -> Result<bool> {
        let Some(listener) = self.listener.as_ref() else {
            return Ok(false);
        };

        let (stream, peer) = match listener.accept() {
            Ok(accepted) => accepted,
            Err(e) if e.kind() == io::ErrorKind::WouldBlock => return Ok(false),
            Err(e) => {
                log::warn!("Accept error: {}", e);
                return Ok(false);
            }
        };

        log::info!("Client connected: {}", peer);
        let transport = match TcpTransport::new(stream, peer, self.write_timeout) {
            Ok(transport) => transport,
            Err(e) => {
                log::error!("Failed to configure socket for {}: {}", peer, e);
                return Ok(false);
            }
        };

        let id = self.next_session_id;
        self.next_session_id += 1;
        let session = Session::open(id, transport, engine, now).inspect_err(|e| {
            log::error!("Dropping client {}: {}", peer, e);
        })?;
        // The active camera survives reconnects but must fit the new model
        self.host.camera = session.cameras.clamp(self.host.camera);
        SimBridge::new(engine).refresh_scene(self.host.camera, &session.cameras);
        self.session = Some(session);
        Ok(true)
    }

    /// Single teardown path for the active session
    fn end_session<E: Engine + ?Sized>(&mut self, engine: &mut E) {
        if let Some(session) = self.session.take() {
            session.close(engine);
        }
    }

    /// Tear down the session and close the listener
    pub fn shutdown<E: Engine + ?Sized>(&mut self, engine: &mut E) {
        self.end_session(engine);
        if self.listener.take().is_some() {
            log::info!("Remote server on {} stopped", self.local_addr);
        }
    }

    // ========================================================================
    // Host-facing state
    // ========================================================================

    /// Remember the last key pressed on the host
    pub fn record_key(&mut self, code: i32) {
        self.host.last_key = code;
    }

    /// Latest hand-controller telemetry for GetControllerInput
    pub fn set_controller(&mut self, state: ControllerState) {
        self.host.controller = state;
    }

    /// Deliver the operator's answer to a pending save prompt
    ///
    /// Returns true when an answer was written. A write failure marks the
    /// session broken.
    pub fn answer_save_prompt(&mut self, decision: SaveDecision) -> bool {
        let Some(session) = self.session.as_mut() else {
            return false;
        };
        if !session.save_prompt_pending {
            return false;
        }
        session.save_prompt_pending = false;
        match session.send(&decision.encode()) {
            Ok(()) => {
                log::info!("Session {}: save decision {:?}", session.id, decision);
                true
            }
            Err(e) => {
                log::warn!("Session {}: failed to send save decision: {}", session.id, e);
                false
            }
        }
    }

    pub fn save_prompt_pending(&self) -> bool {
        self.session
            .as_ref()
            .is_some_and(|s| s.save_prompt_pending())
    }

    pub fn is_connected(&self) -> bool {
        self.session.is_some()
    }

    pub fn session_id(&self) -> Option<u64> {
        self.session.as_ref().map(|s| s.id())
    }

    /// SetPose count of the active session since connect or the last SetTarget
    pub fn pose_updates(&self) -> Option<u64> {
        self.session.as_ref().map(|s| s.pose_updates())
    }

    pub fn target(&self) -> TargetMarker {
        self.host.target
    }

    /// Camera used for captures
    pub fn camera(&self) -> CameraIndex {
        self.host.camera
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Index the next snapshot file will use
    pub fn next_snapshot(&self) -> u64 {
        self.dispatcher.next_snapshot()
    }
}

impl Drop for RemoteServer {
    fn drop(&mut self) {
        if let Some(session) = self.session.take() {
            session.abandon();
        }
    }
}
