//! Per-tick command dispatch
//!
//! Each tick the dispatcher drains every complete frame already buffered on
//! the socket, in arrival order, and runs its handler before returning:
//!
//! ```text
//! Idle ──▶ Draining ──┬─ no bytes / partial frame ──▶ Idle (resume next tick)
//!                     ├─ read or write failure ─────▶ session broken
//!                     └─ unknown command id ────────▶ protocol violation
//! ```
//!
//! Engine and artifact failures only fail the command that caused them; the
//! drain continues with the next frame.

use crate::bridge::SimBridge;
use crate::capture::{SnapshotWriter, VideoSink};
use crate::config::CaptureConfig;
use crate::engine::Engine;
use crate::error::{Error, Result};
use crate::host::HostState;
use crate::protocol::codec::{SCALAR_PAYLOAD_SIZE, decode_f32s, decode_f32s_into, read_i32};
use crate::protocol::CommandId;
use crate::session::Session;
use crate::transport::Transport;
use std::path::PathBuf;

/// How a drain ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DrainOutcome {
    /// No bytes left on the socket
    Idle,
    /// An incomplete frame is held for the next tick
    Partial,
    /// The connection failed or closed; the session is marked broken
    TransportLost,
    /// Command id not in the table; the session must end now
    ProtocolViolation(i32),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DrainReport {
    /// Commands executed, including failed ones
    pub processed: usize,
    /// Commands whose handler returned an error
    pub failed: usize,
    pub outcome: DrainOutcome,
}

/// Decoded frame, detached from the frame buffer
///
/// Pose and mocap floats are decoded into the session scratch buffer.
#[derive(Debug, Clone, Copy, PartialEq)]
enum Request {
    None,
    GetInput,
    GetImage,
    SaveSnapshot,
    SaveVideoFrame,
    SetCamera(i32),
    SetPose,
    SetMocap,
    GetControllerInput,
    SetTarget([f32; 3]),
    SetTargetStatus(i32),
    GetSaveStatus,
}

impl Request {
    fn decode(command: CommandId, payload: &[u8], scratch: &mut Vec<f32>) -> Self {
        match command {
            CommandId::None => Request::None,
            CommandId::GetInput => Request::GetInput,
            CommandId::GetImage => Request::GetImage,
            CommandId::SaveSnapshot => Request::SaveSnapshot,
            CommandId::SaveVideoFrame => Request::SaveVideoFrame,
            CommandId::SetCamera => Request::SetCamera(scalar(payload)),
            CommandId::SetPose => {
                decode_f32s_into(payload, scratch);
                Request::SetPose
            }
            CommandId::SetMocap => {
                decode_f32s_into(payload, scratch);
                Request::SetMocap
            }
            CommandId::GetControllerInput => Request::GetControllerInput,
            CommandId::SetTarget => {
                let mut position = [0.0; 3];
                decode_f32s(payload, &mut position);
                Request::SetTarget(position)
            }
            CommandId::SetTargetStatus => Request::SetTargetStatus(scalar(payload)),
            CommandId::GetSaveStatus => Request::GetSaveStatus,
        }
    }
}

fn scalar(payload: &[u8]) -> i32 {
    if payload.len() >= SCALAR_PAYLOAD_SIZE {
        read_i32(payload, 0)
    } else {
        0
    }
}

/// Command state machine plus the process-lifetime capture sinks
pub struct Dispatcher {
    snapshots: SnapshotWriter,
    video_path: PathBuf,
}

impl Dispatcher {
    pub fn new(capture: &CaptureConfig) -> Self {
        Self {
            snapshots: SnapshotWriter::new(&capture.output_dir, capture.snapshot_prefix.as_str()),
            video_path: capture.video_path(),
        }
    }

    /// Index of the next snapshot file
    pub fn next_snapshot(&self) -> u64 {
        self.snapshots.next_index()
    }

    /// Run every complete command buffered on the session
    pub fn drain<T: Transport, E: Engine + ?Sized>(
        &mut self,
        session: &mut Session<T>,
        engine: &mut E,
        host: &mut HostState,
    ) -> DrainReport {
        let mut report = DrainReport {
            processed: 0,
            failed: 0,
            outcome: DrainOutcome::Idle,
        };

        loop {
            if session.broken {
                report.outcome = DrainOutcome::TransportLost;
                break;
            }

            let command = match session.frames.poll(&mut session.transport) {
                Ok(Some(command)) => command,
                Ok(None) => {
                    if session.frames.has_partial() {
                        report.outcome = DrainOutcome::Partial;
                    }
                    break;
                }
                Err(Error::UnknownCommand(id)) => {
                    log::warn!("Session {}: unknown command id {}", session.id, id);
                    report.outcome = DrainOutcome::ProtocolViolation(id);
                    break;
                }
                Err(e) => {
                    log::info!("Session {}: read failed: {}", session.id, e);
                    session.mark_broken();
                    report.outcome = DrainOutcome::TransportLost;
                    break;
                }
            };

            let request = Request::decode(command, session.frames.payload(), &mut session.scratch);
            session.frames.consume();
            session.commands += 1;
            report.processed += 1;
            log::debug!("Session {}: {}", session.id, command);

            if let Err(e) = self.execute(request, session, engine, host) {
                if e.is_transport() {
                    log::info!("Session {}: {} failed: {}", session.id, command, e);
                    session.mark_broken();
                    report.outcome = DrainOutcome::TransportLost;
                    break;
                }
                log::warn!("Session {}: {} failed: {}", session.id, command, e);
                report.failed += 1;
            }
        }

        report
    }

    fn execute<T: Transport, E: Engine + ?Sized>(
        &mut self,
        request: Request,
        session: &mut Session<T>,
        engine: &mut E,
        host: &mut HostState,
    ) -> Result<()> {
        let mut bridge = SimBridge::new(engine);

        match request {
            Request::None => Ok(()),

            Request::GetInput => {
                let report = bridge.input_report(host.take_key());
                session.send(&report.encode())
            }

            Request::GetImage => {
                // The client always reads a full frame; on failure it gets the
                // previous mirror contents
                let captured = bridge
                    .capture(host.camera, &session.cameras, &mut session.target)
                    .map(|_| ());
                session.send_frame()?;
                captured
            }

            Request::SaveSnapshot => {
                let frame = bridge.capture(host.camera, &session.cameras, &mut session.target)?;
                let path = self
                    .snapshots
                    .save(frame, session.handshake.width, session.handshake.height)?;
                log::info!("Session {}: snapshot {}", session.id, path.display());
                Ok(())
            }

            Request::SaveVideoFrame => {
                if session.video.is_none() {
                    session.video = Some(VideoSink::create(&self.video_path)?);
                }
                let frame = bridge.capture(host.camera, &session.cameras, &mut session.target)?;
                match session.video.as_mut() {
                    Some(video) => video.append(frame),
                    None => Ok(()),
                }
            }

            Request::SetCamera(requested) => {
                let camera = session.cameras.clamp(requested);
                if camera != requested {
                    log::debug!("Camera {} clamped to {}", requested, camera);
                }
                host.camera = camera;
                Ok(())
            }

            Request::SetPose => {
                session.pose_updates += 1;
                if session.handshake.nqpos == 0 {
                    return Ok(());
                }
                bridge.set_pose(&session.scratch)?;
                bridge.refresh_scene(host.camera, &session.cameras);
                Ok(())
            }

            Request::SetMocap => {
                let nmocap = session.handshake.nmocap;
                if nmocap == 0 {
                    return Ok(());
                }
                let (positions, orientations) = session.scratch.split_at(3 * nmocap);
                bridge.set_mocap(positions, orientations)?;
                bridge.refresh_scene(host.camera, &session.cameras);
                Ok(())
            }

            Request::GetControllerInput => session.send(&host.controller.encode()),

            Request::SetTarget(position) => {
                host.target.position = position;
                session.pose_updates = 0;
                bridge.set_target_marker(&host.target);
                Ok(())
            }

            Request::SetTargetStatus(status) => {
                host.target.highlighted = status >= 0;
                bridge.set_target_marker(&host.target);
                Ok(())
            }

            Request::GetSaveStatus => {
                if !session.save_prompt_pending {
                    log::info!("Session {}: waiting for save decision", session.id);
                }
                session.save_prompt_pending = true;
                Ok(())
            }
        }
    }
}
