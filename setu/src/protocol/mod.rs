//! Remote wire protocol
//!
//! One TCP connection carries a fixed binary protocol. All integers and
//! floats are little-endian, 4 bytes wide.
//!
//! # Handshake
//!
//! Written once by the server right after accept, before any command is read:
//!
//! ```text
//! ┌────────┬────────┬─────────┬───────┬────────┐
//! │ nqpos  │ nmocap │ ncamera │ width │ height │
//! │  i32   │  i32   │   i32   │  i32  │  i32   │
//! └────────┴────────┴─────────┴───────┴────────┘
//! ```
//!
//! # Command Frames
//!
//! ```text
//! ┌──────────────┬──────────────────────────────────────┐
//! │ Id (i32 LE)  │ Payload (fixed size per id, no len)  │
//! └──────────────┴──────────────────────────────────────┘
//! ```
//!
//! | Id | Command | Payload | Response |
//! |----|---------|---------|----------|
//! | 0 | `None` | 0 | - |
//! | 1 | `GetInput` | 0 | 40 bytes |
//! | 2 | `GetImage` | 0 | `width*height*3` bytes |
//! | 3 | `SaveSnapshot` | 0 | - |
//! | 4 | `SaveVideoFrame` | 0 | - |
//! | 5 | `SetCamera` | 4 | - |
//! | 6 | `SetPose` | `4*nqpos` | - |
//! | 7 | `SetMocap` | `28*nmocap` | - |
//! | 8 | `GetControllerInput` | 0 | 32 bytes |
//! | 9 | `SetTarget` | 12 | - |
//! | 10 | `SetTargetStatus` | 4 | - |
//! | 11 | `GetSaveStatus` | 0 | 4 bytes, once the host answers |
//!
//! Payload sizes depend on the handshake, so the same table is only valid for
//! the session that sent it.

pub mod codec;
pub mod command;
pub mod frame;

pub use codec::{ControllerState, Handshake, InputReport, SaveDecision};
pub use command::CommandId;
pub use frame::FrameBuffer;
