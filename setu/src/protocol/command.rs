//! Command ids and the static payload table

use super::codec::Handshake;
use crate::error::{Error, Result};

/// Wire command id
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(i32)]
pub enum CommandId {
    None = 0,
    GetInput = 1,
    GetImage = 2,
    SaveSnapshot = 3,
    SaveVideoFrame = 4,
    SetCamera = 5,
    SetPose = 6,
    SetMocap = 7,
    GetControllerInput = 8,
    SetTarget = 9,
    SetTargetStatus = 10,
    GetSaveStatus = 11,
}

impl CommandId {
    /// Every command, in wire order
    pub const ALL: [CommandId; 12] = [
        CommandId::None,
        CommandId::GetInput,
        CommandId::GetImage,
        CommandId::SaveSnapshot,
        CommandId::SaveVideoFrame,
        CommandId::SetCamera,
        CommandId::SetPose,
        CommandId::SetMocap,
        CommandId::GetControllerInput,
        CommandId::SetTarget,
        CommandId::SetTargetStatus,
        CommandId::GetSaveStatus,
    ];

    /// Map a raw wire id, `None` when the id is not in the table
    pub fn from_wire(id: i32) -> Option<Self> {
        let command = match id {
            0 => CommandId::None,
            1 => CommandId::GetInput,
            2 => CommandId::GetImage,
            3 => CommandId::SaveSnapshot,
            4 => CommandId::SaveVideoFrame,
            5 => CommandId::SetCamera,
            6 => CommandId::SetPose,
            7 => CommandId::SetMocap,
            8 => CommandId::GetControllerInput,
            9 => CommandId::SetTarget,
            10 => CommandId::SetTargetStatus,
            11 => CommandId::GetSaveStatus,
            _ => return None,
        };
        Some(command)
    }

    /// Raw wire id
    #[inline]
    pub fn as_i32(self) -> i32 {
        self as i32
    }

    /// Bytes that follow the id on the wire for this session
    pub fn payload_size(self, handshake: &Handshake) -> usize {
        match self {
            CommandId::None
            | CommandId::GetInput
            | CommandId::GetImage
            | CommandId::SaveSnapshot
            | CommandId::SaveVideoFrame
            | CommandId::GetControllerInput
            | CommandId::GetSaveStatus => 0,
            CommandId::SetCamera | CommandId::SetTargetStatus => 4,
            CommandId::SetTarget => 12,
            CommandId::SetPose => handshake.pose_payload_size(),
            CommandId::SetMocap => handshake.mocap_payload_size(),
        }
    }

    /// Fixed response size, `None` for commands that answer nothing or answer later
    pub fn response_size(self, handshake: &Handshake) -> Option<usize> {
        match self {
            CommandId::GetInput => Some(super::codec::INPUT_REPORT_SIZE),
            CommandId::GetImage => Some(handshake.image_size()),
            CommandId::GetControllerInput => Some(super::codec::CONTROLLER_REPORT_SIZE),
            _ => None,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            CommandId::None => "None",
            CommandId::GetInput => "GetInput",
            CommandId::GetImage => "GetImage",
            CommandId::SaveSnapshot => "SaveSnapshot",
            CommandId::SaveVideoFrame => "SaveVideoFrame",
            CommandId::SetCamera => "SetCamera",
            CommandId::SetPose => "SetPose",
            CommandId::SetMocap => "SetMocap",
            CommandId::GetControllerInput => "GetControllerInput",
            CommandId::SetTarget => "SetTarget",
            CommandId::SetTargetStatus => "SetTargetStatus",
            CommandId::GetSaveStatus => "GetSaveStatus",
        }
    }
}

impl TryFrom<i32> for CommandId {
    type Error = Error;

    fn try_from(id: i32) -> Result<Self> {
        CommandId::from_wire(id).ok_or(Error::UnknownCommand(id))
    }
}

impl std::fmt::Display for CommandId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}({})", self.name(), self.as_i32())
    }
}
