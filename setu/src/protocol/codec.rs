//! Fixed-layout little-endian payloads
//!
//! Stateless helpers for every structure that crosses the wire. Encoders
//! return fixed-size arrays so response writes never allocate; decoders take
//! byte slices straight out of the frame buffer.

use crate::engine::{ModelSize, Perturbation};
use serde::{Deserialize, Serialize};

/// Command id prefix
pub const HEADER_SIZE: usize = 4;

/// Handshake: five i32
pub const HANDSHAKE_SIZE: usize = 20;

/// GetInput response: key, select, active, refpos[3], refquat[4]
pub const INPUT_REPORT_SIZE: usize = 40;

/// GetControllerInput response: grip, position[3], orientation[4]
pub const CONTROLLER_REPORT_SIZE: usize = 32;

/// Per mocap body: position (3 f32) + quaternion (4 f32)
pub const MOCAP_BODY_SIZE: usize = 28;

/// SetTarget payload: 3 f32
pub const TARGET_PAYLOAD_SIZE: usize = 12;

/// SetCamera / SetTargetStatus payload: one i32
pub const SCALAR_PAYLOAD_SIZE: usize = 4;

/// Bytes per RGB24 pixel
pub const BYTES_PER_PIXEL: usize = 3;

/// Session parameters announced to the client right after accept
///
/// Frozen for the lifetime of the session: payload sizes of `SetPose` and
/// `SetMocap` and the image size are all derived from it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Handshake {
    pub nqpos: usize,
    pub nmocap: usize,
    pub ncamera: usize,
    pub width: u32,
    pub height: u32,
}

impl Handshake {
    /// Freeze the engine's model size and offscreen resolution
    pub fn new(size: &ModelSize, resolution: (u32, u32)) -> Self {
        Self {
            nqpos: size.nqpos,
            nmocap: size.nmocap,
            ncamera: size.ncamera,
            width: resolution.0,
            height: resolution.1,
        }
    }

    pub fn encode(&self) -> [u8; HANDSHAKE_SIZE] {
        let mut out = [0u8; HANDSHAKE_SIZE];
        let fields = [
            wire_count(self.nqpos),
            wire_count(self.nmocap),
            wire_count(self.ncamera),
            wire_count(self.width as usize),
            wire_count(self.height as usize),
        ];
        for (chunk, value) in out.chunks_exact_mut(4).zip(fields) {
            chunk.copy_from_slice(&value.to_le_bytes());
        }
        out
    }

    /// Parse a handshake as a client would; `None` on short input or negative counts
    pub fn decode(bytes: &[u8]) -> Option<Self> {
        if bytes.len() < HANDSHAKE_SIZE {
            return None;
        }
        let count = |offset: usize| usize::try_from(read_i32(bytes, offset)).ok();
        Some(Self {
            nqpos: count(0)?,
            nmocap: count(4)?,
            ncamera: count(8)?,
            width: u32::try_from(read_i32(bytes, 12)).ok()?,
            height: u32::try_from(read_i32(bytes, 16)).ok()?,
        })
    }

    /// SetPose payload: `4 * nqpos`
    #[inline]
    pub fn pose_payload_size(&self) -> usize {
        4 * self.nqpos
    }

    /// SetMocap payload: `28 * nmocap`
    #[inline]
    pub fn mocap_payload_size(&self) -> usize {
        MOCAP_BODY_SIZE * self.nmocap
    }

    /// One RGB24 frame
    #[inline]
    pub fn image_size(&self) -> usize {
        self.width as usize * self.height as usize * BYTES_PER_PIXEL
    }

    /// Largest payload any command can carry in this session
    pub fn max_payload_size(&self) -> usize {
        TARGET_PAYLOAD_SIZE
            .max(self.pose_payload_size())
            .max(self.mocap_payload_size())
    }
}

/// Clamp a count into the i32 wire range
fn wire_count(value: usize) -> i32 {
    i32::try_from(value).unwrap_or(i32::MAX)
}

/// GetInput response
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct InputReport {
    /// Last key code seen by the host, 0 when none
    pub key: i32,
    pub select: i32,
    pub active: i32,
    pub reference_position: [f32; 3],
    pub reference_orientation: [f32; 4],
}

impl InputReport {
    pub fn new(key: i32, perturbation: &Perturbation) -> Self {
        Self {
            key,
            select: perturbation.select,
            active: perturbation.active,
            reference_position: perturbation.reference_position,
            reference_orientation: perturbation.reference_orientation,
        }
    }

    pub fn encode(&self) -> [u8; INPUT_REPORT_SIZE] {
        let mut out = [0u8; INPUT_REPORT_SIZE];
        out[0..4].copy_from_slice(&self.key.to_le_bytes());
        out[4..8].copy_from_slice(&self.select.to_le_bytes());
        out[8..12].copy_from_slice(&self.active.to_le_bytes());
        encode_f32s(&mut out[12..24], &self.reference_position);
        encode_f32s(&mut out[24..40], &self.reference_orientation);
        out
    }

    pub fn decode(bytes: &[u8]) -> Option<Self> {
        if bytes.len() < INPUT_REPORT_SIZE {
            return None;
        }
        let mut report = Self {
            key: read_i32(bytes, 0),
            select: read_i32(bytes, 4),
            active: read_i32(bytes, 8),
            ..Self::default()
        };
        decode_f32s(&bytes[12..24], &mut report.reference_position);
        decode_f32s(&bytes[24..40], &mut report.reference_orientation);
        Some(report)
    }
}

/// Latest hand-controller telemetry, as answered to GetControllerInput
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ControllerState {
    /// Trigger mapped to [-1, 1]
    pub grip: f32,
    pub position: [f32; 3],
    /// Quaternion x, y, z, w
    pub orientation: [f32; 4],
}

impl ControllerState {
    pub fn encode(&self) -> [u8; CONTROLLER_REPORT_SIZE] {
        let mut out = [0u8; CONTROLLER_REPORT_SIZE];
        out[0..4].copy_from_slice(&self.grip.to_le_bytes());
        encode_f32s(&mut out[4..16], &self.position);
        encode_f32s(&mut out[16..32], &self.orientation);
        out
    }

    pub fn decode(bytes: &[u8]) -> Option<Self> {
        if bytes.len() < CONTROLLER_REPORT_SIZE {
            return None;
        }
        let mut state = Self {
            grip: read_f32(bytes, 0),
            ..Self::default()
        };
        decode_f32s(&bytes[4..16], &mut state.position);
        decode_f32s(&bytes[16..32], &mut state.orientation);
        Some(state)
    }
}

/// Operator answer to a pending save prompt
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SaveDecision {
    Keep,
    Discard,
    Quit,
}

impl SaveDecision {
    pub fn as_i32(self) -> i32 {
        match self {
            SaveDecision::Keep => 1,
            SaveDecision::Discard => 0,
            SaveDecision::Quit => -1,
        }
    }

    pub fn from_wire(value: i32) -> Option<Self> {
        match value {
            1 => Some(SaveDecision::Keep),
            0 => Some(SaveDecision::Discard),
            -1 => Some(SaveDecision::Quit),
            _ => None,
        }
    }

    #[inline]
    pub fn encode(self) -> [u8; 4] {
        self.as_i32().to_le_bytes()
    }
}

/// Read a little-endian i32 at `offset`; caller guarantees the bounds
#[inline]
pub fn read_i32(bytes: &[u8], offset: usize) -> i32 {
    let mut raw = [0u8; 4];
    raw.copy_from_slice(&bytes[offset..offset + 4]);
    i32::from_le_bytes(raw)
}

/// Read a little-endian f32 at `offset`; caller guarantees the bounds
#[inline]
pub fn read_f32(bytes: &[u8], offset: usize) -> f32 {
    let mut raw = [0u8; 4];
    raw.copy_from_slice(&bytes[offset..offset + 4]);
    f32::from_le_bytes(raw)
}

/// Decode consecutive f32s into a fixed slice
pub fn decode_f32s(bytes: &[u8], out: &mut [f32]) {
    for (value, chunk) in out.iter_mut().zip(bytes.chunks_exact(4)) {
        *value = f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]);
    }
}

/// Decode a whole payload of f32s into a reusable vector
pub fn decode_f32s_into(bytes: &[u8], out: &mut Vec<f32>) {
    out.clear();
    out.extend(
        bytes
            .chunks_exact(4)
            .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]])),
    );
}

/// Encode f32s into consecutive little-endian words
pub fn encode_f32s(out: &mut [u8], values: &[f32]) {
    for (chunk, value) in out.chunks_exact_mut(4).zip(values) {
        chunk.copy_from_slice(&value.to_le_bytes());
    }
}

/// Build a complete command frame (client side, used by tools and tests)
pub fn encode_command(id: i32, payload: &[u8]) -> Vec<u8> {
    let mut frame = Vec::with_capacity(HEADER_SIZE + payload.len());
    frame.extend_from_slice(&id.to_le_bytes());
    frame.extend_from_slice(payload);
    frame
}

/// Encode f32s as a fresh payload (client side)
pub fn f32_payload(values: &[f32]) -> Vec<u8> {
    values.iter().flat_map(|v| v.to_le_bytes()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_handshake_layout() {
        let hs = Handshake::new(
            &ModelSize {
                nqpos: 7,
                nmocap: 1,
                ncamera: 2,
                nobject: 5,
            },
            (640, 480),
        );
        let bytes = hs.encode();
        assert_eq!(&bytes[0..4], &7i32.to_le_bytes());
        assert_eq!(&bytes[4..8], &1i32.to_le_bytes());
        assert_eq!(&bytes[8..12], &2i32.to_le_bytes());
        assert_eq!(&bytes[12..16], &640i32.to_le_bytes());
        assert_eq!(&bytes[16..20], &480i32.to_le_bytes());
        assert_eq!(Handshake::decode(&bytes), Some(hs));
    }

    #[test]
    fn test_handshake_rejects_negative_and_short() {
        let mut bytes = [0u8; HANDSHAKE_SIZE];
        bytes[0..4].copy_from_slice(&(-3i32).to_le_bytes());
        assert_eq!(Handshake::decode(&bytes), None);
        assert_eq!(Handshake::decode(&bytes[..19]), None);
    }

    #[test]
    fn test_max_payload_size() {
        let mut hs = Handshake {
            nqpos: 0,
            nmocap: 0,
            ncamera: 0,
            width: 1,
            height: 1,
        };
        // SetTarget is the floor
        assert_eq!(hs.max_payload_size(), 12);
        hs.nqpos = 30;
        assert_eq!(hs.max_payload_size(), 120);
        hs.nmocap = 5;
        assert_eq!(hs.max_payload_size(), 140);
    }

    #[test]
    fn test_input_report_layout() {
        let perturbation = Perturbation {
            select: 4,
            active: 2,
            reference_position: [1.0, 2.0, 3.0],
            reference_orientation: [1.0, 0.0, 0.0, 0.0],
        };
        let report = InputReport::new(65, &perturbation);
        let bytes = report.encode();
        assert_eq!(bytes.len(), 40);
        assert_eq!(read_i32(&bytes, 0), 65);
        assert_eq!(read_i32(&bytes, 4), 4);
        assert_eq!(read_i32(&bytes, 8), 2);
        assert_eq!(read_f32(&bytes, 20), 3.0);
        assert_eq!(read_f32(&bytes, 24), 1.0);
        assert_eq!(InputReport::decode(&bytes), Some(report));
    }

    #[test]
    fn test_controller_layout() {
        let state = ControllerState {
            grip: -0.5,
            position: [0.1, 0.2, 0.3],
            orientation: [0.0, 0.0, 0.0, 1.0],
        };
        let bytes = state.encode();
        assert_eq!(read_f32(&bytes, 0), -0.5);
        assert_eq!(read_f32(&bytes, 28), 1.0);
        assert_eq!(ControllerState::decode(&bytes), Some(state));
    }

    #[test]
    fn test_save_decision_values() {
        assert_eq!(SaveDecision::Keep.encode(), 1i32.to_le_bytes());
        assert_eq!(SaveDecision::Discard.encode(), 0i32.to_le_bytes());
        assert_eq!(SaveDecision::Quit.encode(), (-1i32).to_le_bytes());
        assert_eq!(SaveDecision::from_wire(2), None);
    }

    #[test]
    fn test_decode_f32s_into_reuses_buffer() {
        let payload = f32_payload(&[1.5, -2.0, 0.25]);
        let mut out = Vec::with_capacity(8);
        out.push(9.0);
        decode_f32s_into(&payload, &mut out);
        assert_eq!(out, vec![1.5, -2.0, 0.25]);
        assert!(out.capacity() >= 8);
    }

    #[test]
    fn test_encode_command() {
        let frame = encode_command(5, &3i32.to_le_bytes());
        assert_eq!(frame, vec![5, 0, 0, 0, 3, 0, 0, 0]);
    }
}
