//! Frame types and wire constants of the mesh node protocol.
//!
//! Control frame (16 bytes):
//! ```text
//! [version:1][type:1][payload:13][checksum:1]
//! ```
//! Color frame (3·N + 5 bytes, N = number of addressed nodes):
//! ```text
//! [version:1][type=4:1][seq_hi:1][seq_lo:1][r,g,b × N][checksum:1]
//! ```
//! The type codes are burned into deployed firmware and must never change.

use crate::domain::registry::MacAddress;

// ── Protocol constants ────────────────────────────────────────────────────────

/// Current protocol version byte.
pub const PROTOCOL_VERSION: u8 = 0x01;

/// Total size of every non-color frame.
pub const CONTROL_FRAME_SIZE: usize = 16;

/// Bytes between the type byte and the checksum in a control frame.
pub const CONTROL_PAYLOAD_SIZE: usize = 13;

/// Fixed overhead of a color frame: version, type, two sequence bytes, checksum.
pub const COLOR_FRAME_OVERHEAD: usize = 5;

/// Offset of the first payload byte in any frame.
pub const PAYLOAD_OFFSET: usize = 2;

/// Largest node count a color frame can carry (indices are a single byte).
pub const MAX_DEVICES: usize = 256;

// ── Frame type codes ──────────────────────────────────────────────────────────

/// All frame type codes understood by the mesh firmware.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum FrameType {
    /// Unaddressed node announcing its MAC.
    Beacon = 1,
    /// Node acknowledging a beacon exchange.
    BeaconAck = 2,
    /// Server assigning an index to a MAC.
    Install = 3,
    /// Pixel colors for every addressed node.
    Color = 4,
    /// Node reporting a color frame it could not apply.
    ColorError = 5,
    Ama = 6,
    Error = 7,
    Sleep = 8,
    AmaInit = 61,
    AmaColor = 62,
    AmaReprise = 69,
    SleepServer = 81,
    SleepMesh = 82,
    SleepWakeup = 89,
}

impl FrameType {
    /// Returns `true` for the only variable-length frame type.
    pub fn is_color(self) -> bool {
        self == FrameType::Color
    }
}

impl TryFrom<u8> for FrameType {
    type Error = ();

    fn try_from(value: u8) -> Result<Self, ()> {
        match value {
            1 => Ok(FrameType::Beacon),
            2 => Ok(FrameType::BeaconAck),
            3 => Ok(FrameType::Install),
            4 => Ok(FrameType::Color),
            5 => Ok(FrameType::ColorError),
            6 => Ok(FrameType::Ama),
            7 => Ok(FrameType::Error),
            8 => Ok(FrameType::Sleep),
            61 => Ok(FrameType::AmaInit),
            62 => Ok(FrameType::AmaColor),
            69 => Ok(FrameType::AmaReprise),
            81 => Ok(FrameType::SleepServer),
            82 => Ok(FrameType::SleepMesh),
            89 => Ok(FrameType::SleepWakeup),
            _ => Err(()),
        }
    }
}

/// Stages of assisted manual addressing.
///
/// On the wire the stage value is sent as the frame type itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AmaStage {
    /// Nodes switch to single-pixel highlight mode.
    Init,
    /// Addressing finished; nodes switch to normal color mode.
    Color,
    /// Resume an interrupted addressing run.
    Reprise,
}

impl From<AmaStage> for FrameType {
    fn from(stage: AmaStage) -> Self {
        match stage {
            AmaStage::Init => FrameType::AmaInit,
            AmaStage::Color => FrameType::AmaColor,
            AmaStage::Reprise => FrameType::AmaReprise,
        }
    }
}

/// Sleep sub-modes, sent the same way as [`AmaStage`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SleepMode {
    Server,
    Mesh,
    Wakeup,
}

impl From<SleepMode> for FrameType {
    fn from(mode: SleepMode) -> Self {
        match mode {
            SleepMode::Server => FrameType::SleepServer,
            SleepMode::Mesh => FrameType::SleepMesh,
            SleepMode::Wakeup => FrameType::SleepWakeup,
        }
    }
}

// ── Decoded frame ─────────────────────────────────────────────────────────────

/// A validated frame: its type and the bytes between the type and checksum.
///
/// For control frames `payload` is always [`CONTROL_PAYLOAD_SIZE`] bytes.
/// For color frames it starts with the two sequence bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub frame_type: FrameType,
    pub payload: Vec<u8>,
}

impl Frame {
    /// The MAC carried by a Beacon or Install frame.
    pub fn mac(&self) -> Option<MacAddress> {
        match self.frame_type {
            FrameType::Beacon | FrameType::Install => {
                let bytes: [u8; 6] = self.payload.get(..6)?.try_into().ok()?;
                Some(MacAddress(bytes))
            }
            _ => None,
        }
    }

    /// The index assigned by an Install frame.
    pub fn assigned_index(&self) -> Option<u8> {
        match self.frame_type {
            FrameType::Install => self.payload.get(6).copied(),
            _ => None,
        }
    }

    /// The sequence number of a Color frame.
    pub fn sequence(&self) -> Option<u16> {
        match self.frame_type {
            FrameType::Color => {
                let hi = *self.payload.first()?;
                let lo = *self.payload.get(1)?;
                Some(u16::from_be_bytes([hi, lo]))
            }
            _ => None,
        }
    }

    /// The RGB triplets of a Color frame, in device-index order.
    pub fn pixels(&self) -> Option<Vec<[u8; 3]>> {
        if !self.frame_type.is_color() {
            return None;
        }
        let body = self.payload.get(2..)?;
        Some(body.chunks_exact(3).map(|c| [c[0], c[1], c[2]]).collect())
    }
}
