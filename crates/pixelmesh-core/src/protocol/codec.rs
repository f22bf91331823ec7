//! Binary codec for the mesh node protocol.
//!
//! All builders are pure: they take plain values and return a sealed frame
//! (checksum byte already written).  See [`crate::protocol::frames`] for the
//! wire layout.

use thiserror::Error;

use crate::domain::grid::{PixelGrid, Rgb};
use crate::domain::registry::{DeviceRegistry, MacAddress};
use crate::protocol::checksum;
use crate::protocol::frames::{
    AmaStage, Frame, FrameType, SleepMode, COLOR_FRAME_OVERHEAD, CONTROL_FRAME_SIZE,
    CONTROL_PAYLOAD_SIZE, PAYLOAD_OFFSET, PROTOCOL_VERSION,
};

/// Errors that can occur while building or parsing a frame.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ProtocolError {
    /// The last byte does not match the checksum of the rest of the frame.
    #[error("checksum mismatch: expected 0x{expected:02X}, found 0x{found:02X}")]
    Checksum { expected: u8, found: u8 },

    /// The frame length is impossible for its declared type.
    #[error("malformed frame: {length} bytes for type {frame_type:?}")]
    MalformedFrame {
        frame_type: Option<FrameType>,
        length: usize,
    },

    /// The type byte is not a known frame type.
    #[error("unknown frame type: {0}")]
    UnknownFrameType(u8),

    /// The version byte is not [`PROTOCOL_VERSION`].
    #[error("unsupported protocol version: {0}")]
    UnsupportedVersion(u8),

    /// A control payload longer than the 13 available bytes.
    #[error("payload too long: {actual} bytes, maximum is {max}")]
    PayloadTooLong { max: usize, actual: usize },
}

// ── Encoding ──────────────────────────────────────────────────────────────────

/// Builds a 16-byte control frame, zero-padding `payload` to 13 bytes.
///
/// # Errors
///
/// Returns [`ProtocolError::PayloadTooLong`] if `payload` exceeds 13 bytes.
///
/// # Examples
///
/// ```rust
/// use pixelmesh_core::protocol::{decode_frame, encode_control, FrameType};
///
/// let bytes = encode_control(FrameType::Beacon, &[1, 2, 3, 4, 5, 6]).unwrap();
/// assert_eq!(bytes.len(), 16);
/// let frame = decode_frame(&bytes).unwrap();
/// assert_eq!(frame.frame_type, FrameType::Beacon);
/// ```
pub fn encode_control(frame_type: FrameType, payload: &[u8]) -> Result<Vec<u8>, ProtocolError> {
    if payload.len() > CONTROL_PAYLOAD_SIZE {
        return Err(ProtocolError::PayloadTooLong {
            max: CONTROL_PAYLOAD_SIZE,
            actual: payload.len(),
        });
    }
    Ok(control_frame(frame_type, payload))
}

/// Builds the Install frame assigning `index` to the node with `mac`.
///
/// Payload: `mac(6) ++ index(1)`.
pub fn encode_install(mac: &MacAddress, index: u8) -> Vec<u8> {
    let mut payload = [0u8; 7];
    payload[..6].copy_from_slice(mac.as_bytes());
    payload[6] = index;
    control_frame(FrameType::Install, &payload)
}

/// Builds an assisted-manual-addressing frame.
///
/// The stage code is the frame type, and is echoed in the first payload byte
/// for firmware that reads it from there.
pub fn encode_ama(stage: AmaStage) -> Vec<u8> {
    let frame_type = FrameType::from(stage);
    control_frame(frame_type, &[frame_type as u8])
}

/// Builds a sleep frame, with the same layout as [`encode_ama`].
pub fn encode_sleep(mode: SleepMode) -> Vec<u8> {
    let frame_type = FrameType::from(mode);
    control_frame(frame_type, &[frame_type as u8])
}

/// Total length of a color frame for `device_count` nodes.
pub const fn color_frame_len(device_count: usize) -> usize {
    device_count * 3 + COLOR_FRAME_OVERHEAD
}

/// Builds a color frame with one triplet per registered device.
///
/// For device `k`:
/// - `highlight`'s color if `highlight` targets `k`;
/// - otherwise the grid cell `k` was calibrated to;
/// - otherwise black (no position yet, or the position is off-grid).
pub fn encode_color(
    registry: &DeviceRegistry,
    grid: &PixelGrid,
    sequence: u16,
    highlight: Option<(u8, Rgb)>,
) -> Vec<u8> {
    let mut buf = Vec::with_capacity(color_frame_len(registry.size()));
    buf.push(PROTOCOL_VERSION);
    buf.push(FrameType::Color as u8);
    buf.extend_from_slice(&sequence.to_be_bytes());

    for device in registry.iter() {
        let color = match highlight {
            Some((index, color)) if index == device.index => color,
            _ => device
                .position
                .and_then(|pos| grid.get(pos))
                .unwrap_or(Rgb::BLACK),
        };
        buf.extend_from_slice(&color.to_bytes());
    }

    buf.push(0); // checksum placeholder
    checksum::seal(&mut buf);
    buf
}

/// Control frames built from internal payloads never exceed 13 bytes.
fn control_frame(frame_type: FrameType, payload: &[u8]) -> Vec<u8> {
    debug_assert!(payload.len() <= CONTROL_PAYLOAD_SIZE);
    let mut buf = vec![0u8; CONTROL_FRAME_SIZE];
    buf[0] = PROTOCOL_VERSION;
    buf[1] = frame_type as u8;
    buf[PAYLOAD_OFFSET..PAYLOAD_OFFSET + payload.len()].copy_from_slice(payload);
    checksum::seal(&mut buf);
    buf
}

// ── Decoding ──────────────────────────────────────────────────────────────────

/// Validates and parses one complete frame.
///
/// Checks are applied in order: minimum length, checksum, version, type,
/// then the exact length required by the type.
///
/// # Errors
///
/// - [`ProtocolError::Checksum`] if the checksum byte is wrong.
/// - [`ProtocolError::MalformedFrame`] if the length does not fit the type.
/// - [`ProtocolError::UnsupportedVersion`] / [`ProtocolError::UnknownFrameType`]
///   for an unexpected header.
pub fn decode_frame(bytes: &[u8]) -> Result<Frame, ProtocolError> {
    // version + type + checksum
    if bytes.len() < PAYLOAD_OFFSET + 1 {
        return Err(ProtocolError::MalformedFrame {
            frame_type: None,
            length: bytes.len(),
        });
    }

    let (&found, body) = bytes
        .split_last()
        .ok_or(ProtocolError::MalformedFrame {
            frame_type: None,
            length: 0,
        })?;
    let expected = checksum::compute(body);
    if expected != found {
        return Err(ProtocolError::Checksum { expected, found });
    }

    let version = bytes[0];
    if version != PROTOCOL_VERSION {
        return Err(ProtocolError::UnsupportedVersion(version));
    }

    let type_byte = bytes[1];
    let frame_type =
        FrameType::try_from(type_byte).map_err(|_| ProtocolError::UnknownFrameType(type_byte))?;

    let length_ok = if frame_type.is_color() {
        bytes.len() >= COLOR_FRAME_OVERHEAD && (bytes.len() - COLOR_FRAME_OVERHEAD) % 3 == 0
    } else {
        bytes.len() == CONTROL_FRAME_SIZE
    };
    if !length_ok {
        return Err(ProtocolError::MalformedFrame {
            frame_type: Some(frame_type),
            length: bytes.len(),
        });
    }

    Ok(Frame {
        frame_type,
        payload: body[PAYLOAD_OFFSET..].to_vec(),
    })
}

// ── Tests ─────────────────────────────────────────────────────────────────────
