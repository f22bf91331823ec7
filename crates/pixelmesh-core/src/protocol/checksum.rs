//! Parity-code checksum carried in the last byte of every frame.
//!
//! The mesh firmware validates each frame with the exact bit groupings below,
//! so they must be reproduced bit-for-bit.
//!
//! # How the code is built
//!
//! Every byte except the last is split into bits `B1..B8` (`B1` is the least
//! significant).  Six running counters accumulate selected bits:
//!
//! | counter | contribution of each byte                          |
//! |---------|----------------------------------------------------|
//! | `b1`    | all eight bits (population count)                   |
//! | `b2`    | `B2 + B4 + B6 + B8`                                 |
//! | `b3`    | `B1 + B3 + B5 + B7`                                 |
//! | `b4..b6`| one of three groups, rotating with `i mod 3`        |
//!
//! The rotating groups are `{B8, B5, B2}`, `{B7, B4, B1}` and `{B6, B3}`.
//! The checksum byte is the parity of each counter packed into bits 6..1,
//! with bit 0 holding the parity of their sum.

/// Bit groups feeding `b4`, `b5`, `b6`, as masks over the byte.
const GROUP_852: u8 = 0b1001_0010;
const GROUP_741: u8 = 0b0100_1001;
const GROUP_63: u8 = 0b0010_0100;

const EVEN_BITS: u8 = 0b1010_1010; // B2, B4, B6, B8
const ODD_BITS: u8 = 0b0101_0101; // B1, B3, B5, B7

/// Computes the checksum byte over `body` (the frame without its last byte).
///
/// # Examples
///
/// ```rust
/// use pixelmesh_core::protocol::checksum::{compute, validate};
///
/// let mut frame = vec![1, 1, 0xAA, 0, 0];
/// let crc = compute(&frame[..frame.len() - 1]);
/// *frame.last_mut().unwrap() = crc;
/// assert!(validate(&frame));
/// ```
pub fn compute(body: &[u8]) -> u8 {
    let mut b = [0u32; 6];

    for (i, &byte) in body.iter().enumerate() {
        b[0] += byte.count_ones();
        b[1] += (byte & EVEN_BITS).count_ones();
        b[2] += (byte & ODD_BITS).count_ones();

        let g852 = (byte & GROUP_852).count_ones();
        let g741 = (byte & GROUP_741).count_ones();
        let g63 = (byte & GROUP_63).count_ones();

        let (c4, c5, c6) = match i % 3 {
            0 => (g852, g741, g63),
            1 => (g741, g63, g852),
            _ => (g63, g852, g741),
        };
        b[3] += c4;
        b[4] += c5;
        b[5] += c6;
    }

    let sum: u32 = b.iter().sum();
    let bit = |v: u32| (v % 2) as u8;

    bit(b[0]) << 6
        | bit(b[1]) << 5
        | bit(b[2]) << 4
        | bit(b[3]) << 3
        | bit(b[4]) << 2
        | bit(b[5]) << 1
        | bit(sum)
}

/// Returns `true` if the last byte of `frame` matches the checksum of the rest.
///
/// An empty slice has no checksum byte and is never valid.
pub fn validate(frame: &[u8]) -> bool {
    match frame.split_last() {
        Some((&stored, body)) => compute(body) == stored,
        None => false,
    }
}

/// Overwrites the last byte of `frame` with the checksum of the preceding bytes.
pub fn seal(frame: &mut [u8]) {
    if let Some(last) = frame.len().checked_sub(1) {
        frame[last] = compute(&frame[..last]);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Bit-by-bit transcription of the firmware routine, used as an oracle.
    #[allow(non_snake_case)]
    fn reference_checksum(body: &[u8]) -> u8 {
        let (mut b1, mut b2, mut b3, mut b4, mut b5, mut b6) = (0u32, 0u32, 0u32, 0u32, 0u32, 0u32);
        for (i, &byte) in body.iter().enumerate() {
            let bit = |n: u32| ((byte >> (n - 1)) & 1) as u32;
            let (B1, B2, B3, B4, B5, B6, B7, B8) =
                (bit(1), bit(2), bit(3), bit(4), bit(5), bit(6), bit(7), bit(8));
            b1 += B1 + B2 + B3 + B4 + B5 + B6 + B7 + B8;
            b2 += B2 + B4 + B6 + B8;
            b3 += B1 + B3 + B5 + B7;
            match i % 3 {
                0 => {
                    b4 += B8 + B5 + B2;
                    b5 += B7 + B4 + B1;
                    b6 += B6 + B3;
                }
                1 => {
                    b4 += B7 + B4 + B1;
                    b5 += B6 + B3;
                    b6 += B8 + B5 + B2;
                }
                _ => {
                    b4 += B6 + B3;
                    b5 += B8 + B5 + B2;
                    b6 += B7 + B4 + B1;
                }
            }
        }
        ((b1 % 2) << 6
            | (b2 % 2) << 5
            | (b3 % 2) << 4
            | (b4 % 2) << 3
            | (b5 % 2) << 2
            | (b6 % 2) << 1
            | (b1 + b2 + b3 + b4 + b5 + b6) % 2) as u8
    }

    #[test]
    fn test_compute_matches_bitwise_reference_for_every_single_byte() {
        for byte in 0..=u8::MAX {
            for position in 0..3 {
                // Arrange – put the byte at offsets 0, 1 and 2 to hit every rotation
                let mut body = vec![0u8; position];
                body.push(byte);

                // Act / Assert
                assert_eq!(
                    compute(&body),
                    reference_checksum(&body),
                    "byte 0x{byte:02X} at position {position}"
                );
            }
        }
    }

    #[test]
    fn test_compute_matches_reference_for_a_color_frame() {
        let body: Vec<u8> = (0u8..=200).map(|v| v.wrapping_mul(37)).collect();
        assert_eq!(compute(&body), reference_checksum(&body));
    }

    #[test]
    fn test_compute_of_empty_body_is_zero() {
        assert_eq!(compute(&[]), 0);
    }

    #[test]
    fn test_compute_single_lsb_byte() {
        // B1 set at offset 0: b1=1, b3=1, b5=1 → bits 6, 4, 2; sum 3 → bit 0
        assert_eq!(compute(&[0x01]), 0b0101_0101);
    }

    #[test]
    fn test_checksum_never_sets_the_top_bit() {
        for byte in 0..=u8::MAX {
            assert_eq!(compute(&[byte, byte, byte]) & 0x80, 0);
        }
    }

    #[test]
    fn test_seal_then_validate_succeeds() {
        // Arrange
        let mut frame = vec![1, 3, 0xAA, 0xBB, 0xCC, 0xDD, 0xEE, 0xFF, 0, 0];

        // Act
        seal(&mut frame);

        // Assert
        assert!(validate(&frame));
    }

    #[test]
    fn test_validate_rejects_wrong_checksum_byte() {
        let mut frame = vec![1, 1, 2, 3, 4, 5, 6, 7, 0];
        seal(&mut frame);
        let last = frame.len() - 1;
        frame[last] ^= 0x01;
        assert!(!validate(&frame));
    }

    #[test]
    fn test_validate_rejects_empty_frame() {
        assert!(!validate(&[]));
    }

    #[test]
    fn test_seal_on_empty_frame_is_noop() {
        let mut frame: Vec<u8> = Vec::new();
        seal(&mut frame);
        assert!(frame.is_empty());
    }
}
