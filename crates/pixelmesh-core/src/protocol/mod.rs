//! Protocol module containing frame types, the checksum, and the binary codec.

pub mod checksum;
pub mod codec;
pub mod frames;
pub mod sequence;

pub use codec::{
    color_frame_len, decode_frame, encode_ama, encode_color, encode_control, encode_install,
    encode_sleep, ProtocolError,
};
pub use frames::*;
pub use sequence::SequenceCounter;
