//! # pixelmesh-core
//!
//! Shared library for PixelMesh containing the node wire protocol, the frame
//! checksum, and the domain types used while commissioning a mesh of
//! addressable LED nodes.
//!
//! It has zero dependencies on sockets, async runtimes, or terminal I/O, so
//! everything here can be exercised from plain unit tests.
//!
//! # Architecture overview
//!
//! A PixelMesh installation is a grid of LED "pixels", each driven by a mesh
//! node.  The root node of the mesh opens a TCP connection to the server and
//! relays frames between the server and every node.
//!
//! - **`protocol`** – How bytes travel over the link.  Control frames are a
//!   fixed 16 bytes; color frames carry one RGB triplet per addressed node.
//!   Every frame ends with a parity-code checksum byte.
//!
//! - **`domain`** – Pure state with no I/O.  The `DeviceRegistry` hands out
//!   dense node indices by MAC, and the `PixelGrid` is the rows × cols picture
//!   that gets projected onto those nodes.

pub mod domain;
pub mod protocol;

// Re-export the most-used types at the crate root so callers can write
// `pixelmesh_core::DeviceRegistry` instead of the full module path.
pub use domain::grid::{GridError, GridPosition, PixelGrid, Rgb};
pub use domain::registry::{Device, DeviceRegistry, MacAddress, Registration, RegistryError};
pub use protocol::codec::{decode_frame, encode_color, ProtocolError};
pub use protocol::frames::{Frame, FrameType};
