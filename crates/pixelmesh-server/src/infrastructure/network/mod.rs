//! TCP networking: the root-node link and the connection listener.

pub mod listener;
pub mod mesh_link;

pub use listener::{ConnectionListener, NetworkError};
pub use mesh_link::MeshLink;
