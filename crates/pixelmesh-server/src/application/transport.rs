//! Frame transport seam between a session and the mesh link.
//!
//! The TCP implementation lives in `infrastructure::network::mesh_link`;
//! tests substitute an in-memory transport that records every frame sent.

use std::io;
use std::net::SocketAddr;

use async_trait::async_trait;
use thiserror::Error;

/// Errors surfaced by a [`FrameTransport`].
#[derive(Debug, Error)]
pub enum LinkError {
    /// The peer closed or reset the connection.
    #[error("connection lost")]
    ConnectionLost,

    /// No complete frame arrived within the configured read timeout.
    #[error("receive timed out")]
    Timeout,

    /// Any other socket failure.  Treated as transient on receive.
    #[error("link I/O error: {0}")]
    Io(#[from] io::Error),
}

impl LinkError {
    /// Maps a socket error onto the session's failure taxonomy.
    pub fn from_io(e: io::Error) -> Self {
        match e.kind() {
            io::ErrorKind::ConnectionReset
            | io::ErrorKind::ConnectionAborted
            | io::ErrorKind::BrokenPipe
            | io::ErrorKind::NotConnected
            | io::ErrorKind::UnexpectedEof => LinkError::ConnectionLost,
            io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock => LinkError::Timeout,
            _ => LinkError::Io(e),
        }
    }
}

/// Sends and receives whole frames over the link to the mesh root node.
#[async_trait]
pub trait FrameTransport: Send {
    /// Writes one complete frame.
    ///
    /// Returns [`LinkError::ConnectionLost`] once the peer is gone.
    async fn send_frame(&mut self, frame: &[u8]) -> Result<(), LinkError>;

    /// Reads the next 16-byte control frame sent by the mesh.
    ///
    /// Implementations over a byte stream skip bytes until a window passes
    /// the checksum, so one stray byte cannot misalign every later frame.
    /// The caller still decodes what it gets.
    async fn recv_frame(&mut self) -> Result<Vec<u8>, LinkError>;

    /// Address of the remote end, when the transport has one.
    fn peer(&self) -> Option<SocketAddr> {
        None
    }
}
