//! TCP link to the mesh root node.
//!
//! The root node relays every node's frames over one TCP connection.  TCP is
//! a stream, so one `read()` may return part of a frame or several frames at
//! once.  Incoming bytes are buffered and handed out one 16-byte control
//! frame at a time; nodes never send color frames upstream.
//!
//! Frames carry no start marker, so alignment is recovered by decoding: when
//! the 16 bytes at the front of the buffer do not decode as a control frame,
//! the link slides forward one byte at a time until a window does.

use std::net::SocketAddr;
use std::time::Duration;

use async_trait::async_trait;
use pixelmesh_core::decode_frame;
use pixelmesh_core::protocol::CONTROL_FRAME_SIZE;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tokio::time::timeout;
use tracing::{debug, warn};

use crate::application::transport::{FrameTransport, LinkError};

/// Size of the scratch buffer for a single `read()` call.
const READ_CHUNK: usize = 1500;

/// A connected root node.
pub struct MeshLink {
    peer: SocketAddr,
    reader: OwnedReadHalf,
    writer: OwnedWriteHalf,
    recv_buf: Vec<u8>,
    read_tmp: Vec<u8>,
    read_timeout: Option<Duration>,
}

impl MeshLink {
    /// Wraps an accepted stream.  With `read_timeout` set, a receive that
    /// sees no complete frame in time fails with [`LinkError::Timeout`].
    pub fn new(stream: TcpStream, peer: SocketAddr, read_timeout: Option<Duration>) -> Self {
        // Color frames are small and latency-sensitive.
        if let Err(e) = stream.set_nodelay(true) {
            debug!("{peer}: could not disable Nagle: {e}");
        }
        let (reader, writer) = stream.into_split();
        Self {
            peer,
            reader,
            writer,
            recv_buf: Vec::with_capacity(READ_CHUNK),
            read_tmp: vec![0u8; READ_CHUNK],
            read_timeout,
        }
    }

    /// Drops leading bytes until a decodable frame is at the front of the
    /// buffer.  Returns `true` once one is.  Without a match, keeps only the
    /// last 15 bytes, which may still begin a frame.
    fn align(&mut self) -> bool {
        let last_start = self.recv_buf.len().saturating_sub(CONTROL_FRAME_SIZE);
        let found = self
            .recv_buf
            .windows(CONTROL_FRAME_SIZE)
            .position(|window| decode_frame(window).is_ok());
        let skip = found.unwrap_or(last_start + 1);
        if skip > 0 {
            warn!("{}: skipped {skip} stray bytes", self.peer);
            self.recv_buf.drain(..skip);
        }
        found.is_some()
    }
}

#[async_trait]
impl FrameTransport for MeshLink {
    async fn send_frame(&mut self, frame: &[u8]) -> Result<(), LinkError> {
        self.writer.write_all(frame).await.map_err(LinkError::from_io)
    }

    async fn recv_frame(&mut self) -> Result<Vec<u8>, LinkError> {
        while self.recv_buf.len() < CONTROL_FRAME_SIZE || !self.align() {
            let read = self.reader.read(&mut self.read_tmp);
            let n = match self.read_timeout {
                Some(limit) => timeout(limit, read).await.map_err(|_| LinkError::Timeout)?,
                None => read.await,
            }
            .map_err(LinkError::from_io)?;

            if n == 0 {
                debug!("{}: connection closed (EOF)", self.peer);
                return Err(LinkError::ConnectionLost);
            }
            self.recv_buf.extend_from_slice(&self.read_tmp[..n]);
        }
        Ok(self.recv_buf.drain(..CONTROL_FRAME_SIZE).collect())
    }

    fn peer(&self) -> Option<SocketAddr> {
        Some(self.peer)
    }
}
