//! The per-connection commissioning state machine.
//!
//! One `AddressingSession` drives one TCP connection from the mesh root node:
//!
//! ```text
//!            ┌──────────── addressed already ────────────┐
//!            │                                           ▼
//!  Init ─────┤                                     TableResend ──┐
//!            │                                                   ▼
//!            └─► Discovery ──► Calibration ────────────────► Streaming
//! ```
//!
//! - **Discovery** registers each beacon's MAC, answers with an Install frame
//!   carrying the assigned index, and asks the operator whether to keep going.
//! - **Calibration** lights one device at a time, asks the operator which
//!   cell lit up, and shows the learned cell back for confirmation.
//! - **TableResend** replays the known device table to a root node that
//!   reconnected after addressing already finished in this process.
//! - **Streaming** sends a color frame every `stream_interval` until the
//!   link drops or a newer session takes over.
//!
//! The session checks its generation token before every send, so a
//! superseded session stops touching the mesh as soon as a newer one exists.

use std::fmt;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use pixelmesh_core::protocol::{encode_ama, encode_install, AmaStage};
use pixelmesh_core::{
    decode_frame, Device, FrameType, GridError, GridPosition, PixelGrid,
    Registration, RegistryError, Rgb,
};
use thiserror::Error;
use tokio::time::sleep;
use tracing::{debug, info, warn};

use crate::application::color_streamer::{ColorStreamer, PixelSource};
use crate::application::mesh_state::MeshState;
use crate::application::operator::{CalibrationDecision, Operator};
use crate::application::transport::{FrameTransport, LinkError};

/// Override color for the device being located.
const HIGHLIGHT_COLOR: Rgb = Rgb::RED;
/// Color the learned cell is shown in for confirmation.
const CONFIRM_COLOR: Rgb = Rgb::GREEN;
/// Consecutive non-fatal receive errors tolerated during discovery.
const MAX_RECV_FAILURES: u32 = 5;

/// Errors that end a session.
#[derive(Debug, Error)]
pub enum SessionError {
    #[error(transparent)]
    Link(#[from] LinkError),

    #[error(transparent)]
    Registry(#[from] RegistryError),

    #[error(transparent)]
    Grid(#[from] GridError),

    /// A newer connection replaced this session.
    #[error("session {0} superseded by a newer connection")]
    Superseded(u64),
}

impl SessionError {
    /// `true` for the two normal ways a session ends: the peer went away or
    /// a newer connection took over.
    pub fn is_expected(&self) -> bool {
        matches!(
            self,
            SessionError::Link(LinkError::ConnectionLost) | SessionError::Superseded(_)
        )
    }
}

/// Where a session currently is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionPhase {
    Init,
    Discovery,
    Calibration,
    TableResend,
    Streaming,
}

impl fmt::Display for SessionPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SessionPhase::Init => "init",
            SessionPhase::Discovery => "discovery",
            SessionPhase::Calibration => "calibration",
            SessionPhase::TableResend => "table resend",
            SessionPhase::Streaming => "streaming",
        };
        f.write_str(name)
    }
}

/// Pacing delays used by a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionTiming {
    /// Pause after each Install frame, giving the node time to rejoin.
    pub discovery_pace: Duration,
    /// Pause between learning a position and showing it back.
    pub calibration_pace: Duration,
    /// Gap between consecutive color frames while streaming.
    pub stream_interval: Duration,
}

impl SessionTiming {
    /// No pauses at all.  Handy for tests.
    pub const fn immediate() -> Self {
        Self {
            discovery_pace: Duration::ZERO,
            calibration_pace: Duration::ZERO,
            stream_interval: Duration::ZERO,
        }
    }
}

impl Default for SessionTiming {
    fn default() -> Self {
        Self {
            discovery_pace: Duration::from_secs(1),
            calibration_pace: Duration::from_secs(1),
            stream_interval: Duration::from_millis(100),
        }
    }
}

/// Log prefix identifying a session by generation and peer address.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionTag {
    pub generation: u64,
    pub peer: Option<SocketAddr>,
}

impl fmt::Display for SessionTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.peer {
            Some(peer) => write!(f, "session {} ({peer})", self.generation),
            None => write!(f, "session {}", self.generation),
        }
    }
}

/// Everything a session needs besides its transport.  Shared by all
/// sessions of one process.
#[derive(Clone)]
pub struct SessionContext {
    pub state: Arc<MeshState>,
    pub operator: Arc<dyn Operator>,
    pub source: Arc<dyn PixelSource>,
    pub timing: SessionTiming,
}

/// One connection's run through the commissioning state machine.
pub struct AddressingSession<T: FrameTransport> {
    generation: u64,
    tag: SessionTag,
    transport: T,
    ctx: SessionContext,
    streamer: ColorStreamer,
    phase: SessionPhase,
}

impl<T: FrameTransport> AddressingSession<T> {
    /// Creates a session holding generation token `generation`, obtained
    /// from [`MeshState::begin_session`].
    pub fn new(generation: u64, transport: T, ctx: SessionContext) -> Self {
        let streamer = ColorStreamer::new(Arc::clone(&ctx.source));
        let tag = SessionTag {
            generation,
            peer: transport.peer(),
        };
        Self {
            generation,
            tag,
            transport,
            ctx,
            streamer,
            phase: SessionPhase::Init,
        }
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn tag(&self) -> SessionTag {
        self.tag
    }

    pub fn phase(&self) -> SessionPhase {
        self.phase
    }

    /// Runs the session to completion.
    ///
    /// Streaming never finishes on its own, so this only returns once the
    /// session has ended: with [`LinkError::ConnectionLost`] when the peer
    /// disconnects, with [`SessionError::Superseded`] when a newer session
    /// took over, or with whatever error broke it.
    pub async fn run(mut self) -> Result<(), SessionError> {
        if self.ctx.state.is_addressed() {
            self.enter(SessionPhase::TableResend);
            self.resend_table().await?;
        } else {
            self.enter(SessionPhase::Discovery);
            self.discover().await?;
            self.enter(SessionPhase::Calibration);
            self.calibrate().await?;
        }
        self.enter(SessionPhase::Streaming);
        self.stream().await
    }

    fn enter(&mut self, phase: SessionPhase) {
        info!("{}: {} -> {}", self.tag, self.phase, phase);
        self.phase = phase;
    }

    fn ensure_current(&self) -> Result<(), SessionError> {
        if self.ctx.state.is_current(self.generation) {
            Ok(())
        } else {
            Err(SessionError::Superseded(self.generation))
        }
    }

    /// Sends `frame` unless a newer session exists.
    async fn send(&mut self, frame: &[u8]) -> Result<(), SessionError> {
        self.ensure_current()?;
        self.transport.send_frame(frame).await?;
        Ok(())
    }

    // ── Discovery ─────────────────────────────────────────────────────────────

    async fn discover(&mut self) -> Result<(), SessionError> {
        let mut failures = 0u32;

        loop {
            self.ensure_current()?;

            let bytes = match self.transport.recv_frame().await {
                Ok(bytes) => {
                    failures = 0;
                    bytes
                }
                Err(LinkError::Timeout) => continue,
                Err(LinkError::Io(e)) if failures < MAX_RECV_FAILURES => {
                    failures += 1;
                    warn!("{}: receive failed ({e}), retrying", self.tag);
                    continue;
                }
                Err(e) => return Err(e.into()),
            };

            let frame = match decode_frame(&bytes) {
                Ok(frame) => frame,
                Err(e) => {
                    warn!("{}: dropping frame: {e}", self.tag);
                    continue;
                }
            };
            if frame.frame_type != FrameType::Beacon {
                debug!("{}: ignoring {:?} frame during discovery", self.tag, frame.frame_type);
                continue;
            }
            let Some(mac) = frame.mac() else {
                continue;
            };

            let registered = self.ctx.state.registry().lock().await.register(mac);
            let (index, size) = match registered {
                Ok(Registration::New(index)) => {
                    (index, self.ctx.state.registry().lock().await.size())
                }
                Ok(Registration::Existing(_)) => continue,
                Err(RegistryError::Full) => {
                    warn!("{}: registry full, ending discovery", self.tag);
                    break;
                }
                Err(e) => return Err(e.into()),
            };

            info!("{}: registered {mac} as device {index}", self.tag);
            self.send(&encode_install(&mac, index)).await?;
            sleep(self.ctx.timing.discovery_pace).await;

            if !self.ctx.operator.continue_discovery(size).await {
                break;
            }
        }

        self.ctx.state.mark_addressed();
        info!(
            "{}: discovery finished with {} devices",
            self.tag,
            self.ctx.state.registry().lock().await.size()
        );
        Ok(())
    }

    // ── Calibration ───────────────────────────────────────────────────────────

    async fn calibrate(&mut self) -> Result<(), SessionError> {
        self.send(&encode_ama(AmaStage::Init)).await?;

        // Only the cell being confirmed is ever lit; every other device
        // renders black through its (possibly absent) position.
        let mut canvas = self.ctx.state.blank_grid();
        let count = self.ctx.state.registry().lock().await.size();
        let mut index = 0usize;

        while index < count {
            let device = self
                .ctx
                .state
                .registry()
                .lock()
                .await
                .get(index as u8)?
                .clone();

            self.send_canvas(&canvas, Some((device.index, HIGHLIGHT_COLOR))).await?;

            let Some(position) = self.ask_position(&device, &canvas).await else {
                warn!(
                    "{}: no position for device {}, stopping calibration",
                    self.tag, device.index
                );
                break;
            };
            self.ctx
                .state
                .registry()
                .lock()
                .await
                .set_position(device.index, position)?;
            sleep(self.ctx.timing.calibration_pace).await;

            canvas.set(position, CONFIRM_COLOR)?;
            self.send_canvas(&canvas, None).await?;
            canvas.set(position, Rgb::BLACK)?;

            match self.ctx.operator.confirm(&device, position).await {
                CalibrationDecision::Advance => {
                    info!("{}: device {} placed at {position}", self.tag, device.index);
                    index += 1;
                }
                CalibrationDecision::Retry => {
                    debug!("{}: retrying device {}", self.tag, device.index);
                }
                CalibrationDecision::Abort => {
                    warn!("{}: calibration aborted at device {}", self.tag, device.index);
                    break;
                }
            }
        }

        self.send(&encode_ama(AmaStage::Color)).await
    }

    /// Asks the operator for `device`'s cell until the answer fits the grid.
    async fn ask_position(&self, device: &Device, canvas: &PixelGrid) -> Option<GridPosition> {
        loop {
            let position = self.ctx.operator.locate(device).await?;
            if canvas.contains(position) {
                return Some(position);
            }
            warn!(
                "{}: {position} is outside the {}x{} grid",
                self.tag,
                canvas.rows(),
                canvas.cols()
            );
        }
    }

    /// Sends `canvas` as a color frame unless a newer session exists.
    async fn send_canvas(
        &mut self,
        canvas: &PixelGrid,
        highlight: Option<(u8, Rgb)>,
    ) -> Result<(), SessionError> {
        self.ensure_current()?;
        self.streamer
            .send_grid(&mut self.transport, &self.ctx.state, canvas, highlight)
            .await?;
        Ok(())
    }

    // ── Table resend ──────────────────────────────────────────────────────────

    async fn resend_table(&mut self) -> Result<(), SessionError> {
        let table: Vec<Device> = self.ctx.state.registry().lock().await.iter().cloned().collect();
        for device in &table {
            self.send(&encode_install(&device.mac, device.index)).await?;
        }
        info!("{}: resent {} table entries", self.tag, table.len());
        self.send(&encode_ama(AmaStage::Color)).await
    }

    // ── Streaming ─────────────────────────────────────────────────────────────

    async fn stream(&mut self) -> Result<(), SessionError> {
        loop {
            self.ensure_current()?;
            self.streamer
                .transmit(&mut self.transport, &self.ctx.state)
                .await?;
            sleep(self.ctx.timing.stream_interval).await;
        }
    }
}
