//! Color streaming: pixel-grid snapshots in, color frames out.
//!
//! The pixels themselves come from a [`PixelSource`].  In production that is
//! whatever upstream producer renders the show; [`SharedGrid`] is the hand-off
//! point such a producer writes into.  When nothing is attached, the server
//! falls back to [`DemoPattern`], a moving four-color stripe.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, RwLock};

use pixelmesh_core::protocol::encode_color;
use pixelmesh_core::{PixelGrid, Rgb};
use tracing::trace;

use crate::application::mesh_state::MeshState;
use crate::application::transport::{FrameTransport, LinkError};

/// Supplies the picture to show on the next color frame.
///
/// `snapshot` is called exactly once per transmitted frame.
#[cfg_attr(test, mockall::automock)]
pub trait PixelSource: Send + Sync {
    fn snapshot(&self) -> PixelGrid;
}

// ── Demo content ──────────────────────────────────────────────────────────────

/// Stripe palette, in cycling order.
const DEMO_PALETTE: [Rgb; 4] = [Rgb::RED, Rgb::GREEN, Rgb::BLUE, Rgb::WHITE];

/// A placeholder animation: four phase-shifted frames cycling a red, green,
/// blue, white palette across the grid.
///
/// In phase `k`, cell `(r, c)` shows `palette[(k + r·cols + c) mod 4]`.  Each
/// snapshot advances to the next phase, so the stripes appear to crawl.
#[derive(Debug)]
pub struct DemoPattern {
    phases: Vec<PixelGrid>,
    cursor: AtomicUsize,
}

impl DemoPattern {
    pub fn new(rows: usize, cols: usize) -> Self {
        let phases = (0..DEMO_PALETTE.len())
            .map(|k| {
                PixelGrid::from_fn(rows, cols, |r, c| {
                    DEMO_PALETTE[(k + r * cols + c) % DEMO_PALETTE.len()]
                })
            })
            .collect();
        Self {
            phases,
            cursor: AtomicUsize::new(0),
        }
    }
}

impl PixelSource for DemoPattern {
    fn snapshot(&self) -> PixelGrid {
        let phase = self.cursor.fetch_add(1, Ordering::Relaxed) % self.phases.len();
        self.phases[phase].clone()
    }
}

// ── Externally fed content ────────────────────────────────────────────────────

/// A grid an upstream producer overwrites and the streamer reads.
#[derive(Debug)]
pub struct SharedGrid {
    inner: RwLock<PixelGrid>,
}

impl SharedGrid {
    pub fn new(grid: PixelGrid) -> Self {
        Self {
            inner: RwLock::new(grid),
        }
    }

    /// Replaces the whole picture.
    pub fn update(&self, grid: PixelGrid) {
        // A panic in another writer cannot leave a PixelGrid half-written,
        // so a poisoned lock is still safe to reuse.
        *self.inner.write().unwrap_or_else(|e| e.into_inner()) = grid;
    }
}

impl PixelSource for SharedGrid {
    fn snapshot(&self) -> PixelGrid {
        self.inner.read().unwrap_or_else(|e| e.into_inner()).clone()
    }
}

// ── Streamer ──────────────────────────────────────────────────────────────────

/// Encodes and sends one color frame per call.
#[derive(Clone)]
pub struct ColorStreamer {
    source: Arc<dyn PixelSource>,
}

impl ColorStreamer {
    pub fn new(source: Arc<dyn PixelSource>) -> Self {
        Self { source }
    }

    /// Encodes and sends one frame of the current snapshot, returning its
    /// size in bytes.
    ///
    /// # Errors
    ///
    /// Returns [`LinkError::ConnectionLost`] once the peer is gone; the caller
    /// must stop streaming rather than retry.
    pub async fn transmit(
        &self,
        transport: &mut dyn FrameTransport,
        state: &MeshState,
    ) -> Result<usize, LinkError> {
        let grid = self.source.snapshot();
        self.send_grid(transport, state, &grid, None).await
    }

    /// Encodes `grid` for every registered device and sends it.
    ///
    /// The frame carries the counter's current value, which is only consumed
    /// once the send succeeded. A frame that never left does not burn a
    /// sequence number.
    pub async fn send_grid(
        &self,
        transport: &mut dyn FrameTransport,
        state: &MeshState,
        grid: &PixelGrid,
        highlight: Option<(u8, Rgb)>,
    ) -> Result<usize, LinkError> {
        let sequence = state.sequence().current();
        let frame = {
            let registry = state.registry().lock().await;
            encode_color(&registry, grid, sequence, highlight)
        };
        transport.send_frame(&frame).await?;
        state.sequence().advance();
        trace!("sent color frame {sequence} of {} bytes", frame.len());
        Ok(frame.len())
    }
}
