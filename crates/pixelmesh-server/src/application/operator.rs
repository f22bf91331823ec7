//! Operator seam: the human (or script) commissioning the installation.
//!
//! Discovery and calibration need answers only someone looking at the wall
//! can give: "are all nodes announced yet?" and "which cell just lit up?".
//! The session asks through this trait and never touches a terminal itself.

use async_trait::async_trait;
use pixelmesh_core::{Device, GridPosition};

/// What to do after a calibrated cell has been shown back to the operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CalibrationDecision {
    /// The cell is right; move on to the next device.
    Advance,
    /// Highlight the same device again and ask for its cell once more.
    Retry,
    /// Stop calibrating; remaining devices keep no position.
    Abort,
}

/// Source of commissioning decisions.
#[async_trait]
pub trait Operator: Send + Sync {
    /// Called after each newly registered node.  `false` ends discovery.
    async fn continue_discovery(&self, registered: usize) -> bool;

    /// Asks which grid cell `device` lit up.
    ///
    /// `None` means no answer can be obtained any more (e.g. input closed).
    async fn locate(&self, device: &Device) -> Option<GridPosition>;

    /// Asks whether the cell shown for `device` at `position` is correct.
    async fn confirm(&self, device: &Device, position: GridPosition) -> CalibrationDecision;
}
