//! Headless operator for a pre-wired installation.
//!
//! When the strip is wired in row-major order and the node count is known,
//! nobody needs to watch the wall: discovery waits for `expected` nodes and
//! device `k` is placed at cell `(k / cols, k % cols)`.

use async_trait::async_trait;
use pixelmesh_core::{Device, GridPosition};
use tracing::debug;

use crate::application::operator::{CalibrationDecision, Operator};

#[derive(Debug, Clone, Copy)]
pub struct AutoOperator {
    expected: usize,
    rows: usize,
    cols: usize,
}

impl AutoOperator {
    pub fn new(expected: usize, rows: usize, cols: usize) -> Self {
        Self {
            expected,
            rows,
            cols,
        }
    }
}

#[async_trait]
impl Operator for AutoOperator {
    async fn continue_discovery(&self, registered: usize) -> bool {
        registered < self.expected
    }

    async fn locate(&self, device: &Device) -> Option<GridPosition> {
        let k = device.index as usize;
        if self.cols == 0 || k >= self.rows * self.cols {
            debug!("device {k} has no cell in a {}x{} grid", self.rows, self.cols);
            return None;
        }
        Some(GridPosition::new(k / self.cols, k % self.cols))
    }

    async fn confirm(&self, _device: &Device, _position: GridPosition) -> CalibrationDecision {
        CalibrationDecision::Advance
    }
}
