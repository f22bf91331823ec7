//! Scripted operator for tests.
//!
//! Answers are queued up front and handed out in order.  Once a queue runs
//! dry the operator gives the "stop" answer for it: discovery ends, `locate`
//! returns `None`, and `confirm` advances.  Every device passed to `locate`
//! is recorded so tests can check the calibration order.
//!
//! ```ignore
//! let operator = ScriptedOperator::new()
//!     .with_discovery([true, false])
//!     .with_positions([GridPosition::new(0, 0), GridPosition::new(0, 1)]);
//! ```

use std::collections::VecDeque;
use std::sync::{Mutex, PoisonError};

use async_trait::async_trait;
use pixelmesh_core::{Device, GridPosition};

use crate::application::operator::{CalibrationDecision, Operator};

#[derive(Default)]
pub struct ScriptedOperator {
    /// Answers to `continue_discovery`.
    pub discovery: Mutex<VecDeque<bool>>,
    /// Answers to `locate`.
    pub positions: Mutex<VecDeque<GridPosition>>,
    /// Answers to `confirm`.
    pub decisions: Mutex<VecDeque<CalibrationDecision>>,
    /// Index of every device passed to `locate`, in call order.
    pub located: Mutex<Vec<u8>>,
}

impl ScriptedOperator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_discovery(self, answers: impl IntoIterator<Item = bool>) -> Self {
        lock(&self.discovery).extend(answers);
        self
    }

    pub fn with_positions(self, answers: impl IntoIterator<Item = GridPosition>) -> Self {
        lock(&self.positions).extend(answers);
        self
    }

    pub fn with_decisions(self, answers: impl IntoIterator<Item = CalibrationDecision>) -> Self {
        lock(&self.decisions).extend(answers);
        self
    }

    pub fn located(&self) -> Vec<u8> {
        lock(&self.located).clone()
    }
}

fn lock<T>(m: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}

#[async_trait]
impl Operator for ScriptedOperator {
    async fn continue_discovery(&self, _registered: usize) -> bool {
        lock(&self.discovery).pop_front().unwrap_or(false)
    }

    async fn locate(&self, device: &Device) -> Option<GridPosition> {
        lock(&self.located).push(device.index);
        lock(&self.positions).pop_front()
    }

    async fn confirm(&self, _device: &Device, _position: GridPosition) -> CalibrationDecision {
        lock(&self.decisions)
            .pop_front()
            .unwrap_or(CalibrationDecision::Advance)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pixelmesh_core::MacAddress;

    #[tokio::test]
    async fn test_exhausted_queues_give_stop_answers() {
        let op = ScriptedOperator::new();
        let device = Device {
            index: 4,
            mac: MacAddress([0; 6]),
            position: None,
        };

        assert!(!op.continue_discovery(1).await);
        assert_eq!(op.locate(&device).await, None);
        assert_eq!(
            op.confirm(&device, GridPosition::new(0, 0)).await,
            CalibrationDecision::Advance
        );
        assert_eq!(op.located(), vec![4]);
    }
}
