//! Process-wide mesh state shared by every session.
//!
//! Addressing happens once per process run: the first root node to connect
//! goes through discovery and calibration, and every later connection reuses
//! the resulting table.  That table, the "addressed" flag, and the color
//! sequence counter therefore outlive any single connection.
//!
//! The state is built once in `main` and handed to the listener and each
//! session as an `Arc<MeshState>`.
//!
//! # Session generations
//!
//! Only one session is meant to drive the mesh at a time.  Each accepted
//! connection bumps the generation counter; a session compares its own
//! generation with [`MeshState::current_generation`] before every send and
//! exits as soon as a newer one exists.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use pixelmesh_core::protocol::SequenceCounter;
use pixelmesh_core::{DeviceRegistry, PixelGrid};
use tokio::sync::Mutex;

/// State that persists across successive connections within one process.
#[derive(Debug)]
pub struct MeshState {
    registry: Mutex<DeviceRegistry>,
    addressed: AtomicBool,
    sequence: SequenceCounter,
    generation: AtomicU64,
    rows: usize,
    cols: usize,
}

impl MeshState {
    /// Creates empty state for a `rows` × `cols` installation.
    pub fn new(rows: usize, cols: usize) -> Self {
        Self {
            registry: Mutex::new(DeviceRegistry::new()),
            addressed: AtomicBool::new(false),
            sequence: SequenceCounter::new(),
            generation: AtomicU64::new(0),
            rows,
            cols,
        }
    }

    pub fn registry(&self) -> &Mutex<DeviceRegistry> {
        &self.registry
    }

    pub fn sequence(&self) -> &SequenceCounter {
        &self.sequence
    }

    /// `true` once discovery has completed in this process.
    pub fn is_addressed(&self) -> bool {
        self.addressed.load(Ordering::Acquire)
    }

    pub fn mark_addressed(&self) {
        self.addressed.store(true, Ordering::Release);
    }

    /// Grid dimensions as `(rows, cols)`.
    pub fn grid_size(&self) -> (usize, usize) {
        (self.rows, self.cols)
    }

    /// An all-black grid of the installation's size.
    pub fn blank_grid(&self) -> PixelGrid {
        PixelGrid::new(self.rows, self.cols)
    }

    /// Starts a new session generation and returns its token.
    ///
    /// Every session holding an older token is stale from this point on.
    pub fn begin_session(&self) -> u64 {
        self.generation.fetch_add(1, Ordering::AcqRel) + 1
    }

    pub fn current_generation(&self) -> u64 {
        self.generation.load(Ordering::Acquire)
    }

    pub fn is_current(&self, generation: u64) -> bool {
        self.current_generation() == generation
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pixelmesh_core::MacAddress;

    #[test]
    fn test_new_state_is_unaddressed_and_empty() {
        let state = MeshState::new(4, 19);
        assert!(!state.is_addressed());
        assert_eq!(state.grid_size(), (4, 19));
        assert_eq!(state.current_generation(), 0);
    }

    #[test]
    fn test_mark_addressed_persists() {
        let state = MeshState::new(1, 1);
        state.mark_addressed();
        assert!(state.is_addressed());
    }

    #[test]
    fn test_begin_session_makes_previous_generation_stale() {
        // Arrange
        let state = MeshState::new(1, 1);

        // Act
        let first = state.begin_session();
        let second = state.begin_session();

        // Assert
        assert_eq!(first, 1);
        assert_eq!(second, 2);
        assert!(!state.is_current(first));
        assert!(state.is_current(second));
    }

    #[test]
    fn test_blank_grid_matches_dimensions() {
        let state = MeshState::new(3, 7);
        let grid = state.blank_grid();
        assert_eq!((grid.rows(), grid.cols()), (3, 7));
    }

    #[tokio::test]
    async fn test_registry_is_shared_through_the_state() {
        let state = MeshState::new(1, 1);
        state
            .registry()
            .lock()
            .await
            .register(MacAddress([1; 6]))
            .unwrap();
        assert_eq!(state.registry().lock().await.size(), 1);
    }
}
