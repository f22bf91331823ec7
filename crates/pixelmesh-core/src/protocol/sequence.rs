//! Thread-safe 16-bit sequence counter for color frames.
//!
//! Every color frame carries a sequence number in its `seq_hi`/`seq_lo`
//! bytes.  Nodes use it to drop stale frames that arrive out of order through
//! the mesh.  The counter is shared by every session of the process, so a
//! reconnecting root sees the numbering continue instead of restarting.
//!
//! # Thread safety
//!
//! The counter uses `AtomicU16` internally, so two tasks calling `next()` at
//! the same time never observe the same value.

use std::sync::atomic::{AtomicU16, Ordering};

/// A thread-safe counter producing color-frame sequence numbers.
///
/// Sequence numbers start at 0 and increment by 1 with each call to [`next`].
/// The counter wraps from `u16::MAX` back to 0, so after 65 536 frames the
/// numbering starts over.
///
/// # Examples
///
/// ```rust
/// use pixelmesh_core::protocol::SequenceCounter;
///
/// let counter = SequenceCounter::new();
/// assert_eq!(counter.next(), 0);
/// assert_eq!(counter.next(), 1);
/// ```
///
/// [`next`]: SequenceCounter::next
#[derive(Debug)]
pub struct SequenceCounter {
    inner: AtomicU16,
}

impl SequenceCounter {
    /// Creates a new counter starting at 0.
    pub fn new() -> Self {
        Self::starting_at(0)
    }

    /// Creates a counter whose first [`next`](Self::next) returns `value`.
    pub fn starting_at(value: u16) -> Self {
        Self {
            inner: AtomicU16::new(value),
        }
    }

    /// Returns the next sequence number and atomically increments the counter.
    ///
    /// `Ordering::Relaxed` is enough: the value orders frames on the wire and
    /// does not publish any other memory.
    pub fn next(&self) -> u16 {
        // `fetch_add` wraps on overflow for atomics, so u16::MAX + 1 becomes 0.
        self.inner.fetch_add(1, Ordering::Relaxed)
    }

    /// Returns the value the next call to [`next`](Self::next) will produce.
    pub fn current(&self) -> u16 {
        self.inner.load(Ordering::Relaxed)
    }

    /// Consumes the [`current`](Self::current) value.
    ///
    /// Paired with `current` by a sender that only spends a number once its
    /// frame actually left.  Assumes a single sender at a time.
    pub fn advance(&self) {
        self.inner.fetch_add(1, Ordering::Relaxed);
    }
}

impl Default for SequenceCounter {
    fn default() -> Self {
        Self::new()
    }
}
