//! Round-robin device cursor.

use std::sync::atomic::{AtomicUsize, Ordering};

/// Position after `position` in a ring of `len` slots. `len` must be non-zero.
pub fn advance(position: usize, len: usize) -> usize {
    (position + 1) % len
}

/// Cursor handing out items of a fixed list in rotation.
///
/// Safe to share between threads: each call to [`next`](Self::next) claims a
/// distinct position, so concurrent callers never lose an advance.
#[derive(Debug, Default)]
pub struct RoundRobinCursor {
    position: AtomicUsize,
}

impl RoundRobinCursor {
    /// Create a cursor at position 0.
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the item at the current position and advance.
    ///
    /// Returns `None` for an empty list.
    pub fn next<T: Copy>(&self, items: &[T]) -> Option<T> {
        let len = items.len();
        if len == 0 {
            return None;
        }
        let previous = self
            .position
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |p| Some(advance(p % len, len)))
            .unwrap_or_else(|p| p);
        Some(items[previous % len])
    }

    /// Current position.
    pub fn position(&self) -> usize {
        self.position.load(Ordering::Acquire)
    }

    /// Move back to position 0.
    pub fn reset(&self) {
        self.position.store(0, Ordering::Release);
    }
}
