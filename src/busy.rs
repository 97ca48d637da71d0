//! Busy flag shared by the reply path and server-initiated sends.
//!
//! Only one frame may be on the wire at a time. The frame processor holds the
//! flag for the whole exchange; a server-initiated send takes it for the
//! duration of its frame and gives up immediately if it is already held.
//!
//! The flag is an `Arc<AtomicBool>` so that a clone can be handed to code
//! running outside the engine (an interrupt-style callback, another task)
//! and observed there.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Shared busy flag.
#[derive(Debug, Clone, Default)]
pub struct BusyFlag {
    busy: Arc<AtomicBool>,
}

impl BusyFlag {
    /// Create a cleared flag.
    pub fn new() -> Self {
        Self::default()
    }

    /// Take the flag without waiting. `None` if it is already held.
    pub fn try_acquire(&self) -> Option<BusyGuard> {
        self.busy
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| BusyGuard {
                busy: self.busy.clone(),
            })
    }

    /// Check if the flag is currently held.
    #[inline]
    pub fn is_set(&self) -> bool {
        self.busy.load(Ordering::Acquire)
    }
}

/// Holds the busy flag; clears it on drop.
#[derive(Debug)]
pub struct BusyGuard {
    busy: Arc<AtomicBool>,
}

impl Drop for BusyGuard {
    fn drop(&mut self) {
        self.busy.store(false, Ordering::Release);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exclusive_acquire() {
        let flag = BusyFlag::new();
        assert!(!flag.is_set());

        let guard = flag.try_acquire().unwrap();
        assert!(flag.is_set());
        assert!(flag.try_acquire().is_none());

        drop(guard);
        assert!(!flag.is_set());
        assert!(flag.try_acquire().is_some());
    }

    #[test]
    fn test_clones_share_state() {
        let flag = BusyFlag::new();
        let observer = flag.clone();

        let _guard = flag.try_acquire().unwrap();
        assert!(observer.is_set());
        assert!(observer.try_acquire().is_none());
    }
}
