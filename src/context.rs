//! Cooperative cancellation, threaded through every suspension point.
//!
//! There is no async runtime here (see `lib.rs`): the engine is thread-based,
//! so a Go-style `ctx` becomes a cheap, cloneable flag. Every call into the
//! storage facade, every availability probe, and the top of every streaming
//! loop iteration checks `is_cancelled()` before doing anything expensive.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// A cloneable cancellation flag shared between a caller and the engine call
/// it kicked off. Cloning shares the same underlying flag; cancelling any
/// clone cancels all of them.
#[derive(Clone, Debug, Default)]
pub struct CancellationToken {
    cancelled: Arc<AtomicBool>,
}

impl CancellationToken {
    pub fn new() -> Self {
        Self { cancelled: Arc::new(AtomicBool::new(false)) }
    }

    /// A token that can never be cancelled — for callers who don't need one.
    pub fn none() -> Self {
        Self::new()
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    #[inline]
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    /// Convenience for call sites that want `?`-style early return.
    #[inline]
    pub fn check(&self) -> Result<(), crate::error::Cancelled> {
        if self.is_cancelled() {
            Err(crate::error::Cancelled)
        } else {
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clones_share_state() {
        let t1 = CancellationToken::new();
        let t2 = t1.clone();
        assert!(!t1.is_cancelled());
        t2.cancel();
        assert!(t1.is_cancelled());
    }

    #[test]
    fn fresh_token_is_not_cancelled() {
        assert!(!CancellationToken::new().is_cancelled());
        assert!(CancellationToken::none().check().is_ok());
    }
}
