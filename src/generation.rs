//! Navigation generations.
//!
//! Every navigation starts a new generation. Background work captures the
//! `Generation` that was current when it was created and checks that snapshot
//! (never a shared "latest" value) before publishing anything.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

use crate::error::{Result, ViewError};

/// Hands out generations. Owned by the coordinating task.
#[derive(Debug)]
pub struct GenerationCounter {
    active: Arc<AtomicU64>,
    current: Generation,
}

/// Snapshot of one generation. Cheap to clone into background work.
#[derive(Debug, Clone)]
pub struct Generation {
    id: u64,
    active: Arc<AtomicU64>,
    token: CancellationToken,
}

impl Default for GenerationCounter {
    fn default() -> Self {
        Self::new()
    }
}

impl GenerationCounter {
    pub fn new() -> Self {
        let active = Arc::new(AtomicU64::new(0));
        let current = Generation {
            id: 0,
            active: active.clone(),
            token: CancellationToken::new(),
        };
        Self { active, current }
    }

    /// Invalidate the current generation and start the next one.
    ///
    /// The old generation is marked stale before its token is cancelled, so
    /// a unit that wakes up from cancellation already sees itself as stale.
    pub fn advance(&mut self) -> Generation {
        let id = self.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.current.token.cancel();
        self.current = Generation {
            id,
            active: self.active.clone(),
            token: CancellationToken::new(),
        };
        log::debug!("Generation advanced to {}", id);
        self.current.clone()
    }

    pub fn current(&self) -> &Generation {
        &self.current
    }

    /// Cancel the current generation without starting a new one (teardown).
    pub fn cancel_all(&self) {
        self.active.fetch_add(1, Ordering::SeqCst);
        self.current.token.cancel();
    }
}

impl Generation {
    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn is_current(&self) -> bool {
        !self.token.is_cancelled() && self.active.load(Ordering::SeqCst) == self.id
    }

    /// `Err(Cancelled)` once a newer generation has started.
    pub fn check(&self) -> Result<()> {
        if self.is_current() {
            Ok(())
        } else {
            Err(ViewError::Cancelled)
        }
    }
}
