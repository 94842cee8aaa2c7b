//! Progress reporting for pipeline runs.
//!
//! [`ProgressCallback`] decouples the pipeline from any rendering backend.
//! [`NullProgress`] ignores updates and [`LogProgress`] reports them through
//! the `log` facade.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

/// Trait for reporting progress from long-running operations.
///
/// Implementations must be `Send + Sync` so one reporter can be shared by
/// every concurrent task of a batch.
pub trait ProgressCallback: Send + Sync {
    /// Set the total expected units of work.
    fn set_total(&self, total: u64);

    /// Set the current position (absolute, not delta).
    fn set_position(&self, pos: u64);

    /// Advance progress by `delta` units.
    fn inc(&self, delta: u64);

    /// Update the message displayed alongside the progress indicator.
    fn set_message(&self, msg: String);

    /// Mark progress as complete with a final message.
    fn finish(&self, msg: String);
}

/// A no-op implementation of [`ProgressCallback`].
pub struct NullProgress;

impl ProgressCallback for NullProgress {
    fn set_total(&self, _total: u64) {}
    fn set_position(&self, _pos: u64) {}
    fn inc(&self, _delta: u64) {}
    fn set_message(&self, _msg: String) {}
    fn finish(&self, _msg: String) {}
}

/// Returns a shared [`NullProgress`] instance for convenient use.
#[must_use]
pub fn null_progress() -> Arc<dyn ProgressCallback> {
    Arc::new(NullProgress)
}

/// Logs progress at `info` level every `every` completed units.
pub struct LogProgress {
    total: AtomicU64,
    position: AtomicU64,
    every: u64,
}

impl LogProgress {
    #[must_use]
    pub fn new(every: u64) -> Self {
        Self {
            total: AtomicU64::new(0),
            position: AtomicU64::new(0),
            every: every.max(1),
        }
    }

    /// Units completed so far.
    #[must_use]
    pub fn position(&self) -> u64 {
        self.position.load(Ordering::Relaxed)
    }
}

impl ProgressCallback for LogProgress {
    fn set_total(&self, total: u64) {
        self.total.store(total, Ordering::Relaxed);
    }

    fn set_position(&self, pos: u64) {
        self.position.store(pos, Ordering::Relaxed);
    }

    fn inc(&self, delta: u64) {
        let before = self.position.fetch_add(delta, Ordering::Relaxed);
        let after = before + delta;
        if after / self.every > before / self.every {
            log::info!("{after}/{} tasks", self.total.load(Ordering::Relaxed));
        }
    }

    fn set_message(&self, msg: String) {
        log::info!("{msg}");
    }

    fn finish(&self, msg: String) {
        log::info!(
            "{msg} ({}/{} tasks)",
            self.position(),
            self.total.load(Ordering::Relaxed)
        );
    }
}
