//! Stress tests for the slot admission controller
//!
//! ## What We Test
//!
//! - **High volume**: hundreds of thousands of admissions
//! - **High concurrency**: thousands of async participants sharing few slots
//! - **State consistency**: capacity and FIFO order under churn
//! - **Resource cleanup**: queues end empty, no deadlocks

pub mod demotion;

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// Utility: Track peak concurrent slot holders
pub struct ConcurrencyTracker {
    current: AtomicUsize,
    peak: AtomicUsize,
}

impl ConcurrencyTracker {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            current: AtomicUsize::new(0),
            peak: AtomicUsize::new(0),
        })
    }

    pub fn enter(&self) {
        let current = self.current.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(current, Ordering::SeqCst);
    }

    pub fn exit(&self) {
        self.current.fetch_sub(1, Ordering::SeqCst);
    }

    pub fn peak(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }

    pub fn current(&self) -> usize {
        self.current.load(Ordering::SeqCst)
    }
}

/// Installs a fmt subscriber once so `--nocapture` runs show controller logs.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_max_level(tracing_subscriber::filter::LevelFilter::INFO)
        .with_test_writer()
        .try_init();
}
