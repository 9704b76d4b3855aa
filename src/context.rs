//! Explicit per-run state: cancellation and the extraction cache.
//!
//! Nothing here is global. A long-lived process (watch mode, a service) keeps
//! one [`RunContext`] per project and passes it to every run, so two projects
//! analysed side by side never see each other's cached files.

use crate::cache::ExtractionCache;
use crate::config::Config;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;

/// The run was cancelled or ran past its wall-clock budget
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("analysis run cancelled")]
pub struct Cancelled;

/// Cooperative cancellation signal checked between files and pairs
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    flag: Arc<AtomicBool>,
    deadline: Option<Instant>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// Derive a token sharing this one's flag that also expires after `budget`
    pub fn with_budget(&self, budget: Option<Duration>) -> Self {
        Self {
            flag: Arc::clone(&self.flag),
            deadline: budget.map(|b| Instant::now() + b),
        }
    }

    /// Request cancellation of every run holding this token
    pub fn cancel(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    /// Clear a previous cancellation so the context can run again
    pub fn reset(&self) {
        self.flag.store(false, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        if self.flag.load(Ordering::Relaxed) {
            return true;
        }
        matches!(self.deadline, Some(deadline) if Instant::now() >= deadline)
    }

    pub fn check(&self) -> Result<(), Cancelled> {
        if self.is_cancelled() {
            Err(Cancelled)
        } else {
            Ok(())
        }
    }
}

/// State threaded through an analysis run
#[derive(Debug)]
pub struct RunContext {
    pub config: Config,
    pub cancel: CancelToken,
    pub cache: ExtractionCache,
}

impl RunContext {
    pub fn new(config: Config) -> Self {
        Self {
            config,
            cancel: CancelToken::new(),
            cache: ExtractionCache::new(),
        }
    }

    /// Token for one run, bounded by the configured wall-clock budget
    pub fn run_token(&self) -> CancelToken {
        self.cancel
            .with_budget(self.config.run.max_duration_secs.map(Duration::from_secs))
    }
}
