//! Watch mode: rerun the dry analysis whenever source files change.
//!
//! The watcher owns nothing but the debounce window and the exclusion set.
//! The [`RunContext`] is passed in, so the extraction cache survives between
//! runs and only changed files are re-extracted.

use crate::config::Config;
use crate::context::RunContext;
use crate::discovery::Language;
use crate::engine::{Engine, RunOutcome};
use colored::Colorize;
use globset::{Glob, GlobSet, GlobSetBuilder};
use notify::RecursiveMode;
use notify_debouncer_mini::{new_debouncer, DebouncedEventKind};
use std::path::Path;
use std::sync::mpsc::channel;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, warn};

/// Watch mode errors
#[derive(Error, Debug)]
pub enum WatchError {
    #[error("Failed to create file watcher: {0}")]
    Watcher(#[from] notify::Error),
    #[error("Failed to receive events: {0}")]
    Recv(#[from] std::sync::mpsc::RecvError),
    #[error("Invalid exclude pattern '{pattern}': {source}")]
    Pattern {
        pattern: String,
        #[source]
        source: globset::Error,
    },
}

/// How a run's plan relates to the previous run's
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlanChange {
    First,
    Unchanged,
    Changed,
    /// The run did not complete; the last known plan is kept
    Incomplete,
}

/// Remembers the last complete plan fingerprint
#[derive(Debug, Default)]
pub struct PlanTracker {
    last: Option<String>,
}

impl PlanTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn observe(&mut self, outcome: &RunOutcome) -> PlanChange {
        if !outcome.report.run.complete {
            return PlanChange::Incomplete;
        }
        let fingerprint = &outcome.report.fingerprint;
        let change = match &self.last {
            None => PlanChange::First,
            Some(last) if last == fingerprint => PlanChange::Unchanged,
            Some(_) => PlanChange::Changed,
        };
        self.last = Some(fingerprint.clone());
        change
    }
}

/// File watcher for continuous analysis
pub struct FileWatcher {
    debounce_ms: u64,
    excludes: GlobSet,
}

impl FileWatcher {
    pub fn new(config: &Config) -> Result<Self, WatchError> {
        let mut builder = GlobSetBuilder::new();
        for pattern in &config.scan.exclude {
            let glob = Glob::new(pattern).map_err(|source| WatchError::Pattern {
                pattern: pattern.clone(),
                source,
            })?;
            builder.add(glob);
        }
        let excludes = builder.build().map_err(|source| WatchError::Pattern {
            pattern: config.scan.exclude.join(", "),
            source,
        })?;
        Ok(Self {
            debounce_ms: 500,
            excludes,
        })
    }

    pub fn with_debounce_ms(mut self, ms: u64) -> Self {
        self.debounce_ms = ms;
        self
    }

    /// A change to `path` can alter the plan
    pub fn should_trigger(&self, path: &Path) -> bool {
        let Some(ext) = path.extension().and_then(|e| e.to_str()) else {
            return false;
        };
        if Language::from_extension(&ext.to_ascii_lowercase()).is_none() {
            return false;
        }
        if path
            .components()
            .any(|c| c.as_os_str().to_string_lossy().starts_with('.'))
        {
            return false;
        }
        !self.excludes.is_match(path)
    }

    /// Run once, then again after every relevant change. `on_run` returns
    /// false to stop watching.
    pub fn watch<F>(
        &self,
        engine: &Engine,
        ctx: &mut RunContext,
        mut on_run: F,
    ) -> Result<(), WatchError>
    where
        F: FnMut(&RunOutcome, PlanChange) -> bool,
    {
        let root = engine.options().root.clone();
        let (tx, rx) = channel();
        let mut debouncer = new_debouncer(Duration::from_millis(self.debounce_ms), tx)?;
        debouncer.watcher().watch(&root, RecursiveMode::Recursive)?;

        println!();
        println!("{}", "Watch mode active. Press Ctrl+C to stop.".cyan().bold());
        println!("{}", format!("   Watching: {}", root.display()).dimmed());
        println!();

        let mut tracker = PlanTracker::new();
        let outcome = engine.run(ctx);
        if !on_run(&outcome, tracker.observe(&outcome)) {
            return Ok(());
        }

        loop {
            match rx.recv()? {
                Ok(events) => {
                    let relevant = events
                        .iter()
                        .filter(|e| {
                            matches!(
                                e.kind,
                                DebouncedEventKind::Any | DebouncedEventKind::AnyContinuous
                            )
                        })
                        .filter(|e| {
                            let path = e.path.strip_prefix(&root).unwrap_or(&e.path);
                            self.should_trigger(path)
                        })
                        .count();
                    if relevant == 0 {
                        continue;
                    }
                    debug!("{} relevant change(s), re-analyzing", relevant);
                    println!(
                        "{}",
                        format!("Changes detected in {} file(s), re-analyzing...", relevant).yellow()
                    );

                    // A cancellation belongs to the run it interrupted
                    ctx.cancel.reset();
                    let outcome = engine.run(ctx);
                    if !on_run(&outcome, tracker.observe(&outcome)) {
                        break;
                    }
                }
                Err(e) => warn!("Watch error: {:?}", e),
            }
        }
        Ok(())
    }
}
