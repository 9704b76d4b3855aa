//! One analysis run, end to end.
//!
//! scan → extract → graph → {reachability, duplicates} → plan → gate
//!
//! Every fatal error still yields a report, marked incomplete. Cancellation
//! discards the plan entirely: a cancelled run never reports actions.

use crate::analysis::{CycleDetector, DuplicateDetector, EntryPointDetector, ReachabilityAnalyzer};
use crate::context::{Cancelled, RunContext};
use crate::discovery::{FileFinder, FileStats, ScanError};
use crate::graph::{BuildError, GraphInconsistencyError, ParallelGraphBuilder};
use crate::plan::{CleanupPlan, GroupStatus, PlanGenerator};
use crate::refactor::{
    ApproveAll, Approver, FileSystemApplier, GateError, PromptApprover, ShellVerifier, UndoLog,
    VerificationGate,
};
use crate::report::{PriorReport, Report, ReportError};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, error, info, warn};

/// Everything that can end a run early
#[derive(Error, Debug)]
pub enum EngineError {
    #[error(transparent)]
    Scan(ScanError),

    #[error(transparent)]
    Graph(#[from] GraphInconsistencyError),

    #[error(transparent)]
    Cancelled(#[from] Cancelled),

    #[error(transparent)]
    Report(#[from] ReportError),

    #[error(transparent)]
    Gate(#[from] GateError),

    #[error("Failed to write undo script {path}: {source}")]
    UndoScript {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl From<ScanError> for EngineError {
    fn from(err: ScanError) -> Self {
        match err {
            ScanError::Cancelled(c) => EngineError::Cancelled(c),
            other => EngineError::Scan(other),
        }
    }
}

impl From<BuildError> for EngineError {
    fn from(err: BuildError) -> Self {
        match err {
            BuildError::Cancelled(c) => EngineError::Cancelled(c),
            BuildError::Inconsistent(e) => EngineError::Graph(e),
        }
    }
}

/// Per-invocation switches that are not project configuration
#[derive(Debug, Clone)]
pub struct RunOptions {
    pub root: PathBuf,
    pub dry_run: bool,
    pub interactive: bool,
    pub prior: Option<PathBuf>,
    pub undo_script: Option<PathBuf>,
    pub show_progress: bool,
}

impl RunOptions {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            dry_run: true,
            interactive: false,
            prior: None,
            undo_script: None,
            show_progress: false,
        }
    }

    pub fn apply(mut self) -> Self {
        self.dry_run = false;
        self
    }
}

/// What a run produced
#[derive(Debug)]
pub struct RunOutcome {
    pub report: Report,
    pub error: Option<EngineError>,
    /// Changes of committed groups
    pub undo: UndoLog,
}

impl RunOutcome {
    /// 0: clean or dry run done, 1: applied plan left groups uncommitted, 2: error
    pub fn exit_code(&self) -> i32 {
        if self.error.is_some() {
            return 2;
        }
        if !self.report.run.dry_run
            && self
                .report
                .groups
                .iter()
                .any(|g| g.status != GroupStatus::Committed)
        {
            return 1;
        }
        0
    }
}

/// Runs the pipeline against a [`RunContext`]
pub struct Engine {
    options: RunOptions,
}

impl Engine {
    pub fn new(options: RunOptions) -> Self {
        Self { options }
    }

    pub fn options(&self) -> &RunOptions {
        &self.options
    }

    pub fn run(&self, ctx: &mut RunContext) -> RunOutcome {
        let mut report = Report::new(&self.options.root, &ctx.config, self.options.dry_run);
        let mut undo = UndoLog::new();

        let error = match self.execute(ctx, &mut report, &mut undo) {
            Ok(()) => {
                report.run.complete = true;
                None
            }
            Err(e) => {
                if matches!(e, EngineError::Cancelled(_)) {
                    report.actions.clear();
                    report.groups.clear();
                    report.fingerprint.clear();
                }
                error!("{}", e);
                report.fail(&e);
                Some(e)
            }
        };

        RunOutcome {
            report,
            error,
            undo,
        }
    }

    fn execute(&self, ctx: &mut RunContext, report: &mut Report, undo: &mut UndoLog) -> Result<(), EngineError> {
        let cancel = ctx.run_token();

        info!("Scanning {}", self.options.root.display());
        let scan = FileFinder::new(&ctx.config).scan(&self.options.root, &cancel)?;
        report.run.root = scan.root.clone();
        report.files = FileStats::from_scan(&scan);
        info!("Found {} source files", scan.files.len());

        let graph = ParallelGraphBuilder::new(&ctx.config)
            .with_progress(self.options.show_progress)
            .build_from_files(&scan.files, &mut ctx.cache, &cancel)?;

        let roots = EntryPointDetector::new(&ctx.config).detect(&graph);
        let analyzer = ReachabilityAnalyzer::new();
        let reachability = analyzer.analyze(&graph, &roots);
        let mut candidates = analyzer.candidates(&graph, &reachability);
        let detector = CycleDetector::new();
        let cycles = detector.find_dead_cycles(&graph, &reachability);
        detector.annotate(&cycles, &mut candidates);
        info!(
            "{} removal candidate(s), {} dead cycle(s)",
            candidates.len(),
            cycles.len()
        );
        report.removal_candidates = candidates.clone();
        cancel.check()?;

        info!("Detecting duplicates...");
        let clusters = DuplicateDetector::new(&ctx.config.duplicates).detect(&graph, &cancel)?;
        report.duplicate_clusters = clusters.clone();

        let mut plan = PlanGenerator::new(&ctx.config.plan).generate(&graph, &clusters, &candidates);
        cancel.check()?;

        let gate = VerificationGate::new(&graph, &roots, &reachability).with_sources(&scan.files);
        let conflicts = gate.simulate_all(&mut plan);
        if !conflicts.is_empty() {
            warn!("{} group(s) need revision", conflicts.len());
        }

        // A later failure still reports the simulated plan
        report.set_plan(&plan);

        if let Some(path) = &self.options.prior {
            report.run.unchanged_since_prior = self.compare_with_prior(path, &plan)?;
        }

        if !self.options.dry_run {
            let outcome = self.apply(ctx, &gate, &mut plan, &scan.root, undo);
            report.set_plan(&plan);
            outcome?;
        }

        if let Some(path) = &self.options.undo_script {
            if undo.is_empty() {
                debug!("Nothing committed, no undo script written");
            } else {
                undo.write_script(path).map_err(|source| EngineError::UndoScript {
                    path: path.clone(),
                    source,
                })?;
                info!("Undo script saved to: {}", path.display());
            }
        }
        Ok(())
    }

    fn compare_with_prior(&self, path: &Path, plan: &CleanupPlan) -> Result<Option<bool>, EngineError> {
        if !path.exists() {
            info!("No prior report at {}", path.display());
            return Ok(None);
        }
        let prior = PriorReport::load(path)?;
        let unchanged = prior.unchanged(plan);
        if unchanged {
            info!("Plan unchanged since the prior report");
        } else {
            info!("{}", prior.delta(plan));
        }
        Ok(Some(unchanged))
    }

    /// Commit every pending group the approver accepts
    fn apply(
        &self,
        ctx: &RunContext,
        gate: &VerificationGate,
        plan: &mut CleanupPlan,
        root: &Path,
        undo: &mut UndoLog,
    ) -> Result<(), EngineError> {
        let Some(command) = ctx.config.run.verify_command.clone() else {
            warn!("Apply mode needs a verify command; no group was applied");
            return Ok(());
        };

        let mut applier = FileSystemApplier::new(root, &ctx.config.plan.archive_dir);
        let mut verifier = ShellVerifier::new(command);
        let mut approver: Box<dyn Approver> = if self.options.interactive {
            Box::new(PromptApprover::new())
        } else {
            Box::new(ApproveAll)
        };

        let pending: Vec<usize> = plan
            .groups_with(GroupStatus::Pending)
            .iter()
            .map(|g| g.id)
            .collect();
        info!("Applying {} pending group(s)", pending.len());

        for group in pending {
            if ctx.cancel.is_cancelled() {
                warn!("Cancelled; remaining groups left pending");
                break;
            }
            if !approver.approve(plan, group) {
                plan.set_status(group, GroupStatus::Declined, None);
                continue;
            }
            match gate.commit(plan, group, &mut applier, &mut verifier, root, undo) {
                Ok(()) => {}
                Err(e @ GateError::Rollback { .. }) => return Err(e.into()),
                Err(e) => warn!("{}", e),
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use tempfile::TempDir;

    fn tree(files: &[(&str, &str)]) -> TempDir {
        let dir = TempDir::new().unwrap();
        for (path, text) in files {
            let full = dir.path().join(path);
            std::fs::create_dir_all(full.parent().unwrap()).unwrap();
            std::fs::write(full, text).unwrap();
        }
        dir
    }

    #[test]
    fn test_dry_run_produces_complete_report() {
        let dir = tree(&[
            ("main.py", "from util import used\n\nused()\n"),
            ("util.py", "def used():\n    pass\n\ndef unused():\n    pass\n"),
        ]);
        let mut ctx = RunContext::new(Config::default());
        let outcome = Engine::new(RunOptions::new(dir.path())).run(&mut ctx);

        assert!(outcome.error.is_none());
        assert!(outcome.report.run.complete);
        assert_eq!(outcome.report.files.scanned, 2);
        assert_eq!(outcome.report.actions.len(), 1);
        assert_eq!(outcome.exit_code(), 0);
        assert!(dir.path().join("util.py").exists());
    }

    #[test]
    fn test_missing_root_is_fatal_but_reported() {
        let mut ctx = RunContext::new(Config::default());
        let outcome = Engine::new(RunOptions::new("/definitely/not/here")).run(&mut ctx);
        assert!(matches!(outcome.error, Some(EngineError::Scan(_))));
        assert!(!outcome.report.run.complete);
        assert!(outcome.report.run.error.is_some());
        assert_eq!(outcome.exit_code(), 2);
    }

    #[test]
    fn test_cancelled_run_has_no_plan() {
        let dir = tree(&[("main.py", "print(1)\n"), ("old.py", "x = 1\n")]);
        let mut ctx = RunContext::new(Config::default());
        ctx.cancel.cancel();
        let outcome = Engine::new(RunOptions::new(dir.path())).run(&mut ctx);
        assert!(matches!(outcome.error, Some(EngineError::Cancelled(_))));
        assert!(outcome.report.actions.is_empty());
        assert!(outcome.report.fingerprint.is_empty());
    }

    #[test]
    fn test_corrupt_prior_keeps_the_computed_plan() {
        let dir = tree(&[("main.py", "print(1)\n"), ("old.py", "x = 1\n")]);
        let out = TempDir::new().unwrap();
        let prior = out.path().join("prior.json");
        std::fs::write(&prior, "{ not a report").unwrap();

        let mut options = RunOptions::new(dir.path());
        options.prior = Some(prior);
        let mut ctx = RunContext::new(Config::default());
        let outcome = Engine::new(options).run(&mut ctx);

        assert!(matches!(outcome.error, Some(EngineError::Report(_))));
        assert!(!outcome.report.run.complete);
        assert_eq!(outcome.report.actions.len(), 1);
        assert_eq!(outcome.report.actions[0].subject, crate::graph::NodeId::file("old.py"));
        assert!(!outcome.report.fingerprint.is_empty());
        assert_eq!(outcome.exit_code(), 2);
    }

    #[test]
    fn test_apply_without_verifier_leaves_groups_pending() {
        let dir = tree(&[("main.py", "print(1)\n"), ("old.py", "x = 1\n")]);
        let mut ctx = RunContext::new(Config::default());
        let outcome = Engine::new(RunOptions::new(dir.path()).apply()).run(&mut ctx);
        assert!(outcome.error.is_none());
        assert!(dir.path().join("old.py").exists());
        assert_eq!(outcome.report.groups[0].status, GroupStatus::Pending);
        assert_eq!(outcome.exit_code(), 1);
    }

    #[cfg(unix)]
    #[test]
    fn test_apply_commits_verified_groups() {
        let dir = tree(&[("main.py", "print(1)\n"), ("old.py", "x = 1\n")]);
        let mut config = Config::default();
        config.run.verify_command = Some("true".to_string());
        let mut ctx = RunContext::new(config);
        let outcome = Engine::new(RunOptions::new(dir.path()).apply()).run(&mut ctx);

        assert!(outcome.error.is_none());
        assert!(!dir.path().join("old.py").exists());
        assert_eq!(outcome.report.groups[0].status, GroupStatus::Committed);
        assert_eq!(outcome.undo.file_count(), 1);
        assert_eq!(outcome.exit_code(), 0);
    }
}
