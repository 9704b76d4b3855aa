//! reclaim - redundancy and reachability analysis for multi-language source trees
//!
//! This library finds duplicated and unreachable code and turns the findings
//! into a cleanup plan whose groups can be applied, verified and rolled back.
//!
//! # Architecture
//!
//! The analysis pipeline consists of:
//! 1. **File Discovery** - Walk the tree, honouring ignore files and excludes
//! 2. **Extraction** - Pattern-based symbol and reference profiles per language
//! 3. **Graph Building** - Build the reference graph, resolving imports across files
//! 4. **Entry Point Detection** - Mains, tests, exports and configured roots
//! 5. **Reachability Analysis** - Certain and heuristic dead code, dead cycles
//! 6. **Duplicate Detection** - Exact and near duplicates by shingled bodies
//! 7. **Planning** - Actions in transaction groups, checked against simulation
//! 8. **Applying** - Verified commits with per-group rollback and undo scripts

pub mod analysis;
pub mod cache;
pub mod config;
pub mod context;
pub mod discovery;
pub mod engine;
pub mod graph;
pub mod parser;
pub mod plan;
pub mod refactor;
pub mod report;
pub mod watch;

pub use analysis::{
    DuplicateCluster, DuplicateDetector, EntryPointDetector, Reachability, ReachabilityAnalyzer,
    RemovalCandidate,
};
pub use config::Config;
pub use context::{CancelToken, Cancelled, RunContext};
pub use discovery::{FileFinder, Language, SourceFile};
pub use engine::{Engine, EngineError, RunOptions, RunOutcome};
pub use graph::{Graph, NodeId, ParallelGraphBuilder};
pub use plan::{Action, ActionKind, CleanupPlan, GroupStatus, PlanGenerator};
pub use refactor::{UndoLog, VerificationGate};
pub use report::{Report, ReportFormat, TerminalReporter};
