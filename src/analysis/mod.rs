//! Analyses over a finished graph: roots, reachability, dead cycles and duplicates.
//!
//! Every analysis borrows the graph immutably.

mod cycles;
mod duplicates;
mod entry_points;
mod reachability;

pub use cycles::{CycleDetector, CycleInfo};
pub(crate) use duplicates::UnionFind;
pub use duplicates::{jaccard, DuplicateCluster, DuplicateDetector, DuplicateKind, DuplicatePair};
pub use entry_points::{EntryPointDetector, RootKind, Roots};
pub use reachability::{
    Reachability, ReachabilityAnalyzer, ReachabilityResult, RemovalCandidate, RemovalReason,
};
