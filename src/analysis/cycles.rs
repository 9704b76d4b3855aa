// Cycle detector - finds dead code that only references itself
//
// Mutual imports and mutually recursive functions are legal and common. A
// strongly connected component whose members are all unreachable is dead as
// a whole: removing any one member leaves the others referenced only by dead
// code, so the whole cycle has to go together.

use super::reachability::{Reachability, ReachabilityResult, RemovalCandidate, RemovalReason};
use crate::graph::{Graph, NodeId};
use petgraph::algo::tarjan_scc;
use std::collections::{BTreeSet, HashMap};
use tracing::debug;

/// A strongly connected component of unreachable nodes
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CycleInfo {
    /// Members in node order
    pub members: Vec<NodeId>,

    /// No edge enters the cycle from outside it
    pub closed: bool,
}

impl CycleInfo {
    pub fn size(&self) -> usize {
        self.members.len()
    }
}

/// Detector for dead reference cycles
pub struct CycleDetector;

impl CycleDetector {
    pub fn new() -> Self {
        Self
    }

    /// Cycles whose members are all UnreachableCertain, largest first
    pub fn find_dead_cycles(&self, graph: &Graph, result: &ReachabilityResult) -> Vec<CycleInfo> {
        let inner = graph.inner();
        let mut dead_cycles = Vec::new();

        for scc in tarjan_scc(inner) {
            if scc.len() < 2 {
                continue;
            }
            let members: BTreeSet<NodeId> = scc
                .iter()
                .filter_map(|&idx| inner.node_weight(idx).cloned())
                .collect();

            if members
                .iter()
                .any(|id| result.state(id) != Reachability::UnreachableCertain)
            {
                continue;
            }

            let closed = members.iter().all(|id| {
                graph
                    .inbound(id)
                    .iter()
                    .all(|(source, _)| members.contains(*source))
            });

            debug!("Dead cycle with {} members (closed: {})", members.len(), closed);
            dead_cycles.push(CycleInfo {
                members: members.into_iter().collect(),
                closed,
            });
        }

        dead_cycles.sort_by(|a, b| b.size().cmp(&a.size()).then_with(|| a.members.cmp(&b.members)));
        dead_cycles
    }

    /// Attach a cycle reason to every candidate inside a dead cycle
    pub fn annotate(&self, cycles: &[CycleInfo], candidates: &mut [RemovalCandidate]) {
        let membership: HashMap<&NodeId, usize> = cycles
            .iter()
            .flat_map(|c| c.members.iter().map(move |m| (m, c.size())))
            .collect();

        for candidate in candidates.iter_mut() {
            if let Some(&size) = membership.get(&candidate.node) {
                candidate.reasons.push(RemovalReason::DeadCycle { size });
            }
        }
    }
}

impl Default for CycleDetector {
    fn default() -> Self {
        Self::new()
    }
}
