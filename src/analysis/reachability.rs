use super::entry_points::Roots;
use crate::graph::{EdgeKind, Graph, NodeId, ReferenceEdge};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet, VecDeque};
use tracing::debug;

/// Reachability classification of a node
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Reachability {
    Reachable,
    UnreachableHeuristic,
    UnreachableCertain,
}

/// Why a node is a removal candidate
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(tag = "reason", rename_all = "kebab-case")]
pub enum RemovalReason {
    /// Nothing references the node with a certain edge
    NoCertainInbound,
    /// Certain references exist, but only from unreachable code
    InboundOnlyFromDeadCode { count: usize },
    /// Only weak signals point at the node
    HeuristicOnly { kinds: Vec<EdgeKind> },
    /// Part of a reference cycle nothing outside the cycle enters
    DeadCycle { size: usize },
}

/// A node the plan may act on
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RemovalCandidate {
    pub node: NodeId,
    pub reachability: Reachability,
    pub reasons: Vec<RemovalReason>,
}

/// Result of one reachability analysis
#[derive(Debug, Clone, Default)]
pub struct ReachabilityResult {
    states: HashMap<NodeId, Reachability>,
}

impl ReachabilityResult {
    /// Classification of a node; nodes absent from the graph count as reachable
    pub fn state(&self, id: &NodeId) -> Reachability {
        self.states
            .get(id)
            .copied()
            .unwrap_or(Reachability::Reachable)
    }

    pub fn is_reachable(&self, id: &NodeId) -> bool {
        self.state(id) == Reachability::Reachable
    }

    /// Nodes with a given classification, sorted
    pub fn with_state(&self, state: Reachability) -> Vec<&NodeId> {
        let mut ids: Vec<&NodeId> = self
            .states
            .iter()
            .filter(|(_, s)| **s == state)
            .map(|(id, _)| id)
            .collect();
        ids.sort();
        ids
    }

    pub fn reachable_set(&self) -> HashSet<&NodeId> {
        self.with_state(Reachability::Reachable).into_iter().collect()
    }

    pub fn count(&self, state: Reachability) -> usize {
        self.states.values().filter(|s| **s == state).count()
    }
}

/// Two-phase breadth-first reachability.
///
/// Phase 1 walks certain edges from the roots. Phase 2 starts at every
/// unvisited node with an inbound heuristic edge, whatever its source, and
/// walks every edge over the remaining nodes. Whatever neither phase reaches
/// has no reference to it that could be real.
pub struct ReachabilityAnalyzer;

impl ReachabilityAnalyzer {
    pub fn new() -> Self {
        Self
    }

    pub fn analyze(&self, graph: &Graph, roots: &Roots) -> ReachabilityResult {
        let mut reachable: HashSet<NodeId> = HashSet::new();
        let mut queue: VecDeque<NodeId> = VecDeque::new();

        for (id, _) in roots.iter() {
            if graph.contains(id) && reachable.insert(id.clone()) {
                queue.push_back(id.clone());
            }
        }
        walk(graph, &mut queue, &mut reachable, &HashSet::new(), false, |edge| edge.is_certain());

        // Phase 2 seeds: any weak reference, even one out of dead code
        let mut heuristic: HashSet<NodeId> = HashSet::new();
        let seeds: BTreeSet<NodeId> = graph
            .node_ids()
            .filter(|id| !reachable.contains(*id))
            .filter(|id| graph.inbound(id).iter().any(|(_, edge)| !edge.is_certain()))
            .cloned()
            .collect();
        for seed in seeds {
            if heuristic.insert(seed.clone()) {
                queue.push_back(seed);
            }
        }
        // A file that may be loaded dynamically keeps everything it declares
        walk(graph, &mut queue, &mut heuristic, &reachable, true, |_| true);

        let states: HashMap<NodeId, Reachability> = graph
            .node_ids()
            .map(|id| {
                let state = if reachable.contains(id) {
                    Reachability::Reachable
                } else if heuristic.contains(id) {
                    Reachability::UnreachableHeuristic
                } else {
                    Reachability::UnreachableCertain
                };
                (id.clone(), state)
            })
            .collect();

        debug!(
            "Reachability: {} reachable, {} heuristic, {} unreachable",
            reachable.len(),
            heuristic.len(),
            states.len() - reachable.len() - heuristic.len()
        );
        ReachabilityResult { states }
    }

    /// Removal candidates for every unreachable, non-opaque node, with reasons
    pub fn candidates(&self, graph: &Graph, result: &ReachabilityResult) -> Vec<RemovalCandidate> {
        let mut candidates: BTreeMap<NodeId, RemovalCandidate> = BTreeMap::new();

        for id in graph.node_ids() {
            let state = result.state(id);
            if state == Reachability::Reachable || graph.is_opaque(id) {
                continue;
            }

            let inbound = graph.inbound(id);
            let mut reasons = Vec::new();
            match state {
                Reachability::UnreachableCertain => {
                    let count = inbound
                        .iter()
                        .filter(|(source, edge)| edge.is_certain() && *source != id)
                        .count();
                    if count == 0 {
                        reasons.push(RemovalReason::NoCertainInbound);
                    } else {
                        reasons.push(RemovalReason::InboundOnlyFromDeadCode { count });
                    }
                }
                Reachability::UnreachableHeuristic => {
                    let kinds: BTreeSet<EdgeKind> = inbound
                        .iter()
                        .filter(|(_, edge)| !edge.is_certain())
                        .map(|(_, edge)| edge.kind)
                        .collect();
                    reasons.push(RemovalReason::HeuristicOnly {
                        kinds: kinds.into_iter().collect(),
                    });
                }
                Reachability::Reachable => {}
            }

            candidates.insert(
                id.clone(),
                RemovalCandidate {
                    node: id.clone(),
                    reachability: state,
                    reasons,
                },
            );
        }
        candidates.into_values().collect()
    }
}

impl Default for ReachabilityAnalyzer {
    fn default() -> Self {
        Self::new()
    }
}

/// Breadth-first walk from the queued nodes. Containment travels with every
/// visit: the owning file, the enclosing symbol and a symbol's members.
fn walk(
    graph: &Graph,
    queue: &mut VecDeque<NodeId>,
    visited: &mut HashSet<NodeId>,
    excluded: &HashSet<NodeId>,
    file_members: bool,
    follow: impl Fn(&ReferenceEdge) -> bool,
) {
    while let Some(id) = queue.pop_front() {
        let mut next: Vec<NodeId> = graph
            .outbound(&id)
            .into_iter()
            .filter(|(_, edge)| follow(edge))
            .map(|(target, _)| target.clone())
            .collect();

        if !id.is_file() {
            next.extend(graph.container_of(&id));
            next.push(id.owning_file());
            next.extend(graph.members_of(&id).iter().cloned());
        } else if file_members {
            next.extend(graph.members_of(&id).iter().cloned());
        }

        for target in next {
            if !excluded.contains(&target) && graph.contains(&target) && visited.insert(target.clone()) {
                queue.push_back(target);
            }
        }
    }
}
