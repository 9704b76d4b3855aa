// Plan generator - turns analysis results into ordered, grouped actions
//
// Removal footprints: removing a file removes every symbol it declares,
// removing a symbol removes its members. A removal is only proposed when
// every certain reference into its footprint comes from another footprint;
// otherwise the code the plan keeps would lose something it uses.

use super::action::{Action, ActionConfidence, ActionKind, CleanupPlan, GroupStatus, TransactionGroup};
use crate::analysis::{
    DuplicateCluster, DuplicateKind, Reachability, RemovalCandidate, UnionFind,
};
use crate::config::PlanConfig;
use crate::graph::{Graph, NodeId};
use std::cmp::Reverse;
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use tracing::{debug, info};

/// Pick the member other members merge into: most certain inbound edges,
/// then earliest file path, then earliest line.
pub fn choose_canonical(graph: &Graph, members: &[NodeId]) -> Option<NodeId> {
    members
        .iter()
        .min_by_key(|id| {
            (
                Reverse(graph.certain_inbound_count(id)),
                id.path().to_path_buf(),
                start_line(id),
            )
        })
        .cloned()
}

fn start_line(id: &NodeId) -> usize {
    match id {
        NodeId::File { .. } => 0,
        NodeId::Symbol { line, .. } => *line,
    }
}

/// Builds a [`CleanupPlan`] from one run's analysis results
pub struct PlanGenerator<'a> {
    config: &'a PlanConfig,
}

impl<'a> PlanGenerator<'a> {
    pub fn new(config: &'a PlanConfig) -> Self {
        Self { config }
    }

    pub fn generate(
        &self,
        graph: &Graph,
        clusters: &[DuplicateCluster],
        candidates: &[RemovalCandidate],
    ) -> CleanupPlan {
        let mut actions = Vec::new();
        let mut protected: HashSet<NodeId> = HashSet::new();

        for (index, cluster) in clusters.iter().enumerate() {
            let Some(canonical) = choose_canonical(graph, &cluster.members) else {
                continue;
            };
            debug!("Canonical for cluster {}: {}", index, canonical);
            protected.extend(ancestors(graph, &canonical));
            protected.insert(canonical.clone());

            let kind = if cluster.signatures_differ {
                ActionKind::Parameterize
            } else {
                ActionKind::Merge
            };
            let confidence = match cluster.kind {
                DuplicateKind::Exact => ActionConfidence::Certain,
                DuplicateKind::Near => ActionConfidence::Heuristic,
            };
            for member in cluster.members.iter().filter(|m| **m != canonical) {
                actions.push(
                    Action::new(kind, confidence, member.clone()).with_canonical(canonical.clone(), index),
                );
            }
        }

        let certain: BTreeSet<&NodeId> = candidates
            .iter()
            .filter(|c| c.reachability == Reachability::UnreachableCertain)
            .map(|c| &c.node)
            .collect();
        let heuristic: BTreeSet<&NodeId> = candidates
            .iter()
            .filter(|c| c.reachability == Reachability::UnreachableHeuristic)
            .map(|c| &c.node)
            .collect();

        let mut removals = self.removals(graph, &certain, &protected);
        let blocked = retain_closed(graph, &mut removals);

        for (subject, _) in &removals {
            let kind = if subject.is_file() && self.config.archive_dead_files {
                ActionKind::Archive
            } else {
                ActionKind::Remove
            };
            actions.push(Action::new(kind, ActionConfidence::Certain, subject.clone()));
        }
        for subject in blocked {
            debug!("Kept alive by retained code: {}", subject);
            actions.push(Action::new(
                ActionKind::FlagForReview,
                ActionConfidence::Certain,
                subject,
            ));
        }
        for subject in topmost(graph, &heuristic) {
            actions.push(Action::new(
                ActionKind::FlagForReview,
                ActionConfidence::Heuristic,
                subject.clone(),
            ));
        }

        actions.sort_by(|a, b| {
            (a.kind, &a.subject, &a.canonical).cmp(&(b.kind, &b.subject, &b.canonical))
        });
        for (id, action) in actions.iter_mut().enumerate() {
            action.id = id;
        }

        let groups = group_actions(graph, &mut actions, &removals);
        let plan = CleanupPlan::new(actions, groups);
        info!(
            "Plan: {} actions in {} groups ({} remove, {} merge, {} flag-for-review)",
            plan.actions.len(),
            plan.groups.len(),
            plan.count(ActionKind::Remove) + plan.count(ActionKind::Archive),
            plan.count(ActionKind::Merge),
            plan.count(ActionKind::FlagForReview)
        );
        plan
    }

    /// Removal subjects with their footprints
    fn removals(
        &self,
        graph: &Graph,
        certain: &BTreeSet<&NodeId>,
        protected: &HashSet<NodeId>,
    ) -> BTreeMap<NodeId, BTreeSet<NodeId>> {
        let mut removals = BTreeMap::new();
        let removable = |id: &NodeId| certain.contains(id) && !protected.contains(id);

        for id in certain.iter().filter(|id| id.is_file()) {
            if removable(id) {
                removals.insert((*id).clone(), footprint(graph, id));
            }
        }
        for id in certain.iter().filter(|id| !id.is_file()) {
            if !removable(id) {
                continue;
            }
            // Subsumed by the removal of an enclosing symbol or the file
            if ancestors(graph, id).iter().any(|a| removable(a)) {
                continue;
            }
            removals.insert((*id).clone(), footprint(graph, id));
        }
        removals
    }
}

/// Drop removals whose footprint has a certain inbound edge from code that
/// stays, until none do. Returns the dropped subjects.
fn retain_closed(graph: &Graph, removals: &mut BTreeMap<NodeId, BTreeSet<NodeId>>) -> Vec<NodeId> {
    let mut dropped = Vec::new();
    loop {
        let covered: HashSet<&NodeId> = removals.values().flatten().collect();
        let blocked: Vec<NodeId> = removals
            .iter()
            .filter(|(_, nodes)| {
                nodes.iter().any(|node| {
                    graph
                        .inbound(node)
                        .iter()
                        .any(|(source, edge)| edge.is_certain() && !covered.contains(*source))
                })
            })
            .map(|(subject, _)| subject.clone())
            .collect();
        if blocked.is_empty() {
            break;
        }
        for subject in blocked {
            removals.remove(&subject);
            dropped.push(subject);
        }
    }
    dropped.sort();
    dropped
}

/// Join actions sharing a node, and actions whose removal changes the
/// inbound edges of another action's nodes. Assigns group ids in plan order.
fn group_actions(
    graph: &Graph,
    actions: &mut [Action],
    removals: &BTreeMap<NodeId, BTreeSet<NodeId>>,
) -> Vec<TransactionGroup> {
    let nodes_of = |action: &Action| -> BTreeSet<NodeId> {
        if action.kind.removes_subject() {
            if let Some(nodes) = removals.get(&action.subject) {
                return nodes.clone();
            }
        }
        let mut nodes = BTreeSet::from([action.subject.clone()]);
        nodes.extend(action.canonical.clone());
        nodes
    };
    let touched: Vec<BTreeSet<NodeId>> = actions.iter().map(|a| nodes_of(a)).collect();

    let mut owners: HashMap<&NodeId, Vec<usize>> = HashMap::new();
    for (index, nodes) in touched.iter().enumerate() {
        for node in nodes {
            owners.entry(node).or_default().push(index);
        }
    }

    let mut forest = UnionFind::new(actions.len());
    for indices in owners.values() {
        for pair in indices.windows(2) {
            forest.union(pair[0], pair[1]);
        }
    }
    for (index, action) in actions.iter().enumerate() {
        if !action.kind.removes_subject() {
            continue;
        }
        for node in &touched[index] {
            for (target, _) in graph.outbound(node) {
                for &other in owners.get(target).map(Vec::as_slice).unwrap_or(&[]) {
                    forest.union(index, other);
                }
            }
        }
    }

    // Actions are already in plan order, so groups come out ordered by first action
    let mut group_of_root: HashMap<usize, usize> = HashMap::new();
    let mut groups: Vec<TransactionGroup> = Vec::new();
    for index in 0..actions.len() {
        let root = forest.find(index);
        let group = *group_of_root.entry(root).or_insert_with(|| {
            groups.push(TransactionGroup {
                id: groups.len(),
                actions: Vec::new(),
                status: GroupStatus::Pending,
                note: None,
            });
            groups.len() - 1
        });
        actions[index].group = group;
        groups[group].actions.push(index);
    }

    for group in &mut groups {
        if !group.actions.iter().all(|&id| actions[id].kind.is_auto_applicable()) {
            group.status = GroupStatus::Manual;
        }
    }
    groups
}

/// Enclosing symbols and the owning file, innermost first
fn ancestors(graph: &Graph, id: &NodeId) -> Vec<NodeId> {
    let mut chain = Vec::new();
    let mut current = graph.container_of(id);
    while let Some(node) = current {
        current = graph.container_of(&node);
        chain.push(node);
    }
    chain
}

/// A node and everything declared inside it
pub(crate) fn footprint(graph: &Graph, id: &NodeId) -> BTreeSet<NodeId> {
    let mut nodes = BTreeSet::from([id.clone()]);
    let mut stack = vec![id.clone()];
    while let Some(node) = stack.pop() {
        for member in graph.members_of(&node) {
            if nodes.insert(member.clone()) {
                stack.push(member.clone());
            }
        }
    }
    nodes
}

/// Nodes of a set none of whose ancestors are in the set
fn topmost<'n>(graph: &Graph, set: &BTreeSet<&'n NodeId>) -> Vec<&'n NodeId> {
    set.iter()
        .filter(|id| !ancestors(graph, id).iter().any(|a| set.contains(a)))
        .copied()
        .collect()
}
