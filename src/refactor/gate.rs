// Verification gate - nothing touches the tree until it has been simulated,
// and nothing stays applied without an external success signal.
//
// simulate: apply a group to a copy of the graph and rerun reachability with
//           the same roots. Code that only now becomes unreachable and that
//           the plan does not account for is a conflict.
// commit:   apply an auto-applicable group through the Applier, ask the
//           Verifier, and restore the group's files byte for byte on failure.

use super::applier::{Applier, ApplyError, Edit};
use super::editor::LineBlock;
use super::undo::UndoLog;
use super::verifier::{Signal, Verifier};
use crate::analysis::{Reachability, ReachabilityAnalyzer, ReachabilityResult, Roots};
use crate::discovery::SourceFile;
use crate::graph::{Graph, NodeId, Symbol};
use crate::plan::{footprint, ActionKind, CleanupPlan, GroupStatus};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info, warn};

/// Applying the group would leave code unreachable that the plan does not cover
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("group {group} would orphan {} node(s) outside the plan: {}", .orphaned.len(), join_nodes(.orphaned))]
pub struct SimulationConflict {
    pub group: usize,
    pub orphaned: Vec<NodeId>,
}

/// The external verifier rejected an applied group
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("verification failed for group {group}: {detail}")]
pub struct VerificationFailure {
    pub group: usize,
    pub detail: String,
}

/// Why a group was not committed
#[derive(Error, Debug)]
pub enum GateError {
    #[error("group {group} is {status:?} and cannot be committed")]
    NotCommittable { group: usize, status: GroupStatus },

    #[error("group {group}: {source}")]
    Apply {
        group: usize,
        #[source]
        source: ApplyError,
    },

    #[error(transparent)]
    Verification(#[from] VerificationFailure),

    #[error("rollback of group {group} failed at {path}: {source}")]
    Rollback {
        group: usize,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

fn join_nodes(nodes: &[NodeId]) -> String {
    const SHOWN: usize = 5;
    let mut text = nodes
        .iter()
        .take(SHOWN)
        .map(|n| n.to_string())
        .collect::<Vec<_>>()
        .join(", ");
    if nodes.len() > SHOWN {
        text.push_str(&format!(", ... ({} more)", nodes.len() - SHOWN));
    }
    text
}

/// Simulates and commits transaction groups of one plan
pub struct VerificationGate<'a> {
    graph: &'a Graph,
    roots: &'a Roots,
    baseline: &'a ReachabilityResult,
    sources: HashMap<&'a Path, &'a SourceFile>,
}

impl<'a> VerificationGate<'a> {
    pub fn new(graph: &'a Graph, roots: &'a Roots, baseline: &'a ReachabilityResult) -> Self {
        Self {
            graph,
            roots,
            baseline,
            sources: HashMap::new(),
        }
    }

    /// Scanned files, needed to turn symbol removals into line edits
    pub fn with_sources(mut self, files: &'a [SourceFile]) -> Self {
        self.sources = files.iter().map(|f| (f.path.as_path(), f)).collect();
        self
    }

    /// Apply one group to a copy of the graph and look for new orphans
    pub fn simulate(&self, plan: &CleanupPlan, group: usize) -> Result<(), SimulationConflict> {
        let mut graph = self.graph.clone();
        for action in plan.actions_in(group) {
            match action.kind {
                ActionKind::Remove | ActionKind::Archive => {
                    for node in footprint(self.graph, &action.subject) {
                        graph.remove_node(&node);
                    }
                }
                ActionKind::Merge => {
                    if let Some(canonical) = &action.canonical {
                        graph.retarget_inbound(&action.subject, canonical);
                    }
                }
                ActionKind::Parameterize | ActionKind::FlagForReview => {}
            }
        }

        let result = ReachabilityAnalyzer::new().analyze(&graph, self.roots);
        let planned: HashSet<NodeId> = plan
            .planned_subjects()
            .into_iter()
            .flat_map(|subject| footprint(self.graph, subject))
            .collect();

        let mut orphaned: Vec<NodeId> = graph
            .node_ids()
            .filter(|id| {
                result.state(id) == Reachability::UnreachableCertain
                    && self.baseline.state(id) != Reachability::UnreachableCertain
                    && !planned.contains(*id)
            })
            .cloned()
            .collect();
        orphaned.sort();

        if orphaned.is_empty() {
            debug!("Group {} simulates cleanly", group);
            Ok(())
        } else {
            Err(SimulationConflict { group, orphaned })
        }
    }

    /// Simulate every group that is not settled yet; conflicting groups
    /// become needs-revision
    pub fn simulate_all(&self, plan: &mut CleanupPlan) -> Vec<SimulationConflict> {
        let open: Vec<usize> = plan
            .groups
            .iter()
            .filter(|g| matches!(g.status, GroupStatus::Pending | GroupStatus::Manual))
            .map(|g| g.id)
            .collect();

        let mut conflicts = Vec::new();
        for group in open {
            if let Err(conflict) = self.simulate(plan, group) {
                warn!("{}", conflict);
                plan.set_status(group, GroupStatus::NeedsRevision, Some(conflict.to_string()));
                conflicts.push(conflict);
            }
        }
        conflicts
    }

    /// Concrete edits for a group, in path order
    pub fn edits_for(&self, plan: &CleanupPlan, group: usize) -> Result<Vec<Edit>, ApplyError> {
        let mut edits = Vec::new();
        let mut blocks: BTreeMap<PathBuf, Vec<LineBlock>> = BTreeMap::new();

        for action in plan.actions_in(group) {
            match (action.kind, &action.subject) {
                (ActionKind::Remove, NodeId::File { path }) => edits.push(Edit::DeleteFile(path.clone())),
                (ActionKind::Archive, NodeId::File { path }) => edits.push(Edit::ArchiveFile(path.clone())),
                (ActionKind::Remove, subject @ NodeId::Symbol { .. }) => {
                    let unknown = || ApplyError::UnknownSubject(subject.to_string());
                    let symbol = self.graph.symbol(subject).ok_or_else(unknown)?;
                    let source = self
                        .sources
                        .get(symbol.file.as_path())
                        .ok_or_else(unknown)?;
                    blocks
                        .entry(symbol.file.clone())
                        .or_default()
                        .push(symbol_block(symbol, source));
                }
                (kind, _) => return Err(ApplyError::Unsupported(kind)),
            }
        }

        edits.extend(
            blocks
                .into_iter()
                .map(|(path, blocks)| Edit::RemoveLines { path, blocks }),
        );
        Ok(edits)
    }

    /// Apply a pending group, verify it, and roll it back if verification fails.
    /// Committed changes are folded into `undo`.
    pub fn commit(
        &self,
        plan: &mut CleanupPlan,
        group: usize,
        applier: &mut dyn Applier,
        verifier: &mut dyn Verifier,
        root: &Path,
        undo: &mut UndoLog,
    ) -> Result<(), GateError> {
        let status = plan
            .group(group)
            .map(|g| g.status)
            .unwrap_or(GroupStatus::NeedsRevision);
        if status != GroupStatus::Pending {
            return Err(GateError::NotCommittable { group, status });
        }

        let edits = self
            .edits_for(plan, group)
            .map_err(|source| GateError::Apply { group, source })?;

        let mut group_undo = UndoLog::new();
        for edit in &edits {
            if let Err(source) = applier.apply(edit, &mut group_undo) {
                warn!("Group {}: {}; rolling back", group, source);
                self.rollback(plan, group, &group_undo, source.to_string())?;
                return Err(GateError::Apply { group, source });
            }
        }

        match verifier.verify(root) {
            Signal::Success => {
                info!("Group {} committed ({} edit(s))", group, edits.len());
                plan.set_status(group, GroupStatus::Committed, None);
                undo.absorb(group_undo);
                Ok(())
            }
            Signal::Failure(detail) => {
                let failure = VerificationFailure { group, detail };
                warn!("{}; rolling back", failure);
                self.rollback(plan, group, &group_undo, failure.to_string())?;
                Err(GateError::Verification(failure))
            }
        }
    }

    fn rollback(
        &self,
        plan: &mut CleanupPlan,
        group: usize,
        group_undo: &UndoLog,
        note: String,
    ) -> Result<(), GateError> {
        match group_undo.restore() {
            Ok(()) => {
                plan.set_status(group, GroupStatus::RolledBack, Some(note));
                Ok(())
            }
            Err((path, source)) => {
                plan.set_status(
                    group,
                    GroupStatus::NeedsRevision,
                    Some(format!("{}; rollback incomplete at {}", note, path.display())),
                );
                Err(GateError::Rollback {
                    group,
                    path,
                    source,
                })
            }
        }
    }
}

/// The scanned lines of a symbol, with its attribute lines above it
fn symbol_block(symbol: &Symbol, source: &SourceFile) -> LineBlock {
    let end = symbol.span.end_line.min(source.lines.len());
    let mut start = symbol.span.start_line.max(1);
    let mut budget = symbol.annotations.len();
    while budget > 0 && start > 1 {
        let above = source.lines[start - 2].trim_start();
        if !(above.starts_with('@') || above.starts_with("#[")) {
            break;
        }
        start -= 1;
        budget -= 1;
    }
    let lines = if start <= end {
        source.lines[start - 1..end].to_vec()
    } else {
        Vec::new()
    };
    LineBlock::new(start, lines)
}
