use crate::graph::NodeId;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::HashSet;

/// What an action does to its subject
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ActionKind {
    /// Retarget the subject's inbound references to the canonical member
    Merge,
    /// Members differ in their parameter lists: unify by hand, never auto-merge
    Parameterize,
    /// Delete the subject (a whole file or a symbol's lines)
    Remove,
    /// Move a dead file into the archive directory
    Archive,
    /// Unreachable only by weak evidence; a human decides
    FlagForReview,
}

impl ActionKind {
    /// The built-in applier can perform this action
    pub fn is_auto_applicable(&self) -> bool {
        matches!(self, ActionKind::Remove | ActionKind::Archive)
    }

    /// Deletes its subject from the tree
    pub fn removes_subject(&self) -> bool {
        matches!(self, ActionKind::Remove | ActionKind::Archive)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ActionKind::Merge => "merge",
            ActionKind::Parameterize => "parameterize",
            ActionKind::Remove => "remove",
            ActionKind::Archive => "archive",
            ActionKind::FlagForReview => "flag-for-review",
        }
    }
}

/// Strength of the evidence behind an action
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ActionConfidence {
    Certain,
    Heuristic,
}

/// One proposed change
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Action {
    /// Position in plan order
    pub id: usize,

    pub kind: ActionKind,

    pub confidence: ActionConfidence,

    /// The candidate or cluster member acted on
    pub subject: NodeId,

    /// Merge target, for merge and parameterize
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub canonical: Option<NodeId>,

    /// Index into the duplicate cluster list, for merge and parameterize
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cluster: Option<usize>,

    /// Transaction group this action belongs to
    pub group: usize,
}

impl Action {
    pub fn new(kind: ActionKind, confidence: ActionConfidence, subject: NodeId) -> Self {
        Self {
            id: 0,
            kind,
            confidence,
            subject,
            canonical: None,
            cluster: None,
            group: 0,
        }
    }

    pub fn with_canonical(mut self, canonical: NodeId, cluster: usize) -> Self {
        self.canonical = Some(canonical);
        self.cluster = Some(cluster);
        self
    }

    /// Short human-readable description
    pub fn describe(&self) -> String {
        match &self.canonical {
            Some(canonical) => format!("{} {} into {}", self.kind.as_str(), self.subject, canonical),
            None => format!("{} {}", self.kind.as_str(), self.subject),
        }
    }
}

/// Lifecycle of a transaction group
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum GroupStatus {
    /// Auto-applicable, not yet applied
    Pending,
    /// Contains actions only a human can apply
    Manual,
    /// Simulation showed the group would orphan code outside the plan
    NeedsRevision,
    /// Applied and verified
    Committed,
    /// Applied, failed verification, restored
    RolledBack,
    /// Refused at the interactive prompt
    Declined,
}

/// Actions that apply or roll back together
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionGroup {
    pub id: usize,

    /// Action ids in plan order
    pub actions: Vec<usize>,

    pub status: GroupStatus,

    /// Conflict or verification detail
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}

/// Ordered actions and their transaction groups
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CleanupPlan {
    pub actions: Vec<Action>,
    pub groups: Vec<TransactionGroup>,
    pub fingerprint: String,
}

impl CleanupPlan {
    pub fn new(actions: Vec<Action>, groups: Vec<TransactionGroup>) -> Self {
        let fingerprint = fingerprint(&actions);
        Self {
            actions,
            groups,
            fingerprint,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }

    pub fn group(&self, id: usize) -> Option<&TransactionGroup> {
        self.groups.get(id)
    }

    pub fn actions_in(&self, group: usize) -> Vec<&Action> {
        self.group(group)
            .map(|g| g.actions.iter().filter_map(|&id| self.actions.get(id)).collect())
            .unwrap_or_default()
    }

    pub fn set_status(&mut self, group: usize, status: GroupStatus, note: Option<String>) {
        if let Some(g) = self.groups.get_mut(group) {
            g.status = status;
            g.note = note;
        }
    }

    /// Nodes some remove, archive or merge action already accounts for
    pub fn planned_subjects(&self) -> HashSet<&NodeId> {
        self.actions
            .iter()
            .filter(|a| a.kind.removes_subject() || a.kind == ActionKind::Merge)
            .map(|a| &a.subject)
            .collect()
    }

    pub fn count(&self, kind: ActionKind) -> usize {
        self.actions.iter().filter(|a| a.kind == kind).count()
    }

    pub fn groups_with(&self, status: GroupStatus) -> Vec<&TransactionGroup> {
        self.groups.iter().filter(|g| g.status == status).collect()
    }

    /// A remove action for this node exists
    pub fn removes(&self, id: &NodeId) -> bool {
        self.actions
            .iter()
            .any(|a| a.kind.removes_subject() && &a.subject == id)
    }
}

/// SHA-256 over the ordered actions; group status does not take part
pub fn fingerprint(actions: &[Action]) -> String {
    let mut hasher = Sha256::new();
    for action in actions {
        let canonical = action
            .canonical
            .as_ref()
            .map(|c| c.to_string())
            .unwrap_or_default();
        let line = format!(
            "{}|{}|{:?}|{}|{}|{}\n",
            action.id,
            action.kind.as_str(),
            action.confidence,
            action.subject,
            canonical,
            action.group
        );
        hasher.update(line.as_bytes());
    }
    format!("{:x}", hasher.finalize())
}
