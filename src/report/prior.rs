//! Comparison with the report of an earlier run.
//!
//! Two dry runs over an unchanged tree yield the same plan fingerprint, so a
//! matching fingerprint means nothing changed since the prior report.

use super::{Report, ReportError};
use crate::graph::NodeId;
use crate::plan::{ActionKind, CleanupPlan};
use std::collections::BTreeSet;
use std::path::Path;

/// A previously written report
#[derive(Debug, Clone)]
pub struct PriorReport {
    report: Report,
}

/// How the current plan differs from the prior one
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PlanDelta {
    /// Actions only the current plan has
    pub added: Vec<(ActionKind, NodeId)>,
    /// Actions only the prior plan had
    pub resolved: Vec<(ActionKind, NodeId)>,
}

impl PlanDelta {
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.resolved.is_empty()
    }
}

impl std::fmt::Display for PlanDelta {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} new action(s), {} resolved since the prior report",
            self.added.len(),
            self.resolved.len()
        )
    }
}

impl PriorReport {
    pub fn load(path: &Path) -> Result<Self, ReportError> {
        Ok(Self {
            report: Report::load(path)?,
        })
    }

    pub fn from_report(report: Report) -> Self {
        Self { report }
    }

    pub fn report(&self) -> &Report {
        &self.report
    }

    /// The plan matches the prior one exactly. An incomplete prior never matches.
    pub fn unchanged(&self, plan: &CleanupPlan) -> bool {
        self.report.run.complete && self.report.fingerprint == plan.fingerprint
    }

    pub fn delta(&self, plan: &CleanupPlan) -> PlanDelta {
        let before: BTreeSet<(ActionKind, NodeId)> = self
            .report
            .actions
            .iter()
            .map(|a| (a.kind, a.subject.clone()))
            .collect();
        let after: BTreeSet<(ActionKind, NodeId)> = plan
            .actions
            .iter()
            .map(|a| (a.kind, a.subject.clone()))
            .collect();
        PlanDelta {
            added: after.difference(&before).cloned().collect(),
            resolved: before.difference(&after).cloned().collect(),
        }
    }
}
