//! Cleanup plans: ordered actions over candidates and clusters, joined into
//! transaction groups that apply or roll back together.

mod action;
mod generator;

pub use action::{
    fingerprint, Action, ActionConfidence, ActionKind, CleanupPlan, GroupStatus, TransactionGroup,
};
pub(crate) use generator::footprint;
pub use generator::{choose_canonical, PlanGenerator};
