//! Applying a cleanup plan: simulation, file edits, external verification,
//! rollback and undo scripts.

mod applier;
mod approval;
mod editor;
mod gate;
mod undo;
mod verifier;

pub use applier::{Applier, ApplyError, Edit, FileSystemApplier};
pub use approval::{ApproveAll, Approver, PromptApprover};
pub use editor::{Drifted, FileEditor, LineBlock};
pub use gate::{GateError, SimulationConflict, VerificationFailure, VerificationGate};
pub use undo::UndoLog;
pub use verifier::{ShellVerifier, Signal, Verifier};
