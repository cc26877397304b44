//! The Rollcall reconciliation engine.
//!
//! Decides, at sign-in time, whether an external identity (provider account
//! or verified email) already belongs to an existing voter, and if so drives
//! the full account-merge workflow: dependent records are transplanted from
//! the losing voter to the winning one in a fixed step order, the loser is
//! retired to an empty husk, and caching repair re-establishes the single
//! authoritative owner of the identity.
//!
//! The engine is generic over any [`rollcall_core::store::ReconciliationStore`]
//! backend. It favours forward progress over atomicity: sub-step write
//! failures are logged and recorded in the merge report rather than aborting
//! the workflow, and every mover de-duplicates by natural key so a partially
//! failed merge can simply be re-run.

pub mod error;
pub mod merge;
pub mod movers;
pub mod repair;
pub mod report;
pub mod signin;

mod locks;

pub use error::{EngineError, Result};
pub use merge::MergeContext;
pub use repair::{PositionRepairOutcome, RepairOutcome};
pub use report::{MergeReport, MergeStep, StepOutcome, StepReport};
pub use signin::{
  MergePrecedence, Reconciler, SignInEvent, SignInOutcome, SignInResolution,
};

#[cfg(test)]
mod tests;
