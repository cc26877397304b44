//! Structured merge reports.
//!
//! The merge workflow records one entry per executed step. The report is
//! queryable (tests reconcile moved/skipped counts against pre-merge state)
//! and joinable to a single line for logging.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ─── Steps ───────────────────────────────────────────────────────────────────

/// The named steps of the merge workflow, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MergeStep {
  RepairPositionsOpening,
  MoveFollows,
  ResolveOrganizations,
  MovePositions,
  MoveFriendships,
  MoveFriendInvites,
  MoveEmailEntries,
  ClearFromOrganizationPointer,
  MoveProviderCache,
  MoveDonations,
  MoveVoterGuides,
  MoveAnalytics,
  UnionScalarFields,
  RepairPositionsClosing,
}

impl MergeStep {
  pub fn as_str(self) -> &'static str {
    match self {
      Self::RepairPositionsOpening => "repair_positions_opening",
      Self::MoveFollows => "move_follows",
      Self::ResolveOrganizations => "resolve_organizations",
      Self::MovePositions => "move_positions",
      Self::MoveFriendships => "move_friendships",
      Self::MoveFriendInvites => "move_friend_invites",
      Self::MoveEmailEntries => "move_email_entries",
      Self::ClearFromOrganizationPointer => "clear_from_organization_pointer",
      Self::MoveProviderCache => "move_provider_cache",
      Self::MoveDonations => "move_donations",
      Self::MoveVoterGuides => "move_voter_guides",
      Self::MoveAnalytics => "move_analytics",
      Self::UnionScalarFields => "union_scalar_fields",
      Self::RepairPositionsClosing => "repair_positions_closing",
    }
  }
}

impl std::fmt::Display for MergeStep {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.write_str(self.as_str())
  }
}

// ─── Outcomes ────────────────────────────────────────────────────────────────

/// What happened at one step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum StepOutcome {
  /// The step ran. `skipped` counts records dropped as duplicates of
  /// existing destination records (by natural key) — an expected condition,
  /// not a failure.
  Completed { moved: u64, skipped: u64 },
  /// Nothing to do.
  Noop,
  /// One or more writes failed; the workflow continued. The unmigrated data
  /// is picked up by a later re-run.
  Failed,
  /// The step refused to proceed automatically; no further steps ran.
  ManualInterventionRequired,
}

/// One `{step, outcome, detail}` entry in the merge report.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepReport {
  pub step:    MergeStep,
  pub outcome: StepOutcome,
  pub detail:  String,
}

impl StepReport {
  fn render(&self) -> String {
    let outcome = match self.outcome {
      StepOutcome::Completed { moved, skipped } => {
        format!("moved {moved}, skipped {skipped}")
      }
      StepOutcome::Noop => "noop".to_owned(),
      StepOutcome::Failed => "FAILED".to_owned(),
      StepOutcome::ManualInterventionRequired => {
        "MANUAL_INTERVENTION_REQUIRED".to_owned()
      }
    };
    if self.detail.is_empty() {
      format!("{}: {outcome}", self.step)
    } else {
      format!("{}: {outcome} ({})", self.step, self.detail)
    }
  }
}

// ─── Report ──────────────────────────────────────────────────────────────────

/// The full outcome of one merge workflow run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MergeReport {
  pub from_voter: Uuid,
  pub to_voter:   Uuid,
  pub steps:      Vec<StepReport>,
  /// `false` when the workflow halted early on manual intervention.
  pub completed:  bool,
}

impl MergeReport {
  pub fn new(from_voter: Uuid, to_voter: Uuid) -> Self {
    Self {
      from_voter,
      to_voter,
      steps: Vec::new(),
      completed: true,
    }
  }

  pub fn push(&mut self, step: MergeStep, outcome: StepOutcome, detail: impl Into<String>) {
    self.steps.push(StepReport {
      step,
      outcome,
      detail: detail.into(),
    });
  }

  pub fn step(&self, step: MergeStep) -> Option<&StepReport> {
    self.steps.iter().find(|s| s.step == step)
  }

  pub fn manual_intervention_required(&self) -> bool {
    self
      .steps
      .iter()
      .any(|s| s.outcome == StepOutcome::ManualInterventionRequired)
  }

  pub fn total_moved(&self) -> u64 {
    self
      .steps
      .iter()
      .map(|s| match s.outcome {
        StepOutcome::Completed { moved, .. } => moved,
        _ => 0,
      })
      .sum()
  }

  pub fn total_skipped(&self) -> u64 {
    self
      .steps
      .iter()
      .map(|s| match s.outcome {
        StepOutcome::Completed { skipped, .. } => skipped,
        _ => 0,
      })
      .sum()
  }

  /// Join the report to a single loggable line.
  pub fn render(&self) -> String {
    let steps: Vec<String> = self.steps.iter().map(StepReport::render).collect();
    format!(
      "merge {} -> {} [{}]{}",
      self.from_voter,
      self.to_voter,
      steps.join("; "),
      if self.completed { "" } else { " INCOMPLETE" },
    )
  }
}
