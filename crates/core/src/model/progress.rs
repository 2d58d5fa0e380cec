use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use thiserror::Error;

//
// ─── ERRORS ────────────────────────────────────────────────────────────────────
//

#[derive(Debug, Error, Clone, PartialEq)]
#[non_exhaustive]
pub enum ProgressError {
    #[error("step index {index} is out of range for {total} steps")]
    StepOutOfRange { index: usize, total: usize },

    #[error("Quiz score must be 90% or higher to complete this step (got {percentage:.1}%)")]
    QuizScoreTooLow { percentage: f64 },

    #[error("completed step index {index} is out of range for {total} steps")]
    CompletedStepOutOfRange { index: usize, total: usize },

    #[error("percent complete must be between 0 and 100, got {0}")]
    PercentOutOfRange(f64),
}

//
// ─── STATUS ────────────────────────────────────────────────────────────────────
//

/// Completion status of a project's progress record.
///
/// Derived: `Completed` iff every step is in the completed set and the
/// project has at least one step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProgressStatus {
    InProgress,
    Completed,
}

impl ProgressStatus {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::InProgress => "in_progress",
            Self::Completed => "completed",
        }
    }
}

impl fmt::Display for ProgressStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error type for parsing a status from persisted storage.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("unknown progress status: {0}")]
pub struct ParseProgressStatusError(String);

impl FromStr for ProgressStatus {
    type Err = ParseProgressStatusError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "in_progress" => Ok(Self::InProgress),
            "completed" => Ok(Self::Completed),
            other => Err(ParseProgressStatusError(other.to_owned())),
        }
    }
}

//
// ─── PROGRESS ──────────────────────────────────────────────────────────────────
//

/// Result of a single step-completion transition, as consumed by the UI.
#[derive(Debug, Clone, PartialEq)]
pub struct StepCompletion {
    pub completed_steps: Vec<usize>,
    pub percent_complete: f64,
    pub is_project_completed: bool,
}

/// Administrative bulk overwrite of a progress record.
///
/// Used for manual correction. Unlike the step-completion transition, an
/// overwrite never evaluates the completion transition and never touches
/// the derived status.
#[derive(Debug, Clone, PartialEq)]
pub struct ProgressOverwrite {
    pub current_step: usize,
    pub completed_steps: BTreeSet<usize>,
    pub percent_complete: f64,
    pub time_spent_secs: u64,
}

/// Mutable completion state owned by exactly one project.
///
/// All mutation goes through the owning `Project`, which validates inputs
/// before delegating here. Invariants:
/// - `completed_steps` holds distinct indices in `[0, total_steps)`;
/// - `percent_complete == 100 * |completed_steps| / total_steps` exactly
///   (0 when `total_steps` is 0);
/// - `current_step`, `time_spent_secs`, and `last_worked_on` never regress.
#[derive(Debug, Clone, PartialEq)]
pub struct Progress {
    current_step: usize,
    completed_steps: BTreeSet<usize>,
    total_steps: usize,
    percent_complete: f64,
    time_spent_secs: u64,
    last_worked_on: DateTime<Utc>,
    status: ProgressStatus,
}

impl Progress {
    /// Zero state for a freshly created project.
    #[must_use]
    pub fn zero(total_steps: usize, now: DateTime<Utc>) -> Self {
        Self {
            current_step: 0,
            completed_steps: BTreeSet::new(),
            total_steps,
            percent_complete: 0.0,
            time_spent_secs: 0,
            last_worked_on: now,
            status: ProgressStatus::InProgress,
        }
    }

    /// Rehydrate a progress record from persisted storage.
    ///
    /// Derived fields (percent, status, the current-step floor) are
    /// recomputed from the authoritative fields rather than trusted, so a
    /// rehydrated record is always fully populated and internally
    /// consistent.
    ///
    /// # Errors
    ///
    /// Returns `ProgressError::CompletedStepOutOfRange` if any completed
    /// index falls outside `[0, total_steps)`.
    pub fn from_persisted(
        current_step: usize,
        completed_steps: BTreeSet<usize>,
        total_steps: usize,
        time_spent_secs: u64,
        last_worked_on: DateTime<Utc>,
    ) -> Result<Self, ProgressError> {
        if let Some(&max) = completed_steps.iter().next_back() {
            if max >= total_steps {
                return Err(ProgressError::CompletedStepOutOfRange {
                    index: max,
                    total: total_steps,
                });
            }
        }

        let floor = completed_steps
            .iter()
            .next_back()
            .map_or(0, |&max| max + 1);

        let mut progress = Self {
            current_step: current_step.max(floor),
            completed_steps,
            total_steps,
            percent_complete: 0.0,
            time_spent_secs,
            last_worked_on,
            status: ProgressStatus::InProgress,
        };
        progress.recompute_derived();
        Ok(progress)
    }

    // Accessors
    #[must_use]
    pub fn current_step(&self) -> usize {
        self.current_step
    }

    #[must_use]
    pub fn completed_steps(&self) -> &BTreeSet<usize> {
        &self.completed_steps
    }

    #[must_use]
    pub fn total_steps(&self) -> usize {
        self.total_steps
    }

    #[must_use]
    pub fn percent_complete(&self) -> f64 {
        self.percent_complete
    }

    #[must_use]
    pub fn time_spent_secs(&self) -> u64 {
        self.time_spent_secs
    }

    #[must_use]
    pub fn last_worked_on(&self) -> DateTime<Utc> {
        self.last_worked_on
    }

    #[must_use]
    pub fn status(&self) -> ProgressStatus {
        self.status
    }

    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.status == ProgressStatus::Completed
    }

    /// Record a completed step. The caller has already validated the index
    /// and the quiz gate.
    ///
    /// Re-completing an already-completed step is a no-op for the set, but
    /// time spent and `last_worked_on` still advance.
    pub(crate) fn record_step(
        &mut self,
        step_index: usize,
        total_steps: usize,
        time_spent_delta: u64,
        now: DateTime<Utc>,
    ) -> StepCompletion {
        self.completed_steps.insert(step_index);
        self.total_steps = total_steps;
        self.current_step = self.current_step.max(step_index + 1);
        self.time_spent_secs = self.time_spent_secs.saturating_add(time_spent_delta);
        self.last_worked_on = self.last_worked_on.max(now);
        self.recompute_derived();

        StepCompletion {
            completed_steps: self.completed_steps.iter().copied().collect(),
            percent_complete: self.percent_complete,
            is_project_completed: self.status == ProgressStatus::Completed,
        }
    }

    /// Apply an administrative overwrite.
    ///
    /// Overwrites the stored fields as given (the percent is taken at face
    /// value, not recomputed) and bumps `last_worked_on`. The derived
    /// status is left untouched: only the step-completion path evaluates
    /// the completion transition.
    pub(crate) fn overwrite(
        &mut self,
        update: &ProgressOverwrite,
        now: DateTime<Utc>,
    ) -> Result<(), ProgressError> {
        if let Some(&max) = update.completed_steps.iter().next_back() {
            if max >= self.total_steps {
                return Err(ProgressError::CompletedStepOutOfRange {
                    index: max,
                    total: self.total_steps,
                });
            }
        }
        if !update.percent_complete.is_finite()
            || !(0.0..=100.0).contains(&update.percent_complete)
        {
            return Err(ProgressError::PercentOutOfRange(update.percent_complete));
        }

        self.current_step = update.current_step;
        self.completed_steps = update.completed_steps.clone();
        self.percent_complete = update.percent_complete;
        self.time_spent_secs = update.time_spent_secs;
        self.last_worked_on = self.last_worked_on.max(now);
        Ok(())
    }

    fn recompute_derived(&mut self) {
        self.percent_complete = if self.total_steps > 0 {
            (self.completed_steps.len() as f64 / self.total_steps as f64) * 100.0
        } else {
            0.0
        };
        self.status = if self.total_steps > 0 && self.completed_steps.len() == self.total_steps
        {
            ProgressStatus::Completed
        } else {
            ProgressStatus::InProgress
        };
    }
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//
