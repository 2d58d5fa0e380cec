use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::model::ids::ProjectId;
use crate::model::progress::{
    Progress, ProgressError, ProgressOverwrite, ProgressStatus, StepCompletion,
};
use crate::model::quiz::QuizScore;
use crate::model::step::Step;

//
// ─── ERRORS ────────────────────────────────────────────────────────────────────
//

#[derive(Debug, Error, Clone, PartialEq)]
#[non_exhaustive]
pub enum ProjectError {
    #[error("project title cannot be empty")]
    EmptyTitle,

    #[error("project is marked completed but its progress is not")]
    InconsistentCompletion,

    #[error(transparent)]
    Progress(#[from] ProgressError),
}

//
// ─── STATUS ────────────────────────────────────────────────────────────────────
//

/// Lifecycle status of a project.
///
/// Becomes `Completed` only through the step-completion transition, when
/// the owned progress record reaches its completed state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProjectStatus {
    Active,
    Completed,
    Paused,
    Archived,
    Draft,
}

impl ProjectStatus {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Completed => "completed",
            Self::Paused => "paused",
            Self::Archived => "archived",
            Self::Draft => "draft",
        }
    }
}

impl fmt::Display for ProjectStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error type for parsing a status from persisted storage.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("unknown project status: {0}")]
pub struct ParseProjectStatusError(String);

impl FromStr for ProjectStatus {
    type Err = ParseProjectStatusError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "active" => Ok(Self::Active),
            "completed" => Ok(Self::Completed),
            "paused" => Ok(Self::Paused),
            "archived" => Ok(Self::Archived),
            "draft" => Ok(Self::Draft),
            other => Err(ParseProjectStatusError(other.to_owned())),
        }
    }
}

//
// ─── PROJECT ───────────────────────────────────────────────────────────────────
//

/// A user's learning unit: an ordered list of steps plus the completion
/// state that tracks them.
#[derive(Debug, Clone, PartialEq)]
pub struct Project {
    id: ProjectId,
    title: String,
    description: Option<String>,
    steps: Vec<Step>,
    progress: Progress,
    status: ProjectStatus,
    created_at: DateTime<Utc>,
    completed_at: Option<DateTime<Utc>>,
}

impl Project {
    /// Creates a new project with zeroed progress.
    ///
    /// # Errors
    ///
    /// Returns `ProjectError::EmptyTitle` if the title is empty or
    /// whitespace-only.
    pub fn new(
        id: ProjectId,
        title: impl Into<String>,
        description: Option<String>,
        steps: Vec<Step>,
        created_at: DateTime<Utc>,
    ) -> Result<Self, ProjectError> {
        let title = title.into();
        if title.trim().is_empty() {
            return Err(ProjectError::EmptyTitle);
        }

        let description = description
            .map(|d| d.trim().to_owned())
            .filter(|d| !d.is_empty());

        let progress = Progress::zero(steps.len(), created_at);
        Ok(Self {
            id,
            title: title.trim().to_owned(),
            description,
            steps,
            progress,
            status: ProjectStatus::Active,
            created_at,
            completed_at: None,
        })
    }

    /// Rehydrate a project from persisted storage.
    ///
    /// # Errors
    ///
    /// Returns `ProjectError::EmptyTitle` for an invalid title and
    /// `ProjectError::InconsistentCompletion` when the stored status says
    /// completed but the progress record disagrees.
    #[allow(clippy::too_many_arguments)]
    pub fn from_persisted(
        id: ProjectId,
        title: String,
        description: Option<String>,
        steps: Vec<Step>,
        progress: Progress,
        status: ProjectStatus,
        created_at: DateTime<Utc>,
        completed_at: Option<DateTime<Utc>>,
    ) -> Result<Self, ProjectError> {
        if title.trim().is_empty() {
            return Err(ProjectError::EmptyTitle);
        }
        if status == ProjectStatus::Completed && !progress.is_complete() {
            return Err(ProjectError::InconsistentCompletion);
        }

        Ok(Self {
            id,
            title,
            description,
            steps,
            progress,
            status,
            created_at,
            completed_at,
        })
    }

    // Accessors
    #[must_use]
    pub fn id(&self) -> ProjectId {
        self.id
    }

    #[must_use]
    pub fn title(&self) -> &str {
        &self.title
    }

    #[must_use]
    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    #[must_use]
    pub fn steps(&self) -> &[Step] {
        &self.steps
    }

    #[must_use]
    pub fn progress(&self) -> &Progress {
        &self.progress
    }

    #[must_use]
    pub fn status(&self) -> ProjectStatus {
        self.status
    }

    #[must_use]
    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    #[must_use]
    pub fn completed_at(&self) -> Option<DateTime<Utc>> {
        self.completed_at
    }

    /// Explicit status change (pause, archive, reactivate).
    ///
    /// This is the administrative path; the completion transition is owned
    /// by `complete_step` alone.
    pub fn set_status(&mut self, status: ProjectStatus) {
        self.status = status;
    }

    /// Mark a step completed and evaluate the completion transition.
    ///
    /// Validates the index and the quiz gate before any mutation, then
    /// records the step, resyncing the progress record's step total to the
    /// current step list. When the last open step closes, the project
    /// status flips to `Completed` and the completion timestamp is written
    /// exactly once; later idempotent calls leave it untouched.
    ///
    /// # Errors
    ///
    /// Returns `ProgressError::StepOutOfRange` for a bad index and
    /// `ProgressError::QuizScoreTooLow` when the attempt's score is under
    /// the gate. Neither mutates the project.
    pub fn complete_step(
        &mut self,
        step_index: usize,
        quiz_score: Option<QuizScore>,
        time_spent_delta: u64,
        now: DateTime<Utc>,
    ) -> Result<StepCompletion, ProgressError> {
        if step_index >= self.steps.len() {
            return Err(ProgressError::StepOutOfRange {
                index: step_index,
                total: self.steps.len(),
            });
        }
        if let Some(score) = quiz_score {
            if !score.is_passing() {
                return Err(ProgressError::QuizScoreTooLow {
                    percentage: score.percentage(),
                });
            }
        }

        let completion =
            self.progress
                .record_step(step_index, self.steps.len(), time_spent_delta, now);

        if completion.is_project_completed {
            self.status = ProjectStatus::Completed;
            if self.completed_at.is_none() {
                self.completed_at = Some(now);
            }
        }

        Ok(completion)
    }

    /// Apply an administrative progress overwrite.
    ///
    /// Deliberately does not evaluate the completion transition: a manual
    /// correction that happens to fill the step set leaves the project
    /// status alone.
    ///
    /// # Errors
    ///
    /// Returns `ProgressError` if the overwrite fields are out of range.
    pub fn overwrite_progress(
        &mut self,
        update: &ProgressOverwrite,
        now: DateTime<Utc>,
    ) -> Result<(), ProgressError> {
        self.progress.overwrite(update, now)
    }

    /// True once the owned progress record has completed.
    #[must_use]
    pub fn is_completed(&self) -> bool {
        self.progress.status() == ProgressStatus::Completed
    }
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//
