use std::sync::Arc;

use spark_core::Clock;
use spark_core::model::{ProgressOverwrite, ProjectId, QuizScore, StepCompletion};
use storage::repository::{ProgressPatch, ProjectRepository};

use crate::error::TrackerError;
use crate::retry::{self, RetryOptions};

/// Owns the lifecycle of a project's completion state.
///
/// Reads a project snapshot, runs the domain transition, and persists the
/// result as a partial-field update through the retry policy. The
/// read-modify-write is not guarded by optimistic concurrency: two
/// concurrent completions race last-writer-wins at field granularity, with
/// the partial patch as the only mitigation.
#[derive(Clone)]
pub struct ProgressTracker {
    clock: Clock,
    projects: Arc<dyn ProjectRepository>,
    retry: RetryOptions,
}

impl ProgressTracker {
    #[must_use]
    pub fn new(clock: Clock, projects: Arc<dyn ProjectRepository>) -> Self {
        Self {
            clock,
            projects,
            retry: RetryOptions::default(),
        }
    }

    #[must_use]
    pub fn with_retry_options(mut self, retry: RetryOptions) -> Self {
        self.retry = retry;
        self
    }

    /// Mark a step completed, evaluating the quiz gate and the completion
    /// transition, and persist the new state.
    ///
    /// When the project completes, the persisted patch carries the
    /// project-level status and completion timestamp together with the
    /// progress fields, in one logical update.
    ///
    /// # Errors
    ///
    /// Returns `TrackerError::NotFound` for a missing project,
    /// `TrackerError::Validation` for a bad index or failing quiz score
    /// (nothing is written in either case), and `TrackerError::Storage`
    /// once the retry policy gives up on a failing write.
    pub async fn complete_step(
        &self,
        project_id: ProjectId,
        step_index: usize,
        quiz_score: Option<QuizScore>,
        time_spent_delta: u64,
    ) -> Result<StepCompletion, TrackerError> {
        let mut project = self
            .projects
            .get_project(project_id)
            .await?
            .ok_or(TrackerError::NotFound(project_id))?;

        let now = self.clock.now();
        let completion = project.complete_step(step_index, quiz_score, time_spent_delta, now)?;

        let patch = ProgressPatch::from_project(&project);
        retry::retry_classified(self.retry, || {
            self.projects.update_progress(project_id, &patch)
        })
        .await?;

        Ok(completion)
    }

    /// Administrative bulk overwrite of a project's progress.
    ///
    /// Unlike `complete_step`, this path never evaluates the completion
    /// transition: the persisted patch carries no status and no completion
    /// timestamp, whatever the overwritten fields say.
    ///
    /// # Errors
    ///
    /// Returns `TrackerError::NotFound` for a missing project,
    /// `TrackerError::Validation` for out-of-range fields, and
    /// `TrackerError::Storage` for persistence failures.
    pub async fn update_progress(
        &self,
        project_id: ProjectId,
        update: ProgressOverwrite,
    ) -> Result<(), TrackerError> {
        let mut project = self
            .projects
            .get_project(project_id)
            .await?
            .ok_or(TrackerError::NotFound(project_id))?;

        let now = self.clock.now();
        project.overwrite_progress(&update, now)?;

        let progress = project.progress();
        let patch = ProgressPatch {
            current_step: Some(progress.current_step()),
            completed_steps: Some(progress.completed_steps().clone()),
            percent_complete: Some(progress.percent_complete()),
            time_spent_secs: Some(progress.time_spent_secs()),
            last_worked_on: Some(progress.last_worked_on()),
            project_status: None,
            completed_at: None,
        };
        retry::retry_classified(self.retry, || {
            self.projects.update_progress(project_id, &patch)
        })
        .await?;

        Ok(())
    }
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//

#[cfg(test)]
mod tests {
    use super::*;

    use std::collections::BTreeSet;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::time::Duration;

    use async_trait::async_trait;
    use chrono::Duration as ChronoDuration;

    use spark_core::error::ErrorCode;
    use spark_core::model::{
        ProgressError, Project, ProjectStatus, Step,
    };
    use spark_core::time::fixed_now;
    use storage::repository::{InMemoryRepository, StoreError};

    fn build_project(steps: usize) -> Project {
        let steps = (0..steps)
            .map(|i| Step::new(format!("Step {i}"), "", "").unwrap())
            .collect();
        Project::new(
            ProjectId::random(),
            "Tracked project",
            None,
            steps,
            fixed_now(),
        )
        .unwrap()
    }

    async fn seeded_tracker(steps: usize) -> (ProgressTracker, Arc<InMemoryRepository>, ProjectId) {
        let repo = Arc::new(InMemoryRepository::new());
        let project = build_project(steps);
        let id = project.id();
        repo.insert_project(&project).await.unwrap();
        let tracker = ProgressTracker::new(Clock::fixed(fixed_now()), repo.clone());
        (tracker, repo, id)
    }

    #[tokio::test]
    async fn completing_every_step_completes_and_persists() {
        let (tracker, repo, id) = seeded_tracker(3).await;

        for index in 0..3 {
            let score = QuizScore::new(95.0).unwrap();
            tracker
                .complete_step(id, index, Some(score), 60)
                .await
                .unwrap();
        }

        let stored = repo.get_project(id).await.unwrap().unwrap();
        assert_eq!(stored.progress().percent_complete(), 100.0);
        assert_eq!(stored.status(), ProjectStatus::Completed);
        assert_eq!(stored.completed_at(), Some(fixed_now()));
        assert_eq!(stored.progress().time_spent_secs(), 180);
    }

    #[tokio::test]
    async fn completion_timestamp_survives_idempotent_repeats() {
        let (tracker, repo, id) = seeded_tracker(1).await;
        tracker.complete_step(id, 0, None, 0).await.unwrap();

        // same step again, later
        let later = ProgressTracker::new(
            Clock::fixed(fixed_now() + ChronoDuration::hours(1)),
            repo.clone(),
        );
        let completion = later.complete_step(id, 0, None, 30).await.unwrap();
        assert!(completion.is_project_completed);
        assert_eq!(completion.completed_steps, vec![0]);

        let stored = repo.get_project(id).await.unwrap().unwrap();
        assert_eq!(stored.completed_at(), Some(fixed_now()));
        assert_eq!(
            stored.progress().last_worked_on(),
            fixed_now() + ChronoDuration::hours(1)
        );
    }

    #[tokio::test]
    async fn failing_quiz_score_writes_nothing() {
        let (tracker, repo, id) = seeded_tracker(3).await;
        let before = repo.get_project(id).await.unwrap().unwrap();

        let err = tracker
            .complete_step(id, 0, Some(QuizScore::new(50.0).unwrap()), 120)
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            TrackerError::Validation(ProgressError::QuizScoreTooLow { .. })
        ));
        let after = repo.get_project(id).await.unwrap().unwrap();
        assert_eq!(after, before);
    }

    #[tokio::test]
    async fn out_of_range_index_is_a_validation_error() {
        let (tracker, _repo, id) = seeded_tracker(2).await;
        let err = tracker.complete_step(id, 5, None, 0).await.unwrap_err();
        assert!(matches!(
            err,
            TrackerError::Validation(ProgressError::StepOutOfRange { index: 5, total: 2 })
        ));
    }

    #[tokio::test]
    async fn missing_project_is_not_found() {
        let repo = Arc::new(InMemoryRepository::new());
        let tracker = ProgressTracker::new(Clock::fixed(fixed_now()), repo);
        let err = tracker
            .complete_step(ProjectId::random(), 0, None, 0)
            .await
            .unwrap_err();
        assert!(matches!(err, TrackerError::NotFound(_)));
    }

    #[tokio::test]
    async fn overwrite_never_completes_the_project() {
        let (tracker, repo, id) = seeded_tracker(2).await;

        let update = ProgressOverwrite {
            current_step: 2,
            completed_steps: BTreeSet::from([0, 1]),
            percent_complete: 100.0,
            time_spent_secs: 900,
        };
        tracker.update_progress(id, update).await.unwrap();

        let stored = repo.get_project(id).await.unwrap().unwrap();
        assert_eq!(stored.status(), ProjectStatus::Active);
        assert_eq!(stored.completed_at(), None);
        assert_eq!(stored.progress().time_spent_secs(), 900);
        assert_eq!(stored.progress().percent_complete(), 100.0);
    }

    /// Delegates to an inner repository, failing `update_progress` a fixed
    /// number of times first.
    struct FlakyRepository {
        inner: InMemoryRepository,
        failures_left: AtomicU32,
        error_code: ErrorCode,
    }

    impl FlakyRepository {
        fn new(inner: InMemoryRepository, failures: u32, error_code: ErrorCode) -> Self {
            Self {
                inner,
                failures_left: AtomicU32::new(failures),
                error_code,
            }
        }
    }

    #[async_trait]
    impl ProjectRepository for FlakyRepository {
        async fn insert_project(&self, project: &Project) -> Result<(), StoreError> {
            self.inner.insert_project(project).await
        }

        async fn get_project(&self, id: ProjectId) -> Result<Option<Project>, StoreError> {
            self.inner.get_project(id).await
        }

        async fn list_projects(&self, limit: u32) -> Result<Vec<Project>, StoreError> {
            self.inner.list_projects(limit).await
        }

        async fn update_progress(
            &self,
            id: ProjectId,
            patch: &ProgressPatch,
        ) -> Result<(), StoreError> {
            let left = self.failures_left.load(Ordering::SeqCst);
            if left > 0 {
                self.failures_left.store(left - 1, Ordering::SeqCst);
                return Err(StoreError::Backend {
                    code: self.error_code,
                    message: "injected failure".into(),
                });
            }
            self.inner.update_progress(id, patch).await
        }

        async fn set_status(
            &self,
            id: ProjectId,
            status: ProjectStatus,
        ) -> Result<(), StoreError> {
            self.inner.set_status(id, status).await
        }

        async fn delete_project(&self, id: ProjectId) -> Result<(), StoreError> {
            self.inner.delete_project(id).await
        }
    }

    #[tokio::test(start_paused = true)]
    async fn transient_write_failures_are_retried() {
        let inner = InMemoryRepository::new();
        let project = build_project(1);
        let id = project.id();
        inner.insert_project(&project).await.unwrap();

        let flaky = Arc::new(FlakyRepository::new(
            inner.clone(),
            2,
            ErrorCode::Unavailable,
        ));
        let tracker = ProgressTracker::new(Clock::fixed(fixed_now()), flaky).with_retry_options(
            RetryOptions {
                base_delay: Duration::from_millis(10),
                ..RetryOptions::default()
            },
        );

        let completion = tracker.complete_step(id, 0, None, 0).await.unwrap();
        assert!(completion.is_project_completed);

        let stored = inner.get_project(id).await.unwrap().unwrap();
        assert_eq!(stored.status(), ProjectStatus::Completed);
    }

    #[tokio::test(start_paused = true)]
    async fn permanent_write_failures_surface_immediately() {
        let inner = InMemoryRepository::new();
        let project = build_project(1);
        let id = project.id();
        inner.insert_project(&project).await.unwrap();

        let flaky = Arc::new(FlakyRepository::new(
            inner.clone(),
            u32::MAX,
            ErrorCode::PermissionDenied,
        ));
        let tracker = ProgressTracker::new(Clock::fixed(fixed_now()), flaky);

        let err = tracker.complete_step(id, 0, None, 0).await.unwrap_err();
        assert!(matches!(
            err,
            TrackerError::Storage(StoreError::Backend {
                code: ErrorCode::PermissionDenied,
                ..
            })
        ));
        // the failure never reached the inner store
        let stored = inner.get_project(id).await.unwrap().unwrap();
        assert_eq!(stored.status(), ProjectStatus::Active);
    }
}
