use std::collections::{BTreeSet, HashMap};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;
use tokio::sync::watch;

use spark_core::error::{Classify, ErrorCode};
use spark_core::model::{Progress, Project, ProjectError, ProjectId, ProjectStatus, Step};

/// Errors surfaced by storage adapters.
///
/// `Backend` carries the classification code reported by the hosted store,
/// populated at the boundary so retry decisions are uniform downstream.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum StoreError {
    #[error("not found")]
    NotFound,

    #[error("conflict")]
    Conflict,

    #[error("{message}")]
    Backend { code: ErrorCode, message: String },

    #[error("connection error: {0}")]
    Connection(String),

    #[error("serialization error: {0}")]
    Serialization(String),
}

impl Classify for StoreError {
    fn error_code(&self) -> Option<ErrorCode> {
        match self {
            Self::NotFound => Some(ErrorCode::NotFound),
            Self::Backend { code, .. } => Some(*code),
            // transport failures are transient until proven otherwise
            Self::Connection(_) => Some(ErrorCode::Unavailable),
            Self::Conflict | Self::Serialization(_) => None,
        }
    }
}

/// Persisted shape for a project.
///
/// Mirrors the domain `Project` so repositories can serialize/deserialize
/// without leaking storage concerns into the domain layer. The derived
/// progress fields (percent, statuses) are persisted for queryability but
/// recomputed on rehydration.
#[derive(Debug, Clone, PartialEq)]
pub struct ProjectRecord {
    pub id: ProjectId,
    pub title: String,
    pub description: Option<String>,
    pub steps: Vec<Step>,
    pub status: ProjectStatus,
    pub created_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub current_step: usize,
    pub completed_steps: BTreeSet<usize>,
    pub total_steps: usize,
    pub percent_complete: f64,
    pub time_spent_secs: u64,
    pub last_worked_on: DateTime<Utc>,
}

impl ProjectRecord {
    #[must_use]
    pub fn from_project(project: &Project) -> Self {
        let progress = project.progress();
        Self {
            id: project.id(),
            title: project.title().to_owned(),
            description: project.description().map(ToOwned::to_owned),
            steps: project.steps().to_vec(),
            status: project.status(),
            created_at: project.created_at(),
            completed_at: project.completed_at(),
            current_step: progress.current_step(),
            completed_steps: progress.completed_steps().clone(),
            total_steps: progress.total_steps(),
            percent_complete: progress.percent_complete(),
            time_spent_secs: progress.time_spent_secs(),
            last_worked_on: progress.last_worked_on(),
        }
    }

    /// Convert the record back into a domain `Project`.
    ///
    /// # Errors
    ///
    /// Returns `ProjectError` if the persisted fields violate a domain
    /// invariant.
    pub fn into_project(self) -> Result<Project, ProjectError> {
        let progress = Progress::from_persisted(
            self.current_step,
            self.completed_steps,
            self.total_steps,
            self.time_spent_secs,
            self.last_worked_on,
        )?;

        Project::from_persisted(
            self.id,
            self.title,
            self.description,
            self.steps,
            progress,
            self.status,
            self.created_at,
            self.completed_at,
        )
    }

    fn apply_patch(&mut self, patch: &ProgressPatch) {
        if let Some(current_step) = patch.current_step {
            self.current_step = current_step;
        }
        if let Some(completed_steps) = &patch.completed_steps {
            self.completed_steps = completed_steps.clone();
        }
        if let Some(percent_complete) = patch.percent_complete {
            self.percent_complete = percent_complete;
        }
        if let Some(time_spent_secs) = patch.time_spent_secs {
            self.time_spent_secs = time_spent_secs;
        }
        if let Some(last_worked_on) = patch.last_worked_on {
            self.last_worked_on = last_worked_on;
        }
        if let Some(project_status) = patch.project_status {
            self.status = project_status;
        }
        if let Some(completed_at) = patch.completed_at {
            self.completed_at = Some(completed_at);
        }
    }
}

/// Partial-field update for a project's progress.
///
/// Only the fields that are `Some` are written. Keeping updates at field
/// granularity shrinks the conflict surface of concurrent writers: a race
/// is last-writer-wins per field, never a whole-document clobber.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProgressPatch {
    pub current_step: Option<usize>,
    pub completed_steps: Option<BTreeSet<usize>>,
    pub percent_complete: Option<f64>,
    pub time_spent_secs: Option<u64>,
    pub last_worked_on: Option<DateTime<Utc>>,
    pub project_status: Option<ProjectStatus>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl ProgressPatch {
    /// Patch covering every progress field of the given project, plus the
    /// project status and completion timestamp when the project has
    /// completed. This is the write shape of the step-completion path.
    #[must_use]
    pub fn from_project(project: &Project) -> Self {
        let progress = project.progress();
        Self {
            current_step: Some(progress.current_step()),
            completed_steps: Some(progress.completed_steps().clone()),
            percent_complete: Some(progress.percent_complete()),
            time_spent_secs: Some(progress.time_spent_secs()),
            last_worked_on: Some(progress.last_worked_on()),
            project_status: (project.status() == ProjectStatus::Completed)
                .then_some(ProjectStatus::Completed),
            completed_at: project.completed_at(),
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

/// Repository contract for projects.
#[async_trait]
pub trait ProjectRepository: Send + Sync {
    /// Persist a new project.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::Conflict` if the id already exists, or other
    /// storage errors.
    async fn insert_project(&self, project: &Project) -> Result<(), StoreError>;

    /// Fetch a project by id. Returns `Ok(None)` when absent.
    ///
    /// # Errors
    ///
    /// Returns `StoreError` if the record cannot be read or rehydrated.
    async fn get_project(&self, id: ProjectId) -> Result<Option<Project>, StoreError>;

    /// List projects ordered by creation time, up to the given limit.
    ///
    /// # Errors
    ///
    /// Returns `StoreError` if the listing fails.
    async fn list_projects(&self, limit: u32) -> Result<Vec<Project>, StoreError>;

    /// Apply a partial progress update to an existing project.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::NotFound` if the project does not exist.
    async fn update_progress(
        &self,
        id: ProjectId,
        patch: &ProgressPatch,
    ) -> Result<(), StoreError>;

    /// Replace a project's stored status.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::NotFound` if the project does not exist.
    async fn set_status(&self, id: ProjectId, status: ProjectStatus) -> Result<(), StoreError>;

    /// Delete a project.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::NotFound` if the project does not exist.
    async fn delete_project(&self, id: ProjectId) -> Result<(), StoreError>;
}

/// Simple in-memory repository implementation for testing and prototyping.
///
/// Also carries the change-feed half of the document-store contract:
/// `watch_project` delivers the full record on every change and `None` on
/// delete, through a watch channel whose receiver deregisters on drop.
#[derive(Clone, Default)]
pub struct InMemoryRepository {
    projects: Arc<Mutex<HashMap<ProjectId, ProjectRecord>>>,
    watchers: Arc<Mutex<HashMap<ProjectId, watch::Sender<Option<ProjectRecord>>>>>,
}

impl InMemoryRepository {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Subscribe to a project's change feed.
    ///
    /// The receiver observes the current record immediately, then each
    /// subsequent update, and finally `None` if the project is deleted.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::Connection` if internal state is poisoned.
    pub fn watch_project(
        &self,
        id: ProjectId,
    ) -> Result<watch::Receiver<Option<ProjectRecord>>, StoreError> {
        let current = {
            let guard = self.lock_projects()?;
            guard.get(&id).cloned()
        };
        let mut watchers = self
            .watchers
            .lock()
            .map_err(|e| StoreError::Connection(e.to_string()))?;
        let sender = watchers
            .entry(id)
            .or_insert_with(|| watch::channel(current.clone()).0);
        Ok(sender.subscribe())
    }

    fn lock_projects(
        &self,
    ) -> Result<std::sync::MutexGuard<'_, HashMap<ProjectId, ProjectRecord>>, StoreError> {
        self.projects
            .lock()
            .map_err(|e| StoreError::Connection(e.to_string()))
    }

    fn notify(&self, id: ProjectId, record: Option<ProjectRecord>) {
        if let Ok(watchers) = self.watchers.lock() {
            if let Some(sender) = watchers.get(&id) {
                // send_replace stores even with zero receivers, so a
                // re-subscriber through the cached sender sees the current
                // record
                sender.send_replace(record);
            }
        }
    }
}

#[async_trait]
impl ProjectRepository for InMemoryRepository {
    async fn insert_project(&self, project: &Project) -> Result<(), StoreError> {
        let record = ProjectRecord::from_project(project);
        {
            let mut guard = self.lock_projects()?;
            if guard.contains_key(&project.id()) {
                return Err(StoreError::Conflict);
            }
            guard.insert(project.id(), record.clone());
        }
        self.notify(project.id(), Some(record));
        Ok(())
    }

    async fn get_project(&self, id: ProjectId) -> Result<Option<Project>, StoreError> {
        let record = {
            let guard = self.lock_projects()?;
            guard.get(&id).cloned()
        };
        match record {
            Some(record) => record
                .into_project()
                .map(Some)
                .map_err(|e| StoreError::Serialization(e.to_string())),
            None => Ok(None),
        }
    }

    async fn list_projects(&self, limit: u32) -> Result<Vec<Project>, StoreError> {
        let mut records: Vec<ProjectRecord> = {
            let guard = self.lock_projects()?;
            guard.values().cloned().collect()
        };
        // client-side sort fallback, no composite index assumed
        records.sort_by_key(|r| (r.created_at, r.id));
        records.truncate(usize::try_from(limit).unwrap_or(usize::MAX));

        let mut projects = Vec::with_capacity(records.len());
        for record in records {
            projects.push(
                record
                    .into_project()
                    .map_err(|e| StoreError::Serialization(e.to_string()))?,
            );
        }
        Ok(projects)
    }

    async fn update_progress(
        &self,
        id: ProjectId,
        patch: &ProgressPatch,
    ) -> Result<(), StoreError> {
        let updated = {
            let mut guard = self.lock_projects()?;
            let record = guard.get_mut(&id).ok_or(StoreError::NotFound)?;
            record.apply_patch(patch);
            record.clone()
        };
        self.notify(id, Some(updated));
        Ok(())
    }

    async fn set_status(&self, id: ProjectId, status: ProjectStatus) -> Result<(), StoreError> {
        let updated = {
            let mut guard = self.lock_projects()?;
            let record = guard.get_mut(&id).ok_or(StoreError::NotFound)?;
            record.status = status;
            record.clone()
        };
        self.notify(id, Some(updated));
        Ok(())
    }

    async fn delete_project(&self, id: ProjectId) -> Result<(), StoreError> {
        {
            let mut guard = self.lock_projects()?;
            if guard.remove(&id).is_none() {
                return Err(StoreError::NotFound);
            }
        }
        self.notify(id, None);
        Ok(())
    }
}

/// Aggregates the project repository behind a trait object for easy backend
/// swapping.
#[derive(Clone)]
pub struct Storage {
    pub projects: Arc<dyn ProjectRepository>,
}

impl Storage {
    #[must_use]
    pub fn in_memory() -> Self {
        Self {
            projects: Arc::new(InMemoryRepository::new()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use spark_core::model::QuizScore;
    use spark_core::time::fixed_now;

    fn build_project(steps: usize) -> Project {
        let steps = (0..steps)
            .map(|i| Step::new(format!("Step {i}"), "", "").unwrap())
            .collect();
        Project::new(
            ProjectId::random(),
            "Persisted project",
            None,
            steps,
            fixed_now(),
        )
        .unwrap()
    }

    #[tokio::test]
    async fn round_trips_a_project() {
        let repo = InMemoryRepository::new();
        let mut project = build_project(2);
        project
            .complete_step(0, Some(QuizScore::new(95.0).unwrap()), 30, fixed_now())
            .unwrap();
        repo.insert_project(&project).await.unwrap();

        let fetched = repo.get_project(project.id()).await.unwrap().unwrap();
        assert_eq!(fetched.progress().completed_steps().len(), 1);
        assert_eq!(fetched.progress().time_spent_secs(), 30);
        assert_eq!(fetched.status(), ProjectStatus::Active);
    }

    #[tokio::test]
    async fn insert_twice_is_a_conflict() {
        let repo = InMemoryRepository::new();
        let project = build_project(1);
        repo.insert_project(&project).await.unwrap();
        let err = repo.insert_project(&project).await.unwrap_err();
        assert!(matches!(err, StoreError::Conflict));
    }

    #[tokio::test]
    async fn patch_updates_only_given_fields() {
        let repo = InMemoryRepository::new();
        let project = build_project(3);
        repo.insert_project(&project).await.unwrap();

        let patch = ProgressPatch {
            time_spent_secs: Some(500),
            ..ProgressPatch::default()
        };
        repo.update_progress(project.id(), &patch).await.unwrap();

        let fetched = repo.get_project(project.id()).await.unwrap().unwrap();
        assert_eq!(fetched.progress().time_spent_secs(), 500);
        assert!(fetched.progress().completed_steps().is_empty());
    }

    #[tokio::test]
    async fn patch_on_missing_project_is_not_found() {
        let repo = InMemoryRepository::new();
        let err = repo
            .update_progress(ProjectId::random(), &ProgressPatch::default())
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::NotFound));
    }

    #[tokio::test]
    async fn watch_observes_updates_and_delete() {
        let repo = InMemoryRepository::new();
        let project = build_project(1);
        repo.insert_project(&project).await.unwrap();

        let mut rx = repo.watch_project(project.id()).unwrap();
        assert!(rx.borrow().is_some());

        let patch = ProgressPatch {
            percent_complete: Some(100.0),
            ..ProgressPatch::default()
        };
        repo.update_progress(project.id(), &patch).await.unwrap();
        rx.changed().await.unwrap();
        let seen = rx.borrow_and_update().clone().unwrap();
        assert_eq!(seen.percent_complete, 100.0);

        repo.delete_project(project.id()).await.unwrap();
        rx.changed().await.unwrap();
        assert!(rx.borrow().is_none());
    }

    #[tokio::test]
    async fn watch_after_unwatched_updates_sees_the_current_record() {
        let repo = InMemoryRepository::new();
        let project = build_project(1);
        repo.insert_project(&project).await.unwrap();

        // channel exists but nobody is listening
        drop(repo.watch_project(project.id()).unwrap());

        let patch = ProgressPatch {
            percent_complete: Some(100.0),
            ..ProgressPatch::default()
        };
        repo.update_progress(project.id(), &patch).await.unwrap();

        let rx = repo.watch_project(project.id()).unwrap();
        let seen = rx.borrow().clone().unwrap();
        assert_eq!(seen.percent_complete, 100.0);
    }

    #[tokio::test]
    async fn list_orders_by_creation_time() {
        let repo = InMemoryRepository::new();
        for _ in 0..3 {
            repo.insert_project(&build_project(1)).await.unwrap();
        }
        let listed = repo.list_projects(2).await.unwrap();
        assert_eq!(listed.len(), 2);
    }

    #[test]
    fn store_error_classification() {
        assert_eq!(
            StoreError::NotFound.error_code(),
            Some(ErrorCode::NotFound)
        );
        assert_eq!(
            StoreError::Connection("refused".into()).error_code(),
            Some(ErrorCode::Unavailable)
        );
        assert_eq!(StoreError::Serialization("bad".into()).error_code(), None);
        assert_eq!(
            StoreError::Backend {
                code: ErrorCode::ResourceExhausted,
                message: "quota".into()
            }
            .error_code(),
            Some(ErrorCode::ResourceExhausted)
        );
    }
}
