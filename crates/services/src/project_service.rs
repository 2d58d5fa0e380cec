use std::sync::Arc;

use tracing::info;

use spark_core::Clock;
use spark_core::model::{Project, ProjectId, ProjectStatus, Step};
use storage::repository::ProjectRepository;

use crate::ai::GeneratedProject;
use crate::error::ProjectServiceError;

pub const DEFAULT_LIST_LIMIT: u32 = 50;

/// CRUD surface for projects. Progress transitions live in
/// [`ProgressTracker`](crate::ProgressTracker).
#[derive(Clone)]
pub struct ProjectService {
    clock: Clock,
    projects: Arc<dyn ProjectRepository>,
}

impl ProjectService {
    #[must_use]
    pub fn new(clock: Clock, projects: Arc<dyn ProjectRepository>) -> Self {
        Self { clock, projects }
    }

    /// Create and persist a project with a freshly minted id.
    ///
    /// # Errors
    ///
    /// Returns `ProjectServiceError::Project` for an invalid title and
    /// `ProjectServiceError::Storage` if the insert fails.
    pub async fn create_project(
        &self,
        title: impl Into<String>,
        description: Option<String>,
        steps: Vec<Step>,
    ) -> Result<Project, ProjectServiceError> {
        let project = Project::new(
            ProjectId::random(),
            title,
            description,
            steps,
            self.clock.now(),
        )?;
        self.projects.insert_project(&project).await?;
        info!(project_id = %project.id(), steps = project.steps().len(), "created project");
        Ok(project)
    }

    /// Persist a generated plan as a new project.
    ///
    /// # Errors
    ///
    /// Same failure modes as [`create_project`](Self::create_project).
    pub async fn create_from_generated(
        &self,
        generated: GeneratedProject,
    ) -> Result<Project, ProjectServiceError> {
        let description = (!generated.description.is_empty()).then_some(generated.description);
        self.create_project(generated.title, description, generated.steps)
            .await
    }

    /// Fetch a project by id.
    ///
    /// # Errors
    ///
    /// Returns `ProjectServiceError::NotFound` when the project is absent.
    pub async fn get_project(&self, id: ProjectId) -> Result<Project, ProjectServiceError> {
        self.projects
            .get_project(id)
            .await?
            .ok_or(ProjectServiceError::NotFound(id))
    }

    /// List projects ordered by creation time.
    ///
    /// # Errors
    ///
    /// Returns `ProjectServiceError::Storage` if the listing fails.
    pub async fn list_projects(
        &self,
        limit: Option<u32>,
    ) -> Result<Vec<Project>, ProjectServiceError> {
        Ok(self
            .projects
            .list_projects(limit.unwrap_or(DEFAULT_LIST_LIMIT))
            .await?)
    }

    /// Replace a project's administrative status.
    ///
    /// This writes the status field only and never touches progress or the
    /// completion timestamp.
    ///
    /// # Errors
    ///
    /// Returns `ProjectServiceError::NotFound` when the project is absent.
    pub async fn set_status(
        &self,
        id: ProjectId,
        status: ProjectStatus,
    ) -> Result<(), ProjectServiceError> {
        self.projects.set_status(id, status).await.map_err(|e| {
            if matches!(e, storage::repository::StoreError::NotFound) {
                ProjectServiceError::NotFound(id)
            } else {
                ProjectServiceError::Storage(e)
            }
        })
    }

    /// Delete a project.
    ///
    /// # Errors
    ///
    /// Returns `ProjectServiceError::NotFound` when the project is absent.
    pub async fn delete_project(&self, id: ProjectId) -> Result<(), ProjectServiceError> {
        self.projects.delete_project(id).await.map_err(|e| {
            if matches!(e, storage::repository::StoreError::NotFound) {
                ProjectServiceError::NotFound(id)
            } else {
                ProjectServiceError::Storage(e)
            }
        })?;
        info!(project_id = %id, "deleted project");
        Ok(())
    }
}
