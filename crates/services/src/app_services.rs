use std::sync::Arc;

use spark_core::Clock;
use storage::repository::Storage;

use crate::ai::{AiClient, AiConfig, ProjectGenerator, RequestGate};
use crate::error::AppServicesError;
use crate::progress_tracker::ProgressTracker;
use crate::project_service::ProjectService;

/// Wires the service layer together over one storage backend.
///
/// All AI consumers share a single [`RequestGate`], so request spacing holds
/// across the whole process.
#[derive(Clone)]
pub struct AppServices {
    projects: ProjectService,
    tracker: ProgressTracker,
    generator: Arc<ProjectGenerator>,
}

impl AppServices {
    #[must_use]
    pub fn from_storage(storage: &Storage, clock: Clock) -> Self {
        let gate = Arc::new(RequestGate::default());
        let client = AiClient::new(AiConfig::from_env(), gate);
        Self {
            projects: ProjectService::new(clock, storage.projects.clone()),
            tracker: ProgressTracker::new(clock, storage.projects.clone()),
            generator: Arc::new(ProjectGenerator::new(client)),
        }
    }

    /// Service set over a sqlite database at `database_url`, with migrations
    /// applied.
    ///
    /// # Errors
    ///
    /// Returns `AppServicesError::Sqlite` if the pool cannot be opened or
    /// migrated.
    pub async fn new_sqlite(database_url: &str, clock: Clock) -> Result<Self, AppServicesError> {
        let storage = Storage::sqlite(database_url).await?;
        Ok(Self::from_storage(&storage, clock))
    }

    /// Service set over an in-memory store, for tests and prototyping.
    #[must_use]
    pub fn in_memory(clock: Clock) -> Self {
        Self::from_storage(&Storage::in_memory(), clock)
    }

    #[must_use]
    pub fn projects(&self) -> &ProjectService {
        &self.projects
    }

    #[must_use]
    pub fn tracker(&self) -> &ProgressTracker {
        &self.tracker
    }

    #[must_use]
    pub fn generator(&self) -> &ProjectGenerator {
        &self.generator
    }
}
