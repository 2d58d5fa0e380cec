//! Service layer for Project Spark: project CRUD, the step-completion
//! state machine over a repository, the transient-failure retry policy,
//! and AI-backed project generation.

#![forbid(unsafe_code)]

pub mod ai;
pub mod app_services;
pub mod error;
pub mod progress_tracker;
pub mod project_service;
pub mod retry;

pub use app_services::AppServices;
pub use error::{AiError, AppServicesError, ProjectServiceError, TrackerError};
pub use progress_tracker::ProgressTracker;
pub use project_service::ProjectService;
pub use retry::{ConnectivityMonitor, RetryOptions};
