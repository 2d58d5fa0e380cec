use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum StepError {
    #[error("step title cannot be empty")]
    EmptyTitle,
}

/// One unit of work within a project.
///
/// Steps have no identity of their own; a step is addressed by its position
/// in the project's ordered step list (insertion order is pedagogical order).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Step {
    title: String,
    description: String,
    learning_focus: String,
}

impl Step {
    /// Creates a new step.
    ///
    /// Title is trimmed; description and learning focus may be empty.
    ///
    /// # Errors
    ///
    /// Returns `StepError::EmptyTitle` if the title is empty or
    /// whitespace-only.
    pub fn new(
        title: impl Into<String>,
        description: impl Into<String>,
        learning_focus: impl Into<String>,
    ) -> Result<Self, StepError> {
        let title = title.into();
        if title.trim().is_empty() {
            return Err(StepError::EmptyTitle);
        }

        Ok(Self {
            title: title.trim().to_owned(),
            description: description.into().trim().to_owned(),
            learning_focus: learning_focus.into().trim().to_owned(),
        })
    }

    #[must_use]
    pub fn title(&self) -> &str {
        &self.title
    }

    #[must_use]
    pub fn description(&self) -> &str {
        &self.description
    }

    #[must_use]
    pub fn learning_focus(&self) -> &str {
        &self.learning_focus
    }
}
