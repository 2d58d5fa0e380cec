mod ids;
mod progress;
mod project;
mod quiz;
mod step;

pub use ids::{ParseIdError, ProjectId};
pub use progress::{
    ParseProgressStatusError, Progress, ProgressError, ProgressOverwrite, ProgressStatus,
    StepCompletion,
};
pub use project::{ProjectError, ParseProjectStatusError, Project, ProjectStatus};
pub use quiz::{PASSING_THRESHOLD, QuizScore, QuizScoreError};
pub use step::{Step, StepError};
