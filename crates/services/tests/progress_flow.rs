//! End-to-end flow over the in-memory store: create a project, work through
//! its steps with quiz gates, and observe the completion transition.

use services::AppServices;
use services::error::TrackerError;
use spark_core::Clock;
use spark_core::model::{ProgressError, ProjectStatus, QuizScore, Step};
use spark_core::time::fixed_now;

fn steps(titles: &[&str]) -> Vec<Step> {
    titles
        .iter()
        .map(|t| Step::new(*t, "", "").unwrap())
        .collect()
}

#[tokio::test]
async fn project_completes_after_every_step_passes_its_quiz() {
    let app = AppServices::in_memory(Clock::fixed(fixed_now()));

    let project = app
        .projects()
        .create_project(
            "Build a Bookshelf",
            None,
            steps(&["Measure", "Cut", "Assemble"]),
        )
        .await
        .unwrap();
    let id = project.id();

    let first = app
        .tracker()
        .complete_step(id, 0, Some(QuizScore::new(92.0).unwrap()), 300)
        .await
        .unwrap();
    assert!(!first.is_project_completed);
    assert!((first.percent_complete - 100.0 / 3.0).abs() < 1e-9);

    // failing quiz leaves the store untouched
    let before = app.projects().get_project(id).await.unwrap();
    let err = app
        .tracker()
        .complete_step(id, 1, Some(QuizScore::new(89.9).unwrap()), 120)
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        TrackerError::Validation(ProgressError::QuizScoreTooLow { .. })
    ));
    assert_eq!(app.projects().get_project(id).await.unwrap(), before);

    app.tracker()
        .complete_step(id, 1, Some(QuizScore::new(90.0).unwrap()), 120)
        .await
        .unwrap();
    let last = app
        .tracker()
        .complete_step(id, 2, Some(QuizScore::new(100.0).unwrap()), 60)
        .await
        .unwrap();
    assert!(last.is_project_completed);
    assert_eq!(last.completed_steps, vec![0, 1, 2]);

    let finished = app.projects().get_project(id).await.unwrap();
    assert_eq!(finished.status(), ProjectStatus::Completed);
    assert_eq!(finished.completed_at(), Some(fixed_now()));
    assert_eq!(finished.progress().percent_complete(), 100.0);
    assert_eq!(finished.progress().time_spent_secs(), 480);
}

#[tokio::test]
async fn repeating_a_step_changes_nothing_but_time() {
    let app = AppServices::in_memory(Clock::fixed(fixed_now()));
    let project = app
        .projects()
        .create_project("Grow Herbs", None, steps(&["Plant", "Water"]))
        .await
        .unwrap();
    let id = project.id();

    app.tracker().complete_step(id, 0, None, 100).await.unwrap();
    let repeat = app.tracker().complete_step(id, 0, None, 50).await.unwrap();
    assert_eq!(repeat.completed_steps, vec![0]);
    assert_eq!(repeat.percent_complete, 50.0);

    let fetched = app.projects().get_project(id).await.unwrap();
    assert_eq!(fetched.progress().time_spent_secs(), 150);
    assert_eq!(fetched.status(), ProjectStatus::Active);
}

#[tokio::test]
async fn completed_projects_accept_further_step_activity() {
    let app = AppServices::in_memory(Clock::fixed(fixed_now()));
    let project = app
        .projects()
        .create_project("Fly a Kite", None, steps(&["Launch"]))
        .await
        .unwrap();
    let id = project.id();

    app.tracker().complete_step(id, 0, None, 10).await.unwrap();
    let again = app.tracker().complete_step(id, 0, None, 10).await.unwrap();
    assert!(again.is_project_completed);

    let fetched = app.projects().get_project(id).await.unwrap();
    assert_eq!(fetched.status(), ProjectStatus::Completed);
    assert_eq!(fetched.completed_at(), Some(fixed_now()));
}
