use spark_core::model::{Project, ProjectId, ProjectStatus};

use super::SqliteRepository;
use super::mapping::{
    indices_to_json, record_from_row, ser, steps_to_json, u64_to_i64, usize_to_i64,
};
use crate::repository::{ProgressPatch, ProjectRecord, ProjectRepository, StoreError};

fn conn<E: core::fmt::Display>(e: E) -> StoreError {
    StoreError::Connection(e.to_string())
}

#[async_trait::async_trait]
impl ProjectRepository for SqliteRepository {
    async fn insert_project(&self, project: &Project) -> Result<(), StoreError> {
        let record = ProjectRecord::from_project(project);
        let steps = steps_to_json(&record.steps)?;
        let completed_steps = indices_to_json(&record.completed_steps)?;

        let result = sqlx::query(
            r"
            INSERT INTO projects (
                id, title, description, steps, status, created_at, completed_at,
                current_step, completed_steps, total_steps, percent_complete,
                time_spent_secs, last_worked_on
            )
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)
            ",
        )
        .bind(record.id.to_string())
        .bind(record.title)
        .bind(record.description)
        .bind(steps)
        .bind(record.status.as_str())
        .bind(record.created_at)
        .bind(record.completed_at)
        .bind(usize_to_i64("current_step", record.current_step)?)
        .bind(completed_steps)
        .bind(usize_to_i64("total_steps", record.total_steps)?)
        .bind(record.percent_complete)
        .bind(u64_to_i64("time_spent_secs", record.time_spent_secs)?)
        .bind(record.last_worked_on)
        .execute(self.pool())
        .await;

        match result {
            Ok(_) => Ok(()),
            Err(e)
                if e.as_database_error()
                    .is_some_and(sqlx::error::DatabaseError::is_unique_violation) =>
            {
                Err(StoreError::Conflict)
            }
            Err(e) => Err(conn(e)),
        }
    }

    async fn get_project(&self, id: ProjectId) -> Result<Option<Project>, StoreError> {
        let row = sqlx::query(
            r"
            SELECT id, title, description, steps, status, created_at, completed_at,
                   current_step, completed_steps, total_steps, percent_complete,
                   time_spent_secs, last_worked_on
            FROM projects WHERE id = ?1
            ",
        )
        .bind(id.to_string())
        .fetch_optional(self.pool())
        .await
        .map_err(conn)?;

        match row {
            Some(row) => record_from_row(&row)?.into_project().map(Some).map_err(ser),
            None => Ok(None),
        }
    }

    async fn list_projects(&self, limit: u32) -> Result<Vec<Project>, StoreError> {
        let rows = sqlx::query(
            r"
            SELECT id, title, description, steps, status, created_at, completed_at,
                   current_step, completed_steps, total_steps, percent_complete,
                   time_spent_secs, last_worked_on
            FROM projects
            ORDER BY created_at ASC, id ASC
            LIMIT ?1
            ",
        )
        .bind(i64::from(limit))
        .fetch_all(self.pool())
        .await
        .map_err(conn)?;

        let mut projects = Vec::with_capacity(rows.len());
        for row in rows {
            projects.push(record_from_row(&row)?.into_project().map_err(ser)?);
        }
        Ok(projects)
    }

    async fn update_progress(
        &self,
        id: ProjectId,
        patch: &ProgressPatch,
    ) -> Result<(), StoreError> {
        let current_step = patch
            .current_step
            .map(|v| usize_to_i64("current_step", v))
            .transpose()?;
        let completed_steps = patch
            .completed_steps
            .as_ref()
            .map(indices_to_json)
            .transpose()?;
        let time_spent_secs = patch
            .time_spent_secs
            .map(|v| u64_to_i64("time_spent_secs", v))
            .transpose()?;

        // COALESCE keeps the update at field granularity: absent patch
        // fields bind NULL and leave the stored value in place.
        let result = sqlx::query(
            r"
            UPDATE projects SET
                current_step = COALESCE(?2, current_step),
                completed_steps = COALESCE(?3, completed_steps),
                percent_complete = COALESCE(?4, percent_complete),
                time_spent_secs = COALESCE(?5, time_spent_secs),
                last_worked_on = COALESCE(?6, last_worked_on),
                status = COALESCE(?7, status),
                completed_at = COALESCE(?8, completed_at)
            WHERE id = ?1
            ",
        )
        .bind(id.to_string())
        .bind(current_step)
        .bind(completed_steps)
        .bind(patch.percent_complete)
        .bind(time_spent_secs)
        .bind(patch.last_worked_on)
        .bind(patch.project_status.map(ProjectStatus::as_str))
        .bind(patch.completed_at)
        .execute(self.pool())
        .await
        .map_err(conn)?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound);
        }
        Ok(())
    }

    async fn set_status(&self, id: ProjectId, status: ProjectStatus) -> Result<(), StoreError> {
        let result = sqlx::query("UPDATE projects SET status = ?2 WHERE id = ?1")
            .bind(id.to_string())
            .bind(status.as_str())
            .execute(self.pool())
            .await
            .map_err(conn)?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound);
        }
        Ok(())
    }

    async fn delete_project(&self, id: ProjectId) -> Result<(), StoreError> {
        let result = sqlx::query("DELETE FROM projects WHERE id = ?1")
            .bind(id.to_string())
            .execute(self.pool())
            .await
            .map_err(conn)?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound);
        }
        Ok(())
    }
}
