use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use sqlx::Row;
use sqlx::sqlite::SqliteRow;

use spark_core::model::{ProjectId, ProjectStatus, Step};

use crate::repository::{ProjectRecord, StoreError};

pub(crate) fn ser<E: core::fmt::Display>(e: E) -> StoreError {
    StoreError::Serialization(e.to_string())
}

pub(crate) fn usize_to_i64(field: &'static str, v: usize) -> Result<i64, StoreError> {
    i64::try_from(v).map_err(|_| StoreError::Serialization(format!("{field} overflow")))
}

pub(crate) fn i64_to_usize(field: &'static str, v: i64) -> Result<usize, StoreError> {
    usize::try_from(v).map_err(|_| StoreError::Serialization(format!("{field} sign overflow")))
}

pub(crate) fn u64_to_i64(field: &'static str, v: u64) -> Result<i64, StoreError> {
    i64::try_from(v).map_err(|_| StoreError::Serialization(format!("{field} overflow")))
}

pub(crate) fn i64_to_u64(field: &'static str, v: i64) -> Result<u64, StoreError> {
    u64::try_from(v).map_err(|_| StoreError::Serialization(format!("{field} sign overflow")))
}

pub(crate) fn steps_to_json(steps: &[Step]) -> Result<String, StoreError> {
    serde_json::to_string(steps).map_err(ser)
}

pub(crate) fn steps_from_json(json: &str) -> Result<Vec<Step>, StoreError> {
    serde_json::from_str(json).map_err(ser)
}

pub(crate) fn indices_to_json(indices: &BTreeSet<usize>) -> Result<String, StoreError> {
    serde_json::to_string(indices).map_err(ser)
}

pub(crate) fn indices_from_json(json: &str) -> Result<BTreeSet<usize>, StoreError> {
    serde_json::from_str(json).map_err(ser)
}

pub(crate) fn parse_project_id(s: &str) -> Result<ProjectId, StoreError> {
    s.parse::<ProjectId>().map_err(ser)
}

pub(crate) fn parse_project_status(s: &str) -> Result<ProjectStatus, StoreError> {
    s.parse::<ProjectStatus>().map_err(ser)
}

pub(crate) fn record_from_row(row: &SqliteRow) -> Result<ProjectRecord, StoreError> {
    let id = parse_project_id(&row.try_get::<String, _>("id").map_err(ser)?)?;
    let status = parse_project_status(&row.try_get::<String, _>("status").map_err(ser)?)?;
    let steps = steps_from_json(&row.try_get::<String, _>("steps").map_err(ser)?)?;
    let completed_steps =
        indices_from_json(&row.try_get::<String, _>("completed_steps").map_err(ser)?)?;

    Ok(ProjectRecord {
        id,
        title: row.try_get("title").map_err(ser)?,
        description: row.try_get("description").map_err(ser)?,
        steps,
        status,
        created_at: row.try_get::<DateTime<Utc>, _>("created_at").map_err(ser)?,
        completed_at: row
            .try_get::<Option<DateTime<Utc>>, _>("completed_at")
            .map_err(ser)?,
        current_step: i64_to_usize(
            "current_step",
            row.try_get::<i64, _>("current_step").map_err(ser)?,
        )?,
        completed_steps,
        total_steps: i64_to_usize(
            "total_steps",
            row.try_get::<i64, _>("total_steps").map_err(ser)?,
        )?,
        percent_complete: row.try_get("percent_complete").map_err(ser)?,
        time_spent_secs: i64_to_u64(
            "time_spent_secs",
            row.try_get::<i64, _>("time_spent_secs").map_err(ser)?,
        )?,
        last_worked_on: row
            .try_get::<DateTime<Utc>, _>("last_worked_on")
            .map_err(ser)?,
    })
}
