//! Route handlers grouped by resource

pub mod accounts;
pub mod fields;
pub mod health;
pub mod market;
pub mod plants;
pub mod tasks;

use agro_core::{AgroError, Field, Result, Task};

use crate::{auth::AuthUser, state::AppState};

/// Live field or `NotFound`
pub(crate) async fn load_field(state: &AppState, id: i64) -> Result<Field> {
    state
        .store
        .get_field(id)
        .await?
        .ok_or_else(|| AgroError::not_found("field", id))
}

/// Live field owned by the caller
pub(crate) async fn load_owned_field(state: &AppState, user: &AuthUser, id: i64) -> Result<Field> {
    let field = load_field(state, id).await?;
    user.ensure_owner(field.created_by, "field")?;
    Ok(field)
}

/// Live task owned by the caller
pub(crate) async fn load_owned_task(state: &AppState, user: &AuthUser, id: i64) -> Result<Task> {
    let task = state
        .store
        .get_task(id)
        .await?
        .ok_or_else(|| AgroError::not_found("task", id))?;
    user.ensure_owner(task.created_by, "task")?;
    Ok(task)
}
