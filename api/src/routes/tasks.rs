//! Field tasks

use agro_core::{AgroError, NewTask, Task, TaskStatus, UpdateTask, Validator};
use axum::extract::State;
use serde::Deserialize;
use tracing::{debug, info, warn};

use super::{load_owned_field, load_owned_task};
use crate::{
    auth::AuthUser,
    error::{ApiResponse, ApiResult},
    extract::{ApiJson, ApiPath},
    state::AppState,
};

#[derive(Debug, Deserialize)]
pub struct StatusRequest {
    pub status: TaskStatus,
}

pub async fn create_task(
    State(state): State<AppState>,
    user: AuthUser,
    ApiPath(field_id): ApiPath<i64>,
    ApiJson(task): ApiJson<NewTask>,
) -> ApiResult<Task> {
    load_owned_field(&state, &user, field_id).await?;
    Validator::validate_new_task(&task)?;

    let task = state.store.create_task(user.id(), field_id, task).await?;
    info!(task_id = task.id, field_id, "Task created");
    Ok(ApiResponse::created(task, "task created"))
}

pub async fn list_tasks(
    State(state): State<AppState>,
    user: AuthUser,
    ApiPath(field_id): ApiPath<i64>,
) -> ApiResult<Vec<Task>> {
    load_owned_field(&state, &user, field_id).await?;
    let tasks = state.store.list_tasks_for_field(field_id).await?;
    Ok(ApiResponse::ok(tasks, "tasks"))
}

/// Ask the model for tasks and store them as unapproved suggestions
///
/// Suggestions whose title already exists on the field are skipped.
pub async fn suggest_tasks(
    State(state): State<AppState>,
    user: AuthUser,
    ApiPath(field_id): ApiPath<i64>,
) -> ApiResult<Vec<Task>> {
    let field = load_owned_field(&state, &user, field_id).await?;
    let recent = state.store.latest_done_task(field_id).await?;
    let suggestions = state
        .planner()?
        .generate_tasks(&field.profile(recent.as_ref()))
        .await;

    let mut created = Vec::with_capacity(suggestions.len());
    for suggestion in suggestions {
        let mut task = NewTask::new(suggestion.title);
        task.description = Some(suggestion.description).filter(|d| !d.is_empty());
        task.generated = true;
        if let Err(e) = Validator::validate_new_task(&task) {
            warn!("Skipping invalid suggestion: {}", e);
            continue;
        }

        match state.store.create_task(user.id(), field_id, task).await {
            Ok(task) => created.push(task),
            Err(AgroError::Duplicate(message)) => {
                debug!("Skipping duplicate suggestion: {}", message);
            }
            Err(e) => return Err(e.into()),
        }
    }

    info!(field_id, count = created.len(), "Suggested tasks stored");
    Ok(ApiResponse::created(created, "tasks suggested"))
}

pub async fn get_task(
    State(state): State<AppState>,
    user: AuthUser,
    ApiPath(id): ApiPath<i64>,
) -> ApiResult<Task> {
    let task = load_owned_task(&state, &user, id).await?;
    Ok(ApiResponse::ok(task, "task"))
}

pub async fn update_task(
    State(state): State<AppState>,
    user: AuthUser,
    ApiPath(id): ApiPath<i64>,
    ApiJson(updates): ApiJson<UpdateTask>,
) -> ApiResult<Task> {
    load_owned_task(&state, &user, id).await?;
    Validator::validate_update_task(&updates)?;
    let task = state.store.update_task(id, updates).await?;
    Ok(ApiResponse::ok(task, "task updated"))
}

pub async fn delete_task(
    State(state): State<AppState>,
    user: AuthUser,
    ApiPath(id): ApiPath<i64>,
) -> ApiResult<()> {
    load_owned_task(&state, &user, id).await?;
    state.store.soft_delete_task(id).await?;
    Ok(ApiResponse::ok((), "task deleted"))
}

pub async fn set_status(
    State(state): State<AppState>,
    user: AuthUser,
    ApiPath(id): ApiPath<i64>,
    ApiJson(request): ApiJson<StatusRequest>,
) -> ApiResult<Task> {
    load_owned_task(&state, &user, id).await?;
    let task = state.store.set_task_status(id, request.status).await?;
    info!(task_id = id, status = %request.status.as_str(), "Task status changed");
    Ok(ApiResponse::ok(task, "task status updated"))
}

pub async fn approve_task(
    State(state): State<AppState>,
    user: AuthUser,
    ApiPath(id): ApiPath<i64>,
) -> ApiResult<Task> {
    load_owned_task(&state, &user, id).await?;
    let task = state.store.approve_task(id).await?;
    Ok(ApiResponse::ok(task, "task approved"))
}
