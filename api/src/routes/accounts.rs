//! Registration, login and account management

use agro_core::{
    AgroError, Amount, Field, NewUser, Page, RequestOffset, Task, UpdateUser, User, Validator,
};
use axum::extract::State;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::{
    auth::{hash_password, issue_token, verify_password, AuthUser},
    error::{ApiResponse, ApiResult},
    extract::{ApiJson, ApiPath, ApiQuery},
    state::AppState,
};

/// Returned by registration and login
#[derive(Debug, Serialize)]
pub struct AuthPayload {
    pub id: i64,
    pub username: String,
    pub email: String,
    pub token: String,
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct CreditRequest {
    pub amount: Amount,
}

#[derive(Debug, Serialize)]
pub struct FieldWithTasks {
    #[serde(flatten)]
    pub field: Field,
    pub tasks: Vec<Task>,
}

pub async fn register(
    State(state): State<AppState>,
    ApiJson(new_user): ApiJson<NewUser>,
) -> ApiResult<AuthPayload> {
    Validator::validate_new_user(&new_user)?;
    let password_hash = hash_password(&new_user.password)?;

    let user = state.store.create_user(new_user, &password_hash).await?;
    let token = issue_token(state.store.as_ref(), user.id).await?;
    info!(user_id = user.id, "Account registered");

    Ok(ApiResponse::created(
        AuthPayload {
            id: user.id,
            username: user.username,
            email: user.email,
            token,
        },
        "account created",
    ))
}

pub async fn login(
    State(state): State<AppState>,
    ApiJson(request): ApiJson<LoginRequest>,
) -> ApiResult<AuthPayload> {
    let invalid = || AgroError::Unauthorized("Invalid email or password".to_string());

    let credentials = state
        .store
        .get_credentials_by_email(request.email.trim())
        .await?
        .ok_or_else(invalid)?;
    if !credentials.user.is_active || !verify_password(&credentials.password_hash, &request.password) {
        return Err(invalid().into());
    }

    let user = credentials.user;
    let token = issue_token(state.store.as_ref(), user.id).await?;
    info!(user_id = user.id, "User logged in");

    Ok(ApiResponse::ok(
        AuthPayload {
            id: user.id,
            username: user.username,
            email: user.email,
            token,
        },
        "login successful",
    ))
}

pub async fn list_users(
    State(state): State<AppState>,
    _user: AuthUser,
    ApiQuery(page): ApiQuery<Page>,
) -> ApiResult<Vec<User>> {
    let users = state.store.list_users(page).await?;
    Ok(ApiResponse::ok(users, "users"))
}

pub async fn get_user(
    State(state): State<AppState>,
    _user: AuthUser,
    ApiPath(id): ApiPath<i64>,
) -> ApiResult<User> {
    let user = state
        .store
        .get_user(id)
        .await?
        .ok_or_else(|| AgroError::not_found("user", id))?;
    Ok(ApiResponse::ok(user, "user"))
}

pub async fn update_user(
    State(state): State<AppState>,
    caller: AuthUser,
    ApiPath(id): ApiPath<i64>,
    ApiJson(updates): ApiJson<UpdateUser>,
) -> ApiResult<User> {
    caller.ensure_owner(id, "account")?;
    Validator::validate_update_user(&updates)?;

    let user = state.store.update_user(id, updates).await?;
    Ok(ApiResponse::ok(user, "account updated"))
}

pub async fn delete_user(
    State(state): State<AppState>,
    caller: AuthUser,
    ApiPath(id): ApiPath<i64>,
) -> ApiResult<()> {
    caller.ensure_owner(id, "account")?;
    state.store.soft_delete_user(id).await?;
    info!(user_id = id, deleted_by = caller.id(), "Account deleted");
    Ok(ApiResponse::ok((), "account deleted"))
}

pub async fn user_fields(
    State(state): State<AppState>,
    caller: AuthUser,
    ApiPath(id): ApiPath<i64>,
) -> ApiResult<Vec<FieldWithTasks>> {
    caller.ensure_owner(id, "account")?;

    let fields = state.store.list_fields_for_owner(id).await?;
    let mut result = Vec::with_capacity(fields.len());
    for field in fields {
        let tasks = state.store.list_tasks_for_field(field.id).await?;
        result.push(FieldWithTasks { field, tasks });
    }
    Ok(ApiResponse::ok(result, "fields"))
}

/// Administrators top up a balance
pub async fn credit_user(
    State(state): State<AppState>,
    caller: AuthUser,
    ApiPath(id): ApiPath<i64>,
    ApiJson(request): ApiJson<CreditRequest>,
) -> ApiResult<User> {
    if !caller.0.is_admin {
        return Err(AgroError::Forbidden("Only administrators can credit accounts".to_string()).into());
    }

    let user = state.store.credit_access_units(id, request.amount).await?;
    info!(
        user_id = id,
        amount = %request.amount,
        balance = %user.access_units,
        "Access units credited"
    );
    Ok(ApiResponse::ok(user, "access units credited"))
}

pub async fn init_offset(State(state): State<AppState>, _user: AuthUser) -> ApiResult<RequestOffset> {
    let offset = state.store.init_offset().await?;
    Ok(ApiResponse::created(offset, "offset initialised"))
}
