//! Fields, work planning and weather analysis

use agro_advisor::{analyze_growing_conditions, to_planned_tasks, GrowingConditions};
use agro_core::{
    Field, GanttEntry, NewField, Page, PlannedTask, ScheduleOutcome, Task, TaskConflict,
    TaskScheduler, TaskStatus, UpdateField, Validator, WeatherSample, DEFAULT_HORIZON_HOURS,
    MAX_HORIZON_HOURS,
};
use axum::extract::State;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::{load_field, load_owned_field};
use crate::{
    auth::AuthUser,
    error::{ApiResponse, ApiResult},
    extract::{ApiJson, ApiPath, ApiQuery},
    state::AppState,
};

/// Forecast samples included in the weather report
const REPORT_FORECAST_SAMPLES: usize = 5;

const MAX_FORECAST_DAYS: u32 = 5;

pub async fn list_fields(
    State(state): State<AppState>,
    _user: AuthUser,
    ApiQuery(page): ApiQuery<Page>,
) -> ApiResult<Vec<Field>> {
    let fields = state.store.list_fields(page).await?;
    Ok(ApiResponse::ok(fields, "fields"))
}

pub async fn create_field(
    State(state): State<AppState>,
    user: AuthUser,
    ApiJson(field): ApiJson<NewField>,
) -> ApiResult<Field> {
    Validator::validate_new_field(&field)?;
    let field = state.store.create_field(user.id(), field).await?;
    info!(field_id = field.id, owner = user.id(), "Field created");
    Ok(ApiResponse::created(field, "field created"))
}

pub async fn get_field(
    State(state): State<AppState>,
    _user: AuthUser,
    ApiPath(id): ApiPath<i64>,
) -> ApiResult<Field> {
    let field = load_field(&state, id).await?;
    Ok(ApiResponse::ok(field, "field"))
}

pub async fn update_field(
    State(state): State<AppState>,
    user: AuthUser,
    ApiPath(id): ApiPath<i64>,
    ApiJson(updates): ApiJson<UpdateField>,
) -> ApiResult<Field> {
    load_owned_field(&state, &user, id).await?;
    Validator::validate_update_field(&updates)?;
    let field = state.store.update_field(id, updates).await?;
    Ok(ApiResponse::ok(field, "field updated"))
}

pub async fn delete_field(
    State(state): State<AppState>,
    user: AuthUser,
    ApiPath(id): ApiPath<i64>,
) -> ApiResult<()> {
    load_owned_field(&state, &user, id).await?;
    state.store.soft_delete_field(id).await?;
    info!(field_id = id, "Field deleted");
    Ok(ApiResponse::ok((), "field deleted"))
}

/// Body of a planning request
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct PlanRequest {
    /// Tasks to schedule; when empty, the field's open tasks are used
    pub tasks: Vec<PlannedTask>,
    /// Add model-generated tasks to the plan
    pub generate: bool,
    /// Gate placements on the forecast when a weather service is configured
    pub use_weather: Option<bool>,
    /// Capped at `MAX_HORIZON_HOURS`
    pub horizon_hours: Option<u32>,
    pub start: Option<DateTime<Utc>>,
}

#[derive(Debug, Serialize)]
pub struct PlanResponse {
    pub outcome: ScheduleOutcome,
    pub tasks: Vec<PlannedTask>,
    pub gantt: Vec<GanttEntry>,
    pub critical_path: Vec<String>,
    pub conflicts: Vec<TaskConflict>,
    pub weather_gated: bool,
}

/// Stored tasks that still need doing, as scheduler input
fn open_tasks(tasks: &[Task]) -> Vec<PlannedTask> {
    tasks
        .iter()
        .filter(|task| task.status != TaskStatus::Done && task.approved)
        .map(|task| {
            let mut planned = PlannedTask::new(format!("field-task-{}", task.id), &task.title, 1.0);
            planned.description = task.description.clone().unwrap_or_default();
            planned.field_id = Some(task.field_id);
            planned
        })
        .collect()
}

pub async fn plan_field(
    State(state): State<AppState>,
    user: AuthUser,
    ApiPath(id): ApiPath<i64>,
    ApiJson(request): ApiJson<PlanRequest>,
) -> ApiResult<PlanResponse> {
    let field = load_owned_field(&state, &user, id).await?;
    let now = request.start.unwrap_or_else(Utc::now);
    let horizon = request
        .horizon_hours
        .unwrap_or(DEFAULT_HORIZON_HOURS)
        .min(MAX_HORIZON_HOURS);

    let mut planned = request.tasks;
    if request.generate {
        let recent = state.store.latest_done_task(field.id).await?;
        let profile = field.profile(recent.as_ref());
        let suggestions = state.planner()?.generate_tasks(&profile).await;
        planned.extend(to_planned_tasks(&suggestions, field.id));
    }
    if planned.is_empty() {
        planned = open_tasks(&state.store.list_tasks_for_field(field.id).await?);
    }

    let mut scheduler = TaskScheduler::new();
    for mut task in planned {
        task.field_id.get_or_insert(field.id);
        scheduler.add_task(task)?;
    }
    scheduler.validate_dependencies()?;

    let weather = match (request.use_weather.unwrap_or(true), state.weather.as_ref()) {
        (true, Some(weather)) => Some(weather),
        _ => None,
    };
    let outcome = match weather {
        Some(weather) => {
            let days = horizon.div_ceil(24).clamp(1, MAX_FORECAST_DAYS);
            let forecast = weather.forecast(field.latitude, field.longitude, days).await;
            debug!(field_id = field.id, samples = forecast.samples().len(), "Forecast loaded");
            scheduler.schedule_with_weather(&forecast, now, horizon)?
        }
        None => scheduler.optimize_schedule(now)?,
    };

    info!(
        field_id = field.id,
        scheduled = outcome.scheduled.len(),
        blocked = outcome.blocked.len(),
        "Field plan computed"
    );

    let response = PlanResponse {
        critical_path: scheduler.critical_path()?,
        gantt: scheduler.gantt(),
        conflicts: scheduler.conflicts(),
        tasks: scheduler.tasks().cloned().collect(),
        weather_gated: weather.is_some(),
        outcome,
    };
    Ok(ApiResponse::ok(response, "plan computed"))
}

#[derive(Debug, Serialize)]
pub struct WeatherReport {
    pub crop: String,
    pub current: WeatherSample,
    pub forecast: Vec<WeatherSample>,
    pub analysis: GrowingConditions,
}

pub async fn field_weather(
    State(state): State<AppState>,
    user: AuthUser,
    ApiPath(id): ApiPath<i64>,
) -> ApiResult<WeatherReport> {
    let field = load_owned_field(&state, &user, id).await?;
    let weather = state.weather()?;

    let current = weather.current(field.latitude, field.longitude).await;
    let forecast = weather
        .forecast(field.latitude, field.longitude, MAX_FORECAST_DAYS)
        .await;
    let analysis = analyze_growing_conditions(&current, &forecast);

    let report = WeatherReport {
        crop: field.plant_specie,
        forecast: forecast
            .samples()
            .iter()
            .take(REPORT_FORECAST_SAMPLES)
            .cloned()
            .collect(),
        current,
        analysis,
    };
    Ok(ApiResponse::ok(report, "growing conditions"))
}
