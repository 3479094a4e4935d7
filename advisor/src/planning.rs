//! Field task suggestions from the language model.

use agro_core::{
    FieldProfile, PlanPriority, PlannedTask, WeatherConstraints, MAX_TASK_DURATION_HOURS,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;

use crate::json_recovery::extract_json_object;
use crate::llm::LlmClient;

/// Duration assumed when the model gives none, in hours
const DEFAULT_TASK_HOURS: f64 = 2.0;

/// A task proposed by the model, before it is stored or scheduled
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SuggestedTask {
    pub title: String,
    pub description: String,
    pub equipment_required: Vec<String>,
    pub duration_hours: f64,
    pub priority: PlanPriority,
    pub weather_constraints: WeatherConstraints,
    /// Titles of the suggestions this one waits for
    pub dependencies: Vec<String>,
}

/// Builds the task-generation prompt and parses the answer
pub struct PlanningAgent {
    llm: Arc<dyn LlmClient>,
}

impl PlanningAgent {
    pub fn new(llm: Arc<dyn LlmClient>) -> Self {
        Self { llm }
    }

    pub fn build_prompt(profile: &FieldProfile) -> String {
        let equipments = if profile.equipments.is_empty() {
            "none".to_string()
        } else {
            profile.equipments.join(", ")
        };
        let ph = profile
            .ground_ph
            .map_or_else(|| "unknown".to_string(), |ph| ph.to_string());

        format!(
            r#"You are an agronomist. Generate the list of field tasks for the field below.
Answer with JSON only, in exactly this format:
{{
    "tasks": [
        {{
            "title": "string",
            "description": "string",
            "equipment_required": ["string"],
            "duration": number,
            "priority": "high|medium|low",
            "weather_constraints": {{
                "max_wind_speed": number,
                "max_precipitation": number,
                "min_temperature": number,
                "max_temperature": number
            }},
            "dependencies": ["title of an earlier task"]
        }}
    ]
}}
"duration" is in hours. Only use equipment from the list below.

Field: {measure} ha of {plant} in {location}, {ground} soil, pH {ph}
Season: {period}, growth: {grow_speed}, status: {status}, started on {start_on}
Last completed task: {recent_task}
Equipment: {equipments}
"#,
            measure = profile.measure,
            plant = profile.plant_specie,
            location = profile.location,
            ground = profile.ground_type,
            period = profile.period,
            grow_speed = profile.grow_speed,
            status = profile.status,
            start_on = profile.start_on,
            recent_task = profile.recent_task,
        )
    }

    /// Ask the model for tasks; any failure yields an empty list
    pub async fn generate_tasks(&self, profile: &FieldProfile) -> Vec<SuggestedTask> {
        let prompt = Self::build_prompt(profile);
        let answer = match self.llm.generate(&prompt).await {
            Ok(answer) => answer,
            Err(e) => {
                tracing::warn!(model = self.llm.model_name(), "Task generation failed: {}", e);
                return Vec::new();
            }
        };

        let suggestions = parse_suggestions(&answer, &profile.equipments);
        tracing::info!(
            model = self.llm.model_name(),
            count = suggestions.len(),
            "Task suggestions parsed"
        );
        suggestions
    }
}

/// Parse the model answer into suggestions, skipping malformed entries
pub fn parse_suggestions(answer: &str, available_equipment: &[String]) -> Vec<SuggestedTask> {
    let Some(object) = extract_json_object(answer) else {
        tracing::warn!("Model answer contains no JSON object");
        return Vec::new();
    };
    let Some(Value::Array(items)) = object.get("tasks") else {
        tracing::warn!("Model answer has no task list");
        return Vec::new();
    };

    let titles: Vec<Option<String>> = items
        .iter()
        .map(|item| item.get("title").and_then(Value::as_str).map(|t| t.trim().to_string()))
        .collect();

    items
        .iter()
        .filter_map(|item| {
            let title = item.get("title")?.as_str()?.trim();
            if title.is_empty() {
                return None;
            }

            let equipment_required = item
                .get("equipment_required")
                .and_then(Value::as_array)
                .map(|names| {
                    names
                        .iter()
                        .filter_map(Value::as_str)
                        .filter(|name| {
                            available_equipment.is_empty()
                                || available_equipment.iter().any(|a| a.eq_ignore_ascii_case(name))
                        })
                        .map(str::to_string)
                        .collect()
                })
                .unwrap_or_default();

            let weather_constraints = item
                .get("weather_constraints")
                .cloned()
                .and_then(|v| serde_json::from_value(v).ok())
                .unwrap_or_default();

            Some(SuggestedTask {
                title: title.to_string(),
                description: item
                    .get("description")
                    .and_then(Value::as_str)
                    .unwrap_or_default()
                    .to_string(),
                equipment_required,
                duration_hours: parse_duration(item.get("duration")),
                priority: item
                    .get("priority")
                    .and_then(Value::as_str)
                    .map(PlanPriority::from_label)
                    .unwrap_or_default(),
                weather_constraints,
                dependencies: parse_dependencies(item.get("dependencies"), &titles, title),
            })
        })
        .collect()
}

fn parse_duration(value: Option<&Value>) -> f64 {
    let hours = match value {
        Some(Value::Number(n)) => n.as_f64(),
        Some(Value::String(s)) => s
            .trim()
            .trim_end_matches(|c: char| c.is_alphabetic() || c.is_whitespace())
            .parse()
            .ok(),
        _ => None,
    };
    hours
        .filter(|h| h.is_finite() && *h > 0.0)
        .map_or(DEFAULT_TASK_HOURS, |h| h.min(MAX_TASK_DURATION_HOURS))
}

/// Dependencies arrive as titles or as 1-based positions in the list
fn parse_dependencies(value: Option<&Value>, titles: &[Option<String>], own: &str) -> Vec<String> {
    let Some(Value::Array(refs)) = value else {
        return Vec::new();
    };

    let mut dependencies: Vec<String> = refs
        .iter()
        .filter_map(|r| match r {
            Value::Number(n) => n
                .as_u64()
                .and_then(|pos| titles.get((pos as usize).checked_sub(1)?))
                .cloned()
                .flatten(),
            Value::String(s) => titles
                .iter()
                .flatten()
                .find(|t| t.eq_ignore_ascii_case(s.trim()))
                .cloned(),
            _ => None,
        })
        .filter(|title| title != own)
        .collect();
    dependencies.dedup();
    dependencies
}

/// Turn suggestions into scheduler tasks with ids `task-1`, `task-2`, ...
///
/// Dependencies on titles that are not part of the batch are dropped.
pub fn to_planned_tasks(suggestions: &[SuggestedTask], field_id: i64) -> Vec<PlannedTask> {
    let id_of = |title: &str| {
        suggestions
            .iter()
            .position(|s| s.title == title)
            .map(|i| format!("task-{}", i + 1))
    };

    suggestions
        .iter()
        .enumerate()
        .map(|(i, s)| {
            let mut task = PlannedTask::new(format!("task-{}", i + 1), &s.title, s.duration_hours)
                .with_priority(s.priority)
                .with_constraints(s.weather_constraints)
                .with_equipment(s.equipment_required.iter().cloned())
                .with_dependencies(s.dependencies.iter().filter_map(|d| id_of(d)));
            task.description = s.description.clone();
            task.field_id = Some(field_id);
            task
        })
        .collect()
}
