//! Greedy, dependency-aware planner for field work.
//!
//! Pending tasks are ordered by `(dependency count, priority)` and laid out
//! back to back from a start instant. A task is only placed once each of its
//! dependencies is completed or already placed earlier in the same run, so
//! dependency chains are honoured regardless of the sort order. When a
//! [`Forecast`] is supplied, each placement is pushed forward one hour at a
//! time until the weather over the whole task window is acceptable, up to a
//! bounded horizon.
//!
//! All slot arithmetic is checked: a start, duration or horizon that would
//! leave the representable time range is a [`AgroError::Validation`].

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap, HashSet};

use crate::error::{AgroError, Result};

/// Default search horizon for weather-gated scheduling
pub const DEFAULT_HORIZON_HOURS: u32 = 7 * 24;

/// Longest search horizon accepted for weather-gated scheduling
pub const MAX_HORIZON_HOURS: u32 = 31 * 24;

/// Longest single task the planner accepts
pub const MAX_TASK_DURATION_HOURS: f64 = 366.0 * 24.0;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlanPriority {
    Low,
    #[default]
    Medium,
    High,
    Urgent,
}

impl PlanPriority {
    /// Lenient parse used for model output; unknown labels become `Medium`
    pub fn from_label(label: &str) -> Self {
        match label.trim().to_lowercase().as_str() {
            "low" | "minor" => PlanPriority::Low,
            "high" | "important" => PlanPriority::High,
            "urgent" | "critical" => PlanPriority::Urgent,
            _ => PlanPriority::Medium,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlanStatus {
    #[default]
    Pending,
    InProgress,
    Completed,
    Cancelled,
}

/// Weather limits a task can be carried out in
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WeatherConstraints {
    /// km/h
    pub max_wind_speed: f64,
    /// mm
    pub max_precipitation: f64,
    /// °C
    pub min_temperature: f64,
    pub max_temperature: f64,
}

impl Default for WeatherConstraints {
    fn default() -> Self {
        Self {
            max_wind_speed: 30.0,
            max_precipitation: 5.0,
            min_temperature: 5.0,
            max_temperature: 35.0,
        }
    }
}

impl WeatherConstraints {
    pub fn permits(&self, sample: &WeatherSample) -> bool {
        sample.wind_speed <= self.max_wind_speed
            && sample.precipitation <= self.max_precipitation
            && sample.temperature >= self.min_temperature
            && sample.temperature <= self.max_temperature
    }
}

/// Weather at one instant
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeatherSample {
    pub at: DateTime<Utc>,
    /// °C
    pub temperature: f64,
    /// percent
    pub humidity: f64,
    /// km/h
    pub wind_speed: f64,
    /// mm over the sample window
    pub precipitation: f64,
    pub description: String,
}

impl WeatherSample {
    /// Conditions reported when the weather provider cannot be reached
    pub fn fallback(at: DateTime<Utc>) -> Self {
        Self {
            at,
            temperature: 25.0,
            humidity: 60.0,
            wind_speed: 10.0,
            precipitation: 0.0,
            description: "weather data unavailable".to_string(),
        }
    }
}

/// Whether a piece of equipment can be used in the given weather
pub fn equipment_can_operate(equipment: &str, sample: &WeatherSample) -> bool {
    if sample.precipitation > 5.0 || sample.wind_speed > 30.0 {
        return false;
    }
    if equipment.to_lowercase().contains("sprayer") && sample.wind_speed > 15.0 {
        return false;
    }
    true
}

/// Time-ordered weather samples
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Forecast {
    samples: Vec<WeatherSample>,
}

impl Forecast {
    pub fn new(mut samples: Vec<WeatherSample>) -> Self {
        samples.sort_by_key(|s| s.at);
        Self { samples }
    }

    pub fn samples(&self) -> &[WeatherSample] {
        &self.samples
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Latest sample not after `at`, or the first one when `at` precedes
    /// them all. An empty forecast yields [`WeatherSample::fallback`].
    pub fn sample_at(&self, at: DateTime<Utc>) -> WeatherSample {
        let idx = self.samples.partition_point(|s| s.at <= at);
        self.samples
            .get(idx.saturating_sub(1))
            .cloned()
            .unwrap_or_else(|| WeatherSample::fallback(at))
    }
}

fn shift(at: DateTime<Utc>, by: Duration) -> Result<DateTime<Utc>> {
    at.checked_add_signed(by).ok_or_else(|| {
        AgroError::Validation(format!("schedule extends past the supported date range from {at}"))
    })
}

/// Unit of planned work handled by [`TaskScheduler`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlannedTask {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub estimated_duration_hours: f64,
    #[serde(default)]
    pub priority: PlanPriority,
    #[serde(default)]
    pub status: PlanStatus,
    #[serde(default)]
    pub dependencies: Vec<String>,
    pub start: Option<DateTime<Utc>>,
    pub end: Option<DateTime<Utc>>,
    pub assigned_to: Option<String>,
    pub field_id: Option<i64>,
    pub weather_constraints: Option<WeatherConstraints>,
    #[serde(default)]
    pub equipment: Vec<String>,
}

impl PlannedTask {
    pub fn new(id: impl Into<String>, title: impl Into<String>, duration_hours: f64) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            description: String::new(),
            estimated_duration_hours: duration_hours,
            priority: PlanPriority::default(),
            status: PlanStatus::default(),
            dependencies: Vec::new(),
            start: None,
            end: None,
            assigned_to: None,
            field_id: None,
            weather_constraints: None,
            equipment: Vec::new(),
        }
    }

    pub fn with_priority(mut self, priority: PlanPriority) -> Self {
        self.priority = priority;
        self
    }

    pub fn with_dependencies<I, S>(mut self, dependencies: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.dependencies = dependencies.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_constraints(mut self, constraints: WeatherConstraints) -> Self {
        self.weather_constraints = Some(constraints);
        self
    }

    pub fn with_equipment<I, S>(mut self, equipment: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.equipment = equipment.into_iter().map(Into::into).collect();
        self
    }

    /// Estimated duration rounded to the minute
    pub fn duration(&self) -> Duration {
        Duration::minutes((self.estimated_duration_hours * 60.0).round() as i64)
    }

    pub fn is_scheduled(&self) -> bool {
        self.start.is_some() && self.end.is_some()
    }
}

/// Why a pending task received no slot
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum BlockReason {
    /// Dependencies that are neither completed nor schedulable
    UnmetDependencies { dependencies: Vec<String> },
    /// No acceptable weather window before the horizon
    NoWeatherWindow,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockedTask {
    pub id: String,
    #[serde(flatten)]
    pub reason: BlockReason,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScheduleOutcome {
    /// Ids in placement order
    pub scheduled: Vec<String>,
    pub blocked: Vec<BlockedTask>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskConflict {
    pub first: String,
    pub second: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GanttEntry {
    pub id: String,
    pub title: String,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    /// 100 when completed, 50 in progress, 0 otherwise
    pub progress: u8,
    pub dependencies: Vec<String>,
    pub priority: PlanPriority,
}

/// In-memory planner over a set of [`PlannedTask`]s
#[derive(Debug, Clone, Default)]
pub struct TaskScheduler {
    tasks: BTreeMap<String, PlannedTask>,
}

impl TaskScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a task
    ///
    /// # Returns
    /// * `Ok(())` - The task was added
    /// * `Err(AgroError::Validation)` - Blank id/title, a duration outside
    ///   `(0, MAX_TASK_DURATION_HOURS]` or a self-dependency
    /// * `Err(AgroError::Duplicate)` - A task with the same id exists
    pub fn add_task(&mut self, task: PlannedTask) -> Result<()> {
        if task.id.trim().is_empty() {
            return Err(AgroError::empty_field("id"));
        }
        if task.title.trim().is_empty() {
            return Err(AgroError::empty_field("title"));
        }
        if !task.estimated_duration_hours.is_finite() || task.estimated_duration_hours <= 0.0 {
            return Err(AgroError::Validation(format!(
                "planned task '{}' must have a positive duration",
                task.id
            )));
        }
        if task.estimated_duration_hours > MAX_TASK_DURATION_HOURS {
            return Err(AgroError::Validation(format!(
                "planned task '{}' cannot last longer than {MAX_TASK_DURATION_HOURS} hours",
                task.id
            )));
        }
        if task.dependencies.contains(&task.id) {
            return Err(AgroError::Validation(format!(
                "planned task '{}' cannot depend on itself",
                task.id
            )));
        }
        if self.tasks.contains_key(&task.id) {
            return Err(AgroError::Duplicate(format!(
                "planned task '{}' already exists",
                task.id
            )));
        }

        self.tasks.insert(task.id.clone(), task);
        Ok(())
    }

    pub fn get_task(&self, id: &str) -> Option<&PlannedTask> {
        self.tasks.get(id)
    }

    pub fn tasks(&self) -> impl Iterator<Item = &PlannedTask> {
        self.tasks.values()
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    /// Record progress on a task.
    ///
    /// `InProgress` stamps the actual start; `Completed` and `Cancelled`
    /// stamp the actual end.
    pub fn update_status(
        &mut self,
        id: &str,
        status: PlanStatus,
        now: DateTime<Utc>,
    ) -> Result<&PlannedTask> {
        let task = self
            .tasks
            .get_mut(id)
            .ok_or_else(|| AgroError::NotFound(format!("planned task '{id}' does not exist")))?;

        task.status = status;
        match status {
            PlanStatus::InProgress => {
                task.start = Some(now);
                task.end = None;
            }
            PlanStatus::Completed | PlanStatus::Cancelled => {
                if task.start.map_or(true, |start| start > now) {
                    task.start = Some(now);
                }
                task.end = Some(now);
            }
            PlanStatus::Pending => {}
        }

        Ok(task)
    }

    pub fn pending_tasks(&self) -> Vec<&PlannedTask> {
        self.tasks
            .values()
            .filter(|t| t.status == PlanStatus::Pending)
            .collect()
    }

    pub fn tasks_by_priority(&self, priority: PlanPriority) -> Vec<&PlannedTask> {
        self.tasks
            .values()
            .filter(|t| t.priority == priority)
            .collect()
    }

    /// Tasks whose slot overlaps `[from, to)`
    pub fn tasks_in_range(&self, from: DateTime<Utc>, to: DateTime<Utc>) -> Vec<&PlannedTask> {
        self.tasks
            .values()
            .filter(|t| match (t.start, t.end) {
                (Some(start), Some(end)) => start < to && end > from,
                _ => false,
            })
            .collect()
    }

    /// Check that every dependency exists and that there are no cycles
    pub fn validate_dependencies(&self) -> Result<()> {
        for task in self.tasks.values() {
            if let Some(missing) = task
                .dependencies
                .iter()
                .find(|dep| !self.tasks.contains_key(*dep))
            {
                return Err(AgroError::Validation(format!(
                    "planned task '{}' depends on unknown task '{missing}'",
                    task.id
                )));
            }
        }

        if let Some(cycle) = self.find_cycle() {
            return Err(AgroError::Validation(format!(
                "dependency cycle detected: {}",
                cycle.join(" -> ")
            )));
        }

        Ok(())
    }

    /// Lay out pending tasks back to back starting at `now`
    pub fn optimize_schedule(&mut self, now: DateTime<Utc>) -> Result<ScheduleOutcome> {
        self.plan(now, None)
    }

    /// Like [`optimize_schedule`](Self::optimize_schedule), but each task is
    /// delayed hour by hour until its whole window has acceptable weather.
    /// Tasks without such a window within `horizon_hours` of `now` are blocked.
    ///
    /// # Returns
    /// * `Err(AgroError::Validation)` - `horizon_hours` exceeds
    ///   `MAX_HORIZON_HOURS` or the horizon ends outside the time range
    pub fn schedule_with_weather(
        &mut self,
        forecast: &Forecast,
        now: DateTime<Utc>,
        horizon_hours: u32,
    ) -> Result<ScheduleOutcome> {
        if horizon_hours > MAX_HORIZON_HOURS {
            return Err(AgroError::Validation(format!(
                "planning horizon cannot exceed {MAX_HORIZON_HOURS} hours"
            )));
        }
        let horizon_end = shift(now, Duration::hours(i64::from(horizon_hours)))?;
        self.plan(now, Some((forecast, horizon_end)))
    }

    fn plan(
        &mut self,
        now: DateTime<Utc>,
        weather: Option<(&Forecast, DateTime<Utc>)>,
    ) -> Result<ScheduleOutcome> {
        let mut order: Vec<String> = self
            .tasks
            .values()
            .filter(|t| t.status == PlanStatus::Pending)
            .map(|t| t.id.clone())
            .collect();

        // Re-planning starts from a clean slate
        for id in &order {
            if let Some(task) = self.tasks.get_mut(id) {
                task.start = None;
                task.end = None;
            }
        }

        order.sort_by(|a, b| {
            let (ta, tb) = (&self.tasks[a], &self.tasks[b]);
            ta.dependencies
                .len()
                .cmp(&tb.dependencies.len())
                .then(tb.priority.cmp(&ta.priority))
                .then(a.cmp(b))
        });

        let mut placed: HashSet<String> = HashSet::new();
        let mut weather_blocked: HashSet<String> = HashSet::new();
        let mut outcome = ScheduleOutcome::default();
        let mut cursor = now;

        loop {
            let mut progressed = false;

            for id in &order {
                if placed.contains(id) || weather_blocked.contains(id) {
                    continue;
                }

                let task = &self.tasks[id];
                let ready = task
                    .dependencies
                    .iter()
                    .all(|dep| placed.contains(dep) || self.is_completed(dep));
                if !ready {
                    continue;
                }

                let start = match weather {
                    None => Some(cursor),
                    Some((forecast, horizon_end)) => {
                        Self::find_weather_window(task, forecast, cursor, horizon_end)?
                    }
                };

                let Some(start) = start else {
                    tracing::debug!(task = %id, "no weather window before horizon");
                    weather_blocked.insert(id.clone());
                    continue;
                };

                let end = shift(start, task.duration())?;
                if let Some(task) = self.tasks.get_mut(id) {
                    task.start = Some(start);
                    task.end = Some(end);
                }
                cursor = end;
                placed.insert(id.clone());
                outcome.scheduled.push(id.clone());
                progressed = true;
            }

            if !progressed {
                break;
            }
        }

        for id in &order {
            if placed.contains(id) {
                continue;
            }
            let reason = if weather_blocked.contains(id) {
                BlockReason::NoWeatherWindow
            } else {
                let dependencies = self.tasks[id]
                    .dependencies
                    .iter()
                    .filter(|dep| !placed.contains(*dep) && !self.is_completed(dep))
                    .cloned()
                    .collect();
                BlockReason::UnmetDependencies { dependencies }
            };
            outcome.blocked.push(BlockedTask {
                id: id.clone(),
                reason,
            });
        }

        tracing::debug!(
            scheduled = outcome.scheduled.len(),
            blocked = outcome.blocked.len(),
            "schedule computed"
        );

        Ok(outcome)
    }

    fn is_completed(&self, id: &str) -> bool {
        self.tasks
            .get(id)
            .is_some_and(|t| t.status == PlanStatus::Completed)
    }

    fn find_weather_window(
        task: &PlannedTask,
        forecast: &Forecast,
        earliest: DateTime<Utc>,
        horizon_end: DateTime<Utc>,
    ) -> Result<Option<DateTime<Utc>>> {
        let constraints = task.weather_constraints.unwrap_or_default();
        let mut start = earliest;

        while start <= horizon_end {
            if Self::window_is_workable(task, forecast, &constraints, start)? {
                return Ok(Some(start));
            }
            start = shift(start, Duration::hours(1))?;
        }

        Ok(None)
    }

    fn window_is_workable(
        task: &PlannedTask,
        forecast: &Forecast,
        constraints: &WeatherConstraints,
        start: DateTime<Utc>,
    ) -> Result<bool> {
        let end = shift(start, task.duration())?;
        let mut at = start;

        loop {
            let sample = forecast.sample_at(at);
            if !constraints.permits(&sample)
                || !task
                    .equipment
                    .iter()
                    .all(|equipment| equipment_can_operate(equipment, &sample))
            {
                return Ok(false);
            }

            at = shift(at, Duration::hours(1))?;
            if at >= end {
                return Ok(true);
            }
        }
    }

    /// Pairs of scheduled, non-cancelled tasks whose slots overlap
    pub fn conflicts(&self) -> Vec<TaskConflict> {
        let slots: Vec<(&String, DateTime<Utc>, DateTime<Utc>)> = self
            .tasks
            .values()
            .filter(|t| t.status != PlanStatus::Cancelled)
            .filter_map(|t| Some((&t.id, t.start?, t.end?)))
            .collect();

        let mut conflicts = Vec::new();
        for (i, (a, a_start, a_end)) in slots.iter().enumerate() {
            for (b, b_start, b_end) in &slots[i + 1..] {
                if a_start < b_end && b_start < a_end {
                    conflicts.push(TaskConflict {
                        first: (*a).clone(),
                        second: (*b).clone(),
                    });
                }
            }
        }
        conflicts
    }

    /// Longest chain of dependent tasks by total estimated duration,
    /// listed from the first task to the last. Cancelled tasks are ignored.
    pub fn critical_path(&self) -> Result<Vec<String>> {
        if let Some(cycle) = self.find_cycle() {
            return Err(AgroError::Validation(format!(
                "dependency cycle detected: {}",
                cycle.join(" -> ")
            )));
        }

        let mut memo: HashMap<String, (f64, Option<String>)> = HashMap::new();
        let mut best: Option<(&String, f64)> = None;

        for task in self.active_tasks() {
            let length = self.chain_length(&task.id, &mut memo);
            if best.map_or(true, |(_, longest)| length > longest) {
                best = Some((&task.id, length));
            }
        }

        let mut path = Vec::new();
        let mut current = best.map(|(id, _)| id.clone());
        while let Some(id) = current {
            current = memo.get(&id).and_then(|(_, prev)| prev.clone());
            path.push(id);
        }
        path.reverse();
        Ok(path)
    }

    fn active_tasks(&self) -> impl Iterator<Item = &PlannedTask> {
        self.tasks
            .values()
            .filter(|t| t.status != PlanStatus::Cancelled)
    }

    fn chain_length(&self, id: &str, memo: &mut HashMap<String, (f64, Option<String>)>) -> f64 {
        if let Some((length, _)) = memo.get(id) {
            return *length;
        }

        let Some(task) = self.tasks.get(id) else {
            return 0.0;
        };

        let mut longest_dep: (f64, Option<String>) = (0.0, None);
        for dep in &task.dependencies {
            let active = self
                .tasks
                .get(dep)
                .is_some_and(|t| t.status != PlanStatus::Cancelled);
            if !active {
                continue;
            }
            let length = self.chain_length(dep, memo);
            if length > longest_dep.0 {
                longest_dep = (length, Some(dep.clone()));
            }
        }

        let total = longest_dep.0 + task.estimated_duration_hours;
        memo.insert(id.to_string(), (total, longest_dep.1));
        total
    }

    /// Scheduled tasks as chart rows, ordered by start
    pub fn gantt(&self) -> Vec<GanttEntry> {
        let mut entries: Vec<GanttEntry> = self
            .tasks
            .values()
            .filter_map(|t| {
                Some(GanttEntry {
                    id: t.id.clone(),
                    title: t.title.clone(),
                    start: t.start?,
                    end: t.end?,
                    progress: match t.status {
                        PlanStatus::Completed => 100,
                        PlanStatus::InProgress => 50,
                        PlanStatus::Pending | PlanStatus::Cancelled => 0,
                    },
                    dependencies: t.dependencies.clone(),
                    priority: t.priority,
                })
            })
            .collect();
        entries.sort_by(|a, b| a.start.cmp(&b.start).then_with(|| a.id.cmp(&b.id)));
        entries
    }

    /// First dependency cycle found, as a closed list of ids
    fn find_cycle(&self) -> Option<Vec<String>> {
        #[derive(Clone, Copy, PartialEq)]
        enum Mark {
            Visiting,
            Done,
        }

        fn visit(
            scheduler: &TaskScheduler,
            id: &str,
            marks: &mut HashMap<String, Mark>,
            stack: &mut Vec<String>,
        ) -> Option<Vec<String>> {
            match marks.get(id) {
                Some(Mark::Done) => return None,
                Some(Mark::Visiting) => {
                    let from = stack.iter().position(|s| s == id).unwrap_or(0);
                    let mut cycle = stack[from..].to_vec();
                    cycle.push(id.to_string());
                    return Some(cycle);
                }
                None => {}
            }

            let task = scheduler.tasks.get(id)?;
            marks.insert(id.to_string(), Mark::Visiting);
            stack.push(id.to_string());
            for dep in &task.dependencies {
                if let Some(cycle) = visit(scheduler, dep, marks, stack) {
                    return Some(cycle);
                }
            }
            stack.pop();
            marks.insert(id.to_string(), Mark::Done);
            None
        }

        let mut marks = HashMap::new();
        for id in self.tasks.keys() {
            let mut stack = Vec::new();
            if let Some(cycle) = visit(self, id, &mut marks, &mut stack) {
                return Some(cycle);
            }
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 1, 6, 0, 0).unwrap()
    }

    fn sample(at: DateTime<Utc>, wind: f64, rain: f64, temp: f64) -> WeatherSample {
        WeatherSample {
            at,
            temperature: temp,
            humidity: 60.0,
            wind_speed: wind,
            precipitation: rain,
            description: "test".to_string(),
        }
    }

    #[test]
    fn test_add_task_validation() {
        let mut scheduler = TaskScheduler::new();
        assert!(scheduler.add_task(PlannedTask::new("a", "Plough", 2.0)).is_ok());
        assert!(matches!(
            scheduler.add_task(PlannedTask::new("a", "Plough again", 2.0)),
            Err(AgroError::Duplicate(_))
        ));
        assert!(scheduler.add_task(PlannedTask::new("b", "Sow", 0.0)).is_err());
        assert!(scheduler.add_task(PlannedTask::new("", "Sow", 1.0)).is_err());
        assert!(scheduler
            .add_task(PlannedTask::new("c", "Loop", 1.0).with_dependencies(["c"]))
            .is_err());
        assert!(matches!(
            scheduler.add_task(PlannedTask::new("d", "Forever", 1e12)),
            Err(AgroError::Validation(_))
        ));
        assert!(scheduler
            .add_task(PlannedTask::new("e", "Season", MAX_TASK_DURATION_HOURS))
            .is_ok());
        assert_eq!(scheduler.len(), 2);
    }

    #[test]
    fn test_optimize_orders_by_dependencies_then_priority() {
        let mut scheduler = TaskScheduler::new();
        scheduler
            .add_task(PlannedTask::new("sow", "Sow", 3.0).with_dependencies(["plough"]))
            .unwrap();
        scheduler
            .add_task(PlannedTask::new("plough", "Plough", 2.0).with_priority(PlanPriority::Low))
            .unwrap();
        scheduler
            .add_task(PlannedTask::new("fence", "Fence", 1.0).with_priority(PlanPriority::Urgent))
            .unwrap();

        let outcome = scheduler.optimize_schedule(t0()).unwrap();
        assert_eq!(outcome.scheduled, vec!["fence", "plough", "sow"]);
        assert!(outcome.blocked.is_empty());

        let fence = scheduler.get_task("fence").unwrap();
        assert_eq!(fence.start, Some(t0()));
        assert_eq!(fence.end, Some(t0() + Duration::hours(1)));
        let sow = scheduler.get_task("sow").unwrap();
        assert_eq!(sow.start, Some(t0() + Duration::hours(3)));
        assert!(scheduler.conflicts().is_empty());
    }

    #[test]
    fn test_dependency_with_more_deps_is_scheduled_after_its_prerequisite() {
        // "harvest" has 1 dependency on "weed", which has 2 dependencies
        let mut scheduler = TaskScheduler::new();
        scheduler.add_task(PlannedTask::new("plough", "Plough", 1.0)).unwrap();
        scheduler.add_task(PlannedTask::new("sow", "Sow", 1.0)).unwrap();
        scheduler
            .add_task(PlannedTask::new("weed", "Weed", 1.0).with_dependencies(["plough", "sow"]))
            .unwrap();
        scheduler
            .add_task(PlannedTask::new("harvest", "Harvest", 1.0).with_dependencies(["weed"]))
            .unwrap();

        let outcome = scheduler.optimize_schedule(t0()).unwrap();
        assert_eq!(outcome.scheduled.len(), 4);
        let weed_end = scheduler.get_task("weed").unwrap().end.unwrap();
        let harvest_start = scheduler.get_task("harvest").unwrap().start.unwrap();
        assert!(weed_end <= harvest_start);
    }

    #[test]
    fn test_cycles_and_unknown_dependencies_are_blocked() {
        let mut scheduler = TaskScheduler::new();
        scheduler
            .add_task(PlannedTask::new("a", "A", 1.0).with_dependencies(["b"]))
            .unwrap();
        scheduler
            .add_task(PlannedTask::new("b", "B", 1.0).with_dependencies(["a"]))
            .unwrap();
        scheduler
            .add_task(PlannedTask::new("c", "C", 1.0).with_dependencies(["ghost"]))
            .unwrap();
        scheduler.add_task(PlannedTask::new("d", "D", 1.0)).unwrap();

        assert!(scheduler.validate_dependencies().is_err());
        assert!(scheduler.critical_path().is_err());

        let outcome = scheduler.optimize_schedule(t0()).unwrap();
        assert_eq!(outcome.scheduled, vec!["d"]);
        assert_eq!(outcome.blocked.len(), 3);
        let ghost = outcome.blocked.iter().find(|b| b.id == "c").unwrap();
        assert_eq!(
            ghost.reason,
            BlockReason::UnmetDependencies {
                dependencies: vec!["ghost".to_string()]
            }
        );
    }

    #[test]
    fn test_completed_dependencies_are_satisfied() {
        let mut scheduler = TaskScheduler::new();
        scheduler.add_task(PlannedTask::new("plough", "Plough", 1.0)).unwrap();
        scheduler
            .add_task(PlannedTask::new("sow", "Sow", 1.0).with_dependencies(["plough"]))
            .unwrap();
        scheduler
            .update_status("plough", PlanStatus::Completed, t0())
            .unwrap();

        let outcome = scheduler.optimize_schedule(t0()).unwrap();
        assert_eq!(outcome.scheduled, vec!["sow"]);
        assert_eq!(scheduler.pending_tasks().len(), 1);
    }

    #[test]
    fn test_update_status_stamps_times() {
        let mut scheduler = TaskScheduler::new();
        scheduler.add_task(PlannedTask::new("a", "A", 1.0)).unwrap();

        let later = t0() + Duration::hours(5);
        let task = scheduler.update_status("a", PlanStatus::InProgress, t0()).unwrap();
        assert_eq!(task.start, Some(t0()));
        let task = scheduler.update_status("a", PlanStatus::Completed, later).unwrap();
        assert_eq!(task.start, Some(t0()));
        assert_eq!(task.end, Some(later));

        assert!(scheduler
            .update_status("missing", PlanStatus::Completed, later)
            .unwrap_err()
            .is_not_found());
    }

    #[test]
    fn test_weather_gating_skips_bad_hours() {
        let mut scheduler = TaskScheduler::new();
        scheduler
            .add_task(PlannedTask::new("spray", "Spray", 2.0).with_equipment(["Boom sprayer"]))
            .unwrap();

        // Windy for the first six hours, then calm
        let forecast = Forecast::new(vec![
            sample(t0(), 20.0, 0.0, 22.0),
            sample(t0() + Duration::hours(3), 18.0, 0.0, 22.0),
            sample(t0() + Duration::hours(6), 5.0, 0.0, 22.0),
            sample(t0() + Duration::hours(9), 5.0, 0.0, 22.0),
        ]);

        let outcome = scheduler.schedule_with_weather(&forecast, t0(), 48).unwrap();
        assert_eq!(outcome.scheduled, vec!["spray"]);
        assert_eq!(
            scheduler.get_task("spray").unwrap().start,
            Some(t0() + Duration::hours(6))
        );
    }

    #[test]
    fn test_weather_gating_is_bounded_by_horizon() {
        let mut scheduler = TaskScheduler::new();
        scheduler.add_task(PlannedTask::new("harvest", "Harvest", 1.0)).unwrap();

        let storm: Vec<WeatherSample> = (0..40)
            .map(|i| sample(t0() + Duration::hours(3 * i), 50.0, 20.0, 18.0))
            .collect();
        let outcome = scheduler
            .schedule_with_weather(&Forecast::new(storm), t0(), 24)
            .unwrap();

        assert!(outcome.scheduled.is_empty());
        assert_eq!(outcome.blocked[0].reason, BlockReason::NoWeatherWindow);
        assert!(!scheduler.get_task("harvest").unwrap().is_scheduled());
    }

    #[test]
    fn test_forecast_sample_lookup() {
        let forecast = Forecast::new(vec![
            sample(t0() + Duration::hours(3), 1.0, 0.0, 20.0),
            sample(t0(), 2.0, 0.0, 20.0),
        ]);
        assert_eq!(forecast.sample_at(t0()).wind_speed, 2.0);
        assert_eq!(forecast.sample_at(t0() + Duration::hours(4)).wind_speed, 1.0);
        // The last sample keeps applying once the forecast runs out
        assert_eq!(forecast.sample_at(t0() + Duration::hours(30)).wind_speed, 1.0);
        assert_eq!(forecast.sample_at(t0() - Duration::hours(1)).wind_speed, 2.0);

        let empty = Forecast::default().sample_at(t0());
        assert_eq!(empty, WeatherSample::fallback(t0()));
        assert_eq!(empty.temperature, 25.0);
        assert_eq!(empty.wind_speed, 10.0);
    }

    #[test]
    fn test_storm_at_end_of_forecast_keeps_blocking() {
        let mut scheduler = TaskScheduler::new();
        scheduler.add_task(PlannedTask::new("harvest", "Harvest", 1.0)).unwrap();

        let forecast = Forecast::new(vec![sample(t0(), 50.0, 20.0, 18.0)]);
        let outcome = scheduler.schedule_with_weather(&forecast, t0(), 72).unwrap();

        assert!(outcome.scheduled.is_empty());
        assert_eq!(outcome.blocked[0].reason, BlockReason::NoWeatherWindow);
    }

    #[test]
    fn test_oversized_horizon_is_rejected() {
        let mut scheduler = TaskScheduler::new();
        scheduler.add_task(PlannedTask::new("a", "A", 1.0)).unwrap();

        let result = scheduler.schedule_with_weather(&Forecast::default(), t0(), u32::MAX);
        assert!(matches!(result, Err(AgroError::Validation(_))));

        let at_limit = scheduler.schedule_with_weather(&Forecast::default(), t0(), MAX_HORIZON_HOURS);
        assert_eq!(at_limit.unwrap().scheduled, vec!["a"]);
    }

    #[test]
    fn test_start_near_end_of_time_is_rejected() {
        let mut scheduler = TaskScheduler::new();
        scheduler.add_task(PlannedTask::new("a", "A", 2.0)).unwrap();

        let near_end = DateTime::<Utc>::MAX_UTC - Duration::hours(1);
        assert!(matches!(
            scheduler.optimize_schedule(near_end),
            Err(AgroError::Validation(_))
        ));
        assert!(matches!(
            scheduler.schedule_with_weather(&Forecast::default(), near_end, 24),
            Err(AgroError::Validation(_))
        ));
    }

    #[test]
    fn test_equipment_can_operate() {
        let calm = sample(t0(), 10.0, 0.0, 20.0);
        let breezy = sample(t0(), 20.0, 0.0, 20.0);
        let wet = sample(t0(), 5.0, 8.0, 20.0);
        assert!(equipment_can_operate("tractor", &calm));
        assert!(equipment_can_operate("tractor", &breezy));
        assert!(!equipment_can_operate("Sprayer", &breezy));
        assert!(!equipment_can_operate("tractor", &wet));
    }

    #[test]
    fn test_critical_path_follows_longest_chain() {
        let mut scheduler = TaskScheduler::new();
        scheduler.add_task(PlannedTask::new("a", "A", 1.0)).unwrap();
        scheduler.add_task(PlannedTask::new("b", "B", 5.0)).unwrap();
        scheduler
            .add_task(PlannedTask::new("c", "C", 1.0).with_dependencies(["a", "b"]))
            .unwrap();
        scheduler
            .add_task(PlannedTask::new("d", "D", 2.0).with_dependencies(["a"]))
            .unwrap();

        assert_eq!(scheduler.critical_path().unwrap(), vec!["b", "c"]);
    }

    #[test]
    fn test_gantt_and_conflicts() {
        let mut scheduler = TaskScheduler::new();
        let mut a = PlannedTask::new("a", "A", 2.0);
        a.start = Some(t0());
        a.end = Some(t0() + Duration::hours(2));
        a.status = PlanStatus::InProgress;
        let mut b = PlannedTask::new("b", "B", 2.0);
        b.start = Some(t0() + Duration::hours(1));
        b.end = Some(t0() + Duration::hours(3));
        scheduler.add_task(a).unwrap();
        scheduler.add_task(b).unwrap();
        scheduler.add_task(PlannedTask::new("c", "C", 1.0)).unwrap();

        let conflicts = scheduler.conflicts();
        assert_eq!(
            conflicts,
            vec![TaskConflict {
                first: "a".to_string(),
                second: "b".to_string()
            }]
        );

        let gantt = scheduler.gantt();
        assert_eq!(gantt.len(), 2);
        assert_eq!(gantt[0].progress, 50);
        assert_eq!(gantt[1].progress, 0);

        let in_range = scheduler.tasks_in_range(t0() + Duration::hours(2), t0() + Duration::hours(4));
        assert_eq!(in_range.len(), 1);
        assert_eq!(in_range[0].id, "b");
    }

    #[test]
    fn test_priority_labels() {
        assert_eq!(PlanPriority::from_label("High"), PlanPriority::High);
        assert_eq!(PlanPriority::from_label("critical"), PlanPriority::Urgent);
        assert_eq!(PlanPriority::from_label("whatever"), PlanPriority::Medium);
        assert!(PlanPriority::Urgent > PlanPriority::Low);
    }
}
