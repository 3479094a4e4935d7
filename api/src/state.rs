//! Shared handler state

use agro_advisor::{LlmClient, PlanningAgent, PlantDatabaseClient, WeatherProvider};
use agro_core::{AccessUnitPricing, AgroError, AgroStore};
use std::sync::Arc;

/// Dependencies handed to every handler
///
/// Outbound integrations are optional; endpoints that need a missing one
/// answer with an upstream error.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn AgroStore>,
    pub pricing: AccessUnitPricing,
    pub planner: Option<Arc<PlanningAgent>>,
    pub weather: Option<Arc<dyn WeatherProvider>>,
    pub plants: Option<Arc<PlantDatabaseClient>>,
}

impl AppState {
    pub fn new(store: Arc<dyn AgroStore>) -> Self {
        Self {
            store,
            pricing: AccessUnitPricing::default(),
            planner: None,
            weather: None,
            plants: None,
        }
    }

    pub fn with_pricing(mut self, pricing: AccessUnitPricing) -> Self {
        self.pricing = pricing;
        self
    }

    pub fn with_llm(mut self, llm: Arc<dyn LlmClient>) -> Self {
        self.planner = Some(Arc::new(PlanningAgent::new(llm)));
        self
    }

    pub fn with_weather(mut self, weather: Arc<dyn WeatherProvider>) -> Self {
        self.weather = Some(weather);
        self
    }

    pub fn with_plants(mut self, plants: Arc<PlantDatabaseClient>) -> Self {
        self.plants = Some(plants);
        self
    }

    pub fn planner(&self) -> Result<&PlanningAgent, AgroError> {
        self.planner
            .as_deref()
            .ok_or_else(|| AgroError::Upstream("task generation is not configured".to_string()))
    }

    pub fn weather(&self) -> Result<&dyn WeatherProvider, AgroError> {
        self.weather
            .as_deref()
            .ok_or_else(|| AgroError::Upstream("weather service is not configured".to_string()))
    }

    pub fn plants(&self) -> Result<&PlantDatabaseClient, AgroError> {
        self.plants
            .as_deref()
            .ok_or_else(|| AgroError::Upstream("plant database is not configured".to_string()))
    }
}
