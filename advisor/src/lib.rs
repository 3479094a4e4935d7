//! Outbound integrations for the agricultural marketplace
//!
//! - [`llm`] - Language-model trait and the Gemini `generateContent` client
//! - [`json_recovery`] - Lenient extraction of JSON objects from model output
//! - [`planning`] - Field task suggestions turned into schedulable work
//! - [`weather`] - OpenWeatherMap client and growing-condition analysis
//! - [`plants`] - Perenual plant database proxy with API-key rotation
//!
//! Every client degrades instead of failing where a sensible default exists:
//! weather lookups fall back to neutral samples and task generation falls
//! back to an empty list.

pub mod json_recovery;
pub mod llm;
pub mod planning;
pub mod plants;
pub mod weather;

pub use json_recovery::extract_json_object;
pub use llm::{GeminiClient, GenerationSettings, LlmClient};
pub use planning::{parse_suggestions, to_planned_tasks, PlanningAgent, SuggestedTask};
pub use plants::{PlantDatabaseClient, PlantEndpoint};
pub use weather::{
    analyze_growing_conditions, fallback_forecast, GrowingConditions, WeatherClient,
    WeatherProvider,
};
