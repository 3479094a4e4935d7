//! Mock implementations and test utilities for the marketplace backend
//!
//! This crate provides comprehensive testing infrastructure including:
//! - An in-memory store implementing every repository trait
//! - A scripted language-model client
//! - A scripted weather provider
//! - Realistic test data generators
//! - Custom assertion helpers
//! - Contract test helpers shared with the SQLite store

pub mod assertions;
pub mod builders;
pub mod contracts;
pub mod fixtures;
pub mod generators;
pub mod llm;
pub mod repository;
pub mod weather;

pub use assertions::*;
pub use builders::*;
pub use contracts::*;
pub use fixtures::*;
pub use generators::*;
pub use llm::MockLlmClient;
pub use repository::MockAgroStore;
pub use weather::{MockWeatherProvider, WeatherLookup};
