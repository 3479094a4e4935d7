//! Agro Core Library
//!
//! This crate provides the domain models, business rules and trait interfaces
//! for the agricultural marketplace backend. All other crates depend on the
//! types and interfaces defined here.
//!
//! # Architecture
//!
//! - [`models`] - Users, fields, tasks, products and their choice enums
//! - [`amount`] - Fixed-point decimal used for balances and prices
//! - [`error`] - Error types and result handling
//! - [`validation`] - Input validation rules
//! - [`access_units`] - Access-unit pricing for product listings
//! - [`repository`] - Persistence traits implemented by the database and mock crates
//! - [`scheduler`] - Dependency-aware, weather-gated work planner
//!
//! # Example
//!
//! ```rust
//! use agro_core::{AccessUnitPricing, Amount, MeasurementUnit};
//!
//! let pricing = AccessUnitPricing::default();
//! let cost = pricing
//!     .cost(MeasurementUnit::Tonne, Amount::from_units(2))
//!     .unwrap();
//! assert_eq!(cost, Amount::from_units(20));
//! ```

pub mod access_units;
pub mod amount;
pub mod error;
pub mod models;
pub mod repository;
pub mod scheduler;
pub mod validation;

pub use access_units::{ensure_affordable, AccessUnitPricing};
pub use amount::Amount;
pub use error::{AgroError, Result};
pub use models::{
    Field, FieldBrief, FieldProfile, FieldStatus, GroundType, GrowSpeed, MeasurementUnit,
    NewField, NewProduct, NewTask, NewUser, Page, Period, Product, ProductFilter, ProductListing,
    RequestOffset, Role, Task, TaskFrequency, TaskStatus, UpdateField, UpdateProduct, UpdateTask,
    UpdateUser, User, UserCredentials, NO_RECENT_TASK,
};
pub use repository::{
    AgroStore, FieldRepository, HealthCheck, OffsetRepository, ProductRepository,
    TaskRepository, TokenRepository, UserRepository,
};
pub use scheduler::{
    equipment_can_operate, BlockReason, BlockedTask, Forecast, GanttEntry, PlanPriority,
    PlanStatus, PlannedTask, ScheduleOutcome, TaskConflict, TaskScheduler, WeatherConstraints,
    WeatherSample, DEFAULT_HORIZON_HOURS, MAX_HORIZON_HOURS, MAX_TASK_DURATION_HOURS,
};
pub use validation::Validator;
