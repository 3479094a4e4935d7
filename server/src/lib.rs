//! agroflex server library
//!
//! Configuration loading, telemetry and application wiring for the `agroflex`
//! binary, exposed as a library so the startup path can be tested.

pub mod config;
pub mod setup;
pub mod telemetry;

pub use config::Config;
pub use setup::{build_state, create_repository, ensure_database_directory};
pub use telemetry::init_telemetry;
