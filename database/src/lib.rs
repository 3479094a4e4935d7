//! Database crate for the agricultural marketplace
//!
//! This crate provides the SQLite implementation of every repository trait
//! declared in `agro-core`, with connection pooling, embedded migrations and
//! error mapping onto [`AgroError`].
//!
//! # Features
//!
//! - SQLite database support with WAL mode for file databases
//! - Soft delete on every entity, filtered out of all reads
//! - Listing a product and debiting its access-unit cost in one transaction
//! - In-memory databases for tests
//!
//! # Usage
//!
//! ```rust,no_run
//! use database::SqliteRepository;
//! use agro_core::repository::HealthCheck;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // Create repository (in-memory for testing)
//!     let repo = SqliteRepository::new(":memory:").await?;
//!
//!     // Run migrations
//!     repo.migrate().await?;
//!
//!     repo.health_check().await?;
//!     println!("Database is healthy!");
//!
//!     Ok(())
//! }
//! ```

mod common;
mod sqlite;

pub use sqlite::SqliteRepository;

// Re-export commonly used types from agro-core for convenience
pub use agro_core::{
    error::{AgroError, Result},
    repository::{
        AgroStore, FieldRepository, HealthCheck, OffsetRepository, ProductRepository,
        TaskRepository, TokenRepository, UserRepository,
    },
};
