//! HTTP JSON API for the agricultural marketplace
//!
//! Wraps the repository traits from `agro-core` and the outbound clients from
//! `agro-advisor` in an axum router. Every response uses the same envelope:
//!
//! ```json
//! { "success": true, "response_code": 200, "response_data": {}, "response_message": "..." }
//! ```
//!
//! # Usage
//!
//! ```no_run
//! use agro_api::{serve, AppState};
//! use std::sync::Arc;
//!
//! async fn start(store: Arc<dyn agro_core::AgroStore>) -> std::io::Result<()> {
//!     let listener = tokio::net::TcpListener::bind("127.0.0.1:8000").await?;
//!     serve(listener, AppState::new(store), async {
//!         let _ = tokio::signal::ctrl_c().await;
//!     })
//!     .await
//! }
//! ```

pub mod auth;
pub mod error;
pub mod extract;
pub mod request_logger;
pub mod routes;
pub mod server;
pub mod state;

pub use auth::AuthUser;
pub use error::{ApiError, ApiResponse, ApiResult, Envelope};
pub use server::{router, serve};
pub use state::AppState;
