use thiserror::Error;

use crate::amount::Amount;
use crate::models::TaskStatus;

/// Result type alias for marketplace operations
pub type Result<T> = std::result::Result<T, AgroError>;

/// Error types shared by every layer of the marketplace backend.
///
/// Each variant maps to an HTTP status code so the API layer can render
/// errors without inspecting their messages.
///
/// # Examples
///
/// ```rust
/// use agro_core::error::AgroError;
/// use agro_core::Amount;
///
/// let missing = AgroError::not_found("field", 42);
/// assert!(missing.is_not_found());
/// assert_eq!(missing.status_code(), 404);
///
/// let broke = AgroError::InsufficientAccessUnits {
///     required: Amount::from_units(10),
///     available: Amount::from_units(2),
/// };
/// assert_eq!(broke.status_code(), 403);
/// ```
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AgroError {
    /// Record missing or soft-deleted
    #[error("{0}")]
    NotFound(String),

    /// Input rejected by validation rules
    #[error("Validation error: {0}")]
    Validation(String),

    /// Uniqueness constraint violated
    #[error("{0}")]
    Duplicate(String),

    /// Balance lower than the cost of the requested operation
    #[error("insufficient AU, please charge your account")]
    InsufficientAccessUnits { required: Amount, available: Amount },

    /// Task status change not allowed by the lifecycle
    #[error("Invalid status transition from {0} to {1}")]
    InvalidStatusTransition(TaskStatus, TaskStatus),

    /// Missing or invalid credentials
    #[error("{0}")]
    Unauthorized(String),

    /// Authenticated caller may not act on the resource
    #[error("{0}")]
    Forbidden(String),

    /// Downstream HTTP service failed or answered garbage
    #[error("Upstream service error: {0}")]
    Upstream(String),

    /// Database operation error
    #[error("Database error: {0}")]
    Database(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Internal system error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl AgroError {
    /// Not found error for an entity id, e.g. "field with id 3 does not exist"
    pub fn not_found(entity: &str, id: i64) -> Self {
        Self::NotFound(format!("{entity} with id {id} does not exist"))
    }

    /// Validation error for a blank required field
    pub fn empty_field(field: &str) -> Self {
        Self::Validation(format!("Field '{field}' cannot be empty"))
    }

    /// Validation error for a string longer than its column allows
    pub fn too_long(field: &str, max: usize) -> Self {
        Self::Validation(format!("Field '{field}' must be at most {max} characters long"))
    }

    pub fn forbidden_not_owner(entity: &str) -> Self {
        Self::Forbidden(format!("You do not have permission to modify this {entity}"))
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, AgroError::NotFound(_))
    }

    pub fn is_validation(&self) -> bool {
        matches!(self, AgroError::Validation(_))
    }

    pub fn is_database(&self) -> bool {
        matches!(self, AgroError::Database(_))
    }

    /// Convert to appropriate HTTP status code equivalent
    pub fn status_code(&self) -> u16 {
        match self {
            AgroError::NotFound(_) => 404,
            AgroError::Validation(_) => 400,
            AgroError::Duplicate(_) => 409,
            AgroError::InsufficientAccessUnits { .. } => 403,
            AgroError::InvalidStatusTransition(_, _) => 422,
            AgroError::Unauthorized(_) => 401,
            AgroError::Forbidden(_) => 403,
            AgroError::Upstream(_) => 502,
            AgroError::Database(_) => 500,
            AgroError::Configuration(_) => 500,
            AgroError::Internal(_) => 500,
        }
    }
}
