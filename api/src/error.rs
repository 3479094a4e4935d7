//! Response envelope and error mapping
//!
//! Every answer, successful or not, has the same shape:
//! `{ success, response_code, response_data, response_message }`.
//! Errors carry `response_data: null`.

use agro_core::AgroError;
use axum::{
    extract::rejection::{JsonRejection, PathRejection, QueryRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use serde_json::Value;

/// JSON body shared by every endpoint
#[derive(Debug, Serialize)]
pub struct Envelope<T> {
    pub success: bool,
    pub response_code: u16,
    pub response_data: T,
    pub response_message: String,
}

/// Successful handler output
#[derive(Debug)]
pub struct ApiResponse<T> {
    status: StatusCode,
    data: T,
    message: String,
}

impl<T: Serialize> ApiResponse<T> {
    pub fn ok(data: T, message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::OK,
            data,
            message: message.into(),
        }
    }

    pub fn created(data: T, message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::CREATED,
            data,
            message: message.into(),
        }
    }
}

impl<T: Serialize> IntoResponse for ApiResponse<T> {
    fn into_response(self) -> Response {
        let body = Envelope {
            success: true,
            response_code: self.status.as_u16(),
            response_data: self.data,
            response_message: self.message,
        };
        (self.status, Json(body)).into_response()
    }
}

/// Error returned by handlers, rendered as an envelope
#[derive(Debug)]
pub struct ApiError(pub AgroError);

pub type ApiResult<T> = std::result::Result<ApiResponse<T>, ApiError>;

impl ApiError {
    pub fn status(&self) -> StatusCode {
        StatusCode::from_u16(self.0.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
    }

    /// Message shown to clients; internal details stay in the logs
    fn public_message(&self) -> String {
        match &self.0 {
            AgroError::Database(_) | AgroError::Configuration(_) | AgroError::Internal(_) => {
                "internal server error".to_string()
            }
            other => other.to_string(),
        }
    }
}

impl From<AgroError> for ApiError {
    fn from(err: AgroError) -> Self {
        Self(err)
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        Self(AgroError::Validation(rejection.body_text()))
    }
}

impl From<PathRejection> for ApiError {
    fn from(rejection: PathRejection) -> Self {
        Self(AgroError::Validation(rejection.body_text()))
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        Self(AgroError::Validation(rejection.body_text()))
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(status = status.as_u16(), "Request failed: {}", self.0);
        } else {
            tracing::debug!(status = status.as_u16(), "Request rejected: {}", self.0);
        }

        let body = Envelope {
            success: false,
            response_code: status.as_u16(),
            response_data: Value::Null,
            response_message: self.public_message(),
        };
        (status, Json(body)).into_response()
    }
}

/// Envelope for failures that happen outside handlers, e.g. panics
pub fn error_envelope(status: StatusCode, message: &str) -> Response {
    let body = Envelope {
        success: false,
        response_code: status.as_u16(),
        response_data: Value::Null,
        response_message: message.to_string(),
    };
    (status, Json(body)).into_response()
}

#[cfg(test)]
mod tests {
    use super::*;
    use agro_core::Amount;
    use http_body_util::BodyExt;

    async fn body_json(response: Response) -> Value {
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_error_envelope_shape() {
        let response = ApiError(AgroError::not_found("field", 7)).into_response();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);

        let body = body_json(response).await;
        assert_eq!(body["success"], false);
        assert_eq!(body["response_code"], 404);
        assert_eq!(body["response_data"], Value::Null);
        assert_eq!(body["response_message"], "field with id 7 does not exist");
    }

    #[tokio::test]
    async fn test_insufficient_credit_message() {
        let response = ApiError(AgroError::InsufficientAccessUnits {
            required: Amount::from_units(5),
            available: Amount::ZERO,
        })
        .into_response();
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
        let body = body_json(response).await;
        assert_eq!(body["response_message"], "insufficient AU, please charge your account");
    }

    #[tokio::test]
    async fn test_internal_details_are_hidden() {
        let response = ApiError(AgroError::Database("disk I/O error".to_string())).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let body = body_json(response).await;
        assert_eq!(body["response_message"], "internal server error");
    }

    #[tokio::test]
    async fn test_success_envelope() {
        let response = ApiResponse::created(serde_json::json!({"id": 1}), "created").into_response();
        assert_eq!(response.status(), StatusCode::CREATED);
        let body = body_json(response).await;
        assert_eq!(body["success"], true);
        assert_eq!(body["response_code"], 201);
        assert_eq!(body["response_data"]["id"], 1);
    }
}
