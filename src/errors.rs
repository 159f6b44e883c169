//! Service error type and its JSON rendering.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use chrono::{DateTime, Utc};
use sea_orm::error::DbErr;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Body of every non-2xx response
#[derive(Debug, Serialize, Deserialize, ToSchema)]
#[schema(example = json!({
    "error": "not_found",
    "message": "Not found: Meal not found: 550e8400-e29b-41d4-a716-446655440000",
    "retryable": false,
    "request_id": "3f0c9a8e-2b7d-4c55-9d0e-0a4f1e6b7c21",
    "timestamp": "2026-03-02T09:15:00Z"
}))]
pub struct ErrorResponse {
    /// Stable machine-readable kind, e.g. `validation_error`
    pub error: String,
    pub message: String,
    /// The same request may succeed later without changes
    pub retryable: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    #[error("Database error: {0}")]
    DatabaseError(#[from] DbErr),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Validation error: {0}")]
    ValidationError(String),

    /// Inbound gateway notification failed signature verification.
    #[error("Authenticity error: {0}")]
    AuthenticityError(String),

    /// Transient failure reaching the payment gateway. Order state is untouched.
    #[error("Payment gateway unavailable: {0}")]
    GatewayUnavailable(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    /// The gateway answered with something we could not interpret.
    #[error("External service error: {0}")]
    ExternalServiceError(String),

    #[error("Internal error: {0}")]
    InternalError(String),
}

impl From<validator::ValidationErrors> for ServiceError {
    fn from(err: validator::ValidationErrors) -> Self {
        Self::ValidationError(err.to_string())
    }
}

impl ServiceError {
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::GatewayUnavailable(_))
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Self::DatabaseError(_) => "database_error",
            Self::NotFound(_) => "not_found",
            Self::ValidationError(_) => "validation_error",
            Self::AuthenticityError(_) => "authenticity_error",
            Self::GatewayUnavailable(_) => "gateway_unavailable",
            Self::Conflict(_) => "conflict",
            Self::ExternalServiceError(_) => "gateway_error",
            Self::InternalError(_) => "internal_error",
        }
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::ValidationError(_) => StatusCode::BAD_REQUEST,
            Self::AuthenticityError(_) => StatusCode::UNAUTHORIZED,
            Self::Conflict(_) => StatusCode::CONFLICT,
            Self::GatewayUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            Self::ExternalServiceError(_) => StatusCode::BAD_GATEWAY,
            Self::DatabaseError(_) | Self::InternalError(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Client-facing message. Storage, internal and signature details stay in the logs.
    pub fn response_message(&self) -> String {
        match self {
            Self::DatabaseError(_) => "Database error".to_string(),
            Self::InternalError(_) => "Internal server error".to_string(),
            Self::ExternalServiceError(_) => "Payment gateway error".to_string(),
            Self::AuthenticityError(_) => "Invalid notification signature".to_string(),
            _ => self.to_string(),
        }
    }
}

impl IntoResponse for ServiceError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::error!(error = %self, kind = self.kind(), "request failed");
        } else {
            tracing::debug!(error = %self, kind = self.kind(), "request rejected");
        }

        let body = ErrorResponse {
            error: self.kind().to_string(),
            message: self.response_message(),
            retryable: self.is_retryable(),
            request_id: crate::tracing::current_request_id().map(|rid| rid.to_string()),
            timestamp: Utc::now(),
        };
        (status, Json(body)).into_response()
    }
}
