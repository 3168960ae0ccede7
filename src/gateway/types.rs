//! Request/response DTOs and error mapping for the gateway.

use axum::{
    Json,
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};

use crate::error::{DatabaseError, GardenError, ValidationError};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}

impl ErrorResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            error: message.into(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
}

/// A garden failure rendered as `{"error": ...}` with a mapped status.
#[derive(Debug)]
pub struct ApiError(pub GardenError);

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match &self.0 {
            GardenError::NotInitialized { .. } => StatusCode::NOT_FOUND,
            GardenError::AlreadyExists { .. }
            | GardenError::Database(DatabaseError::Conflict { .. }) => StatusCode::CONFLICT,
            GardenError::Validation(_) => StatusCode::BAD_REQUEST,
            GardenError::Classifier(_) => StatusCode::BAD_GATEWAY,
            GardenError::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<GardenError> for ApiError {
    fn from(err: GardenError) -> Self {
        Self(err)
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        Self(GardenError::Validation(ValidationError::MalformedBody(
            rejection.body_text(),
        )))
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = match &self.0 {
            GardenError::Database(DatabaseError::Conflict { .. }) => {
                tracing::warn!(error = %self.0, "garden kept changing under the update");
                "Garden was modified concurrently, retry the update".to_string()
            }
            // Store details stay in the logs.
            GardenError::Database(err) => {
                tracing::error!(error = %err, "garden request failed on the database");
                "Internal database error".to_string()
            }
            GardenError::Classifier(err) => {
                tracing::warn!(error = %err, "garden request failed on the classifier");
                self.0.to_string()
            }
            _ => self.0.to_string(),
        };
        (status, Json(ErrorResponse::new(message))).into_response()
    }
}
