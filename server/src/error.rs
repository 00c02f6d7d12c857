//! Request-level errors and their HTTP mapping.
//!
//! Every variant except `Unauthenticated` is answered with
//! `{"error": "<message>"}`. `Unauthenticated` is a redirect to the login
//! page, never a JSON error.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

use crate::handlers::auth::login_url;
use crate::identity::IdentityError;
use crate::negotiate::found;
use crate::store::StoreError;

#[derive(Debug, Error)]
pub enum AppError {
    /// Structured body that does not parse.
    #[error("Invalid JSON")]
    MalformedInput,

    #[error("{0}")]
    Validation(&'static str),

    #[error("Todo not found")]
    NotFound,

    #[error("Method not allowed")]
    MethodNotAllowed,

    /// No session; carries the path to come back to after logging in.
    #[error("authentication required")]
    Unauthenticated { next: String },

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Identity(#[from] IdentityError),
}

impl AppError {
    pub fn status(&self) -> StatusCode {
        match self {
            AppError::MalformedInput | AppError::Validation(_) => StatusCode::BAD_REQUEST,
            AppError::Store(StoreError::InvalidValue { .. }) => StatusCode::BAD_REQUEST,
            AppError::NotFound => StatusCode::NOT_FOUND,
            AppError::MethodNotAllowed => StatusCode::METHOD_NOT_ALLOWED,
            AppError::Unauthenticated { .. } => StatusCode::FOUND,
            AppError::Store(StoreError::Backend(_)) | AppError::Identity(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        if let AppError::Unauthenticated { next } = &self {
            return found(&login_url(next));
        }

        let status = self.status();
        let message = if status.is_server_error() {
            tracing::error!(error = %self, "request failed");
            "Internal server error".to_string()
        } else {
            self.to_string()
        };
        (status, Json(json!({ "error": message }))).into_response()
    }
}
