use std::collections::BTreeMap;

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use serde_json::json;
use thiserror::Error;
use tracing::error;

/// Field-level validation messages keyed by input field name.
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct ValidationErrors(BTreeMap<String, Vec<String>>);

impl ValidationErrors {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn single(field: &str, message: impl Into<String>) -> Self {
        let mut errors = Self::new();
        errors.add(field, message);
        errors
    }

    pub fn add(&mut self, field: &str, message: impl Into<String>) {
        self.0
            .entry(field.to_string())
            .or_default()
            .push(message.into());
    }

    pub fn merge(&mut self, other: ValidationErrors) {
        for (field, messages) in other.0 {
            self.0.entry(field).or_default().extend(messages);
        }
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    #[cfg(test)]
    pub fn has(&self, field: &str) -> bool {
        self.0.contains_key(field)
    }

    pub fn first_message(&self) -> Option<&str> {
        self.0
            .values()
            .flat_map(|messages| messages.iter())
            .map(String::as_str)
            .next()
    }

    /// `Ok(())` when nothing was recorded, otherwise a validation error.
    pub fn into_result(self) -> AppResult<()> {
        if self.is_empty() {
            Ok(())
        } else {
            Err(AppError::Validation(self))
        }
    }
}

#[derive(Debug, Error)]
pub enum AppError {
    #[error("validation failed")]
    Validation(ValidationErrors),

    #[error("{message}")]
    Conflict {
        field: &'static str,
        message: String,
    },

    #[error("invalid credentials")]
    InvalidCredentials,

    #[error("unauthenticated")]
    Unauthenticated,

    #[error("resource not found")]
    NotFound,

    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

pub type AppResult<T> = Result<T, AppError>;

impl AppError {
    pub fn status(&self) -> StatusCode {
        match self {
            AppError::Validation(_) | AppError::Conflict { .. } | AppError::InvalidCredentials => {
                StatusCode::UNPROCESSABLE_ENTITY
            }
            AppError::Unauthenticated => StatusCode::UNAUTHORIZED,
            AppError::NotFound => StatusCode::NOT_FOUND,
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Conflicts and bad credentials are reported against a field, the same
    /// way a failed validation rule is.
    fn field_errors(&self) -> Option<ValidationErrors> {
        match self {
            AppError::Validation(errors) => Some(errors.clone()),
            AppError::Conflict { field, message } => {
                Some(ValidationErrors::single(field, message.clone()))
            }
            AppError::InvalidCredentials => Some(ValidationErrors::single(
                "email",
                "The provided credentials are incorrect.",
            )),
            _ => None,
        }
    }
}

impl From<sqlx::Error> for AppError {
    fn from(e: sqlx::Error) -> Self {
        AppError::Internal(anyhow::Error::new(e))
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();

        let body = if let Some(errors) = self.field_errors() {
            let message = errors
                .first_message()
                .unwrap_or("The given data was invalid.")
                .to_string();
            json!({ "message": message, "errors": errors })
        } else {
            let message = match &self {
                AppError::Unauthenticated => "Unauthenticated.",
                AppError::NotFound => "Resource not found.",
                AppError::Internal(e) => {
                    error!(error = ?e, "internal error");
                    "Server Error"
                }
                _ => "Request failed.",
            };
            json!({ "message": message })
        };

        (status, Json(body)).into_response()
    }
}
