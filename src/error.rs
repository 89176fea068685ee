//! Error type shared by the store operations and the HTTP handlers.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;

use crate::auth::AuthError;
use crate::config::ConfigError;
use crate::mailer::MailError;

#[derive(Debug, thiserror::Error)]
pub enum AppError {
  #[error("Database error: {0}")]
  Database(#[from] sqlx::Error),

  #[error("Migration error: {0}")]
  Migration(#[from] sqlx::migrate::MigrateError),

  #[error("{entity} not found: {id}")]
  NotFound { entity: &'static str, id: String },

  /// Rejected before any query is issued
  #[error("Validation failed: {0}")]
  Validation(String),

  #[error(transparent)]
  Auth(#[from] AuthError),

  #[error("Mail error: {0}")]
  Mail(#[from] MailError),

  #[error("Configuration error: {0}")]
  Config(#[from] ConfigError),

  #[error("Internal error: {0}")]
  Internal(String),
}

impl AppError {
  pub fn not_found(entity: &'static str, id: impl ToString) -> Self {
    Self::NotFound {
      entity,
      id: id.to_string(),
    }
  }

  pub fn validation(message: impl Into<String>) -> Self {
    Self::Validation(message.into())
  }

  pub fn status_code(&self) -> StatusCode {
    match self {
      Self::NotFound { .. } => StatusCode::NOT_FOUND,
      Self::Validation(_) => StatusCode::BAD_REQUEST,
      Self::Auth(err) => err.status_code(),
      Self::Database(_)
      | Self::Migration(_)
      | Self::Mail(_)
      | Self::Config(_)
      | Self::Internal(_) => {
        StatusCode::INTERNAL_SERVER_ERROR
      }
    }
  }

  /// Message shown to the user. Auth errors are localized.
  pub fn user_message(&self) -> String {
    match self {
      Self::Auth(err) => crate::auth::localize_auth_message(&err.to_string()),
      other => other.to_string(),
    }
  }
}

impl IntoResponse for AppError {
  fn into_response(self) -> Response {
    let status = self.status_code();
    if status.is_server_error() {
      tracing::error!(error = %self, "Request failed");
    } else {
      tracing::debug!(error = %self, status = %status, "Request rejected");
    }

    let body = serde_json::json!({
      "error": self.user_message()
    });

    (status, Json(body)).into_response()
  }
}

pub type AppResult<T> = std::result::Result<T, AppError>;

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_status_codes() {
    assert_eq!(
      AppError::not_found("Diet", 4).status_code(),
      StatusCode::NOT_FOUND
    );
    assert_eq!(
      AppError::validation("name is required").status_code(),
      StatusCode::BAD_REQUEST
    );
    assert_eq!(
      AppError::from(AuthError::InvalidCredentials).status_code(),
      StatusCode::UNAUTHORIZED
    );
    assert_eq!(
      AppError::Internal("boom".into()).status_code(),
      StatusCode::INTERNAL_SERVER_ERROR
    );
  }

  #[test]
  fn test_not_found_message() {
    let err = AppError::not_found("TrainingPlan", 12);
    assert_eq!(err.to_string(), "TrainingPlan not found: 12");
    assert_eq!(err.user_message(), "TrainingPlan not found: 12");
  }

  #[test]
  fn test_auth_errors_are_localized() {
    let err = AppError::from(AuthError::InvalidCredentials);
    assert_eq!(err.user_message(), "Email ou senha incorretos");
  }
}
