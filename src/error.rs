use axum::{Json, http::StatusCode, response::IntoResponse};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use utoipa::ToSchema;
use validator::ValidationErrors;

use crate::{
    dao::storage::StorageError,
    state::{
        AbortError, ApplyError, PlanError, ledger::LedgerError, state_machine::TransitionError,
    },
};

/// Errors that can occur in service layer operations.
#[derive(Debug, Error)]
pub enum ServiceError {
    /// Storage backend is unavailable.
    #[error("storage unavailable")]
    Unavailable(#[source] StorageError),
    /// Application is running in degraded mode without storage.
    #[error("storage unavailable (degraded mode)")]
    Degraded,
    /// Operation exceeded its timeout limit.
    #[error("operation timed out")]
    Timeout,
    /// Invalid input provided by the client.
    #[error("invalid input: {0}")]
    InvalidInput(String),
    /// Operation cannot be performed in the current state.
    #[error("invalid state: {0}")]
    InvalidState(String),
    /// A player acted out of turn.
    #[error("not your turn: {0}")]
    NotYourTurn(String),
    /// Both seats of the room are taken.
    #[error("room is full: {0}")]
    AlreadyFull(String),
    /// Request contradicts the current room state.
    #[error("conflict: {0}")]
    Conflict(String),
    /// Requested resource was not found.
    #[error("not found: {0}")]
    NotFound(String),
}

impl From<StorageError> for ServiceError {
    fn from(err: StorageError) -> Self {
        ServiceError::Unavailable(err)
    }
}

impl From<ValidationErrors> for AppError {
    fn from(err: ValidationErrors) -> Self {
        AppError::BadRequest(format!("validation failed: {}", err))
    }
}

/// Application-level errors that are converted to HTTP responses.
#[derive(Debug, Error)]
pub enum AppError {
    /// Bad request with invalid input.
    #[error("bad request: {0}")]
    BadRequest(String),
    /// Requested resource not found.
    #[error("not found: {0}")]
    NotFound(String),
    /// Unauthorized access attempt.
    #[error("unauthorized: {0}")]
    Unauthorized(String),
    /// Action not allowed in the current room status.
    #[error("invalid state: {0}")]
    InvalidState(String),
    /// Someone else holds the turn.
    #[error("not your turn: {0}")]
    NotYourTurn(String),
    /// Room already has two players.
    #[error("room is full: {0}")]
    AlreadyFull(String),
    /// Conflict with current state.
    #[error("conflict: {0}")]
    Conflict(String),
    /// Service unavailable or degraded.
    #[error("service unavailable: {0}")]
    ServiceUnavailable(String),
}

impl AppError {
    /// Stable machine-readable code sent alongside the message.
    pub fn code(&self) -> &'static str {
        match self {
            AppError::BadRequest(_) => "validation_error",
            AppError::NotFound(_) => "not_found",
            AppError::Unauthorized(_) => "unauthorized",
            AppError::InvalidState(_) => "invalid_state",
            AppError::NotYourTurn(_) => "not_your_turn",
            AppError::AlreadyFull(_) => "already_full",
            AppError::Conflict(_) => "conflict",
            AppError::ServiceUnavailable(_) => "transient_collaborator_failure",
        }
    }

    fn status(&self) -> StatusCode {
        match self {
            AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            AppError::InvalidState(_)
            | AppError::NotYourTurn(_)
            | AppError::AlreadyFull(_)
            | AppError::Conflict(_) => StatusCode::CONFLICT,
            AppError::ServiceUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
        }
    }
}

impl From<ServiceError> for AppError {
    fn from(err: ServiceError) -> Self {
        match err {
            ServiceError::Unavailable(source) => AppError::ServiceUnavailable(source.to_string()),
            ServiceError::Degraded => AppError::ServiceUnavailable("degraded mode".into()),
            ServiceError::Timeout => AppError::ServiceUnavailable("operation timed out".into()),
            ServiceError::InvalidInput(message) => AppError::BadRequest(message),
            ServiceError::InvalidState(message) => AppError::InvalidState(message),
            ServiceError::NotYourTurn(message) => AppError::NotYourTurn(message),
            ServiceError::AlreadyFull(message) => AppError::AlreadyFull(message),
            ServiceError::Conflict(message) => AppError::Conflict(message),
            ServiceError::NotFound(message) => AppError::NotFound(message),
        }
    }
}

/// Error payload returned by every failing route.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ErrorBody {
    /// One of `not_found`, `invalid_state`, `not_your_turn`, `validation_error`,
    /// `already_full`, `conflict`, `unauthorized`, `transient_collaborator_failure`.
    pub code: String,
    /// Human readable description.
    pub message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> axum::response::Response {
        let payload = Json(ErrorBody {
            code: self.code().to_string(),
            message: self.to_string(),
        });

        (self.status(), payload).into_response()
    }
}

impl From<TransitionError> for ServiceError {
    fn from(err: TransitionError) -> Self {
        let message = err.to_string();
        match err {
            TransitionError::InvalidState { .. } => ServiceError::InvalidState(message),
            TransitionError::AlreadyFull => ServiceError::AlreadyFull(message),
            TransitionError::Conflict(_) => ServiceError::Conflict(message),
            TransitionError::NotYourTurn { .. } => ServiceError::NotYourTurn(message),
            TransitionError::EmptyArgument | TransitionError::ArgumentTooLong { .. } => {
                ServiceError::InvalidInput(message)
            }
            TransitionError::NotParticipant(_) => ServiceError::NotFound(message),
            TransitionError::Ledger(LedgerError::UnknownArgument(_)) => {
                ServiceError::NotFound(message)
            }
            TransitionError::Ledger(LedgerError::AlreadyEvaluated(_)) => {
                ServiceError::Conflict(message)
            }
        }
    }
}

impl From<PlanError> for ServiceError {
    fn from(err: PlanError) -> Self {
        match err {
            PlanError::AlreadyPending => {
                ServiceError::InvalidState("state transition already pending".into())
            }
            PlanError::Rejected(rejected) => rejected.into(),
        }
    }
}

impl From<ApplyError> for ServiceError {
    fn from(err: ApplyError) -> Self {
        match err {
            ApplyError::NoPending => ServiceError::InvalidState("no transition is pending".into()),
            ApplyError::IdMismatch { .. } => {
                ServiceError::InvalidState("pending transition does not match".into())
            }
            ApplyError::StatusMismatch { expected, actual } => ServiceError::InvalidState(format!(
                "room changed during transition (expected {expected:?}, got {actual:?})"
            )),
            ApplyError::VersionMismatch { expected, actual } => {
                ServiceError::InvalidState(format!(
                    "room version mismatch during transition (expected {expected}, got {actual})"
                ))
            }
        }
    }
}

impl From<AbortError> for ServiceError {
    fn from(err: AbortError) -> Self {
        match err {
            AbortError::NoPending => ServiceError::InvalidState("no pending transition".into()),
            AbortError::IdMismatch { .. } => {
                ServiceError::InvalidState("transition plan does not match".into())
            }
        }
    }
}
