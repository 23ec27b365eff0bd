//! Mapping engine errors onto the HTTP error surface.

use reqwest::StatusCode;
use service_core::error::AppError;

use crate::services::backend::BackendError;
use crate::services::reconciliation::FlowError;

impl From<BackendError> for AppError {
    fn from(err: BackendError) -> Self {
        match &err {
            BackendError::Transport { .. } => AppError::ServiceUnavailable(err.user_message()),
            BackendError::Status { status, .. } if *status == StatusCode::NOT_FOUND => {
                AppError::NotFound(anyhow::anyhow!(err.user_message()))
            }
            BackendError::Status { status, .. } if status.is_client_error() => {
                AppError::Unprocessable(err.user_message())
            }
            BackendError::Status { .. }
            | BackendError::Decode { .. }
            | BackendError::InvalidPayload { .. } => AppError::BadGateway(err.user_message()),
        }
    }
}

impl From<FlowError> for AppError {
    fn from(err: FlowError) -> Self {
        match err {
            FlowError::NotCapturing => AppError::Conflict(anyhow::anyhow!(err.to_string())),
            FlowError::Capture(e) => AppError::Unprocessable(e.to_string()),
            FlowError::Backend(e) => AppError::from(e),
            FlowError::Interrupted(e) => AppError::InternalError(anyhow::anyhow!(e.to_string())),
        }
    }
}
