//! Mapping from domain errors to HTTP responses.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use fedpharm_common::FedPharmError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error(transparent)]
    Domain(#[from] FedPharmError),
    #[error("{0}")]
    BadRequest(String),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::Domain(e) if e.is_validation() => StatusCode::UNPROCESSABLE_ENTITY,
            Self::Domain(FedPharmError::InvalidTransition(_) | FedPharmError::NotReady) => StatusCode::CONFLICT,
            Self::Domain(FedPharmError::UnknownParticipant(_) | FedPharmError::UnknownCollaborator(_)) => {
                StatusCode::NOT_FOUND
            }
            Self::Domain(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(error = %self, "Request failed");
        }
        (status, Json(serde_json::json!({ "error": self.to_string() }))).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        let cases = [
            (ApiError::from(FedPharmError::MissingArtifact), StatusCode::UNPROCESSABLE_ENTITY),
            (ApiError::from(FedPharmError::NotReady), StatusCode::CONFLICT),
            (ApiError::from(FedPharmError::InvalidTransition("x".into())), StatusCode::CONFLICT),
            (ApiError::from(FedPharmError::UnknownParticipant("clinic".into())), StatusCode::NOT_FOUND),
            (ApiError::from(FedPharmError::Remote("down".into())), StatusCode::INTERNAL_SERVER_ERROR),
            (ApiError::BadRequest("bad".into()), StatusCode::BAD_REQUEST),
        ];
        for (err, expected) in cases {
            assert_eq!(err.status(), expected, "{err}");
        }
    }
}
