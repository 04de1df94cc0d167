//! API error type: one place where domain errors become status codes.
//!
//! 400 invalid inputs / unknown names / malformed enums, 404 missing
//! entities, 501 unsupported capability, 500 everything upstream. Bodies are
//! `{error, message}` with a short machine-usable tag.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

use crate::data::DataError;
use crate::engine::EngineError;

#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub error: String,
    pub message: String,
}

#[derive(Serialize)]
struct ErrorBody<'a> {
    error: &'a str,
    message: &'a str,
}

impl ApiError {
    pub fn not_found(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::NOT_FOUND,
            error: "not_found".to_string(),
            message: message.into(),
        }
    }

    pub fn bad_request(error: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            error: error.into(),
            message: message.into(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (
            self.status,
            Json(ErrorBody {
                error: &self.error,
                message: &self.message,
            }),
        )
            .into_response()
    }
}

fn data_status(err: &DataError) -> StatusCode {
    match err {
        DataError::NotSupported { .. } => StatusCode::NOT_IMPLEMENTED,
        // Client went away; nginx's 499 is the closest thing to "no response"
        DataError::Cancelled => StatusCode::from_u16(499).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR),
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl From<DataError> for ApiError {
    fn from(err: DataError) -> Self {
        Self {
            status: data_status(&err),
            error: err.tag().to_string(),
            message: err.to_string(),
        }
    }
}

impl From<EngineError> for ApiError {
    fn from(err: EngineError) -> Self {
        match err {
            EngineError::InvalidInputs(_) | EngineError::UnknownName { .. } => Self {
                status: StatusCode::BAD_REQUEST,
                error: err.tag().to_string(),
                message: err.to_string(),
            },
            EngineError::Data(data_err) => data_err.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::Capability;

    #[test]
    fn not_supported_maps_to_501() {
        let err: ApiError = DataError::NotSupported {
            capability: Capability::IvAnalysis,
            provider: "mock",
        }
        .into();
        assert_eq!(err.status, StatusCode::NOT_IMPLEMENTED);
        assert_eq!(err.error, "not_supported");
    }

    #[test]
    fn unknown_name_maps_to_400_with_alternatives() {
        let err: ApiError =
            EngineError::unknown_name("reference table", "momentum", vec!["hedging".into()]).into();
        assert_eq!(err.status, StatusCode::BAD_REQUEST);
        assert!(err.message.contains("hedging"));
    }

    #[test]
    fn provider_failure_maps_to_500() {
        let err: ApiError = DataError::Transport("boom".into()).into();
        assert_eq!(err.status, StatusCode::INTERNAL_SERVER_ERROR);
    }
}
