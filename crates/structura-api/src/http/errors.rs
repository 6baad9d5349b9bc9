//! RFC 9457-style API error wrapper and job error mapping.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use structura_core::{JobError, RequestRejection};
use tracing::error;

use crate::http::constants::{
    PROBLEM_BAD_REQUEST, PROBLEM_CONFLICT, PROBLEM_CONVERSION_FAILED, PROBLEM_INTERNAL,
    PROBLEM_NOT_FOUND,
};
use crate::models::{ProblemDetails, ProblemInvalidParam};

/// Structured API error with optional RFC 9457 fields.
#[derive(Debug)]
pub(crate) struct ApiError {
    pub(crate) status: StatusCode,
    pub(crate) kind: &'static str,
    title: &'static str,
    detail: Option<String>,
    pub(crate) invalid_params: Option<Vec<ProblemInvalidParam>>,
}

impl ApiError {
    const fn new(status: StatusCode, kind: &'static str, title: &'static str) -> Self {
        Self {
            status,
            kind,
            title,
            detail: None,
            invalid_params: None,
        }
    }

    pub(crate) fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }

    pub(crate) fn with_invalid_params(mut self, params: Vec<ProblemInvalidParam>) -> Self {
        self.invalid_params = Some(params);
        self
    }

    pub(crate) fn internal(message: impl Into<String>) -> Self {
        Self::new(
            StatusCode::INTERNAL_SERVER_ERROR,
            PROBLEM_INTERNAL,
            "internal server error",
        )
        .with_detail(message)
    }

    pub(crate) fn bad_request(detail: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, PROBLEM_BAD_REQUEST, "bad request").with_detail(detail)
    }

    pub(crate) fn not_found(detail: impl Into<String>) -> Self {
        Self::new(
            StatusCode::NOT_FOUND,
            PROBLEM_NOT_FOUND,
            "resource not found",
        )
        .with_detail(detail)
    }

    pub(crate) fn conflict(detail: impl Into<String>) -> Self {
        Self::new(StatusCode::CONFLICT, PROBLEM_CONFLICT, "conflict").with_detail(detail)
    }

    pub(crate) fn conversion_failed(detail: impl Into<String>) -> Self {
        Self::new(
            StatusCode::UNPROCESSABLE_ENTITY,
            PROBLEM_CONVERSION_FAILED,
            "conversion failed",
        )
        .with_detail(detail)
    }

    fn rejected(rejection: &RequestRejection) -> Self {
        let params = vec![ProblemInvalidParam {
            pointer: format!("/{}", rejection.field()),
            message: rejection.to_string(),
        }];
        let base = match rejection {
            RequestRejection::AlreadyExists { name } => {
                Self::conflict(format!("job '{name}' already exists"))
            }
            _ => Self::bad_request("request failed validation"),
        };
        base.with_invalid_params(params)
    }
}

impl From<JobError> for ApiError {
    fn from(err: JobError) -> Self {
        match &err {
            JobError::InvalidRequest { source } => Self::rejected(source),
            JobError::ConversionFailure { step, .. } => {
                Self::conversion_failed(format!("engine failed at step '{step}'"))
            }
            JobError::RelocationFailure { operation, .. } => {
                error!(operation = %operation, error = ?err, "artifact relocation failed");
                Self::internal("artifact relocation failed")
            }
            JobError::Interrupted { .. } => {
                error!(error = ?err, "job execution interrupted");
                Self::internal("job execution interrupted")
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = ProblemDetails {
            kind: self.kind.to_string(),
            title: self.title.to_string(),
            status: self.status.as_u16(),
            detail: self.detail,
            invalid_params: self.invalid_params,
        };
        (self.status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;
    use std::path::PathBuf;
    use structura_core::{ConversionStep, EngineError};

    #[test]
    fn job_errors_map_to_statuses() {
        let missing: ApiError = JobError::from(RequestRejection::MissingName).into();
        assert_eq!(missing.status, StatusCode::BAD_REQUEST);
        assert_eq!(missing.kind, PROBLEM_BAD_REQUEST);
        let params = missing.invalid_params.unwrap_or_default();
        assert_eq!(params[0].pointer, "/name");

        let source: ApiError = JobError::from(RequestRejection::SourceNotFound {
            path: PathBuf::from("nope"),
        })
        .into();
        assert_eq!(source.status, StatusCode::BAD_REQUEST);
        assert_eq!(
            source.invalid_params.unwrap_or_default()[0].pointer,
            "/source_path"
        );

        let outside: ApiError = JobError::from(RequestRejection::SourceOutsideRoot {
            path: PathBuf::from("/etc/passwd"),
        })
        .into();
        assert_eq!(outside.status, StatusCode::BAD_REQUEST);
        let params = outside.invalid_params.unwrap_or_default();
        assert_eq!(params[0].pointer, "/source_path");
        assert!(!params[0].message.contains("passwd"));

        let conflict: ApiError = JobError::from(RequestRejection::AlreadyExists {
            name: "castle".to_string(),
        })
        .into();
        assert_eq!(conflict.status, StatusCode::CONFLICT);

        let conversion: ApiError = JobError::ConversionFailure {
            step: ConversionStep::Compile,
            source: EngineError::MissingOutput {
                path: PathBuf::from("castle.mcpack"),
            },
        }
        .into();
        assert_eq!(conversion.status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(conversion.kind, PROBLEM_CONVERSION_FAILED);

        let relocation: ApiError = JobError::RelocationFailure {
            operation: "relocate.rename",
            source: Box::new(io::Error::other("cross-device")),
        }
        .into();
        assert_eq!(relocation.status, StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn problem_body_uses_type_field() -> Result<(), Box<dyn std::error::Error>> {
        let err = ApiError::not_found("job 'castle' not found");
        let body = ProblemDetails {
            kind: err.kind.to_string(),
            title: err.title.to_string(),
            status: err.status.as_u16(),
            detail: err.detail,
            invalid_params: err.invalid_params,
        };
        let json = serde_json::to_value(&body)?;
        assert_eq!(json["type"], PROBLEM_NOT_FOUND);
        assert_eq!(json["status"], 404);
        assert!(json.get("invalid_params").is_none());
        Ok(())
    }
}
