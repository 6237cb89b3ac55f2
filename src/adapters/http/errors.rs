use {
    crate::domain::error::PipelineError,
    axum::{
        Json,
        http::StatusCode,
        response::{IntoResponse, Response},
    },
};

/// Newtype so the domain error can implement axum's `IntoResponse`.
pub struct ApiError(pub PipelineError);

impl From<PipelineError> for ApiError {
    fn from(err: PipelineError) -> Self {
        Self(err)
    }
}

impl ApiError {
    fn parts(&self) -> (StatusCode, &'static str, String) {
        match &self.0 {
            PipelineError::InvalidSignature => (
                StatusCode::FORBIDDEN,
                "invalid_signature",
                self.0.to_string(),
            ),
            PipelineError::Validation(msg) => {
                (StatusCode::BAD_REQUEST, "validation_error", msg.clone())
            }
            PipelineError::StaleOrInvalidTimestamp(_) => (
                StatusCode::BAD_REQUEST,
                "invalid_timestamp",
                self.0.to_string(),
            ),
            PipelineError::IntegrationNotFound(_) => (
                StatusCode::NOT_FOUND,
                "integration_not_found",
                self.0.to_string(),
            ),
            PipelineError::EventNotFound(_) => (
                StatusCode::NOT_FOUND,
                "event_not_found",
                self.0.to_string(),
            ),
            PipelineError::IntegrationInactive(_) => (
                StatusCode::CONFLICT,
                "integration_inactive",
                self.0.to_string(),
            ),
            PipelineError::MaxRetriesExceeded { .. } => (
                StatusCode::CONFLICT,
                "max_retries_exceeded",
                self.0.to_string(),
            ),
            PipelineError::HandlerTimeout(_)
            | PipelineError::Queue(_)
            | PipelineError::Database(_)
            | PipelineError::Serialization(_) => {
                tracing::error!(error = %self.0, "internal error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal_error",
                    "internal error".to_string(),
                )
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error_code, message) = self.parts();
        if self.0.is_rejection() {
            tracing::warn!(error_code, %message, "webhook rejected");
        }

        let body = serde_json::json!({
            "error_code": error_code,
            "message": message,
        });

        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use {super::*, crate::domain::id::IntegrationId, uuid::Uuid};

    fn status_of(err: PipelineError) -> StatusCode {
        ApiError(err).into_response().status()
    }

    #[test]
    fn rejections_map_to_caller_errors() {
        let id = IntegrationId::new(Uuid::now_v7());
        assert_eq!(status_of(PipelineError::InvalidSignature), StatusCode::FORBIDDEN);
        assert_eq!(
            status_of(PipelineError::IntegrationInactive(id)),
            StatusCode::CONFLICT
        );
        assert_eq!(
            status_of(PipelineError::IntegrationNotFound(id)),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            status_of(PipelineError::StaleOrInvalidTimestamp("x".into())),
            StatusCode::BAD_REQUEST
        );
    }

    #[test]
    fn rejections_are_client_errors() {
        let id = IntegrationId::new(Uuid::now_v7());
        for err in [
            PipelineError::Validation("bad".into()),
            PipelineError::InvalidSignature,
            PipelineError::StaleOrInvalidTimestamp("x".into()),
            PipelineError::IntegrationNotFound(id),
            PipelineError::IntegrationInactive(id),
        ] {
            assert!(err.is_rejection(), "{err}");
            assert!(status_of(err).is_client_error());
        }
        assert!(!PipelineError::HandlerTimeout(30).is_rejection());
        assert!(!PipelineError::Database(sqlx::Error::PoolTimedOut).is_rejection());
    }

    #[test]
    fn internal_errors_hide_details() {
        let status = status_of(PipelineError::Queue("closed".into()));
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    }
}
