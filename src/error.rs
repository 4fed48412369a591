use crate::models::{QuizId, ValidationIssue};
use crate::timer::AttemptError;
use axum::{http::StatusCode, response::{IntoResponse, Response}, Json};
use serde::Serialize;
use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum QuizError {
    #[error("quiz {0} does not exist")]
    InvalidQuiz(QuizId),
    #[error("quiz {0} not found")]
    NotFound(QuizId),
    #[error("score references unknown quiz {0}")]
    InvalidReference(QuizId),
    #[error("expected {expected} answers, got {actual}")]
    MalformedAnswers { expected: usize, actual: usize },
    #[error("taker name must not be blank")]
    InvalidTaker,
    #[error("quiz validation failed")]
    Validation(Vec<ValidationIssue>),
    #[error("attempt {0} not found")]
    AttemptNotFound(Uuid),
    #[error(transparent)]
    Attempt(#[from] AttemptError),
}

#[derive(Debug, Clone, Serialize)]
pub struct ErrorDetail {
    pub field: String,
    pub issue: String,
}

impl From<ValidationIssue> for ErrorDetail {
    fn from(issue: ValidationIssue) -> Self {
        Self {
            field: issue.field,
            issue: issue.issue,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ErrorBody {
    pub error: ErrorPayload,
}

#[derive(Debug, Clone, Serialize)]
pub struct ErrorPayload {
    pub code: &'static str,
    pub message: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub details: Vec<ErrorDetail>,
    pub request_id: String,
}

#[derive(Debug)]
pub struct AppError {
    pub status: StatusCode,
    pub code: &'static str,
    pub message: String,
    pub details: Vec<ErrorDetail>,
    pub request_id: String,
}

impl AppError {
    pub fn new(status: StatusCode, code: &'static str, message: impl Into<String>, request_id: impl Into<String>) -> Self {
        Self {
            status,
            code,
            message: message.into(),
            details: Vec::new(),
            request_id: request_id.into(),
        }
    }

    pub fn with_details(mut self, details: Vec<ErrorDetail>) -> Self {
        self.details = details;
        self
    }

    pub fn from_quiz(err: QuizError, request_id: impl Into<String>) -> Self {
        let message = err.to_string();
        match err {
            QuizError::InvalidQuiz(_) => Self::new(StatusCode::NOT_FOUND, "INVALID_QUIZ", message, request_id),
            QuizError::NotFound(_) => Self::new(StatusCode::NOT_FOUND, "NOT_FOUND", message, request_id),
            QuizError::InvalidReference(_) => {
                Self::new(StatusCode::BAD_REQUEST, "INVALID_REFERENCE", message, request_id)
            }
            QuizError::MalformedAnswers { .. } => {
                Self::new(StatusCode::BAD_REQUEST, "MALFORMED_ANSWERS", message, request_id)
            }
            QuizError::InvalidTaker => Self::new(StatusCode::BAD_REQUEST, "VALIDATION_ERROR", message, request_id)
                .with_details(vec![ErrorDetail {
                    field: "taker".into(),
                    issue: "must not be blank".into(),
                }]),
            QuizError::Validation(issues) => {
                Self::new(StatusCode::BAD_REQUEST, "VALIDATION_ERROR", message, request_id)
                    .with_details(issues.into_iter().map(ErrorDetail::from).collect())
            }
            QuizError::AttemptNotFound(_) => Self::new(StatusCode::NOT_FOUND, "NOT_FOUND", message, request_id),
            QuizError::Attempt(_) => Self::new(StatusCode::CONFLICT, "ATTEMPT_STATE", message, request_id),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        if self.status.is_server_error() {
            tracing::error!(code = self.code, request_id = %self.request_id, "{}", self.message);
        }
        let payload = ErrorBody {
            error: ErrorPayload {
                code: self.code,
                message: self.message,
                details: self.details,
                request_id: self.request_id,
            },
        };
        (self.status, Json(payload)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quiz_errors_map_to_client_statuses() {
        let cases = [
            (QuizError::InvalidQuiz(3), StatusCode::NOT_FOUND, "INVALID_QUIZ"),
            (QuizError::NotFound(3), StatusCode::NOT_FOUND, "NOT_FOUND"),
            (
                QuizError::MalformedAnswers { expected: 2, actual: 1 },
                StatusCode::BAD_REQUEST,
                "MALFORMED_ANSWERS",
            ),
            (
                QuizError::Attempt(AttemptError::Completed),
                StatusCode::CONFLICT,
                "ATTEMPT_STATE",
            ),
        ];
        for (err, status, code) in cases {
            let app = AppError::from_quiz(err, "req-1");
            assert_eq!(app.status, status);
            assert_eq!(app.code, code);
            assert_eq!(app.request_id, "req-1");
        }
    }

    #[test]
    fn validation_issues_become_details() {
        let app = AppError::from_quiz(
            QuizError::Validation(vec![ValidationIssue {
                field: "topic".into(),
                issue: "must not be empty".into(),
            }]),
            "req-2",
        );
        assert_eq!(app.details.len(), 1);
        assert_eq!(app.details[0].field, "topic");
    }
}
