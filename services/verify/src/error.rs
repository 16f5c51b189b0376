use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};

use lorehaven_domain::verification::VerificationState;
use lorehaven_forms::{Constraint, ValidationErrors};

/// Why an email link token was rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum TokenError {
    #[error("verification link not found")]
    NotFound,
    #[error("verification link expired")]
    Expired,
    #[error("verification link already used")]
    AlreadyConsumed,
}

/// Why a one-time code was rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum OtpError {
    #[error("no active code")]
    NotFound,
    #[error("code expired")]
    Expired,
    #[error("code does not match")]
    Mismatch,
    #[error("too many wrong codes")]
    AttemptsExhausted,
}

/// Verify service domain error variants.
#[derive(Debug, thiserror::Error)]
pub enum VerifyServiceError {
    #[error("validation failed")]
    Validation(#[from] ValidationErrors),
    #[error(transparent)]
    Token(#[from] TokenError),
    #[error(transparent)]
    Otp(#[from] OtpError),
    #[error("cannot {action} while {state}")]
    InvalidState {
        action: &'static str,
        state: VerificationState,
    },
    #[error("user not found")]
    UserNotFound,
    #[error("too many requests")]
    TooManyRequests,
    #[error("internal error")]
    Internal(#[from] anyhow::Error),
}

/// A body that is not a JSON document fails validation as a whole.
pub fn malformed_body(rejection: &JsonRejection) -> ValidationErrors {
    ValidationErrors::single("body", Constraint::Type, rejection.body_text())
}

impl From<JsonRejection> for VerifyServiceError {
    fn from(rejection: JsonRejection) -> Self {
        Self::Validation(malformed_body(&rejection))
    }
}

impl VerifyServiceError {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Validation(_) => "VALIDATION_FAILED",
            Self::Token(TokenError::NotFound) => "TOKEN_NOT_FOUND",
            Self::Token(TokenError::Expired) => "TOKEN_EXPIRED",
            Self::Token(TokenError::AlreadyConsumed) => "TOKEN_ALREADY_CONSUMED",
            Self::Otp(OtpError::NotFound) => "OTP_NOT_FOUND",
            Self::Otp(OtpError::Expired) => "OTP_EXPIRED",
            Self::Otp(OtpError::Mismatch) => "OTP_MISMATCH",
            Self::Otp(OtpError::AttemptsExhausted) => "OTP_ATTEMPTS_EXHAUSTED",
            Self::InvalidState { .. } => "INVALID_STATE",
            Self::UserNotFound => "USER_NOT_FOUND",
            Self::TooManyRequests => "TOO_MANY_REQUESTS",
            Self::Internal(_) => "INTERNAL",
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            Self::Validation(_) => StatusCode::BAD_REQUEST,
            Self::Token(TokenError::NotFound)
            | Self::Otp(OtpError::NotFound)
            | Self::UserNotFound => StatusCode::NOT_FOUND,
            Self::Token(TokenError::Expired) | Self::Otp(OtpError::Expired) => StatusCode::GONE,
            Self::Token(TokenError::AlreadyConsumed) | Self::InvalidState { .. } => {
                StatusCode::CONFLICT
            }
            Self::Otp(OtpError::Mismatch) => StatusCode::UNAUTHORIZED,
            Self::Otp(OtpError::AttemptsExhausted) | Self::TooManyRequests => {
                StatusCode::TOO_MANY_REQUESTS
            }
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for VerifyServiceError {
    fn into_response(self) -> Response {
        let status = self.status();
        // Only 500s are logged here; TraceLayer already records every response status.
        if let Self::Internal(ref e) = self {
            tracing::error!(error = %e, kind = "INTERNAL", "internal error");
        }
        let mut body = serde_json::json!({
            "kind": self.kind(),
            "message": self.to_string(),
        });
        if let Self::Validation(errors) = &self {
            body["errors"] = serde_json::to_value(errors).unwrap_or_default();
        }
        (status, axum::Json(body)).into_response()
    }
}
