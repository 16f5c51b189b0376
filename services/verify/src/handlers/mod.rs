use axum::extract::FromRequest;

use crate::error::VerifyServiceError;

pub mod forms;
pub mod password;
pub mod verification;

/// `Json` whose rejections answer as `VALIDATION_FAILED`.
#[derive(Debug, FromRequest)]
#[from_request(via(axum::Json), rejection(VerifyServiceError))]
pub struct JsonBody<T>(pub T);
