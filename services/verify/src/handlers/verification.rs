use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use lorehaven_core::serde::{to_rfc3339_ms, to_rfc3339_ms_opt};
use lorehaven_domain::id::UserId;
use lorehaven_domain::verification::{VerificationPurpose, VerificationState};
use lorehaven_forms::{FormSchema, catalog};

use crate::domain::types::VerificationSession;
use crate::error::VerifyServiceError;
use crate::handlers::JsonBody;
use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct SessionResponse {
    pub user_id: UserId,
    pub state: VerificationState,
    #[serde(serialize_with = "to_rfc3339_ms_opt")]
    pub expires_at: Option<DateTime<Utc>>,
    pub version: i32,
    #[serde(serialize_with = "to_rfc3339_ms")]
    pub updated_at: DateTime<Utc>,
}

impl From<VerificationSession> for SessionResponse {
    fn from(session: VerificationSession) -> Self {
        Self {
            user_id: session.user_id,
            state: session.state,
            expires_at: session.expires_at,
            version: session.version,
            updated_at: session.updated_at,
        }
    }
}

#[derive(Deserialize)]
pub struct RequestEmailVerificationRequest {
    pub user_id: UserId,
    #[serde(default)]
    pub purpose: VerificationPurpose,
}

#[derive(Serialize)]
pub struct OtpFormResponse {
    pub form: &'static FormSchema,
    pub session: SessionResponse,
}

/// Run a submission through a built-in form's schema.
fn validated_field(
    form_name: &str,
    field: &str,
    input: &Value,
) -> Result<String, VerifyServiceError> {
    let form = catalog::get(form_name)
        .ok_or_else(|| anyhow::anyhow!("form {form_name} missing from catalog"))?;
    let validated = form.validate(input)?;
    Ok(validated.get_str(field).unwrap_or_default().to_owned())
}

pub async fn request_email_verification(
    State(state): State<AppState>,
    JsonBody(body): JsonBody<RequestEmailVerificationRequest>,
) -> Result<(StatusCode, Json<SessionResponse>), VerifyServiceError> {
    let session = state
        .flow()
        .request_email_verification(body.user_id, body.purpose)
        .await?;
    Ok((StatusCode::ACCEPTED, Json(session.into())))
}

pub async fn confirm_email(
    State(state): State<AppState>,
    Path(token): Path<String>,
) -> Result<Json<SessionResponse>, VerifyServiceError> {
    confirm_email_token(&state, json!({ "token": token })).await
}

/// `GET /verify/email` with the token segment left off the link.
pub async fn confirm_email_without_token(
    State(state): State<AppState>,
) -> Result<Json<SessionResponse>, VerifyServiceError> {
    confirm_email_token(&state, json!({})).await
}

async fn confirm_email_token(
    state: &AppState,
    input: Value,
) -> Result<Json<SessionResponse>, VerifyServiceError> {
    let token = validated_field(catalog::VERIFICATION_TOKEN, "token", &input)?;
    let session = state.flow().confirm_email(&token).await?;
    Ok(Json(session.into()))
}

pub async fn otp_form(
    State(state): State<AppState>,
    Path(user_id): Path<UserId>,
) -> Result<Json<OtpFormResponse>, VerifyServiceError> {
    let form = catalog::get(catalog::OTP)
        .ok_or_else(|| anyhow::anyhow!("otp form missing from catalog"))?;
    let session = state.flow().status(user_id).await?;
    Ok(Json(OtpFormResponse {
        form: &form.form,
        session: session.into(),
    }))
}

pub async fn request_otp(
    State(state): State<AppState>,
    Path(user_id): Path<UserId>,
) -> Result<(StatusCode, Json<SessionResponse>), VerifyServiceError> {
    let session = state.flow().request_otp(user_id).await?;
    Ok((StatusCode::ACCEPTED, Json(session.into())))
}

pub async fn confirm_otp(
    State(state): State<AppState>,
    Path(user_id): Path<UserId>,
    JsonBody(body): JsonBody<Value>,
) -> Result<Json<SessionResponse>, VerifyServiceError> {
    let code = validated_field(catalog::OTP, "code", &body)?;
    let session = state.flow().confirm_otp(user_id, &code).await?;
    Ok(Json(session.into()))
}

pub async fn session_status(
    State(state): State<AppState>,
    Path(user_id): Path<UserId>,
) -> Result<Json<SessionResponse>, VerifyServiceError> {
    let session = state.flow().status(user_id).await?;
    Ok(Json(session.into()))
}
