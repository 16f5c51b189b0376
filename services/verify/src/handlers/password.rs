use axum::{Json, extract::State, http::StatusCode};
use serde::Serialize;
use serde_json::Value;

use lorehaven_forms::catalog;

use crate::error::VerifyServiceError;
use crate::handlers::JsonBody;
use crate::state::AppState;

#[derive(Serialize)]
pub struct AcceptedResponse {
    pub status: &'static str,
}

/// Always 202 once the email is well-formed, whether or not an account uses it.
pub async fn forgot_password(
    State(state): State<AppState>,
    JsonBody(body): JsonBody<Value>,
) -> Result<(StatusCode, Json<AcceptedResponse>), VerifyServiceError> {
    let form = catalog::get(catalog::FORGOT_PASSWORD)
        .ok_or_else(|| anyhow::anyhow!("forgot_password form missing from catalog"))?;
    let validated = form.validate(&body)?;
    let email = validated.get_str("email").unwrap_or_default();

    state.flow().request_password_reset(email).await?;
    Ok((
        StatusCode::ACCEPTED,
        Json(AcceptedResponse { status: "accepted" }),
    ))
}
