use axum::{
    Router,
    routing::{get, post},
};
use tower_http::trace::TraceLayer;

use lorehaven_core::health::{healthz, readyz};
use lorehaven_core::middleware::{propagate_request_id_layer, request_id_layer};

use crate::handlers::{
    forms::{get_form, list_forms, validate_form},
    password::forgot_password,
    verification::{
        confirm_email, confirm_email_without_token, confirm_otp, otp_form,
        request_email_verification, request_otp, session_status,
    },
};
use crate::state::AppState;

pub fn build_router(state: AppState) -> Router {
    Router::new()
        // Health
        .route("/healthz", get(healthz))
        .route("/readyz", get(readyz))
        // Forms
        .route("/forms", get(list_forms))
        .route("/forms/{name}", get(get_form))
        .route("/forms/{name}/validate", post(validate_form))
        // Email link
        .route("/verify/email", post(request_email_verification))
        .route("/verify/email", get(confirm_email_without_token))
        .route("/verify/email/{token}", get(confirm_email))
        .route("/auth/forgot-password", post(forgot_password))
        // One-time code
        .route("/verify/otp/{user_id}", get(otp_form))
        .route("/verify/otp/{user_id}", post(confirm_otp))
        .route("/verify/otp/{user_id}/challenge", post(request_otp))
        // Session
        .route("/verify/session/{user_id}", get(session_status))
        .layer(TraceLayer::new_for_http())
        .layer(propagate_request_id_layer())
        .layer(request_id_layer())
        .with_state(state)
}
