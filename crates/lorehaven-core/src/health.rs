use axum::Json;
use axum::http::StatusCode;
use serde::Serialize;

#[derive(Debug, Serialize, PartialEq, Eq)]
pub struct Health {
    pub status: &'static str,
}

/// Liveness probe for `GET /healthz`.
pub async fn healthz() -> (StatusCode, Json<Health>) {
    (StatusCode::OK, Json(Health { status: "ok" }))
}

/// Handler for `GET /readyz`. Services with hard dependencies mount their own.
pub async fn readyz() -> StatusCode {
    StatusCode::OK
}
