use axum::http::StatusCode;
use axum_test::TestServer;
use sea_orm::DatabaseConnection;
use serde_json::{Value, json};
use uuid::Uuid;

use lorehaven_verify::domain::types::VerificationPolicy;
use lorehaven_verify::router::build_router;
use lorehaven_verify::state::AppState;

use crate::helpers::link_base;

/// Router over a state whose stores are never reached: every request here
/// is answered before touching Postgres or Redis.
fn server() -> TestServer {
    let redis = deadpool_redis::Config::from_url("redis://127.0.0.1:6379")
        .create_pool(Some(deadpool_redis::Runtime::Tokio1))
        .unwrap();
    let state = AppState {
        db: DatabaseConnection::Disconnected,
        redis,
        policy: VerificationPolicy::default(),
        link_base: link_base(),
    };
    TestServer::new(build_router(state)).unwrap()
}

#[tokio::test]
async fn should_answer_probes_with_request_id() {
    let server = server();

    let response = server.get("/healthz").await;
    response.assert_status_ok();
    assert!(response.headers().get("x-request-id").is_some());

    server.get("/readyz").await.assert_status_ok();
}

#[tokio::test]
async fn should_list_catalog_forms() {
    let response = server().get("/forms").await;
    response.assert_status_ok();

    let body: Value = response.json();
    let forms: Vec<&str> = body["forms"]
        .as_array()
        .unwrap()
        .iter()
        .filter_map(Value::as_str)
        .collect();
    for name in ["login", "sign_up", "forgot_password", "otp", "lorebook"] {
        assert!(forms.contains(&name), "missing {name}");
    }
}

#[tokio::test]
async fn should_serve_field_descriptors() {
    let response = server().get("/forms/otp").await;
    response.assert_status_ok();

    let body: Value = response.json();
    assert_eq!(body["name"], "otp");
    assert_eq!(body["fields"][0]["name"], "code");
    assert_eq!(body["fields"][0]["type"], "otp");
    assert_eq!(body["fields"][0]["required"], true);
}

#[tokio::test]
async fn should_return_not_found_for_unknown_form() {
    let response = server().get("/forms/nope").await;
    response.assert_status(StatusCode::NOT_FOUND);
    assert_eq!(response.json::<Value>()["kind"], "NOT_FOUND");

    let response = server()
        .post("/forms/nope/validate")
        .json(&json!({}))
        .await;
    response.assert_status(StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn should_return_normalized_value_for_valid_submission() {
    let response = server()
        .post("/forms/forgot_password/validate")
        .json(&json!({ "email": "  Ada@Lorehaven.Example ", "extra": 1 }))
        .await;
    response.assert_status_ok();
    assert_eq!(
        response.json::<Value>(),
        json!({ "value": { "email": "ada@lorehaven.example" } })
    );
}

#[tokio::test]
async fn should_return_field_errors_for_invalid_submission() {
    let response = server()
        .post("/forms/otp/validate")
        .json(&json!({ "code": "12a456" }))
        .await;
    response.assert_status(StatusCode::UNPROCESSABLE_ENTITY);

    let body: Value = response.json();
    assert_eq!(body["kind"], "VALIDATION_FAILED");
    assert_eq!(body["errors"][0]["field"], "code");
    assert_eq!(body["errors"][0]["constraint"], "pattern");
    assert_eq!(body["errors"][0]["message"], "Code must contain only digits");
}

#[tokio::test]
async fn should_reject_malformed_link_token_as_bad_request() {
    let server = server();
    for path in ["/verify/email/short", "/verify/email/not*url*safe", "/verify/email"] {
        let response = server.get(path).await;
        response.assert_status(StatusCode::BAD_REQUEST);
        let body: Value = response.json();
        assert_eq!(body["kind"], "VALIDATION_FAILED", "{path}");
        assert_eq!(body["errors"][0]["field"], "token", "{path}");
    }
}

#[tokio::test]
async fn should_reject_short_code_before_lookup() {
    let response = server()
        .post(&format!("/verify/otp/{}", Uuid::now_v7()))
        .json(&json!({ "code": "12345" }))
        .await;
    response.assert_status(StatusCode::BAD_REQUEST);
    let body: Value = response.json();
    assert_eq!(body["errors"][0]["constraint"], "length");
}

#[tokio::test]
async fn should_reject_malformed_email_on_forgot_password() {
    let response = server()
        .post("/auth/forgot-password")
        .json(&json!({ "email": "not-an-email" }))
        .await;
    response.assert_status(StatusCode::BAD_REQUEST);
    let body: Value = response.json();
    assert_eq!(body["errors"][0]["field"], "email");
    assert_eq!(body["errors"][0]["constraint"], "email");
}

#[tokio::test]
async fn should_answer_non_json_bodies_as_validation_failures() {
    let server = server();
    let otp_path = format!("/verify/otp/{}", Uuid::now_v7());
    for path in ["/auth/forgot-password", "/verify/email", otp_path.as_str()] {
        let response = server.post(path).text("code=123456").await;
        response.assert_status(StatusCode::BAD_REQUEST);
        let body: Value = response.json();
        assert_eq!(body["kind"], "VALIDATION_FAILED", "{path}");
        assert_eq!(body["errors"][0]["field"], "body", "{path}");

        let response = server
            .post(path)
            .bytes(r#"{"code": "1234"#.into())
            .content_type("application/json")
            .await;
        response.assert_status(StatusCode::BAD_REQUEST);
        assert_eq!(response.json::<Value>()["kind"], "VALIDATION_FAILED", "{path}");
    }
}

#[tokio::test]
async fn should_answer_non_json_dry_run_with_field_errors() {
    let response = server()
        .post("/forms/otp/validate")
        .text("not json")
        .await;
    response.assert_status(StatusCode::UNPROCESSABLE_ENTITY);

    let body: Value = response.json();
    assert_eq!(body["kind"], "VALIDATION_FAILED");
    assert_eq!(body["errors"][0]["field"], "body");
    assert_eq!(body["errors"][0]["constraint"], "type");
}
