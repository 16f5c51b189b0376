use axum::{
    Json,
    extract::{Path, rejection::JsonRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use serde_json::{Value, json};

use lorehaven_core::error::AppError;
use lorehaven_forms::{FormSchema, catalog};

use crate::error::malformed_body;

#[derive(Serialize)]
pub struct FormListResponse {
    pub forms: Vec<&'static str>,
}

pub async fn list_forms() -> Json<FormListResponse> {
    Json(FormListResponse {
        forms: catalog::names().collect(),
    })
}

pub async fn get_form(Path(name): Path<String>) -> Result<Json<&'static FormSchema>, AppError> {
    let definition = catalog::get(&name).ok_or(AppError::NotFound)?;
    Ok(Json(&definition.form))
}

/// Dry-run a submission: 200 with the normalized value, 422 with field errors.
/// A body that is not JSON is a 422 too.
pub async fn validate_form(
    Path(name): Path<String>,
    input: Result<Json<Value>, JsonRejection>,
) -> Result<Response, AppError> {
    let definition = catalog::get(&name).ok_or(AppError::NotFound)?;
    let outcome = match input {
        Ok(Json(input)) => definition.validate(&input),
        Err(rejection) => Err(malformed_body(&rejection)),
    };
    let response = match outcome {
        Ok(validated) => {
            (StatusCode::OK, Json(json!({ "value": validated.into_value() }))).into_response()
        }
        Err(errors) => (
            StatusCode::UNPROCESSABLE_ENTITY,
            Json(json!({
                "kind": "VALIDATION_FAILED",
                "message": errors.to_string(),
                "errors": errors,
            })),
        )
            .into_response(),
    };
    Ok(response)
}
