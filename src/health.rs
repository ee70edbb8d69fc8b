use axum::{debug_handler, Json};
use serde::Serialize;
use time::OffsetDateTime;

use crate::AppError;

#[derive(Serialize)]
pub struct HealthResponse {
    status: &'static str,
    message: &'static str,
    version: &'static str,
    #[serde(with = "time::serde::rfc3339")]
    timestamp: OffsetDateTime,
}

#[debug_handler]
pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "OK",
        message: "SkillSwap server is running",
        version: env!("CARGO_PKG_VERSION"),
        timestamp: OffsetDateTime::now_utc(),
    })
}

pub async fn not_found() -> AppError {
    AppError::NotFound("route")
}
