/*!
 * # Health Check Module
 *
 * - Liveness (`/health`): the process is serving requests
 * - Readiness (`/health/ready`): the database answers a ping
 * - Version (`/health/version`): build information
 */

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Json},
    routing::get,
    Router,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::OnceLock;
use std::time::Instant;
use tracing::warn;
use utoipa::ToSchema;

use crate::{db, errors::ErrorBody, ApiResponse, AppState};

static START_TIME: OnceLock<Instant> = OnceLock::new();

/// Record process start for uptime reporting
pub fn init_start_time() {
    let _ = START_TIME.get_or_init(Instant::now);
}

fn uptime_seconds() -> u64 {
    START_TIME.get().map_or(0, |start| start.elapsed().as_secs())
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Up,
    Down,
}

#[derive(Serialize, Deserialize, Debug, Clone, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct HealthInfo {
    pub status: HealthStatus,
    pub version: String,
    pub uptime_seconds: u64,
    pub timestamp: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub database: Option<HealthStatus>,
}

impl HealthInfo {
    fn new(status: HealthStatus, database: Option<HealthStatus>) -> Self {
        Self {
            status,
            version: env!("CARGO_PKG_VERSION").to_string(),
            uptime_seconds: uptime_seconds(),
            timestamp: Utc::now(),
            database,
        }
    }
}

pub fn health_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(liveness_check))
        .route("/ready", get(readiness_check))
        .route("/version", get(version_info))
}

#[utoipa::path(
    get,
    path = "/health",
    summary = "Liveness",
    responses((status = 200, description = "Process is up", body = ApiResponse<HealthInfo>)),
    tag = "Health"
)]
pub async fn liveness_check() -> Json<ApiResponse<HealthInfo>> {
    Json(ApiResponse::success(HealthInfo::new(HealthStatus::Up, None)))
}

#[utoipa::path(
    get,
    path = "/health/ready",
    summary = "Readiness",
    responses(
        (status = 200, description = "Database reachable", body = ApiResponse<HealthInfo>),
        (status = 503, description = "Database unreachable", body = ErrorBody)
    ),
    tag = "Health"
)]
pub async fn readiness_check(State(state): State<AppState>) -> impl IntoResponse {
    match db::check_connection(&state.db).await {
        Ok(()) => (
            StatusCode::OK,
            Json(ApiResponse::success(HealthInfo::new(
                HealthStatus::Up,
                Some(HealthStatus::Up),
            ))),
        ),
        Err(err) => {
            warn!(error = %err, "readiness check failed");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(ApiResponse {
                    success: false,
                    data: Some(HealthInfo::new(HealthStatus::Down, Some(HealthStatus::Down))),
                    error: Some(ErrorBody {
                        code: "database_unavailable".into(),
                        message: "Database is not reachable".into(),
                        details: None,
                    }),
                    message: None,
                }),
            )
        }
    }
}

/// Build and version information
pub async fn version_info() -> Json<ApiResponse<serde_json::Value>> {
    Json(ApiResponse::success(serde_json::json!({
        "version": env!("CARGO_PKG_VERSION"),
        "commit": option_env!("GIT_HASH").unwrap_or("unknown"),
        "built": option_env!("BUILD_TIME").unwrap_or("unknown"),
    })))
}
