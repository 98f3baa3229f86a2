//! 헬스 체크 endpoint.
//!
//! 서버 상태 확인을 위한 헬스 체크 엔드포인트를 제공합니다.
//! 로드밸런서나 오케스트레이션 시스템(Kubernetes 등)에서 사용됩니다.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use onboard_core::OnboardError;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use utoipa::ToSchema;

use crate::error::ApiResult;
use crate::monitoring::{HealthCheckResult, HealthStatus, SystemHealthReport};
use crate::state::AppState;

/// Liveness 응답.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct LivenessResponse {
    /// 항상 "ok"
    pub status: String,
    /// API 버전
    pub version: String,
    /// 서버 업타임(초)
    pub uptime_secs: i64,
}

/// 간단한 헬스 체크 (liveness probe용).
///
/// 서버가 응답 가능한 상태인지만 확인합니다. 의존성은 검사하지 않습니다.
#[utoipa::path(
    get,
    path = "/health",
    tag = "health",
    responses(
        (status = 200, description = "서버 동작 중", body = LivenessResponse)
    )
)]
pub async fn health_check(State(state): State<Arc<AppState>>) -> Json<LivenessResponse> {
    Json(LivenessResponse {
        status: "ok".to_string(),
        version: state.version.clone(),
        uptime_secs: state.uptime_secs(),
    })
}

/// 상세 헬스 체크 (readiness probe용).
///
/// 등록된 모든 컴포넌트 프로브를 동시에 실행합니다.
/// 전체 상태가 unhealthy면 503을 반환합니다.
#[utoipa::path(
    get,
    path = "/health/ready",
    tag = "health",
    responses(
        (status = 200, description = "healthy 또는 degraded", body = SystemHealthReport),
        (status = 503, description = "필수 컴포넌트 장애", body = SystemHealthReport)
    )
)]
pub async fn health_ready(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let report = state.health.check_system_health().await;

    let status_code = match report.status {
        HealthStatus::Unhealthy => StatusCode::SERVICE_UNAVAILABLE,
        HealthStatus::Healthy | HealthStatus::Degraded => StatusCode::OK,
    };

    (status_code, Json(report))
}

/// 단일 컴포넌트 헬스 체크.
#[utoipa::path(
    get,
    path = "/health/components/{name}",
    tag = "health",
    params(
        ("name" = String, Path, description = "컴포넌트 이름")
    ),
    responses(
        (status = 200, description = "컴포넌트 상태", body = HealthCheckResult),
        (status = 404, description = "등록되지 않은 컴포넌트", body = crate::error::ApiErrorResponse)
    )
)]
pub async fn health_component(
    State(state): State<Arc<AppState>>,
    Path(name): Path<String>,
) -> ApiResult<Json<HealthCheckResult>> {
    state
        .health
        .check_component(&name)
        .await
        .map(Json)
        .ok_or_else(|| OnboardError::NotFound(format!("health component '{}'", name)).into())
}

/// 헬스 체크 라우터 생성.
pub fn health_router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/", get(health_check))
        .route("/ready", get(health_ready))
        .route("/components/{name}", get(health_component))
}
