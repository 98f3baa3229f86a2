//! 모니터링 API 엔드포인트.
//!
//! 에러 로그 조회, 알림, 시스템 상태 확인 API를 제공합니다.
//!
//! # 엔드포인트
//!
//! - `GET /api/v1/monitoring/status` - 시스템 모니터 상태
//! - `GET /api/v1/monitoring/errors` - 최근 에러 목록 조회
//! - `DELETE /api/v1/monitoring/errors` - 에러 히스토리 삭제
//! - `GET /api/v1/monitoring/errors/summary` - 시간 창 에러 요약
//! - `GET /api/v1/monitoring/errors/stats` - 누적 에러 통계
//! - `GET /api/v1/monitoring/alerts` - 활성 알림
//! - `GET /api/v1/monitoring/alerts/history` - 알림 이력
//! - `POST /api/v1/monitoring/alerts/:id/resolve` - 알림 해결
//! - `GET /api/v1/monitoring/metrics/recent` - 최근 리소스 샘플

use axum::{
    extract::{Path, Query, State},
    routing::{get, post},
    Json, Router,
};
use onboard_core::OnboardError;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use crate::error::ApiResult;
use crate::monitoring::{
    Alert, ErrorCategory, ErrorEvent, ErrorSeverity, ErrorStats, ErrorSummary, MetricSample,
    SystemStatus,
};
use crate::state::AppState;

/// 목록 조회 최대 개수.
const MAX_LIMIT: usize = 200;

/// 에러 목록 조회 쿼리 파라미터.
#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct ErrorsQuery {
    /// 조회할 최대 에러 수 (기본값: 50, 최대: 200)
    #[serde(default = "default_limit")]
    #[validate(range(min = 1, max = 200, message = "limit은 1-200이어야 합니다"))]
    pub limit: usize,

    /// 심각도 필터 (low, medium, high, critical)
    pub severity: Option<String>,

    /// 카테고리 필터
    pub category: Option<String>,
}

fn default_limit() -> usize {
    50
}

/// 에러 요약 쿼리 파라미터.
#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct SummaryQuery {
    /// 조회 시간 창 (시간, 기본값: 24, 최대: 720)
    #[serde(default = "default_hours")]
    #[validate(range(min = 1, max = 720, message = "hours는 1-720이어야 합니다"))]
    pub hours: u64,
}

fn default_hours() -> u64 {
    24
}

/// 목록 개수 쿼리 파라미터.
#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct LimitQuery {
    /// 조회할 최대 개수 (기본값: 50, 최대: 200)
    #[serde(default = "default_limit")]
    #[validate(range(min = 1, max = 200, message = "limit은 1-200이어야 합니다"))]
    pub limit: usize,
}

/// 에러 목록 응답.
#[derive(Debug, Serialize, ToSchema)]
pub struct ErrorsResponse {
    /// 에러 목록 (최신순)
    pub errors: Vec<ErrorEvent>,
    /// 조회된 에러 수
    pub count: usize,
    /// 총 에러 수 (히스토리 내)
    pub total_in_history: usize,
}

/// 알림 목록 응답.
#[derive(Debug, Serialize, ToSchema)]
pub struct AlertsResponse {
    /// 알림 목록
    pub alerts: Vec<Alert>,
    /// 알림 수
    pub count: usize,
}

/// 알림 해결 응답.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ResolveAlertResponse {
    /// 해결된 알림 ID
    pub id: Uuid,
    /// 해결 여부
    pub resolved: bool,
}

/// 최근 메트릭 응답.
#[derive(Debug, Serialize, ToSchema)]
pub struct MetricsResponse {
    /// 샘플 목록 (최신순)
    pub samples: Vec<MetricSample>,
    /// 샘플 수
    pub count: usize,
}

fn parse_filter<T: std::str::FromStr<Err = String>>(value: &str) -> ApiResult<T> {
    value
        .parse::<T>()
        .map_err(|e| OnboardError::Validation(e).into())
}

/// 시스템 모니터 상태.
#[utoipa::path(
    get,
    path = "/api/v1/monitoring/status",
    tag = "monitoring",
    responses(
        (status = 200, description = "모니터 상태", body = SystemStatus)
    )
)]
pub async fn get_status(State(state): State<Arc<AppState>>) -> Json<SystemStatus> {
    Json(state.system_monitor.get_system_status())
}

/// 최근 에러 목록 조회.
#[utoipa::path(
    get,
    path = "/api/v1/monitoring/errors",
    tag = "monitoring",
    params(
        ("limit" = Option<usize>, Query, description = "조회할 최대 에러 수 (기본값: 50)"),
        ("severity" = Option<String>, Query, description = "심각도 필터 (low, medium, high, critical)"),
        ("category" = Option<String>, Query, description = "카테고리 필터")
    ),
    responses(
        (status = 200, description = "에러 목록 조회 성공", body = ErrorsResponse),
        (status = 400, description = "잘못된 필터", body = crate::error::ApiErrorResponse)
    )
)]
pub async fn list_errors(
    State(state): State<Arc<AppState>>,
    Query(query): Query<ErrorsQuery>,
) -> ApiResult<Json<ErrorsResponse>> {
    query.validate()?;
    let tracker = &state.error_tracker;
    let limit = query.limit.min(MAX_LIMIT);

    let errors = match (&query.severity, &query.category) {
        (Some(severity), _) => {
            let severity: ErrorSeverity = parse_filter(severity)?;
            let mut errors = tracker.get_by_severity(severity, limit);
            if let Some(category) = &query.category {
                let category: ErrorCategory = parse_filter(category)?;
                errors.retain(|e| e.category == category);
            }
            errors
        }
        (None, Some(category)) => tracker.get_by_category(parse_filter(category)?, limit),
        (None, None) => tracker.get_recent_errors(limit),
    };

    Ok(Json(ErrorsResponse {
        count: errors.len(),
        total_in_history: tracker.len(),
        errors,
    }))
}

/// 에러 히스토리 삭제 (누적 통계는 유지).
#[utoipa::path(
    delete,
    path = "/api/v1/monitoring/errors",
    tag = "monitoring",
    responses(
        (status = 200, description = "히스토리 삭제 완료")
    )
)]
pub async fn clear_errors(State(state): State<Arc<AppState>>) -> Json<serde_json::Value> {
    state.error_tracker.clear_history();
    Json(serde_json::json!({
        "message": "Error history cleared",
        "cleared_at": state.clock.now().to_rfc3339()
    }))
}

/// 시간 창 에러 요약.
#[utoipa::path(
    get,
    path = "/api/v1/monitoring/errors/summary",
    tag = "monitoring",
    params(
        ("hours" = Option<u64>, Query, description = "조회 시간 창 (기본값: 24, 최대: 720)")
    ),
    responses(
        (status = 200, description = "에러 요약", body = ErrorSummary),
        (status = 400, description = "잘못된 시간 창", body = crate::error::ApiErrorResponse)
    )
)]
pub async fn get_error_summary(
    State(state): State<Arc<AppState>>,
    Query(query): Query<SummaryQuery>,
) -> ApiResult<Json<ErrorSummary>> {
    query.validate()?;
    Ok(Json(state.error_tracker.get_error_summary(query.hours)))
}

/// 누적 에러 통계.
#[utoipa::path(
    get,
    path = "/api/v1/monitoring/errors/stats",
    tag = "monitoring",
    responses(
        (status = 200, description = "에러 통계", body = ErrorStats)
    )
)]
pub async fn get_error_stats(State(state): State<Arc<AppState>>) -> Json<ErrorStats> {
    Json(state.error_tracker.get_stats())
}

/// 활성 알림 목록.
#[utoipa::path(
    get,
    path = "/api/v1/monitoring/alerts",
    tag = "monitoring",
    responses(
        (status = 200, description = "활성 알림", body = AlertsResponse)
    )
)]
pub async fn list_active_alerts(State(state): State<Arc<AppState>>) -> Json<AlertsResponse> {
    let alerts = state.system_monitor.get_active_alerts();
    Json(AlertsResponse {
        count: alerts.len(),
        alerts,
    })
}

/// 알림 이력 (해결된 알림 포함, 최신순).
#[utoipa::path(
    get,
    path = "/api/v1/monitoring/alerts/history",
    tag = "monitoring",
    params(
        ("limit" = Option<usize>, Query, description = "조회할 최대 알림 수 (기본값: 50)")
    ),
    responses(
        (status = 200, description = "알림 이력", body = AlertsResponse)
    )
)]
pub async fn list_alert_history(
    State(state): State<Arc<AppState>>,
    Query(query): Query<LimitQuery>,
) -> ApiResult<Json<AlertsResponse>> {
    query.validate()?;
    let alerts = state.system_monitor.get_alert_history(query.limit);
    Ok(Json(AlertsResponse {
        count: alerts.len(),
        alerts,
    }))
}

/// 알림 해결.
#[utoipa::path(
    post,
    path = "/api/v1/monitoring/alerts/{id}/resolve",
    tag = "monitoring",
    params(
        ("id" = Uuid, Path, description = "알림 ID")
    ),
    responses(
        (status = 200, description = "알림 해결됨", body = ResolveAlertResponse),
        (status = 404, description = "활성 알림 없음", body = crate::error::ApiErrorResponse)
    )
)]
pub async fn resolve_alert(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<ResolveAlertResponse>> {
    if !state.system_monitor.resolve_alert(id) {
        return Err(OnboardError::NotFound(format!("active alert {}", id)).into());
    }
    Ok(Json(ResolveAlertResponse { id, resolved: true }))
}

/// 최근 리소스 샘플.
#[utoipa::path(
    get,
    path = "/api/v1/monitoring/metrics/recent",
    tag = "monitoring",
    params(
        ("limit" = Option<usize>, Query, description = "조회할 최대 샘플 수 (기본값: 50)")
    ),
    responses(
        (status = 200, description = "최근 샘플", body = MetricsResponse)
    )
)]
pub async fn recent_metrics(
    State(state): State<Arc<AppState>>,
    Query(query): Query<LimitQuery>,
) -> ApiResult<Json<MetricsResponse>> {
    query.validate()?;
    let samples = state.system_monitor.get_recent_metrics(query.limit);
    Ok(Json(MetricsResponse {
        count: samples.len(),
        samples,
    }))
}

/// 모니터링 라우터 생성.
pub fn monitoring_router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/status", get(get_status))
        .route("/errors", get(list_errors).delete(clear_errors))
        .route("/errors/summary", get(get_error_summary))
        .route("/errors/stats", get(get_error_stats))
        .route("/alerts", get(list_active_alerts))
        .route("/alerts/history", get(list_alert_history))
        .route("/alerts/{id}/resolve", post(resolve_alert))
        .route("/metrics/recent", get(recent_metrics))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::monitoring::{AlertLevel, ErrorReport};
    use crate::state::create_test_state;
    use axum::{
        body::Body,
        http::{Method, Request, StatusCode},
    };
    use std::collections::HashMap;
    use tower::ServiceExt;

    fn app(state: &AppState) -> Router {
        Router::new()
            .nest("/api/v1/monitoring", monitoring_router())
            .with_state(Arc::new(state.clone()))
    }

    async fn send(app: Router, method: Method, uri: &str) -> (StatusCode, serde_json::Value) {
        let response = app
            .oneshot(
                Request::builder()
                    .method(method)
                    .uri(uri)
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        let status = response.status();
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        (status, serde_json::from_slice(&body).unwrap())
    }

    fn seed_errors(state: &AppState) {
        let tracker = &state.error_tracker;
        tracker.track_error(ErrorReport::new(
            "connection pool exhausted",
            ErrorSeverity::High,
            ErrorCategory::Database,
        ));
        tracker.track_error(ErrorReport::new(
            "empty upload",
            ErrorSeverity::Low,
            ErrorCategory::Validation,
        ));
        tracker.track_error(ErrorReport::new(
            "model overloaded",
            ErrorSeverity::High,
            ErrorCategory::AiService,
        ));
    }

    #[tokio::test]
    async fn test_status_shape() {
        let state = create_test_state();
        let (status, json) = send(app(&state), Method::GET, "/api/v1/monitoring/status").await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["monitoring_active"], false);
        assert_eq!(json["active_alerts"], 0);
        assert_eq!(json["critical_alerts"], 0);
        assert_eq!(json["warning_alerts"], 0);
    }

    #[tokio::test]
    async fn test_list_errors_newest_first_with_filters() {
        let state = create_test_state();
        seed_errors(&state);

        let (status, json) = send(app(&state), Method::GET, "/api/v1/monitoring/errors?limit=2").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["count"], 2);
        assert_eq!(json["total_in_history"], 3);
        assert_eq!(json["errors"][0]["message"], "model overloaded");

        let (_, json) = send(
            app(&state),
            Method::GET,
            "/api/v1/monitoring/errors?severity=high&category=database",
        )
        .await;
        assert_eq!(json["count"], 1);
        assert_eq!(json["errors"][0]["category"], "database");
    }

    #[tokio::test]
    async fn test_list_errors_rejects_unknown_severity() {
        let state = create_test_state();
        let (status, json) = send(
            app(&state),
            Method::GET,
            "/api/v1/monitoring/errors?severity=fatal",
        )
        .await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(json["code"], "VALIDATION_ERROR");
    }

    #[tokio::test]
    async fn test_error_summary() {
        let state = create_test_state();
        seed_errors(&state);

        let (status, json) = send(
            app(&state),
            Method::GET,
            "/api/v1/monitoring/errors/summary?hours=1",
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["total_errors"], 3);
        assert_eq!(json["severity_distribution"]["high"], 2);
        assert_eq!(json["category_distribution"]["validation"], 1);
    }

    #[tokio::test]
    async fn test_error_summary_rejects_out_of_range_hours() {
        let state = create_test_state();
        let (status, json) = send(
            app(&state),
            Method::GET,
            "/api/v1/monitoring/errors/summary?hours=0",
        )
        .await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(json["code"], "VALIDATION_ERROR");
    }

    #[tokio::test]
    async fn test_clear_errors_keeps_stats() {
        let state = create_test_state();
        seed_errors(&state);

        let (status, _) = send(app(&state), Method::DELETE, "/api/v1/monitoring/errors").await;
        assert_eq!(status, StatusCode::OK);
        assert!(state.error_tracker.is_empty());

        let (_, json) = send(app(&state), Method::GET, "/api/v1/monitoring/errors/stats").await;
        assert_eq!(json["total_count"], 3);
    }

    #[tokio::test]
    async fn test_alert_resolve_flow() {
        let state = create_test_state();
        let outcome = state.system_monitor.create_alert(
            AlertLevel::Warning,
            "system",
            "High memory usage",
            HashMap::new(),
        );
        let id = outcome.alert_id();

        let (_, json) = send(app(&state), Method::GET, "/api/v1/monitoring/alerts").await;
        assert_eq!(json["count"], 1);
        assert_eq!(json["alerts"][0]["level"], "warning");

        let uri = format!("/api/v1/monitoring/alerts/{}/resolve", id);
        let (status, json) = send(app(&state), Method::POST, &uri).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["resolved"], true);

        // 두 번째 해결 시도는 404
        let (status, _) = send(app(&state), Method::POST, &uri).await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let (_, json) = send(app(&state), Method::GET, "/api/v1/monitoring/alerts/history").await;
        assert_eq!(json["count"], 1);
        assert_eq!(json["alerts"][0]["active"], false);
    }

    #[tokio::test]
    async fn test_recent_metrics_after_cycle() {
        let state = create_test_state();
        state.system_monitor.run_cycle();
        state.system_monitor.run_cycle();

        let (status, json) = send(
            app(&state),
            Method::GET,
            "/api/v1/monitoring/metrics/recent?limit=1",
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["count"], 1);
        assert_eq!(json["samples"][0]["cpu_percent"], 12.0);
    }
}
