//! OpenAPI 문서화 설정.
//!
//! utoipa를 사용하여 REST API의 OpenAPI 3.0 스펙을 생성합니다.
//! Swagger UI는 `/swagger-ui` 경로에서 사용 가능합니다.
//!
//! 새로운 엔드포인트를 추가할 때:
//!
//! 1. 응답/요청 타입에 `#[derive(ToSchema)]` 추가
//! 2. 핸들러에 `#[utoipa::path(...)]` 어노테이션 추가
//! 3. 이 파일의 `components(schemas(...))` 및 `paths(...)` 섹션에 추가

use axum::Router;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::error::ApiErrorResponse;
use crate::monitoring::{
    Alert, AlertLevel, ErrorCategory, ErrorEvent, ErrorSeverity, ErrorStats, ErrorSummary,
    HealthCheckResult, HealthStatus, MetricSample, SystemHealthReport, SystemStatus, TimeRange,
};
use crate::routes::{
    AlertsResponse, ErrorsResponse, LivenessResponse, MetricsResponse, ResolveAlertResponse,
};

/// Onboard API 문서.
#[derive(OpenApi)]
#[openapi(
    info(
        title = "Onboard Observability API",
        version = "0.1.0",
        description = r#"
# 문서 온보딩 백엔드 운영 API

요청 제한, 에러 추적, 시스템 모니터링, 헬스 체크 엔드포인트입니다.

## 공통 응답 헤더

- `x-correlation-id`: 요청 식별자 (로그와 에러 이벤트에 기록됨)
- `x-process-time`: 서버 처리 시간 (초)

## 요청 제한

클라이언트별 60초 슬라이딩 윈도우를 적용합니다. 한도를 넘으면 429와
`Retry-After` 헤더를 반환합니다.
"#,
    ),
    servers(
        (url = "http://localhost:8000", description = "로컬 개발 서버"),
    ),
    tags(
        (name = "health", description = "헬스 체크 - 서버 및 컴포넌트 상태"),
        (name = "monitoring", description = "모니터링 - 에러 추적, 알림, 리소스 샘플")
    ),
    components(
        schemas(
            // ===== Common =====
            ApiErrorResponse,

            // ===== Health =====
            LivenessResponse,
            SystemHealthReport,
            HealthCheckResult,
            HealthStatus,

            // ===== Monitoring =====
            SystemStatus,
            ErrorsResponse,
            ErrorEvent,
            ErrorSeverity,
            ErrorCategory,
            ErrorSummary,
            TimeRange,
            ErrorStats,
            AlertsResponse,
            Alert,
            AlertLevel,
            ResolveAlertResponse,
            MetricsResponse,
            MetricSample,
        )
    ),
    paths(
        // ===== Health =====
        crate::routes::health::health_check,
        crate::routes::health::health_ready,
        crate::routes::health::health_component,

        // ===== Monitoring =====
        crate::routes::monitoring::get_status,
        crate::routes::monitoring::list_errors,
        crate::routes::monitoring::clear_errors,
        crate::routes::monitoring::get_error_summary,
        crate::routes::monitoring::get_error_stats,
        crate::routes::monitoring::list_active_alerts,
        crate::routes::monitoring::list_alert_history,
        crate::routes::monitoring::resolve_alert,
        crate::routes::monitoring::recent_metrics,
    )
)]
pub struct ApiDoc;

/// Swagger UI 라우터 생성.
///
/// - `/swagger-ui` - Swagger UI 대화형 문서
/// - `/api-docs/openapi.json` - OpenAPI JSON 스펙
pub fn swagger_ui_router<S>() -> Router<S>
where
    S: Clone + Send + Sync + 'static,
{
    SwaggerUi::new("/swagger-ui")
        .url("/api-docs/openapi.json", ApiDoc::openapi())
        .into()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_openapi_spec_valid() {
        let doc = ApiDoc::openapi();
        let json = serde_json::to_string_pretty(&doc).unwrap();

        assert!(json.contains("Onboard Observability API"));
        assert!(json.contains("/health/ready"));
        assert!(json.contains("/api/v1/monitoring/status"));
        assert!(json.contains("/api/v1/monitoring/errors/summary"));
        assert!(json.contains("/api/v1/monitoring/alerts/{id}/resolve"));
    }

    #[test]
    fn test_openapi_contains_schemas() {
        let json = serde_json::to_string(&ApiDoc::openapi()).unwrap();

        assert!(json.contains("SystemHealthReport"));
        assert!(json.contains("ErrorSummary"));
        assert!(json.contains("ApiErrorResponse"));
    }

    #[test]
    fn test_swagger_ui_router_creates() {
        let _router: Router<()> = swagger_ui_router();
    }
}
