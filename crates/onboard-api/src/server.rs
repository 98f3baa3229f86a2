//! 전체 라우터와 미들웨어 스택 구성.
//!
//! 요청은 바깥에서 안쪽으로 다음 순서로 처리됩니다:
//!
//! 1. CORS
//! 2. HTTP 트레이스
//! 3. 메트릭 수집
//! 4. 요청 상관관계 (correlation id, 처리 시간, 실패 기록)
//! 5. 요청 제한 (API 라우트만, 설정에 따라)
//! 6. 요청 타임아웃 (408)
//! 7. 패닉 복구 (500)

use axum::{extract::State, http::StatusCode, middleware, routing::get, Router};
use metrics_exporter_prometheus::PrometheusHandle;
use onboard_core::ServerConfig;
use std::sync::Arc;
use std::time::Duration;
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use crate::error::handle_panic;
use crate::middleware::{correlation_middleware, metrics_layer, rate_limit_middleware};
use crate::openapi::swagger_ui_router;
use crate::routes::create_api_router;
use crate::state::AppState;

/// CORS 레이어 생성.
///
/// `server.cors_origins`가 비어 있으면 모든 origin을 허용합니다 (개발 모드).
pub fn cors_layer(config: &ServerConfig) -> CorsLayer {
    let origins: Vec<_> = config
        .cors_origins
        .iter()
        .filter_map(|s| s.trim().parse().ok())
        .collect();

    let restricted = !origins.is_empty();
    let allow_origin = if restricted {
        info!("CORS configured with {} allowed origins", origins.len());
        AllowOrigin::list(origins)
    } else {
        if !config.cors_origins.is_empty() {
            warn!("cors_origins contains no valid origins, allowing any");
        }
        AllowOrigin::any()
    };

    CorsLayer::new()
        .allow_origin(allow_origin)
        .allow_methods([
            axum::http::Method::GET,
            axum::http::Method::POST,
            axum::http::Method::DELETE,
            axum::http::Method::OPTIONS,
        ])
        .allow_headers([
            axum::http::header::CONTENT_TYPE,
            axum::http::header::AUTHORIZATION,
            axum::http::header::ACCEPT,
        ])
        .expose_headers([
            crate::middleware::CORRELATION_ID_HEADER.clone(),
            crate::middleware::PROCESS_TIME_HEADER.clone(),
        ])
        // 자격 증명은 origin 목록이 있을 때만 허용
        .allow_credentials(restricted)
        .max_age(Duration::from_secs(3600))
}

/// /metrics 엔드포인트 핸들러.
async fn metrics_handler(State(handle): State<PrometheusHandle>) -> String {
    handle.render()
}

/// 전체 라우터 생성.
///
/// `metrics_handle`이 없으면 `/metrics` 엔드포인트를 만들지 않습니다.
pub fn create_router(state: Arc<AppState>, metrics_handle: Option<PrometheusHandle>) -> Router {
    let config = state.config.clone();
    let correlator = state.correlator();
    let gate = state.gate.clone();

    let api_router = create_api_router()
        .with_state(state)
        .layer(CatchPanicLayer::custom(handle_panic))
        .layer(TimeoutLayer::with_status_code(
            StatusCode::REQUEST_TIMEOUT,
            config.server.request_timeout(),
        ));

    let api_router = if config.rate_limit.enabled {
        info!(
            requests_per_minute = config.rate_limit.requests_per_minute,
            "Rate limiting configured"
        );
        api_router.layer(middleware::from_fn_with_state(gate, rate_limit_middleware))
    } else {
        info!("Rate limiting DISABLED (rate_limit.enabled = false)");
        api_router
    };

    let mut router = Router::new().merge(api_router).merge(swagger_ui_router());

    // 메트릭 라우터 (별도 상태, Rate Limit 제외)
    if let Some(handle) = metrics_handle {
        router = router.merge(
            Router::new()
                .route("/metrics", get(metrics_handler))
                .with_state(handle),
        );
    }

    router
        .layer(middleware::from_fn_with_state(
            correlator,
            correlation_middleware,
        ))
        .layer(middleware::from_fn(metrics_layer))
        .layer(TraceLayer::new_for_http())
        .layer(cors_layer(&config.server))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cors_layer_with_origins() {
        let config = ServerConfig {
            cors_origins: vec!["https://app.example.com".to_string()],
            ..Default::default()
        };
        let _layer = cors_layer(&config);
    }

    #[test]
    fn test_cors_layer_any_origin() {
        let _layer = cors_layer(&ServerConfig::default());
    }
}
