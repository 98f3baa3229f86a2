//! API 라우트.
//!
//! # 라우트 구조
//!
//! - `/health` - 헬스 체크 (liveness)
//! - `/health/ready` - 컴포넌트 프로브 집계 (readiness)
//! - `/health/components/{name}` - 단일 컴포넌트 프로브
//! - `/api/v1/monitoring` - 에러 추적, 알림, 시스템 상태

pub mod health;
pub mod monitoring;

pub use health::{health_router, LivenessResponse};
pub use monitoring::{
    monitoring_router, AlertsResponse, ErrorsResponse, MetricsResponse, ResolveAlertResponse,
};

use axum::Router;
use std::sync::Arc;

use crate::state::AppState;

/// 전체 API 라우터 생성.
pub fn create_api_router() -> Router<Arc<AppState>> {
    Router::new()
        .nest("/health", health_router())
        .nest("/api/v1/monitoring", monitoring_router())
}
