//! 문서 온보딩 백엔드의 관측성 및 요청 제한 HTTP 서버.
//!
//! 이 크레이트는 다음을 제공합니다:
//! - 클라이언트별 슬라이딩 윈도우 요청 제한
//! - 요청 상관관계 (correlation id, 처리 시간, 실패 기록)
//! - 에러 추적 및 시간 창 요약
//! - 백그라운드 시스템 모니터링과 중복 제거된 알림
//! - 컴포넌트 헬스 체크 집계
//! - Prometheus 메트릭
//!
//! # 모듈 구성
//!
//! - [`state`]: 애플리케이션 공유 상태 (AppState)
//! - [`server`]: 라우터와 미들웨어 스택
//! - [`routes`]: REST API 엔드포인트
//! - [`monitoring`]: 에러 추적기, 시스템 모니터, 헬스 오케스트레이터
//! - [`middleware`]: HTTP 미들웨어
//! - [`metrics`]: Prometheus 메트릭 수집
//! - [`openapi`]: OpenAPI 문서 및 Swagger UI

pub mod error;
pub mod metrics;
pub mod middleware;
pub mod monitoring;
pub mod openapi;
pub mod routes;
pub mod server;
pub mod state;

pub use error::{ApiError, ApiErrorResponse, ApiResult, FailureInfo};
pub use metrics::setup_metrics_recorder;
pub use middleware::{AdmissionDecision, AdmissionGate, Correlator, RequestContext};
pub use monitoring::{
    Alert, AlertLevel, AlertOutcome, ErrorCategory, ErrorEvent, ErrorReport, ErrorSeverity,
    ErrorSummary, ErrorTracker, HealthOrchestrator, HealthProbe, HealthStatus, ProbeOptions,
    ProbeOutcome, SystemHealthReport, SystemMonitor, SystemStatus,
};
pub use routes::create_api_router;
pub use server::create_router;
pub use state::AppState;

#[cfg(any(test, feature = "test-utils"))]
pub use state::{create_test_state, create_test_state_with};
