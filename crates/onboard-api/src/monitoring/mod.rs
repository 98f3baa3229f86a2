//! 모니터링 모듈.
//!
//! 운영 관측성을 위한 서비스를 제공합니다. 모든 서비스는 명시적으로 생성되어
//! [`AppState`](crate::state::AppState)가 소유하며, 시간은 주입된 [`Clock`](onboard_core::Clock)에서 읽습니다.
//!
//! # 주요 컴포넌트
//!
//! - [`error_tracker`]: 분류된 에러 이벤트 수집, 시간 창 요약
//! - [`system_monitor`]: 백그라운드 샘플링, 중복 제거된 알림
//! - [`health`]: 컴포넌트 프로브 동시 실행 및 상태 집계
//! - [`probes`]: 데이터베이스, HTTP, 내부 서비스용 프로브
//! - [`sampler`]: 호스트 리소스 샘플링
//!
//! # 사용 예시
//!
//! ```rust,ignore
//! use onboard_api::monitoring::{ErrorCategory, ErrorReport, ErrorSeverity};
//!
//! let report = ErrorReport::new("텍스트 추출 실패", ErrorSeverity::Medium, ErrorCategory::DocumentProcessing)
//!     .component("document_parser")
//!     .with_context("file_type", "pdf")
//!     .raw_error(&e);
//!
//! state.error_tracker.track_error(report);
//!
//! let summary = state.error_tracker.get_error_summary(24);
//! ```

pub mod error_tracker;
pub mod health;
pub mod probes;
pub mod sampler;
pub mod system_monitor;

// Re-exports
pub use error_tracker::{
    classify, ErrorCategory, ErrorEvent, ErrorReport, ErrorSeverity, ErrorStats, ErrorSummary,
    ErrorTracker, TimeRange,
};
pub use health::{
    aggregate, FnProbe, HealthCheckResult, HealthOrchestrator, HealthProbe, HealthStatus,
    ProbeOptions, ProbeOutcome, SystemHealthReport,
};
pub use probes::{DatabaseProbe, ErrorTrackerProbe, HttpProbe, SystemMonitorProbe};
pub use sampler::{ResourceReading, ResourceSampler, ScriptedSampler, SysinfoSampler};
pub use system_monitor::{
    Alert, AlertLevel, AlertOutcome, MetricSample, SystemMonitor, SystemStatus,
};
