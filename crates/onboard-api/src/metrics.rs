//! Prometheus 메트릭 설정 및 유틸리티.
//!
//! HTTP 요청, 요청 제한, 에러 추적, 알림, 리소스, 헬스 체크 메트릭을 수집하고
//! `/metrics` 엔드포인트로 노출합니다.
//!
//! 레코더가 설치되지 않은 상태(단위 테스트 등)에서는 모든 헬퍼가 아무 일도 하지 않습니다.

use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::{BuildError, Matcher, PrometheusBuilder, PrometheusHandle};

use crate::monitoring::health::HealthStatus;
use crate::monitoring::sampler::ResourceReading;

/// Prometheus 메트릭 레코더를 설정하고 핸들을 반환합니다.
///
/// 레코더가 이미 설치되어 있으면 에러를 반환합니다.
pub fn setup_metrics_recorder() -> Result<PrometheusHandle, BuildError> {
    PrometheusBuilder::new()
        .set_buckets_for_metric(
            Matcher::Full("http_request_duration_seconds".to_string()),
            &[0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0],
        )?
        .set_buckets_for_metric(
            Matcher::Full("health_check_duration_seconds".to_string()),
            &[0.01, 0.05, 0.1, 0.5, 1.0, 2.0, 5.0, 10.0],
        )?
        .install_recorder()
}

// ============================================================================
// HTTP 메트릭
// ============================================================================

/// HTTP 요청 카운터 증가.
pub fn record_http_request(method: &str, path: &str) {
    counter!("http_requests_total", "method" => method.to_string(), "path" => path.to_string())
        .increment(1);
}

/// HTTP 응답 카운터 증가.
pub fn record_http_response(method: &str, path: &str, status: u16) {
    counter!(
        "http_responses_total",
        "method" => method.to_string(),
        "path" => path.to_string(),
        "status" => status.to_string()
    )
    .increment(1);
}

/// HTTP 요청 지속 시간 기록.
pub fn record_http_duration(method: &str, path: &str, duration_secs: f64) {
    histogram!(
        "http_request_duration_seconds",
        "method" => method.to_string(),
        "path" => path.to_string()
    )
    .record(duration_secs);
}

// ============================================================================
// 요청 제한 메트릭
// ============================================================================

/// 요청 제한 결정 카운터 증가.
pub fn record_admission(admitted: bool) {
    let decision = if admitted { "admitted" } else { "rejected" };
    counter!("admission_decisions_total", "decision" => decision).increment(1);
}

/// 추적 중인 클라이언트 수 설정.
pub fn set_tracked_clients(count: usize) {
    gauge!("admission_tracked_clients").set(count as f64);
}

// ============================================================================
// 에러/알림 메트릭
// ============================================================================

/// 추적된 에러 카운터 증가.
pub fn record_error_tracked(severity: &str, category: &str) {
    counter!(
        "errors_tracked_total",
        "severity" => severity.to_string(),
        "category" => category.to_string()
    )
    .increment(1);
}

/// 생성된 알림 카운터 증가.
pub fn record_alert_created(level: &str, component: &str) {
    counter!(
        "alerts_created_total",
        "level" => level.to_string(),
        "component" => component.to_string()
    )
    .increment(1);
}

/// 활성 알림 수 설정.
pub fn set_active_alerts(count: usize) {
    gauge!("alerts_active").set(count as f64);
}

/// 리소스 사용률 게이지 설정.
pub fn record_resource_usage(reading: &ResourceReading) {
    gauge!("system_cpu_usage_percent").set(reading.cpu_percent);
    gauge!("system_memory_usage_percent").set(reading.memory_percent);
    gauge!("system_disk_usage_percent").set(reading.disk_percent);
}

// ============================================================================
// 헬스 체크 메트릭
// ============================================================================

fn health_value(status: HealthStatus) -> f64 {
    match status {
        HealthStatus::Healthy => 1.0,
        HealthStatus::Degraded => 0.5,
        HealthStatus::Unhealthy => 0.0,
    }
}

/// 컴포넌트 상태 기록 (1 = healthy, 0.5 = degraded, 0 = unhealthy).
pub fn record_component_health(component: &str, status: HealthStatus, response_time_ms: u64) {
    gauge!("health_component_status", "component" => component.to_string())
        .set(health_value(status));
    gauge!("health_component_response_time_ms", "component" => component.to_string())
        .set(response_time_ms as f64);
}

/// 전체 헬스 체크 결과 기록.
pub fn record_health_report(status: HealthStatus, check_duration_ms: u64) {
    gauge!("health_overall_status").set(health_value(status));
    histogram!("health_check_duration_seconds").record(check_duration_ms as f64 / 1000.0);
}

// ============================================================================
// 경로 정규화 유틸리티
// ============================================================================

/// 경로에서 동적 파라미터를 정규화합니다.
///
/// 예: `/api/v1/monitoring/alerts/123e4567-e89b-12d3-a456-426614174000/resolve`
/// → `/api/v1/monitoring/alerts/:id/resolve`
pub fn normalize_path(path: &str) -> String {
    path.split('/')
        .map(|segment| {
            let is_uuid = segment.len() == 36 && segment.chars().filter(|c| *c == '-').count() == 4;
            let is_numeric = !segment.is_empty() && segment.chars().all(|c| c.is_ascii_digit());
            if is_uuid || is_numeric {
                ":id"
            } else {
                segment
            }
        })
        .collect::<Vec<_>>()
        .join("/")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_path_uuid() {
        let path = "/api/v1/monitoring/alerts/123e4567-e89b-12d3-a456-426614174000/resolve";
        assert_eq!(
            normalize_path(path),
            "/api/v1/monitoring/alerts/:id/resolve"
        );
    }

    #[test]
    fn test_normalize_path_numeric() {
        assert_eq!(normalize_path("/api/v1/guides/42"), "/api/v1/guides/:id");
    }

    #[test]
    fn test_normalize_path_no_params() {
        assert_eq!(
            normalize_path("/api/v1/monitoring/status"),
            "/api/v1/monitoring/status"
        );
    }

    #[test]
    fn test_health_value_ordering() {
        assert!(health_value(HealthStatus::Healthy) > health_value(HealthStatus::Degraded));
        assert!(health_value(HealthStatus::Degraded) > health_value(HealthStatus::Unhealthy));
    }

    #[test]
    fn test_helpers_are_noops_without_recorder() {
        record_admission(true);
        record_error_tracked("high", "database");
        set_active_alerts(3);
        record_resource_usage(&ResourceReading::default());
    }
}
