//! 기본 제공 헬스 프로브.

use async_trait::async_trait;
use onboard_core::{OnboardError, OnboardResult};
use serde_json::json;
use sqlx::PgPool;
use std::time::{Duration, Instant};

use super::error_tracker::{ErrorSeverity, ErrorTracker};
use super::health::{HealthProbe, ProbeOutcome};
use super::system_monitor::SystemMonitor;

/// PostgreSQL 연결 프로브 (`SELECT 1`).
///
/// 쿼리가 `slow_threshold`보다 오래 걸리면 degraded.
pub struct DatabaseProbe {
    pool: PgPool,
    slow_threshold: Duration,
}

impl DatabaseProbe {
    /// 새 프로브 생성.
    pub fn new(pool: PgPool, slow_threshold: Duration) -> Self {
        Self {
            pool,
            slow_threshold,
        }
    }
}

#[async_trait]
impl HealthProbe for DatabaseProbe {
    fn name(&self) -> &str {
        "database"
    }

    async fn check(&self) -> OnboardResult<ProbeOutcome> {
        let started = Instant::now();
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map_err(|e| OnboardError::Database(e.to_string()))?;
        let latency = started.elapsed();

        let details = json!({
            "latency_ms": latency.as_millis() as u64,
            "pool_size": self.pool.size(),
            "idle_connections": self.pool.num_idle(),
        });

        let outcome = if latency > self.slow_threshold {
            ProbeOutcome::degraded(format!("slow response: {}ms", latency.as_millis()))
        } else {
            ProbeOutcome::healthy()
        };
        Ok(outcome.with_details(details))
    }
}

/// HTTP GET 프로브 (외부 AI API 등).
///
/// - 2xx → healthy
/// - 429, 그 밖의 4xx → degraded
/// - 5xx, 연결 실패 → unhealthy
pub struct HttpProbe {
    name: String,
    url: String,
    client: reqwest::Client,
}

impl HttpProbe {
    /// 새 프로브 생성.
    pub fn new(name: impl Into<String>, url: impl Into<String>) -> Self {
        Self::with_client(name, url, reqwest::Client::new())
    }

    /// 공유 클라이언트로 생성.
    pub fn with_client(
        name: impl Into<String>,
        url: impl Into<String>,
        client: reqwest::Client,
    ) -> Self {
        Self {
            name: name.into(),
            url: url.into(),
            client,
        }
    }
}

#[async_trait]
impl HealthProbe for HttpProbe {
    fn name(&self) -> &str {
        &self.name
    }

    async fn check(&self) -> OnboardResult<ProbeOutcome> {
        let response = self
            .client
            .get(&self.url)
            .send()
            .await
            .map_err(|e| OnboardError::ExternalApi(format!("{}: {}", self.name, e)))?;

        let status = response.status();
        let details = json!({ "http_status": status.as_u16() });

        if status.is_success() {
            Ok(ProbeOutcome::healthy().with_details(details))
        } else if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            Ok(ProbeOutcome::degraded("rate limited").with_details(details))
        } else if status.is_client_error() {
            Ok(ProbeOutcome::degraded(format!("unexpected status {}", status)).with_details(details))
        } else {
            Err(OnboardError::ExternalApi(format!(
                "{} returned {}",
                self.name, status
            )))
        }
    }
}

/// 에러 추적기 프로브.
///
/// 모니터링이 꺼져 있거나 최근 1시간 Critical 에러가 임계치 이상이면 degraded.
pub struct ErrorTrackerProbe {
    tracker: ErrorTracker,
}

impl ErrorTrackerProbe {
    /// 새 프로브 생성.
    pub fn new(tracker: ErrorTracker) -> Self {
        Self { tracker }
    }
}

#[async_trait]
impl HealthProbe for ErrorTrackerProbe {
    fn name(&self) -> &str {
        "error_tracker"
    }

    async fn check(&self) -> OnboardResult<ProbeOutcome> {
        let hour = chrono::Duration::hours(1);
        let errors_last_hour = self.tracker.count_since(hour, ErrorSeverity::Low);
        let critical_last_hour = self.tracker.count_since(hour, ErrorSeverity::Critical);
        let threshold = self.tracker.config().critical_health_threshold;

        let details = json!({
            "monitoring": self.tracker.is_monitoring(),
            "buffered_errors": self.tracker.len(),
            "errors_last_hour": errors_last_hour,
            "critical_errors_last_hour": critical_last_hour,
        });

        let outcome = if !self.tracker.is_monitoring() {
            ProbeOutcome::degraded("error monitoring inactive")
        } else if critical_last_hour as u64 >= threshold {
            ProbeOutcome::degraded(format!(
                "{} critical errors in the last hour",
                critical_last_hour
            ))
        } else {
            ProbeOutcome::healthy()
        };
        Ok(outcome.with_details(details))
    }
}

/// 시스템 모니터 프로브.
///
/// 루프가 멈춰 있거나 활성 Critical 알림이 있으면 degraded.
pub struct SystemMonitorProbe {
    monitor: SystemMonitor,
}

impl SystemMonitorProbe {
    /// 새 프로브 생성.
    pub fn new(monitor: SystemMonitor) -> Self {
        Self { monitor }
    }
}

#[async_trait]
impl HealthProbe for SystemMonitorProbe {
    fn name(&self) -> &str {
        "system_monitor"
    }

    async fn check(&self) -> OnboardResult<ProbeOutcome> {
        let status = self.monitor.get_system_status();
        let details = serde_json::to_value(&status)?;

        let outcome = if !status.monitoring_active {
            ProbeOutcome::degraded("system monitoring inactive")
        } else if status.critical_alerts > 0 {
            ProbeOutcome::degraded(format!("{} critical alerts active", status.critical_alerts))
        } else {
            ProbeOutcome::healthy()
        };
        Ok(outcome.with_details(details))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::monitoring::error_tracker::{ErrorCategory, ErrorReport};
    use crate::monitoring::health::HealthStatus;
    use crate::monitoring::sampler::{ResourceReading, ScriptedSampler};
    use onboard_core::{system_clock, ErrorTrackerConfig, MonitorConfig};
    use std::collections::HashMap;
    use std::sync::Arc;

    #[tokio::test]
    async fn test_http_probe_status_mapping() {
        let mut server = mockito::Server::new_async().await;
        let ok = server
            .mock("GET", "/ok")
            .with_status(200)
            .create_async()
            .await;
        let limited = server
            .mock("GET", "/limited")
            .with_status(429)
            .create_async()
            .await;
        let broken = server
            .mock("GET", "/broken")
            .with_status(503)
            .create_async()
            .await;

        let probe = HttpProbe::new("ai_service", format!("{}/ok", server.url()));
        assert_eq!(probe.check().await.unwrap().status, HealthStatus::Healthy);

        let probe = HttpProbe::new("ai_service", format!("{}/limited", server.url()));
        assert_eq!(probe.check().await.unwrap().status, HealthStatus::Degraded);

        let probe = HttpProbe::new("ai_service", format!("{}/broken", server.url()));
        assert!(matches!(
            probe.check().await,
            Err(OnboardError::ExternalApi(_))
        ));

        ok.assert_async().await;
        limited.assert_async().await;
        broken.assert_async().await;
    }

    #[tokio::test]
    async fn test_http_probe_connection_refused() {
        let probe = HttpProbe::new("ai_service", "http://127.0.0.1:1/health");
        assert!(probe.check().await.is_err());
    }

    #[tokio::test]
    async fn test_error_tracker_probe() {
        let config = ErrorTrackerConfig {
            critical_health_threshold: 2,
            ..Default::default()
        };
        let tracker = ErrorTracker::new(config, system_clock());
        let probe = ErrorTrackerProbe::new(tracker.clone());

        assert_eq!(probe.check().await.unwrap().status, HealthStatus::Degraded);

        tracker.start_monitoring();
        assert_eq!(probe.check().await.unwrap().status, HealthStatus::Healthy);

        for _ in 0..2 {
            tracker.track_error(ErrorReport::new(
                "panic",
                ErrorSeverity::Critical,
                ErrorCategory::System,
            ));
        }
        let outcome = probe.check().await.unwrap();
        assert_eq!(outcome.status, HealthStatus::Degraded);
        assert_eq!(
            outcome.details.unwrap()["critical_errors_last_hour"],
            json!(2)
        );
        tracker.stop_monitoring();
    }

    #[tokio::test]
    async fn test_system_monitor_probe() {
        let tracker = ErrorTracker::new(ErrorTrackerConfig::default(), system_clock());
        let sampler = ScriptedSampler::constant(ResourceReading::default());
        let monitor = SystemMonitor::new(
            MonitorConfig::default(),
            Arc::new(sampler),
            tracker,
            system_clock(),
        );
        let probe = SystemMonitorProbe::new(monitor.clone());

        assert_eq!(probe.check().await.unwrap().status, HealthStatus::Degraded);

        monitor.start_monitoring();
        assert_eq!(probe.check().await.unwrap().status, HealthStatus::Healthy);

        monitor.create_alert(
            crate::monitoring::AlertLevel::Critical,
            "system",
            "High memory usage",
            HashMap::new(),
        );
        assert_eq!(probe.check().await.unwrap().status, HealthStatus::Degraded);

        monitor.shutdown().await;
    }
}
