//! 헬스 체크 오케스트레이터.
//!
//! 등록된 컴포넌트 프로브를 동시에 실행하고, 각 프로브는 자체 타임아웃으로 제한됩니다.
//! 타임아웃, 에러, 패닉은 모두 해당 컴포넌트만 `unhealthy`로 기록하며 다른 프로브에 영향을 주지 않습니다.
//!
//! 전체 상태 판정:
//! - 필수 컴포넌트 중 하나라도 `unhealthy` → `unhealthy`
//! - 그렇지 않고 `degraded`가 있거나 선택 컴포넌트가 `unhealthy` → `degraded`
//! - 그 외 → `healthy`

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::future::join_all;
use onboard_core::{OnboardResult, SharedClock};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::future::Future;
use std::sync::{Arc, RwLock};
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, error, info, warn};
use utoipa::ToSchema;

/// 컴포넌트 상태.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    /// 정상
    Healthy,
    /// 부분 장애
    Degraded,
    /// 장애
    Unhealthy,
}

impl std::fmt::Display for HealthStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Healthy => write!(f, "healthy"),
            Self::Degraded => write!(f, "degraded"),
            Self::Unhealthy => write!(f, "unhealthy"),
        }
    }
}

/// 프로브가 돌려주는 결과.
#[derive(Debug, Clone, PartialEq)]
pub struct ProbeOutcome {
    /// 상태
    pub status: HealthStatus,
    /// 상태 사유 (degraded/unhealthy일 때)
    pub message: Option<String>,
    /// 부가 정보
    pub details: Option<serde_json::Value>,
}

impl ProbeOutcome {
    /// 정상.
    pub fn healthy() -> Self {
        Self {
            status: HealthStatus::Healthy,
            message: None,
            details: None,
        }
    }

    /// 부분 장애.
    pub fn degraded(reason: impl Into<String>) -> Self {
        Self {
            status: HealthStatus::Degraded,
            message: Some(reason.into()),
            details: None,
        }
    }

    /// 장애.
    pub fn unhealthy(reason: impl Into<String>) -> Self {
        Self {
            status: HealthStatus::Unhealthy,
            message: Some(reason.into()),
            details: None,
        }
    }

    /// 부가 정보 설정.
    pub fn with_details(mut self, details: serde_json::Value) -> Self {
        self.details = Some(details);
        self
    }
}

/// 컴포넌트 헬스 프로브.
///
/// `Err`는 `unhealthy`로 기록됩니다.
#[async_trait]
pub trait HealthProbe: Send + Sync {
    /// 컴포넌트 이름 (보고서 키).
    fn name(&self) -> &str;

    /// 상태 확인.
    async fn check(&self) -> OnboardResult<ProbeOutcome>;
}

/// 클로저 기반 프로브.
pub struct FnProbe<F> {
    name: String,
    f: F,
}

impl<F> FnProbe<F> {
    /// 새 프로브 생성.
    pub fn new(name: impl Into<String>, f: F) -> Self {
        Self {
            name: name.into(),
            f,
        }
    }
}

#[async_trait]
impl<F, Fut> HealthProbe for FnProbe<F>
where
    F: Fn() -> Fut + Send + Sync,
    Fut: Future<Output = OnboardResult<ProbeOutcome>> + Send + 'static,
{
    fn name(&self) -> &str {
        &self.name
    }

    async fn check(&self) -> OnboardResult<ProbeOutcome> {
        (self.f)().await
    }
}

/// 프로브 등록 옵션.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProbeOptions {
    /// 프로브 타임아웃
    pub timeout: Duration,
    /// 필수 컴포넌트 여부
    pub required: bool,
}

impl ProbeOptions {
    /// 필수 컴포넌트.
    pub fn required(timeout: Duration) -> Self {
        Self {
            timeout,
            required: true,
        }
    }

    /// 선택 컴포넌트.
    pub fn optional(timeout: Duration) -> Self {
        Self {
            timeout,
            required: false,
        }
    }
}

/// 컴포넌트별 헬스 체크 결과.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct HealthCheckResult {
    /// 컴포넌트 이름
    pub component: String,
    /// 상태
    pub status: HealthStatus,
    /// 필수 컴포넌트 여부
    pub required: bool,
    /// 응답 시간 (밀리초)
    pub response_time_ms: u64,
    /// 실패/저하 사유
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// 부가 정보
    #[serde(skip_serializing_if = "Option::is_none")]
    #[schema(value_type = Option<Object>)]
    pub details: Option<serde_json::Value>,
    /// 확인 시각
    pub timestamp: DateTime<Utc>,
}

/// 전체 헬스 보고서.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct SystemHealthReport {
    /// 전체 상태
    pub status: HealthStatus,
    /// 컴포넌트별 결과
    pub components: BTreeMap<String, HealthCheckResult>,
    /// 전체 확인 소요 시간 (밀리초)
    pub check_duration_ms: u64,
    /// 완료 시각
    pub timestamp: DateTime<Utc>,
}

/// 컴포넌트 결과를 전체 상태로 합칩니다.
pub fn aggregate<'a>(results: impl IntoIterator<Item = &'a HealthCheckResult>) -> HealthStatus {
    let mut overall = HealthStatus::Healthy;
    for result in results {
        match (result.status, result.required) {
            (HealthStatus::Unhealthy, true) => return HealthStatus::Unhealthy,
            (HealthStatus::Unhealthy, false) | (HealthStatus::Degraded, _) => {
                overall = HealthStatus::Degraded;
            }
            (HealthStatus::Healthy, _) => {}
        }
    }
    overall
}

#[derive(Clone)]
struct RegisteredProbe {
    probe: Arc<dyn HealthProbe>,
    options: ProbeOptions,
}

/// 헬스 체크 오케스트레이터.
pub struct HealthOrchestrator {
    probes: RwLock<Vec<RegisteredProbe>>,
    clock: SharedClock,
}

impl std::fmt::Debug for HealthOrchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HealthOrchestrator")
            .field("components", &self.components())
            .finish()
    }
}

impl HealthOrchestrator {
    /// 빈 오케스트레이터 생성.
    pub fn new(clock: SharedClock) -> Self {
        Self {
            probes: RwLock::new(Vec::new()),
            clock,
        }
    }

    fn snapshot(&self) -> Vec<RegisteredProbe> {
        self.probes
            .read()
            .unwrap_or_else(|p| p.into_inner())
            .clone()
    }

    /// 프로브 등록. 같은 이름이 있으면 교체합니다.
    pub fn register(&self, probe: impl HealthProbe + 'static, options: ProbeOptions) {
        let name = probe.name().to_string();
        let entry = RegisteredProbe {
            probe: Arc::new(probe),
            options,
        };

        let mut probes = self.probes.write().unwrap_or_else(|p| p.into_inner());
        match probes.iter_mut().find(|p| p.probe.name() == name) {
            Some(existing) => *existing = entry,
            None => probes.push(entry),
        }
        debug!(
            component = %name,
            timeout_ms = options.timeout.as_millis() as u64,
            required = options.required,
            "Health probe registered"
        );
    }

    /// 클로저 프로브 등록.
    pub fn register_fn<F, Fut>(&self, name: impl Into<String>, options: ProbeOptions, f: F)
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = OnboardResult<ProbeOutcome>> + Send + 'static,
    {
        self.register(FnProbe::new(name, f), options);
    }

    /// 등록된 컴포넌트 이름.
    pub fn components(&self) -> Vec<String> {
        self.snapshot()
            .iter()
            .map(|p| p.probe.name().to_string())
            .collect()
    }

    /// 전체 헬스 체크.
    ///
    /// 소요 시간은 가장 느린 프로브(최대 그 타임아웃)에 의해 결정됩니다.
    pub async fn check_system_health(&self) -> SystemHealthReport {
        let started = Instant::now();
        let probes = self.snapshot();

        let results = join_all(probes.into_iter().map(|entry| self.run_probe(entry))).await;

        let status = aggregate(&results);
        let check_duration_ms = started.elapsed().as_millis() as u64;
        let components: BTreeMap<String, HealthCheckResult> = results
            .into_iter()
            .map(|r| (r.component.clone(), r))
            .collect();

        crate::metrics::record_health_report(status, check_duration_ms);
        if status == HealthStatus::Healthy {
            debug!(check_duration_ms, "System health check completed: healthy");
        } else {
            let failing: Vec<&str> = components
                .values()
                .filter(|r| r.status != HealthStatus::Healthy)
                .map(|r| r.component.as_str())
                .collect();
            warn!(%status, ?failing, check_duration_ms, "System health check completed");
        }

        SystemHealthReport {
            status,
            components,
            check_duration_ms,
            timestamp: self.clock.now(),
        }
    }

    /// 단일 컴포넌트 헬스 체크.
    pub async fn check_component(&self, name: &str) -> Option<HealthCheckResult> {
        let entry = self
            .snapshot()
            .into_iter()
            .find(|p| p.probe.name() == name)?;
        Some(self.run_probe(entry).await)
    }

    async fn run_probe(&self, entry: RegisteredProbe) -> HealthCheckResult {
        let component = entry.probe.name().to_string();
        let timeout = entry.options.timeout;
        let started = Instant::now();

        let probe = Arc::clone(&entry.probe);
        let mut handle = tokio::spawn(async move { probe.check().await });

        let outcome = match tokio::time::timeout(timeout, &mut handle).await {
            Ok(Ok(Ok(outcome))) => outcome,
            Ok(Ok(Err(e))) => ProbeOutcome::unhealthy(e.to_string()),
            Ok(Err(join_err)) if join_err.is_panic() => {
                error!(component = %component, "Health probe panicked");
                ProbeOutcome::unhealthy("probe panicked")
            }
            Ok(Err(_)) => ProbeOutcome::unhealthy("probe cancelled"),
            Err(_) => {
                handle.abort();
                ProbeOutcome::unhealthy(format!("timed out after {}ms", timeout.as_millis()))
            }
        };
        let response_time_ms = started.elapsed().as_millis() as u64;

        match outcome.status {
            HealthStatus::Healthy => {}
            HealthStatus::Degraded => info!(
                component = %component,
                reason = ?outcome.message,
                "Component degraded"
            ),
            HealthStatus::Unhealthy => warn!(
                component = %component,
                required = entry.options.required,
                reason = ?outcome.message,
                response_time_ms,
                "Component unhealthy"
            ),
        }
        crate::metrics::record_component_health(&component, outcome.status, response_time_ms);

        HealthCheckResult {
            component,
            status: outcome.status,
            required: entry.options.required,
            response_time_ms,
            error: outcome.message,
            details: outcome.details,
            timestamp: self.clock.now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use onboard_core::{system_clock, OnboardError};

    fn result(status: HealthStatus, required: bool) -> HealthCheckResult {
        HealthCheckResult {
            component: "c".to_string(),
            status,
            required,
            response_time_ms: 0,
            error: None,
            details: None,
            timestamp: Utc::now(),
        }
    }

    #[test]
    fn test_aggregate_rules() {
        use HealthStatus::*;

        assert_eq!(aggregate(&[]), Healthy);
        assert_eq!(
            aggregate(&[result(Healthy, true), result(Healthy, false)]),
            Healthy
        );
        assert_eq!(
            aggregate(&[result(Unhealthy, true), result(Healthy, true)]),
            Unhealthy
        );
        assert_eq!(
            aggregate(&[result(Degraded, true), result(Healthy, true)]),
            Degraded
        );
        assert_eq!(
            aggregate(&[result(Unhealthy, false), result(Healthy, true)]),
            Degraded
        );
        assert_eq!(
            aggregate(&[result(Degraded, false), result(Unhealthy, true)]),
            Unhealthy
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_hung_required_probe_times_out_without_stalling_siblings() {
        let orchestrator = HealthOrchestrator::new(system_clock());

        orchestrator.register_fn(
            "database",
            ProbeOptions::required(Duration::from_secs(2)),
            || std::future::pending::<OnboardResult<ProbeOutcome>>(),
        );
        orchestrator.register_fn(
            "ai_service",
            ProbeOptions::optional(Duration::from_secs(5)),
            || async {
                tokio::time::sleep(Duration::from_millis(100)).await;
                Ok(ProbeOutcome::healthy())
            },
        );

        let report = orchestrator.check_system_health().await;

        let db = &report.components["database"];
        assert_eq!(db.status, HealthStatus::Unhealthy);
        assert!(db.response_time_ms >= 2000);
        assert!(db.error.as_deref().unwrap_or_default().contains("timed out"));

        assert_eq!(report.components["ai_service"].status, HealthStatus::Healthy);
        assert_eq!(report.status, HealthStatus::Unhealthy);

        // 가장 느린 타임아웃에 의해 제한됨
        assert!(report.check_duration_ms >= 2000);
        assert!(report.check_duration_ms < 2100);
    }

    #[tokio::test]
    async fn test_error_and_panic_are_unhealthy() {
        let orchestrator = HealthOrchestrator::new(system_clock());

        orchestrator.register_fn(
            "ai_service",
            ProbeOptions::optional(Duration::from_secs(1)),
            || async { Err(OnboardError::AiService("503".into())) },
        );
        orchestrator.register_fn(
            "parser",
            ProbeOptions::optional(Duration::from_secs(1)),
            || async {
                if true {
                    panic!("probe bug");
                }
                Ok(ProbeOutcome::healthy())
            },
        );
        orchestrator.register_fn(
            "database",
            ProbeOptions::required(Duration::from_secs(1)),
            || async { Ok(ProbeOutcome::healthy()) },
        );

        let report = orchestrator.check_system_health().await;

        assert_eq!(report.components["ai_service"].status, HealthStatus::Unhealthy);
        assert_eq!(report.components["parser"].status, HealthStatus::Unhealthy);
        assert_eq!(
            report.components["parser"].error.as_deref(),
            Some("probe panicked")
        );
        assert_eq!(report.components["database"].status, HealthStatus::Healthy);
        // 선택 컴포넌트 장애만 있으므로 degraded
        assert_eq!(report.status, HealthStatus::Degraded);
    }

    #[tokio::test]
    async fn test_all_healthy_and_degraded() {
        let orchestrator = HealthOrchestrator::new(system_clock());
        for name in ["database", "error_tracker"] {
            orchestrator.register_fn(
                name,
                ProbeOptions::required(Duration::from_secs(1)),
                || async { Ok(ProbeOutcome::healthy()) },
            );
        }
        assert_eq!(
            orchestrator.check_system_health().await.status,
            HealthStatus::Healthy
        );

        orchestrator.register_fn(
            "system_monitor",
            ProbeOptions::required(Duration::from_secs(1)),
            || async { Ok(ProbeOutcome::degraded("not running")) },
        );
        let report = orchestrator.check_system_health().await;
        assert_eq!(report.status, HealthStatus::Degraded);
        assert_eq!(report.components.len(), 3);
    }

    #[tokio::test]
    async fn test_register_replaces_same_name() {
        let orchestrator = HealthOrchestrator::new(system_clock());
        orchestrator.register_fn(
            "database",
            ProbeOptions::required(Duration::from_secs(1)),
            || async { Ok(ProbeOutcome::unhealthy("down")) },
        );
        orchestrator.register_fn(
            "database",
            ProbeOptions::required(Duration::from_secs(1)),
            || async { Ok(ProbeOutcome::healthy()) },
        );

        assert_eq!(orchestrator.components(), vec!["database".to_string()]);
        let result = orchestrator.check_component("database").await.unwrap();
        assert_eq!(result.status, HealthStatus::Healthy);
        assert!(orchestrator.check_component("redis").await.is_none());
    }
}
