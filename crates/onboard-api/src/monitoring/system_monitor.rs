//! 시스템 모니터.
//!
//! 전용 백그라운드 태스크가 주기적으로 리소스와 에러 추적기 상태를 샘플링하고,
//! 임계치를 넘으면 알림을 생성합니다. 같은 조건(컴포넌트, 레벨, 메시지)의 알림은
//! 활성 상태인 동안 하나만 존재합니다.
//!
//! 상태 전이: `Idle → Running → Idle` (`start_monitoring` / `stop_monitoring`).
//!
//! # 알림 해결 정책
//!
//! 기본값(`auto_resolve = false`)에서는 알림이 명시적 해결(`resolve_alert`,
//! `resolve_condition`) 또는 모니터링 중지로만 비활성화됩니다.
//! `auto_resolve = true`이면 모니터가 평가한 조건이 임계치 아래로 돌아온 사이클에서
//! 해당 알림을 모니터 스스로 해결합니다.

use chrono::{DateTime, Duration, Utc};
use onboard_core::{MonitorConfig, SharedClock};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, RwLock, RwLockReadGuard, RwLockWriteGuard};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use utoipa::ToSchema;
use uuid::Uuid;

use super::error_tracker::{ErrorSeverity, ErrorTracker};
use super::sampler::{ResourceReading, ResourceSampler};

/// 알림 레벨. 순서: `Info < Warning < Critical`.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, ToSchema,
)]
#[serde(rename_all = "lowercase")]
pub enum AlertLevel {
    /// 정보
    Info,
    /// 경고
    Warning,
    /// 위험
    Critical,
}

impl std::fmt::Display for AlertLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Info => write!(f, "info"),
            Self::Warning => write!(f, "warning"),
            Self::Critical => write!(f, "critical"),
        }
    }
}

/// 알림.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct Alert {
    /// 알림 ID
    pub id: Uuid,
    /// 레벨
    pub level: AlertLevel,
    /// 대상 컴포넌트
    pub component: String,
    /// 조건 메시지 (중복 제거 키의 일부)
    pub message: String,
    /// 측정값, 임계치 등
    #[schema(value_type = Object)]
    pub details: HashMap<String, serde_json::Value>,
    /// 생성 시각
    pub created_at: DateTime<Utc>,
    /// 활성 여부
    pub active: bool,
    /// 해결 시각
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resolved_at: Option<DateTime<Utc>>,
}

/// `create_alert` 결과.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AlertOutcome {
    /// 새 알림 생성
    Created(Uuid),
    /// 같은 조건의 활성 알림이 이미 있음
    Deduplicated(Uuid),
}

impl AlertOutcome {
    /// 대상 알림 ID.
    pub fn alert_id(&self) -> Uuid {
        match self {
            Self::Created(id) | Self::Deduplicated(id) => *id,
        }
    }

    /// 새로 생성되었는지 여부.
    pub fn is_created(&self) -> bool {
        matches!(self, Self::Created(_))
    }
}

/// 샘플링 주기마다 기록되는 메트릭.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct MetricSample {
    /// 샘플 시각 (단조 증가)
    pub timestamp: DateTime<Utc>,
    /// CPU 사용률 (%)
    pub cpu_percent: f64,
    /// 메모리 사용률 (%)
    pub memory_percent: f64,
    /// 디스크 사용률 (%)
    pub disk_percent: f64,
    /// 최근 1시간 에러 수
    pub errors_last_hour: usize,
    /// 최근 1시간 Critical 에러 수
    pub critical_errors_last_hour: usize,
    /// 샘플 시점 활성 알림 수
    pub active_alerts: usize,
}

/// 시스템 상태 요약.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct SystemStatus {
    /// 모니터링 루프 실행 여부
    pub monitoring_active: bool,
    /// 활성 알림 수
    pub active_alerts: usize,
    /// 활성 Critical 알림 수
    pub critical_alerts: usize,
    /// 활성 Warning 알림 수
    pub warning_alerts: usize,
    /// 마지막 샘플 시각
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_sample_at: Option<DateTime<Utc>>,
}

type AlertKey = (String, AlertLevel, String);

#[derive(Default)]
struct AlertRegistry {
    /// 조건별 활성 알림
    active: HashMap<AlertKey, Alert>,
    /// 생성 순서 히스토리 (해결된 알림 포함)
    history: VecDeque<Alert>,
}

impl AlertRegistry {
    fn mark_resolved(&mut self, id: Uuid, at: DateTime<Utc>) {
        if let Some(entry) = self.history.iter_mut().rev().find(|a| a.id == id) {
            entry.active = false;
            entry.resolved_at = Some(at);
        }
    }
}

struct MonitorTask {
    shutdown: CancellationToken,
    handle: JoinHandle<()>,
}

/// 모니터가 평가하는 조건.
struct Breach {
    level: AlertLevel,
    component: &'static str,
    message: &'static str,
    details: HashMap<String, serde_json::Value>,
}

const SYSTEM_COMPONENT: &str = "system";
const TRACKER_COMPONENT: &str = "error_tracker";

const CPU_MESSAGE: &str = "High CPU usage";
const MEMORY_MESSAGE: &str = "High memory usage";
const DISK_MESSAGE: &str = "High disk usage";
const ERROR_RATE_MESSAGE: &str = "Elevated error rate";
const CRITICAL_ERRORS_MESSAGE: &str = "Critical errors detected";

/// 시스템 모니터 (복제 시 상태 공유).
#[derive(Clone)]
pub struct SystemMonitor {
    shared: Arc<MonitorShared>,
}

struct MonitorShared {
    config: MonitorConfig,
    clock: SharedClock,
    sampler: Arc<dyn ResourceSampler>,
    error_tracker: ErrorTracker,
    alerts: RwLock<AlertRegistry>,
    metrics: RwLock<VecDeque<MetricSample>>,
    task: Mutex<Option<MonitorTask>>,
}

impl std::fmt::Debug for SystemMonitor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SystemMonitor")
            .field("config", &self.shared.config)
            .field("running", &self.is_running())
            .finish()
    }
}

impl SystemMonitor {
    /// 새 모니터 생성.
    pub fn new(
        config: MonitorConfig,
        sampler: Arc<dyn ResourceSampler>,
        error_tracker: ErrorTracker,
        clock: SharedClock,
    ) -> Self {
        Self {
            shared: Arc::new(MonitorShared {
                config,
                clock,
                sampler,
                error_tracker,
                alerts: RwLock::new(AlertRegistry::default()),
                metrics: RwLock::new(VecDeque::new()),
                task: Mutex::new(None),
            }),
        }
    }

    /// 설정 조회.
    pub fn config(&self) -> &MonitorConfig {
        &self.shared.config
    }

    fn alerts_read(&self) -> RwLockReadGuard<'_, AlertRegistry> {
        match self.shared.alerts.read() {
            Ok(guard) => guard,
            Err(poisoned) => {
                error!("Alert registry RwLock poisoned (read), recovering");
                poisoned.into_inner()
            }
        }
    }

    fn alerts_write(&self) -> RwLockWriteGuard<'_, AlertRegistry> {
        match self.shared.alerts.write() {
            Ok(guard) => guard,
            Err(poisoned) => {
                error!("Alert registry RwLock poisoned (write), recovering");
                poisoned.into_inner()
            }
        }
    }

    fn metrics_read(&self) -> RwLockReadGuard<'_, VecDeque<MetricSample>> {
        match self.shared.metrics.read() {
            Ok(guard) => guard,
            Err(poisoned) => {
                error!("Metric buffer RwLock poisoned (read), recovering");
                poisoned.into_inner()
            }
        }
    }

    fn metrics_write(&self) -> RwLockWriteGuard<'_, VecDeque<MetricSample>> {
        match self.shared.metrics.write() {
            Ok(guard) => guard,
            Err(poisoned) => {
                error!("Metric buffer RwLock poisoned (write), recovering");
                poisoned.into_inner()
            }
        }
    }

    // ==================== 생명주기 ====================

    /// 모니터링 루프 실행 여부.
    pub fn is_running(&self) -> bool {
        self.shared
            .task
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .as_ref()
            .is_some_and(|task| !task.shutdown.is_cancelled())
    }

    /// 모니터링 시작 (멱등). 즉시 반환합니다.
    ///
    /// tokio 런타임 밖에서 호출되면 루프를 시작하지 못하고 에러 로그만 남깁니다.
    pub fn start_monitoring(&self) {
        let mut task = self.shared.task.lock().unwrap_or_else(|p| p.into_inner());
        if task
            .as_ref()
            .is_some_and(|running| !running.shutdown.is_cancelled())
        {
            debug!("System monitor already running");
            return;
        }

        let handle = match tokio::runtime::Handle::try_current() {
            Ok(handle) => handle,
            Err(_) => {
                error!("System monitor requires a tokio runtime; not started");
                return;
            }
        };

        let shutdown = CancellationToken::new();
        let join = handle.spawn(run_loop(self.clone(), shutdown.clone()));
        *task = Some(MonitorTask {
            shutdown,
            handle: join,
        });

        info!(
            interval_secs = self.shared.config.sampling_interval_secs,
            auto_resolve = self.shared.config.auto_resolve,
            "System monitor started"
        );
    }

    fn take_task(&self) -> Option<MonitorTask> {
        let task = self
            .shared
            .task
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .take();
        if let Some(ref task) = task {
            task.shutdown.cancel();
        }
        task
    }

    /// 모니터링 중지 (멱등). 대기 중인 샘플링 타이머를 즉시 취소하고 반환합니다.
    ///
    /// 모든 활성 알림은 비활성화됩니다.
    pub fn stop_monitoring(&self) {
        if self.take_task().is_none() {
            debug!("System monitor already stopped");
            return;
        }
        self.deactivate_all();
        info!("System monitor stopped");
    }

    /// 모니터링을 중지하고 루프 태스크 종료를 기다립니다.
    pub async fn shutdown(&self) {
        let Some(task) = self.take_task() else {
            return;
        };
        if let Err(e) = task.handle.await {
            warn!(error = %e, "System monitor task ended abnormally");
        }
        self.deactivate_all();
        info!("System monitor shut down");
    }

    fn deactivate_all(&self) {
        let now = self.shared.clock.now();
        let mut registry = self.alerts_write();
        let keys: Vec<AlertKey> = registry.active.keys().cloned().collect();
        for key in keys {
            if let Some(alert) = registry.active.remove(&key) {
                registry.mark_resolved(alert.id, now);
            }
        }
        crate::metrics::set_active_alerts(0);
    }

    // ==================== 샘플링 ====================

    /// 샘플링 한 사이클 실행: 샘플 → 임계치 평가 → 알림 생성.
    ///
    /// 리소스 샘플링이 실패해도 에러 추적기 조건은 평가합니다.
    /// 샘플이 기록되었으면 반환합니다.
    pub fn run_cycle(&self) -> Option<MetricSample> {
        self.run_cycle_until(None)
    }

    /// 루프 토큰이 취소된 뒤에는 알림도 샘플도 남기지 않는 사이클.
    fn run_cycle_until(&self, shutdown: Option<&CancellationToken>) -> Option<MetricSample> {
        let thresholds = &self.shared.config.thresholds;
        let tracker = &self.shared.error_tracker;

        let reading = match self.shared.sampler.sample() {
            Ok(reading) => Some(reading),
            Err(e) => {
                warn!(error = %e, "Resource sampling failed, retrying next tick");
                None
            }
        };

        let errors_last_hour = tracker.count_since(Duration::hours(1), ErrorSeverity::Low);
        let critical_errors_last_hour =
            tracker.count_since(Duration::hours(1), ErrorSeverity::Critical);

        let mut breaches = Vec::new();
        let mut evaluated: Vec<(&str, &str)> = vec![
            (TRACKER_COMPONENT, ERROR_RATE_MESSAGE),
            (TRACKER_COMPONENT, CRITICAL_ERRORS_MESSAGE),
        ];

        if let Some(reading) = reading {
            crate::metrics::record_resource_usage(&reading);
            evaluated.extend([
                (SYSTEM_COMPONENT, CPU_MESSAGE),
                (SYSTEM_COMPONENT, MEMORY_MESSAGE),
                (SYSTEM_COMPONENT, DISK_MESSAGE),
            ]);
            breaches.extend(percent_breach(
                CPU_MESSAGE,
                "cpu_percent",
                reading.cpu_percent,
                thresholds.cpu_warning,
                thresholds.cpu_critical,
            ));
            breaches.extend(percent_breach(
                MEMORY_MESSAGE,
                "memory_percent",
                reading.memory_percent,
                thresholds.memory_warning,
                thresholds.memory_critical,
            ));
            breaches.extend(percent_breach(
                DISK_MESSAGE,
                "disk_percent",
                reading.disk_percent,
                thresholds.disk_warning,
                thresholds.disk_critical,
            ));
        }

        if errors_last_hour as u64 >= thresholds.errors_per_hour_warning {
            breaches.push(Breach {
                level: AlertLevel::Warning,
                component: TRACKER_COMPONENT,
                message: ERROR_RATE_MESSAGE,
                details: HashMap::from([
                    ("errors_last_hour".to_string(), errors_last_hour.into()),
                    (
                        "threshold".to_string(),
                        thresholds.errors_per_hour_warning.into(),
                    ),
                ]),
            });
        }
        if critical_errors_last_hour as u64 >= thresholds.critical_errors_per_hour {
            breaches.push(Breach {
                level: AlertLevel::Critical,
                component: TRACKER_COMPONENT,
                message: CRITICAL_ERRORS_MESSAGE,
                details: HashMap::from([
                    (
                        "critical_errors_last_hour".to_string(),
                        critical_errors_last_hour.into(),
                    ),
                    (
                        "threshold".to_string(),
                        thresholds.critical_errors_per_hour.into(),
                    ),
                ]),
            });
        }

        if self.shared.config.auto_resolve {
            self.resolve_recovered(&evaluated, &breaches);
        }

        for breach in breaches {
            if self.create_alert_unless_stopped(breach, shutdown).is_none() {
                debug!("System monitor stopped mid-cycle, dropping breaches");
                return None;
            }
        }

        let reading = reading?;
        let active_alerts = self.alerts_read().active.len();
        self.record_sample(
            reading,
            errors_last_hour,
            critical_errors_last_hour,
            active_alerts,
            shutdown,
        )
    }

    fn resolve_recovered(&self, evaluated: &[(&str, &str)], breaches: &[Breach]) {
        let now = self.shared.clock.now();
        let mut registry = self.alerts_write();
        let recovered: Vec<AlertKey> = registry
            .active
            .keys()
            .filter(|(component, level, message)| {
                evaluated
                    .iter()
                    .any(|(c, m)| c == component && m == message)
                    && !breaches.iter().any(|b| {
                        b.component == component && b.message == message && b.level == *level
                    })
            })
            .cloned()
            .collect();

        for key in recovered {
            if let Some(alert) = registry.active.remove(&key) {
                info!(alert_id = %alert.id, component = %alert.component, message = %alert.message, "Alert auto-resolved");
                registry.mark_resolved(alert.id, now);
            }
        }
        crate::metrics::set_active_alerts(registry.active.len());
    }

    fn record_sample(
        &self,
        reading: ResourceReading,
        errors_last_hour: usize,
        critical_errors_last_hour: usize,
        active_alerts: usize,
        shutdown: Option<&CancellationToken>,
    ) -> Option<MetricSample> {
        let mut metrics = self.metrics_write();
        if shutdown.is_some_and(|token| token.is_cancelled()) {
            return None;
        }

        let mut timestamp = self.shared.clock.now();
        if let Some(last) = metrics.back() {
            if timestamp <= last.timestamp {
                timestamp = last.timestamp + Duration::milliseconds(1);
            }
        }

        let sample = MetricSample {
            timestamp,
            cpu_percent: reading.cpu_percent,
            memory_percent: reading.memory_percent,
            disk_percent: reading.disk_percent,
            errors_last_hour,
            critical_errors_last_hour,
            active_alerts,
        };
        metrics.push_back(sample.clone());

        while metrics.len() > self.shared.config.metrics_capacity {
            metrics.pop_front();
        }
        let cutoff = timestamp - self.shared.config.metrics_retention();
        while metrics.front().is_some_and(|s| s.timestamp < cutoff) {
            metrics.pop_front();
        }

        debug!(
            cpu = sample.cpu_percent,
            memory = sample.memory_percent,
            disk = sample.disk_percent,
            errors_last_hour,
            active_alerts,
            "Metric sample recorded"
        );
        Some(sample)
    }

    // ==================== 알림 ====================

    /// 알림 생성.
    ///
    /// 같은 (컴포넌트, 레벨, 메시지)의 활성 알림이 있으면 아무것도 바꾸지 않고
    /// 기존 ID를 돌려줍니다. 확인과 삽입은 하나의 쓰기 잠금 안에서 수행됩니다.
    pub fn create_alert(
        &self,
        level: AlertLevel,
        component: impl Into<String>,
        message: impl Into<String>,
        details: HashMap<String, serde_json::Value>,
    ) -> AlertOutcome {
        let mut registry = self.alerts_write();
        self.insert_alert(&mut registry, level, component.into(), message.into(), details)
    }

    /// 루프 토큰이 취소되었으면 삽입하지 않고 `None`을 반환합니다.
    ///
    /// 취소 확인은 쓰기 잠금 안에서 하므로 `deactivate_all` 이후에 알림이 남지 않습니다.
    fn create_alert_unless_stopped(
        &self,
        breach: Breach,
        shutdown: Option<&CancellationToken>,
    ) -> Option<AlertOutcome> {
        let mut registry = self.alerts_write();
        if shutdown.is_some_and(|token| token.is_cancelled()) {
            return None;
        }
        Some(self.insert_alert(
            &mut registry,
            breach.level,
            breach.component.to_string(),
            breach.message.to_string(),
            breach.details,
        ))
    }

    fn insert_alert(
        &self,
        registry: &mut AlertRegistry,
        level: AlertLevel,
        component: String,
        message: String,
        details: HashMap<String, serde_json::Value>,
    ) -> AlertOutcome {
        let key: AlertKey = (component.clone(), level, message.clone());
        let now = self.shared.clock.now();

        if let Some(existing) = registry.active.get(&key) {
            return AlertOutcome::Deduplicated(existing.id);
        }

        let alert = Alert {
            id: Uuid::new_v4(),
            level,
            component,
            message,
            details,
            created_at: now,
            active: true,
            resolved_at: None,
        };
        let id = alert.id;

        match level {
            AlertLevel::Critical => error!(alert_id = %id, component = %alert.component, details = ?alert.details, "[ALERT CRITICAL] {}", alert.message),
            AlertLevel::Warning => warn!(alert_id = %id, component = %alert.component, details = ?alert.details, "[ALERT WARNING] {}", alert.message),
            AlertLevel::Info => info!(alert_id = %id, component = %alert.component, "[ALERT INFO] {}", alert.message),
        }
        crate::metrics::record_alert_created(&level.to_string(), &alert.component);

        registry.active.insert(key, alert.clone());
        registry.history.push_back(alert);
        while registry.history.len() > self.shared.config.alert_history_capacity {
            registry.history.pop_front();
        }
        crate::metrics::set_active_alerts(registry.active.len());

        AlertOutcome::Created(id)
    }

    /// ID로 알림 해결. 활성 알림이 있었으면 `true`.
    pub fn resolve_alert(&self, id: Uuid) -> bool {
        let now = self.shared.clock.now();
        let mut registry = self.alerts_write();
        let key = registry
            .active
            .iter()
            .find(|(_, alert)| alert.id == id)
            .map(|(key, _)| key.clone());

        let Some(key) = key else {
            return false;
        };
        registry.active.remove(&key);
        registry.mark_resolved(id, now);
        crate::metrics::set_active_alerts(registry.active.len());
        info!(alert_id = %id, "Alert resolved");
        true
    }

    /// 조건으로 알림 해결. 활성 알림이 있었으면 `true`.
    pub fn resolve_condition(&self, component: &str, level: AlertLevel, message: &str) -> bool {
        let now = self.shared.clock.now();
        let mut registry = self.alerts_write();
        let key: AlertKey = (component.to_string(), level, message.to_string());
        let Some(alert) = registry.active.remove(&key) else {
            return false;
        };
        registry.mark_resolved(alert.id, now);
        crate::metrics::set_active_alerts(registry.active.len());
        info!(alert_id = %alert.id, component, message, "Alert resolved");
        true
    }

    /// 활성 알림 목록 (레벨 높은 순, 같은 레벨은 생성 순).
    pub fn get_active_alerts(&self) -> Vec<Alert> {
        let mut alerts: Vec<Alert> = self.alerts_read().active.values().cloned().collect();
        alerts.sort_by(|a, b| {
            b.level
                .cmp(&a.level)
                .then_with(|| a.created_at.cmp(&b.created_at))
        });
        alerts
    }

    /// 알림 히스토리 (최신순, 해결된 알림 포함).
    pub fn get_alert_history(&self, limit: usize) -> Vec<Alert> {
        self.alerts_read()
            .history
            .iter()
            .rev()
            .take(limit)
            .cloned()
            .collect()
    }

    // ==================== 조회 ====================

    /// 시스템 상태 요약.
    pub fn get_system_status(&self) -> SystemStatus {
        let monitoring_active = self.is_running();
        let (active_alerts, critical_alerts, warning_alerts) = {
            let registry = self.alerts_read();
            let count = |level: AlertLevel| {
                registry
                    .active
                    .values()
                    .filter(|alert| alert.level == level)
                    .count()
            };
            (
                registry.active.len(),
                count(AlertLevel::Critical),
                count(AlertLevel::Warning),
            )
        };
        let last_sample_at = self.metrics_read().back().map(|s| s.timestamp);

        SystemStatus {
            monitoring_active,
            active_alerts,
            critical_alerts,
            warning_alerts,
            last_sample_at,
        }
    }

    /// 최근 메트릭 샘플 (최신순, 최대 `limit`개).
    pub fn get_recent_metrics(&self, limit: usize) -> Vec<MetricSample> {
        self.metrics_read().iter().rev().take(limit).cloned().collect()
    }
}

fn percent_breach(
    message: &'static str,
    field: &str,
    value: f64,
    warning: f64,
    critical: f64,
) -> Option<Breach> {
    let (level, threshold) = if value >= critical {
        (AlertLevel::Critical, critical)
    } else if value >= warning {
        (AlertLevel::Warning, warning)
    } else {
        return None;
    };

    Some(Breach {
        level,
        component: SYSTEM_COMPONENT,
        message,
        details: HashMap::from([
            (field.to_string(), serde_json::json!((value * 10.0).round() / 10.0)),
            ("threshold".to_string(), serde_json::json!(threshold)),
        ]),
    })
}

async fn run_loop(monitor: SystemMonitor, shutdown: CancellationToken) {
    let mut ticker = tokio::time::interval(monitor.config().sampling_interval());
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            biased;
            _ = shutdown.cancelled() => {
                debug!("System monitor loop cancelled");
                break;
            }
            _ = ticker.tick() => {
                monitor.run_cycle_until(Some(&shutdown));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::monitoring::error_tracker::{ErrorCategory, ErrorReport};
    use crate::monitoring::sampler::ScriptedSampler;
    use onboard_core::{ErrorTrackerConfig, ManualClock, OnboardError};

    fn reading(cpu: f64, memory: f64, disk: f64) -> ResourceReading {
        ResourceReading {
            cpu_percent: cpu,
            memory_percent: memory,
            disk_percent: disk,
        }
    }

    fn monitor_with(
        config: MonitorConfig,
        sampler: ScriptedSampler,
    ) -> (SystemMonitor, ErrorTracker, ManualClock) {
        let clock = ManualClock::starting_now();
        let tracker = ErrorTracker::new(ErrorTrackerConfig::default(), clock.shared());
        let monitor = SystemMonitor::new(config, Arc::new(sampler), tracker.clone(), clock.shared());
        (monitor, tracker, clock)
    }

    #[test]
    fn test_repeated_memory_breach_yields_single_alert() {
        let (monitor, _tracker, clock) = monitor_with(
            MonitorConfig::default(),
            ScriptedSampler::constant(reading(10.0, 95.0, 10.0)),
        );

        monitor.run_cycle();
        clock.advance(Duration::seconds(30));
        monitor.run_cycle();

        let status = monitor.get_system_status();
        assert_eq!(status.active_alerts, 1);
        assert_eq!(status.critical_alerts, 1);
        assert_eq!(monitor.get_alert_history(10).len(), 1);

        let active = monitor.get_active_alerts();
        assert_eq!(active[0].message, MEMORY_MESSAGE);
        assert_eq!(active[0].component, SYSTEM_COMPONENT);
    }

    #[test]
    fn test_create_alert_dedups_until_resolved() {
        let (monitor, _tracker, _clock) =
            monitor_with(MonitorConfig::default(), ScriptedSampler::new([]));

        let first = monitor.create_alert(AlertLevel::Warning, "db", "Slow queries", HashMap::new());
        let second = monitor.create_alert(AlertLevel::Warning, "db", "Slow queries", HashMap::new());
        assert!(first.is_created());
        assert_eq!(second, AlertOutcome::Deduplicated(first.alert_id()));

        // 레벨이 다르면 다른 조건
        let critical =
            monitor.create_alert(AlertLevel::Critical, "db", "Slow queries", HashMap::new());
        assert!(critical.is_created());
        assert_eq!(monitor.get_system_status().active_alerts, 2);

        assert!(monitor.resolve_alert(first.alert_id()));
        assert!(!monitor.resolve_alert(first.alert_id()));

        let again = monitor.create_alert(AlertLevel::Warning, "db", "Slow queries", HashMap::new());
        assert!(again.is_created());
        assert_ne!(again.alert_id(), first.alert_id());

        let history = monitor.get_alert_history(10);
        assert_eq!(history.len(), 3);
        let resolved = history.iter().find(|a| a.id == first.alert_id()).unwrap();
        assert!(!resolved.active);
        assert!(resolved.resolved_at.is_some());
    }

    #[test]
    fn test_concurrent_create_alert_is_atomic() {
        let (monitor, _tracker, _clock) =
            monitor_with(MonitorConfig::default(), ScriptedSampler::new([]));

        let created: usize = std::thread::scope(|scope| {
            let handles: Vec<_> = (0..16)
                .map(|_| {
                    let monitor = monitor.clone();
                    scope.spawn(move || {
                        monitor
                            .create_alert(
                                AlertLevel::Critical,
                                "system",
                                "High memory usage",
                                HashMap::new(),
                            )
                            .is_created() as usize
                    })
                })
                .collect();
            handles.into_iter().map(|h| h.join().unwrap()).sum()
        });

        assert_eq!(created, 1);
        assert_eq!(monitor.get_system_status().active_alerts, 1);
    }

    #[test]
    fn test_alerts_stay_active_without_auto_resolve() {
        let (monitor, _tracker, _clock) = monitor_with(
            MonitorConfig::default(),
            ScriptedSampler::new([Ok(reading(10.0, 95.0, 10.0)), Ok(reading(10.0, 20.0, 10.0))]),
        );

        monitor.run_cycle();
        monitor.run_cycle();

        assert_eq!(monitor.get_system_status().active_alerts, 1);
        assert!(monitor.resolve_condition(SYSTEM_COMPONENT, AlertLevel::Critical, MEMORY_MESSAGE));
        assert_eq!(monitor.get_system_status().active_alerts, 0);
    }

    #[test]
    fn test_auto_resolve_clears_recovered_conditions() {
        let config = MonitorConfig {
            auto_resolve: true,
            ..Default::default()
        };
        let (monitor, _tracker, _clock) = monitor_with(
            config,
            ScriptedSampler::new([
                Ok(reading(85.0, 95.0, 10.0)),
                Ok(reading(85.0, 20.0, 10.0)),
            ]),
        );

        monitor.run_cycle();
        assert_eq!(monitor.get_system_status().active_alerts, 2);

        monitor.run_cycle();
        let active = monitor.get_active_alerts();
        assert_eq!(active.len(), 1);
        assert_eq!(active[0].message, CPU_MESSAGE);
        assert_eq!(active[0].level, AlertLevel::Warning);

        // 수동으로 만든 알림은 자동 해결 대상이 아님
        monitor.create_alert(AlertLevel::Info, "ops", "Deploy started", HashMap::new());
        monitor.run_cycle();
        assert_eq!(monitor.get_system_status().active_alerts, 2);
    }

    #[test]
    fn test_error_tracker_conditions_raise_alerts() {
        let config = MonitorConfig {
            thresholds: onboard_core::AlertThresholds {
                errors_per_hour_warning: 3,
                critical_errors_per_hour: 1,
                ..Default::default()
            },
            ..Default::default()
        };
        let (monitor, tracker, _clock) =
            monitor_with(config, ScriptedSampler::constant(reading(1.0, 1.0, 1.0)));

        for _ in 0..2 {
            tracker.track_error(ErrorReport::new("x", ErrorSeverity::Low, ErrorCategory::Other));
        }
        tracker.track_error(ErrorReport::new(
            "panic",
            ErrorSeverity::Critical,
            ErrorCategory::System,
        ));

        let sample = monitor.run_cycle().unwrap();
        assert_eq!(sample.errors_last_hour, 3);
        assert_eq!(sample.critical_errors_last_hour, 1);
        assert_eq!(sample.active_alerts, 2);

        let status = monitor.get_system_status();
        assert_eq!(status.critical_alerts, 1);
        assert_eq!(status.warning_alerts, 1);
    }

    #[test]
    fn test_sampling_failure_is_isolated() {
        let (monitor, _tracker, _clock) = monitor_with(
            MonitorConfig::default(),
            ScriptedSampler::new([
                Err(OnboardError::Sampling("no /proc".into())),
                Ok(reading(1.0, 2.0, 3.0)),
            ]),
        );

        assert!(monitor.run_cycle().is_none());
        assert!(monitor.run_cycle().is_some());
        assert_eq!(monitor.get_recent_metrics(10).len(), 1);
    }

    #[test]
    fn test_metric_samples_strictly_increasing_and_bounded() {
        let config = MonitorConfig {
            metrics_capacity: 3,
            ..Default::default()
        };
        let (monitor, _tracker, _clock) =
            monitor_with(config, ScriptedSampler::constant(reading(1.0, 1.0, 1.0)));

        // 시계가 움직이지 않아도 타임스탬프는 증가
        for _ in 0..5 {
            monitor.run_cycle();
        }

        let recent = monitor.get_recent_metrics(10);
        assert_eq!(recent.len(), 3);
        assert!(recent.windows(2).all(|w| w[0].timestamp > w[1].timestamp));
        assert_eq!(monitor.get_recent_metrics(1).len(), 1);
    }

    #[test]
    fn test_metric_samples_evicted_by_age() {
        let config = MonitorConfig {
            metrics_retention_hours: 1,
            ..Default::default()
        };
        let (monitor, _tracker, clock) =
            monitor_with(config, ScriptedSampler::constant(reading(1.0, 1.0, 1.0)));

        monitor.run_cycle();
        clock.advance(Duration::minutes(61));
        monitor.run_cycle();

        assert_eq!(monitor.get_recent_metrics(10).len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_lifecycle_is_idempotent_with_single_loop() {
        let config = MonitorConfig {
            sampling_interval_secs: 10,
            ..Default::default()
        };
        let (monitor, _tracker, _clock) =
            monitor_with(config, ScriptedSampler::constant(reading(1.0, 1.0, 1.0)));

        monitor.start_monitoring();
        monitor.start_monitoring();
        assert!(monitor.get_system_status().monitoring_active);

        // 즉시 1회 + 10초 후 1회
        tokio::time::sleep(std::time::Duration::from_secs(15)).await;
        assert_eq!(monitor.get_recent_metrics(100).len(), 2);

        monitor.stop_monitoring();
        monitor.stop_monitoring();
        assert!(!monitor.get_system_status().monitoring_active);

        tokio::time::sleep(std::time::Duration::from_secs(60)).await;
        assert_eq!(monitor.get_recent_metrics(100).len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_cancels_pending_sleep() {
        let config = MonitorConfig {
            sampling_interval_secs: 3600,
            ..Default::default()
        };
        let (monitor, _tracker, _clock) =
            monitor_with(config, ScriptedSampler::constant(reading(1.0, 99.0, 1.0)));

        monitor.start_monitoring();
        tokio::task::yield_now().await;

        let started = tokio::time::Instant::now();
        tokio::time::timeout(std::time::Duration::from_secs(1), monitor.shutdown())
            .await
            .expect("loop should exit without waiting for the next tick");
        assert!(started.elapsed() < std::time::Duration::from_secs(1));

        // 중지 시 모든 알림 비활성화
        let status = monitor.get_system_status();
        assert!(!status.monitoring_active);
        assert_eq!(status.active_alerts, 0);
        assert!(monitor.get_alert_history(10).iter().all(|a| !a.active));
    }

    /// 첫 샘플에서 해제 신호를 받을 때까지 멈추는 샘플러.
    struct BlockingSampler {
        entered: Mutex<std::sync::mpsc::Sender<()>>,
        release: Mutex<std::sync::mpsc::Receiver<()>>,
    }

    impl ResourceSampler for BlockingSampler {
        fn sample(&self) -> onboard_core::OnboardResult<ResourceReading> {
            let _ = self.entered.lock().unwrap().send(());
            let _ = self
                .release
                .lock()
                .unwrap()
                .recv_timeout(std::time::Duration::from_secs(5));
            Ok(reading(1.0, 99.0, 1.0))
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_stop_during_cycle_leaves_no_active_alerts() {
        let (entered_tx, entered_rx) = std::sync::mpsc::channel();
        let (release_tx, release_rx) = std::sync::mpsc::channel();
        let sampler = BlockingSampler {
            entered: Mutex::new(entered_tx),
            release: Mutex::new(release_rx),
        };

        let clock = ManualClock::starting_now();
        let tracker = ErrorTracker::new(ErrorTrackerConfig::default(), clock.shared());
        let monitor = SystemMonitor::new(
            MonitorConfig::default(),
            Arc::new(sampler),
            tracker,
            clock.shared(),
        );

        monitor.start_monitoring();
        entered_rx
            .recv_timeout(std::time::Duration::from_secs(5))
            .expect("first cycle should start sampling");

        monitor.stop_monitoring();
        release_tx.send(()).unwrap();

        // 멈춰 있던 사이클이 끝날 시간을 준다
        tokio::time::sleep(std::time::Duration::from_millis(300)).await;

        let status = monitor.get_system_status();
        assert!(!status.monitoring_active);
        assert_eq!(status.active_alerts, 0);
        assert!(status.last_sample_at.is_none());
        assert!(monitor.get_alert_history(10).is_empty());
    }

    #[tokio::test]
    async fn test_restart_after_stop() {
        let (monitor, _tracker, _clock) = monitor_with(
            MonitorConfig::default(),
            ScriptedSampler::constant(reading(1.0, 1.0, 1.0)),
        );

        monitor.start_monitoring();
        monitor.stop_monitoring();
        monitor.start_monitoring();
        assert!(monitor.is_running());
        monitor.shutdown().await;
        assert!(!monitor.is_running());
    }
}
