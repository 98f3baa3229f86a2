//! 에러 추적 모듈.
//!
//! 요청 처리와 협력 컴포넌트에서 발생한 에러를 분류하여 메모리에 보관합니다.
//! - 분류된 에러 이벤트 수집 (심각도, 카테고리, 컴포넌트)
//! - 용량과 보관 시간으로 제한된 최근 이벤트 버퍼
//! - 시간 창 기반 요약 (`get_error_summary`)
//! - 모니터링 활성 중 보관 시간이 지난 이벤트를 주기적으로 정리

use chrono::{DateTime, Duration, Utc};
use onboard_core::{ErrorTrackerConfig, OnboardError, SharedClock};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap, VecDeque};
use std::sync::{Arc, Mutex, RwLock, RwLockReadGuard, RwLockWriteGuard};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use utoipa::ToSchema;
use uuid::Uuid;

/// 에러 심각도 수준.
///
/// 순서: `Low < Medium < High < Critical`.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, ToSchema,
)]
#[serde(rename_all = "lowercase")]
pub enum ErrorSeverity {
    /// 사용자 교정 가능 (입력 오류 등)
    Low,
    /// 기능 일부 실패
    Medium,
    /// 의존성 장애, 처리되지 않은 서버 에러
    High,
    /// 시스템 영향 (패닉 등)
    Critical,
}

impl std::fmt::Display for ErrorSeverity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Low => write!(f, "low"),
            Self::Medium => write!(f, "medium"),
            Self::High => write!(f, "high"),
            Self::Critical => write!(f, "critical"),
        }
    }
}

impl std::str::FromStr for ErrorSeverity {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "low" => Ok(Self::Low),
            "medium" => Ok(Self::Medium),
            "high" => Ok(Self::High),
            "critical" => Ok(Self::Critical),
            other => Err(format!("Invalid severity: {}", other)),
        }
    }
}

/// 에러 카테고리.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCategory {
    /// 데이터베이스 관련
    Database,
    /// 인증/권한
    Authentication,
    /// 시스템/인프라
    System,
    /// 외부 API 호출
    ExternalApi,
    /// 입력 검증
    Validation,
    /// 문서 업로드/텍스트 추출
    DocumentProcessing,
    /// 생성 모델 서비스
    AiService,
    /// 네트워크/타임아웃
    Network,
    /// 기타
    Other,
}

impl std::fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Database => "database",
            Self::Authentication => "authentication",
            Self::System => "system",
            Self::ExternalApi => "external_api",
            Self::Validation => "validation",
            Self::DocumentProcessing => "document_processing",
            Self::AiService => "ai_service",
            Self::Network => "network",
            Self::Other => "other",
        };
        f.write_str(s)
    }
}

impl std::str::FromStr for ErrorCategory {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "database" => Ok(Self::Database),
            "authentication" => Ok(Self::Authentication),
            "system" => Ok(Self::System),
            "external_api" => Ok(Self::ExternalApi),
            "validation" => Ok(Self::Validation),
            "document_processing" => Ok(Self::DocumentProcessing),
            "ai_service" => Ok(Self::AiService),
            "network" => Ok(Self::Network),
            "other" => Ok(Self::Other),
            other => Err(format!("Invalid category: {}", other)),
        }
    }
}

/// 핵심 에러를 카테고리/심각도로 분류합니다.
pub fn classify(err: &OnboardError) -> (ErrorCategory, ErrorSeverity) {
    match err {
        OnboardError::Validation(_) | OnboardError::NotFound(_) => {
            (ErrorCategory::Validation, ErrorSeverity::Low)
        }
        OnboardError::Auth(_) => (ErrorCategory::Authentication, ErrorSeverity::Medium),
        OnboardError::Database(_) => (ErrorCategory::Database, ErrorSeverity::High),
        OnboardError::ExternalApi(_) => (ErrorCategory::ExternalApi, ErrorSeverity::High),
        OnboardError::AiService(_) => (ErrorCategory::AiService, ErrorSeverity::High),
        OnboardError::Timeout(_) => (ErrorCategory::Network, ErrorSeverity::High),
        OnboardError::DocumentProcessing(_) => {
            (ErrorCategory::DocumentProcessing, ErrorSeverity::Medium)
        }
        OnboardError::Config(_)
        | OnboardError::Sampling(_)
        | OnboardError::Serialization(_)
        | OnboardError::Internal(_) => (ErrorCategory::System, ErrorSeverity::High),
    }
}

/// 기록된 에러 이벤트. 기록 이후 변경되지 않습니다.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ErrorEvent {
    /// 이벤트 ID
    pub id: Uuid,
    /// 에러 메시지
    pub message: String,
    /// 심각도
    pub severity: ErrorSeverity,
    /// 카테고리
    pub category: ErrorCategory,
    /// 발생 컴포넌트 (예: "http", "document_parser")
    pub component: String,
    /// 관련 사용자
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    /// 상세 컨텍스트
    pub context: HashMap<String, String>,
    /// 기록 시각
    pub timestamp: DateTime<Utc>,
}

/// 협력 컴포넌트가 전달하는 에러 보고.
///
/// ```rust,ignore
/// let report = ErrorReport::new("LLM 응답 파싱 실패", ErrorSeverity::High, ErrorCategory::AiService)
///     .component("guide_generator")
///     .user_id("42")
///     .with_context("model", "gpt-4o");
/// tracker.track_error(report);
/// ```
#[derive(Debug, Clone)]
pub struct ErrorReport {
    message: String,
    severity: ErrorSeverity,
    category: ErrorCategory,
    component: String,
    user_id: Option<String>,
    context: HashMap<String, String>,
}

impl ErrorReport {
    /// 새 보고 생성. 컴포넌트 기본값은 `"unknown"`입니다.
    pub fn new(message: impl Into<String>, severity: ErrorSeverity, category: ErrorCategory) -> Self {
        Self {
            message: message.into(),
            severity,
            category,
            component: "unknown".to_string(),
            user_id: None,
            context: HashMap::new(),
        }
    }

    /// 핵심 에러에서 분류를 추론하여 생성.
    pub fn from_error(err: &OnboardError) -> Self {
        let (category, severity) = classify(err);
        Self::new(err.to_string(), severity, category).with_context("code", err.error_code())
    }

    /// 컴포넌트 설정.
    pub fn component(mut self, component: impl Into<String>) -> Self {
        self.component = component.into();
        self
    }

    /// 심각도 덮어쓰기.
    pub fn severity(mut self, severity: ErrorSeverity) -> Self {
        self.severity = severity;
        self
    }

    /// 관련 사용자 설정.
    pub fn user_id(mut self, user_id: impl Into<String>) -> Self {
        self.user_id = Some(user_id.into());
        self
    }

    /// 컨텍스트 추가.
    pub fn with_context(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.context.insert(key.into(), value.into());
        self
    }

    /// 원본 에러 문자열을 `raw_error` 컨텍스트로 추가.
    pub fn raw_error(self, error: impl std::fmt::Display) -> Self {
        self.with_context("raw_error", error.to_string())
    }
}

/// 요약 대상 시간 범위.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct TimeRange {
    /// 시작 (포함)
    pub start: DateTime<Utc>,
    /// 끝
    pub end: DateTime<Utc>,
}

/// 시간 창 에러 요약.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ErrorSummary {
    /// 조회 시간 창 (시간)
    pub window_hours: u64,
    /// 창 내 에러 수
    pub total_errors: usize,
    /// 심각도별 에러 수
    pub severity_distribution: BTreeMap<String, usize>,
    /// 카테고리별 에러 수
    pub category_distribution: BTreeMap<String, usize>,
    /// 시간 범위
    pub time_range: TimeRange,
}

/// 누적 에러 통계 (버퍼 제거와 무관하게 유지).
#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
pub struct ErrorStats {
    /// 심각도별 에러 수
    pub by_severity: BTreeMap<String, u64>,
    /// 카테고리별 에러 수
    pub by_category: BTreeMap<String, u64>,
    /// 총 에러 수
    pub total_count: u64,
    /// 버퍼에서 제거된 에러 수
    pub evicted_count: u64,
    /// 마지막 에러 시간
    pub last_error_at: Option<DateTime<Utc>>,
    /// 통계 시작 시간
    pub stats_since: DateTime<Utc>,
}

/// 에러 추적기 (스레드 안전, 복제 시 상태 공유).
#[derive(Clone)]
pub struct ErrorTracker {
    inner: Arc<RwLock<ErrorTrackerInner>>,
    sweeper: Arc<Mutex<Option<CancellationToken>>>,
    config: ErrorTrackerConfig,
    clock: SharedClock,
}

struct ErrorTrackerInner {
    /// 최근 이벤트 (도착 순서)
    history: VecDeque<ErrorEvent>,
    /// 누적 통계
    stats: ErrorStats,
    /// 모니터링 활성 여부
    monitoring: bool,
}

impl ErrorTrackerInner {
    /// 용량/보관 시간 정책에 따라 가장 오래된 이벤트부터 제거합니다.
    fn evict(&mut self, capacity: usize, cutoff: Option<DateTime<Utc>>) -> usize {
        let mut evicted = 0;
        while self.history.len() > capacity {
            self.history.pop_front();
            evicted += 1;
        }
        if let Some(cutoff) = cutoff {
            while self
                .history
                .front()
                .is_some_and(|event| event.timestamp < cutoff)
            {
                self.history.pop_front();
                evicted += 1;
            }
        }
        self.stats.evicted_count += evicted as u64;
        evicted
    }
}

impl std::fmt::Debug for ErrorTracker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ErrorTracker")
            .field("config", &self.config)
            .field("monitoring", &self.is_monitoring())
            .finish()
    }
}

impl ErrorTracker {
    /// 새 에러 추적기 생성.
    pub fn new(config: ErrorTrackerConfig, clock: SharedClock) -> Self {
        let now = clock.now();
        Self {
            inner: Arc::new(RwLock::new(ErrorTrackerInner {
                history: VecDeque::with_capacity(config.capacity.min(4096)),
                stats: ErrorStats {
                    stats_since: now,
                    ..Default::default()
                },
                monitoring: false,
            })),
            sweeper: Arc::new(Mutex::new(None)),
            config,
            clock,
        }
    }

    /// 설정 조회.
    pub fn config(&self) -> &ErrorTrackerConfig {
        &self.config
    }

    fn read(&self) -> RwLockReadGuard<'_, ErrorTrackerInner> {
        match self.inner.read() {
            Ok(guard) => guard,
            Err(poisoned) => {
                error!("ErrorTracker RwLock poisoned (read), recovering");
                poisoned.into_inner()
            }
        }
    }

    fn write(&self) -> RwLockWriteGuard<'_, ErrorTrackerInner> {
        match self.inner.write() {
            Ok(guard) => guard,
            Err(poisoned) => {
                error!("ErrorTracker RwLock poisoned (write), recovering");
                poisoned.into_inner()
            }
        }
    }

    fn retention_cutoff(&self, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
        self.config.retention().map(|age| now - age)
    }

    /// 에러 기록. 항상 성공하며 생성된 이벤트 ID를 반환합니다.
    pub fn track_error(&self, report: ErrorReport) -> Uuid {
        let now = self.clock.now();
        let event = ErrorEvent {
            id: Uuid::new_v4(),
            message: report.message,
            severity: report.severity,
            category: report.category,
            component: report.component,
            user_id: report.user_id,
            context: report.context,
            timestamp: now,
        };
        let id = event.id;

        match event.severity {
            ErrorSeverity::Critical => error!(
                error_id = %id,
                category = %event.category,
                component = %event.component,
                user_id = ?event.user_id,
                context = ?event.context,
                "[CRITICAL] {}", event.message
            ),
            ErrorSeverity::High => error!(
                error_id = %id,
                category = %event.category,
                component = %event.component,
                "[HIGH] {}", event.message
            ),
            ErrorSeverity::Medium => warn!(
                error_id = %id,
                category = %event.category,
                component = %event.component,
                "[MEDIUM] {}", event.message
            ),
            ErrorSeverity::Low => info!(
                error_id = %id,
                category = %event.category,
                component = %event.component,
                "[LOW] {}", event.message
            ),
        }

        crate::metrics::record_error_tracked(&event.severity.to_string(), &event.category.to_string());

        let cutoff = self.retention_cutoff(now);
        let mut inner = self.write();
        *inner
            .stats
            .by_severity
            .entry(event.severity.to_string())
            .or_insert(0) += 1;
        *inner
            .stats
            .by_category
            .entry(event.category.to_string())
            .or_insert(0) += 1;
        inner.stats.total_count += 1;
        inner.stats.last_error_at = Some(now);

        inner.history.push_back(event);
        inner.evict(self.config.capacity, cutoff);

        id
    }

    /// 최근 `hours` 시간 동안의 에러 요약.
    ///
    /// 버퍼에 남아 있어도 창 밖의 이벤트는 제외됩니다.
    pub fn get_error_summary(&self, hours: u64) -> ErrorSummary {
        let end = self.clock.now();
        let start = end - Duration::hours(hours.min(24 * 365 * 100) as i64);

        let mut severity_distribution = BTreeMap::new();
        let mut category_distribution = BTreeMap::new();
        let mut total_errors = 0;

        let inner = self.read();
        for event in inner.history.iter().filter(|e| e.timestamp >= start) {
            total_errors += 1;
            *severity_distribution
                .entry(event.severity.to_string())
                .or_insert(0) += 1;
            *category_distribution
                .entry(event.category.to_string())
                .or_insert(0) += 1;
        }

        ErrorSummary {
            window_hours: hours,
            total_errors,
            severity_distribution,
            category_distribution,
            time_range: TimeRange { start, end },
        }
    }

    /// 최근 에러 조회 (최신순, 최대 `limit`개).
    pub fn get_recent_errors(&self, limit: usize) -> Vec<ErrorEvent> {
        self.read().history.iter().rev().take(limit).cloned().collect()
    }

    /// 심각도별 에러 조회.
    pub fn get_by_severity(&self, severity: ErrorSeverity, limit: usize) -> Vec<ErrorEvent> {
        self.read()
            .history
            .iter()
            .rev()
            .filter(|e| e.severity == severity)
            .take(limit)
            .cloned()
            .collect()
    }

    /// 카테고리별 에러 조회.
    pub fn get_by_category(&self, category: ErrorCategory, limit: usize) -> Vec<ErrorEvent> {
        self.read()
            .history
            .iter()
            .rev()
            .filter(|e| e.category == category)
            .take(limit)
            .cloned()
            .collect()
    }

    /// 최근 `window` 동안 `min_severity` 이상인 에러 수.
    pub fn count_since(&self, window: Duration, min_severity: ErrorSeverity) -> usize {
        let cutoff = self.clock.now() - window;
        self.read()
            .history
            .iter()
            .filter(|e| e.timestamp >= cutoff && e.severity >= min_severity)
            .count()
    }

    /// 버퍼에 보관 중인 이벤트 수.
    pub fn len(&self) -> usize {
        self.read().history.len()
    }

    /// 버퍼가 비어 있는지 확인.
    pub fn is_empty(&self) -> bool {
        self.read().history.is_empty()
    }

    /// 누적 통계 조회.
    pub fn get_stats(&self) -> ErrorStats {
        self.read().stats.clone()
    }

    /// 히스토리 전체 삭제. 누적 통계는 유지됩니다.
    pub fn clear_history(&self) {
        self.write().history.clear();
    }

    /// 보관 시간이 지난 이벤트 제거. 제거된 수를 반환합니다.
    pub fn sweep(&self) -> usize {
        let cutoff = self.retention_cutoff(self.clock.now());
        let evicted = self.write().evict(self.config.capacity, cutoff);
        if evicted > 0 {
            debug!(evicted, "Expired error events evicted");
        }
        evicted
    }

    /// 모니터링 활성 여부.
    pub fn is_monitoring(&self) -> bool {
        self.read().monitoring
    }

    /// 모니터링 시작 (멱등).
    ///
    /// tokio 런타임 안에서 호출되면 보관 시간 정리 태스크를 함께 시작합니다.
    /// 플래그 전환과 토큰 저장은 `sweeper` 잠금 안에서 함께 일어납니다.
    pub fn start_monitoring(&self) {
        let mut sweeper = self.sweeper.lock().unwrap_or_else(|p| p.into_inner());
        {
            let mut inner = self.write();
            if inner.monitoring {
                debug!("Error tracker monitoring already active");
                return;
            }
            inner.monitoring = true;
        }

        if self.config.retention().is_some() {
            match tokio::runtime::Handle::try_current() {
                Ok(handle) => {
                    let token = CancellationToken::new();
                    handle.spawn(run_sweeper(self.clone(), token.clone()));
                    if let Some(previous) = sweeper.replace(token) {
                        previous.cancel();
                    }
                }
                Err(_) => warn!("No tokio runtime; error retention sweeper not started"),
            }
        }
        drop(sweeper);

        info!(
            capacity = self.config.capacity,
            retention_hours = ?self.config.retention_hours,
            "Error tracker monitoring started"
        );
    }

    /// 모니터링 중지 (멱등).
    pub fn stop_monitoring(&self) {
        let mut sweeper = self.sweeper.lock().unwrap_or_else(|p| p.into_inner());
        {
            let mut inner = self.write();
            if !inner.monitoring {
                debug!("Error tracker monitoring already stopped");
                return;
            }
            inner.monitoring = false;
        }

        if let Some(token) = sweeper.take() {
            token.cancel();
        }
        drop(sweeper);

        info!("Error tracker monitoring stopped");
    }
}

async fn run_sweeper(tracker: ErrorTracker, shutdown: CancellationToken) {
    let mut ticker = tokio::time::interval(tracker.config.sweep_interval());
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                tracker.sweep();
            }
            _ = shutdown.cancelled() => {
                debug!("Error retention sweeper stopped");
                break;
            }
        }
    }
}
