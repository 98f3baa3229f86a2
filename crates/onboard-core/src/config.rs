//! 설정 관리.
//!
//! 기본값 → 설정 파일(선택) → 환경 변수 순서로 값을 덮어씁니다.
//! 환경 변수는 `ONBOARD__<섹션>__<키>` 형식입니다 (예: `ONBOARD__RATE_LIMIT__REQUESTS_PER_MINUTE=120`).

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// 설정 파일 경로를 지정하는 환경 변수.
pub const CONFIG_PATH_ENV: &str = "ONBOARD_CONFIG";

/// 설정 파일 기본 경로.
pub const DEFAULT_CONFIG_PATH: &str = "config/default.toml";

/// 보관 시간 상한 (100년).
const MAX_RETENTION_HOURS: u64 = 24 * 365 * 100;

fn hours_to_duration(hours: u64) -> chrono::Duration {
    chrono::Duration::hours(hours.min(MAX_RETENTION_HOURS) as i64)
}

/// 애플리케이션 설정.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct AppConfig {
    /// 서버 설정
    pub server: ServerConfig,
    /// 로깅 설정
    pub logging: LoggingConfig,
    /// 요청 제한 설정
    pub rate_limit: RateLimitConfig,
    /// 에러 추적기 설정
    pub error_tracker: ErrorTrackerConfig,
    /// 시스템 모니터 설정
    pub monitor: MonitorConfig,
    /// 헬스 체크 설정
    pub health: HealthConfig,
    /// 데이터베이스 설정
    pub database: DatabaseConfig,
    /// 외부 AI API 설정
    pub external_api: ExternalApiConfig,
}

/// 서버 설정.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ServerConfig {
    /// 바인딩할 호스트
    pub host: String,
    /// 리스닝할 포트
    pub port: u16,
    /// 요청 전체 타임아웃 (초)
    pub request_timeout_secs: u64,
    /// 허용할 CORS origin 목록 (비어 있으면 모두 허용)
    pub cors_origins: Vec<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8000,
            request_timeout_secs: 30,
            cors_origins: Vec::new(),
        }
    }
}

impl ServerConfig {
    /// 요청 타임아웃을 Duration으로 반환
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

/// 로깅 설정.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// 로그 레벨
    pub level: String,
    /// 로그 형식 (pretty, json, compact)
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "pretty".to_string(),
        }
    }
}

/// 요청 제한(Admission Gate) 설정.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RateLimitConfig {
    /// 요청 제한 활성화 여부
    pub enabled: bool,
    /// 클라이언트별 60초 슬라이딩 윈도우 내 최대 요청 수
    pub requests_per_minute: u32,
    /// 유휴 클라이언트 윈도우 정리 주기 (초)
    pub cleanup_interval_secs: u64,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            requests_per_minute: 60,
            cleanup_interval_secs: 300,
        }
    }
}

impl RateLimitConfig {
    /// 지정한 한도로 생성.
    pub fn new(requests_per_minute: u32) -> Self {
        Self {
            requests_per_minute,
            ..Default::default()
        }
    }

    /// 정리 주기를 Duration으로 반환
    pub fn cleanup_interval(&self) -> Duration {
        Duration::from_secs(self.cleanup_interval_secs.max(1))
    }
}

/// 에러 추적기 설정.
///
/// 버퍼는 개수(`capacity`)와 나이(`retention_hours`) 두 기준으로 제한됩니다.
/// 어느 쪽이든 초과한 이벤트는 가장 오래된 것부터 제거됩니다.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ErrorTrackerConfig {
    /// 보관할 최대 이벤트 수
    pub capacity: usize,
    /// 이벤트 보관 시간 (시간 단위, `None`이면 나이 제한 없음)
    pub retention_hours: Option<u64>,
    /// 보관 기간 정리 작업 주기 (초)
    pub sweep_interval_secs: u64,
    /// 최근 1시간 Critical 에러가 이 값 이상이면 헬스 체크에서 degraded
    pub critical_health_threshold: u64,
}

impl Default for ErrorTrackerConfig {
    fn default() -> Self {
        Self {
            capacity: 1000,
            retention_hours: Some(24),
            sweep_interval_secs: 300,
            critical_health_threshold: 10,
        }
    }
}

impl ErrorTrackerConfig {
    /// 정리 작업 주기를 Duration으로 반환
    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs.max(1))
    }

    /// 보관 시간을 chrono Duration으로 반환
    pub fn retention(&self) -> Option<chrono::Duration> {
        self.retention_hours.map(hours_to_duration)
    }
}

/// 시스템 모니터 설정.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct MonitorConfig {
    /// 샘플링 주기 (초)
    pub sampling_interval_secs: u64,
    /// 보관할 최대 메트릭 샘플 수
    pub metrics_capacity: usize,
    /// 메트릭 샘플 보관 시간 (시간 단위)
    pub metrics_retention_hours: u64,
    /// 보관할 최대 알림 수 (해결된 알림 포함)
    pub alert_history_capacity: usize,
    /// 임계치 아래로 회복된 조건의 알림을 모니터가 자동 해결할지 여부
    pub auto_resolve: bool,
    /// 알림 임계치
    pub thresholds: AlertThresholds,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            sampling_interval_secs: 30,
            metrics_capacity: 1000,
            metrics_retention_hours: 24,
            alert_history_capacity: 500,
            auto_resolve: false,
            thresholds: AlertThresholds::default(),
        }
    }
}

impl MonitorConfig {
    /// 샘플링 주기를 Duration으로 반환
    pub fn sampling_interval(&self) -> Duration {
        Duration::from_secs(self.sampling_interval_secs.max(1))
    }

    /// 메트릭 보관 시간을 chrono Duration으로 반환
    pub fn metrics_retention(&self) -> chrono::Duration {
        hours_to_duration(self.metrics_retention_hours)
    }
}

/// 알림 임계치 (백분율 또는 시간당 건수).
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct AlertThresholds {
    /// CPU 사용률 경고 (%)
    pub cpu_warning: f64,
    /// CPU 사용률 위험 (%)
    pub cpu_critical: f64,
    /// 메모리 사용률 경고 (%)
    pub memory_warning: f64,
    /// 메모리 사용률 위험 (%)
    pub memory_critical: f64,
    /// 디스크 사용률 경고 (%)
    pub disk_warning: f64,
    /// 디스크 사용률 위험 (%)
    pub disk_critical: f64,
    /// 최근 1시간 에러 건수 경고
    pub errors_per_hour_warning: u64,
    /// 최근 1시간 Critical 에러 건수 위험
    pub critical_errors_per_hour: u64,
}

impl Default for AlertThresholds {
    fn default() -> Self {
        Self {
            cpu_warning: 80.0,
            cpu_critical: 95.0,
            memory_warning: 80.0,
            memory_critical: 90.0,
            disk_warning: 85.0,
            disk_critical: 95.0,
            errors_per_hour_warning: 50,
            critical_errors_per_hour: 5,
        }
    }
}

/// 헬스 체크 설정.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct HealthConfig {
    /// 개별 설정이 없는 프로브의 타임아웃 (밀리초)
    pub default_timeout_ms: u64,
    /// 데이터베이스 프로브 타임아웃 (밀리초)
    pub database_timeout_ms: u64,
    /// 외부 API 프로브 타임아웃 (밀리초)
    pub external_api_timeout_ms: u64,
    /// 이 시간을 넘긴 응답은 degraded로 판정 (밀리초)
    pub slow_response_ms: u64,
}

impl Default for HealthConfig {
    fn default() -> Self {
        Self {
            default_timeout_ms: 5000,
            database_timeout_ms: 2000,
            external_api_timeout_ms: 5000,
            slow_response_ms: 1000,
        }
    }
}

impl HealthConfig {
    /// 기본 프로브 타임아웃
    pub fn default_timeout(&self) -> Duration {
        Duration::from_millis(self.default_timeout_ms)
    }

    /// 데이터베이스 프로브 타임아웃
    pub fn database_timeout(&self) -> Duration {
        Duration::from_millis(self.database_timeout_ms)
    }

    /// 외부 API 프로브 타임아웃
    pub fn external_api_timeout(&self) -> Duration {
        Duration::from_millis(self.external_api_timeout_ms)
    }

    /// degraded 판정 응답 시간
    pub fn slow_response(&self) -> Duration {
        Duration::from_millis(self.slow_response_ms)
    }
}

/// 데이터베이스 설정.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// 연결 URL (없으면 데이터베이스 프로브 미등록)
    pub url: Option<String>,
    /// 최대 연결 수
    pub max_connections: u32,
    /// 연결 타임아웃 (초)
    pub connect_timeout_secs: u64,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: None,
            max_connections: 10,
            connect_timeout_secs: 10,
        }
    }
}

impl DatabaseConfig {
    /// 연결 타임아웃을 Duration으로 반환
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }
}

/// 외부 AI API 설정.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ExternalApiConfig {
    /// 헬스 체크에 표시할 컴포넌트 이름
    pub name: String,
    /// 상태 확인 URL (없으면 프로브 미등록)
    pub health_url: Option<String>,
    /// 전체 상태 판정에 필수인지 여부
    pub required: bool,
}

impl Default for ExternalApiConfig {
    fn default() -> Self {
        Self {
            name: "ai_service".to_string(),
            health_url: None,
            required: false,
        }
    }
}

impl AppConfig {
    /// 파일과 환경 변수에서 설정을 로드합니다.
    ///
    /// 파일이 없으면 기본값과 환경 변수만 사용합니다.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, config::ConfigError> {
        let builder = config::Config::builder()
            .add_source(config::File::from(path.as_ref()).required(false))
            .add_source(
                config::Environment::with_prefix("ONBOARD")
                    .separator("__")
                    .try_parsing(true),
            );

        builder.build()?.try_deserialize()
    }

    /// `ONBOARD_CONFIG` 또는 기본 경로에서 설정을 로드합니다.
    pub fn load_default() -> Result<Self, config::ConfigError> {
        let path =
            std::env::var(CONFIG_PATH_ENV).unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string());
        Self::load(path)
    }

    /// TOML 문자열에서 설정을 로드합니다 (환경 변수 미적용).
    pub fn from_toml_str(toml: &str) -> Result<Self, config::ConfigError> {
        config::Config::builder()
            .add_source(config::File::from_str(toml, config::FileFormat::Toml))
            .build()?
            .try_deserialize()
    }
}
