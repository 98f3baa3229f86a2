//! tracing 기반 로깅 초기화.
//!
//! - **pretty**: 개발용
//! - **json**: 운영환경/로그 수집기용. 현재 span(상관관계 ID 포함)이 각 레코드에 포함됩니다.
//! - **compact**: 한 줄 형식

use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::LoggingConfig;

/// 로그 출력 형식.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    /// 사람이 읽기 쉬운 형식 (개발용)
    #[default]
    Pretty,
    /// JSON 형식 (운영용)
    Json,
    /// 간결한 한 줄 형식
    Compact,
}

impl std::str::FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "pretty" => Ok(Self::Pretty),
            "json" => Ok(Self::Json),
            "compact" => Ok(Self::Compact),
            _ => Err(format!("Unknown log format: {}", s)),
        }
    }
}

/// 로깅 설정.
#[derive(Debug, Clone)]
pub struct LogConfig {
    /// 로그 레벨 필터 (예: "info", "onboard_api=debug,tower_http=info")
    pub level: String,
    /// 출력 형식
    pub format: LogFormat,
    /// 파일명과 줄 번호 포함 여부
    pub with_file: bool,
    /// 대상(모듈 경로) 포함 여부
    pub with_target: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::Pretty,
            with_file: false,
            with_target: true,
        }
    }
}

impl LogConfig {
    /// 새 로그 설정을 생성합니다.
    pub fn new(level: impl Into<String>) -> Self {
        Self {
            level: level.into(),
            ..Default::default()
        }
    }

    /// 로그 형식을 설정합니다.
    pub fn with_format(mut self, format: LogFormat) -> Self {
        self.format = format;
        self
    }

    /// 파일 위치 출력 여부를 설정합니다.
    pub fn with_file(mut self, enabled: bool) -> Self {
        self.with_file = enabled;
        self
    }

    /// 설정 파일 섹션에서 생성합니다.
    ///
    /// `LOG_FORMAT` 환경 변수가 있으면 설정 파일의 형식보다 우선합니다.
    /// 알 수 없는 형식 문자열은 pretty로 대체합니다.
    pub fn from_settings(settings: &LoggingConfig) -> Self {
        let raw = std::env::var("LOG_FORMAT").unwrap_or_else(|_| settings.format.clone());
        Self::from_parts(&settings.level, &raw)
    }

    fn from_parts(level: &str, format: &str) -> Self {
        let format = format.parse().unwrap_or_else(|e: String| {
            eprintln!("{}, falling back to pretty", e);
            LogFormat::Pretty
        });
        Self::new(level).with_format(format)
    }
}

/// 주어진 설정으로 로깅 시스템을 초기화합니다.
///
/// `RUST_LOG`가 설정되어 있으면 `level`보다 우선합니다.
///
/// # 예제
///
/// ```no_run
/// use onboard_core::logging::{init_logging, LogConfig, LogFormat};
///
/// init_logging(LogConfig::new("debug").with_format(LogFormat::Json)).unwrap();
/// ```
pub fn init_logging(config: LogConfig) -> Result<(), Box<dyn std::error::Error>> {
    let env_filter =
        EnvFilter::try_from_default_env().or_else(|_| EnvFilter::try_new(&config.level))?;

    let registry = tracing_subscriber::registry().with(env_filter);

    match config.format {
        LogFormat::Pretty => {
            registry
                .with(
                    fmt::layer()
                        .pretty()
                        .with_file(config.with_file)
                        .with_line_number(config.with_file)
                        .with_target(config.with_target),
                )
                .try_init()?;
        }
        LogFormat::Json => {
            registry
                .with(
                    fmt::layer()
                        .json()
                        .with_current_span(true)
                        .with_span_list(false)
                        .with_file(config.with_file)
                        .with_line_number(config.with_file)
                        .with_target(config.with_target),
                )
                .try_init()?;
        }
        LogFormat::Compact => {
            registry
                .with(
                    fmt::layer()
                        .compact()
                        .with_file(config.with_file)
                        .with_line_number(config.with_file)
                        .with_target(config.with_target),
                )
                .try_init()?;
        }
    }

    tracing::info!(
        format = ?config.format,
        level = %config.level,
        "Logging initialized"
    );

    Ok(())
}

/// 요청 단위 span 생성 매크로.
///
/// 상관관계 ID와 요청 정보를 span 필드로 남겨 하위 로그가 모두 같은 ID를 갖도록 합니다.
#[macro_export]
macro_rules! request_span {
    ($correlation_id:expr, $method:expr, $path:expr) => {
        tracing::info_span!(
            "request",
            correlation_id = %$correlation_id,
            method = %$method,
            path = %$path
        )
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_format_from_str() {
        assert_eq!("pretty".parse::<LogFormat>().unwrap(), LogFormat::Pretty);
        assert_eq!("JSON".parse::<LogFormat>().unwrap(), LogFormat::Json);
        assert_eq!("compact".parse::<LogFormat>().unwrap(), LogFormat::Compact);
        assert!("yaml".parse::<LogFormat>().is_err());
    }

    #[test]
    fn test_unknown_format_falls_back_to_pretty() {
        let config = LogConfig::from_parts("debug", "xml");
        assert_eq!(config.level, "debug");
        assert_eq!(config.format, LogFormat::Pretty);
    }

    #[test]
    fn test_request_span_macro_compiles() {
        let span = request_span!("abc", "GET", "/health");
        let _guard = span.enter();
    }
}
