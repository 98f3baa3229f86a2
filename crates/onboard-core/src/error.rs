//! 온보딩 백엔드의 에러 타입.
//!
//! 요청 처리, 의존성 호출, 백그라운드 모니터링 전반에서 사용되는 에러 분류를 정의합니다.
//! 분류(카테고리)와 심각도는 에러 추적기와 요청 상관관계 계층이 함께 사용합니다.

use thiserror::Error;

/// 핵심 에러.
#[derive(Debug, Error)]
pub enum OnboardError {
    /// 설정 에러
    #[error("설정 에러: {0}")]
    Config(String),

    /// 잘못된 입력 (사용자 교정 가능)
    #[error("잘못된 입력: {0}")]
    Validation(String),

    /// 찾을 수 없음
    #[error("찾을 수 없음: {0}")]
    NotFound(String),

    /// 인증 에러
    #[error("인증 에러: {0}")]
    Auth(String),

    /// 데이터베이스 에러
    #[error("데이터베이스 에러: {0}")]
    Database(String),

    /// 외부 API 호출 에러
    #[error("외부 API 에러: {0}")]
    ExternalApi(String),

    /// 생성 모델(AI) 서비스 에러
    #[error("AI 서비스 에러: {0}")]
    AiService(String),

    /// 문서 처리(텍스트 추출 등) 에러
    #[error("문서 처리 에러: {0}")]
    DocumentProcessing(String),

    /// 타임아웃
    #[error("타임아웃: {0}")]
    Timeout(String),

    /// 시스템 리소스 샘플링 에러
    #[error("리소스 샘플링 에러: {0}")]
    Sampling(String),

    /// 직렬화 에러
    #[error("직렬화 에러: {0}")]
    Serialization(String),

    /// 내부 에러
    #[error("내부 에러: {0}")]
    Internal(String),
}

/// 온보딩 작업을 위한 Result 타입.
pub type OnboardResult<T> = Result<T, OnboardError>;

impl OnboardError {
    /// 재시도 가능한 에러인지 확인합니다.
    ///
    /// 의존성 장애(DB, 외부 API, 타임아웃)만 재시도 대상입니다.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            OnboardError::Database(_)
                | OnboardError::ExternalApi(_)
                | OnboardError::AiService(_)
                | OnboardError::Timeout(_)
        )
    }

    /// 사용자 입력으로 교정 가능한 에러인지 확인합니다.
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            OnboardError::Validation(_) | OnboardError::NotFound(_) | OnboardError::Auth(_)
        )
    }

    /// 치명적인 에러인지 확인합니다.
    pub fn is_critical(&self) -> bool {
        matches!(self, OnboardError::Config(_) | OnboardError::Internal(_))
    }

    /// API 응답용 에러 코드.
    pub fn error_code(&self) -> &'static str {
        match self {
            OnboardError::Config(_) => "CONFIG_ERROR",
            OnboardError::Validation(_) => "VALIDATION_ERROR",
            OnboardError::NotFound(_) => "NOT_FOUND",
            OnboardError::Auth(_) => "UNAUTHORIZED",
            OnboardError::Database(_) => "DB_ERROR",
            OnboardError::ExternalApi(_) => "EXTERNAL_API_ERROR",
            OnboardError::AiService(_) => "AI_SERVICE_ERROR",
            OnboardError::DocumentProcessing(_) => "DOCUMENT_PROCESSING_ERROR",
            OnboardError::Timeout(_) => "TIMEOUT",
            OnboardError::Sampling(_) => "SAMPLING_ERROR",
            OnboardError::Serialization(_) => "SERIALIZATION_ERROR",
            OnboardError::Internal(_) => "INTERNAL_ERROR",
        }
    }
}

impl From<serde_json::Error> for OnboardError {
    fn from(err: serde_json::Error) -> Self {
        OnboardError::Serialization(err.to_string())
    }
}

impl From<config::ConfigError> for OnboardError {
    fn from(err: config::ConfigError) -> Self {
        OnboardError::Config(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_retryable() {
        let db_err = OnboardError::Database("connection refused".to_string());
        assert!(db_err.is_retryable());

        let validation_err = OnboardError::Validation("empty file".to_string());
        assert!(!validation_err.is_retryable());
        assert!(validation_err.is_client_error());
    }

    #[test]
    fn test_error_critical() {
        assert!(OnboardError::Internal("invariant broken".to_string()).is_critical());
        assert!(!OnboardError::Timeout("llm".to_string()).is_critical());
    }

    #[test]
    fn test_error_code() {
        assert_eq!(OnboardError::Auth("x".into()).error_code(), "UNAUTHORIZED");
        assert_eq!(
            OnboardError::AiService("x".into()).error_code(),
            "AI_SERVICE_ERROR"
        );
    }

    #[test]
    fn test_from_serde_json_error() {
        let err = serde_json::from_str::<serde_json::Value>("{").unwrap_err();
        let err: OnboardError = err.into();
        assert!(matches!(err, OnboardError::Serialization(_)));
    }
}
