//! 통합 API 에러 응답 타입.
//!
//! 모든 API 엔드포인트에서 일관된 에러 형식을 제공합니다.
//! 핸들러는 [`ApiError`]를 반환하고, 응답에는 요청 상관관계 계층이 읽는
//! [`FailureInfo`] 확장이 붙습니다.

use axum::{
    http::{Method, StatusCode, Uri},
    response::{IntoResponse, Response},
    Json,
};
use onboard_core::OnboardError;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::any::Any;
use thiserror::Error;
use utoipa::ToSchema;

use crate::monitoring::error_tracker::{classify, ErrorCategory, ErrorSeverity};

/// 통합 API 에러 응답.
///
/// # 예시
///
/// ```json
/// {
///   "code": "VALIDATION_ERROR",
///   "message": "잘못된 입력: hours must be between 1 and 720",
///   "timestamp": 1738300800
/// }
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ApiErrorResponse {
    /// 에러 코드 (예: "DB_ERROR", "VALIDATION_ERROR", "NOT_FOUND")
    pub code: String,
    /// 사람이 읽을 수 있는 에러 메시지
    pub message: String,
    /// 추가 에러 상세 정보 (선택적)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<Value>,
    /// 에러 발생 타임스탬프 (Unix timestamp, 선택적)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<i64>,
    /// HTTP 메서드 (GET, POST 등)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub method: Option<String>,
    /// 요청 경로
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
}

impl ApiErrorResponse {
    /// 기본 에러 생성 (타임스탬프 포함).
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
            details: None,
            timestamp: Some(chrono::Utc::now().timestamp()),
            method: None,
            path: None,
        }
    }

    /// 상세 정보 포함 에러 생성.
    pub fn with_details(
        code: impl Into<String>,
        message: impl Into<String>,
        details: Value,
    ) -> Self {
        Self {
            details: Some(details),
            ..Self::new(code, message)
        }
    }

    /// 요청 정보(메서드, 경로)를 추가합니다.
    #[must_use]
    pub fn with_request_info(mut self, method: &Method, uri: &Uri) -> Self {
        self.method = Some(method.to_string());
        self.path = Some(uri.path().to_string());
        self
    }
}

impl std::fmt::Display for ApiErrorResponse {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}] {}", self.code, self.message)
    }
}

/// 실패한 응답에 붙는 분류 정보.
///
/// 요청 상관관계 미들웨어가 이 확장을 읽어 에러 추적기에 기록합니다.
/// 클라이언트에게 숨긴 내부 메시지도 여기에는 그대로 남습니다.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FailureInfo {
    /// 카테고리
    pub category: ErrorCategory,
    /// 심각도
    pub severity: ErrorSeverity,
    /// 내부 에러 메시지
    pub message: String,
}

impl FailureInfo {
    /// 새 분류 정보 생성.
    pub fn new(category: ErrorCategory, severity: ErrorSeverity, message: impl Into<String>) -> Self {
        Self {
            category,
            severity,
            message: message.into(),
        }
    }

    /// 확장이 없는 응답의 상태 코드로 추론한 분류.
    ///
    /// 타임아웃(408, 504)은 네트워크, 나머지 5xx는 시스템 에러입니다.
    /// 그 밖의 상태 코드는 실패로 보지 않습니다.
    pub fn from_status(status: StatusCode) -> Option<Self> {
        let category = match status {
            StatusCode::REQUEST_TIMEOUT | StatusCode::GATEWAY_TIMEOUT => ErrorCategory::Network,
            s if s.is_server_error() => ErrorCategory::System,
            _ => return None,
        };
        Some(Self::new(
            category,
            ErrorSeverity::High,
            format!("HTTP {}", status),
        ))
    }
}

/// API 핸들러 에러.
#[derive(Debug, Error)]
pub enum ApiError {
    /// 핵심 에러
    #[error(transparent)]
    Core(#[from] OnboardError),

    /// 요청 파라미터 검증 실패
    #[error("잘못된 요청 파라미터: {0}")]
    InvalidParams(#[from] validator::ValidationErrors),
}

/// API 핸들러 Result 타입 별칭.
pub type ApiResult<T> = Result<T, ApiError>;

impl ApiError {
    /// 응답 상태 코드.
    pub fn status_code(&self) -> StatusCode {
        match self {
            ApiError::InvalidParams(_) => StatusCode::BAD_REQUEST,
            ApiError::Core(err) => match err {
                OnboardError::Validation(_) => StatusCode::BAD_REQUEST,
                OnboardError::NotFound(_) => StatusCode::NOT_FOUND,
                OnboardError::Auth(_) => StatusCode::UNAUTHORIZED,
                OnboardError::DocumentProcessing(_) => StatusCode::UNPROCESSABLE_ENTITY,
                OnboardError::Timeout(_) => StatusCode::GATEWAY_TIMEOUT,
                OnboardError::ExternalApi(_) | OnboardError::AiService(_) => StatusCode::BAD_GATEWAY,
                OnboardError::Database(_) => StatusCode::SERVICE_UNAVAILABLE,
                OnboardError::Config(_)
                | OnboardError::Sampling(_)
                | OnboardError::Serialization(_)
                | OnboardError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            },
        }
    }

    /// 에러 분류.
    pub fn failure_info(&self) -> FailureInfo {
        match self {
            ApiError::InvalidParams(e) => {
                FailureInfo::new(ErrorCategory::Validation, ErrorSeverity::Low, e.to_string())
            }
            ApiError::Core(err) => {
                let (category, severity) = classify(err);
                FailureInfo::new(category, severity, err.to_string())
            }
        }
    }

    fn code(&self) -> &'static str {
        match self {
            ApiError::InvalidParams(_) => "VALIDATION_ERROR",
            ApiError::Core(err) => err.error_code(),
        }
    }

    /// 클라이언트에게 보여줄 메시지. 시스템/데이터베이스 에러의 내부 내용은 숨깁니다.
    fn public_message(&self, info: &FailureInfo) -> String {
        match info.category {
            ErrorCategory::System => "내부 서버 오류가 발생했습니다".to_string(),
            ErrorCategory::Database => "서비스를 일시적으로 사용할 수 없습니다".to_string(),
            _ => self.to_string(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let info = self.failure_info();
        let body = ApiErrorResponse::new(self.code(), self.public_message(&info));

        let mut response = (self.status_code(), Json(body)).into_response();
        response.extensions_mut().insert(info);
        response
    }
}

/// 핸들러 패닉을 500 응답으로 변환합니다 (`CatchPanicLayer`용).
///
/// 패닉은 Critical 시스템 에러로 분류됩니다.
pub fn handle_panic(err: Box<dyn Any + Send + 'static>) -> Response {
    let detail = if let Some(s) = err.downcast_ref::<String>() {
        s.clone()
    } else if let Some(s) = err.downcast_ref::<&str>() {
        (*s).to_string()
    } else {
        "unknown panic".to_string()
    };

    let body = ApiErrorResponse::new("INTERNAL_ERROR", "내부 서버 오류가 발생했습니다");
    let mut response = (StatusCode::INTERNAL_SERVER_ERROR, Json(body)).into_response();
    response.extensions_mut().insert(FailureInfo::new(
        ErrorCategory::System,
        ErrorSeverity::Critical,
        format!("handler panicked: {}", detail),
    ));
    response
}
