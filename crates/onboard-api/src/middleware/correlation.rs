//! 요청 상관관계 미들웨어.
//!
//! 요청마다 새 correlation id를 발급하고 처리 시간을 측정합니다.
//! 완료된 요청은 구조화 로그로 남기고, 실패한 요청은 분류하여
//! [`ErrorTracker`]에 전달합니다. 응답 자체는 바꾸지 않고 헤더만 붙입니다.
//!
//! 요청 제한 레이어 바깥에 배치되어 429 응답에도 correlation id가 붙습니다.

use axum::{
    extract::{Request, State},
    http::{HeaderName, HeaderValue, Method},
    middleware::Next,
    response::Response,
};
use chrono::{DateTime, Utc};
use onboard_core::{request_span, SharedClock};
use std::time::Instant;
use tracing::{error, info, warn, Instrument};
use uuid::Uuid;

use super::rate_limit::client_key;
use crate::error::FailureInfo;
use crate::monitoring::error_tracker::{ErrorReport, ErrorSeverity, ErrorTracker};

/// 응답 헤더: correlation id.
pub static CORRELATION_ID_HEADER: HeaderName = HeaderName::from_static("x-correlation-id");

/// 응답 헤더: 처리 시간 (초, 소수점 4자리).
pub static PROCESS_TIME_HEADER: HeaderName = HeaderName::from_static("x-process-time");

/// 요청 단위 컨텍스트. 요청 extension으로 핸들러에 전달됩니다.
#[derive(Debug, Clone)]
pub struct RequestContext {
    /// 요청 식별자 (UUID v4)
    pub correlation_id: Uuid,
    /// 요청 시작 시각
    pub started_at: DateTime<Utc>,
    /// HTTP 메서드
    pub method: Method,
    /// 요청 경로
    pub path: String,
    /// 클라이언트 식별자
    pub client: String,
}

/// 상관관계 미들웨어 상태.
#[derive(Clone)]
pub struct Correlator {
    tracker: ErrorTracker,
    clock: SharedClock,
}

impl Correlator {
    /// 새 상관관계 미들웨어 상태 생성.
    pub fn new(tracker: ErrorTracker, clock: SharedClock) -> Self {
        Self { tracker, clock }
    }

    fn begin(&self, request: &Request) -> RequestContext {
        RequestContext {
            correlation_id: Uuid::new_v4(),
            started_at: self.clock.now(),
            method: request.method().clone(),
            path: request.uri().path().to_string(),
            client: client_key(request),
        }
    }

    /// 실패 응답을 에러 추적기에 기록합니다.
    fn report_failure(&self, ctx: &RequestContext, status: u16, info: &FailureInfo) -> Uuid {
        let report = ErrorReport::new(info.message.clone(), info.severity, info.category)
            .component("http")
            .with_context("correlation_id", ctx.correlation_id.to_string())
            .with_context("method", ctx.method.to_string())
            .with_context("path", ctx.path.clone())
            .with_context("status", status.to_string())
            .with_context("client", ctx.client.clone());
        self.tracker.track_error(report)
    }
}

/// 요청 상관관계 미들웨어 함수.
pub async fn correlation_middleware(
    State(correlator): State<Correlator>,
    mut request: Request,
    next: Next,
) -> Response {
    let ctx = correlator.begin(&request);
    let span = request_span!(ctx.correlation_id, ctx.method, ctx.path);
    let start = Instant::now();

    request.extensions_mut().insert(ctx.clone());

    let mut response = next.run(request).instrument(span.clone()).await;

    let elapsed = start.elapsed();
    let elapsed_ms = elapsed.as_secs_f64() * 1000.0;
    let status = response.status();

    let failure = response
        .extensions()
        .get::<FailureInfo>()
        .cloned()
        .or_else(|| FailureInfo::from_status(status));

    span.in_scope(|| match &failure {
        Some(info) => {
            let event_id = correlator.report_failure(&ctx, status.as_u16(), info);
            if info.severity >= ErrorSeverity::High {
                error!(
                    status = status.as_u16(),
                    elapsed_ms,
                    error = %info.message,
                    %event_id,
                    "Request failed"
                );
            } else {
                warn!(
                    status = status.as_u16(),
                    elapsed_ms,
                    error = %info.message,
                    %event_id,
                    "Request failed"
                );
            }
        }
        None => {
            info!(status = status.as_u16(), elapsed_ms, "Request completed");
        }
    });

    let headers = response.headers_mut();
    if let Ok(value) = HeaderValue::from_str(&ctx.correlation_id.to_string()) {
        headers.insert(CORRELATION_ID_HEADER.clone(), value);
    }
    if let Ok(value) = HeaderValue::from_str(&format!("{:.4}", elapsed.as_secs_f64())) {
        headers.insert(PROCESS_TIME_HEADER.clone(), value);
    }

    response
}
