//! Rate limiting middleware (admission gate).
//!
//! 클라이언트 키별 60초 슬라이딩 윈도우 기반 요청 제한을 제공합니다.
//! 각 검사에서 윈도우 밖의 타임스탬프를 먼저 제거하고, 남은 수가 한도 이상이면 거절합니다.
//! 거절은 에러가 아니라 [`AdmissionDecision::Rejected`] 값입니다.

use axum::{
    extract::{ConnectInfo, Request, State},
    http::{header, HeaderValue, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use chrono::{DateTime, Duration, Utc};
use onboard_core::{RateLimitConfig, SharedClock};
use std::collections::{HashMap, VecDeque};
use std::net::SocketAddr;
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::{debug, error, warn};

/// 슬라이딩 윈도우 길이 (초).
pub const WINDOW_SECS: i64 = 60;

/// 클라이언트 식별 정보가 없을 때 사용하는 공유 키.
pub const UNKNOWN_CLIENT: &str = "unknown";

/// 요청 제한 판정 결과.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdmissionDecision {
    /// 허용
    Admitted {
        /// 윈도우 내 남은 허용 수
        remaining: u32,
    },
    /// 거절
    Rejected {
        /// 재시도까지 대기 시간 (초)
        retry_after_secs: u64,
    },
}

impl AdmissionDecision {
    /// 허용 여부.
    pub fn is_admitted(&self) -> bool {
        matches!(self, Self::Admitted { .. })
    }
}

/// 클라이언트별 슬라이딩 윈도우 요청 제한기.
pub struct AdmissionGate {
    limit: u32,
    window: Duration,
    windows: Mutex<HashMap<String, VecDeque<DateTime<Utc>>>>,
    clock: SharedClock,
}

impl std::fmt::Debug for AdmissionGate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AdmissionGate")
            .field("limit", &self.limit)
            .field("tracked_clients", &self.tracked_clients())
            .finish()
    }
}

impl AdmissionGate {
    /// 60초 윈도우 내 `limit`개까지 허용하는 제한기 생성.
    pub fn new(limit: u32, clock: SharedClock) -> Self {
        Self {
            limit,
            window: Duration::seconds(WINDOW_SECS),
            windows: Mutex::new(HashMap::new()),
            clock,
        }
    }

    /// 설정에서 생성.
    pub fn from_config(config: &RateLimitConfig, clock: SharedClock) -> Self {
        Self::new(config.requests_per_minute, clock)
    }

    /// 윈도우당 허용 수.
    pub fn limit(&self) -> u32 {
        self.limit
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, VecDeque<DateTime<Utc>>>> {
        match self.windows.lock() {
            Ok(guard) => guard,
            Err(poisoned) => {
                error!("AdmissionGate mutex poisoned, recovering");
                poisoned.into_inner()
            }
        }
    }

    /// 요청 허용 여부 판정. 허용되면 현재 시각을 윈도우에 기록합니다.
    ///
    /// 빈 키는 [`UNKNOWN_CLIENT`]로 취급합니다.
    pub fn check(&self, client_key: &str) -> AdmissionDecision {
        let key = if client_key.trim().is_empty() {
            UNKNOWN_CLIENT
        } else {
            client_key
        };
        let now = self.clock.now();
        let cutoff = now - self.window;

        let mut windows = self.lock();
        let timestamps = windows.entry(key.to_string()).or_default();
        while timestamps.front().is_some_and(|t| *t <= cutoff) {
            timestamps.pop_front();
        }

        if timestamps.len() >= self.limit as usize {
            let retry_after_secs = timestamps
                .front()
                .map(|oldest| (*oldest + self.window - now).num_milliseconds())
                .map(|ms| ((ms + 999) / 1000).max(1) as u64)
                .unwrap_or(WINDOW_SECS as u64);
            return AdmissionDecision::Rejected { retry_after_secs };
        }

        timestamps.push_back(now);
        AdmissionDecision::Admitted {
            remaining: self.limit - timestamps.len() as u32,
        }
    }

    /// 요청 허용 여부 (`bool` 형태).
    pub fn admit(&self, client_key: &str) -> bool {
        self.check(client_key).is_admitted()
    }

    /// 윈도우가 모두 만료된 클라이언트 정리. 제거된 수를 반환합니다.
    pub fn cleanup(&self) -> usize {
        let cutoff = self.clock.now() - self.window;
        let mut windows = self.lock();
        let before = windows.len();
        windows.retain(|_, timestamps| timestamps.back().is_some_and(|t| *t > cutoff));
        let removed = before - windows.len();
        crate::metrics::set_tracked_clients(windows.len());
        if removed > 0 {
            debug!(removed, remaining = windows.len(), "Idle admission windows cleaned up");
        }
        removed
    }

    /// 현재 추적 중인 클라이언트 수.
    pub fn tracked_clients(&self) -> usize {
        self.lock().len()
    }
}

/// 요청에서 클라이언트 키 추출.
///
/// X-Forwarded-For(첫 번째 값), X-Real-IP, 연결 정보 순으로 확인하며
/// 모두 없으면 [`UNKNOWN_CLIENT`]입니다.
pub fn client_key(request: &Request) -> String {
    let header_value = |name: &str| {
        request
            .headers()
            .get(name)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.split(',').next())
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .map(str::to_string)
    };

    header_value("x-forwarded-for")
        .or_else(|| header_value("x-real-ip"))
        .or_else(|| {
            request
                .extensions()
                .get::<ConnectInfo<SocketAddr>>()
                .map(|ConnectInfo(addr)| addr.ip().to_string())
        })
        .unwrap_or_else(|| UNKNOWN_CLIENT.to_string())
}

/// 429 응답 생성.
pub fn rejection_response(retry_after_secs: u64) -> Response {
    let body = serde_json::json!({
        "code": "RATE_LIMIT_EXCEEDED",
        "message": format!(
            "Too many requests. Please try again in {} seconds.",
            retry_after_secs
        ),
        "retry_after": retry_after_secs,
        "timestamp": Utc::now().timestamp(),
    });

    let mut response = (StatusCode::TOO_MANY_REQUESTS, Json(body)).into_response();
    response
        .headers_mut()
        .insert(header::RETRY_AFTER, HeaderValue::from(retry_after_secs));
    response
}

/// Rate Limiting 미들웨어 함수.
pub async fn rate_limit_middleware(
    State(gate): State<Arc<AdmissionGate>>,
    request: Request,
    next: Next,
) -> Response {
    let key = client_key(&request);

    match gate.check(&key) {
        AdmissionDecision::Admitted { .. } => {
            crate::metrics::record_admission(true);
            next.run(request).await
        }
        AdmissionDecision::Rejected { retry_after_secs } => {
            crate::metrics::record_admission(false);
            warn!(
                client = %key,
                path = %request.uri().path(),
                retry_after = retry_after_secs,
                "Rate limit exceeded"
            );
            rejection_response(retry_after_secs)
        }
    }
}
