//! API 서버용 HTTP middleware.
//!
//! 요청 처리 파이프라인에 적용되는 middleware 모듈.
//! 바깥에서 안쪽 순서: metrics → correlation → admission → timeout → panic 복구 → 핸들러.

mod correlation;
mod metrics;
mod rate_limit;

pub use correlation::{
    correlation_middleware, Correlator, RequestContext, CORRELATION_ID_HEADER,
    PROCESS_TIME_HEADER,
};
pub use metrics::metrics_layer;
pub use rate_limit::{
    client_key, rate_limit_middleware, rejection_response, AdmissionDecision, AdmissionGate,
    UNKNOWN_CLIENT, WINDOW_SECS,
};
