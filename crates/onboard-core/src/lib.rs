//! # Onboard Core
//!
//! 온보딩 백엔드 전반에서 공유하는 기반 타입을 제공합니다:
//! - 설정 관리 (`config` 크레이트 기반)
//! - 로깅 인프라 (`tracing`)
//! - 에러 분류
//! - 주입 가능한 시간 소스

pub mod clock;
pub mod config;
pub mod error;
pub mod logging;

pub use clock::{system_clock, Clock, ManualClock, SharedClock, SystemClock};
pub use config::*;
pub use error::*;
pub use logging::*;
