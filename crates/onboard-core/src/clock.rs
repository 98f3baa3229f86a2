//! 시간 소스 추상화.
//!
//! 에러 추적기, 요청 제한기, 시스템 모니터는 `Utc::now()`를 직접 호출하지 않고
//! 주입된 [`Clock`]을 사용합니다. 테스트에서는 [`ManualClock`]으로 시간을 직접 이동시킵니다.

use chrono::{DateTime, Duration, Utc};
use std::fmt;
use std::sync::{Arc, RwLock};

/// 현재 시각을 제공하는 시간 소스.
pub trait Clock: Send + Sync + fmt::Debug {
    /// 현재 시각 (UTC).
    fn now(&self) -> DateTime<Utc>;
}

/// 공유 가능한 시간 소스 핸들.
pub type SharedClock = Arc<dyn Clock>;

/// 시스템 시계.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// 시스템 시계를 공유 핸들로 생성.
pub fn system_clock() -> SharedClock {
    Arc::new(SystemClock)
}

/// 수동으로 이동시키는 시계.
///
/// 복제본은 같은 시각을 공유합니다.
#[derive(Clone)]
pub struct ManualClock {
    current: Arc<RwLock<DateTime<Utc>>>,
}

impl ManualClock {
    /// 지정한 시각에서 시작하는 시계 생성.
    pub fn new(start: DateTime<Utc>) -> Self {
        Self {
            current: Arc::new(RwLock::new(start)),
        }
    }

    /// 현재 시스템 시각에서 시작하는 시계 생성.
    pub fn starting_now() -> Self {
        Self::new(Utc::now())
    }

    /// 시각을 앞으로 이동.
    pub fn advance(&self, by: Duration) {
        let mut current = self.current.write().unwrap_or_else(|p| p.into_inner());
        *current += by;
    }

    /// 시각을 직접 설정.
    pub fn set(&self, at: DateTime<Utc>) {
        let mut current = self.current.write().unwrap_or_else(|p| p.into_inner());
        *current = at;
    }

    /// 공유 핸들로 변환.
    pub fn shared(&self) -> SharedClock {
        Arc::new(self.clone())
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.current.read().unwrap_or_else(|p| p.into_inner())
    }
}

impl fmt::Debug for ManualClock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ManualClock").field("now", &self.now()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_manual_clock_advance_is_shared() {
        let clock = ManualClock::starting_now();
        let start = clock.now();
        let shared = clock.shared();

        clock.advance(Duration::seconds(61));

        assert_eq!(shared.now() - start, Duration::seconds(61));
    }

    #[test]
    fn test_system_clock_moves_forward() {
        let clock = SystemClock;
        let a = clock.now();
        let b = clock.now();
        assert!(b >= a);
    }
}
