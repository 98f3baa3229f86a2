//! 시스템 리소스 샘플링.
//!
//! [`SystemMonitor`](super::SystemMonitor)는 [`ResourceSampler`]를 통해서만 호스트 상태를 읽습니다.
//! 운영에서는 `sysinfo` 기반 [`SysinfoSampler`]를, 테스트에서는 [`ScriptedSampler`]를 사용합니다.

use onboard_core::{OnboardError, OnboardResult};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::sync::Mutex;
use sysinfo::{CpuExt, DiskExt, System, SystemExt};

/// 한 시점의 리소스 사용률 (%).
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct ResourceReading {
    /// 전체 CPU 사용률
    pub cpu_percent: f64,
    /// 메모리 사용률
    pub memory_percent: f64,
    /// 디스크 사용률 (전체 마운트 합산)
    pub disk_percent: f64,
}

/// 리소스 샘플러.
///
/// 샘플링은 짧은 동기 작업이므로 `async`가 아닙니다.
pub trait ResourceSampler: Send + Sync {
    /// 현재 사용률을 읽습니다.
    fn sample(&self) -> OnboardResult<ResourceReading>;
}

fn percent(used: u64, total: u64) -> f64 {
    if total == 0 {
        0.0
    } else {
        used as f64 / total as f64 * 100.0
    }
}

/// `sysinfo` 기반 샘플러.
pub struct SysinfoSampler {
    system: Mutex<System>,
}

impl SysinfoSampler {
    /// 새 샘플러 생성.
    ///
    /// CPU 사용률은 두 번의 갱신 사이 차이로 계산되므로 생성 시 한 번 갱신해 둡니다.
    pub fn new() -> Self {
        let mut system = System::new();
        system.refresh_cpu();
        system.refresh_memory();
        system.refresh_disks_list();
        Self {
            system: Mutex::new(system),
        }
    }
}

impl Default for SysinfoSampler {
    fn default() -> Self {
        Self::new()
    }
}

impl ResourceSampler for SysinfoSampler {
    fn sample(&self) -> OnboardResult<ResourceReading> {
        let mut system = self
            .system
            .lock()
            .map_err(|_| OnboardError::Sampling("sysinfo lock poisoned".to_string()))?;

        system.refresh_cpu();
        system.refresh_memory();
        system.refresh_disks();

        let cpu_percent = f64::from(system.global_cpu_info().cpu_usage());
        let memory_percent = percent(system.used_memory(), system.total_memory());

        let (total, available) = system
            .disks()
            .iter()
            .fold((0u64, 0u64), |(total, available), disk| {
                (total + disk.total_space(), available + disk.available_space())
            });
        let disk_percent = percent(total.saturating_sub(available), total);

        Ok(ResourceReading {
            cpu_percent,
            memory_percent,
            disk_percent,
        })
    }
}

/// 미리 정해 둔 결과를 순서대로 돌려주는 샘플러.
///
/// 스크립트가 소진되면 마지막 결과를 반복합니다.
pub struct ScriptedSampler {
    script: Mutex<VecDeque<OnboardResult<ResourceReading>>>,
    last: Mutex<Option<ResourceReading>>,
}

impl ScriptedSampler {
    /// 결과 목록으로 생성.
    pub fn new(script: impl IntoIterator<Item = OnboardResult<ResourceReading>>) -> Self {
        Self {
            script: Mutex::new(script.into_iter().collect()),
            last: Mutex::new(None),
        }
    }

    /// 항상 같은 값을 돌려주는 샘플러.
    pub fn constant(reading: ResourceReading) -> Self {
        Self::new([Ok(reading)])
    }
}

impl ResourceSampler for ScriptedSampler {
    fn sample(&self) -> OnboardResult<ResourceReading> {
        let next = self
            .script
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .pop_front();
        let mut last = self.last.lock().unwrap_or_else(|p| p.into_inner());
        match next {
            Some(Ok(reading)) => {
                *last = Some(reading);
                Ok(reading)
            }
            Some(Err(err)) => Err(err),
            None => Ok(last.unwrap_or_default()),
        }
    }
}
