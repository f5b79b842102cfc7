//! Pure percentage calculations shared by the samplers.
//!
//! These are the only places where the floating-point semantics of derived
//! values are defined.

/// Cumulative CPU time of a process, in seconds.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct CpuTimes {
    pub user: f64,
    pub system: f64,
}

impl CpuTimes {
    /// Returns user + system time.
    #[inline]
    pub fn total(&self) -> f64 {
        self.user + self.system
    }
}

/// Returns the CPU usage of a process as a percentage of one core, given two
/// cumulative readings taken `delta_secs` apart.
///
/// Returns 0 if `delta_secs` is not positive, or if the cumulative time did not
/// grow. A fresh process should be passed a zeroed `last`. No upper clamp is
/// applied, so a multi-threaded process can exceed 100.
pub fn cpu_percent(current: CpuTimes, last: CpuTimes, delta_secs: f64) -> f64 {
    if delta_secs <= 0.0 {
        return 0.0;
    }

    let cpu_delta = current.total() - last.total();
    if cpu_delta <= 0.0 {
        return 0.0;
    }

    cpu_delta / delta_secs * 100.0
}

/// Returns `used` as a percentage of `total`, or 0 if `total` is 0.
#[inline]
pub fn memory_percent(used: u64, total: u64) -> f64 {
    if total == 0 {
        return 0.0;
    }

    used as f64 / total as f64 * 100.0
}

/// Clamps a raw utilization reading to `[0, 100]`. NaN maps to 0.
#[inline]
pub fn utilization_percent(raw: impl Into<f64>) -> f64 {
    let raw = raw.into();
    if raw.is_nan() {
        0.0
    } else {
        raw.clamp(0.0, 100.0)
    }
}
