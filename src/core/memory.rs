//! System memory readings for the status line.
//!
//! RAM usage above [`PRESSURE_PERCENT`] is reported as memory pressure so the
//! front-end can warn before precaching a large folder.

use log::warn;
use sysinfo::System;

/// RAM usage (percent) considered memory pressure
pub const PRESSURE_PERCENT: f64 = 80.0;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MemoryUsage {
    pub total: u64,
    pub used: u64,
    pub swap_total: u64,
    pub swap_used: u64,
}

impl MemoryUsage {
    /// Read current RAM/swap figures. `None` if the platform reports no RAM.
    pub fn query() -> Option<Self> {
        let mut sys = System::new();
        sys.refresh_memory();
        let usage = Self {
            total: sys.total_memory(),
            used: sys.used_memory(),
            swap_total: sys.total_swap(),
            swap_used: sys.used_swap(),
        };
        if usage.total == 0 {
            warn!("Failed to query memory info");
            return None;
        }
        Some(usage)
    }

    pub fn ram_percent(&self) -> f64 {
        percent(self.used, self.total)
    }

    pub fn swap_percent(&self) -> f64 {
        percent(self.swap_used, self.swap_total)
    }

    pub fn under_pressure(&self) -> bool {
        self.ram_percent() > PRESSURE_PERCENT
    }
}

impl std::fmt::Display for MemoryUsage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Ram%: {:.0} | Swap%: {:.0}", self.ram_percent(), self.swap_percent())
    }
}

fn percent(used: u64, total: u64) -> f64 {
    if total == 0 { 0.0 } else { used as f64 / total as f64 * 100.0 }
}
