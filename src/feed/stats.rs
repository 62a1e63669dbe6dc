//! Host metrics for the system stats feed.
//!
//! Stats are the pull-driven contrast to the broadcast feeds: there is no
//! shared background task, each WebSocket connection samples on its own.
//! This module only knows how to take one snapshot; the per-connection loop
//! lives in the server layer.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Serialize;
use sysinfo::System;
use tracing::debug;

/// Default Linux thermal zone exposing the SoC temperature.
pub const THERMAL_ZONE: &str = "/sys/class/thermal/thermal_zone0/temp";

/// Delay between two stats messages on one connection.
pub const STATS_INTERVAL: Duration = Duration::from_millis(100);

const BYTES_PER_GB: f64 = (1024u64 * 1024 * 1024) as f64;

#[derive(Debug, Clone, Serialize)]
pub struct OsInfo {
    pub hostname: String,
    pub platform: String,
    pub arch: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct MemoryUsage {
    /// Gigabytes in use.
    pub used: f64,
    /// Total gigabytes installed.
    pub total: f64,
}

/// One stats message; camelCase on the wire for the dashboard.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SystemStats {
    pub os: OsInfo,
    pub cpu_temp: f64,
    pub cpu_usage: Vec<f32>,
    pub memory_usage: MemoryUsage,
}

/// Samples host metrics.
///
/// Keeps the `sysinfo` handle across samples so per-core CPU percentages are
/// computed against the previous refresh.
pub struct StatsCollector {
    system: System,
    thermal_zone: PathBuf,
}

impl StatsCollector {
    pub fn new() -> Self {
        Self::with_thermal_zone(THERMAL_ZONE)
    }

    pub fn with_thermal_zone(path: impl Into<PathBuf>) -> Self {
        Self {
            system: System::new(),
            thermal_zone: path.into(),
        }
    }

    /// Takes one snapshot. A failing metric degrades its own field rather
    /// than failing the snapshot.
    pub fn sample(&mut self) -> SystemStats {
        self.system.refresh_cpu_usage();
        self.system.refresh_memory();

        SystemStats {
            os: OsInfo {
                hostname: System::host_name().unwrap_or_default(),
                platform: std::env::consts::OS.to_string(),
                arch: std::env::consts::ARCH.to_string(),
            },
            cpu_temp: read_cpu_temp(&self.thermal_zone),
            cpu_usage: self.system.cpus().iter().map(|cpu| cpu.cpu_usage()).collect(),
            memory_usage: MemoryUsage {
                used: self.system.used_memory() as f64 / BYTES_PER_GB,
                total: self.system.total_memory() as f64 / BYTES_PER_GB,
            },
        }
    }
}

impl Default for StatsCollector {
    fn default() -> Self {
        Self::new()
    }
}

/// Reads the thermal zone (millidegrees Celsius). Unreadable or malformed
/// content degrades to `0.0` so the rest of the message still goes out.
fn read_cpu_temp(path: &Path) -> f64 {
    match std::fs::read_to_string(path) {
        Ok(raw) => raw
            .trim()
            .parse::<f64>()
            .map(|millis| millis / 1000.0)
            .unwrap_or(0.0),
        Err(err) => {
            debug!(%err, path = %path.display(), "thermal zone unreadable");
            0.0
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unreadable_thermal_zone_degrades_to_zero() {
        let mut collector = StatsCollector::with_thermal_zone("/nonexistent/thermal");
        let stats = collector.sample();
        assert_eq!(stats.cpu_temp, 0.0);
        // The rest of the message is still well-formed.
        assert!(stats.memory_usage.total >= stats.memory_usage.used);
        assert!(!stats.os.platform.is_empty());
    }

    #[test]
    fn thermal_zone_is_parsed_as_millidegrees() {
        let path = std::env::temp_dir().join(format!("thermal-test-{}", std::process::id()));
        std::fs::write(&path, "42500\n").expect("write thermal fixture");

        let mut collector = StatsCollector::with_thermal_zone(&path);
        assert_eq!(collector.sample().cpu_temp, 42.5);

        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn garbage_thermal_content_degrades_to_zero() {
        let path = std::env::temp_dir().join(format!("thermal-garbage-{}", std::process::id()));
        std::fs::write(&path, "not a number").expect("write thermal fixture");

        let mut collector = StatsCollector::with_thermal_zone(&path);
        assert_eq!(collector.sample().cpu_temp, 0.0);

        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn stats_serialize_with_dashboard_wire_names() {
        let mut collector = StatsCollector::with_thermal_zone("/nonexistent/thermal");
        let value = serde_json::to_value(collector.sample()).expect("stats serialize");

        assert!(value.get("os").is_some());
        assert!(value["os"].get("hostname").is_some());
        assert!(value.get("cpuTemp").is_some());
        assert!(value.get("cpuUsage").is_some());
        assert!(value["memoryUsage"].get("used").is_some());
        assert!(value["memoryUsage"].get("total").is_some());
    }
}
