//! Server metrics served by `/monitor`
//!
//! Request and connection counts are plain atomics updated on the hot path.
//! CPU and memory usage are sampled from `/proc` by
//! [`ServerMetrics::refresh_system_metrics`], which the binary calls on a
//! timer; the snapshot returns whatever the last refresh saw.

use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};
use std::time::Instant;

use parking_lot::Mutex;
use serde::Serialize;

#[derive(Debug, Default)]
struct CpuSample {
    total: u64,
    idle: u64,
}

#[derive(Debug, Default, Clone, Copy)]
struct SystemUsage {
    cpu_percent: f64,
    memory_mb: u64,
}

pub struct ServerMetrics {
    total_requests: AtomicU64,
    active_connections: AtomicI64,
    rejected_tasks: AtomicU64,
    started: Instant,
    last_cpu: Mutex<CpuSample>,
    usage: Mutex<SystemUsage>,
}

/// JSON body of the `/monitor` endpoint.
#[derive(Debug, Clone, Serialize)]
pub struct MetricsSnapshot {
    pub cpu_usage_percent: f64,
    pub memory_usage_mb: u64,
    pub total_requests: u64,
    pub uptime_seconds: u64,
    pub active_connections: i64,
    pub rejected_tasks: u64,
}

impl ServerMetrics {
    pub fn new() -> Self {
        Self {
            total_requests: AtomicU64::new(0),
            active_connections: AtomicI64::new(0),
            rejected_tasks: AtomicU64::new(0),
            started: Instant::now(),
            last_cpu: Mutex::new(CpuSample::default()),
            usage: Mutex::new(SystemUsage::default()),
        }
    }

    pub fn increment_requests(&self) {
        self.total_requests.fetch_add(1, Ordering::Relaxed);
    }

    pub fn total_requests(&self) -> u64 {
        self.total_requests.load(Ordering::Relaxed)
    }

    pub fn increment_active_connections(&self) {
        self.active_connections.fetch_add(1, Ordering::Relaxed);
    }

    pub fn decrement_active_connections(&self) {
        self.active_connections.fetch_sub(1, Ordering::Relaxed);
    }

    pub fn active_connections(&self) -> i64 {
        self.active_connections.load(Ordering::Relaxed)
    }

    /// A task was refused by a full dispatch queue.
    pub fn increment_rejected(&self) {
        self.rejected_tasks.fetch_add(1, Ordering::Relaxed);
    }

    pub fn rejected_tasks(&self) -> u64 {
        self.rejected_tasks.load(Ordering::Relaxed)
    }

    pub fn uptime_seconds(&self) -> u64 {
        self.started.elapsed().as_secs()
    }

    /// Re-samples `/proc/stat` and `/proc/meminfo`. Missing or unreadable
    /// files leave the previous values in place.
    pub fn refresh_system_metrics(&self) {
        let mut usage = self.usage.lock();

        if let Ok(stat) = std::fs::read_to_string("/proc/stat") {
            if let Some(sample) = parse_cpu_line(&stat) {
                let mut last = self.last_cpu.lock();
                usage.cpu_percent = cpu_percent(&last, &sample);
                *last = sample;
            }
        }

        if let Ok(meminfo) = std::fs::read_to_string("/proc/meminfo") {
            if let Some(used) = parse_used_memory_mb(&meminfo) {
                usage.memory_mb = used;
            }
        }
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        let usage = *self.usage.lock();
        MetricsSnapshot {
            cpu_usage_percent: (usage.cpu_percent * 100.0).round() / 100.0,
            memory_usage_mb: usage.memory_mb,
            total_requests: self.total_requests(),
            uptime_seconds: self.uptime_seconds(),
            active_connections: self.active_connections(),
            rejected_tasks: self.rejected_tasks(),
        }
    }

    pub fn to_json(&self) -> String {
        serde_json::to_string(&self.snapshot()).unwrap_or_else(|_| "{}".to_string())
    }
}

impl Default for ServerMetrics {
    fn default() -> Self {
        Self::new()
    }
}

/// First line of `/proc/stat`: `cpu user nice system idle iowait irq ...`
fn parse_cpu_line(stat: &str) -> Option<CpuSample> {
    let line = stat.lines().next()?;
    let mut fields = line.split_whitespace();
    if fields.next()? != "cpu" {
        return None;
    }

    let values: Vec<u64> = fields.filter_map(|f| f.parse().ok()).collect();
    if values.len() < 4 {
        return None;
    }

    let idle = values[3] + values.get(4).copied().unwrap_or(0);
    Some(CpuSample {
        total: values.iter().sum(),
        idle,
    })
}

fn cpu_percent(prev: &CpuSample, now: &CpuSample) -> f64 {
    let total = now.total.saturating_sub(prev.total);
    let idle = now.idle.saturating_sub(prev.idle);
    if total == 0 {
        return 0.0;
    }
    100.0 * (1.0 - idle as f64 / total as f64)
}

/// `MemTotal - MemAvailable` (falling back to `MemFree`), in MB.
fn parse_used_memory_mb(meminfo: &str) -> Option<u64> {
    let mut total = None;
    let mut free = None;
    let mut available = None;

    for line in meminfo.lines() {
        let mut parts = line.split_whitespace();
        let key = parts.next();
        let value = parts.next().and_then(|v| v.parse::<u64>().ok());
        match key {
            Some("MemTotal:") => total = value,
            Some("MemFree:") => free = value,
            Some("MemAvailable:") => available = value,
            _ => {}
        }
    }

    let total = total?;
    let avail = available.or(free)?;
    Some(total.saturating_sub(avail) / 1024)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counters_track_requests_and_connections() {
        let m = ServerMetrics::new();
        m.increment_requests();
        m.increment_requests();
        m.increment_active_connections();
        m.increment_active_connections();
        m.decrement_active_connections();

        let snap = m.snapshot();
        assert_eq!(snap.total_requests, 2);
        assert_eq!(snap.active_connections, 1);
    }

    #[test]
    fn json_snapshot_has_monitor_fields() {
        let m = ServerMetrics::new();
        let v: serde_json::Value = serde_json::from_str(&m.to_json()).unwrap();
        for key in [
            "cpu_usage_percent",
            "memory_usage_mb",
            "total_requests",
            "uptime_seconds",
            "active_connections",
        ] {
            assert!(v.get(key).is_some(), "missing {}", key);
        }
    }

    #[test]
    fn cpu_usage_from_two_samples() {
        let a = parse_cpu_line("cpu  100 0 100 800 0 0 0 0 0 0\n").unwrap();
        let b = parse_cpu_line("cpu  150 0 150 900 0 0 0 0 0 0\n").unwrap();
        let pct = cpu_percent(&a, &b);
        assert!((pct - 50.0).abs() < 1e-9);
    }

    #[test]
    fn memory_prefers_available() {
        let info = "MemTotal: 2048000 kB\nMemFree: 100000 kB\nMemAvailable: 1024000 kB\n";
        assert_eq!(parse_used_memory_mb(info), Some(1000));
    }
}
