//! Process health sampling attached to each master recomputation.
//!
//! Samples are advisory: a threshold breach fills in `warning` and logs it,
//! but never fails the refresh that took the sample.

use chrono::Utc;
use tracing::warn;

use crate::config::SamplerConfig;
use crate::models::stats::CpuSample;

/// Raw readings before threshold evaluation.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct RawReadings {
    /// 1, 5 and 15 minute load averages.
    pub load_average: [f64; 3],
    /// Resident set size.
    pub rss_bytes: u64,
    /// Data segment size.
    pub heap_used_bytes: u64,
    /// Total memory available.
    pub heap_total_bytes: u64,
    /// Accumulated user CPU time.
    pub user_cpu_micros: u64,
    /// Accumulated system CPU time.
    pub system_cpu_micros: u64,
}

/// Takes samples and flags the ones above the configured thresholds.
#[derive(Debug, Clone)]
pub struct ResourceSampler {
    load_warning_threshold: f64,
    heap_warning_bytes: u64,
}

impl ResourceSampler {
    /// Build a sampler from configuration.
    #[must_use]
    pub fn new(config: &SamplerConfig) -> Self {
        Self {
            load_warning_threshold: config.load_warning_threshold,
            heap_warning_bytes: config.heap_warning_bytes,
        }
    }

    /// Sample the current process.
    #[must_use]
    pub fn sample(&self) -> CpuSample {
        self.evaluate(read_process())
    }

    /// Turn raw readings into a sample, attaching a warning if needed.
    #[must_use]
    pub fn evaluate(&self, raw: RawReadings) -> CpuSample {
        let mut reasons = Vec::new();
        if raw.load_average[0] > self.load_warning_threshold {
            reasons.push(format!(
                "1m load {:.2} above {:.2}",
                raw.load_average[0], self.load_warning_threshold
            ));
        }
        if raw.heap_used_bytes > self.heap_warning_bytes {
            reasons.push(format!(
                "heap {} bytes above {} bytes",
                raw.heap_used_bytes, self.heap_warning_bytes
            ));
        }

        let warning = if reasons.is_empty() {
            None
        } else {
            let joined = reasons.join("; ");
            warn!(warning = %joined, "resource pressure");
            Some(joined)
        };

        CpuSample {
            sampled_at: Utc::now(),
            load_average: raw.load_average,
            rss_bytes: raw.rss_bytes,
            heap_used_bytes: raw.heap_used_bytes,
            heap_total_bytes: raw.heap_total_bytes,
            user_cpu_micros: raw.user_cpu_micros,
            system_cpu_micros: raw.system_cpu_micros,
            warning,
        }
    }
}

#[cfg(target_os = "linux")]
fn read_process() -> RawReadings {
    use nix::sys::resource::{getrusage, UsageWho};
    use nix::unistd::{sysconf, SysconfVar};

    let mut raw = RawReadings::default();

    match nix::sys::sysinfo::sysinfo() {
        Ok(info) => {
            let (one, five, fifteen) = info.load_average();
            raw.load_average = [one, five, fifteen];
            raw.heap_total_bytes = info.ram_total();
        }
        Err(err) => warn!(%err, "sysinfo unavailable"),
    }

    match getrusage(UsageWho::RUSAGE_SELF) {
        Ok(usage) => {
            raw.user_cpu_micros = timeval_micros(usage.user_time());
            raw.system_cpu_micros = timeval_micros(usage.system_time());
        }
        Err(err) => warn!(%err, "getrusage failed"),
    }

    let page_size = sysconf(SysconfVar::PAGE_SIZE)
        .ok()
        .flatten()
        .and_then(|size| u64::try_from(size).ok())
        .unwrap_or(4096);

    // statm: size resident shared text lib data dt (in pages)
    if let Ok(statm) = std::fs::read_to_string("/proc/self/statm") {
        let pages: Vec<u64> = statm
            .split_whitespace()
            .filter_map(|field| field.parse().ok())
            .collect();
        if let (Some(resident), Some(data)) = (pages.get(1), pages.get(5)) {
            raw.rss_bytes = resident.saturating_mul(page_size);
            raw.heap_used_bytes = data.saturating_mul(page_size);
        }
    }

    raw
}

#[cfg(target_os = "linux")]
fn timeval_micros(tv: nix::sys::time::TimeVal) -> u64 {
    let secs = u64::try_from(tv.tv_sec()).unwrap_or(0);
    let micros = u64::try_from(tv.tv_usec()).unwrap_or(0);
    secs.saturating_mul(1_000_000).saturating_add(micros)
}

#[cfg(not(target_os = "linux"))]
fn read_process() -> RawReadings {
    RawReadings::default()
}
