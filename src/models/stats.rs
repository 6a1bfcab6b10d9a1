//! Resource sample history attached to each session.

use std::collections::VecDeque;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One process health sample taken during a master recomputation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CpuSample {
    /// When the sample was taken.
    pub sampled_at: DateTime<Utc>,
    /// 1, 5 and 15 minute load averages.
    pub load_average: [f64; 3],
    /// Resident set size of the process.
    pub rss_bytes: u64,
    /// Data segment size of the process.
    pub heap_used_bytes: u64,
    /// Total memory available to the process.
    pub heap_total_bytes: u64,
    /// Accumulated user CPU time.
    pub user_cpu_micros: u64,
    /// Accumulated system CPU time.
    pub system_cpu_micros: u64,
    /// Populated when a threshold was exceeded.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub warning: Option<String>,
}

/// Bounded ring buffer of the most recent samples for one session.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CpuStats {
    /// Oldest first.
    #[serde(default)]
    pub recent_server_samples: VecDeque<CpuSample>,
}

impl CpuStats {
    /// Append a sample, dropping the oldest ones beyond `capacity`.
    pub fn push(&mut self, sample: CpuSample, capacity: usize) {
        self.recent_server_samples.push_back(sample);
        while self.recent_server_samples.len() > capacity {
            self.recent_server_samples.pop_front();
        }
    }

    /// Most recent sample, if any.
    #[must_use]
    pub fn latest(&self) -> Option<&CpuSample> {
        self.recent_server_samples.back()
    }

    /// Number of retained samples.
    #[must_use]
    pub fn len(&self) -> usize {
        self.recent_server_samples.len()
    }

    /// Whether no sample has been recorded yet.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.recent_server_samples.is_empty()
    }
}
