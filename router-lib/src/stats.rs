//! Per-filter counters.
//!
//! Counters are plain atomics so a reporter may poll them without touching the graph. How
//! and where they are reported is up to the caller.
use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

#[derive(Debug, Default)]
pub struct FilterStats {
    packets: AtomicU64,
    next_bytes: AtomicU64,
    rest_bytes: AtomicU64,
    bad_checksum: AtomicU64,
}

impl FilterStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn add_next(&self, len: usize) {
        self.packets.fetch_add(1, Ordering::Relaxed);
        self.next_bytes.fetch_add(len as u64, Ordering::Relaxed);
    }

    pub(crate) fn add_rest(&self, len: usize) {
        self.rest_bytes.fetch_add(len as u64, Ordering::Relaxed);
    }

    pub(crate) fn add_bad_checksum(&self) {
        self.bad_checksum.fetch_add(1, Ordering::Relaxed);
    }

    /// Frames (or formatted buffers) written to the next output.
    pub fn packets(&self) -> u64 {
        self.packets.load(Ordering::Relaxed)
    }

    pub fn next_bytes(&self) -> u64 {
        self.next_bytes.load(Ordering::Relaxed)
    }

    pub fn rest_bytes(&self) -> u64 {
        self.rest_bytes.load(Ordering::Relaxed)
    }

    pub fn bad_checksum(&self) -> u64 {
        self.bad_checksum.load(Ordering::Relaxed)
    }

    pub fn snapshot(&self, filter: &str) -> StatsSnapshot {
        StatsSnapshot {
            filter: filter.to_string(),
            packets: self.packets(),
            next_bytes: self.next_bytes(),
            rest_bytes: self.rest_bytes(),
            bad_checksum: self.bad_checksum(),
        }
    }
}

/// Point-in-time copy of a filter's counters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StatsSnapshot {
    pub filter: String,
    pub packets: u64,
    pub next_bytes: u64,
    pub rest_bytes: u64,
    pub bad_checksum: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counters_accumulate() {
        let stats = FilterStats::new();
        stats.add_next(17);
        stats.add_next(3);
        stats.add_rest(5);
        stats.add_bad_checksum();

        let snap = stats.snapshot("mavlink1");
        assert_eq!(
            snap,
            StatsSnapshot {
                filter: "mavlink1".to_string(),
                packets: 2,
                next_bytes: 20,
                rest_bytes: 5,
                bad_checksum: 1,
            }
        );
    }
}
