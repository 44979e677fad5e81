//! Structured event records and the statistics snapshots they feed.
//!
//! Field names here are part of the stable external contract (`spec.md`
//! §6: "stable field names for consumers") — an experiment driver depends
//! on them, so they are not renamed even where a more idiomatic Rust name
//! would read better.

use std::sync::Mutex;
use std::time::Instant;

use serde::Serialize;
use serde_json::Value;

/// Bound on the event log, per `spec.md` §3: "ring-truncated at 10,000
/// entries: on overflow, the newest 10,000 are retained".
pub const MAX_LOG_ENTRIES: usize = 10_000;

#[derive(Debug, Clone, Serialize)]
pub struct LogEntry {
    /// Seconds since the owning channel/endpoint was constructed.
    pub timestamp: f64,
    pub event_type: &'static str,
    pub data: Value,
}

/// A bounded, append-only log of structured events, shared by [`Channel`](crate::channel::Channel)
/// and [`Endpoint`](crate::endpoint::Endpoint). Grounded on the teacher's
/// `jsp_transport::metrics::Metrics` in spirit (a plain counter/record
/// struct behind a lock) but holding records rather than atomics, since
/// entries are structured and variably shaped.
#[derive(Debug)]
pub struct EventLog {
    start: Instant,
    entries: Mutex<Vec<LogEntry>>,
    enabled: bool,
}

impl EventLog {
    pub fn new(enabled: bool) -> Self {
        Self {
            start: Instant::now(),
            entries: Mutex::new(Vec::new()),
            enabled,
        }
    }

    pub fn push(&self, event_type: &'static str, data: Value) {
        if !self.enabled {
            return;
        }
        let timestamp = self.start.elapsed().as_secs_f64();
        let mut entries = self.entries.lock().unwrap();
        entries.push(LogEntry {
            timestamp,
            event_type,
            data,
        });
        if entries.len() > MAX_LOG_ENTRIES {
            let overflow = entries.len() - MAX_LOG_ENTRIES;
            entries.drain(0..overflow);
        }
    }

    pub fn snapshot(&self) -> Vec<LogEntry> {
        self.entries.lock().unwrap().clone()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[derive(Debug, Clone, Copy, Serialize, Default)]
pub struct LinkStatsSnapshot {
    pub packets_sent: u64,
    pub packets_lost: u64,
    pub packets_corrupted: u64,
    pub packets_reordered: u64,
    pub loss_rate: f64,
}

#[derive(Debug, Clone, Copy, Serialize)]
pub struct LinkConfigSnapshot {
    pub loss: f64,
    pub delay_mean_ms: f64,
    pub reorder_prob: f64,
    pub corruption_prob: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct ChannelStatistics {
    pub total_events: usize,
    pub ab_link: LinkStatsSnapshot,
    pub ba_link: LinkStatsSnapshot,
    pub ab_config: LinkConfigSnapshot,
    pub ba_config: LinkConfigSnapshot,
}

#[derive(Debug, Clone, Copy, Serialize, Default)]
pub struct RttStats {
    pub avg_rtt_ms: f64,
    pub srtt_ms: f64,
    pub rttvar_ms: f64,
    pub rto_ms: f64,
    pub samples: u64,
}

#[derive(Debug, Clone, Copy, Serialize)]
pub struct CongestionControlStats {
    pub enabled: bool,
    pub cwnd: f64,
    pub ssthresh: f64,
    pub ai_factor: f64,
    pub md_factor: f64,
}

#[derive(Debug, Clone, Copy, Serialize)]
pub struct CurrentState {
    pub base: u64,
    pub nextseq: u64,
    pub last_acked: i64,
    pub dup_count: u32,
}

#[derive(Debug, Clone, Serialize)]
pub struct EndpointStatistics {
    pub packets_sent: u64,
    pub packets_received: u64,
    pub retransmissions: u64,
    pub timeouts: u64,
    pub fast_retransmits: u64,
    pub rtt_stats: RttStats,
    pub congestion_control: CongestionControlStats,
    pub current_state: CurrentState,
}

/// The `{events: [...], statistics: {...}}` shape `save_logs` writes,
/// matching `original_source/channel.py` / `tcp_like.py`.
#[derive(Debug, Serialize)]
pub struct LogDump<S: Serialize> {
    pub events: Vec<LogEntry>,
    pub statistics: S,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn event_log_truncates_to_newest_entries() {
        let log = EventLog::new(true);
        for i in 0..(MAX_LOG_ENTRIES + 50) {
            log.push("PACKET_SENT", json!({ "i": i }));
        }
        let snap = log.snapshot();
        assert_eq!(snap.len(), MAX_LOG_ENTRIES);
        // The oldest 50 entries should have been dropped, so the first
        // surviving entry's `i` is 50.
        assert_eq!(snap[0].data["i"], json!(50));
    }

    #[test]
    fn disabled_log_records_nothing() {
        let log = EventLog::new(false);
        log.push("PACKET_SENT", json!({}));
        assert!(log.is_empty());
    }
}
