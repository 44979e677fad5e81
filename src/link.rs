//! A single stochastic, one-directional pipe: loss, corruption, reorder,
//! and delay, independent of every other packet.
//!
//! Grounded on `original_source/channel.py`'s `UnreliableLink` for exact
//! probability semantics, restructured the way the teacher splits
//! mutable, lockable state out of an otherwise plain-data config struct
//! (`jsp_transport::connection::Connection` wraps its mutable fields in
//! `Arc<Mutex<..>>` rather than taking `&mut self` everywhere, because the
//! same link can be driven from more than one call site).

use std::sync::Mutex;
use std::time::Duration;

use bytes::BytesMut;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::trace;

use crate::config::LinkConfig;
use crate::packet::Packet;

struct LinkState {
    reorder_buffer: Option<Packet>,
    sent: u64,
    lost: u64,
    corrupted: u64,
    reordered: u64,
    rng: StdRng,
    /// Test-only: force the next `maybe_drop()` for this sequence number to
    /// return `true`, exactly once. See `spec.md` SPEC_FULL §4.2 supplement.
    #[cfg(test)]
    force_drop_once: Option<u64>,
}

/// One direction of a [`Channel`](crate::channel::Channel)'s unreliable
/// pipe.
pub struct Link {
    config: LinkConfig,
    state: Mutex<LinkState>,
}

impl Link {
    pub fn new(config: LinkConfig) -> Self {
        Self::with_rng(config, StdRng::from_entropy())
    }

    pub fn with_seed(config: LinkConfig, seed: u64) -> Self {
        Self::with_rng(config, StdRng::seed_from_u64(seed))
    }

    fn with_rng(config: LinkConfig, rng: StdRng) -> Self {
        Self {
            config,
            state: Mutex::new(LinkState {
                reorder_buffer: None,
                sent: 0,
                lost: 0,
                corrupted: 0,
                reordered: 0,
                rng,
                #[cfg(test)]
                force_drop_once: None,
            }),
        }
    }

    pub fn config(&self) -> LinkConfig {
        self.config
    }

    /// Force the very next `draw_drop()` call for `seq` to report a loss,
    /// regardless of the configured loss probability. Test-only hook used
    /// to exercise fast-retransmit deterministically (scenario S3).
    #[cfg(test)]
    pub fn force_drop_once(&self, seq: u64) {
        self.state.lock().unwrap().force_drop_once = Some(seq);
    }

    pub fn record_sent(&self) {
        self.state.lock().unwrap().sent += 1;
    }

    /// True with probability `loss`.
    pub fn draw_drop(&self, seq_hint: Option<u64>) -> bool {
        let mut st = self.state.lock().unwrap();
        #[cfg(test)]
        {
            if let Some(forced) = st.force_drop_once {
                if Some(forced) == seq_hint {
                    st.force_drop_once = None;
                    st.lost += 1;
                    return true;
                }
            }
        }
        let _ = seq_hint;
        let drop = st.rng.gen::<f64>() < self.config.loss;
        if drop {
            st.lost += 1;
        }
        drop
    }

    /// With probability `corruption_prob`, and only if the payload is
    /// non-empty, flip one random payload byte by +1 mod 256 and mark the
    /// packet corrupted. Runs after the channel has already stamped the
    /// checksum, so a corrupted packet fails verification at delivery.
    pub fn maybe_corrupt(&self, pkt: &mut Packet) {
        let Packet::Data {
            payload, corrupted, ..
        } = pkt
        else {
            return;
        };
        if payload.is_empty() {
            return;
        }
        let mut st = self.state.lock().unwrap();
        if st.rng.gen::<f64>() < self.config.corruption_prob {
            let idx = st.rng.gen_range(0..payload.len());
            let mut buf = BytesMut::from(&payload[..]);
            buf[idx] = buf[idx].wrapping_add(1);
            *payload = buf.freeze();
            *corrupted = true;
            st.corrupted += 1;
            trace!(idx, "link corrupted one payload byte");
        }
    }

    /// Either hold `pkt` for reordering, or release a previously held
    /// packet. Returns `Some(pkt)` to send now (possibly the packet that
    /// was held), or `None` if this send produced no immediate wire
    /// packet.
    pub fn maybe_reorder(&self, pkt: Packet) -> Option<Packet> {
        if self.config.reorder_prob <= 0.0 {
            return Some(pkt);
        }
        let mut st = self.state.lock().unwrap();
        if st.reorder_buffer.is_none() {
            if st.rng.gen::<f64>() < self.config.reorder_prob {
                st.reorder_buffer = Some(pkt);
                st.reordered += 1;
                return None;
            }
            return Some(pkt);
        }
        let held = st.reorder_buffer.take().expect("checked is_some above");
        if st.rng.gen::<f64>() < self.config.reorder_prob {
            st.reorder_buffer = Some(pkt);
        }
        Some(held)
    }

    /// `max(0, (mean + U(-jitter, +jitter)) / 1000)` seconds.
    pub fn sample_delay(&self) -> Duration {
        let mut st = self.state.lock().unwrap();
        let jitter = if self.config.delay_jitter_ms > 0.0 {
            st.rng
                .gen_range(-self.config.delay_jitter_ms..=self.config.delay_jitter_ms)
        } else {
            0.0
        };
        let ms = (self.config.delay_mean_ms + jitter).max(0.0);
        Duration::from_secs_f64(ms / 1000.0)
    }

    pub fn stats(&self) -> crate::stats::LinkStatsSnapshot {
        let st = self.state.lock().unwrap();
        crate::stats::LinkStatsSnapshot {
            packets_sent: st.sent,
            packets_lost: st.lost,
            packets_corrupted: st.corrupted,
            packets_reordered: st.reordered,
            loss_rate: st.lost as f64 / (st.sent.max(1) as f64),
        }
    }

    pub fn config_snapshot(&self) -> crate::stats::LinkConfigSnapshot {
        crate::stats::LinkConfigSnapshot {
            loss: self.config.loss,
            delay_mean_ms: self.config.delay_mean_ms,
            reorder_prob: self.config.reorder_prob,
            corruption_prob: self.config.corruption_prob,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;

    #[test]
    fn zero_loss_never_drops() {
        let link = Link::with_seed(LinkConfig::noiseless(), 1);
        for _ in 0..1000 {
            assert!(!link.draw_drop(None));
        }
    }

    #[test]
    fn full_loss_always_drops() {
        let mut cfg = LinkConfig::noiseless();
        cfg.loss = 1.0;
        let link = Link::with_seed(cfg, 1);
        assert!(link.draw_drop(None));
    }

    #[test]
    fn corruption_flips_one_byte_and_marks_packet() {
        let mut cfg = LinkConfig::noiseless();
        cfg.corruption_prob = 1.0;
        let link = Link::with_seed(cfg, 42);
        let mut pkt = Packet::new_data(0, Bytes::from_static(b"hello"));
        link.maybe_corrupt(&mut pkt);
        match pkt {
            Packet::Data {
                payload, corrupted, ..
            } => {
                assert!(corrupted);
                assert_ne!(&payload[..], b"hello");
                // exactly one byte differs
                let diffs = payload
                    .iter()
                    .zip(b"hello")
                    .filter(|(a, b)| *a != b)
                    .count();
                assert_eq!(diffs, 1);
            }
            _ => unreachable!(),
        }
    }

    #[test]
    fn empty_payload_is_never_corrupted() {
        let mut cfg = LinkConfig::noiseless();
        cfg.corruption_prob = 1.0;
        let link = Link::with_seed(cfg, 7);
        let mut pkt = Packet::new_data(0, Bytes::new());
        link.maybe_corrupt(&mut pkt);
        match pkt {
            Packet::Data { corrupted, .. } => assert!(!corrupted),
            _ => unreachable!(),
        }
    }

    #[test]
    fn reorder_with_probability_one_delays_by_one_slot_without_loss() {
        // rand's gen::<f64>() samples [0, 1), so `< 1.0` always holds: the
        // "empty the buffer" branch in maybe_reorder never triggers, and
        // every packet but the last is eventually released, one send late.
        let mut cfg = LinkConfig::noiseless();
        cfg.reorder_prob = 1.0;
        let link = Link::with_seed(cfg, 3);

        let mut released = Vec::new();
        for seq in 0..10u64 {
            let pkt = Packet::new_data(seq, Bytes::new());
            if let Some(out) = link.maybe_reorder(pkt) {
                released.push(out.seq().unwrap());
            }
        }
        assert_eq!(released, (0..9).collect::<Vec<_>>());
    }

    #[test]
    fn reorder_never_releases_a_seq_twice() {
        let mut cfg = LinkConfig::noiseless();
        cfg.reorder_prob = 0.5;
        let link = Link::with_seed(cfg, 123);

        let mut released = Vec::new();
        for seq in 0..200u64 {
            let pkt = Packet::new_data(seq, Bytes::new());
            if let Some(out) = link.maybe_reorder(pkt) {
                released.push(out.seq().unwrap());
            }
        }
        let mut sorted = released.clone();
        sorted.sort_unstable();
        sorted.dedup();
        assert_eq!(sorted.len(), released.len(), "no seq released twice");
    }

    #[test]
    fn zero_reorder_prob_passes_through_immediately() {
        let link = Link::with_seed(LinkConfig::noiseless(), 9);
        let pkt = Packet::new_data(5, Bytes::new());
        let out = link.maybe_reorder(pkt).unwrap();
        assert_eq!(out.seq(), Some(5));
    }

    #[test]
    fn sample_delay_is_never_negative() {
        let mut cfg = LinkConfig::noiseless();
        cfg.delay_mean_ms = 1.0;
        cfg.delay_jitter_ms = 100.0;
        let link = Link::with_seed(cfg, 11);
        for _ in 0..200 {
            assert!(link.sample_delay() >= Duration::ZERO);
        }
    }

    #[test]
    fn force_drop_once_fires_exactly_once() {
        let link = Link::with_seed(LinkConfig::noiseless(), 1);
        link.force_drop_once(5);
        assert!(link.draw_drop(Some(5)));
        assert!(!link.draw_drop(Some(5)));
    }
}
