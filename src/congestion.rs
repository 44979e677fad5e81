//! AIMD congestion control with slow start, generalized from the teacher's
//! `NewReno` (`jsp_transport::congestion`) to this spec's packet-counted
//! (rather than byte-counted) window and its two distinct loss reactions
//! (timeout vs. triple-dup-ACK fast recovery).

use std::fmt;

/// Slow start grows `cwnd` by 1 per successful in-order delivery;
/// congestion avoidance grows it by `ai_factor / cwnd`. Mirrors
/// `spec.md` §4.4 and `original_source/tcp_like.py`'s `on_receive`.
pub trait CongestionController: Send + fmt::Debug {
    /// Called on every in-order DATA delivery at the receiver side.
    fn on_delivery(&mut self);

    /// Called when the retransmission timer fires: full reset to slow
    /// start.
    fn on_timeout_loss(&mut self);

    /// Called on triple-duplicate-ACK fast retransmit: fast recovery,
    /// `cwnd` drops directly to the new `ssthresh` rather than to 1.
    fn on_fast_retransmit_loss(&mut self);

    fn cwnd(&self) -> f64;
    fn ssthresh(&self) -> f64;
    fn enabled(&self) -> bool;

    /// `floor(cwnd)` when enabled is the effective congestion window;
    /// callers combine this with the static window per the policy in
    /// `spec.md` §9's Open Question.
    fn effective_window(&self) -> Option<usize> {
        if self.enabled() {
            Some(self.cwnd().floor() as usize)
        } else {
            None
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct Aimd {
    cwnd: f64,
    ssthresh: f64,
    ai_factor: f64,
    md_factor: f64,
    enabled: bool,
}

impl Aimd {
    pub fn new(cwnd_init: f64, ssthresh_init: f64, ai_factor: f64, md_factor: f64, enabled: bool) -> Self {
        Self {
            cwnd: cwnd_init.max(1.0),
            ssthresh: ssthresh_init.max(2.0),
            ai_factor,
            md_factor,
            enabled,
        }
    }

    fn in_slow_start(&self) -> bool {
        self.cwnd < self.ssthresh
    }
}

impl CongestionController for Aimd {
    fn on_delivery(&mut self) {
        if !self.enabled {
            return;
        }
        if self.in_slow_start() {
            self.cwnd += 1.0;
        } else {
            self.cwnd += self.ai_factor / self.cwnd;
        }
    }

    fn on_timeout_loss(&mut self) {
        if !self.enabled {
            return;
        }
        self.ssthresh = (self.cwnd * self.md_factor).floor().max(2.0);
        self.cwnd = 1.0;
    }

    fn on_fast_retransmit_loss(&mut self) {
        if !self.enabled {
            return;
        }
        self.ssthresh = (self.cwnd * self.md_factor).floor().max(2.0);
        self.cwnd = self.ssthresh;
    }

    fn cwnd(&self) -> f64 {
        self.cwnd
    }

    fn ssthresh(&self) -> f64 {
        self.ssthresh
    }

    fn enabled(&self) -> bool {
        self.enabled
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slow_start_grows_by_one_per_delivery() {
        let mut cc = Aimd::new(1.0, 65_535.0, 1.0, 0.5, true);
        cc.on_delivery();
        assert_eq!(cc.cwnd(), 2.0);
        cc.on_delivery();
        assert_eq!(cc.cwnd(), 3.0);
    }

    #[test]
    fn congestion_avoidance_grows_by_ai_over_cwnd() {
        let mut cc = Aimd::new(10.0, 10.0, 1.0, 0.5, true);
        assert!(!cc.in_slow_start());
        cc.on_delivery();
        assert_eq!(cc.cwnd(), 10.0 + 1.0 / 10.0);
    }

    #[test]
    fn timeout_resets_cwnd_to_one_and_halves_ssthresh() {
        let mut cc = Aimd::new(20.0, 10.0, 1.0, 0.5, true);
        cc.on_timeout_loss();
        assert_eq!(cc.cwnd(), 1.0);
        assert_eq!(cc.ssthresh(), 10.0);
    }

    #[test]
    fn fast_retransmit_drops_cwnd_to_new_ssthresh() {
        let mut cc = Aimd::new(20.0, 10.0, 1.0, 0.5, true);
        cc.on_fast_retransmit_loss();
        assert_eq!(cc.ssthresh(), 10.0);
        assert_eq!(cc.cwnd(), 10.0);
    }

    #[test]
    fn ssthresh_never_drops_below_two() {
        let mut cc = Aimd::new(2.0, 2.0, 1.0, 0.1, true);
        cc.on_timeout_loss();
        assert!(cc.ssthresh() >= 2.0);
    }

    #[test]
    fn disabled_controller_never_changes_state() {
        let mut cc = Aimd::new(1.0, 65_535.0, 1.0, 0.5, false);
        cc.on_delivery();
        cc.on_timeout_loss();
        cc.on_fast_retransmit_loss();
        assert_eq!(cc.cwnd(), 1.0);
        assert_eq!(cc.effective_window(), None);
    }
}
