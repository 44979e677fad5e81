//! Configuration for links and endpoints, validated at construction.
//!
//! Structured the way the teacher's `jsp_transport::config::ConnectionConfig`
//! is: a `Default`-backed plain struct plus a builder for the cases where
//! callers want to override only a few fields.

use std::time::Duration;

use crate::error::ConfigError;

fn check_probability(field: &'static str, value: f64) -> Result<(), ConfigError> {
    if !(0.0..=1.0).contains(&value) {
        return Err(ConfigError::ProbabilityOutOfRange { field, value });
    }
    Ok(())
}

/// Immutable knobs for one direction of an unreliable [`Link`](crate::link::Link).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LinkConfig {
    pub loss: f64,
    pub delay_mean_ms: f64,
    pub delay_jitter_ms: f64,
    pub reorder_prob: f64,
    pub corruption_prob: f64,
}

impl Default for LinkConfig {
    fn default() -> Self {
        Self {
            loss: 0.0,
            delay_mean_ms: 50.0,
            delay_jitter_ms: 10.0,
            reorder_prob: 0.0,
            corruption_prob: 0.0,
        }
    }
}

impl LinkConfig {
    pub fn new(
        loss: f64,
        delay_mean_ms: f64,
        delay_jitter_ms: f64,
        reorder_prob: f64,
        corruption_prob: f64,
    ) -> Result<Self, ConfigError> {
        check_probability("loss", loss)?;
        check_probability("reorder_prob", reorder_prob)?;
        check_probability("corruption_prob", corruption_prob)?;
        Ok(Self {
            loss,
            delay_mean_ms,
            delay_jitter_ms,
            reorder_prob,
            corruption_prob,
        })
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        check_probability("loss", self.loss)?;
        check_probability("reorder_prob", self.reorder_prob)?;
        check_probability("corruption_prob", self.corruption_prob)?;
        Ok(())
    }

    pub fn noiseless() -> Self {
        Self {
            loss: 0.0,
            delay_mean_ms: 0.0,
            delay_jitter_ms: 0.0,
            reorder_prob: 0.0,
            corruption_prob: 0.0,
        }
    }
}

/// RTT estimator and AIMD constants, plus window policy, for one
/// [`Endpoint`](crate::endpoint::Endpoint).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EndpointConfig {
    /// Static window used when congestion control is disabled.
    pub window: usize,
    pub enable_congestion_control: bool,

    pub initial_rto: Duration,
    pub min_rto: Duration,
    pub max_rto: Duration,

    /// EWMA smoothing factor for SRTT.
    pub alpha: f64,
    /// EWMA smoothing factor for RTTVAR.
    pub beta: f64,
    /// RTO = SRTT + k * RTTVAR.
    pub k: f64,

    pub ssthresh_init: f64,
    pub cwnd_init: f64,
    pub ai_factor: f64,
    pub md_factor: f64,
}

impl Default for EndpointConfig {
    fn default() -> Self {
        Self {
            window: 8,
            enable_congestion_control: true,
            initial_rto: Duration::from_millis(200),
            min_rto: Duration::from_millis(100),
            max_rto: Duration::from_millis(60_000),
            alpha: 0.125,
            beta: 0.25,
            k: 4.0,
            ssthresh_init: 65_535.0,
            cwnd_init: 1.0,
            ai_factor: 1.0,
            md_factor: 0.5,
        }
    }
}

impl EndpointConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.window == 0 {
            return Err(ConfigError::ZeroWindow(self.window));
        }
        if self.initial_rto.is_zero() {
            return Err(ConfigError::NonPositiveRto(self.initial_rto));
        }
        if self.min_rto > self.max_rto {
            return Err(ConfigError::InvalidRtoBounds {
                min: self.min_rto,
                max: self.max_rto,
            });
        }
        if self.ssthresh_init < 2.0 {
            return Err(ConfigError::SsthreshTooLow(self.ssthresh_init as u64));
        }
        if self.cwnd_init < 1.0 {
            return Err(ConfigError::CwndTooLow(self.cwnd_init));
        }
        Ok(())
    }

    pub fn builder() -> EndpointConfigBuilder {
        EndpointConfigBuilder::default()
    }
}

/// Builder for [`EndpointConfig`], mirroring the teacher's
/// `ConnectionConfigBuilder`.
#[derive(Debug, Default)]
pub struct EndpointConfigBuilder {
    window: Option<usize>,
    enable_congestion_control: Option<bool>,
    initial_rto: Option<Duration>,
    min_rto: Option<Duration>,
    max_rto: Option<Duration>,
    alpha: Option<f64>,
    beta: Option<f64>,
    k: Option<f64>,
    ssthresh_init: Option<f64>,
    cwnd_init: Option<f64>,
    ai_factor: Option<f64>,
    md_factor: Option<f64>,
}

impl EndpointConfigBuilder {
    pub fn window(mut self, window: usize) -> Self {
        self.window = Some(window);
        self
    }

    pub fn enable_congestion_control(mut self, enable: bool) -> Self {
        self.enable_congestion_control = Some(enable);
        self
    }

    pub fn initial_rto(mut self, rto: Duration) -> Self {
        self.initial_rto = Some(rto);
        self
    }

    pub fn rto_bounds(mut self, min: Duration, max: Duration) -> Self {
        self.min_rto = Some(min);
        self.max_rto = Some(max);
        self
    }

    pub fn rtt_constants(mut self, alpha: f64, beta: f64, k: f64) -> Self {
        self.alpha = Some(alpha);
        self.beta = Some(beta);
        self.k = Some(k);
        self
    }

    pub fn congestion_constants(mut self, ssthresh_init: f64, cwnd_init: f64, ai_factor: f64, md_factor: f64) -> Self {
        self.ssthresh_init = Some(ssthresh_init);
        self.cwnd_init = Some(cwnd_init);
        self.ai_factor = Some(ai_factor);
        self.md_factor = Some(md_factor);
        self
    }

    pub fn build(self) -> Result<EndpointConfig, ConfigError> {
        let defaults = EndpointConfig::default();
        let cfg = EndpointConfig {
            window: self.window.unwrap_or(defaults.window),
            enable_congestion_control: self
                .enable_congestion_control
                .unwrap_or(defaults.enable_congestion_control),
            initial_rto: self.initial_rto.unwrap_or(defaults.initial_rto),
            min_rto: self.min_rto.unwrap_or(defaults.min_rto),
            max_rto: self.max_rto.unwrap_or(defaults.max_rto),
            alpha: self.alpha.unwrap_or(defaults.alpha),
            beta: self.beta.unwrap_or(defaults.beta),
            k: self.k.unwrap_or(defaults.k),
            ssthresh_init: self.ssthresh_init.unwrap_or(defaults.ssthresh_init),
            cwnd_init: self.cwnd_init.unwrap_or(defaults.cwnd_init),
            ai_factor: self.ai_factor.unwrap_or(defaults.ai_factor),
            md_factor: self.md_factor.unwrap_or(defaults.md_factor),
        };
        cfg.validate()?;
        Ok(cfg)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_out_of_range_probability() {
        let err = LinkConfig::new(1.5, 50.0, 10.0, 0.0, 0.0).unwrap_err();
        assert_eq!(
            err,
            ConfigError::ProbabilityOutOfRange {
                field: "loss",
                value: 1.5
            }
        );
    }

    #[test]
    fn rejects_zero_window() {
        let err = EndpointConfig::builder().window(0).build().unwrap_err();
        assert_eq!(err, ConfigError::ZeroWindow(0));
    }

    #[test]
    fn rejects_inverted_rto_bounds() {
        let err = EndpointConfig::builder()
            .rto_bounds(Duration::from_millis(500), Duration::from_millis(100))
            .build()
            .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidRtoBounds { .. }));
    }

    #[test]
    fn default_config_validates() {
        assert!(EndpointConfig::default().validate().is_ok());
        assert!(LinkConfig::default().validate().is_ok());
    }
}
