//! Construction-time validation errors.
//!
//! Per `spec.md` §7: "Programmer errors (negative RTO, window = 0,
//! probabilities outside [0,1]) should be rejected at construction; the
//! core assumes validated inputs." Nothing past construction is fallible
//! in a way that should surface to the caller.

use thiserror::Error;

#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("probability `{field}` must be in [0, 1], got {value}")]
    ProbabilityOutOfRange { field: &'static str, value: f64 },

    #[error("window must be at least 1, got {0}")]
    ZeroWindow(usize),

    #[error("initial RTO must be positive, got {0:?}")]
    NonPositiveRto(std::time::Duration),

    #[error("min RTO ({min:?}) must be <= max RTO ({max:?})")]
    InvalidRtoBounds {
        min: std::time::Duration,
        max: std::time::Duration,
    },

    #[error("ssthresh_init must be >= 2, got {0}")]
    SsthreshTooLow(u64),

    #[error("cwnd_init must be >= 1, got {0}")]
    CwndTooLow(f64),
}
