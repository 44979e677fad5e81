//! A reliable-data-transfer teaching harness: an unreliable channel
//! simulator (loss, delay, jitter, reorder, corruption) paired with a
//! TCP-like sliding-window endpoint (cumulative ACK, adaptive RTO, fast
//! retransmit, AIMD congestion control).
//!
//! See `SPEC_FULL.md` for the full module and operation list; this crate
//! root only wires the modules together and re-exports the public surface
//! through [`prelude`].

pub mod channel;
pub mod checksum;
pub mod config;
pub mod congestion;
pub mod endpoint;
pub mod error;
pub mod link;
pub mod logging;
pub mod packet;
pub mod stats;

pub mod prelude {
    pub use crate::channel::{Channel, SendSink};
    pub use crate::config::{EndpointConfig, EndpointConfigBuilder, LinkConfig};
    pub use crate::congestion::{Aimd, CongestionController};
    pub use crate::endpoint::Endpoint;
    pub use crate::error::ConfigError;
    pub use crate::link::Link;
    pub use crate::packet::{Direction, Packet};
    pub use crate::stats::{ChannelStatistics, EndpointStatistics};
}
