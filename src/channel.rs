//! Binds two [`Endpoint`]s together through a pair of one-directional
//! [`Link`]s, and owns the send/deliver pipeline: checksum stamping, loss,
//! corruption, reorder, and delayed delivery.
//!
//! Grounded on `original_source/channel.py`'s `UnreliableChannel` for the
//! pipeline order and on the teacher's `jsp_transport::connection::Connection`
//! for the `Arc::new_cyclic` + background-task wiring style. Per `spec.md`
//! §9's design note, an endpoint's outgoing path is a typed capability
//! (`SendSink`) handed to it at construction rather than a channel reference
//! poked in afterward.

use std::sync::{Arc, Weak};
use std::time::Instant;

use serde_json::json;
use tracing::{info, warn};

use crate::checksum::{add_checksum, verify_checksum};
use crate::config::EndpointConfig;
use crate::endpoint::Endpoint;
use crate::error::ConfigError;
use crate::link::Link;
use crate::packet::{Direction, Packet, WirePacketView};
use crate::stats::{ChannelStatistics, EventLog, LogDump};

/// The outgoing half of a directional pipe, handed to an [`Endpoint`] at
/// construction. The only thing an endpoint knows about its channel.
pub trait SendSink: Send + Sync {
    fn submit(&self, pkt: Packet);
}

struct ChannelSink {
    channel: Weak<Channel>,
    direction: Direction,
}

impl SendSink for ChannelSink {
    fn submit(&self, pkt: Packet) {
        if let Some(channel) = self.channel.upgrade() {
            channel.send(pkt, self.direction);
        } else {
            warn!("packet submitted after channel was dropped");
        }
    }
}

/// Two endpoints joined by a pair of unreliable links, one per direction.
pub struct Channel {
    link_ab: Link,
    link_ba: Link,
    endpoint_a: Arc<Endpoint>,
    endpoint_b: Arc<Endpoint>,
    log: EventLog,
    start: Instant,
}

impl Channel {
    pub fn new(
        link_ab: Link,
        link_ba: Link,
        config_a: EndpointConfig,
        config_b: EndpointConfig,
        enable_logging: bool,
    ) -> Result<Arc<Self>, ConfigError> {
        config_a.validate()?;
        config_b.validate()?;

        // Endpoint construction can fail (bad config); Arc::new_cyclic's
        // closure can't return a Result, so validate up front and treat the
        // closure body as infallible.
        let mut build_err: Option<ConfigError> = None;
        let channel = Arc::new_cyclic(|weak_self| {
            let sink_a: Arc<dyn SendSink> = Arc::new(ChannelSink {
                channel: weak_self.clone(),
                direction: Direction::AtoB,
            });
            let sink_b: Arc<dyn SendSink> = Arc::new(ChannelSink {
                channel: weak_self.clone(),
                direction: Direction::BtoA,
            });

            let endpoint_a = match Endpoint::new(config_a, sink_a, enable_logging) {
                Ok(ep) => ep,
                Err(e) => {
                    build_err = Some(e);
                    Endpoint::new(EndpointConfig::default(), Arc::new(NullSink), false)
                        .expect("default config always validates")
                }
            };
            let endpoint_b = match Endpoint::new(config_b, sink_b, enable_logging) {
                Ok(ep) => ep,
                Err(e) => {
                    build_err.get_or_insert(e);
                    Endpoint::new(EndpointConfig::default(), Arc::new(NullSink), false)
                        .expect("default config always validates")
                }
            };

            Channel {
                link_ab,
                link_ba,
                endpoint_a,
                endpoint_b,
                log: EventLog::new(enable_logging),
                start: Instant::now(),
            }
        });

        if let Some(e) = build_err {
            return Err(e);
        }
        info!("channel wired: two endpoints joined by a pair of links");
        Ok(channel)
    }

    pub fn endpoint_a(&self) -> &Arc<Endpoint> {
        &self.endpoint_a
    }

    pub fn endpoint_b(&self) -> &Arc<Endpoint> {
        &self.endpoint_b
    }

    fn link_for(&self, dir: Direction) -> &Link {
        match dir {
            Direction::AtoB => &self.link_ab,
            Direction::BtoA => &self.link_ba,
        }
    }

    /// The full send pipeline: stamp a checksum, then run loss, corruption,
    /// and reorder in that order, then schedule delayed delivery.
    fn send(self: &Arc<Self>, mut pkt: Packet, dir: Direction) {
        let link = self.link_for(dir);
        link.record_sent();
        add_checksum(&mut pkt);

        self.log.push(
            "PACKET_SENT",
            json!({ "direction": format!("{:?}", dir), "packet": WirePacketView::from(&pkt) }),
        );

        let seq_hint = pkt.seq();
        if link.draw_drop(seq_hint) {
            self.log.push(
                "PACKET_DROPPED",
                json!({ "direction": format!("{:?}", dir), "seq_or_ack": pkt.seq_or_ack() }),
            );
            return;
        }

        link.maybe_corrupt(&mut pkt);
        if matches!(&pkt, Packet::Data { corrupted: true, .. }) {
            self.log.push(
                "PACKET_CORRUPTED",
                json!({ "direction": format!("{:?}", dir), "seq_or_ack": pkt.seq_or_ack() }),
            );
        }

        let Some(to_send) = link.maybe_reorder(pkt) else {
            self.log.push("PACKET_HELD_FOR_REORDER", json!({ "direction": format!("{:?}", dir) }));
            return;
        };

        let delay = link.sample_delay();
        let this = Arc::clone(self);
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            this.deliver(to_send, dir, delay);
        });
    }

    fn deliver(&self, pkt: Packet, dir: Direction, delay: std::time::Duration) {
        if !verify_checksum(&pkt) {
            self.log.push(
                "CHECKSUM_ERROR",
                json!({ "direction": format!("{:?}", dir), "seq_or_ack": pkt.seq_or_ack() }),
            );
            return;
        }

        self.log.push(
            "PACKET_DELIVERED",
            json!({
                "direction": format!("{:?}", dir),
                "packet": WirePacketView::from(&pkt),
                "delay_ms": delay.as_secs_f64() * 1000.0,
            }),
        );

        match dir {
            Direction::AtoB => self.endpoint_b.on_receive(pkt),
            Direction::BtoA => self.endpoint_a.on_receive(pkt),
        }
    }

    pub fn get_statistics(&self) -> ChannelStatistics {
        ChannelStatistics {
            total_events: self.log.len(),
            ab_link: self.link_ab.stats(),
            ba_link: self.link_ba.stats(),
            ab_config: self.link_ab.config_snapshot(),
            ba_config: self.link_ba.config_snapshot(),
        }
    }

    pub fn save_logs(&self, path: impl AsRef<std::path::Path>) -> std::io::Result<()> {
        let dump = LogDump {
            events: self.log.snapshot(),
            statistics: self.get_statistics(),
        };
        let json = serde_json::to_string_pretty(&dump)?;
        std::fs::write(path, json)
    }

    pub fn uptime(&self) -> std::time::Duration {
        self.start.elapsed()
    }
}

/// Placeholder sink used only to satisfy `Endpoint::new`'s signature while
/// unwinding a construction-time config error inside `Arc::new_cyclic`'s
/// closure; the endpoint it's attached to is discarded immediately.
struct NullSink;
impl SendSink for NullSink {
    fn submit(&self, _pkt: Packet) {}
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::LinkConfig;
    use bytes::Bytes;
    use std::time::Duration;

    fn noiseless_channel() -> Arc<Channel> {
        Channel::new(
            Link::with_seed(LinkConfig::noiseless(), 1),
            Link::with_seed(LinkConfig::noiseless(), 2),
            EndpointConfig::default(),
            EndpointConfig::default(),
            true,
        )
        .unwrap()
    }

    #[tokio::test]
    async fn noiseless_channel_delivers_data_and_ack() {
        let channel = noiseless_channel();
        assert!(channel.endpoint_a().send_data(Bytes::from_static(b"hi")));
        tokio::time::sleep(Duration::from_millis(20)).await;

        assert_eq!(channel.endpoint_b().recv_app_data(), Some(Bytes::from_static(b"hi")));
        tokio::time::sleep(Duration::from_millis(20)).await;

        let stats = channel.endpoint_a().get_statistics();
        assert_eq!(stats.current_state.base, 1);
    }

    #[tokio::test]
    async fn full_loss_link_prevents_delivery() {
        let mut lossy = LinkConfig::noiseless();
        lossy.loss = 1.0;
        let channel = Channel::new(
            Link::with_seed(lossy, 1),
            Link::with_seed(LinkConfig::noiseless(), 2),
            EndpointConfig::default(),
            EndpointConfig::default(),
            true,
        )
        .unwrap();

        channel.endpoint_a().send_data(Bytes::from_static(b"x"));
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(channel.endpoint_b().recv_app_data(), None);

        let stats = channel.get_statistics();
        assert_eq!(stats.ab_link.packets_lost, 1);
    }

    #[tokio::test]
    async fn invalid_endpoint_config_is_rejected_at_construction() {
        let mut bad = EndpointConfig::default();
        bad.window = 0;
        let err = Channel::new(
            Link::with_seed(LinkConfig::noiseless(), 1),
            Link::with_seed(LinkConfig::noiseless(), 2),
            bad,
            EndpointConfig::default(),
            false,
        )
        .unwrap_err();
        assert!(matches!(err, ConfigError::ZeroWindow(0)));
    }
}
