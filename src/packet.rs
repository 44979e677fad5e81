//! Wire packet schema.
//!
//! A sum type rather than a dictionary with optional fields, per `spec.md`
//! §9's design note ("Implementations should prefer a tagged union with
//! the two payload shapes rather than a dictionary with optional fields").

use bytes::Bytes;
use serde::{Deserialize, Serialize};

/// The direction a packet travels, and therefore which of the channel's
/// two links carries it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Direction {
    /// Endpoint A sending toward endpoint B.
    AtoB,
    /// Endpoint B sending toward endpoint A.
    BtoA,
}

impl Direction {
    pub fn reverse(self) -> Direction {
        match self {
            Direction::AtoB => Direction::BtoA,
            Direction::BtoA => Direction::AtoB,
        }
    }
}

/// A DATA or ACK packet. `checksum` is `None` until the channel stamps it
/// at send time (§3: "computed by the channel at send time, not by the
/// endpoint").
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Packet {
    Data {
        seq: u64,
        payload: Bytes,
        checksum: Option<u16>,
        corrupted: bool,
    },
    Ack {
        ack: i64,
        checksum: Option<u16>,
    },
}

impl Packet {
    pub fn new_data(seq: u64, payload: Bytes) -> Self {
        Packet::Data {
            seq,
            payload,
            checksum: None,
            corrupted: false,
        }
    }

    pub fn new_ack(ack: i64) -> Self {
        Packet::Ack { ack, checksum: None }
    }

    pub fn checksum(&self) -> Option<u16> {
        match self {
            Packet::Data { checksum, .. } => *checksum,
            Packet::Ack { checksum, .. } => *checksum,
        }
    }

    pub fn checksum_mut(&mut self) -> &mut Option<u16> {
        match self {
            Packet::Data { checksum, .. } => checksum,
            Packet::Ack { checksum, .. } => checksum,
        }
    }

    pub fn is_data(&self) -> bool {
        matches!(self, Packet::Data { .. })
    }

    pub fn seq(&self) -> Option<u64> {
        match self {
            Packet::Data { seq, .. } => Some(*seq),
            Packet::Ack { .. } => None,
        }
    }

    pub fn ack(&self) -> Option<i64> {
        match self {
            Packet::Ack { ack, .. } => Some(*ack),
            Packet::Data { .. } => None,
        }
    }

    pub fn payload_len(&self) -> usize {
        match self {
            Packet::Data { payload, .. } => payload.len(),
            Packet::Ack { .. } => 0,
        }
    }

    pub fn type_tag(&self) -> &'static str {
        match self {
            Packet::Data { .. } => "DATA",
            Packet::Ack { .. } => "ACK",
        }
    }

    /// `seq` if DATA, `ack` if ACK — used for logging where the event just
    /// wants "the number on this packet" regardless of variant.
    pub fn seq_or_ack(&self) -> i64 {
        match self {
            Packet::Data { seq, .. } => *seq as i64,
            Packet::Ack { ack, .. } => *ack,
        }
    }
}

/// A serializable view of a [`Packet`], used only for the JSON event log —
/// keeping this separate from `Packet` avoids forcing `Bytes` through
/// `serde` in the hot path.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum WirePacketView {
    #[serde(rename = "DATA")]
    Data {
        seq: u64,
        payload_size: usize,
        checksum: Option<u16>,
        corrupted: bool,
    },
    #[serde(rename = "ACK")]
    Ack { ack: i64, checksum: Option<u16> },
}

impl From<&Packet> for WirePacketView {
    fn from(pkt: &Packet) -> Self {
        match pkt {
            Packet::Data {
                seq,
                payload,
                checksum,
                corrupted,
            } => WirePacketView::Data {
                seq: *seq,
                payload_size: payload.len(),
                checksum: *checksum,
                corrupted: *corrupted,
            },
            Packet::Ack { ack, checksum } => WirePacketView::Ack {
                ack: *ack,
                checksum: *checksum,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn direction_reverses() {
        assert_eq!(Direction::AtoB.reverse(), Direction::BtoA);
        assert_eq!(Direction::BtoA.reverse(), Direction::AtoB);
    }

    #[test]
    fn accessors_match_variant() {
        let data = Packet::new_data(3, Bytes::from_static(b"abc"));
        assert_eq!(data.seq(), Some(3));
        assert_eq!(data.ack(), None);
        assert_eq!(data.payload_len(), 3);
        assert_eq!(data.type_tag(), "DATA");

        let ack = Packet::new_ack(-1);
        assert_eq!(ack.ack(), Some(-1));
        assert_eq!(ack.seq(), None);
        assert_eq!(ack.type_tag(), "ACK");
    }
}
