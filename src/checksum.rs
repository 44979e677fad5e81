//! Weak 16-bit XOR checksum used to detect single-byte corruption.
//!
//! This is deliberately not a cryptographic integrity check (see `spec.md`
//! Non-goals) — it exists only so the channel can detect the corruption it
//! itself injects at the delivery boundary.

use crate::packet::Packet;

/// Fold every byte of `bytes` into `acc` via XOR, masked to 16 bits.
fn xor_fold(mut acc: u16, bytes: &[u8]) -> u16 {
    for &b in bytes {
        acc ^= b as u16;
    }
    acc
}

/// Compute the checksum over a packet's type tag, seq-or-ack value, and
/// payload bytes (DATA only). Mirrors `original_source/channel.py`'s
/// `calculate_checksum`.
pub fn calculate_checksum(pkt: &Packet) -> u16 {
    let mut acc: u16 = 0;
    match pkt {
        Packet::Data { seq, payload, .. } => {
            acc = xor_fold(acc, b"DATA");
            acc ^= (*seq & 0xFFFF) as u16;
            acc = xor_fold(acc, payload);
        }
        Packet::Ack { ack, .. } => {
            acc = xor_fold(acc, b"ACK");
            acc ^= (*ack & 0xFFFF) as u16;
        }
    }
    acc & 0xFFFF
}

/// Stamp `pkt.checksum` with the freshly computed value.
pub fn add_checksum(pkt: &mut Packet) {
    let cs = calculate_checksum(pkt);
    *pkt.checksum_mut() = Some(cs);
}

/// A packet with no checksum field is treated as valid (internal/test
/// packets); otherwise valid iff the recomputed value matches.
pub fn verify_checksum(pkt: &Packet) -> bool {
    match pkt.checksum() {
        None => true,
        Some(cs) => cs == calculate_checksum(pkt),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;

    #[test]
    fn roundtrip_valid_for_uncorrupted_packet() {
        let mut pkt = Packet::Data {
            seq: 7,
            payload: Bytes::from_static(b"hello"),
            checksum: None,
            corrupted: false,
        };
        add_checksum(&mut pkt);
        assert!(verify_checksum(&pkt));
    }

    #[test]
    fn single_byte_payload_alteration_is_detected() {
        let mut pkt = Packet::Data {
            seq: 7,
            payload: Bytes::from_static(b"hello"),
            checksum: None,
            corrupted: false,
        };
        add_checksum(&mut pkt);

        let mut mutated = pkt.clone();
        if let Packet::Data { payload, .. } = &mut mutated {
            let mut buf = payload.to_vec();
            buf[0] = buf[0].wrapping_add(1);
            *payload = Bytes::from(buf);
        }
        assert!(!verify_checksum(&mutated));
    }

    #[test]
    fn packet_without_checksum_field_is_valid() {
        let pkt = Packet::Ack {
            ack: 3,
            checksum: None,
        };
        assert!(verify_checksum(&pkt));
    }

    #[test]
    fn ack_checksum_roundtrips() {
        let mut pkt = Packet::Ack { ack: 41, checksum: None };
        add_checksum(&mut pkt);
        assert!(verify_checksum(&pkt));
    }
}
