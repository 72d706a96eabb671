// pcap-client-sampler/src/key.rs
use std::fmt;
use std::net::{Ipv4Addr, Ipv6Addr};

use crate::dissector::{DissectedPacket, NetworkLayer, Timestamp};

/// Source address of a client, compared bit for bit.
///
/// IPv4-mapped IPv6 addresses are not folded into their IPv4 form.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AddressKey {
    V4([u8; 4]),
    V6([u8; 16]),
}

impl AddressKey {
    pub fn as_bytes(&self) -> &[u8] {
        match self {
            AddressKey::V4(bytes) => bytes,
            AddressKey::V6(bytes) => bytes,
        }
    }
}

impl fmt::Display for AddressKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AddressKey::V4(bytes) => write!(f, "{}", Ipv4Addr::from(*bytes)),
            AddressKey::V6(bytes) => write!(f, "{}", Ipv6Addr::from(*bytes)),
        }
    }
}

/// A packet that may take part in sampling.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EligiblePacket {
    pub key: AddressKey,
    pub timestamp: Timestamp,
}

/// Returns `None` unless the packet has an IP source, a payload and a timestamp.
pub fn extract(packet: &DissectedPacket) -> Option<EligiblePacket> {
    let key = match packet.network {
        NetworkLayer::Ipv4 { source } => AddressKey::V4(source),
        NetworkLayer::Ipv6 { source } => AddressKey::V6(source),
        NetworkLayer::None => return None,
    };
    if !packet.has_payload {
        return None;
    }
    let timestamp = packet.timestamp?;
    Some(EligiblePacket { key, timestamp })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn packet(
        network: NetworkLayer,
        has_payload: bool,
        timestamp: Option<Timestamp>,
    ) -> DissectedPacket {
        DissectedPacket {
            network,
            has_payload,
            timestamp,
        }
    }

    #[test]
    fn test_extract_ipv4() {
        let ts = Timestamp::new(5, 0);
        let eligible = extract(&packet(
            NetworkLayer::Ipv4 { source: [10, 1, 2, 3] },
            true,
            Some(ts),
        ))
        .unwrap();

        assert_eq!(eligible.key, AddressKey::V4([10, 1, 2, 3]));
        assert_eq!(eligible.key.as_bytes().len(), 4);
        assert_eq!(eligible.timestamp, ts);
        assert_eq!(eligible.key.to_string(), "10.1.2.3");
    }

    #[test]
    fn test_extract_ipv6() {
        let source = Ipv6Addr::new(0x2001, 0xdb8, 0, 0, 0, 0, 0, 1).octets();
        let ts = Some(Timestamp::default());
        let eligible = extract(&packet(NetworkLayer::Ipv6 { source }, true, ts)).unwrap();

        assert_eq!(eligible.key.as_bytes().len(), 16);
        assert_eq!(eligible.key.as_bytes(), &source[..]);
        assert_eq!(eligible.key.to_string(), "2001:db8::1");
    }

    #[test]
    fn test_ineligible_packets() {
        let ts = Some(Timestamp::new(1, 0));
        let v4 = NetworkLayer::Ipv4 { source: [1, 2, 3, 4] };

        assert_eq!(extract(&packet(NetworkLayer::None, true, ts)), None);
        assert_eq!(extract(&packet(v4, false, ts)), None);
        assert_eq!(extract(&packet(v4, true, None)), None);
    }

    #[test]
    fn test_mapped_ipv6_is_distinct_client() {
        let mapped = Ipv4Addr::new(192, 0, 2, 1).to_ipv6_mapped().octets();
        assert_ne!(AddressKey::V6(mapped), AddressKey::V4([192, 0, 2, 1]));
    }
}
