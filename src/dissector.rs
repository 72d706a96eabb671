// pcap-client-sampler/src/dissector.rs
use std::time::Duration;

use chrono::{DateTime, Utc};
use etherparse::{
    Ethernet2HeaderSlice, InternetSlice, Ipv4HeaderSlice, Ipv6HeaderSlice, SlicedPacket,
    TransportSlice,
};
use pcap_file::DataLink;
use serde::{Serialize, Serializer};

use crate::packet_capture::CapturedPacket;

/// Capture timestamp, kept as whole seconds plus nanoseconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Timestamp {
    pub secs: u64,
    pub nanos: u32,
}

impl Timestamp {
    pub fn new(secs: u64, nanos: u32) -> Self {
        // Normalize so that nanos < 1e9.
        let secs = secs + u64::from(nanos / 1_000_000_000);
        Timestamp {
            secs,
            nanos: nanos % 1_000_000_000,
        }
    }

    pub fn from_duration(d: Duration) -> Self {
        Timestamp {
            secs: d.as_secs(),
            nanos: d.subsec_nanos(),
        }
    }

    pub fn as_nanos(&self) -> u128 {
        u128::from(self.secs) * 1_000_000_000 + u128::from(self.nanos)
    }

    /// `secs * 1000 + nanos / 1e6`
    pub fn as_millis_f64(&self) -> f64 {
        self.secs as f64 * 1000.0 + f64::from(self.nanos) / 1_000_000.0
    }

    pub fn to_rfc3339(&self) -> String {
        i64::try_from(self.secs)
            .ok()
            .and_then(|secs| DateTime::<Utc>::from_timestamp(secs, self.nanos))
            .map(|t| t.to_rfc3339())
            .unwrap_or_else(|| format!("{}.{:09}", self.secs, self.nanos))
    }
}

impl Serialize for Timestamp {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_f64(self.as_millis_f64())
    }
}

/// Source address family of a dissected packet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NetworkLayer {
    Ipv4 { source: [u8; 4] },
    Ipv6 { source: [u8; 16] },
    None,
}

/// What the sampler needs to know about a packet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DissectedPacket {
    pub network: NetworkLayer,
    /// The IP layer carries a transport header or payload bytes.
    pub has_payload: bool,
    pub timestamp: Option<Timestamp>,
}

/// Slices raw capture records according to the capture's link-layer type.
#[derive(Debug, Clone, Copy)]
pub struct PacketDissector {
    datalink: DataLink,
}

impl PacketDissector {
    pub fn new(datalink: DataLink) -> Self {
        PacketDissector { datalink }
    }

    pub fn datalink(&self) -> DataLink {
        self.datalink
    }

    /// Returns true when records of this datalink start directly at the IP header.
    pub fn is_raw_ip(&self) -> bool {
        matches!(self.datalink, DataLink::RAW | DataLink::IPV4 | DataLink::IPV6)
    }

    pub fn dissect(&self, packet: &CapturedPacket) -> DissectedPacket {
        let (network, has_payload) = self.slice_network(&packet.data);
        DissectedPacket {
            network,
            has_payload,
            timestamp: Some(Timestamp::from_duration(packet.timestamp)),
        }
    }

    fn slice_network(&self, data: &[u8]) -> (NetworkLayer, bool) {
        let sliced = match self.datalink {
            DataLink::ETHERNET => SlicedPacket::from_ethernet(data),
            DataLink::RAW | DataLink::IPV4 | DataLink::IPV6 => SlicedPacket::from_ip(data),
            _ => return (NetworkLayer::None, false),
        };

        let sliced = match sliced {
            Ok(sliced) => sliced,
            Err(_) => return self.slice_ip_header(data),
        };

        // Unparsed protocols come back as `Unknown` even with nothing behind the IP header.
        let has_transport = matches!(
            &sliced.transport,
            Some(t) if !matches!(t, TransportSlice::Unknown(_))
        );
        let has_payload = has_transport || !sliced.payload.is_empty();
        let network = match &sliced.ip {
            Some(InternetSlice::Ipv4(header, _)) => NetworkLayer::Ipv4 {
                source: header.source(),
            },
            Some(InternetSlice::Ipv6(header, _)) => NetworkLayer::Ipv6 {
                source: header.source(),
            },
            None => NetworkLayer::None,
        };

        (network, has_payload)
    }

    /// Fallback for records whose transport header is cut short by the snaplen:
    /// the IP header alone still names the client.
    fn slice_ip_header(&self, data: &[u8]) -> (NetworkLayer, bool) {
        let ip = match self.datalink {
            DataLink::ETHERNET => match Ethernet2HeaderSlice::from_slice(data) {
                Ok(eth) if matches!(eth.ether_type(), 0x0800 | 0x86dd) => {
                    &data[eth.slice().len()..]
                }
                _ => return (NetworkLayer::None, false),
            },
            _ => data,
        };

        match ip.first().map(|b| b >> 4) {
            Some(4) => match Ipv4HeaderSlice::from_slice(ip) {
                Ok(header) => (
                    NetworkLayer::Ipv4 {
                        source: header.source(),
                    },
                    ip.len() > header.slice().len(),
                ),
                Err(_) => (NetworkLayer::None, false),
            },
            Some(6) => match Ipv6HeaderSlice::from_slice(ip) {
                Ok(header) => (
                    NetworkLayer::Ipv6 {
                        source: header.source(),
                    },
                    ip.len() > header.slice().len(),
                ),
                Err(_) => (NetworkLayer::None, false),
            },
            _ => (NetworkLayer::None, false),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use etherparse::PacketBuilder;

    fn udp_v4(src: [u8; 4], payload: &[u8]) -> Vec<u8> {
        let builder = PacketBuilder::ipv4(src, [10, 0, 0, 53], 64).udp(40000, 53);
        let mut buf = Vec::with_capacity(builder.size(payload.len()));
        builder.write(&mut buf, payload).unwrap();
        buf
    }

    fn captured(data: Vec<u8>) -> CapturedPacket {
        CapturedPacket::new(Duration::new(12, 500_000), data)
    }

    #[test]
    fn test_timestamp_millis() {
        let ts = Timestamp::new(3, 250_000_000);
        assert_eq!(ts.as_millis_f64(), 3250.0);
        assert_eq!(ts.as_nanos(), 3_250_000_000);
        assert_eq!(Timestamp::new(1, 1_500_000_000), Timestamp::new(2, 500_000_000));
    }

    #[test]
    fn test_timestamp_rfc3339() {
        assert_eq!(Timestamp::new(0, 0).to_rfc3339(), "1970-01-01T00:00:00+00:00");
    }

    #[test]
    fn test_raw_ipv4_dissection() {
        let dissector = PacketDissector::new(DataLink::RAW);
        let packet = dissector.dissect(&captured(udp_v4([192, 168, 1, 7], b"query")));

        assert_eq!(packet.network, NetworkLayer::Ipv4 { source: [192, 168, 1, 7] });
        assert!(packet.has_payload);
        assert_eq!(packet.timestamp, Some(Timestamp::new(12, 500_000)));
    }

    #[test]
    fn test_raw_ipv6_dissection() {
        let mut src = [0u8; 16];
        src[0] = 0x20;
        src[1] = 0x01;
        src[15] = 0x09;
        let builder = PacketBuilder::ipv6(src, [0xff; 16], 32).udp(5353, 5353);
        let mut buf = Vec::new();
        builder.write(&mut buf, b"x").unwrap();

        let packet = PacketDissector::new(DataLink::IPV6).dissect(&captured(buf));
        assert_eq!(packet.network, NetworkLayer::Ipv6 { source: src });
        assert!(packet.has_payload);
    }

    #[test]
    fn test_ethernet_ipv4_dissection() {
        let builder = PacketBuilder::ethernet2([1, 2, 3, 4, 5, 6], [6, 5, 4, 3, 2, 1])
            .ipv4([172, 16, 0, 1], [172, 16, 0, 2], 64)
            .udp(1000, 2000);
        let mut buf = Vec::new();
        builder.write(&mut buf, b"hello").unwrap();

        let packet = PacketDissector::new(DataLink::ETHERNET).dissect(&captured(buf));
        assert_eq!(packet.network, NetworkLayer::Ipv4 { source: [172, 16, 0, 1] });
    }

    #[test]
    fn test_arp_has_no_network_layer() {
        let mut frame = vec![0xff; 6];
        frame.extend_from_slice(&[0x00, 0x11, 0x22, 0x33, 0x44, 0x55]);
        frame.extend_from_slice(&[0x08, 0x06]);
        frame.extend_from_slice(&[0u8; 28]);

        let packet = PacketDissector::new(DataLink::ETHERNET).dissect(&captured(frame));
        assert_eq!(packet.network, NetworkLayer::None);
    }

    #[test]
    fn test_bare_ip_header_has_no_payload() {
        let builder = PacketBuilder::ipv4([10, 0, 0, 9], [10, 0, 0, 1], 64);
        let mut buf = Vec::new();
        builder.write(&mut buf, 253, &[]).unwrap();

        let packet = PacketDissector::new(DataLink::RAW).dissect(&captured(buf));
        assert_eq!(packet.network, NetworkLayer::Ipv4 { source: [10, 0, 0, 9] });
        assert!(!packet.has_payload);
    }

    #[test]
    fn test_unknown_protocol_with_bytes_has_payload() {
        let builder = PacketBuilder::ipv4([10, 0, 0, 9], [10, 0, 0, 1], 64);
        let mut buf = Vec::new();
        builder.write(&mut buf, 253, b"opaque").unwrap();

        let packet = PacketDissector::new(DataLink::RAW).dissect(&captured(buf));
        assert!(packet.has_payload);
    }

    #[test]
    fn test_truncated_tcp_keeps_source() {
        let builder = PacketBuilder::ipv4([192, 0, 2, 44], [192, 0, 2, 1], 64)
            .tcp(443, 51000, 1, 1024);
        let mut buf = Vec::new();
        builder.write(&mut buf, b"data").unwrap();
        // Cut off in the middle of the TCP header.
        buf.truncate(20 + 10);

        let packet = PacketDissector::new(DataLink::RAW).dissect(&captured(buf));
        assert_eq!(packet.network, NetworkLayer::Ipv4 { source: [192, 0, 2, 44] });
        assert!(packet.has_payload);
    }

    #[test]
    fn test_truncated_tcp_behind_ethernet_keeps_source() {
        let builder = PacketBuilder::ethernet2([1, 2, 3, 4, 5, 6], [6, 5, 4, 3, 2, 1])
            .ipv4([198, 51, 100, 7], [198, 51, 100, 1], 64)
            .tcp(80, 40000, 1, 1024);
        let mut buf = Vec::new();
        builder.write(&mut buf, b"GET /").unwrap();
        buf.truncate(14 + 20 + 4);

        let packet = PacketDissector::new(DataLink::ETHERNET).dissect(&captured(buf));
        assert_eq!(packet.network, NetworkLayer::Ipv4 { source: [198, 51, 100, 7] });
    }

    #[test]
    fn test_garbage_and_unknown_datalink() {
        let raw = PacketDissector::new(DataLink::RAW);
        assert_eq!(raw.dissect(&captured(vec![0x00, 0x01])).network, NetworkLayer::None);

        let other = PacketDissector::new(DataLink::IEEE802_11);
        let packet = other.dissect(&captured(udp_v4([1, 1, 1, 1], b"x")));
        assert_eq!(packet.network, NetworkLayer::None);
        assert!(!other.is_raw_ip());
    }
}
