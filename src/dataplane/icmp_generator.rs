//! ICMP messages originated by the router
//!
//! Every generated message answers a received frame and leaves on the
//! interface that frame arrived on.

use super::router::{Interface, Router};
use crate::capture::Transmit;
use crate::protocol::ethernet::{EthernetHeader, FrameBuilder};
use crate::protocol::icmp::{self, dest_unreachable, time_exceeded, IcmpPacket, IcmpType};
use crate::protocol::ipv4::{Ipv4Builder, Ipv4Header, Protocol, DEFAULT_TTL};
use crate::protocol::EtherType;
use crate::{Error, Result};
use tracing::debug;

/// The messages this router knows how to originate
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IcmpKind {
    EchoReply,
    NetUnreachable,
    HostUnreachable,
    ProtocolUnreachable,
    PortUnreachable,
    TimeExceeded,
}

impl IcmpKind {
    pub fn type_code(self) -> (IcmpType, u8) {
        match self {
            IcmpKind::EchoReply => (IcmpType::EchoReply, 0),
            IcmpKind::NetUnreachable => (
                IcmpType::DestinationUnreachable,
                dest_unreachable::NET_UNREACHABLE,
            ),
            IcmpKind::HostUnreachable => (
                IcmpType::DestinationUnreachable,
                dest_unreachable::HOST_UNREACHABLE,
            ),
            IcmpKind::ProtocolUnreachable => (
                IcmpType::DestinationUnreachable,
                dest_unreachable::PROTOCOL_UNREACHABLE,
            ),
            IcmpKind::PortUnreachable => (
                IcmpType::DestinationUnreachable,
                dest_unreachable::PORT_UNREACHABLE,
            ),
            IcmpKind::TimeExceeded => (IcmpType::TimeExceeded, time_exceeded::TTL_EXCEEDED),
        }
    }
}

/// Build a complete Ethernet frame carrying an ICMP message about `original`
///
/// For an Echo Reply the identifier, sequence number and data of the
/// original Echo Request are copied. Error messages quote the original IP
/// header and the first eight bytes of its payload.
pub fn build_icmp_frame(
    icmp_type: IcmpType,
    code: u8,
    original: &[u8],
    ingress: &Interface,
) -> Result<Vec<u8>> {
    let eth = EthernetHeader::parse(original)?;
    let ip = Ipv4Header::parse(eth.payload())?;

    let message = match icmp_type {
        IcmpType::EchoReply => {
            let request = IcmpPacket::parse(ip.payload())?;
            icmp::build_echo(
                IcmpType::EchoReply,
                request.identifier(),
                request.sequence(),
                request.payload(),
            )
        }
        IcmpType::DestinationUnreachable | IcmpType::TimeExceeded => {
            icmp::build_error(icmp_type, code, ip.as_bytes(), ip.payload())
        }
        IcmpType::EchoRequest => {
            return Err(Error::InvalidPacket(
                "router does not originate echo requests".into(),
            ))
        }
    };

    let datagram = Ipv4Builder::new()
        .ttl(DEFAULT_TTL)
        .protocol(Protocol::Icmp as u8)
        .src_addr(ingress.ip_addr)
        .dst_addr(ip.src_addr())
        .payload(&message)
        .build();

    Ok(FrameBuilder::new()
        .dst_mac(eth.src_mac())
        .src_mac(ingress.mac_addr)
        .ethertype(EtherType::Ipv4 as u16)
        .payload(&datagram)
        .build())
}

impl<T: Transmit> Router<T> {
    /// Answer `original` with an ICMP message out of its ingress interface
    pub(crate) fn send_icmp(&self, ingress: &Interface, original: &[u8], kind: IcmpKind) -> Result<()> {
        let (icmp_type, code) = kind.type_code();
        let frame = build_icmp_frame(icmp_type, code, original, ingress)?;

        debug!(interface = %ingress.name, "Sending ICMP {:?}", kind);
        self.send(ingress, &frame);

        if kind == IcmpKind::EchoReply {
            self.stats.icmp_echo_replies.inc();
        } else {
            self.stats.icmp_errors_sent.inc();
        }
        Ok(())
    }
}
