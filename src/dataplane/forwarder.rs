//! IPv4 forwarding
//!
//! Handles datagrams addressed to the router itself, routes everything else
//! by longest prefix match and withholds frames whose next hop is not yet
//! resolved.

use super::arp_table::WithheldFrame;
use super::icmp_generator::IcmpKind;
use super::router::{Disposition, Interface, Router};
use crate::capture::Transmit;
use crate::protocol::arp::ArpPacket;
use crate::protocol::ethernet::{EthernetHeader, EthernetHeaderMut, FrameBuilder};
use crate::protocol::icmp::IcmpPacket;
use crate::protocol::ipv4::{Ipv4Header, Ipv4HeaderMut, Protocol};
use crate::protocol::{EtherType, MacAddr};
use crate::{Error, Result};
use std::net::Ipv4Addr;
use tracing::{debug, trace};

/// Datagrams arriving with a TTL at or below this value are not forwarded
pub const TTL_EXPIRY_THRESHOLD: u8 = 1;

impl<T: Transmit> Router<T> {
    pub(crate) fn process_ipv4(&self, ingress: &Interface, data: &mut [u8]) -> Result<Disposition> {
        let (dst, ttl, protocol) = {
            let eth = EthernetHeader::parse(data)?;
            let ip = Ipv4Header::parse(eth.payload())?;
            if !ip.validate_checksum() {
                return Err(Error::InvalidPacket("bad IPv4 header checksum".into()));
            }
            (ip.dst_addr(), ip.ttl(), ip.protocol())
        };

        if dst == ingress.ip_addr {
            return self.deliver_local(ingress, data, ttl, protocol);
        }

        if let Some(owner) = self.context().interface_with_ip(dst) {
            // Only reachable through its own port
            debug!(ingress = %ingress.name, "Datagram for {} owned by {}", dst, owner.name);
            self.send_icmp(ingress, data, IcmpKind::HostUnreachable)?;
            return Ok(Disposition::Processed);
        }

        let Some(route) = self.context().routing_table().lookup(dst) else {
            debug!("No route to {}", dst);
            self.send_icmp(ingress, data, IcmpKind::NetUnreachable)?;
            return Ok(Disposition::Processed);
        };
        let target = route.resolution_target(dst);

        if ttl <= TTL_EXPIRY_THRESHOLD {
            trace!("TTL expired for datagram to {}", dst);
            self.send_icmp(ingress, data, IcmpKind::TimeExceeded)?;
            return Ok(Disposition::Processed);
        }

        let egress = self
            .context()
            .interface(&route.interface)
            .ok_or_else(|| Error::InterfaceNotFound {
                name: route.interface.clone(),
            })?;

        match self.arp.lookup(target)? {
            Some(mac) => self.forward_frame(egress, mac, data)?,
            None => self.withhold(ingress, egress, target, data)?,
        }

        Ok(Disposition::Processed)
    }

    /// Datagrams addressed to the ingress interface itself
    fn deliver_local(
        &self,
        ingress: &Interface,
        data: &[u8],
        ttl: u8,
        protocol: u8,
    ) -> Result<Disposition> {
        let kind = match Protocol::from_u8(protocol) {
            Some(Protocol::Tcp) | Some(Protocol::Udp) => IcmpKind::PortUnreachable,
            _ if ttl <= TTL_EXPIRY_THRESHOLD => IcmpKind::TimeExceeded,
            Some(Protocol::Icmp) => {
                let eth = EthernetHeader::parse(data)?;
                let ip = Ipv4Header::parse(eth.payload())?;
                let message = IcmpPacket::parse(ip.payload())?;
                if !message.is_echo_request() {
                    trace!("Ignoring ICMP type {} addressed to us", message.icmp_type());
                    return Ok(Disposition::Processed);
                }
                IcmpKind::EchoReply
            }
            None => IcmpKind::ProtocolUnreachable,
        };

        self.send_icmp(ingress, data, kind)?;
        Ok(Disposition::Processed)
    }

    /// Rewrite the link header, decrement TTL and send out of `egress`
    pub(crate) fn forward_frame(
        &self,
        egress: &Interface,
        next_hop_mac: MacAddr,
        data: &mut [u8],
    ) -> Result<()> {
        {
            let mut eth = EthernetHeaderMut::parse(data)?;
            eth.set_dst_mac(next_hop_mac);
            eth.set_src_mac(egress.mac_addr);

            let mut ip = Ipv4HeaderMut::parse(eth.payload_mut())?;
            if !ip.decrement_ttl() {
                return Err(Error::InvalidPacket("TTL already zero".into()));
            }
        }

        trace!(egress = %egress.name, "Forwarding to {}", next_hop_mac);
        self.send(egress, data);
        self.stats.datagrams_forwarded.inc();
        Ok(())
    }

    /// Hold a copy of `data` until `target` answers on `egress`
    fn withhold(
        &self,
        ingress: &Interface,
        egress: &Interface,
        target: Ipv4Addr,
        data: &[u8],
    ) -> Result<()> {
        let frame = WithheldFrame::copy_of(&ingress.name, data)?;

        let enqueued = self.arp.pending_enqueue(target, &egress.name, frame)?;
        self.stats.frames_withheld.inc();
        debug!(ip = %target, "Withholding frame ({} queued)", enqueued.queued);

        if enqueued.created {
            self.send_arp_request(egress, target);
        }
        Ok(())
    }

    /// Broadcast a who-has for `target` on `egress`
    pub(crate) fn send_arp_request(&self, egress: &Interface, target: Ipv4Addr) {
        let request = ArpPacket::request(egress.mac_addr, egress.ip_addr, target);
        let frame = FrameBuilder::new()
            .dst_mac(MacAddr::BROADCAST)
            .src_mac(egress.mac_addr)
            .ethertype(EtherType::Arp as u16)
            .payload(&request.to_bytes())
            .build();

        debug!(egress = %egress.name, "Sending ARP request for {}", target);
        self.send(egress, &frame);
        self.stats.arp_requests_sent.inc();
    }
}
