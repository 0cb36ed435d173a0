//! ARP message handling
//!
//! Requests for an interface address are answered directly. Replies update
//! the cache and release every frame withheld for the sender.

use super::router::{Disposition, Interface, Router};
use crate::capture::Transmit;
use crate::protocol::arp::{ArpOp, ArpPacket};
use crate::protocol::ethernet::{EthernetHeader, FrameBuilder};
use crate::protocol::{EtherType, MacAddr};
use crate::Result;
use std::net::Ipv4Addr;
use tracing::{debug, trace, warn};

impl<T: Transmit> Router<T> {
    pub(crate) fn process_arp(&self, ingress: &Interface, data: &[u8]) -> Result<Disposition> {
        let eth = EthernetHeader::parse(data)?;
        let arp = ArpPacket::parse(eth.payload())?;

        if arp.target_ip != ingress.ip_addr {
            trace!(
                interface = %ingress.name,
                "ARP for {} is not addressed to us",
                arp.target_ip
            );
            return Ok(Disposition::Dropped);
        }

        match arp.operation {
            ArpOp::Request => self.answer_request(ingress, &arp),
            ArpOp::Reply => self.learn_reply(arp.sender_ip, arp.sender_mac)?,
        }

        Ok(Disposition::Processed)
    }

    fn answer_request(&self, ingress: &Interface, request: &ArpPacket) {
        let reply = ArpPacket::reply(
            ingress.mac_addr,
            ingress.ip_addr,
            request.sender_mac,
            request.sender_ip,
        );
        let frame = FrameBuilder::new()
            .dst_mac(request.sender_mac)
            .src_mac(ingress.mac_addr)
            .ethertype(EtherType::Arp as u16)
            .payload(&reply.to_bytes())
            .build();

        debug!(
            interface = %ingress.name,
            "Answering ARP request from {} ({})",
            request.sender_ip,
            request.sender_mac
        );
        self.send(ingress, &frame);
        self.stats.arp_replies_sent.inc();
    }

    fn learn_reply(&self, sender_ip: Ipv4Addr, sender_mac: MacAddr) -> Result<()> {
        self.arp.insert(sender_ip, sender_mac)?;
        debug!(ip = %sender_ip, "Learned {}", sender_mac);

        let Some(request) = self.arp.pending_remove(sender_ip)? else {
            return Ok(());
        };

        let Some(egress) = self.context().interface(&request.interface) else {
            warn!(
                "Dropping {} frames for {}: unknown interface {}",
                request.frames.len(),
                sender_ip,
                request.interface
            );
            return Ok(());
        };

        debug!(ip = %sender_ip, "Releasing {} withheld frames", request.frames.len());
        for mut frame in request.frames {
            if let Err(e) = self.forward_frame(egress, sender_mac, &mut frame.data) {
                if e.is_fatal() {
                    return Err(e);
                }
                trace!("Dropping withheld frame: {}", e);
            }
        }
        Ok(())
    }
}
