//! Router context and frame dispatcher
//!
//! A [`Router`] owns the read-only context (interfaces, routing table), the
//! shared ARP state and a transmission backend. [`Router::process`] is the
//! single entry point for inbound frames; callers must not invoke it
//! concurrently for the same router.

use crate::capture::Transmit;
use crate::dataplane::{ArpPolicy, ArpState, RoutingTable};
use crate::protocol::ethernet::EthernetHeader;
use crate::protocol::{EtherType, MacAddr};
use crate::telemetry::ForwardingStats;
use crate::Result;
use std::net::Ipv4Addr;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::task::JoinHandle;
use tokio::time::interval;
use tracing::{debug, error, trace, warn};

/// A router port
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Interface {
    pub name: String,
    pub mac_addr: MacAddr,
    pub ip_addr: Ipv4Addr,
}

impl Interface {
    pub fn new(name: impl Into<String>, mac_addr: MacAddr, ip_addr: Ipv4Addr) -> Self {
        Self {
            name: name.into(),
            mac_addr,
            ip_addr,
        }
    }
}

/// Interfaces and static routes, fixed for the router's lifetime
#[derive(Debug, Clone, Default)]
pub struct RouterContext {
    interfaces: Vec<Interface>,
    routing_table: RoutingTable,
}

impl RouterContext {
    pub fn new(interfaces: Vec<Interface>, routing_table: RoutingTable) -> Self {
        Self {
            interfaces,
            routing_table,
        }
    }

    pub fn interface(&self, name: &str) -> Option<&Interface> {
        self.interfaces.iter().find(|i| i.name == name)
    }

    /// The interface owning `ip`, if any
    pub fn interface_with_ip(&self, ip: Ipv4Addr) -> Option<&Interface> {
        self.interfaces.iter().find(|i| i.ip_addr == ip)
    }

    pub fn interfaces(&self) -> &[Interface] {
        &self.interfaces
    }

    pub fn routing_table(&self) -> &RoutingTable {
        &self.routing_table
    }
}

/// An inbound frame on loan from the receive path
///
/// The buffer is only valid for the duration of [`Router::process`]; the
/// forwarding path may rewrite it in place.
#[derive(Debug)]
pub struct Frame<'a> {
    pub in_interface: &'a str,
    pub data: &'a mut [u8],
}

impl<'a> Frame<'a> {
    pub fn new(in_interface: &'a str, data: &'a mut [u8]) -> Self {
        Self { in_interface, data }
    }
}

/// Non-fatal result of processing one frame
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    /// The frame was classified and handled
    Processed,
    /// The frame was malformed, unsupported or not for us
    Dropped,
}

/// The forwarding core for one router instance
pub struct Router<T: Transmit> {
    ctx: RouterContext,
    pub(crate) arp: ArpState,
    policy: ArpPolicy,
    tx: T,
    pub(crate) stats: ForwardingStats,
}

impl<T: Transmit> Router<T> {
    pub fn new(ctx: RouterContext, tx: T) -> Self {
        Self {
            ctx,
            arp: ArpState::new(),
            policy: ArpPolicy::default(),
            tx,
            stats: ForwardingStats::new(),
        }
    }

    pub fn with_policy(mut self, policy: ArpPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn context(&self) -> &RouterContext {
        &self.ctx
    }

    pub fn arp(&self) -> &ArpState {
        &self.arp
    }

    pub fn policy(&self) -> &ArpPolicy {
        &self.policy
    }

    pub fn transmitter(&self) -> &T {
        &self.tx
    }

    pub fn stats(&self) -> &ForwardingStats {
        &self.stats
    }

    /// Process one inbound Ethernet frame
    ///
    /// `Ok` carries the non-fatal outcome. `Err` is returned only for fatal
    /// conditions, after which the router should shut down.
    pub fn process(&self, frame: Frame<'_>) -> Result<Disposition> {
        self.stats.frames_received.inc();

        let Some(ingress) = self.ctx.interface(frame.in_interface) else {
            warn!("Unknown ingress interface: {}", frame.in_interface);
            return Ok(self.dropped());
        };

        let ethertype = match EthernetHeader::parse(frame.data) {
            Ok(eth) => eth.ethertype(),
            Err(e) => {
                trace!(interface = %ingress.name, "Failed to parse Ethernet frame: {}", e);
                return Ok(self.dropped());
            }
        };

        let result = match EtherType::from_u16(ethertype) {
            Some(EtherType::Ipv4) => self.process_ipv4(ingress, frame.data),
            Some(EtherType::Arp) => self.process_arp(ingress, frame.data),
            Some(EtherType::Ipv6) | None => {
                trace!("Unsupported EtherType: 0x{:04x}", ethertype);
                return Ok(self.dropped());
            }
        };

        match result {
            Ok(Disposition::Dropped) => Ok(self.dropped()),
            Ok(disposition) => Ok(disposition),
            Err(e) if e.is_fatal() => {
                error!(interface = %ingress.name, "Fatal error while processing frame: {}", e);
                Err(e)
            }
            Err(e) => {
                trace!(interface = %ingress.name, "Dropping frame: {}", e);
                Ok(self.dropped())
            }
        }
    }

    fn dropped(&self) -> Disposition {
        self.stats.frames_dropped.inc();
        Disposition::Dropped
    }

    /// Hand a frame to the backend; failures are logged, not propagated
    pub(crate) fn send(&self, interface: &Interface, frame: &[u8]) {
        if let Err(e) = self.tx.transmit(interface, frame) {
            self.stats.transmit_errors.inc();
            warn!("Failed to send on {}: {}", interface.name, e);
        }
    }

    /// One tick of ARP upkeep
    ///
    /// Re-sends outstanding requests whose retry interval has passed and
    /// reports Host Unreachable for every frame withheld by a request that
    /// ran out of retries.
    pub fn run_arp_maintenance(&self, now: Instant) -> Result<()> {
        let outcome = self.arp.sweep(now, &self.policy)?;
        if outcome.evicted > 0 {
            trace!("Evicted {} ARP cache entries", outcome.evicted);
        }

        for (target_ip, iface_name) in outcome.resend {
            match self.ctx.interface(&iface_name) {
                Some(egress) => self.send_arp_request(egress, target_ip),
                None => warn!("Pending ARP request on unknown interface {}", iface_name),
            }
        }

        for request in outcome.expired {
            debug!(
                ip = %request.target_ip,
                "ARP resolution failed after {} requests, dropping {} frames",
                request.requests_sent,
                request.frames.len()
            );
            for frame in request.frames {
                let Some(ingress) = self.ctx.interface(&frame.in_interface) else {
                    continue;
                };
                if let Err(e) =
                    self.send_icmp(ingress, &frame.data, crate::dataplane::IcmpKind::HostUnreachable)
                {
                    if e.is_fatal() {
                        return Err(e);
                    }
                    trace!("Cannot report unreachable host: {}", e);
                }
            }
        }

        Ok(())
    }
}

/// Run ARP maintenance on a fixed period until a fatal error occurs
pub fn spawn_arp_maintenance<T>(router: Arc<Router<T>>, period: Duration) -> JoinHandle<()>
where
    T: Transmit + 'static,
{
    tokio::spawn(async move {
        let mut ticker = interval(period);
        loop {
            ticker.tick().await;
            if let Err(e) = router.run_arp_maintenance(Instant::now()) {
                error!("ARP maintenance stopped: {}", e);
                break;
            }
        }
    })
}
