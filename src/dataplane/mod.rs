//! Data plane components
//!
//! Handles frame processing: parsing, forwarding decisions, ARP resolution
//! and ICMP generation.

mod arp_processor;
mod arp_table;
mod forwarder;
mod icmp_generator;
mod router;
mod routing;

pub use arp_table::{
    ArpPolicy, ArpState, Enqueued, PendingRequest, PendingSummary, SweepOutcome, WithheldFrame,
    DEFAULT_CACHE_TIMEOUT, DEFAULT_MAX_REQUESTS, DEFAULT_RETRY_INTERVAL,
};
pub use forwarder::TTL_EXPIRY_THRESHOLD;
pub use icmp_generator::{build_icmp_frame, IcmpKind};
pub use router::{spawn_arp_maintenance, Disposition, Frame, Interface, Router, RouterContext};
pub use routing::{Route, RoutingTable};
