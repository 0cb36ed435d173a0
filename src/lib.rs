//! ipfwd - IPv4 forwarding core
//!
//! Decides, for every inbound Ethernet frame, whether it is for the router,
//! for another of the router's addresses, or must be forwarded toward a next
//! hop. Next-hop link addresses are learned with ARP; frames to unresolved
//! hops are withheld until the reply arrives.

pub mod capture;
pub mod config;
pub mod dataplane;
pub mod error;
pub mod protocol;
pub mod telemetry;

pub use error::{Error, Result};
