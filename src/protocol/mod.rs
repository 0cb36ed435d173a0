//! Wire formats
//!
//! Fixed-layout Ethernet, IPv4, ARP and ICMP headers in network byte order.
//! Every view checks the buffer length before exposing a field.

pub mod arp;
pub mod ethernet;
pub mod icmp;
pub mod ipv4;
pub mod types;

pub use types::*;
