//! Forwarding counters.
//!
//! Lock-free counters updated from the frame path and the ARP maintenance
//! task.

use std::sync::atomic::{AtomicU64, Ordering};

/// Atomic counter for thread-safe increment operations.
#[derive(Debug, Default)]
pub struct Counter(AtomicU64);

impl Counter {
    /// Creates a new counter initialized to zero.
    pub fn new() -> Self {
        Self(AtomicU64::new(0))
    }

    /// Increments the counter by 1.
    pub fn inc(&self) {
        self.0.fetch_add(1, Ordering::Relaxed);
    }

    /// Adds a value to the counter.
    pub fn add(&self, val: u64) {
        self.0.fetch_add(val, Ordering::Relaxed);
    }

    /// Gets the current value of the counter.
    pub fn get(&self) -> u64 {
        self.0.load(Ordering::Relaxed)
    }
}

/// Per-router forwarding statistics.
#[derive(Debug, Default)]
pub struct ForwardingStats {
    /// Frames handed to the dispatcher.
    pub frames_received: Counter,
    /// Frames dropped as malformed, unsupported or not for us.
    pub frames_dropped: Counter,
    /// Datagrams sent towards their next hop.
    pub datagrams_forwarded: Counter,
    /// Frames withheld pending ARP resolution.
    pub frames_withheld: Counter,

    // ARP
    pub arp_requests_sent: Counter,
    pub arp_replies_sent: Counter,

    // ICMP
    pub icmp_echo_replies: Counter,
    /// Destination Unreachable and Time Exceeded messages.
    pub icmp_errors_sent: Counter,

    /// Frames the transmitter refused.
    pub transmit_errors: Counter,
}

impl ForwardingStats {
    pub fn new() -> Self {
        Self::default()
    }

    /// Exports all counters as key-value pairs.
    pub fn export(&self) -> Vec<(String, u64)> {
        vec![
            ("frames_received".into(), self.frames_received.get()),
            ("frames_dropped".into(), self.frames_dropped.get()),
            ("datagrams_forwarded".into(), self.datagrams_forwarded.get()),
            ("frames_withheld".into(), self.frames_withheld.get()),
            ("arp_requests_sent".into(), self.arp_requests_sent.get()),
            ("arp_replies_sent".into(), self.arp_replies_sent.get()),
            ("icmp_echo_replies".into(), self.icmp_echo_replies.get()),
            ("icmp_errors_sent".into(), self.icmp_errors_sent.get()),
            ("transmit_errors".into(), self.transmit_errors.get()),
        ]
    }
}
