//! ARP resolution state
//!
//! The IP-to-MAC cache and the queue of in-flight resolutions live behind a
//! single mutex. Frame processing and the maintenance sweep both go through
//! the narrow operations below; each one takes the lock for the duration of
//! a single lookup/insert/create/append/remove and never across a transmit.

use crate::protocol::MacAddr;
use crate::{Error, Result};
use std::collections::HashMap;
use std::net::Ipv4Addr;
use std::sync::{Mutex, MutexGuard};
use std::time::{Duration, Instant};

/// Default lifetime of a cache entry
pub const DEFAULT_CACHE_TIMEOUT: Duration = Duration::from_secs(15);

/// Default interval between ARP request retransmissions
pub const DEFAULT_RETRY_INTERVAL: Duration = Duration::from_secs(1);

/// Default number of requests sent before a resolution is abandoned
pub const DEFAULT_MAX_REQUESTS: u32 = 5;

/// Expiry and retry policy applied by the maintenance sweep
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ArpPolicy {
    pub cache_timeout: Duration,
    pub retry_interval: Duration,
    pub max_requests: u32,
}

impl Default for ArpPolicy {
    fn default() -> Self {
        Self {
            cache_timeout: DEFAULT_CACHE_TIMEOUT,
            retry_interval: DEFAULT_RETRY_INTERVAL,
            max_requests: DEFAULT_MAX_REQUESTS,
        }
    }
}

/// An owned copy of an inbound frame held until its next hop resolves
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WithheldFrame {
    /// Interface the original frame arrived on
    pub in_interface: String,
    /// Complete Ethernet frame, unmodified
    pub data: Vec<u8>,
}

impl WithheldFrame {
    /// Deep-copy a frame buffer
    ///
    /// Allocation failure is reported as a fatal resource error instead of
    /// aborting the process.
    pub fn copy_of(in_interface: &str, data: &[u8]) -> Result<Self> {
        let mut copy = Vec::new();
        copy.try_reserve_exact(data.len()).map_err(|e| {
            Error::Resource(format!("cannot withhold {}-byte frame: {}", data.len(), e))
        })?;
        copy.extend_from_slice(data);

        Ok(Self {
            in_interface: in_interface.to_string(),
            data: copy,
        })
    }
}

/// A resolution in flight
#[derive(Debug)]
pub struct PendingRequest {
    /// Address being resolved
    pub target_ip: Ipv4Addr,
    /// Interface the requests go out on
    pub interface: String,
    /// Frames waiting for the reply, oldest first
    pub frames: Vec<WithheldFrame>,
    /// Number of ARP requests sent so far
    pub requests_sent: u32,
    /// When the last request was sent
    pub last_sent: Instant,
}

/// Snapshot of a pending request, safe to hold after the lock is released
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingSummary {
    pub target_ip: Ipv4Addr,
    pub interface: String,
    pub withheld: usize,
    pub requests_sent: u32,
}

impl From<&PendingRequest> for PendingSummary {
    fn from(req: &PendingRequest) -> Self {
        Self {
            target_ip: req.target_ip,
            interface: req.interface.clone(),
            withheld: req.frames.len(),
            requests_sent: req.requests_sent,
        }
    }
}

/// Result of [`ArpState::pending_enqueue`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Enqueued {
    /// Frames now withheld for the target
    pub queued: usize,
    /// A new resolution was opened; its first request has not been sent yet
    pub created: bool,
}

/// What a maintenance sweep decided; acted upon after the lock is dropped
#[derive(Debug, Default)]
pub struct SweepOutcome {
    /// (target, egress interface) pairs whose request must be re-sent
    pub resend: Vec<(Ipv4Addr, String)>,
    /// Requests that ran out of retries, removed with their frames
    pub expired: Vec<PendingRequest>,
    /// Number of cache entries that aged out
    pub evicted: usize,
}

#[derive(Debug)]
struct CacheEntry {
    mac: MacAddr,
    created: Instant,
}

#[derive(Debug, Default)]
struct ArpTables {
    cache: HashMap<Ipv4Addr, CacheEntry>,
    pending: Vec<PendingRequest>,
}

/// Shared ARP cache and pending-request queue
#[derive(Debug, Default)]
pub struct ArpState {
    inner: Mutex<ArpTables>,
}

impl ArpState {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<MutexGuard<'_, ArpTables>> {
        self.inner
            .lock()
            .map_err(|_| Error::Resource("ARP state lock poisoned".into()))
    }

    /// Lookup MAC address for an IP
    pub fn lookup(&self, ip: Ipv4Addr) -> Result<Option<MacAddr>> {
        Ok(self.lock()?.cache.get(&ip).map(|e| e.mac))
    }

    /// Insert or overwrite the binding for an IP
    pub fn insert(&self, ip: Ipv4Addr, mac: MacAddr) -> Result<()> {
        self.lock()?.cache.insert(
            ip,
            CacheEntry {
                mac,
                created: Instant::now(),
            },
        );
        Ok(())
    }

    pub fn pending_lookup(&self, ip: Ipv4Addr) -> Result<Option<PendingSummary>> {
        Ok(self
            .lock()?
            .pending
            .iter()
            .find(|p| p.target_ip == ip)
            .map(PendingSummary::from))
    }

    /// Open a resolution for `ip`; its first request is counted as sent now
    pub fn pending_create(&self, ip: Ipv4Addr, interface: &str) -> Result<PendingSummary> {
        let mut tables = self.lock()?;
        if tables.pending.iter().any(|p| p.target_ip == ip) {
            return Err(Error::PendingExists(ip));
        }

        let request = PendingRequest {
            target_ip: ip,
            interface: interface.to_string(),
            frames: Vec::new(),
            requests_sent: 1,
            last_sent: Instant::now(),
        };
        let summary = PendingSummary::from(&request);
        tables.pending.push(request);
        Ok(summary)
    }

    /// Withhold a frame; returns the number of frames now withheld for `ip`
    pub fn pending_append_frame(&self, ip: Ipv4Addr, frame: WithheldFrame) -> Result<usize> {
        let mut tables = self.lock()?;
        let request = tables
            .pending
            .iter_mut()
            .find(|p| p.target_ip == ip)
            .ok_or(Error::PendingNotFound(ip))?;

        request.frames.push(frame);
        Ok(request.frames.len())
    }

    /// Withhold a frame for `ip`, opening a resolution on `interface` when
    /// none is in flight
    ///
    /// The lookup, create and append share one lock acquisition, so a sweep
    /// cannot expire the request between them. The caller sends the first
    /// ARP request when [`Enqueued::created`] is set.
    pub fn pending_enqueue(
        &self,
        ip: Ipv4Addr,
        interface: &str,
        frame: WithheldFrame,
    ) -> Result<Enqueued> {
        let mut tables = self.lock()?;

        if let Some(request) = tables.pending.iter_mut().find(|p| p.target_ip == ip) {
            request.frames.push(frame);
            return Ok(Enqueued {
                queued: request.frames.len(),
                created: false,
            });
        }

        tables.pending.push(PendingRequest {
            target_ip: ip,
            interface: interface.to_string(),
            frames: vec![frame],
            requests_sent: 1,
            last_sent: Instant::now(),
        });
        Ok(Enqueued {
            queued: 1,
            created: true,
        })
    }

    /// Remove a pending request, handing its withheld frames to the caller
    pub fn pending_remove(&self, ip: Ipv4Addr) -> Result<Option<PendingRequest>> {
        let mut tables = self.lock()?;
        let index = tables.pending.iter().position(|p| p.target_ip == ip);
        Ok(index.map(|i| tables.pending.remove(i)))
    }

    /// Age out cache entries and advance every pending request by one tick
    ///
    /// A request is retried once `retry_interval` has passed since its last
    /// transmission. After the final request it gets one more full interval
    /// to be answered before it expires.
    pub fn sweep(&self, now: Instant, policy: &ArpPolicy) -> Result<SweepOutcome> {
        let mut tables = self.lock()?;
        let mut outcome = SweepOutcome::default();

        let before = tables.cache.len();
        tables
            .cache
            .retain(|_, e| now.saturating_duration_since(e.created) < policy.cache_timeout);
        outcome.evicted = before - tables.cache.len();

        let (expired, mut alive): (Vec<_>, Vec<_>) = std::mem::take(&mut tables.pending)
            .into_iter()
            .partition(|p| {
                p.requests_sent >= policy.max_requests
                    && now.saturating_duration_since(p.last_sent) >= policy.retry_interval
            });

        for request in alive.iter_mut() {
            if now.saturating_duration_since(request.last_sent) >= policy.retry_interval {
                request.requests_sent += 1;
                request.last_sent = now;
                outcome
                    .resend
                    .push((request.target_ip, request.interface.clone()));
            }
        }

        tables.pending = alive;
        outcome.expired = expired;
        Ok(outcome)
    }

    pub fn cache_len(&self) -> Result<usize> {
        Ok(self.lock()?.cache.len())
    }

    pub fn pending_len(&self) -> Result<usize> {
        Ok(self.lock()?.pending.len())
    }
}
