//! Configuration types

use crate::dataplane::ArpPolicy;
use crate::telemetry::LogConfig;
use serde::Deserialize;
use std::net::Ipv4Addr;
use std::time::Duration;

/// Router description (router.toml)
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub log: LogConfig,
    #[serde(default)]
    pub arp: ArpConfig,
    #[serde(default)]
    pub interfaces: Vec<InterfaceConfig>,
    #[serde(default)]
    pub routes: Vec<RouteConfig>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct InterfaceConfig {
    pub name: String,
    /// Colon- or hyphen-separated hex, parsed during validation
    pub mac: String,
    pub address: Ipv4Addr,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RouteConfig {
    pub destination: Ipv4Addr,
    pub mask: Ipv4Addr,
    /// 0.0.0.0 for directly connected networks
    #[serde(default = "unspecified")]
    pub gateway: Ipv4Addr,
    pub interface: String,
}

fn unspecified() -> Ipv4Addr {
    Ipv4Addr::UNSPECIFIED
}

/// ARP cache and retry tuning
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ArpConfig {
    pub cache_timeout_secs: u64,
    pub retry_interval_secs: u64,
    pub max_requests: u32,
    pub sweep_interval_ms: u64,
}

impl Default for ArpConfig {
    fn default() -> Self {
        let policy = ArpPolicy::default();
        Self {
            cache_timeout_secs: policy.cache_timeout.as_secs(),
            retry_interval_secs: policy.retry_interval.as_secs(),
            max_requests: policy.max_requests,
            sweep_interval_ms: 1000,
        }
    }
}

impl ArpConfig {
    pub fn policy(&self) -> ArpPolicy {
        ArpPolicy {
            cache_timeout: Duration::from_secs(self.cache_timeout_secs),
            retry_interval: Duration::from_secs(self.retry_interval_secs),
            max_requests: self.max_requests,
        }
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_millis(self.sweep_interval_ms)
    }
}
