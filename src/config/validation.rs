//! Configuration validation

use super::Config;
use crate::protocol::MacAddr;
use crate::telemetry::is_known_level;
use std::collections::HashSet;
use std::net::Ipv4Addr;

#[derive(Debug, Clone)]
pub struct ValidationResult {
    pub warnings: Vec<String>,
    pub errors: Vec<String>,
}

impl ValidationResult {
    pub fn new() -> Self {
        Self {
            warnings: Vec::new(),
            errors: Vec::new(),
        }
    }

    pub fn warn(&mut self, msg: impl Into<String>) {
        self.warnings.push(msg.into());
    }

    pub fn error(&mut self, msg: impl Into<String>) {
        self.errors.push(msg.into());
    }

    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }

    pub fn print_diagnostics(&self) {
        for warning in &self.warnings {
            println!("[WARN] {}", warning);
        }
        for error in &self.errors {
            println!("[ERROR] {}", error);
        }
    }
}

impl Default for ValidationResult {
    fn default() -> Self {
        Self::new()
    }
}

/// Validate configuration and return warnings/errors
pub fn validate(config: &Config) -> ValidationResult {
    let mut result = ValidationResult::new();

    validate_log(config, &mut result);
    validate_arp(config, &mut result);
    validate_interfaces(config, &mut result);
    validate_routes(config, &mut result);

    result
}

fn validate_log(config: &Config, result: &mut ValidationResult) {
    if !is_known_level(&config.log.level) {
        result.warn(format!(
            "log.level: unknown level '{}', using info",
            config.log.level
        ));
    }
}

fn validate_arp(config: &Config, result: &mut ValidationResult) {
    let arp = &config.arp;
    if arp.max_requests == 0 {
        result.error("arp.max_requests: must be at least 1");
    }
    if arp.sweep_interval_ms == 0 {
        result.error("arp.sweep_interval_ms: must be greater than zero");
    }
    if arp.cache_timeout_secs == 0 {
        result.warn("arp.cache_timeout_secs: 0 evicts every entry on each sweep");
    }
}

fn validate_interfaces(config: &Config, result: &mut ValidationResult) {
    let mut names = HashSet::new();
    let mut addresses = HashSet::new();

    for iface in &config.interfaces {
        if !names.insert(iface.name.as_str()) {
            result.error(format!("interfaces.{}: defined more than once", iface.name));
        }

        if let Err(e) = iface.mac.parse::<MacAddr>() {
            result.error(format!("interfaces.{}: {}", iface.name, e));
        }

        if !addresses.insert(iface.address) {
            result.error(format!(
                "interfaces.{}: address {} already assigned",
                iface.name, iface.address
            ));
        }

        if iface.address.is_unspecified() || iface.address.is_broadcast() {
            result.error(format!(
                "interfaces.{}: {} is not a host address",
                iface.name, iface.address
            ));
        }
    }
}

fn validate_routes(config: &Config, result: &mut ValidationResult) {
    if config.routes.is_empty() {
        result.warn("routes: routing table is empty, nothing will be forwarded");
        return;
    }

    for (i, route) in config.routes.iter().enumerate() {
        if !config.interfaces.iter().any(|iface| iface.name == route.interface) {
            result.error(format!(
                "routes[{}]: interface '{}' not defined",
                i, route.interface
            ));
        }

        let mask = u32::from(route.mask);
        if u32::from(route.destination) & !mask != 0 {
            result.error(format!(
                "routes[{}]: destination {} has bits outside mask {}",
                i, route.destination, route.mask
            ));
        }

        if !is_contiguous(route.mask) {
            result.warn(format!(
                "routes[{}]: mask {} is not contiguous",
                i, route.mask
            ));
        }
    }

    let has_default = config
        .routes
        .iter()
        .any(|r| r.mask == Ipv4Addr::UNSPECIFIED);
    if !has_default {
        result.warn("routes: no default route, unmatched destinations are unreachable");
    }
}

fn is_contiguous(mask: Ipv4Addr) -> bool {
    let bits = u32::from(mask);
    bits.leading_ones() + bits.trailing_zeros() == 32
}
