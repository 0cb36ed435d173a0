//! Configuration management
//!
//! Loads the TOML router description and turns it into the read-only
//! context the data plane runs on.

mod types;
mod validation;

pub use types::*;
pub use validation::{validate, ValidationResult};

use crate::dataplane::{Interface, Route, RouterContext, RoutingTable};
use crate::protocol::MacAddr;
use crate::{Error, Result};
use std::path::Path;

/// Load configuration from a TOML file
pub fn load<P: AsRef<Path>>(path: P) -> Result<Config> {
    let content = std::fs::read_to_string(path).map_err(Error::Io)?;
    parse(&content)
}

/// Parse configuration from TOML text
pub fn parse(content: &str) -> Result<Config> {
    toml::from_str(content).map_err(|e| Error::Config(e.to_string()))
}

impl RouterContext {
    /// Build the interface list and routing table, keeping file order
    pub fn from_config(config: &Config) -> Result<Self> {
        let mut interfaces = Vec::with_capacity(config.interfaces.len());
        for iface in &config.interfaces {
            let mac: MacAddr = iface
                .mac
                .parse()
                .map_err(|e| Error::Config(format!("interfaces.{}: {}", iface.name, e)))?;
            interfaces.push(Interface::new(iface.name.clone(), mac, iface.address));
        }

        let mut routing_table = RoutingTable::new();
        for (i, route) in config.routes.iter().enumerate() {
            if !interfaces.iter().any(|iface| iface.name == route.interface) {
                return Err(Error::Config(format!(
                    "routes[{}]: interface '{}' not defined",
                    i, route.interface
                )));
            }
            routing_table.add(Route::new(
                route.destination,
                route.mask,
                route.gateway,
                route.interface.clone(),
            ));
        }

        Ok(RouterContext::new(interfaces, routing_table))
    }
}
