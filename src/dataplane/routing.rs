//! Static routing table with longest prefix match

use std::net::Ipv4Addr;

/// Route entry
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Route {
    /// Destination network
    pub destination: Ipv4Addr,
    /// Network mask
    pub mask: Ipv4Addr,
    /// Gateway (None for directly connected)
    pub next_hop: Option<Ipv4Addr>,
    /// Egress interface name
    pub interface: String,
}

impl Route {
    /// Build a route; a gateway of 0.0.0.0 means directly connected
    pub fn new(
        destination: Ipv4Addr,
        mask: Ipv4Addr,
        gateway: Ipv4Addr,
        interface: impl Into<String>,
    ) -> Self {
        Self {
            destination,
            mask,
            next_hop: (!gateway.is_unspecified()).then_some(gateway),
            interface: interface.into(),
        }
    }

    /// `(addr & mask) == destination`
    pub fn matches(&self, addr: Ipv4Addr) -> bool {
        u32::from(addr) & u32::from(self.mask) == u32::from(self.destination)
    }

    /// Address to resolve with ARP when forwarding `dst` over this route
    pub fn resolution_target(&self, dst: Ipv4Addr) -> Ipv4Addr {
        self.next_hop.unwrap_or(dst)
    }

    pub fn is_connected(&self) -> bool {
        self.next_hop.is_none()
    }
}

/// Routing table using longest prefix match
///
/// Routes keep their insertion order; among matches with equal masks the
/// earliest inserted wins.
#[derive(Debug, Default, Clone)]
pub struct RoutingTable {
    routes: Vec<Route>,
}

impl RoutingTable {
    pub fn new() -> Self {
        Self { routes: Vec::new() }
    }

    pub fn add(&mut self, route: Route) {
        self.routes.push(route);
    }

    /// Lookup route using longest prefix match
    pub fn lookup(&self, addr: Ipv4Addr) -> Option<&Route> {
        let mut best: Option<&Route> = None;

        for route in self.routes.iter().filter(|r| r.matches(addr)) {
            match best {
                Some(b) if u32::from(b.mask) >= u32::from(route.mask) => {}
                _ => best = Some(route),
            }
        }

        best
    }

    pub fn routes(&self) -> &[Route] {
        &self.routes
    }

    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }
}

impl FromIterator<Route> for RoutingTable {
    fn from_iter<I: IntoIterator<Item = Route>>(iter: I) -> Self {
        Self {
            routes: iter.into_iter().collect(),
        }
    }
}
