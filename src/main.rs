use clap::{Parser, Subcommand};
use ipfwd::capture::RecordingTransmitter;
use ipfwd::config::{self, Config};
use ipfwd::dataplane::{spawn_arp_maintenance, Frame, Router, RouterContext};
use ipfwd::protocol::ethernet::{EthernetHeader, FrameBuilder};
use ipfwd::protocol::icmp::{self, IcmpType};
use ipfwd::protocol::ipv4::{Ipv4Builder, Ipv4Header, Protocol};
use ipfwd::protocol::{EtherType, MacAddr};
use ipfwd::telemetry::init_logging;
use std::net::Ipv4Addr;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::runtime::Runtime;
use tracing::{info, warn};

#[derive(Parser)]
#[command(name = "ipfwd")]
#[command(about = "Static-route IPv4 forwarding core")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Validate a router description
    Validate {
        /// Path to router.toml
        #[arg(short, long, default_value = "router.toml")]
        config: PathBuf,
    },
    /// Show the route selected for an address
    Route {
        /// Path to router.toml
        #[arg(short, long, default_value = "router.toml")]
        config: PathBuf,

        /// Destination address
        address: Ipv4Addr,
    },
    /// Print interfaces and routing table
    Show {
        /// Path to router.toml
        #[arg(short, long, default_value = "router.toml")]
        config: PathBuf,
    },
    /// Feed one echo request through the router and print what it sends
    ///
    /// With --linger-ms the ARP maintenance task keeps running at the
    /// configured sweep interval, so retries and Host Unreachable show up.
    Simulate {
        /// Path to router.toml
        #[arg(short, long, default_value = "router.toml")]
        config: PathBuf,

        /// Ingress interface
        #[arg(short, long)]
        ingress: String,

        /// Source address of the echo request
        #[arg(long)]
        src: Ipv4Addr,

        /// Destination address of the echo request
        #[arg(long)]
        dst: Ipv4Addr,

        #[arg(long, default_value_t = 64)]
        ttl: u8,

        /// Pre-resolved neighbor, as IP=MAC (repeatable)
        #[arg(long = "neighbor", value_parser = parse_neighbor)]
        neighbors: Vec<(Ipv4Addr, MacAddr)>,

        /// Keep ARP maintenance running this long before reporting
        #[arg(long, default_value_t = 0)]
        linger_ms: u64,
    },
}

fn main() {
    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Validate { config } => cmd_validate(&config),
        Commands::Route { config, address } => cmd_route(&config, address),
        Commands::Show { config } => cmd_show(&config),
        Commands::Simulate {
            config,
            ingress,
            src,
            dst,
            ttl,
            neighbors,
            linger_ms,
        } => cmd_simulate(
            &config,
            &ingress,
            src,
            dst,
            ttl,
            &neighbors,
            Duration::from_millis(linger_ms),
        ),
    };

    if let Err(e) = result {
        eprintln!("[ERROR] {}", e);
        std::process::exit(1);
    }
}

/// Load, initialize logging from the `[log]` section and validate
fn load_config(path: &Path) -> Result<Config, String> {
    let cfg = config::load(path).map_err(|e| format!("Failed to load config: {}", e))?;
    init_logging(Some(&cfg.log));
    info!("Loaded {}", path.display());
    Ok(cfg)
}

fn load_context(path: &Path) -> Result<(Config, RouterContext), String> {
    let cfg = load_config(path)?;
    let validation = config::validate(&cfg);
    if validation.has_errors() {
        validation.print_diagnostics();
        return Err("Validation failed".to_string());
    }
    let ctx = RouterContext::from_config(&cfg).map_err(|e| e.to_string())?;
    Ok((cfg, ctx))
}

fn cmd_validate(config_path: &Path) -> Result<(), String> {
    println!("[INFO] Validating {}...", config_path.display());

    let cfg = load_config(config_path)?;
    let validation = config::validate(&cfg);
    validation.print_diagnostics();

    if validation.has_errors() {
        Err("Validation failed".to_string())
    } else {
        println!("[INFO] Configuration is valid");
        Ok(())
    }
}

fn cmd_route(config_path: &Path, address: Ipv4Addr) -> Result<(), String> {
    let (_, ctx) = load_context(config_path)?;

    if let Some(iface) = ctx.interface_with_ip(address) {
        println!("{} is local to {}", address, iface.name);
        return Ok(());
    }

    match ctx.routing_table().lookup(address) {
        Some(route) => {
            println!(
                "{} via {}/{} dev {}",
                address, route.destination, route.mask, route.interface
            );
            match route.next_hop {
                Some(gateway) => println!("  next hop {}", gateway),
                None => println!("  directly connected"),
            }
            println!("  resolve {}", route.resolution_target(address));
        }
        None => println!("{} unreachable", address),
    }
    Ok(())
}

fn cmd_show(config_path: &Path) -> Result<(), String> {
    let (cfg, ctx) = load_context(config_path)?;

    println!("Interfaces:");
    for iface in ctx.interfaces() {
        println!("  {:<8} {}  {}", iface.name, iface.mac_addr, iface.ip_addr);
    }

    println!("Routes:");
    for route in ctx.routing_table().routes() {
        let gateway = route
            .next_hop
            .map(|g| g.to_string())
            .unwrap_or_else(|| "direct".to_string());
        println!(
            "  {:<15} {:<15} {:<15} {}",
            route.destination, route.mask, gateway, route.interface
        );
    }

    let policy = cfg.arp.policy();
    println!(
        "ARP: cache {}s, retry {}s, {} requests, sweep {}ms",
        policy.cache_timeout.as_secs(),
        policy.retry_interval.as_secs(),
        policy.max_requests,
        cfg.arp.sweep_interval_ms
    );
    Ok(())
}

fn cmd_simulate(
    config_path: &Path,
    ingress: &str,
    src: Ipv4Addr,
    dst: Ipv4Addr,
    ttl: u8,
    neighbors: &[(Ipv4Addr, MacAddr)],
    linger: Duration,
) -> Result<(), String> {
    let (cfg, ctx) = load_context(config_path)?;
    let router_mac = ctx
        .interface(ingress)
        .map(|i| i.mac_addr)
        .ok_or_else(|| format!("interface {} not defined", ingress))?;

    let router = Arc::new(
        Router::new(ctx, RecordingTransmitter::new()).with_policy(cfg.arp.policy()),
    );
    for (ip, mac) in neighbors {
        router.arp().insert(*ip, *mac).map_err(|e| e.to_string())?;
    }

    let echo = icmp::build_echo(IcmpType::EchoRequest, 1, 1, b"ipfwd");
    let datagram = Ipv4Builder::new()
        .ttl(ttl)
        .protocol(Protocol::Icmp as u8)
        .src_addr(src)
        .dst_addr(dst)
        .payload(&echo)
        .build();
    let mut frame = FrameBuilder::new()
        .dst_mac(router_mac)
        .src_mac(MacAddr([0x02, 0, 0, 0, 0, 0xfe]))
        .ethertype(EtherType::Ipv4 as u16)
        .payload(&datagram)
        .build();

    let disposition = router
        .process(Frame::new(ingress, &mut frame))
        .map_err(|e| e.to_string())?;
    println!("{:?}", disposition);

    let rt = Runtime::new().map_err(|e| format!("Failed to create runtime: {}", e))?;
    rt.block_on(async {
        let mut maintenance = spawn_arp_maintenance(Arc::clone(&router), cfg.arp.sweep_interval());
        let ended = tokio::select! {
            _ = tokio::time::sleep(linger) => false,
            _ = &mut maintenance => true,
        };
        if ended {
            warn!("ARP maintenance ended early");
        } else {
            maintenance.abort();
        }
    });

    for sent in router.transmitter().sent() {
        println!("  {} {}", sent.interface, describe(&sent.data));
    }
    Ok(())
}

fn describe(frame: &[u8]) -> String {
    let Ok(eth) = EthernetHeader::parse(frame) else {
        return format!("{} bytes", frame.len());
    };
    let header = format!("{} > {}", eth.src_mac(), eth.dst_mac());

    match EtherType::from_u16(eth.ethertype()) {
        Some(EtherType::Arp) => format!("{} ARP", header),
        Some(EtherType::Ipv4) => match Ipv4Header::parse(eth.payload()) {
            Ok(ip) if ip.protocol() == Protocol::Icmp as u8 => {
                let kind = ip.payload().first().copied().unwrap_or_default();
                let code = ip.payload().get(1).copied().unwrap_or_default();
                format!(
                    "{} {} > {} ttl {} ICMP type {} code {}",
                    header,
                    ip.src_addr(),
                    ip.dst_addr(),
                    ip.ttl(),
                    kind,
                    code
                )
            }
            Ok(ip) => format!(
                "{} {} > {} ttl {} proto {}",
                header,
                ip.src_addr(),
                ip.dst_addr(),
                ip.ttl(),
                ip.protocol()
            ),
            Err(_) => format!("{} IPv4 (malformed)", header),
        },
        _ => format!("{} type 0x{:04x}", header, eth.ethertype()),
    }
}

fn parse_neighbor(s: &str) -> Result<(Ipv4Addr, MacAddr), String> {
    let (ip, mac) = s
        .split_once('=')
        .ok_or_else(|| format!("expected IP=MAC, got '{}'", s))?;
    let ip = ip.parse().map_err(|e| format!("{}: {}", ip, e))?;
    let mac = mac.parse().map_err(|e| format!("{}: {}", mac, e))?;
    Ok((ip, mac))
}
