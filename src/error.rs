use std::io;
use std::net::Ipv4Addr;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("config error: {0}")]
    Config(String),

    #[error("parse error: {0}")]
    Parse(String),

    #[error("interface {name} not found")]
    InterfaceNotFound { name: String },

    #[error("invalid packet: {0}")]
    InvalidPacket(String),

    #[error("ARP request for {0} already pending")]
    PendingExists(Ipv4Addr),

    #[error("no pending ARP request for {0}")]
    PendingNotFound(Ipv4Addr),

    #[error("transmit on {interface} failed: {reason}")]
    Transmit { interface: String, reason: String },

    #[error("resource failure: {0}")]
    Resource(String),
}

impl Error {
    /// Fatal errors stop the router; everything else drops a single frame.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Error::Resource(_))
    }
}

pub type Result<T> = std::result::Result<T, Error>;
