//! IPv4 protocol - RFC 791

use crate::{Error, Result};
use std::net::Ipv4Addr;

/// Minimum IPv4 header size (without options)
pub const MIN_HEADER_SIZE: usize = 20;

/// TTL given to datagrams this router originates
pub const DEFAULT_TTL: u8 = 64;

/// IPv4 protocol numbers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Protocol {
    Icmp = 1,
    Tcp = 6,
    Udp = 17,
}

impl Protocol {
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            1 => Some(Protocol::Icmp),
            6 => Some(Protocol::Tcp),
            17 => Some(Protocol::Udp),
            _ => None,
        }
    }
}

/// Validate version and IHL and return the header length in bytes
fn header_len_of(buffer: &[u8]) -> Result<usize> {
    if buffer.len() < MIN_HEADER_SIZE {
        return Err(Error::Parse("IPv4 header too short".into()));
    }

    if buffer[0] >> 4 != 4 {
        return Err(Error::Parse("not an IPv4 packet".into()));
    }

    let header_len = (buffer[0] & 0x0F) as usize * 4;
    if header_len < MIN_HEADER_SIZE {
        return Err(Error::Parse("IPv4 IHL below minimum".into()));
    }
    if buffer.len() < header_len {
        return Err(Error::Parse("IPv4 header truncated".into()));
    }

    Ok(header_len)
}

/// Parsed IPv4 header (zero-copy reference)
#[derive(Debug)]
pub struct Ipv4Header<'a> {
    buffer: &'a [u8],
    header_len: usize,
}

impl<'a> Ipv4Header<'a> {
    pub fn parse(buffer: &'a [u8]) -> Result<Self> {
        let header_len = header_len_of(buffer)?;
        Ok(Self { buffer, header_len })
    }

    pub fn total_length(&self) -> u16 {
        u16::from_be_bytes([self.buffer[2], self.buffer[3]])
    }

    pub fn ttl(&self) -> u8 {
        self.buffer[8]
    }

    pub fn protocol(&self) -> u8 {
        self.buffer[9]
    }

    pub fn checksum(&self) -> u16 {
        u16::from_be_bytes([self.buffer[10], self.buffer[11]])
    }

    pub fn src_addr(&self) -> Ipv4Addr {
        Ipv4Addr::new(
            self.buffer[12],
            self.buffer[13],
            self.buffer[14],
            self.buffer[15],
        )
    }

    pub fn dst_addr(&self) -> Ipv4Addr {
        Ipv4Addr::new(
            self.buffer[16],
            self.buffer[17],
            self.buffer[18],
            self.buffer[19],
        )
    }

    pub fn header_len(&self) -> usize {
        self.header_len
    }

    /// Bytes following the header, clipped to the advertised total length
    pub fn payload(&self) -> &'a [u8] {
        let end = (self.total_length() as usize)
            .min(self.buffer.len())
            .max(self.header_len);
        &self.buffer[self.header_len..end]
    }

    /// Validate header checksum
    pub fn validate_checksum(&self) -> bool {
        checksum(self.as_bytes()) == 0
    }

    /// Raw header bytes, options included
    pub fn as_bytes(&self) -> &'a [u8] {
        &self.buffer[..self.header_len]
    }
}

/// Mutable IPv4 header view over a frame buffer
///
/// Writes land directly in the underlying buffer.
#[derive(Debug)]
pub struct Ipv4HeaderMut<'a> {
    buffer: &'a mut [u8],
    header_len: usize,
}

impl<'a> Ipv4HeaderMut<'a> {
    pub fn parse(buffer: &'a mut [u8]) -> Result<Self> {
        let header_len = header_len_of(buffer)?;
        Ok(Self { buffer, header_len })
    }

    pub fn ttl(&self) -> u8 {
        self.buffer[8]
    }

    /// Decrement TTL by one and rewrite the header checksum
    ///
    /// Returns false, leaving the header untouched, if TTL is already 0.
    pub fn decrement_ttl(&mut self) -> bool {
        if self.buffer[8] == 0 {
            return false;
        }
        self.buffer[8] -= 1;
        self.update_checksum();
        true
    }

    /// Recalculate and update header checksum
    pub fn update_checksum(&mut self) {
        self.buffer[10] = 0;
        self.buffer[11] = 0;

        let sum = checksum(&self.buffer[..self.header_len]);
        self.buffer[10..12].copy_from_slice(&sum.to_be_bytes());
    }
}

/// Internet checksum (RFC 1071) over an arbitrary byte slice
///
/// Odd-length input is padded with a trailing zero byte.
pub fn checksum(data: &[u8]) -> u16 {
    let mut sum: u32 = 0;

    let mut words = data.chunks_exact(2);
    for word in &mut words {
        sum = sum.wrapping_add(u16::from_be_bytes([word[0], word[1]]) as u32);
    }
    if let [last] = words.remainder() {
        sum = sum.wrapping_add(u16::from_be_bytes([*last, 0]) as u32);
    }

    while sum >> 16 != 0 {
        sum = (sum & 0xFFFF) + (sum >> 16);
    }

    !(sum as u16)
}

/// Builder for IPv4 datagrams originated by the router
#[derive(Debug, Clone)]
pub struct Ipv4Builder {
    identification: u16,
    dont_fragment: bool,
    ttl: u8,
    protocol: u8,
    src_addr: Ipv4Addr,
    dst_addr: Ipv4Addr,
    payload: Vec<u8>,
}

impl Ipv4Builder {
    pub fn new() -> Self {
        Self {
            identification: 0,
            dont_fragment: true,
            ttl: DEFAULT_TTL,
            protocol: 0,
            src_addr: Ipv4Addr::UNSPECIFIED,
            dst_addr: Ipv4Addr::UNSPECIFIED,
            payload: Vec::new(),
        }
    }

    pub fn identification(mut self, id: u16) -> Self {
        self.identification = id;
        self
    }

    pub fn dont_fragment(mut self, df: bool) -> Self {
        self.dont_fragment = df;
        self
    }

    pub fn ttl(mut self, ttl: u8) -> Self {
        self.ttl = ttl;
        self
    }

    pub fn protocol(mut self, protocol: u8) -> Self {
        self.protocol = protocol;
        self
    }

    pub fn src_addr(mut self, addr: Ipv4Addr) -> Self {
        self.src_addr = addr;
        self
    }

    pub fn dst_addr(mut self, addr: Ipv4Addr) -> Self {
        self.dst_addr = addr;
        self
    }

    pub fn payload(mut self, payload: &[u8]) -> Self {
        self.payload = payload.to_vec();
        self
    }

    pub fn build(self) -> Vec<u8> {
        let total_length = (MIN_HEADER_SIZE + self.payload.len()) as u16;
        let mut buffer = vec![0u8; MIN_HEADER_SIZE + self.payload.len()];

        // Version 4, IHL 5
        buffer[0] = 0x45;
        buffer[2..4].copy_from_slice(&total_length.to_be_bytes());
        buffer[4..6].copy_from_slice(&self.identification.to_be_bytes());
        if self.dont_fragment {
            buffer[6..8].copy_from_slice(&0x4000u16.to_be_bytes());
        }
        buffer[8] = self.ttl;
        buffer[9] = self.protocol;
        buffer[12..16].copy_from_slice(&self.src_addr.octets());
        buffer[16..20].copy_from_slice(&self.dst_addr.octets());
        buffer[MIN_HEADER_SIZE..].copy_from_slice(&self.payload);

        let sum = checksum(&buffer[..MIN_HEADER_SIZE]);
        buffer[10..12].copy_from_slice(&sum.to_be_bytes());

        buffer
    }
}

impl Default for Ipv4Builder {
    fn default() -> Self {
        Self::new()
    }
}
