//! Ethernet II header views and frame construction

use super::MacAddr;
use crate::{Error, Result};

/// Ethernet II header size (no VLAN tag, no FCS)
pub const HEADER_SIZE: usize = 14;

/// Read-only view of the Ethernet header at the start of a frame
#[derive(Debug)]
pub struct EthernetHeader<'a> {
    buffer: &'a [u8],
}

impl<'a> EthernetHeader<'a> {
    pub fn parse(buffer: &'a [u8]) -> Result<Self> {
        if buffer.len() < HEADER_SIZE {
            return Err(Error::Parse("frame too short".into()));
        }
        Ok(Self { buffer })
    }

    pub fn dst_mac(&self) -> MacAddr {
        mac_at(self.buffer, 0)
    }

    pub fn src_mac(&self) -> MacAddr {
        mac_at(self.buffer, 6)
    }

    pub fn ethertype(&self) -> u16 {
        u16::from_be_bytes([self.buffer[12], self.buffer[13]])
    }

    pub fn payload(&self) -> &'a [u8] {
        &self.buffer[HEADER_SIZE..]
    }
}

/// Mutable view used to rewrite link addresses in place
#[derive(Debug)]
pub struct EthernetHeaderMut<'a> {
    buffer: &'a mut [u8],
}

impl<'a> EthernetHeaderMut<'a> {
    pub fn parse(buffer: &'a mut [u8]) -> Result<Self> {
        if buffer.len() < HEADER_SIZE {
            return Err(Error::Parse("frame too short".into()));
        }
        Ok(Self { buffer })
    }

    pub fn set_dst_mac(&mut self, mac: MacAddr) {
        self.buffer[0..6].copy_from_slice(&mac.0);
    }

    pub fn set_src_mac(&mut self, mac: MacAddr) {
        self.buffer[6..12].copy_from_slice(&mac.0);
    }

    pub fn payload_mut(&mut self) -> &mut [u8] {
        &mut self.buffer[HEADER_SIZE..]
    }
}

fn mac_at(buffer: &[u8], offset: usize) -> MacAddr {
    let mut mac = [0u8; 6];
    mac.copy_from_slice(&buffer[offset..offset + 6]);
    MacAddr(mac)
}

/// Builder for outbound Ethernet frames
pub struct FrameBuilder {
    dst_mac: MacAddr,
    src_mac: MacAddr,
    ethertype: u16,
    payload: Vec<u8>,
}

impl FrameBuilder {
    pub fn new() -> Self {
        Self {
            dst_mac: MacAddr::ZERO,
            src_mac: MacAddr::ZERO,
            ethertype: 0,
            payload: Vec::new(),
        }
    }

    pub fn dst_mac(mut self, mac: MacAddr) -> Self {
        self.dst_mac = mac;
        self
    }

    pub fn src_mac(mut self, mac: MacAddr) -> Self {
        self.src_mac = mac;
        self
    }

    pub fn ethertype(mut self, ethertype: u16) -> Self {
        self.ethertype = ethertype;
        self
    }

    pub fn payload(mut self, payload: &[u8]) -> Self {
        self.payload = payload.to_vec();
        self
    }

    pub fn build(self) -> Vec<u8> {
        let mut frame = Vec::with_capacity(HEADER_SIZE + self.payload.len());
        frame.extend_from_slice(&self.dst_mac.0);
        frame.extend_from_slice(&self.src_mac.0);
        frame.extend_from_slice(&self.ethertype.to_be_bytes());
        frame.extend_from_slice(&self.payload);
        frame
    }
}

impl Default for FrameBuilder {
    fn default() -> Self {
        Self::new()
    }
}
