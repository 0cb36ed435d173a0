//! ICMP (Internet Control Message Protocol) - RFC 792

use super::ipv4::checksum;
use crate::{Error, Result};

/// ICMP header size (type, code, checksum, rest-of-header)
pub const ICMP_HEADER_SIZE: usize = 8;

/// Bytes of the offending datagram's payload quoted in error messages
pub const QUOTED_PAYLOAD_LEN: usize = 8;

/// ICMP message types
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum IcmpType {
    EchoReply = 0,
    DestinationUnreachable = 3,
    EchoRequest = 8,
    TimeExceeded = 11,
}

impl IcmpType {
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(IcmpType::EchoReply),
            3 => Some(IcmpType::DestinationUnreachable),
            8 => Some(IcmpType::EchoRequest),
            11 => Some(IcmpType::TimeExceeded),
            _ => None,
        }
    }
}

/// Destination Unreachable codes
pub mod dest_unreachable {
    pub const NET_UNREACHABLE: u8 = 0;
    pub const HOST_UNREACHABLE: u8 = 1;
    pub const PROTOCOL_UNREACHABLE: u8 = 2;
    pub const PORT_UNREACHABLE: u8 = 3;
}

/// Time Exceeded codes
pub mod time_exceeded {
    /// TTL exceeded in transit
    pub const TTL_EXCEEDED: u8 = 0;
}

/// Parsed ICMP message
#[derive(Debug)]
pub struct IcmpPacket<'a> {
    buffer: &'a [u8],
}

impl<'a> IcmpPacket<'a> {
    pub fn parse(buffer: &'a [u8]) -> Result<Self> {
        if buffer.len() < ICMP_HEADER_SIZE {
            return Err(Error::Parse("ICMP packet too short".into()));
        }

        Ok(Self { buffer })
    }

    pub fn icmp_type(&self) -> u8 {
        self.buffer[0]
    }

    pub fn code(&self) -> u8 {
        self.buffer[1]
    }

    pub fn checksum(&self) -> u16 {
        u16::from_be_bytes([self.buffer[2], self.buffer[3]])
    }

    /// For Echo Request/Reply: identifier
    pub fn identifier(&self) -> u16 {
        u16::from_be_bytes([self.buffer[4], self.buffer[5]])
    }

    /// For Echo Request/Reply: sequence number
    pub fn sequence(&self) -> u16 {
        u16::from_be_bytes([self.buffer[6], self.buffer[7]])
    }

    pub fn payload(&self) -> &'a [u8] {
        &self.buffer[ICMP_HEADER_SIZE..]
    }

    pub fn validate_checksum(&self) -> bool {
        checksum(self.buffer) == 0
    }

    pub fn is_echo_request(&self) -> bool {
        self.icmp_type() == IcmpType::EchoRequest as u8
    }
}

/// Build an Echo Request or Echo Reply message
pub fn build_echo(icmp_type: IcmpType, identifier: u16, sequence: u16, payload: &[u8]) -> Vec<u8> {
    let mut packet = vec![0u8; ICMP_HEADER_SIZE + payload.len()];

    packet[0] = icmp_type as u8;
    packet[4..6].copy_from_slice(&identifier.to_be_bytes());
    packet[6..8].copy_from_slice(&sequence.to_be_bytes());
    packet[ICMP_HEADER_SIZE..].copy_from_slice(payload);

    let sum = checksum(&packet);
    packet[2..4].copy_from_slice(&sum.to_be_bytes());

    packet
}

/// Build a Destination Unreachable or Time Exceeded message
///
/// The body quotes `original_header` in full followed by at most the first
/// eight bytes of `original_payload`. The rest-of-header word is zero.
pub fn build_error(
    icmp_type: IcmpType,
    code: u8,
    original_header: &[u8],
    original_payload: &[u8],
) -> Vec<u8> {
    let quoted = original_payload.len().min(QUOTED_PAYLOAD_LEN);
    let mut packet = Vec::with_capacity(ICMP_HEADER_SIZE + original_header.len() + quoted);

    packet.extend_from_slice(&[icmp_type as u8, code, 0, 0, 0, 0, 0, 0]);
    packet.extend_from_slice(original_header);
    packet.extend_from_slice(&original_payload[..quoted]);

    let sum = checksum(&packet);
    packet[2..4].copy_from_slice(&sum.to_be_bytes());

    packet
}
