//! Packet catalog: HCI packet kinds and their header shapes.
//!
//! Every framed packet on the UART starts with a one-byte type marker,
//! followed by a kind-specific header and a payload whose length the header
//! declares. All multi-byte fields are little-endian.
//!
//! ```text
//! Command   [0x01][opcode u16][param_len u8][params...]
//! ACL data  [0x02][handle:12 pb:2 bc:2 u16][data_len u16][data...]
//! Event     [0x04][event_code u8][param_len u8][params...]
//! ```
//!
//! The marker byte is never part of a header or of a dispatched packet.

use std::fmt;

use bytes::{BufMut, Bytes, BytesMut};
use serde::{Deserialize, Serialize};

/// Command header: opcode (2) + parameter total length (1).
pub const COMMAND_HEADER_LEN: usize = 3;

/// ACL data header: handle/flags (2) + data total length (2).
pub const ACL_DATA_HEADER_LEN: usize = 4;

/// Event header: event code (1) + parameter total length (1).
pub const EVENT_HEADER_LEN: usize = 2;

/// Largest header of any supported kind.
pub const MAX_HEADER_LEN: usize = ACL_DATA_HEADER_LEN;

/// Largest payload a one-byte length field can declare.
pub const MAX_SHORT_PAYLOAD_LEN: usize = u8::MAX as usize;

const ACL_HANDLE_MASK: u16 = 0x0FFF;
const ACL_FLAG_MASK: u16 = 0x0003;
const ACL_PB_SHIFT: u16 = 12;
const ACL_BC_SHIFT: u16 = 14;

/// Packet type, as carried in the marker byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[repr(u8)]
pub enum PacketKind {
    Command = 0x01,
    AclData = 0x02,
    /// Recognized marker, but no framing is defined for it here.
    SynchronousData = 0x03,
    Event = 0x04,
}

impl PacketKind {
    /// Every kind the framing engine can assemble.
    pub const SUPPORTED: [PacketKind; 3] =
        [PacketKind::Command, PacketKind::AclData, PacketKind::Event];

    /// The marker byte for this kind.
    pub const fn marker(self) -> u8 {
        self as u8
    }

    /// Look up the kind for a marker byte.
    pub const fn from_marker(marker: u8) -> Option<Self> {
        match marker {
            0x01 => Some(PacketKind::Command),
            0x02 => Some(PacketKind::AclData),
            0x03 => Some(PacketKind::SynchronousData),
            0x04 => Some(PacketKind::Event),
            _ => None,
        }
    }

    /// Look up a kind the framing engine can assemble. Synchronous data and
    /// unknown markers yield `None`.
    pub const fn supported_from_marker(marker: u8) -> Option<Self> {
        match Self::from_marker(marker) {
            Some(kind) if kind.is_supported() => Some(kind),
            _ => None,
        }
    }

    pub const fn is_supported(self) -> bool {
        !matches!(self, PacketKind::SynchronousData)
    }

    /// Header size in bytes, excluding the marker.
    pub const fn header_len(self) -> Option<usize> {
        match self {
            PacketKind::Command => Some(COMMAND_HEADER_LEN),
            PacketKind::AclData => Some(ACL_DATA_HEADER_LEN),
            PacketKind::Event => Some(EVENT_HEADER_LEN),
            PacketKind::SynchronousData => None,
        }
    }

    pub const fn name(self) -> &'static str {
        match self {
            PacketKind::Command => "COMMAND",
            PacketKind::AclData => "ACL_DATA",
            PacketKind::SynchronousData => "SYNC_DATA",
            PacketKind::Event => "EVENT",
        }
    }
}

impl TryFrom<u8> for PacketKind {
    type Error = u8;

    fn try_from(marker: u8) -> std::result::Result<Self, Self::Error> {
        Self::from_marker(marker).ok_or(marker)
    }
}

impl fmt::Display for PacketKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// HCI command header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CommandHeader {
    pub opcode: u16,
    pub parameter_total_length: u8,
}

impl CommandHeader {
    /// Opcode group field (upper 6 bits).
    pub fn ogf(&self) -> u8 {
        (self.opcode >> 10) as u8
    }

    /// Opcode command field (lower 10 bits).
    pub fn ocf(&self) -> u16 {
        self.opcode & 0x03FF
    }
}

/// HCI ACL data header. The first field packs the 12-bit connection handle
/// with the packet-boundary and broadcast flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AclDataHeader {
    pub handle: u16,
    pub packet_boundary: u8,
    pub broadcast: u8,
    pub data_total_length: u16,
}

impl AclDataHeader {
    /// Split a packed handle/flags field.
    pub fn from_packed(handle_and_flags: u16, data_total_length: u16) -> Self {
        Self {
            handle: handle_and_flags & ACL_HANDLE_MASK,
            packet_boundary: ((handle_and_flags >> ACL_PB_SHIFT) & ACL_FLAG_MASK) as u8,
            broadcast: ((handle_and_flags >> ACL_BC_SHIFT) & ACL_FLAG_MASK) as u8,
            data_total_length,
        }
    }

    /// The packed handle/flags field as sent on the wire.
    pub fn packed(&self) -> u16 {
        (self.handle & ACL_HANDLE_MASK)
            | ((u16::from(self.packet_boundary) & ACL_FLAG_MASK) << ACL_PB_SHIFT)
            | ((u16::from(self.broadcast) & ACL_FLAG_MASK) << ACL_BC_SHIFT)
    }
}

/// HCI event header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EventHeader {
    pub event_code: u8,
    pub data_total_length: u8,
}

/// A parsed header of one of the supported kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PacketHeader {
    Command(CommandHeader),
    AclData(AclDataHeader),
    Event(EventHeader),
}

impl PacketHeader {
    /// Parse the header of `kind` from the start of `bytes` (marker excluded).
    ///
    /// Returns `None` for synchronous data or when `bytes` is shorter than the
    /// header.
    pub fn parse(kind: PacketKind, bytes: &[u8]) -> Option<Self> {
        let header_len = kind.header_len()?;
        let bytes = bytes.get(..header_len)?;
        let header = match kind {
            PacketKind::Command => PacketHeader::Command(CommandHeader {
                opcode: u16::from_le_bytes([bytes[0], bytes[1]]),
                parameter_total_length: bytes[2],
            }),
            PacketKind::AclData => PacketHeader::AclData(AclDataHeader::from_packed(
                u16::from_le_bytes([bytes[0], bytes[1]]),
                u16::from_le_bytes([bytes[2], bytes[3]]),
            )),
            PacketKind::Event => PacketHeader::Event(EventHeader {
                event_code: bytes[0],
                data_total_length: bytes[1],
            }),
            PacketKind::SynchronousData => return None,
        };
        Some(header)
    }

    pub fn kind(&self) -> PacketKind {
        match self {
            PacketHeader::Command(_) => PacketKind::Command,
            PacketHeader::AclData(_) => PacketKind::AclData,
            PacketHeader::Event(_) => PacketKind::Event,
        }
    }

    pub fn header_len(&self) -> usize {
        match self {
            PacketHeader::Command(_) => COMMAND_HEADER_LEN,
            PacketHeader::AclData(_) => ACL_DATA_HEADER_LEN,
            PacketHeader::Event(_) => EVENT_HEADER_LEN,
        }
    }

    /// Payload length declared by the header.
    pub fn payload_len(&self) -> usize {
        match self {
            PacketHeader::Command(h) => usize::from(h.parameter_total_length),
            PacketHeader::AclData(h) => usize::from(h.data_total_length),
            PacketHeader::Event(h) => usize::from(h.data_total_length),
        }
    }

    /// Header plus payload: the size of the marker-free packet.
    pub fn expected_len(&self) -> usize {
        self.header_len() + self.payload_len()
    }

    /// Append the wire encoding of this header (marker excluded).
    pub fn write_to(&self, dst: &mut BytesMut) {
        dst.reserve(self.header_len());
        match self {
            PacketHeader::Command(h) => {
                dst.put_u16_le(h.opcode);
                dst.put_u8(h.parameter_total_length);
            }
            PacketHeader::AclData(h) => {
                dst.put_u16_le(h.packed());
                dst.put_u16_le(h.data_total_length);
            }
            PacketHeader::Event(h) => {
                dst.put_u8(h.event_code);
                dst.put_u8(h.data_total_length);
            }
        }
    }
}

/// An owned, marker-free packet: header followed by payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HciPacket {
    pub kind: PacketKind,
    pub data: Bytes,
}

impl HciPacket {
    pub fn new(kind: PacketKind, data: impl Into<Bytes>) -> Self {
        Self {
            kind,
            data: data.into(),
        }
    }

    /// Build a command packet. `None` if the parameters exceed 255 bytes.
    pub fn command(opcode: u16, parameters: &[u8]) -> Option<Self> {
        let header = PacketHeader::Command(CommandHeader {
            opcode,
            parameter_total_length: u8::try_from(parameters.len()).ok()?,
        });
        Some(Self::assemble(header, parameters))
    }

    /// Build an ACL data packet. `None` if the data exceeds 65535 bytes.
    pub fn acl_data(handle: u16, packet_boundary: u8, broadcast: u8, data: &[u8]) -> Option<Self> {
        let header = PacketHeader::AclData(AclDataHeader {
            handle,
            packet_boundary,
            broadcast,
            data_total_length: u16::try_from(data.len()).ok()?,
        });
        Some(Self::assemble(header, data))
    }

    /// Build an event packet. `None` if the parameters exceed 255 bytes.
    pub fn event(event_code: u8, parameters: &[u8]) -> Option<Self> {
        let header = PacketHeader::Event(EventHeader {
            event_code,
            data_total_length: u8::try_from(parameters.len()).ok()?,
        });
        Some(Self::assemble(header, parameters))
    }

    fn assemble(header: PacketHeader, payload: &[u8]) -> Self {
        let mut data = BytesMut::with_capacity(header.header_len() + payload.len());
        header.write_to(&mut data);
        data.put_slice(payload);
        Self::new(header.kind(), data.freeze())
    }

    /// Parsed header, if the kind has one and enough bytes are present.
    pub fn header(&self) -> Option<PacketHeader> {
        PacketHeader::parse(self.kind, &self.data)
    }

    /// Bytes following the header.
    pub fn payload(&self) -> &[u8] {
        let header_len = self.kind.header_len().unwrap_or(0);
        self.data.get(header_len..).unwrap_or_default()
    }

    /// Size on the wire, marker included.
    pub fn wire_size(&self) -> usize {
        1 + self.data.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn marker_lookup() {
        assert_eq!(PacketKind::from_marker(0x01), Some(PacketKind::Command));
        assert_eq!(PacketKind::from_marker(0x02), Some(PacketKind::AclData));
        assert_eq!(
            PacketKind::from_marker(0x03),
            Some(PacketKind::SynchronousData)
        );
        assert_eq!(PacketKind::from_marker(0x04), Some(PacketKind::Event));
        assert_eq!(PacketKind::from_marker(0x00), None);
        assert_eq!(PacketKind::from_marker(0x05), None);
        assert_eq!(PacketKind::try_from(0xFF), Err(0xFF));
    }

    #[test]
    fn synchronous_data_is_not_supported() {
        assert!(!PacketKind::SynchronousData.is_supported());
        assert_eq!(PacketKind::supported_from_marker(0x03), None);
        assert_eq!(PacketKind::SynchronousData.header_len(), None);
        assert!(PacketHeader::parse(PacketKind::SynchronousData, &[0; 8]).is_none());
    }

    #[test]
    fn command_header_little_endian() {
        let header = PacketHeader::parse(PacketKind::Command, &[0x03, 0x0C, 0x00]).unwrap();
        let PacketHeader::Command(cmd) = header else {
            panic!("expected command header");
        };
        assert_eq!(cmd.opcode, 0x0C03);
        assert_eq!(cmd.ogf(), 0x03);
        assert_eq!(cmd.ocf(), 0x003);
        assert_eq!(header.expected_len(), 3);
    }

    #[test]
    fn acl_header_unpacks_handle_and_flags() {
        // handle 0x0040, pb = 0b10, bc = 0b01, length 0x001B
        let header =
            PacketHeader::parse(PacketKind::AclData, &[0x40, 0x60, 0x1B, 0x00]).unwrap();
        let PacketHeader::AclData(acl) = header else {
            panic!("expected ACL header");
        };
        assert_eq!(acl.handle, 0x0040);
        assert_eq!(acl.packet_boundary, 0b10);
        assert_eq!(acl.broadcast, 0b01);
        assert_eq!(acl.data_total_length, 0x1B);
        assert_eq!(acl.packed(), 0x6040);
        assert_eq!(header.expected_len(), 4 + 0x1B);
    }

    #[test]
    fn event_header() {
        let header = PacketHeader::parse(PacketKind::Event, &[0x0E, 0x04]).unwrap();
        assert_eq!(
            header,
            PacketHeader::Event(EventHeader {
                event_code: 0x0E,
                data_total_length: 4
            })
        );
        assert_eq!(header.payload_len(), 4);
    }

    #[test]
    fn short_header_does_not_parse() {
        assert!(PacketHeader::parse(PacketKind::AclData, &[0x01, 0x02, 0x03]).is_none());
    }

    #[test]
    fn header_write_matches_parse() {
        let header = PacketHeader::AclData(AclDataHeader {
            handle: 0x0ABC,
            packet_boundary: 2,
            broadcast: 0,
            data_total_length: 300,
        });
        let mut buf = BytesMut::new();
        header.write_to(&mut buf);
        assert_eq!(buf.as_ref(), &[0xBC, 0x2A, 0x2C, 0x01]);
        assert_eq!(PacketHeader::parse(PacketKind::AclData, &buf), Some(header));
    }

    #[test]
    fn packet_builders() {
        let reset = HciPacket::command(0x0C03, &[]).unwrap();
        assert_eq!(reset.data.as_ref(), &[0x03, 0x0C, 0x00]);
        assert!(reset.payload().is_empty());
        assert_eq!(reset.wire_size(), 4);

        let event = HciPacket::event(0x0E, &[0x01, 0x03, 0x0C, 0x00]).unwrap();
        assert_eq!(event.payload(), &[0x01, 0x03, 0x0C, 0x00]);
        assert_eq!(event.header().unwrap().payload_len(), 4);

        assert!(HciPacket::command(0x0001, &[0u8; 256]).is_none());
    }

    #[test]
    fn kind_names() {
        assert_eq!(PacketKind::AclData.to_string(), "ACL_DATA");
        assert_eq!(PacketKind::Event.marker(), 0x04);
    }
}
