//! HCI UART (H4) packet framing for a BLE host stack.
//!
//! Every packet on the wire is one marker byte followed by an HCI packet:
//! - `0x01` Command: opcode (u16 LE) + parameter length (u8)
//! - `0x02` ACL data: handle/flags (u16 LE) + data length (u16 LE)
//! - `0x04` Event: event code (u8) + parameter length (u8)
//!
//! Inbound bytes are reassembled by a [`PacketDetector`] and dispatched by a
//! [`PacketReceiver`]. Outbound packets are framed by a [`PacketFramer`].
//! [`HciTransport`] ties both to a byte-transport channel.

pub mod alloc;
pub mod codec;
pub mod config;
pub mod detector;
pub mod error;
pub mod framer;
pub mod handoff;
pub mod packet;
pub mod receiver;
pub mod transport;

pub use alloc::{BufferAllocator, HeapAllocator, PoolAllocator, PoolStats};
#[cfg(feature = "async")]
pub use codec::HciCodec;
pub use codec::{decode_packet, encode_packet};
pub use config::{HcitConfig, ReceiverConfig, DEFAULT_MAX_ACL_PAYLOAD};
pub use detector::{DetectState, DropReason, PacketDetector, Progress};
pub use error::{ErrorKind, HcitError, HostError, Result};
pub use framer::PacketFramer;
pub use handoff::{DownwardHandoff, UpperLayer};
pub use packet::{
    AclDataHeader, CommandHeader, EventHeader, HciPacket, PacketHeader, PacketKind,
    ACL_DATA_HEADER_LEN, COMMAND_HEADER_LEN, EVENT_HEADER_LEN, MAX_HEADER_LEN,
};
pub use receiver::{PacketReceiver, PacketSink, ReceiverStats};
pub use transport::HciTransport;
