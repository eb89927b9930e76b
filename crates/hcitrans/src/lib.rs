//! HCI UART (H4) transport framing for BLE host stacks.
//!
//! # Crate Structure
//!
//! - [`transport`]: byte-transport channel abstraction (memory, serial port)
//! - [`frame`]: packet catalog, receive detector, send framer and lifecycle
//!
//! ```
//! use std::sync::{Arc, Mutex};
//!
//! use hcitrans::frame::{HciTransport, HcitConfig, PacketKind};
//! use hcitrans::transport::MemoryChannel;
//!
//! let seen = Arc::new(Mutex::new(Vec::new()));
//! let sink = Arc::clone(&seen);
//! let mut hci = HciTransport::new(move |kind: PacketKind, packet: &[u8]| {
//!     sink.lock().unwrap().push((kind, packet.to_vec()));
//! });
//!
//! let channel = MemoryChannel::new();
//! hci.init_with_channel(HcitConfig::default(), Box::new(channel.clone()))
//!     .unwrap();
//! channel.inject(&[0x04, 0x0E, 0x00]);
//!
//! assert_eq!(seen.lock().unwrap()[0], (PacketKind::Event, vec![0x0E, 0x00]));
//! ```

/// Re-export transport types.
pub mod transport {
    pub use hcitrans_transport::*;
}

/// Re-export frame types.
pub mod frame {
    pub use hcitrans_frame::*;
}
