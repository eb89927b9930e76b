use std::sync::Arc;

use bytes::BytesMut;
use tracing::debug;

use crate::alloc::BufferAllocator;
use crate::error::{HcitError, HostError, Result};
use crate::packet::PacketKind;

/// The upper-layer receive entry point.
pub trait UpperLayer: Send {
    fn receive(&mut self, kind: PacketKind, packet: &[u8]) -> std::result::Result<(), HostError>;
}

impl<F> UpperLayer for F
where
    F: FnMut(PacketKind, &[u8]) -> std::result::Result<(), HostError> + Send,
{
    fn receive(&mut self, kind: PacketKind, packet: &[u8]) -> std::result::Result<(), HostError> {
        self(kind, packet)
    }
}

/// Forwards already-framed packets (marker + packet) to the upper layer.
///
/// Used when the transport pushes whole frames instead of single bytes.
pub struct DownwardHandoff<U> {
    upper: U,
    allocator: Arc<dyn BufferAllocator>,
}

impl<U: UpperLayer> DownwardHandoff<U> {
    pub fn new(upper: U, allocator: Arc<dyn BufferAllocator>) -> Self {
        Self { upper, allocator }
    }

    /// Validate the marker of `buffer` and pass the rest to the upper layer.
    ///
    /// Ownership of `buffer` moves into this call and it is released to the
    /// allocator before returning, whatever the outcome. The upper layer's
    /// result is returned as-is.
    pub fn hand_off(&mut self, buffer: BytesMut) -> Result<()> {
        let Some(&marker) = buffer.first() else {
            self.allocator.free(buffer);
            return Err(HcitError::EmptyPacket);
        };
        let Some(kind) = PacketKind::supported_from_marker(marker) else {
            debug!(marker, "rejecting framed packet with invalid marker");
            self.allocator.free(buffer);
            return Err(HcitError::InvalidMarker { marker });
        };

        let result = self.upper.receive(kind, &buffer[1..]);
        self.allocator.free(buffer);
        result.map_err(HcitError::Host)
    }

    pub fn upper(&self) -> &U {
        &self.upper
    }

    pub fn into_upper(self) -> U {
        self.upper
    }
}
