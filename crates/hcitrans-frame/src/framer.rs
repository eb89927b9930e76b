use std::sync::Arc;

use bytes::BytesMut;
use hcitrans_transport::{SerialChannel, WriteComplete, WriteRejected, WriteResult};
use tracing::{trace, warn};

use crate::alloc::BufferAllocator;
use crate::codec::encode_packet;
use crate::error::{HcitError, Result};
use crate::packet::PacketKind;

/// Builds outbound framed buffers and submits them to a channel.
///
/// Each buffer is owned by the framer from allocation until the channel
/// reports completion, then released to the allocator exactly once.
#[derive(Clone)]
pub struct PacketFramer {
    allocator: Arc<dyn BufferAllocator>,
}

impl PacketFramer {
    pub fn new(allocator: Arc<dyn BufferAllocator>) -> Self {
        Self { allocator }
    }

    /// Frame `packet` behind the marker for `kind` and queue it on `channel`.
    ///
    /// Returns once the write is queued. Completion, and the release of the
    /// buffer, happen later on the channel's write context. Nothing is retried.
    pub fn send(&self, channel: &dyn SerialChannel, kind: PacketKind, packet: &[u8]) -> Result<()> {
        let size = 1 + packet.len();
        let Some(mut buffer) = self.allocator.alloc(size) else {
            return Err(HcitError::OutOfMemory { requested: size });
        };
        buffer.clear();
        encode_packet(kind, packet, &mut buffer);

        let allocator = Arc::clone(&self.allocator);
        let on_complete: WriteComplete = Box::new(move |buffer: BytesMut, result: WriteResult| {
            match result {
                Ok(()) => trace!(len = buffer.len(), "packet written"),
                Err(err) => warn!(error = %err, len = buffer.len(), "packet write failed"),
            }
            allocator.free(buffer);
        });

        match channel.async_write(buffer, on_complete) {
            Ok(()) => Ok(()),
            Err(WriteRejected { error, buffer }) => {
                warn!(error = %error, %kind, "write submission rejected");
                self.allocator.free(buffer);
                Err(HcitError::Transport(error))
            }
        }
    }

    pub fn allocator(&self) -> &Arc<dyn BufferAllocator> {
        &self.allocator
    }
}

impl std::fmt::Debug for PacketFramer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PacketFramer").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use hcitrans_transport::{MemoryChannel, TransportError};

    use super::*;
    use crate::alloc::{HeapAllocator, PoolAllocator};

    #[test]
    fn frames_marker_then_packet() {
        let channel = MemoryChannel::new();
        let framer = PacketFramer::new(Arc::new(HeapAllocator));

        framer
            .send(&channel, PacketKind::Command, &[0x03, 0x0C, 0x00])
            .unwrap();
        assert_eq!(channel.pending_writes(), 1);

        channel.complete_writes();
        assert_eq!(channel.take_written(), vec![0x01, 0x03, 0x0C, 0x00]);
    }

    #[test]
    fn buffer_released_only_on_completion() {
        let pool = Arc::new(PoolAllocator::new(64, 4));
        let channel = MemoryChannel::new();
        let framer = PacketFramer::new(pool.clone());

        framer.send(&channel, PacketKind::Event, &[0x0E, 0x00]).unwrap();
        assert_eq!(pool.outstanding(), 1);

        channel.complete_writes();
        assert_eq!(pool.outstanding(), 0);
        assert_eq!(pool.stats().frees, 1);
    }

    #[test]
    fn buffer_released_on_failed_completion() {
        let pool = Arc::new(PoolAllocator::new(64, 4));
        let channel = MemoryChannel::new();
        let framer = PacketFramer::new(pool.clone());

        framer.send(&channel, PacketKind::AclData, &[0x01, 0x00, 0x00, 0x00]).unwrap();
        channel.fail_writes();
        assert_eq!(pool.outstanding(), 0);
        assert_eq!(pool.stats().frees, 1);
    }

    #[test]
    fn rejected_submission_releases_and_reports_transport_error() {
        let pool = Arc::new(PoolAllocator::new(64, 4));
        let channel = MemoryChannel::new();
        channel.reject_writes(true);
        let framer = PacketFramer::new(pool.clone());

        let err = framer
            .send(&channel, PacketKind::Event, &[0x0E, 0x00])
            .unwrap_err();
        assert!(matches!(
            err,
            HcitError::Transport(TransportError::WriteRejected(_))
        ));
        assert_eq!(pool.outstanding(), 0);
        assert_eq!(pool.stats().frees, 1);
        assert_eq!(channel.pending_writes(), 0);
    }

    #[test]
    fn allocation_failure_is_out_of_memory() {
        let pool = Arc::new(PoolAllocator::new(64, 0));
        let channel = MemoryChannel::new();
        let framer = PacketFramer::new(pool.clone());

        let err = framer
            .send(&channel, PacketKind::Event, &[0x01, 0x02])
            .unwrap_err();
        assert!(matches!(err, HcitError::OutOfMemory { requested: 3 }));
        assert_eq!(channel.pending_writes(), 0);
        assert_eq!(pool.stats().frees, 0);
    }
}
