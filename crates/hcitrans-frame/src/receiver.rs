use tracing::debug;

use crate::config::ReceiverConfig;
use crate::detector::{DetectState, PacketDetector, Progress};
use crate::packet::PacketKind;

/// The upward consumer of completed packets.
///
/// Runs synchronously on the receive context. The slice is only valid for the
/// duration of the call; its storage is reused for the next packet.
pub trait PacketSink: Send {
    fn deliver(&mut self, kind: PacketKind, packet: &[u8]);
}

impl<F> PacketSink for F
where
    F: FnMut(PacketKind, &[u8]) + Send,
{
    fn deliver(&mut self, kind: PacketKind, packet: &[u8]) {
        self(kind, packet)
    }
}

/// Counters kept by a [`PacketReceiver`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReceiverStats {
    /// Packets handed to the sink.
    pub dispatched: u64,
    /// Bytes ignored while looking for a marker.
    pub discarded_bytes: u64,
    /// Packets abandoned because their header declared too much payload.
    pub dropped: u64,
}

/// Detector plus dispatcher: feeds bytes through a [`PacketDetector`] and
/// hands every completed packet to the sink.
pub struct PacketReceiver {
    detector: PacketDetector,
    sink: Box<dyn PacketSink>,
    stats: ReceiverStats,
}

impl PacketReceiver {
    pub fn new(config: ReceiverConfig, sink: impl PacketSink + 'static) -> Self {
        Self::with_boxed_sink(config, Box::new(sink))
    }

    pub fn with_boxed_sink(config: ReceiverConfig, sink: Box<dyn PacketSink>) -> Self {
        Self {
            detector: PacketDetector::new(config),
            sink,
            stats: ReceiverStats::default(),
        }
    }

    /// Process one drain cycle, byte by byte.
    pub fn receive(&mut self, bytes: &[u8]) {
        for &byte in bytes {
            self.receive_byte(byte);
        }
    }

    pub fn receive_byte(&mut self, byte: u8) {
        match self.detector.process_byte(byte) {
            Progress::Pending => {}
            Progress::Complete => self.dispatch(),
            Progress::Discarded => self.stats.discarded_bytes += 1,
            Progress::Dropped(_) => self.stats.dropped += 1,
        }
    }

    fn dispatch(&mut self) {
        if let Some((kind, packet)) = self.detector.packet() {
            debug!(%kind, len = packet.len(), "dispatching packet");
            self.sink.deliver(kind, packet);
            self.stats.dispatched += 1;
        }
        self.detector.reset();
    }

    pub fn state(&self) -> DetectState {
        self.detector.state()
    }

    pub fn detector(&self) -> &PacketDetector {
        &self.detector
    }

    pub fn stats(&self) -> ReceiverStats {
        self.stats
    }
}

impl std::fmt::Debug for PacketReceiver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PacketReceiver")
            .field("detector", &self.detector)
            .field("stats", &self.stats)
            .finish()
    }
}
