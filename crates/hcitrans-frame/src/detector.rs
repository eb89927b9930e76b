//! Byte-driven packet detector.
//!
//! One packet is assembled at a time. The marker and header accumulate in a
//! small scratch region; once the header is complete and the total length is
//! known, the header moves to the full-size region and the payload lands
//! directly behind it.
//!
//! ```text
//!   DetectMarker --marker--> DetectHeader --header done--> PacketInProgress
//!        ^  |                     |                              |
//!        |  +--other byte         +--length over limit           |
//!        |     (discarded)           (dropped)                   |
//!        +-------------------------------------------------------+
//!                          packet complete, reset
//! ```

use tracing::{debug, trace};

use crate::config::ReceiverConfig;
use crate::packet::{PacketHeader, PacketKind, MAX_HEADER_LEN};

/// Detector state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DetectState {
    DetectMarker,
    DetectHeader,
    PacketInProgress,
}

/// Why a packet was abandoned after its header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DropReason {
    AclTooLong { declared: u16, max: u16 },
    EventTooLong { declared: u8, max: u8 },
}

/// What a single byte did to the detector.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Progress {
    /// Not a supported marker; ignored.
    Discarded,
    /// Consumed; the packet is not complete yet.
    Pending,
    /// The header declared an inadmissible length. The detector is back at
    /// `DetectMarker`.
    Dropped(DropReason),
    /// The packet is complete and readable through [`PacketDetector::packet`]
    /// until [`PacketDetector::reset`] or the next byte.
    Complete,
}

/// The in-flight reception context.
pub struct PacketDetector {
    config: ReceiverConfig,
    state: DetectState,
    kind: Option<PacketKind>,
    bytes_received: usize,
    expected_len: Option<usize>,
    /// Marker at index 0, header bytes behind it.
    scratch: [u8; 1 + MAX_HEADER_LEN],
    /// Marker-free header and payload.
    packet: Box<[u8]>,
}

impl PacketDetector {
    pub fn new(config: ReceiverConfig) -> Self {
        Self {
            config,
            state: DetectState::DetectMarker,
            kind: None,
            bytes_received: 0,
            expected_len: None,
            scratch: [0; 1 + MAX_HEADER_LEN],
            packet: vec![0u8; config.packet_capacity()].into_boxed_slice(),
        }
    }

    /// Feed one byte.
    pub fn process_byte(&mut self, byte: u8) -> Progress {
        if self.is_complete() {
            // The previous packet was never collected.
            self.reset();
        }

        match self.state {
            DetectState::DetectMarker => self.detect_marker(byte),
            DetectState::DetectHeader => self.detect_header(byte),
            DetectState::PacketInProgress => self.accumulate(byte),
        }
    }

    fn detect_marker(&mut self, byte: u8) -> Progress {
        let Some(kind) = PacketKind::supported_from_marker(byte) else {
            trace!(byte, "discarding byte outside packet");
            return Progress::Discarded;
        };

        self.kind = Some(kind);
        self.scratch[0] = byte;
        self.bytes_received = 1;
        self.expected_len = None;
        self.state = DetectState::DetectHeader;
        Progress::Pending
    }

    fn detect_header(&mut self, byte: u8) -> Progress {
        let Some((kind, header_len)) = self.kind.and_then(|k| Some((k, k.header_len()?))) else {
            self.reset();
            return Progress::Discarded;
        };

        self.scratch[self.bytes_received] = byte;
        self.bytes_received += 1;
        if self.bytes_received < 1 + header_len {
            return Progress::Pending;
        }

        let Some(header) = PacketHeader::parse(kind, &self.scratch[1..]) else {
            self.reset();
            return Progress::Discarded;
        };

        if let Some(reason) = self.over_limit(&header) {
            debug!(?reason, "dropping packet with oversized header");
            self.reset();
            return Progress::Dropped(reason);
        }

        self.expected_len = Some(header.expected_len());
        self.state = DetectState::PacketInProgress;

        // The marker stays behind in the scratch region.
        self.packet[..header_len].copy_from_slice(&self.scratch[1..=header_len]);
        self.bytes_received -= 1;

        if self.is_complete() {
            Progress::Complete
        } else {
            Progress::Pending
        }
    }

    fn accumulate(&mut self, byte: u8) -> Progress {
        self.packet[self.bytes_received] = byte;
        self.bytes_received += 1;
        if self.is_complete() {
            Progress::Complete
        } else {
            Progress::Pending
        }
    }

    fn over_limit(&self, header: &PacketHeader) -> Option<DropReason> {
        match header {
            PacketHeader::AclData(acl) if acl.data_total_length > self.config.max_acl_payload => {
                Some(DropReason::AclTooLong {
                    declared: acl.data_total_length,
                    max: self.config.max_acl_payload,
                })
            }
            PacketHeader::Event(event) => match self.config.max_event_payload {
                Some(max) if event.data_total_length > max => Some(DropReason::EventTooLong {
                    declared: event.data_total_length,
                    max,
                }),
                _ => None,
            },
            _ => None,
        }
    }

    /// Return to `DetectMarker`, discarding any partial packet.
    pub fn reset(&mut self) {
        self.state = DetectState::DetectMarker;
        self.kind = None;
        self.bytes_received = 0;
        self.expected_len = None;
    }

    /// The completed packet, marker-free.
    pub fn packet(&self) -> Option<(PacketKind, &[u8])> {
        if !self.is_complete() {
            return None;
        }
        let kind = self.kind?;
        Some((kind, &self.packet[..self.bytes_received]))
    }

    pub fn is_complete(&self) -> bool {
        self.state == DetectState::PacketInProgress
            && self.expected_len == Some(self.bytes_received)
    }

    pub fn state(&self) -> DetectState {
        self.state
    }

    /// Kind of the packet in flight.
    pub fn kind(&self) -> Option<PacketKind> {
        self.kind
    }

    /// Bytes counted so far. Includes the marker while in `DetectHeader`.
    pub fn bytes_received(&self) -> usize {
        self.bytes_received
    }

    /// Marker-free packet length, known once the header is complete.
    pub fn expected_len(&self) -> Option<usize> {
        self.expected_len
    }

    /// Size of the full-size packet region.
    pub fn capacity(&self) -> usize {
        self.packet.len()
    }

    pub fn config(&self) -> &ReceiverConfig {
        &self.config
    }
}

impl std::fmt::Debug for PacketDetector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PacketDetector")
            .field("state", &self.state)
            .field("kind", &self.kind)
            .field("bytes_received", &self.bytes_received)
            .field("expected_len", &self.expected_len)
            .field("capacity", &self.packet.len())
            .finish()
    }
}
