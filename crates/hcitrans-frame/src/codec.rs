use bytes::{Buf, BufMut, Bytes, BytesMut};

use crate::detector::{PacketDetector, Progress};
use crate::packet::{HciPacket, PacketKind};

/// Append a framed packet to `dst`.
///
/// Wire format:
/// ```text
/// ┌──────────────┬──────────────────────────────┐
/// │ Marker (1B)  │ Packet (header + payload)    │
/// │ 0x01/02/04   │                              │
/// └──────────────┴──────────────────────────────┘
/// ```
pub fn encode_packet(kind: PacketKind, packet: &[u8], dst: &mut BytesMut) {
    dst.reserve(1 + packet.len());
    dst.put_u8(kind.marker());
    dst.put_slice(packet);
}

/// Run buffered bytes through `detector` until one packet completes.
///
/// Consumed bytes are removed from `src`. Returns `None` once `src` is
/// exhausted without a complete packet; the partial packet stays in the
/// detector for the next call.
pub fn decode_packet(detector: &mut PacketDetector, src: &mut BytesMut) -> Option<HciPacket> {
    while src.has_remaining() {
        if detector.process_byte(src.get_u8()) == Progress::Complete {
            let packet = detector
                .packet()
                .map(|(kind, bytes)| HciPacket::new(kind, Bytes::copy_from_slice(bytes)));
            detector.reset();
            return packet;
        }
    }
    None
}

#[cfg(feature = "async")]
pub use self::tokio_codec::HciCodec;

#[cfg(feature = "async")]
mod tokio_codec {
    use bytes::BytesMut;
    use tokio_util::codec::{Decoder, Encoder};

    use super::{decode_packet, encode_packet};
    use crate::config::ReceiverConfig;
    use crate::detector::PacketDetector;
    use crate::error::HcitError;
    use crate::packet::HciPacket;

    /// `tokio_util` codec for H4-framed HCI packets.
    #[derive(Debug)]
    pub struct HciCodec {
        detector: PacketDetector,
    }

    impl HciCodec {
        pub fn new(config: ReceiverConfig) -> Self {
            Self {
                detector: PacketDetector::new(config),
            }
        }
    }

    impl Default for HciCodec {
        fn default() -> Self {
            Self::new(ReceiverConfig::default())
        }
    }

    impl Decoder for HciCodec {
        type Item = HciPacket;
        type Error = HcitError;

        fn decode(&mut self, src: &mut BytesMut) -> Result<Option<HciPacket>, HcitError> {
            Ok(decode_packet(&mut self.detector, src))
        }
    }

    impl Encoder<HciPacket> for HciCodec {
        type Error = HcitError;

        fn encode(&mut self, item: HciPacket, dst: &mut BytesMut) -> Result<(), HcitError> {
            encode_packet(item.kind, &item.data, dst);
            Ok(())
        }
    }

}
