use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use hcitrans_transport::{open_channel, SerialChannel, TransportError};
use tracing::{info, warn};

use crate::alloc::{BufferAllocator, HeapAllocator};
use crate::config::HcitConfig;
use crate::detector::DetectState;
use crate::error::{HcitError, Result};
use crate::framer::PacketFramer;
use crate::packet::PacketKind;
use crate::receiver::{PacketReceiver, PacketSink, ReceiverStats};

/// The HCI transport context.
///
/// Owns the byte-transport channel, the receive detector and the send framer.
/// Construct it with the upward packet sink, then [`init`](HciTransport::init)
/// exactly once.
pub struct HciTransport {
    sink: Option<Box<dyn PacketSink>>,
    framer: PacketFramer,
    link: Option<Link>,
}

struct Link {
    config: HcitConfig,
    channel: Box<dyn SerialChannel>,
    receiver: Arc<Mutex<PacketReceiver>>,
}

impl HciTransport {
    /// Transport that allocates outbound buffers from the heap.
    pub fn new(sink: impl PacketSink + 'static) -> Self {
        Self::with_allocator(sink, Arc::new(HeapAllocator))
    }

    pub fn with_allocator(
        sink: impl PacketSink + 'static,
        allocator: Arc<dyn BufferAllocator>,
    ) -> Self {
        Self {
            sink: Some(Box::new(sink)),
            framer: PacketFramer::new(allocator),
            link: None,
        }
    }

    /// Acquire the channel named by `config` and start receiving.
    pub fn init(&mut self, config: HcitConfig) -> Result<()> {
        self.ensure_uninitialized()?;
        let channel = open_channel(&config.serial)?;
        self.attach(config, channel)
    }

    /// Like [`init`](HciTransport::init), with a channel acquired by the caller.
    ///
    /// The configured baud rate is applied to `channel`.
    pub fn init_with_channel(
        &mut self,
        config: HcitConfig,
        channel: Box<dyn SerialChannel>,
    ) -> Result<()> {
        self.ensure_uninitialized()?;
        channel.set_baud_rate(config.serial.baud_rate)?;
        self.attach(config, channel)
    }

    fn ensure_uninitialized(&self) -> Result<()> {
        if self.link.is_some() {
            warn!("HCI transport init called twice");
            return Err(HcitError::AlreadyInitialized);
        }
        Ok(())
    }

    fn attach(&mut self, config: HcitConfig, channel: Box<dyn SerialChannel>) -> Result<()> {
        // Only reachable once; the sink is consumed by the first success.
        let Some(sink) = self.sink.take() else {
            return Err(HcitError::AlreadyInitialized);
        };

        let receiver = Arc::new(Mutex::new(PacketReceiver::with_boxed_sink(
            config.receiver,
            sink,
        )));
        let rx = Arc::clone(&receiver);
        channel.set_rx_callback(Box::new(move |bytes: &[u8]| {
            rx.lock().unwrap_or_else(PoisonError::into_inner).receive(bytes);
        }));

        info!(
            interface = %config.serial.interface_type,
            channel = %config.serial.interface_channel,
            baud_rate = config.serial.baud_rate,
            max_acl_payload = config.receiver.max_acl_payload,
            "HCI transport initialized"
        );
        self.link = Some(Link {
            config,
            channel,
            receiver,
        });
        Ok(())
    }

    /// Frame and queue one outbound packet.
    ///
    /// `packet` is header plus payload, without the marker.
    pub fn send_packet(&self, kind: PacketKind, packet: &[u8]) -> Result<()> {
        let link = self.link()?;
        self.framer.send(link.channel.as_ref(), kind, packet)
    }

    /// Feed bytes through the receive path as if they arrived on the channel.
    pub fn process_received(&self, bytes: &[u8]) -> Result<()> {
        let link = self.link()?;
        lock(&link.receiver).receive(bytes);
        Ok(())
    }

    fn link(&self) -> Result<&Link> {
        self.link
            .as_ref()
            .ok_or(HcitError::Transport(TransportError::NotOpen))
    }

    pub fn is_initialized(&self) -> bool {
        self.link.is_some()
    }

    pub fn receiver_state(&self) -> Option<DetectState> {
        self.link.as_ref().map(|link| lock(&link.receiver).state())
    }

    pub fn stats(&self) -> Option<ReceiverStats> {
        self.link.as_ref().map(|link| lock(&link.receiver).stats())
    }

    pub fn config(&self) -> Option<&HcitConfig> {
        self.link.as_ref().map(|link| &link.config)
    }

    pub fn channel(&self) -> Option<&dyn SerialChannel> {
        self.link.as_ref().map(|link| link.channel.as_ref())
    }

    pub fn framer(&self) -> &PacketFramer {
        &self.framer
    }
}

fn lock(receiver: &Mutex<PacketReceiver>) -> MutexGuard<'_, PacketReceiver> {
    receiver.lock().unwrap_or_else(PoisonError::into_inner)
}

impl std::fmt::Debug for HciTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HciTransport")
            .field("initialized", &self.is_initialized())
            .field("config", &self.config())
            .finish_non_exhaustive()
    }
}
