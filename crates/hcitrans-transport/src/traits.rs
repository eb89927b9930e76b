use bytes::BytesMut;

use crate::config::InterfaceType;
use crate::error::{Result, TransportError};

/// Receives the bytes drained from a channel during one receive cycle.
///
/// Runs on the channel's receive context. Cycles never overlap.
pub type RxCallback = Box<dyn FnMut(&[u8]) + Send + 'static>;

/// Outcome of an accepted asynchronous write.
pub type WriteResult = std::result::Result<(), TransportError>;

/// Runs exactly once when an accepted write finishes, successfully or not.
///
/// The written buffer is handed back so the submitter can release it.
pub type WriteComplete = Box<dyn FnOnce(BytesMut, WriteResult) + Send + 'static>;

/// A write the channel refused to queue.
///
/// The buffer is returned to the caller; the completion handler has been dropped
/// without running.
#[derive(Debug)]
pub struct WriteRejected {
    pub error: TransportError,
    pub buffer: BytesMut,
}

/// A byte-transport channel.
///
/// Inbound bytes are pushed to the registered [`RxCallback`]; outbound buffers
/// are queued with [`async_write`](SerialChannel::async_write) and reported
/// through their completion handler.
pub trait SerialChannel: Send + Sync {
    /// Which interface type backs this channel.
    fn interface_type(&self) -> InterfaceType;

    /// Current baud rate.
    fn baud_rate(&self) -> u32;

    /// Change the line speed.
    fn set_baud_rate(&self, baud_rate: u32) -> Result<()>;

    /// Install the receive callback, replacing any previous one.
    fn set_rx_callback(&self, callback: RxCallback);

    /// Queue `buffer` for transmission.
    ///
    /// Returns as soon as the write is queued. On rejection the buffer comes
    /// back inside [`WriteRejected`] and `on_complete` never runs.
    fn async_write(
        &self,
        buffer: BytesMut,
        on_complete: WriteComplete,
    ) -> std::result::Result<(), WriteRejected>;
}
