use crate::config::InterfaceType;

/// Errors that can occur in byte-transport operations.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// Failed to acquire the underlying channel.
    #[error("failed to open {interface} channel {channel:?}: {source}")]
    Open {
        interface: InterfaceType,
        channel: String,
        source: std::io::Error,
    },

    /// The interface type has no implementation in this build.
    #[error("interface type {0} is not supported by this build")]
    UnsupportedInterface(InterfaceType),

    /// No channel has been opened yet.
    #[error("channel is not open")]
    NotOpen,

    /// The channel refused to queue a write.
    #[error("write rejected: {0}")]
    WriteRejected(String),

    /// An I/O error occurred on the channel.
    #[error("transport I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The channel has been shut down.
    #[error("channel closed")]
    Closed,
}

pub type Result<T> = std::result::Result<T, TransportError>;
