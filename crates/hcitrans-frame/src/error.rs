use hcitrans_transport::TransportError;

/// Failure reported by the upper-layer receive entry point.
pub type HostError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Coarse classification of [`HcitError`] values.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    AlreadyInitialized,
    Transport,
    OutOfMemory,
    /// The upper layer's own failure, passed through unchanged.
    Host,
}

/// Errors returned by the HCI transport operations.
#[derive(Debug, thiserror::Error)]
pub enum HcitError {
    /// `init` was called on a transport that is already running.
    #[error("HCI transport already initialized")]
    AlreadyInitialized,

    /// Channel acquisition or write submission failed.
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),

    /// The allocator could not provide an outbound buffer.
    #[error("out of memory allocating {requested} byte packet buffer")]
    OutOfMemory { requested: usize },

    /// A framed buffer started with a byte that is not a supported packet type.
    #[error("invalid packet type marker 0x{marker:02X}")]
    InvalidMarker { marker: u8 },

    /// A framed buffer had no marker byte at all.
    #[error("empty packet buffer")]
    EmptyPacket,

    /// The upper-layer receive entry point failed.
    #[error("upper layer rejected packet: {0}")]
    Host(#[source] HostError),
}

impl HcitError {
    /// Classify this error. Marker problems on a framed buffer count as
    /// transport errors.
    pub fn kind(&self) -> ErrorKind {
        match self {
            HcitError::AlreadyInitialized => ErrorKind::AlreadyInitialized,
            HcitError::Transport(_) | HcitError::InvalidMarker { .. } | HcitError::EmptyPacket => {
                ErrorKind::Transport
            }
            HcitError::OutOfMemory { .. } => ErrorKind::OutOfMemory,
            HcitError::Host(_) => ErrorKind::Host,
        }
    }
}

impl From<std::io::Error> for HcitError {
    fn from(err: std::io::Error) -> Self {
        HcitError::Transport(TransportError::Io(err))
    }
}

pub type Result<T> = std::result::Result<T, HcitError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn marker_errors_classify_as_transport() {
        assert_eq!(
            HcitError::InvalidMarker { marker: 0x07 }.kind(),
            ErrorKind::Transport
        );
        assert_eq!(HcitError::EmptyPacket.kind(), ErrorKind::Transport);
        assert_eq!(
            HcitError::from(TransportError::NotOpen).kind(),
            ErrorKind::Transport
        );
    }

    #[test]
    fn display_includes_marker_in_hex() {
        let err = HcitError::InvalidMarker { marker: 0x3C };
        assert_eq!(err.to_string(), "invalid packet type marker 0x3C");
    }

    #[test]
    fn host_error_keeps_source() {
        let err = HcitError::Host("link busy".into());
        assert_eq!(err.kind(), ErrorKind::Host);
        assert!(std::error::Error::source(&err).is_some());
    }
}
