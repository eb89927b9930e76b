use std::fmt;
use std::io;

use hcitrans_frame::HcitError;
use hcitrans_transport::TransportError;

// Exit codes.
pub const SUCCESS: i32 = 0;
pub const FAILURE: i32 = 1;
pub const TRANSPORT_ERROR: i32 = 3;
pub const PERMISSION_DENIED: i32 = 50;
pub const DATA_INVALID: i32 = 60;
pub const USAGE: i32 = 64;
pub const TIMEOUT: i32 = 124;
pub const INTERNAL: i32 = 125;

pub type CliResult<T> = Result<T, CliError>;

#[derive(Debug)]
pub struct CliError {
    pub code: i32,
    pub message: String,
}

impl CliError {
    pub fn new(code: i32, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for CliError {}

pub fn io_error(context: &str, err: io::Error) -> CliError {
    let code = match err.kind() {
        io::ErrorKind::PermissionDenied => PERMISSION_DENIED,
        io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock => TIMEOUT,
        io::ErrorKind::NotFound => TRANSPORT_ERROR,
        _ => INTERNAL,
    };
    CliError::new(code, format!("{context}: {err}"))
}

pub fn transport_error(context: &str, err: TransportError) -> CliError {
    match err {
        TransportError::Open { source, .. } if source.kind() == io::ErrorKind::PermissionDenied => {
            CliError::new(PERMISSION_DENIED, format!("{context}: {source}"))
        }
        TransportError::Io(source) => io_error(context, source),
        other => CliError::new(TRANSPORT_ERROR, format!("{context}: {other}")),
    }
}

pub fn hcit_error(context: &str, err: HcitError) -> CliError {
    match err {
        HcitError::Transport(err) => transport_error(context, err),
        HcitError::InvalidMarker { .. } | HcitError::EmptyPacket => {
            CliError::new(DATA_INVALID, format!("{context}: {err}"))
        }
        HcitError::OutOfMemory { .. } | HcitError::Host(_) => {
            CliError::new(FAILURE, format!("{context}: {err}"))
        }
        HcitError::AlreadyInitialized => CliError::new(INTERNAL, format!("{context}: {err}")),
    }
}

#[cfg(test)]
mod tests {
    use hcitrans_transport::InterfaceType;

    use super::*;

    #[test]
    fn open_permission_denied_maps_to_permission_code() {
        let err = TransportError::Open {
            interface: InterfaceType::Uart,
            channel: "/dev/ttyS0".into(),
            source: io::Error::from(io::ErrorKind::PermissionDenied),
        };
        assert_eq!(transport_error("open", err).code, PERMISSION_DENIED);
    }

    #[test]
    fn unsupported_interface_is_transport_error() {
        let err = hcit_error(
            "init",
            HcitError::Transport(TransportError::UnsupportedInterface(InterfaceType::Uart)),
        );
        assert_eq!(err.code, TRANSPORT_ERROR);
        assert!(err.message.starts_with("init: "));
    }

    #[test]
    fn marker_errors_are_data_invalid() {
        assert_eq!(
            hcit_error("decode", HcitError::InvalidMarker { marker: 0x09 }).code,
            DATA_INVALID
        );
    }
}
