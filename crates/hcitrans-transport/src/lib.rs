//! Byte-transport channel abstraction for HCI UART links.
//!
//! This is the lowest layer of hcitrans. A [`SerialChannel`] delivers inbound
//! bytes to a registered callback in drain cycles and accepts outbound buffers
//! for asynchronous transmission. Implementations:
//! - [`MemoryChannel`]: in-process channel for tests and offline decoding
//! - `SerialPortChannel`: a real UART device (behind the `serial` feature)

pub mod config;
pub mod error;
pub mod memory;
pub mod traits;

#[cfg(feature = "serial")]
pub mod serial;

pub use config::{InterfaceType, SerialConfig, DEFAULT_BAUD_RATE};
pub use error::{Result, TransportError};
pub use memory::MemoryChannel;
pub use traits::{RxCallback, SerialChannel, WriteComplete, WriteRejected, WriteResult};

#[cfg(feature = "serial")]
pub use serial::SerialPortChannel;

/// Acquire the channel selected by `config` and apply its baud rate.
///
/// `Uart` needs the `serial` feature; without it the call fails with
/// [`TransportError::UnsupportedInterface`].
pub fn open_channel(config: &SerialConfig) -> Result<Box<dyn SerialChannel>> {
    let channel: Box<dyn SerialChannel> = match config.interface_type {
        InterfaceType::Memory => Box::new(MemoryChannel::new()),
        #[cfg(feature = "serial")]
        InterfaceType::Uart => Box::new(SerialPortChannel::open(
            &config.interface_channel,
            config.baud_rate,
        )?),
        #[cfg(not(feature = "serial"))]
        InterfaceType::Uart => {
            return Err(TransportError::UnsupportedInterface(InterfaceType::Uart))
        }
    };
    channel.set_baud_rate(config.baud_rate)?;
    tracing::debug!(
        interface = %config.interface_type,
        channel = %config.interface_channel,
        baud_rate = config.baud_rate,
        "byte-transport channel opened"
    );
    Ok(channel)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn opens_memory_channel_with_configured_baud() {
        let config = SerialConfig {
            baud_rate: 921_600,
            ..SerialConfig::memory()
        };
        let channel = open_channel(&config).unwrap();
        assert_eq!(channel.interface_type(), InterfaceType::Memory);
        assert_eq!(channel.baud_rate(), 921_600);
    }

    #[test]
    #[cfg(not(feature = "serial"))]
    fn uart_requires_serial_feature() {
        let err = open_channel(&SerialConfig::uart("/dev/ttyACM0", 115_200))
            .err()
            .unwrap();
        assert!(matches!(
            err,
            TransportError::UnsupportedInterface(InterfaceType::Uart)
        ));
    }

    #[test]
    #[cfg(feature = "serial")]
    fn uart_open_failure_is_reported() {
        let err = open_channel(&SerialConfig::uart("/dev/hcitrans-does-not-exist", 115_200))
            .err()
            .unwrap();
        assert!(matches!(err, TransportError::Open { .. }));
    }
}
