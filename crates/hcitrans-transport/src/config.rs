use std::fmt;

use serde::{Deserialize, Serialize};

/// Default UART baud rate for HCI links.
pub const DEFAULT_BAUD_RATE: u32 = 115_200;

/// Kind of byte-transport behind a channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InterfaceType {
    /// A UART device. The interface channel is the device path.
    Uart,
    /// An in-process channel. The interface channel is informational only.
    Memory,
}

impl fmt::Display for InterfaceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InterfaceType::Uart => f.write_str("uart"),
            InterfaceType::Memory => f.write_str("memory"),
        }
    }
}

/// Interface, channel and baud selection for a byte-transport channel.
///
/// Supplied once at initialization; channels are not reconfigured afterwards
/// except through [`SerialChannel::set_baud_rate`](crate::SerialChannel::set_baud_rate).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SerialConfig {
    pub interface_type: InterfaceType,
    pub interface_channel: String,
    pub baud_rate: u32,
}

impl SerialConfig {
    /// A UART device at `path`.
    pub fn uart(path: impl Into<String>, baud_rate: u32) -> Self {
        Self {
            interface_type: InterfaceType::Uart,
            interface_channel: path.into(),
            baud_rate,
        }
    }

    /// An in-process channel.
    pub fn memory() -> Self {
        Self {
            interface_type: InterfaceType::Memory,
            interface_channel: String::from("memory"),
            baud_rate: DEFAULT_BAUD_RATE,
        }
    }
}

impl Default for SerialConfig {
    fn default() -> Self {
        Self::memory()
    }
}
