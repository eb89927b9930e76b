use hcitrans_transport::SerialConfig;
use serde::{Deserialize, Serialize};

use crate::packet::{
    ACL_DATA_HEADER_LEN, COMMAND_HEADER_LEN, EVENT_HEADER_LEN, MAX_SHORT_PAYLOAD_LEN,
};

/// Default maximum ACL payload: the LE limit with data length extension.
pub const DEFAULT_MAX_ACL_PAYLOAD: u16 = 251;

/// Length limits applied by the receive detector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReceiverConfig {
    /// ACL headers declaring more payload than this are dropped.
    pub max_acl_payload: u16,
    /// Event headers declaring more payload than this are dropped.
    /// `None` disables the check.
    pub max_event_payload: Option<u8>,
}

impl ReceiverConfig {
    /// Enable the event length check.
    pub fn with_event_limit(mut self, max_event_payload: u8) -> Self {
        self.max_event_payload = Some(max_event_payload);
        self
    }

    pub fn with_max_acl_payload(mut self, max_acl_payload: u16) -> Self {
        self.max_acl_payload = max_acl_payload;
        self
    }

    /// Size of the full-size packet region: the largest marker-free packet
    /// these limits admit.
    pub fn packet_capacity(&self) -> usize {
        let command = COMMAND_HEADER_LEN + MAX_SHORT_PAYLOAD_LEN;
        let event = EVENT_HEADER_LEN
            + self
                .max_event_payload
                .map_or(MAX_SHORT_PAYLOAD_LEN, usize::from);
        let acl = ACL_DATA_HEADER_LEN + usize::from(self.max_acl_payload);
        command.max(event).max(acl)
    }
}

impl Default for ReceiverConfig {
    fn default() -> Self {
        Self {
            max_acl_payload: DEFAULT_MAX_ACL_PAYLOAD,
            max_event_payload: None,
        }
    }
}

/// Everything the transport needs at initialization.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HcitConfig {
    pub serial: SerialConfig,
    pub receiver: ReceiverConfig,
}

impl HcitConfig {
    pub fn new(serial: SerialConfig, receiver: ReceiverConfig) -> Self {
        Self { serial, receiver }
    }
}

#[cfg(test)]
mod tests {
    use hcitrans_transport::InterfaceType;

    use super::*;

    #[test]
    fn default_capacity_fits_largest_short_packet() {
        let config = ReceiverConfig::default();
        assert_eq!(config.max_event_payload, None);
        assert_eq!(config.packet_capacity(), COMMAND_HEADER_LEN + 255);
    }

    #[test]
    fn capacity_grows_with_acl_limit() {
        let config = ReceiverConfig::default().with_max_acl_payload(1021);
        assert_eq!(config.packet_capacity(), ACL_DATA_HEADER_LEN + 1021);
    }

    #[test]
    fn config_from_json_fills_defaults() {
        let config: HcitConfig = serde_json::from_str(
            r#"{
                "serial": { "interface_type": "uart", "interface_channel": "/dev/ttyUSB0" },
                "receiver": { "max_event_payload": 64 }
            }"#,
        )
        .unwrap();

        assert_eq!(config.serial.interface_type, InterfaceType::Uart);
        assert_eq!(config.serial.baud_rate, hcitrans_transport::DEFAULT_BAUD_RATE);
        assert_eq!(config.receiver.max_acl_payload, DEFAULT_MAX_ACL_PAYLOAD);
        assert_eq!(config.receiver.max_event_payload, Some(64));
    }
}
