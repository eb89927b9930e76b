use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use clap::{Args, Subcommand, ValueEnum};
use hcitrans_frame::{HciPacket, HcitConfig, PacketKind, ReceiverConfig};

use crate::exit::{io_error, CliError, CliResult, DATA_INVALID, USAGE};
use crate::output::OutputFormat;

pub mod decode;
pub mod encode;
pub mod monitor;
pub mod send;
pub mod version;

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Decode H4-framed bytes and print the packets found.
    Decode(DecodeArgs),
    /// Frame a packet and print the wire bytes.
    Encode(EncodeArgs),
    /// Open a serial port and print inbound packets.
    Monitor(MonitorArgs),
    /// Frame one packet and write it to a serial port.
    Send(SendArgs),
    /// Show version information.
    Version(VersionArgs),
}

pub fn run(command: Command, config: HcitConfig, format: OutputFormat) -> CliResult<i32> {
    match command {
        Command::Decode(args) => decode::run(args, config, format),
        Command::Encode(args) => encode::run(args, format),
        Command::Monitor(args) => monitor::run(args, config, format),
        Command::Send(args) => send::run(args, config, format),
        Command::Version(args) => version::run(args),
    }
}

/// Load `--config`, or defaults when absent.
pub fn load_config(path: Option<&Path>) -> CliResult<HcitConfig> {
    let Some(path) = path else {
        return Ok(HcitConfig::default());
    };
    let text = fs::read_to_string(path)
        .map_err(|err| io_error(&format!("failed reading {}", path.display()), err))?;
    serde_json::from_str(&text).map_err(|err| {
        CliError::new(
            DATA_INVALID,
            format!("invalid config {}: {err}", path.display()),
        )
    })
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
pub enum KindArg {
    Command,
    Acl,
    Event,
}

impl From<KindArg> for PacketKind {
    fn from(kind: KindArg) -> Self {
        match kind {
            KindArg::Command => PacketKind::Command,
            KindArg::Acl => PacketKind::AclData,
            KindArg::Event => PacketKind::Event,
        }
    }
}

/// Receive length limits that override the loaded config.
#[derive(Args, Debug, Default)]
pub struct LimitArgs {
    /// Drop ACL packets declaring more payload than this.
    #[arg(long, value_name = "BYTES")]
    pub max_acl_payload: Option<u16>,
    /// Drop Event packets declaring more payload than this.
    #[arg(long, value_name = "BYTES")]
    pub max_event_payload: Option<u8>,
}

impl LimitArgs {
    pub fn apply(&self, mut receiver: ReceiverConfig) -> ReceiverConfig {
        if let Some(max) = self.max_acl_payload {
            receiver = receiver.with_max_acl_payload(max);
        }
        if let Some(max) = self.max_event_payload {
            receiver = receiver.with_event_limit(max);
        }
        receiver
    }
}

/// Describes one outbound packet, either as raw hex or from header fields.
#[derive(Args, Debug)]
pub struct PacketArgs {
    /// Packet kind.
    pub kind: KindArg,
    /// Complete packet (header and payload, no marker) as hex.
    #[arg(conflicts_with_all = ["opcode", "event_code", "handle"])]
    pub packet: Option<String>,
    /// Command opcode (e.g. 0x0c03).
    #[arg(long)]
    pub opcode: Option<String>,
    /// Event code (e.g. 0x0e).
    #[arg(long)]
    pub event_code: Option<String>,
    /// ACL connection handle (12 bits).
    #[arg(long)]
    pub handle: Option<String>,
    /// ACL packet-boundary flag (0-3).
    #[arg(long, default_value_t = 0)]
    pub pb: u8,
    /// ACL broadcast flag (0-3).
    #[arg(long, default_value_t = 0)]
    pub bc: u8,
    /// Parameters or data as hex, placed behind the header built from the
    /// field options.
    #[arg(long, default_value = "")]
    pub params: String,
}

impl PacketArgs {
    pub fn build(&self) -> CliResult<HciPacket> {
        let kind = PacketKind::from(self.kind);
        if let Some(hex) = &self.packet {
            return checked_packet(kind, parse_hex("packet", hex)?);
        }

        let params = parse_hex("--params", &self.params)?;
        let too_long = || {
            CliError::new(
                DATA_INVALID,
                format!("{} bytes do not fit a {kind} length field", params.len()),
            )
        };
        match self.kind {
            KindArg::Command => {
                let opcode = parse_number("--opcode", required("--opcode", &self.opcode)?)?;
                HciPacket::command(opcode, &params).ok_or_else(too_long)
            }
            KindArg::Event => {
                let code = parse_number("--event-code", required("--event-code", &self.event_code)?)?;
                let code = u8::try_from(code)
                    .map_err(|_| CliError::new(USAGE, "--event-code must fit in one byte"))?;
                HciPacket::event(code, &params).ok_or_else(too_long)
            }
            KindArg::Acl => {
                let handle = parse_number("--handle", required("--handle", &self.handle)?)?;
                if handle > 0x0FFF {
                    return Err(CliError::new(USAGE, "--handle must fit in 12 bits"));
                }
                if self.pb > 3 || self.bc > 3 {
                    return Err(CliError::new(USAGE, "--pb and --bc must be 0-3"));
                }
                HciPacket::acl_data(handle, self.pb, self.bc, &params).ok_or_else(too_long)
            }
        }
    }
}

/// Accept a raw packet only if its header declares exactly its length.
fn checked_packet(kind: PacketKind, bytes: Vec<u8>) -> CliResult<HciPacket> {
    let packet = HciPacket::new(kind, bytes);
    let Some(header) = packet.header() else {
        return Err(CliError::new(
            DATA_INVALID,
            format!("{kind} packet shorter than its header"),
        ));
    };
    if header.expected_len() != packet.data.len() {
        return Err(CliError::new(
            DATA_INVALID,
            format!(
                "header declares {} bytes but packet has {}",
                header.expected_len(),
                packet.data.len()
            ),
        ));
    }
    Ok(packet)
}

fn required<'a>(flag: &str, value: &'a Option<String>) -> CliResult<&'a str> {
    value
        .as_deref()
        .ok_or_else(|| CliError::new(USAGE, format!("{flag} is required without a packet")))
}

/// Parse hex, ignoring whitespace, `:` separators and a `0x` prefix.
pub fn parse_hex(what: &str, input: &str) -> CliResult<Vec<u8>> {
    let input = input.trim();
    let input = input.strip_prefix("0x").unwrap_or(input);
    let digits: String = input
        .chars()
        .filter(|c| !c.is_whitespace() && *c != ':')
        .collect();
    hex::decode(&digits).map_err(|err| CliError::new(USAGE, format!("{what} is not valid hex: {err}")))
}

/// Parse a decimal or `0x`-prefixed hexadecimal u16.
pub fn parse_number(what: &str, input: &str) -> CliResult<u16> {
    let input = input.trim();
    let parsed = match input.strip_prefix("0x").or_else(|| input.strip_prefix("0X")) {
        Some(hex) => u16::from_str_radix(hex, 16),
        None => input.parse(),
    };
    parsed.map_err(|_| CliError::new(USAGE, format!("{what}: invalid number {input:?}")))
}

/// Parse `500ms`, `2s` or a bare number of seconds.
pub fn parse_duration(input: &str) -> CliResult<Duration> {
    let input = input.trim();
    let (number, millis) = match input.strip_suffix("ms") {
        Some(number) => (number, true),
        None => (input.strip_suffix('s').unwrap_or(input), false),
    };
    let value: u64 = number
        .parse()
        .map_err(|_| CliError::new(USAGE, format!("invalid duration: {input:?}")))?;
    if value == 0 {
        return Err(CliError::new(USAGE, "duration must be greater than zero"));
    }
    Ok(if millis {
        Duration::from_millis(value)
    } else {
        Duration::from_secs(value)
    })
}

#[derive(Args, Debug)]
pub struct DecodeArgs {
    /// Framed bytes as hex. Read from stdin when neither this nor --file is given.
    #[arg(conflicts_with = "file")]
    pub hex: Option<String>,
    /// Read raw framed bytes from a file.
    #[arg(long)]
    pub file: Option<PathBuf>,
    #[command(flatten)]
    pub limits: LimitArgs,
}

#[derive(Args, Debug)]
pub struct EncodeArgs {
    #[command(flatten)]
    pub packet: PacketArgs,
}

#[derive(Args, Debug)]
pub struct MonitorArgs {
    /// Serial device path.
    pub port: String,
    /// Baud rate. Defaults to the configured rate.
    #[arg(long)]
    pub baud: Option<u32>,
    /// Exit after printing N packets.
    #[arg(long)]
    pub count: Option<usize>,
    #[command(flatten)]
    pub limits: LimitArgs,
}

#[derive(Args, Debug)]
pub struct SendArgs {
    /// Serial device path.
    pub port: String,
    #[command(flatten)]
    pub packet: PacketArgs,
    /// Baud rate. Defaults to the configured rate.
    #[arg(long)]
    pub baud: Option<u32>,
    /// Wait for one inbound event and print it.
    #[arg(long)]
    pub wait: bool,
    /// Time allowed for the write and, with --wait, the response (e.g. 2s, 500ms).
    #[arg(long, default_value = "2s")]
    pub timeout: String,
}

#[derive(Args, Debug)]
pub struct VersionArgs {
    /// Show extended build provenance.
    #[arg(long)]
    pub extended: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn packet_args(kind: KindArg) -> PacketArgs {
        PacketArgs {
            kind,
            packet: None,
            opcode: None,
            event_code: None,
            handle: None,
            pb: 0,
            bc: 0,
            params: String::new(),
        }
    }

    #[test]
    fn parse_hex_accepts_common_spellings() {
        assert_eq!(parse_hex("x", "04 0e 00").unwrap(), vec![0x04, 0x0E, 0x00]);
        assert_eq!(parse_hex("x", "0x040E00").unwrap(), vec![0x04, 0x0E, 0x00]);
        assert_eq!(parse_hex("x", "04:0e:00").unwrap(), vec![0x04, 0x0E, 0x00]);
        assert!(parse_hex("x", "04 0").is_err());
        assert!(parse_hex("x", "zz").is_err());
    }

    #[test]
    fn parse_number_hex_and_decimal() {
        assert_eq!(parse_number("n", "0x0c03").unwrap(), 0x0C03);
        assert_eq!(parse_number("n", "64").unwrap(), 64);
        assert!(parse_number("n", "0x10000").is_err());
    }

    #[test]
    fn parse_duration_units() {
        assert_eq!(parse_duration("2s").unwrap(), Duration::from_secs(2));
        assert_eq!(parse_duration("150ms").unwrap(), Duration::from_millis(150));
        assert_eq!(parse_duration("3").unwrap(), Duration::from_secs(3));
        assert!(parse_duration("0ms").is_err());
        assert!(parse_duration("soon").is_err());
    }

    #[test]
    fn builds_command_from_fields() {
        let args = PacketArgs {
            opcode: Some("0x0c03".into()),
            ..packet_args(KindArg::Command)
        };
        let packet = args.build().unwrap();
        assert_eq!(packet.data.as_ref(), &[0x03, 0x0C, 0x00]);
    }

    #[test]
    fn builds_acl_from_fields() {
        let args = PacketArgs {
            handle: Some("0x001".into()),
            pb: 2,
            params: "aabb".into(),
            ..packet_args(KindArg::Acl)
        };
        let packet = args.build().unwrap();
        assert_eq!(packet.data.as_ref(), &[0x01, 0x20, 0x02, 0x00, 0xAA, 0xBB]);
    }

    #[test]
    fn raw_packet_length_must_match_header() {
        let args = PacketArgs {
            packet: Some("0e0401".into()),
            ..packet_args(KindArg::Event)
        };
        let err = args.build().unwrap_err();
        assert_eq!(err.code, DATA_INVALID);
    }

    #[test]
    fn missing_header_field_is_usage_error() {
        let err = packet_args(KindArg::Event).build().unwrap_err();
        assert_eq!(err.code, USAGE);
    }

    #[test]
    fn limits_override_config() {
        let limits = LimitArgs {
            max_acl_payload: Some(27),
            max_event_payload: Some(68),
        };
        let receiver = limits.apply(ReceiverConfig::default());
        assert_eq!(receiver.max_acl_payload, 27);
        assert_eq!(receiver.max_event_payload, Some(68));
    }

    #[test]
    fn missing_config_file_is_reported() {
        let err = load_config(Some(Path::new("/nonexistent/hcitrans.json"))).unwrap_err();
        assert!(err.message.contains("failed reading"));
    }
}
