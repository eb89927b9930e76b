use std::io::{IsTerminal, Write};
use std::time::{SystemTime, UNIX_EPOCH};

use clap::ValueEnum;
use comfy_table::{presets::UTF8_FULL, ContentArrangement, Table};
use hcitrans_frame::{HciPacket, PacketHeader, PacketKind};
use serde::Serialize;

#[derive(Clone, Debug, Copy, ValueEnum)]
pub enum OutputFormat {
    Json,
    Table,
    Pretty,
    Raw,
}

impl OutputFormat {
    pub fn default_for_stdout() -> Self {
        if std::io::stdout().is_terminal() {
            Self::Table
        } else {
            Self::Json
        }
    }
}

#[derive(Serialize)]
#[serde(untagged)]
enum HeaderOutput {
    Command {
        opcode: u16,
        ogf: u8,
        ocf: u16,
        parameter_total_length: u8,
    },
    AclData {
        handle: u16,
        packet_boundary: u8,
        broadcast: u8,
        data_total_length: u16,
    },
    Event {
        event_code: u8,
        parameter_total_length: u8,
    },
}

impl From<PacketHeader> for HeaderOutput {
    fn from(header: PacketHeader) -> Self {
        match header {
            PacketHeader::Command(h) => HeaderOutput::Command {
                opcode: h.opcode,
                ogf: h.ogf(),
                ocf: h.ocf(),
                parameter_total_length: h.parameter_total_length,
            },
            PacketHeader::AclData(h) => HeaderOutput::AclData {
                handle: h.handle,
                packet_boundary: h.packet_boundary,
                broadcast: h.broadcast,
                data_total_length: h.data_total_length,
            },
            PacketHeader::Event(h) => HeaderOutput::Event {
                event_code: h.event_code,
                parameter_total_length: h.data_total_length,
            },
        }
    }
}

#[derive(Serialize)]
struct PacketOutput<'a> {
    kind: PacketKind,
    marker: u8,
    size: usize,
    header: Option<HeaderOutput>,
    payload: String,
    source: &'a str,
    timestamp: String,
}

/// Print one packet. `source` names where it came from (file, port, argv).
pub fn print_packet(packet: &HciPacket, source: &str, format: OutputFormat) {
    match format {
        OutputFormat::Json => {
            let out = PacketOutput {
                kind: packet.kind,
                marker: packet.kind.marker(),
                size: packet.data.len(),
                header: packet.header().map(HeaderOutput::from),
                payload: hex::encode(packet.payload()),
                source,
                timestamp: now_unix_seconds(),
            };
            println!(
                "{}",
                serde_json::to_string(&out).unwrap_or_else(|_| "{}".to_string())
            );
        }
        OutputFormat::Table => {
            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .set_content_arrangement(ContentArrangement::Dynamic)
                .set_header(vec!["KIND", "SIZE", "HEADER", "PAYLOAD"])
                .add_row(vec![
                    packet.kind.to_string(),
                    packet.data.len().to_string(),
                    describe_header(packet),
                    payload_preview(packet.payload()),
                ]);
            println!("{table}");
        }
        OutputFormat::Pretty => {
            println!(
                "{} size={} {} payload={}",
                packet.kind,
                packet.data.len(),
                describe_header(packet),
                payload_preview(packet.payload())
            );
        }
        OutputFormat::Raw => {
            let mut framed = Vec::with_capacity(packet.wire_size());
            framed.push(packet.kind.marker());
            framed.extend_from_slice(&packet.data);
            print_raw(&framed);
        }
    }
}

pub fn print_raw(data: &[u8]) {
    let mut out = std::io::stdout();
    let _ = out.write_all(data);
    let _ = out.flush();
}

pub fn describe_header(packet: &HciPacket) -> String {
    match packet.header() {
        Some(PacketHeader::Command(h)) => format!(
            "opcode=0x{:04X} (ogf=0x{:02X} ocf=0x{:03X}) plen={}",
            h.opcode,
            h.ogf(),
            h.ocf(),
            h.parameter_total_length
        ),
        Some(PacketHeader::AclData(h)) => format!(
            "handle=0x{:03X} pb={} bc={} dlen={}",
            h.handle, h.packet_boundary, h.broadcast, h.data_total_length
        ),
        Some(PacketHeader::Event(h)) => {
            format!("event=0x{:02X} plen={}", h.event_code, h.data_total_length)
        }
        None => "<truncated header>".to_string(),
    }
}

fn payload_preview(payload: &[u8]) -> String {
    const PREVIEW_LEN: usize = 32;
    if payload.len() <= PREVIEW_LEN {
        return hex::encode(payload);
    }
    format!(
        "{}… ({} bytes)",
        hex::encode(&payload[..PREVIEW_LEN]),
        payload.len()
    )
}

fn now_unix_seconds() -> String {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs().to_string())
        .unwrap_or_else(|_| "0".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn describes_command_header() {
        let packet = HciPacket::command(0x0C03, &[]).unwrap();
        assert_eq!(
            describe_header(&packet),
            "opcode=0x0C03 (ogf=0x03 ocf=0x003) plen=0"
        );
    }

    #[test]
    fn describes_acl_header() {
        let packet = HciPacket::acl_data(0x0040, 2, 0, &[0xAA]).unwrap();
        assert_eq!(describe_header(&packet), "handle=0x040 pb=2 bc=0 dlen=1");
    }

    #[test]
    fn long_payload_preview_is_truncated() {
        let preview = payload_preview(&[0xAB; 40]);
        assert!(preview.ends_with("(40 bytes)"));
        assert!(preview.starts_with(&"ab".repeat(32)));
    }

    #[test]
    fn json_header_is_flat() {
        let header = HeaderOutput::from(PacketHeader::Event(hcitrans_frame::EventHeader {
            event_code: 0x0E,
            data_total_length: 4,
        }));
        assert_eq!(
            serde_json::to_string(&header).unwrap(),
            r#"{"event_code":14,"parameter_total_length":4}"#
        );
    }
}
