use bytes::BytesMut;
use comfy_table::{presets::UTF8_FULL, ContentArrangement, Table};
use hcitrans_frame::{encode_packet, HciPacket, PacketKind};
use serde::Serialize;

use crate::cmd::EncodeArgs;
use crate::exit::{CliResult, SUCCESS};
use crate::output::{describe_header, print_raw, OutputFormat};

#[derive(Serialize)]
struct EncodeOutput {
    kind: PacketKind,
    size: usize,
    framed: String,
}

pub fn run(args: EncodeArgs, format: OutputFormat) -> CliResult<i32> {
    let packet = args.packet.build()?;
    let framed = frame(&packet);

    match format {
        OutputFormat::Json => {
            let out = EncodeOutput {
                kind: packet.kind,
                size: framed.len(),
                framed: hex::encode(&framed),
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
                .set_header(vec!["KIND", "HEADER", "FRAMED"])
                .add_row(vec![
                    packet.kind.to_string(),
                    describe_header(&packet),
                    hex::encode(&framed),
                ]);
            println!("{table}");
        }
        OutputFormat::Pretty => println!("{}", hex::encode(&framed)),
        OutputFormat::Raw => print_raw(&framed),
    }
    Ok(SUCCESS)
}

fn frame(packet: &HciPacket) -> BytesMut {
    let mut framed = BytesMut::with_capacity(packet.wire_size());
    encode_packet(packet.kind, &packet.data, &mut framed);
    framed
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frame_prefixes_marker() {
        let packet = HciPacket::event(0x0E, &[0x01]).unwrap();
        assert_eq!(frame(&packet).as_ref(), &[0x04, 0x0E, 0x01, 0x01]);
    }
}
