use std::fs;
use std::io::Read;
use std::sync::mpsc;

use hcitrans_frame::{DetectState, HciPacket, HciTransport, HcitConfig, PacketKind};
use hcitrans_transport::SerialConfig;
use tracing::{info, warn};

use crate::cmd::{parse_hex, DecodeArgs};
use crate::exit::{hcit_error, io_error, CliError, CliResult, DATA_INVALID, SUCCESS};
use crate::output::{print_packet, OutputFormat};

pub fn run(args: DecodeArgs, config: HcitConfig, format: OutputFormat) -> CliResult<i32> {
    let (bytes, source) = read_input(&args)?;

    // Offline decoding always runs over the in-memory channel.
    let config = HcitConfig::new(SerialConfig::memory(), args.limits.apply(config.receiver));

    let (tx, packets) = mpsc::channel();
    let mut transport = HciTransport::new(move |kind: PacketKind, packet: &[u8]| {
        let _ = tx.send(HciPacket::new(kind, packet.to_vec()));
    });
    transport
        .init(config)
        .map_err(|err| hcit_error("init failed", err))?;
    transport
        .process_received(&bytes)
        .map_err(|err| hcit_error("decode failed", err))?;

    let mut printed = 0usize;
    for packet in packets.try_iter() {
        print_packet(&packet, &source, format);
        printed += 1;
    }

    if let Some(stats) = transport.stats() {
        info!(
            dispatched = stats.dispatched,
            discarded_bytes = stats.discarded_bytes,
            dropped = stats.dropped,
            "decode finished"
        );
    }
    if let Some(state) = transport.receiver_state() {
        if state != DetectState::DetectMarker {
            warn!(?state, "input ends inside a packet");
        }
    }

    if printed == 0 && !bytes.is_empty() {
        return Err(CliError::new(DATA_INVALID, "no complete packets in input"));
    }
    Ok(SUCCESS)
}

fn read_input(args: &DecodeArgs) -> CliResult<(Vec<u8>, String)> {
    if let Some(path) = &args.file {
        let bytes = fs::read(path)
            .map_err(|err| io_error(&format!("failed reading {}", path.display()), err))?;
        return Ok((bytes, path.display().to_string()));
    }
    if let Some(hex) = &args.hex {
        return Ok((parse_hex("input", hex)?, "argv".to_string()));
    }

    let mut text = String::new();
    std::io::stdin()
        .read_to_string(&mut text)
        .map_err(|err| io_error("failed reading stdin", err))?;
    Ok((parse_hex("stdin", &text)?, "stdin".to_string()))
}
