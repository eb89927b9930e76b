use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, RecvTimeoutError};
use std::sync::Arc;
use std::time::Duration;

use hcitrans_frame::{HciPacket, HciTransport, HcitConfig, PacketKind};
use hcitrans_transport::SerialConfig;
use tracing::info;

use crate::cmd::MonitorArgs;
use crate::exit::{hcit_error, CliError, CliResult, INTERNAL, SUCCESS};
use crate::output::{print_packet, OutputFormat};

const POLL_INTERVAL: Duration = Duration::from_millis(100);

pub fn run(args: MonitorArgs, config: HcitConfig, format: OutputFormat) -> CliResult<i32> {
    let baud_rate = args.baud.unwrap_or(config.serial.baud_rate);
    let config = HcitConfig::new(
        SerialConfig::uart(args.port.as_str(), baud_rate),
        args.limits.apply(config.receiver),
    );

    let (tx, packets) = mpsc::channel();
    let mut transport = HciTransport::new(move |kind: PacketKind, packet: &[u8]| {
        let _ = tx.send(HciPacket::new(kind, packet.to_vec()));
    });
    transport
        .init(config)
        .map_err(|err| hcit_error("open failed", err))?;

    let running = Arc::new(AtomicBool::new(true));
    install_ctrlc_handler(running.clone())?;

    let mut printed = 0usize;
    while running.load(Ordering::SeqCst) {
        let packet = match packets.recv_timeout(POLL_INTERVAL) {
            Ok(packet) => packet,
            Err(RecvTimeoutError::Timeout) => continue,
            Err(RecvTimeoutError::Disconnected) => break,
        };

        print_packet(&packet, &args.port, format);
        printed = printed.saturating_add(1);

        if args.count.is_some_and(|count| printed >= count) {
            break;
        }
    }

    if let Some(stats) = transport.stats() {
        info!(
            printed,
            discarded_bytes = stats.discarded_bytes,
            dropped = stats.dropped,
            "monitor stopped"
        );
    }
    Ok(SUCCESS)
}

pub(crate) fn install_ctrlc_handler(running: Arc<AtomicBool>) -> CliResult<()> {
    ctrlc::set_handler(move || {
        running.store(false, Ordering::SeqCst);
    })
    .map_err(|err| CliError::new(INTERNAL, format!("signal handler setup failed: {err}")))
}
