use std::sync::mpsc::{self, Receiver, RecvTimeoutError};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use hcitrans_frame::{HciPacket, HciTransport, HcitConfig, PacketKind, PoolAllocator};
use hcitrans_transport::SerialConfig;
use tracing::debug;

use crate::cmd::{parse_duration, SendArgs};
use crate::exit::{hcit_error, CliError, CliResult, SUCCESS, TIMEOUT};
use crate::output::{print_packet, OutputFormat};

const RELEASE_POLL: Duration = Duration::from_millis(5);

pub fn run(args: SendArgs, config: HcitConfig, format: OutputFormat) -> CliResult<i32> {
    let timeout = parse_duration(&args.timeout)?;
    let packet = args.packet.build()?;
    let baud_rate = args.baud.unwrap_or(config.serial.baud_rate);
    let config = HcitConfig::new(
        SerialConfig::uart(args.port.as_str(), baud_rate),
        config.receiver,
    );

    // One block sized for this packet: its release marks write completion.
    let pool = Arc::new(PoolAllocator::new(packet.wire_size(), 1));
    let (tx, inbound) = mpsc::channel();
    let mut transport = HciTransport::with_allocator(
        move |kind: PacketKind, packet: &[u8]| {
            let _ = tx.send(HciPacket::new(kind, packet.to_vec()));
        },
        pool.clone(),
    );
    transport
        .init(config)
        .map_err(|err| hcit_error("open failed", err))?;

    let deadline = Instant::now() + timeout;
    transport
        .send_packet(packet.kind, &packet.data)
        .map_err(|err| hcit_error("send failed", err))?;
    wait_for_release(&pool, deadline)?;
    debug!(kind = %packet.kind, size = packet.wire_size(), "packet written");

    if args.wait {
        let response = wait_for_event(&inbound, deadline)?;
        print_packet(&response, &args.port, format);
    }
    Ok(SUCCESS)
}

fn wait_for_release(pool: &PoolAllocator, deadline: Instant) -> CliResult<()> {
    while pool.outstanding() > 0 {
        if Instant::now() >= deadline {
            return Err(CliError::new(TIMEOUT, "write did not complete in time"));
        }
        thread::sleep(RELEASE_POLL);
    }
    Ok(())
}

/// First inbound Event before `deadline`. Other packet kinds are skipped.
fn wait_for_event(inbound: &Receiver<HciPacket>, deadline: Instant) -> CliResult<HciPacket> {
    loop {
        let remaining = deadline.saturating_duration_since(Instant::now());
        match inbound.recv_timeout(remaining) {
            Ok(packet) if packet.kind == PacketKind::Event => return Ok(packet),
            Ok(packet) => debug!(kind = %packet.kind, "skipping non-event packet"),
            Err(RecvTimeoutError::Timeout) | Err(RecvTimeoutError::Disconnected) => {
                return Err(CliError::new(TIMEOUT, "no event received before timeout"))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use hcitrans_frame::BufferAllocator;

    use super::*;

    #[test]
    fn wait_for_event_skips_other_kinds() {
        let (tx, rx) = mpsc::channel();
        tx.send(HciPacket::acl_data(1, 2, 0, &[0xAA]).unwrap()).unwrap();
        tx.send(HciPacket::event(0x0E, &[0x01]).unwrap()).unwrap();

        let packet = wait_for_event(&rx, Instant::now() + Duration::from_secs(1)).unwrap();
        assert_eq!(packet.kind, PacketKind::Event);
    }

    #[test]
    fn wait_for_event_times_out() {
        let (_tx, rx) = mpsc::channel::<HciPacket>();
        let err = wait_for_event(&rx, Instant::now() + Duration::from_millis(20)).unwrap_err();
        assert_eq!(err.code, TIMEOUT);
    }

    #[test]
    fn wait_for_release_times_out_while_outstanding() {
        let pool = PoolAllocator::new(8, 1);
        let _held = pool.alloc(4).unwrap();
        let err = wait_for_release(&pool, Instant::now() + Duration::from_millis(20)).unwrap_err();
        assert_eq!(err.code, TIMEOUT);
    }
}
