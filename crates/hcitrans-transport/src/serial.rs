use std::io::{ErrorKind, Read, Write};
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::mpsc::{self, Sender};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread::JoinHandle;
use std::time::Duration;

use bytes::BytesMut;
use serialport::{DataBits, FlowControl, Parity, SerialPort, StopBits};
use tracing::{debug, trace, warn};

use crate::config::InterfaceType;
use crate::error::{Result, TransportError};
use crate::traits::{RxCallback, SerialChannel, WriteComplete, WriteRejected};

/// Short read timeout so the reader thread notices shutdown promptly.
const READ_TIMEOUT: Duration = Duration::from_millis(50);
const READ_CHUNK_SIZE: usize = 256;

type WriteJob = (BytesMut, WriteComplete);
type SharedRx = Arc<Mutex<Option<RxCallback>>>;

/// UART channel backed by the `serialport` crate.
///
/// A reader thread drains the device into the receive callback; a writer
/// thread performs queued writes in submission order and runs their completion
/// handlers. Dropping the channel stops both threads.
pub struct SerialPortChannel {
    path: String,
    port: Mutex<Box<dyn SerialPort>>,
    baud_rate: AtomicU32,
    rx: SharedRx,
    writes: Mutex<Option<Sender<WriteJob>>>,
    running: Arc<AtomicBool>,
    threads: Mutex<Vec<JoinHandle<()>>>,
}

impl SerialPortChannel {
    /// Open `path` at `baud_rate`, 8N1, no flow control.
    pub fn open(path: &str, baud_rate: u32) -> Result<Self> {
        let open_error = |err: serialport::Error| TransportError::Open {
            interface: InterfaceType::Uart,
            channel: path.to_string(),
            source: err.into(),
        };

        let port = serialport::new(path, baud_rate)
            .data_bits(DataBits::Eight)
            .parity(Parity::None)
            .stop_bits(StopBits::One)
            .flow_control(FlowControl::None)
            .timeout(READ_TIMEOUT)
            .open()
            .map_err(open_error)?;
        let reader = port.try_clone().map_err(open_error)?;
        let writer = port.try_clone().map_err(open_error)?;

        let running = Arc::new(AtomicBool::new(true));
        let rx: SharedRx = Arc::new(Mutex::new(None));
        let (tx, jobs) = mpsc::channel::<WriteJob>();

        let reader_thread = {
            let running = Arc::clone(&running);
            let rx = Arc::clone(&rx);
            std::thread::Builder::new()
                .name(format!("hcit-rx:{path}"))
                .spawn(move || read_loop(reader, rx, running))?
        };
        let writer_thread = std::thread::Builder::new()
            .name(format!("hcit-tx:{path}"))
            .spawn(move || write_loop(writer, jobs))?;

        debug!(path, baud_rate, "serial port opened");

        Ok(Self {
            path: path.to_string(),
            port: Mutex::new(port),
            baud_rate: AtomicU32::new(baud_rate),
            rx,
            writes: Mutex::new(Some(tx)),
            running,
            threads: Mutex::new(vec![reader_thread, writer_thread]),
        })
    }

    /// Device path this channel was opened on.
    pub fn path(&self) -> &str {
        &self.path
    }
}

fn read_loop(mut port: Box<dyn SerialPort>, rx: SharedRx, running: Arc<AtomicBool>) {
    let mut chunk = [0u8; READ_CHUNK_SIZE];
    while running.load(Ordering::SeqCst) {
        let read = match port.read(&mut chunk) {
            Ok(0) => continue,
            Ok(n) => n,
            Err(err) if err.kind() == ErrorKind::TimedOut => continue,
            Err(err) if err.kind() == ErrorKind::Interrupted => continue,
            Err(err) => {
                warn!(error = %err, "serial read failed, stopping receive thread");
                break;
            }
        };

        trace!(len = read, "serial drain cycle");
        let mut callback = rx.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(callback) = callback.as_mut() {
            callback(&chunk[..read]);
        }
    }
}

fn write_loop(mut port: Box<dyn SerialPort>, jobs: mpsc::Receiver<WriteJob>) {
    for (buffer, on_complete) in jobs {
        let result = port
            .write_all(&buffer)
            .and_then(|()| port.flush())
            .map_err(TransportError::Io);
        if let Err(err) = &result {
            warn!(error = %err, len = buffer.len(), "serial write failed");
        }
        on_complete(buffer, result);
    }
}

impl SerialChannel for SerialPortChannel {
    fn interface_type(&self) -> InterfaceType {
        InterfaceType::Uart
    }

    fn baud_rate(&self) -> u32 {
        self.baud_rate.load(Ordering::SeqCst)
    }

    fn set_baud_rate(&self, baud_rate: u32) -> Result<()> {
        self.port
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .set_baud_rate(baud_rate)
            .map_err(|err| TransportError::Io(err.into()))?;
        self.baud_rate.store(baud_rate, Ordering::SeqCst);
        Ok(())
    }

    fn set_rx_callback(&self, callback: RxCallback) {
        *self.rx.lock().unwrap_or_else(PoisonError::into_inner) = Some(callback);
    }

    fn async_write(
        &self,
        buffer: BytesMut,
        on_complete: WriteComplete,
    ) -> std::result::Result<(), WriteRejected> {
        let writes = self.writes.lock().unwrap_or_else(PoisonError::into_inner);
        let Some(tx) = writes.as_ref() else {
            return Err(WriteRejected {
                error: TransportError::Closed,
                buffer,
            });
        };
        tx.send((buffer, on_complete))
            .map_err(|mpsc::SendError((buffer, _))| WriteRejected {
                error: TransportError::Closed,
                buffer,
            })
    }
}

impl Drop for SerialPortChannel {
    fn drop(&mut self) {
        self.running.store(false, Ordering::SeqCst);
        // Closing the job queue ends the writer thread once pending writes finish.
        self.writes
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        let threads = std::mem::take(&mut *self.threads.lock().unwrap_or_else(PoisonError::into_inner));
        for handle in threads {
            let _ = handle.join();
        }
        debug!(path = %self.path, "serial port closed");
    }
}

impl std::fmt::Debug for SerialPortChannel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SerialPortChannel")
            .field("path", &self.path)
            .field("baud_rate", &self.baud_rate())
            .finish()
    }
}
