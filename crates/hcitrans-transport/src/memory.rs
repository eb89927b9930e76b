use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use bytes::BytesMut;
use tracing::trace;

use crate::config::{InterfaceType, DEFAULT_BAUD_RATE};
use crate::error::{Result, TransportError};
use crate::traits::{RxCallback, SerialChannel, WriteComplete, WriteRejected};

/// In-process byte-transport channel.
///
/// Clones share the same channel, so a test can keep one handle while another
/// is owned by the transport. Writes stay queued until
/// [`complete_writes`](MemoryChannel::complete_writes) or
/// [`fail_writes`](MemoryChannel::fail_writes) runs their handlers; inbound
/// bytes are delivered with [`inject`](MemoryChannel::inject).
#[derive(Clone, Default)]
pub struct MemoryChannel {
    inner: Arc<Inner>,
}

#[derive(Default)]
struct Inner {
    state: Mutex<State>,
    rx: Mutex<Option<RxCallback>>,
}

struct State {
    baud_rate: u32,
    pending: VecDeque<(BytesMut, WriteComplete)>,
    written: Vec<u8>,
    reject_writes: bool,
    echo: bool,
}

impl Default for State {
    fn default() -> Self {
        Self {
            baud_rate: DEFAULT_BAUD_RATE,
            pending: VecDeque::new(),
            written: Vec::new(),
            reject_writes: false,
            echo: false,
        }
    }
}

impl MemoryChannel {
    /// Create an empty channel.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a channel that loops every completed write back into its own
    /// receive callback.
    pub fn with_echo() -> Self {
        let channel = Self::new();
        channel.state().echo = true;
        channel
    }

    /// Deliver `bytes` to the receive callback as one drain cycle.
    ///
    /// Returns `false` when no callback is installed; the bytes are dropped.
    pub fn inject(&self, bytes: &[u8]) -> bool {
        let mut rx = self.inner.rx.lock().unwrap_or_else(PoisonError::into_inner);
        match rx.as_mut() {
            Some(callback) => {
                trace!(len = bytes.len(), "memory channel drain cycle");
                callback(bytes);
                true
            }
            None => false,
        }
    }

    /// Whether a receive callback is installed.
    pub fn has_rx_callback(&self) -> bool {
        self.inner
            .rx
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }

    /// Make subsequent submissions fail (or succeed again).
    pub fn reject_writes(&self, reject: bool) {
        self.state().reject_writes = reject;
    }

    /// Number of accepted writes whose handlers have not run yet.
    pub fn pending_writes(&self) -> usize {
        self.state().pending.len()
    }

    /// Finish every queued write successfully. Returns how many completed.
    pub fn complete_writes(&self) -> usize {
        let (jobs, echo) = {
            let mut state = self.state();
            let jobs: Vec<_> = state.pending.drain(..).collect();
            for (buffer, _) in &jobs {
                state.written.extend_from_slice(buffer);
            }
            (jobs, state.echo)
        };

        let count = jobs.len();
        for (buffer, on_complete) in jobs {
            if echo {
                let copy = buffer.clone();
                on_complete(buffer, Ok(()));
                self.inject(&copy);
            } else {
                on_complete(buffer, Ok(()));
            }
        }
        count
    }

    /// Finish every queued write with an I/O failure. Returns how many failed.
    pub fn fail_writes(&self) -> usize {
        let jobs: Vec<_> = self.state().pending.drain(..).collect();
        let count = jobs.len();
        for (buffer, on_complete) in jobs {
            let err = std::io::Error::new(std::io::ErrorKind::BrokenPipe, "line dropped");
            on_complete(buffer, Err(TransportError::Io(err)));
        }
        count
    }

    /// Take every byte written by completed writes so far.
    pub fn take_written(&self) -> Vec<u8> {
        std::mem::take(&mut self.state().written)
    }

    fn state(&self) -> MutexGuard<'_, State> {
        self.inner
            .state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

impl SerialChannel for MemoryChannel {
    fn interface_type(&self) -> InterfaceType {
        InterfaceType::Memory
    }

    fn baud_rate(&self) -> u32 {
        self.state().baud_rate
    }

    fn set_baud_rate(&self, baud_rate: u32) -> Result<()> {
        self.state().baud_rate = baud_rate;
        Ok(())
    }

    fn set_rx_callback(&self, callback: RxCallback) {
        *self.inner.rx.lock().unwrap_or_else(PoisonError::into_inner) = Some(callback);
    }

    fn async_write(
        &self,
        buffer: BytesMut,
        on_complete: WriteComplete,
    ) -> std::result::Result<(), WriteRejected> {
        let mut state = self.state();
        if state.reject_writes {
            return Err(WriteRejected {
                error: TransportError::WriteRejected("memory channel refusing writes".into()),
                buffer,
            });
        }
        state.pending.push_back((buffer, on_complete));
        Ok(())
    }
}

impl std::fmt::Debug for MemoryChannel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state();
        f.debug_struct("MemoryChannel")
            .field("baud_rate", &state.baud_rate)
            .field("pending", &state.pending.len())
            .field("written", &state.written.len())
            .finish()
    }
}
