//! Contract between the converter and a native transcoding pipeline.
//!
//! A native pipeline is an opaque engine: it accepts input units through
//! [`NativePipeline::submit`], runs its own blocking loop in [`NativePipeline::run`] and
//! reports every produced output through the registered [`FrameCallback`]. The slice passed
//! to the callback is owned by the pipeline and only valid for the duration of the call.

use std::{
    sync::{Arc, Mutex, RwLock, mpsc},
    time::Duration,
};

use bytes::Bytes;
use tokio_util::sync::CancellationToken;

/// Output callback registered on a native pipeline.
pub type FrameCallback = Arc<dyn Fn(&[u8]) + Send + Sync>;

pub trait NativePipeline: Send + Sync + Sized + 'static {
    type Config: Send;

    /// Allocates and configures one pipeline instance.
    fn create(config: Self::Config) -> anyhow::Result<Self>;

    /// Installs the output callback. Called once, before `run`.
    fn register_callback(&self, callback: FrameCallback);

    /// Blocks until the pipeline is destroyed. Returns immediately if `destroy` already ran.
    fn run(&self);

    /// Hands one input unit to the pipeline. The pipeline keeps its own copy; `data` is not
    /// read after this returns.
    fn submit(&self, data: &[u8]) -> anyhow::Result<()>;

    /// Stops the pipeline and makes any in-progress `run` return.
    fn destroy(&self);
}

/// Holds the registered output callback of a pipeline.
#[derive(Default)]
pub struct CallbackSlot {
    inner: RwLock<Option<FrameCallback>>,
}

impl CallbackSlot {
    pub fn set(&self, callback: FrameCallback) {
        let mut guard = self.inner.write().unwrap_or_else(|e| e.into_inner());
        if guard.replace(callback).is_some() {
            log::warn!("frame callback replaced");
        }
    }

    pub fn get(&self) -> Option<FrameCallback> {
        self.inner.read().unwrap_or_else(|e| e.into_inner()).clone()
    }

    pub fn emit(&self, data: &[u8]) {
        match self.get() {
            Some(callback) => callback(data),
            None => log::trace!("no frame callback registered, dropping {} bytes", data.len()),
        }
    }
}

/// Input side shared by the bundled pipelines: an owned-copy queue of input units, a stop
/// token and the blocking loop that drains the queue until stopped.
pub struct InputQueue {
    cancel: CancellationToken,
    tx: mpsc::Sender<Bytes>,
    rx: Mutex<Option<mpsc::Receiver<Bytes>>>,
}

impl InputQueue {
    pub fn new() -> Self {
        let (tx, rx) = mpsc::channel();
        Self {
            cancel: CancellationToken::new(),
            tx,
            rx: Mutex::new(Some(rx)),
        }
    }

    /// Copies `data` into the queue.
    pub fn push(&self, data: &[u8]) -> anyhow::Result<()> {
        if self.cancel.is_cancelled() {
            anyhow::bail!("pipeline already destroyed");
        }
        self.tx
            .send(Bytes::copy_from_slice(data))
            .map_err(|_| anyhow::anyhow!("input queue closed"))
    }

    pub fn stop(&self) {
        self.cancel.cancel();
    }

    pub fn is_stopped(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Feeds queued units to `process` until [`InputQueue::stop`] is called. Errors from
    /// `process` are logged and the loop moves on to the next unit.
    ///
    /// The queue can only be drained once; a second call returns immediately.
    pub fn drain<F>(&self, mut process: F)
    where
        F: FnMut(Bytes) -> anyhow::Result<()>,
    {
        let rx = self.rx.lock().unwrap_or_else(|e| e.into_inner()).take();
        let Some(rx) = rx else {
            log::warn!("input queue already drained");
            return;
        };

        let mut index: u64 = 0;
        loop {
            if self.cancel.is_cancelled() {
                break;
            }
            match rx.recv_timeout(Duration::from_millis(10)) {
                Ok(unit) => {
                    let len = unit.len();
                    if let Err(e) = process(unit) {
                        log::error!("input unit {} ({} bytes) failed: {:#}", index, len, e);
                    }
                    index += 1;
                }
                Err(mpsc::RecvTimeoutError::Timeout) => {}
                Err(mpsc::RecvTimeoutError::Disconnected) => break,
            }
        }
        log::debug!("input queue stopped after {} units", index);
    }
}

impl Default for InputQueue {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
#[path = "native_test.rs"]
mod native_test;
