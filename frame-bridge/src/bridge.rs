use std::{
    cell::Cell,
    panic::{self, AssertUnwindSafe},
    sync::{
        Mutex, MutexGuard,
        atomic::{AtomicBool, AtomicU64, Ordering},
    },
};

use bytes::Bytes;

/// Receives every delivered output frame together with its sequence number.
///
/// Runs on the native pipeline's thread while the bridge lock is held, so it should be
/// cheap. An `Err` is logged and the pipeline moves on to the next frame.
pub trait FrameHandler: Send + 'static {
    fn handle(&mut self, data: Bytes, seq: u64) -> anyhow::Result<()>;
}

impl<F> FrameHandler for F
where
    F: FnMut(Bytes, u64) -> anyhow::Result<()> + Send + 'static,
{
    fn handle(&mut self, data: Bytes, seq: u64) -> anyhow::Result<()> {
        self(data, seq)
    }
}

thread_local! {
    // address of the bridge whose handler is running on this thread, 0 if none
    static IN_CALLBACK: Cell<usize> = const { Cell::new(0) };
}

struct BridgeState {
    seq: u64,
    handler: Box<dyn FrameHandler>,
}

/// Callback target of a native pipeline.
///
/// All invocations are serialized on one lock which also guards the sequence counter, so
/// concurrent callbacks from several native threads get distinct, gap-free numbers in
/// arrival order.
pub struct FrameBridge {
    state: Mutex<BridgeState>,
    sealed: AtomicBool,
    delivered: AtomicU64,
}

impl FrameBridge {
    pub fn new<H: FrameHandler>(handler: H) -> Self {
        Self {
            state: Mutex::new(BridgeState {
                seq: 0,
                handler: Box::new(handler),
            }),
            sealed: AtomicBool::new(false),
            delivered: AtomicU64::new(0),
        }
    }

    /// Entry point for the native pipeline. `data` is only borrowed for this call; the
    /// handler gets an owned copy.
    pub fn on_frame(&self, data: &[u8]) {
        let mut state = self.lock();
        if self.sealed.load(Ordering::Acquire) {
            log::debug!("bridge closed, dropping {} byte frame", data.len());
            return;
        }
        if data.is_empty() {
            log::warn!("received empty frame data");
            return;
        }

        let frame = Bytes::copy_from_slice(data);
        let seq = state.seq;
        log::debug!("frame {} received ({} bytes)", seq, frame.len());

        let handler = &mut state.handler;
        let outer = IN_CALLBACK.with(|current| current.replace(self.addr()));
        let result = panic::catch_unwind(AssertUnwindSafe(|| handler.handle(frame, seq)));
        IN_CALLBACK.with(|current| current.set(outer));
        match result {
            Ok(Ok(())) => {}
            Ok(Err(e)) => log::error!("frame {} callback error: {:#}", seq, e),
            Err(_) => log::error!("frame {} callback panicked", seq),
        }
        state.seq += 1;
        self.delivered.store(state.seq, Ordering::Release);
    }

    /// Stops delivery. Waits for an in-flight callback to finish; afterwards no handler
    /// call can begin.
    ///
    /// When called from inside this bridge's own handler the wait is skipped: that handler
    /// is the in-flight callback and the lock is already held by this thread.
    pub fn seal(&self) {
        self.sealed.store(true, Ordering::Release);
        if self.in_callback() {
            log::warn!("bridge sealed from inside a frame callback");
            return;
        }
        drop(self.lock());
    }

    /// True while the calling thread is inside this bridge's handler.
    pub fn in_callback(&self) -> bool {
        IN_CALLBACK.with(|current| current.get()) == self.addr()
    }

    pub fn is_sealed(&self) -> bool {
        self.sealed.load(Ordering::Acquire)
    }

    /// Number of frames handed to the handler so far.
    pub fn delivered(&self) -> u64 {
        self.delivered.load(Ordering::Acquire)
    }

    fn addr(&self) -> usize {
        self as *const Self as usize
    }

    fn lock(&self) -> MutexGuard<'_, BridgeState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }
}

#[cfg(test)]
#[path = "bridge_test.rs"]
mod bridge_test;
