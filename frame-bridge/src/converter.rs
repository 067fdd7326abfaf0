use std::{
    sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard},
    thread::{self, JoinHandle},
    time::{Duration, Instant},
};

use tokio_util::sync::CancellationToken;

use crate::{
    bridge::{FrameBridge, FrameHandler},
    error::{ConverterError, Result},
    native::NativePipeline,
};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ConverterState {
    Created,
    Running,
    Closed,
}

#[derive(Clone, Debug)]
pub struct ConverterOptions {
    /// Delay between `start` and the native run call.
    pub warmup: Duration,
    /// Name of the thread running the native loop.
    pub thread_name: String,
}

impl Default for ConverterOptions {
    fn default() -> Self {
        Self {
            warmup: Duration::from_millis(500),
            thread_name: "native-pipeline".to_string(),
        }
    }
}

impl ConverterOptions {
    pub fn with_warmup(mut self, warmup: Duration) -> Self {
        self.warmup = warmup;
        self
    }

    pub fn with_thread_name(mut self, name: impl Into<String>) -> Self {
        self.thread_name = name.into();
        self
    }
}

struct Lifecycle {
    state: ConverterState,
    worker: Option<JoinHandle<()>>,
}

/// Owns one native pipeline and turns its callbacks into numbered frames for a handler.
///
/// `start` runs the pipeline's blocking loop on a dedicated thread, `push_frame` may be
/// called from any thread, `close` tears the pipeline down and returns only once no
/// handler call can happen any more.
pub struct ConverterCore<P: NativePipeline> {
    pipeline: Arc<P>,
    bridge: Arc<FrameBridge>,
    options: ConverterOptions,
    stop: CancellationToken,
    lifecycle: RwLock<Lifecycle>,
}

impl<P: NativePipeline> ConverterCore<P> {
    pub fn new<H: FrameHandler>(config: P::Config, handler: H) -> Result<Self> {
        Self::with_options(config, handler, ConverterOptions::default())
    }

    pub fn with_options<H: FrameHandler>(
        config: P::Config,
        handler: H,
        options: ConverterOptions,
    ) -> Result<Self> {
        let pipeline = P::create(config).map_err(ConverterError::PipelineCreation)?;

        let bridge = Arc::new(FrameBridge::new(handler));
        let bridge_ctx = Arc::clone(&bridge);
        pipeline.register_callback(Arc::new(move |data: &[u8]| bridge_ctx.on_frame(data)));

        log::info!("converter created");
        Ok(Self {
            pipeline: Arc::new(pipeline),
            bridge,
            options,
            stop: CancellationToken::new(),
            lifecycle: RwLock::new(Lifecycle {
                state: ConverterState::Created,
                worker: None,
            }),
        })
    }

    pub fn state(&self) -> ConverterState {
        self.read().state
    }

    /// Number of frames handed to the handler so far.
    pub fn frames_delivered(&self) -> u64 {
        self.bridge.delivered()
    }

    /// Spawns the thread running the native loop. The run call happens after the warm-up;
    /// if the converter is closed during the warm-up, `run` is never called.
    ///
    /// Fails with [`ConverterError::AlreadyStarted`] on a second call and with
    /// [`ConverterError::Closed`] once the converter has been closed.
    pub fn start(&self) -> Result<()> {
        let mut lifecycle = self.write();
        match lifecycle.state {
            ConverterState::Created => {}
            ConverterState::Running => return Err(ConverterError::AlreadyStarted),
            ConverterState::Closed => return Err(ConverterError::Closed),
        }

        let pipeline = Arc::clone(&self.pipeline);
        let stop = self.stop.clone();
        let warmup = self.options.warmup;
        let handle = thread::Builder::new()
            .name(self.options.thread_name.clone())
            .spawn(move || {
                if wait_or_cancelled(&stop, warmup) {
                    log::info!("converter closed before the pipeline started");
                    return;
                }
                log::info!("pipeline run loop started");
                pipeline.run();
                log::info!("pipeline run loop finished");
            })?;

        lifecycle.worker = Some(handle);
        lifecycle.state = ConverterState::Running;
        Ok(())
    }

    /// Hands one input unit to the pipeline. Empty buffers are ignored.
    ///
    /// A failed native submit is logged, not returned; only pushing into a closed converter
    /// is an error.
    pub fn push_frame(&self, frame: &[u8]) -> Result<()> {
        if frame.is_empty() {
            return Ok(());
        }

        let lifecycle = self.read();
        if lifecycle.state == ConverterState::Closed {
            return Err(ConverterError::Closed);
        }

        log::trace!(
            "pushing frame ({} bytes), head: {:02x?}",
            frame.len(),
            &frame[..frame.len().min(16)]
        );
        if let Err(e) = self.pipeline.submit(frame) {
            log::warn!("push frame ({} bytes) failed: {:#}", frame.len(), e);
        }
        drop(lifecycle);
        Ok(())
    }

    /// Destroys the pipeline and waits for its thread. Calls after the first are no-ops.
    ///
    /// Called from inside a frame handler, on whatever thread, close neither waits for the
    /// in-flight callback nor joins the worker, which may itself be waiting on that callback.
    pub fn close(&self) {
        let worker = {
            let mut lifecycle = self.write();
            if lifecycle.state == ConverterState::Closed {
                return;
            }
            lifecycle.state = ConverterState::Closed;
            lifecycle.worker.take()
        };

        self.stop.cancel();
        self.pipeline.destroy();
        self.bridge.seal();

        if let Some(handle) = worker {
            if self.bridge.in_callback() {
                log::warn!("close called from a frame callback, not joining the pipeline thread");
            } else if handle.thread().id() == thread::current().id() {
                log::warn!("close called on the pipeline thread, not joining it");
            } else if handle.join().is_err() {
                log::error!("pipeline thread panicked");
            }
        }
        log::info!(
            "converter closed, {} frames delivered",
            self.bridge.delivered()
        );
    }

    fn read(&self) -> RwLockReadGuard<'_, Lifecycle> {
        self.lifecycle.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, Lifecycle> {
        self.lifecycle.write().unwrap_or_else(|e| e.into_inner())
    }
}

impl<P: NativePipeline> Drop for ConverterCore<P> {
    fn drop(&mut self) {
        self.close();
    }
}

/// Sleeps for `duration` unless `stop` fires first. Returns true if it fired.
fn wait_or_cancelled(stop: &CancellationToken, duration: Duration) -> bool {
    let deadline = Instant::now() + duration;
    loop {
        if stop.is_cancelled() {
            return true;
        }
        let now = Instant::now();
        if now >= deadline {
            return false;
        }
        thread::sleep((deadline - now).min(Duration::from_millis(10)));
    }
}

#[cfg(test)]
#[path = "converter_test.rs"]
mod converter_test;
