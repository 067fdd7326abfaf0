//! Scripted native pipeline used by the unit tests.

use std::{
    sync::{
        Arc, Mutex,
        atomic::{AtomicBool, AtomicUsize, Ordering},
    },
    thread,
    time::{Duration, Instant},
};

use crate::native::{CallbackSlot, FrameCallback, InputQueue, NativePipeline};

/// Turns one input unit into the outputs the pipeline reports for it.
pub type Script = fn(&[u8]) -> Vec<Vec<u8>>;

/// What the scripted pipeline saw, shared with the test.
#[derive(Default)]
pub struct Probe {
    pub submitted: Mutex<Vec<Vec<u8>>>,
    pub runs: AtomicUsize,
    pub destroyed: AtomicUsize,
    pub stray_stop: AtomicBool,
}

impl Probe {
    pub fn submitted_count(&self) -> usize {
        self.submitted.lock().unwrap().len()
    }
}

pub struct ScriptedConfig {
    pub probe: Arc<Probe>,
    pub script: Script,
    pub fail_create: bool,
    /// When set, `run` also starts a thread that keeps invoking the callback at this
    /// period and that `destroy` does not wait for.
    pub stray_period: Option<Duration>,
}

impl ScriptedConfig {
    pub fn new(probe: &Arc<Probe>, script: Script) -> Self {
        Self {
            probe: Arc::clone(probe),
            script,
            fail_create: false,
            stray_period: None,
        }
    }
}

pub struct ScriptedPipeline {
    probe: Arc<Probe>,
    script: Script,
    stray_period: Option<Duration>,
    queue: InputQueue,
    callback: CallbackSlot,
}

impl NativePipeline for ScriptedPipeline {
    type Config = ScriptedConfig;

    fn create(config: Self::Config) -> anyhow::Result<Self> {
        if config.fail_create {
            anyhow::bail!("native dependency missing: scripted");
        }
        Ok(Self {
            probe: config.probe,
            script: config.script,
            stray_period: config.stray_period,
            queue: InputQueue::new(),
            callback: CallbackSlot::default(),
        })
    }

    fn register_callback(&self, callback: FrameCallback) {
        self.callback.set(callback);
    }

    fn run(&self) {
        self.probe.runs.fetch_add(1, Ordering::SeqCst);

        if let (Some(period), Some(callback)) = (self.stray_period, self.callback.get()) {
            let probe = Arc::clone(&self.probe);
            thread::spawn(move || {
                while !probe.stray_stop.load(Ordering::SeqCst) {
                    callback(&[0x5A; 32]);
                    thread::sleep(period);
                }
            });
        }

        self.queue.drain(|unit| {
            for output in (self.script)(&unit) {
                self.callback.emit(&output);
            }
            Ok(())
        });
    }

    fn submit(&self, data: &[u8]) -> anyhow::Result<()> {
        self.probe.submitted.lock().unwrap().push(data.to_vec());
        self.queue.push(data)
    }

    fn destroy(&self) {
        self.probe.destroyed.fetch_add(1, Ordering::SeqCst);
        self.queue.stop();
    }
}

/// One output per input, three times its size.
pub fn triple(unit: &[u8]) -> Vec<Vec<u8>> {
    vec![vec![0xFF; unit.len() * 3]]
}

/// Inputs starting with a zero byte produce an empty output.
pub fn empty_on_zero(unit: &[u8]) -> Vec<Vec<u8>> {
    if unit[0] == 0 {
        vec![Vec::new()]
    } else {
        vec![unit.to_vec()]
    }
}

pub fn wait_until<F: Fn() -> bool>(timeout: Duration, cond: F) -> bool {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if cond() {
            return true;
        }
        thread::sleep(Duration::from_millis(5));
    }
    cond()
}
