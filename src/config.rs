use std::{
    path::{Path, PathBuf},
    str::FromStr,
    sync::LazyLock,
    time::Duration,
};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Backend {
    Ffmpeg,
    Pattern,
}

impl Default for Backend {
    fn default() -> Self {
        if cfg!(feature = "ffmpeg") {
            Backend::Ffmpeg
        } else {
            Backend::Pattern
        }
    }
}

impl FromStr for Backend {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "ffmpeg" => Ok(Backend::Ffmpeg),
            "pattern" => Ok(Backend::Pattern),
            other => Err(anyhow::anyhow!("unknown backend: {}", other)),
        }
    }
}

pub struct AppConfig {
    input_dir: PathBuf,
    output_dir: PathBuf,
    backend: Backend,
    frame_interval: Duration,
    settle: Duration,
    drain: Duration,
    min_frame_bytes: usize,
    width: u32,
    height: u32,
}

impl AppConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the config from `lookup`; unset keys keep their defaults, unparsable ones are
    /// logged and ignored.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let ms = |key: &str, default: u64| Duration::from_millis(parse_or(&lookup, key, default));
        Self {
            input_dir: lookup("H264_JPEG_INPUT_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("./h264")),
            output_dir: lookup("H264_JPEG_OUTPUT_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("output_jpegs")),
            backend: parse_or(&lookup, "H264_JPEG_BACKEND", Backend::default()),
            frame_interval: ms("H264_JPEG_FRAME_INTERVAL_MS", 33),
            settle: ms("H264_JPEG_SETTLE_MS", 1000),
            drain: ms("H264_JPEG_DRAIN_MS", 5000),
            min_frame_bytes: parse_or(&lookup, "H264_JPEG_MIN_FRAME_BYTES", 100),
            width: parse_or(&lookup, "H264_JPEG_WIDTH", 1920),
            height: parse_or(&lookup, "H264_JPEG_HEIGHT", 1080),
        }
    }

    pub fn input_dir(&self) -> &Path {
        &self.input_dir
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    pub fn backend(&self) -> Backend {
        self.backend
    }

    /// Pause between two pushes (~30 fps by default).
    pub fn frame_interval(&self) -> Duration {
        self.frame_interval
    }

    /// Wait after start before the first push.
    pub fn settle(&self) -> Duration {
        self.settle
    }

    /// Wait after the last push before closing.
    pub fn drain(&self) -> Duration {
        self.drain
    }

    pub fn min_frame_bytes(&self) -> usize {
        self.min_frame_bytes
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }
}

fn parse_or<F, T>(lookup: &F, key: &str, default: T) -> T
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match lookup(key) {
        None => default,
        Some(raw) => match raw.trim().parse() {
            Ok(value) => value,
            Err(e) => {
                log::warn!("ignoring {}={:?}: {}", key, raw, e);
                default
            }
        },
    }
}

pub fn config() -> &'static AppConfig {
    static CONFIG: LazyLock<AppConfig> = LazyLock::new(AppConfig::from_env);
    &CONFIG
}

#[cfg(test)]
#[path = "config_test.rs"]
mod config_test;
