use std::{
    path::{Path, PathBuf},
    sync::{
        Arc,
        atomic::{AtomicU64, Ordering},
    },
};

use bytes::Bytes;
use frame_bridge::FrameHandler;

#[derive(Debug, Default)]
pub struct SinkStats {
    saved: AtomicU64,
    rejected: AtomicU64,
}

impl SinkStats {
    pub fn saved(&self) -> u64 {
        self.saved.load(Ordering::Relaxed)
    }

    pub fn rejected(&self) -> u64 {
        self.rejected.load(Ordering::Relaxed)
    }
}

/// Writes every delivered frame to `<dir>/frame_<seq:04>.jpg`.
pub struct JpegFileSink {
    dir: PathBuf,
    min_bytes: usize,
    stats: Arc<SinkStats>,
}

impl JpegFileSink {
    pub fn new(dir: impl Into<PathBuf>, min_bytes: usize) -> anyhow::Result<Self> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir)
            .map_err(|e| anyhow::anyhow!("failed to create {}: {}", dir.display(), e))?;
        Ok(Self {
            dir,
            min_bytes,
            stats: Arc::new(SinkStats::default()),
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn stats(&self) -> Arc<SinkStats> {
        self.stats.clone()
    }

    pub fn path_for(&self, seq: u64) -> PathBuf {
        self.dir.join(format!("frame_{:04}.jpg", seq))
    }

    pub fn write(&self, data: &[u8], seq: u64) -> anyhow::Result<PathBuf> {
        if data.len() < self.min_bytes {
            self.stats.rejected.fetch_add(1, Ordering::Relaxed);
            anyhow::bail!(
                "suspiciously small JPEG frame: {} bytes (min {})",
                data.len(),
                self.min_bytes
            );
        }
        let path = self.path_for(seq);
        std::fs::write(&path, data)
            .map_err(|e| anyhow::anyhow!("failed to write {}: {}", path.display(), e))?;
        self.stats.saved.fetch_add(1, Ordering::Relaxed);
        Ok(path)
    }
}

impl FrameHandler for JpegFileSink {
    fn handle(&mut self, data: Bytes, seq: u64) -> anyhow::Result<()> {
        let path = self.write(&data, seq)?;
        log::info!("saved frame {} to {} ({} bytes)", seq, path.display(), data.len());
        Ok(())
    }
}

#[cfg(test)]
#[path = "sink_test.rs"]
mod sink_test;
