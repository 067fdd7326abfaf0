use std::path::{Path, PathBuf};

use bytes::Bytes;

/// Directory of `frame_<n>.h264` access units, ordered by `<n>`.
///
/// Only the listing happens in [`FrameSource::open`]; file contents are read one at a time
/// while iterating.
pub struct FrameSource {
    entries: Vec<(u64, PathBuf)>,
}

impl FrameSource {
    pub fn open(dir: impl AsRef<Path>) -> anyhow::Result<Self> {
        let dir = dir.as_ref();
        let read_dir = std::fs::read_dir(dir)
            .map_err(|e| anyhow::anyhow!("failed to read input dir {}: {}", dir.display(), e))?;

        let mut entries = Vec::new();
        for entry in read_dir {
            let entry = entry?;
            if !entry.file_type()?.is_file() {
                continue;
            }
            let name = entry.file_name();
            match name.to_str().and_then(frame_key) {
                Some(key) => entries.push((key, entry.path())),
                None => log::debug!("skipping {}", entry.path().display()),
            }
        }
        entries.sort_by_key(|(key, _)| *key);

        log::info!("found {} frames in {}", entries.len(), dir.display());
        Ok(Self { entries })
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Reads each unit on demand. Every call starts again from the first frame.
    pub fn frames(&self) -> impl Iterator<Item = anyhow::Result<(u64, Bytes)>> + '_ {
        self.entries.iter().map(|(key, path)| {
            let data = std::fs::read(path)
                .map_err(|e| anyhow::anyhow!("failed to read file {}: {}", path.display(), e))?;
            Ok((*key, Bytes::from(data)))
        })
    }
}

fn frame_key(name: &str) -> Option<u64> {
    name.strip_prefix("frame_")?
        .strip_suffix(".h264")?
        .parse()
        .ok()
}

#[cfg(test)]
#[path = "source_test.rs"]
mod source_test;
