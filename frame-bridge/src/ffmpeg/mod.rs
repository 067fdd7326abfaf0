//! H.264 access units in, JPEG images out, on FFmpeg.

pub mod decoder;
pub mod encoder;
pub mod pipeline;
pub mod scaler;

/// Registers FFmpeg components and limits its own logging to warnings. Safe to call more
/// than once.
pub fn init() -> anyhow::Result<()> {
    ffmpeg_next::init().map_err(|e| anyhow::anyhow!("ffmpeg_next init: {}", e))?;
    ffmpeg_next::util::log::set_level(ffmpeg_next::util::log::Level::Warning);
    Ok(())
}
