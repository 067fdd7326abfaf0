//! Software stand-in for the FFmpeg pipeline.
//!
//! Every submitted unit produces one JPEG test card. The picture is a colour gradient whose
//! blue channel depends on the unit index and contents, so consecutive outputs differ.

use jpeg_encoder::{ColorType, Encoder};

use crate::native::{CallbackSlot, FrameCallback, InputQueue, NativePipeline};

#[derive(Clone, Debug)]
pub struct PatternSettings {
    pub width: u16,
    pub height: u16,
    pub quality: u8,
}

impl Default for PatternSettings {
    fn default() -> Self {
        Self {
            width: 320,
            height: 240,
            quality: 85,
        }
    }
}

pub struct PatternPipeline {
    settings: PatternSettings,
    queue: InputQueue,
    callback: CallbackSlot,
}

impl NativePipeline for PatternPipeline {
    type Config = PatternSettings;

    fn create(settings: Self::Config) -> anyhow::Result<Self> {
        if settings.width == 0 || settings.height == 0 {
            anyhow::bail!("invalid size {}x{}", settings.width, settings.height);
        }
        if !(1..=100).contains(&settings.quality) {
            anyhow::bail!("invalid jpeg quality {}", settings.quality);
        }
        log::info!(
            "pattern pipeline created: {}x{} q{}",
            settings.width,
            settings.height,
            settings.quality
        );
        Ok(Self {
            settings,
            queue: InputQueue::new(),
            callback: CallbackSlot::default(),
        })
    }

    fn register_callback(&self, callback: FrameCallback) {
        self.callback.set(callback);
    }

    fn run(&self) {
        let mut index: u64 = 0;
        self.queue.drain(|unit| {
            let jpeg = render_card(&self.settings, index, &unit)?;
            index += 1;
            self.callback.emit(&jpeg);
            Ok(())
        });
    }

    fn submit(&self, data: &[u8]) -> anyhow::Result<()> {
        self.queue.push(data)
    }

    fn destroy(&self) {
        self.queue.stop();
    }
}

fn render_card(settings: &PatternSettings, index: u64, unit: &[u8]) -> anyhow::Result<Vec<u8>> {
    let width = settings.width as usize;
    let height = settings.height as usize;
    let tint = unit
        .iter()
        .fold(index.wrapping_mul(16) as u8, |acc, b| acc.wrapping_add(*b));

    let mut rgb = Vec::with_capacity(width * height * 3);
    for y in 0..height {
        for x in 0..width {
            rgb.push((x * 255 / width) as u8);
            rgb.push((y * 255 / height) as u8);
            rgb.push(tint);
        }
    }

    let mut jpeg = Vec::new();
    Encoder::new(&mut jpeg, settings.quality)
        .encode(&rgb, settings.width, settings.height, ColorType::Rgb)
        .map_err(|e| anyhow::anyhow!("jpeg encode: {}", e))?;
    Ok(jpeg)
}

#[cfg(test)]
#[path = "pattern_test.rs"]
mod pattern_test;
