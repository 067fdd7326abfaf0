use ffmpeg_next::frame;

use crate::{
    ffmpeg::{decoder::H264Decoder, encoder::JpegEncoder, scaler::Scaler},
    native::{CallbackSlot, FrameCallback, InputQueue, NativePipeline},
};

#[derive(Clone, Debug)]
pub struct JpegSettings {
    pub width: u32,
    pub height: u32,
    pub fps: u32,
    // MJPEG quantizer, 2 (best) ..= 31
    pub qscale: u32,
}

impl Default for JpegSettings {
    fn default() -> Self {
        Self {
            width: 1920,
            height: 1080,
            fps: 30,
            qscale: 3,
        }
    }
}

/// Decode -> scale -> MJPEG encode. Codec contexts are built and used only on the thread
/// that calls `run`.
pub struct FfmpegPipeline {
    settings: JpegSettings,
    queue: InputQueue,
    callback: CallbackSlot,
}

impl NativePipeline for FfmpegPipeline {
    type Config = JpegSettings;

    fn create(settings: Self::Config) -> anyhow::Result<Self> {
        crate::ffmpeg::init()?;
        if settings.width == 0 || settings.height == 0 || settings.fps == 0 {
            anyhow::bail!(
                "invalid output {}x{} @{}fps",
                settings.width,
                settings.height,
                settings.fps
            );
        }
        if !(2..=31).contains(&settings.qscale) {
            anyhow::bail!("invalid mjpeg qscale {}", settings.qscale);
        }
        ffmpeg_next::decoder::find(ffmpeg_next::codec::Id::H264)
            .ok_or(anyhow::anyhow!("h264 decoder not found"))?;
        ffmpeg_next::encoder::find(ffmpeg_next::codec::Id::MJPEG)
            .ok_or(anyhow::anyhow!("mjpeg encoder not found"))?;

        log::info!(
            "ffmpeg pipeline created: h264 -> jpeg {}x{}",
            settings.width,
            settings.height
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
        if self.queue.is_stopped() {
            return;
        }
        let mut transcoder = match Transcoder::new(&self.settings) {
            Ok(t) => t,
            Err(e) => {
                log::error!("ffmpeg pipeline setup failed: {:#}", e);
                return;
            }
        };
        self.queue
            .drain(|unit| transcoder.process(&unit, |jpeg| self.callback.emit(jpeg)));
        log::info!(
            "ffmpeg pipeline stopped: {} units in, {} images out",
            transcoder.units,
            transcoder.images
        );
    }

    fn submit(&self, data: &[u8]) -> anyhow::Result<()> {
        self.queue.push(data)
    }

    fn destroy(&self) {
        self.queue.stop();
    }
}

struct Transcoder {
    settings: JpegSettings,
    decoder: H264Decoder,
    scaler: Option<Scaler>,
    encoder: JpegEncoder,
    units: i64,
    images: i64,
}

impl Transcoder {
    fn new(settings: &JpegSettings) -> anyhow::Result<Self> {
        Ok(Self {
            settings: settings.clone(),
            decoder: H264Decoder::new()?,
            scaler: None,
            encoder: JpegEncoder::new(settings)?,
            units: 0,
            images: 0,
        })
    }

    fn process<F: FnMut(&[u8])>(&mut self, unit: &[u8], mut emit: F) -> anyhow::Result<()> {
        // one tick of the 1/fps time base per access unit
        self.decoder.send_packet(unit, self.units)?;
        self.units += 1;

        while let Some(decoded) = self.decoder.receive_frame()? {
            let scaler = match self.scaler.take() {
                Some(scaler) if scaler.accepts(&decoded) => scaler,
                _ => Scaler::new(
                    &decoded,
                    JpegEncoder::FORMAT,
                    self.settings.width,
                    self.settings.height,
                )?,
            };
            let scaler = self.scaler.insert(scaler);

            let mut scaled = frame::Video::empty();
            scaler.run(&decoded, &mut scaled)?;
            scaled.set_pts(Some(self.images));
            self.encoder.send_frame(&scaled)?;

            while let Some(packet) = self.encoder.receive_packet()? {
                if let Some(data) = packet.data() {
                    emit(data);
                }
            }
            self.images += 1;
        }
        Ok(())
    }
}

#[cfg(test)]
#[path = "pipeline_test.rs"]
mod pipeline_test;
