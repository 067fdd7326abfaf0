use ffmpeg_next::{
    format::Pixel,
    frame,
    software::scaling::{Context, Flags},
};

/// Converts decoded frames to the encoder's size and pixel format. Rebuilt whenever the
/// source geometry changes mid-stream.
pub struct Scaler {
    context: Context,
    source: (Pixel, u32, u32),
}

impl Scaler {
    pub fn new(source: &frame::Video, format: Pixel, width: u32, height: u32) -> anyhow::Result<Self> {
        let context = Context::get(
            source.format(),
            source.width(),
            source.height(),
            format,
            width,
            height,
            Flags::BILINEAR,
        )?;
        log::debug!(
            "scaler {:?} {}x{} -> {:?} {}x{}",
            source.format(),
            source.width(),
            source.height(),
            format,
            width,
            height
        );
        Ok(Self {
            context,
            source: (source.format(), source.width(), source.height()),
        })
    }

    pub fn accepts(&self, frame: &frame::Video) -> bool {
        self.source == (frame.format(), frame.width(), frame.height())
    }

    pub fn run(&mut self, frame: &frame::Video, dst: &mut frame::Video) -> anyhow::Result<()> {
        self.context.run(frame, dst).map_err(|e| e.into())
    }
}
