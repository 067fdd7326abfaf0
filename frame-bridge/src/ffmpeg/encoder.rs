use ffmpeg_next::{Dictionary, Packet, Rational, codec, format::Pixel, frame};

use crate::ffmpeg::pipeline::JpegSettings;

/// Lagrange multiplier per quantizer step (FF_QP2LAMBDA).
const QP2LAMBDA: u32 = 118;

/// MJPEG encoder: every frame in becomes one standalone JPEG image out.
pub struct JpegEncoder {
    inner: codec::encoder::Video,
}

impl JpegEncoder {
    /// Pixel format the encoder expects (full-range 4:2:0).
    pub const FORMAT: Pixel = Pixel::YUVJ420P;

    pub fn new(settings: &JpegSettings) -> anyhow::Result<Self> {
        let codec = ffmpeg_next::encoder::find(codec::Id::MJPEG)
            .ok_or(anyhow::anyhow!("mjpeg encoder not found"))?;
        let mut encoder = codec::Context::new_with_codec(codec).encoder().video()?;
        encoder.set_width(settings.width);
        encoder.set_height(settings.height);
        encoder.set_format(Self::FORMAT);
        encoder.set_time_base(Rational::new(1, settings.fps as i32));
        encoder.set_frame_rate(Some(Rational::new(settings.fps as i32, 1)));

        let mut opts = Dictionary::new();
        opts.set("flags", "+qscale");
        opts.set("global_quality", &(settings.qscale * QP2LAMBDA).to_string());
        let inner = encoder.open_with(opts)?;
        log::info!(
            "mjpeg encoder opened: {}x{} @{}fps q{}",
            settings.width,
            settings.height,
            settings.fps,
            settings.qscale
        );
        Ok(Self { inner })
    }

    pub fn send_frame(&mut self, frame: &frame::Video) -> anyhow::Result<()> {
        self.inner.send_frame(frame)?;
        Ok(())
    }

    pub fn receive_packet(&mut self) -> anyhow::Result<Option<Packet>> {
        let mut packet = Packet::empty();
        match self.inner.receive_packet(&mut packet) {
            Ok(()) => Ok(Some(packet)),
            Err(ffmpeg_next::Error::Other { errno }) if errno == ffmpeg_next::util::error::EAGAIN => {
                Ok(None)
            }
            Err(ffmpeg_next::Error::Eof) => Ok(None),
            Err(err) => Err(err.into()),
        }
    }
}
