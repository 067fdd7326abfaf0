use ffmpeg_next::{Packet, codec, frame};

/// Annex-B H.264 decoder fed one access unit at a time.
pub struct H264Decoder {
    inner: codec::decoder::Video,
}

impl H264Decoder {
    pub fn new() -> anyhow::Result<Self> {
        let codec = ffmpeg_next::decoder::find(codec::Id::H264)
            .ok_or(anyhow::anyhow!("h264 decoder not found"))?;
        let inner = codec::Context::new_with_codec(codec).decoder().video()?;
        Ok(Self { inner })
    }

    pub fn send_packet(&mut self, data: &[u8], pts: i64) -> anyhow::Result<()> {
        let mut packet = Packet::copy(data);
        packet.set_pts(Some(pts));
        packet.set_dts(Some(pts));
        self.inner.send_packet(&packet)?;
        Ok(())
    }

    pub fn receive_frame(&mut self) -> anyhow::Result<Option<frame::Video>> {
        let mut frame = frame::Video::empty();
        match self.inner.receive_frame(&mut frame) {
            Ok(()) => Ok(Some(frame)),
            Err(ffmpeg_next::Error::Eof) => Ok(None),
            Err(ffmpeg_next::Error::Other { errno }) if errno == ffmpeg_next::util::error::EAGAIN => {
                Ok(None)
            }
            Err(err) => Err(err.into()),
        }
    }
}
