use std::time::Duration;

use frame_bridge::{
    ConverterCore, NativePipeline,
    pattern::{PatternPipeline, PatternSettings},
};
use tokio_util::sync::CancellationToken;

use crate::{config::Backend, sink::JpegFileSink, source::FrameSource};

mod config;
mod sink;
mod source;

fn init_logging() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .filter_module("ffmpeg_next", log::LevelFilter::Warn)
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_logging();
    let config = config::config();

    let cancel = CancellationToken::new();
    let cancel_clone = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            log::info!("interrupted, shutting down");
            cancel_clone.cancel();
        }
    });

    let source = FrameSource::open(config.input_dir())?;
    if source.is_empty() {
        log::warn!("no frame_<n>.h264 files in {}", config.input_dir().display());
    }
    let sink = JpegFileSink::new(config.output_dir(), config.min_frame_bytes())?;
    let stats = sink.stats();
    log::info!(
        "converting {} frames with {:?} backend into {}",
        source.len(),
        config.backend(),
        sink.dir().display()
    );

    match config.backend() {
        Backend::Pattern => {
            let settings = PatternSettings {
                width: u16::try_from(config.width())?,
                height: u16::try_from(config.height())?,
                ..Default::default()
            };
            convert::<PatternPipeline>(settings, sink, &source, &cancel).await?;
        }
        #[cfg(feature = "ffmpeg")]
        Backend::Ffmpeg => {
            let settings = frame_bridge::ffmpeg::pipeline::JpegSettings {
                width: config.width(),
                height: config.height(),
                ..Default::default()
            };
            convert::<frame_bridge::ffmpeg::pipeline::FfmpegPipeline>(
                settings, sink, &source, &cancel,
            )
            .await?;
        }
        #[cfg(not(feature = "ffmpeg"))]
        Backend::Ffmpeg => anyhow::bail!("ffmpeg backend requested but not compiled in"),
    }

    log::info!(
        "processing complete: {} frames saved to {}, {} rejected",
        stats.saved(),
        config.output_dir().display(),
        stats.rejected()
    );
    Ok(())
}

async fn convert<P: NativePipeline>(
    settings: P::Config,
    sink: JpegFileSink,
    source: &FrameSource,
    cancel: &CancellationToken,
) -> anyhow::Result<()> {
    let config = config::config();
    let converter = ConverterCore::<P>::new(settings, sink)?;
    converter.start()?;

    log::info!("pipeline started, waiting {:?} before feeding", config.settle());
    let mut interrupted = sleep_or_cancelled(config.settle(), cancel).await;

    if !interrupted {
        for frame in source.frames() {
            match frame {
                Ok((key, data)) => {
                    converter.push_frame(&data)?;
                    log::info!("pushed frame {} ({} bytes)", key, data.len());
                }
                Err(e) => log::error!("{:#}", e),
            }
            if sleep_or_cancelled(config.frame_interval(), cancel).await {
                interrupted = true;
                break;
            }
        }
    }

    if !interrupted {
        log::info!("all frames pushed, draining for {:?}", config.drain());
        sleep_or_cancelled(config.drain(), cancel).await;
    }

    let delivered = tokio::task::spawn_blocking(move || {
        converter.close();
        converter.frames_delivered()
    })
    .await?;
    log::info!("pipeline closed after {} frames", delivered);
    Ok(())
}

/// Returns `true` if `cancel` fired before `duration` elapsed.
async fn sleep_or_cancelled(duration: Duration, cancel: &CancellationToken) -> bool {
    tokio::select! {
        _ = cancel.cancelled() => true,
        _ = tokio::time::sleep(duration) => false,
    }
}
