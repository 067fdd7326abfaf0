//! Adapter between a callback-driven native transcoding pipeline and application code.
//!
//! ```text
//!  push_frame ──► NativePipeline::submit ──► [native run loop, own thread]
//!                                                     │ callback(&[u8])
//!                                                     ▼
//!                                  FrameBridge (lock, copy, number) ──► FrameHandler
//! ```
//!
//! [`ConverterCore`] owns the pipeline, starts its blocking loop on a dedicated thread and
//! guarantees that once [`ConverterCore::close`] returns no handler call can begin.

pub mod bridge;
pub mod converter;
pub mod error;
#[cfg(feature = "ffmpeg")]
pub mod ffmpeg;
pub mod frame;
pub mod native;
pub mod pattern;
pub mod stream;

#[cfg(test)]
pub(crate) mod testing;

pub use bridge::{FrameBridge, FrameHandler};
pub use converter::{ConverterCore, ConverterOptions, ConverterState};
pub use error::ConverterError;
pub use frame::OutputFrame;
pub use native::{FrameCallback, NativePipeline};
pub use stream::{FrameStream, StreamHandler, frame_stream, frame_stream_with_capacity};
