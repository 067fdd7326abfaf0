use std::{
    pin::Pin,
    task::{Context, Poll},
};

use bytes::Bytes;
use futures::Stream;
use tokio::sync::mpsc::{self, error::TrySendError};

use crate::{bridge::FrameHandler, frame::OutputFrame};

/// Creates a bounded handler/stream pair with room for 32 frames.
pub fn frame_stream() -> (StreamHandler, FrameStream) {
    frame_stream_with_capacity(32)
}

pub fn frame_stream_with_capacity(capacity: usize) -> (StreamHandler, FrameStream) {
    let (tx, rx) = mpsc::channel(capacity);
    (StreamHandler { tx }, FrameStream { rx })
}

/// Handler side: forwards frames into the stream without blocking the native thread.
/// A full or dropped stream is reported as a handler error and the frame is lost.
pub struct StreamHandler {
    tx: mpsc::Sender<OutputFrame>,
}

impl FrameHandler for StreamHandler {
    fn handle(&mut self, data: Bytes, seq: u64) -> anyhow::Result<()> {
        self.tx
            .try_send(OutputFrame::new(seq, data))
            .map_err(|e| match e {
                TrySendError::Full(frame) => {
                    anyhow::anyhow!("frame stream full, dropping frame {}", frame.seq)
                }
                TrySendError::Closed(frame) => {
                    anyhow::anyhow!("frame stream closed, dropping frame {}", frame.seq)
                }
            })
    }
}

/// Frames in delivery order. Ends once the converter owning the handler is gone.
pub struct FrameStream {
    rx: mpsc::Receiver<OutputFrame>,
}

impl FrameStream {
    /// Waits for the next frame outside of an async context.
    pub fn blocking_next(&mut self) -> Option<OutputFrame> {
        self.rx.blocking_recv()
    }
}

impl Stream for FrameStream {
    type Item = OutputFrame;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.get_mut().rx.poll_recv(cx)
    }
}

#[cfg(test)]
#[path = "stream_test.rs"]
mod stream_test;
