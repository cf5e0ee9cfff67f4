//! Lazy stream of normalized frames over one acquisition session.
//!
//! `FrameStream` is single-pass and bound to its session for its whole life.
//! Each `next()` pulls a raw buffer, normalizes it, hands the buffer straight
//! back to the device and yields the result. Per-frame failures are yielded
//! as `Err` items and the stream keeps going; the sequence ends only when the
//! finite count is used up, the stream is cancelled, or the session stops.
//!
//! Ending the stream in any way (exhaustion, `cancel()`, drop) closes the
//! session exactly once.

use crate::components::acquisition::{AcquisitionSession, SessionState};
use crate::components::frame_pool::{BufferStatus, FrameBuffer};
use crate::error::{AcqError, AcqResult};
use crate::hardware::FrameSource;
use crate::normalize::normalize;
use std::iter::FusedIterator;
use std::time::{Duration, Instant};

/// Request parameters for a `FrameStream`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StreamConfig {
    /// Items to yield; `None` streams until cancelled.
    pub count: Option<u64>,
    /// Hardware frames consumed per yielded item. Must be at least 1.
    pub step: u32,
    /// Upper bound on yields per second.
    pub max_fps: Option<f64>,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            count: None,
            step: 1,
            max_fps: None,
        }
    }
}

impl StreamConfig {
    /// Stream exactly `count` items.
    pub fn finite(count: u64) -> Self {
        Self {
            count: Some(count),
            ..Self::default()
        }
    }

    /// Stream until cancelled.
    pub fn infinite() -> Self {
        Self::default()
    }

    /// Consume `step` hardware frames per yielded item.
    #[must_use]
    pub fn with_step(mut self, step: u32) -> Self {
        self.step = step;
        self
    }

    /// Cap the yield rate.
    #[must_use]
    pub fn with_max_fps(mut self, max_fps: f64) -> Self {
        self.max_fps = Some(max_fps);
        self
    }

    fn frame_interval(&self) -> Option<Duration> {
        self.max_fps
            .filter(|fps| fps.is_finite() && *fps > 0.0)
            .map(|fps| Duration::from_secs_f64(1.0 / fps))
    }
}

/// One contrast-stretched 8-bit frame, owned by the caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NormalizedFrame {
    /// Position of the source buffer in the session's delivery order, from 1.
    pub frame_number: u64,
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
    /// Bits per pixel of the raw frame before normalization.
    pub source_bits: u32,
    /// `width * height` samples, or empty if the device wrote nothing.
    pub data: Vec<u8>,
}

impl NormalizedFrame {
    /// Normalize a filled buffer. The buffer is only read; the caller recycles it.
    ///
    /// # Errors
    ///
    /// - `IncompleteBuffer` if the device did not complete the buffer
    /// - `TruncatedFrame` or `Allocation` from normalization
    pub fn from_buffer(buffer: &FrameBuffer, frame_number: u64) -> AcqResult<Self> {
        if buffer.status() != BufferStatus::Success {
            return Err(AcqError::IncompleteBuffer {
                status: buffer.status(),
            });
        }

        let raw = buffer.raw_data().unwrap_or_default();
        let data = normalize(raw, buffer.width(), buffer.height(), buffer.pixel_bits())?;

        Ok(Self {
            frame_number,
            width: buffer.width(),
            height: buffer.height(),
            source_bits: buffer.pixel_bits(),
            data,
        })
    }

    /// Number of output samples.
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// True if the device delivered no pixel data.
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

/// Pull one buffer, normalize it, and recycle it whatever the outcome.
pub(crate) fn acquire_normalized<S: FrameSource>(
    session: &mut AcquisitionSession<S>,
) -> AcqResult<NormalizedFrame> {
    let buffer = session.pull()?;
    let result = NormalizedFrame::from_buffer(&buffer, session.frames_delivered());
    session.recycle(buffer);
    result
}

/// Lazy, non-restartable sequence of `AcqResult<NormalizedFrame>`.
pub struct FrameStream<S: FrameSource> {
    session: AcquisitionSession<S>,
    remaining: Option<u64>,
    step: u32,
    frame_interval: Option<Duration>,
    last_pull: Option<Instant>,
    finished: bool,
}

impl<S: FrameSource> FrameStream<S> {
    /// Wrap an open session.
    ///
    /// A `step` of 0 is treated as 1.
    pub fn new(session: AcquisitionSession<S>, config: StreamConfig) -> Self {
        tracing::debug!(
            count = ?config.count,
            step = config.step,
            max_fps = ?config.max_fps,
            "Frame stream created"
        );
        Self {
            session,
            remaining: config.count,
            step: config.step.max(1),
            frame_interval: config.frame_interval(),
            last_pull: None,
            finished: false,
        }
    }

    /// Items left to yield; `None` for an infinite stream.
    pub fn remaining(&self) -> Option<u64> {
        if self.finished {
            Some(0)
        } else {
            self.remaining
        }
    }

    /// True once the session has been closed.
    pub fn is_finished(&self) -> bool {
        self.finished
    }

    /// The session driving this stream.
    pub fn session(&self) -> &AcquisitionSession<S> {
        &self.session
    }

    /// End the stream now and release the hardware.
    ///
    /// Takes effect between pulls; later `next()` calls return `None`.
    pub fn cancel(&mut self) {
        if !self.finished {
            tracing::info!(remaining = ?self.remaining, "Frame stream cancelled");
        }
        self.finish();
    }

    fn finish(&mut self) {
        if self.finished {
            return;
        }
        self.finished = true;
        self.session.close();
    }

    fn pace(&mut self) {
        if let (Some(interval), Some(last)) = (self.frame_interval, self.last_pull) {
            let elapsed = last.elapsed();
            if elapsed < interval {
                std::thread::sleep(interval - elapsed);
            }
        }
        self.last_pull = Some(Instant::now());
    }

    fn skip_one(&mut self) -> AcqResult<()> {
        let buffer = self.session.pull()?;
        tracing::debug!(
            buffer_id = buffer.id(),
            frame = self.session.frames_delivered(),
            "Skipping frame"
        );
        self.session.recycle(buffer);
        Ok(())
    }
}

impl<S: FrameSource> Iterator for FrameStream<S> {
    type Item = AcqResult<NormalizedFrame>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.finished {
            return None;
        }
        if self.remaining == Some(0) || self.session.state() != SessionState::Streaming {
            self.finish();
            return None;
        }

        self.pace();

        for _ in 1..self.step {
            match self.skip_one() {
                Ok(()) => {}
                Err(e) if e.is_per_frame() => {
                    tracing::warn!(error = %e, "Per-frame error on skipped frame");
                }
                Err(e) => {
                    self.finish();
                    return Some(Err(e));
                }
            }
        }

        let item = acquire_normalized(&mut self.session);
        if let Err(e) = &item {
            if !e.is_per_frame() {
                self.finish();
                return Some(item);
            }
            tracing::warn!(error = %e, "Per-frame error");
        }

        if let Some(n) = self.remaining.as_mut() {
            *n -= 1;
            if *n == 0 {
                self.finish();
            }
        }
        Some(item)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        match self.remaining() {
            Some(n) => (0, Some(usize::try_from(n).unwrap_or(usize::MAX))),
            None => (0, None),
        }
    }
}

impl<S: FrameSource> FusedIterator for FrameStream<S> {}

impl<S: FrameSource> Drop for FrameStream<S> {
    fn drop(&mut self) {
        self.finish();
    }
}
