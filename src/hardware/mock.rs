//! Mock camera for testing and simulation.
//!
//! `MockFrameSource` behaves like a single GenICam camera with an in-memory
//! transfer stream. Frames are synthesized on dequeue into whatever buffer is
//! at the head of the input queue, so buffer recycling discipline is observable
//! exactly as it would be on a real device: a pipeline that forgets to
//! recycle runs the queue dry and starts getting `None`.
//!
//! Every call is counted in `MockStats`. The counters live behind a shared
//! handle so tests can inspect them after the source has been moved into a
//! session.
//!
//! # Example
//!
//! ```
//! use arv_stream::components::frame_pool::PixelFormat;
//! use arv_stream::hardware::mock::{MockFailure, MockFrameSource};
//!
//! let source = MockFrameSource::new(640, 480, PixelFormat::MONO_16)
//!     .with_failure(MockFailure::Start);
//! let stats = source.stats();
//! assert_eq!(stats.snapshot().starts, 0);
//! ```

use crate::components::frame_pool::{BufferStatus, FrameBuffer, PixelFormat};
use crate::hardware::{AcquisitionMode, DeviceHandle, FrameSource, HardwareError, StreamHandle};
use parking_lot::Mutex;
use std::collections::{HashSet, VecDeque};
use std::sync::Arc;

/// Hardware call that the mock should fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MockFailure {
    /// `open_first_device` finds nothing.
    NoDevice,
    /// `set_mode` is rejected.
    SetMode,
    /// `create_stream` fails.
    CreateStream,
    /// `payload_size` cannot be read.
    PayloadSize,
    /// `start` is refused.
    Start,
    /// `stop` reports an error.
    Stop,
}

/// Pixel content the mock writes into each frame.
#[derive(Debug, Clone, PartialEq)]
pub enum FramePattern {
    /// Diagonal ramp that shifts by one step per frame.
    Gradient,
    /// Every sample has the same value.
    Constant(u16),
    /// The same raw bytes for every frame.
    Raw(Vec<u8>),
}

/// Call counters recorded by `MockFrameSource`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MockStats {
    /// Successful `open_first_device` calls.
    pub devices_opened: u32,
    /// `release_device` calls.
    pub devices_released: u32,
    /// Successful `create_stream` calls.
    pub streams_created: u32,
    /// `release_stream` calls.
    pub streams_released: u32,
    /// `start` calls, successful or not.
    pub starts: u32,
    /// `stop` calls, successful or not.
    pub stops: u32,
    /// Buffers pushed onto the input queue.
    pub enqueued: u64,
    /// `dequeue` calls, including those returning `None`.
    pub dequeue_calls: u64,
    /// Buffers actually handed out by `dequeue`.
    pub dequeued: u64,
    /// Buffers dropped when the stream was released.
    pub buffers_freed: u64,
    /// Distinct buffer ids ever queued.
    pub distinct_buffers: usize,
    /// Largest number of buffers simultaneously outside the input queue.
    pub max_outstanding: usize,
}

/// Shared view of a mock's counters.
#[derive(Debug, Clone, Default)]
pub struct MockStatsHandle(Arc<Mutex<MockStats>>);

impl MockStatsHandle {
    /// Copy of the current counters.
    #[must_use]
    pub fn snapshot(&self) -> MockStats {
        self.0.lock().clone()
    }

    fn update(&self, f: impl FnOnce(&mut MockStats)) {
        f(&mut self.0.lock());
    }
}

/// Simulated camera with an in-memory transfer stream.
pub struct MockFrameSource {
    width: u32,
    height: u32,
    pixel_format: PixelFormat,
    model: String,
    pattern: FramePattern,
    failure: Option<MockFailure>,
    payload_override: Option<usize>,
    invalid_every: Option<u64>,
    incomplete_every: Option<u64>,
    oversized_every: Option<u64>,

    device: Option<DeviceHandle>,
    stream: Option<StreamHandle>,
    acquiring: bool,
    next_handle: u32,
    queue: VecDeque<FrameBuffer>,
    known_buffers: HashSet<usize>,
    frame_number: u64,
    stats: MockStatsHandle,
}

impl MockFrameSource {
    /// Create a mock camera producing `width` x `height` frames.
    pub fn new(width: u32, height: u32, pixel_format: PixelFormat) -> Self {
        Self {
            width,
            height,
            pixel_format,
            model: "MockCamera".to_string(),
            pattern: FramePattern::Gradient,
            failure: None,
            payload_override: None,
            invalid_every: None,
            incomplete_every: None,
            oversized_every: None,
            device: None,
            stream: None,
            acquiring: false,
            next_handle: 1,
            queue: VecDeque::new(),
            known_buffers: HashSet::new(),
            frame_number: 0,
            stats: MockStatsHandle::default(),
        }
    }

    /// Fail one hardware call.
    #[must_use]
    pub fn with_failure(mut self, failure: MockFailure) -> Self {
        self.failure = Some(failure);
        self
    }

    /// Set the pixel content.
    #[must_use]
    pub fn with_pattern(mut self, pattern: FramePattern) -> Self {
        self.pattern = pattern;
        self
    }

    /// Set the reported model name.
    #[must_use]
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    /// Report this payload size instead of the one implied by the geometry.
    #[must_use]
    pub fn with_payload_size(mut self, payload_size: usize) -> Self {
        self.payload_override = Some(payload_size);
        self
    }

    /// Make every `n`th dequeue return `None`, leaving the queue untouched.
    #[must_use]
    pub fn with_invalid_every(mut self, n: u64) -> Self {
        self.invalid_every = Some(n.max(1));
        self
    }

    /// Make every `n`th delivered buffer come back `Incomplete`.
    #[must_use]
    pub fn with_incomplete_every(mut self, n: u64) -> Self {
        self.incomplete_every = Some(n.max(1));
        self
    }

    /// Make every `n`th delivered buffer claim a `u32::MAX` x `u32::MAX`
    /// geometry while carrying a normal payload.
    #[must_use]
    pub fn with_oversized_every(mut self, n: u64) -> Self {
        self.oversized_every = Some(n.max(1));
        self
    }

    /// Handle to the call counters.
    #[must_use]
    pub fn stats(&self) -> MockStatsHandle {
        self.stats.clone()
    }

    /// Buffers currently sitting in the input queue.
    pub fn queued(&self) -> usize {
        self.queue.len()
    }

    fn fails(&self, failure: MockFailure) -> bool {
        self.failure == Some(failure)
    }

    fn bytes_per_pixel(&self) -> usize {
        (self.pixel_format.bits_per_pixel() as usize).div_ceil(8)
    }

    fn frame_bytes(&self) -> usize {
        self.width as usize * self.height as usize * self.bytes_per_pixel()
    }

    fn handle(&mut self) -> u32 {
        let h = self.next_handle;
        self.next_handle += 1;
        h
    }

    fn synthesize(&self, dst: &mut [u8]) {
        let bpp = self.bytes_per_pixel();
        match &self.pattern {
            FramePattern::Raw(bytes) => {
                let n = bytes.len().min(dst.len());
                dst[..n].copy_from_slice(&bytes[..n]);
                dst[n..].fill(0);
            }
            FramePattern::Constant(value) => {
                for pixel in dst.chunks_mut(bpp) {
                    write_sample(pixel, u32::from(*value));
                }
            }
            FramePattern::Gradient => {
                let width = self.width.max(1) as u64;
                let modulus: u64 = if bpp == 1 { 256 } else { 4096 };
                for (i, pixel) in dst.chunks_mut(bpp).enumerate() {
                    let x = i as u64 % width;
                    let y = i as u64 / width;
                    let value = (x + y + self.frame_number) % modulus;
                    write_sample(pixel, value as u32);
                }
            }
        }
    }
}

fn write_sample(pixel: &mut [u8], value: u32) {
    let bytes = value.to_le_bytes();
    let n = pixel.len().min(bytes.len());
    pixel[..n].copy_from_slice(&bytes[..n]);
}

impl FrameSource for MockFrameSource {
    fn open_first_device(&mut self) -> Result<DeviceHandle, HardwareError> {
        if self.fails(MockFailure::NoDevice) {
            return Err(HardwareError::new("No device found on any interface"));
        }
        let device = DeviceHandle(self.handle());
        self.device = Some(device);
        self.stats.update(|s| s.devices_opened += 1);
        Ok(device)
    }

    fn device_model(&self, device: DeviceHandle) -> Option<String> {
        (self.device == Some(device)).then(|| self.model.clone())
    }

    fn set_mode(
        &mut self,
        _device: DeviceHandle,
        mode: AcquisitionMode,
    ) -> Result<(), HardwareError> {
        if self.fails(MockFailure::SetMode) {
            return Err(HardwareError::new(format!(
                "AcquisitionMode '{mode}' not writable"
            )));
        }
        Ok(())
    }

    fn create_stream(&mut self, _device: DeviceHandle) -> Result<StreamHandle, HardwareError> {
        if self.fails(MockFailure::CreateStream) {
            return Err(HardwareError::new("Stream channel unavailable"));
        }
        let stream = StreamHandle(self.handle());
        self.stream = Some(stream);
        self.stats.update(|s| s.streams_created += 1);
        Ok(stream)
    }

    fn payload_size(&mut self, _device: DeviceHandle) -> Result<usize, HardwareError> {
        if self.fails(MockFailure::PayloadSize) {
            return Err(HardwareError::new("PayloadSize feature not readable"));
        }
        Ok(self.payload_override.unwrap_or_else(|| self.frame_bytes()))
    }

    fn enqueue(&mut self, _stream: StreamHandle, buffer: FrameBuffer) {
        self.known_buffers.insert(buffer.id());
        self.queue.push_back(buffer);
        let distinct = self.known_buffers.len();
        self.stats.update(|s| {
            s.enqueued += 1;
            s.distinct_buffers = distinct;
        });
    }

    fn dequeue(&mut self, stream: StreamHandle) -> Option<FrameBuffer> {
        self.stats.update(|s| s.dequeue_calls += 1);
        if !self.acquiring || self.stream != Some(stream) {
            return None;
        }

        self.frame_number += 1;
        if let Some(n) = self.invalid_every {
            if self.frame_number % n == 0 {
                return None;
            }
        }

        let mut buffer = self.queue.pop_front()?;
        let len = self.frame_bytes();
        let (width, height) = match self.oversized_every {
            Some(n) if self.frame_number % n == 0 => (u32::MAX, u32::MAX),
            _ => (self.width, self.height),
        };
        buffer.fill_with(width, height, self.pixel_format, len, |dst| {
            self.synthesize(dst)
        });

        if let Some(n) = self.incomplete_every {
            if self.frame_number % n == 0 {
                buffer.mark(BufferStatus::Incomplete);
            }
        }

        let outstanding = self.known_buffers.len() - self.queue.len();
        self.stats.update(|s| {
            s.dequeued += 1;
            s.max_outstanding = s.max_outstanding.max(outstanding);
        });
        Some(buffer)
    }

    fn start(&mut self, _device: DeviceHandle) -> Result<(), HardwareError> {
        self.stats.update(|s| s.starts += 1);
        if self.fails(MockFailure::Start) {
            return Err(HardwareError::new("AcquisitionStart command refused"));
        }
        self.acquiring = true;
        Ok(())
    }

    fn stop(&mut self, _device: DeviceHandle) -> Result<(), HardwareError> {
        self.stats.update(|s| s.stops += 1);
        if self.fails(MockFailure::Stop) {
            return Err(HardwareError::new("AcquisitionStop command timed out"));
        }
        self.acquiring = false;
        Ok(())
    }

    fn release_stream(&mut self, _stream: StreamHandle) {
        let freed = self.queue.len() as u64;
        self.queue.clear();
        self.known_buffers.clear();
        self.stream = None;
        self.acquiring = false;
        self.stats.update(|s| {
            s.streams_released += 1;
            s.buffers_freed += freed;
        });
    }

    fn release_device(&mut self, _device: DeviceHandle) {
        self.device = None;
        self.stats.update(|s| s.devices_released += 1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn running(source: &mut MockFrameSource, buffers: usize) -> StreamHandle {
        let device = source.open_first_device().unwrap();
        let stream = source.create_stream(device).unwrap();
        let capacity = source.payload_size(device).unwrap();
        for id in 0..buffers {
            source.enqueue(stream, FrameBuffer::with_capacity(id, capacity).unwrap());
        }
        source.start(device).unwrap();
        stream
    }

    #[test]
    fn test_dequeue_requires_started_stream() {
        let mut source = MockFrameSource::new(2, 2, PixelFormat::MONO_8);
        let device = source.open_first_device().unwrap();
        let stream = source.create_stream(device).unwrap();
        source.enqueue(stream, FrameBuffer::with_capacity(0, 4).unwrap());

        assert!(source.dequeue(stream).is_none());
        assert_eq!(source.stats().snapshot().dequeue_calls, 1);
    }

    #[test]
    fn test_gradient_frames_shift() {
        let mut source = MockFrameSource::new(3, 1, PixelFormat::MONO_8);
        let stream = running(&mut source, 1);

        let first = source.dequeue(stream).unwrap();
        assert_eq!(first.raw_data(), Some(&[1u8, 2, 3][..]));
        source.enqueue(stream, first);

        let second = source.dequeue(stream).unwrap();
        assert_eq!(second.raw_data(), Some(&[2u8, 3, 4][..]));
    }

    #[test]
    fn test_constant_sixteen_bit_pattern() {
        let mut source = MockFrameSource::new(2, 1, PixelFormat::MONO_16)
            .with_pattern(FramePattern::Constant(1000));
        let stream = running(&mut source, 1);

        let buffer = source.dequeue(stream).unwrap();
        let [lo, hi] = 1000u16.to_le_bytes();
        assert_eq!(buffer.raw_data(), Some(&[lo, hi, lo, hi][..]));
        assert_eq!(buffer.pixel_bits(), 16);
    }

    #[test]
    fn test_empty_queue_yields_none() {
        let mut source = MockFrameSource::new(2, 2, PixelFormat::MONO_8);
        let stream = running(&mut source, 1);

        let held = source.dequeue(stream);
        assert!(held.is_some());
        assert!(source.dequeue(stream).is_none());
    }

    #[test]
    fn test_invalid_every_keeps_buffer_queued() {
        let mut source = MockFrameSource::new(2, 2, PixelFormat::MONO_8).with_invalid_every(2);
        let stream = running(&mut source, 1);

        let buffer = source.dequeue(stream).unwrap();
        source.enqueue(stream, buffer);
        assert!(source.dequeue(stream).is_none());
        assert_eq!(source.queued(), 1);
    }

    #[test]
    fn test_incomplete_every_marks_status() {
        let mut source =
            MockFrameSource::new(2, 2, PixelFormat::MONO_8).with_incomplete_every(1);
        let stream = running(&mut source, 1);

        let buffer = source.dequeue(stream).unwrap();
        assert_eq!(buffer.status(), BufferStatus::Incomplete);
    }

    #[test]
    fn test_oversized_every_reports_huge_geometry() {
        let mut source = MockFrameSource::new(2, 2, PixelFormat::MONO_8).with_oversized_every(2);
        let stream = running(&mut source, 1);

        let first = source.dequeue(stream).unwrap();
        assert_eq!((first.width(), first.height()), (2, 2));
        source.enqueue(stream, first);

        let second = source.dequeue(stream).unwrap();
        assert_eq!((second.width(), second.height()), (u32::MAX, u32::MAX));
        assert_eq!(second.status(), BufferStatus::Success);
        assert_eq!(second.raw_data().map(<[u8]>::len), Some(4));
    }

    #[test]
    fn test_release_stream_frees_queued_buffers() {
        let mut source = MockFrameSource::new(2, 2, PixelFormat::MONO_8);
        let stream = running(&mut source, 3);
        let stats = source.stats();

        source.release_stream(stream);
        let snapshot = stats.snapshot();
        assert_eq!(snapshot.buffers_freed, 3);
        assert_eq!(snapshot.streams_released, 1);
        assert_eq!(source.queued(), 0);
    }

    #[test]
    fn test_model_reported_only_for_open_device() {
        let mut source = MockFrameSource::new(2, 2, PixelFormat::MONO_8).with_model("FLIR A35");
        let device = source.open_first_device().unwrap();

        assert_eq!(source.device_model(device), Some("FLIR A35".to_string()));
        assert_eq!(source.device_model(DeviceHandle(99)), None);
    }
}
