//! Frame buffers and the fixed-size pool that feeds the transfer stream.
//!
//! The pool pre-allocates every buffer once, sized from the payload the
//! camera reports, and never frees one individually. Buffers live in exactly
//! one place at a time:
//!
//! ```text
//! BufferPool (idle) --seed--> device input queue --dequeue--> on loan
//!                                   ^                            |
//!                                   +---------- recycle ---------+
//! ```
//!
//! After `seed()` the idle list is empty and the device library owns
//! queuing. A buffer obtained from `dequeue` must be recycled exactly once,
//! whatever happened while it was on loan, or the device runs dry.
//! Releasing the transfer stream drops every buffer still queued on it, which
//! is how the whole pool is freed at teardown.

use crate::error::{AcqError, AcqResult};
use crate::hardware::{FrameSource, StreamHandle};
use std::fmt;

/// Default pool size: two buffers, one being filled while one is processed.
pub const DEFAULT_POOL_SIZE: usize = 2;

/// Largest pool size seen in deployed configurations.
pub const MAX_POOL_SIZE: usize = 100;

/// Completion status of a dequeued buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BufferStatus {
    /// The device filled the buffer completely.
    Success,
    /// Transfer stopped part-way (dropped packets, aborted readout).
    Incomplete,
    /// The buffer holds no frame.
    Invalid,
}

impl BufferStatus {
    /// Lowercase status name.
    pub fn as_str(&self) -> &'static str {
        match self {
            BufferStatus::Success => "success",
            BufferStatus::Incomplete => "incomplete",
            BufferStatus::Invalid => "invalid",
        }
    }
}

impl fmt::Display for BufferStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// GenICam pixel format code.
///
/// Bits 16..24 of the code hold the number of bits each pixel occupies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PixelFormat(pub u32);

impl PixelFormat {
    /// 8-bit monochrome.
    pub const MONO_8: PixelFormat = PixelFormat(0x0108_0001);
    /// 10-bit monochrome in a 16-bit container.
    pub const MONO_10: PixelFormat = PixelFormat(0x0110_0003);
    /// 12-bit monochrome in a 16-bit container.
    pub const MONO_12: PixelFormat = PixelFormat(0x0110_0005);
    /// 16-bit monochrome.
    pub const MONO_16: PixelFormat = PixelFormat(0x0110_0007);
    /// 24-bit packed RGB.
    pub const RGB_8_PACKED: PixelFormat = PixelFormat(0x0218_0014);

    /// Bits occupied by one pixel.
    #[inline]
    #[must_use]
    pub fn bits_per_pixel(&self) -> u32 {
        (self.0 >> 16) & 0xff
    }

    /// Well-known name, if this is one of the constants above.
    pub fn name(&self) -> Option<&'static str> {
        match *self {
            PixelFormat::MONO_8 => Some("Mono8"),
            PixelFormat::MONO_10 => Some("Mono10"),
            PixelFormat::MONO_12 => Some("Mono12"),
            PixelFormat::MONO_16 => Some("Mono16"),
            PixelFormat::RGB_8_PACKED => Some("RGB8Packed"),
            _ => None,
        }
    }
}

impl fmt::Display for PixelFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.name() {
            Some(name) => write!(f, "{name}"),
            None => write!(f, "0x{:08x}", self.0),
        }
    }
}

/// One pooled transfer buffer plus the metadata of its last acquisition.
///
/// The byte region is allocated once and never grows; `reset()` clears the
/// metadata but leaves pixel bytes in place since the next fill overwrites them.
#[derive(Debug)]
pub struct FrameBuffer {
    id: usize,
    data: Vec<u8>,
    filled: usize,
    width: u32,
    height: u32,
    pixel_format: PixelFormat,
    status: BufferStatus,
}

impl FrameBuffer {
    /// Allocate a zeroed buffer of `capacity` bytes.
    ///
    /// Fails with `AcqError::Allocation` instead of aborting when memory is short.
    pub fn with_capacity(id: usize, capacity: usize) -> AcqResult<Self> {
        let mut data = Vec::new();
        data.try_reserve_exact(capacity)
            .map_err(|e| AcqError::allocation(capacity, e.to_string()))?;
        data.resize(capacity, 0);

        Ok(Self {
            id,
            data,
            filled: 0,
            width: 0,
            height: 0,
            pixel_format: PixelFormat::MONO_8,
            status: BufferStatus::Invalid,
        })
    }

    /// Pool-assigned identifier, stable for the buffer's lifetime.
    #[inline]
    pub fn id(&self) -> usize {
        self.id
    }

    /// Fixed byte capacity.
    #[inline]
    pub fn capacity(&self) -> usize {
        self.data.len()
    }

    /// Completion status of the last acquisition.
    #[inline]
    pub fn status(&self) -> BufferStatus {
        self.status
    }

    /// Image width in pixels.
    #[inline]
    pub fn width(&self) -> u32 {
        self.width
    }

    /// Image height in pixels.
    #[inline]
    pub fn height(&self) -> u32 {
        self.height
    }

    /// Pixel format reported by the device.
    #[inline]
    pub fn pixel_format(&self) -> PixelFormat {
        self.pixel_format
    }

    /// Bits per pixel derived from the pixel format.
    #[inline]
    pub fn pixel_bits(&self) -> u32 {
        self.pixel_format.bits_per_pixel()
    }

    /// Bytes written by the last acquisition, or `None` if nothing was written.
    #[must_use]
    pub fn raw_data(&self) -> Option<&[u8]> {
        if self.filled == 0 {
            None
        } else {
            Some(&self.data[..self.filled])
        }
    }

    /// Write a frame into the buffer through a callback.
    ///
    /// `len` is clamped to the capacity; a clamped write is marked
    /// `Incomplete`. Returns the number of bytes the callback was given.
    pub fn fill_with<F>(
        &mut self,
        width: u32,
        height: u32,
        pixel_format: PixelFormat,
        len: usize,
        write: F,
    ) -> usize
    where
        F: FnOnce(&mut [u8]),
    {
        let written = len.min(self.data.len());
        write(&mut self.data[..written]);

        self.filled = written;
        self.width = width;
        self.height = height;
        self.pixel_format = pixel_format;
        self.status = if written == len {
            BufferStatus::Success
        } else {
            BufferStatus::Incomplete
        };
        written
    }

    /// Copy a frame into the buffer.
    pub fn fill(
        &mut self,
        width: u32,
        height: u32,
        pixel_format: PixelFormat,
        payload: &[u8],
    ) -> usize {
        self.fill_with(width, height, pixel_format, payload.len(), |dst| {
            dst.copy_from_slice(&payload[..dst.len()]);
        })
    }

    /// Override the completion status.
    pub fn mark(&mut self, status: BufferStatus) {
        self.status = status;
    }

    /// Clear per-acquisition metadata before the buffer goes back to the device.
    pub fn reset(&mut self) {
        self.filled = 0;
        self.width = 0;
        self.height = 0;
        self.status = BufferStatus::Invalid;
    }
}

/// Fixed set of `FrameBuffer`s circulating through one transfer stream.
#[derive(Debug)]
pub struct BufferPool {
    idle: Vec<FrameBuffer>,
    capacity: usize,
    payload_size: usize,
    on_loan: usize,
    recycled: u64,
}

impl BufferPool {
    /// Allocate `capacity` buffers of `payload_size` bytes each.
    pub fn create(capacity: usize, payload_size: usize) -> AcqResult<Self> {
        if capacity == 0 {
            return Err(AcqError::allocation(0, "pool capacity must be > 0"));
        }
        if payload_size == 0 {
            return Err(AcqError::allocation(0, "device reported a zero payload size"));
        }

        let total = capacity
            .checked_mul(payload_size)
            .ok_or_else(|| AcqError::allocation(usize::MAX, "pool size overflows usize"))?;

        let mut idle = Vec::new();
        idle.try_reserve_exact(capacity)
            .map_err(|e| AcqError::allocation(total, e.to_string()))?;
        for id in 0..capacity {
            idle.push(FrameBuffer::with_capacity(id, payload_size)?);
        }

        tracing::info!(
            pool_size = capacity,
            payload_size,
            total_mb = total as f64 / (1024.0 * 1024.0),
            "Creating buffer pool"
        );

        Ok(Self {
            idle,
            capacity,
            payload_size,
            on_loan: 0,
            recycled: 0,
        })
    }

    /// Hand every idle buffer to the device's input queue.
    ///
    /// Returns how many buffers were queued. A second call queues nothing.
    pub fn seed<S: FrameSource + ?Sized>(&mut self, source: &mut S, stream: StreamHandle) -> usize {
        let count = self.idle.len();
        for buffer in self.idle.drain(..) {
            source.enqueue(stream, buffer);
        }
        tracing::debug!(count, "Seeded transfer stream");
        count
    }

    /// Record that `buffer` left the device's output queue.
    pub fn lend(&mut self, buffer: FrameBuffer) -> FrameBuffer {
        self.on_loan += 1;
        buffer
    }

    /// Return a borrowed buffer to the device's input queue.
    pub fn recycle<S: FrameSource + ?Sized>(
        &mut self,
        mut buffer: FrameBuffer,
        source: &mut S,
        stream: StreamHandle,
    ) {
        buffer.reset();
        tracing::trace!(buffer_id = buffer.id(), "Recycling buffer");
        source.enqueue(stream, buffer);
        self.on_loan = self.on_loan.saturating_sub(1);
        self.recycled += 1;
    }

    /// Number of buffers in the pool.
    #[inline]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Byte size of each buffer.
    #[inline]
    pub fn payload_size(&self) -> usize {
        self.payload_size
    }

    /// Buffers not yet handed to the device.
    #[inline]
    pub fn idle(&self) -> usize {
        self.idle.len()
    }

    /// Buffers currently on loan to the consumer.
    #[inline]
    pub fn outstanding(&self) -> usize {
        self.on_loan
    }

    /// Total recycle operations since creation.
    #[inline]
    pub fn recycled(&self) -> u64 {
        self.recycled
    }
}
