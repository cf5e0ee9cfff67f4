//! Hardware collaborator seam.
//!
//! `FrameSource` is the only path from the acquisition pipeline to a camera.
//! It mirrors the small subset of a GenICam streaming library the pipeline
//! needs: open the first device, switch it to continuous mode, create a
//! transfer stream, size buffers from the payload, and shuttle buffers through
//! the stream's input and output queues.
//!
//! # Buffer Ownership
//!
//! Buffers move by value. `enqueue` hands a `FrameBuffer` to the device's
//! input queue and `dequeue` hands a filled one back. While a buffer sits in
//! either queue the source owns it; the pipeline never keeps a reference.
//! `release_stream` drops every buffer still queued, which is the only way
//! pooled buffers are freed.
//!
//! # Blocking
//!
//! `dequeue` blocks until the device delivers a frame. No timeout is imposed
//! at this layer; a source that can give up returns `None`.

pub mod mock;

use crate::components::frame_pool::FrameBuffer;
use std::fmt;
use thiserror::Error;

/// Opaque handle to an opened camera.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DeviceHandle(pub u32);

/// Opaque handle to a camera's transfer stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct StreamHandle(pub u32);

/// Acquisition mode requested from the device.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AcquisitionMode {
    /// Free-running acquisition until stopped.
    Continuous,
    /// Acquire exactly one frame per start.
    SingleFrame,
}

impl AcquisitionMode {
    /// GenICam `AcquisitionMode` enumeration entry name.
    pub fn as_str(&self) -> &'static str {
        match self {
            AcquisitionMode::Continuous => "Continuous",
            AcquisitionMode::SingleFrame => "SingleFrame",
        }
    }
}

impl fmt::Display for AcquisitionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Failure reported by the device library.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{message}")]
pub struct HardwareError {
    /// Human-readable message from the device library.
    pub message: String,
}

impl HardwareError {
    /// Create a hardware error from any message.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Camera operations consumed by `AcquisitionSession`.
///
/// Implementations are driven from a single thread by a single owner, so
/// every method takes `&mut self`.
pub trait FrameSource {
    /// Open the first camera found on any interface.
    fn open_first_device(&mut self) -> Result<DeviceHandle, HardwareError>;

    /// Model name of an opened device, if the library reports one.
    fn device_model(&self, device: DeviceHandle) -> Option<String> {
        let _ = device;
        None
    }

    /// Set the device's acquisition mode.
    fn set_mode(&mut self, device: DeviceHandle, mode: AcquisitionMode)
        -> Result<(), HardwareError>;

    /// Create a transfer stream for the device.
    fn create_stream(&mut self, device: DeviceHandle) -> Result<StreamHandle, HardwareError>;

    /// Byte size of one complete frame as reported by the device.
    fn payload_size(&mut self, device: DeviceHandle) -> Result<usize, HardwareError>;

    /// Push an empty buffer onto the stream's input queue.
    fn enqueue(&mut self, stream: StreamHandle, buffer: FrameBuffer);

    /// Pop the next filled buffer, blocking until one is available.
    ///
    /// `None` means the stream produced no valid buffer.
    fn dequeue(&mut self, stream: StreamHandle) -> Option<FrameBuffer>;

    /// Start acquisition.
    fn start(&mut self, device: DeviceHandle) -> Result<(), HardwareError>;

    /// Stop acquisition.
    fn stop(&mut self, device: DeviceHandle) -> Result<(), HardwareError>;

    /// Destroy a stream, dropping any buffers still queued on it.
    fn release_stream(&mut self, stream: StreamHandle);

    /// Close a device.
    fn release_device(&mut self, device: DeviceHandle);
}

impl<S: FrameSource + ?Sized> FrameSource for Box<S> {
    fn open_first_device(&mut self) -> Result<DeviceHandle, HardwareError> {
        (**self).open_first_device()
    }

    fn device_model(&self, device: DeviceHandle) -> Option<String> {
        (**self).device_model(device)
    }

    fn set_mode(
        &mut self,
        device: DeviceHandle,
        mode: AcquisitionMode,
    ) -> Result<(), HardwareError> {
        (**self).set_mode(device, mode)
    }

    fn create_stream(&mut self, device: DeviceHandle) -> Result<StreamHandle, HardwareError> {
        (**self).create_stream(device)
    }

    fn payload_size(&mut self, device: DeviceHandle) -> Result<usize, HardwareError> {
        (**self).payload_size(device)
    }

    fn enqueue(&mut self, stream: StreamHandle, buffer: FrameBuffer) {
        (**self).enqueue(stream, buffer)
    }

    fn dequeue(&mut self, stream: StreamHandle) -> Option<FrameBuffer> {
        (**self).dequeue(stream)
    }

    fn start(&mut self, device: DeviceHandle) -> Result<(), HardwareError> {
        (**self).start(device)
    }

    fn stop(&mut self, device: DeviceHandle) -> Result<(), HardwareError> {
        (**self).stop(device)
    }

    fn release_stream(&mut self, stream: StreamHandle) {
        (**self).release_stream(stream)
    }

    fn release_device(&mut self, device: DeviceHandle) {
        (**self).release_device(device)
    }
}
