//! Camera connection management.
//!
//! Holds the device and transfer-stream handles for one session and owns the
//! single teardown path that releases them. Every handle is stored in an
//! `Option` and taken on release, so each one is released at most once no
//! matter how many times `teardown` runs or how far setup got before failing.
//!
//! ## Teardown Order
//!
//! 1. Stop acquisition, if it was started. A stop failure is logged and
//!    swallowed; the remaining steps still run.
//! 2. Release the stream. This drops every buffer still queued on it, which
//!    frees the pool.
//! 3. Release the device.

use crate::hardware::{DeviceHandle, FrameSource, StreamHandle};

/// Device and stream handles owned by one acquisition session.
#[derive(Debug, Default)]
pub struct CameraConnection {
    device: Option<DeviceHandle>,
    stream: Option<StreamHandle>,
    acquiring: bool,
}

impl CameraConnection {
    /// Create a connection that holds nothing yet.
    pub fn new() -> Self {
        Self::default()
    }

    /// Take ownership of an opened device.
    pub fn attach_device(&mut self, device: DeviceHandle) {
        self.device = Some(device);
    }

    /// Take ownership of a created stream.
    pub fn attach_stream(&mut self, stream: StreamHandle) {
        self.stream = Some(stream);
    }

    /// Record that acquisition was started on the device.
    pub fn mark_acquiring(&mut self) {
        self.acquiring = true;
    }

    /// The opened device, if any.
    pub fn device(&self) -> Option<DeviceHandle> {
        self.device
    }

    /// The created stream, if any.
    pub fn stream(&self) -> Option<StreamHandle> {
        self.stream
    }

    /// Whether acquisition is running.
    pub fn is_acquiring(&self) -> bool {
        self.acquiring
    }

    /// Whether any handle is still held.
    pub fn is_open(&self) -> bool {
        self.device.is_some() || self.stream.is_some()
    }

    /// Release everything held, in teardown order. Never fails.
    pub fn teardown<S: FrameSource + ?Sized>(&mut self, source: &mut S) {
        if self.acquiring {
            self.acquiring = false;
            if let Some(device) = self.device {
                if let Err(e) = source.stop(device) {
                    tracing::warn!(
                        device = device.0,
                        error = %e,
                        "Failed to stop acquisition during teardown; continuing"
                    );
                }
            }
        }

        if let Some(stream) = self.stream.take() {
            source.release_stream(stream);
            tracing::debug!(stream = stream.0, "Released transfer stream");
        }

        if let Some(device) = self.device.take() {
            source.release_device(device);
            tracing::debug!(device = device.0, "Released device");
        }
    }
}
