//! Error types for the acquisition pipeline.
//!
//! `AcqError` is the single error type surfaced by every layer of the crate.
//! Variants fall into two groups that callers must treat differently:
//!
//! 1. **Setup errors** - `DeviceNotFound`, `StreamCreation`, `Allocation`,
//!    `AcquisitionStart`
//!    - Raised by `AcquisitionSession::open()`
//!    - Terminal: the session is `Failed` and every partially acquired
//!      hardware resource has already been released
//!    - Recovery: fix the device (cabling, permissions) and open a new session
//!
//! 2. **Per-frame errors** - `InvalidBuffer`, `IncompleteBuffer`,
//!    `TruncatedFrame`, `Allocation`
//!    - Raised for a single acquisition round
//!    - Recoverable: `FrameStream` yields them as an item of the sequence and
//!      keeps pulling
//!
//! `Allocation` belongs to both groups; its weight depends on where it was
//! raised. An allocation failure while sizing the pool aborts `open()`, an
//! allocation failure while normalizing one frame only loses that frame.
//!
//! Unsupported pixel depths are deliberately *not* an error: the normalizer
//! degrades to an all-zero frame.

use crate::components::acquisition::SessionState;
use crate::components::frame_pool::BufferStatus;
use thiserror::Error;

/// Convenience alias for results using the acquisition error type.
pub type AcqResult<T> = std::result::Result<T, AcqError>;

/// Primary error type for frame acquisition and normalization.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum AcqError {
    /// No camera could be opened.
    ///
    /// **Error Type**: Terminal, setup-time.
    #[error("No camera found: {0}")]
    DeviceNotFound(String),

    /// Setting continuous mode or creating the transfer stream failed.
    ///
    /// **Error Type**: Terminal, setup-time.
    #[error("Failed to create stream: {0}")]
    StreamCreation(String),

    /// Memory for the buffer pool or a normalized frame could not be obtained.
    ///
    /// **Error Type**: Terminal during `open()`, per-frame during streaming.
    #[error("Allocation of {requested} failed: {reason}")]
    Allocation {
        /// Size of the request: bytes for buffers and frames, result slots
        /// for a batch.
        requested: usize,
        /// Why the allocation failed.
        reason: String,
    },

    /// The camera refused to start acquiring.
    ///
    /// **Error Type**: Terminal, setup-time.
    #[error("Failed to start acquisition: {0}")]
    AcquisitionStart(String),

    /// The transfer stream handed back no usable buffer.
    ///
    /// **Error Type**: Per-frame, recoverable.
    #[error("Failed to get buffer")]
    InvalidBuffer,

    /// A buffer was dequeued but the device did not finish filling it.
    ///
    /// **Error Type**: Per-frame, recoverable.
    #[error("Buffer not usable: status {status}")]
    IncompleteBuffer {
        /// Completion status reported by the device.
        status: BufferStatus,
    },

    /// The buffer holds fewer bytes than its reported geometry requires.
    ///
    /// **Error Type**: Per-frame, recoverable.
    #[error("Frame data truncated: expected {expected} bytes, got {actual}")]
    TruncatedFrame {
        /// Bytes implied by width, height and pixel depth.
        expected: usize,
        /// Bytes actually delivered.
        actual: usize,
    },

    /// An operation was attempted in a session state that does not allow it.
    #[error("Cannot {operation} while session is {state}")]
    InvalidState {
        /// The rejected operation.
        operation: &'static str,
        /// State the session was in.
        state: SessionState,
    },

    /// Configuration failed to load or validate.
    #[error("Configuration error: {0}")]
    Config(String),
}

impl AcqError {
    /// True for errors localized to a single acquisition round.
    ///
    /// A stream that observes one of these yields it and keeps going.
    #[must_use]
    pub fn is_per_frame(&self) -> bool {
        matches!(
            self,
            AcqError::InvalidBuffer
                | AcqError::IncompleteBuffer { .. }
                | AcqError::TruncatedFrame { .. }
                | AcqError::Allocation { .. }
        )
    }

    /// True for the errors `open()` can surface.
    #[must_use]
    pub fn is_setup(&self) -> bool {
        matches!(
            self,
            AcqError::DeviceNotFound(_)
                | AcqError::StreamCreation(_)
                | AcqError::Allocation { .. }
                | AcqError::AcquisitionStart(_)
        )
    }

    pub(crate) fn allocation(requested: usize, reason: impl Into<String>) -> Self {
        AcqError::Allocation {
            requested,
            reason: reason.into(),
        }
    }
}

impl From<figment::Error> for AcqError {
    fn from(value: figment::Error) -> Self {
        AcqError::Config(value.to_string())
    }
}
