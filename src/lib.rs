//! # arv-stream
//!
//! Buffer-pooled frame acquisition for GenICam-style cameras, with a linear
//! min-max contrast stretch to 8 bits and a lazy frame stream on top.
//!
//! ## Crate Structure
//!
//! - **`hardware`**: The `FrameSource` trait the pipeline drives, plus
//!   `hardware::mock::MockFrameSource` for tests and the CLI.
//! - **`components`**: Acquisition internals.
//!   - `frame_pool`: `FrameBuffer` and the fixed `BufferPool` of transfer buffers.
//!   - `connection`: device and stream handles with one teardown path.
//!   - `acquisition`: the `AcquisitionSession` state machine.
//! - **`normalize`**: The stateless contrast stretch.
//! - **`stream`**: `FrameStream`, a lazy iterator of normalized frames.
//! - **`error`**: `AcqError`, split into setup and per-frame failures.
//! - **`config`**: Figment-based settings (TOML + environment).
//! - **`logging`**: `tracing-subscriber` setup for binaries.
//!
//! ## Upward Interface
//!
//! Three entry points cover the ways a caller consumes frames:
//!
//! - [`acquire_frame`]: one normalized frame, or the error that prevented it.
//! - [`acquire_frames`]: a bounded batch; per-frame failures stay in sequence.
//! - [`frame_stream`]: a lazy, possibly infinite stream that releases the
//!   camera when exhausted, cancelled or dropped.
//!
//! ```
//! use arv_stream::hardware::mock::MockFrameSource;
//! use arv_stream::{frame_stream, PixelFormat, SessionConfig, StreamConfig};
//!
//! let camera = MockFrameSource::new(64, 48, PixelFormat::MONO_16);
//! let stream = frame_stream(camera, SessionConfig::default(), StreamConfig::finite(3))?;
//! for frame in stream {
//!     let frame = frame?;
//!     assert_eq!(frame.data.len(), 64 * 48);
//! }
//! # Ok::<(), arv_stream::AcqError>(())
//! ```

pub mod components;
pub mod config;
pub mod error;
pub mod hardware;
pub mod logging;
pub mod normalize;
pub mod stream;

pub use components::acquisition::{AcquisitionSession, FrameGeometry, SessionConfig, SessionState};
pub use components::frame_pool::{BufferPool, BufferStatus, FrameBuffer, PixelFormat};
pub use error::{AcqError, AcqResult};
pub use hardware::FrameSource;
pub use normalize::normalize;
pub use stream::{FrameStream, NormalizedFrame, StreamConfig};

/// Open a session, acquire one normalized frame, and close.
///
/// # Errors
///
/// Any setup error from `open()`, or the per-frame error for the one frame.
pub fn acquire_frame<S: FrameSource>(source: S, config: SessionConfig) -> AcqResult<NormalizedFrame> {
    let mut session = AcquisitionSession::new(source, config);
    session.open()?;
    let frame = stream::acquire_normalized(&mut session);
    session.close();
    frame
}

/// Open a session, acquire `count` frames in order, and close.
///
/// The outer error is a setup failure, or `Allocation` when `count` results
/// cannot be reserved; no frames were attempted. Each inner
/// item is either a frame or the per-frame error for that position.
pub fn acquire_frames<S: FrameSource>(
    source: S,
    config: SessionConfig,
    count: usize,
) -> AcqResult<Vec<AcqResult<NormalizedFrame>>> {
    let mut frames = Vec::new();
    frames
        .try_reserve_exact(count)
        .map_err(|e| AcqError::allocation(count, e.to_string()))?;

    let mut session = AcquisitionSession::new(source, config);
    session.open()?;
    for index in 0..count {
        let item = stream::acquire_normalized(&mut session);
        if let Err(e) = &item {
            tracing::warn!(index, error = %e, "Batch frame failed");
        }
        frames.push(item);
    }

    session.close();
    Ok(frames)
}

/// Open a session and wrap it in a lazy `FrameStream`.
///
/// The stream owns the session; the camera is released when the stream ends
/// or is dropped.
pub fn frame_stream<S: FrameSource>(
    source: S,
    session: SessionConfig,
    stream: StreamConfig,
) -> AcqResult<FrameStream<S>> {
    let mut acquisition = AcquisitionSession::new(source, session);
    acquisition.open()?;
    Ok(FrameStream::new(acquisition, stream))
}
