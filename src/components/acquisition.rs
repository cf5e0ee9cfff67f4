//! Acquisition session state machine.
//!
//! `AcquisitionSession` is the only component that calls into the hardware
//! collaborator. It owns the source, the device and stream handles (through
//! `CameraConnection`) and the `BufferPool`.
//!
//! ```text
//!            open()                 setup ok
//!   Idle ───────────▶ Configuring ───────────▶ Streaming
//!                          │                       │
//!                setup err │                       │ close()
//!                          ▼                       ▼
//!                       Failed                  Stopped
//! ```
//!
//! Any setup failure releases everything acquired so far before the error is
//! returned. `close()` is idempotent and never fails; dropping the session
//! closes it.

use crate::components::connection::CameraConnection;
use crate::components::frame_pool::{BufferPool, FrameBuffer, PixelFormat, DEFAULT_POOL_SIZE};
use crate::error::{AcqError, AcqResult};
use crate::hardware::{AcquisitionMode, FrameSource};
use std::fmt;

/// Lifecycle state of an acquisition session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// No hardware handle acquired.
    Idle,
    /// `open()` is acquiring and configuring hardware.
    Configuring,
    /// Acquisition running; `pull()` is allowed.
    Streaming,
    /// Closed after running or without ever opening.
    Stopped,
    /// Setup failed. Absorbing; all resources have been released.
    Failed,
}

impl SessionState {
    /// Lowercase state name.
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionState::Idle => "idle",
            SessionState::Configuring => "configuring",
            SessionState::Streaming => "streaming",
            SessionState::Stopped => "stopped",
            SessionState::Failed => "failed",
        }
    }

    /// True once the session can no longer produce frames.
    pub fn is_terminal(&self) -> bool {
        matches!(self, SessionState::Stopped | SessionState::Failed)
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Session parameters fixed at construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionConfig {
    /// Number of transfer buffers to allocate.
    pub pool_size: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            pool_size: DEFAULT_POOL_SIZE,
        }
    }
}

impl SessionConfig {
    /// Set the pool size.
    #[must_use]
    pub fn with_pool_size(mut self, pool_size: usize) -> Self {
        self.pool_size = pool_size;
        self
    }
}

/// Image geometry observed on a delivered buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameGeometry {
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
    /// Pixel format code.
    pub pixel_format: PixelFormat,
}

impl FrameGeometry {
    /// Geometry of a filled buffer.
    pub fn of(buffer: &FrameBuffer) -> Self {
        Self {
            width: buffer.width(),
            height: buffer.height(),
            pixel_format: buffer.pixel_format(),
        }
    }

    /// Pixels per frame.
    pub fn pixel_count(&self) -> usize {
        self.width as usize * self.height as usize
    }
}

/// Single-owner acquisition session over a `FrameSource`.
pub struct AcquisitionSession<S: FrameSource> {
    source: S,
    connection: CameraConnection,
    pool: Option<BufferPool>,
    state: SessionState,
    config: SessionConfig,
    frames_delivered: u64,
    frames_recycled: u64,
}

impl<S: FrameSource> AcquisitionSession<S> {
    /// Create an idle session. No hardware is touched until `open()`.
    pub fn new(source: S, config: SessionConfig) -> Self {
        Self {
            source,
            connection: CameraConnection::new(),
            pool: None,
            state: SessionState::Idle,
            config,
            frames_delivered: 0,
            frames_recycled: 0,
        }
    }

    /// Acquire the device, create the stream, seed the pool and start.
    ///
    /// # Errors
    ///
    /// - `DeviceNotFound` if no camera opens
    /// - `StreamCreation` if continuous mode or the stream cannot be set up
    /// - `Allocation` if the payload size is unreadable or the pool cannot be allocated
    /// - `AcquisitionStart` if the camera refuses to start
    /// - `InvalidState` if the session is not `Idle`
    ///
    /// On any setup error the session is `Failed` and holds no hardware.
    pub fn open(&mut self) -> AcqResult<()> {
        if self.state != SessionState::Idle {
            return Err(AcqError::InvalidState {
                operation: "open",
                state: self.state,
            });
        }

        self.state = SessionState::Configuring;
        tracing::info!(pool_size = self.config.pool_size, "Opening acquisition session");

        match self.configure() {
            Ok(()) => {
                self.state = SessionState::Streaming;
                tracing::info!("Acquisition started");
                Ok(())
            }
            Err(e) => {
                tracing::error!(error = %e, "Acquisition setup failed; releasing hardware");
                self.connection.teardown(&mut self.source);
                self.pool = None;
                self.state = SessionState::Failed;
                Err(e)
            }
        }
    }

    fn configure(&mut self) -> AcqResult<()> {
        let device = self
            .source
            .open_first_device()
            .map_err(|e| AcqError::DeviceNotFound(e.message))?;
        self.connection.attach_device(device);

        if let Some(model) = self.source.device_model(device) {
            tracing::info!(%model, "Found camera");
        }

        self.source
            .set_mode(device, AcquisitionMode::Continuous)
            .map_err(|e| AcqError::StreamCreation(e.message))?;

        let stream = self
            .source
            .create_stream(device)
            .map_err(|e| AcqError::StreamCreation(e.message))?;
        self.connection.attach_stream(stream);

        let payload = self
            .source
            .payload_size(device)
            .map_err(|e| AcqError::allocation(0, format!("payload size unavailable: {e}")))?;

        let mut pool = BufferPool::create(self.config.pool_size, payload)?;
        pool.seed(&mut self.source, stream);
        self.pool = Some(pool);

        self.source
            .start(device)
            .map_err(|e| AcqError::AcquisitionStart(e.message))?;
        self.connection.mark_acquiring();
        Ok(())
    }

    /// Block until the device delivers the next filled buffer.
    ///
    /// The returned buffer is on loan and must go back through `recycle()`.
    ///
    /// # Errors
    ///
    /// - `InvalidBuffer` if the stream yields nothing usable; the session
    ///   stays `Streaming`
    /// - `InvalidState` if the session is not `Streaming`
    pub fn pull(&mut self) -> AcqResult<FrameBuffer> {
        let (Some(stream), Some(pool), SessionState::Streaming) =
            (self.connection.stream(), self.pool.as_mut(), self.state)
        else {
            return Err(AcqError::InvalidState {
                operation: "pull",
                state: self.state,
            });
        };

        match self.source.dequeue(stream) {
            Some(buffer) => {
                self.frames_delivered += 1;
                Ok(pool.lend(buffer))
            }
            None => {
                tracing::warn!(frame = self.frames_delivered + 1, "Failed to get buffer");
                Err(AcqError::InvalidBuffer)
            }
        }
    }

    /// Give a pulled buffer back to the device's input queue.
    ///
    /// After `close()` the stream no longer exists and the buffer is dropped.
    pub fn recycle(&mut self, buffer: FrameBuffer) {
        match (self.connection.stream(), self.pool.as_mut()) {
            (Some(stream), Some(pool)) => {
                pool.recycle(buffer, &mut self.source, stream);
                self.frames_recycled += 1;
            }
            _ => tracing::debug!(
                buffer_id = buffer.id(),
                "Session closed; dropping returned buffer"
            ),
        }
    }

    /// Pull one frame to learn the stream geometry, then recycle it.
    pub fn probe_geometry(&mut self) -> AcqResult<FrameGeometry> {
        let buffer = self.pull()?;
        let geometry = FrameGeometry::of(&buffer);
        self.recycle(buffer);
        tracing::debug!(
            width = geometry.width,
            height = geometry.height,
            pixel_format = %geometry.pixel_format,
            "Probed stream geometry"
        );
        Ok(geometry)
    }

    /// Stop acquisition and release every hardware resource.
    ///
    /// Idempotent. A stop failure is logged, not returned. A `Failed`
    /// session already holds nothing and stays `Failed`.
    pub fn close(&mut self) {
        if self.state.is_terminal() {
            return;
        }

        let previous = self.state;
        self.connection.teardown(&mut self.source);
        self.pool = None;
        self.state = SessionState::Stopped;
        tracing::info!(
            from = %previous,
            frames = self.frames_delivered,
            "Acquisition session closed"
        );
    }

    /// Current lifecycle state.
    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Parameters the session was created with.
    pub fn config(&self) -> SessionConfig {
        self.config
    }

    /// Buffers successfully dequeued since `open()`.
    pub fn frames_delivered(&self) -> u64 {
        self.frames_delivered
    }

    /// Buffers handed back to the device since `open()`. Survives `close()`.
    pub fn frames_recycled(&self) -> u64 {
        self.frames_recycled
    }

    /// The buffer pool while the session is streaming.
    pub fn pool(&self) -> Option<&BufferPool> {
        self.pool.as_ref()
    }

    /// The underlying frame source.
    pub fn source(&self) -> &S {
        &self.source
    }
}

impl<S: FrameSource> Drop for AcquisitionSession<S> {
    fn drop(&mut self) {
        self.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::components::frame_pool::BufferStatus;
    use crate::hardware::mock::{MockFailure, MockFrameSource, MockStats};

    fn mock() -> MockFrameSource {
        MockFrameSource::new(4, 2, PixelFormat::MONO_8)
    }

    fn failing_open(failure: MockFailure) -> (AcqError, SessionState, MockStats) {
        let source = mock().with_failure(failure);
        let stats = source.stats();
        let mut session = AcquisitionSession::new(source, SessionConfig::default());
        let err = session.open().unwrap_err();
        (err, session.state(), stats.snapshot())
    }

    #[test]
    fn test_open_reaches_streaming() {
        let source = mock();
        let stats = source.stats();
        let mut session = AcquisitionSession::new(source, SessionConfig::default());
        assert_eq!(session.state(), SessionState::Idle);

        session.open().unwrap();

        assert_eq!(session.state(), SessionState::Streaming);
        let pool = session.pool().unwrap();
        assert_eq!(pool.capacity(), 2);
        assert_eq!(pool.payload_size(), 8);
        let snapshot = stats.snapshot();
        assert_eq!(snapshot.enqueued, 2);
        assert_eq!(snapshot.starts, 1);
    }

    #[test]
    fn test_open_twice_is_rejected() {
        let mut session = AcquisitionSession::new(mock(), SessionConfig::default());
        session.open().unwrap();
        assert!(matches!(
            session.open(),
            Err(AcqError::InvalidState {
                operation: "open",
                state: SessionState::Streaming
            })
        ));
    }

    #[test]
    fn test_no_device() {
        let (err, state, stats) = failing_open(MockFailure::NoDevice);
        assert!(matches!(err, AcqError::DeviceNotFound(_)));
        assert_eq!(state, SessionState::Failed);
        assert_eq!(stats.devices_released, 0);
        assert_eq!(stats.streams_released, 0);
    }

    #[test]
    fn test_set_mode_failure_releases_device() {
        let (err, state, stats) = failing_open(MockFailure::SetMode);
        assert!(matches!(err, AcqError::StreamCreation(_)));
        assert_eq!(state, SessionState::Failed);
        assert_eq!(stats.devices_released, 1);
        assert_eq!(stats.streams_created, 0);
    }

    #[test]
    fn test_stream_failure_releases_device() {
        let (err, _, stats) = failing_open(MockFailure::CreateStream);
        assert!(matches!(err, AcqError::StreamCreation(_)));
        assert_eq!(stats.devices_released, 1);
        assert_eq!(stats.streams_released, 0);
    }

    #[test]
    fn test_payload_failure_is_allocation_error() {
        let (err, state, stats) = failing_open(MockFailure::PayloadSize);
        assert!(matches!(err, AcqError::Allocation { .. }));
        assert_eq!(state, SessionState::Failed);
        assert_eq!(stats.streams_released, 1);
        assert_eq!(stats.devices_released, 1);
    }

    #[test]
    fn test_zero_payload_is_allocation_error() {
        let source = mock().with_payload_size(0);
        let stats = source.stats();
        let mut session = AcquisitionSession::new(source, SessionConfig::default());

        assert!(matches!(session.open(), Err(AcqError::Allocation { .. })));
        assert_eq!(stats.snapshot().streams_released, 1);
    }

    #[test]
    fn test_start_failure_releases_everything() {
        let (err, state, stats) = failing_open(MockFailure::Start);
        assert!(matches!(err, AcqError::AcquisitionStart(_)));
        assert_eq!(state, SessionState::Failed);
        assert_eq!(stats.stops, 0);
        assert_eq!(stats.streams_released, 1);
        assert_eq!(stats.devices_released, 1);
        assert_eq!(stats.buffers_freed, 2);
    }

    #[test]
    fn test_close_after_failed_open_is_noop() {
        let source = mock().with_failure(MockFailure::Start);
        let stats = source.stats();
        let mut session = AcquisitionSession::new(source, SessionConfig::default());
        let _ = session.open();

        session.close();
        session.close();
        drop(session);

        let snapshot = stats.snapshot();
        assert_eq!(snapshot.streams_released, 1);
        assert_eq!(snapshot.devices_released, 1);
    }

    #[test]
    fn test_pull_requires_streaming() {
        let mut session = AcquisitionSession::new(mock(), SessionConfig::default());
        assert!(matches!(
            session.pull(),
            Err(AcqError::InvalidState {
                operation: "pull",
                state: SessionState::Idle
            })
        ));
    }

    #[test]
    fn test_pull_and_recycle() {
        let source = mock();
        let stats = source.stats();
        let mut session = AcquisitionSession::new(source, SessionConfig::default());
        session.open().unwrap();

        let buffer = session.pull().unwrap();
        assert_eq!(buffer.status(), BufferStatus::Success);
        assert_eq!((buffer.width(), buffer.height()), (4, 2));
        assert_eq!(session.pool().unwrap().outstanding(), 1);

        session.recycle(buffer);
        assert_eq!(session.pool().unwrap().outstanding(), 0);
        assert_eq!(session.pool().unwrap().recycled(), 1);
        assert_eq!(session.frames_delivered(), 1);
        assert_eq!(stats.snapshot().enqueued, 3);
    }

    #[test]
    fn test_invalid_buffer_keeps_streaming() {
        let source = mock().with_invalid_every(1);
        let mut session = AcquisitionSession::new(source, SessionConfig::default());
        session.open().unwrap();

        assert_eq!(session.pull().unwrap_err(), AcqError::InvalidBuffer);
        assert_eq!(session.state(), SessionState::Streaming);
        assert_eq!(session.frames_delivered(), 0);
    }

    #[test]
    fn test_probe_geometry_recycles() {
        let mut session = AcquisitionSession::new(mock(), SessionConfig::default());
        session.open().unwrap();

        let geometry = session.probe_geometry().unwrap();
        assert_eq!(geometry.width, 4);
        assert_eq!(geometry.height, 2);
        assert_eq!(geometry.pixel_format, PixelFormat::MONO_8);
        assert_eq!(geometry.pixel_count(), 8);
        assert_eq!(session.pool().unwrap().outstanding(), 0);
    }

    #[test]
    fn test_close_is_idempotent() {
        let source = mock();
        let stats = source.stats();
        let mut session = AcquisitionSession::new(source, SessionConfig::default());
        session.open().unwrap();

        session.close();
        session.close();
        assert_eq!(session.state(), SessionState::Stopped);
        drop(session);

        let snapshot = stats.snapshot();
        assert_eq!(snapshot.stops, 1);
        assert_eq!(snapshot.streams_released, 1);
        assert_eq!(snapshot.devices_released, 1);
    }

    #[test]
    fn test_close_from_idle_touches_nothing() {
        let source = mock();
        let stats = source.stats();
        let mut session = AcquisitionSession::new(source, SessionConfig::default());

        session.close();

        assert_eq!(session.state(), SessionState::Stopped);
        assert_eq!(stats.snapshot(), MockStats::default());
    }

    #[test]
    fn test_drop_closes_streaming_session() {
        let source = mock();
        let stats = source.stats();
        {
            let mut session = AcquisitionSession::new(source, SessionConfig::default());
            session.open().unwrap();
        }
        let snapshot = stats.snapshot();
        assert_eq!(snapshot.stops, 1);
        assert_eq!(snapshot.devices_released, 1);
    }

    #[test]
    fn test_recycle_after_close_drops_buffer() {
        let source = mock();
        let stats = source.stats();
        let mut session = AcquisitionSession::new(source, SessionConfig::default());
        session.open().unwrap();
        let buffer = session.pull().unwrap();

        session.close();
        session.recycle(buffer);

        assert_eq!(stats.snapshot().enqueued, 2);
        assert_eq!(session.frames_recycled(), 0);
    }

    #[test]
    fn test_recycle_count_outlives_pool() {
        let mut session = AcquisitionSession::new(mock(), SessionConfig::default());
        session.open().unwrap();
        for _ in 0..3 {
            let buffer = session.pull().unwrap();
            session.recycle(buffer);
        }
        assert_eq!(session.frames_recycled(), 3);

        session.close();
        assert!(session.pool().is_none());
        assert_eq!(session.frames_recycled(), 3);
    }
}
