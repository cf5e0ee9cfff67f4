//! Acquisition components:
//! - Connection: device and stream handles, teardown
//! - FramePool: transfer buffers and their circulation
//! - Acquisition: the session state machine tying them together

pub mod acquisition;
pub mod connection;
pub mod frame_pool;
