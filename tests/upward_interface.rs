//! Integration tests for the single-shot and batch entry points

use arv_stream::hardware::mock::{FramePattern, MockFailure, MockFrameSource};
use arv_stream::{acquire_frame, acquire_frames, frame_stream, AcqError, PixelFormat};
use arv_stream::{SessionConfig, StreamConfig};

#[test]
fn test_acquire_frame_returns_one_normalized_frame() {
    let camera = MockFrameSource::new(64, 48, PixelFormat::MONO_16);
    let stats = camera.stats();

    let frame = acquire_frame(camera, SessionConfig::default()).unwrap();

    assert_eq!(frame.frame_number, 1);
    assert_eq!((frame.width, frame.height), (64, 48));
    assert_eq!(frame.source_bits, 16);
    assert_eq!(frame.data.len(), 64 * 48);
    assert_eq!(frame.data.iter().min(), Some(&0));
    assert_eq!(frame.data.iter().max(), Some(&255));

    let snapshot = stats.snapshot();
    assert_eq!(snapshot.dequeued, 1);
    assert_eq!(snapshot.devices_released, 1);
}

#[test]
fn test_acquire_frame_surfaces_setup_error() {
    let camera = MockFrameSource::new(8, 8, PixelFormat::MONO_8).with_failure(MockFailure::NoDevice);
    let err = acquire_frame(camera, SessionConfig::default()).unwrap_err();
    assert!(matches!(err, AcqError::DeviceNotFound(_)));
    assert_eq!(err.to_string(), "No camera found: No device found on any interface");
}

#[test]
fn test_acquire_frame_surfaces_per_frame_error() {
    let camera = MockFrameSource::new(8, 8, PixelFormat::MONO_8).with_invalid_every(1);
    let stats = camera.stats();

    let err = acquire_frame(camera, SessionConfig::default()).unwrap_err();

    assert_eq!(err, AcqError::InvalidBuffer);
    assert!(err.is_per_frame());
    assert_eq!(stats.snapshot().devices_released, 1);
}

#[test]
fn test_batch_keeps_failures_in_position() {
    let camera = MockFrameSource::new(4, 4, PixelFormat::MONO_8).with_incomplete_every(4);
    let frames = acquire_frames(camera, SessionConfig::default(), 8).unwrap();

    assert_eq!(frames.len(), 8);
    for (index, item) in frames.iter().enumerate() {
        if (index + 1) % 4 == 0 {
            assert!(matches!(item, Err(AcqError::IncompleteBuffer { .. })), "{index}");
        } else {
            assert_eq!(item.as_ref().unwrap().frame_number, index as u64 + 1);
        }
    }
}

#[test]
fn test_batch_of_zero_pulls_nothing() {
    let camera = MockFrameSource::new(4, 4, PixelFormat::MONO_8);
    let stats = camera.stats();

    let frames = acquire_frames(camera, SessionConfig::default(), 0).unwrap();

    assert!(frames.is_empty());
    assert_eq!(stats.snapshot().dequeue_calls, 0);
    assert_eq!(stats.snapshot().devices_released, 1);
}

#[test]
fn test_batch_setup_failure_is_outer_error() {
    let camera = MockFrameSource::new(4, 4, PixelFormat::MONO_8).with_failure(MockFailure::Start);
    let stats = camera.stats();

    let err = acquire_frames(camera, SessionConfig::default(), 5).unwrap_err();

    assert!(matches!(err, AcqError::AcquisitionStart(_)));
    assert_eq!(stats.snapshot().dequeue_calls, 0);
    assert_eq!(stats.snapshot().streams_released, 1);
}

#[test]
fn test_batch_too_large_to_reserve() {
    let camera = MockFrameSource::new(4, 4, PixelFormat::MONO_8);
    let stats = camera.stats();

    let err = acquire_frames(camera, SessionConfig::default(), usize::MAX).unwrap_err();

    assert!(matches!(
        err,
        AcqError::Allocation {
            requested: usize::MAX,
            ..
        }
    ));
    let snapshot = stats.snapshot();
    assert_eq!(snapshot.devices_opened, 0);
    assert_eq!(snapshot.dequeue_calls, 0);
}

#[test]
fn test_frame_stream_setup_failure() {
    let camera =
        MockFrameSource::new(4, 4, PixelFormat::MONO_8).with_failure(MockFailure::CreateStream);
    let result = frame_stream(camera, SessionConfig::default(), StreamConfig::finite(3));
    assert!(matches!(result, Err(AcqError::StreamCreation(_))));
}

#[test]
fn test_zero_filled_frame_from_device() {
    // Payload is zero-filled past the pattern, so the frame is flat
    let camera =
        MockFrameSource::new(2, 2, PixelFormat::MONO_16).with_pattern(FramePattern::Raw(vec![]));
    let frame = acquire_frame(camera, SessionConfig::default()).unwrap();
    assert_eq!(frame.data, vec![0; 4]);
}

#[test]
fn test_zero_area_frame_is_empty() {
    let camera = MockFrameSource::new(0, 0, PixelFormat::MONO_8).with_payload_size(16);
    let frame = acquire_frame(camera, SessionConfig::default()).unwrap();

    assert_eq!((frame.width, frame.height), (0, 0));
    assert!(frame.is_empty());
    assert_eq!(frame.data, Vec::<u8>::new());
}
