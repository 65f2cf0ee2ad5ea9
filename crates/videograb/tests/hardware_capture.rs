// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Au-Zone Technologies
//
// Hardware capture tests
//
// REQUIREMENTS (all tests are #[ignore]):
//   - built with --features ffmpeg (FFmpeg 7 development libraries)
//   - a UVC or other V4L2 camera at /dev/video0 delivering MJPEG at 640x480
//
// RUN:
//   cargo test -p videograb --features ffmpeg --test hardware_capture -- --ignored --nocapture

#![cfg(feature = "ffmpeg")]

use serial_test::serial;
use std::time::Instant;
use videograb::{
    backend::{Backend, FormatParameters, Input},
    ffmpeg::FfmpegBackend,
    CaptureConfig, CaptureSession, CodecId, Error, ErrorKind, MediaType, PixelFormat,
};

const DEVICE: &str = "/dev/video0";

fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

#[test]
#[ignore = "requires a V4L2 camera at /dev/video0"]
#[serial]
fn test_capture_rgb_frames() {
    init_logging();
    let backend = FfmpegBackend::new().unwrap();
    let mut session = CaptureSession::open(
        &backend,
        DEVICE,
        640,
        480,
        CodecId::Mjpeg,
        PixelFormat::Rgb24,
    )
    .unwrap();

    let expected = session.width() as usize * session.height() as usize * 3;
    assert_eq!(session.buffer_size(), expected);

    let start = Instant::now();
    let buffer = session.buffer().as_ptr();
    for _ in 0..30 {
        let frame = session.read_frame().expect("camera stopped delivering frames");
        assert_eq!(frame.len(), expected);
        assert_eq!(frame.as_ptr(), buffer);
    }
    println!(
        "30 frames of {}x{} in {:?}, time base {}",
        session.width(),
        session.height(),
        start.elapsed(),
        session.time_base()
    );
}

#[test]
#[ignore = "requires a V4L2 camera at /dev/video0"]
#[serial]
fn test_reopen_after_close() {
    init_logging();
    let backend = FfmpegBackend::new().unwrap();
    let config = CaptureConfig::default()
        .with_device(DEVICE)
        .with_codec(CodecId::Mjpeg)
        .with_pixel_format(PixelFormat::Gray8);

    for _ in 0..3 {
        let mut session = config.clone().open(&backend).unwrap();
        assert!(session.read_frame().is_some());
        session.close();
    }
}

#[test]
#[ignore = "requires a V4L2 camera at /dev/video0"]
#[serial]
fn test_open_then_scan_streams() {
    init_logging();
    let backend = FfmpegBackend::new().unwrap();
    let context = backend.alloc_context().unwrap();
    let format = backend.find_input_format("video4linux2").unwrap();
    let params = FormatParameters {
        preallocated: true,
        width: 640,
        height: 480,
        codec: CodecId::Mjpeg,
    };

    let mut input = backend
        .open_input(context, &format, DEVICE, &params)
        .unwrap();
    input.find_stream_info().unwrap();
    assert!(input
        .streams()
        .iter()
        .any(|stream| stream.media_type == MediaType::Video));
}

#[test]
#[ignore = "requires FFmpeg with libavdevice"]
#[serial]
fn test_missing_device() {
    init_logging();
    let backend = FfmpegBackend::new().unwrap();
    let err = CaptureConfig::default()
        .with_device("/dev/video-does-not-exist")
        .open(&backend)
        .unwrap_err();
    assert!(matches!(err, Error::DeviceOpen(..)));
    assert_eq!(err.kind(), ErrorKind::Device);
}

#[test]
#[ignore = "requires FFmpeg with libavdevice"]
fn test_describe_video4linux2() {
    let backend = FfmpegBackend::new().unwrap();
    let info = backend.describe_input_format("video4linux2").unwrap();
    assert_eq!(info.name, "video4linux2,v4l2");
    assert!(backend.describe_input_format("no-such-driver").is_none());
}
