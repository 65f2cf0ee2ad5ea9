// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Au-Zone Technologies
//
// Frame pump tests
//
// Drives CaptureSession::read_frame over scripted packet sequences: foreign
// streams, partial frames, end of stream and failures at each stage.
//
//   cargo test --test frame_pump

use rand::{rngs::StdRng, Rng, SeedableRng};
use videograb::{
    mock::{MockBackend, MockDevice, MockPacket, MockStream},
    CaptureConfig, CaptureSession, CodecId, Error, ErrorKind, PixelFormat, StreamEnd,
};

const WIDTH: u32 = 16;
const HEIGHT: u32 = 8;

fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn open(device: MockDevice) -> (MockBackend, CaptureSession<MockBackend>) {
    let backend = MockBackend::new(device);
    let session = CaptureConfig::default()
        .with_resolution(WIDTH, HEIGHT)
        .with_pixel_format(PixelFormat::Gray8)
        .open(&backend)
        .unwrap();
    (backend, session)
}

fn video_only() -> MockDevice {
    MockDevice::new().with_stream(MockStream::video(
        CodecId::Mjpeg,
        PixelFormat::Yuvj420p,
        WIDTH,
        HEIGHT,
    ))
}

/// Read until the sentinel, returning the fill byte of every frame.
fn drain(session: &mut CaptureSession<MockBackend>) -> Vec<u8> {
    let mut frames = Vec::new();
    while let Some(frame) = session.read_frame() {
        assert_eq!(frame.len(), (WIDTH * HEIGHT) as usize);
        assert!(frame.iter().all(|&byte| byte == frame[0]));
        frames.push(frame[0]);
    }
    frames
}

#[test]
fn test_frames_in_order() {
    init_logging();
    let (_backend, mut session) = open(MockDevice::camera(
        CodecId::RawVideo,
        PixelFormat::Yuyv422,
        WIDTH,
        HEIGHT,
        5,
    ));

    assert_eq!(drain(&mut session), vec![0, 1, 2, 3, 4]);
    assert_eq!(session.frames_read(), 5);
}

#[test]
fn test_buffer_address_stable() {
    let (_backend, mut session) = open(MockDevice::camera(
        CodecId::RawVideo,
        PixelFormat::Yuyv422,
        WIDTH,
        HEIGHT,
        3,
    ));
    let buffer = session.buffer().as_ptr();

    let first = session.read_frame().unwrap().as_ptr();
    let second = session.read_frame().unwrap().as_ptr();
    assert_eq!(first, buffer);
    assert_eq!(second, buffer);

    // the previous frame is overwritten in place
    assert!(session.buffer().iter().all(|&byte| byte == 1));
}

#[test]
fn test_foreign_packets_dropped() {
    init_logging();
    let mut rng = StdRng::seed_from_u64(0x5eed);

    for _ in 0..20 {
        let frames = rng.random_range(1..12u8);
        let mut device = MockDevice::new()
            .with_stream(MockStream::audio())
            .with_stream(MockStream::video(
                CodecId::H264,
                PixelFormat::Yuv420p,
                WIDTH,
                HEIGHT,
            ))
            .with_stream(MockStream::data());

        for payload in 0..frames {
            while rng.random_bool(0.5) {
                let foreign = if rng.random_bool(0.5) { 0 } else { 2 };
                device = device.with_packet(MockPacket::frame(foreign, 0xff));
            }
            device = device.with_packet(MockPacket::frame(1, payload));
        }
        for _ in 0..rng.random_range(0..3) {
            device = device.with_packet(MockPacket::frame(0, 0xff));
        }

        let (_backend, mut session) = open(device);
        assert_eq!(drain(&mut session), (0..frames).collect::<Vec<_>>());
        assert!(matches!(session.end_reason(), Some(StreamEnd::Exhausted)));
    }
}

#[test]
fn test_partial_packets_consumed() {
    let (_backend, mut session) = open(
        video_only()
            .with_packet(MockPacket::partial(0, 1))
            .with_packet(MockPacket::partial(0, 2))
            .with_packet(MockPacket::frame(0, 3))
            .with_packet(MockPacket::frame(0, 10))
            .with_packet(MockPacket::partial(0, 40)),
    );

    // a trailing partial frame is never delivered
    assert_eq!(drain(&mut session), vec![6, 10]);
    assert_eq!(session.frames_read(), 2);
}

#[test]
fn test_empty_stream() {
    let (_backend, mut session) = open(video_only());

    assert!(session.read_frame().is_none());
    assert!(session.is_ended());
    assert!(matches!(session.end_reason(), Some(StreamEnd::Exhausted)));
    assert!(!session.end_reason().unwrap().is_failure());
}

#[test]
fn test_end_of_stream_latched() {
    let (_backend, mut session) = open(MockDevice::camera(
        CodecId::RawVideo,
        PixelFormat::Yuyv422,
        WIDTH,
        HEIGHT,
        1,
    ));

    assert!(session.end_reason().is_none());
    assert!(session.read_frame().is_some());
    assert!(!session.is_ended());
    for _ in 0..3 {
        assert!(session.read_frame().is_none());
    }
    assert_eq!(session.frames_read(), 1);
    assert!(matches!(session.end_reason(), Some(StreamEnd::Exhausted)));
}

#[test]
fn test_read_error() {
    init_logging();
    let (_backend, mut session) = open(
        MockDevice::camera(CodecId::RawVideo, PixelFormat::Yuyv422, WIDTH, HEIGHT, 4)
            .with_read_error_at(2),
    );

    assert_eq!(drain(&mut session), vec![0, 1]);
    match session.end_reason() {
        Some(StreamEnd::Failed(err)) => {
            assert!(matches!(err, Error::Read(_)));
            assert_eq!(err.kind(), ErrorKind::Read);
        }
        other => panic!("unexpected end: {:?}", other),
    }
}

#[test]
fn test_corrupt_packet_skipped() {
    init_logging();
    let (_backend, mut session) = open(
        video_only()
            .with_packet(MockPacket::frame(0, 7))
            .with_packet(MockPacket::corrupt(0))
            .with_packet(MockPacket::frame(0, 8)),
    );

    assert_eq!(session.read_frame().map(|frame| frame[0]), Some(7));
    assert!(!session.is_ended());
    assert_eq!(session.read_frame().map(|frame| frame[0]), Some(8));
    assert!(session.read_frame().is_none());

    assert_eq!(session.frames_read(), 2);
    assert!(matches!(session.end_reason(), Some(StreamEnd::Exhausted)));
}

#[test]
fn test_corrupt_first_packet() {
    let (_backend, mut session) = open(
        video_only()
            .with_packet(MockPacket::corrupt(0))
            .with_packet(MockPacket::frame(0, 9)),
    );

    assert_eq!(drain(&mut session), vec![9]);
    assert!(matches!(session.end_reason(), Some(StreamEnd::Exhausted)));
}

#[test]
fn test_only_corrupt_packets() {
    let (_backend, mut session) = open(
        video_only().with_packets((0..4).map(|_| MockPacket::corrupt(0))),
    );

    assert!(session.read_frame().is_none());
    assert_eq!(session.frames_read(), 0);
    assert!(matches!(session.end_reason(), Some(StreamEnd::Exhausted)));
}

#[test]
fn test_buffered_pictures_delivered_first() {
    init_logging();
    // a field pair leaves its second picture in the decoder
    let (_backend, mut session) = open(
        video_only()
            .with_packet(MockPacket::field_pair(0, 3))
            .with_packet(MockPacket::partial(1, 6))
            .with_packet(MockPacket::frame(0, 4))
            .with_packet(MockPacket::field_pair(0, 5)),
    );

    assert_eq!(drain(&mut session), vec![3, 3, 4, 5, 5]);
    assert!(matches!(session.end_reason(), Some(StreamEnd::Exhausted)));
}

#[test]
fn test_convert_error() {
    let (_backend, mut session) = open(
        MockDevice::camera(CodecId::RawVideo, PixelFormat::Yuyv422, WIDTH, HEIGHT, 2)
            .with_convert_error(),
    );

    assert!(session.read_frame().is_none());
    assert_eq!(session.frames_read(), 0);
    let end = session.end_reason().unwrap();
    assert!(end.is_failure());
    assert!(matches!(end, StreamEnd::Failed(Error::Convert(_))));
}

#[test]
fn test_repeating_source() {
    let (_backend, mut session) = open(
        MockDevice::camera(CodecId::RawVideo, PixelFormat::Yuyv422, WIDTH, HEIGHT, 3)
            .repeating(),
    );

    let frames: Vec<u8> = (0..7)
        .map(|_| session.read_frame().map(|frame| frame[0]).unwrap())
        .collect();
    assert_eq!(frames, vec![0, 1, 2, 0, 1, 2, 0]);
    assert!(!session.is_ended());
}

#[test]
fn test_release_after_failure() {
    let (backend, mut session) = open(
        MockDevice::camera(CodecId::RawVideo, PixelFormat::Yuyv422, WIDTH, HEIGHT, 2)
            .with_read_error_at(0),
    );
    assert!(session.read_frame().is_none());
    session.close();
    assert!(backend.ledger().outstanding().is_empty());
}
