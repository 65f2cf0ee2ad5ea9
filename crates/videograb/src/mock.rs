// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Au-Zone Technologies

//! Scripted in-memory capture backend.
//!
//! [`MockBackend`] implements the [`Backend`] contract on top of a
//! [`MockDevice`] script: a list of streams and a list of packets, plus
//! optional failures at any acquisition step or while streaming. Every
//! resource it hands out records its acquisition and release in a shared
//! [`Ledger`], which is what the lifecycle tests inspect.
//!
//! Decoding is symbolic. Each packet carries a one-byte payload; payloads of
//! partial packets accumulate until a packet completes the frame, and the
//! converter fills the whole output buffer with the accumulated byte. A
//! field-pair packet completes two pictures, the second of which stays queued
//! in the decoder until it is drained.
//!
//! ```
//! use videograb::mock::{MockBackend, MockDevice, MockPacket, MockStream};
//! use videograb::{CaptureConfig, CodecId, PixelFormat};
//!
//! let device = MockDevice::new()
//!     .with_stream(MockStream::audio())
//!     .with_stream(MockStream::video(CodecId::Mjpeg, PixelFormat::Yuvj420p, 8, 8))
//!     .with_packet(MockPacket::partial(1, 3))
//!     .with_packet(MockPacket::frame(1, 4));
//! let backend = MockBackend::new(device);
//!
//! let mut session = CaptureConfig::default()
//!     .with_pixel_format(PixelFormat::Gray8)
//!     .open(&backend)?;
//! assert_eq!(session.read_frame(), Some(&[7u8; 64][..]));
//! assert_eq!(session.read_frame(), None);
//!
//! drop(session);
//! assert!(backend.ledger().outstanding().is_empty());
//! # Ok::<(), videograb::Error>(())
//! ```

use crate::{
    backend::{
        Backend, CodecParameters, Decoder, FormatParameters, Geometry, Input, InputFormatInfo,
        Packet, ScaleFlags, Scaler, StreamInfo, Version,
    },
    config::DEFAULT_INPUT_FORMAT,
    format::{CodecId, MediaType, PixelFormat, Rational},
    Error,
};
use std::{cell::RefCell, collections::VecDeque, io, rc::Rc};

/// Acquisition step at which the mock backend can be told to fail
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FailPoint {
    AllocContext,
    OpenInput,
    FindStreamInfo,
    CodecContext,
    Scaler,
    FindDecoder,
    OpenDecoder,
    AllocFrame,
    /// Report a frame size no allocator can satisfy
    OutputBuffer,
}

/// Every injectable failure, in acquisition order.
pub const FAIL_POINTS: [FailPoint; 9] = [
    FailPoint::AllocContext,
    FailPoint::OpenInput,
    FailPoint::FindStreamInfo,
    FailPoint::CodecContext,
    FailPoint::Scaler,
    FailPoint::FindDecoder,
    FailPoint::OpenDecoder,
    FailPoint::AllocFrame,
    FailPoint::OutputBuffer,
];

/// Resource handed out by the mock backend
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Resource {
    Context,
    Input,
    StreamCodecs,
    Decoder,
    Scaler,
    Frame,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Event {
    Acquire(Resource),
    Release(Resource),
}

/// Shared record of resource acquisitions and releases
#[derive(Debug, Clone, Default)]
pub struct Ledger(Rc<RefCell<Vec<Event>>>);

impl Ledger {
    fn record(&self, event: Event) {
        self.0.borrow_mut().push(event);
    }

    fn acquire(&self, resource: Resource) {
        self.record(Event::Acquire(resource));
    }

    fn release(&self, resource: Resource) {
        self.record(Event::Release(resource));
    }

    /// All events in the order they happened
    pub fn events(&self) -> Vec<Event> {
        self.0.borrow().clone()
    }

    /// Acquired resources, in acquisition order
    pub fn acquired(&self) -> Vec<Resource> {
        self.0
            .borrow()
            .iter()
            .filter_map(|event| match event {
                Event::Acquire(resource) => Some(*resource),
                Event::Release(_) => None,
            })
            .collect()
    }

    /// Released resources, in release order
    pub fn released(&self) -> Vec<Resource> {
        self.0
            .borrow()
            .iter()
            .filter_map(|event| match event {
                Event::Release(resource) => Some(*resource),
                Event::Acquire(_) => None,
            })
            .collect()
    }

    /// Resources acquired and not yet released
    pub fn outstanding(&self) -> Vec<Resource> {
        let mut live = Vec::new();
        for event in self.0.borrow().iter() {
            match event {
                Event::Acquire(resource) => live.push(*resource),
                Event::Release(resource) => {
                    if let Some(pos) = live.iter().rposition(|r| r == resource) {
                        live.remove(pos);
                    }
                }
            }
        }
        live
    }

    pub fn clear(&self) {
        self.0.borrow_mut().clear();
    }
}

/// One scripted stream
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MockStream {
    pub media_type: MediaType,
    pub codec: CodecId,
    pub format: PixelFormat,
    pub width: u32,
    pub height: u32,
    pub time_base: Rational,
    /// The converter accepts the native format of this stream
    pub convertible: bool,
}

impl MockStream {
    pub fn video(codec: CodecId, format: PixelFormat, width: u32, height: u32) -> Self {
        MockStream {
            media_type: MediaType::Video,
            codec,
            format,
            width,
            height,
            time_base: Rational::new(1, 30),
            convertible: format != PixelFormat::Unknown,
        }
    }

    pub fn audio() -> Self {
        MockStream {
            media_type: MediaType::Audio,
            codec: CodecId::Unknown,
            format: PixelFormat::Unknown,
            width: 0,
            height: 0,
            time_base: Rational::new(1, 48_000),
            convertible: false,
        }
    }

    pub fn data() -> Self {
        MockStream {
            media_type: MediaType::Data,
            ..MockStream::audio()
        }
    }

    pub fn with_time_base(self, time_base: Rational) -> Self {
        MockStream { time_base, ..self }
    }

    /// Report a native format that has no [`PixelFormat`] name but that the
    /// converter still accepts
    pub fn with_unlisted_format(self) -> Self {
        MockStream {
            format: PixelFormat::Unknown,
            convertible: true,
            ..self
        }
    }
}

/// One scripted transport packet
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MockPacket {
    pub stream: usize,
    pub payload: u8,
    pub completes_frame: bool,
    pub field_pair: bool,
    pub corrupt: bool,
}

impl MockPacket {
    /// Packet that completes a frame
    pub fn frame(stream: usize, payload: u8) -> Self {
        MockPacket {
            stream,
            payload,
            completes_frame: true,
            field_pair: false,
            corrupt: false,
        }
    }

    /// Packet that completes two pictures with the same payload
    pub fn field_pair(stream: usize, payload: u8) -> Self {
        MockPacket {
            field_pair: true,
            ..MockPacket::frame(stream, payload)
        }
    }

    /// Packet the decoder buffers without producing a frame
    pub fn partial(stream: usize, payload: u8) -> Self {
        MockPacket {
            completes_frame: false,
            ..MockPacket::frame(stream, payload)
        }
    }

    /// Packet the decoder rejects
    pub fn corrupt(stream: usize) -> Self {
        MockPacket {
            corrupt: true,
            ..MockPacket::frame(stream, 0)
        }
    }
}

impl Packet for MockPacket {
    fn stream_index(&self) -> usize {
        self.stream
    }
}

/// Script for a [`MockBackend`]
#[derive(Debug, Clone)]
pub struct MockDevice {
    streams: Vec<MockStream>,
    packets: Vec<MockPacket>,
    input_formats: Vec<String>,
    fail: Option<FailPoint>,
    read_error_at: Option<usize>,
    convert_error: bool,
    repeat: bool,
}

impl MockDevice {
    /// Device with no streams and no packets, registered as `video4linux2`
    pub fn new() -> Self {
        MockDevice {
            streams: Vec::new(),
            packets: Vec::new(),
            input_formats: vec![DEFAULT_INPUT_FORMAT.to_owned()],
            fail: None,
            read_error_at: None,
            convert_error: false,
            repeat: false,
        }
    }

    /// Single video stream delivering `frames` complete frames with payloads 0, 1, 2, ...
    pub fn camera(codec: CodecId, format: PixelFormat, width: u32, height: u32, frames: usize) -> Self {
        MockDevice::new()
            .with_stream(MockStream::video(codec, format, width, height))
            .with_packets((0..frames).map(|i| MockPacket::frame(0, i as u8)))
    }

    pub fn with_stream(mut self, stream: MockStream) -> Self {
        self.streams.push(stream);
        self
    }

    pub fn with_packet(mut self, packet: MockPacket) -> Self {
        self.packets.push(packet);
        self
    }

    pub fn with_packets(mut self, packets: impl IntoIterator<Item = MockPacket>) -> Self {
        self.packets.extend(packets);
        self
    }

    /// Register an additional device class name
    pub fn with_input_format(mut self, name: &str) -> Self {
        self.input_formats.push(name.to_owned());
        self
    }

    /// Unregister every device class name
    pub fn without_input_formats(mut self) -> Self {
        self.input_formats.clear();
        self
    }

    /// Fail the given acquisition step
    pub fn with_failure(mut self, fail: FailPoint) -> Self {
        self.fail = Some(fail);
        self
    }

    /// Fail the read of the packet at position `index`
    pub fn with_read_error_at(mut self, index: usize) -> Self {
        self.read_error_at = Some(index);
        self
    }

    /// Fail every conversion
    pub fn with_convert_error(mut self) -> Self {
        self.convert_error = true;
        self
    }

    /// Restart the packet list from the beginning instead of ending
    pub fn repeating(mut self) -> Self {
        self.repeat = true;
        self
    }

    fn fails_at(&self, point: FailPoint) -> bool {
        self.fail == Some(point)
    }
}

impl Default for MockDevice {
    fn default() -> Self {
        MockDevice::new()
    }
}

/// Backend serving a [`MockDevice`] script
#[derive(Debug, Clone)]
pub struct MockBackend {
    device: Rc<MockDevice>,
    ledger: Ledger,
}

impl MockBackend {
    pub fn new(device: MockDevice) -> Self {
        MockBackend {
            device: Rc::new(device),
            ledger: Ledger::default(),
        }
    }

    /// Ledger shared by every resource this backend hands out
    pub fn ledger(&self) -> Ledger {
        self.ledger.clone()
    }
}

pub struct MockContext {
    ledger: Ledger,
}

impl Drop for MockContext {
    fn drop(&mut self) {
        self.ledger.release(Resource::Context);
    }
}

#[derive(Debug, Clone)]
pub struct MockInputFormat {
    name: String,
}

pub struct MockInput {
    device: Rc<MockDevice>,
    ledger: Ledger,
    cursor: usize,
    codecs_open: bool,
    // Dropped after `Drop::drop` closed the input.
    _context: MockContext,
}

impl Drop for MockInput {
    fn drop(&mut self) {
        self.ledger.release(Resource::Input);
    }
}

pub struct MockCodec(CodecId);

pub struct MockDecoder {
    ledger: Ledger,
    params: CodecParameters,
    convertible: bool,
    fail_open: bool,
    opened: bool,
    pending: u8,
    queued: VecDeque<u8>,
}

impl MockDecoder {
    /// Time base currently set on the context
    pub fn time_base(&self) -> Rational {
        self.params.time_base
    }

    fn check_open(&self) -> Result<(), Error> {
        if !self.opened {
            return Err(Error::Decode(io::Error::new(
                io::ErrorKind::Other,
                "decoder not open",
            )));
        }
        Ok(())
    }

    fn take_picture(&mut self, frame: &mut MockFrame) -> bool {
        match self.queued.pop_front() {
            Some(payload) => {
                frame.payload = payload;
                frame.complete = true;
                true
            }
            None => false,
        }
    }
}

impl Drop for MockDecoder {
    fn drop(&mut self) {
        self.ledger.release(Resource::Decoder);
    }
}

pub struct MockScaler {
    ledger: Ledger,
    dst: Geometry,
    size: usize,
    fail: bool,
}

impl Drop for MockScaler {
    fn drop(&mut self) {
        self.ledger.release(Resource::Scaler);
    }
}

pub struct MockFrame {
    ledger: Ledger,
    payload: u8,
    complete: bool,
}

impl Drop for MockFrame {
    fn drop(&mut self) {
        self.ledger.release(Resource::Frame);
    }
}

fn injected(what: &str) -> io::Error {
    io::Error::new(io::ErrorKind::Other, format!("injected failure: {}", what))
}

impl Backend for MockBackend {
    type Context = MockContext;
    type InputFormat = MockInputFormat;
    type Input = MockInput;
    type Packet = MockPacket;
    type Decoder = MockDecoder;
    type Codec = MockCodec;
    type Scaler = MockScaler;
    type Frame = MockFrame;

    fn alloc_context(&self) -> Result<MockContext, Error> {
        if self.device.fails_at(FailPoint::AllocContext) {
            return Err(Error::Alloc("transport context"));
        }
        self.ledger.acquire(Resource::Context);
        Ok(MockContext {
            ledger: self.ledger.clone(),
        })
    }

    fn find_input_format(&self, name: &str) -> Option<MockInputFormat> {
        self.device
            .input_formats
            .iter()
            .find(|registered| registered.as_str() == name)
            .map(|name| MockInputFormat { name: name.clone() })
    }

    fn open_input(
        &self,
        context: MockContext,
        format: &MockInputFormat,
        path: &str,
        params: &FormatParameters,
    ) -> Result<MockInput, Error> {
        if self.device.fails_at(FailPoint::OpenInput) {
            drop(context);
            return Err(Error::DeviceOpen(
                path.to_owned(),
                io::Error::from(io::ErrorKind::NotFound),
            ));
        }
        if params.width == 0 || params.height == 0 {
            drop(context);
            return Err(Error::DeviceOpen(
                path.to_owned(),
                io::Error::new(io::ErrorKind::InvalidInput, "invalid frame size"),
            ));
        }

        log::trace!("mock {} opened {}", format.name, path);
        self.ledger.acquire(Resource::Input);
        Ok(MockInput {
            device: Rc::clone(&self.device),
            ledger: self.ledger.clone(),
            cursor: 0,
            codecs_open: false,
            _context: context,
        })
    }

    fn find_decoder(&self, codec: CodecId) -> Option<MockCodec> {
        if self.device.fails_at(FailPoint::FindDecoder) || codec == CodecId::Unknown {
            return None;
        }
        Some(MockCodec(codec))
    }

    fn scaler(
        &self,
        decoder: &MockDecoder,
        dst: Geometry,
        _flags: ScaleFlags,
    ) -> Result<MockScaler, Error> {
        let src = decoder.params.format;
        let size = dst.format.frame_size(dst.width, dst.height);
        let size = match size {
            Some(size) if decoder.convertible => size,
            _ => return Err(Error::ScalerUnavailable(src, dst.format)),
        };
        if self.device.fails_at(FailPoint::Scaler) {
            return Err(Error::ScalerUnavailable(src, dst.format));
        }

        self.ledger.acquire(Resource::Scaler);
        Ok(MockScaler {
            ledger: self.ledger.clone(),
            dst,
            size,
            fail: self.device.convert_error,
        })
    }

    fn alloc_frame(&self) -> Result<MockFrame, Error> {
        if self.device.fails_at(FailPoint::AllocFrame) {
            return Err(Error::Alloc("frame"));
        }
        self.ledger.acquire(Resource::Frame);
        Ok(MockFrame {
            ledger: self.ledger.clone(),
            payload: 0,
            complete: false,
        })
    }

    fn image_size(&self, format: PixelFormat, width: u32, height: u32) -> Result<usize, Error> {
        if self.device.fails_at(FailPoint::OutputBuffer) {
            return Ok(usize::MAX);
        }
        format
            .frame_size(width, height)
            .ok_or(Error::Alloc("output buffer"))
    }

    fn version(&self) -> Version {
        Version {
            major: 0,
            minor: 1,
            micro: 0,
        }
    }

    fn describe_input_format(&self, name: &str) -> Option<InputFormatInfo> {
        let format = self.find_input_format(name)?;
        Some(InputFormatInfo {
            name: format.name,
            long_name: "Scripted capture device".to_owned(),
            flags: 0,
            extensions: None,
            framework: self.version(),
        })
    }
}

impl Input for MockInput {
    type Packet = MockPacket;
    type Decoder = MockDecoder;

    fn find_stream_info(&mut self) -> Result<(), Error> {
        if self.device.fails_at(FailPoint::FindStreamInfo) {
            return Err(Error::StreamInfo(injected("stream info")));
        }
        self.ledger.acquire(Resource::StreamCodecs);
        self.codecs_open = true;
        Ok(())
    }

    fn streams(&self) -> Vec<StreamInfo> {
        self.device
            .streams
            .iter()
            .enumerate()
            .map(|(index, stream)| StreamInfo {
                index,
                media_type: stream.media_type,
                codec: stream.codec,
            })
            .collect()
    }

    fn decoder(&mut self, index: usize) -> Result<MockDecoder, Error> {
        if self.device.fails_at(FailPoint::CodecContext) {
            return Err(Error::CodecContext(index, injected("codec context")));
        }
        let stream = self.device.streams.get(index).ok_or_else(|| {
            Error::CodecContext(index, io::Error::from(io::ErrorKind::NotFound))
        })?;

        self.ledger.acquire(Resource::Decoder);
        Ok(MockDecoder {
            ledger: self.ledger.clone(),
            params: CodecParameters {
                codec: stream.codec,
                format: stream.format,
                width: stream.width,
                height: stream.height,
                time_base: stream.time_base,
            },
            convertible: stream.convertible,
            fail_open: self.device.fails_at(FailPoint::OpenDecoder),
            opened: false,
            pending: 0,
            queued: VecDeque::new(),
        })
    }

    fn read_packet(&mut self) -> Result<Option<MockPacket>, Error> {
        if self.device.read_error_at == Some(self.cursor) {
            return Err(Error::Read(io::Error::from(io::ErrorKind::BrokenPipe)));
        }
        if self.cursor >= self.device.packets.len() {
            if !self.device.repeat || self.device.packets.is_empty() {
                return Ok(None);
            }
            self.cursor = 0;
        }

        let packet = self.device.packets[self.cursor];
        self.cursor += 1;
        Ok(Some(packet))
    }

    fn close_codecs(&mut self) {
        if self.codecs_open {
            self.codecs_open = false;
            self.ledger.release(Resource::StreamCodecs);
        }
    }
}

impl Decoder for MockDecoder {
    type Codec = MockCodec;
    type Packet = MockPacket;
    type Frame = MockFrame;

    fn parameters(&self) -> CodecParameters {
        self.params
    }

    fn open(&mut self, codec: &MockCodec) -> Result<(), Error> {
        if self.fail_open || codec.0 != self.params.codec {
            return Err(Error::DecoderOpen(codec.0, injected("decoder open")));
        }
        self.opened = true;
        Ok(())
    }

    fn set_time_base(&mut self, time_base: Rational) {
        self.params.time_base = time_base;
    }

    fn decode(&mut self, packet: &MockPacket, frame: &mut MockFrame) -> Result<bool, Error> {
        self.check_open()?;
        if packet.corrupt {
            return Err(Error::Decode(io::Error::from(io::ErrorKind::InvalidData)));
        }

        self.pending = self.pending.wrapping_add(packet.payload);
        if packet.completes_frame {
            self.queued.push_back(self.pending);
            if packet.field_pair {
                self.queued.push_back(self.pending);
            }
            self.pending = 0;
        }
        Ok(self.take_picture(frame))
    }

    fn drain(&mut self, frame: &mut MockFrame) -> Result<bool, Error> {
        self.check_open()?;
        Ok(self.take_picture(frame))
    }
}

impl Scaler for MockScaler {
    type Frame = MockFrame;

    fn scale(&mut self, src: &MockFrame, dst: &mut [u8]) -> Result<(), Error> {
        if self.fail {
            return Err(Error::Convert(injected("convert")));
        }
        if !src.complete || dst.len() != self.size {
            return Err(Error::Convert(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("cannot convert into {} buffer of {} bytes", self.dst, dst.len()),
            )));
        }
        dst.fill(src.payload);
        Ok(())
    }
}
