// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Au-Zone Technologies

//! Contract with the external multimedia framework.
//!
//! Device transport, demuxing, bitstream decoding and pixel conversion are not
//! implemented by this crate. They are reached through the traits in this
//! module, one associated type per resource the capture pipeline acquires.
//!
//! Every resource type releases itself in `Drop`. The session relies on Rust's
//! drop order (locals in reverse declaration order, struct fields in
//! declaration order) to release resources in exactly the reverse order in
//! which they were acquired, both on failure during
//! [`CaptureSession::open`](crate::CaptureSession::open) and when the session
//! is closed.
//!
//! | Resource | Acquired by | Released by |
//! |----------|-------------|-------------|
//! | transport context | [`Backend::alloc_context`] | drop, or [`Backend::open_input`] on failure |
//! | opened input | [`Backend::open_input`] | drop (closes the device, then frees the context) |
//! | stream codec contexts | [`Input::find_stream_info`] | [`Input::close_codecs`] |
//! | selected-stream decoder | [`Input::decoder`] | drop |
//! | converter | [`Backend::scaler`] | drop |
//! | encoded-domain frame | [`Backend::alloc_frame`] | drop |

use crate::{
    format::{CodecId, MediaType, PixelFormat, Rational},
    Error,
};
use std::fmt;

/// Scaling algorithm requested from the converter
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ScaleFlags {
    #[default]
    FastBilinear,
    Bilinear,
    Bicubic,
}

/// Format parameters handed to the transport when the device is opened
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormatParameters {
    /// The transport context was allocated by the caller before the open
    pub preallocated: bool,
    /// Requested capture width
    pub width: u32,
    /// Requested capture height
    pub height: u32,
    /// Codec the device should deliver
    pub codec: CodecId,
}

/// Pixel format and dimensions of a picture
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Geometry {
    pub format: PixelFormat,
    pub width: u32,
    pub height: u32,
}

impl fmt::Display for Geometry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{} {}", self.width, self.height, self.format)
    }
}

/// One stream of an opened input, as reported by the probe
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamInfo {
    pub index: usize,
    pub media_type: MediaType,
    pub codec: CodecId,
}

/// Parameters of a decoding context
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CodecParameters {
    pub codec: CodecId,
    /// Native output format, [`PixelFormat::Unknown`] when it has no name here
    pub format: PixelFormat,
    pub width: u32,
    pub height: u32,
    pub time_base: Rational,
}

impl CodecParameters {
    /// Geometry of the decoder's native output
    pub fn geometry(&self) -> Geometry {
        Geometry {
            format: self.format,
            width: self.width,
            height: self.height,
        }
    }
}

/// Version of the external framework
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Version {
    pub major: u32,
    pub minor: u32,
    pub micro: u32,
}

impl Version {
    /// Split a packed `major << 16 | minor << 8 | micro` version number
    pub const fn from_packed(version: u32) -> Self {
        Version {
            major: version >> 16,
            minor: (version >> 8) & 0xff,
            micro: version & 0xff,
        }
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.micro)
    }
}

/// Descriptor of a resolved input format (device class driver)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InputFormatInfo {
    pub name: String,
    pub long_name: String,
    pub flags: u32,
    /// File extensions, for drivers that also read files
    pub extensions: Option<String>,
    /// Version of the framework that reported the descriptor
    pub framework: Version,
}

/// Entry point into the external multimedia framework
pub trait Backend {
    /// Transport context allocated before the device is opened
    type Context;
    /// Resolved transport driver
    type InputFormat;
    /// Opened device input
    type Input: Input<Packet = Self::Packet, Decoder = Self::Decoder>;
    /// One transport packet
    type Packet: Packet;
    /// Decoding context bound to one stream
    type Decoder: Decoder<Codec = Self::Codec, Packet = Self::Packet, Frame = Self::Frame>;
    /// Registered decoder implementation
    type Codec;
    /// Pixel format and geometry converter
    type Scaler: Scaler<Frame = Self::Frame>;
    /// Decoder output frame
    type Frame;

    /// Allocate an empty transport context.
    fn alloc_context(&self) -> Result<Self::Context, Error>;

    /// Resolve a transport driver by device class name, e.g. `video4linux2`.
    fn find_input_format(&self, name: &str) -> Option<Self::InputFormat>;

    /// Open the device at `path` using the pre-allocated `context`.
    ///
    /// The context is consumed; when the open fails the backend releases it
    /// before returning the error.
    fn open_input(
        &self,
        context: Self::Context,
        format: &Self::InputFormat,
        path: &str,
        params: &FormatParameters,
    ) -> Result<Self::Input, Error>;

    /// Look up a registered decoder for `codec`.
    fn find_decoder(&self, codec: CodecId) -> Option<Self::Codec>;

    /// Build a converter from the native output of `decoder` to `dst`.
    ///
    /// The source format is taken from the decoding context as the framework
    /// reports it, so formats without a [`PixelFormat`] name still convert.
    fn scaler(
        &self,
        decoder: &Self::Decoder,
        dst: Geometry,
        flags: ScaleFlags,
    ) -> Result<Self::Scaler, Error>;

    /// Allocate an empty frame descriptor.
    fn alloc_frame(&self) -> Result<Self::Frame, Error>;

    /// Byte size of one contiguous picture of the given format and geometry.
    fn image_size(&self, format: PixelFormat, width: u32, height: u32) -> Result<usize, Error>;

    /// Version of the framework.
    fn version(&self) -> Version;

    /// Describe a transport driver, `None` if `name` is unknown.
    fn describe_input_format(&self, name: &str) -> Option<InputFormatInfo>;
}

/// An opened device input
pub trait Input {
    type Packet: Packet;
    type Decoder;

    /// Probe the stream structure of the input.
    fn find_stream_info(&mut self) -> Result<(), Error>;

    /// Streams in transport order.
    fn streams(&self) -> Vec<StreamInfo>;

    /// Obtain the decoding context bound to stream `index`.
    fn decoder(&mut self, index: usize) -> Result<Self::Decoder, Error>;

    /// Read the next packet. `Ok(None)` is the end of the stream.
    fn read_packet(&mut self) -> Result<Option<Self::Packet>, Error>;

    /// Close the codec contexts of every stream, including ones opened while
    /// probing. Called once, after the selected stream's decoder was dropped.
    fn close_codecs(&mut self);
}

/// One transport packet
pub trait Packet {
    /// Index of the stream this packet belongs to
    fn stream_index(&self) -> usize;
}

/// A decoding context bound to one stream
pub trait Decoder {
    type Codec;
    type Packet;
    type Frame;

    /// Parameters reported by the context.
    fn parameters(&self) -> CodecParameters;

    /// Open the context with `codec`.
    fn open(&mut self, codec: &Self::Codec) -> Result<(), Error>;

    /// Override the time base reported by the stream.
    fn set_time_base(&mut self, time_base: Rational);

    /// Feed one packet. Returns `true` when `frame` now holds a complete picture.
    ///
    /// The packet is never dropped: when the decoder cannot take it until a
    /// picture is read out, that picture goes to `frame` first. An error
    /// rejects this packet only; the decoder stays usable.
    fn decode(&mut self, packet: &Self::Packet, frame: &mut Self::Frame) -> Result<bool, Error>;

    /// Move a picture the decoder already holds into `frame`, without feeding
    /// input. Returns `false` when nothing is buffered.
    fn drain(&mut self, frame: &mut Self::Frame) -> Result<bool, Error>;
}

/// Pixel format and geometry converter
pub trait Scaler {
    type Frame;

    /// Convert `src` into the contiguous picture `dst`, which is exactly
    /// [`Backend::image_size`] bytes long for the converter's target.
    fn scale(&mut self, src: &Self::Frame, dst: &mut [u8]) -> Result<(), Error>;
}
