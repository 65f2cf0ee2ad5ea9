// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Au-Zone Technologies

//! Capture session construction and teardown.
//!
//! [`CaptureSession::open`] acquires the pipeline in a fixed order:
//!
//! 1. transport context
//! 2. transport driver for the configured device class
//! 3. device input
//! 4. stream probe
//! 5. first video stream, in transport order
//! 6. decoding context of that stream
//! 7. converter from the decoder's native format to the requested one, at
//!    the decoder's geometry (reformat only, no rescale)
//! 8. decoder, opened in place on the context from step 6
//! 9. time-base repair, see [`Rational::corrected`]
//! 10. encoded-domain frame
//! 11. output buffer sized for one converted picture
//!
//! Each acquired resource is held by a local whose `Drop` releases it, so an
//! error at any step unwinds everything acquired before it in reverse order.
//! A successful open moves the resources into the session, whose fields are
//! declared in reverse acquisition order for the same effect on close.

use crate::{
    backend::{Backend, CodecParameters, Decoder, Geometry, Input, ScaleFlags, StreamInfo},
    config::CaptureConfig,
    format::{CodecId, MediaType, PixelFormat, Rational},
    pump::StreamEnd,
    Error,
};
use std::{
    fmt,
    ops::{Deref, DerefMut},
};

/// Opened input whose stream codec contexts are closed before the input itself.
pub(crate) struct ProbedInput<I: Input>(I);

impl<I: Input> Deref for ProbedInput<I> {
    type Target = I;

    fn deref(&self) -> &I {
        &self.0
    }
}

impl<I: Input> DerefMut for ProbedInput<I> {
    fn deref_mut(&mut self) -> &mut I {
        &mut self.0
    }
}

impl<I: Input> Drop for ProbedInput<I> {
    fn drop(&mut self) {
        self.0.close_codecs();
    }
}

/// Converted picture in the requested pixel format.
///
/// Allocated once at open; every successful read overwrites the bytes in place.
pub(crate) struct RawFrame {
    geometry: Geometry,
    data: Vec<u8>,
}

impl RawFrame {
    fn alloc(geometry: Geometry, size: usize) -> Result<Self, Error> {
        let mut data = Vec::new();
        data.try_reserve_exact(size)
            .map_err(|_| Error::Alloc("output buffer"))?;
        data.resize(size, 0);
        Ok(RawFrame { geometry, data })
    }

    pub(crate) fn data(&self) -> &[u8] {
        &self.data
    }

    pub(crate) fn data_mut(&mut self) -> &mut [u8] {
        &mut self.data
    }
}

/// Index of the first video stream in transport order.
///
/// Selection is first-match: later video streams are never considered even
/// if they would suit the request better.
pub fn select_video_stream(streams: &[StreamInfo]) -> Option<usize> {
    streams
        .iter()
        .find(|stream| stream.media_type == MediaType::Video)
        .map(|stream| stream.index)
}

/// A live capture pipeline.
///
/// Owns every pipeline resource exclusively. Dropping the session (or calling
/// [`close`](Self::close)) releases them in reverse acquisition order.
pub struct CaptureSession<B: Backend> {
    // Declaration order is release order.
    pub(crate) output: RawFrame,
    pub(crate) encoded: B::Frame,
    pub(crate) scaler: B::Scaler,
    pub(crate) decoder: B::Decoder,
    pub(crate) input: ProbedInput<B::Input>,

    config: CaptureConfig,
    stream_index: usize,
    source: CodecParameters,
    time_base: Rational,
    pub(crate) end: Option<StreamEnd>,
    pub(crate) frames_read: u64,
}

impl<B: Backend> CaptureSession<B> {
    /// Open `path` and build the full decode and convert pipeline.
    ///
    /// `codec` is the codec the device is asked to deliver; the decoder is
    /// chosen from what the opened stream reports. Width and height are passed
    /// to the transport unchecked.
    ///
    /// # Errors
    ///
    /// Returns the error of the first step that failed, after releasing every
    /// resource acquired before it. No partially built session is ever returned.
    ///
    /// # Example
    ///
    /// ```
    /// use videograb::mock::{MockBackend, MockDevice};
    /// use videograb::{CaptureSession, CodecId, PixelFormat};
    ///
    /// let backend = MockBackend::new(MockDevice::camera(
    ///     CodecId::Mjpeg,
    ///     PixelFormat::Yuvj422p,
    ///     320,
    ///     240,
    ///     3,
    /// ));
    /// let session = CaptureSession::open(
    ///     &backend,
    ///     "/dev/video0",
    ///     320,
    ///     240,
    ///     CodecId::Mjpeg,
    ///     PixelFormat::Rgb24,
    /// )?;
    /// assert_eq!(session.buffer_size(), 320 * 240 * 3);
    /// # Ok::<(), videograb::Error>(())
    /// ```
    pub fn open(
        backend: &B,
        path: &str,
        width: u32,
        height: u32,
        codec: CodecId,
        pixel_format: PixelFormat,
    ) -> Result<Self, Error> {
        let config = CaptureConfig::default()
            .with_device(path)
            .with_resolution(width, height)
            .with_codec(codec)
            .with_pixel_format(pixel_format);
        Self::open_with(backend, config)
    }

    /// Open a session from a [`CaptureConfig`].
    pub fn open_with(backend: &B, config: CaptureConfig) -> Result<Self, Error> {
        let device = config.device().to_owned();
        Self::build(backend, config).map_err(|err| {
            log::warn!("cannot open capture session on {}: {}", device, err);
            err
        })
    }

    fn build(backend: &B, config: CaptureConfig) -> Result<Self, Error> {
        let context = backend.alloc_context()?;
        let params = config.format_parameters();
        let format = backend
            .find_input_format(config.input_format())
            .ok_or_else(|| Error::InputFormatNotFound(config.input_format().to_owned()))?;

        log::debug!(
            "opening {} via {} ({}x{}, {})",
            config.device(),
            config.input_format(),
            params.width,
            params.height,
            params.codec
        );
        let mut input = backend.open_input(context, &format, config.device(), &params)?;
        input.find_stream_info()?;
        let mut input = ProbedInput(input);

        let streams = input.streams();
        let stream_index = select_video_stream(&streams).ok_or(Error::NoVideoStream)?;
        log::debug!(
            "selected stream {} of {} on {}",
            stream_index,
            streams.len(),
            config.device()
        );

        let mut decoder = input.decoder(stream_index)?;
        let source = decoder.parameters();
        let target = Geometry {
            format: config.pixel_format(),
            width: source.width,
            height: source.height,
        };

        let scaler = backend.scaler(&decoder, target, ScaleFlags::FastBilinear)?;
        log::debug!("converting {} to {}", source.geometry(), target);

        let codec = backend
            .find_decoder(source.codec)
            .ok_or(Error::DecoderNotFound(source.codec))?;
        decoder.open(&codec)?;

        let time_base = source.time_base.corrected();
        if time_base != source.time_base {
            log::info!(
                "correcting time base of stream {} from {} to {}",
                stream_index,
                source.time_base,
                time_base
            );
            decoder.set_time_base(time_base);
        }

        let encoded = backend.alloc_frame()?;
        let size = backend.image_size(target.format, target.width, target.height)?;
        let output = RawFrame::alloc(target, size)?;
        log::debug!("allocated {} byte output buffer", size);

        Ok(CaptureSession {
            output,
            encoded,
            scaler,
            decoder,
            input,
            config,
            stream_index,
            source,
            time_base,
            end: None,
            frames_read: 0,
        })
    }

    /// Release the pipeline. Equivalent to dropping the session.
    pub fn close(self) {
        drop(self)
    }

    /// Width of the delivered frames
    pub fn width(&self) -> u32 {
        self.source.width
    }

    /// Height of the delivered frames
    pub fn height(&self) -> u32 {
        self.source.height
    }

    /// Byte length of the output buffer, fixed for the session's lifetime
    pub fn buffer_size(&self) -> usize {
        self.output.data().len()
    }

    /// The output buffer.
    ///
    /// Holds the most recently converted frame (zeroes before the first read).
    /// The address is stable for the session's lifetime.
    pub fn buffer(&self) -> &[u8] {
        self.output.data()
    }

    /// Pixel format of the output buffer
    pub fn pixel_format(&self) -> PixelFormat {
        self.output.geometry.format
    }

    /// Native pixel format of the decoder
    pub fn source_format(&self) -> PixelFormat {
        self.source.format
    }

    /// Codec of the selected stream
    pub fn codec(&self) -> CodecId {
        self.source.codec
    }

    /// Index of the selected video stream within the transport
    pub fn stream_index(&self) -> usize {
        self.stream_index
    }

    /// Time base of the selected stream, after repair
    pub fn time_base(&self) -> Rational {
        self.time_base
    }

    /// Number of frames delivered so far
    pub fn frames_read(&self) -> u64 {
        self.frames_read
    }

    /// Configuration the session was opened with
    pub fn config(&self) -> &CaptureConfig {
        &self.config
    }
}

impl<B: Backend> Drop for CaptureSession<B> {
    fn drop(&mut self) {
        log::debug!(
            "closing capture session on {} after {} frames",
            self.config.device(),
            self.frames_read
        );
    }
}

impl<B: Backend> fmt::Debug for CaptureSession<B> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CaptureSession")
            .field("device", &self.config.device())
            .field("stream_index", &self.stream_index)
            .field("source", &self.source.geometry())
            .field("output", &self.output.geometry)
            .field("buffer_size", &self.buffer_size())
            .field("frames_read", &self.frames_read)
            .finish()
    }
}

/// Session access that tolerates a missing session.
///
/// Implemented for `Option<CaptureSession<_>>`, the natural holder for a
/// session that may have failed to open or may already be closed. Accessors
/// return zero or `None`, [`read_frame`](Self::read_frame) returns the end
/// sentinel and [`close`](Self::close) does nothing.
pub trait SessionHandle {
    fn width(&self) -> u32;
    fn height(&self) -> u32;
    fn buffer_size(&self) -> usize;
    fn buffer(&self) -> Option<&[u8]>;
    fn read_frame(&mut self) -> Option<&[u8]>;
    /// Release the session if there is one, leaving `None` behind.
    fn close(&mut self);
}

impl<B: Backend> SessionHandle for Option<CaptureSession<B>> {
    fn width(&self) -> u32 {
        self.as_ref().map_or(0, CaptureSession::width)
    }

    fn height(&self) -> u32 {
        self.as_ref().map_or(0, CaptureSession::height)
    }

    fn buffer_size(&self) -> usize {
        self.as_ref().map_or(0, CaptureSession::buffer_size)
    }

    fn buffer(&self) -> Option<&[u8]> {
        self.as_ref().map(CaptureSession::buffer)
    }

    fn read_frame(&mut self) -> Option<&[u8]> {
        self.as_mut()?.read_frame()
    }

    fn close(&mut self) {
        if let Some(session) = self.take() {
            session.close();
        }
    }
}
