// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Au-Zone Technologies

//! FFmpeg capture backend.
//!
//! Devices are opened through libavdevice (`video4linux2` on Linux), decoded
//! with libavcodec and converted with libswscale, all through `ffmpeg-next`.
//!
//! The device is opened into a pre-allocated format context without reading
//! any stream data; [`Input::find_stream_info`] runs the stream scan
//! afterwards. The stream codec contexts it creates are owned and closed by
//! the demuxer itself.

use crate::{
    backend::{
        Backend, CodecParameters, Decoder, FormatParameters, Geometry, Input, InputFormatInfo,
        Packet, ScaleFlags, Scaler, StreamInfo, Version,
    },
    format::{CodecId, MediaType, PixelFormat, Rational},
    Error,
};
use ffmpeg_next as ffmpeg;
use ffmpeg::{
    codec, ffi,
    format::{self, Pixel},
    media,
    software::scaling,
    Dictionary,
};
use std::{ffi::CString, io, ptr};

fn to_io(err: ffmpeg::Error) -> io::Error {
    match err {
        ffmpeg::Error::Other { errno } => io::Error::from_raw_os_error(errno),
        err => io::Error::new(io::ErrorKind::Other, err),
    }
}

fn is_again(err: &ffmpeg::Error) -> bool {
    matches!(err, ffmpeg::Error::Other { errno } if *errno == ffmpeg::util::error::EAGAIN)
}

fn to_pixel(format: PixelFormat) -> Pixel {
    match format {
        PixelFormat::Yuyv422 => Pixel::YUYV422,
        PixelFormat::Uyvy422 => Pixel::UYVY422,
        PixelFormat::Yuv420p => Pixel::YUV420P,
        PixelFormat::Yuvj420p => Pixel::YUVJ420P,
        PixelFormat::Yuv422p => Pixel::YUV422P,
        PixelFormat::Yuvj422p => Pixel::YUVJ422P,
        PixelFormat::Nv12 => Pixel::NV12,
        PixelFormat::Rgb24 => Pixel::RGB24,
        PixelFormat::Bgr24 => Pixel::BGR24,
        PixelFormat::Rgba => Pixel::RGBA,
        PixelFormat::Bgra => Pixel::BGRA,
        PixelFormat::Gray8 => Pixel::GRAY8,
        PixelFormat::Unknown => Pixel::None,
    }
}

fn from_pixel(pixel: Pixel) -> PixelFormat {
    match pixel {
        Pixel::YUYV422 => PixelFormat::Yuyv422,
        Pixel::UYVY422 => PixelFormat::Uyvy422,
        Pixel::YUV420P => PixelFormat::Yuv420p,
        Pixel::YUVJ420P => PixelFormat::Yuvj420p,
        Pixel::YUV422P => PixelFormat::Yuv422p,
        Pixel::YUVJ422P => PixelFormat::Yuvj422p,
        Pixel::NV12 => PixelFormat::Nv12,
        Pixel::RGB24 => PixelFormat::Rgb24,
        Pixel::BGR24 => PixelFormat::Bgr24,
        Pixel::RGBA => PixelFormat::Rgba,
        Pixel::BGRA => PixelFormat::Bgra,
        Pixel::GRAY8 => PixelFormat::Gray8,
        _ => PixelFormat::Unknown,
    }
}

fn to_codec_id(codec: CodecId) -> codec::Id {
    match codec {
        CodecId::RawVideo => codec::Id::RAWVIDEO,
        CodecId::Mjpeg => codec::Id::MJPEG,
        CodecId::H264 => codec::Id::H264,
        CodecId::Hevc => codec::Id::HEVC,
        CodecId::Unknown => codec::Id::None,
    }
}

fn from_codec_id(id: codec::Id) -> CodecId {
    match id {
        codec::Id::RAWVIDEO => CodecId::RawVideo,
        codec::Id::MJPEG => CodecId::Mjpeg,
        codec::Id::H264 => CodecId::H264,
        codec::Id::HEVC => CodecId::Hevc,
        _ => CodecId::Unknown,
    }
}

fn from_medium(medium: media::Type) -> MediaType {
    match medium {
        media::Type::Video => MediaType::Video,
        media::Type::Audio => MediaType::Audio,
        media::Type::Data => MediaType::Data,
        media::Type::Subtitle => MediaType::Subtitle,
        media::Type::Attachment => MediaType::Attachment,
        media::Type::Unknown => MediaType::Unknown,
    }
}

fn to_scaling_flags(flags: ScaleFlags) -> scaling::Flags {
    match flags {
        ScaleFlags::FastBilinear => scaling::Flags::FAST_BILINEAR,
        ScaleFlags::Bilinear => scaling::Flags::BILINEAR,
        ScaleFlags::Bicubic => scaling::Flags::BICUBIC,
    }
}

/// Backend driving libavdevice, libavcodec and libswscale
#[derive(Debug)]
pub struct FfmpegBackend {
    _private: (),
}

impl FfmpegBackend {
    /// Initialize the framework and register its device drivers.
    pub fn new() -> Result<Self, Error> {
        ffmpeg::init().map_err(|err| Error::Io(to_io(err)))?;
        ffmpeg::device::register_all();
        log::debug!("ffmpeg {} initialized", Version::from_packed(format::version()));
        Ok(FfmpegBackend { _private: () })
    }
}

/// Format context allocated ahead of the open, and the options handed to the
/// device with it
pub struct FfmpegContext {
    ptr: *mut ffi::AVFormatContext,
    options: Dictionary<'static>,
}

impl Drop for FfmpegContext {
    fn drop(&mut self) {
        if !self.ptr.is_null() {
            // SAFETY: the context was never opened, so it is still ours to free.
            unsafe { ffi::avformat_free_context(self.ptr) };
        }
    }
}

pub struct FfmpegInput {
    input: format::context::Input,
}

pub struct FfmpegPacket(ffmpeg::Packet);

impl Packet for FfmpegPacket {
    fn stream_index(&self) -> usize {
        self.0.stream()
    }
}

enum DecoderState {
    Closed(codec::context::Context),
    Open(codec::decoder::Video),
}

pub struct FfmpegDecoder {
    state: Option<DecoderState>,
    params: CodecParameters,
    // native output format, also when `params.format` has no name for it
    pixel: Pixel,
}

impl FfmpegDecoder {
    fn video(&mut self) -> Result<&mut codec::decoder::Video, Error> {
        match &mut self.state {
            Some(DecoderState::Open(video)) => Ok(video),
            _ => Err(Error::Decode(io::Error::new(
                io::ErrorKind::Other,
                "decoder not open",
            ))),
        }
    }
}

fn receive(
    video: &mut codec::decoder::Video,
    frame: &mut ffmpeg::frame::Video,
) -> Result<bool, Error> {
    match video.receive_frame(frame) {
        Ok(()) => Ok(true),
        Err(ffmpeg::Error::Eof) => Ok(false),
        Err(err) if is_again(&err) => Ok(false),
        Err(err) => Err(Error::Decode(to_io(err))),
    }
}

pub struct FfmpegScaler {
    context: scaling::Context,
    src_pixel: Pixel,
    src: Geometry,
    dst: Geometry,
}

impl Backend for FfmpegBackend {
    type Context = FfmpegContext;
    type InputFormat = format::Format;
    type Input = FfmpegInput;
    type Packet = FfmpegPacket;
    type Decoder = FfmpegDecoder;
    type Codec = ffmpeg::Codec;
    type Scaler = FfmpegScaler;
    type Frame = ffmpeg::frame::Video;

    fn alloc_context(&self) -> Result<FfmpegContext, Error> {
        // SAFETY: plain allocation, ownership is taken right below.
        let ptr = unsafe { ffi::avformat_alloc_context() };
        if ptr.is_null() {
            return Err(Error::Alloc("transport context"));
        }
        Ok(FfmpegContext {
            ptr,
            options: Dictionary::new(),
        })
    }

    fn find_input_format(&self, name: &str) -> Option<format::Format> {
        ffmpeg::device::input::video().find(|format| match format {
            // drivers register aliases as "video4linux2,v4l2"
            format::Format::Input(input) => input.name().split(',').any(|alias| alias == name),
            format::Format::Output(_) => false,
        })
    }

    fn open_input(
        &self,
        context: FfmpegContext,
        format: &format::Format,
        path: &str,
        params: &FormatParameters,
    ) -> Result<FfmpegInput, Error> {
        let mut context = context;
        let format = match format {
            format::Format::Input(input) => input,
            format::Format::Output(_) => {
                return Err(Error::DeviceOpen(
                    path.to_owned(),
                    io::Error::new(io::ErrorKind::InvalidInput, "not an input device"),
                ))
            }
        };
        let url = CString::new(path).map_err(|_| {
            Error::DeviceOpen(
                path.to_owned(),
                io::Error::new(io::ErrorKind::InvalidInput, "path contains a NUL byte"),
            )
        })?;

        let mut options = std::mem::replace(&mut context.options, Dictionary::new());
        options.set("video_size", &format!("{}x{}", params.width, params.height));
        if params.codec != CodecId::Unknown {
            options.set("input_format", params.codec.name());
        }
        let mut ptr = std::mem::replace(&mut context.ptr, ptr::null_mut());

        // SAFETY: `ptr` is the pre-allocated context, handed over to libavformat,
        // which frees it itself when the open fails. The options dictionary is
        // taken back afterwards and freed with whatever the driver left unused.
        let ret = unsafe {
            let mut raw_options = options.disown();
            let ret = ffi::avformat_open_input(
                &mut ptr,
                url.as_ptr(),
                format.as_ptr(),
                &mut raw_options,
            );
            drop(Dictionary::own(raw_options));
            ret
        };
        if ret < 0 {
            return Err(Error::DeviceOpen(
                path.to_owned(),
                to_io(ffmpeg::Error::from(ret)),
            ));
        }

        // SAFETY: the open succeeded, so `ptr` is an opened input context.
        let input = unsafe { format::context::Input::wrap(ptr) };
        Ok(FfmpegInput { input })
    }

    fn find_decoder(&self, codec: CodecId) -> Option<ffmpeg::Codec> {
        ffmpeg::decoder::find(to_codec_id(codec))
    }

    fn scaler(
        &self,
        decoder: &FfmpegDecoder,
        dst: Geometry,
        flags: ScaleFlags,
    ) -> Result<FfmpegScaler, Error> {
        let src = decoder.params.geometry();
        let context = scaling::Context::get(
            decoder.pixel,
            src.width,
            src.height,
            to_pixel(dst.format),
            dst.width,
            dst.height,
            to_scaling_flags(flags),
        )
        .map_err(|_| Error::ScalerUnavailable(src.format, dst.format))?;

        Ok(FfmpegScaler {
            context,
            src_pixel: decoder.pixel,
            src,
            dst,
        })
    }

    fn alloc_frame(&self) -> Result<ffmpeg::frame::Video, Error> {
        Ok(ffmpeg::frame::Video::empty())
    }

    fn image_size(&self, format: PixelFormat, width: u32, height: u32) -> Result<usize, Error> {
        let width = i32::try_from(width)?;
        let height = i32::try_from(height)?;
        // SAFETY: pure computation on plain integers.
        let size = unsafe { ffi::av_image_get_buffer_size(to_pixel(format).into(), width, height, 1) };
        if size < 0 {
            return Err(Error::Alloc("output buffer"));
        }
        Ok(usize::try_from(size)?)
    }

    fn version(&self) -> Version {
        Version::from_packed(format::version())
    }

    fn describe_input_format(&self, name: &str) -> Option<InputFormatInfo> {
        let format = match self.find_input_format(name)? {
            format::Format::Input(input) => input,
            format::Format::Output(_) => return None,
        };
        let extensions = format.extensions();
        // SAFETY: the descriptor is a static owned by libavdevice.
        let flags = unsafe { (*format.as_ptr()).flags };

        Some(InputFormatInfo {
            name: format.name().to_owned(),
            long_name: format.description().to_owned(),
            flags: flags as u32,
            extensions: if extensions.is_empty() {
                None
            } else {
                Some(extensions.join(","))
            },
            framework: self.version(),
        })
    }
}

impl Input for FfmpegInput {
    type Packet = FfmpegPacket;
    type Decoder = FfmpegDecoder;

    fn find_stream_info(&mut self) -> Result<(), Error> {
        // SAFETY: the context is open and exclusively owned by this input.
        let ret =
            unsafe { ffi::avformat_find_stream_info(self.input.as_mut_ptr(), ptr::null_mut()) };
        if ret < 0 {
            return Err(Error::StreamInfo(to_io(ffmpeg::Error::from(ret))));
        }
        Ok(())
    }

    fn streams(&self) -> Vec<StreamInfo> {
        self.input
            .streams()
            .map(|stream| {
                let params = stream.parameters();
                StreamInfo {
                    index: stream.index(),
                    media_type: from_medium(params.medium()),
                    codec: from_codec_id(params.id()),
                }
            })
            .collect()
    }

    fn decoder(&mut self, index: usize) -> Result<FfmpegDecoder, Error> {
        let stream = self.input.stream(index).ok_or_else(|| {
            Error::CodecContext(index, io::Error::from(io::ErrorKind::NotFound))
        })?;
        let time_base = stream.time_base();
        let context = codec::context::Context::from_parameters(stream.parameters())
            .map_err(|err| Error::CodecContext(index, to_io(err)))?;

        // SAFETY: the context was just created and is exclusively owned here.
        let (width, height, pixel) = unsafe {
            let raw = &*context.as_ptr();
            (raw.width, raw.height, Pixel::from(raw.pix_fmt))
        };

        let params = CodecParameters {
            codec: from_codec_id(context.id()),
            format: from_pixel(pixel),
            width: u32::try_from(width)?,
            height: u32::try_from(height)?,
            time_base: Rational::new(time_base.numerator(), time_base.denominator()),
        };

        Ok(FfmpegDecoder {
            state: Some(DecoderState::Closed(context)),
            params,
            pixel,
        })
    }

    fn read_packet(&mut self) -> Result<Option<FfmpegPacket>, Error> {
        let mut packet = ffmpeg::Packet::empty();
        match packet.read(&mut self.input) {
            Ok(()) => Ok(Some(FfmpegPacket(packet))),
            Err(ffmpeg::Error::Eof) => Ok(None),
            Err(err) => Err(Error::Read(to_io(err))),
        }
    }

    fn close_codecs(&mut self) {}
}

impl Decoder for FfmpegDecoder {
    type Codec = ffmpeg::Codec;
    type Packet = FfmpegPacket;
    type Frame = ffmpeg::frame::Video;

    fn parameters(&self) -> CodecParameters {
        self.params
    }

    fn open(&mut self, codec: &ffmpeg::Codec) -> Result<(), Error> {
        let id = self.params.codec;
        let context = match self.state.take() {
            Some(DecoderState::Closed(context)) => context,
            state => {
                self.state = state;
                return Err(Error::DecoderOpen(
                    id,
                    io::Error::new(io::ErrorKind::Other, "decoder already open"),
                ));
            }
        };

        let video = context
            .decoder()
            .open_as(*codec)
            .and_then(|opened| opened.video())
            .map_err(|err| Error::DecoderOpen(id, to_io(err)))?;
        self.state = Some(DecoderState::Open(video));
        Ok(())
    }

    fn set_time_base(&mut self, time_base: Rational) {
        self.params.time_base = time_base;
        let rational = ffi::AVRational {
            num: time_base.num,
            den: time_base.den,
        };
        // SAFETY: the codec context is exclusively owned by this decoder.
        unsafe {
            match &mut self.state {
                Some(DecoderState::Closed(context)) => (*context.as_mut_ptr()).time_base = rational,
                Some(DecoderState::Open(video)) => (*video.as_mut_ptr()).time_base = rational,
                None => {}
            }
        }
    }

    fn decode(&mut self, packet: &FfmpegPacket, frame: &mut ffmpeg::frame::Video) -> Result<bool, Error> {
        let video = self.video()?;

        match video.send_packet(&packet.0) {
            Ok(()) => receive(video, frame),
            Err(err) if is_again(&err) => {
                // output queue full: read one picture out, then resend
                if !receive(video, frame)? {
                    return Err(Error::Decode(to_io(err)));
                }
                video
                    .send_packet(&packet.0)
                    .map_err(|err| Error::Decode(to_io(err)))?;
                Ok(true)
            }
            Err(err) => Err(Error::Decode(to_io(err))),
        }
    }

    fn drain(&mut self, frame: &mut ffmpeg::frame::Video) -> Result<bool, Error> {
        receive(self.video()?, frame)
    }
}

impl Scaler for FfmpegScaler {
    type Frame = ffmpeg::frame::Video;

    fn scale(&mut self, src: &ffmpeg::frame::Video, dst: &mut [u8]) -> Result<(), Error> {
        if src.width() != self.src.width
            || src.height() != self.src.height
            || src.format() != self.src_pixel
        {
            return Err(Error::Convert(io::Error::new(
                io::ErrorKind::InvalidData,
                format!(
                    "frame is {}x{} {:?}, converter expects {}x{} {:?}",
                    src.width(),
                    src.height(),
                    src.format(),
                    self.src.width,
                    self.src.height,
                    self.src_pixel
                ),
            )));
        }

        let width = i32::try_from(self.dst.width)?;
        let height = i32::try_from(self.dst.height)?;
        let src_height = i32::try_from(self.src.height)?;
        let mut planes = [ptr::null_mut::<u8>(); 4];
        let mut strides = [0i32; 4];

        // SAFETY: only computes plane pointers and strides into `dst`.
        let required = unsafe {
            ffi::av_image_fill_arrays(
                planes.as_mut_ptr(),
                strides.as_mut_ptr(),
                dst.as_mut_ptr() as *const u8,
                to_pixel(self.dst.format).into(),
                width,
                height,
                1,
            )
        };
        if required < 0 || usize::try_from(required)? != dst.len() {
            return Err(Error::Convert(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("cannot lay out {} picture in {} bytes", self.dst, dst.len()),
            )));
        }

        // SAFETY: the planes cover exactly `dst`, laid out for the target
        // geometry, and `src` was checked against the source geometry above.
        let rows = unsafe {
            let raw = &*src.as_ptr();
            ffi::sws_scale(
                self.context.as_mut_ptr(),
                raw.data.as_ptr() as *const *const u8,
                raw.linesize.as_ptr(),
                0,
                src_height,
                planes.as_ptr(),
                strides.as_ptr(),
            )
        };
        if rows < 0 {
            return Err(Error::Convert(to_io(ffmpeg::Error::from(rows))));
        }
        if rows == 0 {
            return Err(Error::Convert(io::Error::new(
                io::ErrorKind::Other,
                format!("converter wrote no rows of {}", self.dst),
            )));
        }
        Ok(())
    }
}
