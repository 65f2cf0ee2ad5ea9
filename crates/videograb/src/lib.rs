// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Au-Zone Technologies

//! videograb - video capture front end for Rust
//!
//! Opens a V4L2-class capture device through an external multimedia framework,
//! negotiates a codec and frame geometry, pulls compressed packets from the
//! device, decodes them and converts every decoded picture into a
//! caller-requested pixel format inside a single reusable output buffer.
//!
//! The pipeline is built by [`CaptureSession::open`] as one atomic unit: either
//! every stage is acquired and a session is returned, or every stage acquired
//! so far is released again in reverse order and an [`Error`] is returned.
//! Frames are then pulled one at a time with [`CaptureSession::read_frame`].
//!
//! # Quick Start
//!
//! ```no_run
//! # #[cfg(feature = "ffmpeg")]
//! # {
//! use videograb::{ffmpeg::FfmpegBackend, CaptureConfig, CodecId, PixelFormat};
//!
//! let backend = FfmpegBackend::new()?;
//! let mut session = CaptureConfig::default()
//!     .with_device("/dev/video0")
//!     .with_resolution(640, 480)
//!     .with_codec(CodecId::Mjpeg)
//!     .with_pixel_format(PixelFormat::Rgb24)
//!     .open(&backend)?;
//!
//! while let Some(frame) = session.read_frame() {
//!     // The buffer is overwritten by the next read, copy it out to keep it.
//!     println!("frame of {} bytes", frame.len());
//! }
//! # }
//! # Ok::<(), videograb::Error>(())
//! ```
//!
//! # Backends
//!
//! The external framework is reached through the [`backend::Backend`] trait
//! family. Two implementations ship with the crate:
//!
//! - [`mock::MockBackend`] - scripted in-memory device used by the tests and
//!   by the CLI's synthetic source
//! - `ffmpeg::FfmpegBackend` - libavdevice/libavcodec/libswscale through
//!   `ffmpeg-next`, enabled with the `ffmpeg` cargo feature

use std::{error, fmt, io, num::TryFromIntError};

/// The backend module describes the contract with the external multimedia framework.
pub mod backend;

/// The config module provides the capture session builder.
pub mod config;

/// The format module provides pixel formats, codec identifiers and time bases.
pub mod format;

/// The fourcc module provides portable handling of V4L2 fourcc codes.
pub mod fourcc;

/// The mock module provides a scripted in-memory backend.
pub mod mock;

/// The pump module pulls, decodes and converts frames for an open session.
pub mod pump;

/// The session module builds and tears down the capture pipeline.
pub mod session;

/// The ffmpeg module provides the FFmpeg capture backend.
#[cfg(feature = "ffmpeg")]
pub mod ffmpeg;

pub use config::CaptureConfig;
pub use format::{CodecId, MediaType, PixelFormat, Rational};
pub use pump::StreamEnd;
pub use session::{CaptureSession, SessionHandle};

/// Error type for capture pipeline operations
#[derive(Debug)]
pub enum Error {
    /// The input format (device class driver) is not known to the framework
    InputFormatNotFound(String),

    /// The capture device could not be opened (permissions, busy, missing)
    DeviceOpen(String, io::Error),

    /// Stream information could not be probed from the opened device
    StreamInfo(io::Error),

    /// The device does not expose any video stream
    NoVideoStream,

    /// The decoding context bound to the given stream is unavailable
    CodecContext(usize, io::Error),

    /// The converter cannot be built for the given source and target formats
    ScalerUnavailable(format::PixelFormat, format::PixelFormat),

    /// No decoder is registered for the codec
    DecoderNotFound(format::CodecId),

    /// The decoder for the codec could not be opened
    DecoderOpen(format::CodecId, io::Error),

    /// Allocation of the named pipeline resource failed
    Alloc(&'static str),

    /// Reading the next packet from the device failed
    Read(io::Error),

    /// Decoding a packet failed
    Decode(io::Error),

    /// Converting a decoded frame into the output buffer failed
    Convert(io::Error),

    /// I/O error from the underlying framework
    Io(io::Error),

    /// Integer conversion error (try_from failed)
    TryFromInt(TryFromIntError),
}

/// Coarse classification of an [`Error`]
///
/// Callers that only care about the failure class, such as the CLI mapping
/// errors onto exit codes, match on this instead of the individual variants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Unknown device class or driver
    Configuration,
    /// Device open failure
    Device,
    /// Stream probe failure or no usable stream
    Protocol,
    /// Allocation failure for a handle or buffer
    Resource,
    /// Decoder or converter unavailable
    Codec,
    /// Failure while pulling frames from an open session
    Read,
}

impl Error {
    /// Failure class of this error
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::InputFormatNotFound(_) => ErrorKind::Configuration,
            Error::DeviceOpen(..) => ErrorKind::Device,
            Error::StreamInfo(_) | Error::NoVideoStream | Error::CodecContext(..) => {
                ErrorKind::Protocol
            }
            Error::Alloc(_) | Error::TryFromInt(_) => ErrorKind::Resource,
            Error::ScalerUnavailable(..) | Error::DecoderNotFound(_) | Error::DecoderOpen(..) => {
                ErrorKind::Codec
            }
            Error::Read(_) | Error::Decode(_) | Error::Convert(_) | Error::Io(_) => ErrorKind::Read,
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            ErrorKind::Configuration => write!(f, "configuration"),
            ErrorKind::Device => write!(f, "device"),
            ErrorKind::Protocol => write!(f, "protocol"),
            ErrorKind::Resource => write!(f, "resource"),
            ErrorKind::Codec => write!(f, "codec"),
            ErrorKind::Read => write!(f, "read"),
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Error::InputFormatNotFound(name) => write!(f, "input format not found: {}", name),
            Error::DeviceOpen(path, err) => write!(f, "cannot open device {}: {}", path, err),
            Error::StreamInfo(err) => write!(f, "cannot probe stream information: {}", err),
            Error::NoVideoStream => write!(f, "no video stream"),
            Error::CodecContext(index, err) => {
                write!(f, "no decoding context for stream {}: {}", index, err)
            }
            Error::ScalerUnavailable(src, dst) => {
                write!(f, "cannot convert from {} to {}", src, dst)
            }
            Error::DecoderNotFound(codec) => write!(f, "no decoder for codec {}", codec),
            Error::DecoderOpen(codec, err) => {
                write!(f, "cannot open decoder for codec {}: {}", codec, err)
            }
            Error::Alloc(what) => write!(f, "allocation failed: {}", what),
            Error::Read(err) => write!(f, "read error: {}", err),
            Error::Decode(err) => write!(f, "decode error: {}", err),
            Error::Convert(err) => write!(f, "conversion error: {}", err),
            Error::Io(err) => write!(f, "I/O error: {}", err),
            Error::TryFromInt(err) => write!(f, "Integer conversion error: {}", err),
        }
    }
}

impl error::Error for Error {
    fn source(&self) -> Option<&(dyn error::Error + 'static)> {
        match self {
            Error::DeviceOpen(_, err)
            | Error::StreamInfo(err)
            | Error::CodecContext(_, err)
            | Error::DecoderOpen(_, err)
            | Error::Read(err)
            | Error::Decode(err)
            | Error::Convert(err)
            | Error::Io(err) => Some(err),
            Error::TryFromInt(err) => Some(err),
            Error::InputFormatNotFound(_)
            | Error::NoVideoStream
            | Error::ScalerUnavailable(..)
            | Error::DecoderNotFound(_)
            | Error::Alloc(_) => None,
        }
    }
}

impl From<io::Error> for Error {
    fn from(err: io::Error) -> Self {
        Error::Io(err)
    }
}

impl From<TryFromIntError> for Error {
    fn from(err: TryFromIntError) -> Self {
        Error::TryFromInt(err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error as _;

    #[test]
    fn test_error_kinds() {
        let not_found = || io::Error::from(io::ErrorKind::NotFound);

        assert_eq!(
            Error::InputFormatNotFound("video4linux2".into()).kind(),
            ErrorKind::Configuration
        );
        assert_eq!(
            Error::DeviceOpen("/dev/video0".into(), not_found()).kind(),
            ErrorKind::Device
        );
        assert_eq!(Error::StreamInfo(not_found()).kind(), ErrorKind::Protocol);
        assert_eq!(Error::NoVideoStream.kind(), ErrorKind::Protocol);
        assert_eq!(Error::Alloc("output buffer").kind(), ErrorKind::Resource);
        assert_eq!(
            Error::DecoderNotFound(CodecId::H264).kind(),
            ErrorKind::Codec
        );
        assert_eq!(
            Error::ScalerUnavailable(PixelFormat::Yuyv422, PixelFormat::Rgb24).kind(),
            ErrorKind::Codec
        );
        assert_eq!(Error::Read(not_found()).kind(), ErrorKind::Read);
    }

    #[test]
    fn test_error_display() {
        let err = Error::DeviceOpen(
            "/dev/video9".into(),
            io::Error::from(io::ErrorKind::PermissionDenied),
        );
        let msg = format!("{}", err);
        assert!(msg.starts_with("cannot open device /dev/video9"));
        assert!(err.source().is_some());

        assert_eq!(format!("{}", Error::NoVideoStream), "no video stream");
        assert!(Error::NoVideoStream.source().is_none());
    }

    #[test]
    fn test_error_from_io() {
        let err: Error = io::Error::from(io::ErrorKind::TimedOut).into();
        assert!(matches!(err, Error::Io(_)));
        assert_eq!(err.kind(), ErrorKind::Read);
    }
}
