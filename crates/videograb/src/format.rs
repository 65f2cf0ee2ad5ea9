// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Au-Zone Technologies

//! Pixel formats, codec identifiers, media types and time bases.
//!
//! These are the framework-neutral vocabulary types shared by the session, the
//! backends and the CLI. Backends translate them to and from their native
//! identifiers.

use crate::fourcc::FourCC;
use std::{fmt, str::FromStr};

/// Pixel layout of a decoded or converted picture
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PixelFormat {
    /// Packed YUV 4:2:2, Y0 Cb Y1 Cr
    Yuyv422,
    /// Packed YUV 4:2:2, Cb Y0 Cr Y1
    Uyvy422,
    /// Planar YUV 4:2:0
    Yuv420p,
    /// Planar YUV 4:2:0, full range (JPEG)
    Yuvj420p,
    /// Planar YUV 4:2:2
    Yuv422p,
    /// Planar YUV 4:2:2, full range (JPEG)
    Yuvj422p,
    /// Semi-planar YUV 4:2:0, interleaved chroma plane
    Nv12,
    /// Packed RGB 8:8:8
    Rgb24,
    /// Packed BGR 8:8:8
    Bgr24,
    /// Packed RGBA 8:8:8:8
    Rgba,
    /// Packed BGRA 8:8:8:8
    Bgra,
    /// Single 8-bit luma plane
    Gray8,
    /// Format reported by the framework that has no mapping here
    Unknown,
}

/// Every format that can be requested as a conversion target.
pub const PIXEL_FORMATS: [PixelFormat; 12] = [
    PixelFormat::Yuyv422,
    PixelFormat::Uyvy422,
    PixelFormat::Yuv420p,
    PixelFormat::Yuvj420p,
    PixelFormat::Yuv422p,
    PixelFormat::Yuvj422p,
    PixelFormat::Nv12,
    PixelFormat::Rgb24,
    PixelFormat::Bgr24,
    PixelFormat::Rgba,
    PixelFormat::Bgra,
    PixelFormat::Gray8,
];

impl PixelFormat {
    /// FFmpeg-style short name ("yuyv422", "rgb24", ...)
    pub fn name(&self) -> &'static str {
        match self {
            PixelFormat::Yuyv422 => "yuyv422",
            PixelFormat::Uyvy422 => "uyvy422",
            PixelFormat::Yuv420p => "yuv420p",
            PixelFormat::Yuvj420p => "yuvj420p",
            PixelFormat::Yuv422p => "yuv422p",
            PixelFormat::Yuvj422p => "yuvj422p",
            PixelFormat::Nv12 => "nv12",
            PixelFormat::Rgb24 => "rgb24",
            PixelFormat::Bgr24 => "bgr24",
            PixelFormat::Rgba => "rgba",
            PixelFormat::Bgra => "bgra",
            PixelFormat::Gray8 => "gray",
            PixelFormat::Unknown => "unknown",
        }
    }

    /// V4L2 fourcc of this layout, if V4L2 defines one
    pub fn fourcc(&self) -> Option<FourCC> {
        let code = match self {
            PixelFormat::Yuyv422 => b"YUYV",
            PixelFormat::Uyvy422 => b"UYVY",
            PixelFormat::Yuv420p | PixelFormat::Yuvj420p => b"YU12",
            PixelFormat::Yuv422p | PixelFormat::Yuvj422p => b"422P",
            PixelFormat::Nv12 => b"NV12",
            PixelFormat::Rgb24 => b"RGB3",
            PixelFormat::Bgr24 => b"BGR3",
            PixelFormat::Rgba => b"AB24",
            PixelFormat::Bgra => b"AR24",
            PixelFormat::Gray8 => b"GREY",
            PixelFormat::Unknown => return None,
        };
        Some(FourCC(*code))
    }

    /// Map a V4L2 fourcc onto a pixel format
    pub fn from_fourcc(fourcc: FourCC) -> Option<Self> {
        PIXEL_FORMATS
            .iter()
            .copied()
            .find(|fmt| fmt.fourcc() == Some(fourcc))
    }

    /// Number of bytes of a contiguous, unpadded picture of this format.
    ///
    /// Chroma planes of subsampled formats round their dimensions up, which
    /// matches the framework's frame-size computation with an alignment of one.
    /// Returns `None` for [`PixelFormat::Unknown`] or when the size overflows.
    pub fn frame_size(&self, width: u32, height: u32) -> Option<usize> {
        let w = usize::try_from(width).ok()?;
        let h = usize::try_from(height).ok()?;
        let luma = w.checked_mul(h)?;
        let half_w = w.div_ceil(2);
        let half_h = h.div_ceil(2);

        match self {
            PixelFormat::Yuyv422 | PixelFormat::Uyvy422 => half_w.checked_mul(4)?.checked_mul(h),
            PixelFormat::Yuv420p | PixelFormat::Yuvj420p | PixelFormat::Nv12 => {
                luma.checked_add(half_w.checked_mul(half_h)?.checked_mul(2)?)
            }
            PixelFormat::Yuv422p | PixelFormat::Yuvj422p => {
                luma.checked_add(half_w.checked_mul(h)?.checked_mul(2)?)
            }
            PixelFormat::Rgb24 | PixelFormat::Bgr24 => luma.checked_mul(3),
            PixelFormat::Rgba | PixelFormat::Bgra => luma.checked_mul(4),
            PixelFormat::Gray8 => Some(luma),
            PixelFormat::Unknown => None,
        }
    }
}

impl fmt::Display for PixelFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for PixelFormat {
    type Err = String;

    /// Accepts FFmpeg-style names ("rgb24") or V4L2 fourcc codes ("RGB3").
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lower = s.to_ascii_lowercase();
        if let Some(fmt) = PIXEL_FORMATS.iter().find(|fmt| fmt.name() == lower) {
            return Ok(*fmt);
        }
        if lower == "grey" || lower == "gray8" {
            return Ok(PixelFormat::Gray8);
        }

        s.parse::<FourCC>()
            .ok()
            .and_then(PixelFormat::from_fourcc)
            .ok_or_else(|| format!("unknown pixel format: {}", s))
    }
}

/// Compressed (or raw) codec carried by a device stream
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CodecId {
    /// Uncompressed frames
    RawVideo,
    /// Motion JPEG
    Mjpeg,
    /// H.264/AVC
    H264,
    /// H.265/HEVC
    Hevc,
    /// Codec with no mapping here
    Unknown,
}

/// Every codec that can be requested from a device.
pub const CODECS: [CodecId; 4] = [CodecId::RawVideo, CodecId::Mjpeg, CodecId::H264, CodecId::Hevc];

impl CodecId {
    /// FFmpeg-style short name ("rawvideo", "mjpeg", ...)
    pub fn name(&self) -> &'static str {
        match self {
            CodecId::RawVideo => "rawvideo",
            CodecId::Mjpeg => "mjpeg",
            CodecId::H264 => "h264",
            CodecId::Hevc => "hevc",
            CodecId::Unknown => "unknown",
        }
    }

    /// V4L2 fourcc of the compressed format, `None` for raw video
    pub fn fourcc(&self) -> Option<FourCC> {
        match self {
            CodecId::Mjpeg => Some(FourCC(*b"MJPG")),
            CodecId::H264 => Some(FourCC(*b"H264")),
            CodecId::Hevc => Some(FourCC(*b"HEVC")),
            CodecId::RawVideo | CodecId::Unknown => None,
        }
    }
}

impl fmt::Display for CodecId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for CodecId {
    type Err = String;

    /// Accepts FFmpeg-style names ("mjpeg", "h265" as an alias of "hevc") or
    /// V4L2 fourcc codes ("MJPG").
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "rawvideo" | "raw" => return Ok(CodecId::RawVideo),
            "mjpeg" | "mjpg" => return Ok(CodecId::Mjpeg),
            "h264" | "avc" => return Ok(CodecId::H264),
            "hevc" | "h265" => return Ok(CodecId::Hevc),
            _ => {}
        }

        let fourcc = s
            .parse::<FourCC>()
            .map_err(|_| format!("unknown codec: {}", s))?;
        CODECS
            .iter()
            .copied()
            .find(|codec| codec.fourcc() == Some(fourcc))
            .ok_or_else(|| format!("unknown codec: {}", s))
    }
}

/// Media type of a transport stream
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MediaType {
    Video,
    Audio,
    Data,
    Subtitle,
    Attachment,
    Unknown,
}

impl fmt::Display for MediaType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MediaType::Video => write!(f, "video"),
            MediaType::Audio => write!(f, "audio"),
            MediaType::Data => write!(f, "data"),
            MediaType::Subtitle => write!(f, "subtitle"),
            MediaType::Attachment => write!(f, "attachment"),
            MediaType::Unknown => write!(f, "unknown"),
        }
    }
}

/// Rational number, used for stream time bases
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Rational {
    pub num: i32,
    pub den: i32,
}

impl Rational {
    pub const fn new(num: i32, den: i32) -> Self {
        Rational { num, den }
    }

    /// Value as a float, zero when the denominator is zero
    pub fn as_f64(&self) -> f64 {
        if self.den == 0 {
            0.0
        } else {
            f64::from(self.num) / f64::from(self.den)
        }
    }

    /// Repair time bases reported in whole seconds instead of milliseconds.
    ///
    /// Some capture drivers report a time base such as `1200/1` where
    /// `1200/1000` is meant. Any numerator above 999 over a denominator of
    /// exactly one gets a denominator of 1000; everything else is returned
    /// unchanged.
    pub fn corrected(self) -> Self {
        if self.num > 999 && self.den == 1 {
            Rational::new(self.num, 1000)
        } else {
            self
        }
    }
}

impl fmt::Display for Rational {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.num, self.den)
    }
}
