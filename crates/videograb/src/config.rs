// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Au-Zone Technologies

use crate::{
    backend::{Backend, FormatParameters},
    format::{CodecId, PixelFormat},
    session::CaptureSession,
    Error,
};

/// Device class driver used when none is configured
pub const DEFAULT_INPUT_FORMAT: &str = "video4linux2";

/// Capture session parameters.
///
/// Immutable once the session is open; a copy is kept by the session and
/// exposed through [`CaptureSession::config`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaptureConfig {
    /// video device node or framework-specific device identifier
    device: String,

    /// requested capture width, the device may deliver a different one
    width: u32,

    /// requested capture height, the device may deliver a different one
    height: u32,

    /// codec the device is asked to deliver, not used for decoder selection
    codec: CodecId,

    /// pixel format of the output buffer
    pixel_format: PixelFormat,

    /// device class driver name
    input_format: String,
}

impl CaptureConfig {
    pub fn with_device(self, device: &str) -> CaptureConfig {
        CaptureConfig {
            device: device.to_owned(),
            ..self
        }
    }

    pub fn with_resolution(self, width: u32, height: u32) -> CaptureConfig {
        CaptureConfig {
            width,
            height,
            ..self
        }
    }

    pub fn with_codec(self, codec: CodecId) -> CaptureConfig {
        CaptureConfig { codec, ..self }
    }

    pub fn with_pixel_format(self, pixel_format: PixelFormat) -> CaptureConfig {
        CaptureConfig {
            pixel_format,
            ..self
        }
    }

    pub fn with_input_format(self, input_format: &str) -> CaptureConfig {
        CaptureConfig {
            input_format: input_format.to_owned(),
            ..self
        }
    }

    pub fn device(&self) -> &str {
        &self.device
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn codec(&self) -> CodecId {
        self.codec
    }

    pub fn pixel_format(&self) -> PixelFormat {
        self.pixel_format
    }

    pub fn input_format(&self) -> &str {
        &self.input_format
    }

    /// Transport parameters derived from this configuration
    pub fn format_parameters(&self) -> FormatParameters {
        FormatParameters {
            preallocated: true,
            width: self.width,
            height: self.height,
            codec: self.codec,
        }
    }

    /// Build the capture pipeline, see [`CaptureSession::open`].
    pub fn open<B: Backend>(self, backend: &B) -> Result<CaptureSession<B>, Error> {
        CaptureSession::open_with(backend, self)
    }
}

impl Default for CaptureConfig {
    fn default() -> CaptureConfig {
        CaptureConfig {
            device: "/dev/video0".to_owned(),
            width: 640,
            height: 480,
            codec: CodecId::RawVideo,
            pixel_format: PixelFormat::Rgb24,
            input_format: DEFAULT_INPUT_FORMAT.to_owned(),
        }
    }
}

pub fn create_config() -> CaptureConfig {
    CaptureConfig::default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = create_config();
        assert_eq!(config.device(), "/dev/video0");
        assert_eq!((config.width(), config.height()), (640, 480));
        assert_eq!(config.codec(), CodecId::RawVideo);
        assert_eq!(config.pixel_format(), PixelFormat::Rgb24);
        assert_eq!(config.input_format(), "video4linux2");
    }

    #[test]
    fn test_builder() {
        let config = create_config()
            .with_device("/dev/video2")
            .with_resolution(1280, 720)
            .with_codec(CodecId::Mjpeg)
            .with_pixel_format(PixelFormat::Bgra)
            .with_input_format("v4l2");

        assert_eq!(config.device(), "/dev/video2");
        assert_eq!((config.width(), config.height()), (1280, 720));
        assert_eq!(config.codec(), CodecId::Mjpeg);
        assert_eq!(config.pixel_format(), PixelFormat::Bgra);
        assert_eq!(config.input_format(), "v4l2");
    }

    #[test]
    fn test_format_parameters() {
        let params = create_config()
            .with_resolution(0, 0)
            .with_codec(CodecId::H264)
            .format_parameters();

        // zero sizes pass through, the transport rejects them
        assert_eq!(
            params,
            FormatParameters {
                preallocated: true,
                width: 0,
                height: 0,
                codec: CodecId::H264,
            }
        );
    }
}
