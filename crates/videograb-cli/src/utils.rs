// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Au-Zone Technologies

use crate::error::CliError;
use clap::Args as ClapArgs;
use signal_hook::consts::SIGINT;
use signal_hook::flag;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use videograb::{
    backend::Backend,
    config::DEFAULT_INPUT_FORMAT,
    mock::{MockBackend, MockDevice},
    CaptureConfig, CodecId, PixelFormat,
};

/// Device selection and pipeline options shared by `capture` and `probe`
#[derive(ClapArgs, Debug)]
pub struct SourceArgs {
    /// Video device
    #[arg(short, long, default_value = "/dev/video0")]
    pub device: String,

    /// Requested resolution in WxH format
    #[arg(short, long, default_value = "640x480")]
    pub resolution: String,

    /// Codec requested from the device (rawvideo, mjpeg, h264, hevc or a FOURCC)
    #[arg(short, long, default_value = "rawvideo")]
    pub codec: String,

    /// Output pixel format (rgb24, yuyv422, nv12, ... or a FOURCC)
    #[arg(long, default_value = "rgb24")]
    pub format: String,

    /// Device class driver
    #[arg(long, default_value = DEFAULT_INPUT_FORMAT)]
    pub input_format: String,

    /// Use a generated in-memory source instead of a device
    #[arg(long)]
    pub synthetic: bool,
}

impl SourceArgs {
    /// Build the capture configuration from the parsed flags
    pub fn config(&self) -> Result<CaptureConfig, CliError> {
        let (width, height) = parse_resolution(&self.resolution)?;
        let codec = self
            .codec
            .parse::<CodecId>()
            .map_err(CliError::InvalidArgs)?;
        let pixel_format = self
            .format
            .parse::<PixelFormat>()
            .map_err(CliError::InvalidArgs)?;

        Ok(CaptureConfig::default()
            .with_device(&self.device)
            .with_resolution(width, height)
            .with_codec(codec)
            .with_pixel_format(pixel_format)
            .with_input_format(&self.input_format))
    }
}

/// Work to run against an open backend, whichever one was selected
pub trait SessionCommand {
    fn run<B: Backend>(self, backend: &B, config: CaptureConfig) -> Result<(), CliError>;
}

/// Select the backend for `source` and hand it to `command`.
///
/// Synthetic sources deliver `frames` frames, or repeat forever when `frames`
/// is zero.
pub fn run_on_source<C: SessionCommand>(
    source: &SourceArgs,
    frames: u64,
    command: C,
) -> Result<(), CliError> {
    let config = source.config()?;

    if source.synthetic {
        log::debug!("Using synthetic source for {}", config.device());
        let backend = MockBackend::new(synthetic_device(&config, frames)?);
        return command.run(&backend, config);
    }

    #[cfg(feature = "ffmpeg")]
    {
        let backend = videograb::ffmpeg::FfmpegBackend::new()?;
        command.run(&backend, config)
    }

    #[cfg(not(feature = "ffmpeg"))]
    {
        let _ = command;
        Err(CliError::DeviceNotFound(format!(
            "{}: built without device support (enable the ffmpeg feature or use --synthetic)",
            config.device()
        )))
    }
}

/// Native format a synthetic camera delivers for `codec`
pub fn synthetic_source_format(codec: CodecId) -> PixelFormat {
    match codec {
        CodecId::Mjpeg => PixelFormat::Yuvj422p,
        CodecId::H264 | CodecId::Hevc => PixelFormat::Yuv420p,
        CodecId::RawVideo | CodecId::Unknown => PixelFormat::Yuyv422,
    }
}

fn synthetic_device(config: &CaptureConfig, frames: u64) -> Result<MockDevice, CliError> {
    let codec = config.codec();
    let format = synthetic_source_format(codec);
    if frames == 0 {
        let device = MockDevice::camera(codec, format, config.width(), config.height(), 256);
        return Ok(device.repeating());
    }

    let frames = usize::try_from(frames)
        .map_err(|_| CliError::InvalidArgs(format!("Too many frames: {}", frames)))?;
    Ok(MockDevice::camera(
        codec,
        format,
        config.width(),
        config.height(),
        frames,
    ))
}

/// Parse resolution string in format "WxH" or "W*H"
pub fn parse_resolution(s: &str) -> Result<(u32, u32), CliError> {
    let (width_str, height_str) = s
        .split_once('x')
        .or_else(|| s.split_once('*'))
        .ok_or_else(|| {
            CliError::InvalidArgs(format!(
                "Invalid resolution format (expected WxH or W*H): {}",
                s
            ))
        })?;

    let width = width_str
        .parse::<u32>()
        .map_err(|_| CliError::InvalidArgs(format!("Invalid width in resolution: {}", s)))?;
    let height = height_str
        .parse::<u32>()
        .map_err(|_| CliError::InvalidArgs(format!("Invalid height in resolution: {}", s)))?;

    if width == 0 || height == 0 {
        return Err(CliError::InvalidArgs(format!(
            "Resolution dimensions must be positive: {}",
            s
        )));
    }

    Ok((width, height))
}

/// Install signal handler for graceful shutdown on Ctrl+C
///
/// Returns an Arc<AtomicBool> that will be set to true when SIGINT is received.
pub fn install_signal_handler() -> Result<Arc<AtomicBool>, CliError> {
    let term = Arc::new(AtomicBool::new(false));

    flag::register(SIGINT, Arc::clone(&term))
        .map_err(|e| CliError::General(format!("Failed to register signal handler: {}", e)))?;

    log::debug!("Installed SIGINT handler");
    Ok(term)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn source(args: &[&str]) -> SourceArgs {
        use clap::Parser;

        #[derive(Parser)]
        struct Wrapper {
            #[command(flatten)]
            source: SourceArgs,
        }

        let argv = std::iter::once("videograb").chain(args.iter().copied());
        Wrapper::parse_from(argv).source
    }

    #[test]
    fn test_parse_resolution() {
        assert_eq!(parse_resolution("1920x1080").unwrap(), (1920, 1080));
        assert_eq!(parse_resolution("1280*720").unwrap(), (1280, 720));
        assert!(parse_resolution("1920").is_err());
        assert!(parse_resolution("0x480").is_err());
        assert!(parse_resolution("-1x480").is_err());
        assert!(parse_resolution("wide x tall").is_err());
    }

    #[test]
    fn test_default_config() {
        let config = source(&[]).config().unwrap();
        assert_eq!(config, CaptureConfig::default());
    }

    #[test]
    fn test_config_from_flags() {
        let config = source(&[
            "--device",
            "/dev/video4",
            "--resolution",
            "1280x720",
            "--codec",
            "MJPG",
            "--format",
            "NV12",
            "--input-format",
            "v4l2",
        ])
        .config()
        .unwrap();

        assert_eq!(config.device(), "/dev/video4");
        assert_eq!((config.width(), config.height()), (1280, 720));
        assert_eq!(config.codec(), CodecId::Mjpeg);
        assert_eq!(config.pixel_format(), PixelFormat::Nv12);
        assert_eq!(config.input_format(), "v4l2");
    }

    #[test]
    fn test_invalid_format_flag() {
        let err = source(&["--format", "bogus"]).config().unwrap_err();
        assert!(matches!(err, CliError::InvalidArgs(_)));
    }

    #[test]
    fn test_synthetic_source_format() {
        assert_eq!(synthetic_source_format(CodecId::Mjpeg), PixelFormat::Yuvj422p);
        assert_eq!(synthetic_source_format(CodecId::H264), PixelFormat::Yuv420p);
        assert_eq!(synthetic_source_format(CodecId::RawVideo), PixelFormat::Yuyv422);
    }
}
