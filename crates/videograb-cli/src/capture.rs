// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Au-Zone Technologies

use crate::error::CliError;
use crate::metrics::{self, MetricsCollector};
use crate::utils::{self, SessionCommand, SourceArgs};
use clap::Args as ClapArgs;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;
use videograb::{backend::Backend, CaptureConfig, StreamEnd};

#[derive(ClapArgs, Debug)]
pub struct Args {
    #[command(flatten)]
    source: SourceArgs,

    /// Number of frames to capture (0=until end of stream or Ctrl+C)
    #[arg(short, long, default_value = "0")]
    frames: u64,

    /// Append every converted frame to this file
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Print capture metrics on exit
    #[arg(long)]
    metrics: bool,
}

struct Capture {
    frames: u64,
    output: Option<PathBuf>,
    metrics: bool,
    json: bool,
    term: Arc<AtomicBool>,
}

pub fn execute(args: Args, json: bool) -> Result<(), CliError> {
    log::debug!("Capture parameters: {:?}", args);

    let term = utils::install_signal_handler()?;
    let capture = Capture {
        frames: args.frames,
        output: args.output,
        metrics: args.metrics,
        json,
        term,
    };
    utils::run_on_source(&args.source, args.frames, capture)
}

impl SessionCommand for Capture {
    fn run<B: Backend>(self, backend: &B, config: CaptureConfig) -> Result<(), CliError> {
        log::info!("Opening {}", config.device());
        let mut session = config.open(backend)?;
        log::info!(
            "Capturing {}x{} {} from {} stream {} ({} bytes per frame)",
            session.width(),
            session.height(),
            session.pixel_format(),
            session.codec(),
            session.stream_index(),
            session.buffer_size()
        );

        let mut writer = match &self.output {
            Some(path) => {
                log::info!("Writing frames to {}", path.display());
                Some(BufWriter::new(File::create(path)?))
            }
            None => None,
        };

        let max_frames = if self.frames == 0 {
            u64::MAX
        } else {
            self.frames
        };
        let mut collector = MetricsCollector::new(session.buffer_size());

        while collector.frames() < max_frames && !self.term.load(Ordering::Relaxed) {
            let start = Instant::now();
            let frame = match session.read_frame() {
                Some(frame) => frame,
                None => break,
            };
            collector.record_frame(start.elapsed(), frame.len());

            if let Some(writer) = writer.as_mut() {
                writer.write_all(frame)?;
            }

            if collector.frames() % 30 == 0 {
                log::debug!("Captured {} frames", collector.frames());
            }
        }

        if let Some(mut writer) = writer {
            writer.flush()?;
        }

        let stop_reason = match session.end_reason() {
            Some(StreamEnd::Failed(err)) => err.to_string(),
            Some(StreamEnd::Exhausted) => "end of stream".to_owned(),
            None if self.term.load(Ordering::Relaxed) => {
                log::info!("Received Ctrl+C, stopping...");
                "interrupted".to_owned()
            }
            None => "complete".to_owned(),
        };
        log::info!("Captured {} frames total", collector.frames());

        let report = collector.finalize(&stop_reason);
        if self.json {
            metrics::print_json(&report)
                .map_err(|e| CliError::General(format!("Failed to output JSON metrics: {}", e)))?;
        } else if self.metrics {
            metrics::print_text(&report);
        }

        match session.end_reason() {
            Some(StreamEnd::Failed(err)) => Err(CliError::General(format!(
                "capture stopped after {} frames: {}",
                session.frames_read(),
                err
            ))),
            _ => Ok(()),
        }
    }
}
