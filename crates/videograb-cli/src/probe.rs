// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Au-Zone Technologies

use crate::error::CliError;
use crate::utils::{self, SessionCommand, SourceArgs};
use clap::Args as ClapArgs;
use serde::Serialize;
use videograb::{backend::Backend, CaptureConfig};

#[derive(ClapArgs, Debug)]
pub struct Args {
    #[command(flatten)]
    source: SourceArgs,

    /// Also describe the device class driver and framework version
    #[arg(long)]
    describe: bool,
}

/// Negotiated capture pipeline of an opened device
#[derive(Debug, Serialize)]
struct ProbeReport {
    device: String,
    input_format: String,
    stream_index: usize,
    codec: String,
    source_format: String,
    pixel_format: String,
    width: u32,
    height: u32,
    buffer_size: usize,
    time_base: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    driver: Option<DriverReport>,
}

#[derive(Debug, Serialize)]
struct DriverReport {
    name: String,
    long_name: String,
    flags: u32,
    extensions: Option<String>,
    framework_version: String,
}

struct Probe {
    describe: bool,
    json: bool,
}

pub fn execute(args: Args, json: bool) -> Result<(), CliError> {
    let probe = Probe {
        describe: args.describe,
        json,
    };
    utils::run_on_source(&args.source, 1, probe)
}

impl SessionCommand for Probe {
    fn run<B: Backend>(self, backend: &B, config: CaptureConfig) -> Result<(), CliError> {
        let driver = if self.describe {
            let info = backend
                .describe_input_format(config.input_format())
                .ok_or_else(|| {
                    CliError::InvalidArgs(format!(
                        "Unknown device class: {}",
                        config.input_format()
                    ))
                })?;
            Some(DriverReport {
                name: info.name,
                long_name: info.long_name,
                flags: info.flags,
                extensions: info.extensions,
                framework_version: info.framework.to_string(),
            })
        } else {
            None
        };

        let session = config.open(backend)?;
        let report = ProbeReport {
            device: session.config().device().to_owned(),
            input_format: session.config().input_format().to_owned(),
            stream_index: session.stream_index(),
            codec: session.codec().to_string(),
            source_format: session.source_format().to_string(),
            pixel_format: session.pixel_format().to_string(),
            width: session.width(),
            height: session.height(),
            buffer_size: session.buffer_size(),
            time_base: session.time_base().to_string(),
            driver,
        };
        session.close();

        if self.json {
            let json = serde_json::to_string_pretty(&report)
                .map_err(|e| CliError::General(format!("Failed to serialize JSON: {}", e)))?;
            println!("{}", json);
        } else {
            print_text(&report);
        }
        Ok(())
    }
}

fn print_text(report: &ProbeReport) {
    println!("Device:         {} ({})", report.device, report.input_format);
    println!("Stream:         {}", report.stream_index);
    println!("Codec:          {}", report.codec);
    println!("Resolution:     {}x{}", report.width, report.height);
    println!(
        "Conversion:     {} -> {}",
        report.source_format, report.pixel_format
    );
    println!("Buffer size:    {} bytes", report.buffer_size);
    println!("Time base:      {}", report.time_base);

    if let Some(driver) = &report.driver {
        println!("\nDriver:         {} ({})", driver.name, driver.long_name);
        println!("Flags:          0x{:08x}", driver.flags);
        if let Some(extensions) = &driver.extensions {
            println!("Extensions:     {}", extensions);
        }
        println!("Framework:      {}", driver.framework_version);
    }
}
