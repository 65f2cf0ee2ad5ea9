// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Au-Zone Technologies

use crate::error::CliError;
use crate::utils;
use clap::Args as ClapArgs;
use serde::Serialize;
use videograb::format::{CODECS, PIXEL_FORMATS};

#[derive(ClapArgs, Debug)]
pub struct Args {
    /// Resolution used for frame sizes, in WxH format
    #[arg(short, long, default_value = "640x480")]
    resolution: String,
}

#[derive(Debug, Serialize)]
struct FormatEntry {
    name: &'static str,
    fourcc: Option<String>,
    frame_size: Option<usize>,
}

#[derive(Debug, Serialize)]
struct CodecEntry {
    name: &'static str,
    fourcc: Option<String>,
}

#[derive(Debug, Serialize)]
struct FormatList {
    width: u32,
    height: u32,
    pixel_formats: Vec<FormatEntry>,
    codecs: Vec<CodecEntry>,
}

pub fn execute(args: Args, json: bool) -> Result<(), CliError> {
    let (width, height) = utils::parse_resolution(&args.resolution)?;
    let list = list_formats(width, height);

    if json {
        let json = serde_json::to_string_pretty(&list)
            .map_err(|e| CliError::General(format!("Failed to serialize JSON: {}", e)))?;
        println!("{}", json);
        return Ok(());
    }

    println!("Pixel formats ({}x{}):", width, height);
    for entry in &list.pixel_formats {
        println!(
            "  {:<10} {:<6} {:>12}",
            entry.name,
            entry.fourcc.as_deref().unwrap_or("-"),
            entry
                .frame_size
                .map_or_else(|| "overflow".to_owned(), |size| format!("{} bytes", size))
        );
    }

    println!("\nCodecs:");
    for entry in &list.codecs {
        println!(
            "  {:<10} {}",
            entry.name,
            entry.fourcc.as_deref().unwrap_or("-")
        );
    }
    Ok(())
}

fn list_formats(width: u32, height: u32) -> FormatList {
    let pixel_formats = PIXEL_FORMATS
        .iter()
        .map(|format| FormatEntry {
            name: format.name(),
            fourcc: format.fourcc().map(|fourcc| fourcc.to_string()),
            frame_size: format.frame_size(width, height),
        })
        .collect();

    let codecs = CODECS
        .iter()
        .map(|codec| CodecEntry {
            name: codec.name(),
            fourcc: codec.fourcc().map(|fourcc| fourcc.to_string()),
        })
        .collect();

    FormatList {
        width,
        height,
        pixel_formats,
        codecs,
    }
}
