// Unless explicitly stated otherwise all files in this repository are licensed
// under the Apache License Version 2.0.
// This product includes software developed at Datadog (https://www.datadoghq.com/).
// Copyright 2025-present Datadog, Inc.

// Correctness
#![deny(clippy::indexing_slicing)]
#![deny(clippy::string_slice)]
#![deny(clippy::cast_possible_wrap)]
#![deny(clippy::undocumented_unsafe_blocks)]
// Panicking code
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]
#![deny(clippy::unimplemented)]
#![deny(clippy::todo)]
// Debug code that shouldn't be in production
#![deny(clippy::dbg_macro)]
#![deny(clippy::print_stdout)]
#![deny(clippy::print_stderr)]

use std::io::{self, Write};

use anyhow::{Context, Result};
use clap::Parser;
use log::{debug, info};
use serde::Serialize;
use time::PrimitiveDateTime;
use time::format_description::BorrowedFormatItem;
use time::macros::format_description;

use tag_extractor::cli::{Args, Command};
use tag_extractor::config;
use tag_extractor::{Extraction, Warning, extract, list_tags};

const TIMESTAMP_FORMAT: &[BorrowedFormatItem<'static>] =
    format_description!("[year]-[month]-[day]T[hour]:[minute]:[second].[subsecond digits:3]");

/// JSON view of an extraction. NaN values serialize as `null`.
#[derive(Serialize)]
struct ExtractionOutput<'a> {
    tags: &'a [String],
    point_count: usize,
    timestamps: Vec<String>,
    values: &'a [Vec<f32>],
    warnings: &'a [Warning],
}

fn format_timestamps(timestamps: &[PrimitiveDateTime]) -> Result<Vec<String>> {
    timestamps
        .iter()
        .map(|at| at.format(TIMESTAMP_FORMAT))
        .collect::<std::result::Result<_, _>>()
        .context("Failed to format timestamps")
}

fn write_json<T: Serialize>(value: &T) -> Result<()> {
    let mut stdout = io::stdout().lock();
    serde_json::to_writer_pretty(&mut stdout, value).context("Failed to write JSON output")?;
    writeln!(stdout).context("Failed to write JSON output")?;
    Ok(())
}

fn main() -> Result<()> {
    let args = Args::parse();
    let config = config::load_config(args.config.clone());
    let log_level = config::get_log_level(&config);
    simple_logger::init_with_level(log_level)?;
    debug!("Log level set to: {:?}", log_level);
    let config = config?;

    match args.command {
        Command::Extract(extract_args) => {
            let request = extract_args.into_request()?;
            info!(
                "Extracting {} tags from {} files between {} and {}",
                request.tags.len(),
                request.files.len(),
                request.start,
                request.end
            );
            let Extraction {
                tags,
                timestamps,
                values,
                point_count,
                warnings,
            } = extract(&request, &config).context("Extraction failed")?;

            write_json(&ExtractionOutput {
                tags: &tags,
                point_count,
                timestamps: format_timestamps(&timestamps)?,
                values: &values,
                warnings: &warnings,
            })
        }
        Command::Tags { path } => {
            let tags = list_tags(&path, &config)
                .with_context(|| format!("Failed to read tags of {}", path.display()))?;
            write_json(&tags)
        }
    }
}
