// Unless explicitly stated otherwise all files in this repository are licensed
// under the Apache License Version 2.0.
// This product includes software developed at Datadog (https://www.datadoghq.com/).
// Copyright 2025-present Datadog, Inc.

use std::path::PathBuf;

use anyhow::{Result, bail};
use clap::{Parser, Subcommand};

use crate::config::RequestFile;
use crate::engine::ExtractionRequest;

/// Extract tagged time series from csv, txt and xlsx log files
#[derive(Parser, Debug)]
#[command(name = "tag-extractor")]
pub struct Args {
    /// Path to the extractor config file
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Extract tags over a time window and print them as JSON
    Extract(ExtractArgs),
    /// Print the tags a data file offers as a JSON array
    Tags {
        /// Data file to inspect
        path: PathBuf,
    },
}

#[derive(clap::Args, Debug, Default)]
pub struct ExtractArgs {
    /// YAML request file; flags given on the command line take precedence
    #[arg(long)]
    pub request: Option<PathBuf>,

    /// Data file, repeatable
    #[arg(long = "file")]
    pub files: Vec<PathBuf>,

    /// Tag to extract, repeatable
    #[arg(long = "tag")]
    pub tags: Vec<String>,

    /// Start of the time window
    #[arg(long)]
    pub start: Option<String>,

    /// End of the time window
    #[arg(long)]
    pub end: Option<String>,

    /// Keep every N-th sample
    #[arg(long)]
    pub interval: Option<usize>,
}

impl ExtractArgs {
    /// Builds the request from the request file, if any, overridden by the
    /// flags.
    pub fn into_request(self) -> Result<ExtractionRequest> {
        let mut request = match &self.request {
            Some(path) => RequestFile::load(path)?,
            None => RequestFile::default(),
        };

        if !self.files.is_empty() {
            request.files = self.files;
        }
        if !self.tags.is_empty() {
            request.tags = self.tags;
        }
        if let Some(start) = self.start {
            request.start = Some(start);
        }
        if let Some(end) = self.end {
            request.end = Some(end);
        }
        if let Some(interval) = self.interval {
            request.interval = interval;
        }

        if request.files.is_empty() {
            bail!("No data file given");
        }
        request.into_request()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    use std::io::Write;
    use tempfile::NamedTempFile;
    use time::macros::datetime;

    fn extract_args(args: &[&str]) -> ExtractArgs {
        let parsed = Args::try_parse_from(args).unwrap();
        match parsed.command {
            Command::Extract(args) => args,
            Command::Tags { .. } => ExtractArgs::default(),
        }
    }

    #[test]
    fn test_parse_extract_flags() {
        let parsed = Args::try_parse_from([
            "tag-extractor",
            "extract",
            "--file",
            "a_20230101_000000.csv",
            "--file",
            "b_20230102_000000.csv",
            "--tag",
            "T1",
            "--start",
            "2023-01-01 0:00",
            "--end",
            "2023-01-02 12:00",
            "--interval",
            "5",
            "--config",
            "/etc/extractor.yaml",
        ])
        .unwrap();
        assert_eq!(parsed.config, Some(PathBuf::from("/etc/extractor.yaml")));

        let Command::Extract(args) = parsed.command else {
            unreachable!("parsed as extract");
        };
        let request = args.into_request().unwrap();
        assert_eq!(request.files.len(), 2);
        assert_eq!(request.tags, vec!["T1"]);
        assert_eq!(request.start, datetime!(2023-01-01 0:00));
        assert_eq!(request.end, datetime!(2023-01-02 12:00));
        assert_eq!(request.interval, 5);
    }

    #[test]
    fn test_parse_tags() {
        let parsed =
            Args::try_parse_from(["tag-extractor", "tags", "a_20230101_000000.xlsx"]).unwrap();
        assert!(matches!(
            parsed.command,
            Command::Tags { path } if path == PathBuf::from("a_20230101_000000.xlsx")
        ));
        assert_eq!(parsed.config, None);
    }

    #[test]
    fn test_flags_override_request_file() {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(
            b"files: [a_20230101_000000.csv]\ntags: [T1]\nstart: 2023-01-01 0:00\nend: 2023-01-01 1:00\ninterval: 2\n",
        )
        .unwrap();
        file.flush().unwrap();
        let path = file.path().to_str().unwrap();

        let request = extract_args(&["tag-extractor", "extract", "--request", path])
            .into_request()
            .unwrap();
        assert_eq!(request.tags, vec!["T1"]);
        assert_eq!(request.interval, 2);
        assert_eq!(request.end, datetime!(2023-01-01 1:00));

        let request = extract_args(&[
            "tag-extractor",
            "extract",
            "--request",
            path,
            "--tag",
            "T2",
            "--end",
            "2023-01-01 2:00",
        ])
        .into_request()
        .unwrap();
        assert_eq!(request.tags, vec!["T2"]);
        assert_eq!(request.interval, 2);
        assert_eq!(request.end, datetime!(2023-01-01 2:00));
    }

    #[test]
    fn test_missing_inputs() {
        let err = extract_args(&["tag-extractor", "extract", "--tag", "T1"])
            .into_request()
            .unwrap_err();
        assert!(err.to_string().contains("No data file"));

        let err = extract_args(&[
            "tag-extractor",
            "extract",
            "--file",
            "a_20230101_000000.csv",
            "--end",
            "2023-01-01 2:00",
        ])
        .into_request()
        .unwrap_err();
        assert!(format!("{err:#}").contains("Missing start"));
    }
}
