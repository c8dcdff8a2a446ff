// Unless explicitly stated otherwise all files in this repository are licensed
// under the Apache License Version 2.0.
// This product includes software developed at Datadog (https://www.datadoghq.com/).
// Copyright 2025-present Datadog, Inc.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::env;
use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};
use time::PrimitiveDateTime;

use crate::datetime::parse_date_time;
use crate::engine::ExtractionRequest;
use crate::prefetch::DEFAULT_CAPACITY;

const DEFAULT_MAX_INITIAL_CAPACITY: usize = 16 * 1024 * 1024;
const DEFAULT_MAX_SHARED_STRINGS_SIZE: u64 = 256 * 1024 * 1024;

/// Tuning knobs of the extractor. Every field is optional in the YAML file.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ExtractorConfig {
    pub log_level: Option<String>,
    /// Size of each half of a prefetch buffer.
    pub buffer_capacity: usize,
    /// Upper bound on the number of points allocated before the first
    /// growth.
    pub max_initial_capacity: usize,
    /// Largest shared string table, in uncompressed bytes, that will be
    /// loaded from a workbook.
    pub max_shared_strings_size: u64,
}

impl Default for ExtractorConfig {
    fn default() -> Self {
        ExtractorConfig {
            log_level: None,
            buffer_capacity: DEFAULT_CAPACITY,
            max_initial_capacity: DEFAULT_MAX_INITIAL_CAPACITY,
            max_shared_strings_size: DEFAULT_MAX_SHARED_STRINGS_SIZE,
        }
    }
}

fn read_to_string(path: &Path, what: &str) -> Result<String> {
    let mut file =
        File::open(path).with_context(|| format!("Failed to open {what} {}", path.display()))?;
    let mut contents = String::new();
    file.read_to_string(&mut contents)
        .with_context(|| format!("Failed to read {what} {}", path.display()))?;
    Ok(contents)
}

/// Loads the YAML config file. Without a path the defaults apply; an empty
/// file also yields the defaults.
pub fn load_config(config_path: Option<PathBuf>) -> Result<ExtractorConfig> {
    let Some(path) = config_path else {
        return Ok(ExtractorConfig::default());
    };

    let contents = read_to_string(&path, "config file")?;
    if contents.trim().is_empty() {
        return Ok(ExtractorConfig::default());
    }
    serde_yaml::from_str(&contents).context("Failed to parse YAML config")
}

fn default_interval() -> usize {
    1
}

/// An extraction request stored as YAML, with the window bounds in any
/// layout the date/time parser accepts.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct RequestFile {
    #[serde(default)]
    pub files: Vec<PathBuf>,
    #[serde(default)]
    pub tags: Vec<String>,
    pub start: Option<String>,
    pub end: Option<String>,
    #[serde(default = "default_interval")]
    pub interval: usize,
}

impl Default for RequestFile {
    fn default() -> Self {
        RequestFile {
            files: Vec::new(),
            tags: Vec::new(),
            start: None,
            end: None,
            interval: default_interval(),
        }
    }
}

impl RequestFile {
    pub fn load(path: &Path) -> Result<Self> {
        let contents = read_to_string(path, "request file")?;
        serde_yaml::from_str(&contents)
            .with_context(|| format!("Failed to parse request file {}", path.display()))
    }

    /// Builds the request, parsing both window bounds.
    pub fn into_request(self) -> Result<ExtractionRequest> {
        let start = parse_bound(self.start.as_deref(), "start")?;
        let end = parse_bound(self.end.as_deref(), "end")?;
        Ok(ExtractionRequest {
            files: self.files,
            tags: self.tags,
            start,
            end,
            interval: self.interval,
        })
    }
}

fn parse_bound(text: Option<&str>, name: &str) -> Result<PrimitiveDateTime> {
    let text = text.with_context(|| format!("Missing {name} of the time window"))?;
    parse_date_time(text).with_context(|| format!("Invalid {name} of the time window"))
}

/// Parse a log level name into a log::Level
/// Unknown levels silently default to Info
fn parse_log_level(level: &str) -> log::Level {
    match level.to_lowercase().as_str() {
        "trace" => log::Level::Trace,
        "debug" => log::Level::Debug,
        "info" => log::Level::Info,
        "warn" | "warning" => log::Level::Warn,
        "error" | "critical" => log::Level::Error,
        "off" => log::Level::Error, // Rust log crate doesn't have "off", use Error as minimal logging
        _ => log::Level::Info,
    }
}

/// Gets the log level from configuration.
/// Priority: TAG_EXTRACTOR_LOG_LEVEL > LOG_LEVEL > YAML config > default Info
pub fn get_log_level(config: &Result<ExtractorConfig>) -> log::Level {
    if let Ok(level) = env::var("TAG_EXTRACTOR_LOG_LEVEL") {
        return parse_log_level(&level);
    }

    if let Ok(level) = env::var("LOG_LEVEL") {
        return parse_log_level(&level);
    }

    config
        .as_ref()
        .ok()
        .and_then(|config| config.log_level.as_deref())
        .map(parse_log_level)
        .unwrap_or(log::Level::Info)
}
