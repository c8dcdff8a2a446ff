// Unless explicitly stated otherwise all files in this repository are licensed
// under the Apache License Version 2.0.
// This product includes software developed at Datadog (https://www.datadoghq.com/).
// Copyright 2025-present Datadog, Inc.

use std::fmt;
use std::io;
use std::path::PathBuf;

use serde::Serialize;
use thiserror::Error;
use time::PrimitiveDateTime;

pub type Result<T> = std::result::Result<T, Error>;

/// Errors that abort an extraction. No partial result is ever returned
/// alongside one of these.
#[derive(Error, Debug)]
pub enum Error {
    #[error("invalid date: {0:?}")]
    InvalidDate(String),
    #[error("invalid time: {0:?}")]
    InvalidTime(String),
    #[error("invalid numeric value: {0:?}")]
    InvalidNumber(String),
    #[error("malformed row: {0}")]
    MalformedRow(String),
    #[error("no valid data file was given")]
    NoDataFiles,
    #[error("no data file covers the window {start} to {end}")]
    WindowNotCovered {
        start: PrimitiveDateTime,
        end: PrimitiveDateTime,
    },
    #[error("estimated number of points is not positive ({0})")]
    NonPositiveCapacity(i128),
    #[error("unsupported file type {extension:?} for {}", path.display())]
    UnsupportedFileType { path: PathBuf, extension: String },
    #[error("decimation interval must be at least 1, got {0}")]
    InvalidInterval(usize),
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
    #[error("zip error: {0}")]
    Zip(#[from] zip::result::ZipError),
    #[error("XML parse error: {0}")]
    XmlParse(String),
    #[error("failed to extract from {}", path.display())]
    File {
        path: PathBuf,
        #[source]
        source: Box<Error>,
    },
}

impl Error {
    /// Attaches the path of the data file being read.
    pub(crate) fn in_file(self, path: impl Into<PathBuf>) -> Self {
        match self {
            Error::File { .. } => self,
            other => Error::File {
                path: path.into(),
                source: Box::new(other),
            },
        }
    }
}

/// Non-fatal findings collected alongside a successful extraction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Warning {
    /// A requested tag has no column in one data file; its values from that
    /// file are NaN.
    MissingTag { path: PathBuf, tag: String },
    /// A file name does not end with the `<date><time>.<ext>` suffix; the
    /// file was skipped.
    InvalidFileName { path: PathBuf },
    /// A requested tag collides with a reserved name and was renamed.
    ReservedTag { tag: String, renamed: String },
}

impl fmt::Display for Warning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Warning::MissingTag { path, tag } => {
                write!(f, "tag {:?} not found in {}", tag, path.display())
            }
            Warning::InvalidFileName { path } => {
                write!(f, "file name {} has no valid date and time", path.display())
            }
            Warning::ReservedTag { tag, renamed } => {
                write!(f, "tag {:?} is reserved and was renamed to {:?}", tag, renamed)
            }
        }
    }
}
