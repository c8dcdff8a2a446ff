// Unless explicitly stated otherwise all files in this repository are licensed
// under the Apache License Version 2.0.
// This product includes software developed at Datadog (https://www.datadoghq.com/).
// Copyright 2025-present Datadog, Inc.

//! Data file catalog: start times from file names, chronological order, and
//! the smallest run of files covering a time window.

use std::fmt;
use std::path::{Path, PathBuf};

use log::warn;
use serde::Serialize;
use time::{Date, Month, PrimitiveDateTime, Time};

use crate::errors::{Error, Result, Warning};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FileType {
    /// Comma separated text.
    Csv,
    /// Tab separated text.
    Txt,
    /// OOXML workbook.
    Xlsx,
}

impl FileType {
    pub(crate) fn from_extension(extension: &str) -> Option<Self> {
        match extension.to_ascii_lowercase().as_str() {
            "csv" => Some(FileType::Csv),
            "txt" => Some(FileType::Txt),
            "xlsx" => Some(FileType::Xlsx),
            _ => None,
        }
    }

    /// Field separator of delimited text files.
    pub fn delimiter(self) -> Option<u8> {
        match self {
            FileType::Csv => Some(b','),
            FileType::Txt => Some(b'\t'),
            FileType::Xlsx => None,
        }
    }
}

impl fmt::Display for FileType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            FileType::Csv => "csv",
            FileType::Txt => "txt",
            FileType::Xlsx => "xlsx",
        };
        f.write_str(name)
    }
}

/// Requested time range, inclusive at both ends.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeWindow {
    pub start: PrimitiveDateTime,
    pub end: PrimitiveDateTime,
}

impl TimeWindow {
    /// Builds a window, swapping the bounds if they are given in reverse.
    pub fn new(start: PrimitiveDateTime, end: PrimitiveDateTime) -> Self {
        if start > end {
            TimeWindow {
                start: end,
                end: start,
            }
        } else {
            TimeWindow { start, end }
        }
    }
}

/// A data file and the time of its first sample, taken from its name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileRecord {
    pub path: PathBuf,
    pub file_type: FileType,
    pub start_time: PrimitiveDateTime,
}

impl FileRecord {
    /// Reads the start time and type from a file name ending with
    /// `<YYYYMMDD>[separators]<HHMMSS>.<ext>`.
    ///
    /// Returns `Ok(None)` when the name does not follow that pattern and an
    /// error when it does but the extension is not a supported type.
    pub fn from_path(path: &Path) -> Result<Option<Self>> {
        let Some((start_time, extension)) = path
            .file_name()
            .and_then(|name| name.to_str())
            .and_then(parse_file_name)
        else {
            return Ok(None);
        };

        let file_type =
            FileType::from_extension(extension).ok_or_else(|| Error::UnsupportedFileType {
                path: path.to_path_buf(),
                extension: extension.to_string(),
            })?;

        Ok(Some(FileRecord {
            path: path.to_path_buf(),
            file_type,
            start_time,
        }))
    }
}

fn all_digits(s: &str) -> bool {
    s.bytes().all(|b| b.is_ascii_digit())
}

fn digits_at(s: &str, range: std::ops::Range<usize>) -> Option<u32> {
    s.get(range)?.parse().ok()
}

fn parse_file_name(name: &str) -> Option<(PrimitiveDateTime, &str)> {
    let (stem, extension) = name.rsplit_once('.')?;
    if extension.is_empty() || !extension.chars().all(|c| c.is_alphanumeric() || c == '_') {
        return None;
    }

    let time_at = stem.len().checked_sub(6)?;
    let time = stem.get(time_at..)?;
    let head = stem
        .get(..time_at)?
        .trim_end_matches(|c: char| !c.is_alphanumeric());
    let date_at = head.len().checked_sub(8)?;
    let date = head.get(date_at..)?;
    if !all_digits(time) || !all_digits(date) {
        return None;
    }

    let year = i32::try_from(digits_at(date, 0..4)?).ok()?;
    let month = Month::try_from(u8::try_from(digits_at(date, 4..6)?).ok()?).ok()?;
    let day = u8::try_from(digits_at(date, 6..8)?).ok()?;
    let hour = u8::try_from(digits_at(time, 0..2)?).ok()?;
    let minute = u8::try_from(digits_at(time, 2..4)?).ok()?;
    let second = u8::try_from(digits_at(time, 4..6)?).ok()?;

    let date = Date::from_calendar_date(year, month, day).ok()?;
    let time = Time::from_hms(hour, minute, second).ok()?;
    Some((PrimitiveDateTime::new(date, time), extension))
}

/// Turns the requested paths into the chronologically sorted, minimal list
/// of files covering `window`.
///
/// Files with names that carry no start time are skipped with a warning.
/// A file is dropped when the next one already starts at or before the
/// window start; files starting after the window end are dropped too.
pub fn plan(
    paths: &[PathBuf],
    window: &TimeWindow,
    warnings: &mut Vec<Warning>,
) -> Result<Vec<FileRecord>> {
    let mut records = Vec::with_capacity(paths.len());
    for path in paths {
        match FileRecord::from_path(path)? {
            Some(record) => records.push(record),
            None => {
                let warning = Warning::InvalidFileName { path: path.clone() };
                warn!("{}", warning);
                warnings.push(warning);
            }
        }
    }
    records.sort_by_key(|record| record.start_time);

    let Some(first) = records.first() else {
        return Err(Error::NoDataFiles);
    };
    if window.end < first.start_time {
        return Err(Error::WindowNotCovered {
            start: window.start,
            end: window.end,
        });
    }

    let superseded = records
        .windows(2)
        .take_while(|pair| matches!(pair, [_, next] if next.start_time <= window.start))
        .count();
    records.drain(..superseded);

    let needed = 1 + records
        .iter()
        .skip(1)
        .take_while(|record| record.start_time <= window.end)
        .count();
    records.truncate(needed);

    Ok(records)
}
