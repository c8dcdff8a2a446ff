// Unless explicitly stated otherwise all files in this repository are licensed
// under the Apache License Version 2.0.
// This product includes software developed at Datadog (https://www.datadoghq.com/).
// Copyright 2025-present Datadog, Inc.

//! Per-format readers that turn one data file into timestamped rows.

mod delimited;
mod worksheet;

use std::fs::File;
use std::path::{Path, PathBuf};

use log::warn;
use time::PrimitiveDateTime;

use crate::catalog::{FileRecord, FileType};
use crate::column::Column;
use crate::config::ExtractorConfig;
use crate::errors::{Error, Result, Warning};
use crate::prefetch::PrefetchBuffer;

use delimited::DelimitedSource;
use worksheet::WorksheetSource;

/// Streams the data rows of one file after its header has been resolved.
///
/// Rows are handed out raw so that the engine only pays for value parsing
/// on the rows it keeps.
pub(crate) trait RowSource {
    /// Returns the next data row, or `None` at the end of the file.
    fn next_row(&mut self) -> Result<Option<String>>;

    fn timestamp(&self, row: &str) -> Result<PrimitiveDateTime>;

    /// Writes the value of every requested tag to `out`, in request order.
    fn read_values(&mut self, row: &str, out: &mut [f32]) -> Result<()>;
}

/// Opens `record` and resolves `tags` against its header. Every tag without
/// a column adds a [`Warning::MissingTag`].
pub(crate) fn open_source(
    record: &FileRecord,
    tags: &[String],
    config: &ExtractorConfig,
    warnings: &mut Vec<Warning>,
) -> Result<Box<dyn RowSource>> {
    let source: Box<dyn RowSource> = match record.file_type {
        FileType::Xlsx => {
            let (source, columns) = WorksheetSource::open(&record.path, tags, config)?;
            report_missing(&record.path, tags, &columns, warnings);
            Box::new(source)
        }
        FileType::Csv | FileType::Txt => {
            let delimiter = record.file_type.delimiter().unwrap_or(b',');
            let (source, columns) =
                DelimitedSource::open(&record.path, delimiter, tags, config.buffer_capacity)?;
            report_missing(&record.path, tags, &columns, warnings);
            Box::new(source)
        }
    };
    Ok(source)
}

fn report_missing<T: Copy>(
    path: &Path,
    tags: &[String],
    columns: &[Column<T>],
    warnings: &mut Vec<Warning>,
) {
    for (tag, column) in tags.iter().zip(columns) {
        if column.found().is_none() {
            let warning = Warning::MissingTag {
                path: path.to_path_buf(),
                tag: tag.clone(),
            };
            warn!("{}", warning);
            warnings.push(warning);
        }
    }
}

fn file_type_of(path: &Path) -> Result<FileType> {
    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or_default();
    FileType::from_extension(extension).ok_or_else(|| Error::UnsupportedFileType {
        path: PathBuf::from(path),
        extension: extension.to_string(),
    })
}

/// Returns the tag names a data file offers, in column order.
///
/// Worksheets list every named header cell after column A. Delimited files
/// list the fields of the header line after the leading date, time and
/// millisecond columns.
pub fn list_tags(path: &Path, config: &ExtractorConfig) -> Result<Vec<String>> {
    let tags = match file_type_of(path)? {
        FileType::Xlsx => worksheet::header_names(path, config)?,
        FileType::Csv | FileType::Txt => {
            let file = File::open(path)?;
            let mut lines = PrefetchBuffer::new(file, config.buffer_capacity)?;
            let mut header = String::new();
            lines.read_line(&mut header)?;
            lines.close()?;
            split_tag_line(strip_time_columns(&header))
        }
    };
    Ok(tags)
}

fn skip_separators(s: &str) -> &str {
    s.trim_start_matches(|c: char| !c.is_alphanumeric())
}

fn strip_prefix_ignore_case<'a>(s: &'a str, prefix: &str) -> Option<&'a str> {
    let head = s.get(..prefix.len())?;
    head.eq_ignore_ascii_case(prefix)
        .then(|| s.get(prefix.len()..))
        .flatten()
}

/// Removes a leading `[;]date`, `time` and `millitm` column run from a
/// header line. A line that does not start with a time column is returned
/// unchanged.
fn strip_time_columns(header: &str) -> &str {
    let after_date = strip_prefix_ignore_case(header, ";date")
        .or_else(|| strip_prefix_ignore_case(header, "date"));

    let after_time = after_date
        .and_then(|rest| strip_prefix_ignore_case(skip_separators(rest), "time"))
        .or_else(|| strip_prefix_ignore_case(skip_separators(header), "time"));

    match after_time {
        Some(rest) => {
            let rest = skip_separators(rest);
            strip_prefix_ignore_case(rest, "millitm").unwrap_or(rest)
        }
        None => header,
    }
}

fn split_tag_line(line: &str) -> Vec<String> {
    line.split([' ', ',', '\t', '\r', '\n', ';'])
        .filter(|tag| !tag.is_empty())
        .map(str::to_string)
        .collect()
}
