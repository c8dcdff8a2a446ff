// Unless explicitly stated otherwise all files in this repository are licensed
// under the Apache License Version 2.0.
// This product includes software developed at Datadog (https://www.datadoghq.com/).
// Copyright 2025-present Datadog, Inc.

//! Access to the two parts of an xlsx package the extractor needs: the
//! shared string table, loaded whole, and the first worksheet, streamed.

mod cells;
mod tokenizer;

pub use cells::{HeaderCell, column_rank, extract_single, extract_values, header_cells};
pub use tokenizer::RowTokenizer;

use std::fs::File;
use std::io::{self, BufRead, BufReader, Read};
use std::path::Path;

use serde::Deserialize;
use zip::ZipArchive;
use zip::result::ZipError;

use crate::errors::{Error, Result};
use crate::prefetch::PrefetchBuffer;

const SHARED_STRINGS_PATH: &str = "xl/sharedStrings.xml";
const WORKSHEET_PATH: &str = "xl/worksheets/sheet1.xml";

#[derive(Debug, Deserialize)]
struct SharedStringTable {
    #[serde(rename = "si", default)]
    items: Vec<StringItem>,
}

/// Either plain text or a list of formatted runs.
#[derive(Debug, Deserialize)]
struct StringItem {
    #[serde(rename = "t", default)]
    text: Option<Text>,
    #[serde(rename = "r", default)]
    runs: Vec<Run>,
}

#[derive(Debug, Deserialize)]
struct Run {
    #[serde(rename = "t", default)]
    text: Option<Text>,
}

#[derive(Debug, Deserialize)]
struct Text {
    #[serde(rename = "$text", default)]
    value: String,
}

impl StringItem {
    fn into_string(self) -> String {
        let mut value = self.text.map(|t| t.value).unwrap_or_default();
        for run in self.runs {
            if let Some(text) = run.text {
                value.push_str(&text.value);
            }
        }
        value
    }
}

/// The string table that `t="s"` cells index into.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct SharedStrings(Vec<String>);

impl SharedStrings {
    pub fn from_reader<R: BufRead>(reader: R) -> Result<Self> {
        let table: SharedStringTable = quick_xml::de::from_reader(reader)
            .map_err(|e| Error::XmlParse(format!("failed to parse shared strings: {}", e)))?;
        Ok(SharedStrings(
            table
                .items
                .into_iter()
                .map(StringItem::into_string)
                .collect(),
        ))
    }

    pub fn get(&self, index: usize) -> Option<&str> {
        self.0.get(index).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<Vec<String>> for SharedStrings {
    fn from(strings: Vec<String>) -> Self {
        SharedStrings(strings)
    }
}

/// Limits a zip entry reader to its declared size, refusing entries larger
/// than `max_size`.
fn size_verified_entry<R: Read>(entry: R, size: u64, max_size: u64) -> io::Result<io::Take<R>> {
    if size > max_size {
        return Err(io::Error::new(
            io::ErrorKind::InvalidInput,
            format!(
                "zip entry too large ({} bytes, max {} bytes)",
                size, max_size
            ),
        ));
    }
    Ok(entry.take(size))
}

/// Loads the shared string table of the workbook at `path`. A workbook
/// without one has an empty table.
pub fn read_shared_strings(path: &Path, max_size: u64) -> Result<SharedStrings> {
    let file = File::open(path)?;
    let mut archive = ZipArchive::new(BufReader::new(file))?;
    let entry = match archive.by_name(SHARED_STRINGS_PATH) {
        Ok(entry) => entry,
        Err(ZipError::FileNotFound) => return Ok(SharedStrings::default()),
        Err(e) => return Err(e.into()),
    };
    let size = entry.size();
    let reader = size_verified_entry(entry, size, max_size)?;
    SharedStrings::from_reader(BufReader::new(reader))
}

/// Opens the first worksheet of the workbook at `path` as a stream of rows.
/// The archive is opened and decompressed on the prefetch worker.
pub fn open_worksheet(path: &Path, capacity: usize) -> Result<RowTokenizer<PrefetchBuffer>> {
    let file = File::open(path)?;
    let buffer = PrefetchBuffer::spawn(capacity, move |pump| {
        let mut archive = ZipArchive::new(BufReader::new(file)).map_err(io::Error::other)?;
        let sheet = archive.by_name(WORKSHEET_PATH).map_err(|e| {
            io::Error::new(io::ErrorKind::NotFound, format!("{WORKSHEET_PATH}: {e}"))
        })?;
        pump.run(sheet)
    })?;
    Ok(RowTokenizer::new(buffer))
}
