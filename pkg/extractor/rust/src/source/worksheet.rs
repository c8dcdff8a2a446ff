// Unless explicitly stated otherwise all files in this repository are licensed
// under the Apache License Version 2.0.
// This product includes software developed at Datadog (https://www.datadoghq.com/).
// Copyright 2025-present Datadog, Inc.

use std::path::Path;

use time::PrimitiveDateTime;

use super::RowSource;
use crate::column::{Column, resolve};
use crate::config::ExtractorConfig;
use crate::datetime::from_excel_serial;
use crate::errors::{Error, Result};
use crate::prefetch::PrefetchBuffer;
use crate::xlsx::{
    HeaderCell, RowTokenizer, extract_single, extract_values, header_cells, open_worksheet,
    read_shared_strings,
};

/// Column holding the date serial of each row.
const TIMESTAMP_COLUMN: u32 = 1;

/// First worksheet of an xlsx workbook. Row 1 names the tags, column A
/// holds the timestamps.
pub(super) struct WorksheetSource {
    rows: RowTokenizer<PrefetchBuffer>,
    /// Resolved columns sorted by rank, found columns first.
    wanted: Vec<Column<u32>>,
    /// Request position of each entry of `wanted`.
    positions: Vec<usize>,
    scratch: Vec<f32>,
}

fn read_header(
    path: &Path,
    config: &ExtractorConfig,
) -> Result<(RowTokenizer<PrefetchBuffer>, Vec<HeaderCell>)> {
    let shared = read_shared_strings(path, config.max_shared_strings_size)?;
    let mut rows = open_worksheet(path, config.buffer_capacity)?;
    let header = rows
        .next_row()?
        .ok_or_else(|| Error::MalformedRow("missing header row".to_string()))?;
    let cells = header_cells(&header, &shared)?;
    Ok((rows, cells))
}

/// Names of the header cells after the timestamp column.
pub(super) fn header_names(path: &Path, config: &ExtractorConfig) -> Result<Vec<String>> {
    let (rows, cells) = read_header(path, config)?;
    rows.into_inner().close()?;
    Ok(cells
        .into_iter()
        .filter(|cell| cell.rank > TIMESTAMP_COLUMN)
        .map(|cell| cell.name)
        .collect())
}

impl WorksheetSource {
    pub(super) fn open(
        path: &Path,
        tags: &[String],
        config: &ExtractorConfig,
    ) -> Result<(Self, Vec<Column<u32>>)> {
        let (rows, header) = read_header(path, config)?;
        let columns = resolve(
            tags,
            header.iter().map(|cell| (cell.name.as_str(), cell.rank)),
        );

        let mut order: Vec<(Column<u32>, usize)> =
            columns.iter().copied().zip(0usize..).collect();
        order.sort_by_key(|(column, _)| column.found().unwrap_or(u32::MAX));
        let (wanted, positions) = order.into_iter().unzip();

        let source = WorksheetSource {
            rows,
            wanted,
            positions,
            scratch: vec![f32::NAN; tags.len()],
        };
        Ok((source, columns))
    }
}

impl RowSource for WorksheetSource {
    fn next_row(&mut self) -> Result<Option<String>> {
        while let Some(row) = self.rows.next_row()? {
            if !row.trim().is_empty() {
                return Ok(Some(row));
            }
        }
        Ok(None)
    }

    fn timestamp(&self, row: &str) -> Result<PrimitiveDateTime> {
        from_excel_serial(extract_single(row, TIMESTAMP_COLUMN)?)
    }

    fn read_values(&mut self, row: &str, out: &mut [f32]) -> Result<()> {
        extract_values(row, &self.wanted, &mut self.scratch)?;
        out.fill(f32::NAN);
        for (value, position) in self.scratch.iter().zip(&self.positions) {
            if let Some(slot) = out.get_mut(*position) {
                *slot = *value;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::test_utils::{write_xlsx, xlsx_data_row, xlsx_header};
    use tempfile::TempDir;
    use time::macros::datetime;

    fn tags(names: &[&str]) -> Vec<String> {
        names.iter().map(|n| n.to_string()).collect()
    }

    #[test]
    fn test_reads_rows_in_request_order() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("a_20230101_000000.xlsx");
        let (strings, header) = xlsx_header(&["T1", "T2", "T3"]);
        let strings: Vec<&str> = strings.iter().map(String::as_str).collect();
        write_xlsx(
            &path,
            &strings,
            &[
                header,
                xlsx_data_row(2, datetime!(2023-01-01 0:00), &[Some(1.0), Some(2.0), Some(3.0)]),
                String::new(),
                xlsx_data_row(4, datetime!(2023-01-01 0:00:01), &[None, Some(5.5), None]),
            ],
        );

        let config = ExtractorConfig::default();
        let (mut source, columns) =
            WorksheetSource::open(&path, &tags(&["T3", "Nope", "T1"]), &config).unwrap();
        assert_eq!(
            columns,
            vec![Column::Found(4), Column::NotFound, Column::Found(2)]
        );

        let mut out = [0.0f32; 3];
        let row = source.next_row().unwrap().unwrap();
        assert_eq!(source.timestamp(&row).unwrap(), datetime!(2023-01-01 0:00));
        source.read_values(&row, &mut out).unwrap();
        let [t3, nope, t1] = out;
        assert_eq!(t3, 3.0);
        assert!(nope.is_nan());
        assert_eq!(t1, 1.0);

        // The empty row in between is skipped.
        let row = source.next_row().unwrap().unwrap();
        assert_eq!(
            source.timestamp(&row).unwrap(),
            datetime!(2023-01-01 0:00:01)
        );
        source.read_values(&row, &mut out).unwrap();
        assert!(out.iter().all(|v| v.is_nan()));

        assert_eq!(source.next_row().unwrap(), None);
    }

    #[test]
    fn test_header_names() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("a_20230101_000000.xlsx");
        let (strings, header) = xlsx_header(&["Flow", "Level"]);
        let strings: Vec<&str> = strings.iter().map(String::as_str).collect();
        write_xlsx(&path, &strings, &[header]);

        let names = header_names(&path, &ExtractorConfig::default()).unwrap();
        assert_eq!(names, vec!["Flow", "Level"]);
    }

    #[test]
    fn test_empty_worksheet() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("a_20230101_000000.xlsx");
        write_xlsx(&path, &[], &[]);

        let err = WorksheetSource::open(&path, &tags(&["T1"]), &ExtractorConfig::default())
            .err()
            .unwrap();
        assert!(matches!(err, Error::MalformedRow(_)), "{err}");
    }

    #[test]
    fn test_missing_timestamp_cell() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("a_20230101_000000.xlsx");
        let (strings, header) = xlsx_header(&["T1"]);
        let strings: Vec<&str> = strings.iter().map(String::as_str).collect();
        write_xlsx(&path, &strings, &[header, r#"<c r="B2"><v>1</v></c>"#.to_string()]);

        let (mut source, _) =
            WorksheetSource::open(&path, &tags(&["T1"]), &ExtractorConfig::default()).unwrap();
        let row = source.next_row().unwrap().unwrap();
        assert!(matches!(
            source.timestamp(&row),
            Err(Error::MalformedRow(_))
        ));
    }
}
