// Unless explicitly stated otherwise all files in this repository are licensed
// under the Apache License Version 2.0.
// This product includes software developed at Datadog (https://www.datadoghq.com/).
// Copyright 2025-present Datadog, Inc.

//! Builders for data file fixtures.
#![allow(clippy::unwrap_used)]

use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};

use quick_xml::escape::escape;
use time::PrimitiveDateTime;
use time::macros::datetime;
use zip::ZipWriter;
use zip::write::SimpleFileOptions;

/// Writes a zip archive holding the given `(name, content)` entries.
pub fn write_zip(path: &Path, entries: &[(&str, &str)]) {
    let file = File::create(path).unwrap();
    let mut writer = ZipWriter::new(file);
    for (name, content) in entries {
        writer.start_file(*name, SimpleFileOptions::default()).unwrap();
        writer.write_all(content.as_bytes()).unwrap();
    }
    writer.finish().unwrap();
}

/// Writes a minimal xlsx package: a shared string table and one worksheet
/// whose rows have the given bodies.
pub fn write_xlsx(path: &Path, shared_strings: &[&str], rows: &[String]) {
    let mut sst = format!(
        r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?><sst xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main" count="{0}" uniqueCount="{0}">"#,
        shared_strings.len()
    );
    for s in shared_strings {
        sst.push_str(&format!("<si><t>{}</t></si>", escape(*s)));
    }
    sst.push_str("</sst>");

    let mut sheet = String::from(
        r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?><worksheet xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main"><sheetViews><sheetView workbookViewId="0"/></sheetViews><sheetData>"#,
    );
    for (i, row) in rows.iter().enumerate() {
        sheet.push_str(&format!(r#"<row r="{}">{}</row>"#, i + 1, row));
    }
    sheet.push_str("</sheetData></worksheet>");

    write_zip(
        path,
        &[
            ("[Content_Types].xml", "<Types/>"),
            ("xl/sharedStrings.xml", &sst),
            ("xl/worksheets/sheet1.xml", &sheet),
        ],
    );
}

pub fn column_letters(mut rank: u32) -> String {
    let mut letters = Vec::new();
    while rank > 0 {
        let digit = (rank - 1) % 26;
        letters.push(char::from(b'A' + u8::try_from(digit).unwrap()));
        rank = (rank - 1) / 26;
    }
    letters.iter().rev().collect()
}

/// Header row naming column A `Date` and the following columns after
/// `tags`, all through the shared string table. Returns the table and the
/// row body.
pub fn xlsx_header(tags: &[&str]) -> (Vec<String>, String) {
    let mut strings = vec!["Date".to_string()];
    strings.extend(tags.iter().map(|t| t.to_string()));
    let row = strings
        .iter()
        .enumerate()
        .map(|(i, _)| {
            let rank = u32::try_from(i).unwrap() + 1;
            format!(r#"<c r="{}1" t="s"><v>{}</v></c>"#, column_letters(rank), i)
        })
        .collect();
    (strings, row)
}

/// Data row number `row` with the date serial of `at` in column A and the
/// given values from column B on. `None` leaves the cell out.
pub fn xlsx_data_row(row: usize, at: PrimitiveDateTime, values: &[Option<f64>]) -> String {
    let mut body = format!(r#"<c r="A{}" s="1"><v>{}</v></c>"#, row, excel_serial(at));
    for (i, value) in values.iter().enumerate() {
        if let Some(value) = value {
            let rank = u32::try_from(i).unwrap() + 2;
            body.push_str(&format!(
                r#"<c r="{}{}"><v>{}</v></c>"#,
                column_letters(rank),
                row,
                value
            ));
        }
    }
    body
}

/// Spreadsheet date serial of `at`.
pub fn excel_serial(at: PrimitiveDateTime) -> f64 {
    let elapsed = at - datetime!(1899-12-30 0:00);
    elapsed.whole_milliseconds() as f64 / 86_400_000.0
}

pub fn write_text(dir: &Path, name: &str, content: &str) -> PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, content).unwrap();
    path
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_column_letters() {
        assert_eq!(column_letters(1), "A");
        assert_eq!(column_letters(26), "Z");
        assert_eq!(column_letters(27), "AA");
        assert_eq!(column_letters(52), "AZ");
        assert_eq!(column_letters(703), "AAA");
    }
}
