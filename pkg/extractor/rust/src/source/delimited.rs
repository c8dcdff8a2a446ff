// Unless explicitly stated otherwise all files in this repository are licensed
// under the Apache License Version 2.0.
// This product includes software developed at Datadog (https://www.datadoghq.com/).
// Copyright 2025-present Datadog, Inc.

use std::fs::File;
use std::path::Path;

use time::PrimitiveDateTime;

use super::RowSource;
use crate::column::{Column, resolve};
use crate::datetime::{parse_date, parse_date_time, parse_time};
use crate::errors::{Error, Result};
use crate::prefetch::PrefetchBuffer;

/// How the timestamp is spread over the leading fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Layout {
    /// Field 0 holds the date and field 1 the time.
    Split,
    /// Field 0 holds `<date> <time>`.
    Combined,
}

/// Splits a line on a single-byte delimiter.
struct Fields<'a> {
    rest: Option<&'a str>,
    delimiter: u8,
}

fn fields(line: &str, delimiter: u8) -> Fields<'_> {
    Fields {
        rest: Some(line),
        delimiter,
    }
}

impl<'a> Iterator for Fields<'a> {
    type Item = &'a str;

    fn next(&mut self) -> Option<&'a str> {
        let rest = self.rest?;
        match memchr::memchr(self.delimiter, rest.as_bytes()) {
            Some(at) => {
                self.rest = rest.get(at + 1..);
                rest.get(..at)
            }
            None => {
                self.rest = None;
                Some(rest)
            }
        }
    }
}

fn parse_value(field: &str) -> Result<f32> {
    let text = field.trim();
    if text.is_empty() {
        return Ok(f32::NAN);
    }
    text.parse()
        .map_err(|_| Error::InvalidNumber(text.to_string()))
}

/// Comma or tab separated text with one header line.
pub(super) struct DelimitedSource {
    lines: PrefetchBuffer,
    delimiter: u8,
    layout: Layout,
    /// `(field index, request position)` pairs in ascending field order.
    wanted: Vec<(usize, usize)>,
}

impl DelimitedSource {
    pub(super) fn open(
        path: &Path,
        delimiter: u8,
        tags: &[String],
        capacity: usize,
    ) -> Result<(Self, Vec<Column<usize>>)> {
        let file = File::open(path)?;
        let mut lines = PrefetchBuffer::new(file, capacity)?;

        let mut header = String::new();
        if !lines.read_line(&mut header)? {
            return Err(Error::MalformedRow("missing header line".to_string()));
        }
        let names: Vec<&str> = fields(&header, delimiter).collect();
        let layout = match names.first() {
            Some(first)
                if first.eq_ignore_ascii_case("date") || first.eq_ignore_ascii_case(";date") =>
            {
                Layout::Split
            }
            _ => Layout::Combined,
        };

        let columns = resolve(tags, names.iter().copied().zip(0usize..));
        let mut wanted: Vec<(usize, usize)> = columns
            .iter()
            .enumerate()
            .filter_map(|(position, column)| column.found().map(|field| (field, position)))
            .collect();
        wanted.sort_unstable();

        let source = DelimitedSource {
            lines,
            delimiter,
            layout,
            wanted,
        };
        Ok((source, columns))
    }
}

impl RowSource for DelimitedSource {
    fn next_row(&mut self) -> Result<Option<String>> {
        let mut line = String::new();
        while self.lines.read_line(&mut line)? {
            if !line.trim().is_empty() {
                return Ok(Some(line));
            }
        }
        Ok(None)
    }

    fn timestamp(&self, row: &str) -> Result<PrimitiveDateTime> {
        let mut fields = fields(row, self.delimiter);
        let first = fields.next().unwrap_or_default();
        match self.layout {
            Layout::Split => {
                let time = fields
                    .next()
                    .ok_or_else(|| Error::MalformedRow(format!("no time field in {row:?}")))?;
                Ok(PrimitiveDateTime::new(
                    parse_date(first.trim())?,
                    parse_time(time.trim())?,
                ))
            }
            Layout::Combined => parse_date_time(first),
        }
    }

    fn read_values(&mut self, row: &str, out: &mut [f32]) -> Result<()> {
        out.fill(f32::NAN);
        let mut wanted = self.wanted.iter().peekable();
        for (index, field) in fields(row, self.delimiter).enumerate() {
            let Some((next, _)) = wanted.peek() else {
                break;
            };
            if *next != index {
                continue;
            }
            let value = parse_value(field)?;
            while let Some((_, position)) = wanted.next_if(|(field, _)| *field == index) {
                if let Some(slot) = out.get_mut(*position) {
                    *slot = value;
                }
            }
        }
        Ok(())
    }
}
