// Unless explicitly stated otherwise all files in this repository are licensed
// under the Apache License Version 2.0.
// This product includes software developed at Datadog (https://www.datadoghq.com/).
// Copyright 2025-present Datadog, Inc.

//! Merging of the covering data files into one decimated series.

use std::path::PathBuf;
use std::time::Instant;

use log::{debug, info, warn};
use time::PrimitiveDateTime;

use crate::catalog::{self, FileRecord, TimeWindow};
use crate::config::ExtractorConfig;
use crate::errors::{Error, Result, Warning};
use crate::source::{RowSource, open_source};

/// Tag name that clashes with the timestamp column of the result.
const RESERVED_TAG: &str = "Time";
const RENAMED_TAG: &str = "_Time_";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractionRequest {
    pub files: Vec<PathBuf>,
    pub tags: Vec<String>,
    /// Window bounds, inclusive. Swapped if given in reverse.
    pub start: PrimitiveDateTime,
    pub end: PrimitiveDateTime,
    /// Keep every `interval`-th in-range sample.
    pub interval: usize,
}

/// Result of an extraction: one timestamp array and one value array per
/// tag, all of length `point_count`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Extraction {
    /// Requested tags in request order, after renaming reserved names.
    pub tags: Vec<String>,
    pub timestamps: Vec<PrimitiveDateTime>,
    pub values: Vec<Vec<f32>>,
    pub point_count: usize,
    pub warnings: Vec<Warning>,
}

/// Extracts `request.tags` from the files covering the requested window.
///
/// Any error aborts the whole extraction; warnings are returned with the
/// result.
pub fn extract(request: &ExtractionRequest, config: &ExtractorConfig) -> Result<Extraction> {
    let started = Instant::now();
    if request.interval == 0 {
        return Err(Error::InvalidInterval(request.interval));
    }

    let mut warnings = Vec::new();
    let tags = rename_reserved(&request.tags, &mut warnings);
    let window = TimeWindow::new(request.start, request.end);
    let records = catalog::plan(&request.files, &window, &mut warnings)?;

    let mut merger = Merger::new(
        window,
        request.interval,
        tags.len(),
        config.max_initial_capacity,
    );
    for record in &records {
        info!(
            "Reading {} ({}, starting {})",
            record.path.display(),
            record.file_type,
            record.start_time
        );
        let scan = merger
            .scan(record, &tags, config, &mut warnings)
            .map_err(|e| e.in_file(&record.path))?;
        if scan == Scan::Done {
            break;
        }
    }

    let (timestamps, values) = merger.series.finish();
    let point_count = timestamps.len();
    info!(
        "Extracted {} points of {} tags from {} files in {:?}",
        point_count,
        tags.len(),
        records.len(),
        started.elapsed()
    );

    Ok(Extraction {
        tags,
        timestamps,
        values,
        point_count,
        warnings,
    })
}

fn rename_reserved(tags: &[String], warnings: &mut Vec<Warning>) -> Vec<String> {
    tags.iter()
        .map(|tag| {
            if tag == RESERVED_TAG {
                let warning = Warning::ReservedTag {
                    tag: tag.clone(),
                    renamed: RENAMED_TAG.to_string(),
                };
                warn!("{}", warning);
                warnings.push(warning);
                RENAMED_TAG.to_string()
            } else {
                tag.clone()
            }
        })
        .collect()
}

/// Number of points needed to hold the window from `first` on, sampled
/// every `second - first` and decimated by `interval`.
fn estimate_capacity(
    first: PrimitiveDateTime,
    second: PrimitiveDateTime,
    end: PrimitiveDateTime,
    interval: usize,
) -> Result<usize> {
    let span = (end - first).whole_nanoseconds();
    let step = (second - first)
        .whole_nanoseconds()
        .saturating_mul(i128::try_from(interval).unwrap_or(i128::MAX));

    let estimate = if step > 0 {
        span.saturating_add(step - 1) / step + 1
    } else {
        span.checked_div(step).map_or(0, |points| points + 1)
    };
    if estimate <= 0 {
        return Err(Error::NonPositiveCapacity(estimate));
    }
    Ok(usize::try_from(estimate).unwrap_or(usize::MAX))
}

/// Timestamps and per-tag values, allocated from an estimate and grown by
/// doubling when the estimate was too small.
#[derive(Debug, Default)]
struct Series {
    timestamps: Vec<PrimitiveDateTime>,
    values: Vec<Vec<f32>>,
    capacity: usize,
}

impl Series {
    fn new(width: usize) -> Self {
        Series {
            timestamps: Vec::new(),
            values: vec![Vec::new(); width],
            capacity: 0,
        }
    }

    fn reserve(&mut self, capacity: usize) {
        let additional = capacity.saturating_sub(self.timestamps.len());
        self.timestamps.reserve_exact(additional);
        for column in &mut self.values {
            column.reserve_exact(additional);
        }
        self.capacity = capacity;
    }

    fn push(&mut self, at: PrimitiveDateTime, sample: &[f32]) {
        if self.timestamps.len() >= self.capacity {
            let grown = self.capacity.saturating_mul(2).max(1);
            debug!(
                "Expanding arrays from {} to {} points",
                self.capacity, grown
            );
            self.reserve(grown);
        }
        self.timestamps.push(at);
        for (column, value) in self.values.iter_mut().zip(sample) {
            column.push(*value);
        }
    }

    fn overwrite_last(&mut self, sample: &[f32]) {
        for (column, value) in self.values.iter_mut().zip(sample) {
            if let Some(slot) = column.last_mut() {
                *slot = *value;
            }
        }
    }

    fn finish(mut self) -> (Vec<PrimitiveDateTime>, Vec<Vec<f32>>) {
        let len = self.timestamps.len();
        if len < self.capacity {
            debug!("Trimming arrays from {} to {} points", self.capacity, len);
            self.timestamps.shrink_to_fit();
            for column in &mut self.values {
                column.shrink_to_fit();
            }
        }
        (self.timestamps, self.values)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Scan {
    /// Keep reading, in this file or the next.
    More,
    /// A timestamp past the window end was reached.
    Done,
}

/// Decimation and duplicate handling across all files of one extraction.
struct Merger {
    window: TimeWindow,
    interval: usize,
    max_initial_capacity: usize,
    /// In-range samples seen since the last accepted one, starting at
    /// `interval` so that the first sample is kept.
    counter: usize,
    /// Last in-range timestamp and whether its sample was kept.
    last: Option<(PrimitiveDateTime, bool)>,
    estimated: bool,
    series: Series,
    sample: Vec<f32>,
}

impl Merger {
    fn new(
        window: TimeWindow,
        interval: usize,
        width: usize,
        max_initial_capacity: usize,
    ) -> Self {
        Merger {
            window,
            interval,
            max_initial_capacity,
            counter: interval,
            last: None,
            estimated: false,
            series: Series::new(width),
            sample: vec![f32::NAN; width],
        }
    }

    fn scan(
        &mut self,
        record: &FileRecord,
        tags: &[String],
        config: &ExtractorConfig,
        warnings: &mut Vec<Warning>,
    ) -> Result<Scan> {
        let mut source = open_source(record, tags, config, warnings)?;
        self.scan_rows(source.as_mut())
    }

    fn scan_rows(&mut self, source: &mut dyn RowSource) -> Result<Scan> {
        if !self.estimated {
            let Some(probed) = self.probe(source)? else {
                return Ok(Scan::More);
            };
            for (row, at) in probed {
                if self.offer(source, &row, at)? == Scan::Done {
                    return Ok(Scan::Done);
                }
            }
        }

        while let Some(row) = source.next_row()? {
            let at = source.timestamp(&row)?;
            if self.offer(source, &row, at)? == Scan::Done {
                return Ok(Scan::Done);
            }
        }
        Ok(Scan::More)
    }

    /// Reads rows until a second distinct timestamp shows up and allocates
    /// the series from the observed sampling period. Returns the rows read,
    /// or `None` if the file has no data rows.
    fn probe(
        &mut self,
        source: &mut dyn RowSource,
    ) -> Result<Option<Vec<(String, PrimitiveDateTime)>>> {
        let Some(row) = source.next_row()? else {
            return Ok(None);
        };
        let first = source.timestamp(&row)?;
        let mut probed = vec![(row, first)];
        self.estimated = true;

        if first > self.window.end {
            debug!("First sample at {} is past the window end", first);
            return Ok(Some(probed));
        }

        let mut second = None;
        while let Some(row) = source.next_row()? {
            let at = source.timestamp(&row)?;
            probed.push((row, at));
            if at != first {
                second = Some(at);
                break;
            }
        }

        let capacity = match second {
            Some(second) => {
                let estimate = estimate_capacity(first, second, self.window.end, self.interval)?;
                debug!(
                    "Estimated {} points from a sampling period of {}",
                    estimate,
                    second - first
                );
                estimate.min(self.max_initial_capacity.max(1))
            }
            None => 1,
        };
        self.series.reserve(capacity);
        Ok(Some(probed))
    }

    fn offer(
        &mut self,
        source: &mut dyn RowSource,
        row: &str,
        at: PrimitiveDateTime,
    ) -> Result<Scan> {
        if at > self.window.end {
            return Ok(Scan::Done);
        }
        if at < self.window.start {
            return Ok(Scan::More);
        }

        if let Some((last, kept)) = self.last
            && last == at
        {
            if kept {
                source.read_values(row, &mut self.sample)?;
                self.series.overwrite_last(&self.sample);
            }
            return Ok(Scan::More);
        }

        if self.counter >= self.interval {
            source.read_values(row, &mut self.sample)?;
            self.series.push(at, &self.sample);
            self.counter = 1;
            self.last = Some((at, true));
        } else {
            self.counter += 1;
            self.last = Some((at, false));
        }
        Ok(Scan::More)
    }
}
