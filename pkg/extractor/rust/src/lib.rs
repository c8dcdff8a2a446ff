// Unless explicitly stated otherwise all files in this repository are licensed
// under the Apache License Version 2.0.
// This product includes software developed at Datadog (https://www.datadoghq.com/).
// Copyright 2025-present Datadog, Inc.

// Correctness
#![deny(clippy::indexing_slicing)]
#![deny(clippy::string_slice)]
#![deny(clippy::cast_possible_wrap)]
#![deny(clippy::undocumented_unsafe_blocks)]
// Panicking code
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]
#![deny(clippy::unimplemented)]
#![deny(clippy::todo)]
// Debug code that shouldn't be in production
#![deny(clippy::dbg_macro)]
#![deny(clippy::print_stdout)]
#![deny(clippy::print_stderr)]

pub mod catalog;
pub mod cli;
mod column;
pub mod config;
pub mod datetime;
mod engine;
mod errors;
pub mod prefetch;
mod source;
pub mod xlsx;

#[cfg(test)]
pub(crate) mod test_utils;

// Re-export the public API
pub use catalog::{FileRecord, FileType, TimeWindow};
pub use column::Column;
pub use config::ExtractorConfig;
pub use engine::{Extraction, ExtractionRequest, extract};
pub use errors::{Error, Result, Warning};
pub use source::list_tags;
