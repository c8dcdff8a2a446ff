// Unless explicitly stated otherwise all files in this repository are licensed
// under the Apache License Version 2.0.
// This product includes software developed at Datadog (https://www.datadoghq.com/).
// Copyright 2025-present Datadog, Inc.

//! Reading cell values out of the raw text of one worksheet row.
//!
//! Rows are sparse: a cell that holds nothing is usually absent, so values
//! are matched to wanted columns by the column part of each cell's `r`
//! reference rather than by position.

use memchr::memmem;
use quick_xml::escape::unescape;

use super::SharedStrings;
use crate::column::Column;
use crate::errors::{Error, Result};

/// Converts column letters to a 1-based rank: `A` is 1, `Z` is 26, `AA` is
/// 27. Returns `None` for anything but a non-empty run of `A`..=`Z`.
pub fn column_rank(letters: &str) -> Option<u32> {
    if letters.is_empty() {
        return None;
    }
    letters.bytes().try_fold(0u32, |rank, b| {
        if !b.is_ascii_uppercase() {
            return None;
        }
        rank.checked_mul(26)?.checked_add(u32::from(b - b'A') + 1)
    })
}

/// Rank of the column part of a cell reference such as `AB12`.
fn reference_rank(reference: &str) -> Option<u32> {
    let split = reference.find(|c: char| !c.is_ascii_uppercase())?;
    let letters = reference.get(..split)?;
    let digits = reference.get(split..)?;
    if !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    column_rank(letters)
}

/// A header cell: its text and its column rank.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeaderCell {
    pub name: String,
    pub rank: u32,
}

#[derive(Debug)]
struct Cell<'a> {
    rank: u32,
    kind: Option<&'a str>,
    body: &'a str,
}

impl Cell<'_> {
    fn value(&self) -> Option<&str> {
        element_text(self.body, "v")
    }

    /// Numeric value of the cell. Text and error cells and cells without a
    /// value read as NaN.
    fn number(&self) -> Result<f32> {
        if matches!(self.kind, Some("e" | "s" | "str" | "inlineStr")) {
            return Ok(f32::NAN);
        }
        match self.value().map(str::trim) {
            None | Some("") => Ok(f32::NAN),
            Some(text) => text
                .parse()
                .map_err(|_| Error::InvalidNumber(text.to_string())),
        }
    }

    /// Text of the cell, with shared strings resolved.
    fn text(&self, shared: &SharedStrings) -> Result<Option<String>> {
        match self.kind {
            Some("s") => {
                let Some(index) = self.value() else {
                    return Ok(None);
                };
                let index: usize = index
                    .trim()
                    .parse()
                    .map_err(|_| Error::MalformedRow(format!("invalid shared string index {index:?}")))?;
                shared
                    .get(index)
                    .map(|s| Some(s.to_string()))
                    .ok_or_else(|| Error::MalformedRow(format!("shared string {index} out of range")))
            }
            Some("inlineStr") => {
                let mut text = String::new();
                for part in Elements::new(self.body, "t") {
                    text.push_str(&unescape_text(part)?);
                }
                Ok(Some(text))
            }
            _ => self.value().map(unescape_text).transpose(),
        }
    }
}

fn unescape_text(raw: &str) -> Result<String> {
    unescape(raw)
        .map(|text| text.into_owned())
        .map_err(|e| Error::XmlParse(e.to_string()))
}

/// Splits the inside of a start tag at its closing `>`, honouring quoted
/// attribute values. Returns the attributes, whether the element is
/// self-closing, and the text after the tag.
fn split_start_tag(tag: &str) -> Option<(&str, bool, &str)> {
    let mut quote = None;
    for (i, c) in tag.char_indices() {
        match (quote, c) {
            (Some(q), c) if c == q => quote = None,
            (Some(_), _) => {}
            (None, '"' | '\'') => quote = Some(c),
            (None, '>') => {
                let attributes = tag.get(..i)?;
                let rest = tag.get(i + 1..)?;
                return Some(match attributes.strip_suffix('/') {
                    Some(attributes) => (attributes, true, rest),
                    None => (attributes, false, rest),
                });
            }
            _ => {}
        }
    }
    None
}

fn attribute<'a>(attributes: &'a str, wanted: &str) -> Option<&'a str> {
    let mut rest = attributes;
    loop {
        let (name, tail) = rest.split_once('=')?;
        let tail = tail.trim_start();
        let quote = tail.chars().next().filter(|c| *c == '"' || *c == '\'')?;
        let (value, tail) = tail.get(1..)?.split_once(quote)?;
        if name.trim() == wanted {
            return Some(value);
        }
        rest = tail;
    }
}

/// Finds `<name ...>` at the start of `text` or later, where the name is
/// not merely a prefix of a longer one. Returns the text after `<name`.
fn find_start<'a>(text: &'a str, name: &str) -> Option<&'a str> {
    let open = format!("<{name}");
    let finder = memmem::Finder::new(open.as_bytes());
    let mut rest = text;
    loop {
        let at = finder.find(rest.as_bytes())?;
        let after = rest.get(at + open.len()..)?;
        match after.chars().next() {
            Some(c) if c == '>' || c == '/' || c.is_whitespace() => return Some(after),
            _ => rest = after,
        }
    }
}

/// Successive `<name>` elements of `text`, yielding their raw content.
struct Elements<'a> {
    rest: &'a str,
    name: &'a str,
}

impl<'a> Elements<'a> {
    fn new(text: &'a str, name: &'a str) -> Self {
        Elements { rest: text, name }
    }
}

impl<'a> Iterator for Elements<'a> {
    type Item = &'a str;

    fn next(&mut self) -> Option<&'a str> {
        let after = find_start(self.rest, self.name)?;
        let (_, self_closing, body) = split_start_tag(after)?;
        if self_closing {
            self.rest = body;
            return Some("");
        }
        let close = format!("</{}>", self.name);
        let end = memmem::find(body.as_bytes(), close.as_bytes())?;
        self.rest = body.get(end + close.len()..)?;
        body.get(..end)
    }
}

fn element_text<'a>(text: &'a str, name: &'a str) -> Option<&'a str> {
    Elements::new(text, name).next()
}

/// The `<c>` elements of a row, in document order.
struct Cells<'a> {
    rest: &'a str,
}

impl<'a> Cells<'a> {
    fn new(row: &'a str) -> Self {
        Cells { rest: row }
    }

    fn parse_next(&mut self) -> Result<Option<Cell<'a>>> {
        let Some(after) = find_start(self.rest, "c") else {
            self.rest = "";
            return Ok(None);
        };
        let unterminated = || Error::MalformedRow("unterminated cell".to_string());

        let (attributes, self_closing, tail) = split_start_tag(after).ok_or_else(unterminated)?;
        let body = if self_closing {
            self.rest = tail;
            ""
        } else {
            let end = memmem::find(tail.as_bytes(), b"</c>").ok_or_else(unterminated)?;
            self.rest = tail.get(end + "</c>".len()..).unwrap_or_default();
            tail.get(..end).unwrap_or_default()
        };

        let reference = attribute(attributes, "r")
            .ok_or_else(|| Error::MalformedRow("cell without a reference".to_string()))?;
        let rank = reference_rank(reference)
            .ok_or_else(|| Error::MalformedRow(format!("invalid cell reference {reference:?}")))?;

        Ok(Some(Cell {
            rank,
            kind: attribute(attributes, "t"),
            body,
        }))
    }
}

impl<'a> Iterator for Cells<'a> {
    type Item = Result<Cell<'a>>;

    fn next(&mut self) -> Option<Self::Item> {
        match self.parse_next() {
            Ok(cell) => cell.map(Ok),
            Err(e) => {
                self.rest = "";
                Some(Err(e))
            }
        }
    }
}

/// Fills `out` with the values of the `wanted` columns of `row`, position by
/// position. Found columns must be in ascending rank order; `NotFound`
/// entries and columns without a cell in this row read as NaN.
pub fn extract_values(row: &str, wanted: &[Column<u32>], out: &mut [f32]) -> Result<()> {
    out.fill(f32::NAN);
    let mut targets = wanted
        .iter()
        .zip(out.iter_mut())
        .filter_map(|(column, slot)| column.found().map(|rank| (rank, slot)))
        .peekable();

    for cell in Cells::new(row) {
        let cell = cell?;
        // Wanted columns this cell has already passed have no cell in the row.
        while targets.next_if(|(rank, _)| *rank < cell.rank).is_some() {}

        let Some((rank, _)) = targets.peek() else {
            break;
        };
        if *rank == cell.rank {
            let value = cell.number()?;
            while let Some((_, slot)) = targets.next_if(|(rank, _)| *rank == cell.rank) {
                *slot = value;
            }
        }
        if targets.peek().is_none() {
            break;
        }
    }
    Ok(())
}

/// Reads one numeric column of `row`, such as the date serial in column A.
pub fn extract_single(row: &str, rank: u32) -> Result<f64> {
    for cell in Cells::new(row) {
        let cell = cell?;
        if cell.rank > rank {
            break;
        }
        if cell.rank == rank {
            let text = cell.value().map(str::trim).unwrap_or_default();
            return text
                .parse()
                .map_err(|_| Error::InvalidNumber(text.to_string()));
        }
    }
    Err(Error::MalformedRow(format!("no cell in column {rank}")))
}

/// Reads the names of a header row, resolving shared strings. Cells without
/// text are left out.
pub fn header_cells(row: &str, shared: &SharedStrings) -> Result<Vec<HeaderCell>> {
    let mut header = Vec::new();
    for cell in Cells::new(row) {
        let cell = cell?;
        if let Some(name) = cell.text(shared)? {
            header.push(HeaderCell {
                name,
                rank: cell.rank,
            });
        }
    }
    Ok(header)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn found(ranks: &[u32]) -> Vec<Column<u32>> {
        ranks.iter().map(|&r| Column::Found(r)).collect()
    }

    fn assert_values(context: &str, actual: &[f32], expected: &[f32]) {
        assert_eq!(actual.len(), expected.len(), "{context}");
        for (i, (a, e)) in actual.iter().zip(expected).enumerate() {
            if e.is_nan() {
                assert!(a.is_nan(), "{context}, position {i}: expected NaN, got {a}");
            } else {
                assert_eq!(a, e, "{context}, position {i}");
            }
        }
    }

    #[test]
    fn test_column_rank() {
        assert_eq!(column_rank("A"), Some(1));
        assert_eq!(column_rank("Z"), Some(26));
        assert_eq!(column_rank("AA"), Some(27));
        assert_eq!(column_rank("AZ"), Some(52));
        assert_eq!(column_rank("BA"), Some(53));
        assert_eq!(column_rank("XFD"), Some(16384));
        assert_eq!(column_rank(""), None);
        assert_eq!(column_rank("a"), None);
        assert_eq!(column_rank("A1"), None);
    }

    #[test]
    fn test_reference_rank() {
        assert_eq!(reference_rank("A1"), Some(1));
        assert_eq!(reference_rank("AZ1048576"), Some(52));
        assert_eq!(reference_rank("A"), None);
        assert_eq!(reference_rank("12"), None);
        assert_eq!(reference_rank("A1B"), None);
    }

    #[test]
    fn test_extract_values_dense_and_sparse() {
        let row = r#"<c r="A2"><v>44927</v></c><c r="B2"><v>1.5</v></c><c r="D2"><v>-2</v></c><c r="E2" s="1"><v> 3e2 </v></c>"#;

        struct TestCase {
            name: &'static str,
            wanted: Vec<Column<u32>>,
            expected: Vec<f32>,
        }

        let test_cases = vec![
            TestCase {
                name: "dense",
                wanted: found(&[2, 4, 5]),
                expected: vec![1.5, -2.0, 300.0],
            },
            TestCase {
                name: "missing cell in the middle",
                wanted: found(&[2, 3, 5]),
                expected: vec![1.5, f32::NAN, 300.0],
            },
            TestCase {
                name: "several missing cells in a row",
                wanted: found(&[3, 3, 5]),
                expected: vec![f32::NAN, f32::NAN, 300.0],
            },
            TestCase {
                name: "past the last cell",
                wanted: found(&[5, 6, 30]),
                expected: vec![300.0, f32::NAN, f32::NAN],
            },
            TestCase {
                name: "not found",
                wanted: vec![Column::Found(2), Column::NotFound, Column::Found(4)],
                expected: vec![1.5, f32::NAN, -2.0],
            },
            TestCase {
                name: "same column twice",
                wanted: found(&[4, 4]),
                expected: vec![-2.0, -2.0],
            },
            TestCase {
                name: "nothing wanted",
                wanted: vec![Column::NotFound],
                expected: vec![f32::NAN],
            },
        ];

        for tc in test_cases {
            let mut out = vec![0.0; tc.wanted.len()];
            extract_values(row, &tc.wanted, &mut out).unwrap();
            assert_values(tc.name, &out, &tc.expected);
        }
    }

    #[test]
    fn test_extract_values_cell_kinds() {
        let row = concat!(
            r#"<c r="A3"><v>1</v></c>"#,
            r#"<c r="B3" t="e"><v>#DIV/0!</v></c>"#,
            r#"<c r="C3" t="s"><v>4</v></c>"#,
            r#"<c r="D3"/>"#,
            r#"<c r="E3"><f>SUM(A3:A3)</f><v>7.25</v></c>"#,
            r#"<c r="F3" t="b"><v>1</v></c>"#,
            r#"<c r="G3" t="inlineStr"><is><t>bad</t></is></c>"#,
            r#"<c r="H3"><v></v></c>"#,
        );
        let mut out = vec![0.0; 7];
        extract_values(row, &found(&[2, 3, 4, 5, 6, 7, 8]), &mut out).unwrap();
        assert_values(
            "cell kinds",
            &out,
            &[f32::NAN, f32::NAN, f32::NAN, 7.25, 1.0, f32::NAN, f32::NAN],
        );
    }

    #[test]
    fn test_extract_values_errors() {
        let mut out = vec![0.0; 1];

        let err = extract_values(r#"<c t="n"><v>1</v></c>"#, &found(&[1]), &mut out).unwrap_err();
        assert!(matches!(err, Error::MalformedRow(_)), "{err}");

        let err = extract_values(r#"<c r="1"><v>1</v></c>"#, &found(&[1]), &mut out).unwrap_err();
        assert!(matches!(err, Error::MalformedRow(_)), "{err}");

        let err = extract_values(r#"<c r="A1"><v>1"#, &found(&[1]), &mut out).unwrap_err();
        assert!(matches!(err, Error::MalformedRow(_)), "{err}");

        let err = extract_values(r#"<c r="A1"><v>abc</v></c>"#, &found(&[1]), &mut out).unwrap_err();
        assert!(matches!(err, Error::InvalidNumber(_)), "{err}");
    }

    #[test]
    fn test_extract_values_stops_after_last_wanted_column() {
        // The broken cell after the wanted one is never looked at.
        let row = r#"<c r="A1"><v>1</v></c><c r="B1"><v>2</v></c><c t="x"/>"#;
        let mut out = vec![0.0; 1];
        extract_values(row, &found(&[2]), &mut out).unwrap();
        assert_values("early stop", &out, &[2.0]);
    }

    #[test]
    fn test_extract_single() {
        let row = r#"<c r="A5" s="2"><v>44927.5</v></c><c r="B5"><v>1</v></c>"#;
        assert_eq!(extract_single(row, 1).unwrap(), 44927.5);
        assert_eq!(extract_single(row, 2).unwrap(), 1.0);
        assert!(matches!(
            extract_single(row, 3),
            Err(Error::MalformedRow(_))
        ));
        assert!(matches!(
            extract_single(r#"<c r="B5"><v>1</v></c>"#, 1),
            Err(Error::MalformedRow(_))
        ));
    }

    #[test]
    fn test_header_cells() {
        let shared = SharedStrings::from(vec!["Date".to_string(), "Flow & Rate".to_string()]);
        let row = concat!(
            r#"<c r="A1" t="s"><v>0</v></c>"#,
            r#"<c r="B1" t="s"><v>1</v></c>"#,
            r#"<c r="C1" t="inlineStr"><is><r><t>Pres</t></r><r><t xml:space="preserve">sure </t></r></is></c>"#,
            r#"<c r="E1" t="str"><v>T&lt;1&gt;</v></c>"#,
            r#"<c r="F1"/>"#,
            r#"<c r="G1"><v>42</v></c>"#,
        );
        let header = header_cells(row, &shared).unwrap();
        let names: Vec<(&str, u32)> = header.iter().map(|h| (h.name.as_str(), h.rank)).collect();
        assert_eq!(
            names,
            vec![
                ("Date", 1),
                ("Flow & Rate", 2),
                ("Pressure ", 3),
                ("T<1>", 5),
                ("42", 7),
            ]
        );
    }

    #[test]
    fn test_header_cells_bad_shared_index() {
        let shared = SharedStrings::from(vec!["Date".to_string()]);
        let err = header_cells(r#"<c r="A1" t="s"><v>3</v></c>"#, &shared).unwrap_err();
        assert!(matches!(err, Error::MalformedRow(_)), "{err}");
    }
}
