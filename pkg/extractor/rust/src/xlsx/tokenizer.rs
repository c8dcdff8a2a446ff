// Unless explicitly stated otherwise all files in this repository are licensed
// under the Apache License Version 2.0.
// This product includes software developed at Datadog (https://www.datadoghq.com/).
// Copyright 2025-present Datadog, Inc.

//! Streaming extraction of `<row>` element bodies from worksheet XML.
//!
//! The tokenizer never builds a document tree. It looks at one character at
//! a time and only recognises enough of the markup to find `<row ...>` and
//! the matching `</row>`. Rows never nest, so no depth is tracked; every
//! other element is skipped by name alone.

use std::io;
use std::mem;

use crate::prefetch::CharSource;

const ROW: &str = "row";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    /// Outside any row, waiting for `<`.
    Searching,
    /// Reading an element name after `<`.
    InStartTag,
    /// Inside the attributes of a `<row` start tag.
    InAttribute,
    /// Inside the body of a row.
    InText,
    /// Reading an element name after `</` inside a row.
    InEndTag,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Step {
    Continue,
    Emit,
}

/// Character-level state machine. Independent of any I/O.
#[derive(Debug)]
struct RowMachine {
    state: State,
    in_row: bool,
    name: String,
    name_len: usize,
    quote: Option<char>,
    text: String,
    tag_start: usize,
}

impl RowMachine {
    fn new() -> Self {
        RowMachine {
            state: State::Searching,
            in_row: false,
            name: String::with_capacity(ROW.len()),
            name_len: 0,
            quote: None,
            text: String::new(),
            tag_start: 0,
        }
    }

    fn reset(&mut self) {
        self.state = State::Searching;
        self.in_row = false;
        self.quote = None;
        self.text.clear();
        self.clear_name();
    }

    fn clear_name(&mut self) {
        self.name.clear();
        self.name_len = 0;
    }

    fn push_name(&mut self, c: char) {
        if self.name_len < ROW.len() {
            self.name.push(c);
        }
        self.name_len += 1;
    }

    fn name_is_row(&self) -> bool {
        self.name_len == ROW.len() && self.name == ROW
    }

    fn take_text(&mut self) -> String {
        mem::take(&mut self.text)
    }

    /// The transition function.
    fn step(&mut self, c: char) -> Step {
        match (self.state, self.in_row) {
            (State::Searching, _) => {
                if c == '<' {
                    self.clear_name();
                    self.state = State::InStartTag;
                }
            }
            (State::InStartTag, false) => match c {
                '>' if self.name_is_row() => {
                    self.in_row = true;
                    self.state = State::InText;
                }
                // `<row/>`
                '/' if self.name_is_row() => return Step::Emit,
                c if c.is_whitespace() && self.name_is_row() => {
                    self.quote = None;
                    self.state = State::InAttribute;
                }
                // Any other element, end tag, declaration or comment.
                '>' | '/' => self.state = State::Searching,
                c if c.is_whitespace() => self.state = State::Searching,
                c => self.push_name(c),
            },
            (State::InAttribute, _) => match (self.quote, c) {
                (Some(quote), c) if c == quote => self.quote = None,
                (Some(_), _) => {}
                (None, '"' | '\'') => self.quote = Some(c),
                // `<row r="1"/>`
                (None, '/') => return Step::Emit,
                (None, '>') => {
                    self.in_row = true;
                    self.state = State::InText;
                }
                (None, _) => {}
            },
            (State::InText, true) => {
                if c == '<' {
                    self.tag_start = self.text.len();
                    self.clear_name();
                    self.state = State::InStartTag;
                }
                self.text.push(c);
            }
            (State::InStartTag, true) => {
                self.text.push(c);
                self.state = if c == '/' {
                    State::InEndTag
                } else {
                    State::InText
                };
            }
            (State::InEndTag, true) => {
                self.text.push(c);
                if c == '>' || c.is_whitespace() {
                    if self.name_is_row() {
                        self.text.truncate(self.tag_start);
                        return Step::Emit;
                    }
                    self.state = State::InText;
                } else {
                    self.push_name(c);
                }
            }
            (State::InText | State::InEndTag, false) => self.state = State::Searching,
        }
        Step::Continue
    }
}

/// Yields the inner text of each `<row>` element of a worksheet stream.
pub struct RowTokenizer<S> {
    source: S,
    machine: RowMachine,
}

impl<S: CharSource> RowTokenizer<S> {
    pub fn new(source: S) -> Self {
        RowTokenizer {
            source,
            machine: RowMachine::new(),
        }
    }

    /// Returns the body of the next row, or `None` at the end of the stream.
    /// A self-closing row yields an empty string. A stream that ends inside
    /// a row yields whatever was read of it.
    pub fn next_row(&mut self) -> io::Result<Option<String>> {
        self.machine.reset();
        while let Some(c) = self.source.next_char()? {
            if self.machine.step(c) == Step::Emit {
                return Ok(Some(self.machine.take_text()));
            }
        }
        if self.machine.in_row {
            Ok(Some(self.machine.take_text()))
        } else {
            Ok(None)
        }
    }

    pub fn into_inner(self) -> S {
        self.source
    }
}
