// Unless explicitly stated otherwise all files in this repository are licensed
// under the Apache License Version 2.0.
// This product includes software developed at Datadog (https://www.datadoghq.com/).
// Copyright 2025-present Datadog, Inc.

//! Heuristic parsing of the many date and time layouts found in plant logs.
//!
//! Dates are split into numeric and alphabetic tokens and the layout is
//! guessed from the token count, the digit counts and the ranges of the
//! fields. Ambiguous numeric layouts are resolved in a fixed fallback order:
//! year first, then month first, then day first.

use phf::phf_map;
use time::macros::datetime;
use time::{Date, Duration, Month, OffsetDateTime, PrimitiveDateTime, Time};

use crate::errors::{Error, Result};

static MONTHS: phf::Map<&'static str, u8> = phf_map! {
    "JAN" => 1, "JANUARY" => 1,
    "FEB" => 2, "FEBRUARY" => 2,
    "MAR" => 3, "MARCH" => 3,
    "APR" => 4, "APRIL" => 4,
    "MAY" => 5,
    "JUN" => 6, "JUNE" => 6,
    "JUL" => 7, "JULY" => 7,
    "AUG" => 8, "AUGUST" => 8,
    "SEP" => 9, "SEPT" => 9, "SEPTEMBER" => 9,
    "OCT" => 10, "OCTOBER" => 10,
    "NOV" => 11, "NOVEMBER" => 11,
    "DEC" => 12, "DECEMBER" => 12,
};

const ORDINAL_SUFFIXES: [&str; 4] = ["st", "nd", "rd", "th"];

/// Day zero of spreadsheet date serials.
const EXCEL_EPOCH: PrimitiveDateTime = datetime!(1899-12-30 0:00);
const MILLIS_PER_DAY: i64 = 86_400_000;
/// Serials outside this open interval fall outside years 100 to 9999.
const MIN_SERIAL: f64 = -657_435.0;
const MAX_SERIAL: f64 = 2_958_466.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Token<'a> {
    Number(&'a str),
    Word(&'a str),
}

impl Token<'_> {
    fn month(self) -> Option<i64> {
        match self {
            Token::Word(word) => MONTHS
                .get(word.to_ascii_uppercase().as_str())
                .map(|&m| i64::from(m)),
            Token::Number(_) => None,
        }
    }

    fn number(self) -> Option<(i64, usize)> {
        match self {
            Token::Number(digits) => digits.parse().ok().map(|n| (n, digits.len())),
            Token::Word(_) => None,
        }
    }
}

/// Splits `text` into runs of ASCII digits and runs of letters. Anything
/// else separates tokens. An `st`/`nd`/`rd`/`th` following a number is
/// dropped.
fn tokenize(text: &str) -> Vec<Token<'_>> {
    let mut tokens = Vec::new();
    let mut chars = text.char_indices().peekable();
    let mut after_number = false;

    while let Some((start, c)) = chars.next() {
        let is_digit = c.is_ascii_digit();
        if !is_digit && !c.is_alphabetic() {
            after_number &= c.is_whitespace();
            continue;
        }

        let mut end = start + c.len_utf8();
        while let Some(&(i, next)) = chars.peek() {
            let same_kind = if is_digit {
                next.is_ascii_digit()
            } else {
                next.is_alphabetic()
            };
            if !same_kind {
                break;
            }
            end = i + next.len_utf8();
            chars.next();
        }

        let run = text.get(start..end).unwrap_or_default();
        if is_digit {
            tokens.push(Token::Number(run));
        } else {
            let word = if after_number { strip_ordinal(run) } else { run };
            if !word.is_empty() {
                tokens.push(Token::Word(word));
            }
        }
        after_number = is_digit;
    }
    tokens
}

fn strip_ordinal(word: &str) -> &str {
    match (word.get(..2), word.get(2..)) {
        (Some(head), Some(tail))
            if ORDINAL_SUFFIXES
                .iter()
                .any(|suffix| head.eq_ignore_ascii_case(suffix)) =>
        {
            tail
        }
        _ => word,
    }
}

fn implausible(month: i64, day: i64) -> bool {
    month > 12 || day > 31 || day == 0
}

fn two_digit_year(year: i64, digits: usize) -> i64 {
    if digits <= 2 { year + 2000 } else { year }
}

/// Parses a date using the current year for layouts without one.
pub fn parse_date(text: &str) -> Result<Date> {
    parse_date_in_year(text, OffsetDateTime::now_utc().year())
}

/// Parses a date, using `current_year` for layouts that carry no year.
pub fn parse_date_in_year(text: &str, current_year: i32) -> Result<Date> {
    let invalid = || Error::InvalidDate(text.to_string());
    let current_year = i64::from(current_year);
    let tokens = tokenize(text);

    let (year, month, day) = match tokens.as_slice() {
        [single] => {
            let (n, digits) = single.number().ok_or_else(invalid)?;
            packed_date(n, digits, current_year).ok_or_else(invalid)?
        }
        [first, second] => {
            if let Token::Word(_) = first {
                let month = first.month().ok_or_else(invalid)?;
                let (day, _) = second.number().ok_or_else(invalid)?;
                (current_year, month, day)
            } else if let Token::Word(_) = second {
                let month = second.month().ok_or_else(invalid)?;
                let (day, _) = first.number().ok_or_else(invalid)?;
                (current_year, month, day)
            } else {
                let (month, _) = first.number().ok_or_else(invalid)?;
                let (day, _) = second.number().ok_or_else(invalid)?;
                if month > 12 {
                    (current_year, day, month)
                } else {
                    (current_year, month, day)
                }
            }
        }
        [first, second, third] => {
            if let Token::Word(_) = first {
                // MMM DD YYYY
                let month = first.month().ok_or_else(invalid)?;
                let (day, _) = second.number().ok_or_else(invalid)?;
                let (year, _) = third.number().ok_or_else(invalid)?;
                (if year < 100 { year + 2000 } else { year }, month, day)
            } else if let Token::Word(_) = second {
                let month = second.month().ok_or_else(invalid)?;
                let (lead, lead_digits) = first.number().ok_or_else(invalid)?;
                let (last, _) = third.number().ok_or_else(invalid)?;
                // YYYY MMM DD unless that cannot be, then DD MMM YYYY
                let (year, day) = if lead_digits >= 2 && last <= 31 {
                    (lead, last)
                } else {
                    (last, lead)
                };
                (if year < 100 { year + 2000 } else { year }, month, day)
            } else {
                numeric_date(
                    first.number().ok_or_else(invalid)?,
                    second.number().ok_or_else(invalid)?,
                    third.number().ok_or_else(invalid)?,
                )
            }
        }
        _ => return Err(invalid()),
    };

    calendar_date(year, month, day).ok_or_else(invalid)
}

/// Layout of a single all-digit token, chosen by its digit count.
fn packed_date(n: i64, digits: usize, current_year: i64) -> Option<(i64, i64, i64)> {
    let ymd = match digits {
        2 => (current_year, n / 10, n % 10),
        3 | 4 => (current_year, n / 100, n % 100),
        // MDDYY
        5 => (n % 100 + 2000, n / 10_000, (n / 100) % 100),
        6 => {
            // YYMMDD, MMDDYY, DDMMYY
            let (mut year, mut month, mut day) = (n / 10_000 + 2000, (n / 100) % 100, n % 100);
            if implausible(month, day) {
                (year, month, day) = (n % 100 + 2000, n / 10_000, (n / 100) % 100);
                if implausible(month, day) {
                    (month, day) = (day, month);
                }
            }
            (year, month, day)
        }
        7 => {
            // MDDYYYY, DMMYYYY
            let (year, mut month, mut day) = (n % 10_000, n / 1_000_000, (n / 10_000) % 100);
            if implausible(month, day) {
                (month, day) = (day, month);
            }
            (year, month, day)
        }
        8 => {
            // YYYYMMDD, MMDDYYYY, DDMMYYYY
            let (mut year, mut month, mut day) = (n / 10_000, (n / 100) % 100, n % 100);
            if implausible(month, day) {
                (year, month, day) = (n % 10_000, n / 1_000_000, (n / 10_000) % 100);
                if implausible(month, day) {
                    (month, day) = (day, month);
                }
            }
            (year, month, day)
        }
        _ => return None,
    };
    Some(ymd)
}

/// Three numeric fields: YYYY MM DD by default, with transpositions when
/// the fields cannot be read that way.
fn numeric_date(
    (first, first_digits): (i64, usize),
    (second, _): (i64, usize),
    (third, third_digits): (i64, usize),
) -> (i64, i64, i64) {
    if third > 31 {
        // The last field is the year: MM DD YYYY or DD MM YYYY.
        let year = if third_digits == 2 { third + 2000 } else { third };
        if first <= 12 {
            (year, first, second)
        } else {
            (year, second, first)
        }
    } else if second > 12 {
        // MM DD YYYY
        (two_digit_year(third, third_digits), first, second)
    } else if first_digits < 2 {
        // A single digit cannot be a year: M D YY, or D M YY.
        let year = two_digit_year(third, third_digits);
        if first > 12 {
            (year, second, first)
        } else {
            (year, first, second)
        }
    } else if first_digits == 2 {
        (first + 2000, second, third)
    } else {
        (first, second, third)
    }
}

fn calendar_date(year: i64, month: i64, day: i64) -> Option<Date> {
    let year = i32::try_from(year).ok()?;
    let month = Month::try_from(u8::try_from(month).ok()?).ok()?;
    let day = u8::try_from(day).ok()?;
    Date::from_calendar_date(year, month, day).ok()
}

/// Parses a time of day. `am`/`pm` markers are honoured, `24:00` is read as
/// the last second of the day.
pub fn parse_time(text: &str) -> Result<Time> {
    let invalid = || Error::InvalidTime(text.to_string());

    let lower = text.to_ascii_lowercase();
    let is_pm = lower.contains('p');
    let is_am = lower.contains('a');

    // Letters are removed before splitting, so "12h30" reads as "1230".
    let mut fields: Vec<String> = Vec::new();
    let mut current = String::new();
    for c in text.chars() {
        if c.is_ascii_digit() {
            current.push(c);
        } else if !c.is_alphabetic() && !current.is_empty() {
            fields.push(std::mem::take(&mut current));
        }
    }
    if !current.is_empty() {
        fields.push(current);
    }

    let mut numbers = Vec::with_capacity(fields.len());
    for field in &fields {
        numbers.push(field.parse::<u32>().map_err(|_| invalid())?);
    }

    let (mut hour, mut minute, mut second) = match (fields.as_slice(), numbers.as_slice()) {
        ([digits], [n]) => match digits.len() {
            1 | 2 => (*n, 0, 0),
            3 | 4 => (n / 100, n % 100, 0),
            5 | 6 => (n / 10_000, (n / 100) % 100, n % 100),
            _ => return Err(invalid()),
        },
        (_, [h, m]) => (*h, *m, 0),
        (_, [h, m, s]) => (*h, *m, *s),
        _ => return Err(invalid()),
    };

    if hour > 24 || minute > 59 || second > 59 {
        return Err(invalid());
    }

    if is_pm && hour <= 11 {
        hour += 12;
    } else if is_am && hour == 12 {
        hour = 0;
    } else if hour == 24 {
        (hour, minute, second) = (23, 59, 59);
    }

    let narrow = |v: u32| u8::try_from(v).map_err(|_| invalid());
    Time::from_hms(narrow(hour)?, narrow(minute)?, narrow(second)?).map_err(|_| invalid())
}

/// Parses `"<date> <time>"`, split at the first space.
pub fn parse_date_time(text: &str) -> Result<PrimitiveDateTime> {
    let text = text.trim();
    let (date, time) = text
        .split_once(' ')
        .ok_or_else(|| Error::InvalidTime(text.to_string()))?;
    Ok(PrimitiveDateTime::new(parse_date(date)?, parse_time(time)?))
}

/// Converts a spreadsheet date serial: whole days since 1899-12-30, with the
/// fraction giving the time of day. For negative serials the fraction still
/// counts forward from midnight.
pub fn from_excel_serial(serial: f64) -> Result<PrimitiveDateTime> {
    let invalid = || Error::InvalidDate(serial.to_string());
    if !serial.is_finite() || serial <= MIN_SERIAL || serial >= MAX_SERIAL {
        return Err(invalid());
    }

    let rounding = if serial >= 0.0 { 0.5 } else { -0.5 };
    // In range, so the product fits in an i64.
    #[allow(clippy::cast_possible_truncation)]
    let mut millis = (serial * MILLIS_PER_DAY as f64 + rounding) as i64;
    if millis < 0 {
        millis -= (millis % MILLIS_PER_DAY) * 2;
    }

    EXCEL_EPOCH
        .checked_add(Duration::milliseconds(millis))
        .ok_or_else(invalid)
}
