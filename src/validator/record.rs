// Copyright (c) 2022 Octavian Oncescu
// Copyright (c) 2022-2023 The Purplecoin Core developers
// Licensed under the Apache License, Version 2.0 see LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0 or the MIT license, see
// LICENSE-MIT or http://opensource.org/licenses/MIT

//! Infraction record line format, version 1.
//!
//! ```text
//! #!version=1
//! # comments and blank lines are ignored
//! txid=AAA;address=1abc;amount=500;height=100;amountH=0.5
//! ```
//!
//! A record is a `;` separated list of `key=value` pairs in any order. Keys
//! are case-sensitive and unknown keys are ignored. Values cannot contain `;`
//! or `=`. When a key is repeated the first occurrence wins.

use crate::consensus::{money_check, Money};
use std::fmt;

/// Record format version understood by this parser
pub const RECORD_FORMAT_VERSION: u32 = 1;

pub const FIELD_TXID: &str = "txid";
pub const FIELD_ADDRESS: &str = "address";
pub const FIELD_AMOUNT: &str = "amount";
pub const FIELD_HEIGHT: &str = "height";
pub const FIELD_AMOUNT_H: &str = "amountH";

const COMMENT_PREFIX: char = '#';
const VERSION_DIRECTIVE: &str = "#!version=";
const FIELD_SEPARATOR: char = ';';
const KV_SEPARATOR: char = '=';

/// A transaction flagged as exploited.
#[derive(Debug, Clone, PartialEq)]
pub struct InfractionData {
    pub txid: String,
    pub address: String,
    pub amount: Money,
    pub amount_h: f64,
}

impl InfractionData {
    pub fn new(
        txid: impl Into<String>,
        address: impl Into<String>,
        amount: Money,
        amount_h: f64,
    ) -> Self {
        Self {
            txid: txid.into(),
            address: address.into(),
            amount,
            amount_h,
        }
    }

    /// Renders the record as a line of the record file at the given height.
    #[must_use]
    pub fn to_record_line(&self, height: u64) -> String {
        format!(
            "{FIELD_TXID}={};{FIELD_ADDRESS}={};{FIELD_AMOUNT}={};{FIELD_HEIGHT}={height};{FIELD_AMOUNT_H}={}",
            self.txid, self.address, self.amount, self.amount_h
        )
    }
}

impl fmt::Display for InfractionData {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{FIELD_TXID}={};{FIELD_ADDRESS}={};{FIELD_AMOUNT}={};{FIELD_AMOUNT_H}={}",
            self.txid, self.address, self.amount, self.amount_h
        )
    }
}

#[derive(PartialEq, Debug, Clone, Copy)]
pub enum InfractionParseErr {
    EmptyRecord,
    MalformedPair,
    MissingField(&'static str),
    EmptyField(&'static str),
    InvalidAmount,
    InvalidAmountH,
    InvalidHeight,
}

impl fmt::Display for InfractionParseErr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::EmptyRecord => write!(f, "empty record"),
            Self::MalformedPair => write!(f, "field is not a key=value pair"),
            Self::MissingField(field) => write!(f, "missing field `{field}`"),
            Self::EmptyField(field) => write!(f, "empty field `{field}`"),
            Self::InvalidAmount => write!(f, "invalid amount"),
            Self::InvalidAmountH => write!(f, "invalid display amount"),
            Self::InvalidHeight => write!(f, "invalid height"),
        }
    }
}

impl std::error::Error for InfractionParseErr {}

/// Classification of a single line of the record file.
#[derive(PartialEq, Debug)]
pub(crate) enum RecordLine<'a> {
    /// Blank or comment line
    Ignored,

    /// `#!version=N` directive. `None` if the version is not a number.
    Version(Option<u32>),

    /// Trimmed record text
    Record(&'a str),
}

pub(crate) fn classify_line(line: &str) -> RecordLine<'_> {
    let line = line.trim();

    if line.is_empty() {
        return RecordLine::Ignored;
    }

    if let Some(version) = line.strip_prefix(VERSION_DIRECTIVE) {
        return RecordLine::Version(version.trim().parse().ok());
    }

    if line.starts_with(COMMENT_PREFIX) {
        return RecordLine::Ignored;
    }

    RecordLine::Record(line)
}

fn pairs(line: &str) -> impl Iterator<Item = Option<(&str, &str)>> {
    line.split(FIELD_SEPARATOR)
        .map(str::trim)
        .filter(|pair| !pair.is_empty())
        .map(|pair| {
            pair.split_once(KV_SEPARATOR)
                .map(|(k, v)| (k.trim(), v.trim()))
        })
}

fn find_field<'a>(line: &'a str, key: &str) -> Option<&'a str> {
    pairs(line).flatten().find(|(k, _)| *k == key).map(|(_, v)| v)
}

/// Extracts the block height of a record line. Returns `None` when the line
/// carries no parsable `height` field.
pub fn block_height(line: &str) -> Option<u64> {
    find_field(line, FIELD_HEIGHT)?.parse().ok()
}

/// Parses a record line into its height and infraction data.
pub fn parse_record(line: &str) -> Result<(u64, InfractionData), InfractionParseErr> {
    let mut txid = None;
    let mut address = None;
    let mut amount = None;
    let mut height = None;
    let mut amount_h = None;
    let mut seen_any = false;

    for pair in pairs(line) {
        let (key, value) = pair.ok_or(InfractionParseErr::MalformedPair)?;
        seen_any = true;

        let slot = match key {
            FIELD_TXID => &mut txid,
            FIELD_ADDRESS => &mut address,
            FIELD_AMOUNT => &mut amount,
            FIELD_HEIGHT => &mut height,
            FIELD_AMOUNT_H => &mut amount_h,
            _ => continue,
        };

        if slot.is_none() {
            *slot = Some(value);
        }
    }

    if !seen_any {
        return Err(InfractionParseErr::EmptyRecord);
    }

    let txid = required(txid, FIELD_TXID)?;
    let address = required(address, FIELD_ADDRESS)?;
    let amount: Money = required(amount, FIELD_AMOUNT)?
        .parse()
        .map_err(|_| InfractionParseErr::InvalidAmount)?;
    let height: u64 = required(height, FIELD_HEIGHT)?
        .parse()
        .map_err(|_| InfractionParseErr::InvalidHeight)?;
    let amount_h: f64 = required(amount_h, FIELD_AMOUNT_H)?
        .parse()
        .map_err(|_| InfractionParseErr::InvalidAmountH)?;

    if !money_check(amount) {
        return Err(InfractionParseErr::InvalidAmount);
    }

    if !amount_h.is_finite() {
        return Err(InfractionParseErr::InvalidAmountH);
    }

    Ok((height, InfractionData::new(txid, address, amount, amount_h)))
}

fn required<'a>(
    value: Option<&'a str>,
    field: &'static str,
) -> Result<&'a str, InfractionParseErr> {
    match value {
        None => Err(InfractionParseErr::MissingField(field)),
        Some("") => Err(InfractionParseErr::EmptyField(field)),
        Some(v) => Ok(v),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const LINE: &str = "txid=AAA;address=1abc;amount=500;height=100;amountH=0.5";

    #[test]
    fn it_parses_a_record() {
        let (height, record) = parse_record(LINE).unwrap();
        assert_eq!(height, 100);
        assert_eq!(record, InfractionData::new("AAA", "1abc", 500, 0.5));
    }

    #[test]
    fn it_parses_fields_in_any_order_with_whitespace() {
        let line = " amountH = 1.25 ; height=7;txid= BBB ;amount=125000000;address=1xyz; ";
        let (height, record) = parse_record(line).unwrap();
        assert_eq!(height, 7);
        assert_eq!(record, InfractionData::new("BBB", "1xyz", 125_000_000, 1.25));
    }

    #[test]
    fn it_ignores_unknown_fields() {
        let line = format!("{LINE};note=moved");
        assert!(parse_record(&line).is_ok());
    }

    #[test]
    fn first_occurrence_wins() {
        let line = format!("{LINE};txid=CCC");
        assert_eq!(parse_record(&line).unwrap().1.txid, "AAA");
    }

    #[test]
    fn it_fails_on_missing_fields() {
        assert_eq!(
            parse_record("txid=AAA;amount=500;height=100;amountH=0.5"),
            Err(InfractionParseErr::MissingField(FIELD_ADDRESS))
        );
        assert_eq!(
            parse_record("txid=;address=1abc;amount=500;height=100;amountH=0.5"),
            Err(InfractionParseErr::EmptyField(FIELD_TXID))
        );
    }

    #[test]
    fn it_fails_on_bad_values() {
        assert_eq!(
            parse_record("txid=AAA;address=1abc;amount=-5;height=100;amountH=0.5"),
            Err(InfractionParseErr::InvalidAmount)
        );
        assert_eq!(
            parse_record("txid=AAA;address=1abc;amount=5x;height=100;amountH=0.5"),
            Err(InfractionParseErr::InvalidAmount)
        );
        assert_eq!(
            parse_record("txid=AAA;address=1abc;amount=5;height=100;amountH=NaN"),
            Err(InfractionParseErr::InvalidAmountH)
        );
        assert_eq!(
            parse_record("txid=AAA;address;amount=5;height=100;amountH=1"),
            Err(InfractionParseErr::MalformedPair)
        );
        assert_eq!(parse_record(";;"), Err(InfractionParseErr::EmptyRecord));
    }

    #[test]
    fn block_height_extraction() {
        assert_eq!(block_height(LINE), Some(100));
        assert_eq!(block_height("txid=AAA;height=abc"), None);
        assert_eq!(block_height("txid=AAA;address=1abc"), None);
        assert_eq!(block_height("garbage;height=12"), Some(12));
        assert_eq!(block_height(""), None);
    }

    #[test]
    fn classify_lines() {
        assert_eq!(classify_line("   "), RecordLine::Ignored);
        assert_eq!(classify_line("# a comment"), RecordLine::Ignored);
        assert_eq!(classify_line("#!version=1"), RecordLine::Version(Some(1)));
        assert_eq!(classify_line("#!version=x"), RecordLine::Version(None));
        assert_eq!(classify_line(" txid=A \r"), RecordLine::Record("txid=A"));
    }

    #[test]
    fn record_line_parses_back() {
        let record = InfractionData::new("DDD", "1def", 42, 0.00000042);
        let (height, parsed) = parse_record(&record.to_record_line(9)).unwrap();
        assert_eq!(height, 9);
        assert_eq!(parsed, record);
        assert_eq!(
            record.to_string(),
            "txid=DDD;address=1def;amount=42;amountH=0.00000042"
        );
    }
}
