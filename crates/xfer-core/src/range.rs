//! HTTP byte-range wire formats.
//!
//! `Range` request values use an inclusive end (`bytes=0-99` is 100 bytes);
//! `Content-Range` responses carry the resource total after the slash, which
//! drives size discovery for downloads that did not ask for an explicit length.

use crate::fault::Fault;
use std::fmt;

/// A requested byte range: `length == None` means "to the end of the resource".
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HttpRange {
    pub offset: u64,
    pub length: Option<u64>,
}

impl HttpRange {
    pub fn new(offset: u64, length: Option<u64>) -> Self {
        Self { offset, length }
    }

    /// Everything from `offset` to the end.
    pub fn from_offset(offset: u64) -> Self {
        Self {
            offset,
            length: None,
        }
    }

    /// Inclusive end offset, if the range is bounded.
    pub fn end_inclusive(&self) -> Option<u64> {
        self.length.map(|l| self.offset + l.saturating_sub(1))
    }

    /// Rejects empty or overflowing ranges, which have no `Range` header form.
    pub fn validate(&self) -> Result<(), Fault> {
        match self.length {
            Some(0) => Err(Fault::config(format!(
                "empty byte range at offset {}",
                self.offset
            ))),
            Some(l) if self.offset.checked_add(l).is_none() => Err(Fault::config(format!(
                "byte range {}+{} overflows",
                self.offset, l
            ))),
            _ => Ok(()),
        }
    }
}

impl fmt::Display for HttpRange {
    /// `bytes=<start>-<end>` or `bytes=<start>-`.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.end_inclusive() {
            Some(end) => write!(f, "bytes={}-{}", self.offset, end),
            None => write!(f, "bytes={}-", self.offset),
        }
    }
}

/// Parsed `Content-Range` response header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ContentRange {
    /// Inclusive `(start, end)`; `None` for the unsatisfied form `bytes */<total>`.
    pub range: Option<(u64, u64)>,
    /// Whole-resource size; `None` when the service sends `*`.
    pub total: Option<u64>,
}

impl ContentRange {
    /// Parses `bytes <start>-<end>/<total>` and `bytes */<total>`.
    pub fn parse(value: &str) -> Option<Self> {
        let rest = value.trim().strip_prefix("bytes")?;
        if !rest.starts_with(' ') {
            return None;
        }
        let (range, total) = rest.trim_start().split_once('/')?;
        let total = match total.trim() {
            "*" => None,
            t => Some(t.parse::<u64>().ok()?),
        };
        let range = match range.trim() {
            "*" => None,
            r => {
                let (start, end) = r.split_once('-')?;
                let start = start.trim().parse::<u64>().ok()?;
                let end = end.trim().parse::<u64>().ok()?;
                if end < start {
                    return None;
                }
                Some((start, end))
            }
        };
        if range.is_none() && total.is_none() {
            return None;
        }
        Some(Self { range, total })
    }

    /// Number of bytes in the returned range.
    pub fn len(&self) -> u64 {
        self.range.map_or(0, |(s, e)| e - s + 1)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
