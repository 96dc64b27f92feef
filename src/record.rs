//! Delimited interval records and chromosome naming predicates.

use std::fmt;

/// A single record from a textual delimited interval file.
///
/// Only chromosome, start, and end are always retained. Columns beyond the
/// third are kept in `extra_fields` when the owning file handle was opened
/// with full-detail retention (forced on whenever column aggregation is
/// active), and dropped otherwise.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Record {
    pub file_idx: usize,
    pub chrom: String,
    pub start: u64,
    pub end: u64,
    pub extra_fields: Vec<String>,
}

impl Record {
    pub fn new(file_idx: usize, chrom: impl Into<String>, start: u64, end: u64) -> Self {
        Self {
            file_idx,
            chrom: chrom.into(),
            start,
            end,
            extra_fields: Vec::new(),
        }
    }

    /// Total number of columns this record was parsed from.
    #[inline]
    pub fn field_count(&self) -> usize {
        3 + self.extra_fields.len()
    }

    /// Whether the chromosome identifier carries the recognized `chr` prefix.
    #[inline]
    pub fn has_chrom_prefix(&self) -> bool {
        let b = self.chrom.as_bytes();
        b.len() >= 3 && b[..3].eq_ignore_ascii_case(b"chr")
    }

    /// Whether the numeric suffix of the chromosome identifier has a leading
    /// zero ("chr01", "007"). The suffix starts after the prefix when
    /// `has_prefix` is true, at the first character otherwise.
    #[inline]
    pub fn has_leading_zero(&self, has_prefix: bool) -> bool {
        let bytes = self.chrom.as_bytes();
        let tail = if has_prefix {
            bytes.get(3..).unwrap_or_default()
        } else {
            bytes
        };
        tail.len() >= 2 && tail[0] == b'0' && tail[1].is_ascii_digit()
    }

    /// Whether this interval overlaps another on the same chromosome
    /// (half-open coordinates).
    #[inline]
    pub fn overlaps(&self, other: &Record) -> bool {
        self.chrom == other.chrom && self.start < other.end && other.start < self.end
    }

    /// Strand column, when it was retained (column 6, '.' when absent).
    #[inline]
    pub fn strand(&self) -> char {
        self.extra_fields
            .get(2)
            .and_then(|s| s.chars().next())
            .unwrap_or('.')
    }
}

impl fmt::Display for Record {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}\t{}\t{}", self.chrom, self.start, self.end)?;
        for field in &self.extra_fields {
            write!(f, "\t{}", field)?;
        }
        Ok(())
    }
}

/// Lines the record reader skips entirely.
#[inline]
pub fn should_skip_line(line: &str) -> bool {
    line.is_empty()
        || line.starts_with('#')
        || line.starts_with("track")
        || line.starts_with("browser")
}
