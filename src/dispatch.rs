//! Flag tokenization for the run-context dispatcher.
//!
//! Dispatch is split in two: this module is a pure tokenizer that decodes a
//! single position in the token stream into a typed effect plus the number of
//! positions it consumed, and [`crate::context::RunContext`] drives the scan,
//! applies effects, and tracks consumption. A token that matches no flag is
//! not an error here; layered configurations (base flags, then tool-specific
//! flags) each get a chance at it, and whatever is still unconsumed at the
//! end fails the validation pass.

use crate::error::{ContextError, Result};

/// Smallest accepted `-iobuf` value, in bytes.
pub const MIN_IO_BUF_SIZE: usize = 8;

/// A decoded flag effect.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Arg {
    /// `-i <file>`: append an input file (repeatable).
    Input(String),
    /// `-g <file>`: set the genome reference file.
    GenomeFile(String),
    /// `-h` / `--help`.
    Help,
    /// `-split`: evaluate intervals per sub-segment.
    Split,
    /// `-bed`: force textual delimited output.
    ForceBedOutput,
    /// `-ubam`: uncompressed binary output.
    UncompressedOutput,
    /// `-fbam`: retain full per-record detail on binary input.
    FullDetail,
    /// `-sorted`: declare inputs pre-sorted.
    SortedInput,
    /// `-nobuf`: disable output buffering.
    NoOutputBuffer,
    /// `-iobuf <size>`: per-file read buffer size, resolved to bytes.
    IoBufSize(usize),
    /// `-prec <n>`: column-aggregation output precision.
    Precision(usize),
    /// `-header`: propagate the source header.
    PrintHeader,
    /// `-n <count>`: cap the number of output records.
    MaxRecords(u64),
    /// `-seed <n>`: fix the randomness seed.
    Seed(u64),
    /// `-o <ops>`: column aggregation operations.
    Operations(String),
    /// `-c <cols>`: column indices to aggregate.
    Columns(String),
    /// `-null <str>`: placeholder for empty aggregation groups.
    NullValue(String),
    /// `-delim <str>`: delimiter for collapsed value lists.
    Delimiter(String),
    /// `-sortout`: sort output records.
    SortOutput,
    /// `-nonamecheck`: disable naming-convention checks.
    NoNameCheck,
}

/// A matched flag and the number of token positions it consumed (1 or 2).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Match {
    pub arg: Arg,
    pub width: usize,
}

impl Match {
    fn bare(arg: Arg) -> Option<Self> {
        Some(Self { arg, width: 1 })
    }

    fn with_value(arg: Arg) -> Option<Self> {
        Some(Self { arg, width: 2 })
    }
}

/// Decode the token at `pos` against the recognized flag table.
///
/// Returns `Ok(None)` for an unrecognized token (left for a later layer or
/// the validation pass) and for a position past the end of the token
/// sequence; errors mean a recognized flag's value was missing or malformed
/// and abort the whole parse.
pub fn match_flag(tokens: &[String], pos: usize) -> Result<Option<Match>> {
    let token = match tokens.get(pos) {
        Some(t) => t,
        None => return Ok(None),
    };
    match token.as_str() {
        "-i" => Ok(Match::with_value(Arg::Input(
            value(tokens, pos, "-i", "input file")?.to_string(),
        ))),
        "-g" => Ok(Match::with_value(Arg::GenomeFile(
            value(tokens, pos, "-g", "genome file")?.to_string(),
        ))),
        "-h" | "--help" => Ok(Match::bare(Arg::Help)),
        "-split" => Ok(Match::bare(Arg::Split)),
        "-bed" => Ok(Match::bare(Arg::ForceBedOutput)),
        "-ubam" => Ok(Match::bare(Arg::UncompressedOutput)),
        "-fbam" => Ok(Match::bare(Arg::FullDetail)),
        "-sorted" => Ok(Match::bare(Arg::SortedInput)),
        "-nobuf" => Ok(Match::bare(Arg::NoOutputBuffer)),
        "-iobuf" => {
            let raw = value(tokens, pos, "-iobuf", "size of input buffer")?;
            Ok(Match::with_value(Arg::IoBufSize(parse_io_buf_size(raw)?)))
        }
        "-prec" => {
            let raw = value(tokens, pos, "-prec", "precision")?;
            let prec: usize = raw.parse().map_err(|_| {
                ContextError::MalformedValue(
                    "-prec must be followed by a positive integer".to_string(),
                )
            })?;
            if prec < 1 {
                return Err(ContextError::MalformedValue(
                    "-prec must be followed by a positive integer".to_string(),
                ));
            }
            Ok(Match::with_value(Arg::Precision(prec)))
        }
        "-header" => Ok(Match::bare(Arg::PrintHeader)),
        "-n" => {
            let raw = value(tokens, pos, "-n", "number of output records")?;
            let count: u64 = raw.parse().map_err(|_| {
                ContextError::MalformedValue(format!(
                    "argument passed to -n is not numeric: '{}'",
                    raw
                ))
            })?;
            Ok(Match::with_value(Arg::MaxRecords(count)))
        }
        "-seed" => {
            let raw = value(tokens, pos, "-seed", "seed")?;
            let seed: u64 = raw.parse().map_err(|_| {
                ContextError::MalformedValue(format!(
                    "argument passed to -seed is not numeric: '{}'",
                    raw
                ))
            })?;
            Ok(Match::with_value(Arg::Seed(seed)))
        }
        "-o" => Ok(Match::with_value(Arg::Operations(
            value(tokens, pos, "-o", "operations")?.to_string(),
        ))),
        "-c" => Ok(Match::with_value(Arg::Columns(
            value(tokens, pos, "-c", "columns")?.to_string(),
        ))),
        "-null" => Ok(Match::with_value(Arg::NullValue(
            value(tokens, pos, "-null", "null value")?.to_string(),
        ))),
        "-delim" => Ok(Match::with_value(Arg::Delimiter(
            value(tokens, pos, "-delim", "delimiter")?.to_string(),
        ))),
        "-sortout" => Ok(Match::bare(Arg::SortOutput)),
        "-nonamecheck" => Ok(Match::bare(Arg::NoNameCheck)),
        _ => Ok(None),
    }
}

/// The value token following a flag, or MissingValue if the flag is last.
fn value<'a>(
    tokens: &'a [String],
    pos: usize,
    flag: &'static str,
    expected: &'static str,
) -> Result<&'a str> {
    tokens
        .get(pos + 1)
        .map(|s| s.as_str())
        .ok_or(ContextError::MissingValue { flag, expected })
}

/// Resolve an `-iobuf` value to bytes.
///
/// An optional trailing K, M, or G suffix scales by 2^10, 2^20, or 2^30.
/// Without a recognized suffix the whole value must be numeric, and the
/// result must be at least [`MIN_IO_BUF_SIZE`].
pub fn parse_io_buf_size(raw: &str) -> Result<usize> {
    let bytes = raw.as_bytes();
    let last = match bytes.last() {
        Some(&b) => b,
        None => {
            return Err(ContextError::MalformedValue(
                "argument passed to -iobuf is not numeric".to_string(),
            ))
        }
    };

    let (digits, multiplier): (&str, usize) = if last.is_ascii_digit() {
        (raw, 1)
    } else {
        let multiplier = match last {
            b'K' => 1 << 10,
            b'M' => 1 << 20,
            b'G' => 1 << 30,
            other => {
                return Err(ContextError::MalformedValue(format!(
                    "Unrecognized memory buffer size suffix '{}' given",
                    other as char
                )))
            }
        };
        (&raw[..raw.len() - 1], multiplier)
    };

    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return Err(ContextError::MalformedValue(
            "argument passed to -iobuf is not numeric".to_string(),
        ));
    }

    let base: usize = digits.parse().map_err(|_| {
        ContextError::MalformedValue("argument passed to -iobuf is not numeric".to_string())
    })?;
    let size = base.checked_mul(multiplier).ok_or_else(|| {
        ContextError::MalformedValue("specified buffer size is too large".to_string())
    })?;
    if size < MIN_IO_BUF_SIZE {
        return Err(ContextError::MalformedValue(
            "specified buffer size is too small".to_string(),
        ));
    }
    Ok(size)
}
