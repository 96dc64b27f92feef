//! Input file handles: opening, format classification, and record access.
//!
//! The run context opens every declared input through [`open_record_file`],
//! which classifies the file and returns one of a closed set of handle
//! variants: a plain streaming reader, or a merge-aware reader that coalesces
//! overlapping intervals as they are read. Binary-alignment files are opened
//! and classified here but their record decoding belongs to the external
//! alignment reader; this module only needs to know that they are binary.

use std::fs::File;
use std::io::{self, BufRead, BufReader, Read};
use std::rc::Rc;

use memchr::memchr_iter;
use rustc_hash::FxHashSet;

use crate::error::{ContextError, Result};
use crate::genome::Genome;
use crate::record::{should_skip_line, Record};

/// Detected on-disk format of an input file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileFormat {
    /// Line-oriented, tab-delimited interval text.
    Delimited,
    /// Compact binary alignment data (BGZF-compressed or raw).
    Alignment,
}

/// Strand handling for merge-on-read coalescing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StrandPolicy {
    /// Merge regardless of strand.
    #[default]
    Any,
    /// Only merge records whose strand columns agree.
    Same,
}

/// Settings propagated from the run context into every opened handle.
#[derive(Debug, Clone, Default)]
pub struct OpenSettings {
    pub merged_input: bool,
    pub max_merge_distance: u64,
    pub strand_policy: StrandPolicy,
    pub full_detail: bool,
    pub assume_sorted: bool,
    pub io_buf_size: usize,
    pub genome: Option<Rc<Genome>>,
}

/// Binary-alignment records present a fixed column schema to column
/// aggregation, mirroring the twelve columns of the delimited projection.
const ALIGNMENT_FIELD_COUNT: usize = 12;

const GZIP_MAGIC: [u8; 2] = [0x1f, 0x8b];
const ALIGNMENT_MAGIC: [u8; 4] = [b'B', b'A', b'M', 0x01];

/// Open and classify one declared input file.
///
/// Selects the merge-aware variant when the context is configured to coalesce
/// overlapping intervals on read, the plain variant otherwise.
pub fn open_record_file(path: &str, file_idx: usize, settings: &OpenSettings) -> Result<FileHandle> {
    let plain = PlainFile::open(path, file_idx, settings)?;
    if settings.merged_input {
        Ok(FileHandle::Merging(MergingFile::new(plain, settings)))
    } else {
        Ok(FileHandle::Plain(plain))
    }
}

/// One opened input file, polymorphic over plain vs merge-aware reading.
#[derive(Debug)]
pub enum FileHandle {
    Plain(PlainFile),
    Merging(MergingFile),
}

impl FileHandle {
    pub fn path(&self) -> &str {
        match self {
            FileHandle::Plain(f) => &f.path,
            FileHandle::Merging(f) => &f.inner.path,
        }
    }

    pub fn file_idx(&self) -> usize {
        match self {
            FileHandle::Plain(f) => f.file_idx,
            FileHandle::Merging(f) => f.inner.file_idx,
        }
    }

    pub fn format(&self) -> FileFormat {
        match self {
            FileHandle::Plain(f) => f.format,
            FileHandle::Merging(f) => f.inner.format,
        }
    }

    /// Column count of this file's records, probed from the first data line
    /// (fixed for alignment files). `None` for an empty delimited file.
    pub fn schema_field_count(&self) -> Option<usize> {
        match self {
            FileHandle::Plain(f) => f.schema_fields,
            FileHandle::Merging(f) => f.inner.schema_fields,
        }
    }

    pub fn genome(&self) -> Option<&Rc<Genome>> {
        match self {
            FileHandle::Plain(f) => f.genome.as_ref(),
            FileHandle::Merging(f) => f.inner.genome.as_ref(),
        }
    }

    /// Read the next record. Delimited files stream records; alignment files
    /// yield `None` here because their decoding is delegated to the external
    /// alignment reader.
    pub fn read_record(&mut self) -> Result<Option<Record>> {
        match self {
            FileHandle::Plain(f) => f.read_record(),
            FileHandle::Merging(f) => f.read_record(),
        }
    }
}

/// Plain streaming reader over one input file.
#[derive(Debug)]
pub struct PlainFile {
    path: String,
    file_idx: usize,
    format: FileFormat,
    schema_fields: Option<usize>,
    full_detail: bool,
    genome: Option<Rc<Genome>>,
    reader: Option<BufReader<File>>,
    line_buf: String,
    line_number: usize,
}

impl PlainFile {
    fn open(path: &str, file_idx: usize, settings: &OpenSettings) -> Result<Self> {
        let open_err = |source| ContextError::FileOpen {
            path: path.to_string(),
            source,
        };

        let mut magic_file = File::open(path).map_err(open_err)?;
        let mut magic = [0u8; 4];
        let mut filled = 0;
        // read_exact would error on short files; fill what we can
        loop {
            let n = magic_file.read(&mut magic[filled..]).map_err(open_err)?;
            if n == 0 {
                break;
            }
            filled += n;
            if filled == magic.len() {
                break;
            }
        }

        let format = classify(&magic[..filled]);
        let (schema_fields, reader) = match format {
            FileFormat::Alignment => (Some(ALIGNMENT_FIELD_COUNT), None),
            FileFormat::Delimited => {
                let probe = File::open(path).map_err(open_err)?;
                let schema = probe_schema(probe).map_err(open_err)?;
                let file = File::open(path).map_err(open_err)?;
                let reader = if settings.io_buf_size > 0 {
                    BufReader::with_capacity(settings.io_buf_size, file)
                } else {
                    BufReader::new(file)
                };
                (schema, Some(reader))
            }
        };

        Ok(Self {
            path: path.to_string(),
            file_idx,
            format,
            schema_fields,
            full_detail: settings.full_detail,
            genome: settings.genome.clone(),
            reader,
            line_buf: String::with_capacity(1024),
            line_number: 0,
        })
    }

    fn read_record(&mut self) -> Result<Option<Record>> {
        let reader = match self.reader.as_mut() {
            Some(r) => r,
            None => return Ok(None),
        };

        loop {
            self.line_buf.clear();
            let bytes_read = reader
                .read_line(&mut self.line_buf)
                .map_err(|source| ContextError::FileOpen {
                    path: self.path.clone(),
                    source,
                })?;
            if bytes_read == 0 {
                return Ok(None);
            }
            self.line_number += 1;

            let line = self.line_buf.trim_end();
            if should_skip_line(line) {
                continue;
            }

            return parse_record(line, self.file_idx, self.full_detail, &self.path, self.line_number)
                .map(Some);
        }
    }
}

fn parse_record(
    line: &str,
    file_idx: usize,
    full_detail: bool,
    path: &str,
    line_number: usize,
) -> Result<Record> {
    let fields: Vec<&str> = line.split('\t').collect();
    if fields.len() < 3 {
        return Err(ContextError::MalformedValue(format!(
            "{} line {}: expected at least 3 fields, got {}",
            path,
            line_number,
            fields.len()
        )));
    }

    let parse_pos = |s: &str, which: &str| -> Result<u64> {
        s.parse().map_err(|_| {
            ContextError::MalformedValue(format!(
                "{} line {}: invalid {} position '{}'",
                path, line_number, which, s
            ))
        })
    };
    let start = parse_pos(fields[1], "start")?;
    let end = parse_pos(fields[2], "end")?;

    let mut record = Record::new(file_idx, fields[0], start, end);
    if full_detail && fields.len() > 3 {
        record.extra_fields = fields[3..].iter().map(|s| s.to_string()).collect();
    }
    Ok(record)
}

/// Classify a file from its leading bytes.
fn classify(sniff: &[u8]) -> FileFormat {
    if sniff.starts_with(&GZIP_MAGIC) || sniff.starts_with(&ALIGNMENT_MAGIC) {
        FileFormat::Alignment
    } else {
        FileFormat::Delimited
    }
}

/// Count the columns of the first data line, however deep the header block
/// runs. `None` for a file with no data lines at all.
fn probe_schema(file: File) -> io::Result<Option<usize>> {
    let mut reader = BufReader::new(file);
    let mut line = String::new();
    loop {
        line.clear();
        if reader.read_line(&mut line)? == 0 {
            return Ok(None);
        }
        let data = line.trim_end();
        if !should_skip_line(data) {
            return Ok(Some(memchr_iter(b'\t', data.as_bytes()).count() + 1));
        }
    }
}

/// Merge-aware reader: coalesces overlapping (or within-distance) intervals
/// as records are drawn, and enforces sort order unless the context declared
/// its inputs pre-sorted.
#[derive(Debug)]
pub struct MergingFile {
    inner: PlainFile,
    max_distance: u64,
    strand_policy: StrandPolicy,
    check_sorted: bool,
    pending: Option<Record>,
    prev_chrom: Option<String>,
    prev_start: u64,
    seen_chroms: FxHashSet<String>,
}

impl MergingFile {
    fn new(inner: PlainFile, settings: &OpenSettings) -> Self {
        Self {
            inner,
            max_distance: settings.max_merge_distance,
            strand_policy: settings.strand_policy,
            check_sorted: !settings.assume_sorted,
            pending: None,
            prev_chrom: None,
            prev_start: 0,
            seen_chroms: FxHashSet::default(),
        }
    }

    fn next_inner(&mut self) -> Result<Option<Record>> {
        let rec = match self.inner.read_record()? {
            Some(r) => r,
            None => return Ok(None),
        };
        if self.check_sorted {
            self.validate_order(&rec)?;
        }
        Ok(Some(rec))
    }

    fn validate_order(&mut self, rec: &Record) -> Result<()> {
        if let Some(ref pc) = self.prev_chrom {
            if rec.chrom != *pc {
                if self.seen_chroms.contains(&rec.chrom) {
                    return Err(ContextError::UnsortedInput {
                        path: self.inner.path.clone(),
                        message: format!(
                            "chromosome '{}' was seen earlier (chromosomes must be contiguous)",
                            rec.chrom
                        ),
                    });
                }
                self.seen_chroms.insert(pc.clone());
            } else if rec.start < self.prev_start {
                return Err(ContextError::UnsortedInput {
                    path: self.inner.path.clone(),
                    message: format!(
                        "position {} on {} comes after {}",
                        rec.start, rec.chrom, self.prev_start
                    ),
                });
            }
        }
        self.prev_chrom = Some(rec.chrom.clone());
        self.prev_start = rec.start;
        Ok(())
    }

    fn can_merge(&self, cur: &Record, next: &Record) -> bool {
        if next.chrom != cur.chrom {
            return false;
        }
        if next.start > cur.end.saturating_add(self.max_distance) {
            return false;
        }
        match self.strand_policy {
            StrandPolicy::Any => true,
            StrandPolicy::Same => cur.strand() == next.strand(),
        }
    }

    fn read_record(&mut self) -> Result<Option<Record>> {
        let mut current = match self.pending.take() {
            Some(r) => r,
            None => match self.next_inner()? {
                Some(r) => r,
                None => return Ok(None),
            },
        };

        loop {
            match self.next_inner()? {
                Some(next) if self.can_merge(&current, &next) => {
                    current.end = current.end.max(next.end);
                }
                Some(next) => {
                    self.pending = Some(next);
                    return Ok(Some(current));
                }
                None => return Ok(Some(current)),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn create_temp_file(content: &[u8]) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(content).unwrap();
        file.flush().unwrap();
        file
    }

    fn open_plain(path: &str) -> FileHandle {
        open_record_file(path, 0, &OpenSettings::default()).unwrap()
    }

    #[test]
    fn test_classify_delimited() {
        let file = create_temp_file(b"chr1\t100\t200\tgeneA\n");
        let handle = open_plain(file.path().to_str().unwrap());
        assert_eq!(handle.format(), FileFormat::Delimited);
        assert_eq!(handle.schema_field_count(), Some(4));
    }

    #[test]
    fn test_classify_alignment_gzip() {
        let file = create_temp_file(&[0x1f, 0x8b, 0x08, 0x04, 0x00, 0x00]);
        let mut handle = open_plain(file.path().to_str().unwrap());
        assert_eq!(handle.format(), FileFormat::Alignment);
        assert_eq!(handle.schema_field_count(), Some(12));
        // no textual records from a binary file
        assert!(handle.read_record().unwrap().is_none());
    }

    #[test]
    fn test_classify_alignment_raw_magic() {
        let file = create_temp_file(b"BAM\x01rest-of-header");
        let handle = open_plain(file.path().to_str().unwrap());
        assert_eq!(handle.format(), FileFormat::Alignment);
    }

    #[test]
    fn test_schema_skips_headers() {
        let file = create_temp_file(b"# header\ntrack name=x\nchr1\t1\t2\tname\t0\t+\n");
        let handle = open_plain(file.path().to_str().unwrap());
        assert_eq!(handle.schema_field_count(), Some(6));
    }

    #[test]
    fn test_schema_found_past_long_header_block() {
        // first data line sits well past any fixed-size prefix of the file
        let mut content = Vec::new();
        for i in 0..200 {
            content.extend_from_slice(format!("# header line {} {}\n", i, "x".repeat(80)).as_bytes());
        }
        content.extend_from_slice(b"chr1\t1\t2\tname\t0\t+\n");
        assert!(content.len() > 16 * 1024);

        let file = create_temp_file(&content);
        let handle = open_plain(file.path().to_str().unwrap());
        assert_eq!(handle.schema_field_count(), Some(6));
    }

    #[test]
    fn test_empty_file_has_no_schema() {
        let file = create_temp_file(b"");
        let handle = open_plain(file.path().to_str().unwrap());
        assert_eq!(handle.format(), FileFormat::Delimited);
        assert_eq!(handle.schema_field_count(), None);
    }

    #[test]
    fn test_plain_read_drops_extras_without_full_detail() {
        let file = create_temp_file(b"chr1\t100\t200\tgeneA\t960\t+\n");
        let mut handle = open_plain(file.path().to_str().unwrap());
        let rec = handle.read_record().unwrap().unwrap();
        assert_eq!(rec.chrom, "chr1");
        assert!(rec.extra_fields.is_empty());
    }

    #[test]
    fn test_plain_read_full_detail() {
        let file = create_temp_file(b"chr1\t100\t200\tgeneA\t960\t+\n");
        let settings = OpenSettings {
            full_detail: true,
            ..Default::default()
        };
        let mut handle = open_record_file(file.path().to_str().unwrap(), 3, &settings).unwrap();
        let rec = handle.read_record().unwrap().unwrap();
        assert_eq!(rec.file_idx, 3);
        assert_eq!(rec.extra_fields, ["geneA", "960", "+"]);
    }

    #[test]
    fn test_missing_file() {
        let result = open_record_file("/no/such/file.bed", 0, &OpenSettings::default());
        assert!(matches!(result, Err(ContextError::FileOpen { .. })));
    }

    #[test]
    fn test_merging_coalesces_overlaps() {
        let file = create_temp_file(b"chr1\t100\t200\nchr1\t150\t250\nchr1\t300\t400\n");
        let settings = OpenSettings {
            merged_input: true,
            ..Default::default()
        };
        let mut handle = open_record_file(file.path().to_str().unwrap(), 0, &settings).unwrap();

        let rec = handle.read_record().unwrap().unwrap();
        assert_eq!((rec.start, rec.end), (100, 250));
        let rec = handle.read_record().unwrap().unwrap();
        assert_eq!((rec.start, rec.end), (300, 400));
        assert!(handle.read_record().unwrap().is_none());
    }

    #[test]
    fn test_merging_respects_distance() {
        let file = create_temp_file(b"chr1\t100\t200\nchr1\t250\t300\n");
        let settings = OpenSettings {
            merged_input: true,
            max_merge_distance: 100,
            ..Default::default()
        };
        let mut handle = open_record_file(file.path().to_str().unwrap(), 0, &settings).unwrap();
        let rec = handle.read_record().unwrap().unwrap();
        assert_eq!((rec.start, rec.end), (100, 300));
    }

    #[test]
    fn test_merging_rejects_unsorted() {
        let file = create_temp_file(b"chr1\t300\t400\nchr1\t100\t200\n");
        let settings = OpenSettings {
            merged_input: true,
            ..Default::default()
        };
        let mut handle = open_record_file(file.path().to_str().unwrap(), 0, &settings).unwrap();
        let result = handle.read_record();
        assert!(matches!(result, Err(ContextError::UnsortedInput { .. })));
    }

    #[test]
    fn test_merging_sorted_assumption_waives_check() {
        let file = create_temp_file(b"chr1\t300\t400\nchr1\t100\t200\n");
        let settings = OpenSettings {
            merged_input: true,
            assume_sorted: true,
            ..Default::default()
        };
        let mut handle = open_record_file(file.path().to_str().unwrap(), 0, &settings).unwrap();
        // out-of-order input passes through unchecked
        assert!(handle.read_record().is_ok());
    }

    #[test]
    fn test_merging_same_strand_policy() {
        let file = create_temp_file(b"chr1\t100\t200\tx\t0\t+\nchr1\t150\t250\tx\t0\t-\n");
        let settings = OpenSettings {
            merged_input: true,
            full_detail: true,
            strand_policy: StrandPolicy::Same,
            ..Default::default()
        };
        let mut handle = open_record_file(file.path().to_str().unwrap(), 0, &settings).unwrap();
        let rec = handle.read_record().unwrap().unwrap();
        // opposite strands stay separate
        assert_eq!((rec.start, rec.end), (100, 200));
        let rec = handle.read_record().unwrap().unwrap();
        assert_eq!((rec.start, rec.end), (150, 250));
    }
}
