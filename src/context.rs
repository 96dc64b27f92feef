//! The run context: one process invocation's validated configuration.
//!
//! A [`RunContext`] is built once at startup, mutated through the
//! dispatch/validation sequence, and read by the tool's per-record loop.
//! The sequence is strictly ordered and memoized: arguments are parsed
//! (possibly in layers), files are opened exactly once, the output format is
//! resolved exactly once, and column-ops configuration is validated against
//! the opened database files. Any failure is terminal for the run; errors
//! accumulate so the user gets one complete report.

use std::process;
use std::rc::Rc;
use std::time::{SystemTime, UNIX_EPOCH};

use rand::rngs::SmallRng;
use rand::SeedableRng;

use crate::colops::ColumnOps;
use crate::dispatch::{match_flag, Arg};
use crate::error::ContextError;
use crate::files::{open_record_file, FileFormat, FileHandle, OpenSettings, StrandPolicy};
use crate::genome::Genome;
use crate::naming::NamingTracker;
use crate::record::Record;

/// The tool being run, resolved from the invocation name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Program {
    Intersect,
    Closest,
    Merge,
    Subtract,
    Map,
    Sample,
    Jaccard,
}

impl Program {
    /// Fixed invocation-name mapping.
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "intersect" => Some(Program::Intersect),
            "closest" => Some(Program::Closest),
            "merge" => Some(Program::Merge),
            "subtract" => Some(Program::Subtract),
            "map" => Some(Program::Map),
            "sample" => Some(Program::Sample),
            "jaccard" => Some(Program::Jaccard),
            _ => None,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Program::Intersect => "intersect",
            Program::Closest => "closest",
            Program::Merge => "merge",
            Program::Subtract => "subtract",
            Program::Map => "map",
            Program::Sample => "sample",
            Program::Jaccard => "jaccard",
        }
    }

    /// Whether this tool aggregates value columns over interval groups.
    pub fn has_column_ops(self) -> bool {
        matches!(self, Program::Map | Program::Merge)
    }

    /// Query-vs-database tool shapes treat file 0 as the query and the rest
    /// as databases; symmetric shapes treat all files alike.
    pub fn is_query_database(self) -> bool {
        matches!(
            self,
            Program::Intersect
                | Program::Closest
                | Program::Subtract
                | Program::Map
                | Program::Jaccard
        )
    }
}

/// Resolved output format for the run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    /// Textual delimited interval output.
    Delimited,
    /// Binary alignment output.
    Alignment,
}

/// Validation progress. Transitions are never retried; a failed stage is
/// terminal for the run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    Created,
    ArgsParsed,
    FilesOpened,
    OutputResolved,
    ColumnOpsValidated,
    Ready,
}

/// The independent settings block. Flags set most of these; the per-tool
/// overlap and reporting knobs at the bottom are set by the tool layers
/// through the context API rather than by base flags.
#[derive(Debug, Clone)]
pub struct Options {
    pub split: bool,
    pub force_bed_output: bool,
    pub uncompressed_output: bool,
    pub full_detail: bool,
    pub sorted_input: bool,
    pub buffered_output: bool,
    pub io_buf_size: usize,
    pub print_header: bool,
    pub max_records: Option<u64>,
    pub seed: Option<u64>,
    pub sort_output: bool,
    pub name_check_disabled: bool,
    pub show_help: bool,
    pub merged_input: bool,
    pub max_merge_distance: u64,
    pub strand_policy: StrandPolicy,
    pub precision: Option<usize>,

    // per-tool overlap/reporting knobs
    pub any_hit: bool,
    pub no_hit: bool,
    pub write_a: bool,
    pub write_b: bool,
    pub left_join: bool,
    pub write_count: bool,
    pub write_overlap: bool,
    pub write_all_overlap: bool,
    pub overlap_fraction: Option<f64>,
    pub reciprocal: bool,
    pub same_strand: bool,
    pub diff_strand: bool,
    pub report_db_name_tags: bool,
    pub report_db_file_names: bool,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            split: false,
            force_bed_output: false,
            uncompressed_output: false,
            full_detail: false,
            sorted_input: false,
            buffered_output: true,
            io_buf_size: 0,
            print_header: false,
            max_records: None,
            seed: None,
            sort_output: false,
            name_check_disabled: false,
            show_help: false,
            merged_input: false,
            max_merge_distance: 0,
            strand_policy: StrandPolicy::Any,
            precision: None,
            any_hit: false,
            no_hit: false,
            write_a: false,
            write_b: false,
            left_join: false,
            write_count: false,
            write_overlap: false,
            write_all_overlap: false,
            overlap_fraction: None,
            reciprocal: false,
            same_strand: false,
            diff_strand: false,
            report_db_name_tags: false,
            report_db_file_names: false,
        }
    }
}

/// Exclusively-owned aggregate for one process invocation.
pub struct RunContext {
    program: Program,
    // Field order fixes release order: file handles first, then the genome
    // reference, then the column-ops adapter.
    files: Vec<FileHandle>,
    genome: Option<Rc<Genome>>,
    colops: Option<ColumnOps>,

    pub options: Options,
    file_names: Vec<String>,
    tokens: Vec<String>,
    skip_first: usize,
    consumed: Vec<bool>,
    errors: Vec<ContextError>,
    naming: NamingTracker,

    files_opened: bool,
    output_format: Option<OutputFormat>,
    header_source: Option<Option<usize>>,
    query_file_idx: usize,
    db_file_idxs: Vec<usize>,
    state: RunState,
}

impl RunContext {
    /// Build a context for one tool. Capability flags are decided here by
    /// tool identity: column-ops tools start with the adapter allocated.
    pub fn new(program: Program) -> Self {
        let mut colops = program.has_column_ops().then(ColumnOps::new);
        // map aggregates column 5 with mean unless told otherwise
        if program == Program::Map {
            if let Some(ops) = colops.as_mut() {
                ops.set_columns("5");
                ops.set_operations("mean");
            }
        }
        Self {
            program,
            files: Vec::new(),
            genome: None,
            colops,
            options: Options::default(),
            file_names: Vec::new(),
            tokens: Vec::new(),
            skip_first: 0,
            consumed: Vec::new(),
            errors: Vec::new(),
            naming: NamingTracker::new(),
            files_opened: false,
            output_format: None,
            header_source: None,
            query_file_idx: 0,
            db_file_idxs: Vec::new(),
            state: RunState::Created,
        }
    }

    pub fn program(&self) -> Program {
        self.program
    }

    pub fn state(&self) -> RunState {
        self.state
    }

    // ------------------------------------------------------------------
    // Argument dispatch
    // ------------------------------------------------------------------

    /// Scan `tokens[skip_first..]` once, left to right, consuming recognized
    /// flags and applying their effects. Unrecognized tokens are left for a
    /// later dispatch layer; the validation pass flags whatever remains.
    ///
    /// May be called repeatedly over the same token sequence (layered
    /// configuration); already-consumed positions are skipped, so re-running
    /// over a fully consumed sequence is a no-op.
    pub fn parse_cmd_args(&mut self, tokens: &[String], skip_first: usize) -> bool {
        if self.tokens.is_empty() {
            self.tokens = tokens.to_vec();
            self.skip_first = skip_first;
            self.consumed = vec![false; tokens.len().saturating_sub(skip_first)];
        }

        let mut i = self.skip_first;
        while i < self.tokens.len() {
            if self.consumed[i - self.skip_first] {
                i += 1;
                continue;
            }
            let matched = match match_flag(&self.tokens, i) {
                Ok(m) => m,
                Err(e) => {
                    self.errors.push(e);
                    return false;
                }
            };
            match matched {
                Some(m) => {
                    let width = m.width;
                    if let Err(e) = self.apply_arg(m.arg) {
                        self.errors.push(e);
                        return false;
                    }
                    for offset in 0..width {
                        self.consumed[i + offset - self.skip_first] = true;
                    }
                    i += width;
                }
                None => i += 1,
            }
        }

        if self.state == RunState::Created {
            self.state = RunState::ArgsParsed;
        }
        true
    }

    fn apply_arg(&mut self, arg: Arg) -> Result<(), ContextError> {
        match arg {
            Arg::Input(path) => self.file_names.push(path),
            Arg::GenomeFile(path) => {
                let genome = Genome::from_file(&path)?;
                self.genome = Some(Rc::new(genome));
            }
            Arg::Help => self.options.show_help = true,
            Arg::Split => self.options.split = true,
            Arg::ForceBedOutput => self.options.force_bed_output = true,
            Arg::UncompressedOutput => self.options.uncompressed_output = true,
            Arg::FullDetail => self.options.full_detail = true,
            Arg::SortedInput => self.options.sorted_input = true,
            Arg::NoOutputBuffer => self.options.buffered_output = false,
            Arg::IoBufSize(size) => self.options.io_buf_size = size,
            Arg::Precision(prec) => {
                self.require_column_ops("-prec")?;
                self.options.precision = Some(prec);
            }
            Arg::PrintHeader => self.options.print_header = true,
            Arg::MaxRecords(count) => self.options.max_records = Some(count),
            Arg::Seed(seed) => self.options.seed = Some(seed),
            Arg::Operations(spec) => self.column_ops_for("-o")?.set_operations(&spec),
            Arg::Columns(spec) => self.column_ops_for("-c")?.set_columns(&spec),
            Arg::NullValue(value) => self.column_ops_for("-null")?.set_null_value(&value),
            Arg::Delimiter(delim) => self.column_ops_for("-delim")?.set_delimiter(&delim),
            Arg::SortOutput => self.options.sort_output = true,
            Arg::NoNameCheck => {
                self.options.name_check_disabled = true;
                self.naming.set_disabled(true);
            }
        }
        Ok(())
    }

    fn require_column_ops(&self, flag: &str) -> Result<(), ContextError> {
        if self.colops.is_some() {
            Ok(())
        } else {
            Err(ContextError::ColumnOps(format!(
                "can't use {} for tools without column operations",
                flag
            )))
        }
    }

    fn column_ops_for(&mut self, flag: &str) -> Result<&mut ColumnOps, ContextError> {
        self.colops.as_mut().ok_or_else(|| {
            ContextError::ColumnOps(format!(
                "can't use {} for tools without column operations",
                flag
            ))
        })
    }

    /// Flag every post-skip token that survived all dispatch layers without
    /// being consumed. Collects all of them, not just the first, so the user
    /// gets one complete report.
    pub fn cmd_args_valid(&mut self) -> bool {
        let mut valid = true;
        for i in self.skip_first..self.tokens.len() {
            if !self.consumed[i - self.skip_first] {
                self.errors
                    .push(ContextError::UnrecognizedFlag(self.tokens[i].clone()));
                valid = false;
            }
        }
        valid
    }

    // ------------------------------------------------------------------
    // File opening
    // ------------------------------------------------------------------

    /// Open every declared input file, in declaration order. Runs at most
    /// once; repeat calls are no-ops. The first open failure aborts, with
    /// handles opened so far remaining owned by the context for cleanup.
    pub fn open_files(&mut self) -> bool {
        if self.files_opened {
            return true;
        }
        if self.file_names.is_empty() {
            self.errors.push(ContextError::MissingInput);
            return false;
        }

        // Column aggregation may need fields normally dropped for speed.
        if self.colops.is_some() {
            self.options.full_detail = true;
        }

        let settings = OpenSettings {
            merged_input: self.options.merged_input,
            max_merge_distance: self.options.max_merge_distance,
            strand_policy: self.options.strand_policy,
            full_detail: self.options.full_detail,
            assume_sorted: self.options.sorted_input,
            io_buf_size: self.options.io_buf_size,
            genome: self.genome.clone(),
        };

        for i in 0..self.file_names.len() {
            let path = self.file_names[i].clone();
            match open_record_file(&path, i, &settings) {
                Ok(handle) => self.files.push(handle),
                Err(e) => {
                    self.errors.push(e);
                    return false;
                }
            }
        }

        self.query_file_idx = 0;
        self.db_file_idxs = if self.program.is_query_database() && self.files.len() > 1 {
            (1..self.files.len()).collect()
        } else {
            Vec::new()
        };

        self.files_opened = true;
        self.state = RunState::FilesOpened;
        true
    }

    // ------------------------------------------------------------------
    // Output resolution
    // ------------------------------------------------------------------

    /// Resolve the output format once; repeat calls return the cached
    /// decision. Must follow `open_files` since it inspects file 0's format.
    pub fn determine_output_type(&mut self) -> bool {
        if self.output_format.is_some() {
            return true;
        }
        if self.options.force_bed_output {
            self.output_format = Some(OutputFormat::Delimited);
            return true;
        }
        let first = match self.files.first() {
            Some(f) => f,
            None => {
                self.errors.push(ContextError::MissingInput);
                return false;
            }
        };
        self.output_format = Some(match first.format() {
            FileFormat::Alignment => OutputFormat::Alignment,
            FileFormat::Delimited => OutputFormat::Delimited,
        });
        true
    }

    pub fn output_format(&self) -> Option<OutputFormat> {
        self.output_format
    }

    /// Which opened file supplies the canonical header and reference metadata
    /// for binary output. Memoized once files are open; before `open_files`
    /// completes this returns `None` without caching, so the decision cannot
    /// latch on unopened files. Query-vs-database shapes prefer the query
    /// file when it is binary, else the first database file; symmetric shapes
    /// use file 0 when it is binary; otherwise `None` (textual output needs
    /// no header propagation).
    pub fn header_source_index(&mut self) -> Option<usize> {
        if let Some(resolved) = self.header_source {
            return resolved;
        }
        if !self.files_opened {
            return None;
        }
        let resolved = if self.program.is_query_database() && !self.db_file_idxs.is_empty() {
            if self.files[self.query_file_idx].format() == FileFormat::Alignment {
                Some(self.query_file_idx)
            } else {
                Some(self.db_file_idxs[0])
            }
        } else {
            match self.files.first() {
                Some(f) if f.format() == FileFormat::Alignment => Some(0),
                _ => None,
            }
        };
        self.header_source = Some(resolved);
        resolved
    }

    // ------------------------------------------------------------------
    // Validation orchestration
    // ------------------------------------------------------------------

    /// Run the full validation sequence: open files, check for leftover
    /// tokens, resolve the output format, and validate column-ops against
    /// each database file. The first failing stage aborts; failure is fatal
    /// to the run and nothing is rolled back.
    pub fn is_valid_state(&mut self) -> bool {
        if !self.open_files() {
            return false;
        }
        if !self.cmd_args_valid() {
            return false;
        }
        if !self.determine_output_type() {
            return false;
        }
        self.state = RunState::OutputResolved;

        if let Some(colops) = self.colops.as_mut() {
            let db_idxs: Vec<usize> = if self.db_file_idxs.is_empty() {
                vec![0]
            } else {
                self.db_file_idxs.clone()
            };
            for idx in db_idxs {
                let schema = match self.files[idx].schema_field_count() {
                    Some(fields) => fields,
                    None => {
                        self.errors.push(ContextError::ColumnOps(format!(
                            "database file {} has no records to validate columns against",
                            self.files[idx].path()
                        )));
                        return false;
                    }
                };
                if let Err(e) = colops.validate_against_schema(schema) {
                    self.errors.push(e);
                    return false;
                }
            }
            if let Some(prec) = self.options.precision {
                colops.set_precision(prec);
            }
            self.state = RunState::ColumnOpsValidated;
        }

        self.state = RunState::Ready;
        true
    }

    // ------------------------------------------------------------------
    // Errors
    // ------------------------------------------------------------------

    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }

    pub fn errors(&self) -> &[ContextError] {
        &self.errors
    }

    /// Render all accumulated errors as one report for the caller to print
    /// before terminating with a non-zero status.
    pub fn error_report(&self) -> String {
        self.errors
            .iter()
            .map(|e| format!("***** ERROR: {} *****", e))
            .collect::<Vec<_>>()
            .join("\n")
    }

    // ------------------------------------------------------------------
    // Files, genome, naming, column ops
    // ------------------------------------------------------------------

    pub fn file_names(&self) -> &[String] {
        &self.file_names
    }

    pub fn add_input_file(&mut self, path: impl Into<String>) {
        self.file_names.push(path.into());
    }

    pub fn files(&mut self) -> &mut [FileHandle] {
        &mut self.files
    }

    pub fn file(&self, idx: usize) -> Option<&FileHandle> {
        self.files.get(idx)
    }

    pub fn file_count(&self) -> usize {
        self.files.len()
    }

    pub fn genome(&self) -> Option<&Rc<Genome>> {
        self.genome.as_ref()
    }

    pub fn query_file_idx(&self) -> usize {
        self.query_file_idx
    }

    pub fn db_file_idxs(&self) -> &[usize] {
        &self.db_file_idxs
    }

    /// Feed one record through the naming-convention tracker.
    pub fn test_name_conventions(&mut self, record: &Record) {
        let file_name = self
            .file_names
            .get(record.file_idx)
            .map(|s| s.as_str())
            .unwrap_or("<unknown>");
        self.naming.test_name_conventions(record, file_name);
    }

    pub fn naming(&self) -> &NamingTracker {
        &self.naming
    }

    /// Whether the column-ops capability is on. The capability is the
    /// adapter: it can never be on with no adapter present.
    pub fn has_column_ops(&self) -> bool {
        self.colops.is_some()
    }

    /// Turn the column-ops capability on, allocating the adapter if absent.
    pub fn enable_column_ops(&mut self) {
        if self.colops.is_none() {
            self.colops = Some(ColumnOps::new());
        }
    }

    /// Turn the capability off, dropping the adapter and its configuration.
    pub fn disable_column_ops(&mut self) {
        self.colops = None;
    }

    pub fn column_ops(&self) -> Option<&ColumnOps> {
        self.colops.as_ref()
    }

    pub fn column_ops_mut(&mut self) -> Option<&mut ColumnOps> {
        self.colops.as_mut()
    }

    // ------------------------------------------------------------------
    // Seeding
    // ------------------------------------------------------------------

    /// The run's randomness seed: the `-seed` value if one was given,
    /// otherwise derived once from wall-clock time and the process id.
    pub fn seed(&mut self) -> u64 {
        if let Some(seed) = self.options.seed {
            return seed;
        }
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or(0);
        let seed = now.wrapping_add(u64::from(process::id()));
        self.options.seed = Some(seed);
        seed
    }

    pub fn rng(&mut self) -> SmallRng {
        SmallRng::seed_from_u64(self.seed())
    }

    // ------------------------------------------------------------------
    // Teardown
    // ------------------------------------------------------------------

    /// Guaranteed-run finalizer: re-emit a latched naming warning so it is
    /// not lost amid bulk output. Safe to call once; `Drop` covers callers
    /// that never reach it.
    pub fn finish(&mut self) {
        if let Some(warning) = self.naming.take_warning() {
            eprintln!("{}", warning);
        }
    }
}

impl Drop for RunContext {
    fn drop(&mut self) {
        // Handles, genome, and adapter release in field declaration order.
        self.finish();
    }
}
