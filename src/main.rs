// Clippy allows
#![allow(clippy::too_many_arguments)]

//! RIVET: run-context engine for genomic interval tools
//!
//! Usage: rivet <TOOL> [OPTIONS], or invoke through a tool-named symlink
//! (intersect, closest, merge, subtract, map, sample, jaccard).
//!
//! The binary builds and validates the run context, then streams textual
//! records through the naming-convention tracker to stdout. The per-record
//! interval algorithms live in the tool crates layered on top of this one.

use std::env;
use std::io::{self, BufWriter, Write};
use std::path::Path;
use std::process;

use rivet_genomics::context::{Program, RunContext};

const USAGE: &str = "\
RIVET: run-context engine for genomic interval tools

Usage: rivet <TOOL> [OPTIONS]
Tools: intersect, closest, merge, subtract, map, sample, jaccard

Common options:
  -i <file>      input file (repeatable)
  -g <file>      genome reference file
  -split         evaluate intervals per sub-segment
  -bed           force textual delimited output
  -ubam          uncompressed binary output
  -fbam          retain full per-record detail on binary input
  -sorted        declare inputs pre-sorted
  -nobuf         disable output buffering
  -iobuf <size>  per-file read buffer size (optional K/M/G suffix)
  -header        propagate the source header
  -n <count>     cap the number of output records
  -seed <n>      fix the randomness seed
  -sortout       sort output records
  -nonamecheck   disable naming-convention checks
  -h, --help     show this help

Column-ops tools (map, merge) additionally accept:
  -c <cols>      column indices to aggregate
  -o <ops>       aggregation operations
  -null <str>    placeholder for empty groups
  -delim <str>   delimiter for collapsed lists
  -prec <n>      numeric output precision";

/// Resolve the tool from the invocation name (symlink style) or the first
/// argument (subcommand style), plus how many leading tokens to skip.
fn resolve_program(args: &[String]) -> Option<(Program, usize)> {
    let invoked = Path::new(&args[0])
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("");
    if let Some(program) = Program::from_name(invoked) {
        return Some((program, 1));
    }
    args.get(1)
        .and_then(|name| Program::from_name(name))
        .map(|program| (program, 2))
}

fn main() {
    let args: Vec<String> = env::args().collect();

    let (program, skip_first) = match resolve_program(&args) {
        Some(resolved) => resolved,
        None => {
            eprintln!("{}", USAGE);
            process::exit(1);
        }
    };

    let mut ctx = RunContext::new(program);
    if !ctx.parse_cmd_args(&args, skip_first) {
        eprintln!("{}", ctx.error_report());
        process::exit(1);
    }
    if ctx.options.show_help {
        println!("{}", USAGE);
        return;
    }
    if !ctx.is_valid_state() {
        eprintln!("{}", ctx.error_report());
        process::exit(1);
    }

    if let Err(message) = stream_records(&mut ctx) {
        eprintln!("***** ERROR: {} *****", message);
        ctx.finish();
        process::exit(1);
    }
    ctx.finish();
}

/// Demo per-record loop: pass textual records through the naming tracker to
/// stdout, honoring the record cap and the buffering toggle.
fn stream_records(ctx: &mut RunContext) -> Result<(), String> {
    let stdout = io::stdout();
    let mut out: Box<dyn Write> = if ctx.options.buffered_output {
        Box::new(BufWriter::new(stdout.lock()))
    } else {
        Box::new(stdout.lock())
    };

    let max_records = ctx.options.max_records.unwrap_or(u64::MAX);
    let mut written: u64 = 0;

    'files: for idx in 0..ctx.file_count() {
        loop {
            if written >= max_records {
                break 'files;
            }
            let record = match ctx.files()[idx].read_record() {
                Ok(Some(record)) => record,
                Ok(None) => break,
                Err(e) => return Err(e.to_string()),
            };
            ctx.test_name_conventions(&record);
            writeln!(out, "{}", record).map_err(|e| e.to_string())?;
            written += 1;
        }
    }

    out.flush().map_err(|e| e.to_string())
}
