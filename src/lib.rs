// Clippy allows for the whole crate
#![allow(clippy::too_many_arguments)]
#![allow(clippy::should_implement_trait)]

//! RIVET: Run-context engine for genomic interval tools
//!
//! This library is the argument-dispatch and run-context substrate shared by
//! a family of genomic-interval command-line tools (intersect, closest,
//! merge, subtract, map, sample, jaccard). It turns raw command tokens into
//! a validated run configuration, opens and classifies input files, resolves
//! the output format, and tracks chromosome naming-convention drift across
//! files.
//!
//! # Example
//!
//! ```rust,no_run
//! use rivet_genomics::context::{Program, RunContext};
//!
//! let tokens: Vec<String> = std::env::args().collect();
//! let mut ctx = RunContext::new(Program::Intersect);
//! if !ctx.parse_cmd_args(&tokens, 1) || !ctx.is_valid_state() {
//!     eprintln!("{}", ctx.error_report());
//!     std::process::exit(1);
//! }
//! // ctx is READY: the per-record loop takes over from here
//! ```

pub mod colops;
pub mod context;
pub mod dispatch;
pub mod error;
pub mod files;
pub mod genome;
pub mod naming;
pub mod record;

// Re-export commonly used types
pub use context::{OutputFormat, Program, RunContext, RunState};
pub use error::ContextError;
pub use files::{FileFormat, FileHandle};
pub use record::Record;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Prelude module for convenient imports.
pub mod prelude {
    pub use crate::colops::{AggOp, ColumnOps};
    pub use crate::context::{Options, OutputFormat, Program, RunContext, RunState};
    pub use crate::error::ContextError;
    pub use crate::files::{FileFormat, FileHandle, StrandPolicy};
    pub use crate::genome::Genome;
    pub use crate::naming::{NamingTracker, TriState};
    pub use crate::record::Record;
}
