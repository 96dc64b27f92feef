//! Chromosome naming-convention consistency tracking.
//!
//! Mixing naming conventions across input files ("chr1" in one file, "1" in
//! another, or "chr01" against "chr1") silently produces empty results from
//! interval tools, so the per-record loop feeds every record through this
//! tracker. Two conventions are checked independently: presence of the `chr`
//! prefix, and a leading zero in the numeric suffix. The first disagreement
//! against the established cross-file baseline raises one warning for the
//! whole run; the warning is printed immediately and re-emitted at teardown
//! so it is not lost amid bulk output.

use rustc_hash::FxHashMap;

use crate::record::Record;

/// Three-valued observation state for one convention.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TriState {
    #[default]
    Untested,
    Yes,
    No,
}

impl TriState {
    fn from_bool(v: bool) -> Self {
        if v {
            TriState::Yes
        } else {
            TriState::No
        }
    }

    /// True when this state is set and contradicts the observation.
    fn conflicts(self, observed: bool) -> bool {
        matches!(
            (self, observed),
            (TriState::Yes, false) | (TriState::No, true)
        )
    }
}

/// Per-file and aggregate naming-convention state with a latched warning.
#[derive(Debug, Default)]
pub struct NamingTracker {
    disabled: bool,
    file_has_prefix: FxHashMap<usize, TriState>,
    file_has_leading_zero: FxHashMap<usize, TriState>,
    all_have_prefix: TriState,
    all_have_leading_zero: TriState,
    warning: Option<String>,
}

impl NamingTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Disable all checks (`-nonamecheck`).
    pub fn set_disabled(&mut self, disabled: bool) {
        self.disabled = disabled;
    }

    pub fn is_disabled(&self) -> bool {
        self.disabled
    }

    /// Check one record against the established conventions.
    ///
    /// No-op once disabled or after the warning has latched. Each per-file
    /// and aggregate tri-state is set exactly once, from the first record
    /// observed for it. Only disagreement with an already-set aggregate
    /// raises the warning; per-file baseline drift is recorded but silent
    /// (callers wanting a stricter policy can query the per-file states).
    pub fn test_name_conventions(&mut self, record: &Record, file_name: &str) {
        if self.disabled || self.warning.is_some() {
            return;
        }

        let has_prefix = record.has_chrom_prefix();
        self.file_has_prefix
            .entry(record.file_idx)
            .or_insert_with(|| TriState::from_bool(has_prefix));

        if self.all_have_prefix.conflicts(has_prefix) {
            self.trip_warning(
                record,
                file_name,
                "has a record where naming convention is inconsistent with other files:",
            );
            return;
        }
        if self.all_have_prefix == TriState::Untested {
            self.all_have_prefix = TriState::from_bool(has_prefix);
        }

        let has_zero = record.has_leading_zero(has_prefix);
        self.file_has_leading_zero
            .entry(record.file_idx)
            .or_insert_with(|| TriState::from_bool(has_zero));

        if self.all_have_leading_zero.conflicts(has_zero) {
            self.trip_warning(
                record,
                file_name,
                "has a record where naming convention (leading zero) is inconsistent with other files:",
            );
            return;
        }
        if self.all_have_leading_zero == TriState::Untested {
            self.all_have_leading_zero = TriState::from_bool(has_zero);
        }
    }

    fn trip_warning(&mut self, record: &Record, file_name: &str, message: &str) {
        let msg = format!("***** WARNING: File {} {}\n{}", file_name, message, record);
        eprintln!("{}", msg);
        self.warning = Some(msg);
    }

    /// The latched warning, if one was raised.
    pub fn warning(&self) -> Option<&str> {
        self.warning.as_deref()
    }

    /// Remove and return the latched warning so the finalizer can re-emit it
    /// exactly once.
    pub fn take_warning(&mut self) -> Option<String> {
        self.warning.take()
    }

    /// Prefix-convention state observed for one file.
    pub fn file_prefix_state(&self, file_idx: usize) -> TriState {
        self.file_has_prefix
            .get(&file_idx)
            .copied()
            .unwrap_or_default()
    }

    /// Leading-zero-convention state observed for one file.
    pub fn file_leading_zero_state(&self, file_idx: usize) -> TriState {
        self.file_has_leading_zero
            .get(&file_idx)
            .copied()
            .unwrap_or_default()
    }

    pub fn aggregate_prefix_state(&self) -> TriState {
        self.all_have_prefix
    }

    pub fn aggregate_leading_zero_state(&self) -> TriState {
        self.all_have_leading_zero
    }
}
