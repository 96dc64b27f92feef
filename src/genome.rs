//! Genome reference reader.
//!
//! Parses .genome files (tab-delimited: chrom\tsize). The run context owns
//! the reference and shares it read-only with each opened file handle.

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use rustc_hash::FxHashMap;

use crate::error::ContextError;

/// Chromosome sizes from a genome reference file.
/// Preserves chromosome order from the input file.
#[derive(Debug, Clone, Default)]
pub struct Genome {
    sizes: FxHashMap<String, u64>,
    order: Vec<String>,
}

impl Genome {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load a genome reference from a file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ContextError> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|source| ContextError::FileOpen {
            path: path.display().to_string(),
            source,
        })?;
        let reader = BufReader::new(file);

        let mut genome = Genome::new();
        for (line_num, line_result) in reader.lines().enumerate() {
            let line = line_result.map_err(|source| ContextError::FileOpen {
                path: path.display().to_string(),
                source,
            })?;
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }

            let mut fields = line.split('\t');
            let chrom = fields.next().unwrap_or_default();
            let size_str = fields.next().ok_or_else(|| {
                ContextError::MalformedValue(format!(
                    "genome file line {}: expected two columns, chrom and size",
                    line_num + 1
                ))
            })?;
            let size: u64 = size_str.parse().map_err(|_| {
                ContextError::MalformedValue(format!(
                    "genome file line {}: invalid chromosome size '{}'",
                    line_num + 1,
                    size_str
                ))
            })?;

            genome.insert(chrom.to_string(), size);
        }

        Ok(genome)
    }

    /// Insert a chromosome size (appends to order if new).
    pub fn insert(&mut self, chrom: String, size: u64) {
        if !self.sizes.contains_key(&chrom) {
            self.order.push(chrom.clone());
        }
        self.sizes.insert(chrom, size);
    }

    #[inline]
    pub fn chrom_size(&self, chrom: &str) -> Option<u64> {
        self.sizes.get(chrom).copied()
    }

    #[inline]
    pub fn has_chrom(&self, chrom: &str) -> bool {
        self.sizes.contains_key(chrom)
    }

    /// Chromosome names in input-file order.
    pub fn chromosomes(&self) -> impl Iterator<Item = &String> {
        self.order.iter()
    }

    pub fn len(&self) -> usize {
        self.sizes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sizes.is_empty()
    }
}
