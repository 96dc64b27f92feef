//! Column-aggregation configuration and schema validation.
//!
//! Tools that aggregate value columns across overlapping-interval groups
//! (map, merge) own one adapter carrying the target columns, the operations
//! to apply, the placeholder for empty groups, the delimiter for collapsed
//! lists, and the numeric output precision. The aggregation math itself is an
//! external collaborator; this module validates the configuration against the
//! resolved database file schema and hands over a resolved plan.

use std::str::FromStr;

use crate::error::{ContextError, Result};

/// Aggregation operations applied to a value column per group.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AggOp {
    Sum,
    Mean,
    Median,
    Min,
    Max,
    Count,
    Distinct,
    Collapse,
    First,
    Last,
}

impl FromStr for AggOp {
    type Err = ContextError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "sum" => Ok(AggOp::Sum),
            "mean" => Ok(AggOp::Mean),
            "median" => Ok(AggOp::Median),
            "min" => Ok(AggOp::Min),
            "max" => Ok(AggOp::Max),
            "count" => Ok(AggOp::Count),
            "distinct" => Ok(AggOp::Distinct),
            "collapse" => Ok(AggOp::Collapse),
            "first" => Ok(AggOp::First),
            "last" => Ok(AggOp::Last),
            other => Err(ContextError::ColumnOps(format!(
                "unknown operation '{}'",
                other
            ))),
        }
    }
}

/// Default decimal precision for aggregated numeric output.
pub const DEFAULT_PRECISION: usize = 5;

/// Column-aggregation adapter owned by column-ops-capable run contexts.
///
/// Columns and operations stay unset until the tool layer or the user
/// configures them; validation of an unconfigured adapter is trivially
/// successful (the tool simply aggregates nothing).
#[derive(Debug, Clone)]
pub struct ColumnOps {
    columns_spec: Option<String>,
    ops_spec: Option<String>,
    null_value: String,
    delimiter: String,
    precision: usize,
    plan: Vec<(usize, AggOp)>,
}

impl Default for ColumnOps {
    fn default() -> Self {
        Self::new()
    }
}

impl ColumnOps {
    pub fn new() -> Self {
        Self {
            columns_spec: None,
            ops_spec: None,
            null_value: ".".to_string(),
            delimiter: ",".to_string(),
            precision: DEFAULT_PRECISION,
            plan: Vec::new(),
        }
    }

    /// Raw `-c` value: comma-separated 1-based column indices.
    pub fn set_columns(&mut self, spec: &str) {
        self.columns_spec = Some(spec.to_string());
    }

    /// Raw `-o` value: comma-separated operation names.
    pub fn set_operations(&mut self, spec: &str) {
        self.ops_spec = Some(spec.to_string());
    }

    /// Placeholder emitted for groups with no overlaps (`-null`).
    pub fn set_null_value(&mut self, value: &str) {
        self.null_value = value.to_string();
    }

    pub fn null_value(&self) -> &str {
        &self.null_value
    }

    /// Delimiter between items of a collapsed value list (`-delim`).
    pub fn set_delimiter(&mut self, delim: &str) {
        self.delimiter = delim.to_string();
    }

    pub fn delimiter(&self) -> &str {
        &self.delimiter
    }

    pub fn set_precision(&mut self, precision: usize) {
        self.precision = precision;
    }

    pub fn precision(&self) -> usize {
        self.precision
    }

    /// Validate the configured columns and operations against a database
    /// file's column count, resolving the (column, operation) plan.
    ///
    /// A single operation broadcasts across many columns and a single column
    /// across many operations; otherwise the lists must pair up one-to-one.
    pub fn validate_against_schema(&mut self, schema_fields: usize) -> Result<()> {
        match (&self.columns_spec, &self.ops_spec) {
            (None, None) => {
                self.plan.clear();
                return Ok(());
            }
            (Some(_), None) => {
                return Err(ContextError::ColumnOps(
                    "-c given without -o (operations)".to_string(),
                ))
            }
            (None, Some(_)) => {
                return Err(ContextError::ColumnOps(
                    "-o given without -c (columns)".to_string(),
                ))
            }
            (Some(_), Some(_)) => {}
        }
        let columns = self.parse_columns(schema_fields)?;
        let ops = self.parse_ops()?;

        self.plan = if ops.len() == 1 {
            columns.iter().map(|&c| (c, ops[0])).collect()
        } else if columns.len() == 1 {
            ops.iter().map(|&op| (columns[0], op)).collect()
        } else if columns.len() == ops.len() {
            columns.into_iter().zip(ops).collect()
        } else {
            return Err(ContextError::ColumnOps(format!(
                "{} columns given for {} operations; counts must match unless one side is single",
                columns.len(),
                ops.len()
            )));
        };
        Ok(())
    }

    /// The resolved (column, operation) pairs. Empty until validated.
    pub fn plan(&self) -> &[(usize, AggOp)] {
        &self.plan
    }

    fn parse_columns(&self, schema_fields: usize) -> Result<Vec<usize>> {
        let spec = self.columns_spec.as_deref().unwrap_or_default();
        let mut columns = Vec::new();
        for part in spec.split(',') {
            let col: usize = part.trim().parse().map_err(|_| {
                ContextError::ColumnOps(format!("invalid column index '{}'", part))
            })?;
            if col < 1 {
                return Err(ContextError::ColumnOps(
                    "column indices are 1-based".to_string(),
                ));
            }
            if col > schema_fields {
                return Err(ContextError::ColumnOps(format!(
                    "column {} requested but database file has only {} columns",
                    col, schema_fields
                )));
            }
            columns.push(col);
        }
        Ok(columns)
    }

    fn parse_ops(&self) -> Result<Vec<AggOp>> {
        self.ops_spec
            .as_deref()
            .unwrap_or_default()
            .split(',')
            .map(|part| part.trim().parse())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let ops = ColumnOps::new();
        assert_eq!(ops.null_value(), ".");
        assert_eq!(ops.delimiter(), ",");
        assert_eq!(ops.precision(), DEFAULT_PRECISION);
    }

    #[test]
    fn test_unconfigured_adapter_validates_trivially() {
        let mut ops = ColumnOps::new();
        ops.validate_against_schema(3).unwrap();
        assert!(ops.plan().is_empty());
    }

    #[test]
    fn test_columns_and_operations_must_pair() {
        let mut ops = ColumnOps::new();
        ops.set_columns("5");
        assert!(ops.validate_against_schema(6).is_err());

        let mut ops = ColumnOps::new();
        ops.set_operations("sum");
        assert!(ops.validate_against_schema(6).is_err());
    }

    #[test]
    fn test_broadcast_single_op() {
        let mut ops = ColumnOps::new();
        ops.set_columns("4,5,6");
        ops.set_operations("sum");
        ops.validate_against_schema(6).unwrap();
        assert_eq!(
            ops.plan(),
            [(4, AggOp::Sum), (5, AggOp::Sum), (6, AggOp::Sum)]
        );
    }

    #[test]
    fn test_broadcast_single_column() {
        let mut ops = ColumnOps::new();
        ops.set_columns("5");
        ops.set_operations("min,max,mean");
        ops.validate_against_schema(6).unwrap();
        assert_eq!(
            ops.plan(),
            [(5, AggOp::Min), (5, AggOp::Max), (5, AggOp::Mean)]
        );
    }

    #[test]
    fn test_paired_lists() {
        let mut ops = ColumnOps::new();
        ops.set_columns("4,5");
        ops.set_operations("collapse,sum");
        ops.validate_against_schema(6).unwrap();
        assert_eq!(ops.plan(), [(4, AggOp::Collapse), (5, AggOp::Sum)]);
    }

    #[test]
    fn test_mismatched_lists() {
        let mut ops = ColumnOps::new();
        ops.set_columns("4,5,6");
        ops.set_operations("sum,mean");
        assert!(ops.validate_against_schema(6).is_err());
    }

    #[test]
    fn test_column_out_of_range() {
        let mut ops = ColumnOps::new();
        ops.set_columns("7");
        ops.set_operations("sum");
        let err = ops.validate_against_schema(6).unwrap_err();
        assert!(err.to_string().contains("only 6 columns"));
    }

    #[test]
    fn test_unknown_operation() {
        let mut ops = ColumnOps::new();
        ops.set_columns("5");
        ops.set_operations("variance");
        let err = ops.validate_against_schema(6).unwrap_err();
        assert!(err.to_string().contains("variance"));
    }

    #[test]
    fn test_zero_column_rejected() {
        let mut ops = ColumnOps::new();
        ops.set_columns("0");
        ops.set_operations("sum");
        assert!(ops.validate_against_schema(6).is_err());
    }
}
