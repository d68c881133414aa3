//! The operation contract and shared evaluation helpers.
//!
//! Built-ins live in dedicated modules to avoid merge conflicts as the
//! catalog grows: arithmetic/grouping in [`builtins_math`], summary
//! statistics in [`builtins_statistical`].

use std::fmt;

use spotred_model::{EvalMatrix, SpotRecord, SpotRow};

use crate::context::EvaluationContext;
use crate::error::EvalError;
use crate::tree::{Evaluation, ExpressionNode};

pub mod builtins_math;
pub mod builtins_statistical;

/// A named transformation over child trees, a record sequence, and a
/// context.
///
/// Implementations must be pure: no mutation of children, records, or the
/// registry is observable outside the returned result. Any internal fault
/// while combining children (missing component, non-finite arithmetic)
/// degrades to `0.0`; only the hard variable-resolution error of a child may
/// propagate out of `eval`.
pub trait Operation: fmt::Debug + Send + Sync {
    fn name(&self) -> &'static str;

    /// Exact child count. Trees with a different count are rejected at
    /// construction, never at evaluation.
    fn arity(&self) -> usize;

    /// Decides whether a rendered child needs explicit grouping.
    fn precedence(&self) -> u8;

    /// One label per output column.
    fn output_labels(&self) -> &'static [&'static str];

    /// True for operations producing a single aggregate row regardless of
    /// record count.
    fn is_summary(&self) -> bool {
        false
    }

    /// True for the pass-through marker that report gating treats as a bare
    /// literal value.
    fn is_literal_value(&self) -> bool {
        false
    }

    fn eval(
        &self,
        children: &[ExpressionNode],
        records: &[SpotRecord],
        ctx: &EvaluationContext,
    ) -> Result<Evaluation, EvalError>;

    /// Structured mathematical markup built purely from the children's own
    /// renderings; no evaluation happens here.
    fn render_markup(&self, children: &[ExpressionNode]) -> String;
}

/// The scalar a child contributes for record `record_index`: column 0 of the
/// matching row, broadcasting single-row (summary/constant) results across
/// all records. Missing or non-finite components degrade to `0.0`.
pub(crate) fn scalar_for_record(child: &Evaluation, record_index: usize) -> f64 {
    let row = if child.rows.row_count() == 1 {
        0
    } else {
        record_index
    };
    child
        .rows
        .value_at(row, 0)
        .filter(|v| v.is_finite())
        .unwrap_or(0.0)
}

/// Per-spot combination of two children through `f`, one output row per
/// record. Non-finite results are replaced with `0.0`.
pub(crate) fn eval_binary_per_spot(
    children: &[ExpressionNode],
    records: &[SpotRecord],
    ctx: &EvaluationContext,
    f: impl Fn(f64, f64) -> f64,
) -> Result<Evaluation, EvalError> {
    let left = children[0].eval(records, ctx)?;
    let right = children[1].eval(records, ctx)?;
    let rows = (0..records.len())
        .map(|i| {
            let value = f(scalar_for_record(&left, i), scalar_for_record(&right, i));
            let value = if value.is_finite() { value } else { 0.0 };
            SpotRow::from_slice(&[value])
        })
        .collect();
    Ok(Evaluation {
        rows: EvalMatrix::from_rows(rows),
        healthy: left.healthy && right.healthy,
    })
}

/// Per-spot transformation of a single child through `f`.
pub(crate) fn eval_unary_per_spot(
    children: &[ExpressionNode],
    records: &[SpotRecord],
    ctx: &EvaluationContext,
    f: impl Fn(f64) -> f64,
) -> Result<Evaluation, EvalError> {
    let child = children[0].eval(records, ctx)?;
    let rows = (0..records.len())
        .map(|i| {
            let value = f(scalar_for_record(&child, i));
            let value = if value.is_finite() { value } else { 0.0 };
            SpotRow::from_slice(&[value])
        })
        .collect();
    Ok(Evaluation {
        rows: EvalMatrix::from_rows(rows),
        healthy: child.healthy,
    })
}
