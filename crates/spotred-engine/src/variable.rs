//! Variable resolution: named-expression lookup against the registry
//! snapshot plus per-spot (or summary) row retrieval and the
//! uncertainty-directive transformations.
//!
//! An absent or unhealthy registry name is the designed soft degradation:
//! zero-filled rows, `healthy == false`, no error. The only hard failure is
//! a record that cannot structurally satisfy the lookup capability.

use spotred_model::{EvalMatrix, ExpressionLookup, SpotRecord, SpotRow};

use crate::context::EvaluationContext;
use crate::error::EvalError;
use crate::numeric::{divide_zero_guarded, round_to_sig_figs};
use crate::tree::{Evaluation, VariableNode, VariableScope};

/// Width of the degraded row for an unresolved name: value + uncertainty.
const UNRESOLVED_ROW_WIDTH: usize = 2;

pub(crate) fn eval(
    var: &VariableNode,
    records: &[SpotRecord],
    ctx: &EvaluationContext,
) -> Result<Evaluation, EvalError> {
    match var.scope() {
        VariableScope::PerSpot => eval_per_spot(var, records, ctx),
        VariableScope::Summary => Ok(eval_summary(var, ctx)),
    }
}

fn eval_per_spot(
    var: &VariableNode,
    records: &[SpotRecord],
    ctx: &EvaluationContext,
) -> Result<Evaluation, EvalError> {
    let live = !var.name().is_empty()
        && ctx
            .registry()
            .get(var.name())
            .is_some_and(|entry| entry.tree().is_healthy(ctx.registry()));
    if !live {
        return Ok(Evaluation::unhealthy(EvalMatrix::zero_filled(
            records.len(),
            UNRESOLVED_ROW_WIDTH,
        )));
    }

    let digits = ctx.fixed_precision_digits(var.name());
    let mut rows = Vec::with_capacity(records.len());
    for record in records {
        let source =
            record
                .expression_row(var.name())
                .map_err(|source| EvalError::UnresolvedVariable {
                    name: var.name().to_string(),
                    source,
                })?;
        rows.push(postprocess_row(source, var, digits));
    }
    Ok(Evaluation::healthy(EvalMatrix::from_rows(rows)))
}

/// Summary variables resolve against the context's summary table and always
/// yield exactly one row.
fn eval_summary(var: &VariableNode, ctx: &EvaluationContext) -> Evaluation {
    match ctx.summary_evaluation(var.name()) {
        Some(source) if !var.name().is_empty() => {
            let digits = ctx.fixed_precision_digits(var.name());
            Evaluation::healthy(EvalMatrix::single_row(postprocess_row(source, var, digits)))
        }
        _ => Evaluation::unhealthy(EvalMatrix::zero_filled(1, UNRESOLVED_ROW_WIDTH)),
    }
}

/// Applies the uncertainty directive, the fixed-precision rounding, and the
/// index shift to one source row, in that order.
fn postprocess_row(source: &[f64], var: &VariableNode, digits: Option<u32>) -> SpotRow {
    let mut row = SpotRow::from_slice(source);
    if row.len() > 1 {
        if !var.directive().is_empty() {
            // Percent uncertainty, zero-guarded so a zero value yields 0.0
            // rather than a non-finite component. The multiply can still
            // overflow for extreme ratios, so the result is guarded too.
            let percent = (divide_zero_guarded(row[1], row[0]) * 100.0).abs();
            row[1] = if percent.is_finite() { percent } else { 0.0 };
        }
        if let Some(digits) = digits {
            row[1] = round_to_sig_figs(row[1], digits);
        }
        if var.index() > 0 {
            // Expose a later component (e.g. the uncertainty) as the primary
            // output by discarding the leading components.
            let cut = var.index().min(row.len());
            row.drain(..cut);
        }
    } else if !var.directive().is_empty() {
        // No uncertainty exists to report.
        row[0] = 0.0;
    }
    row
}
