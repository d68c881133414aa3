//! The report-assembler boundary: top-level evaluation, custom-expression
//! gating, and per-column fault isolation.
//!
//! A hard resolution error aborts only the column it occurred in; the rest
//! of the report still builds. Soft degradations (unresolved registry names)
//! appear as zeros with no diagnostic, which is the designed rendering of
//! "formula not yet available" as opposed to "formula is broken".

use serde::{Deserialize, Serialize};
use spotred_model::{EvalMatrix, SpotRecord};

use crate::context::{EvaluationContext, NamedExpression};
use crate::error::EvalError;
use crate::parallel;
use crate::tree::{Evaluation, ExpressionNode};

/// Which spot collection a report draws from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReportKind {
    ReferenceMaterial,
    Unknown,
}

/// One evaluated report column. `rows` is `None` exactly when a hard
/// resolution error aborted this column; the diagnostic then names it.
#[derive(Debug, Clone, PartialEq)]
pub struct ReportColumn {
    pub name: String,
    pub labels: Vec<String>,
    pub rows: Option<EvalMatrix>,
    pub diagnostic: Option<String>,
}

/// Evaluates `tree` over `records` within `ctx`.
///
/// Per-spot trees yield `records.len()` rows in record order; summary trees
/// yield one row. With the `parallel` feature, record batches evaluate on
/// the crate-local pool when the tree's shape permits it.
pub fn evaluate(
    tree: &ExpressionNode,
    records: &[SpotRecord],
    ctx: &EvaluationContext,
) -> Result<Evaluation, EvalError> {
    parallel::eval_record_batches(tree, records, ctx)
}

/// Renders `tree` to mathematical markup, independent of evaluation.
#[must_use]
pub fn render_markup(tree: &ExpressionNode) -> String {
    crate::display::render_markup(tree)
}

/// Whether a custom expression contributes a per-spot column to the given
/// report: the matching sample switch must be set, the expression must not
/// be summary-switched, and bare constants or literal-value trees are
/// excluded (they have no per-spot variation worth reporting).
#[must_use]
pub fn included_in_report(expr: &NamedExpression, kind: ReportKind) -> bool {
    let switches = expr.switches();
    if switches.summary {
        return false;
    }
    let literal = match expr.tree() {
        ExpressionNode::Constant(_) => true,
        ExpressionNode::Operation(o) => o.op().is_literal_value(),
        ExpressionNode::Variable(_) => false,
    };
    if literal {
        return false;
    }
    match kind {
        ReportKind::ReferenceMaterial => switches.reference_material,
        ReportKind::Unknown => switches.unknown,
    }
}

/// Evaluates every gated custom expression against the chosen spot
/// collection, one column each, isolating hard failures per column.
///
/// Columns are ordered by expression name; registry iteration order carries
/// no meaning.
#[must_use]
pub fn assemble_columns(ctx: &EvaluationContext, kind: ReportKind) -> Vec<ReportColumn> {
    let records = match kind {
        ReportKind::ReferenceMaterial => ctx.reference_material_spots(),
        ReportKind::Unknown => ctx.unknown_spots(),
    };

    let mut included: Vec<_> = ctx
        .registry()
        .iter()
        .filter(|expr| included_in_report(expr, kind))
        .collect();
    included.sort_by(|a, b| a.name().cmp(b.name()));

    included
        .into_iter()
        .map(|expr| {
            let labels = expr.tree().output_shape().labels;
            match evaluate(expr.tree(), records, ctx) {
                Ok(evaluation) => ReportColumn {
                    name: expr.name().to_string(),
                    labels,
                    rows: Some(evaluation.rows),
                    diagnostic: None,
                },
                Err(err) => ReportColumn {
                    name: expr.name().to_string(),
                    labels,
                    rows: None,
                    diagnostic: Some(err.to_string()),
                },
            }
        })
        .collect()
}
