//! Summary statistics: operations producing one aggregate row regardless of
//! record count.

use spotred_model::{EvalMatrix, SpotRecord};

use crate::context::EvaluationContext;
use crate::display;
use crate::error::EvalError;
use crate::ops::{scalar_for_record, Operation};
use crate::tree::{Evaluation, ExpressionNode};

fn per_record_scalars(
    children: &[ExpressionNode],
    records: &[SpotRecord],
    ctx: &EvaluationContext,
) -> Result<(Vec<f64>, bool), EvalError> {
    let child = children[0].eval(records, ctx)?;
    let scalars = (0..records.len())
        .map(|i| scalar_for_record(&child, i))
        .collect();
    Ok((scalars, child.healthy))
}

#[derive(Debug, Clone, Copy)]
pub struct Average;

impl Operation for Average {
    fn name(&self) -> &'static str {
        "average"
    }

    fn arity(&self) -> usize {
        1
    }

    fn precedence(&self) -> u8 {
        4
    }

    fn output_labels(&self) -> &'static [&'static str] {
        &["Average"]
    }

    fn is_summary(&self) -> bool {
        true
    }

    fn eval(
        &self,
        children: &[ExpressionNode],
        records: &[SpotRecord],
        ctx: &EvaluationContext,
    ) -> Result<Evaluation, EvalError> {
        let (scalars, healthy) = per_record_scalars(children, records, ctx)?;
        let mean = crate::numeric::divide_zero_guarded(
            scalars.iter().sum::<f64>(),
            scalars.len() as f64,
        );
        Ok(Evaluation {
            rows: EvalMatrix::scalar(mean),
            healthy,
        })
    }

    fn render_markup(&self, children: &[ExpressionNode]) -> String {
        format!(
            "<mrow>\n<mi>average</mi>\n<mo>(</mo>\n{}<mo>)</mo>\n</mrow>\n",
            display::render_markup(&children[0]),
        )
    }
}

#[derive(Debug, Clone, Copy)]
pub struct Total;

impl Operation for Total {
    fn name(&self) -> &'static str {
        "total"
    }

    fn arity(&self) -> usize {
        1
    }

    fn precedence(&self) -> u8 {
        4
    }

    fn output_labels(&self) -> &'static [&'static str] {
        &["Total"]
    }

    fn is_summary(&self) -> bool {
        true
    }

    fn eval(
        &self,
        children: &[ExpressionNode],
        records: &[SpotRecord],
        ctx: &EvaluationContext,
    ) -> Result<Evaluation, EvalError> {
        let (scalars, healthy) = per_record_scalars(children, records, ctx)?;
        let total = scalars.iter().sum::<f64>();
        let total = if total.is_finite() { total } else { 0.0 };
        Ok(Evaluation {
            rows: EvalMatrix::scalar(total),
            healthy,
        })
    }

    fn render_markup(&self, children: &[ExpressionNode]) -> String {
        format!(
            "<mrow>\n<mo>&#x2211;</mo>\n<mo>(</mo>\n{}<mo>)</mo>\n</mrow>\n",
            display::render_markup(&children[0]),
        )
    }
}
