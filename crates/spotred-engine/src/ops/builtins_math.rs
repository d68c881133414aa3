//! Arithmetic and grouping operations.

use spotred_model::{EvalMatrix, SpotRecord};

use crate::context::EvaluationContext;
use crate::display;
use crate::error::EvalError;
use crate::ops::{eval_binary_per_spot, eval_unary_per_spot, Operation};
use crate::tree::{Evaluation, ExpressionNode};

fn render_infix(op: &dyn Operation, symbol: &str, children: &[ExpressionNode]) -> String {
    format!(
        "<mrow>\n{}<mo>{symbol}</mo>\n{}</mrow>\n",
        display::render_child(op.precedence(), &children[0]),
        display::render_child(op.precedence(), &children[1]),
    )
}

fn render_named_unary(label: &str, children: &[ExpressionNode]) -> String {
    format!(
        "<mrow>\n<mi>{label}</mi>\n<mo>(</mo>\n{}<mo>)</mo>\n</mrow>\n",
        display::render_markup(&children[0]),
    )
}

/// Grouping marker: wraps its child in parentheses for display and collapses
/// the child's result to its first scalar for evaluation.
#[derive(Debug, Clone, Copy)]
pub struct Pexp;

impl Operation for Pexp {
    fn name(&self) -> &'static str {
        "fenced expression"
    }

    fn arity(&self) -> usize {
        1
    }

    fn precedence(&self) -> u8 {
        4
    }

    fn output_labels(&self) -> &'static [&'static str] {
        &["Fenced"]
    }

    fn is_summary(&self) -> bool {
        true
    }

    /// Reads only the child's first row, first column. A display/grouping
    /// marker, not a pass-through: a multi-component child result loses its
    /// uncertainty here. Any child failure, the hard resolution error
    /// included, collapses to `0.0`.
    fn eval(
        &self,
        children: &[ExpressionNode],
        records: &[SpotRecord],
        ctx: &EvaluationContext,
    ) -> Result<Evaluation, EvalError> {
        let value = match children[0].eval(records, ctx) {
            Ok(child) => child
                .rows
                .value_at(0, 0)
                .filter(|v| v.is_finite())
                .unwrap_or(0.0),
            Err(_) => 0.0,
        };
        Ok(Evaluation::healthy(EvalMatrix::scalar(value)))
    }

    fn render_markup(&self, children: &[ExpressionNode]) -> String {
        format!(
            "<mrow>\n<mo>(</mo>\n{}<mo>)</mo>\n</mrow>\n",
            display::render_markup(&children[0]),
        )
    }
}

/// Pass-through of the child's rows. Report gating treats a tree rooted here
/// as a bare literal value with no per-spot variation worth a column.
#[derive(Debug, Clone, Copy)]
pub struct ValueOf;

impl Operation for ValueOf {
    fn name(&self) -> &'static str {
        "value"
    }

    fn arity(&self) -> usize {
        1
    }

    fn precedence(&self) -> u8 {
        4
    }

    fn output_labels(&self) -> &'static [&'static str] {
        &["Value"]
    }

    fn is_literal_value(&self) -> bool {
        true
    }

    fn eval(
        &self,
        children: &[ExpressionNode],
        records: &[SpotRecord],
        ctx: &EvaluationContext,
    ) -> Result<Evaluation, EvalError> {
        children[0].eval(records, ctx)
    }

    fn render_markup(&self, children: &[ExpressionNode]) -> String {
        display::render_markup(&children[0])
    }
}

#[derive(Debug, Clone, Copy)]
pub struct Add;

impl Operation for Add {
    fn name(&self) -> &'static str {
        "add"
    }

    fn arity(&self) -> usize {
        2
    }

    fn precedence(&self) -> u8 {
        2
    }

    fn output_labels(&self) -> &'static [&'static str] {
        &["Sum"]
    }

    fn eval(
        &self,
        children: &[ExpressionNode],
        records: &[SpotRecord],
        ctx: &EvaluationContext,
    ) -> Result<Evaluation, EvalError> {
        eval_binary_per_spot(children, records, ctx, |a, b| a + b)
    }

    fn render_markup(&self, children: &[ExpressionNode]) -> String {
        render_infix(self, "+", children)
    }
}

#[derive(Debug, Clone, Copy)]
pub struct Subtract;

impl Operation for Subtract {
    fn name(&self) -> &'static str {
        "subtract"
    }

    fn arity(&self) -> usize {
        2
    }

    fn precedence(&self) -> u8 {
        2
    }

    fn output_labels(&self) -> &'static [&'static str] {
        &["Difference"]
    }

    fn eval(
        &self,
        children: &[ExpressionNode],
        records: &[SpotRecord],
        ctx: &EvaluationContext,
    ) -> Result<Evaluation, EvalError> {
        eval_binary_per_spot(children, records, ctx, |a, b| a - b)
    }

    fn render_markup(&self, children: &[ExpressionNode]) -> String {
        render_infix(self, "-", children)
    }
}

#[derive(Debug, Clone, Copy)]
pub struct Multiply;

impl Operation for Multiply {
    fn name(&self) -> &'static str {
        "multiply"
    }

    fn arity(&self) -> usize {
        2
    }

    fn precedence(&self) -> u8 {
        3
    }

    fn output_labels(&self) -> &'static [&'static str] {
        &["Product"]
    }

    fn eval(
        &self,
        children: &[ExpressionNode],
        records: &[SpotRecord],
        ctx: &EvaluationContext,
    ) -> Result<Evaluation, EvalError> {
        eval_binary_per_spot(children, records, ctx, |a, b| a * b)
    }

    fn render_markup(&self, children: &[ExpressionNode]) -> String {
        render_infix(self, "&#xD7;", children)
    }
}

#[derive(Debug, Clone, Copy)]
pub struct Divide;

impl Operation for Divide {
    fn name(&self) -> &'static str {
        "divide"
    }

    fn arity(&self) -> usize {
        2
    }

    fn precedence(&self) -> u8 {
        3
    }

    fn output_labels(&self) -> &'static [&'static str] {
        &["Quotient"]
    }

    fn eval(
        &self,
        children: &[ExpressionNode],
        records: &[SpotRecord],
        ctx: &EvaluationContext,
    ) -> Result<Evaluation, EvalError> {
        // The non-finite guard in the helper turns division by zero into 0.0.
        eval_binary_per_spot(children, records, ctx, |a, b| a / b)
    }

    fn render_markup(&self, children: &[ExpressionNode]) -> String {
        format!(
            "<mfrac>\n<mrow>\n{}</mrow>\n<mrow>\n{}</mrow>\n</mfrac>\n",
            display::render_markup(&children[0]),
            display::render_markup(&children[1]),
        )
    }
}

#[derive(Debug, Clone, Copy)]
pub struct Pow;

impl Operation for Pow {
    fn name(&self) -> &'static str {
        "pow"
    }

    fn arity(&self) -> usize {
        2
    }

    fn precedence(&self) -> u8 {
        4
    }

    fn output_labels(&self) -> &'static [&'static str] {
        &["Power"]
    }

    fn eval(
        &self,
        children: &[ExpressionNode],
        records: &[SpotRecord],
        ctx: &EvaluationContext,
    ) -> Result<Evaluation, EvalError> {
        eval_binary_per_spot(children, records, ctx, f64::powf)
    }

    fn render_markup(&self, children: &[ExpressionNode]) -> String {
        format!(
            "<msup>\n<mrow>\n{}</mrow>\n<mrow>\n{}</mrow>\n</msup>\n",
            display::render_child(self.precedence(), &children[0]),
            display::render_markup(&children[1]),
        )
    }
}

#[derive(Debug, Clone, Copy)]
pub struct Ln;

impl Operation for Ln {
    fn name(&self) -> &'static str {
        "ln"
    }

    fn arity(&self) -> usize {
        1
    }

    fn precedence(&self) -> u8 {
        4
    }

    fn output_labels(&self) -> &'static [&'static str] {
        &["Ln"]
    }

    fn eval(
        &self,
        children: &[ExpressionNode],
        records: &[SpotRecord],
        ctx: &EvaluationContext,
    ) -> Result<Evaluation, EvalError> {
        eval_unary_per_spot(children, records, ctx, f64::ln)
    }

    fn render_markup(&self, children: &[ExpressionNode]) -> String {
        render_named_unary("ln", children)
    }
}

#[derive(Debug, Clone, Copy)]
pub struct Sqrt;

impl Operation for Sqrt {
    fn name(&self) -> &'static str {
        "sqrt"
    }

    fn arity(&self) -> usize {
        1
    }

    fn precedence(&self) -> u8 {
        4
    }

    fn output_labels(&self) -> &'static [&'static str] {
        &["Sqrt"]
    }

    fn eval(
        &self,
        children: &[ExpressionNode],
        records: &[SpotRecord],
        ctx: &EvaluationContext,
    ) -> Result<Evaluation, EvalError> {
        eval_unary_per_spot(children, records, ctx, f64::sqrt)
    }

    fn render_markup(&self, children: &[ExpressionNode]) -> String {
        format!(
            "<msqrt>\n{}</msqrt>\n",
            display::render_markup(&children[0]),
        )
    }
}

#[derive(Debug, Clone, Copy)]
pub struct Exp;

impl Operation for Exp {
    fn name(&self) -> &'static str {
        "exp"
    }

    fn arity(&self) -> usize {
        1
    }

    fn precedence(&self) -> u8 {
        4
    }

    fn output_labels(&self) -> &'static [&'static str] {
        &["Exp"]
    }

    fn eval(
        &self,
        children: &[ExpressionNode],
        records: &[SpotRecord],
        ctx: &EvaluationContext,
    ) -> Result<Evaluation, EvalError> {
        eval_unary_per_spot(children, records, ctx, f64::exp)
    }

    fn render_markup(&self, children: &[ExpressionNode]) -> String {
        format!(
            "<msup>\n<mi>e</mi>\n<mrow>\n{}</mrow>\n</msup>\n",
            display::render_markup(&children[0]),
        )
    }
}
