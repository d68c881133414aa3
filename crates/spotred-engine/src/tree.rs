//! The expression tree: constants, variables, and operation nodes, plus the
//! evaluation result shape shared by all of them.
//!
//! Trees are immutable once built. Arity is validated at construction, so a
//! malformed tree never reaches `eval`; health ("does everything this tree
//! references exist in the registry?") is derived fresh on every call and
//! returned as part of the [`Evaluation`], never stored on a node.

use std::collections::HashSet;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use spotred_model::{EvalMatrix, SpotRecord};

use crate::context::{EvaluationContext, RegistrySnapshot};
use crate::error::{EvalError, TreeError};
use crate::ops::Operation;
use crate::variable;

/// Whether a variable's output should be expressed as percent uncertainty.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum UncertaintyDirective {
    #[default]
    Empty,
    Percent,
}

impl UncertaintyDirective {
    #[must_use]
    pub fn is_empty(self) -> bool {
        self == UncertaintyDirective::Empty
    }
}

/// Where a variable resolves: one row per spot, or one task-wide summary row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum VariableScope {
    PerSpot,
    Summary,
}

/// Declared output row count of a node, used for display metadata.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RowCount {
    /// One row per input record, in record order.
    PerRecord,
    Fixed(usize),
}

/// Declared output metadata. Display-only; per-spot results are free to
/// produce rows of varying width at evaluation time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutputShape {
    pub row_count: RowCount,
    pub col_count: usize,
    pub labels: Vec<String>,
}

/// A named literal value. Evaluates to a single one-component row no matter
/// how many records are supplied.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConstantNode {
    pub name: String,
    pub value: f64,
}

/// A reference to a named expression, resolved against the registry and the
/// per-spot lookup capability (or the summary table) at evaluation time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VariableNode {
    name: String,
    directive: UncertaintyDirective,
    index: usize,
    uses_array_index: bool,
    scope: VariableScope,
}

impl VariableNode {
    #[must_use]
    pub fn per_spot(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            directive: UncertaintyDirective::Empty,
            index: 0,
            uses_array_index: false,
            scope: VariableScope::PerSpot,
        }
    }

    #[must_use]
    pub fn summary(name: impl Into<String>) -> Self {
        Self {
            scope: VariableScope::Summary,
            ..Self::per_spot(name)
        }
    }

    /// Sets the uncertainty directive. A non-empty directive retargets the
    /// node at the uncertainty slot (`index = 1`); call
    /// [`VariableNode::with_index`] afterwards to override that default.
    #[must_use]
    pub fn with_directive(mut self, directive: UncertaintyDirective) -> Self {
        self.directive = directive;
        if !directive.is_empty() {
            self.index = 1;
        }
        self
    }

    /// Explicit component offset; the leading `index` components of each row
    /// are discarded at evaluation time.
    #[must_use]
    pub fn with_index(mut self, index: usize) -> Self {
        self.index = index;
        self
    }

    #[must_use]
    pub fn with_array_index(mut self, uses_array_index: bool) -> Self {
        self.uses_array_index = uses_array_index;
        self
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn directive(&self) -> UncertaintyDirective {
        self.directive
    }

    #[must_use]
    pub fn index(&self) -> usize {
        self.index
    }

    #[must_use]
    pub fn uses_array_index(&self) -> bool {
        self.uses_array_index
    }

    #[must_use]
    pub fn scope(&self) -> VariableScope {
        self.scope
    }
}

/// An operation applied to an exact number of child trees.
#[derive(Debug, Clone)]
pub struct OperationNode {
    op: Arc<dyn Operation>,
    children: Vec<ExpressionNode>,
}

impl OperationNode {
    /// Fails with [`TreeError::Arity`] unless `children` matches the
    /// operation's declared arity exactly.
    pub fn new(op: Arc<dyn Operation>, children: Vec<ExpressionNode>) -> Result<Self, TreeError> {
        if children.len() != op.arity() {
            return Err(TreeError::Arity {
                op: op.name().to_string(),
                expected: op.arity(),
                actual: children.len(),
            });
        }
        Ok(Self { op, children })
    }

    #[must_use]
    pub fn op(&self) -> &Arc<dyn Operation> {
        &self.op
    }

    #[must_use]
    pub fn children(&self) -> &[ExpressionNode] {
        &self.children
    }
}

/// Outcome of evaluating a tree: the numeric rows plus whether every name
/// the tree references resolved against the current registry state.
#[derive(Debug, Clone, PartialEq)]
pub struct Evaluation {
    pub rows: EvalMatrix,
    pub healthy: bool,
}

impl Evaluation {
    #[must_use]
    pub fn healthy(rows: EvalMatrix) -> Self {
        Self {
            rows,
            healthy: true,
        }
    }

    #[must_use]
    pub fn unhealthy(rows: EvalMatrix) -> Self {
        Self {
            rows,
            healthy: false,
        }
    }
}

/// Polymorphic tree element: the unit of evaluation.
#[derive(Debug, Clone)]
pub enum ExpressionNode {
    Constant(ConstantNode),
    Variable(VariableNode),
    Operation(OperationNode),
}

impl ExpressionNode {
    #[must_use]
    pub fn constant(name: impl Into<String>, value: f64) -> Self {
        ExpressionNode::Constant(ConstantNode {
            name: name.into(),
            value,
        })
    }

    #[must_use]
    pub fn variable(node: VariableNode) -> Self {
        ExpressionNode::Variable(node)
    }

    /// Builds an operation node, validating arity.
    pub fn operation(
        op: Arc<dyn Operation>,
        children: Vec<ExpressionNode>,
    ) -> Result<Self, TreeError> {
        OperationNode::new(op, children).map(ExpressionNode::Operation)
    }

    #[must_use]
    pub fn name(&self) -> &str {
        match self {
            ExpressionNode::Constant(c) => &c.name,
            ExpressionNode::Variable(v) => v.name(),
            ExpressionNode::Operation(o) => o.op().name(),
        }
    }

    /// True when this tree's root produces a single summary row rather than
    /// one row per record.
    #[must_use]
    pub fn produces_summary(&self) -> bool {
        match self {
            ExpressionNode::Constant(_) => true,
            ExpressionNode::Variable(v) => v.scope() == VariableScope::Summary,
            ExpressionNode::Operation(o) => o.op().is_summary(),
        }
    }

    /// True when any operation in this tree aggregates over the whole record
    /// set (summary statistics, the scalar-collapsing grouping marker).
    /// Such trees must evaluate against the full record sequence; record
    /// batches would distort their results.
    #[must_use]
    pub fn aggregates_over_records(&self) -> bool {
        match self {
            ExpressionNode::Constant(_) | ExpressionNode::Variable(_) => false,
            ExpressionNode::Operation(o) => {
                o.op().is_summary()
                    || o.children().iter().any(ExpressionNode::aggregates_over_records)
            }
        }
    }

    /// Declared display metadata for the root node.
    #[must_use]
    pub fn output_shape(&self) -> OutputShape {
        match self {
            ExpressionNode::Constant(c) => OutputShape {
                row_count: RowCount::Fixed(1),
                col_count: 1,
                labels: vec![c.name.clone()],
            },
            ExpressionNode::Variable(v) => OutputShape {
                row_count: match v.scope() {
                    VariableScope::PerSpot => RowCount::PerRecord,
                    VariableScope::Summary => RowCount::Fixed(1),
                },
                col_count: 2,
                labels: vec![v.name().to_string()],
            },
            ExpressionNode::Operation(o) => {
                let labels = o
                    .op()
                    .output_labels()
                    .iter()
                    .map(|l| l.to_string())
                    .collect::<Vec<_>>();
                OutputShape {
                    row_count: if o.op().is_summary() {
                        RowCount::Fixed(1)
                    } else {
                        RowCount::PerRecord
                    },
                    col_count: labels.len(),
                    labels,
                }
            }
        }
    }

    /// Whether every name this tree references resolves in `registry`.
    ///
    /// Derived fresh per call; re-evaluating after the registry gains a
    /// missing entry flips the result back without touching the tree.
    #[must_use]
    pub fn is_healthy(&self, registry: &RegistrySnapshot) -> bool {
        let mut visiting = HashSet::new();
        self.is_healthy_guarded(registry, &mut visiting)
    }

    fn is_healthy_guarded(&self, registry: &RegistrySnapshot, visiting: &mut HashSet<String>) -> bool {
        match self {
            ExpressionNode::Constant(_) => true,
            ExpressionNode::Variable(v) => {
                if v.name().is_empty() {
                    return false;
                }
                match v.scope() {
                    // Summary names resolve against the context's summary
                    // table, not the registry; a non-empty name is valid.
                    VariableScope::Summary => true,
                    VariableScope::PerSpot => {
                        if !visiting.insert(v.name().to_string()) {
                            // Already on the walk: a cycle, treat as resolved
                            // rather than recursing forever.
                            return true;
                        }
                        let live = registry
                            .get(v.name())
                            .is_some_and(|e| e.tree().is_healthy_guarded(registry, visiting));
                        visiting.remove(v.name());
                        live
                    }
                }
            }
            ExpressionNode::Operation(o) => o
                .children()
                .iter()
                .all(|child| child.is_healthy_guarded(registry, visiting)),
        }
    }

    /// Evaluates this tree over `records` within `ctx`.
    ///
    /// Pure: no node, record, or registry state is mutated. The only `Err`
    /// is the hard variable-resolution failure; everything else degrades to
    /// zeros per the fault-tolerance rules.
    pub fn eval(
        &self,
        records: &[SpotRecord],
        ctx: &EvaluationContext,
    ) -> Result<Evaluation, EvalError> {
        match self {
            ExpressionNode::Constant(c) => Ok(Evaluation::healthy(EvalMatrix::scalar(c.value))),
            ExpressionNode::Variable(v) => variable::eval(v, records, ctx),
            ExpressionNode::Operation(o) => o.op().eval(o.children(), records, ctx),
        }
    }
}
