#![forbid(unsafe_code)]

//! Expression evaluation engine for spot data reduction.
//!
//! Raw mass-spectrometer measurements reduce to derived quantities (ages,
//! ratios, concentrations) through user- and system-defined formulas. This
//! crate holds the tree-structured representation of those formulas, the
//! contract built-in and custom operations satisfy, and the resolution of
//! named variables against per-spot measurement data and a task-wide
//! registry.
//!
//! Two evaluation shapes coexist: per-spot (one row per measurement record,
//! in record order) and summary (one aggregate row). Failures are graded so
//! a single malformed formula never aborts a whole report pass: unresolved
//! registry names degrade to zero-filled rows, operation-internal faults
//! substitute `0.0`, and only a structural failure of a record's lookup
//! capability surfaces as an error, scoped to the one report column being
//! built.
//!
//! Evaluation is a pure function of (tree, records, registry snapshot).
//! Registry edits clone-on-write between passes, so a pass in flight never
//! observes a mutation; with the default `parallel` feature, per-spot trees
//! evaluate record batches on a crate-local Rayon pool.

pub mod context;
pub mod display;
pub mod error;
pub mod numeric;
pub mod ops;
pub mod report;
pub mod tree;

mod parallel;
mod variable;

pub use context::{
    CalcSwitches, EvaluationContext, ExpressionRegistry, NamedExpression, RegistrySnapshot,
    SwitchedPrecision, UncertaintyRounding,
};
pub use error::{EvalError, TreeError};
pub use ops::Operation;
pub use report::{assemble_columns, evaluate, included_in_report, render_markup, ReportColumn, ReportKind};
pub use tree::{
    ConstantNode, Evaluation, ExpressionNode, OperationNode, OutputShape, RowCount,
    UncertaintyDirective, VariableNode, VariableScope,
};
