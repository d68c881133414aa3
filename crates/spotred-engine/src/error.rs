use spotred_model::LookupError;
use thiserror::Error;

/// Structural errors raised while building an expression tree.
///
/// A malformed tree is rejected at construction; `eval` never sees one.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TreeError {
    #[error("operation `{op}` expects {expected} argument(s), got {actual}")]
    Arity {
        op: String,
        expected: usize,
        actual: usize,
    },
}

/// The single hard evaluation failure.
///
/// Everything else degrades in place: unresolved registry names zero-fill
/// their rows, and operation-internal faults substitute `0.0`. Only a
/// structural failure of the per-spot lookup capability propagates, and it
/// aborts just the report column being built, not the whole pass.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EvalError {
    #[error("could not resolve variable `{name}`")]
    UnresolvedVariable {
        name: String,
        #[source]
        source: LookupError,
    },
}
