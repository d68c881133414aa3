//! Parallel per-spot evaluation over record batches.
//!
//! Evaluation is a pure function of (tree, records, context snapshot), and
//! per-spot rows are independent of each other, so record batches can
//! evaluate on separate workers and recombine in record order.

#[cfg(feature = "parallel")]
use rayon::ThreadPool;
#[cfg(feature = "parallel")]
use std::sync::OnceLock;

use spotred_model::SpotRecord;

use crate::context::EvaluationContext;
use crate::error::EvalError;
use crate::tree::{Evaluation, ExpressionNode};

/// Below this record count the scheduling overhead outweighs the win.
#[cfg(feature = "parallel")]
pub(crate) const MIN_PARALLEL_RECORDS: usize = 64;

/// Best-effort crate-local Rayon thread pool.
///
/// Rayon normally uses a global pool; under resource constraints global pool
/// initialization can fail and Rayon panics on first use. A crate-local pool
/// keeps the engine resilient: if it cannot be built, callers fall back to
/// sequential evaluation.
#[cfg(feature = "parallel")]
static RAYON_POOL: OnceLock<Option<ThreadPool>> = OnceLock::new();

#[cfg(feature = "parallel")]
fn desired_threads() -> usize {
    let from_env = std::env::var("RAYON_NUM_THREADS")
        .ok()
        .and_then(|s| s.parse::<usize>().ok())
        .filter(|&n| n > 0);
    from_env.unwrap_or_else(|| {
        std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(1)
    })
}

#[cfg(feature = "parallel")]
fn build_pool() -> Option<ThreadPool> {
    let requested = desired_threads().max(1);
    let try_build = |n| rayon::ThreadPoolBuilder::new().num_threads(n).build();

    match try_build(requested) {
        Ok(pool) => Some(pool),
        Err(_) if requested > 1 => try_build(1).ok(),
        Err(_) => None,
    }
}

#[cfg(feature = "parallel")]
pub(crate) fn rayon_pool() -> Option<&'static ThreadPool> {
    RAYON_POOL.get_or_init(build_pool).as_ref()
}

/// Evaluates a tree over `records`, splitting them into batches on the
/// crate-local pool when that is both safe (per-spot root, no aggregation
/// over the record set anywhere in the tree) and worthwhile.
pub(crate) fn eval_record_batches(
    tree: &ExpressionNode,
    records: &[SpotRecord],
    ctx: &EvaluationContext,
) -> Result<Evaluation, EvalError> {
    #[cfg(feature = "parallel")]
    if records.len() >= MIN_PARALLEL_RECORDS
        && !tree.produces_summary()
        && !tree.aggregates_over_records()
    {
        if let Some(pool) = rayon_pool() {
            use rayon::prelude::*;

            let threads = pool.current_num_threads().max(1);
            let batch = records.len().div_ceil(threads).max(1);
            let partials: Vec<Result<Evaluation, EvalError>> = pool.install(|| {
                records
                    .par_chunks(batch)
                    .map(|chunk| tree.eval(chunk, ctx))
                    .collect()
            });

            let mut combined: Option<Evaluation> = None;
            for partial in partials {
                let partial = partial?;
                match &mut combined {
                    None => combined = Some(partial),
                    Some(acc) => {
                        acc.healthy &= partial.healthy;
                        acc.rows.extend(partial.rows);
                    }
                }
            }
            if let Some(evaluation) = combined {
                return Ok(evaluation);
            }
        }
    }

    tree.eval(records, ctx)
}
