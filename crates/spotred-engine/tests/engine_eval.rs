use std::sync::Arc;

use pretty_assertions::assert_eq;
use smallvec::smallvec;
use spotred_engine::ops::builtins_math::{Add, Divide, Pexp};
use spotred_engine::ops::builtins_statistical::Average;
use spotred_engine::{
    evaluate, CalcSwitches, EvaluationContext, ExpressionNode, ExpressionRegistry, NamedExpression,
    TreeError, UncertaintyDirective, VariableNode,
};
use spotred_model::{SpotRecord, SpotRow};

/// Builds `count` spots, each carrying an evaluated row for `name`.
fn spots_with_rows(name: &str, rows: &[&[f64]]) -> Vec<SpotRecord> {
    rows.iter()
        .enumerate()
        .map(|(i, row)| {
            let mut spot = SpotRecord::new(format!("spot-{i}"), vec![]);
            spot.record_evaluation(name, SpotRow::from_slice(row));
            spot
        })
        .collect()
}

/// Registry holding `name` as a healthy entry with the given switches.
fn registry_with(name: &str, switches: CalcSwitches) -> ExpressionRegistry {
    let mut registry = ExpressionRegistry::new();
    registry.insert(NamedExpression::new(
        name,
        ExpressionNode::constant(name, 0.0),
        switches,
    ));
    registry
}

fn context_for(name: &str, spots: Vec<SpotRecord>) -> EvaluationContext {
    let registry = registry_with(name, CalcSwitches::default());
    EvaluationContext::new(registry.snapshot(), vec![], spots)
}

#[test]
fn absent_name_degrades_to_zero_rows_and_unhealthy() {
    let registry = ExpressionRegistry::new();
    let spots = spots_with_rows("other", &[&[1.0], &[2.0], &[3.0]]);
    let ctx = EvaluationContext::new(registry.snapshot(), vec![], spots);

    let tree = ExpressionNode::variable(VariableNode::per_spot("missing"));
    let result = evaluate(&tree, ctx.unknown_spots(), &ctx).unwrap();

    assert!(!result.healthy);
    assert_eq!(result.rows.row_count(), 3);
    for row in result.rows.iter_rows() {
        assert_eq!(row, &[0.0, 0.0]);
    }
}

#[test]
fn resolved_variable_returns_rows_in_record_order() {
    let spots = spots_with_rows("206/238", &[&[0.1, 0.01], &[0.2, 0.02]]);
    let ctx = context_for("206/238", spots);

    let tree = ExpressionNode::variable(VariableNode::per_spot("206/238"));
    let result = evaluate(&tree, ctx.unknown_spots(), &ctx).unwrap();

    assert!(result.healthy);
    assert_eq!(result.rows.row(0), Some(&[0.1, 0.01][..]));
    assert_eq!(result.rows.row(1), Some(&[0.2, 0.02][..]));
}

#[test]
fn percent_directive_converts_then_exposes_uncertainty() {
    let spots = spots_with_rows("r", &[&[10.0, 2.0]]);
    let ctx = context_for("r", spots);

    // Directive retargets the node at the uncertainty slot, so the converted
    // percent value becomes the primary output.
    let tree = ExpressionNode::variable(
        VariableNode::per_spot("r").with_directive(UncertaintyDirective::Percent),
    );
    let result = evaluate(&tree, ctx.unknown_spots(), &ctx).unwrap();
    assert_eq!(result.rows.row(0), Some(&[20.0][..]));

    // With the shift overridden away, both components are visible.
    let unshifted = ExpressionNode::variable(
        VariableNode::per_spot("r")
            .with_directive(UncertaintyDirective::Percent)
            .with_index(0),
    );
    let result = evaluate(&unshifted, ctx.unknown_spots(), &ctx).unwrap();
    assert_eq!(result.rows.row(0), Some(&[10.0, 20.0][..]));
}

#[test]
fn percent_directive_zero_guards_division() {
    let spots = spots_with_rows("r", &[&[0.0, 2.0]]);
    let ctx = context_for("r", spots);

    let tree = ExpressionNode::variable(
        VariableNode::per_spot("r")
            .with_directive(UncertaintyDirective::Percent)
            .with_index(0),
    );
    let result = evaluate(&tree, ctx.unknown_spots(), &ctx).unwrap();
    assert_eq!(result.rows.row(0), Some(&[0.0, 0.0][..]));
}

#[test]
fn single_component_row_with_directive_is_zeroed() {
    let spots = spots_with_rows("r", &[&[7.5]]);
    let ctx = context_for("r", spots);

    let tree = ExpressionNode::variable(
        VariableNode::per_spot("r").with_directive(UncertaintyDirective::Percent),
    );
    let result = evaluate(&tree, ctx.unknown_spots(), &ctx).unwrap();
    assert_eq!(result.rows.row(0), Some(&[0.0][..]));
}

#[test]
fn fixed_precision_switch_rounds_uncertainty() {
    let spots = spots_with_rows("r", &[&[1.0, 0.123456789012345678]]);
    let registry = registry_with(
        "r",
        CalcSwitches {
            fixed_precision: true,
            ..CalcSwitches::default()
        },
    );
    let ctx = EvaluationContext::new(registry.snapshot(), vec![], spots);

    let tree = ExpressionNode::variable(VariableNode::per_spot("r"));
    let result = evaluate(&tree, ctx.unknown_spots(), &ctx).unwrap();
    assert_eq!(result.rows.row(0), Some(&[1.0, 0.123456789012][..]));
}

#[test]
fn missing_record_row_is_a_hard_error() {
    // Registry says the expression exists, but the spot holds no row for it.
    let registry = registry_with("r", CalcSwitches::default());
    let spots = vec![SpotRecord::new("bare", vec![])];
    let ctx = EvaluationContext::new(registry.snapshot(), vec![], spots);

    let tree = ExpressionNode::variable(VariableNode::per_spot("r"));
    let err = evaluate(&tree, ctx.unknown_spots(), &ctx).unwrap_err();
    assert!(err.to_string().contains('r'), "error should name the variable: {err}");
}

#[test]
fn pexp_collapses_child_to_first_scalar() {
    let spots = spots_with_rows("r", &[&[5.0, 1.2]]);
    let ctx = context_for("r", spots);

    let child = ExpressionNode::variable(VariableNode::per_spot("r"));
    let tree = ExpressionNode::operation(Arc::new(Pexp), vec![child]).unwrap();

    let result = evaluate(&tree, ctx.unknown_spots(), &ctx).unwrap();
    assert_eq!(result.rows.row_count(), 1);
    assert_eq!(result.rows.row(0), Some(&[5.0][..]));
}

#[test]
fn pexp_swallows_child_failures() {
    // The child's lookup fails hard; Pexp still yields [[0.0]].
    let registry = registry_with("r", CalcSwitches::default());
    let spots = vec![SpotRecord::new("bare", vec![])];
    let ctx = EvaluationContext::new(registry.snapshot(), vec![], spots);

    let child = ExpressionNode::variable(VariableNode::per_spot("r"));
    let tree = ExpressionNode::operation(Arc::new(Pexp), vec![child]).unwrap();

    let result = evaluate(&tree, ctx.unknown_spots(), &ctx).unwrap();
    assert_eq!(result.rows.row(0), Some(&[0.0][..]));
}

#[test]
fn arithmetic_combines_per_spot_and_guards_division() {
    let mut spots = spots_with_rows("a", &[&[4.0], &[9.0]]);
    for (spot, b) in spots.iter_mut().zip([2.0, 0.0]) {
        spot.record_evaluation("b", smallvec![b]);
    }
    let mut registry = registry_with("a", CalcSwitches::default());
    registry.insert(NamedExpression::new(
        "b",
        ExpressionNode::constant("b", 0.0),
        CalcSwitches::default(),
    ));
    let ctx = EvaluationContext::new(registry.snapshot(), vec![], spots);

    let a = ExpressionNode::variable(VariableNode::per_spot("a"));
    let b = ExpressionNode::variable(VariableNode::per_spot("b"));
    let sum = ExpressionNode::operation(Arc::new(Add), vec![a.clone(), b.clone()]).unwrap();
    let quotient = ExpressionNode::operation(Arc::new(Divide), vec![a, b]).unwrap();

    let sum = evaluate(&sum, ctx.unknown_spots(), &ctx).unwrap();
    assert_eq!(sum.rows.row(0), Some(&[6.0][..]));
    assert_eq!(sum.rows.row(1), Some(&[9.0][..]));

    // 9.0 / 0.0 degrades to 0.0 instead of propagating infinity.
    let quotient = evaluate(&quotient, ctx.unknown_spots(), &ctx).unwrap();
    assert_eq!(quotient.rows.row(0), Some(&[2.0][..]));
    assert_eq!(quotient.rows.row(1), Some(&[0.0][..]));
}

#[test]
fn average_produces_one_summary_row() {
    let spots = spots_with_rows("a", &[&[1.0], &[2.0], &[6.0]]);
    let ctx = context_for("a", spots);

    let child = ExpressionNode::variable(VariableNode::per_spot("a"));
    let tree = ExpressionNode::operation(Arc::new(Average), vec![child]).unwrap();

    let result = evaluate(&tree, ctx.unknown_spots(), &ctx).unwrap();
    assert_eq!(result.rows.row_count(), 1);
    assert_eq!(result.rows.row(0), Some(&[3.0][..]));
}

#[test]
fn summary_variable_resolves_against_context_table() {
    let registry = ExpressionRegistry::new();
    let spots = spots_with_rows("x", &[&[1.0], &[2.0]]);
    let mut ctx = EvaluationContext::new(registry.snapshot(), vec![], spots);
    ctx.set_summary_evaluation("wtd-mean", smallvec![3.25, 0.05]);

    let tree = ExpressionNode::variable(VariableNode::summary("wtd-mean"));
    let result = evaluate(&tree, ctx.unknown_spots(), &ctx).unwrap();
    assert!(result.healthy);
    assert_eq!(result.rows.row_count(), 1);
    assert_eq!(result.rows.row(0), Some(&[3.25, 0.05][..]));

    let missing = ExpressionNode::variable(VariableNode::summary("absent"));
    let result = evaluate(&missing, ctx.unknown_spots(), &ctx).unwrap();
    assert!(!result.healthy);
    assert_eq!(result.rows.row(0), Some(&[0.0, 0.0][..]));
}

#[test]
fn constant_evaluates_to_one_row_for_any_record_count() {
    let spots = spots_with_rows("x", &[&[1.0], &[2.0], &[3.0], &[4.0]]);
    let ctx = context_for("x", spots);

    let tree = ExpressionNode::constant("lambda238", 1.55125e-10);
    let result = evaluate(&tree, ctx.unknown_spots(), &ctx).unwrap();
    assert_eq!(result.rows.row_count(), 1);
    assert_eq!(result.rows.row(0), Some(&[1.55125e-10][..]));
}

#[test]
fn evaluation_is_idempotent_across_calls() {
    let spots = spots_with_rows("r", &[&[10.0, 2.0], &[4.0, 0.5]]);
    let ctx = context_for("r", spots);

    let tree = ExpressionNode::operation(
        Arc::new(Add),
        vec![
            ExpressionNode::variable(
                VariableNode::per_spot("r").with_directive(UncertaintyDirective::Percent),
            ),
            ExpressionNode::constant("one", 1.0),
        ],
    )
    .unwrap();

    let first = evaluate(&tree, ctx.unknown_spots(), &ctx).unwrap();
    let second = evaluate(&tree, ctx.unknown_spots(), &ctx).unwrap();
    assert_eq!(first, second);
}

#[test]
fn health_recovers_once_the_registry_gains_the_name() {
    let mut registry = ExpressionRegistry::new();
    let spots = spots_with_rows("late", &[&[1.5]]);

    let tree = ExpressionNode::variable(VariableNode::per_spot("late"));

    let ctx = EvaluationContext::new(registry.snapshot(), vec![], spots.clone());
    let before = evaluate(&tree, ctx.unknown_spots(), &ctx).unwrap();
    assert!(!before.healthy);

    registry.insert(NamedExpression::new(
        "late",
        ExpressionNode::constant("late", 0.0),
        CalcSwitches::default(),
    ));
    let ctx = EvaluationContext::new(registry.snapshot(), vec![], spots);
    let after = evaluate(&tree, ctx.unknown_spots(), &ctx).unwrap();
    assert!(after.healthy);
    assert_eq!(after.rows.row(0), Some(&[1.5][..]));
}

#[test]
fn unhealthy_registry_entry_degrades_its_dependents() {
    // `derived` exists but references `base`, which does not.
    let mut registry = ExpressionRegistry::new();
    registry.insert(NamedExpression::new(
        "derived",
        ExpressionNode::variable(VariableNode::per_spot("base")),
        CalcSwitches::default(),
    ));
    let spots = spots_with_rows("derived", &[&[2.0]]);
    let ctx = EvaluationContext::new(registry.snapshot(), vec![], spots);

    let tree = ExpressionNode::variable(VariableNode::per_spot("derived"));
    let result = evaluate(&tree, ctx.unknown_spots(), &ctx).unwrap();
    assert!(!result.healthy);
    assert_eq!(result.rows.row(0), Some(&[0.0, 0.0][..]));
}

#[test]
fn arity_is_enforced_at_construction() {
    let one = ExpressionNode::constant("one", 1.0);
    let err = ExpressionNode::operation(Arc::new(Add), vec![one]).unwrap_err();
    assert!(matches!(err, TreeError::Arity { expected: 2, actual: 1, .. }));
}

#[cfg(feature = "parallel")]
#[test]
fn parallel_and_sequential_evaluation_agree() {
    let rows: Vec<Vec<f64>> = (0..200).map(|i| vec![i as f64, i as f64 * 0.1]).collect();
    let row_refs: Vec<&[f64]> = rows.iter().map(|r| r.as_slice()).collect();
    let spots = spots_with_rows("r", &row_refs);
    let ctx = context_for("r", spots);

    let tree = ExpressionNode::operation(
        Arc::new(Add),
        vec![
            ExpressionNode::variable(VariableNode::per_spot("r")),
            ExpressionNode::constant("offset", 1.0),
        ],
    )
    .unwrap();

    let batched = evaluate(&tree, ctx.unknown_spots(), &ctx).unwrap();
    let sequential = tree.eval(ctx.unknown_spots(), &ctx).unwrap();
    assert_eq!(batched, sequential);
    assert_eq!(batched.rows.row_count(), 200);
}
