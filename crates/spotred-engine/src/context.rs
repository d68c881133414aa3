//! Task-wide evaluation context: the named-expression registry, spot
//! collections, mode switches, and the injected uncertainty-rounding policy.
//!
//! The registry is read-many during a report pass. Mutation happens between
//! passes (the task editor adding or removing a custom expression), so each
//! pass works against an immutable [`RegistrySnapshot`] taken up front;
//! edits clone-on-write the shared map and bump a generation counter.

use std::sync::Arc;

use ahash::AHashMap;
use serde::{Deserialize, Serialize};
use spotred_model::{SpotRecord, SpotRow};

use crate::tree::ExpressionNode;

/// Per-expression calculation switches.
///
/// These gate which reports an expression participates in and in which
/// shape; they are attributes of the expression-context pairing, not of any
/// measurement record. `fixed_precision` requests the deterministic
/// significant-digit rounding of uncertainty components.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct CalcSwitches {
    pub summary: bool,
    pub reference_material: bool,
    pub unknown: bool,
    pub fixed_precision: bool,
}

/// A user- or system-defined formula registered under a unique name.
#[derive(Debug, Clone)]
pub struct NamedExpression {
    name: String,
    tree: ExpressionNode,
    switches: CalcSwitches,
}

impl NamedExpression {
    #[must_use]
    pub fn new(name: impl Into<String>, tree: ExpressionNode, switches: CalcSwitches) -> Self {
        Self {
            name: name.into(),
            tree,
            switches,
        }
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn tree(&self) -> &ExpressionNode {
        &self.tree
    }

    #[must_use]
    pub fn switches(&self) -> CalcSwitches {
        self.switches
    }
}

/// The task's mutable name -> expression registry.
///
/// Grows as users add custom formulas; never mutated while a report pass is
/// in flight. A pass calls [`ExpressionRegistry::snapshot`] once and
/// evaluates everything against that snapshot.
#[derive(Debug, Clone, Default)]
pub struct ExpressionRegistry {
    entries: Arc<AHashMap<String, Arc<NamedExpression>>>,
    generation: u64,
}

impl ExpressionRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `expr` under its name, replacing any previous entry.
    pub fn insert(&mut self, expr: NamedExpression) {
        let entries = Arc::make_mut(&mut self.entries);
        entries.insert(expr.name().to_string(), Arc::new(expr));
        self.generation += 1;
    }

    pub fn remove(&mut self, name: &str) -> Option<Arc<NamedExpression>> {
        let removed = Arc::make_mut(&mut self.entries).remove(name);
        if removed.is_some() {
            self.generation += 1;
        }
        removed
    }

    /// Monotonic edit counter; bumps on every insert/remove.
    #[must_use]
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// An immutable view for one report-generation pass. Later edits to the
    /// registry do not affect the snapshot.
    #[must_use]
    pub fn snapshot(&self) -> RegistrySnapshot {
        RegistrySnapshot {
            entries: Arc::clone(&self.entries),
            generation: self.generation,
        }
    }
}

/// Immutable registry view held by an [`EvaluationContext`].
#[derive(Debug, Clone)]
pub struct RegistrySnapshot {
    entries: Arc<AHashMap<String, Arc<NamedExpression>>>,
    generation: u64,
}

impl RegistrySnapshot {
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Arc<NamedExpression>> {
        self.entries.get(name)
    }

    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    /// Iteration order is insignificant; report assembly sorts by name.
    pub fn iter(&self) -> impl Iterator<Item = &Arc<NamedExpression>> {
        self.entries.values()
    }

    #[must_use]
    pub fn generation(&self) -> u64 {
        self.generation
    }
}

/// Pluggable rounding policy for uncertainty components, keyed by expression
/// name so instrument-specific conventions stay out of the evaluation core.
pub trait UncertaintyRounding: Send + Sync {
    /// Significant digits to round the uncertainty component of `name` to,
    /// or `None` to leave it untouched.
    fn sig_digits(&self, name: &str, switches: CalcSwitches) -> Option<u32>;
}

/// Default policy: a fixed digit count for expressions whose switches
/// request fixed precision, untouched otherwise.
#[derive(Debug, Clone, Copy)]
pub struct SwitchedPrecision {
    pub digits: u32,
}

impl Default for SwitchedPrecision {
    fn default() -> Self {
        Self { digits: 12 }
    }
}

impl UncertaintyRounding for SwitchedPrecision {
    fn sig_digits(&self, _name: &str, switches: CalcSwitches) -> Option<u32> {
        switches.fixed_precision.then_some(self.digits)
    }
}

/// Everything one report-generation pass needs: the registry snapshot, the
/// ordered spot collections, the summary-evaluation table, and the rounding
/// policy. Created once per pass; evaluation never mutates it.
pub struct EvaluationContext {
    registry: RegistrySnapshot,
    reference_material_spots: Vec<SpotRecord>,
    unknown_spots: Vec<SpotRecord>,
    summary_evaluations: AHashMap<String, SpotRow>,
    rounding: Arc<dyn UncertaintyRounding>,
}

impl EvaluationContext {
    #[must_use]
    pub fn new(
        registry: RegistrySnapshot,
        reference_material_spots: Vec<SpotRecord>,
        unknown_spots: Vec<SpotRecord>,
    ) -> Self {
        Self {
            registry,
            reference_material_spots,
            unknown_spots,
            summary_evaluations: AHashMap::new(),
            rounding: Arc::new(SwitchedPrecision::default()),
        }
    }

    #[must_use]
    pub fn with_rounding(mut self, rounding: Arc<dyn UncertaintyRounding>) -> Self {
        self.rounding = rounding;
        self
    }

    #[must_use]
    pub fn registry(&self) -> &RegistrySnapshot {
        &self.registry
    }

    #[must_use]
    pub fn reference_material_spots(&self) -> &[SpotRecord] {
        &self.reference_material_spots
    }

    #[must_use]
    pub fn unknown_spots(&self) -> &[SpotRecord] {
        &self.unknown_spots
    }

    /// Stores a summary row for `name`; consulted by summary variables.
    pub fn set_summary_evaluation(&mut self, name: impl Into<String>, row: SpotRow) {
        self.summary_evaluations.insert(name.into(), row);
    }

    #[must_use]
    pub fn summary_evaluation(&self, name: &str) -> Option<&[f64]> {
        self.summary_evaluations.get(name).map(|row| row.as_slice())
    }

    #[must_use]
    pub fn is_summary_calculation(&self, name: &str) -> bool {
        self.registry
            .get(name)
            .is_some_and(|e| e.switches().summary)
    }

    #[must_use]
    pub fn is_reference_material_calculation(&self, name: &str) -> bool {
        self.registry
            .get(name)
            .is_some_and(|e| e.switches().reference_material)
    }

    #[must_use]
    pub fn is_unknown_calculation(&self, name: &str) -> bool {
        self.registry
            .get(name)
            .is_some_and(|e| e.switches().unknown)
    }

    /// The rounding the injected policy requests for `name`'s uncertainty
    /// component, if any.
    #[must_use]
    pub fn fixed_precision_digits(&self, name: &str) -> Option<u32> {
        let switches = self.registry.get(name).map(|e| e.switches())?;
        self.rounding.sig_digits(name, switches)
    }
}
