use ahash::AHashMap;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::matrix::SpotRow;

/// Raised when a record cannot structurally satisfy an expression-row lookup.
///
/// "Not evaluated yet" at the registry level is a soft condition handled by
/// the engine; this error is the hard case where the registry says an
/// expression exists but the record holds no row for it.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LookupError {
    #[error("spot `{spot}` has no evaluated row for expression `{name}`")]
    NotEvaluated { spot: String, name: String },
}

/// Capability to fetch a named expression's previously computed result row.
///
/// Variable nodes resolve per-spot values through this trait by static
/// dispatch; the returned slice holds the value followed by uncertainty and
/// auxiliary components, length >= 1.
pub trait ExpressionLookup {
    fn expression_row(&self, name: &str) -> Result<&[f64], LookupError>;
}

/// One analytical spot: its identity, raw per-isotope counts, and the rows
/// previously evaluated for named expressions on this spot.
///
/// Records are owned by the task's spot collections and treated as immutable
/// for the duration of a report-generation pass; [`SpotRecord::record_evaluation`]
/// runs between passes, when the reduction pipeline writes results back.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct SpotRecord {
    spot_name: String,
    isotope_counts: Vec<f64>,
    evaluations: AHashMap<String, SpotRow>,
}

impl SpotRecord {
    #[must_use]
    pub fn new(spot_name: impl Into<String>, isotope_counts: Vec<f64>) -> Self {
        Self {
            spot_name: spot_name.into(),
            isotope_counts,
            evaluations: AHashMap::new(),
        }
    }

    #[must_use]
    pub fn spot_name(&self) -> &str {
        &self.spot_name
    }

    #[must_use]
    pub fn isotope_counts(&self) -> &[f64] {
        &self.isotope_counts
    }

    /// Stores the evaluated row for `name`, replacing any previous row.
    pub fn record_evaluation(&mut self, name: impl Into<String>, row: SpotRow) {
        self.evaluations.insert(name.into(), row);
    }

    #[must_use]
    pub fn has_evaluation(&self, name: &str) -> bool {
        self.evaluations.contains_key(name)
    }
}

impl ExpressionLookup for SpotRecord {
    fn expression_row(&self, name: &str) -> Result<&[f64], LookupError> {
        self.evaluations
            .get(name)
            .map(|row| row.as_slice())
            .ok_or_else(|| LookupError::NotEvaluated {
                spot: self.spot_name.clone(),
                name: name.to_string(),
            })
    }
}
