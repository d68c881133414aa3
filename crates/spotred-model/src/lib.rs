#![forbid(unsafe_code)]

//! Core in-memory data model for spot data reduction.
//!
//! This crate holds the types shared between the evaluation engine and its
//! collaborators (report assembly, raw-data ingestion): measurement records
//! ([`SpotRecord`]), per-expression result rows ([`SpotRow`] /
//! [`EvalMatrix`]), and the [`ExpressionLookup`] capability a record exposes
//! so variable nodes can read previously computed values.

mod matrix;
mod spot;

pub use matrix::{EvalMatrix, SpotRow};
pub use spot::{ExpressionLookup, LookupError, SpotRecord};
