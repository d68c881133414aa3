use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

/// One expression's result row for one spot: value first, then uncertainty
/// and any auxiliary components. Length is always >= 1.
///
/// Rows are almost always 1-4 components wide, so they live inline.
pub type SpotRow = SmallVec<[f64; 4]>;

/// A rows-by-columns numeric evaluation result.
///
/// Per-spot evaluation produces one row per input record, in record order;
/// summary evaluation produces exactly one row. Rows may differ in width:
/// variable nodes can shift components off the front of individual rows.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct EvalMatrix {
    rows: Vec<SpotRow>,
}

impl EvalMatrix {
    #[must_use]
    pub fn from_rows(rows: Vec<SpotRow>) -> Self {
        Self { rows }
    }

    /// A single-row matrix, the shape of summary results and constants.
    #[must_use]
    pub fn single_row(row: SpotRow) -> Self {
        Self { rows: vec![row] }
    }

    /// A single `[[value]]` matrix.
    #[must_use]
    pub fn scalar(value: f64) -> Self {
        Self::single_row(SpotRow::from_slice(&[value]))
    }

    /// `rows` rows of `width` zeros each.
    #[must_use]
    pub fn zero_filled(rows: usize, width: usize) -> Self {
        let row: SpotRow = std::iter::repeat(0.0).take(width).collect();
        Self {
            rows: vec![row; rows],
        }
    }

    #[must_use]
    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    #[must_use]
    pub fn row(&self, index: usize) -> Option<&[f64]> {
        self.rows.get(index).map(|r| r.as_slice())
    }

    /// The component at `(row, col)`, if present.
    #[must_use]
    pub fn value_at(&self, row: usize, col: usize) -> Option<f64> {
        self.rows.get(row).and_then(|r| r.get(col)).copied()
    }

    pub fn iter_rows(&self) -> impl Iterator<Item = &[f64]> {
        self.rows.iter().map(|r| r.as_slice())
    }

    /// Appends another matrix's rows, preserving order. Used to recombine
    /// record batches evaluated independently.
    pub fn extend(&mut self, other: EvalMatrix) {
        self.rows.extend(other.rows);
    }

    #[must_use]
    pub fn into_rows(self) -> Vec<SpotRow> {
        self.rows
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use smallvec::smallvec;

    #[test]
    fn zero_filled_has_requested_shape() {
        let m = EvalMatrix::zero_filled(3, 2);
        assert_eq!(m.row_count(), 3);
        assert_eq!(m.row(2), Some(&[0.0, 0.0][..]));
        assert_eq!(m.value_at(3, 0), None);
    }

    #[test]
    fn extend_preserves_row_order() {
        let mut a = EvalMatrix::from_rows(vec![smallvec![1.0], smallvec![2.0]]);
        let b = EvalMatrix::from_rows(vec![smallvec![3.0]]);
        a.extend(b);
        assert_eq!(
            a.iter_rows().map(|r| r[0]).collect::<Vec<_>>(),
            vec![1.0, 2.0, 3.0]
        );
    }
}
