/// One extracted row: one optional vector per feature column.
pub type FeatureRow = Vec<Option<Vec<f64>>>;

/// Windows × features × dimensions for a single item.
///
/// A cell is `None` when the feature was not computed for that window,
/// which is not the same thing as a zero value.
///
/// # Example
/// ```
/// use mf_core::matrix::FeatureMatrix;
/// let mut m = FeatureMatrix::new(2);
/// m.push_row(vec![None, Some(vec![1.0])]).unwrap();
/// m.push_row(vec![Some(vec![2.0]), Some(vec![3.0])]).unwrap();
/// assert_eq!(m.window_count(), 2);
/// assert_eq!(m.first_present(0), Some(1));
/// ```
#[derive(Clone, Debug, Default, PartialEq)]
pub struct FeatureMatrix {
    feature_count: usize,
    rows: Vec<FeatureRow>,
}

impl FeatureMatrix {
    #[must_use]
    pub fn new(feature_count: usize) -> Self {
        Self {
            feature_count,
            rows: Vec::new(),
        }
    }

    /// Builds a matrix from complete rows.
    ///
    /// # Errors
    /// Returns an error if a row does not have `feature_count` cells.
    pub fn from_rows(feature_count: usize, rows: Vec<FeatureRow>) -> Result<Self, crate::CoreError> {
        let mut matrix = Self::new(feature_count);
        for row in rows {
            matrix.push_row(row)?;
        }
        Ok(matrix)
    }

    /// Appends a window.
    ///
    /// # Errors
    /// Returns an error if the row width differs from the feature count.
    pub fn push_row(&mut self, row: FeatureRow) -> Result<(), crate::CoreError> {
        if row.len() != self.feature_count {
            return Err(crate::CoreError::config(format!(
                "row has {} cells, matrix has {} features",
                row.len(),
                self.feature_count
            )));
        }
        self.rows.push(row);
        Ok(())
    }

    #[must_use]
    pub fn feature_count(&self) -> usize {
        self.feature_count
    }

    #[must_use]
    pub fn window_count(&self) -> usize {
        self.rows.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    #[must_use]
    pub fn rows(&self) -> &[FeatureRow] {
        &self.rows
    }

    /// Cell at (`window`, `feature`).
    #[must_use]
    pub fn get(&self, window: usize, feature: usize) -> Option<&[f64]> {
        self.rows.get(window)?.get(feature)?.as_deref()
    }

    /// Index of the first window where `feature` has a value.
    #[must_use]
    pub fn first_present(&self, feature: usize) -> Option<usize> {
        self.rows
            .iter()
            .position(|row| row.get(feature).is_some_and(Option::is_some))
    }

    /// Burn-in offset for a set of features: the latest first-present window
    /// among them. A feature that never has a value pushes the offset past
    /// the last window.
    #[must_use]
    pub fn burn_in(&self, features: &[usize]) -> usize {
        features
            .iter()
            .map(|&f| self.first_present(f).unwrap_or(self.rows.len()))
            .max()
            .unwrap_or(0)
    }

    /// Width of `feature` in the last window (0 when absent there).
    #[must_use]
    pub fn last_width(&self, feature: usize) -> usize {
        self.rows
            .last()
            .and_then(|row| row.get(feature))
            .and_then(Option::as_ref)
            .map_or(0, Vec::len)
    }

    /// Flattens `features` into (feature, dimension) pairs using the widths of
    /// the last window. Features absent in the last window contribute nothing.
    #[must_use]
    pub fn collapse(&self, features: &[usize]) -> Vec<(usize, usize)> {
        features
            .iter()
            .flat_map(|&f| (0..self.last_width(f)).map(move |d| (f, d)))
            .collect()
    }

    /// Scalar at (`window`, `feature`, `dimension`).
    #[must_use]
    pub fn value(&self, window: usize, feature: usize, dimension: usize) -> Option<f64> {
        self.get(window, feature)?.get(dimension).copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> FeatureMatrix {
        FeatureMatrix::from_rows(
            2,
            vec![
                vec![Some(vec![1.0, 2.0]), None],
                vec![Some(vec![3.0, 4.0]), None],
                vec![Some(vec![5.0, 6.0]), Some(vec![7.0])],
            ],
        )
        .unwrap()
    }

    #[test]
    fn burn_in_is_latest_first_value() {
        let m = sample();
        assert_eq!(m.burn_in(&[0]), 0);
        assert_eq!(m.burn_in(&[0, 1]), 2);
        assert_eq!(m.burn_in(&[]), 0);
    }

    #[test]
    fn collapse_uses_last_window_widths() {
        let m = sample();
        assert_eq!(m.collapse(&[1, 0]), vec![(1, 0), (0, 0), (0, 1)]);
    }

    #[test]
    fn rejects_ragged_rows() {
        let mut m = FeatureMatrix::new(2);
        assert!(m.push_row(vec![None]).is_err());
    }
}
