use crate::descriptor::FeatureDescriptor;

/// An input unit with a stable identifier (a song, a recording).
pub trait Item {
    /// Unique identifier, used in outputs and error messages.
    fn id(&self) -> &str;
}

/// A named computation over one window of an item.
///
/// Implementors declare the names of the features they read; the engine
/// orders extraction so those are always computed first and hands their
/// outputs over through [`FeatureInputs`], in declared order.
///
/// # Example
/// ```
/// use mf_core::descriptor::FeatureDescriptor;
/// use mf_core::traits::{FeatureExtractor, FeatureInputs};
///
/// struct Length(FeatureDescriptor);
/// impl FeatureExtractor<String> for Length {
///     fn descriptor(&self) -> &FeatureDescriptor { &self.0 }
///     fn extract(&self, item: &String, _inputs: &FeatureInputs<'_>) -> anyhow::Result<Option<Vec<f64>>> {
///         Ok(Some(vec![item.len() as f64]))
///     }
/// }
/// ```
pub trait FeatureExtractor<I>: Send + Sync {
    /// Metadata for this feature.
    fn descriptor(&self) -> &FeatureDescriptor;

    /// Names of other features this one reads.
    fn dependencies(&self) -> &[String] {
        &[]
    }

    /// Keys of non-feature data this one reads (keyword lists, ...).
    fn external_dependencies(&self) -> &[String] {
        &[]
    }

    /// Number of previous windows of its dependencies this feature needs.
    /// Only that many are visible through [`FeatureInputs::previous`].
    fn lookback(&self) -> usize {
        0
    }

    /// Computes the feature for one window.
    ///
    /// `Ok(None)` means "not applicable here" and is not an error.
    ///
    /// # Errors
    /// Returns an error when an input violates a precondition of the computation.
    fn extract(&self, item: &I, inputs: &FeatureInputs<'_>) -> anyhow::Result<Option<Vec<f64>>>;
}

/// Values handed to one extractor call.
pub struct FeatureInputs<'a> {
    row: &'a [Option<Vec<f64>>],
    history: &'a [Vec<Option<Vec<f64>>>],
    slots: &'a [usize],
    external: &'a [Vec<String>],
}

impl<'a> FeatureInputs<'a> {
    /// `row` is the window being built, `history` the previous windows of the
    /// same item (oldest first), `slots` the column of each dependency.
    #[must_use]
    pub fn new(
        row: &'a [Option<Vec<f64>>],
        history: &'a [Vec<Option<Vec<f64>>>],
        slots: &'a [usize],
        external: &'a [Vec<String>],
    ) -> Self {
        Self {
            row,
            history,
            slots,
            external,
        }
    }

    /// Number of declared feature dependencies.
    #[must_use]
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Current-window value of the `i`-th dependency.
    #[must_use]
    pub fn value(&self, i: usize) -> Option<&'a [f64]> {
        let slot = *self.slots.get(i)?;
        self.row.get(slot)?.as_deref()
    }

    /// First component of the `i`-th dependency.
    #[must_use]
    pub fn scalar(&self, i: usize) -> Option<f64> {
        self.value(i).and_then(|v| v.first().copied())
    }

    /// Value of the `i`-th dependency `back` windows ago (`back >= 1`).
    #[must_use]
    pub fn previous(&self, i: usize, back: usize) -> Option<&'a [f64]> {
        if back == 0 {
            return self.value(i);
        }
        let slot = *self.slots.get(i)?;
        let idx = self.history.len().checked_sub(back)?;
        self.history[idx].get(slot)?.as_deref()
    }

    /// Like [`value`](Self::value) but absence is an error.
    ///
    /// # Errors
    /// Returns an error if the dependency has no value for this window.
    pub fn required(&self, i: usize) -> anyhow::Result<&'a [f64]> {
        self.value(i)
            .ok_or_else(|| anyhow::anyhow!("dependency #{i} has no value"))
    }

    /// The `i`-th declared external input.
    #[must_use]
    pub fn external(&self, i: usize) -> &'a [String] {
        self.external.get(i).map_or(&[][..], Vec::as_slice)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn previous_walks_history_backwards() {
        let history = vec![vec![Some(vec![1.0])], vec![Some(vec![2.0])]];
        let row = vec![Some(vec![3.0])];
        let slots = [0];
        let inputs = FeatureInputs::new(&row, &history, &slots, &[]);
        assert_eq!(inputs.value(0), Some(&[3.0][..]));
        assert_eq!(inputs.previous(0, 1), Some(&[2.0][..]));
        assert_eq!(inputs.previous(0, 2), Some(&[1.0][..]));
        assert_eq!(inputs.previous(0, 3), None);
    }

    #[test]
    fn absent_dependency_is_none_not_zero() {
        let row = vec![None];
        let slots = [0];
        let inputs = FeatureInputs::new(&row, &[], &slots, &[]);
        assert_eq!(inputs.scalar(0), None);
        assert!(inputs.required(0).is_err());
    }
}
