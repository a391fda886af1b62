//! Ordered evaluation of feature extractors over items.
//!
//! The engine is built once from a selection of extractors: it resolves their
//! order, maps every dependency name to a column and gathers external inputs.
//! After that it is read-only and can be shared across threads.

use std::collections::{BTreeMap, HashMap};

use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::descriptor::FeatureDescriptor;
use crate::error::CoreError;
use crate::matrix::{FeatureMatrix, FeatureRow};
use crate::registry::SharedExtractor;
use crate::resolver::resolve_order;
use crate::traits::{FeatureInputs, Item};

/// Non-feature inputs keyed by name (keyword lists, ...).
pub type ExternalData = BTreeMap<String, Vec<String>>;

/// What a batch does when one item fails.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FailurePolicy {
    /// Stop the batch on the first failing item.
    #[default]
    Abort,
    /// Log the failure and carry on without the item.
    SkipItem,
}

/// Result of processing one item of a batch.
#[derive(Debug, Clone, PartialEq)]
pub struct Processed<R> {
    pub id: String,
    pub value: R,
}

pub struct ExtractionEngine<I> {
    extractors: Vec<SharedExtractor<I>>,
    /// Column of each declared dependency, per extractor.
    slots: Vec<Vec<usize>>,
    /// Declared external inputs, per extractor.
    external: Vec<Vec<Vec<String>>>,
}

impl<I> ExtractionEngine<I> {
    /// Resolves the evaluation order and wires dependencies.
    ///
    /// # Errors
    /// - [`CoreError::UnresolvableDependency`] on cycles or unknown dependencies.
    /// - [`CoreError::Configuration`] on duplicate names or a missing or empty
    ///   external input.
    pub fn new(
        extractors: Vec<SharedExtractor<I>>,
        external: &ExternalData,
    ) -> Result<Self, CoreError> {
        let extractors = resolve_order(
            extractors,
            |e| e.descriptor().name.as_str(),
            |e| e.dependencies(),
        )?;

        let column: HashMap<&str, usize> = extractors
            .iter()
            .enumerate()
            .map(|(i, e)| (e.descriptor().name.as_str(), i))
            .collect();

        let mut slots = Vec::with_capacity(extractors.len());
        let mut gathered = Vec::with_capacity(extractors.len());
        for extractor in &extractors {
            let name = &extractor.descriptor().name;
            let mut deps = Vec::with_capacity(extractor.dependencies().len());
            for dep in extractor.dependencies() {
                // Resolution succeeded, so every dependency has a column.
                let &c = column.get(dep.as_str()).ok_or_else(|| {
                    CoreError::UnresolvableDependency {
                        remaining: vec![name.clone()],
                    }
                })?;
                deps.push(c);
            }
            slots.push(deps);

            let mut inputs = Vec::with_capacity(extractor.external_dependencies().len());
            for key in extractor.external_dependencies() {
                match external.get(key) {
                    Some(values) if !values.is_empty() => inputs.push(values.clone()),
                    Some(_) => {
                        return Err(CoreError::config(format!(
                            "external input '{key}' needed by '{name}' is empty"
                        )));
                    }
                    None => {
                        return Err(CoreError::config(format!(
                            "feature '{name}' needs external input '{key}'"
                        )));
                    }
                }
            }
            gathered.push(inputs);
        }

        log::debug!("Extraction engine ready with {} feature(s)", extractors.len());
        Ok(Self {
            extractors,
            slots,
            external: gathered,
        })
    }

    #[must_use]
    pub fn feature_count(&self) -> usize {
        self.extractors.len()
    }

    /// Descriptors in evaluation order, i.e. matrix column order.
    #[must_use]
    pub fn descriptors(&self) -> Vec<FeatureDescriptor> {
        self.extractors
            .iter()
            .map(|e| e.descriptor().clone())
            .collect()
    }

    /// Column of the named feature.
    #[must_use]
    pub fn position(&self, name: &str) -> Option<usize> {
        self.extractors
            .iter()
            .position(|e| e.descriptor().name == name)
    }

    /// Boolean mask over the columns, true for the given names.
    #[must_use]
    pub fn mask_for(&self, names: &[String]) -> Vec<bool> {
        self.extractors
            .iter()
            .map(|e| names.contains(&e.descriptor().name))
            .collect()
    }

    /// Runs every extractor on each window of one item.
    ///
    /// # Errors
    /// Returns [`CoreError::ExtractionFailure`] for the first extractor that
    /// fails or returns a vector of the wrong declared width.
    pub fn extract_windows(&self, item_id: &str, windows: &[I]) -> Result<FeatureMatrix, CoreError> {
        let mut rows: Vec<FeatureRow> = Vec::with_capacity(windows.len());
        for (w, window) in windows.iter().enumerate() {
            let mut row: FeatureRow = Vec::with_capacity(self.extractors.len());
            for (k, extractor) in self.extractors.iter().enumerate() {
                let descriptor = extractor.descriptor();
                let history = &rows[rows.len().saturating_sub(extractor.lookback())..];
                let inputs = FeatureInputs::new(&row, history, &self.slots[k], &self.external[k]);
                let value = extractor.extract(window, &inputs).map_err(|e| {
                    CoreError::ExtractionFailure {
                        item: item_id.to_string(),
                        feature: descriptor.name.clone(),
                        reason: format!("window {w}: {e:#}"),
                    }
                })?;
                if let Some(v) = &value
                    && descriptor.dimensions > 0
                    && v.len() != descriptor.dimensions
                {
                    return Err(CoreError::ExtractionFailure {
                        item: item_id.to_string(),
                        feature: descriptor.name.clone(),
                        reason: format!(
                            "window {w}: produced {} value(s), declared {}",
                            v.len(),
                            descriptor.dimensions
                        ),
                    });
                }
                row.push(value);
            }
            rows.push(row);
        }
        FeatureMatrix::from_rows(self.extractors.len(), rows)
    }
}

impl<I: Item> ExtractionEngine<I> {
    /// Extracts a whole-item (single window) matrix.
    ///
    /// # Errors
    /// Same as [`extract_windows`](Self::extract_windows).
    pub fn extract_item(&self, item: &I) -> Result<FeatureMatrix, CoreError> {
        self.extract_windows(item.id(), std::slice::from_ref(item))
    }
}

/// Applies `f` to every item under the given failure policy, in item order.
///
/// With `parallel`, items are spread over the rayon pool; the result order and
/// the error reported under [`FailurePolicy::Abort`] stay those of the input.
///
/// # Errors
/// - [`CoreError::EmptyInput`] when `items` is empty or every item was skipped.
/// - The first item error under [`FailurePolicy::Abort`].
pub fn process_items<T, R, F>(
    items: &[T],
    policy: FailurePolicy,
    parallel: bool,
    f: F,
) -> Result<Vec<Processed<R>>, CoreError>
where
    T: Item + Sync,
    R: Send,
    F: Fn(&T) -> Result<R, CoreError> + Sync,
{
    if items.is_empty() {
        return Err(CoreError::EmptyInput("no items to extract from".into()));
    }

    let results: Vec<Result<R, CoreError>> = if parallel {
        items.par_iter().map(&f).collect()
    } else {
        items.iter().map(&f).collect()
    };

    let mut done = Vec::with_capacity(items.len());
    for (item, result) in items.iter().zip(results) {
        match result {
            Ok(value) => done.push(Processed {
                id: item.id().to_string(),
                value,
            }),
            Err(e) => match policy {
                FailurePolicy::Abort => return Err(e),
                FailurePolicy::SkipItem => log::warn!("Skipping '{}': {e}", item.id()),
            },
        }
    }

    if done.is_empty() {
        return Err(CoreError::EmptyInput(format!(
            "all {} item(s) failed",
            items.len()
        )));
    }
    log::info!("Processed {}/{} item(s)", done.len(), items.len());
    Ok(done)
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::registry::tests::Scaled;
    use crate::traits::FeatureExtractor;

    fn engine(extractors: Vec<SharedExtractor<f64>>) -> ExtractionEngine<f64> {
        ExtractionEngine::new(extractors, &ExternalData::new()).unwrap()
    }

    /// Absent for odd item values, otherwise the value itself.
    struct EvenOnly(FeatureDescriptor);

    impl FeatureExtractor<f64> for EvenOnly {
        fn descriptor(&self) -> &FeatureDescriptor {
            &self.0
        }

        fn extract(&self, item: &f64, _: &FeatureInputs<'_>) -> anyhow::Result<Option<Vec<f64>>> {
            #[allow(clippy::cast_possible_truncation)]
            let even = (*item as i64) % 2 == 0;
            Ok(even.then(|| vec![*item]))
        }
    }

    /// Doubles its dependency when present, stays absent otherwise.
    struct Doubler {
        descriptor: FeatureDescriptor,
        deps: Vec<String>,
    }

    impl FeatureExtractor<f64> for Doubler {
        fn descriptor(&self) -> &FeatureDescriptor {
            &self.descriptor
        }

        fn dependencies(&self) -> &[String] {
            &self.deps
        }

        fn extract(&self, _: &f64, inputs: &FeatureInputs<'_>) -> anyhow::Result<Option<Vec<f64>>> {
            Ok(inputs.scalar(0).map(|v| vec![v * 2.0]))
        }
    }

    /// Difference with the previous window of its dependency.
    struct Delta {
        descriptor: FeatureDescriptor,
        deps: Vec<String>,
    }

    impl FeatureExtractor<f64> for Delta {
        fn descriptor(&self) -> &FeatureDescriptor {
            &self.descriptor
        }

        fn dependencies(&self) -> &[String] {
            &self.deps
        }

        fn lookback(&self) -> usize {
            1
        }

        fn extract(&self, _: &f64, inputs: &FeatureInputs<'_>) -> anyhow::Result<Option<Vec<f64>>> {
            let (Some(now), Some(before)) = (inputs.value(0), inputs.previous(0, 1)) else {
                return Ok(None);
            };
            Ok(Some(vec![now[0] - before[0]]))
        }
    }

    /// Reads its dependency `back` windows ago.
    struct Peek {
        descriptor: FeatureDescriptor,
        deps: Vec<String>,
        lookback: usize,
        back: usize,
    }

    impl Peek {
        fn shared(name: &str, lookback: usize, back: usize) -> SharedExtractor<f64> {
            Arc::new(Self {
                descriptor: FeatureDescriptor::new(name, "", true, 1),
                deps: vec!["Level".into()],
                lookback,
                back,
            })
        }
    }

    impl FeatureExtractor<f64> for Peek {
        fn descriptor(&self) -> &FeatureDescriptor {
            &self.descriptor
        }

        fn dependencies(&self) -> &[String] {
            &self.deps
        }

        fn lookback(&self) -> usize {
            self.lookback
        }

        fn extract(&self, _: &f64, inputs: &FeatureInputs<'_>) -> anyhow::Result<Option<Vec<f64>>> {
            Ok(inputs.previous(0, self.back).map(<[f64]>::to_vec))
        }
    }

    struct Keyed {
        descriptor: FeatureDescriptor,
        keys: Vec<String>,
    }

    impl FeatureExtractor<f64> for Keyed {
        fn descriptor(&self) -> &FeatureDescriptor {
            &self.descriptor
        }

        fn external_dependencies(&self) -> &[String] {
            &self.keys
        }

        #[allow(clippy::cast_precision_loss)]
        fn extract(&self, _: &f64, inputs: &FeatureInputs<'_>) -> anyhow::Result<Option<Vec<f64>>> {
            Ok(Some(vec![inputs.external(0).len() as f64]))
        }
    }

    struct Failing(FeatureDescriptor);

    impl FeatureExtractor<f64> for Failing {
        fn descriptor(&self) -> &FeatureDescriptor {
            &self.0
        }

        fn extract(&self, item: &f64, _: &FeatureInputs<'_>) -> anyhow::Result<Option<Vec<f64>>> {
            if *item < 0.0 {
                anyhow::bail!("negative input");
            }
            Ok(Some(vec![*item]))
        }
    }

    struct Id(String, f64);

    impl Item for Id {
        fn id(&self) -> &str {
            &self.0
        }
    }

    #[test]
    fn dependencies_are_computed_first_and_threaded() {
        // Declared out of order on purpose.
        let e = engine(vec![
            Scaled::shared("C", &["B"], 0.0),
            Scaled::shared("B", &["A"], 0.0),
            Scaled::shared("A", &[], 1.0),
        ]);
        let names: Vec<_> = e.descriptors().into_iter().map(|d| d.name).collect();
        assert_eq!(names, vec!["A", "B", "C"]);
        let m = e.extract_windows("x", &[5.0]).unwrap();
        assert_eq!(m.get(0, 2), Some(&[5.0][..]));
    }

    #[test]
    fn absence_propagates_to_dependents() {
        let e = engine(vec![
            Arc::new(EvenOnly(FeatureDescriptor::new("Even", "", true, 1))),
            Arc::new(Doubler {
                descriptor: FeatureDescriptor::new("Double", "", true, 1),
                deps: vec!["Even".into()],
            }),
        ]);
        let m = e.extract_windows("x", &[1.0, 2.0]).unwrap();
        assert_eq!(m.get(0, 0), None);
        assert_eq!(m.get(0, 1), None);
        assert_eq!(m.get(1, 1), Some(&[4.0][..]));
    }

    #[test]
    fn lookback_creates_burn_in() {
        let e = engine(vec![
            Scaled::shared("Level", &[], 1.0),
            Arc::new(Delta {
                descriptor: FeatureDescriptor::new("Delta", "", true, 1),
                deps: vec!["Level".into()],
            }),
        ]);
        let m = e.extract_windows("x", &[1.0, 4.0, 9.0]).unwrap();
        assert_eq!(m.get(0, 1), None);
        assert_eq!(m.get(1, 1), Some(&[3.0][..]));
        assert_eq!(m.get(2, 1), Some(&[5.0][..]));
        assert_eq!(m.burn_in(&[0, 1]), 1);
    }

    #[test]
    fn history_is_limited_to_declared_lookback() {
        let e = engine(vec![
            Scaled::shared("Level", &[], 1.0),
            Peek::shared("NoLookback", 0, 1),
            Peek::shared("OneBack", 1, 1),
            Peek::shared("TwoBackOfOne", 1, 2),
            Peek::shared("TwoBack", 2, 2),
        ]);
        let m = e.extract_windows("x", &[1.0, 2.0, 3.0]).unwrap();
        let col = |name| e.position(name).unwrap();
        for w in 0..3 {
            assert_eq!(m.get(w, col("NoLookback")), None);
            assert_eq!(m.get(w, col("TwoBackOfOne")), None);
        }
        assert_eq!(m.get(2, col("OneBack")), Some(&[2.0][..]));
        assert_eq!(m.get(2, col("TwoBack")), Some(&[1.0][..]));
    }

    #[test]
    fn extraction_is_deterministic() {
        let e = engine(vec![
            Scaled::shared("A", &[], 1.5),
            Scaled::shared("B", &["A"], 0.5),
        ]);
        let windows = [1.0, 2.0, 3.0];
        assert_eq!(
            e.extract_windows("x", &windows).unwrap(),
            e.extract_windows("x", &windows).unwrap()
        );
    }

    #[test]
    fn cycle_fails_at_build() {
        let r = ExtractionEngine::new(
            vec![Scaled::shared("A", &["B"], 1.0), Scaled::shared("B", &["A"], 1.0)],
            &ExternalData::new(),
        );
        assert!(matches!(r, Err(CoreError::UnresolvableDependency { .. })));
    }

    #[test]
    fn external_inputs_checked_at_build() {
        let keyed = || -> SharedExtractor<f64> {
            Arc::new(Keyed {
                descriptor: FeatureDescriptor::new("Keyed", "", false, 1),
                keys: vec!["Words".into()],
            })
        };
        assert!(ExtractionEngine::new(vec![keyed()], &ExternalData::new()).is_err());

        let mut empty = ExternalData::new();
        empty.insert("Words".into(), Vec::new());
        assert!(ExtractionEngine::new(vec![keyed()], &empty).is_err());

        let mut data = ExternalData::new();
        data.insert("Words".into(), vec!["a".into(), "b".into()]);
        let e = ExtractionEngine::new(vec![keyed()], &data).unwrap();
        let m = e.extract_windows("x", &[0.0]).unwrap();
        assert_eq!(m.get(0, 0), Some(&[2.0][..]));
    }

    #[test]
    fn failure_names_item_and_feature() {
        let e = engine(vec![Arc::new(Failing(FeatureDescriptor::new("Checked", "", true, 1)))]);
        match e.extract_windows("song-7", &[1.0, -1.0]) {
            Err(CoreError::ExtractionFailure { item, feature, .. }) => {
                assert_eq!(item, "song-7");
                assert_eq!(feature, "Checked");
            }
            other => panic!("expected extraction failure, got {other:?}"),
        }
    }

    #[test]
    fn wrong_width_is_a_failure() {
        let e = engine(vec![Arc::new(Failing(FeatureDescriptor::new("Wide", "", true, 2)))]);
        assert!(matches!(
            e.extract_windows("x", &[1.0]),
            Err(CoreError::ExtractionFailure { .. })
        ));
    }

    #[test]
    fn batch_policy_abort_and_skip() {
        let items = vec![Id("a".into(), 1.0), Id("b".into(), -1.0), Id("c".into(), 2.0)];
        let e = engine(vec![Arc::new(Failing(FeatureDescriptor::new("Checked", "", true, 1)))]);
        let run = |policy, parallel| {
            process_items(&items, policy, parallel, |it: &Id| {
                e.extract_windows(it.id(), &[it.1])
            })
        };

        assert!(matches!(
            run(FailurePolicy::Abort, false),
            Err(CoreError::ExtractionFailure { .. })
        ));
        for parallel in [false, true] {
            let done = run(FailurePolicy::SkipItem, parallel).unwrap();
            let ids: Vec<_> = done.iter().map(|p| p.id.as_str()).collect();
            assert_eq!(ids, vec!["a", "c"]);
        }
    }

    #[test]
    fn batch_with_nothing_left_is_empty_input() {
        let items: Vec<Id> = Vec::new();
        let r = process_items(&items, FailurePolicy::Abort, false, |_| Ok(()));
        assert!(matches!(r, Err(CoreError::EmptyInput(_))));

        let items = vec![Id("a".into(), -1.0)];
        let r = process_items(&items, FailurePolicy::SkipItem, false, |_| {
            Err::<(), _>(CoreError::config("boom"))
        });
        assert!(matches!(r, Err(CoreError::EmptyInput(_))));
    }

    #[test]
    fn mask_follows_column_order() {
        let e = engine(vec![Scaled::shared("B", &["A"], 1.0), Scaled::shared("A", &[], 1.0)]);
        assert_eq!(e.mask_for(&["B".to_string()]), vec![false, true]);
    }
}
