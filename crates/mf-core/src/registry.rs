use std::collections::{HashSet, VecDeque};
use std::sync::Arc;

use crate::descriptor::FeatureDescriptor;
use crate::error::CoreError;
use crate::traits::FeatureExtractor;

/// Shared handle to an extractor. Extractors are immutable once registered.
pub type SharedExtractor<I> = Arc<dyn FeatureExtractor<I>>;

/// Every extractor known for one item type, in registration order.
pub struct FeatureRegistry<I> {
    extractors: Vec<SharedExtractor<I>>,
}

/// Extractors to run for a given set of enabled feature names.
///
/// `extractors` also holds the dependencies pulled in for the enabled ones;
/// only `enabled` are meant to be saved or aggregated.
pub struct Selection<I> {
    pub extractors: Vec<SharedExtractor<I>>,
    pub enabled: Vec<String>,
}

impl<I> Default for FeatureRegistry<I> {
    fn default() -> Self {
        Self {
            extractors: Vec::new(),
        }
    }
}

impl<I> FeatureRegistry<I> {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds an extractor.
    ///
    /// # Errors
    /// Returns an error if a feature with the same name is already registered.
    pub fn register(&mut self, extractor: SharedExtractor<I>) -> Result<(), CoreError> {
        let name = &extractor.descriptor().name;
        if self.get(name).is_some() {
            return Err(CoreError::config(format!(
                "feature '{name}' registered twice"
            )));
        }
        self.extractors.push(extractor);
        Ok(())
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.extractors.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.extractors.is_empty()
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<&SharedExtractor<I>> {
        self.extractors
            .iter()
            .find(|e| e.descriptor().name == name)
    }

    /// Descriptors of every registered feature.
    pub fn descriptors(&self) -> impl Iterator<Item = &FeatureDescriptor> {
        self.extractors.iter().map(|e| e.descriptor())
    }

    /// Selects the extractors needed for `enabled`, adding their transitive
    /// dependencies. An empty `enabled` selects everything.
    ///
    /// Dependencies naming unregistered features are kept as declared; the
    /// resolver reports them when the engine is built.
    ///
    /// # Errors
    /// Returns an error if an enabled name is not registered.
    pub fn select(&self, enabled: &[String]) -> Result<Selection<I>, CoreError> {
        if enabled.is_empty() {
            return Ok(Selection {
                extractors: self.extractors.clone(),
                enabled: self.descriptors().map(|d| d.name.clone()).collect(),
            });
        }

        let mut wanted: HashSet<&str> = HashSet::new();
        let mut queue: VecDeque<&str> = VecDeque::new();
        for name in enabled {
            if self.get(name).is_none() {
                return Err(CoreError::config(format!("unknown feature '{name}'")));
            }
            queue.push_back(name);
        }
        while let Some(name) = queue.pop_front() {
            if !wanted.insert(name) {
                continue;
            }
            if let Some(extractor) = self.get(name) {
                for dep in extractor.dependencies() {
                    queue.push_back(dep);
                }
            }
        }

        let extractors: Vec<_> = self
            .extractors
            .iter()
            .filter(|e| wanted.contains(e.descriptor().name.as_str()))
            .cloned()
            .collect();
        let pulled_in = extractors.len() - enabled.len().min(extractors.len());
        if pulled_in > 0 {
            log::debug!("{pulled_in} dependency feature(s) added to the selection");
        }
        Ok(Selection {
            extractors,
            enabled: enabled.to_vec(),
        })
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::traits::FeatureInputs;

    /// Test extractor over `f64` items: item value times `factor`, plus the
    /// sum of its dependencies.
    pub(crate) struct Scaled {
        pub descriptor: FeatureDescriptor,
        pub deps: Vec<String>,
        pub factor: f64,
    }

    impl Scaled {
        pub(crate) fn shared(name: &str, deps: &[&str], factor: f64) -> SharedExtractor<f64> {
            Arc::new(Self {
                descriptor: FeatureDescriptor::new(name, "test", false, 1),
                deps: deps.iter().map(|d| (*d).to_string()).collect(),
                factor,
            })
        }
    }

    impl FeatureExtractor<f64> for Scaled {
        fn descriptor(&self) -> &FeatureDescriptor {
            &self.descriptor
        }

        fn dependencies(&self) -> &[String] {
            &self.deps
        }

        fn extract(&self, item: &f64, inputs: &FeatureInputs<'_>) -> anyhow::Result<Option<Vec<f64>>> {
            let mut total = item * self.factor;
            for i in 0..inputs.len() {
                total += inputs.required(i)?[0];
            }
            Ok(Some(vec![total]))
        }
    }

    fn registry() -> FeatureRegistry<f64> {
        let mut r = FeatureRegistry::new();
        r.register(Scaled::shared("A", &[], 1.0)).unwrap();
        r.register(Scaled::shared("B", &["A"], 2.0)).unwrap();
        r.register(Scaled::shared("C", &["B"], 3.0)).unwrap();
        r.register(Scaled::shared("D", &[], 4.0)).unwrap();
        r
    }

    #[test]
    fn select_pulls_in_transitive_dependencies() {
        let sel = registry().select(&["C".to_string()]).unwrap();
        let names: Vec<_> = sel
            .extractors
            .iter()
            .map(|e| e.descriptor().name.clone())
            .collect();
        assert_eq!(names, vec!["A", "B", "C"]);
        assert_eq!(sel.enabled, vec!["C"]);
    }

    #[test]
    fn empty_selection_means_everything() {
        let sel = registry().select(&[]).unwrap();
        assert_eq!(sel.extractors.len(), 4);
        assert_eq!(sel.enabled.len(), 4);
    }

    #[test]
    fn unknown_feature_rejected() {
        assert!(registry().select(&["Nope".to_string()]).is_err());
    }

    #[test]
    fn duplicate_registration_rejected() {
        let mut r = registry();
        assert!(r.register(Scaled::shared("A", &[], 1.0)).is_err());
    }
}
