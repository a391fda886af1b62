use crate::aggregator::{Aggregate, AggregatorTemplate, Binding, EnabledFeature};
use crate::descriptor::FeatureDescriptor;
use crate::error::CoreError;
use crate::matrix::FeatureMatrix;

/// Holds the aggregator templates and the enabled features, and keeps the
/// list of bindings between them up to date.
///
/// # Example
/// ```
/// use mf_core::aggregator::AggregatorTemplate;
/// use mf_core::container::AggregatorContainer;
/// use mf_core::descriptor::FeatureDescriptor;
///
/// let mut c = AggregatorContainer::new();
/// c.set_aggregators(vec![AggregatorTemplate::by_name("Mean").unwrap()]);
/// let features = [
///     FeatureDescriptor::new("A", "", true, 1),
///     FeatureDescriptor::new("B", "", true, 1),
/// ];
/// c.set_features(&features, Some(&[false, true][..])).unwrap();
/// assert_eq!(c.definitions()[0].name, "B Overall Average");
/// ```
#[derive(Debug, Clone, Default)]
pub struct AggregatorContainer {
    templates: Vec<AggregatorTemplate>,
    features: Vec<EnabledFeature>,
    bindings: Vec<Binding>,
}

impl AggregatorContainer {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces the templates and rebuilds the bindings.
    pub fn set_aggregators(&mut self, templates: Vec<AggregatorTemplate>) {
        self.templates = templates;
        self.rebuild();
    }

    /// Sets the features matrices will carry, one per column in order.
    /// `enabled` masks which of them are aggregated; `None` enables all.
    ///
    /// # Errors
    /// Returns [`CoreError::Configuration`] if the mask length differs from
    /// the number of descriptors.
    pub fn set_features(
        &mut self,
        descriptors: &[FeatureDescriptor],
        enabled: Option<&[bool]>,
    ) -> Result<(), CoreError> {
        if let Some(mask) = enabled
            && mask.len() != descriptors.len()
        {
            return Err(CoreError::config(format!(
                "feature mask has {} entries for {} features",
                mask.len(),
                descriptors.len()
            )));
        }
        self.features = descriptors
            .iter()
            .enumerate()
            .filter(|(i, _)| enabled.is_none_or(|mask| mask[*i]))
            .map(|(column, d)| EnabledFeature {
                column,
                descriptor: d.clone(),
            })
            .collect();
        self.rebuild();
        Ok(())
    }

    #[must_use]
    pub fn templates(&self) -> &[AggregatorTemplate] {
        &self.templates
    }

    #[must_use]
    pub fn bindings(&self) -> &[Binding] {
        &self.bindings
    }

    /// Output descriptors, one per binding.
    #[must_use]
    pub fn definitions(&self) -> Vec<FeatureDescriptor> {
        self.bindings.iter().map(|b| b.descriptor.clone()).collect()
    }

    /// Aggregates one item's matrix, one result per binding.
    ///
    /// # Errors
    /// Returns [`CoreError::Configuration`] if the matrix does not have the
    /// columns the bindings were built for.
    pub fn aggregate(&self, matrix: &FeatureMatrix) -> Result<Vec<Aggregate>, CoreError> {
        self.bindings
            .iter()
            .map(|b| self.templates[b.template].aggregate(matrix, &b.columns))
            .collect()
    }

    fn rebuild(&mut self) {
        self.bindings.clear();
        if self.features.is_empty() {
            return;
        }
        for (id, template) in self.templates.iter().enumerate() {
            match template.bind(id, &self.features) {
                Ok(bound) => self.bindings.extend(bound),
                Err(e) => log::debug!("Skipping aggregator: {e}"),
            }
        }
        log::debug!(
            "{} aggregator binding(s) over {} feature(s)",
            self.bindings.len(),
            self.features.len()
        );
    }
}
