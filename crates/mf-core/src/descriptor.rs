use serde::{Deserialize, Serialize};

/// Identity and metadata of one extractable quantity.
///
/// A `dimensions` of 0 means the width depends on the analysed data.
///
/// # Example
/// ```
/// use mf_core::descriptor::FeatureDescriptor;
/// let d = FeatureDescriptor::new("Number of Words", "Total words.", false, 1);
/// assert_eq!(d.dimensions, 1);
/// assert!(!d.is_variable());
/// ```
#[derive(Clone, Debug, PartialEq, Eq, Hash, Deserialize, Serialize)]
pub struct FeatureDescriptor {
    /// Unique feature name.
    pub name: String,
    /// Human readable description.
    pub description: String,
    /// Defined per window (true) or per whole item (false).
    pub is_sequential: bool,
    /// Output vector width. 0 = variable.
    pub dimensions: usize,
}

impl FeatureDescriptor {
    #[must_use]
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        is_sequential: bool,
        dimensions: usize,
    ) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            is_sequential,
            dimensions,
        }
    }

    /// Whether the output width is only known once data is seen.
    #[must_use]
    pub fn is_variable(&self) -> bool {
        self.dimensions == 0
    }
}

/// Identity of an aggregation strategy.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize, Serialize)]
pub struct AggregatorDefinition {
    /// Strategy name, used to look templates up from configuration.
    pub name: String,
    /// Human readable description.
    pub description: String,
    /// Generic aggregators apply once per feature; specific ones jointly.
    pub is_generic: bool,
    /// Names of the string parameters accepted by `set_parameters`.
    pub parameters: Vec<String>,
}

impl AggregatorDefinition {
    #[must_use]
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        is_generic: bool,
        parameters: &[&str],
    ) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            is_generic,
            parameters: parameters.iter().map(|p| (*p).to_string()).collect(),
        }
    }
}
