use thiserror::Error;

/// Errors originating from the core pipeline.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum CoreError {
    /// Invalid parameter, unknown name, or mismatched selection.
    #[error("Invalid configuration: {0}")]
    Configuration(String),

    /// Features whose dependencies can never be satisfied (cycle or unknown name).
    #[error("Unresolvable feature dependencies among: {}", remaining.join(", "))]
    UnresolvableDependency {
        /// Names of the features left unordered.
        remaining: Vec<String>,
    },

    /// A feature failed on a specific item.
    #[error("Feature '{feature}' failed on item '{item}': {reason}")]
    ExtractionFailure {
        /// Identifier of the item being processed.
        item: String,
        /// Name of the failing feature.
        feature: String,
        /// Human readable cause.
        reason: String,
    },

    /// Nothing left to process after parsing or filtering.
    #[error("No input to process: {0}")]
    EmptyInput(String),
}

impl CoreError {
    /// Shorthand for [`CoreError::Configuration`].
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Configuration(msg.into())
    }
}
