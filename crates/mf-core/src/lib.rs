//! Core types and algorithms for mirfeat.
//!
//! Feature descriptors and extractors, dependency ordering, the extraction
//! engine, aggregation and the configuration and output layers shared by
//! the lyrics and audio front ends.

pub mod aggregator;
pub mod config;
pub mod container;
pub mod corpus;
pub mod descriptor;
pub mod engine;
pub mod error;
pub mod export;
pub mod matrix;
pub mod registry;
pub mod resolver;
pub mod traits;

pub use aggregator::{AggregatorTemplate, Binding};
pub use config::PipelineConfig;
pub use container::AggregatorContainer;
pub use descriptor::{AggregatorDefinition, FeatureDescriptor};
pub use engine::{ExternalData, ExtractionEngine, FailurePolicy};
pub use error::CoreError;
pub use matrix::FeatureMatrix;
pub use registry::{FeatureRegistry, Selection, SharedExtractor};
pub use traits::{FeatureExtractor, FeatureInputs, Item};
