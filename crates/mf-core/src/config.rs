use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::aggregator::AggregatorTemplate;
use crate::engine::FailurePolicy;
use crate::error::CoreError;
use crate::export::OutputFormat;

/// Run configuration for an extraction batch.
///
/// Serializable to TOML. Every field has a usable default.
///
/// # Example
/// ```
/// use mf_core::config::PipelineConfig;
/// let config = PipelineConfig::default();
/// assert_eq!(config.window_size, 512);
/// assert!(config.enabled_features.is_empty());
/// ```
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
pub struct PipelineConfig {
    // === Extraction ===
    /// Samples per analysis window [32, 65536].
    pub window_size: usize,
    /// Fraction of each window shared with the next [0.0, 0.9].
    pub window_overlap: f64,
    /// What to do when an item fails.
    pub failure_policy: FailurePolicy,
    /// Process items on the rayon pool.
    pub parallel: bool,

    // === Selection ===
    /// Features to save. Empty = every registered feature.
    pub enabled_features: Vec<String>,
    /// Aggregators applied to every item.
    pub aggregators: Vec<AggregatorSpec>,
    /// Keyword profiles added to the built-in ones.
    pub profiles: Vec<ProfileSpec>,

    // === Output ===
    pub output_format: OutputFormat,
    /// Allow replacing existing output files.
    pub overwrite: bool,
}

/// An aggregator as named in the configuration file.
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq, Eq)]
pub struct AggregatorSpec {
    pub name: String,
    #[serde(default)]
    pub features: Vec<String>,
    #[serde(default)]
    pub parameters: Vec<String>,
}

/// A named keyword list for word-profile matching.
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq, Eq)]
pub struct ProfileSpec {
    pub name: String,
    pub keywords: Vec<String>,
}

impl AggregatorSpec {
    #[must_use]
    pub fn named(name: &str) -> Self {
        Self {
            name: name.to_string(),
            features: Vec::new(),
            parameters: Vec::new(),
        }
    }

    /// Instantiates and configures the template.
    ///
    /// # Errors
    /// Returns an error on an unknown name or invalid parameters.
    pub fn build(&self) -> Result<AggregatorTemplate, CoreError> {
        let mut template = AggregatorTemplate::by_name(&self.name)?;
        template.set_parameters(&self.features, &self.parameters)?;
        Ok(template)
    }
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            window_size: 512,
            window_overlap: 0.0,
            failure_policy: FailurePolicy::Abort,
            parallel: true,
            enabled_features: Vec::new(),
            aggregators: vec![
                AggregatorSpec::named("Mean"),
                AggregatorSpec::named("Standard Deviation"),
            ],
            profiles: Vec::new(),
            output_format: OutputFormat::Ace,
            overwrite: false,
        }
    }
}

impl PipelineConfig {
    /// Clamp all numeric fields to their valid ranges.
    /// Called after TOML deserialization to prevent out-of-range values.
    pub fn clamp_all(&mut self) {
        self.window_size = self.window_size.clamp(32, 65536);
        self.window_overlap = self.window_overlap.clamp(0.0, 0.9);
    }

    /// Builds every configured aggregator.
    ///
    /// # Errors
    /// Returns the first aggregator that fails to configure.
    pub fn build_aggregators(&self) -> Result<Vec<AggregatorTemplate>, CoreError> {
        self.aggregators.iter().map(AggregatorSpec::build).collect()
    }
}

/// Intermediate TOML layout, every section optional for partial override.
#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct ConfigFile {
    extraction: Option<ExtractionSection>,
    features: Option<FeaturesSection>,
    aggregators: Option<Vec<AggregatorSpec>>,
    profiles: Option<Vec<ProfileSpec>>,
    output: Option<OutputSection>,
}

#[derive(Deserialize)]
struct ExtractionSection {
    window_size: Option<usize>,
    window_overlap: Option<f64>,
    failure_policy: Option<FailurePolicy>,
    parallel: Option<bool>,
}

#[derive(Deserialize)]
struct FeaturesSection {
    enabled: Option<Vec<String>>,
}

#[derive(Deserialize)]
struct OutputSection {
    format: Option<OutputFormat>,
    overwrite: Option<bool>,
}

/// Loads a TOML file and merges it over the defaults.
///
/// # Errors
/// Returns an error if the file cannot be read or parsed.
///
/// # Example
/// ```no_run
/// use mf_core::config::load_config;
/// use std::path::Path;
/// let config = load_config(Path::new("config/default.toml")).unwrap();
/// ```
pub fn load_config(path: &Path) -> Result<PipelineConfig> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Cannot read {}", path.display()))?;
    parse_config(&content).with_context(|| format!("Invalid configuration in {}", path.display()))
}

/// Parses TOML text and merges it over the defaults.
///
/// # Errors
/// Returns an error if the text is not valid TOML for this layout.
pub fn parse_config(content: &str) -> Result<PipelineConfig> {
    let file: ConfigFile = toml::from_str(content).context("TOML parse error")?;
    let mut config = PipelineConfig::default();

    if let Some(e) = file.extraction {
        if let Some(v) = e.window_size {
            config.window_size = v;
        }
        if let Some(v) = e.window_overlap {
            config.window_overlap = v;
        }
        if let Some(v) = e.failure_policy {
            config.failure_policy = v;
        }
        if let Some(v) = e.parallel {
            config.parallel = v;
        }
    }
    if let Some(v) = file.features.and_then(|f| f.enabled) {
        config.enabled_features = v;
    }
    if let Some(v) = file.aggregators {
        config.aggregators = v;
    }
    if let Some(v) = file.profiles {
        config.profiles = v;
    }
    if let Some(o) = file.output {
        if let Some(v) = o.format {
            config.output_format = v;
        }
        if let Some(v) = o.overwrite {
            config.overwrite = v;
        }
    }

    config.clamp_all();
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_file_gives_defaults() {
        assert_eq!(parse_config("").unwrap(), PipelineConfig::default());
    }

    #[test]
    fn sections_override_and_clamp() {
        let config = parse_config(
            r#"
            [extraction]
            window_size = 8
            window_overlap = 2.0
            failure_policy = "skip_item"

            [features]
            enabled = ["Number of Words"]

            [[aggregators]]
            name = "Area Moments"
            features = ["Number of Words"]

            [[profiles]]
            name = "Folk"
            keywords = ["river", "home"]

            [output]
            format = "arff"
            "#,
        )
        .unwrap();
        assert_eq!(config.window_size, 32);
        assert!((config.window_overlap - 0.9).abs() < f64::EPSILON);
        assert_eq!(config.failure_policy, FailurePolicy::SkipItem);
        assert!(config.parallel);
        assert_eq!(config.enabled_features, vec!["Number of Words"]);
        assert_eq!(config.aggregators.len(), 1);
        assert_eq!(config.profiles[0].keywords, vec!["river", "home"]);
        assert_eq!(config.output_format, OutputFormat::Arff);
        assert!(config.build_aggregators().is_ok());
    }

    #[test]
    fn shipped_default_matches_builtin() {
        let shipped = parse_config(include_str!("../../../config/default.toml")).unwrap();
        assert_eq!(shipped, PipelineConfig::default());
    }

    #[test]
    fn unknown_section_is_rejected() {
        assert!(parse_config("[render]\nfps = 30\n").is_err());
    }

    #[test]
    fn bad_aggregator_parameters_fail_to_build() {
        let config = parse_config(
            r#"
            [[aggregators]]
            name = "Multiple Feature Histogram"
            features = ["A"]
            parameters = ["lots"]
            "#,
        )
        .unwrap();
        assert!(matches!(
            config.build_aggregators(),
            Err(CoreError::Configuration(_))
        ));
    }

    #[test]
    fn load_reads_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("mirfeat.toml");
        std::fs::write(&path, "[output]\nformat = \"json\"\noverwrite = true\n").unwrap();
        let config = load_config(&path).unwrap();
        assert_eq!(config.output_format, OutputFormat::Json);
        assert!(config.overwrite);
        assert!(load_config(&dir.path().join("missing.toml")).is_err());
    }
}
