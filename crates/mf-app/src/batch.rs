use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use mf_audio::analyzer::{RecordingAnalyzer, scan_sources};
use mf_audio::features::audio_registry;
use mf_core::aggregator::AggregatorTemplate;
use mf_core::config::PipelineConfig;
use mf_core::container::AggregatorContainer;
use mf_core::descriptor::FeatureDescriptor;
use mf_core::engine::{ExternalData, ExtractionEngine, Processed, process_items};
use mf_core::export::{OutputFormat, Record, save_definitions, save_records, verify_can_save};
use mf_core::matrix::FeatureMatrix;
use mf_core::registry::FeatureRegistry;
use mf_lyrics::corpus::load_corpus;
use mf_lyrics::features::lyrics_registry;
use mf_lyrics::frequency::WordFrequencyProfile;
use mf_lyrics::profile::{WordProfile, profile_data};

/// Where a batch writes its results.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Outputs {
    pub values: Option<PathBuf>,
    pub aggregates: Option<PathBuf>,
    pub definitions: Option<PathBuf>,
    pub word_report: Option<PathBuf>,
    pub format: OutputFormat,
    pub overwrite: bool,
}

impl Outputs {
    fn paths(&self) -> impl Iterator<Item = &PathBuf> {
        [
            &self.values,
            &self.aggregates,
            &self.definitions,
            &self.word_report,
        ]
        .into_iter()
        .flatten()
    }

    /// Checks every requested path before any extraction work starts.
    ///
    /// # Errors
    /// Returns an error for the first path that cannot be written, or if two
    /// outputs share a path.
    pub fn verify(&self) -> Result<()> {
        let paths: Vec<&PathBuf> = self.paths().collect();
        for (i, path) in paths.iter().enumerate() {
            if paths[..i].contains(path) {
                anyhow::bail!("{} is requested for two outputs", path.display());
            }
            verify_can_save(path, self.overwrite)?;
        }
        Ok(())
    }

    fn wants_features(&self) -> bool {
        self.values.is_some() || self.aggregates.is_some() || self.definitions.is_some()
    }
}

/// An engine ready to run, with the aggregation it feeds.
struct Prepared<I> {
    engine: ExtractionEngine<I>,
    descriptors: Vec<FeatureDescriptor>,
    mask: Vec<bool>,
    container: AggregatorContainer,
}

fn prepare<I>(
    registry: &FeatureRegistry<I>,
    config: &PipelineConfig,
    external: &ExternalData,
) -> Result<Prepared<I>> {
    let selection = registry.select(&config.enabled_features)?;
    let engine = ExtractionEngine::new(selection.extractors, external)?;
    let descriptors = engine.descriptors();
    let mask = engine.mask_for(&selection.enabled);

    let mut container = AggregatorContainer::new();
    container.set_aggregators(config.build_aggregators()?);
    container.set_features(&descriptors, Some(&mask))?;
    log::info!(
        "{} feature(s) extracted, {} saved, {} aggregate(s)",
        descriptors.len(),
        mask.iter().filter(|m| **m).count(),
        container.bindings().len()
    );
    Ok(Prepared {
        engine,
        descriptors,
        mask,
        container,
    })
}

/// Keyword profiles in effect: the built-in ones plus the configured ones.
///
/// # Errors
/// Returns an error if a configured profile is blank.
pub fn profiles(config: &PipelineConfig) -> Result<Vec<WordProfile>> {
    let extra = config
        .profiles
        .iter()
        .map(|p| WordProfile::new(p.name.clone(), p.keywords.clone()))
        .collect::<Result<Vec<_>, _>>()?;
    Ok(WordProfile::with_builtin(extra))
}

/// Extracts lyric features from every `.txt` file under `root`.
///
/// # Errors
/// Returns an error if an output cannot be written, the corpus is empty, the
/// selection is invalid, or an item fails under the abort policy.
pub fn run_lyrics(root: &Path, config: &PipelineConfig, outputs: &Outputs) -> Result<()> {
    outputs.verify()?;
    let songs = load_corpus(root)?;

    if let Some(path) = &outputs.word_report {
        let report = WordFrequencyProfile::build(&songs);
        std::fs::write(path, report.to_string())
            .with_context(|| format!("Cannot write {}", path.display()))?;
        log::info!("Wrote word report to {}", path.display());
    }
    if !outputs.wants_features() {
        return Ok(());
    }

    let profiles = profiles(config)?;
    let prepared = prepare(
        &lyrics_registry(&profiles)?,
        config,
        &profile_data(&profiles),
    )?;
    let items = process_items(&songs, config.failure_policy, config.parallel, |song| {
        prepared.engine.extract_item(song)
    })?;
    write_outputs(outputs, "mirfeat lyrics", &prepared, &items)
}

/// Extracts audio features from every audio file under `root`.
///
/// # Errors
/// Returns an error if an output cannot be written, no audio file is found,
/// the selection is invalid, or an item fails under the abort policy.
pub fn run_audio(root: &Path, config: &PipelineConfig, outputs: &Outputs) -> Result<()> {
    outputs.verify()?;
    let sources = scan_sources(root)?;
    let prepared = prepare(&audio_registry()?, config, &ExternalData::new())?;
    let analyzer = RecordingAnalyzer::new(config.window_size, config.window_overlap);
    log::info!(
        "Analysing {} file(s), window {} hop {}",
        sources.len(),
        analyzer.window_size(),
        analyzer.hop()
    );
    let items = process_items(&sources, config.failure_policy, config.parallel, |source| {
        analyzer.analyze_source(&prepared.engine, source)
    })?;
    write_outputs(outputs, "mirfeat audio", &prepared, &items)
}

/// Identifier of one window's record; single-window items keep their id.
fn window_id(id: &str, window: usize, count: usize) -> String {
    if count == 1 {
        id.to_string()
    } else {
        format!("{id}#{window}")
    }
}

fn value_records(mask: &[bool], items: &[Processed<FeatureMatrix>]) -> Vec<Record> {
    let mut records = Vec::new();
    for item in items {
        let count = item.value.window_count();
        for (w, row) in item.value.rows().iter().enumerate() {
            records.push(Record {
                id: window_id(&item.id, w, count),
                values: row
                    .iter()
                    .zip(mask)
                    .filter(|(_, enabled)| **enabled)
                    .map(|(value, _)| value.clone())
                    .collect(),
            });
        }
    }
    records
}

fn write_outputs<I>(
    outputs: &Outputs,
    relation: &str,
    prepared: &Prepared<I>,
    items: &[Processed<FeatureMatrix>],
) -> Result<()> {
    let saved: Vec<FeatureDescriptor> = prepared
        .descriptors
        .iter()
        .zip(&prepared.mask)
        .filter(|(_, enabled)| **enabled)
        .map(|(d, _)| d.clone())
        .collect();
    let aggregated = prepared.container.definitions();

    if let Some(path) = &outputs.values {
        let records = value_records(&prepared.mask, items);
        save_records(path, outputs.format, relation, &saved, &records)?;
    }
    if let Some(path) = &outputs.aggregates {
        let records = items
            .iter()
            .map(|item| -> Result<Record> {
                Ok(Record {
                    id: item.id.clone(),
                    values: prepared.container.aggregate(&item.value)?,
                })
            })
            .collect::<Result<Vec<_>>>()?;
        save_records(path, outputs.format, relation, &aggregated, &records)?;
    }
    if let Some(path) = &outputs.definitions {
        let mut all = saved;
        all.extend(aggregated);
        save_definitions(path, &all)?;
        log::info!("Wrote {} definition(s) to {}", all.len(), path.display());
    }
    Ok(())
}

/// Prints the features a source offers and the aggregator catalog.
///
/// # Errors
/// Returns an error if the registry cannot be built.
pub fn list_features(lyrics: bool, config: &PipelineConfig) -> Result<()> {
    let descriptors: Vec<FeatureDescriptor> = if lyrics {
        lyrics_registry(&profiles(config)?)?
            .descriptors()
            .cloned()
            .collect()
    } else {
        audio_registry()?.descriptors().cloned().collect()
    };
    println!("Features:");
    for d in &descriptors {
        let dims = if d.is_variable() {
            "variable".to_string()
        } else {
            d.dimensions.to_string()
        };
        println!("  {} [{dims}]: {}", d.name, d.description);
    }
    println!("Aggregators:");
    for template in AggregatorTemplate::catalog() {
        let def = template.definition();
        let kind = if def.is_generic { "generic" } else { "specific" };
        println!("  {} ({kind}): {}", def.name, def.description);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use mf_core::config::AggregatorSpec;
    use mf_core::engine::FailurePolicy;
    use mf_core::error::CoreError;

    use super::*;

    fn corpus() -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("one.txt"), "baby baby blues\nyeah\n").unwrap();
        std::fs::write(dir.path().join("two.txt"), "").unwrap();
        dir
    }

    fn lyrics_config(features: &[&str]) -> PipelineConfig {
        PipelineConfig {
            enabled_features: features.iter().map(|s| (*s).to_string()).collect(),
            aggregators: vec![AggregatorSpec::named("Mean")],
            parallel: false,
            ..PipelineConfig::default()
        }
    }

    #[test]
    fn lyrics_batch_writes_values_and_aggregates() {
        let dir = corpus();
        let out = tempfile::tempdir().unwrap();
        let outputs = Outputs {
            values: Some(out.path().join("values.csv")),
            aggregates: Some(out.path().join("overall.csv")),
            definitions: Some(out.path().join("defs.xml")),
            format: OutputFormat::Csv,
            ..Outputs::default()
        };
        let config = lyrics_config(&["Number of Words", "Word Variety"]);
        run_lyrics(dir.path(), &config, &outputs).unwrap();

        let values = std::fs::read_to_string(out.path().join("values.csv")).unwrap();
        let lines: Vec<&str> = values.lines().collect();
        // Unique Words is pulled in as a dependency but not saved.
        assert_eq!(lines[0], "identifier,Number of Words,Word Variety");
        assert_eq!(lines[1], "one,4,1.3333333333333333");
        assert_eq!(lines[2], "two,0,0");

        let overall = std::fs::read_to_string(out.path().join("overall.csv")).unwrap();
        assert!(overall.starts_with(
            "identifier,Number of Words Overall Average,Word Variety Overall Average"
        ));
        let defs = std::fs::read_to_string(out.path().join("defs.xml")).unwrap();
        assert!(defs.contains("Word Variety Overall Average"));
    }

    #[test]
    fn word_report_alone_skips_extraction() {
        let dir = corpus();
        let out = tempfile::tempdir().unwrap();
        let outputs = Outputs {
            word_report: Some(out.path().join("words.txt")),
            ..Outputs::default()
        };
        run_lyrics(dir.path(), &lyrics_config(&[]), &outputs).unwrap();
        let report = std::fs::read_to_string(out.path().join("words.txt")).unwrap();
        assert!(report.contains("Songs with lyrics: 1"));
        assert!(report.contains("baby\t2"));
    }

    #[test]
    fn existing_output_is_refused_before_work() {
        let out = tempfile::tempdir().unwrap();
        let path = out.path().join("values.xml");
        std::fs::write(&path, "keep me").unwrap();
        let outputs = Outputs {
            values: Some(path.clone()),
            ..Outputs::default()
        };
        // The source does not exist: the output check must fail first.
        let err = run_lyrics(Path::new("/nonexistent"), &lyrics_config(&[]), &outputs).unwrap_err();
        assert!(err.downcast_ref::<CoreError>().is_some());
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "keep me");
    }

    #[test]
    fn non_utf8_lyrics_do_not_stop_the_batch() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("good.txt"), "au lait\n").unwrap();
        std::fs::write(dir.path().join("latin1.txt"), b"caf\xe9 au lait\n").unwrap();
        let out = tempfile::tempdir().unwrap();
        let outputs = Outputs {
            values: Some(out.path().join("values.csv")),
            format: OutputFormat::Csv,
            ..Outputs::default()
        };
        let config = PipelineConfig {
            failure_policy: FailurePolicy::SkipItem,
            ..lyrics_config(&["Number of Words"])
        };
        run_lyrics(dir.path(), &config, &outputs).unwrap();
        let values = std::fs::read_to_string(out.path().join("values.csv")).unwrap();
        let lines: Vec<&str> = values.lines().collect();
        assert_eq!(lines, ["identifier,Number of Words", "good,2", "latin1,3"]);
    }

    #[test]
    fn same_path_twice_is_refused() {
        let outputs = Outputs {
            values: Some(PathBuf::from("out.xml")),
            aggregates: Some(PathBuf::from("out.xml")),
            ..Outputs::default()
        };
        assert!(outputs.verify().is_err());
    }

    #[test]
    fn audio_batch_with_only_bad_files_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("bad.wav"), b"not audio").unwrap();
        let out = tempfile::tempdir().unwrap();
        let outputs = Outputs {
            values: Some(out.path().join("values.xml")),
            ..Outputs::default()
        };
        let config = PipelineConfig {
            failure_policy: FailurePolicy::SkipItem,
            ..PipelineConfig::default()
        };
        let err = run_audio(dir.path(), &config, &outputs).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<CoreError>(),
            Some(CoreError::EmptyInput(_))
        ));
    }

    #[test]
    fn multi_window_records_are_numbered() {
        assert_eq!(window_id("song", 0, 1), "song");
        assert_eq!(window_id("song", 2, 5), "song#2");
    }
}
