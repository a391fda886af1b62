use anyhow::Result;
use clap::Parser;
use mf_core::config::PipelineConfig;

pub mod batch;
pub mod cli;

fn main() -> Result<()> {
    // 1. Parse CLI
    let cli = cli::Cli::parse();

    // 2. Logging
    env_logger::Builder::new()
        .filter_level(cli.log_level.parse().unwrap_or(log::LevelFilter::Warn))
        .init();

    // 3. Validate the request
    cli.validate_source()?;
    cli.validate_outputs()?;

    // 4. Configuration, then CLI overrides
    let mut config = resolve_config(&cli)?;
    cli.apply_overrides(&mut config);

    if cli.list_features {
        return batch::list_features(cli.lyrics.is_some(), &config);
    }

    let outputs = batch::Outputs {
        values: cli.values.clone(),
        aggregates: cli.aggregates.clone(),
        definitions: cli.definitions.clone(),
        word_report: cli.word_report.clone(),
        format: config.output_format,
        overwrite: config.overwrite,
    };

    // 5. Run the batch
    if let Some(root) = cli.lyrics.as_deref() {
        log::info!("Extracting lyric features from {}", root.display());
        batch::run_lyrics(root, &config, &outputs)
    } else if let Some(root) = cli.audio.as_deref() {
        log::info!("Extracting audio features from {}", root.display());
        batch::run_audio(root, &config, &outputs)
    } else {
        Ok(())
    }
}

/// Loads --config if it exists, otherwise the defaults.
fn resolve_config(cli: &cli::Cli) -> Result<PipelineConfig> {
    if cli.config.exists() {
        mf_core::config::load_config(&cli.config)
    } else {
        log::warn!(
            "Config not found: {}. Using defaults.",
            cli.config.display()
        );
        Ok(PipelineConfig::default())
    }
}
