use std::path::PathBuf;

use clap::Parser;
use mf_core::config::PipelineConfig;
use mf_core::engine::FailurePolicy;
use mf_core::export::OutputFormat;

/// mirfeat: batch feature extraction from song lyrics and audio recordings.
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Lyrics source: a .txt file or a folder scanned recursively.
    #[arg(long)]
    pub lyrics: Option<PathBuf>,

    /// Audio source: an audio file or a folder scanned recursively.
    #[arg(long)]
    pub audio: Option<PathBuf>,

    /// TOML configuration file. Default: config/default.toml.
    #[arg(short, long, default_value = "config/default.toml")]
    pub config: PathBuf,

    /// Output file for the per-window feature values.
    #[arg(long)]
    pub values: Option<PathBuf>,

    /// Output file for the aggregated per-item values.
    #[arg(long)]
    pub aggregates: Option<PathBuf>,

    /// ACE XML file describing every saved feature.
    #[arg(long)]
    pub definitions: Option<PathBuf>,

    /// Word-frequency report over the lyrics corpus.
    #[arg(long)]
    pub word_report: Option<PathBuf>,

    /// Output format: ace, arff, csv, json.
    #[arg(long)]
    pub format: Option<OutputFormat>,

    /// Replace existing output files.
    #[arg(long, default_value_t = false)]
    pub overwrite: bool,

    /// Features to save, comma separated. Overrides the configuration.
    #[arg(long, value_delimiter = ',')]
    pub features: Vec<String>,

    /// Print the available features and aggregators, then exit.
    #[arg(long, default_value_t = false)]
    pub list_features: bool,

    /// Samples per analysis window (audio).
    #[arg(long)]
    pub window_size: Option<usize>,

    /// Fraction of each window shared with the next (audio).
    #[arg(long)]
    pub overlap: Option<f64>,

    /// Log and skip items that fail instead of aborting.
    #[arg(long, default_value_t = false)]
    pub skip_failures: bool,

    /// Process items one at a time.
    #[arg(long, default_value_t = false)]
    pub sequential: bool,

    /// Log level: error, warn, info, debug, trace.
    #[arg(long, default_value = "warn")]
    pub log_level: String,
}

impl Cli {
    /// Validate that exactly one source is provided.
    ///
    /// # Errors
    /// Returns an error if zero or more than one source is specified.
    pub fn validate_source(&self) -> anyhow::Result<()> {
        let count = usize::from(self.lyrics.is_some()) + usize::from(self.audio.is_some());
        if count == 0 {
            anyhow::bail!("No source given. Use --lyrics or --audio.");
        }
        if count > 1 {
            anyhow::bail!("One source at a time: --lyrics OR --audio.");
        }
        Ok(())
    }

    /// Validate that a batch run has somewhere to write.
    ///
    /// # Errors
    /// Returns an error if no output is requested, or a word report is
    /// requested for audio.
    pub fn validate_outputs(&self) -> anyhow::Result<()> {
        if self.list_features {
            return Ok(());
        }
        if self.word_report.is_some() && self.audio.is_some() {
            anyhow::bail!("--word-report only applies to --lyrics.");
        }
        if self.values.is_none()
            && self.aggregates.is_none()
            && self.definitions.is_none()
            && self.word_report.is_none()
        {
            anyhow::bail!(
                "Nothing to write. Use --values, --aggregates, --definitions or --word-report."
            );
        }
        Ok(())
    }

    /// Applies command-line overrides on top of the file configuration.
    pub fn apply_overrides(&self, config: &mut PipelineConfig) {
        if let Some(size) = self.window_size {
            config.window_size = size;
        }
        if let Some(overlap) = self.overlap {
            config.window_overlap = overlap;
        }
        if let Some(format) = self.format {
            config.output_format = format;
        }
        if self.overwrite {
            config.overwrite = true;
        }
        if !self.features.is_empty() {
            config.enabled_features.clone_from(&self.features);
        }
        if self.skip_failures {
            config.failure_policy = FailurePolicy::SkipItem;
        }
        if self.sequential {
            config.parallel = false;
        }
        config.clamp_all();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Cli {
        Cli::try_parse_from(std::iter::once("mirfeat").chain(args.iter().copied())).unwrap()
    }

    #[test]
    fn exactly_one_source() {
        assert!(parse(&["--values", "v.xml"]).validate_source().is_err());
        assert!(
            parse(&["--lyrics", "a", "--audio", "b"])
                .validate_source()
                .is_err()
        );
        assert!(parse(&["--lyrics", "a"]).validate_source().is_ok());
    }

    #[test]
    fn outputs_are_required_unless_listing() {
        assert!(parse(&["--audio", "a"]).validate_outputs().is_err());
        assert!(
            parse(&["--audio", "a", "--list-features"])
                .validate_outputs()
                .is_ok()
        );
        assert!(
            parse(&["--audio", "a", "--word-report", "r.txt"])
                .validate_outputs()
                .is_err()
        );
        assert!(
            parse(&["--lyrics", "a", "--word-report", "r.txt"])
                .validate_outputs()
                .is_ok()
        );
    }

    #[test]
    fn overrides_win_and_are_clamped() {
        let cli = parse(&[
            "--audio",
            "a",
            "--window-size",
            "8",
            "--overlap",
            "0.5",
            "--format",
            "arff",
            "--features",
            "Spectral Flux,Root Mean Square",
            "--skip-failures",
            "--sequential",
        ]);
        let mut config = PipelineConfig::default();
        cli.apply_overrides(&mut config);
        assert_eq!(config.window_size, 32);
        assert!((config.window_overlap - 0.5).abs() < f64::EPSILON);
        assert_eq!(config.output_format, OutputFormat::Arff);
        assert_eq!(
            config.enabled_features,
            vec!["Spectral Flux".to_string(), "Root Mean Square".to_string()]
        );
        assert_eq!(config.failure_policy, FailurePolicy::SkipItem);
        assert!(!config.parallel);
    }

    #[test]
    fn unknown_format_is_rejected() {
        let r = Cli::try_parse_from(["mirfeat", "--audio", "a", "--format", "midi"]);
        assert!(r.is_err());
    }
}
