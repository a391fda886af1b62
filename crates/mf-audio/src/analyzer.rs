use std::path::{Path, PathBuf};

use mf_core::corpus::{item_id, scan_files};
use mf_core::engine::ExtractionEngine;
use mf_core::error::CoreError;
use mf_core::matrix::FeatureMatrix;
use mf_core::traits::Item;

use crate::decode::AUDIO_EXTENSIONS;
use crate::fft::FftPipeline;
use crate::window::{AudioWindow, Recording, hop_size};

/// Feature name reported when a file cannot be decoded.
pub const DECODING_STAGE: &str = "Audio Decoding";

/// An audio file waiting to be analysed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AudioSource {
    id: String,
    path: PathBuf,
}

impl AudioSource {
    #[must_use]
    pub fn new(id: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        Self {
            id: id.into(),
            path: path.into(),
        }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Item for AudioSource {
    fn id(&self) -> &str {
        &self.id
    }
}

/// Lists the audio files under `root`.
///
/// # Errors
/// Returns an error if `root` cannot be read or holds no audio file.
pub fn scan_sources(root: &Path) -> anyhow::Result<Vec<AudioSource>> {
    Ok(scan_files(root, AUDIO_EXTENSIONS)?
        .into_iter()
        .map(|path| AudioSource::new(item_id(root, &path), path))
        .collect())
}

/// Splits recordings into analysis windows and runs an engine over them.
///
/// Holds no FFT state so one analyzer can be shared across threads; each
/// call plans its own transform.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RecordingAnalyzer {
    window_size: usize,
    hop: usize,
}

impl RecordingAnalyzer {
    /// # Panics
    /// Panics if `window_size` is 0.
    ///
    /// # Example
    /// ```
    /// use mf_audio::analyzer::RecordingAnalyzer;
    /// let analyzer = RecordingAnalyzer::new(512, 0.5);
    /// assert_eq!(analyzer.hop(), 256);
    /// ```
    #[must_use]
    pub fn new(window_size: usize, overlap: f64) -> Self {
        assert!(window_size > 0, "window size must be positive");
        Self {
            window_size,
            hop: hop_size(window_size, overlap),
        }
    }

    #[must_use]
    pub fn window_size(&self) -> usize {
        self.window_size
    }

    #[must_use]
    pub fn hop(&self) -> usize {
        self.hop
    }

    #[must_use]
    pub fn windows(&self, recording: &Recording) -> Vec<AudioWindow> {
        let mut fft = FftPipeline::new(self.window_size);
        recording.windows(&mut fft, self.hop)
    }

    /// Extracts the per-window features of a decoded recording.
    ///
    /// # Errors
    /// Returns [`CoreError::EmptyInput`] for a recording without samples and
    /// the engine's error if a feature fails.
    pub fn analyze(
        &self,
        engine: &ExtractionEngine<AudioWindow>,
        recording: &Recording,
    ) -> Result<FeatureMatrix, CoreError> {
        let windows = self.windows(recording);
        if windows.is_empty() {
            return Err(CoreError::EmptyInput(format!(
                "{} has no samples",
                recording.id()
            )));
        }
        log::debug!(
            "{}: {} window(s) of {} @ hop {}, {} Hz",
            recording.id(),
            windows.len(),
            self.window_size,
            self.hop,
            recording.sample_rate()
        );
        engine.extract_windows(recording.id(), &windows)
    }

    /// Decodes and analyses one file.
    ///
    /// # Errors
    /// A decoding failure is reported as [`CoreError::ExtractionFailure`]
    /// under the feature name [`DECODING_STAGE`].
    pub fn analyze_source(
        &self,
        engine: &ExtractionEngine<AudioWindow>,
        source: &AudioSource,
    ) -> Result<FeatureMatrix, CoreError> {
        let recording = Recording::from_file(source.id(), source.path()).map_err(|e| {
            CoreError::ExtractionFailure {
                item: source.id().to_string(),
                feature: DECODING_STAGE.to_string(),
                reason: format!("{e:#}"),
            }
        })?;
        self.analyze(engine, &recording)
    }
}
