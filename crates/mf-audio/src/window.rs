use std::path::Path;

use anyhow::Result;
use mf_core::traits::Item;

use crate::decode::decode_file;
use crate::fft::FftPipeline;

/// A decoded mono recording.
#[derive(Debug, Clone, PartialEq)]
pub struct Recording {
    id: String,
    samples: Vec<f32>,
    sample_rate: u32,
}

/// One analysis window: its samples, their magnitude spectrum and the
/// sample rate they were taken at.
#[derive(Debug, Clone, PartialEq)]
pub struct AudioWindow {
    pub samples: Vec<f64>,
    pub spectrum: Vec<f64>,
    pub sample_rate: f64,
}

impl Recording {
    #[must_use]
    pub fn new(id: impl Into<String>, samples: Vec<f32>, sample_rate: u32) -> Self {
        Self {
            id: id.into(),
            samples,
            sample_rate,
        }
    }

    /// Decodes an audio file.
    ///
    /// # Errors
    /// Returns an error if the file cannot be decoded.
    pub fn from_file(id: impl Into<String>, path: &Path) -> Result<Self> {
        let (samples, sample_rate) = decode_file(path)?;
        Ok(Self::new(id, samples, sample_rate))
    }

    #[must_use]
    pub fn samples(&self) -> &[f32] {
        &self.samples
    }

    #[must_use]
    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Splits the recording into windows of `fft.fft_size()` samples, each
    /// starting `hop` samples after the previous one. The last window is
    /// zero-padded.
    ///
    /// # Example
    /// ```
    /// use mf_audio::fft::FftPipeline;
    /// use mf_audio::window::Recording;
    /// let rec = Recording::new("r", vec![0.0; 100], 8000);
    /// let windows = rec.windows(&mut FftPipeline::new(32), 16);
    /// assert_eq!(windows.len(), 7);
    /// assert_eq!(windows[6].samples.len(), 32);
    /// ```
    #[must_use]
    pub fn windows(&self, fft: &mut FftPipeline, hop: usize) -> Vec<AudioWindow> {
        let size = fft.fft_size();
        let hop = hop.clamp(1, size);
        let count = self.samples.len().div_ceil(hop);
        let mut windows = Vec::with_capacity(count);
        for i in 0..count {
            let start = i * hop;
            let end = (start + size).min(self.samples.len());
            let mut samples: Vec<f64> = self.samples[start..end].iter().map(|&s| f64::from(s)).collect();
            samples.resize(size, 0.0);
            let spectrum = fft.process(&samples);
            windows.push(AudioWindow {
                samples,
                spectrum,
                sample_rate: f64::from(self.sample_rate),
            });
        }
        windows
    }
}

/// Hop length for a window size and overlap fraction.
///
/// # Example
/// ```
/// use mf_audio::window::hop_size;
/// assert_eq!(hop_size(512, 0.0), 512);
/// assert_eq!(hop_size(512, 0.5), 256);
/// ```
#[must_use]
#[allow(
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss,
    clippy::cast_precision_loss
)]
pub fn hop_size(window_size: usize, overlap: f64) -> usize {
    let shared = (overlap.clamp(0.0, 1.0) * window_size as f64) as usize;
    window_size.saturating_sub(shared).max(1)
}

impl Item for Recording {
    fn id(&self) -> &str {
        &self.id
    }
}
