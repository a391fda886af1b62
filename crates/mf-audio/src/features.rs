//! Per-window audio features.
//!
//! Spectral features read the magnitude spectrum computed during windowing.
//! Spectral Flux compares each window with the previous one and is therefore
//! absent on the first window.

use std::sync::Arc;

use mf_core::aggregator::sample_variance;
use mf_core::descriptor::FeatureDescriptor;
use mf_core::error::CoreError;
use mf_core::registry::FeatureRegistry;
use mf_core::traits::{FeatureExtractor, FeatureInputs};

use crate::window::AudioWindow;

pub const MAGNITUDE_SPECTRUM: &str = "Magnitude Spectrum";
pub const POWER_SPECTRUM: &str = "Power Spectrum";
pub const ROOT_MEAN_SQUARE: &str = "Root Mean Square";
pub const ZERO_CROSSINGS: &str = "Zero Crossings";
pub const SPECTRAL_CENTROID: &str = "Spectral Centroid";
pub const SPECTRAL_ROLLOFF_POINT: &str = "Spectral Rolloff Point";
pub const SPECTRAL_FLUX: &str = "Spectral Flux";
pub const SPECTRAL_VARIABILITY: &str = "Spectral Variability";
pub const STRONGEST_FREQUENCY_VIA_SPECTRAL_CENTROID: &str =
    "Strongest Frequency Via Spectral Centroid";

/// Fraction of spectral power below the rolloff point.
const ROLLOFF_CUTOFF: f64 = 0.85;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AudioMeasure {
    MagnitudeSpectrum,
    PowerSpectrum,
    RootMeanSquare,
    ZeroCrossings,
    SpectralCentroid,
    SpectralRolloffPoint,
    SpectralFlux,
    SpectralVariability,
    StrongestFrequencyViaSpectralCentroid,
}

impl AudioMeasure {
    pub const ALL: [Self; 9] = [
        Self::MagnitudeSpectrum,
        Self::PowerSpectrum,
        Self::RootMeanSquare,
        Self::ZeroCrossings,
        Self::SpectralCentroid,
        Self::SpectralRolloffPoint,
        Self::SpectralFlux,
        Self::SpectralVariability,
        Self::StrongestFrequencyViaSpectralCentroid,
    ];

    fn name(self) -> &'static str {
        match self {
            Self::MagnitudeSpectrum => MAGNITUDE_SPECTRUM,
            Self::PowerSpectrum => POWER_SPECTRUM,
            Self::RootMeanSquare => ROOT_MEAN_SQUARE,
            Self::ZeroCrossings => ZERO_CROSSINGS,
            Self::SpectralCentroid => SPECTRAL_CENTROID,
            Self::SpectralRolloffPoint => SPECTRAL_ROLLOFF_POINT,
            Self::SpectralFlux => SPECTRAL_FLUX,
            Self::SpectralVariability => SPECTRAL_VARIABILITY,
            Self::StrongestFrequencyViaSpectralCentroid => STRONGEST_FREQUENCY_VIA_SPECTRAL_CENTROID,
        }
    }

    fn description(self) -> &'static str {
        match self {
            Self::MagnitudeSpectrum => {
                "Magnitude of each FFT bin of the Hann-windowed signal, up to the Nyquist frequency."
            }
            Self::PowerSpectrum => "Squared magnitude of each FFT bin.",
            Self::RootMeanSquare => "Root mean square of the window samples, a measure of loudness.",
            Self::ZeroCrossings => "Number of times the signal changes sign within the window.",
            Self::SpectralCentroid => {
                "Centre of mass of the power spectrum, as a bin index. Higher means brighter."
            }
            Self::SpectralRolloffPoint => {
                "Fraction of the spectrum below which 85% of the power lies."
            }
            Self::SpectralFlux => {
                "Sum of squared differences between this window's magnitude spectrum and the \
                 previous one. Absent on the first window."
            }
            Self::SpectralVariability => "Standard deviation of the magnitude spectrum.",
            Self::StrongestFrequencyViaSpectralCentroid => {
                "Frequency in Hz of the spectral centroid."
            }
        }
    }

    fn dimensions(self) -> usize {
        match self {
            Self::MagnitudeSpectrum | Self::PowerSpectrum => 0,
            _ => 1,
        }
    }

    fn dependencies(self) -> &'static [&'static str] {
        match self {
            Self::PowerSpectrum | Self::SpectralFlux | Self::SpectralVariability => {
                &[MAGNITUDE_SPECTRUM]
            }
            Self::SpectralCentroid | Self::SpectralRolloffPoint => &[POWER_SPECTRUM],
            Self::StrongestFrequencyViaSpectralCentroid => &[SPECTRAL_CENTROID, POWER_SPECTRUM],
            _ => &[],
        }
    }

    fn lookback(self) -> usize {
        usize::from(self == Self::SpectralFlux)
    }
}

pub struct AudioFeature {
    measure: AudioMeasure,
    descriptor: FeatureDescriptor,
    dependencies: Vec<String>,
}

impl AudioFeature {
    #[must_use]
    pub fn new(measure: AudioMeasure) -> Self {
        Self {
            measure,
            descriptor: FeatureDescriptor::new(
                measure.name(),
                measure.description(),
                true,
                measure.dimensions(),
            ),
            dependencies: measure
                .dependencies()
                .iter()
                .map(|d| (*d).to_string())
                .collect(),
        }
    }
}

#[allow(clippy::cast_precision_loss)]
fn count(n: usize) -> f64 {
    n as f64
}

/// Power-weighted mean bin index; 0 for a silent spectrum.
fn centroid(power: &[f64]) -> f64 {
    let total: f64 = power.iter().sum();
    if total <= 0.0 {
        return 0.0;
    }
    power
        .iter()
        .enumerate()
        .map(|(i, p)| count(i) * p)
        .sum::<f64>()
        / total
}

fn rolloff(power: &[f64]) -> f64 {
    let total: f64 = power.iter().sum();
    if total <= 0.0 || power.is_empty() {
        return 0.0;
    }
    let threshold = ROLLOFF_CUTOFF * total;
    let mut running = 0.0;
    for (i, p) in power.iter().enumerate() {
        running += p;
        if running >= threshold {
            return count(i) / count(power.len());
        }
    }
    1.0
}

fn zero_crossings(samples: &[f64]) -> usize {
    samples
        .windows(2)
        .filter(|w| (w[0] < 0.0 && w[1] >= 0.0) || (w[0] >= 0.0 && w[1] < 0.0))
        .count()
}

impl FeatureExtractor<AudioWindow> for AudioFeature {
    fn descriptor(&self) -> &FeatureDescriptor {
        &self.descriptor
    }

    fn dependencies(&self) -> &[String] {
        &self.dependencies
    }

    fn lookback(&self) -> usize {
        self.measure.lookback()
    }

    fn extract(&self, window: &AudioWindow, inputs: &FeatureInputs<'_>) -> anyhow::Result<Option<Vec<f64>>> {
        let value = match self.measure {
            AudioMeasure::MagnitudeSpectrum => return Ok(Some(window.spectrum.clone())),
            AudioMeasure::PowerSpectrum => {
                return Ok(Some(inputs.required(0)?.iter().map(|m| m * m).collect()));
            }
            AudioMeasure::RootMeanSquare => {
                if window.samples.is_empty() {
                    0.0
                } else {
                    let sum_sq: f64 = window.samples.iter().map(|s| s * s).sum();
                    (sum_sq / count(window.samples.len())).sqrt()
                }
            }
            AudioMeasure::ZeroCrossings => count(zero_crossings(&window.samples)),
            AudioMeasure::SpectralCentroid => centroid(inputs.required(0)?),
            AudioMeasure::SpectralRolloffPoint => rolloff(inputs.required(0)?),
            AudioMeasure::SpectralFlux => {
                let current = inputs.required(0)?;
                let Some(previous) = inputs.previous(0, 1) else {
                    return Ok(None);
                };
                if previous.len() != current.len() {
                    anyhow::bail!(
                        "spectrum width changed from {} to {}",
                        previous.len(),
                        current.len()
                    );
                }
                current
                    .iter()
                    .zip(previous)
                    .map(|(c, p)| (c - p) * (c - p))
                    .sum()
            }
            AudioMeasure::SpectralVariability => sample_variance(inputs.required(0)?).sqrt(),
            AudioMeasure::StrongestFrequencyViaSpectralCentroid => {
                let centroid = inputs.required(0)?[0];
                let bins = inputs.required(1)?.len();
                if bins == 0 {
                    0.0
                } else {
                    centroid / count(bins) * (window.sample_rate / 2.0)
                }
            }
        };
        Ok(Some(vec![value]))
    }
}

/// Registry of every audio feature.
///
/// # Errors
/// Never fails in practice; registration errors are propagated.
pub fn audio_registry() -> Result<FeatureRegistry<AudioWindow>, CoreError> {
    let mut registry = FeatureRegistry::new();
    for measure in AudioMeasure::ALL {
        registry.register(Arc::new(AudioFeature::new(measure)))?;
    }
    Ok(registry)
}

#[cfg(test)]
mod tests {
    use mf_core::engine::{ExternalData, ExtractionEngine};

    use super::*;

    const EPS: f64 = 1e-9;

    fn engine() -> ExtractionEngine<AudioWindow> {
        let selection = audio_registry().unwrap().select(&[]).unwrap();
        ExtractionEngine::new(selection.extractors, &ExternalData::new()).unwrap()
    }

    fn window(samples: Vec<f64>, spectrum: Vec<f64>) -> AudioWindow {
        AudioWindow {
            samples,
            spectrum,
            sample_rate: 8000.0,
        }
    }

    #[test]
    fn time_domain_features() {
        let e = engine();
        let w = window(vec![1.0, -1.0, 1.0, -1.0], vec![0.0; 3]);
        let m = e.extract_windows("r", &[w]).unwrap();
        let get = |name| m.get(0, e.position(name).unwrap()).unwrap()[0];
        assert!((get(ROOT_MEAN_SQUARE) - 1.0).abs() < EPS);
        assert!((get(ZERO_CROSSINGS) - 3.0).abs() < EPS);
    }

    #[test]
    fn spectral_shape_features() {
        let e = engine();
        // Power 0, 1, 0, 1 over four bins.
        let w = window(vec![0.0; 8], vec![0.0, 1.0, 0.0, 1.0]);
        let m = e.extract_windows("r", &[w]).unwrap();
        let get = |name| m.get(0, e.position(name).unwrap()).unwrap()[0];
        assert!((get(SPECTRAL_CENTROID) - 2.0).abs() < EPS);
        // Cumulative power reaches 85% of 2 at bin 3.
        assert!((get(SPECTRAL_ROLLOFF_POINT) - 0.75).abs() < EPS);
        assert!((get(STRONGEST_FREQUENCY_VIA_SPECTRAL_CENTROID) - 2000.0).abs() < EPS);
        assert!((get(SPECTRAL_VARIABILITY) - (1.0_f64 / 3.0).sqrt()).abs() < EPS);
        assert_eq!(
            m.get(0, e.position(POWER_SPECTRUM).unwrap()),
            Some(&[0.0, 1.0, 0.0, 1.0][..])
        );
    }

    #[test]
    fn flux_needs_a_previous_window() {
        let e = engine();
        let windows = [
            window(vec![0.0; 4], vec![1.0, 1.0]),
            window(vec![0.0; 4], vec![2.0, 0.0]),
        ];
        let m = e.extract_windows("r", &windows).unwrap();
        let flux = e.position(SPECTRAL_FLUX).unwrap();
        assert_eq!(m.get(0, flux), None);
        assert_eq!(m.get(1, flux), Some(&[2.0][..]));
        assert_eq!(m.burn_in(&[flux]), 1);
    }

    #[test]
    fn silence_is_finite() {
        let e = engine();
        let m = e
            .extract_windows("r", &[window(vec![0.0; 4], vec![0.0; 3])])
            .unwrap();
        for cell in m.rows()[0].iter().flatten() {
            assert!(cell.iter().all(|v| v.is_finite()));
        }
    }
}
