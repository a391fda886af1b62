use realfft::RealFftPlanner;
use realfft::num_complex::Complex;

/// FFT pipeline: Hann-windowed real FFT using realfft.
///
/// Pre-allocates the FFT plan and scratch buffers, so one pipeline serves
/// every window of a recording without reallocating.
///
/// # Example
/// ```
/// use mf_audio::fft::FftPipeline;
/// let fft = FftPipeline::new(2048);
/// assert_eq!(fft.bins(), 1025);
/// ```
pub struct FftPipeline {
    fft_size: usize,
    input_buf: Vec<f64>,
    spectrum_buf: Vec<Complex<f64>>,
    scratch: Vec<Complex<f64>>,
    plan: std::sync::Arc<dyn realfft::RealToComplex<f64>>,
    /// Hann window coefficients.
    window: Vec<f64>,
}

impl FftPipeline {
    /// Create a new FFT pipeline with the given window size.
    ///
    /// # Panics
    /// Panics if `size` is 0.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn new(size: usize) -> Self {
        assert!(size > 0, "FFT size must be > 0");

        let mut planner = RealFftPlanner::<f64>::new();
        let plan = planner.plan_fft_forward(size);

        let input_buf = plan.make_input_vec();
        let spectrum_buf = plan.make_output_vec();
        let scratch = plan.make_scratch_vec();

        let window: Vec<f64> = if size == 1 {
            vec![1.0]
        } else {
            (0..size)
                .map(|i| {
                    0.5 * (1.0 - (2.0 * std::f64::consts::PI * i as f64 / (size as f64 - 1.0)).cos())
                })
                .collect()
        };

        Self {
            fft_size: size,
            input_buf,
            spectrum_buf,
            scratch,
            plan,
            window,
        }
    }

    /// Magnitude spectrum of `samples` (N/2+1 bins). Shorter input is
    /// zero-padded, longer input truncated.
    ///
    /// # Example
    /// ```
    /// use mf_audio::fft::FftPipeline;
    /// let mut fft = FftPipeline::new(256);
    /// let spectrum = fft.process(&[0.0; 256]);
    /// assert_eq!(spectrum.len(), 129);
    /// ```
    #[allow(clippy::cast_precision_loss)]
    pub fn process(&mut self, samples: &[f64]) -> Vec<f64> {
        let n = self.fft_size.min(samples.len());

        for (i, slot) in self.input_buf.iter_mut().enumerate() {
            *slot = if i < n {
                samples[i] * self.window[i]
            } else {
                0.0
            };
        }

        if self
            .plan
            .process_with_scratch(&mut self.input_buf, &mut self.spectrum_buf, &mut self.scratch)
            .is_err()
        {
            return vec![0.0; self.spectrum_buf.len()];
        }

        let size = self.fft_size as f64;
        self.spectrum_buf.iter().map(|c| c.norm() / size).collect()
    }

    /// FFT window size.
    #[must_use]
    pub fn fft_size(&self) -> usize {
        self.fft_size
    }

    /// Number of spectrum bins produced by [`process`](Self::process).
    #[must_use]
    pub fn bins(&self) -> usize {
        self.fft_size / 2 + 1
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    #[allow(clippy::cast_precision_loss)]
    fn sine_peaks_at_its_bin() {
        let size = 512;
        let bin = 32;
        let samples: Vec<f64> = (0..size)
            .map(|i| (2.0 * std::f64::consts::PI * bin as f64 * i as f64 / size as f64).sin())
            .collect();
        let mut fft = FftPipeline::new(size);
        let spectrum = fft.process(&samples);
        let peak = spectrum
            .iter()
            .enumerate()
            .max_by(|a, b| a.1.total_cmp(b.1))
            .map(|(i, _)| i);
        assert_eq!(peak, Some(bin));
    }

    #[test]
    fn short_input_is_zero_padded() {
        let mut fft = FftPipeline::new(64);
        let spectrum = fft.process(&[0.0; 10]);
        assert_eq!(spectrum.len(), fft.bins());
        assert!(spectrum.iter().all(|v| v.abs() < 1e-12));
    }
}
