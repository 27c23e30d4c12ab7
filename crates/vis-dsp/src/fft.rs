//! FFT wrapper with a cached plan, generalized from a windowing-function
//! library down to exactly what the spectrum processor needs: one real-input
//! forward transform over a fixed-size Hann-windowed buffer.

use rustfft::num_complex::Complex;
use rustfft::{Fft as RustFft, FftPlanner};
use std::sync::Arc;

/// Build Hann window coefficients for a buffer of `size` samples.
pub fn hann_window(size: usize) -> Vec<f32> {
    use std::f32::consts::PI;
    (0..size)
        .map(|i| 0.5 * (1.0 - (2.0 * PI * i as f32 / size as f32).cos()))
        .collect()
}

/// Forward-only real FFT, windowed in place before transform.
pub struct Fft {
    fft: Arc<dyn RustFft<f32>>,
    size: usize,
    scratch: Vec<Complex<f32>>,
}

impl Fft {
    pub fn new(size: usize) -> Self {
        let mut planner = FftPlanner::new();
        let fft = planner.plan_fft_forward(size);
        Self {
            fft,
            size,
            scratch: vec![Complex::new(0.0, 0.0); size],
        }
    }

    pub fn size(&self) -> usize {
        self.size
    }

    /// Apply `window` to `samples` in place, run the forward transform, and
    /// return the magnitude of each positive-frequency bin (`size/2` bins,
    /// DC through just below Nyquist).
    pub fn magnitude(&mut self, samples: &[f32], window: &[f32]) -> Vec<f32> {
        debug_assert_eq!(samples.len(), self.size);
        debug_assert_eq!(window.len(), self.size);

        for (i, slot) in self.scratch.iter_mut().enumerate() {
            *slot = Complex::new(samples[i] * window[i], 0.0);
        }

        self.fft.process(&mut self.scratch);

        self.scratch[..self.size / 2]
            .iter()
            .map(|c| c.norm())
            .collect()
    }
}
