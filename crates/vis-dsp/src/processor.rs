//! Sliding-window STFT processor: FFT → log-frequency binning → per-bar EQ →
//! auto-sensitivity (AGC) → asymmetric smoothing → gravity falloff.

use tracing::info;

use crate::bins::{bin_cutoffs, eq_weights};
use crate::fft::{hann_window, Fft};
use crate::{FREQ_MIN, FFT_SIZE, GRAVITY, SILENCE_PEAK, SMOOTHING_DECAY};

/// Owned processor state. Reinitialized wholesale on reconfiguration or
/// subscriber reconnect — never mutated piecemeal across a reinit.
pub struct Processor {
    bar_count: usize,
    freq_max: f32,

    window: Vec<f32>,
    fft: Fft,
    ring: Vec<f32>,

    lo: Vec<usize>,
    hi: Vec<usize>,
    eq: Vec<f32>,

    mem: Vec<f32>,
    peak: Vec<f32>,
    fall: Vec<f32>,

    sens: f32,
    init_mode: bool,
}

impl Processor {
    pub fn new(bar_count: usize, freq_max: u32) -> Self {
        let mut p = Processor {
            bar_count,
            freq_max: freq_max as f32,
            window: hann_window(FFT_SIZE),
            fft: Fft::new(FFT_SIZE),
            ring: vec![0.0; FFT_SIZE],
            lo: Vec::new(),
            hi: Vec::new(),
            eq: Vec::new(),
            mem: Vec::new(),
            peak: Vec::new(),
            fall: Vec::new(),
            sens: 1.0,
            init_mode: true,
        };
        p.rebuild_bins();
        p
    }

    fn rebuild_bins(&mut self) {
        let (lo, hi) = bin_cutoffs(self.bar_count, FREQ_MIN, self.freq_max, FFT_SIZE, crate::SAMPLE_RATE);
        self.eq = eq_weights(&lo, &hi, FREQ_MIN, FFT_SIZE, crate::SAMPLE_RATE);
        self.lo = lo;
        self.hi = hi;
        self.mem = vec![0.0; self.bar_count];
        self.peak = vec![0.0; self.bar_count];
        self.fall = vec![0.0; self.bar_count];
    }

    /// Zero all state; rebuild bin cutoffs and EQ weights; reset sens and
    /// the AGC ramp-up flag. Called on construction, on reconfiguration, and
    /// whenever the subscriber reconnects.
    pub fn reset(&mut self) {
        self.ring.iter_mut().for_each(|s| *s = 0.0);
        self.mem.iter_mut().for_each(|m| *m = 0.0);
        self.peak.iter_mut().for_each(|p| *p = 0.0);
        self.fall.iter_mut().for_each(|f| *f = 0.0);
        self.sens = 1.0;
        self.init_mode = true;
    }

    /// Resize to `bar_count` bars; rebuild bins and fully reset state.
    pub fn set_bar_count(&mut self, bar_count: usize) {
        if bar_count == self.bar_count {
            return;
        }
        info!(from = self.bar_count, to = bar_count, "reconfiguring bar count, resetting processor");
        self.bar_count = bar_count;
        self.rebuild_bins();
        self.reset();
    }

    /// Change the frequency ceiling; rebuild bins and fully reset state.
    pub fn set_freq_max(&mut self, freq_max: u32) {
        let freq_max = freq_max as f32;
        if (freq_max - self.freq_max).abs() < f32::EPSILON {
            return;
        }
        info!(from = self.freq_max, to = freq_max, "reconfiguring freq_max, resetting processor");
        self.freq_max = freq_max;
        self.rebuild_bins();
        self.reset();
    }

    pub fn bar_count(&self) -> usize {
        self.bar_count
    }

    pub fn sens(&self) -> f32 {
        self.sens
    }

    /// Process one incoming audio frame (length `frame_size`) and return the
    /// length-`bar_count` bar vector, each value clamped to `[0, 1]`.
    pub fn step(&mut self, frame: &[f32]) -> Vec<f32> {
        // 1. Slide the window.
        let n = frame.len();
        debug_assert!(FFT_SIZE > n);
        self.ring.copy_within(n.., 0);
        self.ring[FFT_SIZE - n..].copy_from_slice(frame);

        // 2. Peak gate.
        let audio_max = frame.iter().fold(0.0f32, |m, &s| m.max(s.abs()));
        let silence = audio_max < SILENCE_PEAK;

        // 3-4. Window + FFT + magnitude.
        let mag = self.fft.magnitude(&self.ring, &self.window);

        // 5-7. Binning, scale, asymmetric smoothing.
        let half = FFT_SIZE as f32 / 2.0;
        let mut overshoot = false;
        for b in 0..self.bar_count {
            let (lo, hi) = (self.lo[b], self.hi[b]);
            let span = (hi - lo + 1) as f32;
            let avg: f32 = mag[lo..=hi].iter().sum::<f32>() / span;
            let raw = (avg / half).sqrt() * self.eq[b] * self.sens;

            if raw > self.mem[b] {
                self.mem[b] = raw;
            } else {
                self.mem[b] *= SMOOTHING_DECAY;
            }

            // 8. Gravity.
            if self.mem[b] >= self.peak[b] {
                self.peak[b] = self.mem[b];
                self.fall[b] = 0.0;
            } else {
                self.fall[b] += GRAVITY;
                self.peak[b] = (self.peak[b] - GRAVITY * self.fall[b]).max(self.mem[b]).max(0.0);
            }

            // 9. Overshoot probe.
            if self.peak[b] > 1.0 {
                overshoot = true;
            }
        }

        // Auto-sensitivity.
        if overshoot {
            self.sens *= 0.98;
            self.init_mode = false;
        } else if !silence {
            self.sens *= 1.001;
            if self.init_mode && audio_max > 0.005 {
                self.sens *= 1.1;
                if self.sens > 2.0 {
                    self.init_mode = false;
                }
            }
        }
        self.sens = self.sens.clamp(0.02, 20.0);

        // 10. Output.
        self.peak.iter().map(|&p| p.min(1.0)).collect()
    }
}
