//! Per-bar FFT bin cutoff construction and EQ weighting.

/// Generate `[lo[b], hi[b]]` bin ranges for `bar_count` bars spanning
/// `freq_min`..`freq_max`, log-spaced, with strictly increasing cutoffs so
/// every bar owns at least one unique FFT bin.
pub fn bin_cutoffs(
    bar_count: usize,
    freq_min: f32,
    freq_max: f32,
    fft_size: usize,
    sample_rate: u32,
) -> (Vec<usize>, Vec<usize>) {
    let nyquist_bin = fft_size / 2 - 1;
    let log_min = freq_min.ln();
    let log_max = freq_max.ln();

    let mut cutoffs: Vec<usize> = (0..=bar_count)
        .map(|i| {
            let t = i as f32 / bar_count as f32;
            let freq = (log_min + (log_max - log_min) * t).exp();
            ((freq * fft_size as f32 / sample_rate as f32).round() as isize).max(0) as usize
        })
        .collect();

    // Push each cutoff up to at least prev + 1 (strict monotonic growth).
    cutoffs[0] = cutoffs[0].max(1);
    for i in 1..cutoffs.len() {
        cutoffs[i] = cutoffs[i].max(cutoffs[i - 1] + 1);
    }

    // Clamp to the valid bin range.
    for c in cutoffs.iter_mut() {
        *c = (*c).min(nyquist_bin);
    }

    // Re-enforce monotonic growth from the top down in case clamping
    // collapsed the tail (not expected for the spec's valid configurations,
    // but cheap to guarantee).
    for i in (0..cutoffs.len() - 1).rev() {
        if cutoffs[i] >= cutoffs[i + 1] {
            cutoffs[i] = cutoffs[i + 1].saturating_sub(1).max(1);
        }
    }

    let lo = cutoffs[..bar_count].to_vec();
    let hi = cutoffs[1..].to_vec();
    (lo, hi)
}

/// Per-bar EQ weight: `(center_freq(b) / freq_min)^0.5`, boosting high bars.
pub fn eq_weights(
    lo: &[usize],
    hi: &[usize],
    freq_min: f32,
    fft_size: usize,
    sample_rate: u32,
) -> Vec<f32> {
    let bin_hz = sample_rate as f32 / fft_size as f32;
    lo.iter()
        .zip(hi)
        .map(|(&l, &h)| {
            let center_bin = (l + h) as f32 / 2.0;
            let center_freq = (center_bin * bin_hz).max(freq_min);
            (center_freq / freq_min).sqrt()
        })
        .collect()
}
