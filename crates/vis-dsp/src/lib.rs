//! Sliding-window STFT + perceptual post-processing: turns a stream of mono
//! audio frames into smoothed, gain-adapted, log-binned bar vectors.

mod bins;
mod fft;
mod processor;

pub use processor::Processor;

/// Capture sample rate; must match `vis_audio::SAMPLE_RATE`.
pub const SAMPLE_RATE: u32 = 44_100;

/// Sliding window length in samples. Must exceed the audio frame size.
pub const FFT_SIZE: usize = 4096;

/// Lower edge of the log-frequency bar spacing; fixed per spec.
pub const FREQ_MIN: f32 = 50.0;

/// Gravity falloff rate per frame.
pub const GRAVITY: f32 = 0.08;

/// Exponential decay applied to smoothing memory on a falling sample.
pub const SMOOTHING_DECAY: f32 = 0.77;

/// Frame peak below which a frame is treated as silence.
pub const SILENCE_PEAK: f32 = 1e-4;

/// Valid bar-count configuration values.
pub const VALID_BAR_COUNTS: [usize; 7] = [8, 16, 24, 36, 72, 100, 144];

/// Valid frequency-ceiling configuration values, in Hz.
pub const VALID_FREQ_MAX: [u32; 5] = [10_000, 12_000, 14_000, 16_000, 18_000];

/// Valid emission-rate configuration values, in frames per second.
pub const VALID_FPS: [u32; 3] = [24, 30, 60];

/// Default bar count at daemon startup.
pub const DEFAULT_BAR_COUNT: usize = 72;

/// Default frequency ceiling at daemon startup.
pub const DEFAULT_FREQ_MAX: u32 = 12_000;

/// Default emission rate at daemon startup.
pub const DEFAULT_FPS: u32 = 30;

pub fn is_valid_bar_count(n: usize) -> bool {
    VALID_BAR_COUNTS.contains(&n)
}

pub fn is_valid_freq_max(hz: u32) -> bool {
    VALID_FREQ_MAX.contains(&hz)
}

pub fn is_valid_fps(fps: u32) -> bool {
    VALID_FPS.contains(&fps)
}
