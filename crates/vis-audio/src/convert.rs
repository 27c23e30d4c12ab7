//! Sample-format conversion shared by every platform backend.
//!
//! Backends hand us whatever the platform API actually delivers — usually
//! interleaved multi-channel float32, occasionally integer PCM. This module
//! normalizes that down to the mono float32 the rest of the pipeline expects.

/// Downmix interleaved float32 frames to mono by channel average.
///
/// `interleaved.len()` must be a multiple of `channels`; `out.len()` must equal
/// `interleaved.len() / channels`. Excess samples that don't form a full frame
/// are ignored.
pub fn downmix_f32(interleaved: &[f32], channels: usize, out: &mut [f32]) {
    debug_assert!(channels > 0);
    let frames = interleaved.len() / channels;
    let frames = frames.min(out.len());
    for (i, frame) in interleaved.chunks_exact(channels).take(frames).enumerate() {
        out[i] = frame.iter().sum::<f32>() / channels as f32;
    }
}

/// Convert interleaved little-endian i16 PCM to mono float32 in [-1, 1].
pub fn downmix_i16le(bytes: &[u8], channels: usize, out: &mut [f32]) {
    debug_assert!(channels > 0);
    let bytes_per_frame = channels * 2;
    let frames = (bytes.len() / bytes_per_frame).min(out.len());
    for (i, frame_bytes) in bytes.chunks_exact(bytes_per_frame).take(frames).enumerate() {
        let mut acc = 0.0f32;
        for ch in frame_bytes.chunks_exact(2) {
            let sample = i16::from_le_bytes([ch[0], ch[1]]);
            acc += sample as f32 / i16::MAX as f32;
        }
        out[i] = acc / channels as f32;
    }
}

/// Convert interleaved little-endian float32 PCM to mono, downmixing channels.
pub fn downmix_f32le_bytes(bytes: &[u8], channels: usize, out: &mut [f32]) {
    debug_assert!(channels > 0);
    let bytes_per_frame = channels * 4;
    let frames = (bytes.len() / bytes_per_frame).min(out.len());
    for (i, frame_bytes) in bytes.chunks_exact(bytes_per_frame).take(frames).enumerate() {
        let mut acc = 0.0f32;
        for ch in frame_bytes.chunks_exact(4) {
            acc += f32::from_le_bytes([ch[0], ch[1], ch[2], ch[3]]);
        }
        out[i] = acc / channels as f32;
    }
}
