//! Loopback audio capture: deliver fixed-size mono float32 frames sourced
//! from the operating system's playback mix.
//!
//! Two backends exist behind `cfg(target_os)`, sharing no state: a PulseAudio
//! monitor-of-sink capture for the linux-like family, and a WASAPI loopback
//! capture for the windows-like family. Both implement [`AudioSource`].

pub mod convert;

#[cfg(target_os = "linux")]
mod pulse;

#[cfg(target_os = "windows")]
mod wasapi_backend;

/// Capture sample rate in Hz. Fixed: the processor's FFT bin math assumes it.
pub const SAMPLE_RATE: u32 = 44_100;

/// Samples per frame: exactly one 60 Hz tick of audio at [`SAMPLE_RATE`].
pub const FRAME_SIZE: usize = (SAMPLE_RATE / 60) as usize;

/// Sentinel source name meaning "the system's default render device".
pub const DEFAULT_MONITOR: &str = "@DEFAULT_MONITOR@";

/// Errors raised by audio source operations.
#[derive(Debug, thiserror::Error)]
pub enum AudioError {
    /// `open()` could not acquire the requested capture stream.
    #[error("audio source unavailable: {0}")]
    SourceUnavailable(String),

    /// A previously open stream stopped delivering audio.
    #[error("audio source lost: {0}")]
    SourceLost(String),
}

/// Result type for audio source operations.
pub type Result<T> = std::result::Result<T, AudioError>;

/// A selectable capture endpoint, as reported by [`AudioSource::enumerate`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceDescriptor {
    pub name: String,
    pub description: String,
}

/// Platform audio capture stream.
///
/// Implementations deliver an infinite stream of fixed-length
/// ([`FRAME_SIZE`]) mono float32 frames at [`SAMPLE_RATE`] Hz. No automatic
/// reconnect on `read_frame` failure — that's the orchestrator's call to make.
pub trait AudioSource: Send {
    /// Block until `out` (length [`FRAME_SIZE`]) is filled with fresh samples.
    fn read_frame(&mut self, out: &mut [f32]) -> Result<()>;

    /// Discard any buffered audio so the next `read_frame` delivers fresh data.
    fn flush(&mut self) -> Result<()>;

    /// List selectable inputs. Platforms without selection return one
    /// synthetic entry.
    fn enumerate(&self) -> Result<Vec<SourceDescriptor>>;

    /// The name this source was opened with (after sentinel resolution).
    fn name(&self) -> &str;
}

/// Open a capture stream for `source_name` (or [`DEFAULT_MONITOR`] for the
/// system default). Fails with [`AudioError::SourceUnavailable`]; the caller
/// is expected to revert to the previously open source on failure.
pub fn open(source_name: &str) -> Result<Box<dyn AudioSource>> {
    let target = if source_name.is_empty() {
        DEFAULT_MONITOR
    } else {
        source_name
    };

    #[cfg(target_os = "linux")]
    {
        pulse::PulseMonitorSource::open(target).map(|s| Box::new(s) as Box<dyn AudioSource>)
    }

    #[cfg(target_os = "windows")]
    {
        wasapi_backend::WasapiLoopbackSource::open(target)
            .map(|s| Box::new(s) as Box<dyn AudioSource>)
    }

    #[cfg(not(any(target_os = "linux", target_os = "windows")))]
    {
        Err(AudioError::SourceUnavailable(format!(
            "no loopback backend for this platform (requested {target})"
        )))
    }
}

/// Enumerate capture endpoints without opening a stream.
///
/// On linux this spins up a transient PulseAudio introspection mainloop; on
/// windows it returns the single synthetic descriptor (loopback has no
/// per-source selection).
pub fn enumerate() -> Result<Vec<SourceDescriptor>> {
    #[cfg(target_os = "linux")]
    {
        pulse::enumerate_monitor_sources()
    }

    #[cfg(target_os = "windows")]
    {
        Ok(vec![SourceDescriptor {
            name: "default".to_string(),
            description: "Default Audio Output".to_string(),
        }])
    }

    #[cfg(not(any(target_os = "linux", target_os = "windows")))]
    {
        Ok(Vec::new())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frame_size_is_one_sixtieth_second() {
        assert_eq!(FRAME_SIZE, 735);
        assert_eq!(SAMPLE_RATE % 60, 0);
    }
}
