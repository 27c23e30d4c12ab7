//! WASAPI default-render-device loopback capture.
//!
//! Grounded on the legacy WASAPI loopback path from the pack's Windows audio
//! capture examples: shared-mode, event-driven capture against the `wasapi`
//! crate, reading the default render endpoint instead of an input device.

use crate::convert::downmix_f32le_bytes;
use crate::{AudioError, AudioSource, Result, SourceDescriptor, FRAME_SIZE};

fn err(e: impl std::fmt::Display) -> AudioError {
    AudioError::SourceUnavailable(e.to_string())
}

pub struct WasapiLoopbackSource {
    client: wasapi::AudioClient,
    capture: wasapi::AudioCaptureClient,
    event: wasapi::Handle,
    channels: usize,
    bytes_per_frame: usize,
    pending: Vec<u8>,
    read_buf: Vec<u8>,
}

impl WasapiLoopbackSource {
    pub fn open(_source_name: &str) -> Result<Self> {
        let _ = wasapi::initialize_mta();

        let enumerator = wasapi::DeviceEnumerator::new().map_err(err)?;
        let device = enumerator
            .get_default_device(&wasapi::Direction::Render)
            .map_err(err)?;
        let mut client = device.get_iaudioclient().map_err(err)?;
        let format = client.get_mixformat().map_err(err)?;
        let channels = format.get_nchannels() as usize;
        let (_default_period, min_period) = client.get_device_period().map_err(err)?;

        let mode = wasapi::StreamMode::EventsShared {
            autoconvert: true,
            buffer_duration_hns: min_period,
        };
        client
            .initialize_client(&format, &wasapi::Direction::Capture, &mode)
            .map_err(err)?;

        let event = client.set_get_eventhandle().map_err(err)?;
        let capture = client.get_audiocaptureclient().map_err(err)?;
        client.start_stream().map_err(err)?;

        tracing::info!(channels, "opened WASAPI loopback capture");

        Ok(Self {
            client,
            capture,
            event,
            channels,
            bytes_per_frame: channels * 4,
            pending: Vec::new(),
            read_buf: vec![0u8; 4096 * channels * 4],
        })
    }
}

impl AudioSource for WasapiLoopbackSource {
    fn read_frame(&mut self, out: &mut [f32]) -> Result<()> {
        debug_assert_eq!(out.len(), FRAME_SIZE);
        let frame_bytes = FRAME_SIZE * self.bytes_per_frame;

        // GetMixFormat's shared-mode format is IEEE float in the overwhelming
        // common case; a device that negotiates integer PCM here would need
        // its own downmix path (not exercised by this backend).
        while self.pending.len() < frame_bytes {
            if self.event.wait_for_event(200).is_err() {
                continue;
            }
            let (frames_read, _info) = self
                .capture
                .read_from_device(&mut self.read_buf)
                .map_err(err)?;
            if frames_read == 0 {
                continue;
            }
            let bytes = frames_read as usize * self.bytes_per_frame;
            self.pending.extend_from_slice(&self.read_buf[..bytes]);
        }

        let chunk: Vec<u8> = self.pending.drain(..frame_bytes).collect();
        downmix_f32le_bytes(&chunk, self.channels, out);
        Ok(())
    }

    fn flush(&mut self) -> Result<()> {
        self.pending.clear();
        Ok(())
    }

    fn enumerate(&self) -> Result<Vec<SourceDescriptor>> {
        Ok(vec![SourceDescriptor {
            name: "default".to_string(),
            description: "Default Audio Output".to_string(),
        }])
    }

    fn name(&self) -> &str {
        "default"
    }
}

impl Drop for WasapiLoopbackSource {
    fn drop(&mut self) {
        let _ = self.client.stop_stream();
    }
}
