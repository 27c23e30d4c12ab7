//! Main loop: wires the audio source, processor, and websocket server
//! together and drives the pipeline one tick at a time.

use std::time::{Duration, Instant};

use tracing::{error, info, warn};

use vis_audio::{AudioSource, FRAME_SIZE};
use vis_control::{Command, Response, SourceEntry};
use vis_dsp::Processor;
use vis_proto::WsServer;

/// Poll interval while no subscriber is connected (spec §4.E step 3).
const IDLE_SLEEP: Duration = Duration::from_millis(50);

/// Drives the audio → DSP → websocket pipeline and the control plane.
///
/// Owns every piece of mutable state the spec calls out: the open audio
/// source, the processor, and the server's client socket all live here on
/// the main thread (§5 "Shared resources").
pub struct Orchestrator {
    source: Box<dyn AudioSource>,
    source_name: String,
    processor: Processor,
    server: WsServer,
    fps: u32,
    idle: bool,
    last_send: Instant,
}

impl Orchestrator {
    /// Bring up the pipeline at its documented defaults: bar_count 72,
    /// freq_max 12000, fps 30, source `@DEFAULT_MONITOR@`, listening on
    /// [`vis_proto::DEFAULT_PORT`].
    pub fn start() -> anyhow::Result<Self> {
        let source_name = vis_audio::DEFAULT_MONITOR.to_string();
        let source = vis_audio::open(&source_name)?;

        let mut server = WsServer::new();
        server.start(vis_proto::DEFAULT_PORT)?;

        Ok(Self {
            source,
            source_name,
            processor: Processor::new(vis_dsp::DEFAULT_BAR_COUNT, vis_dsp::DEFAULT_FREQ_MAX),
            server,
            fps: vis_dsp::DEFAULT_FPS,
            idle: true,
            last_send: Instant::now(),
        })
    }

    /// Run until `running` is cleared (by a signal handler) or a fatal
    /// error occurs (§4.E / §7: audio source read errors and a failed
    /// source-revert are fatal; everything else stays local).
    pub fn run(&mut self, running: &std::sync::atomic::AtomicBool) -> anyhow::Result<()> {
        use std::sync::atomic::Ordering;
        while running.load(Ordering::SeqCst) {
            self.tick()?;
        }
        Ok(())
    }

    /// One main-loop iteration (spec §4.E steps 1-5).
    fn tick(&mut self) -> anyhow::Result<()> {
        // 1. Poll the server: accept a subscriber, drain inbound commands.
        let inbound = self.server.poll();
        for msg in inbound {
            self.handle_command(&msg.text)?;
        }

        // 3. No subscriber: stay idle, don't touch the audio source.
        if !self.server.has_client() {
            self.idle = true;
            std::thread::sleep(IDLE_SLEEP);
            return Ok(());
        }

        // 4. Subscriber just appeared: flush stale audio, reset the processor.
        if self.idle {
            if let Err(e) = self.source.flush() {
                warn!(error = %e, "flush failed on subscriber connect");
            }
            self.processor.reset();
            self.idle = false;
            self.last_send = Instant::now();
        }

        // 5. Read one audio frame, step the processor, pace emission by fps.
        let mut frame = [0.0f32; FRAME_SIZE];
        self.source.read_frame(&mut frame).map_err(|e| {
            error!(error = %e, "audio source lost, stopping");
            anyhow::anyhow!(e)
        })?;

        let bars = self.processor.step(&frame);

        let now = Instant::now();
        let interval = Duration::from_millis(1000 / u64::from(self.fps));
        if now.duration_since(self.last_send) >= interval {
            self.server.send_binary(&encode_bars(&bars));
            self.last_send = now;
        }

        Ok(())
    }

    /// Parse and apply one subscriber command, replying over the same
    /// connection (§4.D). Unknown/out-of-set commands are silently dropped
    /// by [`Command::parse`] before we ever see them here.
    fn handle_command(&mut self, text: &str) -> anyhow::Result<()> {
        let Some(command) = Command::parse(text) else {
            return Ok(());
        };

        let response = match command {
            Command::GetSources => {
                let sources = self.source.enumerate().unwrap_or_default();
                Response::Sources(
                    sources
                        .into_iter()
                        .map(|s| SourceEntry {
                            name: s.name,
                            desc: s.description,
                        })
                        .collect(),
                )
            }
            Command::SetSource(name) => self.set_source(name)?,
            Command::SetFps(n) => {
                self.fps = n;
                Response::FpsChanged(n)
            }
            Command::SetFreqMax(hz) => {
                self.processor.set_freq_max(hz);
                Response::FreqMaxChanged(hz)
            }
            Command::SetBarCount(k) => {
                self.processor.set_bar_count(k);
                Response::BarCountChanged(k)
            }
        };

        self.server.send_text(&response.to_json());
        Ok(())
    }
}

impl Drop for Orchestrator {
    /// Close in the order §5 specifies: client socket, then listener, then
    /// audio source (fields would otherwise drop source-first).
    fn drop(&mut self) {
        self.server.stop();
    }
}

impl Orchestrator {
    /// Reopen the audio source against `name`. On failure, revert to the
    /// previously open source; if that second open also fails, the daemon
    /// treats it as fatal (spec §9 Open Question (a)).
    fn set_source(&mut self, name: String) -> anyhow::Result<Response> {
        match vis_audio::open(&name) {
            Ok(new_source) => {
                self.source = new_source;
                self.source_name = name.clone();
                info!(source = %name, "source changed");
                Ok(Response::SourceChanged(name))
            }
            Err(e) => {
                warn!(source = %name, error = %e, "failed to open requested source, reverting");
                match vis_audio::open(&self.source_name) {
                    Ok(reverted) => {
                        self.source = reverted;
                        Ok(Response::SourceError(e.to_string()))
                    }
                    Err(revert_err) => {
                        error!(
                            error = %revert_err,
                            previous_source = %self.source_name,
                            "failed to revert to previous source after SET_SOURCE failure"
                        );
                        Err(anyhow::anyhow!(revert_err))
                    }
                }
            }
        }
    }
}

/// Serialize a bar vector as little-endian float32 bytes (spec §6).
fn encode_bars(bars: &[f32]) -> Vec<u8> {
    let mut out = Vec::with_capacity(bars.len() * 4);
    for b in bars {
        out.extend_from_slice(&b.to_le_bytes());
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use vis_audio::{Result as AudioResult, SourceDescriptor};

    /// In-memory stand-in for a platform backend: hands out a fixed sample
    /// value per frame.
    struct FakeSource {
        name: String,
        fill: f32,
    }

    impl AudioSource for FakeSource {
        fn read_frame(&mut self, out: &mut [f32]) -> AudioResult<()> {
            out.iter_mut().for_each(|s| *s = self.fill);
            Ok(())
        }

        fn flush(&mut self) -> AudioResult<()> {
            Ok(())
        }

        fn enumerate(&self) -> AudioResult<Vec<SourceDescriptor>> {
            Ok(vec![SourceDescriptor {
                name: self.name.clone(),
                description: "Fake".to_string(),
            }])
        }

        fn name(&self) -> &str {
            &self.name
        }
    }

    #[test]
    fn encode_bars_is_little_endian_f32() {
        let bars = vec![0.5f32, 1.0f32];
        let bytes = encode_bars(&bars);
        assert_eq!(bytes.len(), 8);
        assert_eq!(f32::from_le_bytes(bytes[0..4].try_into().unwrap()), 0.5);
        assert_eq!(f32::from_le_bytes(bytes[4..8].try_into().unwrap()), 1.0);
    }

    #[test]
    fn handle_command_set_bar_count_reinitializes_processor() {
        let mut orch = Orchestrator {
            source: Box::new(FakeSource {
                name: "fake".to_string(),
                fill: 0.0,
            }),
            source_name: "fake".to_string(),
            processor: Processor::new(72, 12_000),
            server: WsServer::new(),
            fps: 30,
            idle: true,
            last_send: Instant::now(),
        };

        orch.handle_command("SET_BAR_COUNT:16").unwrap();
        assert_eq!(orch.processor.bar_count(), 16);
    }

    #[test]
    fn encode_bars_matches_processor_output_length() {
        // Spec §9 Open Question (b): the orchestrator calls processor.step on
        // every read frame unconditionally and only gates send_binary behind
        // the fps interval, so a bar vector is always ready to encode
        // regardless of whether this particular tick will emit it.
        let mut processor = Processor::new(8, 12_000);
        let frame_size = 735;
        let bars = processor.step(&vec![0.5; frame_size]);
        assert_eq!(encode_bars(&bars).len(), 8 * 4);
    }

    #[test]
    fn handle_command_ignores_unknown_text() {
        let mut orch = Orchestrator {
            source: Box::new(FakeSource {
                name: "fake".to_string(),
                fill: 0.0,
            }),
            source_name: "fake".to_string(),
            processor: Processor::new(72, 12_000),
            server: WsServer::new(),
            fps: 30,
            idle: true,
            last_send: Instant::now(),
        };

        orch.handle_command("NOT_A_COMMAND").unwrap();
        assert_eq!(orch.processor.bar_count(), 72);
    }
}
