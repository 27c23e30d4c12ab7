//! PulseAudio monitor-of-sink capture.
//!
//! Grounded on the `@DEFAULT_MONITOR@` blocking-read pattern used for system
//! audio loopback capture via `libpulse-simple-binding`, and on
//! `libpulse-binding`'s standard mainloop for the one-shot source listing
//! `enumerate()` needs.

use std::cell::RefCell;
use std::rc::Rc;
use std::time::{Duration, Instant};

use libpulse_binding::callbacks::ListResult;
use libpulse_binding::context::introspect::SourceInfo;
use libpulse_binding::context::{Context, FlagSet as ContextFlagSet, State as ContextState};
use libpulse_binding::mainloop::standard::{IterateResult, Mainloop};
use libpulse_binding::proplist::{properties, Proplist};
use libpulse_binding::sample::{Format, Spec};
use libpulse_binding::stream::Direction;
use libpulse_simple_binding::Simple;

use crate::{AudioError, AudioSource, Result, FRAME_SIZE, SAMPLE_RATE};

/// Overall budget for the auxiliary introspection mainloop (§5: "driven
/// synchronously to completion ... with a 2s overall budget").
const ENUMERATE_BUDGET: Duration = Duration::from_secs(2);

pub struct PulseMonitorSource {
    simple: Simple,
    source_name: String,
    read_buf: Vec<u8>,
}

impl PulseMonitorSource {
    pub fn open(source_name: &str) -> Result<Self> {
        let spec = Spec {
            format: Format::F32le,
            channels: 1,
            rate: SAMPLE_RATE,
        };
        if !spec.is_valid() {
            return Err(AudioError::SourceUnavailable(
                "invalid PulseAudio sample spec".to_string(),
            ));
        }

        let simple = Simple::new(
            None,
            "vis-capture",
            Direction::Record,
            Some(source_name),
            "system audio capture",
            &spec,
            None,
            None,
        )
        .map_err(|e| AudioError::SourceUnavailable(format!("{source_name}: {e}")))?;

        tracing::info!(source = source_name, "opened PulseAudio monitor source");

        Ok(Self {
            simple,
            source_name: source_name.to_string(),
            read_buf: vec![0u8; FRAME_SIZE * 4],
        })
    }
}

impl AudioSource for PulseMonitorSource {
    fn read_frame(&mut self, out: &mut [f32]) -> Result<()> {
        debug_assert_eq!(out.len(), FRAME_SIZE);
        self.simple
            .read(&mut self.read_buf)
            .map_err(|e| AudioError::SourceLost(e.to_string()))?;
        for (i, sample) in self.read_buf.chunks_exact(4).enumerate() {
            out[i] = f32::from_le_bytes([sample[0], sample[1], sample[2], sample[3]]);
        }
        Ok(())
    }

    fn flush(&mut self) -> Result<()> {
        self.simple
            .flush()
            .map_err(|e| AudioError::SourceLost(e.to_string()))
    }

    fn enumerate(&self) -> Result<Vec<crate::SourceDescriptor>> {
        enumerate_monitor_sources()
    }

    fn name(&self) -> &str {
        &self.source_name
    }
}

/// List every source whose parent is a render sink (i.e. a monitor source),
/// via a transient PulseAudio introspection mainloop.
pub(crate) fn enumerate_monitor_sources() -> Result<Vec<crate::SourceDescriptor>> {
    let mut proplist =
        Proplist::new().ok_or_else(|| AudioError::SourceUnavailable("proplist".into()))?;
    let _ = proplist.set_str(properties::APPLICATION_NAME, "vis-capture");

    let mut mainloop =
        Mainloop::new().ok_or_else(|| AudioError::SourceUnavailable("pulse mainloop".into()))?;
    let mut context = Context::new_with_proplist(&mainloop, "vis-capture-enum", &proplist)
        .ok_or_else(|| AudioError::SourceUnavailable("pulse context".into()))?;

    context
        .connect(None, ContextFlagSet::NOFLAGS, None)
        .map_err(|e| AudioError::SourceUnavailable(e.to_string()))?;

    let deadline = Instant::now() + ENUMERATE_BUDGET;

    loop {
        if matches!(mainloop.iterate(false), IterateResult::Quit(_) | IterateResult::Err(_)) {
            return Err(AudioError::SourceUnavailable(
                "pulse mainloop iterate failed".into(),
            ));
        }
        match context.get_state() {
            ContextState::Ready => break,
            ContextState::Failed | ContextState::Terminated => {
                return Err(AudioError::SourceUnavailable(
                    "pulse context connection failed".into(),
                ));
            }
            _ => {}
        }
        if Instant::now() > deadline {
            return Err(AudioError::SourceUnavailable("pulse connect timed out".into()));
        }
    }

    let sources: Rc<RefCell<Vec<crate::SourceDescriptor>>> = Rc::new(RefCell::new(Vec::new()));
    let done = Rc::new(RefCell::new(false));

    {
        let sources = Rc::clone(&sources);
        let done = Rc::clone(&done);
        let introspector = context.introspect();
        let _op = introspector.get_source_info_list(move |result: ListResult<&SourceInfo>| {
            match result {
                ListResult::Item(info) => {
                    if info.monitor_of_sink.is_some() {
                        sources.borrow_mut().push(crate::SourceDescriptor {
                            name: info.name.as_deref().unwrap_or_default().to_string(),
                            description: info.description.as_deref().unwrap_or_default().to_string(),
                        });
                    }
                }
                ListResult::End | ListResult::Error => {
                    *done.borrow_mut() = true;
                }
            }
        });

        while !*done.borrow() {
            if matches!(mainloop.iterate(false), IterateResult::Quit(_) | IterateResult::Err(_)) {
                break;
            }
            if Instant::now() > deadline {
                break;
            }
        }
    }

    context.disconnect();
    Ok(Rc::try_unwrap(sources)
        .map(RefCell::into_inner)
        .unwrap_or_default())
}
