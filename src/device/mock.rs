//! Scripted in-memory PCM device for running the bridge without hardware.
//!
//! Each opened stream shares its state with a [`MockState`] handle so tests
//! can script failures and inspect what was written after the bridge has
//! taken ownership of the stream.
//!
//! ```
//! use jacktoalsa::device::mock::{MockBackend, Script};
//! use jacktoalsa::device::Direction;
//! use jacktoalsa::XferError;
//!
//! let backend = MockBackend::new();
//! // the state exists once the bridge opens the device
//! assert!(backend.state(Direction::Playback).is_none());
//! # let _ = (Script::Ok, XferError::Xrun);
//! ```

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard};

use super::{
    Direction, Interleaved, InterleavedMut, PcmBackend, PcmStream, Resume, StreamParams,
};
use crate::error::XferError;

/// Scripted result for the next transfer call.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Script {
    /// Transfer everything.
    Ok,
    /// Transfer only this many frames.
    Short(usize),
    /// Fail with this error.
    Fail(XferError),
}

/// Call counters for one mock stream.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct MockStats {
    pub configure_calls: usize,
    pub write_calls: usize,
    pub read_calls: usize,
    pub recover_calls: usize,
    pub resume_calls: usize,
    pub prepare_calls: usize,
    pub drain_calls: usize,
}

#[derive(Debug, Default)]
struct Inner {
    params: Option<StreamParams>,
    fail_configure: bool,
    write_script: VecDeque<Script>,
    read_script: VecDeque<Script>,
    resume_script: VecDeque<Result<Resume, XferError>>,
    recover_error: Option<XferError>,
    prepare_error: Option<XferError>,
    /// Every successfully written sample, widened to i32.
    written: Vec<i32>,
    /// Samples handed out by reads, widened to i32.
    capture_source: VecDeque<i32>,
    stats: MockStats,
}

/// Shared view of a mock stream.
#[derive(Clone, Debug, Default)]
pub struct MockState(Arc<Mutex<Inner>>);

impl MockState {
    fn lock(&self) -> MutexGuard<'_, Inner> {
        // a panicking test thread must not hide the state from the others
        self.0.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Queue a result for the next write call. Unscripted calls succeed.
    pub fn script_write(&self, script: Script) {
        self.lock().write_script.push_back(script);
    }

    /// Queue a result for the next read call. Unscripted calls succeed.
    pub fn script_read(&self, script: Script) {
        self.lock().read_script.push_back(script);
    }

    /// Queue a result for the next resume call. Unscripted calls resume.
    pub fn script_resume(&self, result: Result<Resume, XferError>) {
        self.lock().resume_script.push_back(result);
    }

    /// Make the next recover call fail with `err`.
    pub fn fail_recover(&self, err: XferError) {
        self.lock().recover_error = Some(err);
    }

    /// Make the next prepare call fail with `err`.
    pub fn fail_prepare(&self, err: XferError) {
        self.lock().prepare_error = Some(err);
    }

    /// Make the next configure call fail.
    pub fn fail_configure(&self) {
        self.lock().fail_configure = true;
    }

    /// Samples the next reads will return, interleaved. Missing samples read as 0.
    pub fn feed_capture(&self, samples: impl IntoIterator<Item = i32>) {
        self.lock().capture_source.extend(samples);
    }

    /// All samples written so far.
    pub fn written(&self) -> Vec<i32> {
        self.lock().written.clone()
    }

    /// Forget written samples, keeping the allocation.
    pub fn clear_written(&self) {
        self.lock().written.clear();
    }

    pub fn stats(&self) -> MockStats {
        self.lock().stats.clone()
    }

    /// Parameters of the last successful configure call.
    pub fn params(&self) -> Option<StreamParams> {
        self.lock().params
    }
}

/// A stream backed by a [`MockState`].
#[derive(Debug)]
pub struct MockPcm {
    state: MockState,
}

impl MockPcm {
    pub fn state(&self) -> &MockState {
        &self.state
    }

    fn channels(inner: &Inner) -> usize {
        inner.params.map_or(1, |p| p.channels.max(1))
    }
}

impl PcmStream for MockPcm {
    fn configure(&mut self, params: &StreamParams) -> Result<(), String> {
        let mut inner = self.state.lock();
        inner.stats.configure_calls += 1;
        if inner.fail_configure {
            inner.fail_configure = false;
            return Err("invalid argument".into());
        }
        inner.params = Some(*params);
        Ok(())
    }

    fn write(&mut self, samples: Interleaved<'_>, frames: usize) -> Result<usize, XferError> {
        let mut inner = self.state.lock();
        inner.stats.write_calls += 1;
        let frames = match inner.write_script.pop_front().unwrap_or(Script::Ok) {
            Script::Ok => frames,
            Script::Short(n) => n.min(frames),
            Script::Fail(err) => return Err(err),
        };
        let count = frames * Self::channels(&inner);
        match samples {
            Interleaved::I16(buf) => {
                inner.written.extend(buf.iter().take(count).map(|&s| s as i32))
            }
            Interleaved::I32(buf) => inner.written.extend(buf.iter().take(count).copied()),
        }
        Ok(frames)
    }

    fn read(&mut self, samples: InterleavedMut<'_>, frames: usize) -> Result<usize, XferError> {
        let mut inner = self.state.lock();
        inner.stats.read_calls += 1;
        let frames = match inner.read_script.pop_front().unwrap_or(Script::Ok) {
            Script::Ok => frames,
            Script::Short(n) => n.min(frames),
            Script::Fail(err) => return Err(err),
        };
        let count = frames * Self::channels(&inner);
        match samples {
            InterleavedMut::I16(buf) => {
                for slot in buf.iter_mut().take(count) {
                    *slot = inner.capture_source.pop_front().unwrap_or(0) as i16;
                }
            }
            InterleavedMut::I32(buf) => {
                for slot in buf.iter_mut().take(count) {
                    *slot = inner.capture_source.pop_front().unwrap_or(0);
                }
            }
        }
        Ok(frames)
    }

    fn recover(&mut self, _err: XferError) -> Result<(), XferError> {
        let mut inner = self.state.lock();
        inner.stats.recover_calls += 1;
        inner.recover_error.take().map_or(Ok(()), Err)
    }

    fn resume(&mut self) -> Result<Resume, XferError> {
        let mut inner = self.state.lock();
        inner.stats.resume_calls += 1;
        inner.resume_script.pop_front().unwrap_or(Ok(Resume::Done))
    }

    fn prepare(&mut self) -> Result<(), XferError> {
        let mut inner = self.state.lock();
        inner.stats.prepare_calls += 1;
        inner.prepare_error.take().map_or(Ok(()), Err)
    }

    fn drain(&mut self) -> Result<(), XferError> {
        self.state.lock().stats.drain_calls += 1;
        Ok(())
    }
}

/// Backend handing out [`MockPcm`] streams.
#[derive(Debug, Default)]
pub struct MockBackend {
    playback: Option<MockState>,
    capture: Option<MockState>,
    fail_playback: bool,
    fail_capture: bool,
    opened: Vec<(Direction, String)>,
}

impl MockBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make opening `direction` fail.
    pub fn fail_open(mut self, direction: Direction) -> Self {
        match direction {
            Direction::Playback => self.fail_playback = true,
            Direction::Capture => self.fail_capture = true,
        }
        self
    }

    /// State of the stream opened for `direction`, if any.
    pub fn state(&self, direction: Direction) -> Option<MockState> {
        match direction {
            Direction::Playback => self.playback.clone(),
            Direction::Capture => self.capture.clone(),
        }
    }

    /// Every successful open, in order.
    pub fn opened(&self) -> &[(Direction, String)] {
        &self.opened
    }
}

impl PcmBackend for MockBackend {
    type Stream = MockPcm;

    fn open(&mut self, direction: Direction, device: &str) -> Result<MockPcm, String> {
        let fail = match direction {
            Direction::Playback => self.fail_playback,
            Direction::Capture => self.fail_capture,
        };
        if fail {
            return Err("no such device".into());
        }

        let state = MockState::default();
        match direction {
            Direction::Playback => self.playback = Some(state.clone()),
            Direction::Capture => self.capture = Some(state.clone()),
        }
        self.opened.push((direction, device.to_string()));
        Ok(MockPcm { state })
    }
}
