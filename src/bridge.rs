//! The bridge session: negotiation handlers and the per-cycle processor.
//!
//! A [`Bridge`] owns everything one session needs: the configuration, the
//! device handles, the scratch buffers and the diagnostics sender. Nothing
//! lives in globals, so several sessions can coexist in one process.
//!
//! # Call order
//!
//! ```text
//! open ──► on_buffer_size ──► on_sample_rate ──► process × N ──► shutdown
//!          (either order)                        │
//!          on_buffer_size again between cycles ◄─┘
//! ```
//!
//! `process` and `on_buffer_size` both take `&mut self`, so a resize can
//! never overlap a cycle: whoever drives the bridge must hold it exclusively.
//!
//! # Example
//!
//! ```
//! use jacktoalsa::device::mock::MockBackend;
//! use jacktoalsa::device::Direction;
//! use jacktoalsa::{diagnostics, Bridge, PlanarPorts, SampleFormat, SessionConfig};
//!
//! let config = SessionConfig::default()
//!     .with_channels(2, 0)
//!     .with_format(SampleFormat::S16);
//! let mut backend = MockBackend::new();
//! let (events, _log) = diagnostics::channel(16);
//!
//! let mut bridge = Bridge::open(config, &mut backend, events).unwrap();
//! bridge.on_buffer_size(2).unwrap();
//! bridge.on_sample_rate(48_000).unwrap();
//!
//! let mut ports = PlanarPorts::from_interleaved(2, &[1.0, -1.0, 0.5, -0.5], 0);
//! bridge.process(&mut ports, 2);
//!
//! let written = backend.state(Direction::Playback).unwrap().written();
//! assert_eq!(written, vec![32767, -32768, 16384, -16384]);
//! ```

use std::sync::Arc;

use crate::buffers::{Scratch, ScratchBuffers};
use crate::codec::{FixedFormat, S16, S24, S24Headroom, S32};
use crate::config::{DevicePolicy, SampleFormat, SessionConfig};
use crate::device::{Device, Direction, PcmBackend, PcmStream, ReadOutcome, WriteOutcome};
use crate::diagnostics::{BridgeEvent, EventKind, EventSender};
use crate::error::{BridgeError, ConfigError, DeviceError};
use crate::negotiate::{RateDecision, SampleRateLock};
use crate::ports::CyclePorts;

/// What happened during one [`Bridge::process`] call.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct CycleReport {
    /// Frames accepted by the playback device.
    pub frames_written: usize,
    /// Frames captured and published to the graph.
    pub frames_read: usize,
    pub underruns: u32,
    pub overruns: u32,
    /// Transfers that failed outright.
    pub failures: u32,
    /// The cycle was skipped without touching any device.
    pub skipped: bool,
}

/// One bridging session between a graph and a pair of PCM devices.
pub struct Bridge<S: PcmStream> {
    config: SessionConfig,
    rate: Arc<SampleRateLock>,
    configured: bool,
    scratch: ScratchBuffers,
    playback: Option<Device<S>>,
    capture: Option<Device<S>>,
    events: EventSender,
    cycle: u64,
}

impl<S: PcmStream> Bridge<S> {
    /// Open the devices for every direction with a non-zero channel count.
    ///
    /// Devices are opened but not configured; configuration happens once the
    /// sample rate is known (see [`on_sample_rate`](Self::on_sample_rate)).
    pub fn open<B>(
        config: SessionConfig,
        backend: &mut B,
        events: EventSender,
    ) -> Result<Self, BridgeError>
    where
        B: PcmBackend<Stream = S>,
    {
        config.validate()?;

        let playback = match config.playback_channels {
            0 => None,
            ch => {
                let name = &config.playback_device;
                let opened = Device::open(backend, Direction::Playback, name, ch);
                apply_policy(config.device_policy, opened)?
            }
        };
        let capture = match config.capture_channels {
            0 => None,
            ch => {
                let opened = Device::open(backend, Direction::Capture, &config.capture_device, ch);
                apply_policy(config.device_policy, opened)?
            }
        };
        if playback.is_none() && capture.is_none() {
            return Err(BridgeError::NoActiveDirection);
        }

        Ok(Self {
            config,
            rate: Arc::new(SampleRateLock::new()),
            configured: false,
            scratch: ScratchBuffers::new(),
            playback,
            capture,
            events,
            cycle: 0,
        })
    }

    /// Sample-rate handler.
    ///
    /// The first call fixes the rate and configures the devices. Repeating
    /// the same rate is a no-op. A different rate is a fatal
    /// [`ConfigError::SampleRateConflict`] and touches no device.
    pub fn on_sample_rate(&mut self, rate: u32) -> Result<RateDecision, BridgeError> {
        let decision = self.rate.negotiate(rate).map_err(|err| {
            tracing::error!(%err, "sample rate negotiation failed");
            err
        })?;

        if let RateDecision::Fixed(rate) = decision {
            tracing::info!(rate, "sample rate fixed for this session");
        }
        if !self.configured {
            self.configure_devices(decision.rate())?;
        }
        Ok(decision)
    }

    /// Buffer-size handler: reallocate scratch buffers for a new cycle length.
    ///
    /// Must not run concurrently with [`process`](Self::process); `&mut self`
    /// enforces that for a single owner.
    pub fn on_buffer_size(&mut self, frames: usize) -> Result<(), BridgeError> {
        if frames == 0 {
            return Err(ConfigError::ZeroCycleLength.into());
        }
        tracing::info!(frames, "new buffer size");
        self.resize_scratch(frames)
    }

    /// Process one cycle of `frames` frames.
    ///
    /// Encodes the graph's playback buffers, writes them to the playback
    /// device, then reads the capture device and publishes the result to the
    /// graph's capture buffers. Never allocates, never panics on device
    /// errors; problems are reported through the diagnostics ring and the
    /// returned [`CycleReport`].
    pub fn process<P>(&mut self, ports: &mut P, frames: usize) -> CycleReport
    where
        P: CyclePorts + ?Sized,
    {
        self.cycle += 1;
        let mut report = CycleReport::default();

        if !self.configured || self.scratch.cycle_len() == 0 {
            self.emit(EventKind::NotReady);
            report.skipped = true;
            return report;
        }
        let expected = self.scratch.cycle_len();
        if frames != expected {
            self.emit(EventKind::FrameMismatch { expected, actual: frames });
            report.skipped = true;
            return report;
        }

        let format = self.config.format;
        let cycle = self.cycle;

        // graph -> device
        let playback = (self.playback.as_mut(), self.scratch.get_mut(Direction::Playback));
        if let (Some(dev), Some(scratch)) = playback {
            encode(format, &*ports, scratch, dev.channels(), frames);
            match dev.write(scratch.as_interleaved(), frames) {
                Ok(WriteOutcome { frames: written, recovered }) => {
                    report.frames_written = written;
                    if recovered {
                        report.underruns += 1;
                        let _ = self.events.emit(BridgeEvent { cycle, kind: EventKind::Underrun });
                    }
                    if written < frames {
                        let kind = EventKind::ShortTransfer {
                            direction: Direction::Playback,
                            expected: frames,
                            actual: written,
                        };
                        let _ = self.events.emit(BridgeEvent { cycle, kind });
                    }
                }
                Err(error) => {
                    report.failures += 1;
                    if error.is_xrun_class() {
                        report.underruns += 1;
                    }
                    let kind = EventKind::TransferFailed {
                        direction: Direction::Playback,
                        error,
                    };
                    let _ = self.events.emit(BridgeEvent { cycle, kind });
                }
            }
        }

        // device -> graph
        let capture = (self.capture.as_mut(), self.scratch.get_mut(Direction::Capture));
        if let (Some(dev), Some(scratch)) = capture {
            let channels = dev.channels();
            match dev.read(scratch.as_interleaved_mut(), frames) {
                Ok(ReadOutcome { overrun: true, .. }) => {
                    report.overruns += 1;
                    let _ = self.events.emit(BridgeEvent { cycle, kind: EventKind::Overrun });
                }
                Ok(ReadOutcome { frames: read, .. }) => {
                    // only frames filled by this read are published
                    decode(format, scratch, ports, channels, read.min(frames));
                    report.frames_read = read;
                    if read < frames {
                        let kind = EventKind::ShortTransfer {
                            direction: Direction::Capture,
                            expected: frames,
                            actual: read,
                        };
                        let _ = self.events.emit(BridgeEvent { cycle, kind });
                    }
                }
                Err(error) => {
                    report.failures += 1;
                    let kind = EventKind::TransferFailed {
                        direction: Direction::Capture,
                        error,
                    };
                    let _ = self.events.emit(BridgeEvent { cycle, kind });
                }
            }
        }

        report
    }

    /// Drain pending playback, then close both devices.
    ///
    /// Call after the graph has stopped invoking cycles.
    pub fn shutdown(mut self) -> Result<(), DeviceError> {
        tracing::info!(cycles = self.cycle, "shutting down bridge");
        let drained = match self.playback.as_mut() {
            Some(dev) if self.configured => dev.drain(),
            _ => Ok(()),
        };
        // dropping the devices closes the handles
        drop(self.playback.take());
        drop(self.capture.take());
        drained
    }

    /// Shared handle for checking later rate notifications from another thread.
    pub fn rate_lock(&self) -> Arc<SampleRateLock> {
        self.rate.clone()
    }

    pub fn sample_rate(&self) -> Option<u32> {
        self.rate.get()
    }

    /// Negotiated cycle length, 0 before the first buffer-size call.
    pub fn cycle_len(&self) -> usize {
        self.scratch.cycle_len()
    }

    /// Whether `direction` has a live device.
    pub fn is_active(&self, direction: Direction) -> bool {
        self.device(direction).is_some()
    }

    pub fn device(&self, direction: Direction) -> Option<&Device<S>> {
        match direction {
            Direction::Playback => self.playback.as_ref(),
            Direction::Capture => self.capture.as_ref(),
        }
    }

    pub fn scratch(&self) -> &ScratchBuffers {
        &self.scratch
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Cycles processed so far, including skipped ones.
    pub fn cycles(&self) -> u64 {
        self.cycle
    }

    fn emit(&mut self, kind: EventKind) {
        let _ = self.events.emit(BridgeEvent { cycle: self.cycle, kind });
    }

    fn active_channels(&self, direction: Direction) -> usize {
        self.device(direction).map_or(0, Device::channels)
    }

    fn resize_scratch(&mut self, frames: usize) -> Result<(), BridgeError> {
        let playback = self.active_channels(Direction::Playback);
        let capture = self.active_channels(Direction::Capture);
        self.scratch.resize(frames, playback, capture, self.config.format)
    }

    fn configure_devices(&mut self, rate: u32) -> Result<(), BridgeError> {
        let format = self.config.format;
        let period = match self.scratch.cycle_len() {
            0 => None,
            n => Some(n),
        };
        let policy = self.config.device_policy;

        for slot in [&mut self.playback, &mut self.capture] {
            if let Some(dev) = slot.as_mut() {
                if let Err(err) = dev.configure(format, rate, period) {
                    match policy {
                        DevicePolicy::Abort => return Err(err.into()),
                        DevicePolicy::Degrade => {
                            tracing::warn!(%err, "disabling direction");
                            *slot = None;
                        }
                    }
                }
            }
        }
        if self.playback.is_none() && self.capture.is_none() {
            return Err(BridgeError::NoActiveDirection);
        }

        // a degraded direction must not keep its scratch buffer
        if let Some(frames) = period {
            self.resize_scratch(frames)?;
        }
        self.configured = true;
        Ok(())
    }
}

fn apply_policy<S>(
    policy: DevicePolicy,
    opened: Result<Device<S>, DeviceError>,
) -> Result<Option<Device<S>>, BridgeError> {
    match (opened, policy) {
        (Ok(dev), _) => Ok(Some(dev)),
        (Err(err), DevicePolicy::Abort) => {
            tracing::error!(%err, "device setup failed");
            Err(err.into())
        }
        (Err(err), DevicePolicy::Degrade) => {
            tracing::warn!(%err, "disabling direction");
            Ok(None)
        }
    }
}

fn encode<P>(format: SampleFormat, ports: &P, scratch: &mut Scratch, channels: usize, frames: usize)
where
    P: CyclePorts + ?Sized,
{
    match scratch {
        Scratch::I16(buf) => interleave::<S16, P>(ports, buf, channels, frames),
        Scratch::I32(buf) => match format {
            SampleFormat::S24 => interleave::<S24, P>(ports, buf, channels, frames),
            SampleFormat::S24Headroom => interleave::<S24Headroom, P>(ports, buf, channels, frames),
            _ => interleave::<S32, P>(ports, buf, channels, frames),
        },
    }
}

fn decode<P>(format: SampleFormat, scratch: &Scratch, ports: &mut P, channels: usize, frames: usize)
where
    P: CyclePorts + ?Sized,
{
    match scratch {
        Scratch::I16(buf) => deinterleave::<S16, P>(buf, ports, channels, frames),
        Scratch::I32(buf) => match format {
            SampleFormat::S24 => deinterleave::<S24, P>(buf, ports, channels, frames),
            SampleFormat::S24Headroom => {
                deinterleave::<S24Headroom, P>(buf, ports, channels, frames)
            }
            _ => deinterleave::<S32, P>(buf, ports, channels, frames),
        },
    }
}

/// Planar graph buffers → interleaved fixed-point frames.
fn interleave<F, P>(ports: &P, dst: &mut [F::Sample], channels: usize, frames: usize)
where
    F: FixedFormat,
    P: CyclePorts + ?Sized,
{
    for ch in 0..channels {
        let slots = dst.iter_mut().skip(ch).step_by(channels).take(frames);
        match ports.playback(ch) {
            Some(src) => {
                for (n, slot) in slots.enumerate() {
                    *slot = F::encode(src.get(n).copied().unwrap_or(0.0));
                }
            }
            None => slots.for_each(|slot| *slot = F::encode(0.0)),
        }
    }
}

/// Interleaved fixed-point frames → planar graph buffers.
fn deinterleave<F, P>(src: &[F::Sample], ports: &mut P, channels: usize, frames: usize)
where
    F: FixedFormat,
    P: CyclePorts + ?Sized,
{
    for ch in 0..channels {
        if let Some(dst) = ports.capture(ch) {
            let samples = src.iter().skip(ch).step_by(channels);
            for (out, &s) in dst.iter_mut().zip(samples).take(frames) {
                *out = F::decode(s);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::mock::{MockBackend, MockPcm, Script};
    use crate::diagnostics::{self, EventReceiver};
    use crate::error::XferError;
    use crate::ports::PlanarPorts;

    type Session = (Bridge<MockPcm>, MockBackend, EventReceiver);

    fn session(config: SessionConfig, frames: usize) -> Session {
        let mut backend = MockBackend::new();
        let (tx, rx) = diagnostics::channel(32);
        let mut bridge = Bridge::open(config, &mut backend, tx).unwrap();
        bridge.on_buffer_size(frames).unwrap();
        bridge.on_sample_rate(48_000).unwrap();
        (bridge, backend, rx)
    }

    #[test]
    fn interleaves_channel_fastest() {
        let config = SessionConfig::default().with_channels(3, 0).with_format(SampleFormat::S16);
        let (mut bridge, backend, _rx) = session(config, 2);

        let mut ports = PlanarPorts::new(3, 0, 2);
        ports.playback_mut(0).copy_from_slice(&[0.0, 0.5]);
        ports.playback_mut(1).copy_from_slice(&[-0.5, 0.25]);
        ports.playback_mut(2).copy_from_slice(&[1.0, -1.0]);
        let report = bridge.process(&mut ports, 2);

        assert_eq!(report.frames_written, 2);
        assert_eq!(
            backend.state(Direction::Playback).unwrap().written(),
            vec![0, -16384, 32767, 16384, 8192, -32768]
        );
    }

    #[test]
    fn deinterleaves_into_capture_ports() {
        let config = SessionConfig::default().with_channels(0, 2).with_format(SampleFormat::S24);
        let (mut bridge, backend, _rx) = session(config, 2);
        let state = backend.state(Direction::Capture).unwrap();
        state.feed_capture([4_194_304, -8_388_608, 0, 2_097_152]);

        let mut ports = PlanarPorts::new(0, 2, 2);
        let report = bridge.process(&mut ports, 2);

        assert_eq!(report.frames_read, 2);
        assert_eq!(ports.capture_ref(0), &[0.5, 0.0]);
        assert_eq!(ports.capture_ref(1), &[-1.0, 0.25]);
    }

    #[test]
    fn missing_playback_port_encodes_silence() {
        let config = SessionConfig::default().with_channels(2, 0).with_format(SampleFormat::S32);
        let (mut bridge, backend, _rx) = session(config, 2);

        let mut ports = PlanarPorts::from_interleaved(1, &[0.5, 0.5], 0);
        bridge.process(&mut ports, 2);

        assert_eq!(
            backend.state(Direction::Playback).unwrap().written(),
            vec![1 << 30, 0, 1 << 30, 0]
        );
    }

    #[test]
    fn cycles_before_negotiation_are_skipped() {
        let mut backend = MockBackend::new();
        let (tx, mut rx) = diagnostics::channel(8);
        let mut bridge = Bridge::open(SessionConfig::default(), &mut backend, tx).unwrap();

        let mut ports = PlanarPorts::new(2, 2, 64);
        let report = bridge.process(&mut ports, 64);

        assert!(report.skipped);
        assert_eq!(rx.pop().map(|e| e.kind), Some(EventKind::NotReady));
        let stats = backend.state(Direction::Playback).unwrap().stats();
        assert_eq!(stats.write_calls, 0);
    }

    #[test]
    fn mismatched_frame_count_skips_the_cycle() {
        let (mut bridge, backend, mut rx) = session(SessionConfig::default(), 128);

        let mut ports = PlanarPorts::new(2, 2, 64);
        let report = bridge.process(&mut ports, 64);

        assert!(report.skipped);
        assert_eq!(
            rx.pop().map(|e| e.kind),
            Some(EventKind::FrameMismatch { expected: 128, actual: 64 })
        );
        assert_eq!(backend.state(Direction::Capture).unwrap().stats().read_calls, 0);
    }

    #[test]
    fn short_capture_publishes_only_read_frames() {
        let config = SessionConfig::default().with_channels(0, 1).with_format(SampleFormat::S16);
        let (mut bridge, backend, mut rx) = session(config, 4);
        let state = backend.state(Direction::Capture).unwrap();
        state.script_read(Script::Short(2));
        state.feed_capture([16384, 16384, 16384, 16384]);

        let mut ports = PlanarPorts::new(0, 1, 4);
        let report = bridge.process(&mut ports, 4);

        assert_eq!(report.frames_read, 2);
        assert_eq!(ports.capture_ref(0), &[0.5, 0.5, 0.0, 0.0]);
        assert!(matches!(
            rx.pop().map(|e| e.kind),
            Some(EventKind::ShortTransfer { direction: Direction::Capture, expected: 4, actual: 2 })
        ));
    }

    #[test]
    fn failed_write_does_not_stop_capture() {
        let (mut bridge, backend, mut rx) = session(SessionConfig::default(), 8);
        let playback = backend.state(Direction::Playback).unwrap();
        playback.script_write(Script::Fail(XferError::Errno(5)));

        let mut ports = PlanarPorts::new(2, 2, 8);
        let report = bridge.process(&mut ports, 8);

        assert_eq!(report.failures, 1);
        assert_eq!(report.frames_read, 8);
        assert_eq!(
            rx.pop().map(|e| e.kind),
            Some(EventKind::TransferFailed {
                direction: Direction::Playback,
                error: XferError::Errno(5)
            })
        );
    }

    #[test]
    fn zero_cycle_length_is_rejected() {
        let mut backend = MockBackend::new();
        let (tx, _rx) = diagnostics::channel(8);
        let mut bridge = Bridge::open(SessionConfig::default(), &mut backend, tx).unwrap();
        assert!(matches!(
            bridge.on_buffer_size(0),
            Err(BridgeError::Config(ConfigError::ZeroCycleLength))
        ));
    }

    #[test]
    fn shutdown_drains_playback() {
        let (bridge, backend, _rx) = session(SessionConfig::default(), 16);
        bridge.shutdown().unwrap();
        assert_eq!(backend.state(Direction::Playback).unwrap().stats().drain_calls, 1);
        assert_eq!(backend.state(Direction::Capture).unwrap().stats().drain_calls, 0);
    }
}
