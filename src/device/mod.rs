//! Hardware PCM side of the bridge.
//!
//! The bridge talks to devices through two small traits:
//! - [`PcmBackend`] opens a named device for one [`Direction`]
//! - [`PcmStream`] configures it and performs blocking interleaved transfers
//!
//! [`Device`] wraps a stream with the recovery policy:
//!
//! | direction | xrun                         | suspend                              |
//! |-----------|------------------------------|--------------------------------------|
//! | playback  | recover, retry the write once | resume once, retry the write once    |
//! | capture   | prepare, report zero frames  | resume once, report zero frames      |
//!
//! A write retry is bounded because the data is already in hand. A capture
//! retry could block past the next cycle's deadline waiting for fresh data,
//! so one cycle of missing input is the accepted cost.
//!
//! Resuming a suspended stream is a single attempt. If the hardware is not
//! back yet the transfer is dropped and the next cycle tries again; if the
//! stream cannot resume at all it is prepared instead.

use std::fmt;

use crate::config::SampleFormat;
use crate::error::{DeviceError, XferError};

#[cfg(feature = "alsa_device")]
pub mod alsa;
pub mod mock;
#[cfg(feature = "device_probe")]
pub mod probe;

/// Which way audio flows through a device.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Direction {
    /// Graph → device (render).
    Playback,
    /// Device → graph.
    Capture,
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Direction::Playback => write!(f, "playback"),
            Direction::Capture => write!(f, "capture"),
        }
    }
}

/// Hardware parameters applied by [`PcmStream::configure`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct StreamParams {
    pub format: SampleFormat,
    pub channels: usize,
    pub sample_rate: u32,
    /// Period size in frames. `None` lets the device pick.
    pub period_frames: Option<usize>,
}

/// Interleaved samples handed to a blocking write.
#[derive(Clone, Copy, Debug)]
pub enum Interleaved<'a> {
    I16(&'a [i16]),
    I32(&'a [i32]),
}

/// Interleaved destination for a blocking read.
#[derive(Debug)]
pub enum InterleavedMut<'a> {
    I16(&'a mut [i16]),
    I32(&'a mut [i32]),
}

/// An open PCM stream.
///
/// `write`/`read` block until the frames are transferred (or an error
/// occurs); they must not allocate.
pub trait PcmStream: Send {
    /// Fix access mode, format, channel count and rate.
    fn configure(&mut self, params: &StreamParams) -> Result<(), String>;

    /// Write `frames` interleaved frames. Returns frames written.
    fn write(&mut self, samples: Interleaved<'_>, frames: usize) -> Result<usize, XferError>;

    /// Read up to `frames` interleaved frames. Returns frames read.
    fn read(&mut self, samples: InterleavedMut<'_>, frames: usize) -> Result<usize, XferError>;

    /// Bring the stream back from an xrun so it can be written again.
    fn recover(&mut self, err: XferError) -> Result<(), XferError>;

    /// One non-blocking attempt to resume a suspended stream.
    ///
    /// `Err` means the stream cannot resume and has to be prepared.
    fn resume(&mut self) -> Result<Resume, XferError>;

    /// Put the stream back into the prepared state.
    fn prepare(&mut self) -> Result<(), XferError>;

    /// Block until queued playback frames have been played.
    fn drain(&mut self) -> Result<(), XferError>;
}

/// Opens PCM streams by device identifier.
pub trait PcmBackend {
    type Stream: PcmStream;

    fn open(&mut self, direction: Direction, device: &str) -> Result<Self::Stream, String>;
}

/// Result of a single resume attempt.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Resume {
    /// The stream is running again.
    Done,
    /// The hardware is still waking up; try again next cycle.
    Pending,
}

/// Result of a playback transfer.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct WriteOutcome {
    pub frames: usize,
    /// An underrun was recovered and the write retried.
    pub recovered: bool,
}

/// Result of a capture transfer.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ReadOutcome {
    /// Zero after an overrun.
    pub frames: usize,
    /// The stream overran and was re-prepared; no data this cycle.
    pub overrun: bool,
}

/// One configured PCM stream with its recovery policy.
pub struct Device<S> {
    stream: S,
    direction: Direction,
    name: String,
    channels: usize,
}

impl<S: PcmStream> Device<S> {
    /// Open `name` through `backend`.
    pub fn open<B>(
        backend: &mut B,
        direction: Direction,
        name: &str,
        channels: usize,
    ) -> Result<Self, DeviceError>
    where
        B: PcmBackend<Stream = S>,
    {
        tracing::info!(%direction, device = name, channels, "opening pcm device");
        let stream = backend.open(direction, name).map_err(|reason| DeviceError::Open {
            direction,
            device: name.to_string(),
            reason,
        })?;

        Ok(Self {
            stream,
            direction,
            name: name.to_string(),
            channels,
        })
    }

    /// Apply hardware parameters, using the channel count given at open.
    pub fn configure(
        &mut self,
        format: SampleFormat,
        sample_rate: u32,
        period_frames: Option<usize>,
    ) -> Result<(), DeviceError> {
        let params = StreamParams {
            format,
            channels: self.channels,
            sample_rate,
            period_frames,
        };
        tracing::info!(
            direction = %self.direction,
            device = %self.name,
            %format,
            sample_rate,
            channels = self.channels,
            "setting pcm parameters"
        );
        self.stream.configure(&params).map_err(|reason| DeviceError::Configure {
            direction: self.direction,
            device: self.name.clone(),
            reason,
        })
    }

    /// Blocking write with one bounded retry after an underrun or suspend.
    ///
    /// A stream that is still suspended after one resume attempt fails with
    /// [`XferError::Suspended`] without retrying.
    pub fn write(
        &mut self,
        samples: Interleaved<'_>,
        frames: usize,
    ) -> Result<WriteOutcome, XferError> {
        match self.stream.write(samples, frames) {
            Ok(frames) => Ok(WriteOutcome { frames, recovered: false }),
            Err(XferError::Xrun) => {
                self.stream.recover(XferError::Xrun)?;
                let frames = self.stream.write(samples, frames)?;
                Ok(WriteOutcome { frames, recovered: true })
            }
            Err(XferError::Suspended) => {
                if !self.wake()? {
                    return Err(XferError::Suspended);
                }
                let frames = self.stream.write(samples, frames)?;
                Ok(WriteOutcome { frames, recovered: true })
            }
            Err(err) => Err(err),
        }
    }

    /// Blocking read. An overrun or suspend yields no frames this cycle.
    pub fn read(
        &mut self,
        samples: InterleavedMut<'_>,
        frames: usize,
    ) -> Result<ReadOutcome, XferError> {
        match self.stream.read(samples, frames) {
            Ok(frames) => Ok(ReadOutcome { frames, overrun: false }),
            Err(XferError::Xrun) => {
                self.stream.prepare()?;
                Ok(ReadOutcome { frames: 0, overrun: true })
            }
            Err(XferError::Suspended) => {
                // a pending resume is retried by the next read
                self.wake()?;
                Ok(ReadOutcome { frames: 0, overrun: true })
            }
            Err(err) => Err(err),
        }
    }

    /// Single resume attempt, falling back to prepare. `false` while pending.
    fn wake(&mut self) -> Result<bool, XferError> {
        match self.stream.resume() {
            Ok(Resume::Done) => Ok(true),
            Ok(Resume::Pending) => Ok(false),
            Err(_) => self.stream.prepare().map(|()| true),
        }
    }

    /// Let queued playback finish. Capture streams have nothing to drain.
    pub fn drain(&mut self) -> Result<(), DeviceError> {
        if self.direction != Direction::Playback {
            return Ok(());
        }
        tracing::debug!(device = %self.name, "draining playback");
        self.stream.drain().map_err(|source| DeviceError::Drain {
            direction: self.direction,
            device: self.name.clone(),
            source,
        })
    }

    pub fn direction(&self) -> Direction {
        self.direction
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn channels(&self) -> usize {
        self.channels
    }

    pub fn stream(&self) -> &S {
        &self.stream
    }
}
