//! Interleaved scratch buffers shared by the encode and decode steps.
//!
//! There is one buffer per active direction, sized for exactly one cycle.
//! [`ScratchBuffers::resize`] is the only place this crate allocates audio
//! memory, and it runs only from the buffer-size handler, never inside a
//! cycle.

use crate::config::SampleFormat;
use crate::device::{Direction, Interleaved, InterleavedMut};
use crate::error::BridgeError;

/// Storage for one direction, typed by the device container width.
#[derive(Debug)]
pub enum Scratch {
    I16(Vec<i16>),
    /// 24-bit and 32-bit formats.
    I32(Vec<i32>),
}

impl Scratch {
    fn zeroed(
        format: SampleFormat,
        samples: usize,
        direction: Direction,
    ) -> Result<Self, BridgeError> {
        let alloc_err = |_| BridgeError::Alloc { direction, samples };
        Ok(match format {
            SampleFormat::S16 => {
                let mut buf = Vec::new();
                buf.try_reserve_exact(samples).map_err(alloc_err)?;
                buf.resize(samples, 0i16);
                Scratch::I16(buf)
            }
            _ => {
                let mut buf = Vec::new();
                buf.try_reserve_exact(samples).map_err(alloc_err)?;
                buf.resize(samples, 0i32);
                Scratch::I32(buf)
            }
        })
    }

    /// Length in samples (frames × channels).
    pub fn len(&self) -> usize {
        match self {
            Scratch::I16(buf) => buf.len(),
            Scratch::I32(buf) => buf.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Length in bytes as handed to the device.
    pub fn len_bytes(&self) -> usize {
        match self {
            Scratch::I16(buf) => buf.len() * std::mem::size_of::<i16>(),
            Scratch::I32(buf) => buf.len() * std::mem::size_of::<i32>(),
        }
    }

    pub fn as_interleaved(&self) -> Interleaved<'_> {
        match self {
            Scratch::I16(buf) => Interleaved::I16(buf),
            Scratch::I32(buf) => Interleaved::I32(buf),
        }
    }

    pub fn as_interleaved_mut(&mut self) -> InterleavedMut<'_> {
        match self {
            Scratch::I16(buf) => InterleavedMut::I16(buf),
            Scratch::I32(buf) => InterleavedMut::I32(buf),
        }
    }
}

/// Owner of the per-direction scratch buffers.
#[derive(Debug, Default)]
pub struct ScratchBuffers {
    playback: Option<Scratch>,
    capture: Option<Scratch>,
    cycle_len: usize,
}

impl ScratchBuffers {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace both buffers with zeroed ones for the new geometry.
    ///
    /// The old buffers are released before the new ones are reserved, so a
    /// resize never holds both generations at once. A direction with zero
    /// channels gets no buffer at all. Allocation failure leaves both
    /// directions without a buffer and is fatal to the session.
    pub fn resize(
        &mut self,
        cycle_len: usize,
        playback_channels: usize,
        capture_channels: usize,
        format: SampleFormat,
    ) -> Result<(), BridgeError> {
        self.playback = None;
        self.capture = None;
        self.cycle_len = 0;

        let playback = match playback_channels {
            0 => None,
            ch => {
                let samples = cycle_len.saturating_mul(ch);
                Some(Scratch::zeroed(format, samples, Direction::Playback)?)
            }
        };
        let capture = match capture_channels {
            0 => None,
            ch => {
                let samples = cycle_len.saturating_mul(ch);
                Some(Scratch::zeroed(format, samples, Direction::Capture)?)
            }
        };

        self.playback = playback;
        self.capture = capture;
        self.cycle_len = cycle_len;

        tracing::debug!(
            cycle_len,
            playback_bytes = self.bytes(Direction::Playback),
            capture_bytes = self.bytes(Direction::Capture),
            "scratch buffers reallocated"
        );
        Ok(())
    }

    /// Cycle length the buffers are currently sized for (0 before the first resize).
    pub fn cycle_len(&self) -> usize {
        self.cycle_len
    }

    pub fn get(&self, direction: Direction) -> Option<&Scratch> {
        match direction {
            Direction::Playback => self.playback.as_ref(),
            Direction::Capture => self.capture.as_ref(),
        }
    }

    pub fn get_mut(&mut self, direction: Direction) -> Option<&mut Scratch> {
        match direction {
            Direction::Playback => self.playback.as_mut(),
            Direction::Capture => self.capture.as_mut(),
        }
    }

    /// Size in bytes of a direction's buffer, 0 if it has none.
    pub fn bytes(&self, direction: Direction) -> usize {
        self.get(direction).map_or(0, Scratch::len_bytes)
    }
}
