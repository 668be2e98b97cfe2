//! Graph side of the bridge: planar float buffers for one cycle.
//!
//! The host graph implements [`CyclePorts`] over whatever it uses for
//! ports. Views are only valid for the duration of one
//! [`Bridge::process`](crate::Bridge::process) call and are never cached.

/// Per-cycle access to the graph's planar sample buffers.
///
/// - `playback` channels flow graph → device (the graph's inputs to us)
/// - `capture` channels flow device → graph (our outputs into the graph)
pub trait CyclePorts {
    /// Samples the graph wants played on `channel`, or `None` if the graph
    /// has nothing connected there (encoded as silence).
    fn playback(&self, channel: usize) -> Option<&[f32]>;

    /// Buffer the captured samples for `channel` are written into, or
    /// `None` if the graph has no such port.
    ///
    /// Whatever the graph put there before the cycle is left alone when
    /// nothing was captured.
    fn capture(&mut self, channel: usize) -> Option<&mut [f32]>;
}

/// Owned planar buffers, one `Vec<f32>` per channel.
///
/// Useful as a host stand-in for tests, offline rendering and benchmarks.
///
/// ```
/// use jacktoalsa::{CyclePorts, PlanarPorts};
///
/// let mut ports = PlanarPorts::new(2, 1, 64);
/// ports.playback_mut(0).fill(0.5);
/// assert_eq!(ports.playback(0).unwrap()[0], 0.5);
/// assert_eq!(ports.capture(0).unwrap().len(), 64);
/// ```
#[derive(Clone, Debug, Default, PartialEq)]
pub struct PlanarPorts {
    playback: Vec<Vec<f32>>,
    capture: Vec<Vec<f32>>,
}

impl PlanarPorts {
    /// Silent buffers of `frames` samples per channel.
    pub fn new(playback_channels: usize, capture_channels: usize, frames: usize) -> Self {
        Self {
            playback: vec![vec![0.0; frames]; playback_channels],
            capture: vec![vec![0.0; frames]; capture_channels],
        }
    }

    /// Build playback channels from interleaved samples.
    pub fn from_interleaved(channels: usize, samples: &[f32], capture_channels: usize) -> Self {
        let channels = channels.max(1);
        let frames = samples.len() / channels;
        let mut ports = Self::new(channels, capture_channels, frames);
        for (n, frame) in samples.chunks_exact(channels).enumerate() {
            for (ch, &s) in frame.iter().enumerate() {
                ports.playback[ch][n] = s;
            }
        }
        ports
    }

    pub fn playback_mut(&mut self, channel: usize) -> &mut [f32] {
        &mut self.playback[channel]
    }

    pub fn capture_ref(&self, channel: usize) -> &[f32] {
        &self.capture[channel]
    }

    /// Reset every capture buffer to silence, as a graph does before a cycle.
    pub fn silence_capture(&mut self) {
        for buf in self.capture.iter_mut() {
            buf.iter_mut().for_each(|s| *s = 0.0);
        }
    }
}

impl CyclePorts for PlanarPorts {
    fn playback(&self, channel: usize) -> Option<&[f32]> {
        self.playback.get(channel).map(Vec::as_slice)
    }

    fn capture(&mut self, channel: usize) -> Option<&mut [f32]> {
        self.capture.get_mut(channel).map(Vec::as_mut_slice)
    }
}
