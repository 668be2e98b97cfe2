//! Real-time bridge between an audio graph's float ports and PCM devices.
//!
//! Each graph cycle, [`Bridge::process`] encodes the graph's planar `f32`
//! playback buffers into an interleaved fixed-point frame buffer and writes
//! it to the playback device, then reads interleaved frames from the capture
//! device and decodes them into the graph's capture buffers.
//!
//! The pieces:
//! - [`codec`]: float ↔ fixed-point conversion for 16/24/32-bit formats
//! - [`buffers`]: per-direction interleaved scratch buffers
//! - [`device`]: the PCM seam, ALSA and mock backends, xrun recovery
//! - [`negotiate`]: the write-once session sample rate
//! - [`diagnostics`]: lock-free events from the audio thread
//! - [`graph`]: a `dasp_graph` node wrapping a bridge
//! - `jack_host`: the JACK client used by the `jacktoalsa` binary
//!
//! Everything a session needs lives in one [`Bridge`]; there is no global
//! state.

pub mod bridge;
pub mod buffers;
pub mod codec;
pub mod config;
pub mod device;
pub mod diagnostics;
pub mod error;
pub mod graph;
#[cfg(feature = "jack_host")]
pub mod jack_host;
pub mod negotiate;
pub mod ports;

pub use bridge::{Bridge, CycleReport};
pub use config::{DevicePolicy, SampleFormat, SessionConfig};
pub use device::Direction;
pub use diagnostics::{BridgeEvent, EventKind};
pub use error::{BridgeError, ConfigError, DeviceError, XferError};
pub use graph::BridgeNode;
pub use negotiate::{RateDecision, SampleRateLock};
pub use ports::{CyclePorts, PlanarPorts};
