//! Error types for jacktoalsa.
//!
//! Errors are split by when they can happen:
//! - **Setup errors** ([`ConfigError`], [`DeviceError`], [`BridgeError`]):
//!   returned from negotiation, device setup and resize. They may allocate.
//! - **Transfer errors** ([`XferError`]): returned from the blocking
//!   read/write calls on the audio thread. They are `Copy` and never
//!   allocate; the cycle turns them into [`BridgeEvent`](crate::BridgeEvent)s.

use crate::device::Direction;

/// Fatal configuration problems. None of these can be fixed at runtime.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    /// The graph asked for a rate different from the one already fixed.
    #[error(
        "sample rate changed from {fixed} Hz to {requested} Hz; \
         changing the sample rate is unsupported"
    )]
    SampleRateConflict {
        /// Rate fixed by the first negotiation.
        fixed: u32,
        /// Rate the graph asked for later.
        requested: u32,
    },

    /// The requested bit depth is not one of 16, 24 or 32.
    #[error("unsupported bit depth: {0} (expected 16, 24 or 32)")]
    UnsupportedBitDepth(u32),

    /// A zero sample rate was negotiated.
    #[error("sample rate must be non-zero")]
    ZeroSampleRate,

    /// A zero cycle length was negotiated.
    #[error("cycle length must be non-zero")]
    ZeroCycleLength,

    /// Both channel counts are zero.
    #[error("no playback or capture channels configured")]
    NoChannels,
}

/// A device could not be opened or configured.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DeviceError {
    /// The PCM device could not be opened.
    #[error("cannot open {direction} device \"{device}\": {reason}")]
    Open {
        /// Direction of the failed device.
        direction: Direction,
        /// Device identifier as given on the command line.
        device: String,
        /// Backend description of the failure.
        reason: String,
    },

    /// The PCM device rejected the requested parameters.
    #[error("cannot configure {direction} device \"{device}\": {reason}")]
    Configure {
        /// Direction of the failed device.
        direction: Direction,
        /// Device identifier as given on the command line.
        device: String,
        /// Backend description of the failure.
        reason: String,
    },

    /// Draining the playback stream at shutdown failed.
    #[error("cannot drain {direction} device \"{device}\": {source}")]
    Drain {
        /// Direction of the failed device.
        direction: Direction,
        /// Device identifier as given on the command line.
        device: String,
        /// The underlying transfer error.
        source: XferError,
    },
}

/// Errors from a blocking transfer or stream-state call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum XferError {
    /// Underrun on playback or overrun on capture.
    #[error("xrun")]
    Xrun,

    /// The stream was suspended (e.g. by power management).
    #[error("stream suspended")]
    Suspended,

    /// Any other errno from the backend.
    #[error("device error (errno {0})")]
    Errno(i32),
}

impl XferError {
    /// Whether this error means the ring buffer ran dry or overflowed.
    #[inline]
    pub fn is_xrun_class(&self) -> bool {
        matches!(self, XferError::Xrun | XferError::Suspended)
    }
}

/// Any error that stops a bridge session.
#[derive(Debug, thiserror::Error)]
pub enum BridgeError {
    /// Configuration conflict; the process should terminate.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Device setup failed under the abort policy.
    #[error(transparent)]
    Device(#[from] DeviceError),

    /// Scratch buffers for a new cycle length could not be allocated.
    #[error("cannot allocate {direction} scratch buffer of {samples} samples")]
    Alloc {
        /// Direction whose buffer failed.
        direction: Direction,
        /// Requested length in samples.
        samples: usize,
    },

    /// Every configured direction failed under the degrade policy.
    #[error("no playback or capture device is usable")]
    NoActiveDirection,
}
