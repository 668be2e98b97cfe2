//! Session configuration, fixed at startup.

use std::fmt;
use std::str::FromStr;

use crate::error::ConfigError;

/// Device-side sample format.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SampleFormat {
    /// 16-bit signed.
    S16,
    /// 24-bit signed in a 32-bit container, 2^23 full-scale.
    S24,
    /// 24-bit signed in a 32-bit container, legacy 2^22 full-scale.
    S24Headroom,
    /// 32-bit signed.
    S32,
}

impl SampleFormat {
    /// Maps a bit depth to a format. `headroom` picks the legacy 24-bit scale.
    pub fn from_bit_depth(bits: u32, headroom: bool) -> Result<Self, ConfigError> {
        match (bits, headroom) {
            (16, _) => Ok(SampleFormat::S16),
            (24, false) => Ok(SampleFormat::S24),
            (24, true) => Ok(SampleFormat::S24Headroom),
            (32, _) => Ok(SampleFormat::S32),
            (other, _) => Err(ConfigError::UnsupportedBitDepth(other)),
        }
    }

    /// Nominal bit depth.
    pub fn bits(&self) -> u32 {
        match self {
            SampleFormat::S16 => 16,
            SampleFormat::S24 | SampleFormat::S24Headroom => 24,
            SampleFormat::S32 => 32,
        }
    }

    /// Bytes per sample in the interleaved device buffer.
    pub fn width(&self) -> usize {
        match self {
            SampleFormat::S16 => 2,
            _ => 4,
        }
    }
}

impl fmt::Display for SampleFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SampleFormat::S16 => write!(f, "S16"),
            SampleFormat::S24 => write!(f, "S24"),
            SampleFormat::S24Headroom => write!(f, "S24 (2^22 scale)"),
            SampleFormat::S32 => write!(f, "S32"),
        }
    }
}

/// What to do when a device cannot be opened or configured.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum DevicePolicy {
    /// Fail the whole session.
    #[default]
    Abort,
    /// Disable the failed direction and keep the other one running.
    Degrade,
}

impl FromStr for DevicePolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "abort" => Ok(DevicePolicy::Abort),
            "degrade" => Ok(DevicePolicy::Degrade),
            other => Err(format!(
                "unknown device policy \"{}\" (expected abort or degrade)",
                other
            )),
        }
    }
}

/// Immutable session configuration.
///
/// A channel count of zero disables that direction completely: no ports,
/// no device handle and no scratch buffer.
#[derive(Clone, Debug)]
pub struct SessionConfig {
    pub playback_channels: usize,
    pub capture_channels: usize,
    pub format: SampleFormat,
    pub playback_device: String,
    pub capture_device: String,
    pub client_name: String,
    pub device_policy: DevicePolicy,
    /// Capacity of the diagnostics ring, in events.
    pub event_capacity: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            playback_channels: 2,
            capture_channels: 2,
            format: SampleFormat::S32,
            playback_device: "default".into(),
            capture_device: "default".into(),
            client_name: "meta_jacktoalsa".into(),
            device_policy: DevicePolicy::Abort,
            event_capacity: 256,
        }
    }
}

impl SessionConfig {
    /// Set both channel counts.
    pub fn with_channels(mut self, playback: usize, capture: usize) -> Self {
        self.playback_channels = playback;
        self.capture_channels = capture;
        self
    }

    pub fn with_format(mut self, format: SampleFormat) -> Self {
        self.format = format;
        self
    }

    /// Use the same device for both directions.
    pub fn with_device(mut self, device: impl Into<String>) -> Self {
        let device = device.into();
        self.capture_device = device.clone();
        self.playback_device = device;
        self
    }

    pub fn with_device_policy(mut self, policy: DevicePolicy) -> Self {
        self.device_policy = policy;
        self
    }

    /// Checks invariants that cannot be expressed in the types.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.playback_channels == 0 && self.capture_channels == 0 {
            return Err(ConfigError::NoChannels);
        }
        Ok(())
    }
}
