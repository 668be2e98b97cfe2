//! PCM device discovery through cpal.
//!
//! Used by `jacktoalsa --list-devices` to show which names can be passed to
//! `--alsa-card`.
//!
//! ```no_run
//! use jacktoalsa::device::probe::DeviceInfo;
//!
//! for device in DeviceInfo::list_playback() {
//!     println!("{} ({} Hz, {} ch)", device.name(), device.sample_rate(), device.channels());
//! }
//! ```

use cpal::traits::{DeviceTrait, HostTrait};

use super::Direction;

/// A discovered PCM device and its default configuration.
#[derive(Clone, Debug)]
pub struct DeviceInfo {
    name: String,
    direction: Direction,
    sample_rate: u32,
    channels: u16,
    sample_format: String,
}

impl DeviceInfo {
    /// Every device that accepts playback.
    pub fn list_playback() -> Vec<Self> {
        let host = cpal::default_host();
        host.output_devices()
            .map(|devices| {
                devices
                    .filter_map(|device| {
                        let config = device.default_output_config().ok()?;
                        Some(Self::from_config(&device, Direction::Playback, &config))
                    })
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Every device that offers capture.
    pub fn list_capture() -> Vec<Self> {
        let host = cpal::default_host();
        host.input_devices()
            .map(|devices| {
                devices
                    .filter_map(|device| {
                        let config = device.default_input_config().ok()?;
                        Some(Self::from_config(&device, Direction::Capture, &config))
                    })
                    .collect()
            })
            .unwrap_or_default()
    }

    fn from_config(
        device: &cpal::Device,
        direction: Direction,
        config: &cpal::SupportedStreamConfig,
    ) -> Self {
        Self {
            name: device.name().unwrap_or_else(|_| "Unknown".into()),
            direction,
            sample_rate: config.sample_rate().0,
            channels: config.channels(),
            sample_format: format!("{:?}", config.sample_format()),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn direction(&self) -> Direction {
        self.direction
    }

    /// Default sample rate in Hz.
    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn channels(&self) -> u16 {
        self.channels
    }

    /// Default sample format as reported by the host.
    pub fn sample_format(&self) -> &str {
        &self.sample_format
    }
}
