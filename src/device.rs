//! CPAL device discovery and synth hookup

use alloc::string::String;
use alloc::vec::Vec;

#[cfg(feature = "cpal_sink")]
use cpal::traits::{DeviceTrait, HostTrait};

use crate::config::SynthConfig;

/// A discovered audio output device
pub struct CpalDevice {
    #[cfg(feature = "cpal_sink")]
    device: cpal::Device,
    #[cfg(feature = "cpal_sink")]
    config: cpal::SupportedStreamConfig,

    name: String,
    sample_rate: u32,
    channels: u16,
}

impl CpalDevice {
    #[cfg(feature = "cpal_sink")]
    fn from_device(device: cpal::Device) -> Option<Self> {
        let config = device.default_output_config().ok()?;
        let name = device.name().unwrap_or_else(|_| "Unknown".into());
        Some(Self {
            sample_rate: config.sample_rate().0,
            channels: config.channels(),
            name,
            device,
            config,
        })
    }

    /// Get the default output device
    #[cfg(feature = "cpal_sink")]
    pub fn default_output() -> Option<Self> {
        let host = cpal::default_host();
        Self::from_device(host.default_output_device()?)
    }

    #[cfg(not(feature = "cpal_sink"))]
    pub fn default_output() -> Option<Self> {
        None
    }

    /// List all available output devices
    #[cfg(feature = "cpal_sink")]
    pub fn list_outputs() -> Vec<Self> {
        cpal::default_host()
            .output_devices()
            .map(|devices| devices.filter_map(Self::from_device).collect())
            .unwrap_or_default()
    }

    #[cfg(not(feature = "cpal_sink"))]
    pub fn list_outputs() -> Vec<Self> {
        Vec::new()
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn channels(&self) -> u16 {
        self.channels
    }

    /// `base` with the sample rate this device runs at.
    pub fn synth_config(&self, base: SynthConfig) -> SynthConfig {
        base.with_sample_rate(self.sample_rate)
    }

    /// Start the device's output stream, rendering from `synth`.
    #[cfg(feature = "cpal_sink")]
    pub fn start(&self, synth: crate::Synth) -> crate::Result<crate::nodes::CpalSink> {
        crate::nodes::CpalSink::start(&self.device, &self.config, synth)
    }
}

#[cfg(all(test, not(feature = "cpal_sink")))]
mod tests {
    use super::*;

    #[test]
    fn no_devices_without_a_backend() {
        assert!(CpalDevice::default_output().is_none());
        assert!(CpalDevice::list_outputs().is_empty());
    }

    #[test]
    fn device_rate_overrides_config() {
        let device = CpalDevice {
            name: "test".into(),
            sample_rate: 44_100,
            channels: 2,
        };
        let config = device.synth_config(SynthConfig::default().with_buffer_size(128));
        assert_eq!(config.sample_rate, 44_100);
        assert_eq!(config.buffer_size, 128);
        assert_eq!(device.name(), "test");
    }
}
