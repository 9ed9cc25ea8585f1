//! Engine configuration.

use core::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Result, SynthError};
use crate::lock::DEFAULT_LOCK_WAIT;

pub const DEFAULT_SAMPLE_RATE: u32 = 48_000;
pub const DEFAULT_BUFFER_SIZE: usize = 256;
pub const MIN_BUFFER_SIZE: usize = 16;
pub const MAX_BUFFER_SIZE: usize = 8192;
pub const MIN_SAMPLE_RATE: u32 = 8_000;
pub const MAX_SAMPLE_RATE: u32 = 384_000;

/// Blocks each control channel can hold.
pub const DEFAULT_CHANNEL_CAPACITY: usize = 1024;
pub const DEFAULT_MIDI_CAPACITY: usize = 256;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SynthConfig {
    pub sample_rate: u32,
    /// Internal block length; the render loop never computes more per pass.
    pub buffer_size: usize,
    pub channel_capacity: usize,
    pub midi_capacity: usize,
    /// Longest the audio thread waits for the exclusive lock.
    pub lock_wait: Duration,
}

impl Default for SynthConfig {
    fn default() -> Self {
        Self {
            sample_rate: DEFAULT_SAMPLE_RATE,
            buffer_size: DEFAULT_BUFFER_SIZE,
            channel_capacity: DEFAULT_CHANNEL_CAPACITY,
            midi_capacity: DEFAULT_MIDI_CAPACITY,
            lock_wait: DEFAULT_LOCK_WAIT,
        }
    }
}

impl SynthConfig {
    pub fn with_sample_rate(mut self, sample_rate: u32) -> Self {
        self.sample_rate = sample_rate;
        self
    }

    pub fn with_buffer_size(mut self, buffer_size: usize) -> Self {
        self.buffer_size = buffer_size;
        self
    }

    pub fn with_channel_capacity(mut self, capacity: usize) -> Self {
        self.channel_capacity = capacity;
        self
    }

    pub fn with_lock_wait(mut self, wait: Duration) -> Self {
        self.lock_wait = wait;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if !(MIN_SAMPLE_RATE..=MAX_SAMPLE_RATE).contains(&self.sample_rate) {
            return Err(SynthError::InvalidConfig(format!(
                "sample rate {} outside {}..={}",
                self.sample_rate, MIN_SAMPLE_RATE, MAX_SAMPLE_RATE
            )));
        }
        if !(MIN_BUFFER_SIZE..=MAX_BUFFER_SIZE).contains(&self.buffer_size) {
            return Err(SynthError::InvalidConfig(format!(
                "buffer size {} outside {}..={}",
                self.buffer_size, MIN_BUFFER_SIZE, MAX_BUFFER_SIZE
            )));
        }
        if self.channel_capacity == 0 || self.midi_capacity == 0 {
            return Err(SynthError::InvalidConfig(
                "channel capacities must be non-zero".into(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        assert!(SynthConfig::default().validate().is_ok());
    }

    #[test]
    fn rejects_bad_sizes() {
        let config = SynthConfig::default().with_buffer_size(0);
        assert!(matches!(config.validate(), Err(SynthError::InvalidConfig(_))));

        let config = SynthConfig::default().with_sample_rate(1);
        assert!(config.validate().is_err());

        let config = SynthConfig::default().with_channel_capacity(0);
        assert!(config.validate().is_err());
    }

    #[test]
    fn missing_fields_take_defaults() {
        let config: SynthConfig = serde_json::from_str(r#"{ "buffer_size": 128 }"#).unwrap();
        assert_eq!(config.buffer_size, 128);
        assert_eq!(config.sample_rate, DEFAULT_SAMPLE_RATE);
        assert_eq!(config.lock_wait, DEFAULT_LOCK_WAIT);
    }
}
