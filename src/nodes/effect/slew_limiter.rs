//! Slew rate limiter effect

use crate::node::EffectUnit;
use crate::params::ParamDescriptor;

const RATE: u8 = 0;

/// A slew rate limiter that smooths sudden changes in audio
///
/// Useful for:
/// - Taming harsh transients
/// - A cheap, level-dependent lowpass
pub struct SlewLimiter {
    /// Rate control, 0..=127
    rate_param: f32,
    /// Maximum change per sample
    rate: f32,
    sample_rate: f32,
    last: [f32; 2],
}

impl SlewLimiter {
    pub fn new(sample_rate: u32) -> Self {
        let mut limiter = Self {
            rate_param: 64.0,
            rate: 0.0,
            sample_rate: sample_rate as f32,
            last: [0.0; 2],
        };
        limiter.update_rate();
        limiter
    }

    /// Maps the control exponentially onto 10..=100_000 units per second.
    fn update_rate(&mut self) {
        let per_second = 10f32.powf(1.0 + self.rate_param / 127.0 * 4.0);
        self.rate = per_second / self.sample_rate;
    }

    #[inline]
    pub fn rate(&self) -> f32 {
        self.rate
    }
}

impl EffectUnit for SlewLimiter {
    fn process(&mut self, left: &mut [f32], right: &mut [f32]) {
        let max_delta = self.rate;
        for (ch, buffer) in [left, right].into_iter().enumerate() {
            let mut last = self.last[ch];
            for sample in buffer.iter_mut() {
                let delta = *sample - last;
                last += delta.clamp(-max_delta, max_delta);
                *sample = last;
            }
            self.last[ch] = last;
        }
    }

    fn cleanup(&mut self) {
        self.last = [0.0; 2];
    }

    fn param_count(&self) -> u8 {
        1
    }

    fn param_descriptor(&self, index: u8) -> Option<ParamDescriptor> {
        (index == RATE).then(|| ParamDescriptor::integer(0.0, 127.0, 64.0).learnable())
    }

    fn param(&self, index: u8) -> f32 {
        match index {
            RATE => self.rate_param,
            _ => 0.0,
        }
    }

    fn set_param(&mut self, index: u8, value: f32) {
        if index == RATE {
            self.rate_param = value;
            self.update_rate();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn limits_step_response() {
        let mut slew = SlewLimiter::new(48_000);
        slew.set_param(RATE, 0.0);
        let rate = slew.rate();
        let mut l = [1.0; 8];
        let mut r = [-1.0; 8];
        slew.process(&mut l, &mut r);
        assert!((l[0] - rate).abs() < 1e-7);
        assert!((l[7] - rate * 8.0).abs() < 1e-6);
        assert!((r[0] + rate).abs() < 1e-7);
    }

    #[test]
    fn fast_rate_passes_through() {
        let mut slew = SlewLimiter::new(48_000);
        slew.set_param(RATE, 127.0);
        let mut l = [0.5; 4];
        let mut r = [0.5; 4];
        slew.process(&mut l, &mut r);
        assert_eq!(l, [0.5; 4]);
    }
}
