//! Smoothed gain effect

use crate::node::EffectUnit;
use crate::params::{volume_to_gain, ParamDescriptor};

const LEVEL: u8 = 0;
const SMOOTHING: u8 = 1;

/// A gain stage that glides toward its target to prevent clicks.
pub struct Gain {
    level: f32,
    smoothing_ms: f32,
    gain: f32,
    smoothed_gain: f32,
    /// Smoothing coefficient (0.0 = instant, 1.0 = no change)
    smooth_coeff: f32,
    sample_rate: f32,
}

impl Gain {
    pub fn new(sample_rate: u32) -> Self {
        let gain = volume_to_gain(96.0);
        let mut unit = Self {
            level: 96.0,
            smoothing_ms: 7.0,
            gain,
            smoothed_gain: gain,
            smooth_coeff: 0.0,
            sample_rate: sample_rate as f32,
        };
        unit.update_coeff();
        unit
    }

    fn update_coeff(&mut self) {
        // after `smoothing_ms` we are ~63% of the way there
        let samples = (self.smoothing_ms / 1000.0) * self.sample_rate;
        self.smooth_coeff = if samples < 1.0 { 0.0 } else { (-1.0 / samples).exp() };
    }

    #[inline]
    pub fn gain(&self) -> f32 {
        self.gain
    }
}

impl EffectUnit for Gain {
    fn process(&mut self, left: &mut [f32], right: &mut [f32]) {
        let target = self.gain;
        let coeff = self.smooth_coeff;
        let mut gain = self.smoothed_gain;
        for (l, r) in left.iter_mut().zip(right.iter_mut()) {
            gain = target + coeff * (gain - target);
            *l *= gain;
            *r *= gain;
        }
        self.smoothed_gain = gain;
    }

    fn cleanup(&mut self) {
        self.smoothed_gain = self.gain;
    }

    fn param_count(&self) -> u8 {
        2
    }

    fn param_descriptor(&self, index: u8) -> Option<ParamDescriptor> {
        match index {
            LEVEL => Some(ParamDescriptor::integer(0.0, 127.0, 96.0).learnable()),
            SMOOTHING => Some(ParamDescriptor::float(0.0, 100.0, 7.0)),
            _ => None,
        }
    }

    fn param(&self, index: u8) -> f32 {
        match index {
            LEVEL => self.level,
            SMOOTHING => self.smoothing_ms,
            _ => 0.0,
        }
    }

    fn set_param(&mut self, index: u8, value: f32) {
        match index {
            LEVEL => {
                self.level = value;
                self.gain = volume_to_gain(value);
            }
            SMOOTHING => {
                self.smoothing_ms = value;
                self.update_coeff();
            }
            _ => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn glides_to_target() {
        let mut gain = Gain::new(48_000);
        gain.set_param(LEVEL, 0.0);
        let mut l = [1.0; 4800];
        let mut r = [1.0; 4800];
        gain.process(&mut l, &mut r);
        assert!(l[0] > 0.9);
        assert!((l[4799] - gain.gain()).abs() < 1e-3);
    }

    #[test]
    fn zero_smoothing_is_instant() {
        let mut gain = Gain::new(48_000);
        gain.set_param(SMOOTHING, 0.0);
        gain.set_param(LEVEL, 0.0);
        let mut l = [1.0; 4];
        let mut r = [1.0; 4];
        gain.process(&mut l, &mut r);
        assert!((l[0] - volume_to_gain(0.0)).abs() < 1e-6);
    }
}
