//! Soft-clipping distortion

use crate::node::EffectUnit;
use crate::params::ParamDescriptor;

const DRIVE: u8 = 0;
const LEVEL: u8 = 1;

pub struct Distortion {
    drive: f32,
    level: f32,
}

impl Default for Distortion {
    fn default() -> Self {
        Self::new()
    }
}

impl Distortion {
    pub fn new() -> Self {
        Self {
            drive: 32.0,
            level: 96.0,
        }
    }

    #[inline]
    fn shape(sample: f32, pre: f32, post: f32) -> f32 {
        (sample * pre).tanh() * post
    }
}

impl EffectUnit for Distortion {
    fn process(&mut self, left: &mut [f32], right: &mut [f32]) {
        // 0 dB .. +40 dB of drive
        let pre = 10f32.powf(self.drive / 127.0 * 2.0);
        let post = self.level / 127.0;
        for s in left.iter_mut().chain(right.iter_mut()) {
            *s = Self::shape(*s, pre, post);
        }
    }

    fn cleanup(&mut self) {}

    fn param_count(&self) -> u8 {
        2
    }

    fn param_descriptor(&self, index: u8) -> Option<ParamDescriptor> {
        match index {
            DRIVE => Some(ParamDescriptor::integer(0.0, 127.0, 32.0).learnable()),
            LEVEL => Some(ParamDescriptor::integer(0.0, 127.0, 96.0).learnable()),
            _ => None,
        }
    }

    fn param(&self, index: u8) -> f32 {
        match index {
            DRIVE => self.drive,
            LEVEL => self.level,
            _ => 0.0,
        }
    }

    fn set_param(&mut self, index: u8, value: f32) {
        match index {
            DRIVE => self.drive = value,
            LEVEL => self.level = value,
            _ => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn output_is_bounded() {
        let mut dist = Distortion::new();
        dist.set_param(DRIVE, 127.0);
        dist.set_param(LEVEL, 127.0);
        let mut l = [10.0, -10.0, 0.0];
        let mut r = [0.5; 3];
        dist.process(&mut l, &mut r);
        assert!(l.iter().chain(r.iter()).all(|s| s.abs() <= 1.0));
        assert_eq!(l[2], 0.0);
    }
}
