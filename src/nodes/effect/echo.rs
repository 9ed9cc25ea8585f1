//! Stereo feedback delay

use crate::node::EffectUnit;
use crate::params::ParamDescriptor;

const DELAY: u8 = 0;
const FEEDBACK: u8 = 1;
const MIX: u8 = 2;

const MAX_DELAY_MS: f32 = 1000.0;

pub struct Echo {
    delay_ms: f32,
    feedback: f32,
    mix: f32,
    delay_samples: usize,
    sample_rate: f32,
    line_l: Vec<f32>,
    line_r: Vec<f32>,
    pos: usize,
}

impl Echo {
    pub fn new(sample_rate: u32) -> Self {
        let len = (MAX_DELAY_MS / 1000.0 * sample_rate as f32) as usize + 1;
        let mut echo = Self {
            delay_ms: 300.0,
            feedback: 40.0,
            mix: 64.0,
            delay_samples: 0,
            sample_rate: sample_rate as f32,
            line_l: vec![0.0; len],
            line_r: vec![0.0; len],
            pos: 0,
        };
        echo.update_delay();
        echo
    }

    fn update_delay(&mut self) {
        let samples = (self.delay_ms / 1000.0 * self.sample_rate) as usize;
        self.delay_samples = samples.clamp(1, self.line_l.len() - 1);
    }
}

impl EffectUnit for Echo {
    fn process(&mut self, left: &mut [f32], right: &mut [f32]) {
        let len = self.line_l.len();
        let feedback = self.feedback / 127.0 * 0.9;
        let wet = self.mix / 127.0;
        let dry = 1.0 - wet;

        for (l, r) in left.iter_mut().zip(right.iter_mut()) {
            let read = (self.pos + len - self.delay_samples) % len;
            let (dl, dr) = (self.line_l[read], self.line_r[read]);
            self.line_l[self.pos] = *l + dl * feedback;
            self.line_r[self.pos] = *r + dr * feedback;
            *l = *l * dry + dl * wet;
            *r = *r * dry + dr * wet;
            self.pos = (self.pos + 1) % len;
        }
    }

    fn cleanup(&mut self) {
        self.line_l.fill(0.0);
        self.line_r.fill(0.0);
        self.pos = 0;
    }

    fn param_count(&self) -> u8 {
        3
    }

    fn param_descriptor(&self, index: u8) -> Option<ParamDescriptor> {
        match index {
            DELAY => Some(ParamDescriptor::integer(1.0, MAX_DELAY_MS, 300.0)),
            FEEDBACK => Some(ParamDescriptor::integer(0.0, 127.0, 40.0).learnable()),
            MIX => Some(ParamDescriptor::integer(0.0, 127.0, 64.0).learnable()),
            _ => None,
        }
    }

    fn param(&self, index: u8) -> f32 {
        match index {
            DELAY => self.delay_ms,
            FEEDBACK => self.feedback,
            MIX => self.mix,
            _ => 0.0,
        }
    }

    fn set_param(&mut self, index: u8, value: f32) {
        match index {
            DELAY => {
                self.delay_ms = value;
                self.update_delay();
            }
            FEEDBACK => self.feedback = value,
            MIX => self.mix = value,
            _ => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn impulse_comes_back() {
        let mut echo = Echo::new(1000);
        echo.set_param(DELAY, 10.0);
        echo.set_param(MIX, 127.0);
        let mut l = [0.0; 32];
        let mut r = [0.0; 32];
        l[0] = 1.0;
        echo.process(&mut l, &mut r);
        assert_eq!(l[0], 0.0);
        assert!((l[10] - 1.0).abs() < 1e-6);
        assert!(r.iter().all(|s| *s == 0.0));
    }

    #[test]
    fn cleanup_clears_tail() {
        let mut echo = Echo::new(1000);
        echo.set_param(DELAY, 10.0);
        echo.set_param(MIX, 127.0);
        let mut l = [1.0; 4];
        let mut r = [1.0; 4];
        echo.process(&mut l, &mut r);
        echo.cleanup();
        let mut l = [0.0; 32];
        let mut r = [0.0; 32];
        echo.process(&mut l, &mut r);
        assert!(l.iter().all(|s| *s == 0.0));
    }
}
