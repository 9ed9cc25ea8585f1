//! Parameter descriptors and the gain laws shared by the mixer.

use core::f32::consts::LN_10;
use core::ops::BitOr;

use crate::command::LimitRequest;

/// Behaviour flags of a parameter.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub struct ParamFlags(u8);

impl ParamFlags {
    pub const NONE: Self = Self(0);
    /// Values are whole numbers.
    pub const INTEGER: Self = Self(1 << 0);
    /// May be bound to a MIDI controller.
    pub const LEARNABLE: Self = Self(1 << 1);
    /// Reads only; writes are refused.
    pub const READ_ONLY: Self = Self(1 << 2);
    /// An action: writes trigger it, reads are refused.
    pub const WRITE_ONLY: Self = Self(1 << 3);

    #[inline]
    pub const fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    #[inline]
    pub const fn union(self, other: Self) -> Self {
        Self(self.0 | other.0)
    }
}

impl BitOr for ParamFlags {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        self.union(rhs)
    }
}

/// Range, default and flags of one addressable parameter.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ParamDescriptor {
    pub min: f32,
    pub max: f32,
    pub default: f32,
    pub flags: ParamFlags,
}

impl ParamDescriptor {
    pub const fn float(min: f32, max: f32, default: f32) -> Self {
        Self {
            min,
            max,
            default,
            flags: ParamFlags::NONE,
        }
    }

    pub const fn integer(min: f32, max: f32, default: f32) -> Self {
        Self {
            min,
            max,
            default,
            flags: ParamFlags::INTEGER,
        }
    }

    pub const fn toggle(default: bool) -> Self {
        Self::integer(0.0, 1.0, if default { 1.0 } else { 0.0 })
    }

    /// Write-only trigger.
    pub const fn action() -> Self {
        Self {
            min: 0.0,
            max: 1.0,
            default: 0.0,
            flags: ParamFlags::INTEGER.union(ParamFlags::WRITE_ONLY),
        }
    }

    pub const fn learnable(mut self) -> Self {
        self.flags = self.flags.union(ParamFlags::LEARNABLE);
        self
    }

    pub const fn read_only(mut self) -> Self {
        self.flags = self.flags.union(ParamFlags::READ_ONLY);
        self
    }

    #[inline]
    pub fn is_integer(&self) -> bool {
        self.flags.contains(ParamFlags::INTEGER)
    }

    #[inline]
    pub fn is_learnable(&self) -> bool {
        self.flags.contains(ParamFlags::LEARNABLE)
    }

    /// Bring `value` into range, rounding integer parameters.
    pub fn clamp(&self, value: f32) -> f32 {
        let value = if value.is_nan() { self.default } else { value };
        let value = if self.is_integer() { value.round() } else { value };
        value.clamp(self.min, self.max)
    }

    /// Answer a limits query.
    pub fn bound(&self, request: LimitRequest, value: f32) -> f32 {
        match request {
            LimitRequest::Minimum => self.min,
            LimitRequest::Maximum => self.max,
            LimitRequest::Default => self.default,
            LimitRequest::Adjust => self.clamp(value),
        }
    }

    /// Map a 7-bit controller value onto this range.
    pub fn from_midi(&self, value: u8) -> f32 {
        let normal = f32::from(value.min(127)) / 127.0;
        self.clamp(self.min + (self.max - self.min) * normal)
    }
}

/// Gain change smaller than this is applied without a ramp.
pub const RAMP_THRESHOLD: f32 = 1e-4;

#[inline]
pub fn db_to_amplitude(db: f32) -> f32 {
    (db * LN_10 / 20.0).exp()
}

/// Volume control (0..=127, 96 = unity) to linear gain. Spans -40 dB..+12.9 dB.
#[inline]
pub fn volume_to_gain(volume: f32) -> f32 {
    db_to_amplitude((volume - 96.0) / 96.0 * 40.0)
}

/// Effect send level (0..=127) to linear gain; 0 is off, 96 is unity.
#[inline]
pub fn send_to_gain(level: f32) -> f32 {
    if level <= 0.0 {
        0.0
    } else {
        0.1f32.powf((1.0 - level / 96.0) * 2.0)
    }
}

/// Panning control (0..=127, 64 = centre) to a 0..=1 position.
#[inline]
pub fn pan_position(panning: f32) -> f32 {
    let panning = panning.clamp(0.0, 127.0);
    if panning <= 64.0 {
        panning / 128.0
    } else {
        0.5 + (panning - 64.0) / 126.0
    }
}

/// Left/right gains for a part: linear two-segment pan law.
///
/// Left of centre lowers the left gain, right of centre lowers the right.
pub fn pan_gains(volume: f32, panning: f32) -> (f32, f32) {
    let gain = volume_to_gain(volume);
    let pan = pan_position(panning);
    if pan < 0.5 {
        (gain * pan * 2.0, gain)
    } else {
        (gain, gain * (1.0 - pan) * 2.0)
    }
}

/// Whether moving from `old` to `new` deserves a ramp.
#[inline]
pub fn needs_ramp(old: f32, new: f32) -> bool {
    2.0 * (new - old).abs() / (old + new + 1e-10).abs() > RAMP_THRESHOLD
}

/// Gain at sample `i` of an `n`-sample linear ramp.
#[inline]
pub fn ramp(old: f32, new: f32, i: usize, n: usize) -> f32 {
    old + (new - old) * i as f32 / n as f32
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unity_volume() {
        assert!((volume_to_gain(96.0) - 1.0).abs() < 1e-6);
        assert!((volume_to_gain(0.0) - 0.01).abs() < 1e-5);
    }

    #[test]
    fn send_curve() {
        assert_eq!(send_to_gain(0.0), 0.0);
        assert!((send_to_gain(96.0) - 1.0).abs() < 1e-6);
        assert!((send_to_gain(48.0) - 0.1).abs() < 1e-5);
    }

    #[test]
    fn centre_pan_is_unity() {
        let (l, r) = pan_gains(96.0, 64.0);
        assert!((l - 1.0).abs() < 1e-6);
        assert!((r - 1.0).abs() < 1e-6);
    }

    #[test]
    fn hard_pans() {
        let (l, r) = pan_gains(96.0, 0.0);
        assert_eq!(l, 0.0);
        assert!((r - 1.0).abs() < 1e-6);

        let (l, r) = pan_gains(96.0, 127.0);
        assert!((l - 1.0).abs() < 1e-6);
        assert!(r.abs() < 1e-6);
    }

    #[test]
    fn integer_clamp_rounds() {
        let d = ParamDescriptor::integer(0.0, 127.0, 96.0);
        assert_eq!(d.clamp(200.0), 127.0);
        assert_eq!(d.clamp(-3.0), 0.0);
        assert_eq!(d.clamp(10.6), 11.0);
        assert_eq!(d.clamp(f32::NAN), 96.0);
    }

    #[test]
    fn limits_answers() {
        let d = ParamDescriptor::float(-2.0, 2.0, 0.5);
        assert_eq!(d.bound(LimitRequest::Minimum, 9.0), -2.0);
        assert_eq!(d.bound(LimitRequest::Maximum, 9.0), 2.0);
        assert_eq!(d.bound(LimitRequest::Default, 9.0), 0.5);
        assert_eq!(d.bound(LimitRequest::Adjust, 9.0), 2.0);
        assert_eq!(d.bound(LimitRequest::Adjust, 1.25), 1.25);
    }

    #[test]
    fn ramp_threshold() {
        assert!(!needs_ramp(1.0, 1.00001));
        assert!(needs_ramp(1.0, 0.5));
        assert!(!needs_ramp(0.0, 0.0));
        assert_eq!(ramp(0.0, 1.0, 64, 128), 0.5);
    }

    #[test]
    fn midi_scaling() {
        let d = ParamDescriptor::integer(0.0, 127.0, 64.0);
        assert_eq!(d.from_midi(0), 0.0);
        assert_eq!(d.from_midi(127), 127.0);
        let d = ParamDescriptor::integer(-2.0, 15.0, -1.0);
        assert_eq!(d.from_midi(127), 15.0);
    }
}
