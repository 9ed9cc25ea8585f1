use proptest::prelude::*;

use synthcore::params::{pan_gains, pan_position, ramp, send_to_gain, volume_to_gain};
use synthcore::ParamDescriptor;

proptest! {
    #[test]
    fn volume_gain_is_monotonic(a in 0.0f32..127.0, b in 0.0f32..127.0) {
        let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
        prop_assert!(volume_to_gain(lo) <= volume_to_gain(hi));
    }

    #[test]
    fn send_gain_stays_in_unit_range(level in 0.0f32..=96.0) {
        let gain = send_to_gain(level);
        prop_assert!((0.0..=1.0 + 1e-6).contains(&gain));
    }

    #[test]
    fn pan_position_is_bounded_and_monotonic(a in 0.0f32..=127.0, b in 0.0f32..=127.0) {
        let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
        let (p_lo, p_hi) = (pan_position(lo), pan_position(hi));
        prop_assert!((0.0..=1.0).contains(&p_lo));
        prop_assert!((0.0..=1.0).contains(&p_hi));
        prop_assert!(p_lo <= p_hi);
    }

    #[test]
    fn pan_never_boosts_either_side(volume in 0.0f32..=127.0, panning in 0.0f32..=127.0) {
        let full = volume_to_gain(volume);
        let (l, r) = pan_gains(volume, panning);
        prop_assert!(l <= full && r <= full);
        prop_assert!(l == full || r == full);
    }

    #[test]
    fn ramp_stays_between_endpoints(a in -4.0f32..4.0, b in -4.0f32..4.0, n in 1usize..1024, i in 0usize..1024) {
        let i = i % n;
        let v = ramp(a, b, i, n);
        prop_assert!(v >= a.min(b) - 1e-5 && v <= a.max(b) + 1e-5);
    }

    #[test]
    fn clamp_lands_in_range(value in proptest::num::f32::ANY, integer in any::<bool>()) {
        let descriptor = if integer {
            ParamDescriptor::integer(-36.0, 36.0, 0.0)
        } else {
            ParamDescriptor::float(0.0, 127.0, 64.0)
        };
        let clamped = descriptor.clamp(value);
        prop_assert!(clamped >= descriptor.min && clamped <= descriptor.max);
        if integer {
            prop_assert_eq!(clamped.fract(), 0.0);
        }
    }
}

#[test]
fn pan_is_continuous_across_centre() {
    let below = pan_position(64.0);
    let above = pan_position(64.0 + 1e-3);
    assert!((above - below).abs() < 1e-4);
    assert_eq!(pan_position(0.0), 0.0);
    assert_eq!(pan_position(127.0), 1.0);
}
