//! Effect slots: system effects and insertion effects.

use crate::command::effect as control;
use crate::error::Result;
use crate::factory::EngineFactory;
use crate::node::{EffectUnit, ProcessContext};
use crate::params::ParamDescriptor;

pub const NUM_SYS_EFX: usize = 4;
pub const NUM_INS_EFX: usize = 8;

pub const DEFAULT_EFFECT_VOLUME: f32 = 64.0;

/// Where an insertion effect sits in the signal path.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum InsertTarget {
    Off,
    Master,
    Part(usize),
}

impl InsertTarget {
    pub fn from_value(value: f32) -> Self {
        match value as i32 {
            -2 => InsertTarget::Master,
            p if p >= 0 => InsertTarget::Part(p as usize),
            _ => InsertTarget::Off,
        }
    }

    pub fn value(self) -> f32 {
        match self {
            InsertTarget::Master => -2.0,
            InsertTarget::Off => -1.0,
            InsertTarget::Part(p) => p as f32,
        }
    }
}

/// Descriptor of a slot-level control.
pub fn descriptor(control: u8, insertion: bool, kinds: u8, parts: usize) -> Option<ParamDescriptor> {
    let descriptor = match control {
        control::VOLUME if !insertion => {
            ParamDescriptor::integer(0.0, 127.0, DEFAULT_EFFECT_VOLUME).learnable()
        }
        control::TYPE => ParamDescriptor::integer(0.0, f32::from(kinds.saturating_sub(1)), 0.0),
        control::DESTINATION if insertion => {
            ParamDescriptor::integer(-2.0, parts as f32 - 1.0, -1.0)
        }
        _ => return None,
    };
    Some(descriptor)
}

pub struct EffectSlot {
    kind: u8,
    unit: Option<Box<dyn EffectUnit>>,
    pub(crate) volume: f32,
    pub(crate) target: InsertTarget,
    /// Wet output of the last block, read by later system effects.
    pub(crate) out_l: Vec<f32>,
    pub(crate) out_r: Vec<f32>,
}

impl EffectSlot {
    pub fn new(buffer_size: usize) -> Self {
        Self {
            kind: 0,
            unit: None,
            volume: DEFAULT_EFFECT_VOLUME,
            target: InsertTarget::Off,
            out_l: vec![0.0; buffer_size],
            out_r: vec![0.0; buffer_size],
        }
    }

    #[inline]
    pub fn kind(&self) -> u8 {
        self.kind
    }

    #[inline]
    pub fn is_active(&self) -> bool {
        self.unit.is_some()
    }

    pub fn target(&self) -> InsertTarget {
        self.target
    }

    pub fn unit(&self) -> Option<&dyn EffectUnit> {
        self.unit.as_deref()
    }

    /// Output level as a linear factor.
    #[inline]
    pub fn out_volume(&self) -> f32 {
        self.volume / 127.0
    }

    /// Replace the unit with a fresh instance of `kind`.
    pub(crate) fn change_kind(
        &mut self,
        kind: u8,
        factory: &dyn EngineFactory,
        ctx: &ProcessContext,
    ) -> Result<()> {
        let unit = factory.create_effect(kind, ctx)?;
        self.kind = if unit.is_some() { kind } else { 0 };
        self.unit = unit;
        self.silence();
        Ok(())
    }

    pub(crate) fn param_descriptor(&self, index: u8) -> Option<ParamDescriptor> {
        self.unit.as_ref()?.param_descriptor(index)
    }

    pub(crate) fn param(&self, index: u8) -> f32 {
        self.unit.as_ref().map_or(0.0, |u| u.param(index))
    }

    pub(crate) fn set_param(&mut self, index: u8, value: f32) {
        if let Some(unit) = self.unit.as_mut() {
            unit.set_param(index, value);
        }
    }

    /// Run the unit in place over `left`/`right`.
    pub(crate) fn process(&mut self, left: &mut [f32], right: &mut [f32]) {
        if let Some(unit) = self.unit.as_mut() {
            unit.process(left, right);
        }
    }

    /// Process `left`/`right` in place and keep a copy of the wet result.
    pub(crate) fn process_and_keep(&mut self, left: &mut [f32], right: &mut [f32]) {
        let n = left.len();
        self.process(left, right);
        self.out_l[..n].copy_from_slice(left);
        self.out_r[..n].copy_from_slice(right);
    }

    pub(crate) fn silence(&mut self) {
        self.out_l.fill(0.0);
        self.out_r.fill(0.0);
    }

    pub fn cleanup(&mut self) {
        if let Some(unit) = self.unit.as_mut() {
            unit.cleanup();
        }
        self.silence();
    }

    pub(crate) fn defaults(&mut self) {
        self.kind = 0;
        self.unit = None;
        self.volume = DEFAULT_EFFECT_VOLUME;
        self.target = InsertTarget::Off;
        self.silence();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::factory::BuiltinFactory;

    const CTX: ProcessContext = ProcessContext {
        sample_rate: 48_000,
        buffer_size: 64,
    };

    #[test]
    fn destination_encoding() {
        assert_eq!(InsertTarget::from_value(-2.0), InsertTarget::Master);
        assert_eq!(InsertTarget::from_value(-1.0), InsertTarget::Off);
        assert_eq!(InsertTarget::from_value(3.0), InsertTarget::Part(3));
        assert_eq!(InsertTarget::Part(3).value(), 3.0);
    }

    #[test]
    fn kind_zero_empties_slot() {
        let mut slot = EffectSlot::new(64);
        slot.change_kind(1, &BuiltinFactory, &CTX).unwrap();
        assert!(slot.is_active());
        slot.change_kind(0, &BuiltinFactory, &CTX).unwrap();
        assert!(!slot.is_active());
        assert_eq!(slot.kind(), 0);
    }

    #[test]
    fn unknown_kind_is_an_error() {
        let mut slot = EffectSlot::new(64);
        assert!(slot.change_kind(200, &BuiltinFactory, &CTX).is_err());
    }

    #[test]
    fn volume_only_on_system_slots() {
        assert!(descriptor(control::VOLUME, false, 5, 16).is_some());
        assert!(descriptor(control::VOLUME, true, 5, 16).is_none());
        assert!(descriptor(control::DESTINATION, false, 5, 16).is_none());
        let dest = descriptor(control::DESTINATION, true, 5, 16).unwrap();
        assert_eq!(dest.min, -2.0);
        assert_eq!(dest.max, 15.0);
    }
}
