//! Engine construction.
//!
//! The synth never builds part engines or effect units itself; it asks an
//! [`EngineFactory`]. Swapping the factory swaps the sound.

use crate::error::{Result, SynthError};
use crate::node::{EffectUnit, PartEngine, ProcessContext};
use crate::nodes::{Distortion, Echo, Gain, SineVoices, SlewLimiter};

pub trait EngineFactory: Send + Sync {
    fn create_part(&self, index: usize, ctx: &ProcessContext) -> Result<Box<dyn PartEngine>>;

    /// Build an effect of type `kind`. Type 0 is "no effect" and yields `None`.
    fn create_effect(&self, kind: u8, ctx: &ProcessContext) -> Result<Option<Box<dyn EffectUnit>>>;

    /// Number of effect types, including type 0.
    fn effect_kinds(&self) -> u8;
}

/// Effect types of [`BuiltinFactory`].
pub mod kind {
    pub const NONE: u8 = 0;
    pub const ECHO: u8 = 1;
    pub const DISTORTION: u8 = 2;
    pub const SLEW_LIMITER: u8 = 3;
    pub const GAIN: u8 = 4;
}

/// Sine voices for every part and the bundled effects.
#[derive(Clone, Copy, Debug, Default)]
pub struct BuiltinFactory;

impl EngineFactory for BuiltinFactory {
    fn create_part(&self, _index: usize, ctx: &ProcessContext) -> Result<Box<dyn PartEngine>> {
        Ok(Box::new(SineVoices::new(ctx.sample_rate)))
    }

    fn create_effect(&self, kind: u8, ctx: &ProcessContext) -> Result<Option<Box<dyn EffectUnit>>> {
        let unit: Box<dyn EffectUnit> = match kind {
            kind::NONE => return Ok(None),
            kind::ECHO => Box::new(Echo::new(ctx.sample_rate)),
            kind::DISTORTION => Box::new(Distortion::new()),
            kind::SLEW_LIMITER => Box::new(SlewLimiter::new(ctx.sample_rate)),
            kind::GAIN => Box::new(Gain::new(ctx.sample_rate)),
            other => return Err(SynthError::UnknownEffect(other)),
        };
        Ok(Some(unit))
    }

    fn effect_kinds(&self) -> u8 {
        5
    }
}
