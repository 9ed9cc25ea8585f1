//! Core engine traits and context types.

use crate::params::ParamDescriptor;

/// Rendering context shared by every engine.
///
/// Handed to the [`EngineFactory`](crate::EngineFactory) when instances are
/// built. Engines that depend on it (delay lines, envelopes) are rebuilt when
/// it changes.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ProcessContext {
    /// Sample rate in Hz (e.g., 44100, 48000)
    pub sample_rate: u32,
    /// Most samples the render loop asks for in one pass
    pub buffer_size: usize,
}

/// The sound generator behind one part.
///
/// Implement this trait to plug your own synthesis into a part slot. Notes and
/// controllers arrive on the audio thread between blocks; [`compute`] is then
/// called until the block is full.
///
/// # Partial fills
///
/// `compute` may produce fewer samples than asked, for instance when an
/// engine works in fixed internal chunks. The caller keeps calling with the
/// remainder. Returning `0` means "nothing more this block" and the rest is
/// filled with silence.
///
/// ```
/// use synthcore::PartEngine;
///
/// /// Emits a constant level while any note is held.
/// struct Drone {
///     held: u32,
/// }
///
/// impl PartEngine for Drone {
///     fn note_on(&mut self, _note: u8, _velocity: u8) {
///         self.held += 1;
///     }
///
///     fn note_off(&mut self, _note: u8) {
///         self.held = self.held.saturating_sub(1);
///     }
///
///     fn compute(&mut self, left: &mut [f32], right: &mut [f32]) -> usize {
///         let level = if self.held > 0 { 0.25 } else { 0.0 };
///         left.fill(level);
///         right.fill(level);
///         left.len()
///     }
///
///     fn cleanup(&mut self) {
///         self.held = 0;
///     }
///
///     fn is_idle(&self) -> bool {
///         self.held == 0
///     }
/// }
/// ```
///
/// [`compute`]: PartEngine::compute
pub trait PartEngine: Send {
    fn note_on(&mut self, note: u8, velocity: u8);

    fn note_off(&mut self, note: u8);

    /// Continuous controller not handled by the part itself.
    fn controller(&mut self, _control: u8, _value: u8) {}

    /// Pitch bend, -8192..=8191.
    fn pitch_bend(&mut self, _value: i16) {}

    /// Release every sounding note.
    fn all_notes_off(&mut self) {}

    /// Render into `left`/`right`, returning how many samples were written.
    fn compute(&mut self, left: &mut [f32], right: &mut [f32]) -> usize;

    /// Silence immediately and forget all voices.
    fn cleanup(&mut self);

    fn is_idle(&self) -> bool;
}

/// An in-place stereo effect, used for both system and insertion slots.
///
/// Parameters are addressed by index and described by [`ParamDescriptor`]s,
/// so generic code can clamp, persist and MIDI-learn them.
pub trait EffectUnit: Send + Sync {
    fn process(&mut self, left: &mut [f32], right: &mut [f32]);

    /// Clear tails and internal history.
    fn cleanup(&mut self);

    /// Number of addressable parameters, indexed `0..param_count()`.
    fn param_count(&self) -> u8;

    fn param_descriptor(&self, index: u8) -> Option<ParamDescriptor>;

    fn param(&self, index: u8) -> f32;

    fn set_param(&mut self, index: u8, value: f32);
}
