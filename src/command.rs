//! Command blocks - the fixed-size unit of control traffic.
//!
//! Every parameter change, read-back and limits query travels as a
//! [`CommandBlock`]: a small `Copy` value holding a coordinate path
//! (`part`, `kit`, `engine`, `insert`, `parameter`, `offset`), a `control` id
//! within that path, a payload `value` and two flag sets describing what to do
//! ([`TypeFlags`]) and who asked ([`SourceFlags`]).
//!
//! A block is self-describing: [`SynthState::dispatch`](crate::SynthState::dispatch)
//! resolves target and action from its fields alone.
//!
//! # Example
//!
//! ```
//! use synthcore::command::{part, CommandBlock};
//!
//! // Set part 3's volume to 100
//! let block = CommandBlock::write(100.0, part::VOLUME, 3);
//! assert!(block.is_write());
//! assert_eq!(block.part, 3);
//! ```

use core::fmt;
use core::ops::{BitOr, BitOrAssign};

use serde::{Deserialize, Serialize};

/// Coordinate sentinel for "this level of the path is not used".
pub const UNUSED: u8 = 255;

/// `miscmsg` sentinel for "no out-of-band text attached".
pub const NO_MSG: u8 = 255;

/// Which bound a limits query asks for.
///
/// Carried in the low two bits of [`TypeFlags`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LimitRequest {
    Minimum = 0,
    Maximum = 1,
    Default = 2,
    /// Return the block's `value` clamped into the valid range.
    Adjust = 3,
}

/// What a command block asks the dispatcher to do.
///
/// The low two bits hold a [`LimitRequest`]; the rest are independent flags.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TypeFlags(u8);

impl TypeFlags {
    pub const NONE: Self = Self(0);
    /// Set by the dispatcher when the path did not resolve or the action was refused.
    pub const ERROR: Self = Self(1 << 2);
    /// Register the path for MIDI-learn instead of applying a value.
    pub const LEARN_REQUEST: Self = Self(1 << 3);
    /// Ask for a bound instead of reading or writing.
    pub const LIMITS: Self = Self(1 << 4);
    /// Reported by the dispatcher: the control may be MIDI-learned.
    pub const LEARNABLE: Self = Self(1 << 5);
    pub const WRITE: Self = Self(1 << 6);
    /// The value is integer-valued; callers should round when displaying.
    pub const INTEGER: Self = Self(1 << 7);

    const REQUEST_MASK: u8 = 0b11;

    #[inline]
    pub const fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    #[inline]
    pub const fn union(self, other: Self) -> Self {
        Self(self.0 | other.0)
    }

    #[inline]
    pub fn insert(&mut self, other: Self) {
        self.0 |= other.0;
    }

    #[inline]
    pub fn remove(&mut self, other: Self) {
        self.0 &= !other.0;
    }

    pub const fn bits(self) -> u8 {
        self.0
    }

    pub fn limit_request(self) -> LimitRequest {
        match self.0 & Self::REQUEST_MASK {
            0 => LimitRequest::Minimum,
            1 => LimitRequest::Maximum,
            2 => LimitRequest::Default,
            _ => LimitRequest::Adjust,
        }
    }

    pub fn with_limit_request(self, request: LimitRequest) -> Self {
        Self((self.0 & !Self::REQUEST_MASK) | request as u8)
    }
}

impl BitOr for TypeFlags {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        self.union(rhs)
    }
}

impl BitOrAssign for TypeFlags {
    fn bitor_assign(&mut self, rhs: Self) {
        self.insert(rhs);
    }
}

impl fmt::Debug for TypeFlags {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names = [
            (Self::WRITE, "WRITE"),
            (Self::INTEGER, "INTEGER"),
            (Self::LIMITS, "LIMITS"),
            (Self::LEARNABLE, "LEARNABLE"),
            (Self::LEARN_REQUEST, "LEARN_REQUEST"),
            (Self::ERROR, "ERROR"),
        ];
        let mut list = f.debug_set();
        for (flag, name) in names {
            if self.contains(flag) {
                list.entry(&name);
            }
        }
        if self.contains(Self::LIMITS) {
            list.entry(&self.limit_request());
        }
        list.finish()
    }
}

/// Who issued a command block, and how urgently it must be applied.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SourceFlags(u8);

impl SourceFlags {
    pub const NONE: Self = Self(0);
    pub const CLI: Self = Self(1 << 0);
    pub const GUI: Self = Self(1 << 1);
    pub const MIDI: Self = Self(1 << 2);
    /// Not realtime critical: applied after the current block has rendered.
    pub const LOW_PRIO: Self = Self(1 << 4);
    /// Fade the engine out, apply the change on a silent engine, then resume.
    pub const MUTE_AND_LOOP: Self = Self(1 << 5);
    /// Apply even if the new value equals the current one.
    pub const FORCE_UPDATE: Self = Self(1 << 6);

    #[inline]
    pub const fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    #[inline]
    pub const fn union(self, other: Self) -> Self {
        Self(self.0 | other.0)
    }

    #[inline]
    pub fn insert(&mut self, other: Self) {
        self.0 |= other.0;
    }

    pub const fn bits(self) -> u8 {
        self.0
    }
}

impl BitOr for SourceFlags {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        self.union(rhs)
    }
}

impl fmt::Debug for SourceFlags {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names = [
            (Self::CLI, "CLI"),
            (Self::GUI, "GUI"),
            (Self::MIDI, "MIDI"),
            (Self::LOW_PRIO, "LOW_PRIO"),
            (Self::MUTE_AND_LOOP, "MUTE_AND_LOOP"),
            (Self::FORCE_UPDATE, "FORCE_UPDATE"),
        ];
        let mut list = f.debug_set();
        for (flag, name) in names {
            if self.contains(flag) {
                list.entry(&name);
            }
        }
        list.finish()
    }
}

/// One control action: coordinates + control id + value + flags.
///
/// Coordinates not used by a path are [`UNUSED`].
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct CommandBlock {
    pub value: f32,
    pub kind: TypeFlags,
    pub source: SourceFlags,
    pub control: u8,
    pub part: u8,
    pub kit: u8,
    pub engine: u8,
    pub insert: u8,
    pub parameter: u8,
    pub offset: u8,
    pub miscmsg: u8,
}

// Copied through ring buffers by value; keep it within a quarter cache line.
const _: () = assert!(core::mem::size_of::<CommandBlock>() <= 16);

impl CommandBlock {
    /// A plain read of `control` in section `part`.
    pub const fn read(control: u8, part: u8) -> Self {
        Self {
            value: 0.0,
            kind: TypeFlags::NONE,
            source: SourceFlags::NONE,
            control,
            part,
            kit: UNUSED,
            engine: UNUSED,
            insert: UNUSED,
            parameter: UNUSED,
            offset: UNUSED,
            miscmsg: NO_MSG,
        }
    }

    /// A write of `value` to `control` in section `part`.
    pub const fn write(value: f32, control: u8, part: u8) -> Self {
        let mut block = Self::read(control, part);
        block.value = value;
        block.kind = TypeFlags::WRITE;
        block
    }

    /// A limits query for `control` in section `part`.
    pub fn limits(control: u8, part: u8, request: LimitRequest) -> Self {
        let mut block = Self::read(control, part);
        block.kind = TypeFlags::LIMITS.with_limit_request(request);
        block
    }

    pub fn with_value(mut self, value: f32) -> Self {
        self.value = value;
        self
    }

    pub fn with_kit(mut self, kit: u8) -> Self {
        self.kit = kit;
        self
    }

    pub fn with_engine(mut self, engine: u8) -> Self {
        self.engine = engine;
        self
    }

    pub fn with_insert(mut self, insert: u8) -> Self {
        self.insert = insert;
        self
    }

    pub fn with_parameter(mut self, parameter: u8) -> Self {
        self.parameter = parameter;
        self
    }

    pub fn with_offset(mut self, offset: u8) -> Self {
        self.offset = offset;
        self
    }

    pub fn with_miscmsg(mut self, miscmsg: u8) -> Self {
        self.miscmsg = miscmsg;
        self
    }

    /// Add source flags (origin, priority, force update).
    pub fn with_source(mut self, source: SourceFlags) -> Self {
        self.source.insert(source);
        self
    }

    /// Add type flags.
    pub fn with_kind(mut self, kind: TypeFlags) -> Self {
        self.kind.insert(kind);
        self
    }

    /// Turn this block into a MIDI-learn request for its path.
    pub fn learn_request(mut self) -> Self {
        self.kind = TypeFlags::WRITE | TypeFlags::LEARN_REQUEST;
        self
    }

    #[inline]
    pub fn is_write(&self) -> bool {
        self.kind.contains(TypeFlags::WRITE)
    }

    #[inline]
    pub fn is_limits(&self) -> bool {
        self.kind.contains(TypeFlags::LIMITS)
    }

    #[inline]
    pub fn is_error(&self) -> bool {
        self.kind.contains(TypeFlags::ERROR)
    }

    #[inline]
    pub fn is_learn_request(&self) -> bool {
        self.kind.contains(TypeFlags::LEARN_REQUEST)
    }

    #[inline]
    pub(crate) fn fail(&mut self) {
        self.kind.insert(TypeFlags::ERROR);
    }
}

/// Values of the `part` coordinate that are not part indices.
pub mod section {
    pub const MIDI_LEARN: u8 = 216;
    pub const MAIN: u8 = 240;
    pub const SYSTEM_EFFECTS: u8 = 241;
    pub const INSERT_EFFECTS: u8 = 242;
}

/// Values of the `insert` coordinate.
pub mod insert {
    /// System effect to system effect send (`engine` = from, `control` = to).
    pub const SYSTEM_EFFECT_SEND: u8 = 16;
    /// Kit item parameters (`kit` = item index).
    pub const KIT_GROUP: u8 = 20;
}

/// Controls of [`section::MAIN`].
pub mod master {
    pub const VOLUME: u8 = 0;
    pub const PART_NUMBER: u8 = 14;
    pub const AVAILABLE_PARTS: u8 = 15;
    pub const KEY_SHIFT: u8 = 35;
    pub const MASTER_RESET: u8 = 80;
    pub const STOP_SOUND: u8 = 128;
    pub const PEAK_L: u8 = 200;
    pub const PEAK_R: u8 = 201;
    pub const RMS_L: u8 = 202;
    pub const RMS_R: u8 = 203;
    pub const MAX_PEAK_L: u8 = 204;
    pub const MAX_PEAK_R: u8 = 205;
    pub const CLIPPED_L: u8 = 206;
    pub const CLIPPED_R: u8 = 207;
    /// Part output peak; `parameter` selects the part.
    pub const PART_PEAK: u8 = 208;
    pub const RESET_PEAKS: u8 = 209;
}

/// Controls of a part section (`part` = part index).
pub mod part {
    pub const VOLUME: u8 = 0;
    pub const PANNING: u8 = 2;
    pub const MIDI_CHANNEL: u8 = 5;
    pub const ENABLE: u8 = 8;
    pub const KEY_SHIFT: u8 = 35;
    pub const KIT_MODE: u8 = 58;
    /// Send level to system effect `n` is `SYS_SEND_BASE + n`.
    pub const SYS_SEND_BASE: u8 = 120;
    pub const INSTRUMENT_NAME: u8 = 222;

    // with insert = KIT_GROUP
    pub const KIT_MUTE: u8 = 7;
    pub const KIT_ENABLE: u8 = 8;
    pub const KIT_MIN_NOTE: u8 = 16;
    pub const KIT_MAX_NOTE: u8 = 17;
}

/// Controls of the effect sections (`engine` = effect index).
pub mod effect {
    /// Output level of a system effect.
    pub const VOLUME: u8 = 0;
    pub const TYPE: u8 = 5;
    /// Insertion effect target: -2 master, -1 off, otherwise a part index.
    pub const DESTINATION: u8 = 6;
    /// Effect-internal parameters use `kit = TYPE_BASE + type`.
    pub const TYPE_BASE: u8 = 128;
}

/// Controls of [`section::MIDI_LEARN`].
pub mod learn {
    pub const COUNT: u8 = 0;
    pub const CLEAR: u8 = 1;
    pub const PENDING: u8 = 2;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn block_is_small() {
        assert!(core::mem::size_of::<CommandBlock>() <= 16);
    }

    #[test]
    fn limit_request_lives_in_low_bits() {
        let kind = TypeFlags::LIMITS.with_limit_request(LimitRequest::Default);
        assert!(kind.contains(TypeFlags::LIMITS));
        assert_eq!(kind.limit_request(), LimitRequest::Default);

        let kind = kind.with_limit_request(LimitRequest::Maximum);
        assert_eq!(kind.limit_request(), LimitRequest::Maximum);
        assert!(kind.contains(TypeFlags::LIMITS));
    }

    #[test]
    fn builders_fill_coordinates() {
        let block = CommandBlock::write(1.0, part::KIT_ENABLE, 2)
            .with_insert(insert::KIT_GROUP)
            .with_kit(3)
            .with_source(SourceFlags::CLI | SourceFlags::FORCE_UPDATE);

        assert!(block.is_write());
        assert_eq!(block.kit, 3);
        assert_eq!(block.engine, UNUSED);
        assert!(block.source.contains(SourceFlags::FORCE_UPDATE));
        assert!(block.source.contains(SourceFlags::CLI));
        assert!(!block.source.contains(SourceFlags::GUI));
    }

    #[test]
    fn flags_debug_lists_names() {
        let kind = TypeFlags::WRITE | TypeFlags::INTEGER;
        let text = format!("{:?}", kind);
        assert!(text.contains("WRITE"));
        assert!(text.contains("INTEGER"));
        assert!(!text.contains("ERROR"));
    }
}
