//! Whole-state snapshots.
//!
//! Persistent state is expressed as the list of write blocks that would
//! recreate it. [`SynthState::visit`] walks every persistent parameter in an
//! order that is safe to replay (types before their parameters, kit mode
//! before kit items), so restoring is nothing more than dispatching.

use serde::{Deserialize, Serialize};

use crate::command::{self, insert, section, CommandBlock, TypeFlags};
use crate::effect::NUM_SYS_EFX;
use crate::error::{Result, SynthError};
use crate::part::{KitMode, NUM_KIT_ITEMS};
use crate::store::{SynthState, Target};

pub const PATCH_VERSION: u32 = 1;

/// Receives every persistent parameter as a write block.
pub trait StateVisitor {
    fn visit(&mut self, block: CommandBlock);

    /// A text-valued parameter; `block` carries its path only.
    fn visit_text(&mut self, block: CommandBlock, text: &str) {
        let _ = (block, text);
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PatchEntry {
    pub block: CommandBlock,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Patch {
    pub version: u32,
    pub entries: Vec<PatchEntry>,
}

impl Default for Patch {
    fn default() -> Self {
        Self::new()
    }
}

impl Patch {
    pub fn new() -> Self {
        Self {
            version: PATCH_VERSION,
            entries: Vec::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl StateVisitor for Patch {
    fn visit(&mut self, block: CommandBlock) {
        self.entries.push(PatchEntry { block, text: None });
    }

    fn visit_text(&mut self, block: CommandBlock, text: &str) {
        self.entries.push(PatchEntry {
            block,
            text: Some(text.to_owned()),
        });
    }
}

impl SynthState {
    pub fn visit(&self, visitor: &mut impl StateVisitor) {
        use command::{effect as fx, master, part as pc};

        let main = [
            (master::VOLUME, self.master.volume),
            (master::KEY_SHIFT, f32::from(self.master.key_shift)),
            (master::PART_NUMBER, f32::from(self.master.part_number)),
            (master::AVAILABLE_PARTS, f32::from(self.master.available_parts)),
        ];
        for (control, value) in main {
            visitor.visit(CommandBlock::write(value, control, section::MAIN));
        }

        for (index, part) in self.rack.parts.iter().enumerate() {
            let part = part.lock();
            let p = index as u8;
            let controls = [
                (pc::ENABLE, part.enabled as u8 as f32),
                (pc::VOLUME, part.volume),
                (pc::PANNING, part.panning),
                (pc::MIDI_CHANNEL, f32::from(part.midi_channel)),
                (pc::KEY_SHIFT, f32::from(part.key_shift)),
                (pc::KIT_MODE, part.kit_mode.value()),
            ];
            for (control, value) in controls {
                visitor.visit(CommandBlock::write(value, control, p));
            }

            let items = if part.kit_mode == KitMode::Off { 1 } else { NUM_KIT_ITEMS };
            for item in 0..items {
                for control in [pc::KIT_ENABLE, pc::KIT_MUTE, pc::KIT_MIN_NOTE, pc::KIT_MAX_NOTE] {
                    if item == 0 && control == pc::KIT_ENABLE {
                        continue;
                    }
                    let block = CommandBlock::write(part.kit_value(item, control), control, p)
                        .with_insert(insert::KIT_GROUP)
                        .with_kit(item as u8);
                    visitor.visit(block);
                }
            }

            for (efx, level) in part.sys_send.iter().enumerate() {
                visitor.visit(CommandBlock::write(*level, pc::SYS_SEND_BASE + efx as u8, p));
            }

            if !part.name.is_empty() {
                visitor.visit_text(CommandBlock::write(0.0, pc::INSTRUMENT_NAME, p), &part.name);
            }
        }

        let banks = [
            (section::SYSTEM_EFFECTS, &self.rack.sys_effects),
            (section::INSERT_EFFECTS, &self.rack.ins_effects),
        ];
        for (bank, slots) in banks {
            for (index, slot) in slots.iter().enumerate() {
                let e = index as u8;
                visitor.visit(CommandBlock::write(f32::from(slot.kind()), fx::TYPE, bank).with_engine(e));
                if bank == section::SYSTEM_EFFECTS {
                    visitor.visit(CommandBlock::write(slot.volume, fx::VOLUME, bank).with_engine(e));
                } else {
                    visitor.visit(CommandBlock::write(slot.target.value(), fx::DESTINATION, bank).with_engine(e));
                }
                if let Some(unit) = slot.unit() {
                    for param in 0..unit.param_count() {
                        let block = CommandBlock::write(unit.param(param), param, bank)
                            .with_engine(e)
                            .with_kit(fx::TYPE_BASE + slot.kind());
                        visitor.visit(block);
                    }
                }
            }
        }

        for from in 0..NUM_SYS_EFX {
            for to in (from + 1)..NUM_SYS_EFX {
                let block = CommandBlock::write(self.sys_to_sys[from][to], to as u8, section::SYSTEM_EFFECTS)
                    .with_engine(from as u8)
                    .with_insert(insert::SYSTEM_EFFECT_SEND);
                visitor.visit(block);
            }
        }
    }

    pub fn snapshot(&self) -> Patch {
        let mut patch = Patch::new();
        self.visit(&mut patch);
        patch
    }

    /// Reset to defaults, then replay `patch`. Entries that no longer resolve are skipped.
    ///
    /// An effect unit that can't be built stops the replay with its error.
    pub fn apply_patch(&mut self, patch: &Patch) -> Result<()> {
        if patch.version != PATCH_VERSION {
            return Err(SynthError::PatchVersion {
                found: patch.version,
                expected: PATCH_VERSION,
            });
        }
        if !self.is_initialized() {
            return Err(SynthError::NotInitialized);
        }

        self.defaults();
        let mut rejected = 0;
        for entry in &patch.entries {
            let mut block = entry.block;
            block.kind = TypeFlags::WRITE;
            if let Some(text) = &entry.text {
                match self.rack.parts.get_mut(usize::from(block.part)) {
                    Some(part) if block.control == command::part::INSTRUMENT_NAME => {
                        part.get_mut().name = text.clone();
                    }
                    _ => rejected += 1,
                }
                continue;
            }
            if let Some((
                Target::Effect {
                    bank,
                    index,
                    control: command::effect::TYPE,
                },
                descriptor,
            )) = self.resolve(&block)
            {
                // every slot is empty after defaults
                let kind = descriptor.clamp(block.value) as u8;
                if kind != 0 {
                    self.set_effect_kind(bank, index, kind)?;
                }
                continue;
            }
            self.dispatch(&mut block);
            if block.is_error() {
                rejected += 1;
            }
        }
        if rejected > 0 {
            tracing::warn!("{rejected} patch entries did not apply");
        }
        Ok(())
    }
}
