//! The parameter store: all synth state behind the engine lock.
//!
//! [`SynthState`] owns the master settings, the rack of parts and effect
//! slots, the meters and the MIDI-learn table. Every control path goes
//! through [`SynthState::dispatch`] (audio thread, exclusive lock) or
//! [`SynthState::query`] (any thread, shared lock).
//!
//! Resolution is a direct match on the block's coordinates; no lookups scale
//! with the number of parameters.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;

use crate::command::{self, insert, section, CommandBlock, SourceFlags, TypeFlags, UNUSED};
use crate::effect::{self, EffectSlot, InsertTarget, NUM_INS_EFX, NUM_SYS_EFX};
use crate::error::{Result, SynthError};
use crate::factory::EngineFactory;
use crate::learn::{LearnKey, MidiLearn};
use crate::meter::Meters;
use crate::midi::{cc, MidiEvent};
use crate::misc_msg::MiscMessages;
use crate::node::ProcessContext;
use crate::params::{ParamDescriptor, ParamFlags};
use crate::part::{self, KitMode, Part, NUM_KIT_ITEMS, NUM_PARTS};

pub const DEFAULT_MASTER_VOLUME: f32 = 90.0;

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Master {
    pub volume: f32,
    pub key_shift: i8,
    pub part_number: u8,
    pub available_parts: u8,
}

impl Default for Master {
    fn default() -> Self {
        Self {
            volume: DEFAULT_MASTER_VOLUME,
            key_shift: 0,
            part_number: 0,
            available_parts: NUM_PARTS as u8,
        }
    }
}

/// Every allocated engine instance.
pub struct Rack {
    pub(crate) parts: Box<[Mutex<Part>]>,
    pub(crate) sys_effects: Box<[EffectSlot]>,
    pub(crate) ins_effects: Box<[EffectSlot]>,
}

impl Rack {
    pub fn empty() -> Self {
        Self {
            parts: Box::new([]),
            sys_effects: Box::new([]),
            ins_effects: Box::new([]),
        }
    }

    /// Allocate every part engine and effect slot. Nothing is kept on failure.
    pub fn build(factory: &dyn EngineFactory, ctx: &ProcessContext) -> Result<Self> {
        let mut parts = Vec::with_capacity(NUM_PARTS);
        for index in 0..NUM_PARTS {
            let engine = factory
                .create_part(index, ctx)
                .map_err(|e| SynthError::Allocation {
                    what: "part",
                    index,
                    reason: e.to_string(),
                })?;
            parts.push(Mutex::new(Part::new(index, engine, ctx.buffer_size, NUM_SYS_EFX)));
        }

        let sys_effects = (0..NUM_SYS_EFX).map(|_| EffectSlot::new(ctx.buffer_size)).collect();
        let ins_effects = (0..NUM_INS_EFX).map(|_| EffectSlot::new(ctx.buffer_size)).collect();

        Ok(Self {
            parts: parts.into_boxed_slice(),
            sys_effects,
            ins_effects,
        })
    }

    #[inline]
    pub fn part_count(&self) -> usize {
        self.parts.len()
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum Bank {
    System,
    Insertion,
}

/// A resolved control path.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum Target {
    Master(u8),
    Meter { control: u8, part: usize },
    Part { part: usize, control: u8 },
    PartName(usize),
    PartSend { part: usize, efx: usize },
    Kit { part: usize, item: usize, control: u8 },
    Effect { bank: Bank, index: usize, control: u8 },
    EffectParam { bank: Bank, index: usize, param: u8 },
    EffectSend { from: usize, to: usize },
    Learn(u8),
}

pub struct SynthState {
    pub(crate) ctx: ProcessContext,
    pub(crate) master: Master,
    pub(crate) rack: Rack,
    /// System effect to system effect send levels, `[from][to]`, only `to > from` used.
    pub(crate) sys_to_sys: [[f32; NUM_SYS_EFX]; NUM_SYS_EFX],
    pub(crate) meters: Meters,
    pub(crate) learn: MidiLearn,
    pub(crate) factory: Arc<dyn EngineFactory>,
    pub(crate) texts: Arc<MiscMessages>,
    pub(crate) shutup: Arc<AtomicBool>,
    pub(crate) scratch_l: Vec<f32>,
    pub(crate) scratch_r: Vec<f32>,
    initialized: bool,
}

impl SynthState {
    pub fn new(factory: Arc<dyn EngineFactory>, ctx: ProcessContext) -> Result<Self> {
        let rack = Rack::build(&*factory, &ctx)?;
        let mut state = Self {
            ctx,
            master: Master::default(),
            rack,
            sys_to_sys: [[0.0; NUM_SYS_EFX]; NUM_SYS_EFX],
            meters: Meters::new(NUM_PARTS),
            learn: MidiLearn::new(),
            factory,
            texts: Arc::new(MiscMessages::new()),
            shutup: Arc::new(AtomicBool::new(false)),
            scratch_l: vec![0.0; ctx.buffer_size],
            scratch_r: vec![0.0; ctx.buffer_size],
            initialized: true,
        };
        state.defaults();
        Ok(state)
    }

    #[inline]
    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    #[inline]
    pub fn context(&self) -> ProcessContext {
        self.ctx
    }

    pub fn master(&self) -> Master {
        self.master
    }

    pub fn meters(&self) -> &Meters {
        &self.meters
    }

    pub fn learn(&self) -> &MidiLearn {
        &self.learn
    }

    /// Number of parts that render and receive MIDI.
    #[inline]
    pub(crate) fn active_parts(&self) -> usize {
        usize::from(self.master.available_parts).min(self.rack.parts.len())
    }

    /// Drop every engine instance. The state renders silence until [`install`](Self::install).
    pub(crate) fn teardown(&mut self) {
        self.rack = Rack::empty();
        self.initialized = false;
    }

    pub(crate) fn install(&mut self, rack: Rack, ctx: ProcessContext) {
        self.rack = rack;
        self.ctx = ctx;
        self.scratch_l = vec![0.0; ctx.buffer_size];
        self.scratch_r = vec![0.0; ctx.buffer_size];
        self.initialized = true;
        self.defaults();
    }

    /// Power-on values for everything except MIDI-learn bindings.
    pub fn defaults(&mut self) {
        self.master = Master::default();
        for (index, part) in self.rack.parts.iter_mut().enumerate() {
            part.get_mut().defaults(index);
        }
        for slot in self.rack.sys_effects.iter_mut().chain(self.rack.ins_effects.iter_mut()) {
            slot.defaults();
        }
        self.sys_to_sys = [[0.0; NUM_SYS_EFX]; NUM_SYS_EFX];
        self.meters.reset();
    }

    /// Silence every part and effect tail immediately.
    pub fn shut_up(&mut self) {
        for part in self.rack.parts.iter_mut() {
            part.get_mut().cleanup();
        }
        for slot in self.rack.sys_effects.iter_mut().chain(self.rack.ins_effects.iter_mut()) {
            slot.cleanup();
        }
        self.meters.reset();
    }

    /// Resolve a block's coordinates to a target and its descriptor.
    pub(crate) fn resolve(&self, block: &CommandBlock) -> Option<(Target, ParamDescriptor)> {
        match block.part {
            p if usize::from(p) < self.rack.parts.len() => self.resolve_part(usize::from(p), block),
            section::MAIN => self.resolve_master(block),
            section::SYSTEM_EFFECTS => self.resolve_effect(Bank::System, block),
            section::INSERT_EFFECTS => self.resolve_effect(Bank::Insertion, block),
            section::MIDI_LEARN => {
                let descriptor = match block.control {
                    command::learn::COUNT => ParamDescriptor::integer(0.0, 128.0, 0.0).read_only(),
                    command::learn::PENDING => ParamDescriptor::toggle(false).read_only(),
                    command::learn::CLEAR => ParamDescriptor::action(),
                    _ => return None,
                };
                Some((Target::Learn(block.control), descriptor))
            }
            _ => None,
        }
    }

    fn resolve_master(&self, block: &CommandBlock) -> Option<(Target, ParamDescriptor)> {
        use command::master::*;

        let descriptor = match block.control {
            VOLUME => ParamDescriptor::integer(0.0, 127.0, DEFAULT_MASTER_VOLUME).learnable(),
            KEY_SHIFT => ParamDescriptor::integer(-36.0, 36.0, 0.0),
            PART_NUMBER => ParamDescriptor::integer(0.0, (NUM_PARTS - 1) as f32, 0.0),
            AVAILABLE_PARTS => ParamDescriptor::integer(1.0, NUM_PARTS as f32, NUM_PARTS as f32),
            MASTER_RESET | STOP_SOUND | RESET_PEAKS => ParamDescriptor::action(),
            PEAK_L..=MAX_PEAK_R => ParamDescriptor::float(0.0, f32::MAX, 0.0).read_only(),
            CLIPPED_L | CLIPPED_R => ParamDescriptor::toggle(false).read_only(),
            PART_PEAK => {
                let part = usize::from(block.parameter);
                if part >= NUM_PARTS {
                    return None;
                }
                let descriptor = ParamDescriptor::float(0.0, f32::MAX, 0.0).read_only();
                return Some((
                    Target::Meter {
                        control: PART_PEAK,
                        part,
                    },
                    descriptor,
                ));
            }
            _ => return None,
        };
        let target = if (PEAK_L..=CLIPPED_R).contains(&block.control) {
            Target::Meter {
                control: block.control,
                part: 0,
            }
        } else {
            Target::Master(block.control)
        };
        Some((target, descriptor))
    }

    fn resolve_part(&self, index: usize, block: &CommandBlock) -> Option<(Target, ParamDescriptor)> {
        match block.insert {
            insert::KIT_GROUP => {
                let item = usize::from(block.kit);
                if item >= NUM_KIT_ITEMS {
                    return None;
                }
                if item != 0 && self.rack.parts[index].lock().kit_mode() == KitMode::Off {
                    return None;
                }
                let descriptor = part::kit_descriptor(block.control, item)?;
                Some((
                    Target::Kit {
                        part: index,
                        item,
                        control: block.control,
                    },
                    descriptor,
                ))
            }
            UNUSED => {
                if block.control == command::part::INSTRUMENT_NAME {
                    return Some((Target::PartName(index), ParamDescriptor::action()));
                }
                let descriptor = part::descriptor(block.control, NUM_SYS_EFX)?;
                let target = if block.control >= command::part::SYS_SEND_BASE {
                    Target::PartSend {
                        part: index,
                        efx: usize::from(block.control - command::part::SYS_SEND_BASE),
                    }
                } else {
                    Target::Part {
                        part: index,
                        control: block.control,
                    }
                };
                Some((target, descriptor))
            }
            _ => None,
        }
    }

    fn resolve_effect(&self, bank: Bank, block: &CommandBlock) -> Option<(Target, ParamDescriptor)> {
        let index = usize::from(block.engine);
        let slot = self.slots(bank).get(index)?;

        if block.insert == insert::SYSTEM_EFFECT_SEND {
            let to = usize::from(block.control);
            // sends only feed forward
            if bank != Bank::System || to >= NUM_SYS_EFX || to <= index {
                return None;
            }
            let descriptor = ParamDescriptor::integer(0.0, 127.0, 0.0).learnable();
            return Some((Target::EffectSend { from: index, to }, descriptor));
        }
        if block.insert != UNUSED {
            return None;
        }

        if block.kit != UNUSED && block.kit >= command::effect::TYPE_BASE {
            let kind = block.kit - command::effect::TYPE_BASE;
            if kind == 0 || kind != slot.kind() {
                return None;
            }
            let descriptor = slot.param_descriptor(block.control)?;
            return Some((
                Target::EffectParam {
                    bank,
                    index,
                    param: block.control,
                },
                descriptor,
            ));
        }

        let descriptor = effect::descriptor(
            block.control,
            bank == Bank::Insertion,
            self.factory.effect_kinds(),
            self.rack.parts.len(),
        )?;
        Some((
            Target::Effect {
                bank,
                index,
                control: block.control,
            },
            descriptor,
        ))
    }

    fn slots(&self, bank: Bank) -> &[EffectSlot] {
        match bank {
            Bank::System => &self.rack.sys_effects,
            Bank::Insertion => &self.rack.ins_effects,
        }
    }

    fn slots_mut(&mut self, bank: Bank) -> &mut [EffectSlot] {
        match bank {
            Bank::System => &mut self.rack.sys_effects,
            Bank::Insertion => &mut self.rack.ins_effects,
        }
    }

    /// Current value at a resolved target.
    pub(crate) fn get(&self, target: Target) -> f32 {
        use command::master::*;

        match target {
            Target::Master(control) => match control {
                VOLUME => self.master.volume,
                KEY_SHIFT => f32::from(self.master.key_shift),
                PART_NUMBER => f32::from(self.master.part_number),
                AVAILABLE_PARTS => f32::from(self.master.available_parts),
                _ => 0.0,
            },
            Target::Meter { control, part } => {
                let m = self.meters.readings();
                match control {
                    PEAK_L => m.peak_l,
                    PEAK_R => m.peak_r,
                    RMS_L => m.rms_l,
                    RMS_R => m.rms_r,
                    MAX_PEAK_L => m.max_peak_l,
                    MAX_PEAK_R => m.max_peak_r,
                    CLIPPED_L => m.clipped_l as u8 as f32,
                    CLIPPED_R => m.clipped_r as u8 as f32,
                    PART_PEAK => self.meters.part_peak(part),
                    _ => 0.0,
                }
            }
            Target::Part { part, control } => {
                let part = self.rack.parts[part].lock();
                match control {
                    command::part::VOLUME => part.volume,
                    command::part::PANNING => part.panning,
                    command::part::MIDI_CHANNEL => f32::from(part.midi_channel),
                    command::part::ENABLE => part.enabled as u8 as f32,
                    command::part::KEY_SHIFT => f32::from(part.key_shift),
                    command::part::KIT_MODE => part.kit_mode.value(),
                    _ => 0.0,
                }
            }
            Target::PartName(_) => 0.0,
            Target::PartSend { part, efx } => self.rack.parts[part].lock().sys_send[efx],
            Target::Kit { part, item, control } => self.rack.parts[part].lock().kit_value(item, control),
            Target::Effect { bank, index, control } => {
                let slot = &self.slots(bank)[index];
                match control {
                    command::effect::VOLUME => slot.volume,
                    command::effect::TYPE => f32::from(slot.kind()),
                    command::effect::DESTINATION => slot.target.value(),
                    _ => 0.0,
                }
            }
            Target::EffectParam { bank, index, param } => self.slots(bank)[index].param(param),
            Target::EffectSend { from, to } => self.sys_to_sys[from][to],
            Target::Learn(control) => match control {
                command::learn::COUNT => self.learn.len() as f32,
                command::learn::PENDING => self.learn.is_armed() as u8 as f32,
                _ => 0.0,
            },
        }
    }

    /// Answer a read or limits query without changing anything.
    pub fn query(&self, block: &mut CommandBlock) -> f32 {
        let Some((target, descriptor)) = self.resolve(block) else {
            block.fail();
            return 0.0;
        };
        if descriptor.is_integer() {
            block.kind.insert(TypeFlags::INTEGER);
        }
        if descriptor.is_learnable() {
            block.kind.insert(TypeFlags::LEARNABLE);
        }
        if block.is_limits() {
            return descriptor.bound(block.kind.limit_request(), block.value);
        }
        if descriptor.flags.contains(ParamFlags::WRITE_ONLY) {
            block.fail();
            return 0.0;
        }
        self.get(target)
    }

    /// Descriptor for a block's path, if it resolves.
    pub fn describe(&self, block: &CommandBlock) -> Option<ParamDescriptor> {
        self.resolve(block).map(|(_, descriptor)| descriptor)
    }

    /// Apply a command block. Returns the value now in effect.
    ///
    /// Out-of-range writes are clamped. Writes that would not change the
    /// stored value are skipped unless forced. Failures set the block's
    /// error flag.
    pub fn dispatch(&mut self, block: &mut CommandBlock) -> f32 {
        if !block.is_write() || block.is_limits() {
            return self.query(block);
        }
        let Some((target, descriptor)) = self.resolve(block) else {
            tracing::debug!(?block, "control path does not resolve");
            block.fail();
            return block.value;
        };

        if block.is_learn_request() {
            if descriptor.is_learnable() {
                self.learn.arm(block);
            } else {
                block.fail();
            }
            return block.value;
        }

        if descriptor.flags.contains(ParamFlags::READ_ONLY) {
            block.fail();
            return self.get(target);
        }

        let value = descriptor.clamp(block.value);
        let action = descriptor.flags.contains(ParamFlags::WRITE_ONLY);
        let forced = block.source.contains(SourceFlags::FORCE_UPDATE);
        if !action && !forced && self.get(target) == value {
            return value;
        }

        if self.apply(target, value, block) {
            block.value = value;
        } else {
            block.fail();
        }
        value
    }

    /// Re-instantiate an effect slot. On error the slot keeps its old unit.
    pub(crate) fn set_effect_kind(&mut self, bank: Bank, index: usize, kind: u8) -> Result<()> {
        let slot = match bank {
            Bank::System => &mut self.rack.sys_effects[index],
            Bank::Insertion => &mut self.rack.ins_effects[index],
        };
        slot.change_kind(kind, &*self.factory, &self.ctx)
    }

    fn apply(&mut self, target: Target, value: f32, block: &CommandBlock) -> bool {
        match target {
            Target::Master(control) => self.apply_master(control, value),
            Target::Meter { .. } => return false,
            Target::Part { part, control } => self.apply_part(part, control, value),
            Target::PartName(index) => {
                let Some(name) = self.texts.pop(block.miscmsg) else {
                    return false;
                };
                self.rack.parts[index].get_mut().name = name;
            }
            Target::PartSend { part, efx } => self.rack.parts[part].get_mut().sys_send[efx] = value,
            Target::Kit { part, item, control } => {
                self.rack.parts[part].get_mut().set_kit_value(item, control, value)
            }
            Target::Effect { bank, index, control } => match control {
                command::effect::TYPE => {
                    if let Err(e) = self.set_effect_kind(bank, index, value as u8) {
                        tracing::warn!("effect {index} type change failed: {e}");
                        return false;
                    }
                }
                command::effect::VOLUME => self.slots_mut(bank)[index].volume = value,
                command::effect::DESTINATION => {
                    let slot = &mut self.slots_mut(bank)[index];
                    slot.target = InsertTarget::from_value(value);
                    slot.cleanup();
                }
                _ => return false,
            },
            Target::EffectParam { bank, index, param } => self.slots_mut(bank)[index].set_param(param, value),
            Target::EffectSend { from, to } => self.sys_to_sys[from][to] = value,
            Target::Learn(control) => {
                if control != command::learn::CLEAR {
                    return false;
                }
                self.learn.clear();
            }
        }
        true
    }

    fn apply_master(&mut self, control: u8, value: f32) {
        use command::master::*;

        match control {
            VOLUME => self.master.volume = value,
            KEY_SHIFT => self.master.key_shift = value as i8,
            PART_NUMBER => self.master.part_number = value as u8,
            AVAILABLE_PARTS => {
                self.master.available_parts = value as u8;
                let active = self.active_parts();
                for part in self.rack.parts[active..].iter_mut() {
                    part.get_mut().cleanup();
                }
            }
            MASTER_RESET => {
                tracing::info!("master reset");
                self.defaults();
            }
            STOP_SOUND => self.shutup.store(true, Ordering::Release),
            RESET_PEAKS => self.meters.reset(),
            _ => {}
        }
    }

    fn apply_part(&mut self, index: usize, control: u8, value: f32) {
        let part = self.rack.parts[index].get_mut();
        match control {
            command::part::VOLUME => part.volume = value,
            command::part::PANNING => part.panning = value,
            command::part::MIDI_CHANNEL => part.midi_channel = value as u8,
            command::part::KEY_SHIFT => part.key_shift = value as i8,
            command::part::KIT_MODE => part.set_kit_mode(KitMode::from_value(value)),
            command::part::ENABLE => {
                let enabled = value != 0.0;
                part.set_enabled(enabled);
                if !enabled {
                    self.release_part(index);
                }
            }
            _ => {}
        }
    }

    /// Clear insertion effects feeding a disabled part and its meter.
    pub(crate) fn release_part(&mut self, index: usize) {
        for slot in self.rack.ins_effects.iter_mut() {
            if slot.target == InsertTarget::Part(index) {
                slot.cleanup();
            }
        }
        self.meters.set_part_peak(index, 0.0);
    }

    /// Apply a MIDI event. Audio thread, exclusive lock.
    pub fn handle_midi(&mut self, event: MidiEvent) {
        let shift = self.master.key_shift;
        let active = self.active_parts();

        match event {
            MidiEvent::NoteOn {
                channel,
                note,
                velocity,
            } => {
                for part in self.channel_parts(channel, active) {
                    part.note_on(note, velocity, shift);
                }
            }
            MidiEvent::NoteOff { channel, note } => {
                for part in self.channel_parts(channel, active) {
                    part.note_off(note, shift);
                }
            }
            MidiEvent::Controller {
                channel,
                control,
                value,
            } => self.controller(channel, control, value),
            MidiEvent::PitchBend { channel, value } => {
                for part in self.channel_parts(channel, active) {
                    part.pitch_bend(value);
                }
            }
            MidiEvent::ProgramChange { channel, program } => {
                tracing::debug!(channel, program, "program change ignored");
            }
        }
    }

    fn channel_parts(&mut self, channel: u8, active: usize) -> impl Iterator<Item = &mut Part> {
        self.rack
            .parts
            .iter_mut()
            .take(active)
            .map(|p| p.get_mut())
            .filter(move |p| p.enabled && p.midi_channel == channel)
    }

    fn controller(&mut self, channel: u8, control: u8, value: u8) {
        let key = LearnKey { channel, control };
        if self.learn.is_armed() && self.learn.learn(key) {
            tracing::debug!(channel, control, "controller learned");
            return;
        }
        if let Some(mut template) = self.learn.lookup(key) {
            if let Some(descriptor) = self.describe(&template) {
                template.value = descriptor.from_midi(value);
                self.dispatch(&mut template);
            }
            return;
        }

        if control == cc::ALL_SOUND_OFF {
            self.shutup.store(true, Ordering::Release);
            return;
        }
        let active = self.active_parts();
        for part in self.channel_parts(channel, active) {
            part.controller(control, value);
        }
    }

    /// Note on from a control thread: shared lock, one part at a time.
    pub(crate) fn note_on_shared(&self, channel: u8, note: u8, velocity: u8) {
        let shift = self.master.key_shift;
        for part in self.rack.parts.iter().take(self.active_parts()) {
            let mut part = part.lock();
            if part.enabled && part.midi_channel == channel {
                part.note_on(note, velocity, shift);
            }
        }
    }

    pub(crate) fn note_off_shared(&self, channel: u8, note: u8) {
        let shift = self.master.key_shift;
        for part in self.rack.parts.iter().take(self.active_parts()) {
            let mut part = part.lock();
            if part.enabled && part.midi_channel == channel {
                part.note_off(note, shift);
            }
        }
    }

    /// Enable or disable a part from a control thread.
    pub(crate) fn part_on_off_shared(&self, index: usize, enabled: bool) -> bool {
        let Some(part) = self.rack.parts.get(index) else {
            return false;
        };
        let mut part = part.lock();
        let was = part.enabled;
        part.set_enabled(enabled);
        if was && !enabled {
            part.stale_effects = true;
        }
        true
    }

    pub(crate) fn part_name(&self, index: usize) -> Option<String> {
        self.rack.parts.get(index).map(|p| p.lock().name.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::{effect as fx, master, part as pc, LimitRequest};
    use crate::factory::{kind, BuiltinFactory};

    fn state() -> SynthState {
        let ctx = ProcessContext {
            sample_rate: 48_000,
            buffer_size: 64,
        };
        SynthState::new(Arc::new(BuiltinFactory), ctx).unwrap()
    }

    #[test]
    fn write_then_read() {
        let mut s = state();
        let mut block = CommandBlock::write(100.0, pc::VOLUME, 3);
        assert_eq!(s.dispatch(&mut block), 100.0);
        assert!(!block.is_error());

        let mut read = CommandBlock::read(pc::VOLUME, 3);
        assert_eq!(s.query(&mut read), 100.0);
        assert!(read.kind.contains(TypeFlags::INTEGER));
        assert!(read.kind.contains(TypeFlags::LEARNABLE));
    }

    #[test]
    fn out_of_range_is_clamped() {
        let mut s = state();
        let mut block = CommandBlock::write(500.0, pc::PANNING, 0);
        assert_eq!(s.dispatch(&mut block), 127.0);
        assert_eq!(s.query(&mut CommandBlock::read(pc::PANNING, 0)), 127.0);
    }

    #[test]
    fn limits_do_not_touch_state() {
        let s = state();
        let mut block = CommandBlock::limits(master::VOLUME, section::MAIN, LimitRequest::Default);
        assert_eq!(s.query(&mut block), DEFAULT_MASTER_VOLUME);
        let mut block = CommandBlock::limits(master::VOLUME, section::MAIN, LimitRequest::Maximum);
        assert_eq!(s.query(&mut block), 127.0);
        let mut block =
            CommandBlock::limits(master::VOLUME, section::MAIN, LimitRequest::Adjust).with_value(300.0);
        assert_eq!(s.query(&mut block), 127.0);
        assert_eq!(s.master().volume, DEFAULT_MASTER_VOLUME);
    }

    #[test]
    fn unknown_paths_flag_error() {
        let mut s = state();
        let mut block = CommandBlock::write(1.0, 99, 0);
        s.dispatch(&mut block);
        assert!(block.is_error());

        let mut block = CommandBlock::read(0, 250);
        s.query(&mut block);
        assert!(block.is_error());
    }

    #[test]
    fn kit_items_need_kit_mode() {
        let mut s = state();
        let item = CommandBlock::write(1.0, pc::KIT_ENABLE, 0)
            .with_insert(insert::KIT_GROUP)
            .with_kit(2);
        let mut block = item;
        s.dispatch(&mut block);
        assert!(block.is_error());

        s.dispatch(&mut CommandBlock::write(1.0, pc::KIT_MODE, 0));
        let mut block = item;
        s.dispatch(&mut block);
        assert!(!block.is_error());

        // leaving kit mode resets the layout
        s.dispatch(&mut CommandBlock::write(0.0, pc::KIT_MODE, 0));
        s.dispatch(&mut CommandBlock::write(1.0, pc::KIT_MODE, 0));
        let mut read = item;
        read.kind = TypeFlags::NONE;
        assert_eq!(s.query(&mut read), 0.0);
    }

    #[test]
    fn effect_params_follow_type() {
        let mut s = state();
        let mut set_type = CommandBlock::write(kind::ECHO as f32, fx::TYPE, section::SYSTEM_EFFECTS).with_engine(1);
        s.dispatch(&mut set_type);

        let param = CommandBlock::write(100.0, 1, section::SYSTEM_EFFECTS)
            .with_engine(1)
            .with_kit(fx::TYPE_BASE + kind::ECHO);
        let mut block = param;
        assert_eq!(s.dispatch(&mut block), 100.0);
        assert!(!block.is_error());

        // wrong type in the path
        let mut block = param.with_kit(fx::TYPE_BASE + kind::DISTORTION);
        s.dispatch(&mut block);
        assert!(block.is_error());
    }

    #[test]
    fn backward_sends_are_rejected() {
        let mut s = state();
        let send = |from: u8, to: u8| {
            CommandBlock::write(90.0, to, section::SYSTEM_EFFECTS)
                .with_engine(from)
                .with_insert(insert::SYSTEM_EFFECT_SEND)
        };
        let mut forward = send(0, 2);
        s.dispatch(&mut forward);
        assert!(!forward.is_error());
        assert_eq!(s.sys_to_sys[0][2], 90.0);

        for (from, to) in [(2, 0), (1, 1), (3, 9)] {
            let mut block = send(from, to);
            s.dispatch(&mut block);
            assert!(block.is_error(), "{from} -> {to}");
        }
    }

    #[test]
    fn read_only_and_write_only() {
        let mut s = state();
        let mut block = CommandBlock::write(1.0, master::PEAK_L, section::MAIN);
        s.dispatch(&mut block);
        assert!(block.is_error());

        let mut block = CommandBlock::read(master::STOP_SOUND, section::MAIN);
        s.query(&mut block);
        assert!(block.is_error());

        let mut block = CommandBlock::write(1.0, master::STOP_SOUND, section::MAIN);
        s.dispatch(&mut block);
        assert!(!block.is_error());
        assert!(s.shutup.load(Ordering::Acquire));
    }

    #[test]
    fn learn_binds_next_controller() {
        let mut s = state();
        let mut request = CommandBlock::read(pc::VOLUME, 0).learn_request();
        s.dispatch(&mut request);
        assert!(!request.is_error());
        assert!(s.learn().is_armed());

        s.handle_midi(MidiEvent::Controller {
            channel: 0,
            control: 74,
            value: 0,
        });
        assert_eq!(s.learn().len(), 1);

        s.handle_midi(MidiEvent::Controller {
            channel: 0,
            control: 74,
            value: 127,
        });
        assert_eq!(s.query(&mut CommandBlock::read(pc::VOLUME, 0)), 127.0);
    }

    #[test]
    fn unlearnable_request_fails() {
        let mut s = state();
        let mut request = CommandBlock::read(pc::MIDI_CHANNEL, 0).learn_request();
        s.dispatch(&mut request);
        assert!(request.is_error());
        assert!(!s.learn().is_armed());
    }

    #[test]
    fn instrument_name_through_text_table() {
        let mut s = state();
        let id = s.texts.push("Warm Pad").unwrap();
        let mut block = CommandBlock::write(0.0, pc::INSTRUMENT_NAME, 2).with_miscmsg(id);
        s.dispatch(&mut block);
        assert!(!block.is_error());
        assert_eq!(s.part_name(2).as_deref(), Some("Warm Pad"));
        assert_eq!(s.texts.in_use(), 0);
    }

    #[test]
    fn master_reset_restores_defaults() {
        let mut s = state();
        s.dispatch(&mut CommandBlock::write(20.0, master::VOLUME, section::MAIN));
        s.dispatch(&mut CommandBlock::write(1.0, pc::ENABLE, 5));
        s.dispatch(&mut CommandBlock::write(1.0, master::MASTER_RESET, section::MAIN));
        assert_eq!(s.master().volume, DEFAULT_MASTER_VOLUME);
        assert_eq!(s.query(&mut CommandBlock::read(pc::ENABLE, 5)), 0.0);
        assert_eq!(s.query(&mut CommandBlock::read(pc::ENABLE, 0)), 1.0);
    }
}
